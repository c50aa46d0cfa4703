use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gr_recipe_contracts::{RecipeError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader, ImageResult, Rgb, RgbImage};

/// Longest side an attached image may have after encoding.
pub const MAX_ASSET_DIMENSION: u32 = 768;
/// JPEG quality on the encoder's 0-100 scale.
pub const ASSET_JPEG_QUALITY: u8 = 80;
pub const ASSET_MIME: &str = "image/jpeg";

/// Image bytes as picked from disk or pulled off the clipboard, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageInput {
    pub label: String,
    pub bytes: Vec<u8>,
}

impl RawImageInput {
    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }

    /// Unreadable files are reported like undecodable ones so the batch can
    /// drop just this input.
    pub fn from_path(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|err| RecipeError::asset_decode(&label, err))?;
        Ok(Self { label, bytes })
    }
}

/// Size-bounded JPEG serialized as a `data:` URL, ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportableAsset {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

impl TransportableAsset {
    pub fn as_str(&self) -> &str {
        &self.data_url
    }

    pub fn encoded_len(&self) -> usize {
        self.data_url.len()
    }
}

/// Aspect-preserving target size with the longer side capped at `max_dim`.
/// Images already inside the bound are never upscaled.
pub fn scaled_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dim {
        return (width, height);
    }
    let scale = f64::from(max_dim) / f64::from(longest);
    let shrink = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dim);
    if width >= height {
        (max_dim, shrink(height))
    } else {
        (shrink(width), max_dim)
    }
}

pub fn encode(source: &RawImageInput) -> Result<TransportableAsset> {
    let decoded =
        decode_upright(&source.bytes).map_err(|err| RecipeError::asset_decode(&source.label, err))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(RecipeError::asset_decode(&source.label, "image has no pixels"));
    }

    let (target_width, target_height) = scaled_dimensions(width, height, MAX_ASSET_DIMENSION);
    let flattened = flatten_onto_white(&decoded);
    let resized = if (target_width, target_height) == (width, height) {
        flattened
    } else {
        DynamicImage::ImageRgb8(flattened)
            .resize_exact(target_width, target_height, FilterType::Triangle)
            .to_rgb8()
    };

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, ASSET_JPEG_QUALITY)
        .encode_image(&resized)
        .map_err(|err| RecipeError::asset_decode(&source.label, format!("re-encode failed: {err}")))?;

    Ok(TransportableAsset {
        label: source.label.clone(),
        width: target_width,
        height: target_height,
        data_url: format!("data:{ASSET_MIME};base64,{}", BASE64.encode(bytes)),
    })
}

/// Decode and apply the EXIF orientation, so camera portraits come out
/// upright before any resizing.
fn decode_upright(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut decoded = DynamicImage::from_decoder(decoder)?;
    decoded.apply_orientation(orientation);
    Ok(decoded)
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8 };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}
