use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;

use crate::error::{RecipeError, Result};

/// Closed range every image-control parameter is expected to fall in.
pub const PARAMETER_RANGE: RangeInclusive<i32> = -4..=4;

pub const RECIPE_FILE_SUFFIX: &str = "_recipe.json";

const IMPORT_REQUIRED_FIELDS: [&str; 3] = ["vibe_match", "global_settings", "parameters"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub vibe_match: String,
    #[serde(default)]
    pub base_mode: String,
    pub global_settings: GlobalSettings,
    pub parameters: Parameters,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub exposure_recommendation: String,
    pub wb_setting: String,
    pub wb_shift_a: i32,
    pub wb_shift_g: i32,
    pub hdf_recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameters {
    pub saturation: i32,
    pub hue: i32,
    pub high_low_key: i32,
    pub contrast: i32,
    pub contrast_highlight: i32,
    pub contrast_shadow: i32,
    pub sharpness: i32,
    pub shading: i32,
    pub clarity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseMode {
    NegativeFilm,
    PositiveFilm,
}

impl BaseMode {
    /// Lenient parse of the free-form `base_mode` string.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "negativefilm" | "negative" => Some(Self::NegativeFilm),
            "positivefilm" | "positive" => Some(Self::PositiveFilm),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NegativeFilm => "Negative Film",
            Self::PositiveFilm => "Positive Film",
        }
    }
}

impl fmt::Display for BaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl GlobalSettings {
    /// `Some(true)` for "ON", `Some(false)` for "OFF", `None` for anything else.
    pub fn hdf_enabled(&self) -> Option<bool> {
        match self.hdf_recommendation.trim().to_ascii_uppercase().as_str() {
            "ON" => Some(true),
            "OFF" => Some(false),
            _ => None,
        }
    }
}

impl Parameters {
    pub fn named(&self) -> [(&'static str, i32); 9] {
        [
            ("Saturation", self.saturation),
            ("Hue", self.hue),
            ("High/Low Key", self.high_low_key),
            ("Contrast", self.contrast),
            ("Contrast (Highlight)", self.contrast_highlight),
            ("Contrast (Shadow)", self.contrast_shadow),
            ("Sharpness", self.sharpness),
            ("Shading", self.shading),
            ("Clarity", self.clarity),
        ]
    }

    pub fn in_domain(&self) -> bool {
        self.named()
            .iter()
            .all(|(_, value)| PARAMETER_RANGE.contains(value))
    }
}

impl Recipe {
    pub fn base_mode_kind(&self) -> Option<BaseMode> {
        BaseMode::parse(&self.base_mode)
    }

    /// Identity used by the personal collection: title plus structural
    /// equality of the nine parameters.
    pub fn dedup_key(&self) -> (&str, &Parameters) {
        (self.vibe_match.as_str(), &self.parameters)
    }

    pub fn same_recipe(&self, other: &Recipe) -> bool {
        self.dedup_key() == other.dedup_key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedRecipe {
    pub filename: String,
    pub contents: String,
}

pub fn export_filename(vibe_match: &str) -> String {
    let sanitized = vibe_match
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect::<String>();
    format!("{sanitized}{RECIPE_FILE_SUFFIX}")
}

pub fn export_recipe(recipe: &Recipe) -> Result<ExportedRecipe> {
    Ok(ExportedRecipe {
        filename: export_filename(&recipe.vibe_match),
        contents: serde_json::to_string_pretty(recipe)?,
    })
}

/// Parse an externally supplied document into a recipe. The minimal shape
/// `{vibe_match, global_settings, parameters}` is checked before the full
/// decode so callers get a precise rejection message.
pub fn parse_import_document(raw: &str) -> Result<Recipe> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|err| RecipeError::ImportValidation(format!("not valid JSON: {err}")))?;
    let Some(object) = parsed.as_object() else {
        return Err(RecipeError::ImportValidation(
            "document must be a JSON object".to_string(),
        ));
    };
    let missing = IMPORT_REQUIRED_FIELDS
        .iter()
        .filter(|field| object.get(**field).map_or(true, Value::is_null))
        .copied()
        .collect::<Vec<&str>>();
    if !missing.is_empty() {
        return Err(RecipeError::ImportValidation(format!(
            "missing field(s): {}",
            missing.join(", ")
        )));
    }
    serde_json::from_value(parsed)
        .map_err(|err| RecipeError::ImportValidation(format!("invalid recipe shape: {err}")))
}

/// Unified line diff between two recipes' pretty JSON forms. Empty when the
/// recipes are structurally equal.
pub fn compare(left: &Recipe, right: &Recipe) -> Result<Vec<String>> {
    if left == right {
        return Ok(Vec::new());
    }
    let left_text = serde_json::to_string_pretty(left)?;
    let right_text = serde_json::to_string_pretty(right)?;
    let diff = TextDiff::from_lines(&left_text, &right_text);
    let rendered = diff
        .unified_diff()
        .header(&left.vibe_match, &right.vibe_match)
        .to_string();
    Ok(rendered.lines().map(str::to_string).collect())
}
