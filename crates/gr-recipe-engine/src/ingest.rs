use std::thread;

use gr_recipe_contracts::{RecipeError, Result};
use tracing::{debug, warn};

use crate::assets::{encode, RawImageInput, TransportableAsset};

/// Upper bound on encoders running at once for a single batch.
pub const MAX_PARALLEL_ENCODES: usize = 4;

/// One item off a paste event. Only `image/*` items are ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardItem {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ClipboardItem {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new("text/plain", text.as_bytes().to_vec())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub added: usize,
    pub failures: Vec<RecipeError>,
}

#[derive(Debug, Default)]
pub struct PasteOutcome {
    /// True exactly when the paste carried at least one image item, in which
    /// case the host should not also paste it as text.
    pub suppress_default: bool,
    pub batch: BatchOutcome,
}

/// Encode `inputs` with up to [`MAX_PARALLEL_ENCODES`] workers and return the
/// results in input order, whatever order the workers finish in.
pub fn encode_batch_with<F>(inputs: &[RawImageInput], encoder: F) -> Vec<Result<TransportableAsset>>
where
    F: Fn(&RawImageInput) -> Result<TransportableAsset> + Sync,
{
    let encoder = &encoder;
    let mut results = Vec::with_capacity(inputs.len());
    for group in inputs.chunks(MAX_PARALLEL_ENCODES) {
        thread::scope(|scope| {
            let handles = group
                .iter()
                .map(|input| scope.spawn(move || encoder(input)))
                .collect::<Vec<_>>();
            for (input, handle) in group.iter().zip(handles) {
                let joined = handle
                    .join()
                    .unwrap_or_else(|_| Err(RecipeError::asset_decode(&input.label, "encoder panicked")));
                results.push(joined);
            }
        });
    }
    results
}

/// Pending attachments for the next generation request, in the order the
/// user supplied them. Duplicates are allowed.
#[derive(Debug, Clone, Default)]
pub struct IngestionQueue {
    assets: Vec<TransportableAsset>,
}

impl IngestionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> &[TransportableAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Owned copy for an outgoing request; later queue edits do not reach it.
    pub fn snapshot(&self) -> Vec<TransportableAsset> {
        self.assets.clone()
    }

    pub fn add_from_files(&mut self, files: &[RawImageInput]) -> BatchOutcome {
        self.add_from_files_with(files, encode)
    }

    pub fn add_from_files_with<F>(&mut self, files: &[RawImageInput], encoder: F) -> BatchOutcome
    where
        F: Fn(&RawImageInput) -> Result<TransportableAsset> + Sync,
    {
        let mut outcome = BatchOutcome::default();
        for result in encode_batch_with(files, encoder) {
            match result {
                Ok(asset) => {
                    debug!(label = %asset.label, width = asset.width, height = asset.height, "asset queued");
                    self.assets.push(asset);
                    outcome.added += 1;
                }
                Err(err) => {
                    warn!(error = %err, "dropping image from batch");
                    outcome.failures.push(err);
                }
            }
        }
        outcome
    }

    pub fn add_from_clipboard(&mut self, items: &[ClipboardItem]) -> PasteOutcome {
        self.add_from_clipboard_with(items, encode)
    }

    pub fn add_from_clipboard_with<F>(&mut self, items: &[ClipboardItem], encoder: F) -> PasteOutcome
    where
        F: Fn(&RawImageInput) -> Result<TransportableAsset> + Sync,
    {
        let images = items
            .iter()
            .filter(|item| item.is_image())
            .enumerate()
            .map(|(idx, item)| {
                RawImageInput::from_bytes(format!("clipboard-{idx} ({})", item.mime_type), item.data.clone())
            })
            .collect::<Vec<RawImageInput>>();
        if images.is_empty() {
            return PasteOutcome::default();
        }
        PasteOutcome {
            suppress_default: true,
            batch: self.add_from_files_with(&images, encoder),
        }
    }

    pub fn remove(&mut self, index: usize) -> Result<TransportableAsset> {
        if index >= self.assets.len() {
            return Err(RecipeError::InvalidIndex {
                index,
                len: self.assets.len(),
            });
        }
        Ok(self.assets.remove(index))
    }

    pub fn clear(&mut self) {
        self.assets.clear();
    }
}
