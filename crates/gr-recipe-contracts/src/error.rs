use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecipeError>;

/// Failures shared by the store, the adapters and the session controller.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// Corrupt or unsupported image input; only the one asset is dropped.
    #[error("could not decode image '{label}': {reason}")]
    AssetDecode { label: String, reason: String },

    /// Non-success response from the generation service, surfaced verbatim.
    #[error("{0}")]
    Generation(String),

    /// A generation request is already outstanding for this session.
    #[error("a generation request is already in flight")]
    GenerationInFlight,

    #[error("prompt is empty")]
    EmptyPrompt,

    /// History detail that does not wrap a recipe under `output`.
    #[error("history entry {date}/{entry} is malformed: {reason}")]
    HistoryFetch {
        date: String,
        entry: String,
        reason: String,
    },

    #[error("history date '{0}' not found")]
    HistoryNotFound(String),

    /// Import document rejected before it reached the store.
    #[error("import rejected: {0}")]
    ImportValidation(String),

    /// The operation needs a current recipe or selection and there is none.
    #[error("nothing selected: {0}")]
    NothingSelected(String),

    #[error("no demo item with id '{0}'")]
    UnknownDemo(String),

    #[error("index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecipeError {
    pub fn asset_decode(label: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetDecode {
            label: label.into(),
            reason: reason.to_string(),
        }
    }

    pub fn history_fetch(date: &str, entry: &str, reason: impl Into<String>) -> Self {
        Self::HistoryFetch {
            date: date.to_string(),
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }
}
