pub mod assets;
pub mod config;
pub mod generation;
pub mod history;
pub mod http;
pub mod ingest;
pub mod saver;
pub mod session;

pub use assets::{encode, RawImageInput, TransportableAsset, MAX_ASSET_DIMENSION};
pub use config::{EngineConfig, GeneratorKind, HistorySourceKind};
pub use generation::{
    DryrunGenerator, GenerateRequest, GenerationOverrides, GeneratorRegistry, HttpGenerator,
    RecipeGenerator,
};
pub use history::{HistoryAdapter, HistorySource, HttpHistory};
pub use ingest::{BatchOutcome, ClipboardItem, IngestionQueue, PasteOutcome};
pub use saver::{DirectorySaver, RecipeSaver};
pub use session::{DisplayedRecipe, Notice, RecipeSource, SessionController, Tab};
