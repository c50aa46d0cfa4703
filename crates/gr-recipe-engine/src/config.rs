use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::generation::GenerationOverrides;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_S: u64 = 60;
const MIN_TIMEOUT_S: u64 = 1;
const MAX_TIMEOUT_S: u64 = 600;

const STORE_FILE_NAME: &str = "personal_recipes.json";
const EVENTS_FILE_NAME: &str = "events.jsonl";
const RESULT_DIR_NAME: &str = "result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    #[default]
    Http,
    Dryrun,
}

impl GeneratorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Dryrun => "dryrun",
        }
    }
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "dryrun" | "dry-run" => Ok(Self::Dryrun),
            other => Err(format!("unknown generator '{other}' (expected http or dryrun)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistorySourceKind {
    #[default]
    Http,
    Local,
}

impl HistorySourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Local => "local",
        }
    }
}

impl FromStr for HistorySourceKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown history source '{other}' (expected http or local)")),
        }
    }
}

/// Everything the engine needs to wire a session: where the service lives,
/// where local state goes and which adapters to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_base: String,
    pub data_dir: PathBuf,
    pub timeout: Duration,
    pub generator: GeneratorKind,
    pub history_source: HistorySourceKind,
    pub overrides: GenerationOverrides,
    /// Where exported recipes are written. Defaults to the working directory.
    pub export_dir: PathBuf,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Blank values count as unset and
    /// unparseable selector values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_base = get("GR_RECIPE_API_BASE")
            .map(|value| normalize_api_base(&value))
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let data_dir = get("GR_RECIPE_HOME").map(PathBuf::from).unwrap_or_else(|| {
            get("HOME")
                .map(|home| PathBuf::from(home).join(".gr-recipe"))
                .unwrap_or_else(|| PathBuf::from(".gr-recipe"))
        });
        let timeout = get("GR_RECIPE_TIMEOUT_S")
            .and_then(|value| value.parse::<u64>().ok())
            .map(clamp_timeout)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_S));
        let generator = get("GR_RECIPE_GENERATOR")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let history_source = get("GR_RECIPE_HISTORY_SOURCE")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let overrides = GenerationOverrides::new(
            get("OPENAI_API_KEY"),
            get("OPENAI_BASE_URL"),
            get("OPENAI_MODEL"),
        );

        Self {
            api_base,
            data_dir,
            timeout,
            generator,
            history_source,
            overrides,
            export_dir: PathBuf::from("."),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join(EVENTS_FILE_NAME)
    }

    pub fn result_dir(&self) -> PathBuf {
        self.data_dir.join(RESULT_DIR_NAME)
    }
}

pub fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub fn clamp_timeout(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(MIN_TIMEOUT_S, MAX_TIMEOUT_S))
}
