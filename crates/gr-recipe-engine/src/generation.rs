use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Local;
use gr_recipe_contracts::history_log::{HistoryLogDir, HistoryLogEntry};
use gr_recipe_contracts::{GlobalSettings, Parameters, Recipe, RecipeError, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::assets::TransportableAsset;
use crate::http::{endpoint, error_detail, transport_error, truncate_text, MAX_ERROR_BODY_CHARS};

/// Message shown when the service fails without a usable `detail`.
pub const GENERATION_FALLBACK_MESSAGE: &str = "Failed to generate recipe";

/// Per-request credentials and model selection forwarded to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl GenerationOverrides {
    pub fn new(api_key: Option<String>, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            api_key: non_blank(api_key),
            base_url: non_blank(base_url),
            model: non_blank(model),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.base_url.is_none() && self.model.is_none()
    }

    pub fn set_api_key(&mut self, value: Option<String>) {
        self.api_key = non_blank(value);
    }

    pub fn set_base_url(&mut self, value: Option<String>) {
        self.base_url = non_blank(value);
    }

    pub fn set_model(&mut self, value: Option<String>) {
        self.model = non_blank(value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub assets: Vec<TransportableAsset>,
    pub overrides: GenerationOverrides,
}

impl GenerateRequest {
    /// Request body for `POST /api/generate`. Optional keys are left out
    /// rather than sent as null.
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("prompt".to_string(), Value::String(self.prompt.clone()));
        if !self.assets.is_empty() {
            payload.insert(
                "images".to_string(),
                Value::Array(
                    self.assets
                        .iter()
                        .map(|asset| Value::String(asset.data_url.clone()))
                        .collect(),
                ),
            );
        }
        for (key, value) in [
            ("api_key", &self.overrides.api_key),
            ("base_url", &self.overrides.base_url),
            ("model", &self.overrides.model),
        ] {
            if let Some(value) = value {
                payload.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(payload)
    }
}

pub trait RecipeGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<Recipe>;
}

#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Box<dyn RecipeGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: RecipeGenerator + 'static>(&mut self, generator: G) {
        self.generators
            .insert(generator.name().to_string(), Box::new(generator));
    }

    pub fn get(&self, name: &str) -> Option<&dyn RecipeGenerator> {
        self.generators.get(name).map(|generator| generator.as_ref())
    }

    /// Move a generator out of the registry, typically to hand it to a session.
    pub fn take(&mut self, name: &str) -> Option<Box<dyn RecipeGenerator>> {
        self.generators.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.generators.keys().cloned().collect()
    }
}

/// Map a non-success response body onto the message the user sees.
pub fn generation_failure(body: &str) -> RecipeError {
    let message = error_detail(body)
        .map(|detail| truncate_text(&detail, MAX_ERROR_BODY_CHARS))
        .unwrap_or_else(|| GENERATION_FALLBACK_MESSAGE.to_string());
    RecipeError::Generation(message)
}

/// Calls the recipe service's generate endpoint.
pub struct HttpGenerator {
    api_base: String,
    timeout: Duration,
    http: HttpClient,
}

impl HttpGenerator {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            timeout,
            http: HttpClient::new(),
        }
    }
}

impl RecipeGenerator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Recipe> {
        let url = endpoint(&self.api_base, &["api", "generate"])?;
        debug!(%url, images = request.assets.len(), "posting generation request");
        let response = self
            .http
            .post(url.clone())
            .header("accept", "application/json")
            .json(&request.payload())
            .timeout(self.timeout)
            .send()
            .map_err(|err| transport_error("recipe generation", &url, err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| RecipeError::Transport(format!("generation response body read failed: {err}")))?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "generation service returned an error");
            return Err(generation_failure(&body));
        }
        serde_json::from_str::<Recipe>(&body).map_err(|err| {
            RecipeError::Generation(format!("service returned an unreadable recipe: {err}"))
        })
    }
}

const DRYRUN_EXPOSURES: [&str; 7] = [
    "-1.0 EV", "-0.7 EV", "-0.3 EV", "0.0 EV", "+0.3 EV", "+0.7 EV", "+1.0 EV",
];
const DRYRUN_WHITE_BALANCE: [&str; 5] = [
    "Auto",
    "Daylight (5200K)",
    "Shade",
    "Cloudy",
    "CTE",
];

/// Offline generator: the recipe is a pure function of the prompt and the
/// attached images, so the whole flow can run without a service.
#[derive(Debug, Clone, Default)]
pub struct DryrunGenerator {
    log: Option<HistoryLogDir>,
}

impl DryrunGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also file every generated recipe under `log`, as the service does.
    pub fn with_history_log(log: HistoryLogDir) -> Self {
        Self { log: Some(log) }
    }

    fn digest(request: &GenerateRequest) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(request.prompt.trim().as_bytes());
        for asset in &request.assets {
            hasher.update([0u8]);
            hasher.update(asset.data_url.as_bytes());
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    pub fn recipe_for(request: &GenerateRequest) -> Recipe {
        let digest = Self::digest(request);
        let level = |idx: usize| i32::from(digest[idx] % 9) - 4;
        let pick = |idx: usize, len: usize| usize::from(digest[idx]) % len;
        let short_id = hex::encode(&digest[..4]);
        let prompt = request.prompt.trim();

        Recipe {
            vibe_match: format!("Dryrun {}", truncate_text(prompt, 40)),
            base_mode: if digest[13] % 2 == 0 {
                "Negative Film".to_string()
            } else {
                "Positive Film".to_string()
            },
            global_settings: GlobalSettings {
                exposure_recommendation: DRYRUN_EXPOSURES[pick(9, DRYRUN_EXPOSURES.len())]
                    .to_string(),
                wb_setting: DRYRUN_WHITE_BALANCE[pick(10, DRYRUN_WHITE_BALANCE.len())].to_string(),
                wb_shift_a: i32::from(digest[11] % 15) - 7,
                wb_shift_g: i32::from(digest[12] % 15) - 7,
                hdf_recommendation: if digest[14] % 2 == 0 { "OFF" } else { "ON" }.to_string(),
            },
            parameters: Parameters {
                saturation: level(0),
                hue: level(1),
                high_low_key: level(2),
                contrast: level(3),
                contrast_highlight: level(4),
                contrast_shadow: level(5),
                sharpness: level(6),
                shading: level(7),
                clarity: level(8),
            },
            note: format!(
                "Offline recipe {short_id} derived from the prompt and {} reference image(s).",
                request.assets.len()
            ),
        }
    }
}

impl RecipeGenerator for DryrunGenerator {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Recipe> {
        let recipe = Self::recipe_for(request);
        if let Some(log) = &self.log {
            let now = Local::now();
            let entry = HistoryLogEntry::new(
                &request.prompt,
                request.assets.len(),
                self.name(),
                serde_json::to_value(&recipe)?,
                now,
            );
            match log.record(&entry, now) {
                Ok(path) => info!(path = %path.display(), "dryrun recipe recorded"),
                Err(err) => warn!(error = %err, "dryrun recipe could not be recorded"),
            }
        }
        Ok(recipe)
    }
}
