use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use gr_recipe_contracts::demos::DemoCatalog;
use gr_recipe_contracts::events::EventWriter;
use gr_recipe_contracts::history_log::HistoryLogDir;
use gr_recipe_contracts::recipe::{compare, export_recipe};
use gr_recipe_contracts::store::{adjust_selection, RecipeStore};
use gr_recipe_contracts::{Recipe, RecipeError, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::{RawImageInput, TransportableAsset};
use crate::config::{EngineConfig, HistorySourceKind};
use crate::generation::{
    DryrunGenerator, GenerateRequest, GenerationOverrides, GeneratorRegistry, HttpGenerator,
    RecipeGenerator,
};
use crate::history::{HistoryAdapter, HistorySource, HttpHistory};
use crate::ingest::{BatchOutcome, ClipboardItem, IngestionQueue, PasteOutcome};
use crate::saver::{DirectorySaver, RecipeSaver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Tab {
    #[default]
    Generate,
    Personal,
    History,
    Demo,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Generate, Tab::Personal, Tab::History, Tab::Demo];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Personal => "personal",
            Self::History => "history",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generate" | "gen" => Ok(Self::Generate),
            "personal" | "pinned" => Ok(Self::Personal),
            "history" => Ok(Self::History),
            "demo" | "demos" => Ok(Self::Demo),
            other => Err(format!(
                "unknown tab '{other}' (expected generate, personal, history or demo)"
            )),
        }
    }
}

/// Where the displayed recipe came from. Refresh dispatches on this tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeSource {
    Generated,
    History { date: String, entry: String },
    Personal { index: usize },
    Demo { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedRecipe {
    pub source: RecipeSource,
    pub recipe: Recipe,
}

/// User-facing outcome of a collection or export action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Pinned,
    AlreadyPinned,
    Unpinned { vibe_match: String },
    Imported,
    AlreadyImported,
    Exported { filename: String, location: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pinned => f.write_str("Pinned to personal recipes."),
            Self::AlreadyPinned => f.write_str("Already in personal recipes."),
            Self::Unpinned { vibe_match } => write!(f, "Removed '{vibe_match}' from personal recipes."),
            Self::Imported => f.write_str("Recipe imported."),
            Self::AlreadyImported => f.write_str("Recipe already in personal recipes."),
            Self::Exported { filename, location } => write!(f, "Exported {filename} to {location}."),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryState {
    pub dates: Vec<String>,
    pub selected_date: Option<String>,
    pub date_entries: Vec<String>,
    pub selected_entry: Option<String>,
    pub selected_recipe: Option<Recipe>,
}

impl HistoryState {
    fn clear_detail(&mut self) {
        self.selected_entry = None;
        self.selected_recipe = None;
    }
}

/// An accepted generation submit. Holds the request snapshot and the recipe
/// that was displayed before, which comes back if the call fails.
#[derive(Debug)]
pub struct GenerationTicket {
    request: GenerateRequest,
    previous: Option<Recipe>,
}

impl GenerationTicket {
    pub fn request(&self) -> &GenerateRequest {
        &self.request
    }
}

/// Owns the active tab and every tab's selection, and routes user actions to
/// the store and the source adapters.
pub struct SessionController {
    generator: Box<dyn RecipeGenerator>,
    history: HistoryAdapter,
    store: RecipeStore,
    demos: DemoCatalog,
    saver: Box<dyn RecipeSaver>,
    events: EventWriter,
    overrides: GenerationOverrides,
    active_tab: Tab,
    history_state: HistoryState,
    selected_personal: Option<usize>,
    selected_demo: Option<String>,
    pending_assets: IngestionQueue,
    last_generated: Option<Recipe>,
    loading: bool,
    last_errors: BTreeMap<Tab, String>,
}

impl SessionController {
    pub fn new(
        generator: Box<dyn RecipeGenerator>,
        history: HistoryAdapter,
        store: RecipeStore,
        demos: DemoCatalog,
        saver: Box<dyn RecipeSaver>,
        events: EventWriter,
    ) -> Self {
        let session = Self {
            generator,
            history,
            store,
            demos,
            saver,
            events,
            overrides: GenerationOverrides::default(),
            active_tab: Tab::default(),
            history_state: HistoryState::default(),
            selected_personal: None,
            selected_demo: None,
            pending_assets: IngestionQueue::new(),
            last_generated: None,
            loading: false,
            last_errors: BTreeMap::new(),
        };
        session.record_event(
            "session_started",
            json!({
                "generator": session.generator.name(),
                "history_source": session.history.source_name(),
                "personal_count": session.store.len(),
            }),
        );
        session
    }

    /// Wire a session from resolved configuration: open the personal store,
    /// pick the generator and history source, and start the event trail.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = RecipeStore::open(config.store_path())?;
        let result_log = HistoryLogDir::new(config.result_dir());

        let mut generators = GeneratorRegistry::new();
        generators.register(HttpGenerator::new(config.api_base.clone(), config.timeout));
        generators.register(DryrunGenerator::with_history_log(result_log.clone()));
        let generator = generators.take(config.generator.as_str()).ok_or_else(|| {
            RecipeError::Generation(format!(
                "generator '{}' is not available (known: {})",
                config.generator.as_str(),
                generators.names().join(", ")
            ))
        })?;

        let history_source: Box<dyn HistorySource> = match config.history_source {
            HistorySourceKind::Http => Box::new(HttpHistory::new(config.api_base.clone(), config.timeout)),
            HistorySourceKind::Local => Box::new(result_log),
        };
        let events = EventWriter::new(config.events_path(), Uuid::new_v4().to_string());

        let mut session = Self::new(
            generator,
            HistoryAdapter::new(history_source),
            store,
            DemoCatalog::bundled(),
            Box::new(DirectorySaver::new(config.export_dir.clone())),
            events,
        );
        session.overrides = config.overrides.clone();
        Ok(session)
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn history_state(&self) -> &HistoryState {
        &self.history_state
    }

    pub fn selected_personal(&self) -> Option<usize> {
        self.selected_personal
    }

    pub fn selected_demo(&self) -> Option<&str> {
        self.selected_demo.as_deref()
    }

    pub fn pending_assets(&self) -> &IngestionQueue {
        &self.pending_assets
    }

    pub fn last_generated(&self) -> Option<&Recipe> {
        self.last_generated.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self, tab: Tab) -> Option<&str> {
        self.last_errors.get(&tab).map(String::as_str)
    }

    pub fn store(&self) -> &RecipeStore {
        &self.store
    }

    pub fn demos(&self) -> &DemoCatalog {
        &self.demos
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn overrides(&self) -> &GenerationOverrides {
        &self.overrides
    }

    pub fn set_api_key(&mut self, value: Option<String>) {
        self.overrides.set_api_key(value);
    }

    pub fn set_base_url(&mut self, value: Option<String>) {
        self.overrides.set_base_url(value);
    }

    pub fn set_model(&mut self, value: Option<String>) {
        self.overrides.set_model(value);
    }

    pub fn switch_tab(&mut self, target: Tab) {
        for tab in Tab::ALL.into_iter().filter(|tab| *tab != target) {
            match tab {
                Tab::History => self.history_state.clear_detail(),
                Tab::Personal => self.selected_personal = None,
                Tab::Demo => self.selected_demo = None,
                Tab::Generate => {}
            }
        }
        self.active_tab = target;
        self.record_event("tab_switched", json!({ "tab": target.as_str() }));
        if target == Tab::History && self.history_state.dates.is_empty() {
            self.load_history_dates();
        }
    }

    /// Refresh the date list. Never fails: an unreachable source leaves the
    /// previously known dates in place.
    pub fn load_history_dates(&mut self) -> &[String] {
        self.history_state.dates = self.history.list_dates();
        debug!(count = self.history_state.dates.len(), "history dates loaded");
        &self.history_state.dates
    }

    /// Toggle a history date. Choosing the selected date again closes it.
    pub fn select_history_date(&mut self, date: &str) -> Result<()> {
        self.history_state.clear_detail();
        if self.history_state.selected_date.as_deref() == Some(date) {
            self.history_state.selected_date = None;
            self.history_state.date_entries.clear();
            return Ok(());
        }

        self.history_state.selected_date = Some(date.to_string());
        self.history_state.date_entries.clear();
        match self.history.list_entries(date) {
            Ok(entries) => {
                self.history_state.date_entries = entries;
                self.last_errors.remove(&Tab::History);
                Ok(())
            }
            Err(err) => {
                warn!(date, error = %err, "history entries unavailable");
                self.history_state.selected_date = None;
                self.last_errors.insert(Tab::History, err.to_string());
                Err(err)
            }
        }
    }

    pub fn select_history_entry(&mut self, entry: &str) -> Result<&Recipe> {
        let Some(date) = self.history_state.selected_date.clone() else {
            return Err(RecipeError::NothingSelected(
                "choose a history date first".to_string(),
            ));
        };
        self.history_state.selected_entry = Some(entry.to_string());
        self.history_state.selected_recipe = None;
        match self.history.fetch_detail(&date, entry) {
            Ok(recipe) => {
                self.last_errors.remove(&Tab::History);
                Ok(self.history_state.selected_recipe.insert(recipe))
            }
            Err(err) => Err(self.history_fetch_failed(&date, entry, err)),
        }
    }

    fn history_fetch_failed(&mut self, date: &str, entry: &str, err: RecipeError) -> RecipeError {
        warn!(date, entry, error = %err, "history detail fetch failed");
        self.last_errors.insert(Tab::History, err.to_string());
        self.record_event(
            "history_fetch_failed",
            json!({ "date": date, "entry": entry, "error": err.to_string() }),
        );
        err
    }

    pub fn select_personal(&mut self, index: usize) -> Result<&Recipe> {
        let recipe = self.store.get(index).ok_or(RecipeError::InvalidIndex {
            index,
            len: self.store.len(),
        })?;
        self.selected_personal = Some(index);
        Ok(recipe)
    }

    pub fn select_demo(&mut self, id: &str) -> Result<&Recipe> {
        let item = self
            .demos
            .get(id)
            .ok_or_else(|| RecipeError::UnknownDemo(id.to_string()))?;
        self.selected_demo = Some(item.id.clone());
        Ok(&item.recipe)
    }

    pub fn add_files(&mut self, paths: &[PathBuf]) -> BatchOutcome {
        let mut failures = Vec::new();
        let inputs = paths
            .iter()
            .filter_map(|path| match RawImageInput::from_path(path) {
                Ok(input) => Some(input),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable image");
                    failures.push(err);
                    None
                }
            })
            .collect::<Vec<RawImageInput>>();
        let mut outcome = self.pending_assets.add_from_files(&inputs);
        failures.append(&mut outcome.failures);
        outcome.failures = failures;
        self.assets_added(&outcome, "files");
        outcome
    }

    pub fn add_inputs(&mut self, inputs: &[RawImageInput]) -> BatchOutcome {
        let outcome = self.pending_assets.add_from_files(inputs);
        self.assets_added(&outcome, "files");
        outcome
    }

    pub fn paste(&mut self, items: &[ClipboardItem]) -> PasteOutcome {
        let outcome = self.pending_assets.add_from_clipboard(items);
        if outcome.suppress_default {
            self.assets_added(&outcome.batch, "clipboard");
        }
        outcome
    }

    fn assets_added(&self, outcome: &BatchOutcome, origin: &str) {
        self.record_event(
            "assets_added",
            json!({
                "origin": origin,
                "added": outcome.added,
                "failed": outcome.failures.len(),
                "pending": self.pending_assets.len(),
            }),
        );
    }

    pub fn remove_asset(&mut self, index: usize) -> Result<TransportableAsset> {
        self.pending_assets.remove(index)
    }

    pub fn clear_assets(&mut self) {
        self.pending_assets.clear();
    }

    /// Accept a prompt for generation. Only one submit may be outstanding;
    /// the displayed generated recipe is cleared until the call finishes.
    pub fn begin_generation(&mut self, prompt: &str) -> Result<GenerationTicket> {
        if self.loading {
            return Err(RecipeError::GenerationInFlight);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(RecipeError::EmptyPrompt);
        }
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            assets: self.pending_assets.snapshot(),
            overrides: self.overrides.clone(),
        };
        self.loading = true;
        self.last_errors.remove(&Tab::Generate);
        self.record_event(
            "generation_started",
            json!({
                "generator": self.generator.name(),
                "prompt": request.prompt,
                "image_count": request.assets.len(),
            }),
        );
        Ok(GenerationTicket {
            request,
            previous: self.last_generated.take(),
        })
    }

    pub fn run_generation(&self, ticket: &GenerationTicket) -> Result<Recipe> {
        self.generator.generate(&ticket.request)
    }

    /// Settle a submit. On failure the previous recipe is restored and the
    /// message is kept as the generate tab's last error.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        outcome: Result<Recipe>,
    ) -> Result<Recipe> {
        self.loading = false;
        match outcome {
            Ok(recipe) => {
                info!(vibe_match = %recipe.vibe_match, "recipe generated");
                self.record_event(
                    "generation_finished",
                    json!({ "vibe_match": recipe.vibe_match, "in_domain": recipe.parameters.in_domain() }),
                );
                self.last_generated = Some(recipe.clone());
                Ok(recipe)
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                self.last_generated = ticket.previous;
                self.last_errors.insert(Tab::Generate, err.to_string());
                self.record_event("generation_failed", json!({ "error": err.to_string() }));
                Err(err)
            }
        }
    }

    pub fn generate(&mut self, prompt: &str) -> Result<Recipe> {
        let ticket = self.begin_generation(prompt)?;
        let outcome = self.run_generation(&ticket);
        self.finish_generation(ticket, outcome)
    }

    /// The recipe shown for the active tab, if any, tagged with its source.
    pub fn current_recipe(&self) -> Option<DisplayedRecipe> {
        match self.active_tab {
            Tab::Generate => self.last_generated.as_ref().map(|recipe| DisplayedRecipe {
                source: RecipeSource::Generated,
                recipe: recipe.clone(),
            }),
            Tab::History => {
                let state = &self.history_state;
                match (&state.selected_date, &state.selected_entry, &state.selected_recipe) {
                    (Some(date), Some(entry), Some(recipe)) => Some(DisplayedRecipe {
                        source: RecipeSource::History {
                            date: date.clone(),
                            entry: entry.clone(),
                        },
                        recipe: recipe.clone(),
                    }),
                    _ => None,
                }
            }
            Tab::Personal => {
                let index = self.selected_personal?;
                self.store.get(index).map(|recipe| DisplayedRecipe {
                    source: RecipeSource::Personal { index },
                    recipe: recipe.clone(),
                })
            }
            Tab::Demo => {
                let id = self.selected_demo.as_deref()?;
                self.demos.get(id).map(|item| DisplayedRecipe {
                    source: RecipeSource::Demo { id: item.id.clone() },
                    recipe: item.recipe.clone(),
                })
            }
        }
    }

    fn require_current(&self) -> Result<DisplayedRecipe> {
        self.current_recipe().ok_or_else(|| {
            RecipeError::NothingSelected(format!("no recipe displayed on the {} tab", self.active_tab))
        })
    }

    /// Re-read the displayed recipe from its own source.
    pub fn refresh_current(&mut self) -> Result<Option<DisplayedRecipe>> {
        let Some(current) = self.current_recipe() else {
            return Ok(None);
        };
        match current.source {
            RecipeSource::Generated => Ok(Some(current)),
            RecipeSource::History { date, entry } => match self.history.fetch_detail(&date, &entry) {
                Ok(recipe) => {
                    self.history_state.selected_recipe = Some(recipe.clone());
                    Ok(Some(DisplayedRecipe {
                        source: RecipeSource::History { date, entry },
                        recipe,
                    }))
                }
                Err(err) => {
                    self.history_state.selected_recipe = None;
                    Err(self.history_fetch_failed(&date, &entry, err))
                }
            },
            RecipeSource::Personal { index } => Ok(self.store.get(index).map(|recipe| DisplayedRecipe {
                source: RecipeSource::Personal { index },
                recipe: recipe.clone(),
            })),
            RecipeSource::Demo { id } => Ok(self.demos.get(&id).map(|item| DisplayedRecipe {
                source: RecipeSource::Demo { id: id.clone() },
                recipe: item.recipe.clone(),
            })),
        }
    }

    pub fn pin(&mut self, recipe: Recipe) -> Result<Notice> {
        let vibe_match = recipe.vibe_match.clone();
        if !self.store.add(recipe)?.inserted {
            return Ok(Notice::AlreadyPinned);
        }
        self.record_event(
            "recipe_pinned",
            json!({ "vibe_match": vibe_match, "personal_count": self.store.len() }),
        );
        Ok(Notice::Pinned)
    }

    pub fn pin_current(&mut self) -> Result<Notice> {
        let current = self.require_current()?;
        self.pin(current.recipe)
    }

    pub fn unpin(&mut self, index: usize) -> Result<Notice> {
        let removed = self.store.remove(index)?;
        self.selected_personal = adjust_selection(self.selected_personal, index);
        self.record_event(
            "recipe_unpinned",
            json!({ "vibe_match": removed.vibe_match, "index": index }),
        );
        Ok(Notice::Unpinned {
            vibe_match: removed.vibe_match,
        })
    }

    pub fn import_document(&mut self, raw: &str) -> Result<Notice> {
        let outcome = self.store.import_from_document(raw).map_err(|err| {
            warn!(error = %err, "recipe import rejected");
            err
        })?;
        if !outcome.inserted {
            return Ok(Notice::AlreadyImported);
        }
        self.record_event(
            "recipe_imported",
            json!({ "personal_count": self.store.len() }),
        );
        Ok(Notice::Imported)
    }

    pub fn download(&self, recipe: &Recipe) -> Result<Notice> {
        let exported = export_recipe(recipe)?;
        let location = self.saver.save(&exported)?;
        self.record_event(
            "recipe_exported",
            json!({ "filename": exported.filename, "location": location }),
        );
        Ok(Notice::Exported {
            filename: exported.filename,
            location,
        })
    }

    pub fn download_current(&self) -> Result<Notice> {
        let current = self.require_current()?;
        self.download(&current.recipe)
    }

    /// Line diff from the displayed recipe to personal entry `index`.
    pub fn compare_with_personal(&self, index: usize) -> Result<Vec<String>> {
        let current = self.require_current()?;
        let other = self.store.get(index).ok_or(RecipeError::InvalidIndex {
            index,
            len: self.store.len(),
        })?;
        compare(&current.recipe, other)
    }

    fn record_event(&self, event_type: &str, payload: Value) {
        if let Err(err) = self.events.emit(event_type, payload) {
            let message = format!("{err:#}");
            warn!(event_type, error = %message, "event log write failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    use gr_recipe_contracts::recipe::export_filename;
    use gr_recipe_contracts::{GlobalSettings, Parameters};
    use tempfile::TempDir;

    use super::*;
    use crate::assets::tests::png_bytes;
    use crate::history::tests::FakeHistory;

    pub(crate) fn sample_recipe(vibe_match: &str, saturation: i32) -> Recipe {
        Recipe {
            vibe_match: vibe_match.to_string(),
            base_mode: "Positive Film".to_string(),
            global_settings: GlobalSettings {
                exposure_recommendation: "-0.3 EV".to_string(),
                wb_setting: "Daylight (5200K)".to_string(),
                wb_shift_a: -2,
                wb_shift_g: 1,
                hdf_recommendation: "OFF".to_string(),
            },
            parameters: Parameters {
                saturation,
                hue: -1,
                high_low_key: -1,
                contrast: 1,
                contrast_highlight: -2,
                contrast_shadow: -1,
                sharpness: 2,
                shading: -1,
                clarity: 1,
            },
            note: "Teal shadows with magenta highlights.".to_string(),
        }
    }

    /// Hands out queued outcomes in order and records every request.
    #[derive(Clone, Default)]
    struct FakeGenerator {
        outcomes: Arc<Mutex<VecDeque<std::result::Result<Recipe, String>>>>,
        seen: Arc<Mutex<Vec<GenerateRequest>>>,
    }

    impl FakeGenerator {
        fn returning(outcomes: Vec<std::result::Result<Recipe, String>>) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.into())),
                seen: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    impl RecipeGenerator for FakeGenerator {
        fn name(&self) -> &str {
            "fake"
        }

        fn generate(&self, request: &GenerateRequest) -> Result<Recipe> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.clone());
            }
            let next = self
                .outcomes
                .lock()
                .ok()
                .and_then(|mut outcomes| outcomes.pop_front());
            match next {
                Some(Ok(recipe)) => Ok(recipe),
                Some(Err(message)) => Err(RecipeError::Generation(message)),
                None => Err(RecipeError::Generation("no outcome queued".to_string())),
            }
        }
    }

    struct Harness {
        temp: TempDir,
        session: SessionController,
        generator: FakeGenerator,
    }

    fn harness(outcomes: Vec<std::result::Result<Recipe, String>>, history: FakeHistory) -> anyhow::Result<Harness> {
        let temp = tempfile::tempdir()?;
        let generator = FakeGenerator::returning(outcomes);
        let session = SessionController::new(
            Box::new(generator.clone()),
            HistoryAdapter::new(Box::new(history)),
            RecipeStore::open(temp.path().join("personal_recipes.json"))?,
            DemoCatalog::bundled(),
            Box::new(DirectorySaver::new(temp.path().join("exports"))),
            EventWriter::new(temp.path().join("events.jsonl"), "test-session"),
        );
        Ok(Harness {
            temp,
            session,
            generator,
        })
    }

    fn history_with_two_days() -> anyhow::Result<FakeHistory> {
        Ok(FakeHistory::default()
            .with_entry(
                "2026-03-04",
                "Neon_Rain.json",
                json!({"output": serde_json::to_value(sample_recipe("Neon Rain", 3))?}),
            )
            .with_entry(
                "2026-03-04",
                "Broken.json",
                json!({"user_input": "no output here"}),
            )
            .with_entry(
                "2026-03-01",
                "Harbor.json",
                json!({"output": serde_json::to_value(sample_recipe("Harbor", -1))?}),
            ))
    }

    #[test]
    fn rainy_neon_city_generate_pin_and_export() -> anyhow::Result<()> {
        let mut h = harness(
            vec![Ok(sample_recipe("Rainy Neon City (Teal/Magenta)", 2))],
            FakeHistory::default(),
        )?;

        let recipe = h.session.generate("rainy neon city")?;
        assert_eq!(recipe.parameters.saturation, 2);
        let requests = h.generator.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].assets.is_empty());
        assert_eq!(requests[0].prompt, "rainy neon city");

        let current = h.session.current_recipe();
        assert_eq!(current.as_ref().map(|shown| &shown.source), Some(&RecipeSource::Generated));

        assert_eq!(h.session.pin_current()?, Notice::Pinned);
        assert_eq!(h.session.pin_current()?, Notice::AlreadyPinned);
        assert_eq!(h.session.store().len(), 1);

        let Notice::Exported { filename, location } = h.session.download_current()? else {
            anyhow::bail!("expected an export notice");
        };
        let sanitized = export_filename("Rainy Neon City (Teal/Magenta)");
        assert_eq!(filename, sanitized);
        assert!(filename.starts_with("Rainy_Neon_City__Teal_Magenta_"));
        assert!(filename.ends_with("_recipe.json"));
        let saved: Recipe = serde_json::from_str(&std::fs::read_to_string(&location)?)?;
        assert_eq!(saved, recipe);
        Ok(())
    }

    #[test]
    fn second_submit_while_loading_is_rejected() -> anyhow::Result<()> {
        let mut h = harness(vec![Ok(sample_recipe("A", 0))], FakeHistory::default())?;
        let ticket = h.session.begin_generation("first")?;
        assert!(h.session.is_loading());
        assert!(matches!(
            h.session.begin_generation("second"),
            Err(RecipeError::GenerationInFlight)
        ));

        let outcome = h.session.run_generation(&ticket);
        h.session.finish_generation(ticket, outcome)?;
        assert!(!h.session.is_loading());
        assert_eq!(h.generator.requests().len(), 1);
        Ok(())
    }

    #[test]
    fn failed_generation_rolls_back_to_previous_recipe() -> anyhow::Result<()> {
        let mut h = harness(
            vec![
                Ok(sample_recipe("Kept", 1)),
                Err("API Key not provided and not found in environment.".to_string()),
            ],
            FakeHistory::default(),
        )?;
        h.session.add_inputs(&[RawImageInput::from_bytes("ref.png", png_bytes(20, 20))]);
        h.session.generate("first look")?;

        let err = h.session.generate("second look").err();
        assert!(matches!(err, Some(RecipeError::Generation(_))));
        assert_eq!(h.session.last_generated().map(|r| r.vibe_match.as_str()), Some("Kept"));
        assert_eq!(
            h.session.last_error(Tab::Generate),
            Some("API Key not provided and not found in environment.")
        );
        assert!(!h.session.is_loading());
        assert_eq!(h.session.pending_assets().len(), 1);
        assert_eq!(h.generator.requests()[1].assets.len(), 1);
        Ok(())
    }

    #[test]
    fn blank_prompt_is_rejected_without_a_request() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), FakeHistory::default())?;
        assert!(matches!(h.session.generate("   "), Err(RecipeError::EmptyPrompt)));
        assert!(!h.session.is_loading());
        assert!(h.generator.requests().is_empty());
        Ok(())
    }

    #[test]
    fn history_date_toggle_returns_to_prior_state() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), history_with_two_days()?)?;
        h.session.switch_tab(Tab::History);
        assert_eq!(h.session.history_state().dates, vec!["2026-03-04", "2026-03-01"]);
        let before = h.session.history_state().clone();

        h.session.select_history_date("2026-03-04")?;
        assert_eq!(
            h.session.history_state().date_entries,
            vec!["Broken.json", "Neon_Rain.json"]
        );
        h.session.select_history_entry("Neon_Rain.json")?;
        h.session.select_history_date("2026-03-04")?;
        assert_eq!(h.session.history_state(), &before);
        Ok(())
    }

    #[test]
    fn choosing_another_date_closes_open_detail() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), history_with_two_days()?)?;
        h.session.switch_tab(Tab::History);
        h.session.select_history_date("2026-03-04")?;
        h.session.select_history_entry("Neon_Rain.json")?;

        h.session.select_history_date("2026-03-01")?;
        let state = h.session.history_state();
        assert_eq!(state.selected_date.as_deref(), Some("2026-03-01"));
        assert_eq!(state.date_entries, vec!["Harbor.json"]);
        assert!(state.selected_recipe.is_none());
        assert!(h.session.current_recipe().is_none());
        Ok(())
    }

    #[test]
    fn malformed_history_entry_leaves_detail_empty() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), history_with_two_days()?)?;
        h.session.switch_tab(Tab::History);
        h.session.select_history_date("2026-03-04")?;

        assert!(matches!(
            h.session.select_history_entry("Broken.json"),
            Err(RecipeError::HistoryFetch { .. })
        ));
        let state = h.session.history_state();
        assert!(state.selected_recipe.is_none());
        assert_eq!(state.dates.len(), 2);
        assert_eq!(state.date_entries.len(), 2);
        assert!(h.session.last_error(Tab::History).is_some());
        assert!(h.session.last_error(Tab::Generate).is_none());

        let trail = std::fs::read_to_string(h.temp.path().join("events.jsonl"))?;
        assert!(trail.contains("\"history_fetch_failed\""));
        Ok(())
    }

    #[test]
    fn failed_entry_listing_can_be_retried() -> anyhow::Result<()> {
        let history = history_with_two_days()?;
        history.entry_failures.store(1, Ordering::SeqCst);
        let mut h = harness(Vec::new(), history)?;
        h.session.switch_tab(Tab::History);

        assert!(matches!(
            h.session.select_history_date("2026-03-04"),
            Err(RecipeError::Transport(_))
        ));
        assert!(h.session.history_state().selected_date.is_none());
        assert!(h.session.history_state().date_entries.is_empty());
        assert!(h.session.last_error(Tab::History).is_some());

        h.session.select_history_date("2026-03-04")?;
        let state = h.session.history_state();
        assert_eq!(state.selected_date.as_deref(), Some("2026-03-04"));
        assert_eq!(state.date_entries, vec!["Broken.json", "Neon_Rain.json"]);
        assert!(h.session.last_error(Tab::History).is_none());
        Ok(())
    }

    #[test]
    fn entry_selection_needs_a_date() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), history_with_two_days()?)?;
        assert!(matches!(
            h.session.select_history_entry("Neon_Rain.json"),
            Err(RecipeError::NothingSelected(_))
        ));
        Ok(())
    }

    #[test]
    fn offline_history_keeps_dates_empty() -> anyhow::Result<()> {
        let history = FakeHistory::default();
        history.offline.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut h = harness(Vec::new(), history)?;
        h.session.switch_tab(Tab::History);
        assert!(h.session.history_state().dates.is_empty());
        Ok(())
    }

    #[test]
    fn switching_tabs_clears_other_detail_but_keeps_lists() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), history_with_two_days()?)?;
        h.session.pin(sample_recipe("Mine", 1))?;

        h.session.switch_tab(Tab::History);
        h.session.select_history_date("2026-03-04")?;
        h.session.select_history_entry("Neon_Rain.json")?;
        assert_eq!(
            h.session.current_recipe().map(|shown| shown.source),
            Some(RecipeSource::History {
                date: "2026-03-04".to_string(),
                entry: "Neon_Rain.json".to_string(),
            })
        );

        h.session.switch_tab(Tab::Personal);
        h.session.select_personal(0)?;
        let state = h.session.history_state();
        assert!(state.selected_entry.is_none());
        assert!(state.selected_recipe.is_none());
        assert_eq!(state.selected_date.as_deref(), Some("2026-03-04"));
        assert_eq!(state.date_entries.len(), 2);
        assert_eq!(state.dates.len(), 2);

        h.session.switch_tab(Tab::Demo);
        assert_eq!(h.session.selected_personal(), None);
        h.session.select_demo("demo-3")?;
        assert_eq!(
            h.session.current_recipe().map(|shown| shown.recipe.vibe_match),
            Some("Ultimate Ricoh Blue Landscape".to_string())
        );

        h.session.switch_tab(Tab::Generate);
        assert_eq!(h.session.selected_demo(), None);
        assert!(h.session.current_recipe().is_none());
        assert_eq!(h.session.active_tab(), Tab::Generate);
        Ok(())
    }

    #[test]
    fn unknown_demo_is_rejected() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), FakeHistory::default())?;
        assert!(matches!(
            h.session.select_demo("demo-42"),
            Err(RecipeError::UnknownDemo(_))
        ));
        assert_eq!(h.session.selected_demo(), None);
        Ok(())
    }

    #[test]
    fn unpin_keeps_selection_on_the_same_recipe() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), FakeHistory::default())?;
        for name in ["A", "B", "C"] {
            h.session.pin(sample_recipe(name, 0))?;
        }
        h.session.switch_tab(Tab::Personal);
        h.session.select_personal(2)?;

        assert_eq!(
            h.session.unpin(0)?,
            Notice::Unpinned {
                vibe_match: "A".to_string()
            }
        );
        assert_eq!(h.session.selected_personal(), Some(1));
        assert_eq!(
            h.session.current_recipe().map(|shown| shown.recipe.vibe_match),
            Some("C".to_string())
        );

        h.session.unpin(1)?;
        assert_eq!(h.session.selected_personal(), None);
        assert!(matches!(
            h.session.unpin(7),
            Err(RecipeError::InvalidIndex { index: 7, len: 1 })
        ));
        Ok(())
    }

    #[test]
    fn import_reports_duplicates_and_rejections() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), FakeHistory::default())?;
        let document = export_recipe(&sample_recipe("Imported", 2))?.contents;

        assert_eq!(h.session.import_document(&document)?, Notice::Imported);
        assert_eq!(h.session.import_document(&document)?, Notice::AlreadyImported);
        assert!(matches!(
            h.session.import_document(r#"{"vibe_match": "x"}"#),
            Err(RecipeError::ImportValidation(_))
        ));
        assert_eq!(h.session.store().len(), 1);
        assert_eq!(RecipeStore::open(h.temp.path().join("personal_recipes.json"))?.len(), 1);
        Ok(())
    }

    #[test]
    fn refresh_dispatches_on_source() -> anyhow::Result<()> {
        let mut h = harness(vec![Ok(sample_recipe("Fresh", 1))], history_with_two_days()?)?;
        assert_eq!(h.session.refresh_current()?, None);

        h.session.generate("fresh")?;
        assert_eq!(
            h.session.refresh_current()?.map(|shown| shown.recipe.vibe_match),
            Some("Fresh".to_string())
        );

        h.session.switch_tab(Tab::History);
        h.session.select_history_date("2026-03-01")?;
        h.session.select_history_entry("Harbor.json")?;
        let refreshed = h.session.refresh_current()?;
        assert_eq!(
            refreshed.map(|shown| shown.recipe),
            Some(sample_recipe("Harbor", -1))
        );

        h.session.switch_tab(Tab::Demo);
        h.session.select_demo("demo-1")?;
        assert!(matches!(
            h.session.refresh_current()?.map(|shown| shown.source),
            Some(RecipeSource::Demo { .. })
        ));
        Ok(())
    }

    #[test]
    fn compare_and_export_need_a_displayed_recipe() -> anyhow::Result<()> {
        let mut h = harness(Vec::new(), FakeHistory::default())?;
        h.session.pin(sample_recipe("Base", 1))?;
        assert!(matches!(
            h.session.compare_with_personal(0),
            Err(RecipeError::NothingSelected(_))
        ));
        assert!(matches!(
            h.session.download_current(),
            Err(RecipeError::NothingSelected(_))
        ));

        h.session.switch_tab(Tab::Demo);
        h.session.select_demo("demo-2")?;
        let diff = h.session.compare_with_personal(0)?;
        assert!(diff.iter().any(|line| line.starts_with('-')));
        assert!(diff.iter().any(|line| line.starts_with('+')));
        Ok(())
    }

    #[test]
    fn assets_flow_through_the_session() -> anyhow::Result<()> {
        let mut h = harness(vec![Ok(sample_recipe("With refs", 0))], FakeHistory::default())?;
        let path = h.temp.path().join("ref.png");
        std::fs::write(&path, png_bytes(1200, 600))?;

        let outcome = h.session.add_files(&[path, h.temp.path().join("missing.png")]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.failures.len(), 1);
        let pasted = h.session.paste(&[
            ClipboardItem::text("caption"),
            ClipboardItem::new("image/png", png_bytes(40, 40)),
        ]);
        assert!(pasted.suppress_default);
        assert_eq!(h.session.pending_assets().len(), 2);
        assert_eq!(h.session.pending_assets().assets()[0].width, 768);

        h.session.remove_asset(0)?;
        h.session.generate("with refs")?;
        assert_eq!(h.generator.requests()[0].assets.len(), 1);
        h.session.clear_assets();
        assert!(h.session.pending_assets().is_empty());
        Ok(())
    }

    #[test]
    fn overrides_travel_with_the_request() -> anyhow::Result<()> {
        let mut h = harness(vec![Ok(sample_recipe("A", 0))], FakeHistory::default())?;
        h.session.set_model(Some("gpt-4o-mini".to_string()));
        h.session.set_api_key(Some(" ".to_string()));
        h.session.generate("x")?;
        let overrides = &h.generator.requests()[0].overrides;
        assert_eq!(overrides.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(overrides.api_key, None);
        Ok(())
    }

    #[test]
    fn session_trail_records_actions() -> anyhow::Result<()> {
        let mut h = harness(vec![Ok(sample_recipe("A", 0))], FakeHistory::default())?;
        h.session.generate("x")?;
        h.session.pin_current()?;

        let trail = std::fs::read_to_string(h.temp.path().join("events.jsonl"))?;
        let types = trail
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<std::result::Result<Vec<Value>, _>>()?
            .into_iter()
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect::<Vec<String>>();
        assert_eq!(
            types,
            vec![
                "session_started",
                "generation_started",
                "generation_finished",
                "recipe_pinned"
            ]
        );
        Ok(())
    }

    #[test]
    fn dryrun_local_session_from_config() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let home = temp.path().join("home");
        let vars = BTreeMap::from([
            ("GR_RECIPE_HOME".to_string(), home.display().to_string()),
            ("GR_RECIPE_GENERATOR".to_string(), "dryrun".to_string()),
            ("GR_RECIPE_HISTORY_SOURCE".to_string(), "local".to_string()),
        ]);
        let mut config = EngineConfig::from_lookup(|key| vars.get(key).cloned());
        config.export_dir = temp.path().join("exports");

        let mut session = SessionController::from_config(&config)?;
        assert_eq!(session.generator_name(), "dryrun");
        let recipe = session.generate("foggy harbor at dawn")?;

        session.switch_tab(Tab::History);
        let date = session.history_state().dates.first().cloned().unwrap_or_default();
        session.select_history_date(&date)?;
        let entry = session
            .history_state()
            .date_entries
            .first()
            .cloned()
            .unwrap_or_default();
        assert_eq!(session.select_history_entry(&entry)?, &recipe);

        assert_eq!(session.pin_current()?, Notice::Pinned);
        assert!(config.store_path().is_file());
        assert!(config.events_path().is_file());
        Ok(())
    }
}
