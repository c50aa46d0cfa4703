pub mod commands;
pub mod demos;
pub mod error;
pub mod events;
pub mod history_log;
pub mod recipe;
pub mod store;

pub use error::{RecipeError, Result};
pub use recipe::{BaseMode, ExportedRecipe, GlobalSettings, Parameters, Recipe};
