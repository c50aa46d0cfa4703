use std::path::{Path, PathBuf};

use crate::error::{RecipeError, Result};
use crate::recipe::{parse_import_document, Recipe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub inserted: bool,
}

/// Personal recipe collection backed by one JSON file.
///
/// The file holds the whole collection as an array and is read once in
/// [`RecipeStore::open`]. Every mutation rewrites it before returning; when
/// the write fails the in-memory collection keeps its previous contents.
#[derive(Debug, Clone)]
pub struct RecipeStore {
    path: PathBuf,
    recipes: Vec<Recipe>,
}

impl RecipeStore {
    /// Load the collection from `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let recipes = read_recipes(&path)?;
        Ok(Self { path, recipes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, index: usize) -> Option<&Recipe> {
        self.recipes.get(index)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn contains(&self, recipe: &Recipe) -> bool {
        self.recipes.iter().any(|existing| existing.same_recipe(recipe))
    }

    pub fn add(&mut self, recipe: Recipe) -> Result<AddOutcome> {
        if self.contains(&recipe) {
            return Ok(AddOutcome { inserted: false });
        }
        let mut next = self.recipes.clone();
        next.push(recipe);
        self.commit(next)?;
        Ok(AddOutcome { inserted: true })
    }

    pub fn remove(&mut self, index: usize) -> Result<Recipe> {
        if index >= self.recipes.len() {
            return Err(RecipeError::InvalidIndex {
                index,
                len: self.recipes.len(),
            });
        }
        let mut next = self.recipes.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        Ok(removed)
    }

    pub fn import_from_document(&mut self, raw: &str) -> Result<AddOutcome> {
        let recipe = parse_import_document(raw)?;
        self.add(recipe)
    }

    fn commit(&mut self, next: Vec<Recipe>) -> Result<()> {
        write_recipes(&self.path, &next)?;
        self.recipes = next;
        Ok(())
    }
}

/// Where a selection lands after the entry at `removed` is deleted.
pub fn adjust_selection(selected: Option<usize>, removed: usize) -> Option<usize> {
    match selected {
        Some(index) if index == removed => None,
        Some(index) if index > removed => Some(index - 1),
        other => other,
    }
}

fn read_recipes(path: &Path) -> Result<Vec<Recipe>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

fn write_recipes(path: &Path, recipes: &[Recipe]) -> Result<()> {
    let persist_err = |source: std::io::Error| RecipeError::Persist {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(persist_err)?;
    }
    let payload = serde_json::to_string(recipes)?;
    std::fs::write(path, payload).map_err(persist_err)
}
