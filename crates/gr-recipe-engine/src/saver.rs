use std::path::PathBuf;

use gr_recipe_contracts::{ExportedRecipe, RecipeError, Result};

/// Host save facility for exported recipes. Returns a human-readable
/// description of where the document went.
pub trait RecipeSaver: Send + Sync {
    fn save(&self, exported: &ExportedRecipe) -> Result<String>;
}

/// Writes exports into one directory, overwriting a same-named file.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RecipeSaver for DirectorySaver {
    fn save(&self, exported: &ExportedRecipe) -> Result<String> {
        let path = self.dir.join(&exported.filename);
        let persist_err = |source: std::io::Error| RecipeError::Persist {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(persist_err)?;
        std::fs::write(&path, &exported.contents).map_err(persist_err)?;
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_saver_writes_named_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let saver = DirectorySaver::new(temp.path().join("exports"));
        let exported = ExportedRecipe {
            filename: "Neon_recipe.json".to_string(),
            contents: "{}".to_string(),
        };
        let location = saver.save(&exported)?;
        assert!(location.ends_with("Neon_recipe.json"));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("exports").join("Neon_recipe.json"))?,
            "{}"
        );
        Ok(())
    }
}
