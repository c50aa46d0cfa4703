use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::recipe::Recipe;

const BUNDLED_DEMOS_JSON: &str = include_str!("../resources/demos.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "image")]
    pub image_path: String,
    #[serde(default)]
    pub description: Option<String>,
    pub recipe: Recipe,
}

/// Read-only demo table, in bundled order and keyed by item id.
#[derive(Debug, Clone, Default)]
pub struct DemoCatalog {
    items: IndexMap<String, DemoItem>,
}

impl DemoCatalog {
    /// The catalog compiled into the binary. A bundle that fails to parse is
    /// logged and yields an empty catalog.
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_DEMOS_JSON).unwrap_or_else(|err| {
            warn!(error = %err, "bundled demo catalog unreadable");
            Self::default()
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let items = serde_json::from_str::<Vec<DemoItem>>(raw)?;
        Ok(Self::from_items(items))
    }

    pub fn from_items(items: Vec<DemoItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect(),
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &DemoItem> {
        self.items.values()
    }

    pub fn get(&self, id: &str) -> Option<&DemoItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::DemoCatalog;
    use crate::error::RecipeError;

    #[test]
    fn bundled_catalog_parses_in_order() {
        let catalog = DemoCatalog::bundled();
        let ids = catalog.items().map(|item| item.id.as_str()).collect::<Vec<&str>>();
        assert_eq!(ids, vec!["demo-1", "demo-2", "demo-3", "demo-4"]);
    }

    #[test]
    fn bundled_recipes_stay_in_domain() {
        let catalog = DemoCatalog::bundled();
        assert!(!catalog.is_empty());
        for item in catalog.items() {
            assert!(item.recipe.parameters.in_domain(), "{} out of range", item.id);
            assert!(item.recipe.global_settings.hdf_enabled().is_some());
            assert!(item.recipe.base_mode_kind().is_some());
        }
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        assert!(matches!(
            DemoCatalog::from_json(r#"[{"id": "demo-1", "title": "No recipe"}]"#),
            Err(RecipeError::Json(_))
        ));
        assert!(DemoCatalog::from_json("[]").is_ok_and(|catalog| catalog.is_empty()));
    }

    #[test]
    fn lookup_by_id() {
        let catalog = DemoCatalog::bundled();
        let item = catalog.get("demo-3");
        assert_eq!(
            item.map(|item| item.recipe.vibe_match.as_str()),
            Some("Ultimate Ricoh Blue Landscape")
        );
        assert_eq!(item.map(|item| item.image_path.as_str()), Some("/demo/ricoh_posi.JPG"));
        assert!(catalog.get("demo-9").is_none());
    }
}
