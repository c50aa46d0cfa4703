use gr_recipe_contracts::recipe::PARAMETER_RANGE;
use gr_recipe_contracts::Recipe;
use gr_recipe_engine::{DisplayedRecipe, RecipeSource};

const LABEL_WIDTH: usize = 22;

/// `+2`, `0`, `-3`.
pub fn signed(value: i32) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

/// Nine-step indicator for a -4..=4 value. Out-of-range values pin to the
/// nearest end and are flagged with `!`.
pub fn level_bar(value: i32) -> String {
    let (low, high) = (*PARAMETER_RANGE.start(), *PARAMETER_RANGE.end());
    let marker = value.clamp(low, high);
    let mut bar = (low..=high)
        .map(|step| {
            if step == marker {
                '#'
            } else if step == 0 {
                '|'
            } else {
                '-'
            }
        })
        .collect::<String>();
    if marker != value {
        bar.push('!');
    }
    format!("[{bar}]")
}

pub fn source_label(source: &RecipeSource) -> String {
    match source {
        RecipeSource::Generated => "generated".to_string(),
        RecipeSource::History { date, entry } => format!("history {date}/{entry}"),
        RecipeSource::Personal { index } => format!("personal #{index}"),
        RecipeSource::Demo { id } => format!("demo {id}"),
    }
}

pub fn render_recipe(recipe: &Recipe) -> String {
    let settings = &recipe.global_settings;
    let base_mode = recipe
        .base_mode_kind()
        .map(|mode| mode.label().to_string())
        .unwrap_or_else(|| recipe.base_mode.clone());
    let mut lines = vec![
        recipe.vibe_match.clone(),
        format!("  Base mode   {base_mode}"),
        format!("  Exposure    {}", settings.exposure_recommendation),
        format!(
            "  WB          {} (A {}, G {})",
            settings.wb_setting,
            signed(settings.wb_shift_a),
            signed(settings.wb_shift_g)
        ),
        format!("  HDF         {}", settings.hdf_recommendation),
        String::new(),
    ];
    for (label, value) in recipe.parameters.named() {
        lines.push(format!(
            "  {label:<LABEL_WIDTH$}{:>3}  {}",
            signed(value),
            level_bar(value)
        ));
    }
    if !recipe.note.trim().is_empty() {
        lines.push(String::new());
        lines.push(format!("  {}", recipe.note.trim()));
    }
    lines.join("\n")
}

pub fn render_displayed(shown: &DisplayedRecipe) -> String {
    format!("({})\n{}", source_label(&shown.source), render_recipe(&shown.recipe))
}
