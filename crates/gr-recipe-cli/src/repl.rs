use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gr_recipe_contracts::commands::{parse_command, SESSION_HELP_COMMANDS};
use gr_recipe_engine::{ClipboardItem, SessionController, Tab};
use image::ImageFormat;

use crate::render::{render_displayed, render_recipe};

/// Read slash commands and prompts from stdin until EOF or `/quit`.
pub fn run_session(mut session: SessionController) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "gr-recipe session started ({} generator). Type /help for commands.",
        session.generator_name()
    );

    loop {
        print!("[{}] > ", session.active_tab());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let command = parse_command(input);
        match command.action.as_str() {
            "noop" => {}
            "quit" => break,
            "help" => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
                println!("Anything else is sent as a generation prompt.");
            }
            "generate" => {
                let prompt = command.prompt.as_deref().unwrap_or_default();
                println!("Crafting...");
                match session.generate(prompt) {
                    Ok(recipe) => println!("{}", render_recipe(&recipe)),
                    Err(err) => println!("Generation failed: {err}"),
                }
            }
            "switch_tab" => {
                let Some(raw) = command.arg_str("value") else {
                    println!("/tab requires one of: generate, personal, history, demo");
                    continue;
                };
                match raw.parse::<Tab>() {
                    Ok(tab) => {
                        session.switch_tab(tab);
                        print_tab_overview(&session);
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "add_files" => {
                let paths = command
                    .arg_paths("paths")
                    .into_iter()
                    .map(PathBuf::from)
                    .collect::<Vec<PathBuf>>();
                if paths.is_empty() {
                    println!("/add requires one or more image paths");
                    continue;
                }
                let outcome = session.add_files(&paths);
                for failure in &outcome.failures {
                    println!("Skipped: {failure}");
                }
                println!(
                    "Added {} image(s); {} pending.",
                    outcome.added,
                    session.pending_assets().len()
                );
            }
            "paste" => {
                let paths = command.arg_paths("paths");
                if paths.is_empty() {
                    println!("/paste requires one or more file paths to treat as clipboard items");
                    continue;
                }
                let items = match clipboard_items(&paths) {
                    Ok(items) => items,
                    Err(err) => {
                        println!("Paste failed: {err:#}");
                        continue;
                    }
                };
                let outcome = session.paste(&items);
                if !outcome.suppress_default {
                    println!("Nothing image-like in the paste; ignored.");
                    continue;
                }
                for failure in &outcome.batch.failures {
                    println!("Skipped: {failure}");
                }
                println!(
                    "Pasted {} image(s); {} pending.",
                    outcome.batch.added,
                    session.pending_assets().len()
                );
            }
            "list_assets" => print_assets(&session),
            "remove_asset" => {
                let Some(index) = command.arg_index("index") else {
                    println!("/remove requires an asset index");
                    continue;
                };
                match session.remove_asset(index) {
                    Ok(asset) => println!("Removed {}", asset.label),
                    Err(err) => println!("Remove failed: {err}"),
                }
            }
            "clear_assets" => {
                session.clear_assets();
                println!("Cleared pending images.");
            }
            "select_date" => {
                let Some(date) = command.arg_str("value") else {
                    println!("/date requires a date");
                    continue;
                };
                match session.select_history_date(date) {
                    Ok(()) => print_history(&session),
                    Err(err) => println!("History unavailable: {err}"),
                }
            }
            "select_entry" => {
                let Some(entry) = command.arg_str("value") else {
                    println!("/entry requires an entry name");
                    continue;
                };
                match session.select_history_entry(entry) {
                    Ok(recipe) => println!("{}", render_recipe(recipe)),
                    Err(err) => println!("Could not load entry: {err}"),
                }
            }
            "select_personal" => {
                let Some(index) = command.arg_index("index") else {
                    println!("/select requires a personal recipe index");
                    continue;
                };
                match session.select_personal(index) {
                    Ok(recipe) => println!("{}", render_recipe(recipe)),
                    Err(err) => println!("Select failed: {err}"),
                }
            }
            "select_demo" => {
                let Some(id) = command.arg_str("value") else {
                    println!("/demo requires a demo id");
                    continue;
                };
                match session.select_demo(id) {
                    Ok(recipe) => println!("{}", render_recipe(recipe)),
                    Err(err) => println!("{err}"),
                }
            }
            "show" => match session.current_recipe() {
                Some(shown) => println!("{}", render_displayed(&shown)),
                None => print_tab_overview(&session),
            },
            "refresh" => match session.refresh_current() {
                Ok(Some(shown)) => println!("{}", render_displayed(&shown)),
                Ok(None) => println!("Nothing displayed to refresh."),
                Err(err) => println!("Refresh failed: {err}"),
            },
            "pin" => match session.pin_current() {
                Ok(notice) => println!("{notice}"),
                Err(err) => println!("Pin failed: {err}"),
            },
            "unpin" => {
                let Some(index) = command.arg_index("index") else {
                    println!("/unpin requires a personal recipe index");
                    continue;
                };
                match session.unpin(index) {
                    Ok(notice) => println!("{notice}"),
                    Err(err) => println!("Unpin failed: {err}"),
                }
            }
            "compare" => {
                let Some(index) = command.arg_index("index") else {
                    println!("/compare requires a personal recipe index");
                    continue;
                };
                match session.compare_with_personal(index) {
                    Ok(lines) if lines.is_empty() => println!("Recipes are identical."),
                    Ok(lines) => println!("{}", lines.join("\n")),
                    Err(err) => println!("Compare failed: {err}"),
                }
            }
            "export" => match session.download_current() {
                Ok(notice) => println!("{notice}"),
                Err(err) => println!("Export failed: {err}"),
            },
            "import" => {
                let Some(path) = command.arg_str("path") else {
                    println!("/import requires a file path");
                    continue;
                };
                let outcome = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {path}"))
                    .and_then(|raw| session.import_document(&raw).map_err(Into::into));
                match outcome {
                    Ok(notice) => println!("{notice}"),
                    Err(err) => println!("Import failed: {err:#}"),
                }
            }
            "set_api_key" => {
                session.set_api_key(command.arg_str("value").map(str::to_string));
                let state = if session.overrides().api_key.is_some() { "set" } else { "cleared" };
                println!("API key {state}.");
            }
            "set_base_url" => {
                session.set_base_url(command.arg_str("value").map(str::to_string));
                println!(
                    "Base URL: {}",
                    session.overrides().base_url.as_deref().unwrap_or("(service default)")
                );
            }
            "set_model" => {
                session.set_model(command.arg_str("value").map(str::to_string));
                println!(
                    "Model: {}",
                    session.overrides().model.as_deref().unwrap_or("(service default)")
                );
            }
            "unknown" => {
                let name = command.arg_str("command").unwrap_or_default();
                println!("Unknown command /{name}. Type /help for commands.");
            }
            other => println!("Unhandled action {other}"),
        }
    }
    Ok(())
}

/// Treat files as clipboard items, typed by extension the way a paste event
/// would type them.
fn clipboard_items(paths: &[String]) -> Result<Vec<ClipboardItem>> {
    paths
        .iter()
        .map(|raw| {
            let path = Path::new(raw);
            let mime_type = ImageFormat::from_path(path)
                .map(|format| format.to_mime_type())
                .unwrap_or("text/plain");
            let data = std::fs::read(path).with_context(|| format!("failed to read {raw}"))?;
            Ok(ClipboardItem::new(mime_type, data))
        })
        .collect()
}

pub fn print_tab_overview(session: &SessionController) {
    match session.active_tab() {
        Tab::Generate => {
            print_assets(session);
            if let Some(err) = session.last_error(Tab::Generate) {
                println!("Last error: {err}");
            }
        }
        Tab::Personal => print_personal(session),
        Tab::History => print_history(session),
        Tab::Demo => {
            for item in session.demos().items() {
                println!("  {}  {}", item.id, item.title);
            }
        }
    }
}

fn print_assets(session: &SessionController) {
    let assets = session.pending_assets().assets();
    if assets.is_empty() {
        println!("No pending images.");
        return;
    }
    for (index, asset) in assets.iter().enumerate() {
        println!(
            "  [{index}] {} ({}x{}, {} bytes encoded)",
            asset.label,
            asset.width,
            asset.height,
            asset.encoded_len()
        );
    }
}

pub fn print_personal(session: &SessionController) {
    let recipes = session.store().recipes();
    if recipes.is_empty() {
        println!("No personal recipes yet. Use /pin or /import.");
        return;
    }
    for (index, recipe) in recipes.iter().enumerate() {
        let marker = if session.selected_personal() == Some(index) { '*' } else { ' ' };
        println!("{marker} [{index}] {}", recipe.vibe_match);
    }
}

fn print_history(session: &SessionController) {
    let state = session.history_state();
    if state.dates.is_empty() {
        println!("No history dates.");
    }
    for date in &state.dates {
        let marker = if state.selected_date.as_deref() == Some(date.as_str()) { '*' } else { ' ' };
        println!("{marker} {date}");
    }
    if let Some(date) = state.selected_date.as_deref() {
        println!("Entries for {date}:");
        for entry in &state.date_entries {
            println!("    {entry}");
        }
    }
    if let Some(err) = session.last_error(Tab::History) {
        println!("Last error: {err}");
    }
}
