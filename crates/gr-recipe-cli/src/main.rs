mod render;
mod repl;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gr_recipe_contracts::Recipe;
use gr_recipe_engine::config::{clamp_timeout, normalize_api_base};
use gr_recipe_engine::{EngineConfig, GeneratorKind, HistorySourceKind, SessionController, Tab};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::render::{render_displayed, render_recipe};

#[derive(Debug, Parser)]
#[command(
    name = "gr-recipe",
    version,
    about = "Ricoh GR image-control recipes: generate, browse, pin and export"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Recipe service base URL.
    #[arg(long, global = true, env = "GR_RECIPE_API_BASE")]
    api_base: Option<String>,
    /// Directory for personal recipes, the event log and the local result log.
    #[arg(long, global = true, env = "GR_RECIPE_HOME")]
    home: Option<PathBuf>,
    #[arg(long, global = true, env = "GR_RECIPE_GENERATOR")]
    generator: Option<GeneratorKind>,
    #[arg(long, global = true, env = "GR_RECIPE_HISTORY_SOURCE")]
    history_source: Option<HistorySourceKind>,
    #[arg(long, global = true, env = "GR_RECIPE_TIMEOUT_S")]
    timeout_s: Option<u64>,
    /// Where exported recipe files are written.
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a recipe from a prompt and optional reference images.
    Generate(GenerateArgs),
    #[command(subcommand)]
    History(HistoryCommand),
    #[command(subcommand)]
    Demo(DemoCommand),
    #[command(subcommand)]
    Personal(PersonalCommand),
    /// Check that the recipe service is reachable.
    Health,
    /// Interactive slash-command session.
    Session,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    prompt: String,
    #[arg(long = "image", short = 'i')]
    images: Vec<PathBuf>,
    /// Pin the result to the personal collection.
    #[arg(long)]
    pin: bool,
    /// Export the result as `<name>_recipe.json`.
    #[arg(long)]
    export: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    Dates,
    Entries { date: String },
    Show {
        date: String,
        entry: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DemoCommand {
    List,
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum PersonalCommand {
    List,
    Show {
        index: usize,
        #[arg(long)]
        json: bool,
    },
    Import { path: PathBuf },
    Export { index: usize },
    Remove { index: usize },
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("gr-recipe error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gr_recipe=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = resolve_config(&cli.global);
    tracing::debug!(api_base = %config.api_base, data_dir = %config.data_dir.display(), "configuration resolved");

    match cli.command {
        Command::Generate(args) => run_generate(&config, args),
        Command::History(command) => run_history(&config, command),
        Command::Demo(command) => run_demo(&config, command),
        Command::Personal(command) => run_personal(&config, command),
        Command::Health => {
            let service = gr_recipe_engine::http::health(&config.api_base, config.timeout)
                .with_context(|| format!("health check against {} failed", config.api_base))?;
            println!("ok: {service} at {}", config.api_base);
            Ok(0)
        }
        Command::Session => {
            repl::run_session(open_session(&config)?)?;
            Ok(0)
        }
    }
}

/// Flags win over the environment, which wins over defaults.
fn resolve_config(global: &GlobalArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(api_base) = global.api_base.as_deref().map(normalize_api_base) {
        if !api_base.is_empty() {
            config.api_base = api_base;
        }
    }
    if let Some(home) = &global.home {
        config.data_dir = home.clone();
    }
    if let Some(generator) = global.generator {
        config.generator = generator;
    }
    if let Some(history_source) = global.history_source {
        config.history_source = history_source;
    }
    if let Some(timeout_s) = global.timeout_s {
        config.timeout = clamp_timeout(timeout_s);
    }
    if let Some(export_dir) = &global.export_dir {
        config.export_dir = export_dir.clone();
    }
    config
}

fn open_session(config: &EngineConfig) -> Result<SessionController> {
    SessionController::from_config(config).with_context(|| {
        format!(
            "failed to open session state in {}",
            config.data_dir.display()
        )
    })
}

fn print_recipe_json(recipe: &Recipe) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(recipe)?);
    Ok(())
}

fn run_generate(config: &EngineConfig, args: GenerateArgs) -> Result<i32> {
    let mut session = open_session(config)?;
    if !args.images.is_empty() {
        let outcome = session.add_files(&args.images);
        for failure in &outcome.failures {
            eprintln!("skipped: {failure}");
        }
    }
    let recipe = session.generate(&args.prompt)?;
    if args.json {
        print_recipe_json(&recipe)?;
    } else {
        println!("{}", render_recipe(&recipe));
    }
    if args.pin {
        eprintln!("{}", session.pin_current()?);
    }
    if args.export {
        eprintln!("{}", session.download_current()?);
    }
    Ok(0)
}

fn run_history(config: &EngineConfig, command: HistoryCommand) -> Result<i32> {
    let mut session = open_session(config)?;
    match command {
        HistoryCommand::Dates => {
            session.switch_tab(Tab::History);
            let dates = &session.history_state().dates;
            if dates.is_empty() {
                eprintln!("no history dates (service unreachable or log empty)");
            }
            for date in dates {
                println!("{date}");
            }
        }
        HistoryCommand::Entries { date } => {
            session.select_history_date(&date)?;
            for entry in &session.history_state().date_entries {
                println!("{entry}");
            }
        }
        HistoryCommand::Show { date, entry, json } => {
            session.switch_tab(Tab::History);
            session.select_history_date(&date)?;
            let recipe = session.select_history_entry(&entry)?;
            if json {
                print_recipe_json(recipe)?;
            } else {
                println!("{}", render_recipe(recipe));
            }
        }
    }
    Ok(0)
}

fn run_demo(config: &EngineConfig, command: DemoCommand) -> Result<i32> {
    let mut session = open_session(config)?;
    match command {
        DemoCommand::List => {
            for item in session.demos().items() {
                println!("{}\t{}\t{}", item.id, item.title, item.image_path);
            }
        }
        DemoCommand::Show { id, json } => {
            session.switch_tab(Tab::Demo);
            session.select_demo(&id)?;
            let Some(shown) = session.current_recipe() else {
                bail!("demo {id} has no recipe");
            };
            if json {
                print_recipe_json(&shown.recipe)?;
            } else {
                println!("{}", render_displayed(&shown));
            }
        }
    }
    Ok(0)
}

fn run_personal(config: &EngineConfig, command: PersonalCommand) -> Result<i32> {
    let mut session = open_session(config)?;
    session.switch_tab(Tab::Personal);
    match command {
        PersonalCommand::List => repl::print_personal(&session),
        PersonalCommand::Show { index, json } => {
            let recipe = session.select_personal(index)?;
            if json {
                print_recipe_json(recipe)?;
            } else {
                println!("{}", render_recipe(recipe));
            }
        }
        PersonalCommand::Import { path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", session.import_document(&raw)?);
        }
        PersonalCommand::Export { index } => {
            session.select_personal(index)?;
            println!("{}", session.download_current()?);
        }
        PersonalCommand::Remove { index } => {
            println!("{}", session.unpin(index)?);
        }
    }
    Ok(0)
}
