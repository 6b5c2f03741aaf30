use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oshxona::{DietaryFilter, Language, Translation, View};
use oshxona_client::{
    config::{self, Config},
    render,
    voice::{GeminiLive, Intent, Recorder, VoiceChannel},
    BlobStore, Cookbook, Database, GeminiClient, Kitchen, KitchenAi, MemoryStore,
};
use strum::IntoEnumIterator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

type AppKitchen = Kitchen<GeminiClient, Box<dyn BlobStore>>;

/// Photograph your ingredients, get recipes back.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the YAML configuration
    #[arg(long, default_value = "oshxona.yml")]
    config: String,
    /// Display language: uz, en or ru
    #[arg(short, long)]
    lang: Option<Language>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the ingredients in a photo
    Scan {
        /// The photo to analyze
        image: PathBuf,
        /// Dietary tags to pass along (vegan, gluten-free, nut-free, halal, ...)
        #[arg(short, long)]
        filter: Vec<String>,
        /// Also suggest recipes
        #[arg(short, long)]
        recipes: bool,
        /// Save the suggested recipes to the cookbook
        #[arg(short, long, requires = "recipes")]
        save: bool,
    },
    /// Show or edit the saved recipes
    Cookbook {
        #[command(subcommand)]
        action: Option<CookbookAction>,
    },
    /// Interactive kitchen with optional voice control
    Shell,
}

#[derive(Subcommand, Debug)]
enum CookbookAction {
    /// List saved recipes
    List,
    /// Remove a saved recipe
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let log_guard = init_tracing(matches!(args.command, Command::Shell))?;
    // reqwest and the live socket both pull in rustls; pick one provider up front.
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    let config = Config::load_or_default(&args.config)?;
    let language = args.lang.unwrap_or(config.language);
    let cookbook = Cookbook::load(open_store(&config)?, &config.storage.key);
    let t = Translation::for_language(language);

    match args.command {
        Command::Cookbook { action } => {
            let mut cookbook = cookbook;
            match action.unwrap_or(CookbookAction::List) {
                CookbookAction::List => {
                    println!("== {} ({}) ==", t.my_cookbook, cookbook.list().len());
                    for recipe in cookbook.list() {
                        println!("{}", render::recipe(recipe, true, t)?);
                    }
                }
                CookbookAction::Remove { id } => {
                    if cookbook.remove(&id)? {
                        println!("Removed {id}");
                    } else {
                        println!("No saved recipe with id {id}");
                    }
                }
            }
        }
        Command::Scan {
            image,
            filter,
            recipes,
            save,
        } => {
            let api_key = config::api_key()?;
            let mut kitchen = build_kitchen(&config, api_key, cookbook, language)?;
            for tag in &filter {
                kitchen.toggle_filter(tag);
            }
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Reading {}", image.display()))?;
            eprintln!("{}", t.processing);
            let found = kitchen.submit_image(&bytes).await?;
            print!("{}", render::ingredients(found, t)?);
            if recipes {
                if !kitchen.request_recipes().await? {
                    println!("No ingredients, no recipes.");
                    return Ok(());
                }
                print_recipes(&kitchen, t)?;
                if save {
                    let ids = ids_of(&kitchen);
                    for id in ids {
                        kitchen.save_recipe(&id)?;
                    }
                    println!("{}: {}", t.saved, kitchen.saved_recipes().len());
                }
            }
        }
        Command::Shell => {
            let api_key = config::api_key()?;
            let mut kitchen = build_kitchen(&config, api_key.clone(), cookbook, language)?;
            let (intent_tx, intent_rx) = mpsc::unbounded_channel();
            let voice = VoiceChannel::new(
                Arc::new(Recorder::sox(&config.voice.recorder)),
                Arc::new(GeminiLive::new(api_key, &config.voice)),
                intent_tx,
            );
            shell(&mut kitchen, voice, intent_rx).await?;
            // An unfinished stdin read blocks runtime shutdown until Enter is pressed.
            drop(log_guard);
            std::process::exit(0);
        }
    }
    Ok(())
}

/// Log to stderr for one-shot commands, to a daily file for the shell.
fn init_tracing(to_file: bool) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if to_file {
        let file_appender = tracing_appender::rolling::daily("logs", "oshxona.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .init();
        Ok(None)
    }
}

fn open_store(config: &Config) -> Result<Box<dyn BlobStore>> {
    Ok(match &config.storage.path {
        Some(path) => Box::new(Database::connect(path).context("Opening cookbook database")?),
        None => Box::new(MemoryStore::default()),
    })
}

fn build_kitchen(
    config: &Config,
    api_key: String,
    cookbook: Cookbook<Box<dyn BlobStore>>,
    language: Language,
) -> Result<AppKitchen> {
    let client = GeminiClient::new(api_key, &config.model)?;
    Ok(Kitchen::new(
        KitchenAi::new(client, &config.model),
        cookbook,
        language,
    ))
}

fn ids_of(kitchen: &AppKitchen) -> Vec<String> {
    kitchen
        .session()
        .recipes()
        .iter()
        .map(|r| r.id.clone())
        .collect()
}

fn print_recipes(kitchen: &AppKitchen, t: &Translation) -> Result<()> {
    let recipes = kitchen.session().recipes();
    println!("== {} ({}) ==", t.recipes, recipes.len());
    for recipe in recipes {
        println!("{}", render::recipe(recipe, kitchen.is_saved(&recipe.id), t)?);
    }
    Ok(())
}

/// One line typed into the shell.
#[derive(Debug, PartialEq)]
enum ShellCommand {
    Scan(PathBuf),
    Recipes,
    Filter(Option<String>),
    Lang(Language),
    Clear,
    Save(String),
    Unsave(String),
    Cookbook,
    Home,
    Voice,
    Status,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let needs = |what: &str| format!("`{word}` needs {what}");
        Ok(match word.to_lowercase().as_str() {
            "scan" if rest.is_empty() => return Err(needs("a photo path")),
            "scan" => ShellCommand::Scan(PathBuf::from(rest)),
            "recipes" | "r" => ShellCommand::Recipes,
            "filter" | "f" => ShellCommand::Filter((!rest.is_empty()).then(|| rest.to_string())),
            "lang" => ShellCommand::Lang(
                Language::from_str(rest).map_err(|_| needs("one of uz, en, ru"))?,
            ),
            "clear" => ShellCommand::Clear,
            "save" if rest.is_empty() => return Err(needs("a recipe id")),
            "save" => ShellCommand::Save(rest.to_string()),
            "unsave" if rest.is_empty() => return Err(needs("a recipe id")),
            "unsave" => ShellCommand::Unsave(rest.to_string()),
            "cookbook" | "book" => ShellCommand::Cookbook,
            "home" => ShellCommand::Home,
            "voice" | "v" => ShellCommand::Voice,
            "status" | "s" => ShellCommand::Status,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => return Err(format!("Unknown command `{other}`, try `help`")),
        })
    }
}

const HELP: &str = "\
  scan <path>     detect ingredients in a photo
  recipes         suggest recipes from the detected ingredients
  filter [tag]    toggle a dietary filter, or list them
  lang <uz|en|ru> switch language
  save <id>       save a recipe to the cookbook
  unsave <id>     remove a recipe from the cookbook
  cookbook        show saved recipes
  home            show the current ingredients and recipes
  clear           forget the photo, ingredients and recipes
  voice           toggle the voice assistant
  status          show the session state
  quit";

/// Await a kitchen call. Voice intents arriving meanwhile are dropped and
/// Ctrl-C gives up on the call.
async fn while_pending<F: Future>(
    call: F,
    intents: &mut mpsc::UnboundedReceiver<Intent>,
) -> Option<F::Output> {
    tokio::pin!(call);
    loop {
        tokio::select! {
            out = &mut call => return Some(out),
            Some(intent) = intents.recv() => {
                tracing::info!("Ignoring voice intent {} while busy", intent);
            }
            _ = tokio::signal::ctrl_c() => return None,
        }
    }
}

async fn scan(
    kitchen: &mut AppKitchen,
    path: &Path,
    intents: &mut mpsc::UnboundedReceiver<Intent>,
) -> Result<()> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("! Cannot read {}: {}", path.display(), e);
            return Ok(());
        }
    };
    let t = Translation::for_language(kitchen.session().language());
    println!("{}", t.processing);
    let outcome = while_pending(kitchen.submit_image(&bytes), intents)
        .await
        .map(|r| r.map(|found| found.len()));
    match outcome {
        None => {
            kitchen.abandon_pending();
            println!("Cancelled.");
        }
        Some(Err(e)) => println!("! {e}"),
        Some(Ok(0)) => println!("No ingredients found in this photo."),
        Some(Ok(_)) => print!("{}", render::ingredients(kitchen.session().ingredients(), t)?),
    }
    Ok(())
}

async fn recipes(
    kitchen: &mut AppKitchen,
    intents: &mut mpsc::UnboundedReceiver<Intent>,
) -> Result<()> {
    let t = Translation::for_language(kitchen.session().language());
    if !kitchen.session().can_request_recipes() {
        println!("Scan a photo with ingredients first.");
        return Ok(());
    }
    println!("{}", t.processing);
    match while_pending(kitchen.request_recipes(), intents).await {
        None => {
            kitchen.abandon_pending();
            println!("Cancelled.");
        }
        Some(Err(e)) => println!("! {e}"),
        Some(Ok(_)) => print_recipes(kitchen, t)?,
    }
    Ok(())
}

fn print_filters(kitchen: &AppKitchen) {
    let session = kitchen.session();
    let t = Translation::for_language(session.language());
    println!("{}:", t.dietary_filters);
    for filter in DietaryFilter::iter() {
        let mark = if session.filters().iter().any(|f| f == filter.id()) {
            "x"
        } else {
            " "
        };
        println!("  [{mark}] {:<12} {}", filter.id(), filter.label(session.language()));
    }
    for custom in session
        .filters()
        .iter()
        .filter(|f| DietaryFilter::from_str(f).is_err())
    {
        println!("  [x] {custom}");
    }
}

fn print_status(kitchen: &AppKitchen, voice: &VoiceChannel) {
    let session = kitchen.session();
    println!("stage:       {}", session.stage());
    println!("language:    {}", session.language());
    println!("view:        {}", session.view());
    println!("photo:       {}", if session.preview().is_some() { "yes" } else { "no" });
    println!("ingredients: {}", session.ingredients().len());
    println!("recipes:     {}", session.recipes().len());
    println!("filters:     {}", session.preference_hint());
    println!("voice:       {}", voice.state());
    println!("saved:       {}", kitchen.saved_recipes().len());
    if let Some(error) = session.error() {
        println!("last error:  {error}");
    }
}

/// Interpret a typed line. After a voice request to pick a photo, a line that
/// is not a command is taken as the photo's path.
fn read_command(line: &str, awaiting_photo: bool) -> std::result::Result<ShellCommand, String> {
    match line.parse::<ShellCommand>() {
        Err(_) if awaiting_photo => Ok(ShellCommand::Scan(PathBuf::from(line.trim()))),
        parsed => parsed,
    }
}

fn prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

async fn shell(
    kitchen: &mut AppKitchen,
    mut voice: VoiceChannel,
    mut intents: mpsc::UnboundedReceiver<Intent>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let t = Translation::for_language(kitchen.session().language());
    println!("{} - {}", t.title, t.subtitle);
    println!("{HELP}");
    // Set by a voice request to pick a photo: the next line is a path.
    let mut awaiting_photo = false;

    loop {
        prompt();
        let command = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match read_command(&line, std::mem::take(&mut awaiting_photo)) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("! {e}");
                        continue;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            Some(intent) = intents.recv() => match intent {
                Intent::PickImage => {
                    let t = Translation::for_language(kitchen.session().language());
                    println!("\n{} (path):", t.scan_now);
                    awaiting_photo = true;
                    continue;
                }
                Intent::GenerateRecipes => {
                    println!();
                    ShellCommand::Recipes
                }
            },
        };

        let t = Translation::for_language(kitchen.session().language());
        match command {
            ShellCommand::Scan(path) => {
                kitchen.show_view(View::Home);
                scan(kitchen, &path, &mut intents).await?;
            }
            ShellCommand::Recipes => recipes(kitchen, &mut intents).await?,
            ShellCommand::Filter(None) => print_filters(kitchen),
            ShellCommand::Filter(Some(tag)) => {
                let on = kitchen.toggle_filter(&tag);
                println!("{tag}: {}", if on { "on" } else { "off" });
            }
            ShellCommand::Lang(language) => {
                kitchen.change_language(language);
                println!("{}", Translation::for_language(language).title);
            }
            ShellCommand::Clear => {
                kitchen.clear();
                println!("Cleared.");
            }
            ShellCommand::Save(id) => match kitchen.save_recipe(&id) {
                Ok(true) => println!("{}: {id}", t.saved),
                Ok(false) => println!("{id} is already in the cookbook"),
                Err(e) => println!("! {e}"),
            },
            ShellCommand::Unsave(id) => match kitchen.remove_saved(&id) {
                Ok(true) => println!("Removed {id}"),
                Ok(false) => println!("{id} is not in the cookbook"),
                Err(e) => println!("! {e}"),
            },
            ShellCommand::Cookbook => {
                kitchen.show_view(View::Cookbook);
                println!("== {} ({}) ==", t.my_cookbook, kitchen.saved_recipes().len());
                for recipe in kitchen.saved_recipes() {
                    println!("{}", render::recipe(recipe, true, t)?);
                }
            }
            ShellCommand::Home => {
                kitchen.show_view(View::Home);
                if kitchen.session().ingredients().is_empty() {
                    println!("{}", t.scan_now);
                } else {
                    print!("{}", render::ingredients(kitchen.session().ingredients(), t)?);
                }
                if !kitchen.session().recipes().is_empty() {
                    print_recipes(kitchen, t)?;
                }
            }
            ShellCommand::Voice => {
                if voice.toggle(kitchen.session().language()).await {
                    println!("{}", t.voice_prompt);
                } else {
                    println!("Voice assistant off.");
                }
            }
            ShellCommand::Status => print_status(kitchen, &voice),
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => break,
        }
    }
    voice.stop().await;
    Ok(())
}
