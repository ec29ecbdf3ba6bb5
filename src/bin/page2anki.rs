//! CLI binary for page2anki.
//!
//! A thin shim over the library crate: maps subcommands to the extraction,
//! submission and settings APIs and renders the preview and notifications on
//! the terminal.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use page2anki::interaction::preview_text;
use page2anki::{
    extract_html, load_page, rpc, AddMode, AnkiConnectClient, AutoConfirm, Configuration,
    HttpMediaFetcher, JsonFileStore, NoticeKind, Notifier, PreviewDecision, PreviewDialog,
    Session, Submitter, WorkflowOutcome,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal collaborators ───────────────────────────────────────────────────

/// Prints the preview to stderr and reads the answers from stdin.
///
/// The spinner is suspended while the prompt is up.
struct TerminalPreview {
    bar: ProgressBar,
}

impl PreviewDialog for TerminalPreview {
    fn review(&self, content: &page2anki::ContentRecord, config: &Configuration) -> PreviewDecision {
        // Reading stdin blocks; keep it off the async worker's hot path.
        tokio::task::block_in_place(|| {
            self.bar.suspend(|| {
                eprintln!("{}", bold("Card preview"));
                for line in preview_text(content, config).lines() {
                    eprintln!("  {line}");
                }
                if !ask("Add this card?", true) {
                    return PreviewDecision::Cancelled;
                }
                let fast_add = ask("Skip this preview next time?", config.fast_add_enabled);
                PreviewDecision::Confirmed { fast_add }
            })
        })
    }
}

fn ask(question: &str, default: bool) -> bool {
    eprint!("{} {} ", cyan("?"), question);
    eprint!("{}", dim(if default { "[Y/n] " } else { "[y/N] " }));
    io::stderr().flush().ok();

    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return default;
    }
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// Clears the spinner and prints the flow's one notification.
struct TerminalNotifier {
    bar: ProgressBar,
    quiet: bool,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        self.bar.finish_and_clear();
        match kind {
            NoticeKind::Success if !self.quiet => eprintln!("{} {}", green("✔"), message),
            NoticeKind::Success => {}
            NoticeKind::Error => eprintln!("{} {}", red("✘"), message),
        }
    }
}

fn spinner(enabled: bool, message: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview and add the card for a page
  page2anki add https://learnablemeta.com/maps/123

  # Add without preview
  page2anki add --fast https://learnablemeta.com/maps/123

  # Saved page; resolve relative image paths against the original URL
  page2anki add page.html --base-url https://learnablemeta.com/maps/123

  # Show what would be extracted, as JSON
  page2anki extract --json page.html

  # Check that Anki is running with AnkiConnect
  page2anki test-connection

  # Change the target deck and reject duplicates
  page2anki settings --deck Geography --allow-duplicates false

ENVIRONMENT VARIABLES:
  PAGE2ANKI_CONFIG   Settings file (default: <config dir>/page2anki/settings.json)
  RUST_LOG           Override log filter (e.g. page2anki=debug)

SETUP:
  1. Install the AnkiConnect add-on in Anki and keep Anki running.
  2. page2anki test-connection
"#;

/// Turn web pages into Anki flashcards via AnkiConnect.
#[derive(Parser, Debug)]
#[command(
    name = "page2anki",
    version,
    about = "Turn web pages into Anki flashcards via AnkiConnect",
    long_about = "Extract the title, description and main image from a web page (URL or saved \
HTML file) and add them to Anki as a note through the AnkiConnect add-on.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file path.
    #[arg(long, global = true, env = "PAGE2ANKI_CONFIG")]
    config: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAGE2ANKI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAGE2ANKI_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a page and add it to Anki.
    Add {
        #[command(flatten)]
        page: PageArgs,

        /// Skip the preview, whatever the fast-add setting says.
        #[arg(long)]
        fast: bool,

        /// Confirm the preview automatically.
        #[arg(short, long)]
        yes: bool,
    },

    /// Print what would be extracted, without contacting Anki.
    Extract {
        #[command(flatten)]
        page: PageArgs,

        /// Output the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check that AnkiConnect is reachable.
    TestConnection,

    /// Show the settings, or change them when any flag is given.
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Local HTML file path or HTTP/HTTPS URL.
    input: String,

    /// URL the page was saved from; used to resolve relative image paths.
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// AnkiConnect host.
    #[arg(long)]
    host: Option<String>,

    /// AnkiConnect port.
    #[arg(long)]
    port: Option<u16>,

    /// Target deck (created on first use).
    #[arg(long)]
    deck: Option<String>,

    /// Note type used for new cards.
    #[arg(long)]
    template: Option<String>,

    /// Let Anki accept cards that already exist (true/false).
    #[arg(long)]
    allow_duplicates: Option<bool>,

    /// Append a timestamp to the back of each card (true/false).
    #[arg(long)]
    add_timestamp: Option<bool>,

    /// Skip the preview by default (true/false).
    #[arg(long)]
    fast_add: Option<bool>,

    /// Request timeout in seconds for AnkiConnect and image downloads.
    #[arg(long)]
    timeout: Option<u64>,
}

impl SettingsArgs {
    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.deck.is_none()
            && self.template.is_none()
            && self.allow_duplicates.is_none()
            && self.add_timestamp.is_none()
            && self.fast_add.is_none()
            && self.timeout.is_none()
    }

    fn apply(&self, current: &Configuration) -> Configuration {
        let mut next = current.clone();
        if let Some(ref h) = self.host {
            next.service_host = h.clone();
        }
        if let Some(p) = self.port {
            next.service_port = p;
        }
        if let Some(ref d) = self.deck {
            next.deck_name = d.clone();
        }
        if let Some(ref t) = self.template {
            next.template_name = t.clone();
        }
        if let Some(v) = self.allow_duplicates {
            next.allow_duplicates = v;
        }
        if let Some(v) = self.add_timestamp {
            next.add_timestamp = v;
        }
        if let Some(v) = self.fast_add {
            next.fast_add_enabled = v;
        }
        if let Some(s) = self.timeout {
            next.request_timeout_secs = s;
        }
        next
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep INFO logs out of the way while the spinner is on screen.
    let show_spinner = !cli.quiet && matches!(cli.command, Command::Add { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_spinner {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut store = open_store(cli.config.clone())?;
    let config = Configuration::load(&store);

    match cli.command {
        Command::Add { ref page, fast, yes } => {
            let source = load_page(&page.input, page.base_url.as_deref(), config.request_timeout_secs)
                .await
                .context("Failed to load page")?;
            let content = extract_html(&source.html, &source.source_url);

            let submitter = Submitter::new(
                AnkiConnectClient::from_config(&config)?,
                HttpMediaFetcher::from_config(&config)?,
            );
            let bar = spinner(show_spinner, &format!("Sending to Anki ({})…", config.endpoint()));
            let preview: Box<dyn PreviewDialog> = if yes {
                Box::new(AutoConfirm)
            } else {
                Box::new(TerminalPreview { bar: bar.clone() })
            };
            let notifier = TerminalNotifier {
                bar: bar.clone(),
                quiet: cli.quiet,
            };
            let mode = if fast { AddMode::Fast } else { AddMode::Preview };

            let mut session = Session::with_config(config, &mut store, submitter);
            let outcome = session
                .process_page(&content, mode, preview.as_ref(), &notifier)
                .await;

            Ok(finish_add(&outcome, &bar, cli.quiet))
        }

        Command::Extract { ref page, json } => {
            let source = load_page(&page.input, page.base_url.as_deref(), config.request_timeout_secs)
                .await
                .context("Failed to load page")?;
            let content = extract_html(&source.html, &source.source_url);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&content).context("Failed to serialise record")?
                );
            } else {
                println!("Title:        {}", content.title);
                println!("Description:  {}", content.description);
                if content.images.is_empty() {
                    println!("Images:       (none)");
                }
                for (i, url) in content.images.iter().enumerate() {
                    println!("Image {:<2}      {}", i + 1, url);
                }
                println!("Source:       {}", content.source_url);
            }
            Ok(if content.is_usable() {
                ExitCode::SUCCESS
            } else {
                eprintln!("{} Could not extract content from page", red("✘"));
                ExitCode::FAILURE
            })
        }

        Command::TestConnection => {
            let client = AnkiConnectClient::from_config(&config)?;
            match rpc::version(&client).await {
                Ok(v) => {
                    println!(
                        "{}  AnkiConnect v{} at {}",
                        green("✔"),
                        v,
                        bold(client.endpoint())
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}  {}", red("✘"), e);
                    eprintln!(
                        "   {}",
                        dim("Is Anki running with the AnkiConnect add-on installed?")
                    );
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Command::Settings(ref args) => {
            let shown = if args.is_empty() {
                config
            } else {
                let saved = Configuration::save(args.apply(&config), &mut store)
                    .context("Failed to save settings")?;
                if !cli.quiet {
                    eprintln!("{}  Saved to {}", green("✔"), store.path().display());
                }
                saved
            };
            print_settings(&shown, &store);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit code for an `add` run. A cancelled preview sends no notification,
/// so the spinner is cleared here instead.
fn finish_add(outcome: &WorkflowOutcome, bar: &ProgressBar, quiet: bool) -> ExitCode {
    match outcome {
        WorkflowOutcome::Submitted(o) if o.is_success() => ExitCode::SUCCESS,
        WorkflowOutcome::Cancelled => {
            bar.finish_and_clear();
            if !quiet {
                eprintln!("{}", dim("Cancelled."));
            }
            ExitCode::SUCCESS
        }
        _ => ExitCode::FAILURE,
    }
}

fn open_store(path: Option<PathBuf>) -> Result<JsonFileStore> {
    let path = match path {
        Some(p) => p,
        None => JsonFileStore::default_path()
            .context("No configuration directory found; pass --config")?,
    };
    JsonFileStore::open(path).context("Failed to open settings")
}

fn print_settings(config: &Configuration, store: &JsonFileStore) {
    println!("{}", bold("AnkiConnect"));
    println!("  Endpoint:          {}", config.endpoint());
    println!("  Timeout:           {}s", config.request_timeout_secs);
    println!("{}", bold("Cards"));
    println!("  Deck:              {}", config.deck_name);
    println!("  Note type:         {}", config.template_name);
    println!("  Allow duplicates:  {}", config.allow_duplicates);
    println!("  Add timestamp:     {}", config.add_timestamp);
    println!("  Fast add:          {}", config.fast_add_enabled);
    println!("{}", dim(&format!("Settings file: {}", store.path().display())));
}
