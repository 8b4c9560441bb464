use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use report_loader::aggregate::Source;
use report_loader::aggregate::http::report_sources;
use report_loader::aggregate::mock::MockSource;
use report_loader::aggregate::Aggregator;
use report_loader::config::{KNOWN_KEYS, LoaderConfig, Settings};
use report_loader::consts::default_db_path;
use report_loader::controller::{Controller, Destination, Navigator};
use report_loader::logging;
use report_loader::render::ProgressLine;

#[derive(Parser)]
#[command(
    name = "report-loader",
    version,
    about = "Fetch a company report behind a loading screen.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Company to build the report for
    subject: Option<String>,

    /// Backend base URL (overrides the stored setting)
    #[arg(long)]
    base_url: Option<String>,

    /// Minimum time the loading screen stays up, in milliseconds
    #[arg(long)]
    min_duration_ms: Option<u64>,

    /// Settings database path (default: ~/.report-loader/settings.db)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Serve canned data instead of calling the backend
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Debug logging for this crate (RUST_LOG still wins)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Read or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a stored value
    Get { key: String },
    /// Store a value
    Set { key: String, value: String },
    /// Remove a stored value
    Unset { key: String },
    /// Print every known key
    List,
}

/// Holds the single destination a run hands off to.
#[derive(Default)]
struct TerminalNavigator {
    destination: Mutex<Option<Destination>>,
}

impl TerminalNavigator {
    fn take(&self) -> Option<Destination> {
        self.destination
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, destination: Destination) {
        *self.destination.lock().unwrap_or_else(|e| e.into_inner()) = Some(destination);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: {e}");
    }

    let settings = open_settings(cli.db.clone())?;

    if let Some(Command::Config { action }) = cli.command {
        return handle_config(&settings, action);
    }

    let Some(subject) = cli.subject else {
        bail!("no subject given, try: report-loader \"Acme Corp\"");
    };

    let mut config = LoaderConfig::default();
    settings.apply(&mut config)?;
    if let Some(ms) = cli.min_duration_ms {
        config.min_duration = Duration::from_millis(ms);
    }

    let sources = if cli.demo {
        demo_sources()
    } else {
        let base_url = match cli.base_url {
            Some(url) => url,
            None => settings.base_url()?,
        };
        report_sources(&base_url)
    };

    let navigator = Arc::new(TerminalNavigator::default());
    let mut controller = Controller::new(Aggregator::new(sources), navigator.clone(), config);
    if !controller.start(&subject) {
        bail!("subject must not be blank");
    }

    let line = ProgressLine::start(controller.subscribe());
    let mut view = controller.subscribe();

    // Ctrl+C cancels the run; the loader then returns to the origin.
    let interrupted = tokio::select! {
        _ = view.wait_for(|v| v.phase.is_terminal()) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        controller.cancel();
    }
    line.stop().await;

    match navigator.take() {
        Some(Destination::Report(handoff)) => {
            println!("{}", serde_json::to_string_pretty(&handoff)?);
            Ok(())
        }
        Some(Destination::Origin {
            notice: Some(notice),
        }) => {
            eprintln!("{}", notice.text);
            std::process::exit(1);
        }
        Some(Destination::Origin { notice: None }) => {
            eprintln!("cancelled");
            Ok(())
        }
        None => bail!("run ended without a hand-off"),
    }
}

fn open_settings(db: Option<PathBuf>) -> anyhow::Result<Settings> {
    let path = match db {
        Some(path) => path,
        None => default_db_path().context("cannot determine home directory")?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let path = path
        .to_str()
        .context("settings path is not valid UTF-8")?
        .to_string();
    Settings::open(&path)
}

fn handle_config(settings: &Settings, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match settings.get(&key)? {
            Some(value) => println!("{value}"),
            None => println!("(unset)"),
        },
        ConfigAction::Set { key, value } => {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                bail!("unknown key: {key} (known: {})", KNOWN_KEYS.join(", "));
            }
            settings.set(&key, &value)?;
            println!("✓ {key} = {value}");
        }
        ConfigAction::Unset { key } => {
            settings.remove(&key)?;
            println!("✓ {key} unset");
        }
        ConfigAction::List => {
            for key in KNOWN_KEYS {
                let value = settings.get(key)?.unwrap_or_else(|| "(unset)".to_string());
                println!("{key:<16} {value}");
            }
        }
    }
    Ok(())
}

/// Canned sources with a backend-like delay.
fn demo_sources() -> Vec<Arc<dyn Source>> {
    let delay = Duration::from_millis(400);
    vec![
        Arc::new(
            MockSource::ok(
                "summary",
                json!({"positive_ratio": 0.62, "negative_ratio": 0.38, "total_articles": 128}),
            )
            .after(delay)
            .mark_required(),
        ),
        Arc::new(
            MockSource::ok(
                "news",
                json!([{"title": "Quarterly results beat expectations", "sentiment": "positive"}]),
            )
            .after(delay)
            .mark_required(),
        ),
        Arc::new(MockSource::ok("keywords", json!([{"keyword": "earnings", "count": 14}])).after(delay)),
        Arc::new(
            MockSource::ok(
                "points",
                json!({"positive_points": ["Strong demand"], "risk_factors": ["FX exposure"]}),
            )
            .after(delay),
        ),
    ]
}
