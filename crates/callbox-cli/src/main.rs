mod logging;
mod screen;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use callbox_core::{
    can_exit, render, setup_session_store, spawn_snapshot_persister, CallOutcome, CallScreenView,
    CallboxConfig, CallboxError, FileSnapshotStorage, HttpTokenFetcher, LoopbackVoiceSdk,
    MemorySnapshotStorage, NavigationState, Platform, SnapshotStorage, StaticConfirmer,
    TokenSource, VoiceSessionManager,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use crate::logging::{setup_logging, LoggingConfig};
use crate::terminal::{LineReader, TerminalConfirmer, TerminalPermissionGate};

/// Route name of the single call screen
const CALL_SCREEN_ROUTE: &str = "callScreen";

#[derive(Parser)]
#[command(name = "callbox", version, about = "Initialize a voice device and place calls")]
struct Cli {
    /// Configuration file (default: <config dir>/callbox/config.toml)
    #[arg(long, short, env = "CALLBOX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(long, env = "CALLBOX_LOG", global = true)]
    log_level: Option<String>,

    /// Platform family to behave as
    #[arg(long, global = true)]
    platform: Option<Platform>,

    /// Access token endpoint
    #[arg(long, env = "CALLBOX_TOKEN_URL", global = true)]
    token_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive call screen (default)
    Run,
    /// Fetch an access token and print it
    Token,
    /// Initialize, then call a number
    Call {
        /// Destination number
        number: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    setup_logging(LoggingConfig::from_settings(
        &config.logging,
        cli.log_level.as_deref(),
    )?)?;
    info!("Starting callbox v{}", callbox_core::VERSION);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_call_screen(&config).await,
        Commands::Token => print_token(&config).await,
        Commands::Call { number, yes } => call_number(&config, number, yes).await,
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<CallboxConfig> {
    let explicit = cli.config.is_some();
    let path = cli
        .config
        .clone()
        .or_else(|| dirs::config_dir().map(|dir| dir.join("callbox").join("config.toml")));

    let mut config = match path {
        Some(path) if explicit || path.exists() => CallboxConfig::load(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        _ => CallboxConfig::default(),
    };

    if let Some(platform) = cli.platform {
        config.platform = platform;
    }
    if let Some(url) = &cli.token_url {
        config.token_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn token_source(config: &CallboxConfig) -> Result<HttpTokenFetcher> {
    let fetcher = match config.token_timeout {
        Some(timeout) => HttpTokenFetcher::with_timeout(&config.token_url, timeout)?,
        None => HttpTokenFetcher::new(&config.token_url),
    };
    Ok(fetcher.require_success_status(config.require_token_status))
}

fn snapshot_storage(config: &CallboxConfig) -> Arc<dyn SnapshotStorage> {
    match &config.snapshot_path {
        Some(path) => Arc::new(FileSnapshotStorage::new(path)),
        None => Arc::new(MemorySnapshotStorage::new()),
    }
}

async fn build_manager(
    config: &CallboxConfig,
    lines: Arc<LineReader>,
) -> Result<Arc<VoiceSessionManager>> {
    let storage = snapshot_storage(config);
    let store = setup_session_store(storage.as_ref()).await;
    spawn_snapshot_persister(&store, storage);

    Ok(VoiceSessionManager::builder(
        Arc::new(LoopbackVoiceSdk::new()),
        Arc::new(token_source(config)?),
    )
    .config(config)
    .permission_gate(Arc::new(TerminalPermissionGate::new(lines)))
    .store(store)
    .build())
}

async fn print_token(config: &CallboxConfig) -> Result<()> {
    let token = token_source(config)?
        .fetch_token()
        .await
        .with_context(|| format!("fetching token from {}", config.token_url))?;
    println!("{}", token.as_str());
    Ok(())
}

async fn call_number(config: &CallboxConfig, number: String, yes: bool) -> Result<()> {
    let lines = Arc::new(LineReader::stdin());
    let manager = build_manager(config, lines.clone()).await?;

    println!("{}", "Initializing voice device...".dimmed());
    manager
        .initialize()?
        .wait()
        .await
        .context("voice device did not become ready")?;

    manager.set_destination_number(number);
    let outcome = if yes {
        manager.place_call(&StaticConfirmer::accepting()).await?
    } else {
        manager.place_call(&TerminalConfirmer::new(lines)).await?
    };
    report_outcome(&outcome);
    manager.shutdown();
    Ok(())
}

fn report_outcome(outcome: &CallOutcome) {
    match outcome {
        CallOutcome::Placed { to } => println!("{} {}", "Calling".green().bold(), to),
        CallOutcome::Declined => println!("{}", "Call cancelled".yellow()),
    }
}

async fn run_call_screen(config: &CallboxConfig) -> Result<()> {
    let lines = Arc::new(LineReader::stdin());
    let manager = build_manager(config, lines.clone()).await?;
    let confirmer = TerminalConfirmer::new(lines.clone());

    manager.store().set_navigation_state(NavigationState::new(serde_json::json!({
        "index": 0,
        "routes": [{ "routeName": CALL_SCREEN_ROUTE }]
    })));

    let mut changes = manager.store().subscribe();
    loop {
        let view = render(&changes.borrow_and_update());
        screen::draw(&view);

        if view == CallScreenView::Loading {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        bail!("session store closed");
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
            continue;
        }

        let Some(input) = lines.next_line().await else {
            break;
        };

        if input == "back" || input == "quit" {
            let state = manager.state();
            let route = state
                .navigation_state
                .active_route_name()
                .unwrap_or(CALL_SCREEN_ROUTE);
            if input == "quit" || can_exit(route, &config.exit_routes) {
                break;
            }
            continue;
        }

        match view {
            CallScreenView::Initialize | CallScreenView::Failed { .. } => {
                if let Err(e) = manager.initialize() {
                    warn!(error = %e, "Initialize rejected");
                }
            }
            CallScreenView::Dial { .. } if input == "call" => {
                match manager.place_call(&confirmer).await {
                    Ok(outcome) => report_outcome(&outcome),
                    Err(CallboxError::EmptyDestination) => {
                        println!("{}", "Enter a number first".yellow())
                    }
                    Err(e) => println!("{} {e}", "Call failed:".red()),
                }
            }
            CallScreenView::Dial { .. } => manager.set_destination_number(input),
            CallScreenView::Loading => {}
        }
    }

    manager.shutdown();
    Ok(())
}
