mod account_commands;

use std::{sync::Arc, time::Duration};

use {
    clap::{Parser, Subcommand},
    dcbridge_channels::{BroadcastBus, HostEvent, InboundEvent, Published, SessionRegistry},
    dcbridge_discord::{
        CommandHandler, ConnectOutcome, ConnectionManager, NetworkOptions, SerenityConnector,
        commands,
    },
    tokio::sync::broadcast::{self, error::RecvError},
    tracing::{debug, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "dcbridge", about = "dcbridge, Discord accounts for your bot framework")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/dcbridge/).
    #[arg(long, global = true, env = "DCBRIDGE_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect every configured account and serve until Ctrl-C (default).
    Run,
    /// Account management.
    Accounts {
        #[command(subcommand)]
        action: account_commands::AccountAction,
    },
    #[command(flatten)]
    Network(account_commands::NetworkAction),
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        dcbridge_config::set_config_dir(dir.clone());
    }
    let config_path = dcbridge_config::find_or_default_config_path();

    match cli.command {
        None | Some(Commands::Run) => run(config_path).await,
        Some(Commands::Accounts { action }) => {
            account_commands::handle_accounts(action, &config_path)
        },
        Some(Commands::Network(action)) => account_commands::handle_network(action, &config_path),
    }
}

async fn run(config_path: std::path::PathBuf) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "dcbridge starting");

    let config = dcbridge_config::discover_and_load();
    if config.token.is_empty() {
        warn!("no discord accounts configured, add one with `dcbridge accounts add <token>`");
    }

    let registry = Arc::new(SessionRegistry::new());
    let bus = Arc::new(BroadcastBus::default());
    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&registry),
        bus.clone(),
        Arc::new(SerenityConnector),
        NetworkOptions::from_config(&config),
    )?);

    let handler = Arc::new(CommandHandler::new(Arc::clone(&manager), config_path));
    tokio::spawn(commands::serve(
        handler,
        Arc::clone(&registry),
        bus.subscribe(),
    ));
    tokio::spawn(log_events(bus.subscribe()));

    let timeout = Duration::from_secs(config.connect_timeout_secs);
    let outcomes = manager.connect_all(config.token.clone(), timeout).await;
    let connected = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, ConnectOutcome::Connected { .. }))
        .count();
    for outcome in &outcomes {
        match outcome {
            ConnectOutcome::Connected { .. } => {},
            ConnectOutcome::Failed { credential, error } => {
                warn!(credential, error, "account did not connect");
            },
            ConnectOutcome::Pending { credential } => {
                info!(credential, "account still connecting");
            },
        }
    }
    info!(
        connected,
        configured = outcomes.len(),
        "dcbridge ready, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for self_id in registry.list() {
        manager.disconnect(&self_id).await;
    }
    Ok(())
}

/// Mirror bus traffic into the log.
async fn log_events(mut events: broadcast::Receiver<Published>) {
    loop {
        match events.recv().await {
            Ok(Published { topic, event }) => match event.as_ref() {
                HostEvent::Connect { self_id } if topic == "connect" => {
                    info!(self_id, "account online");
                },
                HostEvent::Message(message) if topic == "message" => {
                    match describe(message) {
                        Ok(json) => debug!(topic, event = %json, "host event"),
                        Err(e) => warn!(topic, error = %e, "failed to serialize host event"),
                    }
                },
                _ => {},
            },
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged behind the bus"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// JSON rendering of an inbound event with command credentials redacted.
fn describe(message: &InboundEvent) -> serde_json::Result<String> {
    let json = serde_json::to_string(message)?;
    Ok(commands::redact_credentials(&message.plain_text(), &json))
}
