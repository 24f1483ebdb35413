use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herald_agents::{
    CommitAgent, GameAlertAgent, PriceAgent, SalesAgent, Scheduler, WeatherAgent,
    adapters::{GithubCommitFeed, HumbleStorefront, NwsWeatherFeed, WorldStateFeed},
};
use herald_channels::{DiscordTransport, NotificationBus};
use herald_commands::{
    Dispatcher,
    convert::{CurrencyCmd, TimeCmd},
    handlers::{
        AddSub, DelGit, DelSale, DelSub, GitWatch, MuteCmd, Promote, SaleWatchCmd, Severity,
        UnmuteCmd,
    },
    registration::{DeleteUser, RegisterUser, RegistrationClient, UpdateUser},
    solve::Solve,
};
use herald_core::transport::{ChatTransport, TransportEvent};
use herald_relay::{Relay, spawn_mute_sweep};
use herald_store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::HeraldConfig;

#[derive(Parser)]
#[command(name = "herald")]
#[command(version)]
#[command(about = "herald - a chat notification daemon")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the herald daemon
    Start,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Start => cmd_start(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = toml::to_string_pretty(&HeraldConfig::default())?;
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("herald initialized at {}", config_dir.display());
    println!(
        "Edit {} to set your Discord token and watches.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = HeraldConfig::load(config_path)?;
    println!("{cfg:#?}");
    Ok(())
}

fn build_dispatcher(cfg: &HeraldConfig, store: Arc<SqliteStore>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(store.clone(), store);

    dispatcher.register(Arc::new(AddSub));
    dispatcher.register(Arc::new(DelSub));
    dispatcher.register(Arc::new(Severity));
    dispatcher.register(Arc::new(GitWatch));
    dispatcher.register(Arc::new(DelGit));
    dispatcher.register(Arc::new(SaleWatchCmd));
    dispatcher.register(Arc::new(DelSale));
    dispatcher.register(Arc::new(Promote));
    dispatcher.register(Arc::new(MuteCmd));
    dispatcher.register(Arc::new(UnmuteCmd));
    dispatcher.register(Arc::new(Solve));
    dispatcher.register(Arc::new(TimeCmd));
    dispatcher.register(Arc::new(CurrencyCmd::new(cfg.currency.base_url.clone())));

    if let Some(registration) = &cfg.registration {
        let client = Arc::new(RegistrationClient::new(
            registration.base_url.clone(),
            registration.api_key.clone(),
        ));
        dispatcher.register(Arc::new(RegisterUser::new(client.clone())));
        dispatcher.register(Arc::new(DeleteUser::new(client.clone())));
        dispatcher.register(Arc::new(UpdateUser::new(client)));
    }

    info!("Registered {} commands", dispatcher.command_count());
    dispatcher
}

fn build_scheduler(
    cfg: &HeraldConfig,
    store: Arc<SqliteStore>,
    relay: Arc<Relay>,
    cancel: CancellationToken,
) -> Scheduler {
    let mut scheduler = Scheduler::new(cancel);
    let agents = &cfg.agents;

    if agents.commits.enabled {
        scheduler.register(Arc::new(CommitAgent::new(
            Arc::new(GithubCommitFeed::new()),
            store.clone(),
            store.clone(),
            relay.clone(),
            Duration::from_secs(agents.commits.interval_secs),
        )));
    }
    if agents.sales.enabled {
        scheduler.register(Arc::new(SalesAgent::new(
            Arc::new(HumbleStorefront::new()),
            store.clone(),
            relay.clone(),
            Duration::from_secs(agents.sales.interval_secs),
        )));
    }
    if agents.game_alerts.enabled {
        scheduler.register(Arc::new(GameAlertAgent::new(
            Arc::new(WorldStateFeed::new()),
            agents.game_alerts.watched_items.clone(),
            store.clone(),
            relay.clone(),
            Duration::from_secs(agents.game_alerts.interval_secs),
        )));
    }
    if agents.weather.enabled {
        scheduler.register(Arc::new(WeatherAgent::new(
            Arc::new(NwsWeatherFeed::new()),
            store.clone(),
            store.clone(),
            relay.clone(),
            Duration::from_secs(agents.weather.interval_secs),
        )));
    }
    if agents.prices.enabled {
        scheduler.register(Arc::new(PriceAgent::new(
            Arc::new(HumbleStorefront::new()),
            store.clone(),
            relay.clone(),
            Duration::from_secs(agents.prices.interval_secs),
        )));
    }

    scheduler
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = HeraldConfig::load(config_path)?;
    info!("Starting herald daemon...");

    let cancel = CancellationToken::new();

    if let Some(parent) = cfg.store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(&cfg.store.path).context("Failed to open store")?);
    info!("Store opened at {}", cfg.store.path.display());

    let transport: Arc<DiscordTransport> = Arc::new(DiscordTransport::new(
        cfg.discord.token.clone(),
        cfg.discord.allowed_users.clone(),
    ));
    let relay = Arc::new(Relay::new(transport.clone(), store.clone()));

    let (event_tx, mut event_rx) = mpsc::channel::<TransportEvent>(100);
    transport
        .start(event_tx)
        .await
        .context("Failed to start chat transport")?;

    // Bus listener plus a forwarder pushing bus notifications into the relay
    if cfg.bus.enabled {
        let bus = NotificationBus::bind(&cfg.bus.bind)
            .await
            .with_context(|| format!("Failed to bind bus on {}", cfg.bus.bind))?;
        info!("Notification bus listening on {}", cfg.bus.bind);

        let (notify_tx, mut notify_rx) = mpsc::channel(100);
        tokio::spawn(bus.run(notify_tx, cancel.clone()));

        let bus_relay = relay.clone();
        tokio::spawn(async move {
            while let Some(notification) = notify_rx.recv().await {
                bus_relay.deliver(&notification).await;
            }
        });
    }

    let dispatcher = build_dispatcher(&cfg, store.clone());

    let scheduler = build_scheduler(&cfg, store.clone(), relay.clone(), cancel.clone());
    let agent_handles = scheduler.start_all();

    let sweep_handle = spawn_mute_sweep(
        store.clone(),
        Duration::from_secs(cfg.sweep.interval_secs),
        cancel.clone(),
    );

    info!("herald is running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutting down...");
                cancel.cancel();
                break;
            }
            event = event_rx.recv() => {
                match event {
                    Some(TransportEvent::Message { sender, body }) => {
                        let reply = match dispatcher.dispatch(&sender, &body).await {
                            Ok(reply) => reply,
                            Err(e) => {
                                error!("Command from {} failed: {:#}", sender, e);
                                "Something went wrong, try again later.".to_string()
                            }
                        };
                        if let Err(e) = transport.send_message(&sender, &reply).await {
                            warn!("Failed to reply to {}: {}", sender, e);
                        }
                    }
                    Some(TransportEvent::Presence { handle, busy }) => {
                        relay.set_busy(&handle, busy).await;
                    }
                    None => {
                        info!("Transport closed");
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    for handle in agent_handles {
        let _ = handle.await;
    }
    let _ = sweep_handle.await;
    info!("herald stopped");
    Ok(())
}
