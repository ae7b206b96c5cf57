use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use clawbot_common::traits::{Clock, RedemptionSink, SystemClock};
use clawbot_core::ClawConfig;
use clawbot_core::DefaultHttpClient;
use clawbot_core::delivery::{DeliveryDispatcher, DigitalMethod, HttpRewardProvider, OfflineCodeProvider};
use clawbot_core::eventbus::EventBus;
use clawbot_core::eventbus::redemption_logger::{JsonlRedemptionSink, spawn_redemption_logger_task};
use clawbot_core::ingestion::EventIngestion;
use clawbot_core::prizes::{PrizeAllocator, default_catalog, rng_from_seed};
use clawbot_core::queue::QueueManager;
use clawbot_core::services::GameService;
use clawbot_core::tasks::{spawn_admission_worker, spawn_queue_maintenance_task, spawn_scheduler_task};
use clawbot_core::web::{self, AppState};

#[derive(Parser, Debug, Clone)]
#[command(name = "clawbot")]
#[command(author, version, about = "ClawBot - stream-driven claw machine: webhook queue, prizes and delivery")]
struct Args {
    /// Address the HTTP server binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Optional JSON config file; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append-only JSON-lines file for redemptions
    #[arg(long, default_value = "redemptions.jsonl")]
    redemption_log: PathBuf,

    /// Seed for win rolls and prize picks (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,

    /// Overrides queue.max_concurrent_players
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, default_value = "10")]
    grace_secs: u64,
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("clawbot=info".parse()?)
        .add_directive("clawbot_core=info".parse()?);
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub).context("Failed to set global subscriber")?;
    if let Err(e) = tracing_log::LogTracer::init() {
        warn!("log bridge not installed: {}", e);
    }
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ClawConfig> {
    let mut config = match &args.config {
        Some(path) => ClawConfig::from_json_file(path)
            .with_context(|| format!("reading config from {}", path.display()))?,
        None => ClawConfig::default(),
    };

    config.webhook.secret = std::env::var("CLAWBOT_WEBHOOK_SECRET")
        .or_else(|_| std::env::var("TWITCH_WEBHOOK_SECRET"))
        .unwrap_or_default();
    if config.webhook.secret.is_empty() {
        bail!("CLAWBOT_WEBHOOK_SECRET (or TWITCH_WEBHOOK_SECRET) must be set");
    }
    config.api.controller_token = std::env::var("CLAWBOT_CONTROLLER_TOKEN").unwrap_or_default();
    if config.api.controller_token.is_empty() {
        bail!("CLAWBOT_CONTROLLER_TOKEN must be set; the machine controller authenticates with it");
    }
    if let Some(n) = args.max_concurrent {
        config.queue.max_concurrent_players = n;
    }
    if args.seed.is_some() {
        config.prizes.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn build_dispatcher(config: &ClawConfig, clock: Arc<dyn Clock>) -> anyhow::Result<DeliveryDispatcher> {
    let mut dispatcher = DeliveryDispatcher::new(config.delivery.clone(), clock);
    dispatcher.register(
        "steam",
        Arc::new(OfflineCodeProvider::default()),
        DigitalMethod::Code,
        "Redeem at store.steampowered.com/account/redeemwalletcode",
    );

    match (std::env::var("TILLO_API_URL"), std::env::var("TILLO_API_KEY")) {
        (Ok(url), Ok(key)) if !url.is_empty() => {
            info!("Using HTTP reward provider at {}", url);
            let http = Arc::new(
                DefaultHttpClient::with_timeout(config.delivery.provider_timeout())
                    .context("building the reward provider HTTP client")?,
            );
            dispatcher.register(
                "tillo",
                Arc::new(HttpRewardProvider::new(http, &url, &key)),
                DigitalMethod::Link,
                "Open the link to claim your gift card",
            );
        }
        _ => {
            dispatcher.register(
                "tillo",
                Arc::new(OfflineCodeProvider::default()),
                DigitalMethod::Link,
                "Open the link to claim your gift card",
            );
        }
    }
    Ok(dispatcher)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;
    let args = Args::parse();
    info!("ClawBot starting. bind={}, seed={:?}", args.bind, args.seed);

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 1) Event bus and core components
    let event_bus = Arc::new(EventBus::new());
    let ingestion = Arc::new(EventIngestion::new(config.webhook.clone(), clock.clone()));
    let queue = Arc::new(QueueManager::new(config.queue.clone(), clock.clone()));
    let prizes = Arc::new(PrizeAllocator::new(
        config.prizes.clone(),
        default_catalog(clock.now()),
        clock.clone(),
        rng_from_seed(config.prizes.seed),
    ));
    let delivery = Arc::new(build_dispatcher(&config, clock.clone())?);
    let game = Arc::new(GameService::new(queue, prizes, delivery, event_bus.clone()));

    // 2) Background tasks
    let worker_handle = spawn_admission_worker(game.clone(), &event_bus).await;
    let scheduler_handle = spawn_scheduler_task(
        game.clone(),
        &event_bus,
        Duration::from_millis(config.tasks.scheduler_interval_ms),
    );
    let maintenance_handle = spawn_queue_maintenance_task(
        game.clone(),
        ingestion.dedup(),
        clock.clone(),
        &event_bus,
        Duration::from_millis(config.tasks.cleanup_interval_ms),
    );
    let sink: Arc<dyn RedemptionSink> = Arc::new(JsonlRedemptionSink::new(args.redemption_log.clone()));
    let logger_handle = spawn_redemption_logger_task(
        &event_bus,
        sink,
        config.tasks.logger_batch_size,
        Duration::from_millis(config.tasks.logger_flush_interval_ms),
    )
    .await;

    // 3) Ctrl-C flips the shared shutdown signal
    {
        let bus = event_bus.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            info!("Ctrl-C received; shutting down.");
            bus.shutdown();
        });
    }

    // 4) HTTP server
    let app = web::router(
        AppState {
            ingestion,
            game,
            event_bus: event_bus.clone(),
            controller_token: config.api.controller_token.as_str().into(),
        },
        Duration::from_millis(config.webhook.request_timeout_ms),
    );
    info!("Listening on {}", args.bind);
    let served = web::serve(
        args.bind,
        app,
        event_bus.shutdown_rx.clone(),
        Duration::from_secs(args.grace_secs),
    )
    .await;
    // The server may also stop on its own (bind failure); make sure tasks exit.
    event_bus.shutdown();

    for (name, handle) in [
        ("admission worker", worker_handle),
        ("scheduler", scheduler_handle),
        ("maintenance", maintenance_handle),
        ("redemption logger", logger_handle),
    ] {
        if let Err(e) = handle.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }

    served?;
    Ok(())
}
