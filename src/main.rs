use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossterm::event::Event;
use tokio::sync::{mpsc, watch};

use demark_monitor::alert::{run_alert_loop, AlertEvaluator, AlertNotifier};
use demark_monitor::candle_store::{spawn_store_worker, CandleStore, StoreRecord};
use demark_monitor::clock::{BoundaryScheduler, Granularity, SystemClock};
use demark_monitor::config::Config;
use demark_monitor::event::AppEvent;
use demark_monitor::feed::rest::RestClient;
use demark_monitor::feed::ws::FeedClient;
use demark_monitor::history::HistoryManager;
use demark_monitor::input::{is_quit_key, parse_main_command};
use demark_monitor::model::candle::Candle;
use demark_monitor::pipeline::{Pipeline, PipelineInput, WindowSnapshot};
use demark_monitor::ui::{self, AppState};

/// Historic candles from the exchange, or from the local store when the exchange is unreachable.
async fn load_seed(
    rest: &RestClient,
    store: Option<&CandleStore>,
    config: &Config,
    granularity: Granularity,
) -> Vec<Candle> {
    let product = &config.feed.product;
    match rest.get_candles(product, granularity).await {
        Ok(mut candles) => {
            candles.truncate(config.candles.history_len);
            candles
        }
        Err(e) => {
            tracing::warn!(error = %e, "Historic candle fetch failed");
            let Some(store) = store else {
                return Vec::new();
            };
            match store.recent_candles(product, config.candles.history_len) {
                Ok(candles) => {
                    tracing::info!(count = candles.len(), "Seeding from local store");
                    candles
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Local store seed failed");
                    Vec::new()
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set DEMARK_CONFIG or provide config/default.toml");
            std::process::exit(1);
        }
    };
    let granularity = config.candles.granularity()?;

    // Init tracing (log to file so it doesn't interfere with TUI)
    let log_file = std::fs::File::create(&config.logging.file)
        .with_context(|| format!("failed to create {}", config.logging.file))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(&config.logging.level)
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        product = %config.feed.product,
        granularity = %granularity,
        rest_url = %config.feed.rest_base_url,
        ws_url = %config.feed.ws_url,
        timer_mode = ?config.candles.timer_mode,
        "Starting demark-monitor"
    );

    // Channels
    let (app_tx, mut app_rx) = mpsc::channel::<AppEvent>(256);
    let (input_tx, input_rx) = mpsc::channel::<PipelineInput>(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let store = if config.storage.enabled {
        Some(
            CandleStore::open(Path::new(&config.storage.path))
                .with_context(|| format!("failed to open {}", config.storage.path))?,
        )
    } else {
        None
    };

    let rest = RestClient::new(&config.feed.rest_base_url)?;
    if let Err(e) = rest.ping().await {
        tracing::warn!(error = %e, "Exchange REST endpoint unreachable");
    }
    let seed = load_seed(&rest, store.as_ref(), &config, granularity).await;
    let seeded = seed.len();
    if !seed.is_empty() {
        input_tx
            .send(PipelineInput::Backfill(seed))
            .await
            .context("pipeline input channel closed before start")?;
    }

    let manager = HistoryManager::new(granularity, config.candles.history_len, config.indicator);
    let mut pipeline = Pipeline::new(manager, &config.feed.product, app_tx.clone())
        .with_display_len(config.ui.display_len)
        .with_preview_interval(Duration::from_millis(config.candles.preview_interval_ms));

    if let Some(store) = store {
        let (store_tx, store_rx) = mpsc::channel::<StoreRecord>(1024);
        spawn_store_worker(store, store_rx);
        pipeline = pipeline.with_store(store_tx);
    }

    if config.alerts.enabled {
        let (alert_tx, alert_rx) = mpsc::channel::<WindowSnapshot>(64);
        let evaluator = AlertEvaluator::new(&config.alerts);
        let notifier = AlertNotifier::new(config.alerts.webhook_url.clone());
        tokio::spawn(run_alert_loop(
            evaluator,
            notifier,
            alert_rx,
            app_tx.clone(),
            shutdown_rx.clone(),
        ));
        pipeline = pipeline.with_alerts(alert_tx);
    }

    let pipeline_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let manager = pipeline.run(input_rx, pipeline_shutdown).await;
        tracing::info!(len = manager.current_window().len(), "Pipeline stopped");
    });

    BoundaryScheduler::new(granularity, config.candles.timer_mode, SystemClock)
        .spawn(input_tx.clone(), shutdown_rx.clone());

    let feed = FeedClient::new(&config.feed.ws_url, &config.feed.product);
    let feed_app_tx = app_tx.clone();
    let feed_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = feed
            .connect_and_run(input_tx, feed_app_tx.clone(), feed_shutdown)
            .await
        {
            tracing::warn!(error = %e, "Feed task failed");
            let _ = feed_app_tx
                .send(AppEvent::Error(format!("Feed task failed: {}", e)))
                .await;
        }
    });

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    // TUI main loop
    let mut terminal = ratatui::init();
    let mut app_state = AppState::new(&config.feed.product, granularity.as_str());
    app_state.push_log(format!(
        "demark-monitor started | {} {} | {} seed candles",
        config.feed.product, granularity, seeded
    ));

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| ui::render(frame, &app_state)) {
            break Err(e.into());
        }

        match crossterm::event::poll(Duration::from_millis(config.ui.refresh_rate_ms)) {
            Ok(true) => match crossterm::event::read() {
                Ok(Event::Key(key)) => {
                    if is_quit_key(&key.code) {
                        tracing::info!("User quit");
                        let _ = shutdown_tx.send(true);
                        break Ok(());
                    }
                    if let Some(cmd) = parse_main_command(&key.code) {
                        app_state.handle_command(cmd);
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }

        // Drain events from channel
        while let Ok(evt) = app_rx.try_recv() {
            app_state.apply(evt);
        }

        if *shutdown_rx.borrow() {
            break Ok(());
        }
    };

    let _ = shutdown_tx.send(true);
    ratatui::restore();
    tracing::info!("Shutdown complete");
    println!("Goodbye! Check {} for details.", config.logging.file);
    result
}
