//! Acquisition listener bridge demo.
//!
//! Runs the supervised listener against a scripted mock acquisition and
//! logs the events it republishes. The script plays one short two-channel
//! time series, requests a hot-reset over the bus, then plays a second
//! session, so every event channel fires at least once.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use scopestream_common::init_tracing;
use scopestream_listener::adapter::AdapterError;
use scopestream_listener::bus::EventBus;
use scopestream_listener::config::ListenerBridgeConfig;
use scopestream_listener::mock::{self, MockAcquisition};
use scopestream_listener::supervisor::ListenerSupervisor;

/// Supervised listener bridging a microscope acquisition onto an event bus.
#[derive(Parser, Debug)]
#[command(name = "scopestream-listener")]
#[command(about = "Watches a microscope acquisition session and republishes frames as events")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "listener.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        ListenerBridgeConfig::load_from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        ListenerBridgeConfig::default()
    };

    if let Some(level) = args.log_level.clone() {
        config.logging.level = level;
    }
    init_tracing(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting scopestream-listener");

    let bus = EventBus::new();
    spawn_event_loggers(&bus);

    let acquisition = MockAcquisition::new();
    tokio::spawn(drive_demo(acquisition.clone(), bus.clone()));

    let factory = {
        let acquisition = acquisition.clone();
        move || Ok::<_, AdapterError>(acquisition.adapter())
    };
    let mut supervisor = ListenerSupervisor::new(factory, bus.clone(), config.listener.clone());
    supervisor.start()?;

    tokio::select! {
        result = supervisor.serve_resets() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    if supervisor.is_running() {
        supervisor.stop().await?;
    }
    info!("Listener stopped");

    Ok(())
}

/// Subscribe logging consumers to every data channel of the bus.
fn spawn_event_loggers(bus: &EventBus) {
    let mut sessions = bus.subscribe_session_detected();
    tokio::spawn(async move {
        while let Ok(marker) = sessions.recv().await {
            info!(marker, "Session detected");
        }
    });

    let mut settings = bus.subscribe_settings_changed();
    tokio::spawn(async move {
        while let Ok(settings) = settings.recv().await {
            info!(
                channels = settings.channels,
                slices = settings.slices,
                "Settings changed"
            );
        }
    });

    let mut frames = bus.subscribe_frame();
    tokio::spawn(async move {
        while let Ok(frame) = frames.recv().await {
            info!(
                timepoint = frame.timepoint,
                channel = frame.channel,
                elapsed_ms = ?frame.elapsed_ms,
                blank = frame.is_blank(),
                "Frame received"
            );
        }
    });

    let mut started = bus.subscribe_acquisition_started();
    tokio::spawn(async move {
        while started.recv().await.is_ok() {
            info!("Acquisition started");
        }
    });

    let mut ended = bus.subscribe_acquisition_ended();
    tokio::spawn(async move {
        while ended.recv().await.is_ok() {
            info!("Acquisition ended");
        }
    });
}

/// Scripted acquisition: two sessions with a hot-reset in between.
async fn drive_demo(acquisition: MockAcquisition, bus: EventBus) {
    acquisition.set_pixels(mock::plane_pixels(2, 32, 32));

    tokio::time::sleep(Duration::from_secs(2)).await;
    info!("Demo: starting first acquisition session");
    acquisition.start_session(mock::session_metadata(2, 0, 32, 32));

    for timepoint in 1..=5 {
        tokio::time::sleep(Duration::from_millis(800)).await;
        acquisition.set_timepoint_count(timepoint);
        acquisition.set_time_series_info(format!(
            "{} Frames ({:.1} s)",
            timepoint,
            timepoint as f64 * 0.8
        ));
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    info!("Demo: requesting hot-reset");
    bus.publish_reset();

    tokio::time::sleep(Duration::from_secs(1)).await;
    info!("Demo: starting second acquisition session");
    acquisition.start_session(mock::session_metadata(2, 0, 32, 32));

    for timepoint in 1..=3 {
        tokio::time::sleep(Duration::from_millis(800)).await;
        acquisition.set_timepoint_count(timepoint);
    }

    info!("Demo: script finished, press Ctrl+C to stop");
}
