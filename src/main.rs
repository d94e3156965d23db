use color_eyre::{eyre::eyre, Result};
use jogwheel::config::CONFIG_ENV;
use jogwheel::controller::LineCollector;
use jogwheel::engine::SimulatedTransport;
use jogwheel::jog::DispatcherHandle;
use jogwheel::JogConfig;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config().await?;
    info!(
        "Jog wheel: {} ticks/rev, max gain {}, scrub gain {}",
        config.ticks_per_revolution, config.max_dynamic_gain, config.direct_scrub_gain
    );

    let transport = SimulatedTransport::new();
    let dispatcher = DispatcherHandle::spawn(config.clone(), Box::new(transport.clone()));
    let collector = LineCollector::new(dispatcher.sender(), transport, config.midi.clone());

    // Lines on stdin until EOF or Ctrl-C
    info!("Reading jog messages from stdin");
    tokio::select! {
        result = collector.run(BufReader::new(tokio::io::stdin())) => {
            let forwarded = result.map_err(|e| eyre!("Collector failed: {}", e))?;
            info!("Collector finished, {} messages forwarded", forwarded);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
            info!("Ctrl-C received");
        }
    }

    let stats = dispatcher
        .shutdown()
        .await
        .map_err(|e| eyre!("Dispatcher failed: {}", e))?;
    info!(
        "Done: {} turns, {} releases, {} stale releases",
        stats.turns, stats.releases, stats.stale_releases
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging();
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .with_writer(std::io::stderr)
        .init();
}

async fn load_config() -> Result<JogConfig> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        return JogConfig::load(&path)
            .await
            .map_err(|e| eyre!("Failed to load {}: {}", path.display(), e));
    }

    match JogConfig::default_path() {
        Some(path) => {
            if let Err(e) = JogConfig::ensure_default_config(&path).await {
                warn!("Could not write default config: {}", e);
            }
            JogConfig::load_or_default(&path)
                .await
                .map_err(|e| eyre!("Failed to load {}: {}", path.display(), e))
        }
        None => {
            warn!("No config directory on this platform, using defaults");
            Ok(JogConfig::default())
        }
    }
}
