use std::sync::Arc;

use log::info;

use pindrive::{GpioConfig, GpioCore};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PINDRIVE_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let config = Arc::new(
        GpioConfig::load_from_file(&config_path)
            .unwrap_or_else(|e| panic!("Failed to load config: {e}")),
    );

    let core =
        GpioCore::init(config).unwrap_or_else(|e| panic!("Failed to init gpio subsystem: {e}"));
    core.start_monitoring();

    info!("Gpio core running, press ctrl-c to shut down");
    tokio::signal::ctrl_c().await?;

    if let Err(e) = core.shutdown() {
        eprintln!("Shutdown incomplete: {e}");
    }
    Ok(())
}
