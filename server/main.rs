use rail_live::models::{Roster, StationDirectory};
use rail_live::{LoadError, SimulationConfig, Simulator};
use std::env;
use std::path::Path;

fn read(path: &str) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_string(),
        source,
    })
}

fn load_config() -> Result<SimulationConfig, LoadError> {
    match env::var("RAIL_LIVE_CONFIG") {
        Ok(path) => SimulationConfig::load(Path::new(&path)),
        Err(_) => Ok(SimulationConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), LoadError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let stations_path = env::var("RAIL_LIVE_STATIONS").unwrap_or_else(|_| "data/stations.json".to_string());
    let roster_path = env::var("RAIL_LIVE_ROSTER").unwrap_or_else(|_| "data/trains.json".to_string());

    let config = load_config()?;
    let stations = StationDirectory::from_json(&read(&stations_path)?)?;
    let roster = Roster::from_json(&read(&roster_path)?)?;
    log::info!(
        "Loaded {} stations from {stations_path} and {} trains from {roster_path}",
        stations.len(),
        roster.len()
    );

    let simulator = Simulator::new(config, &roster, stations)?;

    // Every pushed event goes to stdout as one JSON line
    let mut subscription = simulator.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(event.as_ref()) {
                Ok(line) => println!("{line}"),
                Err(err) => log::warn!("Failed to serialize {} event: {err}", event.name()),
            }
        }
    });

    simulator.start();

    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {err}");
    }
    log::info!("Shutting down");
    simulator.stop().await;

    if let Err(err) = printer.await {
        log::warn!("Event printer ended abnormally: {err}");
    }
    Ok(())
}
