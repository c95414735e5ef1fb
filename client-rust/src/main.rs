//! main.rs — scenario console entry point
//!
//! Loads a scenario definition from a TOML file, drives the store actions
//! end-to-end against the simulation backend and persists the returned
//! results and chart datasets:
//!   1. load the static site catalogue (and reference route, if present)
//!   2. add the named waypoints, refreshing the route as it grows
//!   3. set fleet, operator and options
//!   4. compute the climate and waterlevel layers
//!   5. simulate and refresh the chart KPIs
//!   6. write the run artifacts to disk

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use dtw_client::gateway::{Gateway, GatewayConfig, SimulateVersion};
use dtw_client::persistence::save_run;
use dtw_client::state::Command;
use dtw_client::store::ScenarioStore;
use dtw_types::{CargoType, Climate, Operator, ShipSpec, SimulationOptions};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "dtw-client", about = "Digital Twin Waterways scenario console")]
struct Args {
    /// Scenario definition file
    #[arg(short, long, default_value = "scenario.toml")]
    scenario: String,
    /// Simulation API base URL (falls back to DTW_API_URL)
    #[arg(long)]
    api_url: Option<String>,
    /// Static data asset base URL (falls back to DTW_DATA_URL)
    #[arg(long)]
    data_url: Option<String>,
    /// Simulate endpoint revision: v1, v2 or v3
    #[arg(long, default_value = "v3")]
    simulate_version: String,
    /// Output directory for run artifacts
    #[arg(short, long, default_value = "runs")]
    out: PathBuf,
    /// Skip the chart-KPI refresh after the simulation
    #[arg(long)]
    skip_charts: bool,
}

// ── Scenario file ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    scenario: ScenarioSection,
    #[serde(default)]
    operator: Option<Operator>,
    #[serde(default)]
    climate: Climate,
    #[serde(default)]
    fleet: Vec<ShipSpec>,
}

#[derive(Debug, Deserialize)]
struct ScenarioSection {
    cargo_type: String,
    /// Site names (`properties.n`) to route through, in order.
    waypoints: Vec<String>,
    #[serde(default)]
    with_berth: bool,
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dtw_client=info".into()),
        )
        .init();

    let args = Args::parse();

    let scenario_str = std::fs::read_to_string(&args.scenario)
        .unwrap_or_else(|_| include_str!("../scenario.toml").to_string());
    let scenario: ScenarioFile =
        toml::from_str(&scenario_str).with_context(|| format!("parsing {}", args.scenario))?;

    let mut config = GatewayConfig::from_env();
    if let Some(api) = &args.api_url {
        config.data_url = format!("{}/data", api.trim_end_matches('/'));
        config.api_url = api.clone();
    }
    if let Some(data) = &args.data_url {
        config.data_url = data.clone();
    }
    config.simulate = args
        .simulate_version
        .parse::<SimulateVersion>()
        .map_err(|e| anyhow!(e))?;

    info!(
        "🌊 Digital Twin Waterways console — {} → {} ({})",
        args.scenario, config.api_url, config.simulate
    );

    let store = ScenarioStore::new(Gateway::new(config));

    store
        .apply(Command::SetCargoType(CargoType::from(
            scenario.scenario.cargo_type.clone(),
        )))
        .await?;
    if let Some(operator) = scenario.operator.clone() {
        store.apply(Command::SetOperator(operator)).await?;
    }
    store
        .apply(Command::SetOptions(SimulationOptions {
            with_berth: scenario.scenario.with_berth,
            ..Default::default()
        }))
        .await?;

    store.load_sites().await?;
    if let Err(e) = store.load_route().await {
        warn!("🗺 reference route unavailable: {e}");
    }
    let sites = store.snapshot().await.sites;
    info!("⚓ {} sites loaded", sites.features.len());

    for name in &scenario.scenario.waypoints {
        let feature = sites
            .features
            .iter()
            .find(|f| f.property("n").and_then(|v| v.as_str()) == Some(name.as_str()))
            .cloned()
            .ok_or_else(|| anyhow!("site '{name}' not found in the site catalogue"))?;
        let change = store.add_waypoint(feature).await?;
        if change.route_refresh_needed {
            store.refresh_route().await?;
        }
        info!("📍 Waypoint {name} added ({} total)", change.count);
    }

    let ship_total: u32 = scenario.fleet.iter().map(|s| s.count).sum();
    store.apply(Command::SetFleet(scenario.fleet)).await?;
    info!("🚢 Fleet set ({ship_total} ships)");

    store.compute_climate(scenario.climate.clone()).await?;
    store.compute_waterlevels(&scenario.climate).await?;
    let snapshot = store.snapshot().await;
    info!(
        "🌡 Climate layers ready ({} waterlevel / {} bathymetry / {} velocity features)",
        snapshot.waterlevels.base().features.len(),
        snapshot.bathymetry.base().features.len(),
        snapshot.velocities.base().features.len(),
    );

    if args.skip_charts {
        store.fetch_results().await?;
    } else {
        let outcome = store.run_simulation().await?;
        if let Some(charts) = &outcome.charts {
            for (slot, err) in charts.failures() {
                warn!("📉 {} chart unavailable: {err}", slot.label());
            }
        }
    }

    let snapshot = store.snapshot().await;
    let log_entries = snapshot
        .results
        .log
        .as_ref()
        .map(|l| l.features.len())
        .unwrap_or(0);
    info!("🏁 Simulation finished — {log_entries} log entries");

    let dir = save_run(&args.out, &snapshot).await?;
    info!("✅ Done: {}", dir.display());
    Ok(())
}
