//! store.rs — the scenario store context
//!
//! An explicit context object owned by the application root (no ambient
//! singleton): the scenario state behind a `tokio::sync::RwLock`, the
//! remote gateway, and one request guard per network-refreshed field.
//!
//! Actions suspend only at gateway calls. Overlapping refreshes of the
//! same field resolve last-issued-wins: every call takes a monotonic
//! token before its request and its response is applied only while that
//! token is still the newest for the field. A stale response is dropped
//! on the floor instead of clobbering fresher state.
//!
//! Cascades are explicit. `add_waypoint` reports whether a route refresh
//! is due instead of secretly dispatching one; `run_simulation` is the
//! named composition of `fetch_results` + `fetch_kpis`.

use std::sync::atomic::{AtomicU64, Ordering};

use geojson::Feature;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use dtw_types::{ChartSlot, Climate, SimulationRequest};

use crate::gateway::{Gateway, GatewayError};
use crate::state::{Command, CommandError, ScenarioState};

// ── Errors & reports ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result of a waypoint mutation, telling the caller what to chain next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaypointChange {
    /// Waypoint count after the mutation.
    pub count: usize,
    /// Whether the route is now stale and should be recomputed.
    pub route_refresh_needed: bool,
}

/// Per-chart outcomes of one KPI refresh, in the fixed fetch order.
/// A failing endpoint is isolated here — it never blocks the other slots.
#[derive(Debug)]
pub struct ChartRefresh {
    pub outcomes: Vec<(ChartSlot, Result<(), GatewayError>)>,
}

impl ChartRefresh {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|(_, r)| r.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (ChartSlot, &GatewayError)> {
        self.outcomes
            .iter()
            .filter_map(|(slot, r)| r.as_ref().err().map(|e| (*slot, e)))
    }
}

#[derive(Debug)]
pub struct SimulationOutcome {
    /// False when the results response was superseded by a newer request
    /// and dropped; the chart refresh is skipped in that case.
    pub applied: bool,
    pub charts: Option<ChartRefresh>,
}

// ── Request guards ────────────────────────────────────────────────────────────

/// Monotonic generation counter for one network-refreshed field.
struct RequestGuard {
    issued: AtomicU64,
}

impl RequestGuard {
    fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
        }
    }

    /// Take the next token. Called before the network request.
    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A response may be applied only while its token is the newest.
    fn is_current(&self, token: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == token
    }
}

struct Guards {
    results: RequestGuard,
    route: RequestGuard,
    waterlevels: RequestGuard,
    climate: RequestGuard,
}

impl Guards {
    fn new() -> Self {
        Self {
            results: RequestGuard::new(),
            route: RequestGuard::new(),
            waterlevels: RequestGuard::new(),
            climate: RequestGuard::new(),
        }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

pub struct ScenarioStore {
    state: RwLock<ScenarioState>,
    gateway: Gateway,
    guards: Guards,
}

impl ScenarioStore {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            state: RwLock::new(ScenarioState::default()),
            gateway,
            guards: Guards::new(),
        }
    }

    // ── Read access ──────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> ScenarioState {
        self.state.read().await.clone()
    }

    pub async fn unit(&self) -> String {
        self.state.read().await.unit().to_string()
    }

    pub async fn expanded_fleet(&self) -> Vec<Feature> {
        self.state.read().await.expanded_fleet()
    }

    pub async fn request_payload(&self) -> SimulationRequest {
        self.state.read().await.request()
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Apply a single command under the write lock.
    pub async fn apply(&self, command: Command) -> Result<(), CommandError> {
        self.state.write().await.apply(command)
    }

    /// Append a waypoint. The returned change tells the caller whether the
    /// route became stale (more than one waypoint on board).
    pub async fn add_waypoint(&self, feature: Feature) -> Result<WaypointChange, CommandError> {
        let mut state = self.state.write().await;
        state.apply(Command::AddWaypoint(feature))?;
        let count = state.waypoints.len();
        Ok(WaypointChange {
            count,
            route_refresh_needed: count > 1,
        })
    }

    /// Remove the waypoint at `index`. The route is always stale after a
    /// removal, whatever remains.
    pub async fn remove_waypoint(&self, index: usize) -> Result<WaypointChange, CommandError> {
        let mut state = self.state.write().await;
        state.apply(Command::RemoveWaypoint(index))?;
        Ok(WaypointChange {
            count: state.waypoints.len(),
            route_refresh_needed: true,
        })
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    /// Recompute the route from the current waypoint order. Returns false
    /// when the response lost to a newer refresh and was dropped.
    pub async fn refresh_route(&self) -> Result<bool, StoreError> {
        let names = self.state.read().await.waypoint_names();
        let token = self.guards.route.issue();
        let route = self.gateway.find_route(names).await?;
        Ok(self
            .apply_guarded(&self.guards.route, token, Command::SetRoute(route))
            .await?)
    }

    /// `add_waypoint` plus the route refresh the UI cascade performs.
    pub async fn add_waypoint_and_refresh(
        &self,
        feature: Feature,
    ) -> Result<WaypointChange, StoreError> {
        let change = self.add_waypoint(feature).await?;
        if change.route_refresh_needed {
            self.refresh_route().await?;
        }
        Ok(change)
    }

    pub async fn remove_waypoint_and_refresh(
        &self,
        index: usize,
    ) -> Result<WaypointChange, StoreError> {
        let change = self.remove_waypoint(index).await?;
        self.refresh_route().await?;
        Ok(change)
    }

    /// Submit the current scenario. Returns whether the response was
    /// applied (false = superseded by a newer submission).
    pub async fn fetch_results(&self) -> Result<bool, StoreError> {
        let request = self.state.read().await.request();
        let token = self.guards.results.issue();
        let results = self.gateway.simulate(&request).await?;
        Ok(self
            .apply_guarded(&self.guards.results, token, Command::SetResults(results))
            .await?)
    }

    /// Refresh the three chart datasets from the current results, in the
    /// fixed order. Failures are collected per slot, never propagated.
    pub async fn fetch_kpis(&self) -> ChartRefresh {
        let results = self.state.read().await.results.clone();
        let mut outcomes = Vec::with_capacity(ChartSlot::ALL.len());
        for slot in ChartSlot::ALL {
            match self.gateway.chart(slot, &results).await {
                Ok(data) => {
                    let _ = self
                        .state
                        .write()
                        .await
                        .apply(Command::SetChart { slot, data });
                    outcomes.push((slot, Ok(())));
                }
                Err(e) => {
                    warn!("📉 {} chart refresh failed: {e}", slot.label());
                    outcomes.push((slot, Err(e)));
                }
            }
        }
        ChartRefresh { outcomes }
    }

    /// The full submission chain: simulate, then — only when the results
    /// actually landed — refresh the charts.
    pub async fn run_simulation(&self) -> Result<SimulationOutcome, StoreError> {
        let applied = self.fetch_results().await?;
        if !applied {
            return Ok(SimulationOutcome {
                applied,
                charts: None,
            });
        }
        let charts = self.fetch_kpis().await;
        Ok(SimulationOutcome {
            applied,
            charts: Some(charts),
        })
    }

    /// Fetch the waterlevel layer for a climate scenario.
    pub async fn compute_waterlevels(&self, climate: &Climate) -> Result<bool, StoreError> {
        let token = self.guards.waterlevels.issue();
        let layer = self.gateway.waterlevels(climate).await?;
        Ok(self
            .apply_guarded(
                &self.guards.waterlevels,
                token,
                Command::SetWaterlevels(layer),
            )
            .await?)
    }

    /// Record the climate input, then fetch and partition the combined
    /// climate layers.
    pub async fn compute_climate(&self, climate: Climate) -> Result<bool, StoreError> {
        self.apply(Command::SetClimate(climate.clone())).await?;
        let token = self.guards.climate.issue();
        let combined = self.gateway.climate(&climate).await?;
        Ok(self
            .apply_guarded(
                &self.guards.climate,
                token,
                Command::SetClimateResults(combined),
            )
            .await?)
    }

    pub async fn load_sites(&self) -> Result<(), StoreError> {
        let sites = self.gateway.sites().await?;
        self.apply(Command::SetSites(sites)).await?;
        Ok(())
    }

    pub async fn load_route(&self) -> Result<(), StoreError> {
        let route = self.gateway.routes().await?;
        self.apply(Command::SetRoute(route)).await?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn apply_guarded(
        &self,
        guard: &RequestGuard,
        token: u64,
        command: Command,
    ) -> Result<bool, CommandError> {
        let mut state = self.state.write().await;
        if !guard.is_current(token) {
            debug!("dropping stale response (token {token})");
            return Ok(false);
        }
        state.apply(command)?;
        Ok(true)
    }
}
