//! state.rs — the scenario state container
//!
//! One `ScenarioState` instance holds everything the view layer reads:
//! the scenario definition (cargo type, waypoints, fleet, operator,
//! climate, options), the derived request state (route, environmental
//! layers, results, charts) and the UI-only playback position.
//!
//! Mutation goes through exactly one door: [`ScenarioState::apply`] with a
//! [`Command`]. Getters are pure projections of the current state and are
//! recomputed on every read.

use chrono::{DateTime, Utc};
use geojson::{Feature, FeatureCollection};
use thiserror::Error;

use dtw_types::{
    empty_collection, CargoType, ChartData, ChartSet, ChartSlot, Climate, Operator,
    Quantities, ShipSpec, SimulationOptions, SimulationRequest, SimulationResults,
    Waypoint, WaypointError,
};

use crate::derive;

// ── Environmental layers ──────────────────────────────────────────────────────

/// An environmental layer and its buffered display variant.
///
/// The buffered collection is recomputed (500 m planar buffer) whenever the
/// base is replaced and can never be set directly — that invariant is the
/// whole reason this is a type and not two fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPair {
    base: FeatureCollection,
    buffered: FeatureCollection,
}

impl LayerPair {
    pub fn empty() -> Self {
        Self {
            base: empty_collection(),
            buffered: empty_collection(),
        }
    }

    pub fn new(base: FeatureCollection) -> Self {
        let buffered = derive::buffer_collection(&base, derive::BUFFER_RADIUS_M);
        Self { base, buffered }
    }

    pub fn replace(&mut self, base: FeatureCollection) {
        *self = Self::new(base);
    }

    pub fn base(&self) -> &FeatureCollection {
        &self.base
    }

    pub fn buffered(&self) -> &FeatureCollection {
        &self.buffered
    }
}

// ── Playback ──────────────────────────────────────────────────────────────────

/// Playback position of the results animation. UI-only, never part of a
/// request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub current_time: Option<DateTime<Utc>>,
    /// 0–100 scaled scrub position.
    pub progress: f64,
    pub play: bool,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            current_time: None,
            progress: 0.0,
            play: false,
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// The closed set of state mutations. Every variant replaces state
/// wholesale; there are no partial merges.
#[derive(Debug, Clone)]
pub enum Command {
    SetResults(SimulationResults),
    SetSites(FeatureCollection),
    SetRoute(FeatureCollection),
    SetFleet(Vec<ShipSpec>),
    SetOperator(Operator),
    SetCargoType(CargoType),
    SetClimate(Climate),
    SetOptions(SimulationOptions),
    /// Replace the waterlevels base layer; its buffered variant is
    /// recomputed in the same apply.
    SetWaterlevels(FeatureCollection),
    /// Partition a combined climate response into the three environmental
    /// layers (by `waterlevel` / `nap_p50` / `velocity` key presence) and
    /// replace all of them, buffered variants included.
    SetClimateResults(FeatureCollection),
    SetChart { slot: ChartSlot, data: ChartData },
    /// Append a waypoint. The feature must carry a `properties.n` site
    /// identifier; cargo-type defaults are merged without overwriting.
    AddWaypoint(Feature),
    RemoveWaypoint(usize),
    SetPlay(bool),
    SetCurrentTime(Option<DateTime<Utc>>),
    SetProgress(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("site feature has no `n` identifier property")]
    MissingSiteName,
    #[error("waypoint index {index} out of range ({len} waypoints)")]
    WaypointIndexOutOfRange { index: usize, len: usize },
    #[error("site feature has malformed properties: {0}")]
    InvalidWaypoint(String),
}

impl From<WaypointError> for CommandError {
    fn from(e: WaypointError) -> Self {
        match e {
            WaypointError::MissingSiteName => Self::MissingSiteName,
            WaypointError::InvalidProperties(err) => Self::InvalidWaypoint(err.to_string()),
        }
    }
}

// ── Scenario state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioState {
    pub cargo_type: CargoType,
    /// Ordered — traversal order defines the route and its endpoints.
    pub waypoints: Vec<Waypoint>,
    pub fleet: Vec<ShipSpec>,
    pub operator: Operator,
    pub climate: Climate,
    pub options: SimulationOptions,
    /// Available sites loaded from the static `sites.json` asset.
    pub sites: FeatureCollection,
    /// The computed route. Always replaced wholesale — a cached function
    /// of the current waypoints resolved through the gateway.
    pub route: FeatureCollection,
    pub waterlevels: LayerPair,
    pub bathymetry: LayerPair,
    pub velocities: LayerPair,
    pub results: SimulationResults,
    pub charts: ChartSet,
    pub playback: Playback,
}

impl Default for ScenarioState {
    fn default() -> Self {
        Self {
            cargo_type: CargoType::default(),
            waypoints: Vec::new(),
            fleet: Vec::new(),
            operator: Operator::default(),
            climate: Climate::default(),
            options: SimulationOptions::default(),
            sites: empty_collection(),
            route: empty_collection(),
            waterlevels: LayerPair::empty(),
            bathymetry: LayerPair::empty(),
            velocities: LayerPair::empty(),
            results: SimulationResults::default(),
            charts: ChartSet::default(),
            playback: Playback::default(),
        }
    }
}

impl ScenarioState {
    /// The single mutation entry point. On error the state is unchanged.
    pub fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::SetResults(results) => self.results = results,
            Command::SetSites(sites) => self.sites = sites,
            Command::SetRoute(route) => self.route = route,
            Command::SetFleet(fleet) => self.fleet = fleet,
            Command::SetOperator(operator) => self.operator = operator,
            Command::SetCargoType(cargo_type) => self.cargo_type = cargo_type,
            Command::SetClimate(climate) => self.climate = climate,
            Command::SetOptions(options) => self.options = options,
            Command::SetWaterlevels(layer) => self.waterlevels.replace(layer),
            Command::SetClimateResults(combined) => {
                let parts = derive::partition_climate(&combined);
                self.waterlevels.replace(parts.waterlevels);
                self.bathymetry.replace(parts.bathymetry);
                self.velocities.replace(parts.velocities);
            }
            Command::SetChart { slot, data } => self.charts.set(slot, data),
            Command::AddWaypoint(feature) => {
                let mut waypoint = Waypoint::from_feature(&feature)?;
                waypoint
                    .properties
                    .merge_defaults(&self.cargo_type.default_site_properties());
                self.waypoints.push(waypoint);
            }
            Command::RemoveWaypoint(index) => {
                if index >= self.waypoints.len() {
                    return Err(CommandError::WaypointIndexOutOfRange {
                        index,
                        len: self.waypoints.len(),
                    });
                }
                self.waypoints.remove(index);
            }
            Command::SetPlay(play) => self.playback.play = play,
            Command::SetCurrentTime(time) => self.playback.current_time = time,
            Command::SetProgress(progress) => {
                self.playback.progress = progress.clamp(0.0, 100.0)
            }
        }
        Ok(())
    }

    // ── Getters (pure, recomputed on read) ───────────────────────────────────

    /// Display unit for the current cargo type ("Tonne", "TEU" or "").
    pub fn unit(&self) -> &str {
        self.cargo_type.unit()
    }

    /// Site identifiers of the current waypoints, in traversal order.
    pub fn waypoint_names(&self) -> Vec<String> {
        self.waypoints.iter().map(|w| w.name.clone()).collect()
    }

    /// One feature per ship unit, on the first route geometry.
    pub fn expanded_fleet(&self) -> Vec<Feature> {
        derive::expand_fleet(&self.fleet, &self.route)
    }

    /// Assemble the simulate request payload from current state.
    ///
    /// `sites` is `[first waypoint, last waypoint]` whenever at least one
    /// waypoint exists (a single waypoint appears twice), empty otherwise.
    pub fn request(&self) -> SimulationRequest {
        let sites = match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => vec![first.to_feature(), last.to_feature()],
            _ => Vec::new(),
        };
        SimulationRequest {
            route: self.route.clone(),
            waypoints: self.waypoints.iter().map(Waypoint::to_feature).collect(),
            sites,
            fleet: self.expanded_fleet(),
            operator: self.operator.clone(),
            climate: self.climate.clone(),
            quantities: Quantities {
                bathymetry: self.bathymetry.base().clone(),
                waterlevels: self.waterlevels.base().clone(),
                velocities: self.velocities.base().clone(),
            },
            options: self.options.clone(),
        }
    }
}
