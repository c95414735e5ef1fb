//! # dtw-types
//!
//! Shared scenario and payload types for the waterway digital-twin client.
//!
//! These types are used by:
//! - `client-rust`: the scenario store, remote gateway and console runner
//! - the simulation backend contract: every struct here that appears in a
//!   request body serializes to the exact field names the backend expects
//!
//! ## Conventions
//!
//! - Geospatial data is exchanged as GeoJSON (`geojson::Feature` /
//!   `geojson::FeatureCollection`), WGS84 lon/lat.
//! - Backend payloads that are open-ended carry a `#[serde(flatten)]`
//!   extras map next to the typed fields, so unknown keys survive a
//!   round trip without leaking untyped JSON into domain logic.
//! - Wire field names are camelCase where the backend uses camelCase
//!   (`cargoType`, `loadingRate`), snake_case elsewhere.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ── Cargo Type ────────────────────────────────────────────────────────────────

/// Cargo category of a scenario. Determines the display unit and the
/// default handling properties merged into new waypoints.
///
/// Unknown categories are carried verbatim (`Other`) and yield an empty
/// unit and no defaults — never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CargoType {
    DryBulk,
    Container,
    Other(String),
}

impl Default for CargoType {
    fn default() -> Self {
        Self::DryBulk
    }
}

impl CargoType {
    /// Display unit for cargo amounts: "Tonne" for dry bulk, "TEU" for
    /// containers, empty string for anything else.
    pub fn unit(&self) -> &str {
        match self {
            Self::DryBulk => "Tonne",
            Self::Container => "TEU",
            Self::Other(_) => "",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DryBulk => "Dry Bulk",
            Self::Container => "Container",
            Self::Other(s) => s,
        }
    }

    /// Default site properties for this cargo type. Merged into a waypoint
    /// on creation without overwriting anything already present.
    pub fn default_site_properties(&self) -> SiteProperties {
        match self {
            Self::DryBulk => SiteProperties {
                cargo_type: Some(Self::DryBulk),
                capacity: Some(2500.0),
                level: Some(1250.0),
                loading_rate: Some(300.0),
                loading_rate_variation: Some(60.0),
                ..Default::default()
            },
            Self::Container => SiteProperties {
                cargo_type: Some(Self::Container),
                capacity: Some(156.0),
                level: Some(78.0),
                loading_rate: Some(20.0),
                loading_rate_variation: Some(4.0),
                ..Default::default()
            },
            Self::Other(_) => SiteProperties::default(),
        }
    }
}

impl From<String> for CargoType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Dry Bulk" => Self::DryBulk,
            "Container" => Self::Container,
            _ => Self::Other(s),
        }
    }
}

impl From<CargoType> for String {
    fn from(c: CargoType) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for CargoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Site / Waypoint ───────────────────────────────────────────────────────────

/// Cargo-handling properties of a site feature.
///
/// All fields are optional: a raw site out of `sites.json` typically only
/// carries `n`; the cargo-type defaults fill the rest when the site becomes
/// a waypoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteProperties {
    /// Site identifier, the `n` field of the upstream site features.
    #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "cargoType", skip_serializing_if = "Option::is_none")]
    pub cargo_type: Option<CargoType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    /// Current cargo level at the site, in the cargo-type unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(rename = "loadingRate", skip_serializing_if = "Option::is_none")]
    pub loading_rate: Option<f64>,
    #[serde(rename = "loadingRateVariation", skip_serializing_if = "Option::is_none")]
    pub loading_rate_variation: Option<f64>,
    /// Upstream keys we do not model explicitly, preserved verbatim.
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl SiteProperties {
    /// Fill absent fields from `defaults`. Present values always win,
    /// including keys in the extras map.
    pub fn merge_defaults(&mut self, defaults: &SiteProperties) {
        if self.cargo_type.is_none() {
            self.cargo_type = defaults.cargo_type.clone();
        }
        if self.capacity.is_none() {
            self.capacity = defaults.capacity;
        }
        if self.level.is_none() {
            self.level = defaults.level;
        }
        if self.loading_rate.is_none() {
            self.loading_rate = defaults.loading_rate;
        }
        if self.loading_rate_variation.is_none() {
            self.loading_rate_variation = defaults.loading_rate_variation;
        }
        for (k, v) in &defaults.extra {
            if !self.extra.contains_key(k) {
                self.extra.insert(k.clone(), v.clone());
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WaypointError {
    /// The feature has no `properties.n` — it cannot act as a route site.
    #[error("site feature has no `n` identifier property")]
    MissingSiteName,
    #[error("site feature has malformed properties: {0}")]
    InvalidProperties(#[from] serde_json::Error),
}

/// A named site the route must pass through.
///
/// Constructed only via [`Waypoint::from_feature`], which is the validation
/// boundary: a feature without an `n` identifier is rejected there.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub name: String,
    pub geometry: Option<Geometry>,
    pub properties: SiteProperties,
}

impl Waypoint {
    pub fn from_feature(feature: &Feature) -> Result<Self, WaypointError> {
        let properties: SiteProperties = match &feature.properties {
            Some(obj) => serde_json::from_value(Value::Object(obj.clone()))?,
            None => SiteProperties::default(),
        };
        let name = properties
            .name
            .clone()
            .ok_or(WaypointError::MissingSiteName)?;
        Ok(Self {
            name,
            geometry: feature.geometry.clone(),
            properties,
        })
    }

    /// Re-emit the waypoint as a GeoJSON feature for request payloads.
    pub fn to_feature(&self) -> Feature {
        let properties = match serde_json::to_value(&self.properties) {
            Ok(Value::Object(obj)) => Some(obj),
            _ => None,
        };
        Feature {
            bbox: None,
            geometry: self.geometry.clone(),
            id: None,
            properties,
            foreign_members: None,
        }
    }
}

// ── Fleet ─────────────────────────────────────────────────────────────────────

/// Sailing and capacity profile of one ship class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipProperties {
    #[serde(rename = "cargoType", skip_serializing_if = "Option::is_none")]
    pub cargo_type: Option<CargoType>,
    /// Cargo capacity in the cargo-type unit (tonnes or TEU).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(rename = "speedLoaded", skip_serializing_if = "Option::is_none")]
    pub speed_loaded: Option<f64>,
    #[serde(rename = "speedUnloaded", skip_serializing_if = "Option::is_none")]
    pub speed_unloaded: Option<f64>,
    #[serde(rename = "draughtLoaded", skip_serializing_if = "Option::is_none")]
    pub draught_loaded: Option<f64>,
    #[serde(rename = "draughtEmpty", skip_serializing_if = "Option::is_none")]
    pub draught_empty: Option<f64>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

/// One entry of the fleet definition: a ship class plus how many identical
/// units of it sail the scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSpec {
    pub name: String,
    /// Repeat factor. A count of 0 contributes no ships.
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub properties: ShipProperties,
}

// ── Operator ──────────────────────────────────────────────────────────────────

/// The fleet operator entity forwarded verbatim in the simulate payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl Default for Operator {
    fn default() -> Self {
        Self {
            name: "operator".to_string(),
            extra: JsonObject::new(),
        }
    }
}

// ── Climate ───────────────────────────────────────────────────────────────────

/// Climate scenario input, forwarded verbatim to the backend.
///
/// The two discharge stations are the knobs the waterlevel interpolation
/// reacts to; anything else rides along in the extras map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Climate {
    /// Rhine discharge at Lobith, m³/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_lobith: Option<f64>,
    /// Meuse discharge at St. Pieter, m³/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_st_pieter: Option<f64>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

// ── Simulation Results & Charts ───────────────────────────────────────────────

/// Simulation response: the ship movement log plus whatever else the
/// backend returns. Opaque apart from the log collection, which the chart
/// endpoints consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<FeatureCollection>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl SimulationResults {
    pub fn is_empty(&self) -> bool {
        self.log.is_none() && self.extra.is_empty()
    }
}

/// One chart document as produced by the chart endpoints (echarts-shaped
/// JSON, passed through to the view layer untouched).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartData(pub Value);

/// The three derived chart datasets, refreshed in this fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartSlot {
    TripDuration,
    DurationBreakdown,
    Trips,
}

impl ChartSlot {
    pub const ALL: [ChartSlot; 3] = [
        ChartSlot::TripDuration,
        ChartSlot::DurationBreakdown,
        ChartSlot::Trips,
    ];

    /// Endpoint path below the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::TripDuration => "charts/trip_duration",
            Self::DurationBreakdown => "charts/duration_breakdown",
            Self::Trips => "charts/trips",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TripDuration => "trip duration",
            Self::DurationBreakdown => "duration breakdown",
            Self::Trips => "trips",
        }
    }
}

impl std::fmt::Display for ChartSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_duration: Option<ChartData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_breakdown: Option<ChartData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trips: Option<ChartData>,
}

impl ChartSet {
    pub fn get(&self, slot: ChartSlot) -> Option<&ChartData> {
        match slot {
            ChartSlot::TripDuration => self.trip_duration.as_ref(),
            ChartSlot::DurationBreakdown => self.duration_breakdown.as_ref(),
            ChartSlot::Trips => self.trips.as_ref(),
        }
    }

    pub fn set(&mut self, slot: ChartSlot, data: ChartData) {
        match slot {
            ChartSlot::TripDuration => self.trip_duration = Some(data),
            ChartSlot::DurationBreakdown => self.duration_breakdown = Some(data),
            ChartSlot::Trips => self.trips = Some(data),
        }
    }
}

// ── Request Payloads ──────────────────────────────────────────────────────────

/// The three environmental base layers sent along with a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantities {
    pub bathymetry: FeatureCollection,
    pub waterlevels: FeatureCollection,
    pub velocities: FeatureCollection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    /// Whether ships wait for a free berth at loading sites.
    #[serde(default)]
    pub with_berth: bool,
    #[serde(flatten)]
    pub extra: JsonObject,
}

/// The exact body POSTed to the simulate endpoint. Assembled on demand
/// from current scenario state, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub route: FeatureCollection,
    pub waypoints: Vec<Feature>,
    /// Route endpoints: `[first waypoint, last waypoint]`, empty without
    /// waypoints.
    pub sites: Vec<Feature>,
    /// The expanded fleet: one feature per ship unit.
    pub fleet: Vec<Feature>,
    pub operator: Operator,
    pub climate: Climate,
    pub quantities: Quantities,
    pub options: SimulationOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRouteRequest {
    pub waypoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateRequest {
    pub climate: Climate,
}

/// Shape of the static `routes.json` asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDocument {
    pub route: Vec<Feature>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// An empty feature collection, the initial state of every layer.
pub fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}
