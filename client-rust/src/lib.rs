//! # dtw-client
//!
//! Scenario client for the waterway digital-twin simulation service.
//!
//! The crate owns three layers:
//! - [`state`]: the scenario state container — waypoints, fleet, climate,
//!   environmental layers, results, charts, playback — mutated only
//!   through a closed [`state::Command`] set
//! - [`gateway`]: typed HTTP calls to the simulation backend and static
//!   data assets
//! - [`derive`]: pure derivations — 500 m layer buffering, climate-layer
//!   partitioning, fleet expansion, request-payload projection
//!
//! [`store::ScenarioStore`] wires the three together: async actions call
//! the gateway and apply commands, with per-field generation guards so an
//! overlapping stale response can never clobber a newer one.

pub mod derive;
pub mod gateway;
pub mod persistence;
pub mod state;
pub mod store;

pub use gateway::{Gateway, GatewayConfig, GatewayError, GatewayErrorKind, SimulateVersion};
pub use state::{Command, CommandError, LayerPair, Playback, ScenarioState};
pub use store::{ChartRefresh, ScenarioStore, SimulationOutcome, StoreError, WaypointChange};
