//! gateway.rs — typed HTTP boundary to the simulation service
//!
//! Stateless wrappers around `reqwest`: serialize, POST/GET, decode JSON.
//! No retries, no schema validation beyond decode, no credentials — this
//! is the single seam where a deployment would attach them. Failures
//! surface as a typed [`GatewayError`] and never touch store state.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use geojson::FeatureCollection;

use dtw_types::{
    ChartData, ChartSlot, Climate, ClimateRequest, FindRouteRequest, RouteDocument,
    SimulationRequest, SimulationResults,
};

const DEFAULT_API_URL: &str = "http://localhost:5000";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// The request never produced a response (DNS, refused, reset).
    Transport,
    /// The backend answered with a non-success status.
    Status,
    /// The body was not the JSON we can decode.
    Decode,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Transport { .. } => GatewayErrorKind::Transport,
            Self::Status { .. } => GatewayErrorKind::Status,
            Self::Decode { .. } => GatewayErrorKind::Decode,
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Which revision of the simulate endpoint this deployment targets.
/// Exactly one is live at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SimulateVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl SimulateVersion {
    pub fn path(&self) -> &'static str {
        match self {
            Self::V1 => "simulate",
            Self::V2 => "v2/simulate",
            Self::V3 => "v3/simulate",
        }
    }
}

impl std::str::FromStr for SimulateVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            "v3" | "3" => Ok(Self::V3),
            other => Err(format!("unknown simulate version '{other}' (expected v1/v2/v3)")),
        }
    }
}

impl std::fmt::Display for SimulateVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
            Self::V3 => f.write_str("v3"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Simulation API base URL.
    pub api_url: String,
    /// Base URL of the static data assets (`sites.json`, `routes.json`).
    pub data_url: String,
    pub simulate: SimulateVersion,
}

impl GatewayConfig {
    /// Resolve from `DTW_API_URL` / `DTW_DATA_URL`, with the data assets
    /// defaulting to `{api}/data`.
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("DTW_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let data_url = std::env::var("DTW_DATA_URL")
            .unwrap_or_else(|_| format!("{}/data", api_url.trim_end_matches('/')));
        Self {
            api_url,
            data_url,
            simulate: SimulateVersion::default(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────────────────

pub struct Gateway {
    http: Client,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn data(&self, asset: &str) -> String {
        format!("{}/{}", self.config.data_url.trim_end_matches('/'), asset)
    }

    /// Submit the assembled scenario to the configured simulate revision.
    pub async fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<SimulationResults, GatewayError> {
        self.post_json(self.api(self.config.simulate.path()), request)
            .await
    }

    /// Resolve a route through the ordered site identifiers.
    pub async fn find_route(
        &self,
        waypoints: Vec<String>,
    ) -> Result<FeatureCollection, GatewayError> {
        self.post_json(self.api("find_route"), &FindRouteRequest { waypoints })
            .await
    }

    pub async fn waterlevels(
        &self,
        climate: &Climate,
    ) -> Result<FeatureCollection, GatewayError> {
        let body = ClimateRequest {
            climate: climate.clone(),
        };
        self.post_json(self.api("waterlevels"), &body).await
    }

    /// The combined climate response; the store partitions it into the
    /// three environmental layers.
    pub async fn climate(&self, climate: &Climate) -> Result<FeatureCollection, GatewayError> {
        let body = ClimateRequest {
            climate: climate.clone(),
        };
        self.post_json(self.api("climate"), &body).await
    }

    pub async fn chart(
        &self,
        slot: ChartSlot,
        results: &SimulationResults,
    ) -> Result<ChartData, GatewayError> {
        self.post_json(self.api(slot.path()), results).await
    }

    /// Static site catalogue.
    pub async fn sites(&self) -> Result<FeatureCollection, GatewayError> {
        self.get_json(self.data("sites.json")).await
    }

    /// Static reference route, unwrapped from its `{ route: [...] }`
    /// document into a plain feature collection.
    pub async fn routes(&self) -> Result<FeatureCollection, GatewayError> {
        let doc: RouteDocument = self.get_json(self.data("routes.json")).await?;
        Ok(FeatureCollection {
            bbox: None,
            features: doc.route,
            foreign_members: None,
        })
    }

    async fn post_json<B, T>(&self, url: String, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;
        Self::decode(url, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, GatewayError> {
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;
        Self::decode(url, response).await
    }

    async fn decode<T: DeserializeOwned>(
        url: String,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status { url, status });
        }
        let body = response
            .text()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_str(&body).map_err(|source| GatewayError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_version_parses_and_prints() {
        assert_eq!("v1".parse::<SimulateVersion>().unwrap(), SimulateVersion::V1);
        assert_eq!("v3".parse::<SimulateVersion>().unwrap(), SimulateVersion::V3);
        assert!("v9".parse::<SimulateVersion>().is_err());
        assert_eq!(SimulateVersion::V2.to_string(), "v2");
        assert_eq!(SimulateVersion::default(), SimulateVersion::V3);
    }

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let gw = Gateway::new(GatewayConfig {
            api_url: "http://backend:5000/".into(),
            data_url: "http://backend:5000/data/".into(),
            simulate: SimulateVersion::V3,
        });
        assert_eq!(gw.api("find_route"), "http://backend:5000/find_route");
        assert_eq!(
            gw.api(SimulateVersion::V3.path()),
            "http://backend:5000/v3/simulate"
        );
        assert_eq!(gw.data("sites.json"), "http://backend:5000/data/sites.json");
    }
}
