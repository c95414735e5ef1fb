//! Shared mock simulation backend for the integration tests.
//!
//! An in-process axum server on an ephemeral port, serving the endpoint
//! table the gateway targets. Request bodies are captured so tests can
//! assert on the exact payloads the store sends.

// not every test binary touches every helper
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use dtw_client::gateway::{GatewayConfig, SimulateVersion};

#[derive(Clone, Default)]
pub struct MockOptions {
    /// Respond 500 on the duration-breakdown chart endpoint.
    pub fail_breakdown_chart: bool,
    /// Delay the response to the first find_route call by this much.
    pub first_route_delay: Option<Duration>,
}

#[derive(Clone)]
struct MockState {
    captured: Arc<Mutex<Vec<(String, Value)>>>,
    route_calls: Arc<AtomicU64>,
    options: MockOptions,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockBackend {
    pub async fn spawn(options: MockOptions) -> Self {
        let state = MockState {
            captured: Arc::new(Mutex::new(Vec::new())),
            route_calls: Arc::new(AtomicU64::new(0)),
            options,
        };
        let captured = state.captured.clone();

        let app = Router::new()
            .route("/v3/simulate", post(simulate))
            .route("/find_route", post(find_route))
            .route("/waterlevels", post(waterlevels))
            .route("/climate", post(climate))
            .route("/charts/trip_duration", post(chart_trip_duration))
            .route("/charts/duration_breakdown", post(chart_duration_breakdown))
            .route("/charts/trips", post(chart_trips))
            .route("/data/sites.json", get(sites))
            .route("/data/routes.json", get(routes))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, captured }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            api_url: format!("http://{}", self.addr),
            data_url: format!("http://{}/data", self.addr),
            simulate: SimulateVersion::V3,
        }
    }

    /// Captured (endpoint, body) pairs, in arrival order.
    pub async fn captured(&self) -> Vec<(String, Value)> {
        self.captured.lock().await.clone()
    }

    pub async fn captured_for(&self, endpoint: &str) -> Vec<Value> {
        self.captured()
            .await
            .into_iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, body)| body)
            .collect()
    }
}

/// The route feature collection the mock returns; `call` counts the
/// find_route invocations so races can assert which response won.
pub fn route_response(call: u64) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[4.03, 51.97], [5.9, 51.85], [6.76, 51.43]]
            },
            "properties": { "call": call }
        }]
    })
}

pub fn results_response() -> Value {
    json!({
        "log": {
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [4.03, 51.97] },
                    "properties": {
                        "Name": "Cycle", "Actor type": "Ship",
                        "Start": "2021-03-01T00:00:00", "Stop": "2021-03-01T14:30:00"
                    }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [6.76, 51.43] },
                    "properties": {
                        "Name": "Load request", "Actor type": "Port",
                        "Start": "2021-03-01T00:00:00", "Stop": "2021-03-01T02:00:00"
                    }
                }
            ]
        },
        "operator": "NPRC"
    })
}

pub fn chart_response(title: &str) -> Value {
    json!({
        "title": { "text": title },
        "xAxis": { "data": [0, 1, 2] },
        "series": [{ "data": [14.5, 13.9, 15.2] }]
    })
}

async fn simulate(State(s): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    s.captured.lock().await.push(("v3/simulate".into(), body));
    Json(results_response())
}

async fn find_route(State(s): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    s.captured.lock().await.push(("find_route".into(), body));
    let call = s.route_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call == 1 {
        if let Some(delay) = s.options.first_route_delay {
            tokio::time::sleep(delay).await;
        }
    }
    Json(route_response(call))
}

async fn waterlevels(State(s): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    s.captured.lock().await.push(("waterlevels".into(), body));
    Json(json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [5.95, 51.84] },
                "properties": { "waterlevel": 9.1, "discharge_location": "Lobith" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [5.7, 50.85] },
                "properties": { "waterlevel": 44.3, "discharge_location": "st Pieter" }
            }
        ]
    }))
}

async fn climate(State(s): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    s.captured.lock().await.push(("climate".into(), body));
    Json(json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [5.95, 51.84] },
                "properties": { "waterlevel": 9.1 }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [5.96, 51.83] },
                "properties": { "nap_p50": -2.1 }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [5.97, 51.82] },
                "properties": { "velocity": 1.2, "waterlevel": 8.7 }
            }
        ]
    }))
}

async fn chart_trip_duration(State(s): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    s.captured.lock().await.push(("charts/trip_duration".into(), body));
    Json(chart_response("Trip duration"))
}

async fn chart_duration_breakdown(
    State(s): State<MockState>,
    Json(body): Json<Value>,
) -> Response {
    s.captured
        .lock()
        .await
        .push(("charts/duration_breakdown".into(), body));
    if s.options.fail_breakdown_chart {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(chart_response("Duration breakdown")).into_response()
}

async fn chart_trips(State(s): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    s.captured.lock().await.push(("charts/trips".into(), body));
    Json(chart_response("Trips"))
}

async fn sites(State(_s): State<MockState>) -> Json<Value> {
    Json(json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [4.03, 51.97] },
                "properties": { "n": "site1", "harbourClass": "CEMT-VIb" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [6.76, 51.43] },
                "properties": { "n": "site2" }
            }
        ]
    }))
}

async fn routes(State(_s): State<MockState>) -> Json<Value> {
    Json(json!({
        "route": [{
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[4.03, 51.97], [6.76, 51.43]]
            },
            "properties": {}
        }]
    }))
}
