/// HTTP endpoint for flood risk predictions
///
/// Endpoints:
/// - GET /health                              - Service health check
/// - GET /stations                            - Registered stations
/// - GET /predict/{site_code}[?date=YYYY-MM-DD]
/// - GET /predict?sites=a,b[&date=YYYY-MM-DD] - Batch; omitted `sites` means all registered
///
/// An undetermined prediction is a normal answer (200) carrying a reason;
/// only malformed requests get a 4xx.

use crate::model::{Prediction, RiskLevel, UndeterminedReason};
use crate::pipeline::{self, parse_target_date, Pipeline};
use crate::stations::{Station, StationRegistry};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use threadpool::ThreadPool;
use tracing::{debug, error, info};

type JsonResponse = tiny_http::Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Ok,
    Undetermined,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub site_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_label: Option<String>,
    /// Timestamp of the feature row the prediction was made from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PredictionResponse {
    pub fn new(site_code: &str, station: Option<&Station>, prediction: &Prediction) -> Self {
        let mut response = Self {
            site_code: site_code.to_string(),
            station_name: station.map(|s| s.name.clone()),
            status: PredictionStatus::Undetermined,
            probability: None,
            risk: None,
            risk_label: None,
            as_of: None,
            reason: None,
        };
        match prediction {
            Prediction::Probability {
                probability,
                risk,
                as_of,
            } => {
                response.status = PredictionStatus::Ok;
                response.probability = Some(*probability);
                response.risk = Some(*risk);
                response.risk_label = Some(risk.to_string());
                response.as_of = Some(*as_of);
            }
            Prediction::Undetermined(reason) => {
                response.reason = Some(reason.to_string());
            }
        }
        response
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub predictions: Vec<PredictionResponse>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Health,
    Stations,
    PredictSite { site_code: String, date: Option<String> },
    PredictBatch { sites: Option<Vec<String>>, date: Option<String> },
    MethodNotAllowed,
    NotFound,
}

/// Maps a method and raw request URL to a route. Query values are
/// percent-decoded; unknown query keys are ignored.
pub fn route(method: &tiny_http::Method, url: &str) -> Route {
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, q),
        None => (url, ""),
    };
    let path = path.trim_end_matches('/');

    let known = path == "/health"
        || path == "/stations"
        || path == "/predict"
        || path.starts_with("/predict/");
    if !known {
        return Route::NotFound;
    }
    if *method != tiny_http::Method::Get {
        return Route::MethodNotAllowed;
    }

    let params = parse_query(query);
    let param = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    match path {
        "/health" => Route::Health,
        "/stations" => Route::Stations,
        "/predict" => Route::PredictBatch {
            sites: param("sites").map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }),
            date: param("date"),
        },
        _ => {
            let site_code = path.trim_start_matches("/predict/");
            if site_code.is_empty() || site_code.contains('/') {
                return Route::NotFound;
            }
            Route::PredictSite {
                site_code: site_code.to_string(),
                date: param("date"),
            }
        }
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Everything a request handler needs, shared across worker threads.
pub struct EndpointState {
    pub pipeline: Arc<Pipeline>,
    pub registry: Arc<StationRegistry>,
    /// Threads used for one batch request.
    pub batch_workers: usize,
}

/// Produces the status code and JSON body for a routed request.
pub fn handle(state: &EndpointState, route: Route) -> (u16, serde_json::Value) {
    match route {
        Route::Health => (
            200,
            serde_json::json!({
                "status": "ok",
                "service": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "stations": state.registry.stations().len(),
            }),
        ),
        Route::Stations => (
            200,
            serde_json::json!({ "stations": state.registry.stations() }),
        ),
        Route::PredictSite { site_code, date } => handle_predict_site(state, &site_code, date.as_deref()),
        Route::PredictBatch { sites, date } => handle_predict_batch(state, sites, date.as_deref()),
        Route::MethodNotAllowed => (405, serde_json::json!({ "error": "Method not allowed" })),
        Route::NotFound => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": ["/health", "/stations", "/predict/{site_code}", "/predict?sites="]
            }),
        ),
    }
}

fn parse_date_param(raw: Option<&str>) -> Result<Option<NaiveDate>, (u16, serde_json::Value)> {
    raw.map(parse_target_date)
        .transpose()
        .map_err(|reason| bad_request(&reason.to_string()))
}

fn handle_predict_site(state: &EndpointState, site_code: &str, date: Option<&str>) -> (u16, serde_json::Value) {
    let date = match parse_date_param(date) {
        Ok(d) => d,
        Err(response) => return response,
    };

    let prediction = state.pipeline.predict(site_code, date);
    if let Prediction::Undetermined(UndeterminedReason::InvalidRequest(msg)) = &prediction {
        return bad_request(msg);
    }

    let body = PredictionResponse::new(site_code, state.registry.find(site_code), &prediction);
    (200, to_json(&body))
}

fn handle_predict_batch(
    state: &EndpointState,
    sites: Option<Vec<String>>,
    date: Option<&str>,
) -> (u16, serde_json::Value) {
    let date = match parse_date_param(date) {
        Ok(d) => d,
        Err(response) => return response,
    };
    let sites = sites.unwrap_or_else(|| state.registry.site_codes());
    if sites.is_empty() {
        return bad_request("no sites requested and no stations registered");
    }

    let results = pipeline::predict_batch(&state.pipeline, &sites, date, state.batch_workers);
    let predictions = results
        .iter()
        .map(|(site, prediction)| PredictionResponse::new(site, state.registry.find(site), prediction))
        .collect();

    (200, to_json(&BatchResponse { date, predictions }))
}

fn bad_request(message: &str) -> (u16, serde_json::Value) {
    (400, serde_json::json!({ "error": message }))
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(error = %e, "failed to serialize response");
        serde_json::json!({ "error": "serialization failed" })
    })
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Serves requests on `port` until the listener closes. Each request is
/// handled on a pool of `workers` threads.
pub fn start_endpoint_server(port: u16, state: EndpointState, workers: usize) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    println!("📡 HTTP endpoint listening on http://0.0.0.0:{}", port);
    println!("   GET /predict/{{site_code}}[?date=YYYY-MM-DD] - Single-site risk");
    println!("   GET /predict?sites=a,b[&date=YYYY-MM-DD]   - Batch risk");
    println!("   GET /stations - Registered stations");
    println!("   GET /health - Service health check\n");

    let state = Arc::new(state);
    let pool = ThreadPool::new(workers.max(1));

    for request in server.incoming_requests() {
        let state = Arc::clone(&state);
        pool.execute(move || {
            let url = request.url().to_string();
            let route = route(request.method(), &url);
            debug!(url = %url, route = ?route, "request");

            let (status, body) = handle(&state, route);
            info!(url = %url, status, "responded");

            if let Err(e) = request.respond(create_response(status, &body)) {
                error!(error = %e, "failed to send response");
            }
        });
    }

    pool.join();
    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
