use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::catalog::{market_trends, summarize_catalog};
use crate::core::{
    CatalogSummary, EngineError, Fund, InvestmentExperience, MarketTrends, Policy, Profile,
    RiskTolerance, ScenarioRates, ScoredFund, Trajectory, employer_contribution, project,
    rank_funds, recommend,
};

pub const DEFAULT_RETIREMENT_AGE: u32 = 65;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
pub enum ApiRiskTolerance {
    #[serde(alias = "low", alias = "LOW", alias = "conservative")]
    Low,
    #[serde(alias = "medium", alias = "MEDIUM", alias = "moderate")]
    Medium,
    #[serde(alias = "high", alias = "HIGH", alias = "aggressive")]
    High,
}

impl From<ApiRiskTolerance> for RiskTolerance {
    fn from(value: ApiRiskTolerance) -> Self {
        match value {
            ApiRiskTolerance::Low => RiskTolerance::Low,
            ApiRiskTolerance::Medium => RiskTolerance::Medium,
            ApiRiskTolerance::High => RiskTolerance::High,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
pub enum ApiExperience {
    #[serde(alias = "beginner")]
    Beginner,
    #[serde(alias = "intermediate")]
    Intermediate,
    #[serde(alias = "expert", alias = "advanced", alias = "Advanced")]
    Expert,
}

impl From<ApiExperience> for InvestmentExperience {
    fn from(value: ApiExperience) -> Self {
        match value {
            ApiExperience::Beginner => InvestmentExperience::Beginner,
            ApiExperience::Intermediate => InvestmentExperience::Intermediate,
            ApiExperience::Expert => InvestmentExperience::Expert,
        }
    }
}

/// Profile as sent by the web client. Accepts both the client's camelCase
/// keys and the member dataset's column names.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfilePayload {
    #[serde(alias = "Age")]
    age: Option<u32>,
    #[serde(alias = "Retirement_Age_Goal", alias = "retirementAge")]
    retirement_age_goal: Option<u32>,
    #[serde(alias = "Current_Savings")]
    current_savings: Option<f64>,
    #[serde(alias = "Annual_Income")]
    annual_income: Option<f64>,
    #[serde(alias = "Monthly_Expenses")]
    monthly_expenses: Option<f64>,
    #[serde(alias = "Risk_Tolerance")]
    risk_tolerance: Option<ApiRiskTolerance>,
    #[serde(alias = "Investment_Experience", alias = "Investment_Experience_Level")]
    investment_experience: Option<ApiExperience>,
}

/// The web client wraps the profile in `user_profile`; other callers post
/// it bare. When the wrapper key is present only its contents are parsed.
fn payload_from_value(mut value: Value) -> Result<ProfilePayload, String> {
    let wrapped = value
        .as_object_mut()
        .and_then(|body| body.remove("user_profile").or_else(|| body.remove("userProfile")));
    serde_json::from_value(wrapped.unwrap_or(value))
        .map_err(|e| format!("Invalid API JSON payload: {e}"))
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub policy: Arc<Policy>,
    pub catalog: Arc<Vec<Fund>>,
}

impl AppState {
    pub fn new(policy: Policy, catalog: Vec<Fund>) -> Self {
        Self {
            policy: Arc::new(policy),
            catalog: Arc::new(catalog),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioRatesBody {
    conservative: f64,
    expected: f64,
    optimistic: f64,
}

impl From<ScenarioRates> for ScenarioRatesBody {
    fn from(value: ScenarioRates) -> Self {
        Self {
            conservative: value.conservative,
            expected: value.expected,
            optimistic: value.optimistic,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    scenario_rates: ScenarioRatesBody,
    employer_contribution: f64,
    trajectory: Trajectory,
}

#[derive(Debug, Serialize)]
struct FundsResponse {
    summary: Option<CatalogSummary>,
    trends: Option<MarketTrends>,
    funds: Vec<ScoredFund>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn profile_from_payload(payload: ProfilePayload) -> Result<Profile, String> {
    let age = payload.age.ok_or("age is required")?;
    let annual_income = payload.annual_income.ok_or("annualIncome is required")?;
    let risk_tolerance = payload
        .risk_tolerance
        .ok_or("riskTolerance is required (Low, Medium or High)")?;

    Ok(Profile {
        age,
        retirement_age_goal: payload.retirement_age_goal.unwrap_or(DEFAULT_RETIREMENT_AGE),
        current_savings: payload.current_savings.unwrap_or(0.0),
        annual_income,
        monthly_expenses: payload.monthly_expenses,
        risk_tolerance: risk_tolerance.into(),
        investment_experience: payload
            .investment_experience
            .map(Into::into)
            .unwrap_or_default(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route(
            "/api/recommendations",
            axum::routing::post(recommendations_handler),
        )
        .route("/api/funds", get(funds_handler))
        .route("/api/market-data", get(market_data_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("nestegg HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/health");
    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            message: "API is running",
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<ProfilePayload>,
) -> Response {
    projection_impl(&state, payload)
}

async fn projection_post_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    match body.map_err(bad_json).and_then(|Json(value)| payload_or_400(value)) {
        Ok(payload) => projection_impl(&state, payload),
        Err(response) => response,
    }
}

fn projection_impl(state: &AppState, payload: ProfilePayload) -> Response {
    let profile = match profile_from_payload(payload) {
        Ok(profile) => profile,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match project(&profile, &state.policy) {
        Ok(trajectory) => json_response(
            StatusCode::OK,
            ProjectionResponse {
                scenario_rates: ScenarioRates::for_profile(&profile, &state.policy).into(),
                employer_contribution: employer_contribution(&profile, &state.policy),
                trajectory,
            },
        ),
        Err(err) => engine_error_response(err),
    }
}

async fn recommendations_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match body.map_err(bad_json).and_then(|Json(value)| payload_or_400(value)) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let profile = match profile_from_payload(payload) {
        Ok(profile) => profile,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match recommend(&profile, &state.catalog, &state.policy) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => engine_error_response(err),
    }
}

async fn funds_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        FundsResponse {
            summary: summarize_catalog(&state.catalog),
            trends: market_trends(&state.catalog, &state.policy),
            funds: rank_funds(&state.catalog, &state.policy),
        },
    )
}

async fn market_data_handler(State(state): State<AppState>) -> Response {
    match market_trends(&state.catalog, &state.policy) {
        Some(trends) => json_response(StatusCode::OK, trends),
        None => engine_error_response(EngineError::EmptyCatalog),
    }
}

fn payload_or_400(value: Value) -> Result<ProfilePayload, Response> {
    payload_from_value(value).map_err(|msg| {
        warn!("{msg}");
        error_response(StatusCode::BAD_REQUEST, &msg)
    })
}

fn bad_json(rejection: JsonRejection) -> Response {
    let msg = format!("Invalid JSON payload: {}", rejection.body_text());
    warn!("{msg}");
    error_response(StatusCode::BAD_REQUEST, &msg)
}

fn engine_error_response(err: EngineError) -> Response {
    let status = match err {
        EngineError::InvalidProfile { .. } => StatusCode::BAD_REQUEST,
        EngineError::EmptyCatalog => StatusCode::SERVICE_UNAVAILABLE,
    };
    warn!(%status, "request rejected: {err}");
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn profile_from_json(json: &str) -> Result<Profile, String> {
    let value = serde_json::from_str::<Value>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    profile_from_payload(payload_from_value(value)?)
}
