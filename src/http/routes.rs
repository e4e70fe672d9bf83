//! REST routes for issuing documents and querying their state.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::{DocumentType, FacturaError, NewDocument};
use crate::http::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Creates the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Creates the `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", post(create_invoice))
        .route("/credit-notes", post(create_credit_note))
        .route("/debit-notes", post(create_debit_note))
        .route("/documents/{id}/status", get(document_status))
        .route("/documents/cdr", get(document_cdr))
}

/// Error wrapper mapping [`FacturaError`] kinds to HTTP status codes.
/// The only place in the system where that mapping happens.
pub struct ApiError(FacturaError);

impl From<FacturaError> for ApiError {
    fn from(e: FacturaError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<NewDocument>,
) -> Result<impl IntoResponse, ApiError> {
    expect_types(&payload, &[DocumentType::Factura, DocumentType::Boleta])?;
    let receipt = state.service.issue(payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn create_credit_note(
    State(state): State<AppState>,
    Json(payload): Json<NewDocument>,
) -> Result<impl IntoResponse, ApiError> {
    expect_types(&payload, &[DocumentType::CreditNote])?;
    let receipt = state.service.issue(payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn create_debit_note(
    State(state): State<AppState>,
    Json(payload): Json<NewDocument>,
) -> Result<impl IntoResponse, ApiError> {
    expect_types(&payload, &[DocumentType::DebitNote])?;
    let receipt = state.service.issue(payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

fn expect_types(payload: &NewDocument, allowed: &[DocumentType]) -> Result<(), ApiError> {
    if allowed.contains(&payload.doc_type) {
        Ok(())
    } else {
        Err(ApiError(FacturaError::Validation(format!(
            "tipo_comprobante {} does not belong on this endpoint",
            payload.doc_type.code()
        ))))
    }
}

async fn document_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.service.poll_status(&id).await?;
    Ok(Json(report))
}

/// Query parameters for CDR retrieval by business tuple.
#[derive(Debug, Deserialize)]
pub struct CdrQuery {
    pub ruc: String,
    #[serde(rename = "docType")]
    pub doc_type: String,
    pub series: String,
    pub number: u32,
}

async fn document_cdr(
    State(state): State<AppState>,
    Query(query): Query<CdrQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let retrieval = state
        .service
        .fetch_cdr(&query.ruc, &query.doc_type, &query.series, query.number)
        .await?;
    Ok(Json(retrieval))
}
