use crate::gateway::{GatewayError, PartitionedRecords, RecordGateway, SearchCriteria};
use crate::record::{Record, RecordPayload};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the record API
pub struct RecordsAppState {
    pub gateway: Arc<RecordGateway>,
}

/// Query parameters for record search
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Case-insensitive substring of the record name
    pub nombre: Option<String>,
    /// "sensores" or "actuadores"
    pub tipo: Option<String>,
}

/// Response for record deletion
#[derive(Serialize)]
pub struct DeleteResponse {
    pub mensaje: &'static str,
    pub registro: Record,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create record API router
pub fn create_records_router(state: Arc<RecordsAppState>) -> Router {
    Router::new()
        .route("/sensoresactuadores", post(create_record))
        .route("/sensoresactuadores/separados", get(list_partitioned))
        .route("/sensoresactuadores/buscar", get(search_records))
        .route("/sensoresactuadores/buscar/:id", get(get_record))
        .route(
            "/sensoresactuadores/:id",
            put(update_record).delete(delete_record),
        )
        .with_state(state)
}

/// GET /sensoresactuadores/separados - All records split into sensors and actuators
async fn list_partitioned(
    State(state): State<Arc<RecordsAppState>>,
) -> Result<Json<PartitionedRecords>, ApiError> {
    let partitioned = state.gateway.list_partitioned()?;
    Ok(Json(partitioned))
}

/// POST /sensoresactuadores - Create a record
///
/// Any store failure is reported as 400, like a rejected document.
async fn create_record(
    State(state): State<Arc<RecordsAppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let payload =
        RecordPayload::from_json(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let record = state.gateway.create(payload).map_err(|e| {
        error!(error = %e, "Failed to create record");
        ApiError::BadRequest("No se pudo guardar el registro".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /sensoresactuadores/:id - Replace the fields present in the body
async fn update_record(
    State(state): State<Arc<RecordsAppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Record>, ApiError> {
    let payload =
        RecordPayload::from_json(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let record = state.gateway.update(&id, payload)?;
    Ok(Json(record))
}

/// DELETE /sensoresactuadores/:id - Delete a record
async fn delete_record(
    State(state): State<Arc<RecordsAppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let record = state.gateway.delete(&id)?;

    Ok(Json(DeleteResponse {
        mensaje: "Registro eliminado",
        registro: record,
    }))
}

/// GET /sensoresactuadores/buscar/:id - Get a single record
async fn get_record(
    State(state): State<Arc<RecordsAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let record = state.gateway.find(&id)?;
    Ok(Json(record))
}

/// GET /sensoresactuadores/buscar - Search records
///
/// Query parameters (at least one required, combined with AND):
/// - `nombre`: case-insensitive substring, e.g. ?nombre=temp
/// - `tipo`: "sensores" or "actuadores" (exact kind match)
async fn search_records(
    State(state): State<Arc<RecordsAppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    info!(nombre = ?params.nombre, tipo = ?params.tipo, "Searching records");

    let records = state.gateway.search(SearchCriteria {
        name: params.nombre,
        kind: params.tipo,
    })?;

    Ok(Json(records))
}

/// Record API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal,
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidQuery(msg) => ApiError::BadRequest(msg),
            GatewayError::NotFound => ApiError::NotFound,
            GatewayError::Store(e) => {
                error!(error = ?e, "Record store operation failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Registro no encontrado".to_string()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error interno del servidor".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ChangeNotifier;
    use crate::store::RecordStore;

    fn create_test_state() -> Arc<RecordsAppState> {
        let store = Arc::new(RecordStore::connect(":memory:").unwrap());
        Arc::new(RecordsAppState {
            gateway: Arc::new(RecordGateway::new(store, Arc::new(ChangeNotifier::new()))),
        })
    }

    #[tokio::test]
    async fn test_create_returns_created_status() {
        let state = create_test_state();
        let body = Bytes::from_static(br#"{"tipo": "sensor", "nombre": "Temp1"}"#);

        let (status, Json(record)) = create_record(State(state), body).await.unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record.name.as_deref(), Some("Temp1"));
    }

    #[tokio::test]
    async fn test_create_rejects_non_object_body() {
        let state = create_test_state();
        let result = create_record(State(state), Bytes::from_static(b"\"text\"")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_search_without_params_is_bad_request() {
        let state = create_test_state();
        let result = search_records(State(state), Query(SearchParams::default())).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_store_error_hides_details() {
        let err = ApiError::from(GatewayError::Store(anyhow::anyhow!("disk on fire")));
        assert!(matches!(err, ApiError::Internal));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
