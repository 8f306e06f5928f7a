//! Sistema de manejo de errores
//!
//! Este módulo define los errores del RouteManager y su conversión a
//! respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::repositories::store_error::StoreError;

/// Errores de las operaciones sobre rutas
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Route with id '{id}' not found")]
    NotFound { id: Uuid },

    #[error("Route with id '{id}' was modified concurrently")]
    WriteConflict { id: Uuid },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl RouteError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        RouteError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Traducir un fallo del almacén ocurrido mientras se escribía la ruta `id`
    pub fn from_store(error: StoreError, id: Uuid) -> Self {
        match error {
            StoreError::WriteConflict(_) => RouteError::WriteConflict { id },
            other => other.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RouteError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            RouteError::NotFound { .. } => StatusCode::NOT_FOUND,
            RouteError::WriteConflict { .. } => StatusCode::CONFLICT,
            RouteError::Constraint(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RouteError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RouteError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<StoreError> for RouteError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Constraint(msg) => RouteError::Constraint(msg),
            StoreError::WriteConflict(msg) => RouteError::StoreUnavailable(format!("unattributed write conflict: {msg}")),
            StoreError::Unavailable(msg) => RouteError::StoreUnavailable(msg),
            StoreError::Corrupt(msg) => RouteError::StoreUnavailable(format!("corrupt data: {msg}")),
        }
    }
}

impl From<validator::ValidationErrors> for RouteError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let first = field_errors
            .iter()
            .min_by(|a, b| a.0.cmp(b.0))
            .and_then(|(field, list)| list.first().map(|error| (field.to_string(), error)));

        match first {
            Some((field, error)) => {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                RouteError::InvalidArgument { field, message }
            }
            None => RouteError::invalid_argument("options", errors.to_string()),
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = match &self {
            RouteError::InvalidArgument { field, message } => {
                tracing::debug!(%field, %message, "Argumento inválido");
                ErrorResponse {
                    error: "Invalid Argument".to_string(),
                    message: self.to_string(),
                    details: Some(json!({ "field": field, "reason": message })),
                    code: "INVALID_ARGUMENT".to_string(),
                }
            }

            RouteError::NotFound { id } => ErrorResponse {
                error: "Not Found".to_string(),
                message: self.to_string(),
                details: Some(json!({ "id": id })),
                code: "NOT_FOUND".to_string(),
            },

            RouteError::WriteConflict { id } => {
                tracing::warn!(%id, "Conflicto de escritura devuelto al cliente");
                ErrorResponse {
                    error: "Write Conflict".to_string(),
                    message: self.to_string(),
                    details: Some(json!({ "id": id })),
                    code: "WRITE_CONFLICT".to_string(),
                }
            }

            RouteError::Constraint(msg) => ErrorResponse {
                error: "Constraint Violation".to_string(),
                message: "The data violates a storage constraint".to_string(),
                details: Some(json!({ "constraint_error": msg })),
                code: "CONSTRAINT_VIOLATION".to_string(),
            },

            RouteError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Almacén no disponible");
                ErrorResponse {
                    error: "Service Unavailable".to_string(),
                    message: "The route store is not available".to_string(),
                    details: None,
                    code: "STORE_UNAVAILABLE".to_string(),
                }
            }

            RouteError::Cancelled => ErrorResponse {
                error: "Request Cancelled".to_string(),
                message: self.to_string(),
                details: None,
                code: "REQUEST_CANCELLED".to_string(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type RouteResult<T> = Result<T, RouteError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(id: Uuid) -> RouteError {
    RouteError::NotFound { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    #[test]
    fn test_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(RouteError::invalid_argument("name", "too long").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(not_found_error(id).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(RouteError::WriteConflict { id }.status_code(), StatusCode::CONFLICT);
        assert_eq!(RouteError::StoreUnavailable("down".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_conflict_is_attributed_to_route() {
        let id = Uuid::new_v4();
        let error = RouteError::from_store(StoreError::WriteConflict("stale".into()), id);
        assert_eq!(error, RouteError::WriteConflict { id });

        let error = RouteError::from_store(StoreError::Constraint("fk".into()), id);
        assert_eq!(error, RouteError::Constraint("fk".into()));
    }

    #[test]
    fn test_validation_errors_name_the_field() {
        let mut errors = ValidationErrors::new();
        errors.add("name", ValidationError::new("length"));

        match RouteError::from(errors) {
            RouteError::InvalidArgument { field, message } => {
                assert_eq!(field, "name");
                assert_eq!(message, "length");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
