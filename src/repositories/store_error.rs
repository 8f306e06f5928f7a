//! Errores de la capa de persistencia
//!
//! Clasifica los fallos del almacén en las cuatro categorías que el
//! RouteManager necesita distinguir.

use thiserror::Error;

/// SQLSTATE de fallo de serialización
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE de deadlock detectado
const DEADLOCK_DETECTED: &str = "40P01";
/// Clase SQLSTATE de violaciones de integridad
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) => {
                let code = db_error.code().map(|c| c.into_owned()).unwrap_or_default();
                if code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED {
                    StoreError::WriteConflict(db_error.message().to_string())
                } else if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) {
                    StoreError::Constraint(db_error.message().to_string())
                } else {
                    StoreError::Unavailable(db_error.message().to_string())
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => StoreError::Unavailable(error.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(error.to_string()),
            _ => StoreError::Unavailable(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(matches!(StoreError::from(sqlx::Error::PoolTimedOut), StoreError::Unavailable(_)));
        assert!(matches!(StoreError::from(sqlx::Error::PoolClosed), StoreError::Unavailable(_)));
    }

    #[test]
    fn test_decode_errors_are_corrupt() {
        let error = sqlx::Error::ColumnNotFound("dispatch_time".to_string());
        assert!(matches!(StoreError::from(error), StoreError::Corrupt(_)));
    }

    #[test]
    fn test_write_conflict_flag() {
        assert!(StoreError::WriteConflict("route".to_string()).is_write_conflict());
        assert!(!StoreError::Constraint("name".to_string()).is_write_conflict());
    }
}
