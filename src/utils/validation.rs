//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validar las opciones de
//! creación y actualización de rutas antes de tocar el almacén.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use validator::ValidationError;

use crate::models::route_metadata::normalize_key;
use crate::utils::errors::RouteError;
use crate::utils::ticks;

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Validar longitud máxima en caracteres
pub fn validate_max_length(value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        let mut error = ValidationError::new("length");
        error.add_param("max".into(), &max);
        error.add_param("actual".into(), &len);
        error.message = Some(format!("must be at most {max} characters, got {len}").into());
        return Err(error);
    }
    Ok(())
}

/// Validar latitud; NaN significa "sin geocodificar" y es válido
pub fn validate_latitude(value: f64) -> Result<(), ValidationError> {
    validate_coordinate("latitude", value, 90.0)
}

/// Validar longitud geográfica; NaN es válido
pub fn validate_longitude(value: f64) -> Result<(), ValidationError> {
    validate_coordinate("longitude", value, 180.0)
}

fn validate_coordinate(code: &'static str, value: f64, limit: f64) -> Result<(), ValidationError> {
    if value.is_nan() {
        return Ok(());
    }

    if !(-limit..=limit).contains(&value) {
        let mut error = ValidationError::new(code);
        error.add_param("value".into(), &value);
        error.message = Some(format!("must be between -{limit} and {limit}").into());
        return Err(error);
    }
    Ok(())
}

/// Validar que el instante se pueda guardar como ticks de 100 ns
pub fn validate_tick_range(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if !ticks::is_representable(value) {
        let mut error = ValidationError::new("tick_range");
        error.add_param("value".into(), &value.to_rfc3339());
        error.message = Some("is outside the range that can be stored".into());
        return Err(error);
    }
    Ok(())
}

/// Validar que la hora de salida no sea el instante cero y se pueda guardar
pub fn validate_dispatch_time(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if value.timestamp() <= 0 {
        let mut error = ValidationError::new("dispatch_time");
        error.add_param("value".into(), &value.to_rfc3339());
        error.message = Some("must be set to a time after 1970-01-01T00:00:00Z".into());
        return Err(error);
    }
    validate_tick_range(value)
}

/// Validar que una ventana horaria no termine antes de empezar
pub fn validate_time_window(
    begin: &DateTime<Utc>,
    end: Option<&DateTime<Utc>>,
) -> Result<(), ValidationError> {
    if let Some(end) = end {
        if end < begin {
            let mut error = ValidationError::new("time_window");
            error.add_param("begin".into(), &begin.to_rfc3339());
            error.add_param("end".into(), &end.to_rfc3339());
            error.message = Some("time window end must not be before its begin".into());
            return Err(error);
        }
    }
    Ok(())
}

/// Validar un par de metadatos y devolver el error con el campo que falla
pub fn validate_metadata_entry(field: &str, key: &str, value: &str) -> Result<(), RouteError> {
    validate_not_empty(key)
        .and_then(|_| validate_max_length(key, crate::models::route_metadata::METADATA_KEY_MAX_LENGTH))
        .map_err(|e| field_error(format!("{field}.key"), &e))?;
    validate_not_empty(value)
        .and_then(|_| validate_max_length(value, crate::models::route_metadata::METADATA_VALUE_MAX_LENGTH))
        .map_err(|e| field_error(format!("{field}[{key}]"), &e))?;
    Ok(())
}

/// Validar que ninguna clave se repita sin distinguir mayúsculas.
/// `existing` son claves ya presentes en la ruta.
pub fn validate_unique_keys<'a, I, E>(field: &str, keys: I, existing: E) -> Result<(), RouteError>
where
    I: IntoIterator<Item = &'a String>,
    E: IntoIterator<Item = &'a String>,
{
    let mut seen: HashSet<String> = existing.into_iter().map(|k| normalize_key(k)).collect();

    for key in keys {
        if !seen.insert(normalize_key(key)) {
            return Err(RouteError::invalid_argument(
                format!("{field}[{key}]"),
                "duplicate metadata key (keys are case-insensitive)",
            ));
        }
    }
    Ok(())
}

/// Convertir un `ValidationError` en `InvalidArgument` para el campo dado
pub fn field_error(field: impl Into<String>, error: &ValidationError) -> RouteError {
    let message = error
        .message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| error.code.to_string());
    RouteError::invalid_argument(field, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("route").is_ok());
        assert!(validate_not_empty("   ").is_err());
    }

    #[test]
    fn test_validate_max_length_counts_chars() {
        assert!(validate_max_length("Größe", 5).is_ok());
        assert!(validate_max_length("abcdef", 5).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_latitude(f64::NAN).is_ok());
        assert!(validate_latitude(45.0).is_ok());
        assert!(validate_latitude(91.0).is_err());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(180.5).is_err());
    }

    #[test]
    fn test_validate_dispatch_time() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert!(validate_dispatch_time(&epoch).is_err());
        assert!(validate_dispatch_time(&Utc::now()).is_ok());
    }

    #[test]
    fn test_validate_time_window() {
        let begin = Utc::now();
        assert!(validate_time_window(&begin, None).is_ok());
        assert!(validate_time_window(&begin, Some(&begin)).is_ok());
        assert!(validate_time_window(&begin, Some(&(begin - Duration::seconds(1)))).is_err());
    }

    #[test]
    fn test_validate_unique_keys() {
        let keys = vec!["zone".to_string(), "Driver".to_string()];
        let existing = vec!["depot".to_string()];
        assert!(validate_unique_keys("metadata", &keys, &existing).is_ok());

        let clashing = vec!["DEPOT".to_string()];
        let error = validate_unique_keys("add_metadata", &clashing, &existing).unwrap_err();
        assert_eq!(
            error,
            RouteError::invalid_argument("add_metadata[DEPOT]", "duplicate metadata key (keys are case-insensitive)")
        );
    }

    #[test]
    fn test_validate_metadata_entry() {
        assert!(validate_metadata_entry("metadata", "zone", "B").is_ok());
        assert!(validate_metadata_entry("metadata", "", "B").is_err());
        assert!(validate_metadata_entry("metadata", "zone", " ").is_err());
        assert!(validate_metadata_entry("metadata", "zone", &"x".repeat(201)).is_err());
    }
}
