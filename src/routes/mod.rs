use axum::http::StatusCode;

use crate::access::AccessDenied;
use crate::availability::AvailabilityError;

pub mod auth;
pub mod barberias;
pub mod barberos;
pub mod disponibilidad;
pub mod health;
pub mod horarios;
pub mod resumen;
pub mod servicios;
pub mod sucursales;
pub mod turnos;
pub mod usuarios;

pub type ApiError = (StatusCode, String);

// Common error mappers
pub fn internal_error<E: std::fmt::Display>(e: E) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}"))
}

pub fn db_error(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not found".into()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            (StatusCode::CONFLICT, format!("already exists: {}", db.message()))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() || db.is_check_violation() => {
            (StatusCode::BAD_REQUEST, format!("invalid reference or value: {}", db.message()))
        }
        _ => internal_error(&e),
    }
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

pub fn not_found(what: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

impl From<AccessDenied> for ApiError {
    fn from(e: AccessDenied) -> Self {
        (StatusCode::FORBIDDEN, e.to_string())
    }
}

impl From<AvailabilityError> for ApiError {
    fn from(e: AvailabilityError) -> Self {
        let status = match e {
            AvailabilityError::Conflict(_) => StatusCode::CONFLICT,
            AvailabilityError::InvalidJornada { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, e.to_string())
    }
}

/// limit defaults to 50 and is clamped to 1..=500; offset is never negative.
pub fn paging(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 500), offset.unwrap_or(0).max(0))
}

/// Parses `"1,2, 3"` into ids, ignoring empty items and duplicates.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, ApiError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|_| bad_request(format!("invalid id '{part}'")))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_clamps() {
        assert_eq!(paging(None, None), (50, 0));
        assert_eq!(paging(Some(0), Some(-5)), (1, 0));
        assert_eq!(paging(Some(10_000), Some(20)), (500, 20));
    }

    #[test]
    fn id_lists_parse_and_dedupe() {
        assert_eq!(parse_id_list("3, 1,3,,2").unwrap(), vec![3, 1, 2]);
        assert!(parse_id_list("").unwrap().is_empty());
        assert_eq!(parse_id_list("1,x").unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let (s, _) = ApiError::from(AvailabilityError::Conflict(3));
        assert_eq!(s, StatusCode::CONFLICT);
        let (s, _) = ApiError::from(AvailabilityError::InPast);
        assert_eq!(s, StatusCode::BAD_REQUEST);
        let (s, msg) = ApiError::from(AvailabilityError::OffGrid {
            inicio: chrono::NaiveTime::from_hms_opt(10, 40, 0).unwrap(),
            apertura: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            paso_min: 30,
        });
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert!(msg.contains("30-minute grid"));
        let (s, _) = ApiError::from(AccessDenied::OtherTenant);
        assert_eq!(s, StatusCode::FORBIDDEN);
    }

    #[test]
    fn row_not_found_is_404() {
        assert_eq!(db_error(sqlx::Error::RowNotFound).0, StatusCode::NOT_FOUND);
    }
}
