// src/routes/resumen.rs

use axum::{extract::{Path, Query, State}, Json};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use sqlx::query_as;

use super::{bad_request, db_error, ApiError};
use crate::access::{self, Action, Resource};
use crate::auth::AuthUser;
use crate::models::{ConteoEstado, Resumen};
use crate::AppState;

const DEFAULT_DAYS: i64 = 30;
const MAX_DAYS: i64 = 366;

#[derive(Deserialize)]
pub struct ResumenQ {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

fn rango(desde: Option<NaiveDate>, hasta: Option<NaiveDate>, hoy: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let hasta = hasta.unwrap_or(hoy);
    let desde = desde.unwrap_or(hasta - Duration::days(DEFAULT_DAYS));
    if desde > hasta {
        return Err(bad_request("desde must not be after hasta"));
    }
    if (hasta - desde).num_days() > MAX_DAYS {
        return Err(bad_request(format!("range cannot exceed {MAX_DAYS} days")));
    }
    Ok((desde, hasta))
}

/// GET /api/v1/barberias/:id/resumen, tenant admins only.
pub async fn get_resumen(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(barberia_id): Path<i64>,
    Query(q): Query<ResumenQ>,
) -> Result<Json<Resumen>, ApiError> {
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    let hoy = chrono::Local::now().date_naive();
    let (desde, hasta) = rango(q.desde, q.hasta, hoy)?;

    let por_estado = query_as::<_, ConteoEstado>(
        r#"
        SELECT t.estado, COUNT(*)::bigint AS cantidad
        FROM public.turnos t
        JOIN public.sucursales s ON s.sucursal_id = t.sucursal_id
        WHERE s.barberia_id = $1 AND t.fecha BETWEEN $2 AND $3
        GROUP BY t.estado
        ORDER BY t.estado
        "#,
    )
    .bind(barberia_id).bind(desde).bind(hasta)
    .fetch_all(&state.pool).await.map_err(db_error)?;

    let (ingresos_centavos,): (i64,) = query_as(
        r#"
        SELECT COALESCE(SUM(sv.precio_centavos), 0)::bigint
        FROM public.turnos t
        JOIN public.sucursales s ON s.sucursal_id = t.sucursal_id
        JOIN public.turno_servicios ts ON ts.turno_id = t.turno_id
        JOIN public.servicios sv ON sv.servicio_id = ts.servicio_id
        WHERE s.barberia_id = $1 AND t.estado = 'COMPLETADO' AND t.fecha BETWEEN $2 AND $3
        "#,
    )
    .bind(barberia_id).bind(desde).bind(hasta)
    .fetch_one(&state.pool).await.map_err(db_error)?;

    let (turnos_hoy,): (i64,) = query_as(
        r#"
        SELECT COUNT(*)::bigint
        FROM public.turnos t
        JOIN public.sucursales s ON s.sucursal_id = t.sucursal_id
        WHERE s.barberia_id = $1 AND t.fecha = $2 AND t.estado <> 'CANCELADO'
        "#,
    )
    .bind(barberia_id).bind(hoy)
    .fetch_one(&state.pool).await.map_err(db_error)?;

    Ok(Json(Resumen {
        barberia_id,
        desde,
        hasta,
        total_turnos: por_estado.iter().map(|c| c.cantidad).sum(),
        por_estado,
        ingresos_centavos,
        turnos_hoy,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn range_defaults_to_last_thirty_days() {
        assert_eq!(rango(None, None, d(3, 31)).unwrap(), (d(3, 1), d(3, 31)));
        assert_eq!(rango(Some(d(1, 1)), None, d(3, 31)).unwrap(), (d(1, 1), d(3, 31)));
    }

    #[test]
    fn range_rejects_inverted_or_huge_windows() {
        assert!(rango(Some(d(3, 2)), Some(d(3, 1)), d(3, 31)).is_err());
        assert!(rango(Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), Some(d(3, 1)), d(3, 31)).is_err());
    }
}
