// src/routes/disponibilidad.rs

use axum::{extract::{Query, State}, Json};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, PgPool, Postgres};

use super::{bad_request, db_error, not_found, parse_id_list, ApiError};
use crate::availability::{self, Ocupacion, Slot, SlotQuery};
use crate::AppState;

#[derive(Deserialize)]
pub struct DisponibilidadQ {
    pub sucursal_id: i64,
    pub fecha: NaiveDate,
    pub barbero_id: Option<i64>,
    /// comma separated servicio ids
    pub servicios: Option<String>,
}

#[derive(Serialize)]
pub struct Disponibilidad {
    pub sucursal_id: i64,
    pub fecha: NaiveDate,
    pub duracion_min: u32,
    pub paso_min: u32,
    pub cerrado: bool,
    pub slots: Vec<Slot>,
}

/// Owning barbería of a sucursal and whether it takes bookings. A suspended
/// barbería closes all of its sucursales.
pub(crate) async fn sucursal_ctx(pool: &PgPool, sucursal_id: i64) -> Result<(i64, bool), ApiError> {
    query_as::<_, (i64, bool)>(
        r#"
        SELECT s.barberia_id, (s.activa AND b.activa) AS activa
        FROM public.sucursales s
        JOIN public.barberias b ON b.barberia_id = s.barberia_id
        WHERE s.sucursal_id = $1
        "#,
    )
    .bind(sucursal_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| not_found("sucursal"))
}

/// Total duration of the selected services; all must be active and owned by
/// `barberia_id`. An empty selection books one slot step.
pub(crate) async fn duracion_servicios(
    pool: &PgPool,
    barberia_id: i64,
    servicio_ids: &[i64],
    paso_min: u32,
) -> Result<u32, ApiError> {
    if servicio_ids.is_empty() {
        return Ok(paso_min);
    }
    let rows: Vec<(i64, i32)> = query_as(
        r#"
        SELECT servicio_id, duracion_min FROM public.servicios
        WHERE barberia_id = $1 AND activo AND servicio_id = ANY($2)
        "#,
    )
    .bind(barberia_id)
    .bind(servicio_ids.to_vec())
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    if rows.len() != servicio_ids.len() {
        let missing: Vec<i64> = servicio_ids
            .iter()
            .copied()
            .filter(|id| !rows.iter().any(|(sid, _)| sid == id))
            .collect();
        return Err(bad_request(format!("unknown or inactive servicios: {missing:?}")));
    }
    Ok(rows.iter().map(|(_, d)| u32::try_from(*d).unwrap_or(0)).sum())
}

/// Active barberos of a sucursal, or just `requested` if it is one of them.
pub(crate) async fn candidatos(
    pool: &PgPool,
    sucursal_id: i64,
    requested: Option<i64>,
) -> Result<Vec<i64>, ApiError> {
    let ids: Vec<(i64,)> = query_as(
        r#"
        SELECT barbero_id FROM public.barberos
        WHERE sucursal_id = $1 AND activo
        ORDER BY barbero_id
        "#,
    )
    .bind(sucursal_id)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;
    let ids: Vec<i64> = ids.into_iter().map(|(id,)| id).collect();

    match requested {
        None => Ok(ids),
        Some(b) if ids.contains(&b) => Ok(vec![b]),
        Some(b) => Err(bad_request(format!("barbero {b} is not active in sucursal {sucursal_id}"))),
    }
}

/// Non-cancelled bookings of `barbero_ids` on `fecha`.
pub(crate) async fn ocupaciones<'c, E>(
    conn: E,
    barbero_ids: &[i64],
    fecha: NaiveDate,
) -> Result<Vec<Ocupacion>, ApiError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let rows: Vec<(i64, NaiveTime, NaiveTime)> = query_as(
        r#"
        SELECT barbero_id, hora_inicio, hora_fin FROM public.turnos
        WHERE barbero_id = ANY($1) AND fecha = $2 AND estado <> 'CANCELADO'
        ORDER BY hora_inicio
        "#,
    )
    .bind(barbero_ids.to_vec())
    .bind(fecha)
    .fetch_all(conn)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(barbero_id, inicio, fin)| Ocupacion { barbero_id, inicio, fin })
        .collect())
}

/// GET /api/v1/disponibilidad?sucursal_id=&fecha=&barbero_id=&servicios=1,2
pub async fn get_disponibilidad(
    State(state): State<AppState>,
    Query(q): Query<DisponibilidadQ>,
) -> Result<Json<Disponibilidad>, ApiError> {
    let servicio_ids = parse_id_list(q.servicios.as_deref().unwrap_or(""))?;
    let (barberia_id, activa) = sucursal_ctx(&state.pool, q.sucursal_id).await?;
    let paso_min = state.slot_minutes;
    let duracion_min = duracion_servicios(&state.pool, barberia_id, &servicio_ids, paso_min).await?;

    let jornada = if activa {
        super::horarios::jornada_for(&state.pool, q.sucursal_id, q.fecha).await?
    } else {
        None
    };
    let barberos = candidatos(&state.pool, q.sucursal_id, q.barbero_id).await?;
    let ocupadas = ocupaciones(&state.pool, &barberos, q.fecha).await?;

    let slots = availability::compute_slots(
        &SlotQuery {
            fecha: q.fecha,
            jornada,
            paso_min,
            duracion_min,
            barberos,
            ahora: Some(chrono::Local::now().naive_local()),
        },
        &ocupadas,
    )?;

    Ok(Json(Disponibilidad {
        sucursal_id: q.sucursal_id,
        fecha: q.fecha,
        duracion_min,
        paso_min,
        cerrado: jornada.is_none(),
        slots,
    }))
}
