// src/routes/horarios.rs

use axum::{extract::{Path, State}, Json};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::{query, query_as, PgPool};

use super::{bad_request, db_error, ApiError};
use crate::access::{self, Action, Resource};
use crate::auth::AuthUser;
use crate::availability::Jornada;
use crate::{models::HorarioSucursal, AppState};

#[derive(Deserialize)]
pub struct HorarioItem {
    pub dia_semana: i16, // 0 = Monday .. 6 = Sunday
    pub hora_apertura: NaiveTime,
    pub hora_cierre: NaiveTime,
    #[serde(default)] pub cerrado: bool,
}

fn validate(items: &[HorarioItem]) -> Result<(), ApiError> {
    let mut seen = [false; 7];
    for it in items {
        let Some(slot) = usize::try_from(it.dia_semana).ok().filter(|d| *d < 7) else {
            return Err(bad_request(format!("dia_semana must be 0..=6, got {}", it.dia_semana)));
        };
        if seen[slot] {
            return Err(bad_request(format!("dia_semana {} listed twice", it.dia_semana)));
        }
        seen[slot] = true;
        if it.hora_apertura >= it.hora_cierre {
            return Err(bad_request(format!(
                "dia_semana {}: hora_apertura must be before hora_cierre",
                it.dia_semana
            )));
        }
    }
    Ok(())
}

/// Working window for `fecha`: the weekday override when present, otherwise
/// the sucursal defaults. `None` when closed.
pub(crate) fn resolve_jornada(
    fecha: NaiveDate,
    default: Jornada,
    override_row: Option<&HorarioSucursal>,
) -> Option<Jornada> {
    match override_row {
        Some(h) if i64::from(h.dia_semana) == i64::from(fecha.weekday().num_days_from_monday()) => {
            if h.cerrado {
                None
            } else {
                Some(Jornada { apertura: h.hora_apertura, cierre: h.hora_cierre })
            }
        }
        _ => Some(default),
    }
}

/// Loads the sucursal window for a date. Errors with 404 on unknown sucursal.
pub(crate) async fn jornada_for(
    pool: &PgPool,
    sucursal_id: i64,
    fecha: NaiveDate,
) -> Result<Option<Jornada>, ApiError> {
    let (apertura, cierre): (NaiveTime, NaiveTime) = query_as(
        r#"SELECT hora_apertura, hora_cierre FROM public.sucursales WHERE sucursal_id = $1"#,
    )
    .bind(sucursal_id)
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    let dia = i16::try_from(fecha.weekday().num_days_from_monday()).unwrap_or_default();
    let horario = query_as::<_, HorarioSucursal>(
        r#"SELECT * FROM public.horarios_sucursal WHERE sucursal_id = $1 AND dia_semana = $2"#,
    )
    .bind(sucursal_id)
    .bind(dia)
    .fetch_optional(pool)
    .await
    .map_err(db_error)?;

    Ok(resolve_jornada(fecha, Jornada { apertura, cierre }, horario.as_ref()))
}

pub async fn list_horarios(
    State(state): State<AppState>,
    Path(sucursal_id): Path<i64>,
) -> Result<Json<Vec<HorarioSucursal>>, ApiError> {
    let rows = query_as::<_, HorarioSucursal>(
        r#"SELECT * FROM public.horarios_sucursal WHERE sucursal_id = $1 ORDER BY dia_semana"#,
    )
    .bind(sucursal_id)
    .fetch_all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn bulk_upsert_horarios(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(sucursal_id): Path<i64>,
    Json(items): Json<Vec<HorarioItem>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let barberia_id = super::sucursales::barberia_of(&state.pool, sucursal_id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    validate(&items)?;

    let mut tx = state.pool.begin().await.map_err(db_error)?;

    // iterate by reference to avoid moving `items`
    for it in &items {
        query(
            r#"
            INSERT INTO public.horarios_sucursal(sucursal_id, dia_semana, hora_apertura, hora_cierre, cerrado)
            VALUES ($1,$2,$3,$4,$5)
            ON CONFLICT (sucursal_id, dia_semana)
            DO UPDATE SET hora_apertura = EXCLUDED.hora_apertura,
                          hora_cierre = EXCLUDED.hora_cierre,
                          cerrado = EXCLUDED.cerrado
            "#,
        )
        .bind(sucursal_id)
        .bind(it.dia_semana)
        .bind(it.hora_apertura)
        .bind(it.hora_cierre)
        .bind(it.cerrado)
        .execute(&mut *tx).await.map_err(db_error)?;
    }

    tx.commit().await.map_err(db_error)?;
    Ok(Json(serde_json::json!({"upserted": true, "count": items.len()})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn item(dia: i16, a: u32, c: u32) -> HorarioItem {
        HorarioItem { dia_semana: dia, hora_apertura: t(a), hora_cierre: t(c), cerrado: false }
    }

    #[test]
    fn validation_rejects_bad_days_duplicates_and_inverted_windows() {
        assert!(validate(&[item(0, 9, 18), item(6, 10, 14)]).is_ok());
        assert!(validate(&[item(7, 9, 18)]).is_err());
        assert!(validate(&[item(-1, 9, 18)]).is_err());
        assert!(validate(&[item(2, 9, 18), item(2, 10, 12)]).is_err());
        assert!(validate(&[item(3, 18, 9)]).is_err());
    }

    #[test]
    fn override_wins_only_on_its_weekday() {
        // 2026-03-09 is a Monday
        let monday = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let tuesday = monday.succ_opt().unwrap();
        let default = Jornada { apertura: t(9), cierre: t(20) };
        let short = HorarioSucursal {
            sucursal_id: 1,
            dia_semana: 0,
            hora_apertura: t(10),
            hora_cierre: t(14),
            cerrado: false,
        };
        assert_eq!(
            resolve_jornada(monday, default, Some(&short)),
            Some(Jornada { apertura: t(10), cierre: t(14) })
        );
        assert_eq!(resolve_jornada(tuesday, default, Some(&short)), Some(default));
        assert_eq!(resolve_jornada(tuesday, default, None), Some(default));

        let closed = HorarioSucursal { cerrado: true, ..short };
        assert_eq!(resolve_jornada(monday, default, Some(&closed)), None);
    }
}
