// src/routes/sucursales.rs

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::{query, query_as, PgPool};

use super::{bad_request, db_error, not_found, ApiError};
use crate::access::{self, Action, Resource};
use crate::auth::AuthUser;
use crate::{models::Sucursal, AppState};

#[derive(Deserialize)]
pub struct CreateSucursalBody {
    pub nombre: String,
    pub direccion: String,
    pub telefono: Option<String>,
    #[serde(default = "default_apertura")] pub hora_apertura: NaiveTime,
    #[serde(default = "default_cierre")] pub hora_cierre: NaiveTime,
}
fn default_apertura() -> NaiveTime { NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default() }
fn default_cierre() -> NaiveTime { NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default() }

#[derive(Deserialize)]
pub struct PatchSucursalBody {
    pub nombre: Option<String>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub hora_apertura: Option<NaiveTime>,
    pub hora_cierre: Option<NaiveTime>,
    pub activa: Option<bool>,
}

/// Owning barbería of a sucursal, 404 when it does not exist.
pub(crate) async fn barberia_of(pool: &PgPool, sucursal_id: i64) -> Result<i64, ApiError> {
    let row: Option<(i64,)> =
        query_as(r#"SELECT barberia_id FROM public.sucursales WHERE sucursal_id = $1"#)
            .bind(sucursal_id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?;
    row.map(|(id,)| id).ok_or_else(|| not_found("sucursal"))
}

pub async fn create_sucursal(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(barberia_id): Path<i64>,
    Json(b): Json<CreateSucursalBody>,
) -> Result<(StatusCode, Json<Sucursal>), ApiError> {
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    if b.hora_apertura >= b.hora_cierre {
        return Err(bad_request("hora_apertura must be before hora_cierre"));
    }

    let row = query_as::<_, Sucursal>(
        r#"
        INSERT INTO public.sucursales(barberia_id, nombre, direccion, telefono, hora_apertura, hora_cierre)
        VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING sucursal_id, barberia_id, nombre, direccion, telefono, hora_apertura, hora_cierre, activa
        "#,
    )
    .bind(barberia_id)
    .bind(&b.nombre)
    .bind(&b.direccion)
    .bind(&b.telefono)
    .bind(b.hora_apertura)
    .bind(b.hora_cierre)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_sucursales(
    State(state): State<AppState>,
    Path(barberia_id): Path<i64>,
) -> Result<Json<Vec<Sucursal>>, ApiError> {
    let rows = query_as::<_, Sucursal>(
        r#"
        SELECT sucursal_id, barberia_id, nombre, direccion, telefono, hora_apertura, hora_cierre, activa
        FROM public.sucursales
        WHERE barberia_id = $1
        ORDER BY nombre
        "#,
    )
    .bind(barberia_id)
    .fetch_all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn get_sucursal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Sucursal>, ApiError> {
    let row = query_as::<_, Sucursal>(r#"SELECT * FROM public.sucursales WHERE sucursal_id = $1"#)
        .bind(id)
        .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

pub async fn patch_sucursal(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
    Json(b): Json<PatchSucursalBody>,
) -> Result<Json<Sucursal>, ApiError> {
    let barberia_id = barberia_of(&state.pool, id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;

    // the table CHECK rejects an inverted window; surface it as 400 via db_error
    let row = query_as::<_, Sucursal>(
        r#"
        UPDATE public.sucursales SET
          nombre        = COALESCE($2, nombre),
          direccion     = COALESCE($3, direccion),
          telefono      = COALESCE($4, telefono),
          hora_apertura = COALESCE($5, hora_apertura),
          hora_cierre   = COALESCE($6, hora_cierre),
          activa        = COALESCE($7, activa)
        WHERE sucursal_id = $1
        RETURNING sucursal_id, barberia_id, nombre, direccion, telefono, hora_apertura, hora_cierre, activa
        "#,
    )
    .bind(id)
    .bind(b.nombre)
    .bind(b.direccion)
    .bind(b.telefono)
    .bind(b.hora_apertura)
    .bind(b.hora_cierre)
    .bind(b.activa)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

pub async fn delete_sucursal(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let barberia_id = barberia_of(&state.pool, id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    let mut tx = state.pool.begin().await.map_err(db_error)?;
    query(r#"DELETE FROM public.turnos WHERE sucursal_id = $1"#)
        .bind(id)
        .execute(&mut *tx).await.map_err(db_error)?;
    let res = query(r#"DELETE FROM public.sucursales WHERE sucursal_id = $1"#)
        .bind(id)
        .execute(&mut *tx).await.map_err(db_error)?;
    tx.commit().await.map_err(db_error)?;
    tracing::info!(sucursal_id = id, by = p.usuario_id, "sucursal deleted");
    Ok(Json(serde_json::json!({ "deleted": res.rows_affected() > 0 })))
}
