// src/routes/barberos.rs

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::{query, query_as, PgPool};

use super::{db_error, not_found, ApiError};
use crate::access::{self, Action, Resource};
use crate::auth::AuthUser;
use crate::{models::Barbero, AppState};

#[derive(Deserialize)]
pub struct ListQ {
    /// include inactive barberos
    pub todos: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateBarberoBody {
    pub nombre: String,
    pub especialidad: Option<String>,
    pub usuario_id: Option<i64>,
    pub activo: Option<bool>,
}

#[derive(Deserialize)]
pub struct PatchBarberoBody {
    pub nombre: Option<String>,
    pub especialidad: Option<String>,
    pub usuario_id: Option<i64>,
    pub sucursal_id: Option<i64>,
    pub activo: Option<bool>,
}

/// Owning barbería of a barbero (through its sucursal).
pub(crate) async fn barberia_of(pool: &PgPool, barbero_id: i64) -> Result<i64, ApiError> {
    let row: Option<(i64,)> = query_as(
        r#"
        SELECT s.barberia_id
        FROM public.barberos b
        JOIN public.sucursales s ON s.sucursal_id = b.sucursal_id
        WHERE b.barbero_id = $1
        "#,
    )
    .bind(barbero_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error)?;
    row.map(|(id,)| id).ok_or_else(|| not_found("barbero"))
}

/// A linked account must be a BARBERO of the same barbería.
async fn check_linked_usuario(pool: &PgPool, usuario_id: i64, barberia_id: i64) -> Result<(), ApiError> {
    let row: Option<(String, Option<i64>)> =
        query_as(r#"SELECT rol, barberia_id FROM public.usuarios WHERE usuario_id = $1"#)
            .bind(usuario_id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?;
    match row {
        None => Err(not_found("usuario")),
        Some((rol, Some(b))) if rol == "BARBERO" && b == barberia_id => Ok(()),
        Some(_) => Err(super::bad_request(
            "usuario_id must reference a BARBERO account of the same barbería",
        )),
    }
}

pub async fn create_barbero(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(sucursal_id): Path<i64>,
    Json(b): Json<CreateBarberoBody>,
) -> Result<(StatusCode, Json<Barbero>), ApiError> {
    let barberia_id = super::sucursales::barberia_of(&state.pool, sucursal_id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    if let Some(uid) = b.usuario_id {
        check_linked_usuario(&state.pool, uid, barberia_id).await?;
    }

    let row = query_as::<_, Barbero>(
        r#"
        INSERT INTO public.barberos(sucursal_id, usuario_id, nombre, especialidad, activo)
        VALUES ($1,$2,$3,$4, COALESCE($5, TRUE))
        RETURNING barbero_id, sucursal_id, usuario_id, nombre, especialidad, activo
        "#,
    )
    .bind(sucursal_id).bind(b.usuario_id).bind(b.nombre).bind(b.especialidad).bind(b.activo)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_barberos(
    State(state): State<AppState>,
    Path(sucursal_id): Path<i64>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<Barbero>>, ApiError> {
    let rows = query_as::<_, Barbero>(
        r#"SELECT * FROM public.barberos WHERE sucursal_id = $1 AND ($2 OR activo) ORDER BY nombre"#)
        .bind(sucursal_id).bind(q.todos.unwrap_or(false))
        .fetch_all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn patch_barbero(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
    Json(b): Json<PatchBarberoBody>,
) -> Result<Json<Barbero>, ApiError> {
    let barberia_id = barberia_of(&state.pool, id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    // moving a barber is only allowed between sucursales of the same barbería
    if let Some(target) = b.sucursal_id {
        let target_barberia = super::sucursales::barberia_of(&state.pool, target).await?;
        access::check(&p, Action::Write, Resource::Barberia { barberia_id: target_barberia })?;
        if target_barberia != barberia_id {
            return Err(super::bad_request("sucursal_id belongs to another barbería"));
        }
    }
    if let Some(uid) = b.usuario_id {
        check_linked_usuario(&state.pool, uid, barberia_id).await?;
    }

    let row = query_as::<_, Barbero>(
        r#"
        UPDATE public.barberos SET
          nombre = COALESCE($2, nombre),
          especialidad = COALESCE($3, especialidad),
          usuario_id = COALESCE($4, usuario_id),
          sucursal_id = COALESCE($5, sucursal_id),
          activo = COALESCE($6, activo)
        WHERE barbero_id = $1
        RETURNING barbero_id, sucursal_id, usuario_id, nombre, especialidad, activo
        "#,
    )
    .bind(id).bind(b.nombre).bind(b.especialidad).bind(b.usuario_id).bind(b.sucursal_id).bind(b.activo)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

pub async fn delete_barbero(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let barberia_id = barberia_of(&state.pool, id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    let res = query(r#"DELETE FROM public.barberos WHERE barbero_id = $1"#)
        .bind(id).execute(&state.pool).await.map_err(|e| match db_error(e) {
            (StatusCode::BAD_REQUEST, _) => (
                StatusCode::CONFLICT,
                "barbero has turnos; set activo=false instead".to_string(),
            ),
            other => other,
        })?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}
