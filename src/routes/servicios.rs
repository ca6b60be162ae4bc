// src/routes/servicios.rs

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::{query, query_as, PgPool};

use super::{bad_request, db_error, not_found, ApiError};
use crate::access::{self, Action, Resource};
use crate::auth::AuthUser;
use crate::{models::Servicio, AppState};

const MAX_DURACION_MIN: i32 = 8 * 60;

#[derive(Deserialize)]
pub struct ListQ {
    pub todos: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateServicioBody {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub duracion_min: i32,
    pub precio_centavos: i64,
    pub activo: Option<bool>,
}

#[derive(Deserialize)]
pub struct PatchServicioBody {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub duracion_min: Option<i32>,
    pub precio_centavos: Option<i64>,
    pub activo: Option<bool>,
}

fn validate(duracion_min: Option<i32>, precio_centavos: Option<i64>) -> Result<(), ApiError> {
    if let Some(d) = duracion_min {
        if d <= 0 || d > MAX_DURACION_MIN {
            return Err(bad_request(format!("duracion_min must be 1..={MAX_DURACION_MIN}")));
        }
    }
    if precio_centavos.is_some_and(|p| p < 0) {
        return Err(bad_request("precio_centavos cannot be negative"));
    }
    Ok(())
}

pub(crate) async fn barberia_of(pool: &PgPool, servicio_id: i64) -> Result<i64, ApiError> {
    let row: Option<(i64,)> =
        query_as(r#"SELECT barberia_id FROM public.servicios WHERE servicio_id = $1"#)
            .bind(servicio_id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?;
    row.map(|(id,)| id).ok_or_else(|| not_found("servicio"))
}

pub async fn create_servicio(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(barberia_id): Path<i64>,
    Json(b): Json<CreateServicioBody>,
) -> Result<(StatusCode, Json<Servicio>), ApiError> {
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    validate(Some(b.duracion_min), Some(b.precio_centavos))?;

    let row = query_as::<_, Servicio>(
        r#"
        INSERT INTO public.servicios(barberia_id, nombre, descripcion, duracion_min, precio_centavos, activo)
        VALUES ($1,$2,$3,$4,$5, COALESCE($6, TRUE))
        RETURNING servicio_id, barberia_id, nombre, descripcion, duracion_min, precio_centavos, activo
        "#,
    )
    .bind(barberia_id).bind(b.nombre).bind(b.descripcion)
    .bind(b.duracion_min).bind(b.precio_centavos).bind(b.activo)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_servicios(
    State(state): State<AppState>,
    Path(barberia_id): Path<i64>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<Servicio>>, ApiError> {
    let rows = query_as::<_, Servicio>(
        r#"SELECT * FROM public.servicios WHERE barberia_id = $1 AND ($2 OR activo) ORDER BY nombre"#)
        .bind(barberia_id).bind(q.todos.unwrap_or(false))
        .fetch_all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn patch_servicio(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
    Json(b): Json<PatchServicioBody>,
) -> Result<Json<Servicio>, ApiError> {
    let barberia_id = barberia_of(&state.pool, id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    validate(b.duracion_min, b.precio_centavos)?;

    let row = query_as::<_, Servicio>(
        r#"
        UPDATE public.servicios SET
          nombre = COALESCE($2, nombre),
          descripcion = COALESCE($3, descripcion),
          duracion_min = COALESCE($4, duracion_min),
          precio_centavos = COALESCE($5, precio_centavos),
          activo = COALESCE($6, activo)
        WHERE servicio_id = $1
        RETURNING servicio_id, barberia_id, nombre, descripcion, duracion_min, precio_centavos, activo
        "#,
    )
    .bind(id).bind(b.nombre).bind(b.descripcion).bind(b.duracion_min).bind(b.precio_centavos).bind(b.activo)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

/// Services referenced by past turnos cannot be removed; deactivate them instead.
pub async fn delete_servicio(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let barberia_id = barberia_of(&state.pool, id).await?;
    access::check(&p, Action::Write, Resource::Barberia { barberia_id })?;
    let res = query(r#"DELETE FROM public.servicios WHERE servicio_id=$1"#)
        .bind(id).execute(&state.pool).await.map_err(|e| match db_error(e) {
            (StatusCode::BAD_REQUEST, _) => (
                StatusCode::CONFLICT,
                "servicio is referenced by turnos; set activo=false instead".to_string(),
            ),
            other => other,
        })?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}

#[cfg(test)]
mod tests {
    use super::validate;

    #[test]
    fn durations_and_prices_are_bounded() {
        assert!(validate(Some(30), Some(1500)).is_ok());
        assert!(validate(None, None).is_ok());
        assert!(validate(Some(0), None).is_err());
        assert!(validate(Some(481), None).is_err());
        assert!(validate(None, Some(-1)).is_err());
    }
}
