// src/routes/barberias.rs

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as};

use super::{bad_request, db_error, paging, ApiError};
use crate::access::{self, Action, Resource};
use crate::auth::AuthUser;
use crate::{models::Barberia, AppState};

#[derive(Deserialize)]
pub struct ListQ {
    /// include inactive barberías (SUPER_ADMIN only)
    pub todas: Option<bool>,
    pub slug: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateBarberiaBody {
    pub nombre: String,
    pub slug: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_activa")] pub activa: bool,
}
fn default_activa() -> bool { true }

#[derive(Deserialize)]
pub struct PatchBarberiaBody {
    pub nombre: Option<String>,
    pub slug: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub activa: Option<bool>,
}

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

/// Lowercase ascii letters, digits and single inner hyphens.
pub(crate) fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 64
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub async fn list_barberias(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<Barberia>>, ApiError> {
    let (limit, offset) = paging(q.limit, q.offset);
    let todas = q.todas.unwrap_or(false);
    if todas {
        let AuthUser(p) = auth.ok_or((StatusCode::UNAUTHORIZED, "login required".to_string()))?;
        access::check(&p, Action::Read, Resource::Plataforma)?;
    }

    let rows = query_as::<_, Barberia>(
        r#"
        SELECT * FROM public.barberias
        WHERE ($1 OR activa)
          AND ($2::text IS NULL OR slug = $2)
        ORDER BY nombre
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(todas)
    .bind(q.slug)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn get_barberia(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Barberia>, ApiError> {
    let row = query_as::<_, Barberia>(r#"SELECT * FROM public.barberias WHERE barberia_id = $1"#)
        .bind(id)
        .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

pub async fn create_barberia(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Json(body): Json<CreateBarberiaBody>,
) -> Result<(StatusCode, Json<Barberia>), ApiError> {
    access::check(&p, Action::Write, Resource::Plataforma)?;
    if body.nombre.trim().is_empty() {
        return Err(bad_request("nombre is required"));
    }
    if !valid_slug(&body.slug) {
        return Err(bad_request(format!("invalid slug '{}'", body.slug)));
    }

    let row = query_as::<_, Barberia>(
        r#"
        INSERT INTO public.barberias(nombre, slug, telefono, email, activa)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(body.nombre.trim())
    .bind(&body.slug)
    .bind(&body.telefono)
    .bind(&body.email)
    .bind(body.activa)
    .fetch_one(&state.pool).await.map_err(db_error)?;

    tracing::info!(barberia_id = row.barberia_id, slug = %row.slug, by = p.usuario_id, "barbería created");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn patch_barberia(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<PatchBarberiaBody>,
) -> Result<Json<Barberia>, ApiError> {
    access::check(&p, Action::Write, Resource::Barberia { barberia_id: id })?;
    // suspending a tenant is a platform decision
    if body.activa.is_some() {
        access::check(&p, Action::Write, Resource::Plataforma)?;
    }
    if let Some(slug) = &body.slug {
        if !valid_slug(slug) {
            return Err(bad_request(format!("invalid slug '{slug}'")));
        }
    }

    let row = query_as::<_, Barberia>(
        r#"
        UPDATE public.barberias SET
            nombre = COALESCE($2, nombre),
            slug = COALESCE($3, slug),
            telefono = COALESCE($4, telefono),
            email = COALESCE($5, email),
            activa = COALESCE($6, activa),
            updated_at = now()
        WHERE barberia_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(body.nombre)
    .bind(body.slug)
    .bind(body.telefono)
    .bind(body.email)
    .bind(body.activa)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

pub async fn delete_barberia(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Deleted>, ApiError> {
    access::check(&p, Action::Write, Resource::Plataforma)?;

    // Turnos go first: servicios and barberos refuse to be deleted while referenced.
    let mut tx = state.pool.begin().await.map_err(db_error)?;
    let turnos = query(
        r#"
        DELETE FROM public.turnos t
        USING public.sucursales s
        WHERE s.sucursal_id = t.sucursal_id AND s.barberia_id = $1
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    let res = query(r#"DELETE FROM public.barberias WHERE barberia_id = $1"#)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    tx.commit().await.map_err(db_error)?;

    tracing::info!(barberia_id = id, turnos = turnos.rows_affected(), by = p.usuario_id, "barbería deleted");
    Ok(Json(Deleted { deleted: res.rows_affected() > 0 }))
}

#[cfg(test)]
mod tests {
    use super::valid_slug;

    #[test]
    fn slugs() {
        assert!(valid_slug("la-navaja"));
        assert!(valid_slug("fade42"));
        assert!(!valid_slug(""));
        assert!(!valid_slug("La-Navaja"));
        assert!(!valid_slug("-navaja"));
        assert!(!valid_slug("la--navaja"));
        assert!(!valid_slug("la navaja"));
        assert!(!valid_slug("peluquería"));
    }
}
