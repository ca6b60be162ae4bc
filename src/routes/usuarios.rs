// src/routes/usuarios.rs

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::{query, query_as};

use super::{auth::normalize_email, bad_request, db_error, paging, ApiError};
use crate::access::{self, Action, Resource, Role};
use crate::auth::{self, AuthUser};
use crate::{models::Usuario, AppState};

#[derive(Deserialize)]
pub struct ListUsuariosQ {
    pub barberia_id: Option<i64>,
    pub rol: Option<Role>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateUsuarioBody {
    pub email: String,
    pub nombre: String,
    pub password: String,
    pub rol: Role,
    pub barberia_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct PatchUsuarioBody {
    pub nombre: Option<String>,
    pub password: Option<String>,
    pub rol: Option<Role>,
    pub barberia_id: Option<i64>,
    pub activo: Option<bool>,
}

/// Staff roles belong to exactly one barbería; SUPER_ADMIN to none.
fn validate_role_tenant(rol: Role, barberia_id: Option<i64>) -> Result<(), ApiError> {
    match (rol, barberia_id) {
        (Role::SuperAdmin, Some(_)) => Err(bad_request("SUPER_ADMIN accounts cannot belong to a barbería")),
        (Role::AdminBarberia | Role::Barbero, None) => {
            Err(bad_request(format!("{rol} accounts require barberia_id")))
        }
        _ => Ok(()),
    }
}

pub async fn create_usuario(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Json(b): Json<CreateUsuarioBody>,
) -> Result<(StatusCode, Json<Usuario>), ApiError> {
    validate_role_tenant(b.rol, b.barberia_id)?;
    // usuario_id is not assigned yet; ids start at 1
    access::check(&p, Action::Write, Resource::Usuario { usuario_id: 0, barberia_id: b.barberia_id, rol: b.rol })?;
    let email = normalize_email(&b.email)?;
    let password_hash = auth::hash_password(b.password).await?;

    let row = query_as::<_, Usuario>(
        r#"
        INSERT INTO public.usuarios(email, nombre, password_hash, rol, barberia_id)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(&email).bind(b.nombre.trim()).bind(&password_hash)
    .bind(b.rol.as_str()).bind(b.barberia_id)
    .fetch_one(&state.pool).await.map_err(db_error)?;

    tracing::info!(usuario_id = row.usuario_id, rol = %b.rol, by = p.usuario_id, "usuario created");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_usuarios(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Query(q): Query<ListUsuariosQ>,
) -> Result<Json<Vec<Usuario>>, ApiError> {
    let (limit, offset) = paging(q.limit, q.offset);
    let barberia = access::tenant_filter(&p, q.barberia_id)?;

    let rows = query_as::<_, Usuario>(
        r#"
        SELECT * FROM public.usuarios
        WHERE ($1::bigint IS NULL OR barberia_id = $1)
          AND ($2::text IS NULL OR rol = $2)
        ORDER BY usuario_id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(barberia)
    .bind(q.rol.map(Role::as_str))
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool).await.map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn patch_usuario(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
    Json(b): Json<PatchUsuarioBody>,
) -> Result<Json<Usuario>, ApiError> {
    let current = query_as::<_, Usuario>(r#"SELECT * FROM public.usuarios WHERE usuario_id = $1"#)
        .bind(id)
        .fetch_one(&state.pool).await.map_err(db_error)?;
    let current_rol: Role = current.rol.parse().map_err(super::internal_error)?;

    // anyone may change their own name and password
    let self_service = id == p.usuario_id && b.rol.is_none() && b.barberia_id.is_none() && b.activo.is_none();
    if !self_service {
        access::check(&p, Action::Write, Resource::Usuario { usuario_id: id, barberia_id: current.barberia_id, rol: current_rol })?;
        let next_rol = b.rol.unwrap_or(current_rol);
        let next_barberia = b.barberia_id.or(current.barberia_id);
        validate_role_tenant(next_rol, next_barberia)?;
        access::check(&p, Action::Write, Resource::Usuario { usuario_id: id, barberia_id: next_barberia, rol: next_rol })?;
    }

    let password_hash = match b.password {
        Some(pw) => Some(auth::hash_password(pw).await?),
        None => None,
    };

    let row = query_as::<_, Usuario>(
        r#"
        UPDATE public.usuarios SET
          nombre = COALESCE($2, nombre),
          password_hash = COALESCE($3, password_hash),
          rol = COALESCE($4, rol),
          barberia_id = COALESCE($5, barberia_id),
          activo = COALESCE($6, activo),
          updated_at = now()
        WHERE usuario_id = $1
        RETURNING *
        "#,
    )
    .bind(id).bind(b.nombre).bind(password_hash)
    .bind(b.rol.map(Role::as_str)).bind(b.barberia_id).bind(b.activo)
    .fetch_one(&state.pool).await.map_err(db_error)?;
    Ok(Json(row))
}

pub async fn delete_usuario(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if id == p.usuario_id {
        return Err(bad_request("cannot delete your own account"));
    }
    let (rol, barberia_id): (String, Option<i64>) =
        query_as(r#"SELECT rol, barberia_id FROM public.usuarios WHERE usuario_id = $1"#)
            .bind(id)
            .fetch_one(&state.pool).await.map_err(db_error)?;
    let rol: Role = rol.parse().map_err(super::internal_error)?;
    access::check(&p, Action::Write, Resource::Usuario { usuario_id: id, barberia_id, rol })?;

    let res = query(r#"DELETE FROM public.usuarios WHERE usuario_id=$1"#)
        .bind(id).execute(&state.pool).await.map_err(db_error)?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_and_tenants_must_agree() {
        assert!(validate_role_tenant(Role::SuperAdmin, None).is_ok());
        assert!(validate_role_tenant(Role::SuperAdmin, Some(1)).is_err());
        assert!(validate_role_tenant(Role::AdminBarberia, Some(1)).is_ok());
        assert!(validate_role_tenant(Role::AdminBarberia, None).is_err());
        assert!(validate_role_tenant(Role::Barbero, None).is_err());
        assert!(validate_role_tenant(Role::Cliente, None).is_ok());
        assert!(validate_role_tenant(Role::Cliente, Some(2)).is_ok());
    }
}
