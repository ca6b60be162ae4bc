// src/routes/auth.rs

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::query_as;

use super::{bad_request, db_error, ApiError};
use crate::auth::{self, AuthError, AuthUser};
use crate::{models::Usuario, AppState};

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegistroBody {
    pub nombre: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct Session {
    pub token: String,
    pub expires_in: i64,
    pub usuario: Usuario,
    pub barbero_id: Option<i64>,
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') && !email.contains(' ') => {
            Ok(email)
        }
        _ => Err(bad_request(format!("invalid email '{raw}'"))),
    }
}

/// Barber profile linked to the account, carried in the token for BARBERO scoping.
async fn linked_barbero(state: &AppState, usuario_id: i64) -> Result<Option<i64>, ApiError> {
    let row: Option<(i64,)> = query_as(r#"SELECT barbero_id FROM public.barberos WHERE usuario_id = $1"#)
        .bind(usuario_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(row.map(|(id,)| id))
}

async fn session_for(state: &AppState, usuario: Usuario) -> Result<Session, ApiError> {
    let barbero_id = linked_barbero(state, usuario.usuario_id).await?;
    let token = state.jwt.issue(&usuario, barbero_id)?;
    Ok(Session { token, expires_in: state.jwt.ttl_seconds(), usuario, barbero_id })
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(b): Json<LoginBody>,
) -> Result<Json<Session>, ApiError> {
    let email = b.email.trim().to_lowercase();
    let usuario = query_as::<_, Usuario>(r#"SELECT * FROM public.usuarios WHERE email = $1"#)
        .bind(&email)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error)?;

    let Some(usuario) = usuario else {
        auth::verify_unknown_user(b.password).await;
        tracing::warn!(%email, "login for unknown email");
        return Err(AuthError::BadCredentials.into());
    };
    if !auth::verify_password(b.password, usuario.password_hash.clone()).await {
        tracing::warn!(usuario_id = usuario.usuario_id, "login with wrong password");
        return Err(AuthError::BadCredentials.into());
    }
    if !usuario.activo {
        return Err(AuthError::Inactive.into());
    }

    tracing::info!(usuario_id = usuario.usuario_id, rol = %usuario.rol, "login");
    Ok(Json(session_for(&state, usuario).await?))
}

/// POST /api/v1/auth/registro: self-service CLIENTE accounts.
pub async fn registro(
    State(state): State<AppState>,
    Json(b): Json<RegistroBody>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let email = normalize_email(&b.email)?;
    let nombre = b.nombre.trim();
    if nombre.is_empty() {
        return Err(bad_request("nombre is required"));
    }
    let password_hash = auth::hash_password(b.password).await?;

    let usuario = query_as::<_, Usuario>(
        r#"
        INSERT INTO public.usuarios(email, nombre, password_hash, rol)
        VALUES ($1,$2,$3,'CLIENTE')
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(nombre)
    .bind(&password_hash)
    .fetch_one(&state.pool)
    .await
    .map_err(db_error)?;

    tracing::info!(usuario_id = usuario.usuario_id, "client registered");
    Ok((StatusCode::CREATED, Json(session_for(&state, usuario).await?)))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
) -> Result<Json<Usuario>, ApiError> {
    let row = query_as::<_, Usuario>(r#"SELECT * FROM public.usuarios WHERE usuario_id = $1"#)
        .bind(p.usuario_id)
        .fetch_one(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Fade.COM ").unwrap(), "ana@fade.com");
        assert!(normalize_email("ana").is_err());
        assert!(normalize_email("@fade.com").is_err());
        assert!(normalize_email("ana@localhost").is_err());
        assert!(normalize_email("a na@fade.com").is_err());
    }
}
