// src/routes/turnos.rs

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use sqlx::{query, query_as, PgPool};
use uuid::Uuid;

use super::{bad_request, db_error, paging, ApiError};
use crate::access::{self, Action, Principal, Resource, Role, Scope};
use crate::auth::AuthUser;
use crate::availability::{self, AvailabilityError};
use crate::models::{EstadoTurno, TurnoDetalle};
use crate::AppState;

use super::disponibilidad::{candidatos, duracion_servicios, ocupaciones, sucursal_ctx};

// ─────────────────────────────────────────────────────────────────────────────
// Request models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTurnoBody {
    pub sucursal_id: i64,
    pub barbero_id: Option<i64>,
    pub servicio_ids: Vec<i64>,
    pub fecha: NaiveDate,
    pub hora_inicio: NaiveTime,
    pub cliente_nombre: String,
    pub cliente_email: Option<String>,
    pub cliente_telefono: Option<String>,
    pub notas: Option<String>,
}

#[derive(Deserialize)]
pub struct ListTurnosQ {
    pub barberia_id: Option<i64>,
    pub sucursal_id: Option<i64>,
    pub barbero_id: Option<i64>,
    pub fecha: Option<NaiveDate>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
    pub estado: Option<EstadoTurno>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct PatchEstadoBody {
    pub estado: EstadoTurno,
    pub notas: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

const DETALLE_SELECT: &str = r#"
    SELECT t.*, s.barberia_id,
           ARRAY(SELECT ts.servicio_id FROM public.turno_servicios ts
                 WHERE ts.turno_id = t.turno_id ORDER BY ts.servicio_id) AS servicio_ids
    FROM public.turnos t
    JOIN public.sucursales s ON s.sucursal_id = t.sucursal_id
"#;

fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn resource_of(t: &TurnoDetalle) -> Resource {
    Resource::Turno {
        barberia_id: t.barberia_id,
        barbero_id: t.turno.barbero_id,
        usuario_id: t.turno.usuario_id,
    }
}

async fn load_detalle(pool: &PgPool, id: i64) -> Result<TurnoDetalle, ApiError> {
    let sql = format!("{DETALLE_SELECT} WHERE t.turno_id = $1");
    query_as::<_, TurnoDetalle>(&sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(db_error)
}

async fn load_by_codigo(pool: &PgPool, codigo: Uuid) -> Result<TurnoDetalle, ApiError> {
    let sql = format!("{DETALLE_SELECT} WHERE t.codigo = $1");
    query_as::<_, TurnoDetalle>(&sql)
        .bind(codigo)
        .fetch_one(pool)
        .await
        .map_err(db_error)
}

fn validate_cliente(b: &CreateTurnoBody, logged_in: bool) -> Result<(), ApiError> {
    if b.cliente_nombre.trim().is_empty() {
        return Err(bad_request("cliente_nombre is required"));
    }
    let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !logged_in && !has(&b.cliente_email) && !has(&b.cliente_telefono) {
        return Err(bad_request("cliente_email or cliente_telefono is required"));
    }
    if b.servicio_ids.is_empty() {
        return Err(bad_request("at least one servicio is required"));
    }
    Ok(())
}

/// (barberia_id, barbero_id, usuario_id) row filters for a listing.
fn scope_filters(
    scope: Scope,
    barberia_id: Option<i64>,
    barbero_id: Option<i64>,
) -> Result<(Option<i64>, Option<i64>, Option<i64>), ApiError> {
    match scope {
        Scope::Todo => Ok((barberia_id, barbero_id, None)),
        Scope::Barberia(own) => match barberia_id {
            Some(other) if other != own => Err(access::AccessDenied::OtherTenant.into()),
            _ => Ok((Some(own), barbero_id, None)),
        },
        Scope::Barbero { barberia_id: own, barbero_id: me } => match (barberia_id, barbero_id) {
            (Some(other), _) if other != own => Err(access::AccessDenied::OtherTenant.into()),
            (_, Some(other)) if other != me => Err((
                StatusCode::FORBIDDEN,
                "barberos can only list their own turnos".to_string(),
            )),
            _ => Ok((Some(own), Some(me), None)),
        },
        Scope::Cliente(usuario_id) => Ok((barberia_id, barbero_id, Some(usuario_id))),
        Scope::Nada => Err((StatusCode::FORBIDDEN, "account cannot list turnos".to_string())),
    }
}

/// Bookings can be cancelled by clients only before they start.
fn puede_cancelar(fecha: NaiveDate, hora_inicio: NaiveTime, now: NaiveDateTime) -> bool {
    fecha.and_time(hora_inicio) > now
}

fn transition(actual: &str, next: EstadoTurno) -> Result<EstadoTurno, ApiError> {
    let actual: EstadoTurno = actual.parse().map_err(super::internal_error)?;
    if actual.is_terminal() {
        return Err((StatusCode::CONFLICT, format!("turno is already {actual}")));
    }
    if !actual.can_transition_to(next) {
        return Err((
            StatusCode::CONFLICT,
            format!("cannot move turno from {actual} to {next}"),
        ));
    }
    Ok(actual)
}

async fn update_estado(
    pool: &PgPool,
    t: &TurnoDetalle,
    actual: EstadoTurno,
    next: EstadoTurno,
    notas: Option<String>,
) -> Result<(), ApiError> {
    // compare-and-set on the previous estado
    let res = query(
        r#"
        UPDATE public.turnos SET
          estado = $3,
          notas = COALESCE($4, notas),
          updated_at = now()
        WHERE turno_id = $1 AND estado = $2
        "#,
    )
    .bind(t.turno.turno_id)
    .bind(actual.as_str())
    .bind(next.as_str())
    .bind(notas)
    .execute(pool)
    .await
    .map_err(db_error)?;

    if res.rows_affected() == 0 {
        return Err((StatusCode::CONFLICT, "turno was modified concurrently".into()));
    }
    tracing::info!(turno_id = t.turno.turno_id, from = %actual, to = %next, "turno estado changed");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/turnos
pub async fn create_turno(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Json(b): Json<CreateTurnoBody>,
) -> Result<(StatusCode, Json<TurnoDetalle>), ApiError> {
    let principal: Option<Principal> = auth.map(|AuthUser(p)| p);
    validate_cliente(&b, principal.is_some())?;

    // 1) Sucursal and its barbería must exist and take bookings
    let (barberia_id, activa) = sucursal_ctx(&state.pool, b.sucursal_id).await?;
    if !activa {
        return Err(bad_request("sucursal is not taking bookings"));
    }

    // 2) Services decide the duration
    let mut servicio_ids = b.servicio_ids.clone();
    servicio_ids.sort_unstable();
    servicio_ids.dedup();
    let duracion = duracion_servicios(&state.pool, barberia_id, &servicio_ids, state.slot_minutes).await?;

    // 3) Opening hours for that weekday
    let jornada = super::horarios::jornada_for(&state.pool, b.sucursal_id, b.fecha).await?;
    let candidatos = candidatos(&state.pool, b.sucursal_id, b.barbero_id).await?;
    if candidatos.is_empty() {
        return Err(bad_request("sucursal has no active barberos"));
    }

    // 4) Lock the candidate barberos so concurrent bookings serialize
    let mut tx = state.pool.begin().await.map_err(db_error)?;
    query(r#"SELECT barbero_id FROM public.barberos WHERE barbero_id = ANY($1) ORDER BY barbero_id FOR UPDATE"#)
        .bind(&candidatos)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    let ocupadas = ocupaciones(&mut *tx, &candidatos, b.fecha).await?;
    let barbero_id = match b.barbero_id {
        Some(id) => id,
        // nobody free: check against the first barber to report the real reason
        None => availability::first_free_barbero(&candidatos, b.hora_inicio, duracion, &ocupadas)
            .unwrap_or(candidatos[0]),
    };
    let hora_fin = availability::check_booking(
        b.fecha,
        jornada,
        state.slot_minutes,
        barbero_id,
        b.hora_inicio,
        duracion,
        &ocupadas,
        Some(now_local()),
    )
    .map_err(|e| {
        if matches!(e, AvailabilityError::Conflict(_)) {
            tracing::info!(sucursal_id = b.sucursal_id, barbero_id, fecha = %b.fecha, hora = %b.hora_inicio, "booking conflict");
        }
        ApiError::from(e)
    })?;

    // 5) Persist
    let usuario_id = principal
        .as_ref()
        .filter(|p| p.rol == Role::Cliente)
        .map(|p| p.usuario_id);
    let (turno_id,): (i64,) = query_as(
        r#"
        INSERT INTO public.turnos
          (codigo, sucursal_id, barbero_id, usuario_id, cliente_nombre, cliente_email,
           cliente_telefono, fecha, hora_inicio, hora_fin, estado, notas)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,'PENDIENTE',$11)
        RETURNING turno_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.sucursal_id)
    .bind(barbero_id)
    .bind(usuario_id)
    .bind(b.cliente_nombre.trim())
    .bind(&b.cliente_email)
    .bind(&b.cliente_telefono)
    .bind(b.fecha)
    .bind(b.hora_inicio)
    .bind(hora_fin)
    .bind(&b.notas)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    for sid in &servicio_ids {
        query(r#"INSERT INTO public.turno_servicios(turno_id, servicio_id) VALUES ($1,$2)"#)
            .bind(turno_id)
            .bind(sid)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
    }
    tx.commit().await.map_err(db_error)?;

    tracing::info!(turno_id, sucursal_id = b.sucursal_id, barbero_id, fecha = %b.fecha, hora = %b.hora_inicio, "turno booked");
    let row = load_detalle(&state.pool, turno_id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/turnos
pub async fn list_turnos(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Query(q): Query<ListTurnosQ>,
) -> Result<Json<Vec<TurnoDetalle>>, ApiError> {
    let (limit, offset) = paging(q.limit, q.offset);
    let (barberia_id, barbero_id, usuario_id) =
        scope_filters(access::turno_scope(&p), q.barberia_id, q.barbero_id)?;
    let desde = q.fecha.or(q.desde);
    let hasta = q.fecha.or(q.hasta);

    let sql = format!(
        r#"{DETALLE_SELECT}
        WHERE ($1::bigint IS NULL OR s.barberia_id = $1)
          AND ($2::bigint IS NULL OR t.barbero_id = $2)
          AND ($3::bigint IS NULL OR t.usuario_id = $3)
          AND ($4::bigint IS NULL OR t.sucursal_id = $4)
          AND ($5::date IS NULL OR t.fecha >= $5)
          AND ($6::date IS NULL OR t.fecha <= $6)
          AND ($7::text IS NULL OR t.estado = $7)
        ORDER BY t.fecha, t.hora_inicio, t.turno_id
        LIMIT $8 OFFSET $9"#
    );
    let rows = query_as::<_, TurnoDetalle>(&sql)
        .bind(barberia_id)
        .bind(barbero_id)
        .bind(usuario_id)
        .bind(q.sucursal_id)
        .bind(desde)
        .bind(hasta)
        .bind(q.estado.map(EstadoTurno::as_str))
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(rows))
}

/// GET /api/v1/turnos/:id
pub async fn get_turno(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TurnoDetalle>, ApiError> {
    let row = load_detalle(&state.pool, id).await?;
    access::check(&p, Action::Read, resource_of(&row))?;
    Ok(Json(row))
}

/// PATCH /api/v1/turnos/:id/estado
pub async fn patch_estado(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
    Json(b): Json<PatchEstadoBody>,
) -> Result<Json<TurnoDetalle>, ApiError> {
    let t = load_detalle(&state.pool, id).await?;
    access::check(&p, Action::Write, resource_of(&t))?;

    if p.rol == Role::Cliente {
        if b.estado != EstadoTurno::Cancelado {
            return Err((StatusCode::FORBIDDEN, "clients can only cancel".into()));
        }
        if !puede_cancelar(t.turno.fecha, t.turno.hora_inicio, now_local()) {
            return Err((StatusCode::CONFLICT, "turno already started".into()));
        }
    }

    let actual = transition(&t.turno.estado, b.estado)?;
    update_estado(&state.pool, &t, actual, b.estado, b.notas).await?;
    Ok(Json(load_detalle(&state.pool, id).await?))
}

/// DELETE /api/v1/turnos/:id. Admin clean-up; clients cancel instead.
pub async fn delete_turno(
    State(state): State<AppState>,
    AuthUser(p): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !p.rol.is_admin() {
        return Err((StatusCode::FORBIDDEN, format!("{} cannot delete turnos", p.rol)));
    }
    let t = load_detalle(&state.pool, id).await?;
    access::check(&p, Action::Write, resource_of(&t))?;

    let res = query(r#"DELETE FROM public.turnos WHERE turno_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(db_error)?;
    tracing::info!(turno_id = id, by = p.usuario_id, "turno deleted");
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}

/// GET /api/v1/reservas/:codigo
pub async fn get_reserva(
    State(state): State<AppState>,
    Path(codigo): Path<Uuid>,
) -> Result<Json<TurnoDetalle>, ApiError> {
    Ok(Json(load_by_codigo(&state.pool, codigo).await?))
}

/// POST /api/v1/reservas/:codigo/cancelar
pub async fn cancelar_reserva(
    State(state): State<AppState>,
    Path(codigo): Path<Uuid>,
) -> Result<Json<TurnoDetalle>, ApiError> {
    let t = load_by_codigo(&state.pool, codigo).await?;
    if !puede_cancelar(t.turno.fecha, t.turno.hora_inicio, now_local()) {
        return Err((StatusCode::CONFLICT, "turno already started".into()));
    }
    let actual = transition(&t.turno.estado, EstadoTurno::Cancelado)?;
    update_estado(&state.pool, &t, actual, EstadoTurno::Cancelado, None).await?;
    Ok(Json(load_detalle(&state.pool, t.turno.turno_id).await?))
}
