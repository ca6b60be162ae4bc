// src/lib.rs

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use sqlx::{Pool, Postgres};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod access;
pub mod auth;
pub mod availability;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub jwt: auth::JwtKeys,
    pub slot_minutes: u32,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: &config::Config) -> Self {
        Self {
            pool,
            jwt: auth::JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            slot_minutes: config.slot_minutes,
        }
    }
}

pub fn app(state: AppState) -> Router {
    // Public booking pages live on other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health
        .route("/health", get(routes::health::health))
        // auth
        .route("/api/v1/auth/login", post(routes::auth::login))
        .route("/api/v1/auth/registro", post(routes::auth::registro))
        .route("/api/v1/auth/me", get(routes::auth::me))
        // barberías
        .route(
            "/api/v1/barberias",
            post(routes::barberias::create_barberia).get(routes::barberias::list_barberias),
        )
        .route(
            "/api/v1/barberias/:id",
            get(routes::barberias::get_barberia)
                .patch(routes::barberias::patch_barberia)
                .delete(routes::barberias::delete_barberia),
        )
        .route("/api/v1/barberias/:id/resumen", get(routes::resumen::get_resumen))
        // sucursales
        .route(
            "/api/v1/barberias/:id/sucursales",
            post(routes::sucursales::create_sucursal).get(routes::sucursales::list_sucursales),
        )
        .route(
            "/api/v1/sucursales/:id",
            get(routes::sucursales::get_sucursal)
                .patch(routes::sucursales::patch_sucursal)
                .delete(routes::sucursales::delete_sucursal),
        )
        // weekly opening hours
        .route("/api/v1/sucursales/:id/horarios", get(routes::horarios::list_horarios))
        .route(
            "/api/v1/sucursales/:id/horarios/bulk",
            put(routes::horarios::bulk_upsert_horarios),
        )
        // barberos
        .route(
            "/api/v1/sucursales/:id/barberos",
            post(routes::barberos::create_barbero).get(routes::barberos::list_barberos),
        )
        .route(
            "/api/v1/barberos/:id",
            patch(routes::barberos::patch_barbero).delete(routes::barberos::delete_barbero),
        )
        // servicios
        .route(
            "/api/v1/barberias/:id/servicios",
            post(routes::servicios::create_servicio).get(routes::servicios::list_servicios),
        )
        .route(
            "/api/v1/servicios/:id",
            patch(routes::servicios::patch_servicio).delete(routes::servicios::delete_servicio),
        )
        // usuarios
        .route(
            "/api/v1/usuarios",
            post(routes::usuarios::create_usuario).get(routes::usuarios::list_usuarios),
        )
        .route(
            "/api/v1/usuarios/:id",
            patch(routes::usuarios::patch_usuario).delete(routes::usuarios::delete_usuario),
        )
        // availability
        .route(
            "/api/v1/disponibilidad",
            get(routes::disponibilidad::get_disponibilidad),
        )
        // turnos
        .route(
            "/api/v1/turnos",
            post(routes::turnos::create_turno).get(routes::turnos::list_turnos),
        )
        .route(
            "/api/v1/turnos/:id",
            get(routes::turnos::get_turno).delete(routes::turnos::delete_turno),
        )
        .route("/api/v1/turnos/:id/estado", patch(routes::turnos::patch_estado))
        // booking code lookups (no account needed)
        .route("/api/v1/reservas/:codigo", get(routes::turnos::get_reserva))
        .route(
            "/api/v1/reservas/:codigo/cancelar",
            post(routes::turnos::cancelar_reserva),
        )
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
