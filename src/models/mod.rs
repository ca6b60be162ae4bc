// src/models/mod.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ───────────────────────────────────────
// Tenancy: barberías and their sucursales
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Barberia {
    pub barberia_id: i64,
    pub nombre: String,
    pub slug: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub activa: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Sucursal {
    pub sucursal_id: i64,
    pub barberia_id: i64,
    pub nombre: String,
    pub direccion: String,
    pub telefono: Option<String>,
    pub hora_apertura: NaiveTime,
    pub hora_cierre: NaiveTime,
    pub activa: bool,
}

/// Per-weekday override of a sucursal's default opening hours.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct HorarioSucursal {
    pub sucursal_id: i64,
    pub dia_semana: i16,          // 0 = Monday .. 6 = Sunday
    pub hora_apertura: NaiveTime,
    pub hora_cierre: NaiveTime,
    pub cerrado: bool,
}

// ───────────────────────────────────────
// Staff & catalogue
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Barbero {
    pub barbero_id: i64,
    pub sucursal_id: i64,
    pub usuario_id: Option<i64>,
    pub nombre: String,
    pub especialidad: Option<String>,
    pub activo: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Servicio {
    pub servicio_id: i64,
    pub barberia_id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub duracion_min: i32,
    pub precio_centavos: i64,
    pub activo: bool,
}

// ───────────────────────────────────────
// Accounts (role string, see access::Role)
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Usuario {
    pub usuario_id: i64,
    pub email: String,
    pub nombre: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub rol: String,
    pub barberia_id: Option<i64>,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Bookings
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Turno {
    pub turno_id: i64,
    pub codigo: Uuid,
    pub sucursal_id: i64,
    pub barbero_id: i64,
    pub usuario_id: Option<i64>,
    pub cliente_nombre: String,
    pub cliente_email: Option<String>,
    pub cliente_telefono: Option<String>,
    pub fecha: NaiveDate,
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
    pub estado: String,
    pub notas: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A turno joined with the tenant that owns it and its booked services.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct TurnoDetalle {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub turno: Turno,
    pub barberia_id: i64,
    pub servicio_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoTurno {
    Pendiente,
    Confirmado,
    Cancelado,
    Completado,
}

impl EstadoTurno {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "PENDIENTE",
            Self::Confirmado => "CONFIRMADO",
            Self::Cancelado => "CANCELADO",
            Self::Completado => "COMPLETADO",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelado | Self::Completado)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use EstadoTurno::*;
        matches!(
            (self, next),
            (Pendiente, Confirmado)
                | (Pendiente, Cancelado)
                | (Pendiente, Completado)
                | (Confirmado, Completado)
                | (Confirmado, Cancelado)
        )
    }
}

impl fmt::Display for EstadoTurno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstadoTurno {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDIENTE" => Ok(Self::Pendiente),
            "CONFIRMADO" => Ok(Self::Confirmado),
            "CANCELADO" => Ok(Self::Cancelado),
            "COMPLETADO" => Ok(Self::Completado),
            other => Err(format!("unknown turno estado '{other}'")),
        }
    }
}

// ───────────────────────────────────────
// DTOs helpful for endpoints
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ConteoEstado {
    pub estado: String,
    pub cantidad: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Resumen {
    pub barberia_id: i64,
    pub desde: NaiveDate,
    pub hasta: NaiveDate,
    pub total_turnos: i64,
    pub por_estado: Vec<ConteoEstado>,
    pub ingresos_centavos: i64,
    pub turnos_hoy: i64,
}
