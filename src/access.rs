// src/access.rs

//! Multi-tenant authorization.
//!
//! Every decision compares the requester's role and tenant claims against the
//! tenant that owns the resource. The checks are pure: callers load the owning
//! `barberia_id` (and barber/client ids for turnos) before asking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    AdminBarberia,
    Barbero,
    Cliente,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::AdminBarberia => "ADMIN_BARBERIA",
            Self::Barbero => "BARBERO",
            Self::Cliente => "CLIENTE",
        }
    }

    pub const fn is_admin(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::AdminBarberia)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            "ADMIN_BARBERIA" => Ok(Self::AdminBarberia),
            "BARBERO" => Ok(Self::Barbero),
            "CLIENTE" => Ok(Self::Cliente),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Who is asking, as carried by the session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub usuario_id: i64,
    pub rol: Role,
    pub barberia_id: Option<i64>,
    pub barbero_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
}

/// What is being touched, reduced to the attributes the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Tenant lifecycle: creating, listing inactive or deleting barberías.
    Plataforma,
    /// A tenant and everything it owns (sucursales, barberos, servicios, horarios).
    Barberia { barberia_id: i64 },
    Turno {
        barberia_id: i64,
        barbero_id: i64,
        usuario_id: Option<i64>,
    },
    Usuario {
        usuario_id: i64,
        barberia_id: Option<i64>,
        rol: Role,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("{rol} cannot {action} this resource")]
    Forbidden { rol: Role, action: &'static str },
    #[error("resource belongs to another barbería")]
    OtherTenant,
    #[error("account has no barbería assigned")]
    MissingTenant,
}

/// Row filter a principal is allowed to list with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Todo,
    Barberia(i64),
    Barbero { barberia_id: i64, barbero_id: i64 },
    Cliente(i64),
    Nada,
}

pub fn check(p: &Principal, action: Action, resource: Resource) -> Result<(), AccessDenied> {
    if p.rol == Role::SuperAdmin {
        return Ok(());
    }

    let forbidden = || AccessDenied::Forbidden {
        rol: p.rol,
        action: match action {
            Action::Read => "read",
            Action::Write => "modify",
        },
    };

    match resource {
        Resource::Plataforma => Err(forbidden()),

        Resource::Barberia { barberia_id } => match (p.rol, action) {
            // tenant catalogue is public
            (_, Action::Read) => Ok(()),
            (Role::AdminBarberia, Action::Write) => same_tenant(p, barberia_id),
            _ => Err(forbidden()),
        },

        Resource::Turno {
            barberia_id,
            barbero_id,
            usuario_id,
        } => match p.rol {
            Role::AdminBarberia => same_tenant(p, barberia_id),
            Role::Barbero => {
                same_tenant(p, barberia_id)?;
                if p.barbero_id == Some(barbero_id) {
                    Ok(())
                } else {
                    Err(forbidden())
                }
            }
            Role::Cliente => {
                if usuario_id == Some(p.usuario_id) {
                    Ok(())
                } else {
                    Err(forbidden())
                }
            }
            Role::SuperAdmin => Ok(()),
        },

        Resource::Usuario {
            usuario_id,
            barberia_id,
            rol,
        } => {
            if action == Action::Read && usuario_id == p.usuario_id {
                return Ok(());
            }
            match p.rol {
                Role::AdminBarberia => {
                    if rol == Role::SuperAdmin {
                        return Err(forbidden());
                    }
                    match barberia_id {
                        Some(id) => same_tenant(p, id),
                        None => Err(AccessDenied::OtherTenant),
                    }
                }
                _ => Err(forbidden()),
            }
        }
    }
}

fn same_tenant(p: &Principal, barberia_id: i64) -> Result<(), AccessDenied> {
    match p.barberia_id {
        None => Err(AccessDenied::MissingTenant),
        Some(own) if own == barberia_id => Ok(()),
        Some(_) => Err(AccessDenied::OtherTenant),
    }
}

/// Rows of turnos a principal may list.
pub fn turno_scope(p: &Principal) -> Scope {
    match (p.rol, p.barberia_id, p.barbero_id) {
        (Role::SuperAdmin, _, _) => Scope::Todo,
        (Role::AdminBarberia, Some(b), _) => Scope::Barberia(b),
        (Role::Barbero, Some(b), Some(barbero_id)) => Scope::Barbero {
            barberia_id: b,
            barbero_id,
        },
        (Role::Cliente, _, _) => Scope::Cliente(p.usuario_id),
        _ => Scope::Nada,
    }
}

/// Narrows an optional `barberia_id` filter to what the principal may see.
/// `Ok(None)` means "every tenant" and is only returned for SUPER_ADMIN.
pub fn tenant_filter(p: &Principal, requested: Option<i64>) -> Result<Option<i64>, AccessDenied> {
    match p.rol {
        Role::SuperAdmin => Ok(requested),
        Role::AdminBarberia => {
            let own = p.barberia_id.ok_or(AccessDenied::MissingTenant)?;
            match requested {
                Some(id) if id != own => Err(AccessDenied::OtherTenant),
                _ => Ok(Some(own)),
            }
        }
        rol => Err(AccessDenied::Forbidden {
            rol,
            action: "list",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn super_admin() -> Principal {
        Principal { usuario_id: 1, rol: Role::SuperAdmin, barberia_id: None, barbero_id: None }
    }

    fn admin(barberia: i64) -> Principal {
        Principal { usuario_id: 2, rol: Role::AdminBarberia, barberia_id: Some(barberia), barbero_id: None }
    }

    fn barbero(barberia: i64, barbero_id: i64) -> Principal {
        Principal { usuario_id: 3, rol: Role::Barbero, barberia_id: Some(barberia), barbero_id: Some(barbero_id) }
    }

    fn cliente(id: i64) -> Principal {
        Principal { usuario_id: id, rol: Role::Cliente, barberia_id: None, barbero_id: None }
    }

    fn turno(barberia_id: i64, barbero_id: i64, usuario_id: Option<i64>) -> Resource {
        Resource::Turno { barberia_id, barbero_id, usuario_id }
    }

    #[test]
    fn super_admin_reaches_everything() {
        let p = super_admin();
        assert!(check(&p, Action::Write, Resource::Plataforma).is_ok());
        assert!(check(&p, Action::Write, Resource::Barberia { barberia_id: 99 }).is_ok());
        assert!(check(&p, Action::Write, turno(7, 1, None)).is_ok());
        assert!(check(&p, Action::Write, Resource::Usuario { usuario_id: 5, barberia_id: None, rol: Role::SuperAdmin }).is_ok());
    }

    #[test]
    fn tenant_admin_is_confined_to_own_barberia() {
        let p = admin(10);
        assert!(check(&p, Action::Write, Resource::Barberia { barberia_id: 10 }).is_ok());
        assert_eq!(
            check(&p, Action::Write, Resource::Barberia { barberia_id: 11 }),
            Err(AccessDenied::OtherTenant)
        );
        assert!(check(&p, Action::Write, turno(10, 4, Some(8))).is_ok());
        assert_eq!(check(&p, Action::Read, turno(11, 4, None)), Err(AccessDenied::OtherTenant));
        assert!(check(&p, Action::Write, Resource::Plataforma).is_err());
    }

    #[test]
    fn tenant_admin_without_claim_is_denied() {
        let p = Principal { barberia_id: None, ..admin(0) };
        assert_eq!(
            check(&p, Action::Write, Resource::Barberia { barberia_id: 1 }),
            Err(AccessDenied::MissingTenant)
        );
    }

    #[test]
    fn tenant_admin_manages_users_but_not_super_admins() {
        let p = admin(10);
        let staff = Resource::Usuario { usuario_id: 20, barberia_id: Some(10), rol: Role::Barbero };
        let foreign = Resource::Usuario { usuario_id: 21, barberia_id: Some(12), rol: Role::Barbero };
        let root = Resource::Usuario { usuario_id: 1, barberia_id: Some(10), rol: Role::SuperAdmin };
        let orphan = Resource::Usuario { usuario_id: 22, barberia_id: None, rol: Role::Cliente };
        assert!(check(&p, Action::Write, staff).is_ok());
        assert_eq!(check(&p, Action::Write, foreign), Err(AccessDenied::OtherTenant));
        assert!(check(&p, Action::Write, root).is_err());
        assert!(check(&p, Action::Read, orphan).is_err());
    }

    #[test]
    fn barbero_sees_only_own_turnos() {
        let p = barbero(10, 4);
        assert!(check(&p, Action::Write, turno(10, 4, None)).is_ok());
        assert!(check(&p, Action::Read, turno(10, 5, None)).is_err());
        assert_eq!(check(&p, Action::Read, turno(11, 4, None)), Err(AccessDenied::OtherTenant));
        assert!(check(&p, Action::Read, Resource::Barberia { barberia_id: 10 }).is_ok());
        assert!(check(&p, Action::Write, Resource::Barberia { barberia_id: 10 }).is_err());
    }

    #[test]
    fn cliente_owns_only_own_bookings() {
        let p = cliente(42);
        assert!(check(&p, Action::Write, turno(10, 4, Some(42))).is_ok());
        assert!(check(&p, Action::Read, turno(10, 4, Some(43))).is_err());
        assert!(check(&p, Action::Read, turno(10, 4, None)).is_err());
        assert!(check(&p, Action::Read, Resource::Barberia { barberia_id: 10 }).is_ok());
        assert!(check(&p, Action::Write, Resource::Barberia { barberia_id: 10 }).is_err());
    }

    #[test]
    fn everyone_reads_own_user_record() {
        let p = cliente(42);
        let me = Resource::Usuario { usuario_id: 42, barberia_id: None, rol: Role::Cliente };
        assert!(check(&p, Action::Read, me).is_ok());
        assert!(check(&p, Action::Write, me).is_err());
    }

    #[test]
    fn scopes_follow_role() {
        assert_eq!(turno_scope(&super_admin()), Scope::Todo);
        assert_eq!(turno_scope(&admin(3)), Scope::Barberia(3));
        assert_eq!(turno_scope(&barbero(3, 9)), Scope::Barbero { barberia_id: 3, barbero_id: 9 });
        assert_eq!(turno_scope(&cliente(5)), Scope::Cliente(5));
        let unlinked = Principal { barbero_id: None, ..barbero(3, 9) };
        assert_eq!(turno_scope(&unlinked), Scope::Nada);
    }

    #[test]
    fn tenant_filter_narrows_requests() {
        assert_eq!(tenant_filter(&super_admin(), None), Ok(None));
        assert_eq!(tenant_filter(&super_admin(), Some(4)), Ok(Some(4)));
        assert_eq!(tenant_filter(&admin(4), None), Ok(Some(4)));
        assert_eq!(tenant_filter(&admin(4), Some(5)), Err(AccessDenied::OtherTenant));
        assert!(tenant_filter(&cliente(1), None).is_err());
    }

    #[test]
    fn role_round_trips_through_strings() {
        for r in [Role::SuperAdmin, Role::AdminBarberia, Role::Barbero, Role::Cliente] {
            assert_eq!(r.as_str().parse::<Role>(), Ok(r));
        }
        assert!("OWNER".parse::<Role>().is_err());
    }
}
