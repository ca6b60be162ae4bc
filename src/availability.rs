// src/availability.rs

//! Bookable slot computation for a sucursal/barbero/date.
//!
//! A day is walked from opening time in fixed steps. Each candidate slot spans
//! the requested duration and is free for a barber when it does not overlap any
//! of that barber's existing bookings. Intervals are half-open, so a booking
//! ending at 10:30 does not conflict with a slot starting at 10:30.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jornada {
    pub apertura: NaiveTime,
    pub cierre: NaiveTime,
}

/// An existing, non-cancelled booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ocupacion {
    pub barbero_id: i64,
    pub inicio: NaiveTime,
    pub fin: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub fecha: NaiveDate,
    /// `None` when the sucursal is closed that day.
    pub jornada: Option<Jornada>,
    pub paso_min: u32,
    pub duracion_min: u32,
    pub barberos: Vec<i64>,
    /// Local wall-clock time; slots at or before it are not bookable.
    pub ahora: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
    pub disponible: bool,
    pub barberos_libres: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    #[error("slot step must be positive")]
    InvalidStep,
    #[error("requested duration must be positive")]
    InvalidDuration,
    #[error("opening time {apertura} is not before closing time {cierre}")]
    InvalidJornada { apertura: NaiveTime, cierre: NaiveTime },
    #[error("the sucursal is closed on {0}")]
    Closed(NaiveDate),
    #[error("{inicio}-{fin} falls outside opening hours {apertura}-{cierre}")]
    OutsideHours {
        inicio: NaiveTime,
        fin: NaiveTime,
        apertura: NaiveTime,
        cierre: NaiveTime,
    },
    #[error("the requested time is in the past")]
    InPast,
    #[error("the booking would run past midnight")]
    CrossesMidnight,
    #[error("barbero {0} already has a booking at that time")]
    Conflict(i64),
    #[error("{inicio} is not on the {paso_min}-minute grid starting at {apertura}")]
    OffGrid {
        inicio: NaiveTime,
        apertura: NaiveTime,
        paso_min: u32,
    },
}

fn minutes(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn time_at(m: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(m / 60, m % 60, 0)
}

/// Half-open interval overlap in minutes since midnight.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

/// End time of a booking of `duracion_min` starting at `inicio`, if it stays
/// within the same day.
pub fn fin_de(inicio: NaiveTime, duracion_min: u32) -> Result<NaiveTime, AvailabilityError> {
    let end = minutes(inicio) + duracion_min;
    if end >= MINUTES_PER_DAY {
        return Err(AvailabilityError::CrossesMidnight);
    }
    time_at(end).ok_or(AvailabilityError::CrossesMidnight)
}

fn barbero_libre(barbero_id: i64, inicio: u32, fin: u32, ocupaciones: &[Ocupacion]) -> bool {
    !ocupaciones.iter().any(|o| {
        o.barbero_id == barbero_id && overlaps(inicio, fin, minutes(o.inicio), minutes(o.fin))
    })
}

fn validate_jornada(j: &Jornada) -> Result<(), AvailabilityError> {
    if j.apertura >= j.cierre {
        return Err(AvailabilityError::InvalidJornada {
            apertura: j.apertura,
            cierre: j.cierre,
        });
    }
    Ok(())
}

pub fn compute_slots(q: &SlotQuery, ocupaciones: &[Ocupacion]) -> Result<Vec<Slot>, AvailabilityError> {
    if q.paso_min == 0 {
        return Err(AvailabilityError::InvalidStep);
    }
    if q.duracion_min == 0 {
        return Err(AvailabilityError::InvalidDuration);
    }
    let Some(jornada) = q.jornada else {
        return Ok(Vec::new());
    };
    validate_jornada(&jornada)?;

    // Past days produce slots, all unavailable; today hides slots that already started.
    let cutoff: Option<u32> = q.ahora.and_then(|now| {
        if q.fecha < now.date() {
            Some(u32::MAX)
        } else if q.fecha == now.date() {
            Some(minutes(now.time()))
        } else {
            None
        }
    });

    let apertura = minutes(jornada.apertura);
    let cierre = minutes(jornada.cierre);
    let mut slots = Vec::new();
    let mut inicio = apertura;

    while inicio + q.duracion_min <= cierre {
        let fin = inicio + q.duracion_min;
        let (Some(hora_inicio), Some(hora_fin)) = (time_at(inicio), time_at(fin)) else {
            break;
        };

        let pasado = cutoff.is_some_and(|c| c == u32::MAX || inicio <= c);
        let barberos_libres: Vec<i64> = if pasado {
            Vec::new()
        } else {
            q.barberos
                .iter()
                .copied()
                .filter(|b| barbero_libre(*b, inicio, fin, ocupaciones))
                .collect()
        };

        slots.push(Slot {
            hora_inicio,
            hora_fin,
            disponible: !barberos_libres.is_empty(),
            barberos_libres,
        });
        inicio += q.paso_min;
    }

    Ok(slots)
}

/// Validates a concrete booking for one barber. `ocupaciones` must already be
/// restricted to that barber's non-cancelled bookings on `fecha`. The start
/// must be one of the slots `compute_slots` would offer: whole minutes, a
/// multiple of `paso_min` after opening time.
#[allow(clippy::too_many_arguments)]
pub fn check_booking(
    fecha: NaiveDate,
    jornada: Option<Jornada>,
    paso_min: u32,
    barbero_id: i64,
    inicio: NaiveTime,
    duracion_min: u32,
    ocupaciones: &[Ocupacion],
    ahora: Option<NaiveDateTime>,
) -> Result<NaiveTime, AvailabilityError> {
    if paso_min == 0 {
        return Err(AvailabilityError::InvalidStep);
    }
    if duracion_min == 0 {
        return Err(AvailabilityError::InvalidDuration);
    }
    let jornada = jornada.ok_or(AvailabilityError::Closed(fecha))?;
    validate_jornada(&jornada)?;

    let off_grid = AvailabilityError::OffGrid {
        inicio,
        apertura: jornada.apertura,
        paso_min,
    };
    if inicio.second() != 0 || inicio.nanosecond() != 0 {
        return Err(off_grid);
    }

    if let Some(now) = ahora {
        if fecha.and_time(inicio) <= now {
            return Err(AvailabilityError::InPast);
        }
    }

    let fin = fin_de(inicio, duracion_min)?;
    if inicio < jornada.apertura || fin > jornada.cierre {
        return Err(AvailabilityError::OutsideHours {
            inicio,
            fin,
            apertura: jornada.apertura,
            cierre: jornada.cierre,
        });
    }
    if (minutes(inicio) - minutes(jornada.apertura)) % paso_min != 0 {
        return Err(off_grid);
    }

    if !barbero_libre(barbero_id, minutes(inicio), minutes(fin), ocupaciones) {
        return Err(AvailabilityError::Conflict(barbero_id));
    }
    Ok(fin)
}

/// First barber in `barberos` order who is free for `[inicio, inicio+duracion)`.
pub fn first_free_barbero(
    barberos: &[i64],
    inicio: NaiveTime,
    duracion_min: u32,
    ocupaciones: &[Ocupacion],
) -> Option<i64> {
    let start = minutes(inicio);
    let end = start + duracion_min;
    barberos
        .iter()
        .copied()
        .find(|b| barbero_libre(*b, start, end, ocupaciones))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn query(barberos: Vec<i64>, duracion: u32) -> SlotQuery {
        SlotQuery {
            fecha: d(2026, 3, 10),
            jornada: Some(Jornada { apertura: t(9, 0), cierre: t(12, 0) }),
            paso_min: 30,
            duracion_min: duracion,
            barberos,
            ahora: None,
        }
    }

    fn ocup(barbero_id: i64, a: NaiveTime, b: NaiveTime) -> Ocupacion {
        Ocupacion { barbero_id, inicio: a, fin: b }
    }

    #[test]
    fn walks_the_day_in_fixed_steps() {
        let slots = compute_slots(&query(vec![1], 30), &[]).unwrap();
        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].hora_inicio, t(9, 0));
        assert_eq!(slots[5].hora_inicio, t(11, 30));
        assert_eq!(slots[5].hora_fin, t(12, 0));
        assert!(slots.iter().all(|s| s.disponible));
    }

    #[test]
    fn long_services_stop_before_closing() {
        let slots = compute_slots(&query(vec![1], 60), &[]).unwrap();
        assert_eq!(slots.last().unwrap().hora_inicio, t(11, 0));
        assert_eq!(slots.len(), 5);
    }

    #[test]
    fn bookings_block_overlapping_slots_only() {
        let taken = [ocup(1, t(10, 0), t(10, 30))];
        let slots = compute_slots(&query(vec![1], 30), &taken).unwrap();
        let busy: Vec<_> = slots.iter().filter(|s| !s.disponible).map(|s| s.hora_inicio).collect();
        assert_eq!(busy, vec![t(10, 0)]);

        // a 60-minute request starting at 9:30 now touches the booking too
        let slots = compute_slots(&query(vec![1], 60), &taken).unwrap();
        let busy: Vec<_> = slots.iter().filter(|s| !s.disponible).map(|s| s.hora_inicio).collect();
        assert_eq!(busy, vec![t(9, 30), t(10, 0)]);
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        assert!(!overlaps(600, 630, 630, 660));
        assert!(overlaps(600, 631, 630, 660));
        assert!(overlaps(600, 700, 630, 640));
    }

    #[test]
    fn any_free_barber_keeps_the_slot_open() {
        let taken = [ocup(1, t(9, 0), t(12, 0))];
        let slots = compute_slots(&query(vec![1, 2], 30), &taken).unwrap();
        assert!(slots.iter().all(|s| s.disponible && s.barberos_libres == vec![2]));
    }

    #[test]
    fn other_barbers_bookings_are_ignored() {
        let taken = [ocup(7, t(9, 0), t(12, 0))];
        let slots = compute_slots(&query(vec![1], 30), &taken).unwrap();
        assert!(slots.iter().all(|s| s.disponible));
    }

    #[test]
    fn no_barbers_means_nothing_is_bookable() {
        let slots = compute_slots(&query(vec![], 30), &[]).unwrap();
        assert_eq!(slots.len(), 6);
        assert!(slots.iter().all(|s| !s.disponible));
    }

    #[test]
    fn closed_day_has_no_slots() {
        let mut q = query(vec![1], 30);
        q.jornada = None;
        assert!(compute_slots(&q, &[]).unwrap().is_empty());
    }

    #[test]
    fn past_slots_today_are_hidden() {
        let mut q = query(vec![1], 30);
        q.ahora = Some(d(2026, 3, 10).and_time(t(10, 15)));
        let slots = compute_slots(&q, &[]).unwrap();
        let open: Vec<_> = slots.iter().filter(|s| s.disponible).map(|s| s.hora_inicio).collect();
        assert_eq!(open, vec![t(10, 30), t(11, 0), t(11, 30)]);
    }

    #[test]
    fn past_days_are_fully_unavailable_and_future_days_untouched() {
        let mut q = query(vec![1], 30);
        q.ahora = Some(d(2026, 3, 11).and_time(t(8, 0)));
        assert!(compute_slots(&q, &[]).unwrap().iter().all(|s| !s.disponible));

        q.ahora = Some(d(2026, 3, 9).and_time(t(23, 0)));
        assert!(compute_slots(&q, &[]).unwrap().iter().all(|s| s.disponible));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let mut q = query(vec![1], 30);
        q.paso_min = 0;
        assert_eq!(compute_slots(&q, &[]), Err(AvailabilityError::InvalidStep));

        let q = query(vec![1], 0);
        assert_eq!(compute_slots(&q, &[]), Err(AvailabilityError::InvalidDuration));

        let mut q = query(vec![1], 30);
        q.jornada = Some(Jornada { apertura: t(12, 0), cierre: t(9, 0) });
        assert!(matches!(compute_slots(&q, &[]), Err(AvailabilityError::InvalidJornada { .. })));
    }

    #[test]
    fn check_booking_accepts_free_slot_and_returns_end() {
        let j = Some(Jornada { apertura: t(9, 0), cierre: t(20, 0) });
        let fin = check_booking(d(2026, 3, 10), j, 15, 1, t(10, 0), 45, &[], None).unwrap();
        assert_eq!(fin, t(10, 45));
    }

    #[test]
    fn check_booking_rejects_conflicts_hours_and_past() {
        let j = Some(Jornada { apertura: t(9, 0), cierre: t(20, 0) });
        let taken = [ocup(1, t(10, 30), t(11, 0))];
        assert_eq!(
            check_booking(d(2026, 3, 10), j, 15, 1, t(10, 0), 45, &taken, None),
            Err(AvailabilityError::Conflict(1))
        );
        assert!(check_booking(d(2026, 3, 10), j, 15, 1, t(10, 0), 30, &taken, None).is_ok());
        assert!(matches!(
            check_booking(d(2026, 3, 10), j, 15, 1, t(19, 45), 30, &[], None),
            Err(AvailabilityError::OutsideHours { .. })
        ));
        assert!(matches!(
            check_booking(d(2026, 3, 10), j, 15, 1, t(8, 30), 30, &[], None),
            Err(AvailabilityError::OutsideHours { .. })
        ));
        assert_eq!(
            check_booking(d(2026, 3, 10), j, 15, 1, t(10, 0), 30, &[], Some(d(2026, 3, 10).and_time(t(10, 0)))),
            Err(AvailabilityError::InPast)
        );
        assert_eq!(
            check_booking(d(2026, 3, 10), None, 15, 1, t(10, 0), 30, &[], None),
            Err(AvailabilityError::Closed(d(2026, 3, 10)))
        );
    }

    #[test]
    fn check_booking_only_accepts_grid_starts() {
        let j = Some(Jornada { apertura: t(9, 0), cierre: t(20, 0) });
        let fecha = d(2026, 3, 10);
        assert_eq!(check_booking(fecha, j, 30, 1, t(10, 30), 30, &[], None), Ok(t(11, 0)));
        assert!(matches!(
            check_booking(fecha, j, 30, 1, t(10, 40), 30, &[], None),
            Err(AvailabilityError::OffGrid { paso_min: 30, .. })
        ));

        let with_seconds = NaiveTime::from_hms_opt(10, 30, 59).unwrap();
        assert!(matches!(
            check_booking(fecha, j, 30, 1, with_seconds, 30, &[], None),
            Err(AvailabilityError::OffGrid { .. })
        ));
        assert_eq!(
            check_booking(fecha, j, 0, 1, t(10, 0), 30, &[], None),
            Err(AvailabilityError::InvalidStep)
        );
    }

    #[test]
    fn grid_is_anchored_at_opening_time() {
        let j = Some(Jornada { apertura: t(9, 15), cierre: t(20, 0) });
        let fecha = d(2026, 3, 10);
        assert!(check_booking(fecha, j, 30, 1, t(9, 45), 30, &[], None).is_ok());
        assert!(matches!(
            check_booking(fecha, j, 30, 1, t(10, 0), 30, &[], None),
            Err(AvailabilityError::OffGrid { .. })
        ));
    }

    #[test]
    fn fin_de_refuses_to_cross_midnight() {
        assert_eq!(fin_de(t(23, 0), 30), Ok(t(23, 30)));
        assert_eq!(fin_de(t(23, 45), 30), Err(AvailabilityError::CrossesMidnight));
    }

    #[test]
    fn first_free_barbero_respects_order() {
        let taken = [ocup(1, t(10, 0), t(11, 0))];
        assert_eq!(first_free_barbero(&[1, 2, 3], t(10, 30), 30, &taken), Some(2));
        assert_eq!(first_free_barbero(&[1, 2], t(11, 0), 30, &taken), Some(1));
        assert_eq!(first_free_barbero(&[1], t(10, 0), 30, &taken), None);
    }
}
