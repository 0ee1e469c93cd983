//! Domain entities shared by both storage backends and the HTTP layer.

pub mod audit;
pub mod flight;
pub mod hotel;
pub mod operation;
pub mod package;
pub mod reservation;
pub mod user;

pub use audit::{AuditAction, AuditEntry, AuditFilter};
pub use flight::{Flight, FlightDirection, FlightFilter, FlightPatch, NewFlight};
pub use hotel::{Hotel, HotelFilter, HotelPatch, NewHotel};
pub use operation::{FlightInfo, NewOperation, Operation, OperationFilter, OperationPatch};
pub use package::{
    LegType, NewPackage, NewPackageLeg, Package, PackageFilter, PackageLeg, PackagePatch,
};
pub use reservation::{
    NewReservation, Reservation, ReservationFilter, ReservationPatch, ReservationStatus,
};
pub use user::{NewUser, User, UserFilter, UserPatch, UserStatus};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use time::{Date, Time, format_description::FormatItem, macros::format_description};

use crate::error::{AppError, AppResult};

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

/// A stored tag that does not name any known variant
#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Copy every `Some` field of a patch onto the target.
macro_rules! merge {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )+
    };
}
pub(crate) use merge;

/// Distinguishes an explicit `null` (clear the field) from an absent key.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn parse_date(field: &str, value: &str) -> AppResult<Date> {
    Date::parse(value.trim(), DATE_FORMAT).map_err(|_| {
        AppError::validation(format!("{field} must be a YYYY-MM-DD date, got '{value}'"))
    })
}

/// Empty times are allowed; anything else must be HH:MM.
pub(crate) fn check_time(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    Time::parse(value.trim(), TIME_FORMAT)
        .map(|_| ())
        .map_err(|_| AppError::validation(format!("{field} must be an HH:MM time, got '{value}'")))
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

pub(crate) fn non_negative(field: &str, value: i32) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_and_time_checks() {
        assert!(parse_date("date", "2024-01-15").is_ok());
        assert!(parse_date("date", "15/01/2024").is_err());
        assert!(check_time("time", "").is_ok());
        assert!(check_time("time", "14:30").is_ok());
        assert!(check_time("time", "2pm").is_err());
    }
}
