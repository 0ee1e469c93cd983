use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{UnknownVariant, contains_ci, double_option, merge, non_negative, parse_date, require};
use crate::error::{AppError, AppResult};
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    #[default]
    Pending,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Pending => "pending",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<String> for ReservationStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "pending" => Ok(ReservationStatus::Pending),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            _ => Err(UnknownVariant { kind: "reservation status", value }),
        }
    }
}

fn default_agency() -> String {
    "THV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub voucher_no: String,
    pub leader_name: String,
    pub leader_passport: String,
    pub product_code: String,
    pub product_name: String,
    pub hotel: String,
    pub arrival_date: String,
    pub departure_date: String,
    pub pax: i32,
    pub pax_adults: i32,
    pub pax_children: i32,
    pub pax_infants: i32,
    #[sqlx(try_from = "String")]
    pub status: ReservationStatus,
    pub source_agency: String,
    pub package_id: Option<Uuid>,
    /// Index into the package legs of the step the guests are currently on
    pub current_leg: i32,
    pub room_type: Option<String>,
    pub board_type: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub voucher_no: String,
    pub leader_name: String,
    pub leader_passport: String,
    pub product_code: String,
    pub product_name: String,
    pub hotel: String,
    pub arrival_date: String,
    pub departure_date: String,
    pub pax: i32,
    #[serde(default)]
    pub pax_adults: i32,
    #[serde(default)]
    pub pax_children: i32,
    #[serde(default)]
    pub pax_infants: i32,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default = "default_agency")]
    pub source_agency: String,
    #[serde(default)]
    pub package_id: Option<Uuid>,
    #[serde(default)]
    pub current_leg: i32,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub board_type: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPatch {
    pub voucher_no: Option<String>,
    pub leader_name: Option<String>,
    pub leader_passport: Option<String>,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub hotel: Option<String>,
    pub arrival_date: Option<String>,
    pub departure_date: Option<String>,
    pub pax: Option<i32>,
    pub pax_adults: Option<i32>,
    pub pax_children: Option<i32>,
    pub pax_infants: Option<i32>,
    pub status: Option<ReservationStatus>,
    pub source_agency: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub package_id: Option<Option<Uuid>>,
    pub current_leg: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub room_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub board_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub destination: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    /// Matches voucher number, leader name or hotel
    pub search: Option<String>,
}

impl Reservation {
    pub fn new(input: NewReservation) -> AppResult<Self> {
        let now = OffsetDateTime::now_utc();
        let reservation = Self {
            id: Uuid::new_v4(),
            voucher_no: input.voucher_no.trim().to_string(),
            leader_name: input.leader_name,
            leader_passport: input.leader_passport,
            product_code: input.product_code,
            product_name: input.product_name,
            hotel: input.hotel,
            arrival_date: input.arrival_date.trim().to_string(),
            departure_date: input.departure_date.trim().to_string(),
            pax: input.pax,
            pax_adults: input.pax_adults,
            pax_children: input.pax_children,
            pax_infants: input.pax_infants,
            status: input.status,
            source_agency: input.source_agency,
            package_id: input.package_id,
            current_leg: input.current_leg,
            room_type: input.room_type,
            board_type: input.board_type,
            destination: input.destination,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        reservation.validate()?;
        Ok(reservation)
    }

    pub fn apply(&mut self, patch: ReservationPatch) -> AppResult<()> {
        if let Some(voucher_no) = patch.voucher_no {
            self.voucher_no = voucher_no.trim().to_string();
        }
        merge!(self, patch;
            leader_name, leader_passport, product_code, product_name, hotel,
            arrival_date, departure_date, pax, pax_adults, pax_children, pax_infants,
            status, source_agency, package_id, current_leg,
            room_type, board_type, destination, notes,
        );
        self.validate()?;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        require("voucherNo", &self.voucher_no)?;
        require("leaderName", &self.leader_name)?;
        require("leaderPassport", &self.leader_passport)?;
        require("productCode", &self.product_code)?;
        require("hotel", &self.hotel)?;
        let arrival = parse_date("arrivalDate", &self.arrival_date)?;
        let departure = parse_date("departureDate", &self.departure_date)?;
        if departure < arrival {
            return Err(AppError::validation("departureDate cannot be before arrivalDate"));
        }
        non_negative("pax", self.pax)?;
        non_negative("paxAdults", self.pax_adults)?;
        non_negative("paxChildren", self.pax_children)?;
        non_negative("paxInfants", self.pax_infants)?;
        non_negative("currentLeg", self.current_leg)
    }
}

impl Record for Reservation {
    type Filter = ReservationFilter;
    const ENTITY: &'static str = "reservation";
    const KIND: &'static str = "reservations";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.voucher_no.clone())
    }

    fn matches(&self, filter: &ReservationFilter) -> bool {
        filter.status.is_none_or(|status| self.status == status)
            && filter.search.as_ref().is_none_or(|term| {
                contains_ci(&self.voucher_no, term)
                    || contains_ci(&self.leader_name, term)
                    || contains_ci(&self.hotel, term)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewReservation {
        serde_json::from_value(serde_json::json!({
            "voucherNo": "V-1001",
            "leaderName": "Hans Muller",
            "leaderPassport": "C01X00T47",
            "productCode": "CAP-7",
            "productName": "Cappadocia Week",
            "hotel": "Cave Suites",
            "arrivalDate": "2024-05-01",
            "departureDate": "2024-05-08",
            "pax": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let reservation = Reservation::new(input()).unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.source_agency, "THV");
        assert_eq!(reservation.current_leg, 0);
        assert!(reservation.package_id.is_none());
    }

    #[test]
    fn test_departure_before_arrival_rejected() {
        let mut bad = input();
        bad.departure_date = "2024-04-30".to_string();
        assert!(Reservation::new(bad).is_err());
    }

    #[test]
    fn test_patch_advances_leg_and_clears_notes() {
        let mut reservation = Reservation::new(NewReservation {
            notes: Some("late check-in".to_string()),
            ..input()
        })
        .unwrap();
        let patch: ReservationPatch = serde_json::from_str(
            r#"{"currentLeg": 2, "notes": null, "status": "confirmed"}"#,
        )
        .unwrap();
        reservation.apply(patch).unwrap();
        assert_eq!(reservation.current_leg, 2);
        assert!(reservation.notes.is_none());
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
    }
}
