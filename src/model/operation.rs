use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{check_time, double_option, merge, non_negative, parse_date, require};
use crate::error::AppResult;
use crate::store::Record;

/// Flight leg attached to an operation (arrival, return or transfer)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightInfo {
    pub flight_code: String,
    pub airline: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
}

fn default_kind() -> String {
    "transfer".to_string()
}

fn default_status() -> String {
    "scheduled".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub voucher_no: String,
    #[sqlx(json)]
    pub arrival_flight: Option<FlightInfo>,
    #[sqlx(json)]
    pub return_flight: Option<FlightInfo>,
    #[sqlx(json)]
    pub transfer_flight: Option<FlightInfo>,
    pub current_hotel: String,
    pub hotel_check_in: String,
    pub hotel_check_out: String,
    pub flight_code: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
    pub date: String,
    pub time: String,
    pub passengers: i32,
    pub hotel: String,
    pub transfer_time: String,
    pub notes: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    #[serde(default)]
    pub reservation_id: Option<Uuid>,
    #[serde(default)]
    pub voucher_no: String,
    #[serde(default)]
    pub arrival_flight: Option<FlightInfo>,
    #[serde(default)]
    pub return_flight: Option<FlightInfo>,
    #[serde(default)]
    pub transfer_flight: Option<FlightInfo>,
    #[serde(default)]
    pub current_hotel: String,
    #[serde(default)]
    pub hotel_check_in: String,
    #[serde(default)]
    pub hotel_check_out: String,
    #[serde(default)]
    pub flight_code: String,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    #[serde(default, rename = "from")]
    pub origin: String,
    #[serde(default, rename = "to")]
    pub destination: String,
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub passengers: i32,
    #[serde(default)]
    pub hotel: String,
    #[serde(default)]
    pub transfer_time: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub reservation_id: Option<Option<Uuid>>,
    pub voucher_no: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub arrival_flight: Option<Option<FlightInfo>>,
    #[serde(default, deserialize_with = "double_option")]
    pub return_flight: Option<Option<FlightInfo>>,
    #[serde(default, deserialize_with = "double_option")]
    pub transfer_flight: Option<Option<FlightInfo>>,
    pub current_hotel: Option<String>,
    pub hotel_check_in: Option<String>,
    pub hotel_check_out: Option<String>,
    pub flight_code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "from")]
    pub origin: Option<String>,
    #[serde(rename = "to")]
    pub destination: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub passengers: Option<i32>,
    pub hotel: Option<String>,
    pub transfer_time: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFilter {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// `all` disables the type filter
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl OperationFilter {
    /// Inclusive date range, only when both ends are given
    pub fn range(&self) -> Option<(&str, &str)> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => Some((start.as_str(), end.as_str())),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref().filter(|kind| *kind != "all")
    }
}

impl Operation {
    pub fn new(input: NewOperation) -> AppResult<Self> {
        let now = OffsetDateTime::now_utc();
        let operation = Self {
            id: Uuid::new_v4(),
            reservation_id: input.reservation_id,
            voucher_no: input.voucher_no,
            arrival_flight: input.arrival_flight,
            return_flight: input.return_flight,
            transfer_flight: input.transfer_flight,
            current_hotel: input.current_hotel,
            hotel_check_in: input.hotel_check_in,
            hotel_check_out: input.hotel_check_out,
            flight_code: input.flight_code.trim().to_uppercase(),
            kind: input.kind,
            origin: input.origin,
            destination: input.destination,
            date: input.date.trim().to_string(),
            time: input.time.trim().to_string(),
            passengers: input.passengers,
            hotel: input.hotel,
            transfer_time: input.transfer_time,
            notes: input.notes,
            status: input.status,
            created_at: now,
            updated_at: now,
        };
        operation.validate()?;
        Ok(operation)
    }

    pub fn apply(&mut self, patch: OperationPatch) -> AppResult<()> {
        if let Some(code) = patch.flight_code {
            self.flight_code = code.trim().to_uppercase();
        }
        merge!(self, patch;
            reservation_id, voucher_no, arrival_flight, return_flight, transfer_flight,
            current_hotel, hotel_check_in, hotel_check_out, kind, origin, destination,
            date, time, passengers, hotel, transfer_time, notes, status,
        );
        self.validate()?;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        require("type", &self.kind)?;
        parse_date("date", &self.date)?;
        check_time("time", &self.time)?;
        check_time("transferTime", &self.transfer_time)?;
        non_negative("passengers", self.passengers)
    }
}

impl Record for Operation {
    type Filter = OperationFilter;
    const ENTITY: &'static str = "operation";
    const KIND: &'static str = "operations";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn matches(&self, filter: &OperationFilter) -> bool {
        // ISO dates compare correctly as strings
        filter.date.as_ref().is_none_or(|date| &self.date == date)
            && filter
                .range()
                .is_none_or(|(start, end)| self.date.as_str() >= start && self.date.as_str() <= end)
            && filter.kind().is_none_or(|kind| self.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(date: &str, kind: &str) -> Operation {
        Operation::new(
            serde_json::from_value(serde_json::json!({
                "date": date,
                "type": kind,
                "arrivalFlight": { "flightCode": "PC1001", "date": date, "time": "09:40" }
            }))
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let op = operation("2024-06-01", "transfer");
        assert_eq!(op.status, "scheduled");
        assert_eq!(op.arrival_flight.as_ref().unwrap().flight_code, "PC1001");
        assert!(op.return_flight.is_none());
    }

    #[test]
    fn test_date_is_required() {
        let input: NewOperation =
            serde_json::from_value(serde_json::json!({ "date": "" })).unwrap();
        assert!(Operation::new(input).is_err());
    }

    #[test]
    fn test_range_and_type_filters() {
        let op = operation("2024-06-10", "tour");

        let in_range = OperationFilter {
            start_date: Some("2024-06-01".to_string()),
            end_date: Some("2024-06-30".to_string()),
            kind: Some("all".to_string()),
            ..Default::default()
        };
        assert!(op.matches(&in_range));

        let wrong_kind = OperationFilter {
            kind: Some("transfer".to_string()),
            ..Default::default()
        };
        assert!(!op.matches(&wrong_kind));

        let open_ended = OperationFilter {
            start_date: Some("2024-07-01".to_string()),
            ..Default::default()
        };
        assert!(op.matches(&open_ended), "half-open range is ignored");
    }
}
