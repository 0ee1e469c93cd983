use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{UnknownVariant, check_time, merge, non_negative, parse_date, require};
use crate::error::AppResult;
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightDirection {
    Arrival,
    Departure,
}

impl FlightDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightDirection::Arrival => "arrival",
            FlightDirection::Departure => "departure",
        }
    }
}

impl TryFrom<String> for FlightDirection {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "arrival" => Ok(FlightDirection::Arrival),
            "departure" => Ok(FlightDirection::Departure),
            _ => Err(UnknownVariant { kind: "flight direction", value }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: Uuid,
    pub flight_code: String,
    pub airline: String,
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
    pub date: String,
    pub time: String,
    #[sqlx(try_from = "String")]
    pub direction: FlightDirection,
    pub passengers: i32,
    #[serde(rename = "hasPNR")]
    pub has_pnr: bool,
    pub pnr: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFlight {
    pub flight_code: String,
    #[serde(default)]
    pub airline: String,
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
    pub date: String,
    pub time: String,
    pub direction: FlightDirection,
    #[serde(default)]
    pub passengers: i32,
    #[serde(default, rename = "hasPNR")]
    pub has_pnr: bool,
    #[serde(default)]
    pub pnr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightPatch {
    pub flight_code: Option<String>,
    pub airline: Option<String>,
    #[serde(rename = "from")]
    pub origin: Option<String>,
    #[serde(rename = "to")]
    pub destination: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub direction: Option<FlightDirection>,
    pub passengers: Option<i32>,
    #[serde(rename = "hasPNR")]
    pub has_pnr: Option<bool>,
    pub pnr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightFilter {
    pub direction: Option<FlightDirection>,
    pub date: Option<String>,
    /// Matches flight code, airline, origin or destination
    pub search: Option<String>,
}

impl Flight {
    pub fn new(input: NewFlight) -> AppResult<Self> {
        let now = OffsetDateTime::now_utc();
        let flight = Self {
            id: Uuid::new_v4(),
            flight_code: input.flight_code.trim().to_uppercase(),
            airline: input.airline,
            origin: input.origin,
            destination: input.destination,
            date: input.date.trim().to_string(),
            time: input.time.trim().to_string(),
            direction: input.direction,
            passengers: input.passengers,
            has_pnr: input.has_pnr,
            pnr: input.pnr,
            created_at: now,
            updated_at: now,
        };
        flight.validate()?;
        Ok(flight)
    }

    pub fn apply(&mut self, patch: FlightPatch) -> AppResult<()> {
        merge!(
            self, patch;
            airline, origin, destination, date, time, direction, passengers, has_pnr, pnr
        );
        if let Some(code) = patch.flight_code {
            self.flight_code = code.trim().to_uppercase();
        }
        self.validate()?;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        require("flightCode", &self.flight_code)?;
        require("from", &self.origin)?;
        require("to", &self.destination)?;
        parse_date("date", &self.date)?;
        require("time", &self.time)?;
        check_time("time", &self.time)?;
        non_negative("passengers", self.passengers)
    }
}

impl Record for Flight {
    type Filter = FlightFilter;
    const ENTITY: &'static str = "flight";
    const KIND: &'static str = "flights";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn matches(&self, filter: &FlightFilter) -> bool {
        filter.direction.is_none_or(|direction| self.direction == direction)
            && filter.date.as_ref().is_none_or(|date| &self.date == date)
            && filter.search.as_ref().is_none_or(|term| {
                super::contains_ci(&self.flight_code, term)
                    || super::contains_ci(&self.airline, term)
                    || super::contains_ci(&self.origin, term)
                    || super::contains_ci(&self.destination, term)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewFlight {
        serde_json::from_value(serde_json::json!({
            "flightCode": "tk1234",
            "airline": "Turkish Airlines",
            "from": "Istanbul",
            "to": "Antalya",
            "date": "2024-01-15",
            "time": "14:30",
            "direction": "departure",
            "passengers": 150,
            "hasPNR": true,
            "pnr": "ABC123"
        }))
        .unwrap()
    }

    #[test]
    fn test_new_flight_keeps_supplied_fields() {
        let flight = Flight::new(input()).unwrap();
        assert_eq!(flight.flight_code, "TK1234");
        assert_eq!(flight.origin, "Istanbul");
        assert_eq!(flight.passengers, 150);
        assert!(flight.has_pnr);
        assert_eq!(flight.created_at, flight.updated_at);
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let mut bad = input();
        bad.date = "15.01.2024".to_string();
        assert!(Flight::new(bad).is_err());
    }

    #[test]
    fn test_patch_revalidates() {
        let mut flight = Flight::new(input()).unwrap();
        let patch = FlightPatch {
            passengers: Some(-3),
            ..Default::default()
        };
        assert!(flight.apply(patch).is_err());
    }

    #[test]
    fn test_search_filter_is_case_insensitive() {
        let flight = Flight::new(input()).unwrap();
        let filter = FlightFilter {
            search: Some("antal".to_string()),
            ..Default::default()
        };
        assert!(flight.matches(&filter));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(Flight::new(input()).unwrap()).unwrap();
        assert_eq!(json["from"], "Istanbul");
        assert_eq!(json["hasPNR"], true);
        assert_eq!(json["flightCode"], "TK1234");
    }
}
