use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{UnknownVariant, contains_ci, double_option, merge, non_negative, require};
use crate::error::{AppError, AppResult};
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegType {
    Hotel,
    Accommodation,
    Transfer,
    AirportPickup,
    AirportDropoff,
}

impl LegType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegType::Hotel => "hotel",
            LegType::Accommodation => "accommodation",
            LegType::Transfer => "transfer",
            LegType::AirportPickup => "airport_pickup",
            LegType::AirportDropoff => "airport_dropoff",
        }
    }

    /// Legs that consume nights on the journey timeline
    pub fn is_stay(&self) -> bool {
        matches!(self, LegType::Hotel | LegType::Accommodation)
    }
}

impl TryFrom<String> for LegType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "hotel" => Ok(LegType::Hotel),
            "accommodation" => Ok(LegType::Accommodation),
            "transfer" => Ok(LegType::Transfer),
            "airport_pickup" => Ok(LegType::AirportPickup),
            "airport_dropoff" => Ok(LegType::AirportDropoff),
            _ => Err(UnknownVariant { kind: "leg type", value }),
        }
    }
}

/// One template step of a package
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PackageLeg {
    pub id: Uuid,
    #[serde(skip)]
    pub package_id: Uuid,
    pub step_number: i32,
    #[sqlx(try_from = "String")]
    pub leg_type: LegType,
    pub location: String,
    pub hotel_name: Option<String>,
    pub hotel_stars: Option<i32>,
    pub duration_nights: i32,
    pub room_type: Option<String>,
    pub board_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: Uuid,
    pub package_code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub total_nights: i32,
    #[sqlx(skip)]
    pub legs: Vec<PackageLeg>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPackageLeg {
    pub step_number: i32,
    pub leg_type: LegType,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub hotel_name: Option<String>,
    #[serde(default)]
    pub hotel_stars: Option<i32>,
    #[serde(default)]
    pub duration_nights: i32,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub board_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPackage {
    pub package_code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub legs: Vec<NewPackageLeg>,
}

/// Supplying `legs` replaces the whole itinerary
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePatch {
    pub package_code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub legs: Option<Vec<NewPackageLeg>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFilter {
    #[serde(default)]
    pub active_only: bool,
    /// Matches package code or name
    pub search: Option<String>,
}

/// Longest single stay a leg may describe
pub const MAX_LEG_NIGHTS: i32 = 366;

fn build_legs(package_id: Uuid, legs: Vec<NewPackageLeg>) -> AppResult<Vec<PackageLeg>> {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(legs.len());
    for leg in legs {
        if leg.step_number < 1 {
            return Err(AppError::validation("stepNumber must be at least 1"));
        }
        if !seen.insert(leg.step_number) {
            return Err(AppError::validation(format!(
                "stepNumber {} appears more than once",
                leg.step_number
            )));
        }
        non_negative("durationNights", leg.duration_nights)?;
        if leg.duration_nights > MAX_LEG_NIGHTS {
            return Err(AppError::validation(format!(
                "durationNights cannot exceed {MAX_LEG_NIGHTS}"
            )));
        }
        if leg.hotel_stars.is_some_and(|stars| !(0..=7).contains(&stars)) {
            return Err(AppError::validation("hotelStars must be between 0 and 7"));
        }
        built.push(PackageLeg {
            id: Uuid::new_v4(),
            package_id,
            step_number: leg.step_number,
            leg_type: leg.leg_type,
            location: leg.location,
            hotel_name: leg.hotel_name,
            hotel_stars: leg.hotel_stars,
            duration_nights: leg.duration_nights,
            room_type: leg.room_type,
            board_type: leg.board_type,
            notes: leg.notes,
        });
    }
    built.sort_by_key(|leg| leg.step_number);
    Ok(built)
}

impl Package {
    pub fn new(input: NewPackage) -> AppResult<Self> {
        require("packageCode", &input.package_code)?;
        require("name", &input.name)?;

        let id = Uuid::new_v4();
        let legs = build_legs(id, input.legs)?;
        let now = OffsetDateTime::now_utc();
        let mut package = Self {
            id,
            package_code: input.package_code.trim().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_active: input.is_active,
            total_nights: 0,
            legs,
            created_at: now,
            updated_at: now,
        };
        package.total_nights = package.nights()?;
        Ok(package)
    }

    pub fn apply(&mut self, patch: PackagePatch) -> AppResult<()> {
        if let Some(code) = patch.package_code {
            require("packageCode", &code)?;
            self.package_code = code.trim().to_string();
        }
        if let Some(ref name) = patch.name {
            require("name", name)?;
        }
        if let Some(legs) = patch.legs {
            self.legs = build_legs(self.id, legs)?;
        }
        merge!(self, patch; name, description, is_active);
        self.total_nights = self.nights()?;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    pub fn nights(&self) -> AppResult<i32> {
        self.legs
            .iter()
            .try_fold(0i32, |total, leg| total.checked_add(leg.duration_nights))
            .ok_or_else(|| AppError::validation("package is too long"))
    }
}

impl Record for Package {
    type Filter = PackageFilter;
    const ENTITY: &'static str = "package";
    const KIND: &'static str = "packages";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.package_code.clone())
    }

    fn matches(&self, filter: &PackageFilter) -> bool {
        (!filter.active_only || self.is_active)
            && filter.search.as_ref().is_none_or(|term| {
                contains_ci(&self.package_code, term) || contains_ci(&self.name, term)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(legs: serde_json::Value) -> NewPackage {
        serde_json::from_value(serde_json::json!({
            "packageCode": "TR-CLASSIC",
            "name": "Classic Turkey",
            "legs": legs
        }))
        .unwrap()
    }

    #[test]
    fn test_legs_sorted_and_nights_totalled() {
        let package = Package::new(input(serde_json::json!([
            { "stepNumber": 3, "legType": "hotel", "location": "Antalya", "durationNights": 4 },
            { "stepNumber": 1, "legType": "airport_pickup", "location": "IST" },
            { "stepNumber": 2, "legType": "hotel", "location": "Istanbul", "durationNights": 3 }
        ])))
        .unwrap();

        let steps: Vec<i32> = package.legs.iter().map(|leg| leg.step_number).collect();
        assert_eq!(steps, vec![1, 2, 3]);
        assert_eq!(package.total_nights, 7);
        assert!(package.is_active);
        assert!(package.legs.iter().all(|leg| leg.package_id == package.id));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let result = Package::new(input(serde_json::json!([
            { "stepNumber": 1, "legType": "transfer" },
            { "stepNumber": 1, "legType": "hotel", "durationNights": 2 }
        ])));
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_replaces_legs() {
        let mut package = Package::new(input(serde_json::json!([
            { "stepNumber": 1, "legType": "hotel", "durationNights": 5 }
        ])))
        .unwrap();
        let patch: PackagePatch = serde_json::from_value(serde_json::json!({
            "legs": [{ "stepNumber": 1, "legType": "accommodation", "durationNights": 2 }]
        }))
        .unwrap();
        package.apply(patch).unwrap();
        assert_eq!(package.total_nights, 2);
        assert_eq!(package.legs[0].leg_type, LegType::Accommodation);
    }

    #[test]
    fn test_leg_nights_are_bounded() {
        let result = Package::new(input(serde_json::json!([
            { "stepNumber": 1, "legType": "hotel", "durationNights": 5_000_000 }
        ])));
        assert!(matches!(result, Err(AppError::Validation(_))));

        let at_limit = Package::new(input(serde_json::json!([
            { "stepNumber": 1, "legType": "hotel", "durationNights": MAX_LEG_NIGHTS }
        ])));
        assert_eq!(at_limit.unwrap().total_nights, MAX_LEG_NIGHTS);
    }

    #[test]
    fn test_total_nights_overflow_is_an_error() {
        let mut package = Package::new(input(serde_json::json!([
            { "stepNumber": 1, "legType": "hotel", "durationNights": 1 }
        ])))
        .unwrap();
        let mut long_leg = package.legs[0].clone();
        long_leg.duration_nights = i32::MAX;
        package.legs.push(long_leg);
        assert!(matches!(package.nights(), Err(AppError::Validation(_))));
    }
}
