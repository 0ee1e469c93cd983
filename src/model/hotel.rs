use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{contains_ci, double_option, merge, require};
use crate::error::{AppError, AppResult};
use crate::store::Record;

fn default_service_type() -> String {
    "Otel".to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: String,
    pub region: String,
    pub region_code: String,
    pub transfer_region: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub service_type: String,
    pub manager: String,
    pub notes: String,
    pub active: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stars: i32,
    pub giata: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewHotel {
    pub code: String,
    pub name: String,
    pub category: String,
    pub region: String,
    pub region_code: String,
    pub transfer_region: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub service_type: String,
    pub manager: String,
    pub notes: String,
    pub active: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stars: i32,
    pub giata: Option<String>,
}

impl Default for NewHotel {
    fn default() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            category: String::new(),
            region: String::new(),
            region_code: String::new(),
            transfer_region: String::new(),
            phone: String::new(),
            email: String::new(),
            website: String::new(),
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
            country: String::new(),
            service_type: default_service_type(),
            manager: String::new(),
            notes: String::new(),
            active: default_active(),
            latitude: None,
            longitude: None,
            stars: 0,
            giata: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub transfer_region: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub service_type: Option<String>,
    pub manager: Option<String>,
    pub notes: Option<String>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub longitude: Option<Option<f64>>,
    pub stars: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub giata: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelFilter {
    #[serde(default)]
    pub active_only: bool,
    pub region: Option<String>,
    pub category: Option<String>,
    /// Matches code, name or city
    pub search: Option<String>,
}

impl Hotel {
    pub fn new(input: NewHotel) -> AppResult<Self> {
        let now = OffsetDateTime::now_utc();
        let hotel = Self {
            id: Uuid::new_v4(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            category: input.category,
            region: input.region,
            region_code: input.region_code,
            transfer_region: input.transfer_region,
            phone: input.phone,
            email: input.email,
            website: input.website,
            address: input.address,
            city: input.city,
            postal_code: input.postal_code,
            country: input.country,
            service_type: input.service_type,
            manager: input.manager,
            notes: input.notes,
            active: input.active,
            latitude: input.latitude,
            longitude: input.longitude,
            stars: input.stars,
            giata: input.giata,
            created_at: now,
            updated_at: now,
        };
        hotel.validate()?;
        Ok(hotel)
    }

    pub fn apply(&mut self, patch: HotelPatch) -> AppResult<()> {
        if let Some(code) = patch.code {
            self.code = code.trim().to_string();
        }
        merge!(self, patch;
            name, category, region, region_code, transfer_region, phone, email, website,
            address, city, postal_code, country, service_type, manager, notes, active,
            latitude, longitude, stars, giata,
        );
        self.validate()?;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        require("code", &self.code)?;
        require("name", &self.name)?;
        if !(0..=7).contains(&self.stars) {
            return Err(AppError::validation("stars must be between 0 and 7"));
        }
        if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            return Err(AppError::validation("latitude must be between -90 and 90"));
        }
        if self.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
            return Err(AppError::validation("longitude must be between -180 and 180"));
        }
        Ok(())
    }
}

impl Record for Hotel {
    type Filter = HotelFilter;
    const ENTITY: &'static str = "hotel";
    const KIND: &'static str = "hotels";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.code.clone())
    }

    fn matches(&self, filter: &HotelFilter) -> bool {
        (!filter.active_only || self.active)
            && filter.region.as_ref().is_none_or(|region| &self.region == region)
            && filter.category.as_ref().is_none_or(|category| &self.category == category)
            && filter.search.as_ref().is_none_or(|term| {
                contains_ci(&self.code, term)
                    || contains_ci(&self.name, term)
                    || contains_ci(&self.city, term)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewHotel {
        serde_json::from_value(serde_json::json!({
            "code": " AYT-042 ",
            "name": "Lara Beach Resort",
            "region": "Antalya",
            "city": "Muratpasa",
            "stars": 5
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let hotel = Hotel::new(input()).unwrap();
        assert_eq!(hotel.code, "AYT-042");
        assert_eq!(hotel.service_type, "Otel");
        assert!(hotel.active);
        assert!(hotel.latitude.is_none());
    }

    #[test]
    fn test_star_range() {
        let mut hotel = Hotel::new(input()).unwrap();
        let patch = HotelPatch {
            stars: Some(8),
            ..Default::default()
        };
        assert!(hotel.apply(patch).is_err());
    }

    #[test]
    fn test_active_only_filter() {
        let mut hotel = Hotel::new(input()).unwrap();
        hotel.active = false;
        let filter = HotelFilter {
            active_only: true,
            ..Default::default()
        };
        assert!(!hotel.matches(&filter));
        assert!(hotel.matches(&HotelFilter::default()));
    }
}
