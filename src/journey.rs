use serde::Serialize;
use time::Duration;

use crate::error::{AppError, AppResult};
use crate::model::{DATE_FORMAT, LegType, Package, Reservation, parse_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Completed,
    InProgress,
    Pending,
}

/// One package leg placed on the reservation's calendar
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyLeg {
    pub step_number: i32,
    pub leg_type: LegType,
    pub location: String,
    pub hotel_name: Option<String>,
    pub hotel_stars: Option<i32>,
    pub check_in_date: String,
    /// Only stays have a check-out
    pub check_out_date: Option<String>,
    pub duration_nights: i32,
    pub room_type: Option<String>,
    pub board_type: Option<String>,
    pub notes: Option<String>,
    pub status: LegStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Journey {
    pub reservation: Reservation,
    pub package: Option<Package>,
    pub journey: Vec<JourneyLeg>,
}

fn leg_status(position: usize, current: i32) -> LegStatus {
    let current = usize::try_from(current).unwrap_or(0);
    match position.cmp(&current) {
        std::cmp::Ordering::Less => LegStatus::Completed,
        std::cmp::Ordering::Equal => LegStatus::InProgress,
        std::cmp::Ordering::Greater => LegStatus::Pending,
    }
}

/// Lay the package legs out from the arrival date. Stays move the cursor
/// forward by their nights; transfers and pickups happen on the cursor day.
/// Nothing is stored, the timeline is derived on every read.
pub fn build_journey(reservation: Reservation, package: Option<Package>) -> AppResult<Journey> {
    let Some(package) = package else {
        return Ok(Journey {
            reservation,
            package: None,
            journey: Vec::new(),
        });
    };

    let mut legs = package.legs.clone();
    legs.sort_by_key(|leg| leg.step_number);

    let mut cursor = parse_date("arrivalDate", &reservation.arrival_date)?;
    let mut journey = Vec::with_capacity(legs.len());
    for (position, leg) in legs.into_iter().enumerate() {
        let check_in = cursor;
        let check_out = if leg.leg_type.is_stay() {
            cursor = cursor
                .checked_add(Duration::days(i64::from(leg.duration_nights)))
                .ok_or_else(|| {
                    AppError::validation(format!(
                        "leg {} runs past the supported calendar range",
                        leg.step_number
                    ))
                })?;
            Some(cursor)
        } else {
            None
        };

        journey.push(JourneyLeg {
            step_number: leg.step_number,
            leg_type: leg.leg_type,
            location: leg.location,
            hotel_name: leg.hotel_name,
            hotel_stars: leg.hotel_stars,
            check_in_date: format_date(check_in),
            check_out_date: check_out.map(format_date),
            duration_nights: leg.duration_nights,
            room_type: leg.room_type,
            board_type: leg.board_type,
            notes: leg.notes,
            status: leg_status(position, reservation.current_leg),
        });
    }

    Ok(Journey {
        reservation,
        package: Some(package),
        journey,
    })
}

fn format_date(date: time::Date) -> String {
    // The format only has numeric components and cannot fail
    date.format(DATE_FORMAT).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewPackage, NewReservation};

    fn reservation(current_leg: i32) -> Reservation {
        let mut input: NewReservation = serde_json::from_value(serde_json::json!({
            "voucherNo": "V-7",
            "leaderName": "Anna",
            "leaderPassport": "P7",
            "productCode": "TOUR",
            "productName": "Grand Tour",
            "hotel": "Various",
            "arrivalDate": "2024-05-01",
            "departureDate": "2024-05-08",
            "pax": 2
        }))
        .unwrap();
        input.current_leg = current_leg;
        Reservation::new(input).unwrap()
    }

    fn package() -> Package {
        let input: NewPackage = serde_json::from_value(serde_json::json!({
            "packageCode": "GT-1",
            "name": "Grand Tour",
            "legs": [
                {"stepNumber": 3, "legType": "transfer", "location": "Goreme"},
                {"stepNumber": 1, "legType": "airport_pickup", "location": "IST"},
                {
                    "stepNumber": 2,
                    "legType": "hotel",
                    "location": "Istanbul",
                    "hotelName": "Palace",
                    "durationNights": 3
                },
                {
                    "stepNumber": 4,
                    "legType": "accommodation",
                    "location": "Goreme",
                    "durationNights": 2
                }
            ]
        }))
        .unwrap();
        Package::new(input).unwrap()
    }

    #[test]
    fn test_dates_follow_stays() {
        let journey = build_journey(reservation(0), Some(package())).unwrap();
        let legs = &journey.journey;

        assert_eq!(legs.len(), 4);
        assert_eq!(legs[0].leg_type, LegType::AirportPickup);
        assert_eq!(legs[0].check_in_date, "2024-05-01");
        assert!(legs[0].check_out_date.is_none());

        assert_eq!(legs[1].check_in_date, "2024-05-01");
        assert_eq!(legs[1].check_out_date.as_deref(), Some("2024-05-04"));

        assert_eq!(legs[2].check_in_date, "2024-05-04");
        assert_eq!(legs[3].check_out_date.as_deref(), Some("2024-05-06"));
    }

    #[test]
    fn test_status_tracks_current_leg() {
        let journey = build_journey(reservation(2), Some(package())).unwrap();
        let statuses: Vec<LegStatus> = journey.journey.iter().map(|leg| leg.status).collect();
        assert_eq!(
            statuses,
            vec![
                LegStatus::Completed,
                LegStatus::Completed,
                LegStatus::InProgress,
                LegStatus::Pending
            ]
        );
    }

    #[test]
    fn test_no_package_means_empty_timeline() {
        let journey = build_journey(reservation(0), None).unwrap();
        assert!(journey.journey.is_empty());
        let json = serde_json::to_value(&journey).unwrap();
        assert!(json["package"].is_null());
    }

    #[test]
    fn test_stay_past_calendar_end_is_rejected() {
        let mut package = package();
        // Legs stored before the per-leg limit existed
        package.legs[1].duration_nights = 5_000_000;
        let result = build_journey(reservation(0), Some(package));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
