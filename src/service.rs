//! Business operations shared by every entity collection: permission check,
//! validation, uniqueness, persistence and the audit trail.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::auth::{Action, Actor, PermissionMatrix, Resource};
use crate::error::{AppError, AppResult};
use crate::import::{self, FlightComparison, ImportRow, ImportSummary};
use crate::model::{
    AuditAction, Flight, FlightDirection, FlightFilter, FlightPatch, Hotel, HotelPatch, NewFlight,
    NewHotel, NewOperation, NewPackage, NewReservation, Operation, OperationPatch, Package,
    PackagePatch, Reservation, ReservationPatch, ReservationStatus,
};
use crate::store::{Page, Pagination, Record, Repository, StoreError, Stores, list_all};

/// A business collection managed through [`EntityService`].
pub trait Entity: Record<Filter: DeserializeOwned> + Serialize {
    type Create: DeserializeOwned + Send + 'static;
    type Patch: DeserializeOwned + Send + 'static;

    /// Permission resource guarding the collection
    const RESOURCE: Resource;

    fn repository(stores: &Stores) -> &Arc<dyn Repository<Self>>;

    fn create(input: Self::Create) -> AppResult<Self>;

    fn patch(&mut self, patch: Self::Patch) -> AppResult<()>;

    /// Short human description used in audit details
    fn label(&self) -> String;
}

/// Entities that can be created in bulk from an uploaded file.
pub trait Importable: Entity {
    /// Rows whose business key already exists update that record instead of failing.
    const UPSERT_BY_KEY: bool = false;

    fn from_row(row: &ImportRow) -> AppResult<Self::Create>;

    /// Take over the id and creation time of the record being replaced.
    fn adopt_identity(&mut self, _existing: &Self) {}
}

impl Entity for Flight {
    type Create = NewFlight;
    type Patch = FlightPatch;
    const RESOURCE: Resource = Resource::Flights;

    fn repository(stores: &Stores) -> &Arc<dyn Repository<Self>> {
        &stores.flights
    }

    fn create(input: NewFlight) -> AppResult<Self> {
        Flight::new(input)
    }

    fn patch(&mut self, patch: FlightPatch) -> AppResult<()> {
        self.apply(patch)
    }

    fn label(&self) -> String {
        format!("flight {} on {}", self.flight_code, self.date)
    }
}

impl Importable for Flight {
    fn from_row(row: &ImportRow) -> AppResult<NewFlight> {
        let direction = FlightDirection::try_from(row.required("direction", &["direction", "yon"])?)
            .map_err(|e| AppError::validation(e.to_string()))?;
        let pnr = row.text(&["pnr"]);
        let has_pnr = row.boolean("hasPNR", &["hasPNR"])?.unwrap_or(!pnr.is_empty());
        Ok(NewFlight {
            flight_code: row.required("flightCode", &["flightCode", "flightNo", "flight"])?,
            airline: row.text(&["airline"]),
            origin: row.required("from", &["from", "origin"])?,
            destination: row.required("to", &["to", "destination"])?,
            date: row.required("date", &["date"])?,
            time: row.required("time", &["time"])?,
            direction,
            passengers: row.int("passengers", &["passengers", "pax"])?.unwrap_or(0),
            has_pnr,
            pnr,
        })
    }
}

impl Entity for Reservation {
    type Create = NewReservation;
    type Patch = ReservationPatch;
    const RESOURCE: Resource = Resource::Reservations;

    fn repository(stores: &Stores) -> &Arc<dyn Repository<Self>> {
        &stores.reservations
    }

    fn create(input: NewReservation) -> AppResult<Self> {
        Reservation::new(input)
    }

    fn patch(&mut self, patch: ReservationPatch) -> AppResult<()> {
        self.apply(patch)
    }

    fn label(&self) -> String {
        format!("reservation {} ({})", self.voucher_no, self.leader_name)
    }
}

impl Importable for Reservation {
    fn from_row(row: &ImportRow) -> AppResult<NewReservation> {
        let status = match row.get(&["status"]) {
            Some(raw) => ReservationStatus::try_from(raw.to_string())
                .map_err(|e| AppError::validation(e.to_string()))?,
            None => ReservationStatus::default(),
        };
        let package_id = row
            .get(&["packageId"])
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| {
                    AppError::validation(format!("packageId '{raw}' is not a valid id"))
                })
            })
            .transpose()?;
        let pax_adults = row.int("paxAdults", &["paxAdults", "adults"])?.unwrap_or(0);
        let pax_children = row.int("paxChildren", &["paxChildren", "children"])?.unwrap_or(0);
        let pax_infants = row.int("paxInfants", &["paxInfants", "infants"])?.unwrap_or(0);
        let pax = row
            .int("pax", &["pax", "passengers"])?
            .unwrap_or(pax_adults + pax_children + pax_infants);

        Ok(NewReservation {
            voucher_no: row.required("voucherNo", &["voucherNo", "voucher"])?,
            leader_name: row.required("leaderName", &["leaderName", "leader", "guestName"])?,
            leader_passport: row.required("leaderPassport", &["leaderPassport", "passport"])?,
            product_code: row.required("productCode", &["productCode"])?,
            product_name: row.text(&["productName"]),
            hotel: row.required("hotel", &["hotel", "hotelName"])?,
            arrival_date: row.required("arrivalDate", &["arrivalDate", "arrival", "checkIn"])?,
            departure_date: row.required(
                "departureDate",
                &["departureDate", "departure", "checkOut"],
            )?,
            pax,
            pax_adults,
            pax_children,
            pax_infants,
            status,
            source_agency: row.get(&["sourceAgency", "agency"]).unwrap_or("THV").to_string(),
            package_id,
            current_leg: row.int("currentLeg", &["currentLeg"])?.unwrap_or(0),
            room_type: row.optional(&["roomType"]),
            board_type: row.optional(&["boardType"]),
            destination: row.optional(&["destination"]),
            notes: row.optional(&["notes"]),
        })
    }
}

impl Entity for Operation {
    type Create = NewOperation;
    type Patch = OperationPatch;
    const RESOURCE: Resource = Resource::Operations;

    fn repository(stores: &Stores) -> &Arc<dyn Repository<Self>> {
        &stores.operations
    }

    fn create(input: NewOperation) -> AppResult<Self> {
        Operation::new(input)
    }

    fn patch(&mut self, patch: OperationPatch) -> AppResult<()> {
        self.apply(patch)
    }

    fn label(&self) -> String {
        if self.flight_code.is_empty() {
            format!("{} operation on {}", self.kind, self.date)
        } else {
            format!("{} operation {} on {}", self.kind, self.flight_code, self.date)
        }
    }
}

impl Importable for Operation {
    fn from_row(row: &ImportRow) -> AppResult<NewOperation> {
        let reservation_id = row
            .get(&["reservationId"])
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| {
                    AppError::validation(format!("reservationId '{raw}' is not a valid id"))
                })
            })
            .transpose()?;
        Ok(NewOperation {
            reservation_id,
            voucher_no: row.text(&["voucherNo", "voucher"]),
            arrival_flight: None,
            return_flight: None,
            transfer_flight: None,
            current_hotel: row.text(&["currentHotel"]),
            hotel_check_in: row.text(&["hotelCheckIn", "checkIn"]),
            hotel_check_out: row.text(&["hotelCheckOut", "checkOut"]),
            flight_code: row.text(&["flightCode", "flight"]),
            kind: row.get(&["type", "kind"]).unwrap_or("transfer").to_string(),
            origin: row.text(&["from", "origin"]),
            destination: row.text(&["to", "destination"]),
            date: row.required("date", &["date"])?,
            time: row.text(&["time"]),
            passengers: row.int("passengers", &["passengers", "pax"])?.unwrap_or(0),
            hotel: row.text(&["hotel"]),
            transfer_time: row.text(&["transferTime"]),
            notes: row.text(&["notes"]),
            status: row.get(&["status"]).unwrap_or("scheduled").to_string(),
        })
    }
}

impl Entity for Hotel {
    type Create = NewHotel;
    type Patch = HotelPatch;
    const RESOURCE: Resource = Resource::Hotels;

    fn repository(stores: &Stores) -> &Arc<dyn Repository<Self>> {
        &stores.hotels
    }

    fn create(input: NewHotel) -> AppResult<Self> {
        Hotel::new(input)
    }

    fn patch(&mut self, patch: HotelPatch) -> AppResult<()> {
        self.apply(patch)
    }

    fn label(&self) -> String {
        format!("hotel {} ({})", self.code, self.name)
    }
}

impl Importable for Hotel {
    const UPSERT_BY_KEY: bool = true;

    fn from_row(row: &ImportRow) -> AppResult<NewHotel> {
        let defaults = NewHotel::default();
        Ok(NewHotel {
            code: row.required("code", &["code", "hotelCode"])?,
            name: row.required("name", &["name", "hotelName"])?,
            category: row.text(&["category"]),
            region: row.text(&["region"]),
            region_code: row.text(&["regionCode"]),
            transfer_region: row.text(&["transferRegion"]),
            phone: row.text(&["phone", "telephone"]),
            email: row.text(&["email"]),
            website: row.text(&["website", "web"]),
            address: row.text(&["address"]),
            city: row.text(&["city"]),
            postal_code: row.text(&["postalCode", "zip"]),
            country: row.text(&["country"]),
            service_type: row.get(&["serviceType"]).map_or(defaults.service_type, str::to_string),
            manager: row.text(&["manager"]),
            notes: row.text(&["notes"]),
            active: row.boolean("active", &["active", "isActive"])?.unwrap_or(defaults.active),
            latitude: row.float("latitude", &["latitude", "lat"])?,
            longitude: row.float("longitude", &["longitude", "lng", "lon"])?,
            stars: row.int("stars", &["stars"])?.unwrap_or(0),
            giata: row.optional(&["giata", "giataCode"]),
        })
    }

    fn adopt_identity(&mut self, existing: &Self) {
        self.id = existing.id;
        self.created_at = existing.created_at;
    }
}

impl Entity for Package {
    type Create = NewPackage;
    type Patch = PackagePatch;
    // Packages are part of the reservation workflow
    const RESOURCE: Resource = Resource::Reservations;

    fn repository(stores: &Stores) -> &Arc<dyn Repository<Self>> {
        &stores.packages
    }

    fn create(input: NewPackage) -> AppResult<Self> {
        Package::new(input)
    }

    fn patch(&mut self, patch: PackagePatch) -> AppResult<()> {
        self.apply(patch)
    }

    fn label(&self) -> String {
        format!("package {} ({} legs)", self.package_code, self.legs.len())
    }
}

/// Entity operations on behalf of an authenticated actor.
#[derive(Clone)]
pub struct EntityService {
    stores: Stores,
    audit: AuditLogger,
    permissions: Arc<PermissionMatrix>,
}

impl EntityService {
    pub fn new(stores: Stores, audit: AuditLogger, permissions: Arc<PermissionMatrix>) -> Self {
        Self {
            stores,
            audit,
            permissions,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn permissions(&self) -> &PermissionMatrix {
        &self.permissions
    }

    pub fn require(&self, actor: &Actor, resource: Resource, action: Action) -> AppResult<()> {
        actor.require(&self.permissions, resource, action)
    }

    async fn ensure_key_free<T: Entity>(&self, record: &T) -> AppResult<()> {
        let Some(key) = record.unique_key() else {
            return Ok(());
        };
        match T::repository(&self.stores).find_by_key(&key).await? {
            Some(existing) if existing.id() != record.id() => {
                Err(AppError::Conflict { entity: T::ENTITY, key })
            }
            _ => Ok(()),
        }
    }

    pub async fn create<T: Entity>(&self, actor: &Actor, input: T::Create) -> AppResult<T> {
        self.require(actor, T::RESOURCE, Action::Create)?;
        let record = T::create(input)?;
        self.ensure_key_free(&record).await?;
        T::repository(&self.stores).insert(&record).await?;

        self.audit
            .record(
                actor.name(),
                AuditAction::Create,
                T::KIND,
                &record.id().to_string(),
                format!("Created {}", record.label()),
            )
            .await;
        debug!("{} created {} {}", actor.name(), T::ENTITY, record.id());
        Ok(record)
    }

    pub async fn get<T: Entity>(&self, actor: &Actor, id: Uuid) -> AppResult<T> {
        self.require(actor, T::RESOURCE, Action::Read)?;
        T::repository(&self.stores)
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(T::ENTITY, id))
    }

    pub async fn list<T: Entity>(
        &self,
        actor: &Actor,
        filter: &T::Filter,
        page: Pagination,
    ) -> AppResult<Page<T>> {
        self.require(actor, T::RESOURCE, Action::Read)?;
        Ok(T::repository(&self.stores).list(filter, page.clamped()).await?)
    }

    pub async fn update<T: Entity>(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: T::Patch,
    ) -> AppResult<T> {
        self.require(actor, T::RESOURCE, Action::Update)?;
        let repo = T::repository(&self.stores);
        let mut record = repo.get(id).await?.ok_or_else(|| AppError::not_found(T::ENTITY, id))?;
        record.patch(patch)?;
        self.ensure_key_free(&record).await?;

        if !repo.update(&record).await? {
            return Err(AppError::not_found(T::ENTITY, id));
        }
        self.audit
            .record(
                actor.name(),
                AuditAction::Update,
                T::KIND,
                &id.to_string(),
                format!("Updated {}", record.label()),
            )
            .await;
        Ok(record)
    }

    pub async fn delete<T: Entity>(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        self.require(actor, T::RESOURCE, Action::Delete)?;
        let repo = T::repository(&self.stores);
        let record = repo.get(id).await?.ok_or_else(|| AppError::not_found(T::ENTITY, id))?;

        if !repo.delete(id).await? {
            return Err(AppError::not_found(T::ENTITY, id));
        }
        self.audit
            .record(
                actor.name(),
                AuditAction::Delete,
                T::KIND,
                &id.to_string(),
                format!("Deleted {}", record.label()),
            )
            .await;
        Ok(())
    }

    /// Store one parsed row. Returns `true` when an existing record was replaced.
    async fn import_row<T: Importable>(&self, row: &ImportRow) -> AppResult<bool> {
        let mut record = T::create(T::from_row(row)?)?;
        let repo = T::repository(&self.stores);

        if T::UPSERT_BY_KEY {
            if let Some(key) = record.unique_key() {
                if let Some(existing) = repo.find_by_key(&key).await? {
                    record.adopt_identity(&existing);
                    if repo.update(&record).await? {
                        return Ok(true);
                    }
                }
            }
        }

        match repo.insert(&record).await {
            Ok(()) => Ok(false),
            Err(StoreError::Conflict { entity, key }) => Err(AppError::Conflict { entity, key }),
            Err(e) => Err(e.into()),
        }
    }

    /// Bulk create from an uploaded file. A bad row is recorded in the
    /// summary and the rest of the batch continues.
    pub async fn import<T: Importable>(
        &self,
        actor: &Actor,
        file_name: &str,
        bytes: &[u8],
    ) -> AppResult<ImportSummary> {
        self.require(actor, T::RESOURCE, Action::Upload)?;
        let rows = import::parse_rows(file_name, bytes)?;

        let mut summary = ImportSummary::default();
        for (index, row) in rows.iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            summary.total += 1;
            match self.import_row::<T>(row).await {
                Ok(true) => summary.updated += 1,
                Ok(false) => summary.created += 1,
                Err(AppError::Internal(e)) => return Err(AppError::Internal(e)),
                Err(e) => summary.fail(index + 1, e.to_string()),
            }
        }
        if summary.total == 0 {
            return Err(AppError::validation("uploaded file has no data rows"));
        }

        let details = summary.describe(file_name);
        self.audit
            .record(actor.name(), AuditAction::Import, T::KIND, file_name, details.clone())
            .await;
        info!("{} by {}", details, actor.name());
        Ok(summary)
    }

    /// Preview an uploaded flight list against what is stored. Nothing is written.
    pub async fn compare_flights(
        &self,
        actor: &Actor,
        file_name: &str,
        bytes: &[u8],
    ) -> AppResult<FlightComparison> {
        self.require(actor, Resource::Flights, Action::Upload)?;
        let rows = import::parse_rows(file_name, bytes)?;

        let uploaded: Vec<(usize, AppResult<NewFlight>)> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_empty())
            .map(|(index, row)| (index + 1, Flight::from_row(row)))
            .collect();

        let dates: BTreeSet<String> = uploaded
            .iter()
            .filter_map(|(_, input)| input.as_ref().ok())
            .map(|input| input.date.trim().to_string())
            .collect();

        let mut stored = Vec::new();
        for date in dates {
            let filter = FlightFilter {
                date: Some(date),
                ..Default::default()
            };
            stored.extend(list_all(self.stores.flights.as_ref(), &filter).await?);
        }

        Ok(import::compare_flights(uploaded, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditFilter, HotelFilter, NewUser, User, UserStatus};
    use crate::store::AuditStore;

    fn actor(role: &str) -> Actor {
        Actor(
            User::new(
                NewUser {
                    name: "Staff".to_string(),
                    email: format!("{role}@example.com"),
                    password: "unused".to_string(),
                    role: role.to_string(),
                    status: UserStatus::Active,
                    profile_picture: None,
                },
                "hash".to_string(),
            )
            .unwrap(),
        )
    }

    fn service() -> EntityService {
        let stores = Stores::in_memory();
        let audit = AuditLogger::new(stores.audit.clone());
        EntityService::new(stores, audit, Arc::new(PermissionMatrix::builtin().unwrap()))
    }

    async fn audit_count(service: &EntityService) -> i64 {
        service
            .stores()
            .audit
            .list(&AuditFilter::default(), Pagination::default())
            .await
            .unwrap()
            .total
    }

    fn new_hotel(code: &str, name: &str) -> NewHotel {
        NewHotel {
            code: code.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get_returns_stored_fields() {
        let service = service();
        let admin = actor("admin");

        let created: Hotel = service.create(&admin, new_hotel("H1", "Sea View")).await.unwrap();
        let fetched: Hotel = service.get(&admin, created.id).await.unwrap();

        assert_eq!(fetched.code, "H1");
        assert_eq!(fetched.name, "Sea View");
        assert_eq!(fetched.service_type, "Otel");
        assert_eq!(fetched.created_at, created.created_at);
        assert_eq!(audit_count(&service).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_hotel_code_conflicts() {
        let service = service();
        let admin = actor("admin");
        service.create::<Hotel>(&admin, new_hotel("H1", "One")).await.unwrap();

        let err = service.create::<Hotel>(&admin, new_hotel("H1", "Two")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(audit_count(&service).await, 1);
    }

    #[tokio::test]
    async fn test_update_missing_id_writes_no_audit_entry() {
        let service = service();
        let admin = actor("admin");

        let err = service
            .update::<Hotel>(&admin, Uuid::new_v4(), HotelPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(audit_count(&service).await, 0);
    }

    #[tokio::test]
    async fn test_each_mutation_audited_once() {
        let service = service();
        let admin = actor("admin");

        let hotel: Hotel = service.create(&admin, new_hotel("H1", "One")).await.unwrap();
        let patch = HotelPatch {
            stars: Some(5),
            ..Default::default()
        };
        service.update::<Hotel>(&admin, hotel.id, patch).await.unwrap();
        service.delete::<Hotel>(&admin, hotel.id).await.unwrap();

        let entries = service
            .stores()
            .audit
            .list(&AuditFilter::default(), Pagination::default())
            .await
            .unwrap()
            .items;
        assert_eq!(entries.len(), 3);
        assert!(
            entries
                .iter()
                .all(|e| e.entity_id == hotel.id.to_string() && e.entity_type == "hotels")
        );
    }

    #[tokio::test]
    async fn test_permission_denied_before_any_write() {
        let service = service();
        let err = service
            .create::<Hotel>(&actor("operation"), new_hotel("H1", "One"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied { .. }));
        assert_eq!(service.stores().hotels.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_import_skips_malformed_rows() {
        let service = service();
        let admin = actor("admin");
        let csv = "\
flightCode,airline,from,to,date,time,direction,passengers
TK1,THY,IST,AYT,2024-06-01,10:00,arrival,120
TK2,THY,IST,AYT,01/06/2024,11:00,arrival,80
,THY,IST,AYT,2024-06-01,12:00,arrival,80
TK4,THY,AYT,IST,2024-06-01,18:30,departure,many
TK5,THY,AYT,IST,2024-06-02,19:00,departure,95
";
        let summary = service
            .import::<Flight>(&admin, "flights.csv", csv.as_bytes())
            .await
            .unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed, 3);
        let rows: Vec<usize> = summary.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert_eq!(service.stores().flights.count().await.unwrap(), 2);

        // One entry for the whole batch
        assert_eq!(audit_count(&service).await, 1);
    }

    #[tokio::test]
    async fn test_hotel_upload_upserts_by_code() {
        let service = service();
        let admin = actor("admin");
        let existing: Hotel = service.create(&admin, new_hotel("H1", "Old Name")).await.unwrap();

        let csv = "code,name,city,stars\nH1,New Name,Antalya,5\nH2,Second,Side,4\n";
        let summary = service.import::<Hotel>(&admin, "hotels.csv", csv.as_bytes()).await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 1);

        let hotels = service
            .list::<Hotel>(&admin, &HotelFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(hotels.total, 2);

        let updated: Hotel = service.get(&admin, existing.id).await.unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.stars, 5);
        assert_eq!(updated.created_at, existing.created_at);
    }

    #[tokio::test]
    async fn test_reservation_upload_rejects_duplicate_voucher() {
        let service = service();
        let admin = actor("admin");
        let csv = "\
voucherNo,leaderName,leaderPassport,productCode,hotel,arrivalDate,departureDate,pax
V1,Anna,P1,CAP,Cave,2024-05-01,2024-05-05,2
V1,Ben,P2,CAP,Cave,2024-05-01,2024-05-05,3
";
        let summary = service
            .import::<Reservation>(&admin, "res.csv", csv.as_bytes())
            .await
            .unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors[0].row, 2);
    }

    #[tokio::test]
    async fn test_upload_needs_upload_permission() {
        let service = service();
        let csv = "code,name\nH1,One\n";
        let err = service
            .import::<Hotel>(&actor("management"), "hotels.csv", csv.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_compare_flights_reads_only() {
        let service = service();
        let admin = actor("admin");
        let stored = "flightCode,from,to,date,time,direction,pnr\nTK1,IST,AYT,2024-01-15,14:30,departure,ABC123\n";
        service.import::<Flight>(&admin, "base.csv", stored.as_bytes()).await.unwrap();

        let upload = "\
flightCode,from,to,date,time,direction,pnr
TK1,IST,AYT,2024-01-15,14:30,departure,XYZ999
NEW001,ESB,ADB,2024-01-18,12:00,departure,
";
        let result = service
            .compare_flights(&admin, "compare.csv", upload.as_bytes())
            .await
            .unwrap();
        assert_eq!(result.summary.changed, 1);
        assert_eq!(result.summary.new, 1);
        assert_eq!(result.summary.missing, 0);
        assert_eq!(service.stores().flights.count().await.unwrap(), 1);
    }
}
