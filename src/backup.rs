use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

use crate::model::{AuditEntry, AuditFilter, Flight, Hotel, Operation, Package, Reservation, User};
use crate::store::{AuditStore, Pagination, StoreResult, Stores, list_all};

/// Audit entries included in a snapshot
pub const BACKUP_LOG_LIMIT: u32 = 1000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCounts {
    pub users: usize,
    pub flights: usize,
    pub reservations: usize,
    pub operations: usize,
    pub hotels: usize,
    pub packages: usize,
    pub logs: usize,
}

/// Full snapshot of the business store plus the latest audit entries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub counts: BackupCounts,
    pub users: Vec<User>,
    pub flights: Vec<Flight>,
    pub reservations: Vec<Reservation>,
    pub operations: Vec<Operation>,
    pub hotels: Vec<Hotel>,
    pub packages: Vec<Package>,
    pub logs: Vec<AuditEntry>,
}

impl Backup {
    pub fn file_name(&self) -> String {
        format!(
            "tourdesk-backup-{}.json",
            self.created_at.unix_timestamp()
        )
    }
}

pub async fn create_backup(stores: &Stores) -> StoreResult<Backup> {
    let users = list_all(stores.users.as_ref(), &Default::default()).await?;
    let flights = list_all(stores.flights.as_ref(), &Default::default()).await?;
    let reservations = list_all(stores.reservations.as_ref(), &Default::default()).await?;
    let operations = list_all(stores.operations.as_ref(), &Default::default()).await?;
    let hotels = list_all(stores.hotels.as_ref(), &Default::default()).await?;
    let packages = list_all(stores.packages.as_ref(), &Default::default()).await?;

    let mut logs = Vec::new();
    let mut page = Pagination::new(0, BACKUP_LOG_LIMIT);
    while (logs.len() as u32) < BACKUP_LOG_LIMIT {
        let batch = stores.audit.list(&AuditFilter::default(), page).await?;
        let fetched = batch.items.len();
        logs.extend(batch.items);
        if fetched < page.limit as usize {
            break;
        }
        page.offset += page.limit;
        page.limit = (BACKUP_LOG_LIMIT - logs.len() as u32).min(page.limit);
    }
    logs.truncate(BACKUP_LOG_LIMIT as usize);

    let counts = BackupCounts {
        users: users.len(),
        flights: flights.len(),
        reservations: reservations.len(),
        operations: operations.len(),
        hotels: hotels.len(),
        packages: packages.len(),
        logs: logs.len(),
    };
    info!(
        "Backup assembled: {} users, {} flights, {} reservations, {} operations, {} hotels, {} packages, {} log entries",
        counts.users,
        counts.flights,
        counts.reservations,
        counts.operations,
        counts.hotels,
        counts.packages,
        counts.logs
    );

    Ok(Backup {
        created_at: OffsetDateTime::now_utc(),
        counts,
        users,
        flights,
        reservations,
        operations,
        hotels,
        packages,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditAction, NewHotel};
    use crate::store::Repository;

    #[tokio::test]
    async fn test_backup_holds_every_collection_and_caps_logs() {
        let stores = Stores::in_memory();
        for i in 0..3 {
            let hotel = Hotel::new(NewHotel {
                code: format!("H{i}"),
                name: format!("Hotel {i}"),
                ..Default::default()
            })
            .unwrap();
            stores.hotels.insert(&hotel).await.unwrap();
        }
        for i in 0..(BACKUP_LOG_LIMIT + 25) {
            let entry =
                AuditEntry::new("system", AuditAction::Create, "hotels", i.to_string(), "seed");
            stores.audit.append(&entry).await.unwrap();
        }

        let backup = create_backup(&stores).await.unwrap();
        assert_eq!(backup.hotels.len(), 3);
        assert_eq!(backup.counts.hotels, 3);
        assert_eq!(backup.logs.len(), BACKUP_LOG_LIMIT as usize);
        assert!(backup.flights.is_empty());
        assert!(backup.file_name().ends_with(".json"));
    }
}
