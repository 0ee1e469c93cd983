//! Live flight status from a third-party API, memoized per
//! (flight code, airport) for a fixed window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::FlightStatusSettings;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirlineInfo {
    pub name: String,
    pub iata: String,
    pub icao: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftInfo {
    pub model: String,
    pub registration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightEndpoint {
    pub airport: String,
    pub iata: String,
    pub terminal: Option<String>,
    pub gate: Option<String>,
    pub scheduled_time: Option<String>,
    pub estimated_time: Option<String>,
    pub actual_time: Option<String>,
}

/// Flight as reported by the status provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightDetails {
    pub flight_number: String,
    pub callsign: Option<String>,
    pub status: String,
    pub airline: AirlineInfo,
    pub aircraft: AircraftInfo,
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
}

/// Lookup result returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct FlightLookup {
    #[serde(flatten)]
    pub flight: FlightDetails,
    pub cached: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

#[async_trait]
pub trait FlightStatusProvider: Send + Sync {
    async fn fetch(&self, flight_code: &str, airport_code: &str) -> AppResult<FlightDetails>;
}

/// Provider backed by the HTTP flight-status API.
pub struct HttpFlightStatusProvider {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpFlightStatusProvider {
    pub fn new(settings: &FlightStatusSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("failed to create flight status HTTP client")?;

        let base_url = Url::parse(settings.base_url.trim())
            .with_context(|| format!("invalid flight status base URL {}", settings.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("flight status base URL {} cannot carry a path", settings.base_url);
        }

        if settings.api_key.is_none() {
            warn!("No flight status API key configured; live flight lookups will fail");
        }

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone().filter(|key| !key.is_empty()),
        })
    }
}

impl HttpFlightStatusProvider {
    /// `{base}/flights/{code}` with the code escaped as a single path segment
    fn flight_url(&self, flight_code: &str) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Configuration("flight status base URL cannot carry a path".to_string())
            })?
            .pop_if_empty()
            .extend(["flights", flight_code]);
        Ok(url)
    }
}

#[async_trait]
impl FlightStatusProvider for HttpFlightStatusProvider {
    async fn fetch(&self, flight_code: &str, airport_code: &str) -> AppResult<FlightDetails> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| {
                AppError::Configuration("flight status API key is not configured".to_string())
            })?;

        let url = self.flight_url(flight_code)?;
        let response = self
            .client
            .get(url)
            .header("x-api-key", api_key)
            .query(&[("airport_code", airport_code)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("flight status request failed: {e}")))?;

        match response.status() {
            status if status.is_success() => response
                .json::<FlightDetails>()
                .await
                .map_err(|e| AppError::Upstream(format!("unreadable flight status response: {e}"))),
            StatusCode::NOT_FOUND => Err(AppError::not_found("flight", flight_code)),
            status => Err(AppError::Upstream(format!("flight status API returned {status}"))),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    details: FlightDetails,
    fetched_at: OffsetDateTime,
    stored: Instant,
}

/// Concurrent TTL cache with a hard entry limit.
pub struct FlightStatusCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl FlightStatusCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn get(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?;
        if entry.stored.elapsed() < self.ttl {
            return Some(entry.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    fn insert(&self, key: String, entry: CacheEntry) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict();
        }
        self.entries.insert(key, entry);
    }

    /// Drop expired entries; if that frees nothing, drop the oldest one.
    fn evict(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored.elapsed() < ttl);
        if self.entries.len() < self.max_entries {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            debug!("Flight status cache full, evicting {}", key);
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct FlightStatusService {
    provider: Arc<dyn FlightStatusProvider>,
    cache: FlightStatusCache,
}

impl FlightStatusService {
    pub fn new(provider: Arc<dyn FlightStatusProvider>, cache: FlightStatusCache) -> Self {
        Self { provider, cache }
    }

    pub fn from_settings(settings: &FlightStatusSettings) -> anyhow::Result<Self> {
        let provider = HttpFlightStatusProvider::new(settings)?;
        let cache = FlightStatusCache::new(
            Duration::from_secs(settings.cache_ttl_seconds),
            settings.cache_max_entries,
        );
        Ok(Self::new(Arc::new(provider), cache))
    }

    pub async fn lookup(&self, flight_code: &str, airport_code: &str) -> AppResult<FlightLookup> {
        let flight_code = flight_code.trim().to_uppercase();
        let airport_code = airport_code.trim().to_uppercase();
        if !is_code(&flight_code, 2, 10) {
            return Err(AppError::validation(format!(
                "'{flight_code}' is not a valid flight code"
            )));
        }
        if !is_code(&airport_code, 3, 4) {
            return Err(AppError::validation(format!(
                "'{airport_code}' is not a valid airport code"
            )));
        }

        let key = format!("{flight_code}@{airport_code}");
        if let Some(entry) = self.cache.get(&key) {
            debug!("Flight status cache hit for {}", key);
            return Ok(FlightLookup {
                flight: entry.details,
                cached: true,
                fetched_at: entry.fetched_at,
            });
        }

        let details = self.provider.fetch(&flight_code, &airport_code).await?;
        let fetched_at = OffsetDateTime::now_utc();
        self.cache.insert(
            key,
            CacheEntry {
                details: details.clone(),
                fetched_at,
                stored: Instant::now(),
            },
        );
        Ok(FlightLookup {
            flight: details,
            cached: false,
            fetched_at,
        })
    }
}

/// Flight and airport codes are short ASCII alphanumerics
fn is_code(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.len()) && value.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FlightStatusProvider for CountingProvider {
        async fn fetch(&self, flight_code: &str, _airport_code: &str) -> AppResult<FlightDetails> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if flight_code == "INVALID999" {
                return Err(AppError::not_found("flight", flight_code));
            }
            Ok(FlightDetails {
                flight_number: flight_code.to_string(),
                status: "Scheduled".to_string(),
                ..Default::default()
            })
        }
    }

    fn service(provider: Arc<CountingProvider>, ttl: Duration, max: usize) -> FlightStatusService {
        FlightStatusService::new(provider, FlightStatusCache::new(ttl, max))
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), Duration::from_secs(900), 8);

        let first = service.lookup("tk2412", "ist").await.unwrap();
        let second = service.lookup("TK2412", "IST").await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.flight.flight_number, "TK2412");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), Duration::ZERO, 8);

        service.lookup("TK1", "IST").await.unwrap();
        service.lookup("TK1", "IST").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_never_exceeds_limit() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), Duration::from_secs(900), 2);

        for code in ["TK1", "TK2", "TK3", "TK4"] {
            service.lookup(code, "IST").await.unwrap();
        }
        assert_eq!(service.cache.len(), 2);
        // TK1 was the oldest and has been evicted
        let again = service.lookup("TK1", "IST").await.unwrap();
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), Duration::from_secs(900), 8);

        assert!(matches!(
            service.lookup("INVALID999", "IST").await,
            Err(AppError::NotFound { .. })
        ));
        assert_eq!(service.cache.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let settings = FlightStatusSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            cache_ttl_seconds: 900,
            cache_max_entries: 8,
            timeout_seconds: 1,
        };
        let provider = HttpFlightStatusProvider::new(&settings).unwrap();
        let err = provider.fetch("TK1", "IST").await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_codes_outside_the_alphabet_never_reach_the_provider() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), Duration::from_secs(900), 8);

        for (code, airport) in [
            ("tk1/../../admin/keys?", "IST"),
            ("TK1%2F..", "IST"),
            ("", "IST"),
            ("TK1", "IST?x=1"),
        ] {
            let result = service.lookup(code, airport).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{code} {airport}");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flight_code_is_one_path_segment() {
        let settings = FlightStatusSettings {
            base_url: "http://127.0.0.1:9/v1/".to_string(),
            api_key: Some("key".to_string()),
            cache_ttl_seconds: 900,
            cache_max_entries: 8,
            timeout_seconds: 1,
        };
        let provider = HttpFlightStatusProvider::new(&settings).unwrap();

        let url = provider.flight_url("TK2412").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/v1/flights/TK2412");

        let url = provider.flight_url("A/B?").unwrap();
        assert_eq!(url.path(), "/v1/flights/A%2FB%3F");
        assert!(url.query().is_none());
    }
}
