//! Bulk upload parsing. Files become a list of [`ImportRow`]s keyed by
//! normalized header names; entity-specific mapping lives with the entity.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::model::{Flight, NewFlight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Tsv,
    Json,
}

impl ImportFormat {
    pub fn from_file_name(file_name: &str) -> AppResult<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(ImportFormat::Csv),
            "tsv" | "tab" => Ok(ImportFormat::Tsv),
            "json" => Ok(ImportFormat::Json),
            "xlsx" | "xls" => Err(AppError::validation(
                "Excel workbooks are not supported; save the sheet as CSV and upload that",
            )),
            _ => Err(AppError::validation(format!(
                "unsupported file type '{file_name}'; expected .csv, .tsv or .json"
            ))),
        }
    }
}

/// Lower-case and drop separators so `Flight Code`, `flight_code` and
/// `flightCode` all name the same column.
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One uploaded record with normalized column names.
#[derive(Debug, Clone, Default)]
pub struct ImportRow {
    values: HashMap<String, String>,
}

impl ImportRow {
    pub fn from_pairs<K: AsRef<str>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let values = pairs
            .into_iter()
            .map(|(key, value)| {
                let value: String = value.into();
                (normalize_header(key.as_ref()), value.trim().to_string())
            })
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .collect();
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First non-empty value under any of the aliases
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .find_map(|alias| self.values.get(&normalize_header(alias)))
            .map(String::as_str)
    }

    pub fn text(&self, aliases: &[&str]) -> String {
        self.get(aliases).unwrap_or_default().to_string()
    }

    pub fn optional(&self, aliases: &[&str]) -> Option<String> {
        self.get(aliases).map(str::to_string)
    }

    pub fn required(&self, field: &str, aliases: &[&str]) -> AppResult<String> {
        self.get(aliases)
            .map(str::to_string)
            .ok_or_else(|| AppError::validation(format!("missing {field}")))
    }

    pub fn int(&self, field: &str, aliases: &[&str]) -> AppResult<Option<i32>> {
        let Some(raw) = self.get(aliases) else {
            return Ok(None);
        };
        // Spreadsheet exports often write whole numbers as "3.0"
        let trimmed = raw.strip_suffix(".0").unwrap_or(raw);
        trimmed
            .parse::<i32>()
            .map(Some)
            .map_err(|_| {
                AppError::validation(format!("{field} must be a whole number, got '{raw}'"))
            })
    }

    pub fn float(&self, field: &str, aliases: &[&str]) -> AppResult<Option<f64>> {
        let Some(raw) = self.get(aliases) else {
            return Ok(None);
        };
        raw.replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("{field} must be a number, got '{raw}'")))
    }

    pub fn boolean(&self, field: &str, aliases: &[&str]) -> AppResult<Option<bool>> {
        let Some(raw) = self.get(aliases) else {
            return Ok(None);
        };
        match raw.to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "x" | "evet" | "var" => Ok(Some(true)),
            "false" | "no" | "n" | "0" | "hayir" | "hayır" | "yok" => Ok(Some(false)),
            _ => Err(AppError::validation(format!("{field} must be yes/no, got '{raw}'"))),
        }
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

fn parse_delimited(bytes: &[u8], delimiter: u8) -> AppResult<Vec<ImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(strip_bom(bytes));

    let headers = reader
        .headers()
        .map_err(|e| AppError::validation(format!("unreadable header row: {e}")))?
        .clone();
    if headers.iter().all(str::is_empty) {
        return Err(AppError::validation("header row is empty"));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::validation(format!("malformed line {}: {e}", index + 2))
        })?;
        rows.push(ImportRow::from_pairs(headers.iter().zip(record.iter())));
    }
    Ok(rows)
}

fn json_scalar(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn parse_json(bytes: &[u8]) -> AppResult<Vec<ImportRow>> {
    let objects: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(strip_bom(bytes))
        .map_err(|e| AppError::validation(format!("expected a JSON array of objects: {e}")))?;

    Ok(objects
        .into_iter()
        .map(|object| {
            ImportRow::from_pairs(
                object
                    .into_iter()
                    .filter_map(|(key, value)| json_scalar(value).map(|value| (key, value))),
            )
        })
        .collect())
}

/// Parse an uploaded file. Blank rows are kept so row numbers stay aligned;
/// callers skip them.
pub fn parse_rows(file_name: &str, bytes: &[u8]) -> AppResult<Vec<ImportRow>> {
    let format = ImportFormat::from_file_name(file_name)?;
    if strip_bom(bytes).iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::validation("uploaded file is empty"));
    }
    match format {
        ImportFormat::Csv => parse_delimited(bytes, b','),
        ImportFormat::Tsv => parse_delimited(bytes, b'\t'),
        ImportFormat::Json => parse_json(bytes),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    /// 1-based position among the data rows
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
}

impl ImportSummary {
    pub fn fail(&mut self, row: usize, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(RowError {
            row,
            message: message.into(),
        });
    }

    pub fn describe(&self, file_name: &str) -> String {
        format!(
            "Imported {}: {} rows, {} created, {} updated, {} failed",
            file_name, self.total, self.created, self.updated, self.failed
        )
    }
}

/// A field whose uploaded value differs from the stored one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: &'static str,
    pub stored: String,
    pub uploaded: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFlight {
    pub row: usize,
    pub stored: Flight,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFlightRow {
    pub row: usize,
    #[serde(flatten)]
    pub flight: Flight,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub total: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub missing: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Upload preview against stored flights, keyed by (flight code, date).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightComparison {
    pub summary: ComparisonSummary,
    pub new_flights: Vec<NewFlightRow>,
    pub changed_flights: Vec<ChangedFlight>,
    /// Stored flights on the uploaded dates that the file no longer lists
    pub missing_flights: Vec<Flight>,
    /// Extra stored copies of a (flight code, date) the file lists; the
    /// first copy is the one rows are compared against
    pub duplicate_flights: Vec<Flight>,
    pub errors: Vec<RowError>,
}

pub fn flight_key(flight_code: &str, date: &str) -> (String, String) {
    (flight_code.trim().to_uppercase(), date.trim().to_string())
}

fn diff_flight(stored: &Flight, uploaded: &Flight) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut check = |field: &'static str, old: String, new: String| {
        if old != new {
            changes.push(FieldChange {
                field,
                stored: old,
                uploaded: new,
            });
        }
    };
    check("airline", stored.airline.clone(), uploaded.airline.clone());
    check("from", stored.origin.clone(), uploaded.origin.clone());
    check("to", stored.destination.clone(), uploaded.destination.clone());
    check("time", stored.time.clone(), uploaded.time.clone());
    check(
        "direction",
        stored.direction.as_str().to_string(),
        uploaded.direction.as_str().to_string(),
    );
    check("passengers", stored.passengers.to_string(), uploaded.passengers.to_string());
    check("hasPNR", stored.has_pnr.to_string(), uploaded.has_pnr.to_string());
    check("pnr", stored.pnr.clone(), uploaded.pnr.clone());
    changes
}

/// Classify uploaded rows against the stored flights of the same dates.
/// `uploaded` holds (row number, parsed input or error) in file order.
pub fn compare_flights(
    uploaded: Vec<(usize, AppResult<NewFlight>)>,
    stored: Vec<Flight>,
) -> FlightComparison {
    let mut by_key: HashMap<(String, String), Vec<Flight>> = HashMap::new();
    for flight in stored {
        by_key
            .entry(flight_key(&flight.flight_code, &flight.date))
            .or_default()
            .push(flight);
    }

    let mut comparison = FlightComparison::default();
    let mut seen = HashSet::new();

    for (row, input) in uploaded {
        comparison.summary.total += 1;
        let flight = match input.and_then(Flight::new) {
            Ok(flight) => flight,
            Err(e) => {
                comparison.summary.invalid += 1;
                comparison.errors.push(RowError {
                    row,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let key = flight_key(&flight.flight_code, &flight.date);
        seen.insert(key.clone());
        match by_key.get(&key).and_then(|copies| copies.first()) {
            None => {
                comparison.summary.new += 1;
                comparison.new_flights.push(NewFlightRow { row, flight });
            }
            Some(existing) => {
                let changes = diff_flight(existing, &flight);
                if changes.is_empty() {
                    comparison.summary.unchanged += 1;
                } else {
                    comparison.summary.changed += 1;
                    comparison.changed_flights.push(ChangedFlight {
                        row,
                        stored: existing.clone(),
                        changes,
                    });
                }
            }
        }
    }

    let mut missing = Vec::new();
    let mut duplicates = Vec::new();
    for (key, mut copies) in by_key {
        if seen.contains(&key) {
            duplicates.extend(copies.drain(1..));
        } else {
            missing.append(&mut copies);
        }
    }
    let schedule_order = |a: &Flight, b: &Flight| {
        (&a.date, &a.time, &a.flight_code).cmp(&(&b.date, &b.time, &b.flight_code))
    };
    missing.sort_by(schedule_order);
    duplicates.sort_by(schedule_order);
    comparison.summary.missing = missing.len();
    comparison.summary.duplicates = duplicates.len();
    comparison.missing_flights = missing;
    comparison.duplicate_flights = duplicates;
    comparison
}
