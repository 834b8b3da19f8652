use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use tracing::warn;

/// Asset class of a ticker row. `Index` rows get their own styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerKind {
    Stock,
    Crypto,
    Index,
}

impl TickerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickerKind::Stock => "stock",
            TickerKind::Crypto => "crypto",
            TickerKind::Index => "index",
        }
    }
}

impl fmt::Display for TickerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TickerKind {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(TickerKind::Stock),
            "crypto" => Ok(TickerKind::Crypto),
            "index" => Ok(TickerKind::Index),
            other => Err(RowError::UnknownKind(other.to_string())),
        }
    }
}

/// One market or index row shown in the ticker strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub id: i64,
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub change_percent: f64,
    pub kind: TickerKind,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TickerEntry {
    pub fn new(id: i64, symbol: &str, name: &str, change_percent: f64, kind: TickerKind) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            name: Some(name.to_string()),
            change_percent,
            kind,
            updated_at: None,
        }
    }

    /// Checks the fields a typed entry can still get wrong.
    pub fn validate(&self) -> Result<(), RowError> {
        if self.symbol.trim().is_empty() {
            return Err(RowError::BlankSymbol(self.id));
        }
        if !self.change_percent.is_finite() {
            return Err(RowError::NonFiniteChange(self.id));
        }
        Ok(())
    }
}

/// Untyped row as the `stock_tickers` table returns it, over REST or SQL.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct RawTickerRow {
    pub id: i64,
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub change_pct: f64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Error)]
pub enum RowError {
    #[error("row does not match the ticker shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("row {0} has a blank symbol")]
    BlankSymbol(i64),
    #[error("row {0} has a non-finite change")]
    NonFiniteChange(i64),
    #[error("unknown ticker kind '{0}'")]
    UnknownKind(String),
}

/// Parses an ISO-8601 timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

impl TryFrom<RawTickerRow> for TickerEntry {
    type Error = RowError;

    fn try_from(row: RawTickerRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse::<TickerKind>()?;

        // An unreadable timestamp costs the label, not the row
        let updated_at = match row.updated_at.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    warn!("Ignoring unreadable updated_at '{}' on row {}", raw, row.id);
                }
                parsed
            }
        };

        let entry = TickerEntry {
            id: row.id,
            symbol: row.symbol.trim().to_string(),
            name: row.name.filter(|n| !n.trim().is_empty()),
            change_percent: row.change_pct,
            kind,
            updated_at,
        };
        entry.validate()?;
        Ok(entry)
    }
}

/// Turns raw rows into entries ordered by id, skipping rows that fail
/// validation and repeated ids.
pub fn validate_rows<I>(rows: I) -> Vec<TickerEntry>
where
    I: IntoIterator<Item = RawTickerRow>,
{
    let mut entries: Vec<TickerEntry> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            match TickerEntry::try_from(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping ticker row {}: {}", id, e);
                    None
                }
            }
        })
        .collect();

    entries.sort_by_key(|entry| entry.id);

    let mut seen = HashSet::new();
    entries.retain(|entry| {
        let first = seen.insert(entry.id);
        if !first {
            warn!("Skipping duplicate ticker id {}", entry.id);
        }
        first
    });

    entries
}

/// Same as [`validate_rows`] for rows still in JSON form.
pub fn validate_json_rows(values: Vec<serde_json::Value>) -> Vec<TickerEntry> {
    let rows = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawTickerRow>(value) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("Skipping ticker row: {}", RowError::from(e));
                None
            }
        });
    validate_rows(rows)
}

/// Built-in entries shown before the first successful fetch.
pub fn fallback_tickers() -> Vec<TickerEntry> {
    vec![
        TickerEntry::new(1, "NVDA", "NVIDIA", 2.34, TickerKind::Stock),
        TickerEntry::new(2, "MSFT", "Microsoft", -0.12, TickerKind::Stock),
        TickerEntry::new(3, "GOOGL", "Alphabet", 1.87, TickerKind::Stock),
        TickerEntry::new(4, "META", "Meta", 0.95, TickerKind::Stock),
        TickerEntry::new(5, "AMD", "AMD", 1.73, TickerKind::Stock),
        TickerEntry::new(6, "ORCL", "Oracle", -0.44, TickerKind::Stock),
        TickerEntry::new(7, "PLTR", "Palantir", 3.21, TickerKind::Stock),
        TickerEntry::new(8, "SNOW", "Snowflake", 4.15, TickerKind::Stock),
        TickerEntry::new(9, "AI INDEX", "AI Power Index", 1.42, TickerKind::Index),
    ]
}
