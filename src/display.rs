//! Pure presentation logic for the ticker strip.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ticker::{TickerEntry, TickerKind};
use crate::widget::{TickerSnapshot, DEFAULT_FLASH_DURATION};

/// Formats a percentage change as `+X.XX%` or `-X.XX%`.
pub fn format_change(change: f64) -> String {
    let sign = if change >= 0.0 { '+' } else { '-' };
    format!("{}{:.2}%", sign, change.abs())
}

/// Relative age of `timestamp` at `now`, floored to whole units.
pub fn time_ago(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return String::new();
    };

    let minutes = (now - timestamp).num_milliseconds().div_euclid(60_000);
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Static,
    Live,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::Static => "static",
            Badge::Live => "live",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Badge::Static => "badge badge-static",
            Badge::Live => "badge badge-live",
        }
    }

    pub fn pulses(&self) -> bool {
        matches!(self, Badge::Live)
    }
}

pub fn badge(is_live: bool) -> Badge {
    if is_live {
        Badge::Live
    } else {
        Badge::Static
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn css_class(&self) -> &'static str {
        match self {
            Trend::Up => "change change-up",
            Trend::Down => "change change-down",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "\u{25B2}",
            Trend::Down => "\u{25BC}",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Standard,
    Index,
}

impl Emphasis {
    pub fn css_class(&self) -> &'static str {
        match self {
            Emphasis::Standard => "symbol",
            Emphasis::Index => "symbol symbol-index",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStyle {
    pub trend: Trend,
    pub emphasis: Emphasis,
}

pub fn entry_style(change: f64, kind: TickerKind) -> EntryStyle {
    EntryStyle {
        trend: if change >= 0.0 { Trend::Up } else { Trend::Down },
        emphasis: match kind {
            TickerKind::Index => Emphasis::Index,
            TickerKind::Stock | TickerKind::Crypto => Emphasis::Standard,
        },
    }
}

/// One rendered item of the strip.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub symbol: String,
    pub name: String,
    pub change: String,
    pub symbol_class: &'static str,
    pub change_class: &'static str,
    pub arrow: &'static str,
}

impl ItemView {
    fn from_entry(entry: &TickerEntry) -> Self {
        let style = entry_style(entry.change_percent, entry.kind);
        Self {
            symbol: entry.symbol.clone(),
            name: entry.name.clone().unwrap_or_default(),
            change: format_change(entry.change_percent),
            symbol_class: style.emphasis.css_class(),
            change_class: style.trend.css_class(),
            arrow: style.trend.arrow(),
        }
    }
}

/// Everything the templates need to draw the strip.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerView {
    pub title: String,
    pub badge_label: &'static str,
    pub badge_class: &'static str,
    pub pulse: bool,
    pub flash: bool,
    pub flash_ms: u64,
    pub revision: u64,
    pub updated_label: String,
    pub show_updated: bool,
    pub items: Vec<ItemView>,
}

impl TickerView {
    pub fn build(title: &str, snapshot: &TickerSnapshot, now: DateTime<Utc>) -> Self {
        let badge = badge(snapshot.is_live);
        let updated_label = time_ago(snapshot.last_updated_at, now);

        Self {
            title: title.to_string(),
            badge_label: badge.label(),
            badge_class: badge.css_class(),
            pulse: badge.pulses(),
            flash: snapshot.flash_active,
            flash_ms: DEFAULT_FLASH_DURATION.as_millis() as u64,
            revision: snapshot.revision,
            show_updated: !updated_label.is_empty(),
            updated_label,
            items: snapshot.entries.iter().map(ItemView::from_entry).collect(),
        }
    }

    /// Flashes the strip when live data has moved past the revision the
    /// client last rendered, however late the client asks.
    pub fn seen_revision(mut self, seen: Option<u64>) -> Self {
        if self.pulse && seen.is_some_and(|seen| seen != self.revision) {
            self.flash = true;
        }
        self
    }

    pub fn flash_for(mut self, duration: Duration) -> Self {
        self.flash_ms = duration.as_millis() as u64;
        self
    }

    pub fn strip_class(&self) -> &'static str {
        if self.flash {
            "ticker ticker-flash"
        } else {
            "ticker"
        }
    }
}
