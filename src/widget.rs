use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::scheduler::{self, ScheduleHandle};
use crate::source::{SourceError, TickerSource};
use crate::ticker::TickerEntry;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(60_000);
pub const DEFAULT_FLASH_DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetSettings {
    pub refresh_interval: Duration,
    pub flash_duration: Duration,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            flash_duration: DEFAULT_FLASH_DURATION,
        }
    }
}

impl From<&Config> for WidgetSettings {
    fn from(config: &Config) -> Self {
        Self {
            refresh_interval: Duration::from_millis(config.refresh_interval_ms),
            flash_duration: Duration::from_millis(config.flash_ms),
        }
    }
}

/// What a single refresh did to the displayed state.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The entries were replaced by a fresh result of `rows` rows.
    Replaced { rows: usize },
    /// The fetch produced nothing usable; the current entries stay.
    Kept(SourceError),
    /// A result issued after this one has already been applied.
    Superseded,
    /// The widget was inactive, or deactivated while the fetch was in flight.
    Detached,
}

/// Point-in-time copy of what the widget displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSnapshot {
    pub entries: Vec<TickerEntry>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub is_live: bool,
    pub flash_active: bool,
    /// Changes every time a result replaces the entries.
    pub revision: u64,
}

/// Displayed state of the widget, without any scheduling.
///
/// The entries are always either the whole fallback set or the whole result
/// of one successful fetch.
#[derive(Debug, Clone)]
pub struct TickerState {
    entries: Vec<TickerEntry>,
    last_updated_at: Option<DateTime<Utc>>,
    is_live: bool,
    flash_until: Option<Instant>,
    applied_seq: u64,
}

impl TickerState {
    pub fn new(fallback: Vec<TickerEntry>) -> Self {
        Self {
            entries: fallback,
            last_updated_at: None,
            is_live: false,
            flash_until: None,
            applied_seq: 0,
        }
    }

    pub fn entries(&self) -> &[TickerEntry] {
        &self.entries
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated_at
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn revision(&self) -> u64 {
        self.applied_seq
    }

    pub fn flash_active(&self, now: Instant) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }

    /// Applies the result of the fetch issued as `seq`.
    ///
    /// Errors and empty results leave the state untouched. A successful result
    /// replaces the entries wholesale unless a later-issued result is already
    /// showing.
    pub fn apply(
        &mut self,
        seq: u64,
        result: Result<Vec<TickerEntry>, SourceError>,
        now: Instant,
        flash: Duration,
    ) -> RefreshOutcome {
        let entries = match result {
            Ok(entries) if entries.is_empty() => return RefreshOutcome::Kept(SourceError::Empty),
            Ok(entries) => entries,
            Err(e) => return RefreshOutcome::Kept(e),
        };

        if seq <= self.applied_seq {
            return RefreshOutcome::Superseded;
        }

        let rows = entries.len();
        self.last_updated_at = entries[0].updated_at;
        self.entries = entries;
        self.is_live = true;
        self.flash_until = Some(now + flash);
        self.applied_seq = seq;

        RefreshOutcome::Replaced { rows }
    }

    pub fn snapshot(&self, now: Instant) -> TickerSnapshot {
        TickerSnapshot {
            entries: self.entries.clone(),
            last_updated_at: self.last_updated_at,
            is_live: self.is_live,
            flash_active: self.flash_active(now),
            revision: self.applied_seq,
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    epoch: u64,
    active: bool,
    schedule: Option<ScheduleHandle>,
}

/// Live-refreshing ticker strip.
///
/// Activation shows the fallback set, refreshes immediately and then every
/// `refresh_interval`. Deactivation stops the schedule; fetches still in
/// flight complete without touching state.
pub struct TickerWidget {
    source: Arc<dyn TickerSource>,
    fallback: Vec<TickerEntry>,
    settings: WidgetSettings,
    state: RwLock<TickerState>,
    lifecycle: Mutex<Lifecycle>,
    issued: AtomicU64,
}

impl TickerWidget {
    pub fn new(
        source: Arc<dyn TickerSource>,
        fallback: Vec<TickerEntry>,
        settings: WidgetSettings,
    ) -> Self {
        let settings = if settings.refresh_interval.is_zero() {
            warn!(
                "Refresh interval must be positive, using {:?}",
                DEFAULT_REFRESH_INTERVAL
            );
            WidgetSettings {
                refresh_interval: DEFAULT_REFRESH_INTERVAL,
                ..settings
            }
        } else {
            settings
        };

        Self {
            source,
            state: RwLock::new(TickerState::new(fallback.clone())),
            fallback,
            settings,
            lifecycle: Mutex::new(Lifecycle::default()),
            issued: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> WidgetSettings {
        self.settings
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().active
    }

    /// Resets to the fallback set and starts the refresh schedule.
    /// Does nothing if the widget is already active.
    pub fn activate(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.active {
            return;
        }

        lifecycle.epoch += 1;
        lifecycle.active = true;
        *self.state.write() = TickerState::new(self.fallback.clone());

        let widget: Weak<Self> = Arc::downgrade(self);
        lifecycle.schedule = Some(scheduler::start(self.settings.refresh_interval, move || {
            let widget = widget.clone();
            async move {
                if let Some(widget) = widget.upgrade() {
                    widget.refresh().await;
                }
            }
        }));

        info!(
            "Ticker widget activated, refreshing every {:?}",
            self.settings.refresh_interval
        );
    }

    /// Stops the refresh schedule. Safe to call any number of times.
    pub fn deactivate(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Some(mut schedule) = lifecycle.schedule.take() {
            schedule.stop();
        }
        if lifecycle.active {
            lifecycle.active = false;
            info!("Ticker widget deactivated");
        }
    }

    /// Fetches from the source once and applies the result.
    pub async fn refresh(&self) -> RefreshOutcome {
        let epoch = {
            let lifecycle = self.lifecycle.lock();
            if !lifecycle.active {
                return RefreshOutcome::Detached;
            }
            lifecycle.epoch
        };
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.source.fetch_tickers().await;

        let lifecycle = self.lifecycle.lock();
        if !lifecycle.active || lifecycle.epoch != epoch {
            debug!("Dropping ticker refresh #{} from a closed activation", seq);
            return RefreshOutcome::Detached;
        }

        let outcome = self.state.write().apply(
            seq,
            result,
            Instant::now(),
            self.settings.flash_duration,
        );
        drop(lifecycle);

        match &outcome {
            RefreshOutcome::Replaced { rows } => {
                info!("Ticker refresh #{} replaced entries with {} rows", seq, rows)
            }
            RefreshOutcome::Kept(e) => {
                warn!("Ticker refresh #{} kept current entries: {}", seq, e)
            }
            RefreshOutcome::Superseded => {
                debug!("Ticker refresh #{} superseded by a newer result", seq)
            }
            RefreshOutcome::Detached => {}
        }

        outcome
    }

    pub fn snapshot(&self) -> TickerSnapshot {
        self.state.read().snapshot(Instant::now())
    }
}

impl Drop for TickerWidget {
    fn drop(&mut self) {
        self.deactivate();
    }
}
