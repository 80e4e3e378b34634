use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Calendar boundaries a trigger can watch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Second changed.
    Second,
    /// Minute changed.
    Minute,
    /// Hour changed.
    Hour,
    /// Calendar day changed.
    Day,
    /// ISO week changed.
    Week,
    /// Month changed.
    Month,
    /// Year changed.
    Year,
}

impl Boundary {
    /// Key of the period containing `ts`. Two timestamps share a key exactly
    /// when no boundary of this kind lies between them.
    pub fn key(self, ts: OffsetDateTime) -> i64 {
        let year = i64::from(ts.year());
        let day = year * 1000 + i64::from(ts.ordinal());
        let hour = day * 24 + i64::from(ts.hour());
        let minute = hour * 60 + i64::from(ts.minute());
        match self {
            Self::Second => minute * 60 + i64::from(ts.second()),
            Self::Minute => minute,
            Self::Hour => hour,
            Self::Day => day,
            Self::Week => {
                let (iso_year, week, _) = ts.to_iso_week_date();
                i64::from(iso_year) * 100 + i64::from(week)
            }
            Self::Month => year * 100 + i64::from(u8::from(ts.month())),
            Self::Year => year,
        }
    }
}

/// When a processor fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Resolved per task when the target is built.
    #[default]
    Auto,
    /// Every event.
    Always,
    /// Every N events.
    EveryEvents(u64),
    /// Every time N payload octets have accumulated.
    EveryOctets(u64),
    /// On the first event past a calendar boundary.
    Boundary(Boundary),
}

/// Running counters behind a [`Frequency`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerState {
    /// Events or octets seen since the last fire.
    pub current: u64,
    /// Boundary key recorded at the last fire.
    pub previous: Option<i64>,
}

impl TriggerState {
    /// Account for one event and report whether `frequency` fires for it.
    ///
    /// Counters reset to 0 when they fire. A boundary trigger records the
    /// first key it sees without firing.
    pub fn observe(&mut self, frequency: Frequency, ts: OffsetDateTime, octets: usize) -> bool {
        match frequency {
            Frequency::Auto | Frequency::Always => true,
            Frequency::EveryEvents(n) => self.count(1, n),
            Frequency::EveryOctets(n) => self.count(octets as u64, n),
            Frequency::Boundary(boundary) => {
                let key = boundary.key(ts);
                match self.previous.replace(key) {
                    Some(previous) => previous != key,
                    None => false,
                }
            }
        }
    }

    fn count(&mut self, amount: u64, threshold: u64) -> bool {
        self.current = self.current.saturating_add(amount);
        if self.current >= threshold.max(1) {
            self.current = 0;
            true
        } else {
            false
        }
    }
}
