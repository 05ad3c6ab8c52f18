use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

/// One row of campaign event data, as exported by the messaging platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Timezone-naive instant; offsets are dropped at ingestion.
    pub timestamp: NaiveDateTime,
    pub template_id: String,
    pub template_name: String,
    pub campaign_name: String,
    pub counters: MetricCounters,
    /// Carried through from the export but never aggregated.
    #[serde(default)]
    pub bounced: u64,
}

/// The six additive funnel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricCounters {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub converted: u64,
    pub unsubscribed: u64,
}

impl MetricCounters {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Sent => self.sent,
            Counter::Delivered => self.delivered,
            Counter::Opened => self.opened,
            Counter::Clicked => self.clicked,
            Counter::Converted => self.converted,
            Counter::Unsubscribed => self.unsubscribed,
        }
    }
}

impl AddAssign for MetricCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.sent += rhs.sent;
        self.delivered += rhs.delivered;
        self.opened += rhs.opened;
        self.clicked += rhs.clicked;
        self.converted += rhs.converted;
        self.unsubscribed += rhs.unsubscribed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Sent,
    Delivered,
    Opened,
    Clicked,
    Converted,
    Unsubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ratio {
    Delivered,
    Open,
    Click,
    Conversion,
}

/// A reportable metric: either a raw counter or a derived percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum Metric {
    Count(Counter),
    Percent(Ratio),
}

impl Metric {
    pub fn is_ratio(&self) -> bool {
        matches!(self, Metric::Percent(_))
    }
}

/// A labeled, inclusive date range. A record belongs to the window when its
/// timestamp lies between `start` 00:00:00 and `end` 23:59:59.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn first_instant(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    pub fn last_instant(&self) -> NaiveDateTime {
        // 23:59:59 always exists; the fallback is unreachable.
        self.end
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| self.end.and_time(NaiveTime::MIN))
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.first_instant() && at <= self.last_instant()
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Label grouping one or more template names into one report block,
/// e.g. `10min`, `1h`, `12d`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimingCategory(pub String);

impl TimingCategory {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Delay implied by the label, in minutes. `None` when the label does not
    /// follow the `<number><unit>` convention.
    pub fn delay_minutes(&self) -> Option<u64> {
        let label = self.0.trim().to_ascii_lowercase();
        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        let amount: u64 = digits.parse().ok()?;
        let factor = match label[digits.len()..].trim() {
            "m" | "min" | "mins" | "minute" | "minutes" => 1,
            "h" | "hour" | "hours" => 60,
            "d" | "day" | "days" => 60 * 24,
            "w" | "week" | "weeks" => 60 * 24 * 7,
            _ => return None,
        };
        Some(amount * factor)
    }

    /// Ordering used when rendering: by implied delay, unparseable labels
    /// last, ties broken by the label itself.
    pub fn sort_key(&self) -> (u64, &str) {
        (self.delay_minutes().unwrap_or(u64::MAX), self.as_str())
    }
}

impl fmt::Display for TimingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimingCategory {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}
