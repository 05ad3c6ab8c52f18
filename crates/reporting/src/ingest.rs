//! CSV ingestion: reads exported campaign event rows into [`MetricRecord`]s.
//!
//! Missing columns fail the whole file; a row that cannot be converted is
//! skipped with a warning and counted.

use campaign_core::{MetricCounters, MetricRecord, ReportError, ReportResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const REQUIRED_COLUMNS: [&str; 10] = [
    "timestamp",
    "template_id",
    "template_name",
    "campaign_name",
    "sent",
    "delivered",
    "opened",
    "clicked",
    "converted",
    "unsubscribed",
];

/// Records read from one input file, keyed by the file's name.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub records: Vec<MetricRecord>,
    pub skipped_rows: usize,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    timestamp: String,
    template_id: String,
    template_name: String,
    campaign_name: String,
    #[serde(deserialize_with = "count")]
    sent: u64,
    #[serde(deserialize_with = "count")]
    delivered: u64,
    #[serde(deserialize_with = "count")]
    opened: u64,
    #[serde(deserialize_with = "count")]
    clicked: u64,
    #[serde(deserialize_with = "count")]
    converted: u64,
    #[serde(deserialize_with = "count")]
    unsubscribed: u64,
    #[serde(default, deserialize_with = "count")]
    bounced: u64,
}

/// Non-negative integer counter; integral floats such as `100.0` are
/// accepted since some exports write counters that way.
fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return Some(value);
    }
    let value: f64 = raw.parse().ok()?;
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64)
        .then_some(value as u64)
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_count(&raw).ok_or_else(|| D::Error::custom(format!("invalid counter '{raw}'")))
}

impl RawRow {
    fn into_record(self) -> Option<MetricRecord> {
        Some(MetricRecord {
            timestamp: parse_timestamp(&self.timestamp)?,
            template_id: self.template_id,
            template_name: self.template_name,
            campaign_name: self.campaign_name,
            counters: MetricCounters {
                sent: self.sent,
                delivered: self.delivered,
                opened: self.opened,
                clicked: self.clicked,
                converted: self.converted,
                unsubscribed: self.unsubscribed,
            },
            bounced: self.bounced,
        })
    }
}

pub fn read_csv(path: &Path) -> ReportResult<SourceFile> {
    if !path.exists() {
        return Err(ReportError::MissingFile(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(file = %path.display(), "Reading CSV file");
    read_records(&name, File::open(path)?)
}

/// Parse CSV content from any reader. `name` identifies the source in logs
/// and in variant classification.
pub fn read_records<R: Read>(name: &str, reader: R) -> ReportResult<SourceFile> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| ReportError::Csv(format!("{name}: {e}")))?
        .clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    let mut skipped_rows = 0;
    for (i, row) in rdr.deserialize::<RawRow>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        match row {
            Ok(raw) => {
                let stamp = raw.timestamp.clone();
                match raw.into_record() {
                    Some(record) => records.push(record),
                    None => {
                        warn!(file = name, line, timestamp = %stamp, "Skipping row with unparseable timestamp");
                        skipped_rows += 1;
                    }
                }
            }
            Err(e) => {
                warn!(file = name, line, error = %e, "Skipping invalid row");
                skipped_rows += 1;
            }
        }
    }

    info!(
        file = name,
        rows = records.len(),
        skipped = skipped_rows,
        "Loaded campaign records"
    );
    Ok(SourceFile {
        name: name.to_string(),
        records,
        skipped_rows,
    })
}

/// Accepts epoch seconds, RFC 3339 (offset dropped, wall-clock kept) and
/// naive `YYYY-MM-DD[ HH:MM:SS]` forms.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(epoch) = raw.parse::<f64>() {
        if !epoch.is_finite() {
            return None;
        }
        let secs = epoch.floor();
        let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
        return DateTime::from_timestamp(secs as i64, nanos).map(|dt| dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

// ─── Input Summary ──────────────────────────────────────────────────────────

/// A record whose funnel counters are out of order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelViolation {
    pub index: usize,
    pub template_name: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub file: String,
    pub records: usize,
    pub skipped_rows: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub templates: BTreeMap<String, usize>,
    /// Counters summed over every record, regardless of window or mapping.
    pub totals: MetricCounters,
    pub violations: Vec<FunnelViolation>,
}

pub fn date_range(records: &[MetricRecord]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let min = records.iter().map(|r| r.timestamp).min()?;
    let max = records.iter().map(|r| r.timestamp).max()?;
    Some((min, max))
}

pub fn template_counts(records: &[MetricRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.template_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Rows where delivered > sent, opened > delivered or clicked > opened.
/// Reported, never fatal: ratios over such rows simply exceed 100%.
pub fn funnel_violations(records: &[MetricRecord]) -> Vec<FunnelViolation> {
    let mut violations = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let c = &record.counters;
        let checks = [
            (c.delivered > c.sent, "delivered", c.delivered, "sent", c.sent),
            (c.opened > c.delivered, "opened", c.opened, "delivered", c.delivered),
            (c.clicked > c.opened, "clicked", c.clicked, "opened", c.opened),
        ];
        for (broken, lhs, lv, rhs, rv) in checks {
            if broken {
                violations.push(FunnelViolation {
                    index,
                    template_name: record.template_name.clone(),
                    detail: format!("{lhs} ({lv}) > {rhs} ({rv})"),
                });
            }
        }
    }
    debug!(violations = violations.len(), "Checked funnel consistency");
    violations
}

pub fn summarize(source: &SourceFile) -> InputSummary {
    let range = date_range(&source.records);
    InputSummary {
        file: source.name.clone(),
        records: source.records.len(),
        skipped_rows: source.skipped_rows,
        first_timestamp: range.map(|(min, _)| min),
        last_timestamp: range.map(|(_, max)| max),
        templates: template_counts(&source.records),
        totals: source.records.iter().fold(MetricCounters::default(), |mut acc, r| {
            acc += r.counters;
            acc
        }),
        violations: funnel_violations(&source.records),
    }
}
