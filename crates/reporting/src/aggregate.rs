//! Weekly aggregation: sums record counters per (timing category, window).

use campaign_core::variant::MappingSet;
use campaign_core::{MetricCounters, MetricRecord, TimeWindow, TimingCategory};
use std::collections::BTreeMap;
use tracing::debug;

/// Counters for every declared (category, window) pair. A pair no record
/// fell into holds the zero bucket, never a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    windows: Vec<TimeWindow>,
    order: Vec<TimingCategory>,
    rows: BTreeMap<TimingCategory, Vec<MetricCounters>>,
}

impl CategoryTable {
    pub fn empty(categories: Vec<TimingCategory>, windows: &[TimeWindow]) -> Self {
        let rows = categories
            .iter()
            .map(|c| (c.clone(), vec![MetricCounters::default(); windows.len()]))
            .collect();
        Self {
            windows: windows.to_vec(),
            order: categories,
            rows,
        }
    }

    /// Categories in declaration order.
    pub fn categories(&self) -> &[TimingCategory] {
        &self.order
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn contains(&self, category: &TimingCategory) -> bool {
        self.rows.contains_key(category)
    }

    pub fn bucket(&self, category: &TimingCategory, week: usize) -> MetricCounters {
        self.rows
            .get(category)
            .and_then(|weeks| weeks.get(week))
            .copied()
            .unwrap_or_default()
    }

    /// Per-week buckets; all zero for an undeclared category.
    pub fn weeks(&self, category: &TimingCategory) -> Vec<MetricCounters> {
        self.rows
            .get(category)
            .cloned()
            .unwrap_or_else(|| vec![MetricCounters::default(); self.windows.len()])
    }

    pub fn total(&self, category: &TimingCategory) -> MetricCounters {
        let mut total = MetricCounters::default();
        for bucket in self.weeks(category) {
            total += bucket;
        }
        total
    }

    /// At least one counter is non-zero in some week.
    pub fn is_active(&self, category: &TimingCategory) -> bool {
        self.rows
            .get(category)
            .is_some_and(|weeks| weeks.iter().any(|b| !b.is_zero()))
    }

    fn add(&mut self, category: &TimingCategory, week: usize, counters: MetricCounters) {
        if let Some(bucket) = self.rows.get_mut(category).and_then(|w| w.get_mut(week)) {
            *bucket += counters;
        }
    }

    /// Bucket-wise sum of another table over the same windows. Categories
    /// only `other` declares are appended.
    pub fn merge(&mut self, other: &CategoryTable) {
        for category in other.categories() {
            if !self.rows.contains_key(category) {
                self.order.push(category.clone());
                self.rows.insert(
                    category.clone(),
                    vec![MetricCounters::default(); self.windows.len()],
                );
            }
            for (week, bucket) in other.weeks(category).into_iter().enumerate() {
                self.add(category, week, bucket);
            }
        }
    }
}

/// Group `records` into `windows` by the category their template maps to.
/// Records with unmapped templates are dropped silently; input order does
/// not affect the result.
pub fn aggregate(
    records: &[MetricRecord],
    windows: &[TimeWindow],
    mapping: &MappingSet,
) -> CategoryTable {
    let mut table = CategoryTable::empty(mapping.categories(), windows);
    let mut unmapped = 0usize;
    let mut outside = 0usize;

    for record in records {
        let Some(category) = mapping.resolve(&record.template_name) else {
            unmapped += 1;
            continue;
        };
        let mut placed = false;
        for (week, window) in windows.iter().enumerate() {
            if window.contains(record.timestamp) {
                table.add(category, week, record.counters);
                placed = true;
            }
        }
        if !placed {
            outside += 1;
        }
    }

    debug!(
        mapping = %mapping.name,
        records = records.len(),
        unmapped,
        outside_windows = outside,
        "Aggregated records into weekly buckets"
    );
    table
}
