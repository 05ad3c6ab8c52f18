//! Derived percentage metrics and per-cell metric evaluation.

use campaign_core::{Counter, Metric, MetricCounters, Ratio};
use serde::Serialize;

/// Funnel percentages (0–100). A zero denominator yields 0, never NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatioMetrics {
    pub delivered_pct: f64,
    pub open_pct: f64,
    pub click_pct: f64,
    pub conversion_pct: f64,
}

fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

impl RatioMetrics {
    pub fn from_counters(c: &MetricCounters) -> Self {
        Self {
            delivered_pct: percent(c.delivered, c.sent),
            open_pct: percent(c.opened, c.delivered),
            click_pct: percent(c.clicked, c.delivered),
            conversion_pct: percent(c.converted, c.delivered),
        }
    }

    pub fn get(&self, ratio: Ratio) -> f64 {
        match ratio {
            Ratio::Delivered => self.delivered_pct,
            Ratio::Open => self.open_pct,
            Ratio::Click => self.click_pct,
            Ratio::Conversion => self.conversion_pct,
        }
    }
}

/// `95.0` → `"95.00%"`.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Value of one metric for one bucket.
pub fn metric_value(counters: &MetricCounters, metric: Metric) -> f64 {
    match metric {
        Metric::Count(counter) => counters.get(counter) as f64,
        Metric::Percent(ratio) => RatioMetrics::from_counters(counters).get(ratio),
    }
}

/// The "Total" column: counters are summed over all weeks; percentages are
/// averaged over the weeks that sent anything (0 when none did).
pub fn total_value(weeks: &[MetricCounters], metric: Metric) -> f64 {
    match metric {
        Metric::Count(counter) => weeks.iter().map(|w| w.get(counter)).sum::<u64>() as f64,
        Metric::Percent(_) => {
            let active: Vec<f64> = weeks
                .iter()
                .filter(|w| w.get(Counter::Sent) > 0)
                .map(|w| metric_value(w, metric))
                .collect();
            if active.is_empty() {
                0.0
            } else {
                active.iter().sum::<f64>() / active.len() as f64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(sent: u64, delivered: u64, opened: u64, clicked: u64, converted: u64) -> MetricCounters {
        MetricCounters {
            sent,
            delivered,
            opened,
            clicked,
            converted,
            unsubscribed: 0,
        }
    }

    #[test]
    fn test_ratios() {
        let r = RatioMetrics::from_counters(&counters(200, 100, 50, 10, 5));
        assert!((r.delivered_pct - 50.0).abs() < f64::EPSILON);
        assert!((r.open_pct - 50.0).abs() < f64::EPSILON);
        assert!((r.click_pct - 10.0).abs() < f64::EPSILON);
        assert!((r.conversion_pct - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_denominators() {
        let r = RatioMetrics::from_counters(&counters(0, 0, 0, 0, 0));
        assert_eq!(r, RatioMetrics::default());

        let r = RatioMetrics::from_counters(&counters(10, 0, 3, 1, 1));
        assert_eq!(r.delivered_pct, 0.0);
        assert_eq!(r.open_pct, 0.0);
        assert_eq!(r.click_pct, 0.0);
        assert!(!r.open_pct.is_nan());
    }

    #[test]
    fn test_inconsistent_funnel_exceeds_hundred() {
        let r = RatioMetrics::from_counters(&counters(10, 20, 0, 0, 0));
        assert!((r.delivered_pct - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(95.0), "95.00%");
        assert_eq!(format_percent(2.0 / 3.0 * 100.0), "66.67%");
    }

    #[test]
    fn test_total_sums_counters_and_averages_active_ratios() {
        let weeks = [
            counters(100, 95, 50, 0, 0),
            counters(50, 40, 10, 0, 0),
            counters(0, 0, 0, 0, 0),
        ];
        assert_eq!(total_value(&weeks, Metric::Count(Counter::Sent)), 150.0);
        let delivered = total_value(&weeks, Metric::Percent(Ratio::Delivered));
        assert!((delivered - 87.5).abs() < 1e-9);
    }

    #[test]
    fn test_total_ratio_without_activity_is_zero() {
        let weeks = [counters(0, 0, 0, 0, 0), counters(0, 0, 0, 0, 0)];
        assert_eq!(total_value(&weeks, Metric::Percent(Ratio::Open)), 0.0);
    }
}
