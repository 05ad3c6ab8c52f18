//! Campaign report model: metric records, time windows, timing categories,
//! report variant definitions, configuration and the classified error type.

pub mod catalog;
pub mod cell;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;
pub mod variant;

pub use cell::CellRef;
pub use config::AppConfig;
pub use error::{ReportError, ReportResult};
pub use registry::VariantRegistry;
pub use types::{Counter, Metric, MetricCounters, MetricRecord, Ratio, TimeWindow, TimingCategory};
pub use variant::ReportVariant;
