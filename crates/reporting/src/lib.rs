//! Campaign reporting: CSV ingestion, weekly aggregation, ratio metrics,
//! layout rendering, xlsx export and the master-workbook patch engine.

pub mod aggregate;
pub mod classify;
pub mod ingest;
pub mod patch;
pub mod pipeline;
pub mod ratio;
pub mod render;
pub mod sheet;
pub mod xlsx;

pub use aggregate::{aggregate, CategoryTable};
pub use classify::{classify, Classification};
pub use ingest::{read_csv, SourceFile};
pub use patch::{patch_sheet, LabelMatch, MasterIndex, PatchReport};
pub use pipeline::{build_report, generate_report, ReportJob, ReportSummary};
pub use ratio::RatioMetrics;
pub use render::{render, RenderedReport, SectionData};
pub use sheet::{CellContent, Literal, MemorySheet, Sheet};
pub use xlsx::{patch_workbook, save_sheet, PatchOutcome};
