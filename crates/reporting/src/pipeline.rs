//! Report generation pipeline: read → classify → aggregate → render → save
//! → (optionally) patch the master workbook.

use crate::aggregate::{aggregate, CategoryTable};
use crate::classify::{classify, Decision};
use crate::ingest::{read_csv, SourceFile};
use crate::patch::patch_target;
use crate::render::{render, RenderedReport, SectionData};
use crate::xlsx::{patch_workbook, save_sheet, PatchOutcome};
use campaign_core::variant::MappingSet;
use campaign_core::{AppConfig, ReportError, ReportResult, ReportVariant, VariantRegistry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// One report generation request.
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub report_type: String,
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Master workbook to merge one week into.
    pub master: Option<PathBuf>,
    /// Week selector token, e.g. `"03"`.
    pub replace_week: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub records: usize,
    pub skipped_rows: usize,
    pub mapping: String,
    pub mapping_source: Decision,
    /// `None` when the file was not placed in any section.
    pub section: Option<String>,
    pub section_source: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub report_type: String,
    pub records: usize,
    pub skipped_rows: usize,
    pub files: Vec<FileSummary>,
    pub sections: Vec<String>,
    pub blocks: usize,
    pub output: PathBuf,
    pub patch: Option<PatchOutcome>,
}

impl ReportJob {
    /// Reject option combinations the variant cannot honor, before any file
    /// is read.
    pub fn check(&self, variant: &ReportVariant) -> ReportResult<()> {
        if self.inputs.is_empty() {
            return Err(ReportError::Validation("no input files given".into()));
        }
        if !variant.multi_file && self.inputs.len() > 1 {
            return Err(ReportError::Validation(format!(
                "report type {} takes a single input file, got {}",
                variant.name,
                self.inputs.len()
            )));
        }
        match (&self.master, &self.replace_week) {
            (Some(_), Some(selector)) => patch_target(variant, selector).map(|_| ()),
            (None, None) => Ok(()),
            _ => Err(ReportError::Validation(
                "an existing workbook and a week to replace must be given together".into(),
            )),
        }
    }
}

/// Classify, aggregate and render already-read sources. Files landing in
/// the same section are summed bucket by bucket.
pub fn build_report(
    variant: &ReportVariant,
    sources: &[SourceFile],
) -> ReportResult<(RenderedReport, Vec<FileSummary>)> {
    let mut by_section: BTreeMap<&str, (&MappingSet, CategoryTable)> = BTreeMap::new();
    let mut files = Vec::with_capacity(sources.len());

    for source in sources {
        let class = classify(variant, &source.name, &source.records)?;
        files.push(FileSummary {
            name: source.name.clone(),
            records: source.records.len(),
            skipped_rows: source.skipped_rows,
            mapping: class.mapping.name.clone(),
            mapping_source: class.mapping_source,
            section: class.section.map(|s| s.key.clone()),
            section_source: class.section_source,
        });
        let Some(section) = class.section else {
            warn!(file = %source.name, "No report section matches this file, skipped");
            continue;
        };

        let table = aggregate(&source.records, &variant.windows, class.mapping);
        match by_section.get_mut(section.key.as_str()) {
            Some((_, merged)) => merged.merge(&table),
            None => {
                by_section.insert(section.key.as_str(), (class.mapping, table));
            }
        }
    }

    if by_section.is_empty() {
        return Err(ReportError::Validation(format!(
            "none of the {} input file(s) matched a section of {}",
            sources.len(),
            variant.name
        )));
    }

    let sections: Vec<SectionData> = variant
        .sections
        .iter()
        .filter_map(|section| {
            let (mapping, table) = by_section.remove(section.key.as_str())?;
            Some(SectionData {
                section,
                mapping,
                table,
            })
        })
        .collect();
    let rendered = render(variant, &sections)?;
    Ok((rendered, files))
}

pub fn generate_report(
    registry: &VariantRegistry,
    job: &ReportJob,
    config: &AppConfig,
) -> ReportResult<ReportSummary> {
    let variant = registry.get(&job.report_type)?;
    job.check(variant)?;

    let sources = job
        .inputs
        .iter()
        .map(|path| read_csv(path))
        .collect::<ReportResult<Vec<_>>>()?;
    let (rendered, files) = build_report(variant, &sources)?;
    save_sheet(&rendered.sheet, &job.output)?;

    let patch = match (&job.master, &job.replace_week) {
        (Some(master), Some(selector)) => Some(patch_workbook(
            master,
            &rendered,
            variant,
            selector,
            &config.patch.output_prefix,
        )?),
        _ => None,
    };

    let summary = ReportSummary {
        report_type: variant.name.clone(),
        records: sources.iter().map(|s| s.records.len()).sum(),
        skipped_rows: sources.iter().map(|s| s.skipped_rows).sum(),
        sections: files
            .iter()
            .filter_map(|f| f.section.clone())
            .fold(Vec::new(), |mut acc, key| {
                if !acc.contains(&key) {
                    acc.push(key);
                }
                acc
            }),
        files,
        blocks: rendered.blocks.len(),
        output: job.output.clone(),
        patch,
    };
    info!(
        report_type = %summary.report_type,
        records = summary.records,
        skipped_rows = summary.skipped_rows,
        blocks = summary.blocks,
        output = %summary.output.display(),
        "Report generated"
    );
    Ok(summary)
}
