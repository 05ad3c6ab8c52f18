//! Spreadsheet patch engine.
//!
//! Locates the rendered (campaign, label) blocks inside a master sheet and
//! copies one week's values into the master's column for that week. Master
//! cells holding formulas are never touched; column formatting is copied
//! from a reference column into the target column according to the
//! variant's `FormatPolicy`.

use crate::render::RenderedReport;
use crate::sheet::{Literal, Sheet, WriteOutcome};
use campaign_core::cell::column_index;
use campaign_core::variant::{FormatPolicy, PatchSpec};
use campaign_core::{CellRef, ReportError, ReportResult, ReportVariant};
use serde::Serialize;
use tracing::{debug, info, warn};

// ─── Label matching ─────────────────────────────────────────────────────────

/// Case-insensitive containment in either direction. Empty labels never match.
pub fn labels_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn labels_equal(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Outcome of locating one rendered block in the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LabelMatch {
    NoMatch,
    Unique { row: u32 },
    /// Several master rows qualify; the first in scan order is chosen.
    /// `exact` is the first candidate whose label equals the wanted one.
    Ambiguous {
        chosen: u32,
        candidates: Vec<u32>,
        exact: Option<u32>,
    },
}

impl LabelMatch {
    pub fn row(&self) -> Option<u32> {
        match self {
            LabelMatch::NoMatch => None,
            LabelMatch::Unique { row } => Some(*row),
            LabelMatch::Ambiguous { chosen, .. } => Some(*chosen),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, LabelMatch::Ambiguous { .. })
    }
}

// ─── Master index ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub row: u32,
    /// Text found in the label columns, in column order.
    pub labels: Vec<String>,
}

/// Rows following one campaign label, up to the search window or the next
/// campaign label.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSection {
    pub campaign: String,
    pub row: u32,
    pub rows: Vec<LabeledRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MasterIndex {
    sections: Vec<MasterSection>,
}

impl MasterIndex {
    /// Scan `sheet` top to bottom. Only text cells count as labels.
    pub fn build<S: Sheet + ?Sized>(
        sheet: &S,
        campaign_column: u32,
        label_columns: &[u32],
        search_window: u32,
    ) -> Self {
        let last = sheet.max_row();
        let mut sections = Vec::new();

        for start in 1..=last {
            let Some(campaign) = sheet.text(CellRef::new(start, campaign_column)) else {
                continue;
            };
            let end = start.saturating_add(search_window).min(last + 1);
            let mut rows = Vec::new();
            for row in start..end {
                if row > start && sheet.text(CellRef::new(row, campaign_column)).is_some() {
                    break;
                }
                let labels: Vec<String> = label_columns
                    .iter()
                    .filter_map(|col| sheet.text(CellRef::new(row, *col)))
                    .collect();
                if !labels.is_empty() {
                    rows.push(LabeledRow { row, labels });
                }
            }
            sections.push(MasterSection {
                campaign,
                row: start,
                rows,
            });
        }

        debug!(sections = sections.len(), rows = last, "Indexed master sheet");
        Self { sections }
    }

    pub fn sections(&self) -> &[MasterSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Find the block for `label` inside sections whose campaign matches
    /// `campaign` (any section when `None`).
    pub fn locate(&self, campaign: Option<&str>, label: &str) -> LabelMatch {
        let mut candidates: Vec<(bool, u32)> = Vec::new();
        let sections = self
            .sections
            .iter()
            .filter(|s| campaign.map_or(true, |c| labels_match(&s.campaign, c)));
        for section in sections {
            for labeled in &section.rows {
                if candidates.iter().any(|(_, row)| *row == labeled.row) {
                    continue;
                }
                if labeled.labels.iter().any(|l| labels_match(l, label)) {
                    let exact = labeled.labels.iter().any(|l| labels_equal(l, label));
                    candidates.push((exact, labeled.row));
                }
            }
        }

        match candidates.len() {
            0 => LabelMatch::NoMatch,
            1 => LabelMatch::Unique {
                row: candidates[0].1,
            },
            _ => {
                let exact = candidates.iter().find(|(exact, _)| *exact).map(|(_, row)| *row);
                let rows: Vec<u32> = candidates.iter().map(|(_, row)| *row).collect();
                LabelMatch::Ambiguous {
                    chosen: rows[0],
                    candidates: rows,
                    exact,
                }
            }
        }
    }
}

// ─── Patch ──────────────────────────────────────────────────────────────────

/// One rendered block as the patch engine sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBlock {
    pub campaign: Option<String>,
    /// Label as the master spells it (aliases applied).
    pub label: String,
    pub metric_row: u32,
}

impl SourceBlock {
    pub fn collect(rendered: &RenderedReport, patch: &PatchSpec) -> ReportResult<Vec<Self>> {
        let label_column = column(&patch.source_label_column)?;
        Ok(rendered
            .blocks
            .iter()
            .map(|block| {
                let text = rendered
                    .sheet
                    .text(CellRef::new(block.start_row, label_column))
                    .unwrap_or_else(|| block.category.to_string());
                SourceBlock {
                    campaign: block.campaign.clone(),
                    label: patch.master_label(&text).to_string(),
                    metric_row: block.metric_row,
                }
            })
            .collect())
    }

    fn describe(&self) -> String {
        match &self.campaign {
            Some(campaign) => format!("{campaign} / {}", self.label),
            None => self.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchReport {
    pub sheet: String,
    pub week: usize,
    pub target_column: String,
    pub cells_updated: usize,
    pub formula_cells_kept: usize,
    pub blocks_matched: usize,
    pub ambiguous: usize,
    /// `campaign / label` of each rendered block the master lacks.
    pub unmatched: Vec<String>,
    pub rows_formatted: usize,
}

fn column(letters: &str) -> ReportResult<u32> {
    column_index(letters)
        .ok_or_else(|| ReportError::Validation(format!("invalid column '{letters}'")))
}

/// Copy the reference column's formatting onto the target column for every
/// row of the sheet. Returns the number of rows restyled.
pub fn propagate_format<S: Sheet + ?Sized>(
    sheet: &mut S,
    reference: u32,
    target: u32,
    policy: FormatPolicy,
) -> usize {
    if reference == target {
        return 0;
    }
    let mut formatted = 0;
    for row in 1..=sheet.max_row() {
        let from = CellRef::new(row, reference);
        if policy == FormatPolicy::SkipFormulaCells && sheet.content(from).is_formula() {
            continue;
        }
        if sheet.copy_style(from, CellRef::new(row, target)) {
            formatted += 1;
        }
    }
    formatted
}

/// Resolve the variant's patch settings for a week selector.
pub fn patch_target<'v>(
    variant: &'v ReportVariant,
    selector: &str,
) -> ReportResult<(&'v PatchSpec, usize, &'v str)> {
    let patch = variant.patch.as_ref().ok_or_else(|| {
        ReportError::Validation(format!("report type {} does not support patching", variant.name))
    })?;
    let target = patch.target(selector).ok_or_else(|| ReportError::UnknownWeek {
        variant: variant.name.clone(),
        selector: selector.to_string(),
    })?;
    Ok((patch, target.week, target.column.as_str()))
}

/// Merge week `selector` of `rendered` into `master`.
pub fn patch_sheet<S: Sheet + ?Sized>(
    rendered: &RenderedReport,
    master: &mut S,
    variant: &ReportVariant,
    selector: &str,
) -> ReportResult<PatchReport> {
    let (patch, week, target_letters) = patch_target(variant, selector)?;
    let source_letters = variant
        .layout
        .week_columns
        .get(week.wrapping_sub(1))
        .ok_or_else(|| ReportError::Validation(format!("no column for week {week}")))?;
    let source_col = column(source_letters)?;
    let target_col = column(target_letters)?;
    let label_columns = patch
        .label_columns
        .iter()
        .map(|c| column(c))
        .collect::<ReportResult<Vec<_>>>()?;

    let index = MasterIndex::build(
        &*master,
        column(&patch.campaign_column)?,
        &label_columns,
        patch.search_window,
    );
    if index.is_empty() {
        return Err(ReportError::UnmatchedStructure(format!(
            "no campaign labels in column {} of the master sheet",
            patch.campaign_column
        )));
    }

    let mut report = PatchReport {
        sheet: patch.sheet_name.clone(),
        week,
        target_column: target_letters.to_string(),
        ..Default::default()
    };
    report.rows_formatted = propagate_format(
        master,
        column(&patch.reference_column)?,
        target_col,
        patch.format_policy,
    );

    for block in SourceBlock::collect(rendered, patch)? {
        let located = index.locate(block.campaign.as_deref(), &block.label);
        let Some(master_row) = located.row() else {
            warn!(block = %block.describe(), "No matching block in master, skipped");
            report.unmatched.push(block.describe());
            continue;
        };
        if let LabelMatch::Ambiguous { candidates, exact, .. } = &located {
            warn!(
                block = %block.describe(),
                chosen = master_row,
                ?candidates,
                ?exact,
                "Several master rows match"
            );
            report.ambiguous += 1;
        }
        report.blocks_matched += 1;

        for offset in &patch.metric_offsets {
            let source = CellRef::new(block.metric_row, source_col).offset_rows(*offset);
            let Some(value) = Literal::from_content(&rendered.sheet.content(source)) else {
                continue;
            };
            let target = CellRef::new(master_row, target_col).offset_rows(*offset);
            match master.put(target, value) {
                WriteOutcome::Written => report.cells_updated += 1,
                WriteOutcome::FormulaKept => {
                    debug!(cell = %target, "Formula cell left untouched");
                    report.formula_cells_kept += 1;
                }
            }
        }
    }

    info!(
        sheet = %report.sheet,
        week,
        column = %report.target_column,
        cells_updated = report.cells_updated,
        formula_cells_kept = report.formula_cells_kept,
        blocks_matched = report.blocks_matched,
        unmatched = report.unmatched.len(),
        ambiguous = report.ambiguous,
        "Patched master sheet"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::render::{render, SectionData};
    use crate::sheet::{CellContent, CellStyle, MemorySheet};
    use campaign_core::catalog::{ab_report, casino_ret};
    use campaign_core::{MetricCounters, MetricRecord};
    use chrono::NaiveDate;

    fn at(a1: &str) -> CellRef {
        CellRef::parse(a1).unwrap()
    }

    fn col(letters: &str) -> u32 {
        column_index(letters).unwrap()
    }

    fn master(cells: &[(&str, &str)]) -> MemorySheet {
        let mut sheet = MemorySheet::new("WP Chains Sport");
        for (cell, text) in cells {
            sheet.put(at(cell), Literal::from(*text));
        }
        sheet
    }

    fn rendered_casino() -> (campaign_core::ReportVariant, RenderedReport) {
        let variant = casino_ret();
        let records = vec![MetricRecord {
            timestamp: NaiveDate::from_ymd_opt(2025, 12, 30)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            template_id: "1".into(),
            template_name: "[S] 10 min sport basic wp".into(),
            campaign_name: "casino+sport A/B".into(),
            counters: MetricCounters {
                sent: 100,
                delivered: 90,
                opened: 50,
                clicked: 5,
                converted: 0,
                unsubscribed: 1,
            },
            bounced: 0,
        }];
        let mapping = variant.mapping("casinosport").unwrap();
        let table = aggregate(&records, &variant.windows, mapping);
        let rendered = render(
            &variant,
            &[SectionData {
                section: variant.section("casino").unwrap(),
                mapping,
                table,
            }],
        )
        .unwrap();
        (variant, rendered)
    }

    #[test]
    fn test_labels_match_both_directions() {
        assert!(labels_match("Sport Campaign A/B", "campaign a/b"));
        assert!(labels_match("campaign a/b", "Sport Campaign A/B"));
        assert!(!labels_match("inactive 7", "inactive 14"));
        assert!(!labels_match("", "anything"));
        assert!(!labels_match("  ", " "));
    }

    #[test]
    fn test_locate_with_bidirectional_campaign() {
        let sheet = master(&[("B2", "Sport Campaign A/B"), ("C2", "1h"), ("C8", "1d")]);
        let index = MasterIndex::build(&sheet, col("B"), &[col("C")], 100);
        assert_eq!(
            index.locate(Some("campaign a/b"), "1d"),
            LabelMatch::Unique { row: 8 }
        );
        assert_eq!(index.locate(Some("retention"), "1d"), LabelMatch::NoMatch);
        assert_eq!(index.locate(None, "1h"), LabelMatch::Unique { row: 2 });
    }

    #[test]
    fn test_ambiguous_match_takes_first_in_scan_order() {
        let sheet = master(&[("B3", "inactive 7"), ("D3", "Day 10"), ("D11", "Day 1")]);
        let index = MasterIndex::build(&sheet, col("B"), &[col("D")], 100);
        let located = index.locate(Some("inactive 7"), "Day 1");
        assert_eq!(
            located,
            LabelMatch::Ambiguous {
                chosen: 3,
                candidates: vec![3, 11],
                exact: Some(11),
            }
        );
        assert_eq!(located.row(), Some(3));

        let fuzzy = index.locate(Some("inactive 7"), "day");
        assert!(fuzzy.is_ambiguous());
        assert_eq!(fuzzy.row(), Some(3));
        assert!(matches!(fuzzy, LabelMatch::Ambiguous { exact: None, .. }));
    }

    #[test]
    fn test_section_scan_stops_at_next_campaign_and_window() {
        let sheet = master(&[
            ("B1", "alpha"),
            ("C3", "x"),
            ("B5", "beta"),
            ("C7", "y"),
            ("C40", "z"),
        ]);
        let index = MasterIndex::build(&sheet, col("B"), &[col("C")], 10);
        assert_eq!(index.sections().len(), 2);
        assert_eq!(index.locate(Some("alpha"), "y"), LabelMatch::NoMatch);
        assert_eq!(index.locate(Some("beta"), "y"), LabelMatch::Unique { row: 7 });
        assert_eq!(index.locate(Some("beta"), "z"), LabelMatch::NoMatch);
    }

    #[test]
    fn test_patch_copies_week_and_never_touches_formulas() {
        let (variant, rendered) = rendered_casino();
        let mut sheet = master(&[
            ("B3", "casino+sport A/B Reg_No_Dep"),
            ("C3", "10 min"),
            ("C9", "1h"),
        ]);
        sheet.set_formula(at("BF4"), "=BE4*2");

        let report = patch_sheet(&rendered, &mut sheet, &variant, "01").unwrap();

        assert_eq!(sheet.number(at("BF3")), Some(100.0));
        assert_eq!(sheet.content(at("BF4")), CellContent::Formula("BE4*2".into()));
        assert_eq!(sheet.number(at("BF5")), Some(50.0));
        assert_eq!(sheet.number(at("BF7")), Some(1.0));
        // Pct Delivered is not a patched offset
        assert_eq!(sheet.content(at("BF8")), CellContent::Empty);
        assert_eq!(sheet.number(at("BF9")), Some(0.0));

        assert_eq!(report.week, 1);
        assert_eq!(report.target_column, "BF");
        assert_eq!(report.blocks_matched, 2);
        assert_eq!(report.formula_cells_kept, 1);
        assert_eq!(report.cells_updated, 4 + 5);
        assert_eq!(report.unmatched.len(), 6);
        assert!(report.unmatched[0].ends_with("/ 1d"));
    }

    #[test]
    fn test_master_block_outside_the_mapping_keeps_its_values() {
        let (variant, rendered) = rendered_casino();
        let mut sheet = master(&[
            ("B3", "casino+sport A/B Reg_No_Dep"),
            ("C3", "10 min"),
            ("C21", "3d"),
        ]);
        sheet.put(at("BF21"), Literal::Number(777.0));

        let report = patch_sheet(&rendered, &mut sheet, &variant, "01").unwrap();

        assert_eq!(sheet.number(at("BF21")), Some(777.0));
        assert_eq!(sheet.number(at("BF3")), Some(100.0));
        assert_eq!(report.blocks_matched, 1);
        assert!(!report.unmatched.iter().any(|b| b.ends_with("/ 3d")));
    }

    #[test]
    fn test_other_weeks_left_alone() {
        let (variant, rendered) = rendered_casino();
        let mut sheet = master(&[("B3", "casino+sport A/B Reg_No_Dep"), ("C3", "10 min")]);
        sheet.put(at("BF3"), Literal::Number(7.0));
        let report = patch_sheet(&rendered, &mut sheet, &variant, "02").unwrap();
        assert_eq!(report.target_column, "BE");
        assert_eq!(sheet.number(at("BE3")), Some(0.0));
        assert_eq!(sheet.number(at("BF3")), Some(7.0));
    }

    #[test]
    fn test_format_policy() {
        let styled = || {
            let mut sheet = MemorySheet::new("m");
            for row in 1..=3 {
                sheet.set_style(CellRef::new(row, col("BE")), CellStyle::bold());
            }
            sheet.set_formula(at("BE2"), "=BD2");
            sheet
        };

        let mut all = styled();
        assert_eq!(propagate_format(&mut all, col("BE"), col("BF"), FormatPolicy::AllCells), 3);
        assert!(all.style(at("BF2")).is_some());

        let mut skip = styled();
        assert_eq!(
            propagate_format(&mut skip, col("BE"), col("BF"), FormatPolicy::SkipFormulaCells),
            2
        );
        assert!(skip.style(at("BF2")).is_none());

        assert_eq!(propagate_format(&mut skip, col("BE"), col("BE"), FormatPolicy::AllCells), 0);
    }

    #[test]
    fn test_unknown_week_and_unpatchable_variant() {
        let (variant, rendered) = rendered_casino();
        let mut sheet = master(&[("B3", "casino+sport A/B Reg_No_Dep")]);
        assert!(matches!(
            patch_sheet(&rendered, &mut sheet, &variant, "09"),
            Err(ReportError::UnknownWeek { .. })
        ));
        assert!(matches!(
            patch_sheet(&rendered, &mut sheet, &ab_report(), "01"),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn test_master_without_campaigns_is_unmatched_structure() {
        let (variant, rendered) = rendered_casino();
        let mut sheet = master(&[("C3", "10 min")]);
        assert!(matches!(
            patch_sheet(&rendered, &mut sheet, &variant, "01"),
            Err(ReportError::UnmatchedStructure(_))
        ));
    }
}
