//! Layout renderer: places headers, block labels, weekly values and totals
//! at the coordinates a variant's layout declares.

use crate::aggregate::CategoryTable;
use crate::ratio::{metric_value, total_value};
use crate::sheet::{CellStyle, Literal, MemorySheet, Sheet};
use campaign_core::cell::column_index;
use campaign_core::variant::{MappingSet, Placement, SectionSpec, SheetLayout};
use campaign_core::{CellRef, ReportError, ReportResult, ReportVariant, TimingCategory};
use serde::Serialize;
use tracing::{debug, warn};

/// Number format applied to percentage cells.
pub const RATIO_FORMAT: &str = "0.00";

/// Aggregated data destined for one section of the sheet.
#[derive(Debug, Clone)]
pub struct SectionData<'a> {
    pub section: &'a SectionSpec,
    /// Supplies template names for template-labelled blocks.
    pub mapping: &'a MappingSet,
    pub table: CategoryTable,
}

/// Where one (section, category) block landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBlock {
    pub section: String,
    pub campaign: Option<String>,
    pub category: TimingCategory,
    /// Row carrying the block's labels.
    pub start_row: u32,
    /// Row of the first metric value.
    pub metric_row: u32,
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub sheet: MemorySheet,
    pub blocks: Vec<RenderedBlock>,
}

impl RenderedReport {
    pub fn block(&self, section: &str, category: &str) -> Option<&RenderedBlock> {
        self.blocks
            .iter()
            .find(|b| b.section == section && b.category.as_str() == category)
    }
}

fn column(layout_name: &str, letters: &str) -> ReportResult<u32> {
    column_index(letters).ok_or_else(|| {
        ReportError::Validation(format!("{layout_name}: invalid column '{letters}'"))
    })
}

fn cell(layout_name: &str, a1: &str) -> ReportResult<CellRef> {
    CellRef::parse(a1)
        .ok_or_else(|| ReportError::Validation(format!("{layout_name}: invalid cell '{a1}'")))
}

struct Columns {
    weeks: Vec<u32>,
    total: Option<u32>,
    metric_label: Option<u32>,
    campaign: u32,
    category: Option<u32>,
    template: Option<u32>,
    constants: Vec<(u32, String)>,
}

impl Columns {
    fn resolve(layout: &SheetLayout) -> ReportResult<Self> {
        let name = layout.sheet_title.as_str();
        let optional = |c: &Option<String>| c.as_deref().map(|c| column(name, c)).transpose();
        Ok(Self {
            weeks: layout
                .week_columns
                .iter()
                .map(|c| column(name, c))
                .collect::<ReportResult<_>>()?,
            total: optional(&layout.total_column)?,
            metric_label: optional(&layout.metric_label_column)?,
            campaign: column(name, &layout.campaign_column)?,
            category: optional(&layout.block_labels.category_column)?,
            template: optional(&layout.block_labels.template_column)?,
            constants: layout
                .block_labels
                .constants
                .iter()
                .map(|(c, text)| Ok((column(name, c)?, text.clone())))
                .collect::<ReportResult<_>>()?,
        })
    }
}

// ─── Renderer ───────────────────────────────────────────────────────────────

struct Renderer<'v> {
    variant: &'v ReportVariant,
    columns: Columns,
    sheet: MemorySheet,
    blocks: Vec<RenderedBlock>,
}

impl<'v> Renderer<'v> {
    fn write_text(&mut self, at: CellRef, text: &str, style: Option<CellStyle>) {
        self.sheet.put(at, Literal::from(text));
        if let Some(style) = style {
            self.sheet.set_style(at, style);
        }
    }

    fn write_header(&mut self) -> ReportResult<()> {
        let variant = self.variant;
        let layout = &variant.layout;
        let title = layout.sheet_title.as_str();

        for banner in &layout.banners {
            if !self.sheet.merge(&banner.cell, &banner.text) {
                return Err(ReportError::Validation(format!(
                    "{title}: invalid range '{}'",
                    banner.cell
                )));
            }
            if let Some((first, _)) = campaign_core::cell::parse_range(&banner.cell) {
                self.sheet.set_style(first, CellStyle::header());
            }
        }
        for label in &layout.labels {
            let at = cell(title, &label.cell)?;
            self.write_text(at, &label.text, Some(CellStyle::bold()));
        }

        let header_row = layout.header_row;
        for (i, window) in variant.windows.iter().enumerate() {
            let Some(&col) = self.columns.weeks.get(i) else {
                continue;
            };
            let text = layout.week_header.format(i, window);
            self.write_text(CellRef::new(header_row, col), &text, Some(CellStyle::header()));
        }
        if let Some(col) = self.columns.total {
            self.write_text(CellRef::new(header_row, col), "Total", Some(CellStyle::header()));
        }
        for (letters, width) in &layout.column_widths {
            self.sheet.set_column_width(column(title, letters)?, *width);
        }
        Ok(())
    }

    /// Row positions for the section's blocks, in render order.
    fn placements(&self, data: &SectionData<'_>, cursor: u32) -> Vec<(TimingCategory, u32)> {
        let layout = &self.variant.layout;
        match &layout.placement {
            Placement::Fixed { blocks } => {
                let placed: Vec<(TimingCategory, u32)> = blocks
                    .iter()
                    .filter(|b| b.section == data.section.key && data.table.contains(&b.category))
                    .map(|b| (b.category.clone(), b.start_row))
                    .collect();
                for category in data.table.categories() {
                    if data.table.is_active(category) && !placed.iter().any(|(c, _)| c == category) {
                        warn!(
                            section = %data.section.key,
                            category = %category,
                            "Category has no block in this section, data not rendered"
                        );
                    }
                }
                placed
            }
            Placement::Flow {
                skip_inactive,
                gap_rows,
            } => {
                let mut categories: Vec<&TimingCategory> = data
                    .table
                    .categories()
                    .iter()
                    .filter(|c| !skip_inactive || data.table.is_active(c))
                    .collect();
                categories.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

                let height = block_height(layout) + gap_rows;
                let mut row = data.section.anchor_row.max(cursor);
                categories
                    .into_iter()
                    .map(|category| {
                        let start = row;
                        row += height;
                        (category.clone(), start)
                    })
                    .collect()
            }
        }
    }

    /// Renders one section; returns the first row after its last block.
    fn write_section(&mut self, data: &SectionData<'_>, cursor: u32) -> ReportResult<u32> {
        let variant = self.variant;
        let layout = &variant.layout;
        let height = layout.metrics.len() as u32;
        let title = layout.sheet_title.as_str();
        let section = data.section;

        if let Some(heading) = &section.heading {
            let at = cell(title, &heading.cell)?;
            self.write_text(at, &heading.text, Some(CellStyle::bold()));
        }
        let per_block = layout.block_labels.campaign_per_block;
        if let (Some(label), false) = (&section.campaign_label, per_block) {
            let at = CellRef::new(section.anchor_row, self.columns.campaign);
            self.write_text(at, label, Some(CellStyle::bold()));
        }

        let mut end = cursor;
        for (category, start_row) in self.placements(data, cursor) {
            let metric_row = self.write_block(data, &category, start_row);
            end = end.max(metric_row + height);
            self.blocks.push(RenderedBlock {
                section: section.key.clone(),
                campaign: section.campaign_label.clone(),
                category,
                start_row,
                metric_row,
            });
        }
        Ok(end)
    }

    /// Writes labels and metric rows; returns the first metric row.
    fn write_block(&mut self, data: &SectionData<'_>, category: &TimingCategory, start_row: u32) -> u32 {
        let variant = self.variant;
        let layout = &variant.layout;
        let labels = &layout.block_labels;
        let label_style = labels.heading_row.then(CellStyle::bold);

        if let Some(col) = self.columns.category {
            self.write_text(CellRef::new(start_row, col), category.as_str(), label_style.clone());
        }
        if let Some(col) = self.columns.template {
            let template = data
                .mapping
                .template_for(category)
                .unwrap_or(category.as_str())
                .to_string();
            self.write_text(CellRef::new(start_row, col), &template, label_style.clone());
        }
        for (col, text) in self.columns.constants.clone() {
            self.write_text(CellRef::new(start_row, col), &text, label_style.clone());
        }
        if labels.campaign_per_block {
            if let Some(label) = &data.section.campaign_label {
                let at = CellRef::new(start_row, self.columns.campaign);
                self.write_text(at, label, None);
            }
        }

        let metric_row = if labels.heading_row { start_row + 1 } else { start_row };
        let weeks = data.table.weeks(category);
        for (i, metric_row_spec) in layout.metrics.iter().enumerate() {
            let row = metric_row + i as u32;
            let metric = metric_row_spec.metric;
            let style = metric.is_ratio().then(|| CellStyle::number_format(RATIO_FORMAT));

            if let Some(col) = self.columns.metric_label {
                self.write_text(CellRef::new(row, col), &metric_row_spec.label, None);
            }
            for (week, bucket) in weeks.iter().enumerate() {
                let Some(&col) = self.columns.weeks.get(week) else {
                    continue;
                };
                let at = CellRef::new(row, col);
                self.sheet.put(at, Literal::Number(metric_value(bucket, metric)));
                if let Some(style) = &style {
                    self.sheet.set_style(at, style.clone());
                }
            }
            if let Some(col) = self.columns.total {
                let at = CellRef::new(row, col);
                self.sheet.put(at, Literal::Number(total_value(&weeks, metric)));
                if let Some(style) = &style {
                    self.sheet.set_style(at, style.clone());
                }
            }
        }
        metric_row
    }
}

/// Rows one block occupies, label row included.
pub fn block_height(layout: &SheetLayout) -> u32 {
    layout.metrics.len() as u32 + u32::from(layout.block_labels.heading_row)
}

/// Render `sections` (in the order given) into a fresh sheet.
pub fn render(variant: &ReportVariant, sections: &[SectionData<'_>]) -> ReportResult<RenderedReport> {
    let mut renderer = Renderer {
        variant,
        columns: Columns::resolve(&variant.layout)?,
        sheet: MemorySheet::new(&variant.layout.sheet_title),
        blocks: Vec::new(),
    };
    renderer.write_header()?;

    let mut cursor = 0;
    for data in sections {
        cursor = renderer.write_section(data, cursor)?;
    }

    debug!(
        variant = %variant.name,
        sections = sections.len(),
        blocks = renderer.blocks.len(),
        rows = renderer.sheet.max_row(),
        "Rendered report sheet"
    );
    Ok(RenderedReport {
        sheet: renderer.sheet,
        blocks: renderer.blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::sheet::CellContent;
    use campaign_core::catalog::{ab_report, awol, casino_ret};
    use campaign_core::{MetricCounters, MetricRecord};
    use chrono::NaiveDate;

    fn record(template: &str, day: (i32, u32, u32), sent: u64, delivered: u64, opened: u64) -> MetricRecord {
        MetricRecord {
            timestamp: NaiveDate::from_ymd_opt(day.0, day.1, day.2)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            template_id: "1".into(),
            template_name: template.into(),
            campaign_name: "c".into(),
            counters: MetricCounters {
                sent,
                delivered,
                opened,
                ..Default::default()
            },
            bounced: 0,
        }
    }

    fn value(report: &RenderedReport, column: &str, row: u32) -> f64 {
        report
            .sheet
            .number(CellRef::at(column, row).unwrap())
            .unwrap()
    }

    fn render_ab(records: &[MetricRecord]) -> RenderedReport {
        let variant = ab_report();
        let mapping = variant.mapping("ab").unwrap();
        let table = aggregate(records, &variant.windows, mapping);
        let data = SectionData {
            section: variant.section("main").unwrap(),
            mapping,
            table,
        };
        render(&variant, &[data]).unwrap()
    }

    #[test]
    fn test_two_week_scenario_totals_and_ratios() {
        let template = "[S] 1d 2 BLOCKS (basic wp + highroller)";
        let report = render_ab(&[
            record(template, (2025, 12, 30), 100, 95, 50),
            record(template, (2026, 1, 6), 50, 40, 10),
        ]);
        let block = report.block("main", "1d").unwrap();
        let sent = block.metric_row;
        let delivered_pct = block.metric_row + 6;

        // week 1 in I, week 2 in L, Total in H
        assert_eq!(value(&report, "I", sent), 100.0);
        assert_eq!(value(&report, "L", sent), 50.0);
        assert_eq!(value(&report, "H", sent), 150.0);
        assert!((value(&report, "I", delivered_pct) - 95.0).abs() < 1e-9);
        assert!((value(&report, "L", delivered_pct) - 80.0).abs() < 1e-9);
        assert!((value(&report, "H", delivered_pct) - 87.5).abs() < 1e-9);
        assert_eq!(
            report
                .sheet
                .style(CellRef::at("H", delivered_pct).unwrap())
                .and_then(|s| s.number_format.as_deref()),
            Some(RATIO_FORMAT)
        );
    }

    #[test]
    fn test_zero_activity_category_still_rendered() {
        let report = render_ab(&[record("[S] 1h sport basic wp", (2025, 12, 30), 10, 10, 1)]);
        let block = report.block("main", "3d").unwrap();
        for row in block.metric_row..block.metric_row + 10 {
            assert_eq!(value(&report, "I", row), 0.0);
            assert_eq!(value(&report, "H", row), 0.0);
        }
        assert_eq!(report.blocks.len(), 8);
    }

    #[test]
    fn test_flow_order_follows_delay_not_mapping_order() {
        let report = render_ab(&[]);
        let order: Vec<&str> = report.blocks.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(order, vec!["10m", "1h", "1d", "3d", "5d", "7d", "9d", "12d"]);
        assert_eq!(report.blocks[0].start_row, 5);
        assert_eq!(report.blocks[0].metric_row, 6);
        assert_eq!(report.blocks[1].start_row, 16);
        let again = render_ab(&[]);
        assert_eq!(again.blocks, report.blocks);
    }

    #[test]
    fn test_header_and_banners() {
        let report = render_ab(&[]);
        let sheet = &report.sheet;
        assert_eq!(sheet.text(CellRef::at("I", 3).unwrap()).as_deref(), Some("week 1 29.12"));
        assert_eq!(sheet.text(CellRef::at("L", 3).unwrap()).as_deref(), Some("week 2 05.01"));
        assert_eq!(sheet.text(CellRef::at("H", 3).unwrap()).as_deref(), Some("Total"));
        assert_eq!(sheet.text(CellRef::at("L", 1).unwrap()).as_deref(), Some("Sport B"));
        assert_eq!(sheet.text(CellRef::at("A", 4).unwrap()).as_deref(), Some("Time"));
        assert_eq!(sheet.merges().len(), 2);
    }

    #[test]
    fn test_fixed_blocks_land_on_declared_rows() {
        let variant = casino_ret();
        let mapping = variant.mapping("retention").unwrap();
        let table = aggregate(&[record("Day 4", (2026, 1, 7), 30, 27, 9)], &variant.windows, mapping);
        let data = SectionData {
            section: variant.section("ret1").unwrap(),
            mapping,
            table,
        };
        let report = render(&variant, &[data]).unwrap();

        let block = report.block("ret1", "4d").unwrap();
        assert_eq!(block.start_row, 99);
        // week 2 sits in column I
        assert_eq!(value(&report, "I", 99), 30.0);
        assert_eq!(value(&report, "K", 99), 30.0);
        assert_eq!(report.sheet.text(CellRef::at("C", 99).unwrap()).as_deref(), Some("4d"));
        assert_eq!(report.sheet.text(CellRef::at("D", 99).unwrap()).as_deref(), Some("Sent"));
        assert_eq!(
            report.sheet.text(CellRef::at("B", 75).unwrap()).as_deref(),
            Some("Ret 1 dep [SPORT] ⚽️")
        );
        assert_eq!(report.block("ret1", "10d").unwrap().start_row, 117);
        assert_eq!(value(&report, "J", 117), 0.0);
    }

    #[test]
    fn test_fixed_blocks_outside_the_mapping_left_blank() {
        let variant = casino_ret();
        let mapping = variant.mapping("casinosport").unwrap();
        let table = aggregate(
            &[record("[S] 1h sport basic wp", (2025, 12, 30), 10, 10, 2)],
            &variant.windows,
            mapping,
        );
        let data = SectionData {
            section: variant.section("casino").unwrap(),
            mapping,
            table,
        };
        let report = render(&variant, &[data]).unwrap();

        // casinosport has no 3d template, so its block at row 21 stays empty
        assert!(report.block("casino", "3d").is_none());
        assert_eq!(report.sheet.content(CellRef::at("J", 21).unwrap()), CellContent::Empty);
        assert_eq!(report.blocks.len(), 8);
        assert_eq!(report.block("casino", "4d").unwrap().start_row, 27);
        assert_eq!(value(&report, "J", 27), 0.0);
    }

    #[test]
    fn test_flow_skips_inactive_and_labels_each_block() {
        let variant = awol();
        let mapping = variant.mapping("awol").unwrap();
        let sections: Vec<SectionData> = [
            ("inactive7", vec![record("Day 10", (2026, 1, 1), 5, 5, 1), record("Day 1", (2026, 1, 1), 9, 9, 2)]),
            ("inactive14", vec![record("Day 3", (2026, 1, 1), 4, 4, 0)]),
        ]
        .into_iter()
        .map(|(key, records)| SectionData {
            section: variant.section(key).unwrap(),
            mapping,
            table: aggregate(&records, &variant.windows, mapping),
        })
        .collect();
        let report = render(&variant, &sections).unwrap();

        let order: Vec<(&str, &str, u32)> = report
            .blocks
            .iter()
            .map(|b| (b.section.as_str(), b.category.as_str(), b.start_row))
            .collect();
        // inactive14 anchors at 11 but inactive7 runs until row 18
        assert_eq!(
            order,
            vec![("inactive7", "1d", 3), ("inactive7", "10d", 11), ("inactive14", "3d", 19)]
        );
        let sheet = &report.sheet;
        assert_eq!(sheet.text(CellRef::at("B", 11).unwrap()).as_deref(), Some("inactive 7"));
        assert_eq!(sheet.text(CellRef::at("C", 11).unwrap()).as_deref(), Some("All Mail"));
        assert_eq!(sheet.text(CellRef::at("D", 11).unwrap()).as_deref(), Some("Day 10"));
        assert_eq!(
            sheet.content(CellRef::at("D", 12).unwrap()),
            CellContent::Empty
        );
        assert_eq!(value(&report, "K", 19), 4.0);
    }
}
