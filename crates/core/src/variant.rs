//! Report variant definitions: the per-report-type tables (time windows,
//! template maps, sheet layout, patch targets) consumed by the aggregator,
//! renderer and patch engine. Variants are plain values: nothing here is
//! global, and additional variants can be deserialized from JSON.

use crate::cell::{column_index, parse_range, CellRef};
use crate::error::{ReportError, ReportResult};
use crate::types::{Metric, TimeWindow, TimingCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ─── Variant ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportVariant {
    pub name: String,
    pub description: String,
    /// Whether one invocation may combine several input files.
    pub multi_file: bool,
    pub windows: Vec<TimeWindow>,
    pub mappings: Vec<MappingSet>,
    #[serde(default)]
    pub mapping_rules: Vec<SelectionRule>,
    pub default_mapping: String,
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub section_rules: Vec<SelectionRule>,
    /// Section for files no rule claims. `None` drops such files with a warning.
    #[serde(default)]
    pub default_section: Option<String>,
    pub layout: SheetLayout,
    #[serde(default)]
    pub patch: Option<PatchSpec>,
}

// ─── Template Mapping ───────────────────────────────────────────────────────

/// A named template-name → timing-category table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSet {
    pub name: String,
    pub templates: Vec<TemplateMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMapping {
    pub template: String,
    pub category: TimingCategory,
}

impl MappingSet {
    pub fn new(name: &str, pairs: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            templates: pairs
                .iter()
                .map(|(template, category)| TemplateMapping {
                    template: template.to_string(),
                    category: TimingCategory::from(*category),
                })
                .collect(),
        }
    }

    /// Exact lookup; unmapped template names yield `None`.
    pub fn resolve(&self, template_name: &str) -> Option<&TimingCategory> {
        self.templates
            .iter()
            .find(|m| m.template == template_name)
            .map(|m| &m.category)
    }

    /// Distinct categories in declaration order.
    pub fn categories(&self) -> Vec<TimingCategory> {
        let mut seen = BTreeSet::new();
        self.templates
            .iter()
            .filter(|m| seen.insert(m.category.clone()))
            .map(|m| m.category.clone())
            .collect()
    }

    /// First template declared for a category.
    pub fn template_for(&self, category: &TimingCategory) -> Option<&str> {
        self.templates
            .iter()
            .find(|m| &m.category == category)
            .map(|m| m.template.as_str())
    }
}

// ─── Selection Rules ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// Campaign name carried by the file's records.
    CampaignName,
    /// Template names of the file's records that the chosen mapping knows.
    TemplateName,
    /// The input file's name.
    FileName,
}

/// Case-insensitive substring rule. Matches when any `any_of` needle is
/// contained (or `any_of` is empty) and every `all_of` needle is contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRule {
    pub source: RuleSource,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub all_of: Vec<String>,
    pub target: String,
}

impl SelectionRule {
    pub fn any(source: RuleSource, needles: &[&str], target: &str) -> Self {
        Self {
            source,
            any_of: needles.iter().map(|s| s.to_string()).collect(),
            all_of: Vec::new(),
            target: target.to_string(),
        }
    }

    pub fn all(source: RuleSource, needles: &[&str], target: &str) -> Self {
        Self {
            source,
            any_of: Vec::new(),
            all_of: needles.iter().map(|s| s.to_string()).collect(),
            target: target.to_string(),
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        let contains = |needle: &String| text.contains(&needle.to_lowercase());
        let any = self.any_of.is_empty() || self.any_of.iter().any(contains);
        any && self.all_of.iter().all(contains)
    }
}

// ─── Sections ───────────────────────────────────────────────────────────────

/// One campaign section of the rendered sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub key: String,
    /// Written into the campaign column; the patch engine aligns on it.
    #[serde(default)]
    pub campaign_label: Option<String>,
    #[serde(default)]
    pub heading: Option<SheetLabel>,
    /// Row of the campaign label (fixed layouts) or first block row (flow).
    pub anchor_row: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLabel {
    pub cell: String,
    pub text: String,
}

impl SheetLabel {
    pub fn new(cell: &str, text: &str) -> Self {
        Self {
            cell: cell.to_string(),
            text: text.to_string(),
        }
    }
}

// ─── Layout ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLayout {
    pub sheet_title: String,
    /// Column of week N at index N-1.
    pub week_columns: Vec<String>,
    pub header_row: u32,
    pub week_header: WeekHeader,
    #[serde(default)]
    pub total_column: Option<String>,
    pub metrics: Vec<MetricRow>,
    #[serde(default)]
    pub metric_label_column: Option<String>,
    pub campaign_column: String,
    pub block_labels: BlockLabels,
    pub placement: Placement,
    #[serde(default)]
    pub labels: Vec<SheetLabel>,
    /// Merged ranges, e.g. `L1:U1`.
    #[serde(default)]
    pub banners: Vec<SheetLabel>,
    #[serde(default)]
    pub column_widths: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekHeader {
    /// `week 1 29.12`
    Inline,
    /// `Week 01` / `29.12` on two lines.
    Stacked,
}

impl WeekHeader {
    pub fn format(&self, index: usize, window: &TimeWindow) -> String {
        let day = window.start.format("%d.%m");
        match self {
            WeekHeader::Inline => format!("{} {}", window.label, day),
            WeekHeader::Stacked => format!("Week {:02}\n{}", index + 1, day),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric: Metric,
    pub label: String,
}

impl MetricRow {
    pub fn new(metric: Metric, label: &str) -> Self {
        Self {
            metric,
            label: label.to_string(),
        }
    }
}

/// Labels written on each block besides the metric values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockLabels {
    #[serde(default)]
    pub category_column: Option<String>,
    /// Receives the first source template name of the category.
    #[serde(default)]
    pub template_column: Option<String>,
    #[serde(default)]
    pub constants: Vec<(String, String)>,
    /// Repeat the campaign label on every block instead of once per section.
    #[serde(default)]
    pub campaign_per_block: bool,
    /// Labels go on their own row above the metric rows.
    #[serde(default)]
    pub heading_row: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Placement {
    /// Each (category, section) owns a declared block.
    Fixed { blocks: Vec<FixedBlock> },
    /// Blocks follow each other from the section anchor, ordered by the
    /// category's implied delay.
    Flow {
        skip_inactive: bool,
        #[serde(default)]
        gap_rows: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedBlock {
    pub category: TimingCategory,
    pub section: String,
    pub start_row: u32,
}

// ─── Patch ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSpec {
    pub sheet_name: String,
    pub campaign_column: String,
    /// Master columns holding template/category labels, checked in order.
    pub label_columns: Vec<String>,
    /// Rendered-sheet column carrying each block's label.
    pub source_label_column: String,
    #[serde(default)]
    pub label_aliases: Vec<(String, String)>,
    /// Row offsets within a block whose values are copied.
    pub metric_offsets: Vec<u32>,
    #[serde(default = "default_search_window")]
    pub search_window: u32,
    pub reference_column: String,
    pub format_policy: FormatPolicy,
    pub week_targets: Vec<WeekTarget>,
}

fn default_search_window() -> u32 {
    100
}

/// Which rows receive the reference column's formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatPolicy {
    AllCells,
    /// Rows whose reference cell holds a formula keep their own formatting.
    SkipFormulaCells,
}

/// Week selector token (`"01"`) → rendered week and master column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekTarget {
    pub selector: String,
    /// 1-based week number.
    pub week: usize,
    pub column: String,
}

impl PatchSpec {
    pub fn target(&self, selector: &str) -> Option<&WeekTarget> {
        self.week_targets.iter().find(|t| t.selector == selector.trim())
    }

    /// Alias for a rendered label as the master spells it.
    pub fn master_label<'a>(&'a self, label: &'a str) -> &'a str {
        self.label_aliases
            .iter()
            .find(|(from, _)| from == label)
            .map(|(_, to)| to.as_str())
            .unwrap_or(label)
    }
}

// ─── Validation ─────────────────────────────────────────────────────────────

fn check_column(variant: &str, column: &str) -> ReportResult<()> {
    column_index(column)
        .map(|_| ())
        .ok_or_else(|| ReportError::Validation(format!("{variant}: invalid column '{column}'")))
}

impl ReportVariant {
    pub fn mapping(&self, name: &str) -> Option<&MappingSet> {
        self.mappings.iter().find(|m| m.name == name)
    }

    pub fn section(&self, key: &str) -> Option<&SectionSpec> {
        self.sections.iter().find(|s| s.key == key)
    }

    /// Reject definitions the renderer or patch engine could not honor.
    pub fn validate(&self) -> ReportResult<()> {
        let name = self.name.as_str();
        let invalid = |msg: String| Err(ReportError::Validation(format!("{name}: {msg}")));

        if self.windows.is_empty() {
            return invalid("no time windows".into());
        }
        for (i, window) in self.windows.iter().enumerate() {
            if window.start > window.end {
                return invalid(format!("window '{}' ends before it starts", window.label));
            }
            if i > 0 && self.windows[i - 1].start > window.start {
                return invalid(format!("window '{}' is out of order", window.label));
            }
            if let Some(other) = self.windows[i + 1..].iter().find(|w| w.overlaps(window)) {
                return invalid(format!(
                    "windows '{}' and '{}' overlap",
                    window.label, other.label
                ));
            }
        }

        let layout = &self.layout;
        if layout.header_row == 0 {
            return invalid("header row must be 1 or greater".into());
        }
        if layout.week_columns.len() < self.windows.len() {
            return invalid(format!(
                "{} windows but only {} week columns",
                self.windows.len(),
                layout.week_columns.len()
            ));
        }
        if layout.metrics.is_empty() {
            return invalid("layout declares no metric rows".into());
        }
        for column in layout
            .week_columns
            .iter()
            .chain(layout.total_column.iter())
            .chain(layout.metric_label_column.iter())
            .chain(std::iter::once(&layout.campaign_column))
            .chain(layout.block_labels.category_column.iter())
            .chain(layout.block_labels.template_column.iter())
            .chain(layout.block_labels.constants.iter().map(|(c, _)| c))
        {
            check_column(name, column)?;
        }
        for label in layout.labels.iter().chain(self.sections.iter().filter_map(|s| s.heading.as_ref())) {
            if CellRef::parse(&label.cell).is_none() {
                return invalid(format!("invalid cell '{}'", label.cell));
            }
        }
        for banner in &layout.banners {
            if parse_range(&banner.cell).is_none() {
                return invalid(format!("invalid range '{}'", banner.cell));
            }
        }

        if self.mapping(&self.default_mapping).is_none() {
            return invalid(format!("unknown default mapping '{}'", self.default_mapping));
        }
        if let Some(rule) = self.mapping_rules.iter().find(|r| self.mapping(&r.target).is_none()) {
            return invalid(format!("rule targets unknown mapping '{}'", rule.target));
        }
        if self.sections.is_empty() {
            return invalid("no sections".into());
        }
        if let Some(section) = self.sections.iter().find(|s| s.anchor_row == 0) {
            return invalid(format!("section '{}' anchored at row 0", section.key));
        }
        if let Some(rule) = self.section_rules.iter().find(|r| self.section(&r.target).is_none()) {
            return invalid(format!("rule targets unknown section '{}'", rule.target));
        }
        if let Some(default) = &self.default_section {
            if self.section(default).is_none() {
                return invalid(format!("unknown default section '{default}'"));
            }
        }

        if let Placement::Fixed { blocks } = &layout.placement {
            let height = layout.metrics.len() as u32;
            for (i, block) in blocks.iter().enumerate() {
                if self.section(&block.section).is_none() {
                    return invalid(format!("block for '{}' names unknown section", block.category));
                }
                if block.start_row == 0 {
                    return invalid(format!("block for '{}' starts at row 0", block.category));
                }
                let clash = blocks[i + 1..].iter().find(|b| {
                    b.section == block.section
                        && b.start_row < block.start_row + height
                        && block.start_row < b.start_row + height
                });
                if let Some(other) = clash {
                    return invalid(format!(
                        "blocks '{}' and '{}' overlap in section '{}'",
                        block.category, other.category, block.section
                    ));
                }
            }
            for mapping in &self.mappings {
                let unplaced = mapping
                    .categories()
                    .into_iter()
                    .find(|c| !blocks.iter().any(|b| &b.category == c));
                if let Some(category) = unplaced {
                    return invalid(format!(
                        "category '{category}' of mapping '{}' has no block",
                        mapping.name
                    ));
                }
            }
        }

        if let Some(patch) = &self.patch {
            for column in patch
                .label_columns
                .iter()
                .chain([&patch.campaign_column, &patch.source_label_column, &patch.reference_column])
                .chain(patch.week_targets.iter().map(|t| &t.column))
            {
                check_column(name, column)?;
            }
            if layout.block_labels.heading_row {
                return invalid("patch requires labels on the first metric row".into());
            }
            if patch.search_window == 0 {
                return invalid("patch search window must be positive".into());
            }
            if let Some(offset) = patch
                .metric_offsets
                .iter()
                .find(|o| **o as usize >= layout.metrics.len())
            {
                return invalid(format!("patch offset {offset} outside the metric block"));
            }
            if let Some(target) = patch
                .week_targets
                .iter()
                .find(|t| t.week == 0 || t.week > self.windows.len())
            {
                return invalid(format!("week selector '{}' names no window", target.selector));
            }
        }

        Ok(())
    }
}
