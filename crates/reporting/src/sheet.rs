//! Typed cell model shared by the renderer, the patch engine and the xlsx
//! boundary. Formula cells are a distinct variant, and the only write path
//! (`Sheet::put`) refuses to overwrite them.

use campaign_core::cell::parse_range;
use campaign_core::CellRef;
use std::collections::BTreeMap;

/// Leading character marking a cell as a formula.
pub const FORMULA_MARKER: char = '=';

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellContent {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Formula text without the leading marker.
    Formula(String),
}

impl CellContent {
    /// Classify a raw cell string; `"=SUM(A1:A3)"` is a formula.
    pub fn from_text(raw: &str) -> Self {
        match raw.strip_prefix(FORMULA_MARKER) {
            Some(formula) => CellContent::Formula(formula.to_string()),
            None if raw.is_empty() => CellContent::Empty,
            None => CellContent::Text(raw.to_string()),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellContent::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// A value that may be written into a sheet. Formulas are not literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(f64),
}

impl Literal {
    pub fn from_content(content: &CellContent) -> Option<Self> {
        match content {
            CellContent::Text(text) => Some(Literal::Text(text.clone())),
            CellContent::Number(value) => Some(Literal::Number(*value)),
            CellContent::Empty | CellContent::Formula(_) => None,
        }
    }
}

impl From<&str> for Literal {
    fn from(text: &str) -> Self {
        Literal::Text(text.to_string())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(value)
    }
}

impl From<Literal> for CellContent {
    fn from(value: Literal) -> Self {
        match value {
            Literal::Text(text) => CellContent::Text(text),
            Literal::Number(value) => CellContent::Number(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub bold: bool,
    pub align_center: bool,
    pub wrap: bool,
    pub number_format: Option<String>,
    /// ARGB fill color.
    pub fill: Option<String>,
}

impl CellStyle {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Default::default()
        }
    }

    pub fn header() -> Self {
        Self {
            bold: true,
            align_center: true,
            wrap: true,
            ..Default::default()
        }
    }

    pub fn number_format(format: &str) -> Self {
        Self {
            number_format: Some(format.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The target held a formula and was left untouched.
    FormulaKept,
}

/// A 2-D cell grid, 1-based like `CellRef`.
pub trait Sheet {
    fn content(&self, cell: CellRef) -> CellContent;

    /// Unconditional store. Implementors provide it; callers use `put`.
    fn store_literal(&mut self, cell: CellRef, value: Literal);

    /// Copy font, fill, border, alignment and number format. Returns `false`
    /// when `from` carries no style of its own.
    fn copy_style(&mut self, from: CellRef, to: CellRef) -> bool;

    /// Last row holding a value or a style, 0 for an empty sheet.
    fn max_row(&self) -> u32;

    fn put(&mut self, cell: CellRef, value: Literal) -> WriteOutcome {
        if self.content(cell).is_formula() {
            return WriteOutcome::FormulaKept;
        }
        self.store_literal(cell, value);
        WriteOutcome::Written
    }

    /// Trimmed, non-empty text content.
    fn text(&self, cell: CellRef) -> Option<String> {
        match self.content(cell) {
            CellContent::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            _ => None,
        }
    }
}

// ─── In-memory sheet ────────────────────────────────────────────────────────

/// Sheet held entirely in memory; the renderer's output.
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    pub title: String,
    cells: BTreeMap<CellRef, CellContent>,
    styles: BTreeMap<CellRef, CellStyle>,
    merges: Vec<(CellRef, CellRef, String)>,
    column_widths: BTreeMap<u32, f64>,
}

impl MemorySheet {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn set_formula(&mut self, cell: CellRef, formula: &str) {
        let formula = formula.strip_prefix(FORMULA_MARKER).unwrap_or(formula);
        self.cells.insert(cell, CellContent::Formula(formula.to_string()));
    }

    pub fn set_style(&mut self, cell: CellRef, style: CellStyle) {
        self.styles.insert(cell, style);
    }

    pub fn style(&self, cell: CellRef) -> Option<&CellStyle> {
        self.styles.get(&cell)
    }

    /// Merge a range such as `L1:U1` and put `text` in its first cell.
    /// Returns `false` for an unparseable range.
    pub fn merge(&mut self, range: &str, text: &str) -> bool {
        let Some((first, last)) = parse_range(range) else {
            return false;
        };
        self.merges.push((first, last, text.to_string()));
        self.cells.insert(first, CellContent::Text(text.to_string()));
        true
    }

    pub fn merges(&self) -> &[(CellRef, CellRef, String)] {
        &self.merges
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        self.column_widths.insert(col, width);
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.column_widths.iter().map(|(c, w)| (*c, *w))
    }

    /// Non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &CellContent)> {
        self.cells
            .iter()
            .filter(|(_, content)| !content.is_empty())
            .map(|(cell, content)| (*cell, content))
    }

    pub fn number(&self, cell: CellRef) -> Option<f64> {
        self.content(cell).as_number()
    }
}

impl Sheet for MemorySheet {
    fn content(&self, cell: CellRef) -> CellContent {
        self.cells.get(&cell).cloned().unwrap_or_default()
    }

    fn store_literal(&mut self, cell: CellRef, value: Literal) {
        self.cells.insert(cell, value.into());
    }

    fn copy_style(&mut self, from: CellRef, to: CellRef) -> bool {
        match self.styles.get(&from).cloned() {
            Some(style) => {
                self.styles.insert(to, style);
                true
            }
            None => false,
        }
    }

    fn max_row(&self) -> u32 {
        let cells = self.cells.keys().map(|c| c.row).max().unwrap_or(0);
        let styles = self.styles.keys().map(|c| c.row).max().unwrap_or(0);
        cells.max(styles)
    }
}
