//! Xlsx boundary: rendered sheets are exported with `rust_xlsxwriter`;
//! master workbooks are read, patched and written back out with
//! `umya-spreadsheet`, which keeps formulas and styles intact.

use crate::patch::{patch_sheet, patch_target, PatchReport};
use crate::render::RenderedReport;
use crate::sheet::{CellContent, CellStyle, Literal, MemorySheet, Sheet};
use campaign_core::{CellRef, ReportError, ReportResult, ReportVariant};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use umya_spreadsheet::{Spreadsheet, Style, Worksheet};

fn workbook_error(context: &str, e: impl std::fmt::Display) -> ReportError {
    ReportError::Workbook(format!("{context}: {e}"))
}

// ─── Export ─────────────────────────────────────────────────────────────────

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if style.bold {
        format = format.set_bold();
    }
    if style.align_center {
        format = format.set_align(FormatAlign::Center);
    }
    if style.wrap {
        format = format.set_text_wrap();
    }
    if let Some(num_format) = &style.number_format {
        format = format.set_num_format(num_format);
    }
    if let Some(rgb) = style
        .fill
        .as_deref()
        .and_then(|argb| u32::from_str_radix(argb.trim_start_matches('#'), 16).ok())
    {
        format = format.set_background_color(Color::RGB(rgb & 0x00FF_FFFF));
    }
    format
}

/// Zero-based (row, column) as `rust_xlsxwriter` addresses cells.
fn grid(cell: CellRef) -> ReportResult<(u32, u16)> {
    let row = cell.row.checked_sub(1);
    let col = cell.col.checked_sub(1).and_then(|c| u16::try_from(c).ok());
    match (row, col) {
        (Some(row), Some(col)) => Ok((row, col)),
        _ => Err(ReportError::Workbook(format!(
            "cell outside the sheet: row {}, column {}",
            cell.row, cell.col
        ))),
    }
}

/// Write `sheet` as the only worksheet of a new workbook at `path`.
pub fn save_sheet(sheet: &MemorySheet, path: &Path) -> ReportResult<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&sheet.title)
        .map_err(|e| workbook_error("invalid sheet name", e))?;

    let merge_origins: Vec<CellRef> = sheet.merges().iter().map(|(first, _, _)| *first).collect();
    for (cell, content) in sheet.cells() {
        if merge_origins.contains(&cell) {
            continue;
        }
        let (row, col) = grid(cell)?;
        let format = sheet.style(cell).map(to_format);
        let written = match (content, &format) {
            (CellContent::Text(text), Some(f)) => worksheet.write_string_with_format(row, col, text, f),
            (CellContent::Text(text), None) => worksheet.write_string(row, col, text),
            (CellContent::Number(value), Some(f)) => {
                worksheet.write_number_with_format(row, col, *value, f)
            }
            (CellContent::Number(value), None) => worksheet.write_number(row, col, *value),
            (CellContent::Formula(formula), _) => {
                worksheet.write_formula(row, col, format!("={formula}").as_str())
            }
            (CellContent::Empty, _) => continue,
        };
        written.map_err(|e| workbook_error(&format!("cannot write {cell}"), e))?;
    }

    for (first, last, text) in sheet.merges() {
        let format = sheet.style(*first).map(to_format).unwrap_or_default();
        let ((first_row, first_col), (last_row, last_col)) = (grid(*first)?, grid(*last)?);
        worksheet
            .merge_range(first_row, first_col, last_row, last_col, text, &format)
            .map_err(|e| workbook_error(&format!("cannot merge {first}:{last}"), e))?;
    }
    for (col, width) in sheet.column_widths() {
        let (_, col) = grid(CellRef::new(1, col))?;
        worksheet
            .set_column_width(col, width)
            .map_err(|e| workbook_error("invalid column width", e))?;
    }

    workbook
        .save(path)
        .map_err(|e| workbook_error(&format!("cannot save {}", path.display()), e))?;
    info!(path = %path.display(), cells = sheet.cells().count(), "Report saved");
    Ok(())
}

// ─── Master workbook ────────────────────────────────────────────────────────

impl Sheet for Worksheet {
    fn content(&self, cell: CellRef) -> CellContent {
        let Some(found) = self.get_cell((cell.col, cell.row)) else {
            return CellContent::Empty;
        };
        if found.is_formula() {
            return CellContent::Formula(found.get_formula().to_string());
        }
        if let Some(value) = found.get_value_number() {
            return CellContent::Number(value);
        }
        // A stored string carrying the marker is treated as a formula too.
        CellContent::from_text(&found.get_value())
    }

    fn store_literal(&mut self, cell: CellRef, value: Literal) {
        let target = self.get_cell_mut((cell.col, cell.row));
        match value {
            Literal::Number(value) => {
                target.set_value_number(value);
            }
            Literal::Text(text) => {
                target.set_value_string(text);
            }
        }
    }

    /// Reference cells carrying only the default style are skipped, so they
    /// never wipe a target's own formatting.
    fn copy_style(&mut self, from: CellRef, to: CellRef) -> bool {
        let Some(style) = self
            .get_cell((from.col, from.row))
            .map(|c| c.get_style().clone())
            .filter(|style| *style != Style::default())
        else {
            return false;
        };
        self.get_cell_mut((to.col, to.row)).set_style(style);
        true
    }

    fn max_row(&self) -> u32 {
        self.get_highest_row()
    }
}

/// `<dir>/<prefix><file name>` next to the master.
pub fn derived_path(master: &Path, prefix: &str) -> ReportResult<PathBuf> {
    let name = master
        .file_name()
        .ok_or_else(|| ReportError::Validation(format!("not a file path: {}", master.display())))?;
    let derived = master.with_file_name(format!("{prefix}{}", name.to_string_lossy()));
    if derived == master {
        return Err(ReportError::Validation(
            "output prefix must not be empty, the master is never overwritten".into(),
        ));
    }
    Ok(derived)
}

fn target_sheet<'b>(book: &'b mut Spreadsheet, name: &str) -> ReportResult<&'b mut Worksheet> {
    if book.get_sheet_by_name(name).is_some() {
        return book
            .get_sheet_by_name_mut(name)
            .ok_or_else(|| ReportError::Workbook(format!("sheet '{name}' disappeared")));
    }
    warn!(sheet = name, "Sheet not found in master, using the first sheet");
    book.get_sheet_mut(&0)
        .ok_or_else(|| ReportError::Workbook("master workbook has no sheets".into()))
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    pub output: PathBuf,
    pub report: PatchReport,
}

/// Load `master`, merge week `selector` of `rendered` into it and write the
/// result to the derived path. The master file itself is never written.
pub fn patch_workbook(
    master: &Path,
    rendered: &RenderedReport,
    variant: &ReportVariant,
    selector: &str,
    output_prefix: &str,
) -> ReportResult<PatchOutcome> {
    if !master.exists() {
        return Err(ReportError::MissingFile(master.to_path_buf()));
    }
    let (patch, _, _) = patch_target(variant, selector)?;
    let output = derived_path(master, output_prefix)?;

    let mut book = umya_spreadsheet::reader::xlsx::read(master)
        .map_err(|e| workbook_error(&format!("cannot read {}", master.display()), e))?;
    let sheet = target_sheet(&mut book, &patch.sheet_name)?;
    let report = patch_sheet(rendered, sheet, variant, selector)?;

    umya_spreadsheet::writer::xlsx::write(&book, &output)
        .map_err(|e| workbook_error(&format!("cannot write {}", output.display()), e))?;
    info!(
        master = %master.display(),
        output = %output.display(),
        cells_updated = report.cells_updated,
        "Master workbook patched"
    );
    Ok(PatchOutcome { output, report })
}
