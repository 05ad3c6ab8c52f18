//! End-to-end: CSV exports on disk → xlsx report → patched master workbook.

use campaign_core::{AppConfig, CellRef, ReportError, VariantRegistry};
use campaign_reporting::{generate_report, CellContent, ReportJob, Sheet};
use std::path::{Path, PathBuf};

const HEADER: &str =
    "timestamp,template_id,template_name,campaign_name,sent,delivered,opened,clicked,converted,unsubscribed";

fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    std::fs::write(&path, body).unwrap();
    path
}

fn at(a1: &str) -> CellRef {
    CellRef::parse(a1).unwrap()
}

/// A master with one `inactive 7` block labeled `Day 1` at row 3 and a
/// formula in the delivered row of the week-1 column.
fn write_master(path: &Path) {
    let mut book = umya_spreadsheet::new_file();
    let _ = book.new_sheet("AWOL Chains Sport").unwrap();
    let sheet = book.get_sheet_by_name_mut("AWOL Chains Sport").unwrap();
    sheet.get_cell_mut("B3").set_value_string("inactive 7");
    sheet.get_cell_mut("D3").set_value_string("Day 1");
    for row in 3..=10 {
        sheet.get_cell_mut(format!("BE{row}").as_str()).set_value_number(1);
    }
    sheet.get_cell_mut("BF4").set_formula("BE4*2");
    sheet.get_cell_mut("B20").set_value_string("inactive 14");
    sheet.get_cell_mut("D20").set_value_string("Day 3");
    umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
}

#[test]
fn test_ab_report_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "sport_ab.csv",
        &[
            "2025-12-30 09:00:00,t1,[S] 10 min sport basic wp,Sport B,100,95,50,10,2,1",
            "2026-01-06 09:00:00,t1,[S] 10 min sport basic wp,Sport B,50,40,20,4,1,0",
            "2026-01-06 09:00:00,t9,Unmapped template,Sport B,999,999,999,999,999,999",
        ],
    );
    let output = dir.path().join("ab.xlsx");
    let job = ReportJob {
        report_type: "a-b-report".into(),
        inputs: vec![input],
        output: output.clone(),
        master: None,
        replace_week: None,
    };

    let summary = generate_report(&VariantRegistry::builtin(), &job, &AppConfig::default()).unwrap();
    assert_eq!(summary.records, 3);
    assert_eq!(summary.sections, vec!["main".to_string()]);
    assert!(summary.patch.is_none());
    assert!(output.exists());

    let book = umya_spreadsheet::reader::xlsx::read(&output).unwrap();
    let sheet = book.get_sheet_by_name("A-B Report").unwrap();
    assert_eq!(sheet.content(at("A4")), CellContent::Text("Time".into()));
    assert_eq!(sheet.content(at("L1")), CellContent::Text("Sport B".into()));
}

#[test]
fn test_awol_patch_keeps_master_formula() {
    let dir = tempfile::tempdir().unwrap();
    let seven = write_csv(
        dir.path(),
        "awol_inactive7.csv",
        &["2026-01-01 10:00:00,t1,Day 1,AWOL,100,95,50,10,0,1"],
    );
    let fourteen = write_csv(
        dir.path(),
        "awol_inactive14.csv",
        &["2026-01-02 10:00:00,t3,Day 3,AWOL,40,40,20,5,0,0"],
    );
    let master = dir.path().join("master.xlsx");
    write_master(&master);
    let untouched = std::fs::read(&master).unwrap();

    let job = ReportJob {
        report_type: "awol".into(),
        inputs: vec![seven, fourteen],
        output: dir.path().join("awol.xlsx"),
        master: Some(master.clone()),
        replace_week: Some("01".into()),
    };
    let summary = generate_report(&VariantRegistry::builtin(), &job, &AppConfig::default()).unwrap();

    let outcome = summary.patch.expect("patch outcome");
    assert_eq!(outcome.output, dir.path().join("updated_master.xlsx"));
    assert_eq!(outcome.report.target_column, "BF");
    assert_eq!(outcome.report.blocks_matched, 2);
    assert_eq!(outcome.report.formula_cells_kept, 1);
    assert!(outcome.report.unmatched.is_empty());

    // The master itself is never rewritten.
    assert_eq!(std::fs::read(&master).unwrap(), untouched);

    let book = umya_spreadsheet::reader::xlsx::read(&outcome.output).unwrap();
    let sheet = book.get_sheet_by_name("AWOL Chains Sport").unwrap();
    assert_eq!(sheet.content(at("BF3")), CellContent::Number(100.0));
    assert_eq!(sheet.content(at("BF4")), CellContent::Formula("BE4*2".into()));
    assert_eq!(sheet.content(at("BF5")), CellContent::Number(50.0));
    assert_eq!(sheet.content(at("BF8")), CellContent::Number(95.0));
    assert_eq!(sheet.content(at("BF20")), CellContent::Number(40.0));
    // Reference column untouched.
    assert_eq!(sheet.content(at("BE3")), CellContent::Number(1.0));
}

#[test]
fn test_missing_master_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "awol_inactive7.csv",
        &["2026-01-01 10:00:00,t1,Day 1,AWOL,100,95,50,10,0,1"],
    );
    let job = ReportJob {
        report_type: "awol".into(),
        inputs: vec![input],
        output: dir.path().join("awol.xlsx"),
        master: Some(dir.path().join("missing.xlsx")),
        replace_week: Some("01".into()),
    };
    let result = generate_report(&VariantRegistry::builtin(), &job, &AppConfig::default());
    assert!(matches!(result, Err(ReportError::MissingFile(_))));
}
