//! Built-in report variants: `a-b-report`, `casino-ret` and `awol`.

use crate::types::{Counter, Metric, Ratio, TimeWindow, TimingCategory};
use crate::variant::*;
use chrono::{Duration, NaiveDate};

const FIRST_WEEK_START: NaiveDate = match NaiveDate::from_ymd_opt(2025, 12, 29) {
    Some(date) => date,
    None => panic!("invalid first week start"),
};

/// `count` consecutive Monday–Sunday windows labeled `week 1..count`.
pub fn weekly_windows(first_monday: NaiveDate, count: usize) -> Vec<TimeWindow> {
    (0..count)
        .map(|i| {
            let start = first_monday + Duration::days(7 * i as i64);
            TimeWindow::new(format!("week {}", i + 1), start, start + Duration::days(6))
        })
        .collect()
}

fn columns(letters: &[&str]) -> Vec<String> {
    letters.iter().map(|s| s.to_string()).collect()
}

fn count(counter: Counter, label: &str) -> MetricRow {
    MetricRow::new(Metric::Count(counter), label)
}

fn percent(ratio: Ratio, label: &str) -> MetricRow {
    MetricRow::new(Metric::Percent(ratio), label)
}

/// Selectors `01`..`06` → master columns `BF`..`BA` (week 1 rightmost).
fn master_week_targets() -> Vec<WeekTarget> {
    ["BF", "BE", "BD", "BC", "BB", "BA"]
        .iter()
        .enumerate()
        .map(|(i, column)| WeekTarget {
            selector: format!("{:02}", i + 1),
            week: i + 1,
            column: column.to_string(),
        })
        .collect()
}

// ─── a-b-report ─────────────────────────────────────────────────────────────

pub fn ab_report() -> ReportVariant {
    ReportVariant {
        name: "a-b-report".into(),
        description: "Sport B A/B chain, all timing categories stacked with weekly totals".into(),
        multi_file: false,
        windows: weekly_windows(FIRST_WEEK_START, 5),
        mappings: vec![MappingSet::new(
            "ab",
            &[
                ("[S] 10 min sport basic wp", "10m"),
                ("[S] 1h sport basic wp", "1h"),
                ("[S] 1d 2 BLOCKS (basic wp + highroller)", "1d"),
                ("[S] 3d casino 1st dep total wp", "3d"),
                ("[S] 5d casino 1st dep", "5d"),
                ("[S] 7d 2 BLOCKS SPORT + CAS", "7d"),
                ("[S] 10d A: freebet + 100fs", "9d"),
                ("[S] 10d b: 150%sport + 100fs", "9d"),
                ("[S] 12d A: freebet + 100fs", "12d"),
                ("[S] 12d b: 150%sport + 100fs", "12d"),
            ],
        )],
        mapping_rules: Vec::new(),
        default_mapping: "ab".into(),
        sections: vec![SectionSpec {
            key: "main".into(),
            campaign_label: None,
            heading: None,
            anchor_row: 5,
        }],
        section_rules: Vec::new(),
        default_section: Some("main".into()),
        layout: SheetLayout {
            sheet_title: "A-B Report".into(),
            week_columns: columns(&["I", "L", "O", "R", "U"]),
            header_row: 3,
            week_header: WeekHeader::Inline,
            total_column: Some("H".into()),
            metrics: vec![
                count(Counter::Sent, "Sent"),
                count(Counter::Delivered, "Delivered"),
                count(Counter::Opened, "Opened"),
                count(Counter::Clicked, "Clicked"),
                count(Counter::Converted, "Converted (Dep/Acc.Bon)"),
                count(Counter::Unsubscribed, "Unsubscribe"),
                percent(Ratio::Delivered, "% Delivered"),
                percent(Ratio::Open, "% Open"),
                percent(Ratio::Click, "% Click"),
                percent(Ratio::Conversion, "% CR"),
            ],
            metric_label_column: Some("A".into()),
            campaign_column: "B".into(),
            block_labels: BlockLabels {
                category_column: Some("A".into()),
                heading_row: true,
                ..Default::default()
            },
            placement: Placement::Flow {
                skip_inactive: false,
                gap_rows: 0,
            },
            labels: vec![SheetLabel::new("A4", "Time")],
            banners: vec![
                SheetLabel::new("L1:U1", "Sport B"),
                SheetLabel::new("L2:U2", "280% up to 375 EUR"),
            ],
            column_widths: vec![("A".into(), 26.0), ("H".into(), 12.0)],
        },
        patch: None,
    }
}

// ─── casino-ret ─────────────────────────────────────────────────────────────

fn fixed_blocks(section: &str, rows: &[(&str, u32)]) -> Vec<FixedBlock> {
    rows.iter()
        .map(|(category, start_row)| FixedBlock {
            category: TimingCategory::from(*category),
            section: section.to_string(),
            start_row: *start_row,
        })
        .collect()
}

pub fn casino_ret() -> ReportVariant {
    let retention_rows = |offset: u32| -> Vec<(&'static str, u32)> {
        vec![
            ("3d", offset),
            ("4d", offset + 6),
            ("6d", offset + 12),
            ("8d", offset + 18),
            ("10d", offset + 24),
        ]
    };
    let mut blocks = fixed_blocks(
        "casino",
        &[
            ("10min", 3),
            ("1h", 9),
            ("1d", 15),
            ("3d", 21),
            ("4d", 27),
            ("6d", 33),
            ("8d", 39),
            ("10d", 45),
            ("12d", 51),
        ],
    );
    blocks.extend(fixed_blocks("ret1", &retention_rows(93)));
    blocks.extend(fixed_blocks("ret2", &retention_rows(141)));

    ReportVariant {
        name: "casino-ret".into(),
        description: "WP chains: casino+sport registration and retention deposit sections".into(),
        multi_file: true,
        windows: weekly_windows(FIRST_WEEK_START, 6),
        mappings: vec![
            MappingSet::new(
                "casinosport",
                &[
                    ("[S] 10 min sport basic wp", "10min"),
                    ("[S] 1h sport basic wp", "1h"),
                    ("[S] 1d 2 BLOCKS (basic wp + highroller)", "1d"),
                    ("[S] 3d casino 1st dep total wp", "4d"),
                    ("[S] 5d casino 1st dep", "6d"),
                    ("[S] 7d 2 BLOCKS SPORT + CAS", "8d"),
                    ("[S] 10d A: freebet + 100fs", "10d"),
                    ("[S] 10d b: 150%sport + 100fs", "10d"),
                    ("[S] 12d A: freebet + 100fs", "12d"),
                    ("[S] 12d b: 150%sport + 100fs", "12d"),
                ],
            ),
            MappingSet::new(
                "retention",
                &[
                    ("Day 3", "3d"),
                    ("Day 4", "4d"),
                    ("Day 6", "6d"),
                    ("Day 8", "8d"),
                    ("Day 10", "10d"),
                ],
            ),
        ],
        mapping_rules: vec![
            SelectionRule::any(RuleSource::CampaignName, &["casino+sport", "a/b"], "casinosport"),
            SelectionRule::any(RuleSource::FileName, &["casinosport", "ab"], "casinosport"),
        ],
        default_mapping: "retention".into(),
        sections: vec![
            SectionSpec {
                key: "casino".into(),
                campaign_label: Some("casino+sport A/B Reg_No_Dep".into()),
                heading: Some(SheetLabel::new("A3", "Signed up")),
                anchor_row: 3,
            },
            SectionSpec {
                key: "ret1".into(),
                campaign_label: Some("Ret 1 dep [SPORT] ⚽️".into()),
                heading: Some(SheetLabel::new("A75", "deposits_quantity is 1")),
                anchor_row: 75,
            },
            SectionSpec {
                key: "ret2".into(),
                campaign_label: Some("Ret 2 dep [SPORT] ⚽️".into()),
                heading: Some(SheetLabel::new("A123", "deposits_quantity is 2")),
                anchor_row: 123,
            },
        ],
        section_rules: vec![
            SelectionRule::any(
                RuleSource::TemplateName,
                &["[S]", "sport", "casino", "FS"],
                "casino",
            ),
            SelectionRule::any(RuleSource::FileName, &["casinosport", "ab"], "casino"),
            SelectionRule::all(RuleSource::FileName, &["ret", "1"], "ret1"),
            SelectionRule::all(RuleSource::FileName, &["ret", "2"], "ret2"),
        ],
        default_section: None,
        layout: SheetLayout {
            sheet_title: "WP Chains".into(),
            week_columns: columns(&["J", "I", "H", "G", "F", "E"]),
            header_row: 1,
            week_header: WeekHeader::Stacked,
            total_column: Some("K".into()),
            metrics: vec![
                count(Counter::Sent, "Sent"),
                count(Counter::Delivered, "Delivered"),
                count(Counter::Opened, "Opened"),
                count(Counter::Clicked, "Clicked"),
                count(Counter::Unsubscribed, "Unsubscribed"),
                percent(Ratio::Delivered, "Pct Delivered"),
            ],
            metric_label_column: Some("D".into()),
            campaign_column: "B".into(),
            block_labels: BlockLabels {
                category_column: Some("C".into()),
                ..Default::default()
            },
            placement: Placement::Fixed { blocks },
            labels: Vec::new(),
            banners: Vec::new(),
            column_widths: vec![("B".into(), 30.0), ("D".into(), 16.0)],
        },
        patch: Some(PatchSpec {
            sheet_name: "WP Chains Sport".into(),
            campaign_column: "B".into(),
            label_columns: columns(&["C", "D"]),
            source_label_column: "C".into(),
            label_aliases: vec![("10min".into(), "10 min".into())],
            metric_offsets: vec![0, 1, 2, 3, 4],
            search_window: 100,
            reference_column: "BE".into(),
            format_policy: FormatPolicy::AllCells,
            week_targets: master_week_targets(),
        }),
    }
}

// ─── awol ───────────────────────────────────────────────────────────────────

pub fn awol() -> ReportVariant {
    let section = |key: &str, label: &str, anchor_row: u32| SectionSpec {
        key: key.into(),
        campaign_label: Some(label.into()),
        heading: None,
        anchor_row,
    };

    ReportVariant {
        name: "awol".into(),
        description: "Inactive-user chains, one section per inactivity cohort".into(),
        multi_file: true,
        windows: weekly_windows(FIRST_WEEK_START, 6),
        mappings: vec![MappingSet::new(
            "awol",
            &[
                ("Day 1", "1d"),
                ("Day 3", "3d"),
                ("Day 5", "5d"),
                ("Day 10", "10d"),
                ("Day 15", "15d"),
                ("Day 20", "20d"),
                ("Day 30", "30d"),
                ("Day 40", "40d"),
            ],
        )],
        mapping_rules: Vec::new(),
        default_mapping: "awol".into(),
        sections: vec![
            section("inactive7", "inactive 7", 3),
            section("inactive14", "inactive 14", 11),
            section("inactive22", "inactive 22", 27),
            section("inactive31", "inactive 31+", 43),
        ],
        section_rules: vec![
            SelectionRule::any(RuleSource::FileName, &["inactive7"], "inactive7"),
            SelectionRule::any(RuleSource::FileName, &["inactive14"], "inactive14"),
            SelectionRule::any(RuleSource::FileName, &["inactive22"], "inactive22"),
            SelectionRule::any(RuleSource::FileName, &["inactive31"], "inactive31"),
        ],
        default_section: None,
        layout: SheetLayout {
            sheet_title: "AWOL Chains".into(),
            week_columns: columns(&["K", "J", "I", "H", "G", "F"]),
            header_row: 1,
            week_header: WeekHeader::Stacked,
            total_column: Some("L".into()),
            metrics: vec![
                count(Counter::Sent, "Sent"),
                count(Counter::Delivered, "Delivered"),
                count(Counter::Opened, "Opened"),
                count(Counter::Clicked, "Clicked"),
                count(Counter::Unsubscribed, "Unsubscribed"),
                percent(Ratio::Delivered, "% Delivered"),
                percent(Ratio::Open, "% Open"),
                percent(Ratio::Click, "% Click"),
            ],
            metric_label_column: Some("E".into()),
            campaign_column: "B".into(),
            block_labels: BlockLabels {
                template_column: Some("D".into()),
                constants: vec![("C".into(), " All Mail".into())],
                campaign_per_block: true,
                ..Default::default()
            },
            placement: Placement::Flow {
                skip_inactive: true,
                gap_rows: 0,
            },
            labels: Vec::new(),
            banners: Vec::new(),
            column_widths: vec![("B".into(), 16.0), ("E".into(), 14.0)],
        },
        patch: Some(PatchSpec {
            sheet_name: "AWOL Chains Sport".into(),
            campaign_column: "B".into(),
            label_columns: columns(&["D"]),
            source_label_column: "D".into(),
            label_aliases: Vec::new(),
            metric_offsets: (0..8).collect(),
            search_window: 100,
            reference_column: "BE".into(),
            format_policy: FormatPolicy::SkipFormulaCells,
            week_targets: master_week_targets(),
        }),
    }
}

pub fn builtin_variants() -> Vec<ReportVariant> {
    vec![ab_report(), casino_ret(), awol()]
}
