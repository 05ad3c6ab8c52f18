//! campaign-report: weekly campaign report generator.
//!
//! Turns campaign event exports into fixed-layout xlsx reports and can merge
//! one week of a fresh report into an existing master workbook.

use campaign_core::config::{AppConfig, LoggingConfig};
use campaign_core::VariantRegistry;
use campaign_reporting::ingest::{read_csv, summarize};
use campaign_reporting::ratio::format_percent;
use campaign_reporting::{generate_report, RatioMetrics, ReportJob, ReportSummary};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "campaign-report")]
#[command(about = "Generate weekly campaign reports and patch master workbooks")]
#[command(version)]
struct Cli {
    /// Debug logging (overrides the configured filter)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: campaign-report.toml when present)
    #[arg(long, global = true, env = "CAMPAIGN_REPORT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a report from one or more CSV exports
    Generate {
        /// Input CSV file(s), comma-separated
        inputs: String,

        /// Output xlsx path
        output: PathBuf,

        /// Report type (default from config)
        #[arg(short = 't', long)]
        report_type: Option<String>,

        /// Existing master workbook to merge one week into
        #[arg(long)]
        existing_excel: Option<PathBuf>,

        /// Week selector to replace in the master, e.g. 03
        #[arg(long)]
        replace_week: Option<String>,

        /// Extra report type definition (JSON), repeatable
        #[arg(long = "variant-file")]
        variant_files: Vec<PathBuf>,
    },

    /// List available report types
    ListReports,

    /// Summarize a CSV export without generating a report
    Inspect {
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default = if verbose {
        "campaign_report=debug,campaign_reporting=debug".to_string()
    } else {
        logging.filter.clone()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_registry(config: &AppConfig, extra: &[PathBuf]) -> anyhow::Result<VariantRegistry> {
    let mut registry = VariantRegistry::builtin();
    let configured = config.variant_files.iter().map(PathBuf::from);
    for path in configured.chain(extra.iter().cloned()) {
        registry.register_file(&path)?;
    }
    Ok(registry)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit config file must load; the default one is optional.
    let (config, config_error) = match &cli.config {
        Some(path) => (AppConfig::load_from(path, true)?, None),
        None => match AppConfig::load() {
            Ok(config) => (config, None),
            Err(e) => (AppConfig::default(), Some(e)),
        },
    };
    init_tracing(&config.logging, cli.verbose);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    match cli.command {
        Commands::Generate {
            inputs,
            output,
            report_type,
            existing_excel,
            replace_week,
            variant_files,
        } => {
            let registry = build_registry(&config, &variant_files)?;
            let job = ReportJob {
                report_type: report_type.unwrap_or_else(|| config.default_report_type.clone()),
                inputs: split_inputs(&inputs),
                output,
                master: existing_excel,
                replace_week,
            };
            let summary = generate_report(&registry, &job, &config)?;
            print_summary(&summary);
        }
        Commands::ListReports => {
            let registry = build_registry(&config, &[])?;
            cmd_list_reports(&registry);
        }
        Commands::Inspect { input, json } => cmd_inspect(&input, json)?,
    }
    Ok(())
}

fn split_inputs(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_summary(summary: &ReportSummary) {
    println!("Report written to: {}", summary.output.display());
    println!("  Report type:  {}", summary.report_type);
    println!(
        "  Records:      {} ({} rows skipped)",
        summary.records, summary.skipped_rows
    );
    println!("  Sections:     {}", summary.sections.join(", "));
    println!("  Blocks:       {}", summary.blocks);
    for file in summary.files.iter().filter(|f| f.section.is_none()) {
        println!("  Skipped file: {} (no matching section)", file.name);
    }

    if let Some(patch) = &summary.patch {
        let report = &patch.report;
        println!();
        println!("Updated workbook written to: {}", patch.output.display());
        println!(
            "  Sheet:        {} (week {} -> column {})",
            report.sheet, report.week, report.target_column
        );
        println!("  Cells updated:      {}", report.cells_updated);
        println!("  Formula cells kept: {}", report.formula_cells_kept);
        println!("  Blocks matched:     {}", report.blocks_matched);
        println!("  Ambiguous matches:  {}", report.ambiguous);
        println!("  Rows formatted:     {}", report.rows_formatted);
        for block in &report.unmatched {
            println!("  Not in master: {block}");
        }
    }
}

fn cmd_list_reports(registry: &VariantRegistry) {
    println!("Available report types:");
    for variant in registry.iter() {
        let files = if variant.multi_file { "multi-file" } else { "single file" };
        let patch = variant
            .patch
            .as_ref()
            .map(|p| format!(", patches '{}'", p.sheet_name))
            .unwrap_or_default();
        println!("  {:<12} {} ({files}{patch})", variant.name, variant.description);
    }
}

fn cmd_inspect(input: &Path, json: bool) -> anyhow::Result<()> {
    let source = read_csv(input)?;
    let summary = summarize(&source);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File:         {}", summary.file);
    println!("Records:      {}", summary.records);
    println!("Skipped rows: {}", summary.skipped_rows);
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        println!("Date range:   {first} .. {last}");
    }
    let rates = RatioMetrics::from_counters(&summary.totals);
    println!(
        "Sent:         {} (delivered {}, open {}, click {})",
        summary.totals.sent,
        format_percent(rates.delivered_pct),
        format_percent(rates.open_pct),
        format_percent(rates.click_pct)
    );
    println!("Templates:");
    for (template, count) in &summary.templates {
        println!("  {count:>6}  {template}");
    }
    if !summary.violations.is_empty() {
        println!("Funnel warnings:");
        for v in &summary.violations {
            println!("  row {}: {}: {}", v.index + 1, v.template_name, v.detail);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_inputs() {
        assert_eq!(
            split_inputs("a.csv, b.csv,,c.csv "),
            vec![
                PathBuf::from("a.csv"),
                PathBuf::from("b.csv"),
                PathBuf::from("c.csv")
            ]
        );
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "campaign-report",
            "generate",
            "ret1.csv,ret2.csv",
            "out.xlsx",
            "-t",
            "casino-ret",
            "--existing-excel",
            "master.xlsx",
            "--replace-week",
            "03",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                inputs,
                report_type,
                replace_week,
                ..
            } => {
                assert_eq!(inputs, "ret1.csv,ret2.csv");
                assert_eq!(report_type.as_deref(), Some("casino-ret"));
                assert_eq!(replace_week.as_deref(), Some("03"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
