//! Per-file choice of template table and report section inside a variant.
//!
//! Content rules (campaign name, known template names) are tried before
//! file-name rules; within each group the first matching rule wins and the
//! variant's declared default applies when nothing matches.

use campaign_core::variant::{MappingSet, RuleSource, SectionSpec, SelectionRule};
use campaign_core::{MetricRecord, ReportError, ReportResult, ReportVariant};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Content,
    FileName,
    Default,
}

#[derive(Debug, Clone)]
pub struct Classification<'a> {
    pub mapping: &'a MappingSet,
    pub mapping_source: Decision,
    /// `None` when no rule claims the file and the variant has no default.
    pub section: Option<&'a SectionSpec>,
    pub section_source: Decision,
}

fn first_campaign(records: &[MetricRecord]) -> Option<&str> {
    records
        .iter()
        .map(|r| r.campaign_name.trim())
        .find(|name| !name.is_empty())
}

fn first_template<'r>(records: &'r [MetricRecord], known: Option<&MappingSet>) -> Option<&'r str> {
    records
        .iter()
        .map(|r| r.template_name.as_str())
        .find(|name| known.map_or(!name.trim().is_empty(), |m| m.resolve(name).is_some()))
}

/// Target of the first matching rule, content rules first.
fn select<'r>(
    rules: &'r [SelectionRule],
    file_name: &str,
    records: &[MetricRecord],
    known: Option<&MappingSet>,
) -> Option<(&'r str, Decision)> {
    let content = rules.iter().filter(|r| r.source != RuleSource::FileName).find(|rule| {
        let text = match rule.source {
            RuleSource::CampaignName => first_campaign(records),
            RuleSource::TemplateName => first_template(records, known),
            RuleSource::FileName => None,
        };
        text.is_some_and(|t| rule.matches_text(t))
    });
    if let Some(rule) = content {
        return Some((rule.target.as_str(), Decision::Content));
    }
    rules
        .iter()
        .filter(|r| r.source == RuleSource::FileName)
        .find(|rule| rule.matches_text(file_name))
        .map(|rule| (rule.target.as_str(), Decision::FileName))
}

pub fn classify<'a>(
    variant: &'a ReportVariant,
    file_name: &str,
    records: &[MetricRecord],
) -> ReportResult<Classification<'a>> {
    let (mapping, mapping_source) = select(&variant.mapping_rules, file_name, records, None)
        .and_then(|(target, source)| variant.mapping(target).map(|m| (m, source)))
        .or_else(|| {
            variant
                .mapping(&variant.default_mapping)
                .map(|m| (m, Decision::Default))
        })
        .ok_or_else(|| {
            ReportError::Validation(format!(
                "{}: unknown default mapping '{}'",
                variant.name, variant.default_mapping
            ))
        })?;

    let (section, section_source) =
        match select(&variant.section_rules, file_name, records, Some(mapping)) {
            Some((target, source)) => (variant.section(target), source),
            None => (
                variant
                    .default_section
                    .as_deref()
                    .and_then(|key| variant.section(key)),
                Decision::Default,
            ),
        };

    debug!(
        file = file_name,
        mapping = %mapping.name,
        ?mapping_source,
        section = section.map(|s| s.key.as_str()),
        ?section_source,
        "Classified input file"
    );
    Ok(Classification {
        mapping,
        mapping_source,
        section,
        section_source,
    })
}
