//! Final report synthesis.
//!
//! The report is a single line so it fits in one progress message: lines
//! are joined with [`NEWLINE_TOKEN`] and a rationale is attached to its
//! line with [`REASON_TOKEN`].

use crate::model::{rationale, ExecutionSummary};

pub const NEWLINE_TOKEN: &str = "||NEWLINE||";
pub const REASON_TOKEN: &str = "||REASON||";

fn quoted(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("“{value}”"))
        .collect::<Vec<_>>()
        .join("、")
}

fn with_reason(line: String, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("{line}{REASON_TOKEN}{reason}"),
        None => line,
    }
}

/// Builds the report. Sections without selections are left out together
/// with their rationale.
pub fn synthesize(summary: &ExecutionSummary) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !summary.keywords.is_empty() {
        lines.push(with_reason(
            format!("Keywords: {}", quoted(&summary.keywords)),
            summary.rationale(rationale::KEYWORDS),
        ));
    }

    if !summary.regions.is_empty() {
        lines.push(with_reason(
            format!("Regions: {}", quoted(&summary.regions)),
            summary.rationale(rationale::REGIONS),
        ));
    }

    let checkbox_lines: Vec<String> = summary
        .checkboxes
        .iter()
        .filter(|group| !group.labels.is_empty())
        .map(|group| format!("{}: checked {}", group.category, quoted(&group.labels)))
        .collect();
    push_section(
        &mut lines,
        checkbox_lines,
        summary.rationale(rationale::CHECKBOXES),
    );

    let mut dropdown_lines: Vec<String> = Vec::new();
    let mut categories: Vec<&str> = Vec::new();
    for menu in summary.dropdowns.iter().filter(|m| !m.values.is_empty()) {
        if !categories.contains(&menu.category.as_str()) {
            categories.push(&menu.category);
        }
    }
    for category in categories {
        dropdown_lines.push(format!("{category}:"));
        let menus = summary
            .dropdowns
            .iter()
            .filter(|m| m.category == category && !m.values.is_empty());
        for (idx, menu) in menus.enumerate() {
            dropdown_lines.push(format!(
                "{}、{}: selected {}",
                idx + 1,
                menu.menu,
                quoted(&menu.values)
            ));
        }
    }
    push_section(
        &mut lines,
        dropdown_lines,
        summary.rationale(rationale::DROPDOWNS),
    );

    if !summary.taxonomy.is_empty() {
        lines.push(with_reason(
            format!("Industries: {}", quoted(&summary.taxonomy)),
            industry_reason(summary).as_deref(),
        ));
    }

    lines.join(NEWLINE_TOKEN)
}

fn push_section(lines: &mut Vec<String>, mut section: Vec<String>, reason: Option<&str>) {
    if let (Some(last), Some(reason)) = (section.last_mut(), reason) {
        last.push_str(REASON_TOKEN);
        last.push_str(reason);
    }
    lines.extend(section);
}

fn industry_reason(summary: &ExecutionSummary) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(top) = summary.rationale(rationale::INDUSTRY_TOP_LEVEL) {
        parts.push(format!("[top level] {top}"));
    }
    for (key, text) in &summary.rationales {
        if key == rationale::INDUSTRY_TOP_LEVEL || text.trim().is_empty() {
            continue;
        }
        if let Some(category) = key.strip_prefix(rationale::INDUSTRY_PREFIX) {
            parts.push(format!("[{category}] {text}"));
        }
    }
    (!parts.is_empty()).then(|| parts.join("；"))
}

/// Readable multi-line form: separators become line breaks and rationales
/// a bracketed annotation.
pub fn render_readable(report: &str) -> String {
    report
        .split(NEWLINE_TOKEN)
        .map(|line| match line.split_once(REASON_TOKEN) {
            Some((text, reason)) if text.trim().is_empty() => format!("[rationale: {reason}]"),
            Some((text, reason)) => format!("{text} [rationale: {reason}]"),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
