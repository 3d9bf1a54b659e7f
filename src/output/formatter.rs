use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::error::Diagnostic;
use crate::model::{Model, Range};
use crate::scoring::ScoreResult;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a CHF score with four decimals.
/// If incomplete is true, appends asterisk to indicate missing indicator values
pub fn format_score(score: f64, incomplete: bool) -> String {
    if incomplete {
        format!("{:.4}*", score)
    } else {
        format!("{:.4}", score)
    }
}

/// Format scores as a table with columns: Unit, Year, Stratum, CHF
/// `limit` caps the number of rows shown.
pub fn format_results_table(results: &[ScoreResult], use_colors: bool, limit: Option<usize>) -> String {
    if results.is_empty() {
        return "No scores produced.".to_string();
    }

    let unit_width = results
        .iter()
        .map(|r| r.unit_id.0.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let strata_width = results
        .iter()
        .map(|r| r.strata_id.0.chars().count())
        .max()
        .unwrap_or(0)
        .max(7);
    let score_width = 10;

    let header = format!(
        "{:<unit_width$}  {:>4}  {:<strata_width$}  {:>score_width$}",
        "Unit", "Year", "Stratum", "CHF"
    );
    let mut lines = vec![if use_colors {
        header.bold().to_string()
    } else {
        header
    }];

    let shown = limit.unwrap_or(results.len()).min(results.len());
    for result in &results[..shown] {
        let score = format!(
            "{:>score_width$}",
            format_score(result.score, result.incomplete)
        );
        let line = format!(
            "{:<unit_width$}  {:>4}  {:<strata_width$}  ",
            result.unit_id.0, result.year, result.strata_id.0
        );
        if use_colors {
            lines.push(format!("{}{}", line, score.cyan()));
        } else {
            lines.push(format!("{}{}", line, score));
        }
    }

    if shown < results.len() {
        lines.push(format!("... {} more rows", results.len() - shown));
    }

    lines.join("\n")
}

/// Format one score with its per-indicator contributions (for verbose mode)
pub fn format_breakdown(result: &ScoreResult, use_colors: bool) -> String {
    let title = format!(
        "{} {} (stratum {}): {}",
        result.unit_id,
        result.year,
        result.strata_id,
        format_score(result.score, result.incomplete)
    );
    let mut lines = vec![if use_colors {
        title.bold().to_string()
    } else {
        title
    }];

    for c in &result.breakdown {
        let normalized = match (c.value, c.normalized) {
            (None, _) => "missing".to_string(),
            (Some(_), None) => "n/a".to_string(),
            (Some(_), Some(n)) => format!("{:.4}", n),
        };
        lines.push(format!(
            "  {:<28} norm {:>8}  w {:.4}  -> {:+.4}",
            c.indicator, normalized, c.weight, c.contribution
        ));
    }

    lines.join("\n")
}

/// Format learned weights, one block per stratum
pub fn format_weights_table(model: &Model, use_colors: bool) -> String {
    if model.is_empty() {
        return "Model has no strata.".to_string();
    }

    let mut blocks = Vec::new();
    for (strata_id, params) in model.iter() {
        let title = format!("Stratum {}", strata_id);
        let mut lines = vec![if use_colors {
            title.bold().to_string()
        } else {
            title
        }];

        for (j, indicator) in model.indicators().iter().enumerate() {
            let range = match params.ranges()[j] {
                Range::Normal { min, max } => format!("[{:.4}, {:.4}]", min, max),
                Range::Degenerate { value } => format!("constant {:.4}", value),
                Range::Unobserved => "no data".to_string(),
            };
            lines.push(format!(
                "  {:<28} {:.4}  {}",
                indicator.name,
                params.weights()[j],
                range
            ));
        }
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}

pub fn format_diagnostic(diagnostic: &Diagnostic, use_colors: bool) -> String {
    if use_colors {
        format!("{} {}", "warning:".yellow().bold(), diagnostic)
    } else {
        format!("warning: {}", diagnostic)
    }
}

/// Format scores as CSV for export
/// Header: unit_id,year,strata_id,chf_score,incomplete
pub fn format_csv(results: &[ScoreResult]) -> String {
    let mut out = String::from("unit_id,year,strata_id,chf_score,incomplete\n");
    for r in results {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(&r.unit_id.0),
            r.year,
            csv_field(&r.strata_id.0),
            r.score,
            r.incomplete
        ));
    }
    out
}

/// Quote a field containing a separator, quote or newline
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::IndicatorContribution;
    use crate::table::{StrataId, UnitId};

    fn sample_result(unit: &str, score: f64, incomplete: bool) -> ScoreResult {
        ScoreResult {
            unit_id: UnitId::from(unit),
            year: 2023,
            strata_id: StrataId::from("101"),
            score,
            incomplete,
            breakdown: vec![
                IndicatorContribution {
                    indicator: "max_ndvi_mean".to_string(),
                    value: Some(0.8),
                    normalized: Some(0.75),
                    weight: 0.4,
                    contribution: 0.3,
                },
                IndicatorContribution {
                    indicator: "max_lswi_mean".to_string(),
                    value: None,
                    normalized: None,
                    weight: 0.6,
                    contribution: 0.0,
                },
            ],
        }
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.5, false), "0.5000");
        assert_eq!(format_score(1.23456, true), "1.2346*");
        assert_eq!(format_score(-0.25, false), "-0.2500");
    }

    #[test]
    fn test_results_table_empty() {
        assert_eq!(format_results_table(&[], false, None), "No scores produced.");
    }

    #[test]
    fn test_results_table_rows() {
        let results = vec![sample_result("U_1", 0.3, true), sample_result("U_22", 0.9, false)];
        let table = format_results_table(&results, false, None);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Unit"));
        assert!(lines[1].starts_with("U_1 "));
        assert!(lines[1].ends_with("0.3000*"));
        assert!(lines[2].contains("2023"));
        assert!(lines[2].ends_with("0.9000"));
    }

    #[test]
    fn test_results_table_limit() {
        let results = vec![
            sample_result("A", 0.1, false),
            sample_result("B", 0.2, false),
            sample_result("C", 0.3, false),
        ];
        let table = format_results_table(&results, false, Some(1));
        assert_eq!(table.lines().count(), 3);
        assert!(table.ends_with("... 2 more rows"));
    }

    #[test]
    fn test_breakdown_marks_missing() {
        let text = format_breakdown(&sample_result("U_1", 0.3, true), false);
        assert!(text.starts_with("U_1 2023 (stratum 101): 0.3000*"));
        assert!(text.contains("max_ndvi_mean"));
        assert!(text.contains("missing"));
        assert!(text.contains("+0.3000"));
    }

    #[test]
    fn test_csv_export() {
        let csv = format_csv(&[sample_result("U_1", 0.3, true), sample_result("a,b", 0.5, false)]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "unit_id,year,strata_id,chf_score,incomplete");
        assert_eq!(lines[1], "U_1,2023,101,0.3,true");
        assert_eq!(lines[2], "\"a,b\",2023,101,0.5,false");
    }

    #[test]
    fn test_diagnostic_plain() {
        let d = Diagnostic::DegenerateStratum {
            strata_id: StrataId::from("7"),
        };
        assert!(format_diagnostic(&d, false).starts_with("warning: stratum 7 is degenerate"));
    }
}
