// File: src/scoring.rs
use crate::core::types::{Condition, Strategy, TaggedMessage};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Correct / total token counts for one subgroup under one condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub correct: u64,
    pub total: u64,
}

impl Tally {
    fn add(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    /// Accuracy in percent, or `None` for an empty subgroup.
    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f64 / self.total as f64 * 100.0)
        }
    }
}

/// One tally per condition over the same set of tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionScores {
    pub lower: Tally,
    pub upper: Tally,
    pub baseline: Tally,
}

impl ConditionScores {
    pub fn get(&self, condition: Condition) -> &Tally {
        match condition {
            Condition::Lower => &self.lower,
            Condition::Upper => &self.upper,
            Condition::Baseline => &self.baseline,
        }
    }

    fn get_mut(&mut self, condition: Condition) -> &mut Tally {
        match condition {
            Condition::Lower => &mut self.lower,
            Condition::Upper => &mut self.upper,
            Condition::Baseline => &mut self.baseline,
        }
    }

    fn add_to(&mut self, condition: Condition, correct: bool) {
        self.get_mut(condition).add(correct);
    }

    /// Number of tokens scored. Identical for every condition.
    pub fn tokens(&self) -> u64 {
        self.lower.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyScores {
    pub unique: ConditionScores,
    pub ambiguous: ConditionScores,
    pub new: ConditionScores,
}

impl StrategyScores {
    pub fn get(&self, strategy: Strategy) -> &ConditionScores {
        match strategy {
            Strategy::Unique => &self.unique,
            Strategy::Ambiguous => &self.ambiguous,
            Strategy::New => &self.new,
        }
    }

    fn get_mut(&mut self, strategy: Strategy) -> &mut ConditionScores {
        match strategy {
            Strategy::Unique => &mut self.unique,
            Strategy::Ambiguous => &mut self.ambiguous,
            Strategy::New => &mut self.new,
        }
    }
}

/// Tagging accuracy of one dataset: overall, per normalization strategy and
/// per gold POS tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub overall: ConditionScores,
    pub by_strategy: StrategyScores,
    pub by_tag: BTreeMap<String, ConditionScores>,
}

/// Scores tagged messages against their gold POS tags. Fails if any
/// message has a tag sequence that does not line up with its records.
pub fn score(messages: &[TaggedMessage]) -> Result<Report> {
    let mut report = Report::default();
    for (index, message) in messages.iter().enumerate() {
        message.verify(index)?;
        for row in message.rows() {
            let strategy = row.record.strategy;
            let gold = &row.record.record.gold_pos;
            for condition in Condition::ALL {
                let correct = row.is_correct(condition);
                report.overall.add_to(condition, correct);
                report.by_strategy.get_mut(strategy).add_to(condition, correct);
                report
                    .by_tag
                    .entry(gold.clone())
                    .or_default()
                    .add_to(condition, correct);
            }
        }
    }
    Ok(report)
}

// --- Rendering -------------------------------------------------------------

/// A titled plain-text table, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub table: String,
}

fn format_accuracy(tally: &Tally) -> String {
    match tally.accuracy() {
        Some(accuracy) => format!("{accuracy:.2}"),
        None => "-".to_string(),
    }
}

/// Lays out rows under a header, first column left-aligned and the rest
/// right-aligned, with a dashed rule under the header.
pub fn format_table(header: &[String], rows: &[Vec<String>]) -> String {
    let columns = header.len();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .take(columns)
            .map(|(i, cell)| {
                if i == 0 {
                    format!("{:<width$}", cell, width = widths[i])
                } else {
                    format!("{:>width$}", cell, width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(header));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

/// One section per condition with Unique / Ambiguous / New / Total rows and
/// an `N` and `Accuracy` column per dataset, then a per-tag section.
pub fn report_sections(datasets: &[(String, Report)]) -> Vec<ReportSection> {
    let mut sections = Vec::new();

    let mut header = vec!["Case".to_string()];
    for (name, _) in datasets {
        header.push(format!("N ({name})"));
        header.push(format!("Accuracy ({name})"));
    }

    for condition in Condition::ALL {
        let mut rows = Vec::new();
        for strategy in Strategy::ALL {
            let mut row = vec![capitalize(strategy.name())];
            for (_, report) in datasets {
                let scores = report.by_strategy.get(strategy);
                row.push(scores.tokens().to_string());
                row.push(format_accuracy(scores.get(condition)));
            }
            rows.push(row);
        }
        let mut total = vec!["Total".to_string()];
        for (_, report) in datasets {
            total.push(report.overall.tokens().to_string());
            total.push(format_accuracy(report.overall.get(condition)));
        }
        rows.push(total);

        sections.push(ReportSection {
            title: format!("{}:", condition.label()),
            table: format_table(&header, &rows),
        });
    }

    let mut tags: Vec<&str> = datasets
        .iter()
        .flat_map(|(_, report)| report.by_tag.keys().map(String::as_str))
        .collect();
    tags.sort_unstable();
    tags.dedup();

    let mut tag_header = vec!["Gold tag".to_string()];
    for (name, _) in datasets {
        tag_header.push(format!("N ({name})"));
        for condition in Condition::ALL {
            tag_header.push(format!("{} ({name})", short_label(condition)));
        }
    }
    let empty = ConditionScores::default();
    let tag_rows: Vec<Vec<String>> = tags
        .iter()
        .map(|tag| {
            let mut row = vec![tag.to_string()];
            for (_, report) in datasets {
                let scores = report.by_tag.get(*tag).unwrap_or(&empty);
                row.push(scores.tokens().to_string());
                for condition in Condition::ALL {
                    row.push(format_accuracy(scores.get(condition)));
                }
            }
            row
        })
        .collect();
    sections.push(ReportSection {
        title: "Accuracy by gold tag:".to_string(),
        table: format_table(&tag_header, &tag_rows),
    });

    sections
}

/// The whole report as plain text.
pub fn render_report(datasets: &[(String, Report)]) -> String {
    report_sections(datasets)
        .iter()
        .map(|section| format!("{}\n\n{}", section.title, section.table))
        .collect::<Vec<_>>()
        .join("\n")
}

fn short_label(condition: Condition) -> &'static str {
    match condition {
        Condition::Lower => "LB",
        Condition::Upper => "UB",
        Condition::Baseline => "BL",
    }
}

/// Upper-cases the first character: `unique` -> `Unique`.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PredictedRecord, TokenRecord};
    use crate::error::NormError;

    fn row(strategy: Strategy, gold: &str) -> PredictedRecord {
        PredictedRecord {
            record: TokenRecord::new("w", "w", gold),
            strategy,
            predicted_normalization: "w".to_string(),
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Vec<TaggedMessage> {
        vec![
            TaggedMessage {
                records: vec![
                    row(Strategy::Unique, "PPER"),
                    row(Strategy::Ambiguous, "VAFIN"),
                ],
                tags_lower: tags(&["PPER", "NN"]),
                tags_upper: tags(&["PPER", "VAFIN"]),
                tags_baseline: tags(&["PPER", "NN"]),
            },
            TaggedMessage {
                records: vec![row(Strategy::New, "NN"), row(Strategy::Unique, "PPER")],
                tags_lower: tags(&["NE", "NE"]),
                tags_upper: tags(&["NN", "PPER"]),
                tags_baseline: tags(&["NE", "PPER"]),
            },
        ]
    }

    #[test]
    fn test_overall_accuracy_per_condition() {
        let report = score(&sample()).unwrap();
        assert_eq!(report.overall.lower, Tally { correct: 1, total: 4 });
        assert_eq!(report.overall.upper, Tally { correct: 4, total: 4 });
        assert_eq!(report.overall.baseline, Tally { correct: 2, total: 4 });
        assert_eq!(report.overall.baseline.accuracy(), Some(50.0));
    }

    #[test]
    fn test_per_strategy_accuracy() {
        let report = score(&sample()).unwrap();
        let unique = report.by_strategy.get(Strategy::Unique);
        assert_eq!(unique.tokens(), 2);
        assert_eq!(unique.lower, Tally { correct: 1, total: 2 });
        assert_eq!(unique.baseline, Tally { correct: 2, total: 2 });

        let new = report.by_strategy.get(Strategy::New);
        assert_eq!(new.baseline, Tally { correct: 0, total: 1 });
        assert_eq!(new.upper.accuracy(), Some(100.0));
    }

    #[test]
    fn test_per_tag_breakdown() {
        let report = score(&sample()).unwrap();
        let pper = &report.by_tag["PPER"];
        assert_eq!(pper.tokens(), 2);
        assert_eq!(pper.lower.correct, 1);
        assert_eq!(report.by_tag.len(), 3);
    }

    #[test]
    fn test_scoring_is_repeatable() {
        let messages = sample();
        assert_eq!(score(&messages).unwrap(), score(&messages).unwrap());
    }

    #[test]
    fn test_misaligned_message_is_rejected() {
        let mut messages = sample();
        messages[1].tags_upper.pop();
        match score(&messages) {
            Err(NormError::LengthMismatch { what, expected, actual }) => {
                assert!(what.contains("message 2"));
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_group_has_no_accuracy() {
        let report = score(&[]).unwrap();
        assert_eq!(report.overall.lower.accuracy(), None);
        let text = render_report(&[("Dev".to_string(), report)]);
        assert!(text.contains("Total"));
        assert!(text.contains('-'));
    }

    #[test]
    fn test_render_has_one_table_per_condition() {
        let dev = score(&sample()).unwrap();
        let test = score(&sample()[..1]).unwrap();
        let sections = report_sections(&[("Dev".to_string(), dev), ("Test".to_string(), test)]);

        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Lower bound:", "Upper bound:", "Baseline:", "Accuracy by gold tag:"]
        );

        let baseline = &sections[2].table;
        assert!(baseline.starts_with("Case"));
        assert!(baseline.contains("Accuracy (Test)"));
        let total = baseline.lines().find(|l| l.starts_with("Total")).unwrap();
        let cells: Vec<&str> = total.split_whitespace().collect();
        assert_eq!(cells, vec!["Total", "4", "50.00", "2", "50.00"]);
    }

    #[test]
    fn test_format_table_alignment() {
        let table = format_table(
            &tags(&["Case", "N"]),
            &[tags(&["Unique", "3"]), tags(&["New", "12"])],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Case     N");
        assert_eq!(lines[1], "------  --");
        assert_eq!(lines[2], "Unique   3");
        assert_eq!(lines[3], "New     12");
    }
}
