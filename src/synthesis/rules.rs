//! Cleaning rules given to the model and compiled for offline runs.

use std::fmt;

/// A single cleaning instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleaningRule {
    /// Fill missing values in `column` with its median.
    FillMissingWithMedian { column: String },
    /// Fill missing values in `column` with its mean.
    FillMissingWithMean { column: String },
    /// Fill missing values in `column` with its most frequent value.
    FillMissingWithMode { column: String },
    /// Remove `column` when present.
    DropColumnIfExists { column: String },
    /// Remove rows with a missing value in `column`, or in any column.
    DropRowsWithMissing { column: Option<String> },
    /// Remove rows equal to an earlier row.
    DropDuplicateRows,
}

impl CleaningRule {
    /// One-line instruction for the prompt.
    pub fn sentence(&self) -> String {
        match self {
            Self::FillMissingWithMedian { column } => format!(
                "For all rows missing the {}, fill it with the median {}.",
                column, column
            ),
            Self::FillMissingWithMean { column } => format!(
                "For all rows missing the {}, fill it with the mean {}.",
                column, column
            ),
            Self::FillMissingWithMode { column } => format!(
                "For all rows missing the {}, fill it with the most frequent {}.",
                column, column
            ),
            Self::DropColumnIfExists { column } => {
                format!("Drop the column '{}' if it exists.", column)
            }
            Self::DropRowsWithMissing { column: Some(column) } => {
                format!("Drop rows where '{}' is missing.", column)
            }
            Self::DropRowsWithMissing { column: None } => {
                "Drop rows with any missing value.".to_string()
            }
            Self::DropDuplicateRows => "Drop duplicate rows, if any.".to_string(),
        }
    }

    /// The equivalent cleaning-language statement.
    pub fn to_statement(&self) -> String {
        match self {
            Self::FillMissingWithMedian { column } => {
                let col = quote(column);
                format!("df = df.fill_missing({}, df.median({}))", col, col)
            }
            Self::FillMissingWithMean { column } => {
                let col = quote(column);
                format!("df = df.fill_missing({}, df.mean({}))", col, col)
            }
            Self::FillMissingWithMode { column } => {
                let col = quote(column);
                format!("df = df.fill_missing({}, df.mode({}))", col, col)
            }
            Self::DropColumnIfExists { column } => {
                format!("df = df.drop_column_if_exists({})", quote(column))
            }
            Self::DropRowsWithMissing { column: Some(column) } => {
                format!("df = df.drop_missing({})", quote(column))
            }
            Self::DropRowsWithMissing { column: None } => "df = df.drop_missing()".to_string(),
            Self::DropDuplicateRows => "df = df.drop_duplicates()".to_string(),
        }
    }
}

impl fmt::Display for CleaningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sentence())
    }
}

/// Ordered list of cleaning rules.
///
/// The default set fills missing `Age` with the median, drops `Cabin` and
/// removes duplicate rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningRules {
    rules: Vec<CleaningRule>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self::new()
            .with_rule(CleaningRule::FillMissingWithMedian {
                column: "Age".to_string(),
            })
            .with_rule(CleaningRule::DropColumnIfExists {
                column: "Cabin".to_string(),
            })
            .with_rule(CleaningRule::DropDuplicateRows)
    }
}

impl CleaningRules {
    /// An empty rule set.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: CleaningRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: CleaningRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[CleaningRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules as a numbered list, one per line, starting at 1.
    pub fn numbered(&self) -> String {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| format!("{}. {}", i + 1, rule.sentence()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Compiles the rules into a cleaning-language procedure.
    pub fn to_script(&self) -> String {
        self.rules
            .iter()
            .map(CleaningRule::to_statement)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<CleaningRule> for CleaningRules {
    fn from_iter<I: IntoIterator<Item = CleaningRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// Double-quoted string literal with `\` and `"` escaped.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_numbered() {
        let rules = CleaningRules::default();
        assert_eq!(
            rules.numbered(),
            "1. For all rows missing the Age, fill it with the median Age.\n\
             2. Drop the column 'Cabin' if it exists.\n\
             3. Drop duplicate rows, if any."
        );
    }

    #[test]
    fn test_default_rules_script() {
        assert_eq!(
            CleaningRules::default().to_script(),
            "df = df.fill_missing(\"Age\", df.median(\"Age\"))\n\
             df = df.drop_column_if_exists(\"Cabin\")\n\
             df = df.drop_duplicates()"
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn test_drop_missing_statements() {
        let rules: CleaningRules = vec![
            CleaningRule::DropRowsWithMissing { column: None },
            CleaningRule::DropRowsWithMissing {
                column: Some("Fare".to_string()),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.to_script(),
            "df = df.drop_missing()\ndf = df.drop_missing(\"Fare\")"
        );
    }

    #[test]
    fn test_empty_rules() {
        let rules = CleaningRules::new();
        assert!(rules.is_empty());
        assert_eq!(rules.to_script(), "");
        assert_eq!(rules.numbered(), "");
    }
}
