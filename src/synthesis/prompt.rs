//! Prompt construction for cleaning-procedure synthesis.

use crate::quality::IssueReport;

use super::rules::CleaningRules;

/// System message for every synthesis request.
pub const SYSTEM_PROMPT: &str = "You are a data quality agent in a pipeline.";

/// Reference for the cleaning language the procedure must be written in.
pub const LANGUAGE_REFERENCE: &str = r#"Language reference:
- One statement per line (or separated by ';'). A statement is `name = expression` or a bare expression.
- The dataset is bound to `df`. Its final value is the cleaned dataset, so assign results back to `df`.
- Literals: "text" or 'text', numbers, true, false, null, lists like ["A", "B"].
- Table methods never modify `df` in place; each returns a new table or a value:
    df.fill_missing(column, value)      fill missing cells in a column
    df.median(column)                   median of a numeric column
    df.mean(column)                     mean of a numeric column
    df.mode(column)                     most frequent value of a column
    df.drop_column(column)              remove a column (error if absent)
    df.drop_column_if_exists(column)    remove a column when present
    df.drop_columns([columns])          remove several columns (error if any is absent)
    df.drop_duplicates()                remove rows equal to an earlier row
    df.drop_missing()                   remove rows with any missing cell
    df.drop_missing(column)             remove rows missing a value in one column
    df.rename_column(old, new)          rename a column
    df.has_column(column)               true when the column exists
    df.row_count(), df.column_count(), df.missing_count(column)
- Every method is also available as `table.method(df, ...)`.
- There are no loops, conditionals, imports, files or network access."#;

/// System and user messages for one synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningPrompt {
    pub system: String,
    pub user: String,
}

impl CleaningPrompt {
    /// Builds the prompt for `report`, embedding its rendered form verbatim.
    pub fn build(report: &IssueReport, rules: &CleaningRules) -> Self {
        let rules_section = if rules.is_empty() {
            "Fix the issues above as you see fit.".to_string()
        } else {
            rules.numbered()
        };

        let user = format!(
            "{system}\n\n\
             The dataset has the following issues:\n{report}\n\n\
             Write a cleaning procedure for the dataset (variable name: df).\n\
             Rules:\n{rules}\n\n\
             {reference}\n\n\
             Note:\n\
             - The procedure is run by a sandboxed interpreter for the language above.\n\
             - Ensure the procedure is syntactically valid and does not include markdown, comments, or explanations.\n\
             - Do not return anything other than the procedure itself.",
            system = SYSTEM_PROMPT,
            report = report.render(),
            rules = rules_section,
            reference = LANGUAGE_REFERENCE,
        );

        Self {
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }
}
