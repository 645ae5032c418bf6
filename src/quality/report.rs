//! Issue report computed from a dataset.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::dataset::DataSet;

/// Data-quality findings for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueReport {
    /// Missing-value count per column, in column order.
    #[serde(serialize_with = "serialize_counts")]
    missing_values: Vec<(String, usize)>,
    /// Rows equal to some earlier row.
    duplicates: usize,
    /// `(rows, columns)`.
    shape: (usize, usize),
}

impl IssueReport {
    /// Profiles `dataset`. Pure: the same dataset always yields the same report.
    pub fn from_dataset(dataset: &DataSet) -> Self {
        Self {
            missing_values: dataset.missing_counts(),
            duplicates: dataset.duplicate_row_count(),
            shape: dataset.shape(),
        }
    }

    pub fn missing_values(&self) -> &[(String, usize)] {
        &self.missing_values
    }

    /// Missing count for `column`, or `None` if the column was not profiled.
    pub fn missing_for(&self, column: &str) -> Option<usize> {
        self.missing_values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, count)| *count)
    }

    pub fn total_missing(&self) -> usize {
        self.missing_values.iter().map(|(_, count)| count).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Whether anything in the report calls for cleaning.
    pub fn has_issues(&self) -> bool {
        self.total_missing() > 0 || self.duplicates > 0
    }

    /// Stable JSON encoding, with columns in dataset order.
    ///
    /// ```
    /// use datawash::dataset::{Column, DataSet};
    /// use datawash::quality::IssueReport;
    ///
    /// let ds = DataSet::new(vec![Column::int64("Age", vec![None, Some(3)])]).unwrap();
    /// assert_eq!(
    ///     IssueReport::from_dataset(&ds).render(),
    ///     r#"{"missing_values":{"Age":1},"duplicates":0,"shape":[2,1]}"#
    /// );
    /// ```
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Writes `(column, count)` pairs as a JSON object that keeps their order.
fn serialize_counts<S>(counts: &[(String, usize)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(counts.len()))?;
    for (name, count) in counts {
        map.serialize_entry(name, count)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn three_rows() -> DataSet {
        DataSet::new(vec![
            Column::int64("PassengerId", vec![Some(1), Some(2), Some(2)]),
            Column::float64("Age", vec![None, Some(38.0), Some(38.0)]),
            Column::utf8("Cabin", vec![Some("B5"), Some("C85"), Some("C85")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_report_counts() {
        let report = IssueReport::from_dataset(&three_rows());
        assert_eq!(report.missing_for("Age"), Some(1));
        assert_eq!(report.missing_for("Cabin"), Some(0));
        assert_eq!(report.missing_for("Fare"), None);
        assert_eq!(report.duplicates(), 1);
        assert_eq!(report.shape(), (3, 3));
        assert_eq!(report.total_missing(), 1);
        assert!(report.has_issues());
    }

    #[test]
    fn test_render_is_deterministic() {
        let ds = three_rows();
        let first = IssueReport::from_dataset(&ds).render();
        for _ in 0..10 {
            assert_eq!(IssueReport::from_dataset(&ds).render(), first);
        }
        assert_eq!(
            first,
            r#"{"missing_values":{"PassengerId":0,"Age":1,"Cabin":0},"duplicates":1,"shape":[3,3]}"#
        );
    }

    #[test]
    fn test_render_is_valid_json() {
        let ds = DataSet::new(vec![Column::utf8("weird \"name\"", vec![None])]).unwrap();
        let rendered = IssueReport::from_dataset(&ds).render();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["missing_values"]["weird \"name\""], 1);
        assert_eq!(parsed["shape"][0], 1);
    }

    #[test]
    fn test_serialize_keeps_column_order() {
        let ds = DataSet::new(vec![
            Column::int64("z", vec![None]),
            Column::int64("a", vec![Some(1)]),
            Column::utf8("m\\n", vec![None]),
        ])
        .unwrap();
        let report = IssueReport::from_dataset(&ds);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["duplicates"], 0);
        assert_eq!(value["shape"], serde_json::json!([1, 3]));
        assert_eq!(
            report.render(),
            r#"{"missing_values":{"z":1,"a":0,"m\\n":1},"duplicates":0,"shape":[1,3]}"#
        );
        assert_eq!(report.to_string(), report.render());
    }

    #[test]
    fn test_clean_dataset_has_no_issues() {
        let ds = DataSet::new(vec![Column::int64("a", vec![Some(1), Some(2)])]).unwrap();
        let report = IssueReport::from_dataset(&ds);
        assert!(!report.has_issues());
    }
}
