use crate::spreadsheet::range::Range;
use glob::Pattern;

/// Criteria for selecting sheets and cells from spreadsheets.
#[derive(Clone, Debug, Default)]
pub(crate) struct Criteria {
    /// Sheet name patterns for filtering which sheets to process.
    pub(crate) sheet_name_patterns: Option<Vec<Pattern>>,

    /// Cell range within sheets to load.
    pub(crate) range: Option<Range>,
}

impl Criteria {
    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }

    /// Keeps the sheet names accepted by the patterns, in workbook order.
    pub(crate) fn select_sheets(&self, sheet_names: Vec<String>) -> Vec<String> {
        sheet_names
            .into_iter()
            .filter(|sheet_name| self.accept(sheet_name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_sheet_patterns() -> Result<(), glob::PatternError> {
        let criteria = Criteria::default();
        assert!(criteria.accept("anything"));

        let criteria = Criteria {
            sheet_name_patterns: Some(vec![Pattern::new("Sales*")?, Pattern::new("Q[1-2]")?]),
            range: None,
        };
        assert!(criteria.accept("Sales 2024"));
        assert!(criteria.accept("Q2"));
        assert!(!criteria.accept("Q3"));
        let names = vec!["Q1".to_owned(), "Notes".to_owned(), "Sales".to_owned()];
        assert_eq!(criteria.select_sheets(names), vec!["Q1".to_owned(), "Sales".to_owned()]);
        Ok(())
    }
}
