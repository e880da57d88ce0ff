use thiserror::Error;

/// Why an analysis produced no result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("insufficient data for {what}: need {needed} points, got {got}")]
    InsufficientData {
        what: String,
        needed: usize,
        got: usize,
    },

    #[error("symbol '{0}' is not in the bundle")]
    MissingSymbol(String),

    #[error("no valid data for {0}")]
    NoValidData(String),
}

impl AnalysisError {
    /// Missing, short or all-NaN data. Degrades a task to a warning.
    pub fn is_data_shortage(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. }
                | AnalysisError::MissingSymbol(_)
                | AnalysisError::NoValidData(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_is_a_data_shortage() {
        let errors = [
            AnalysisError::InsufficientData {
                what: "^VIX".into(),
                needed: 30,
                got: 4,
            },
            AnalysisError::MissingSymbol("^HSI".into()),
            AnalysisError::NoValidData("CNY=X".into()),
        ];
        assert!(errors.iter().all(AnalysisError::is_data_shortage));
    }
}
