// Typed failures the pipeline reports to its caller.
//
// Most of the crate returns anyhow::Result. The variants here are the ones a
// caller needs to tell apart: a malformed input database aborts the run,
// while a ranking failure leaves the edge table usable.
// Data-integrity gaps are not errors at all; they are counted in
// graph::interactions::Diagnostics.

/// A failure that callers can match on (via `anyhow::Error::downcast_ref`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("required table `{table}` is missing from the input database")]
    MissingTable { table: String },

    #[error("table `{table}` is missing required columns: {}", missing.join(", "))]
    SchemaViolation { table: String, missing: Vec<String> },

    #[error("half-life must be a positive, finite number of seconds, got {seconds}")]
    InvalidHalfLife { seconds: f64 },

    #[error("influence ranking is undefined for a graph with no edges")]
    EmptyGraph,

    #[error("eigenvector centrality did not converge within {iterations} iterations (tolerance {tolerance})")]
    DidNotConverge { iterations: usize, tolerance: f64 },
}

impl PipelineError {
    /// Whether this failure aborts a run before any output is produced.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingTable { .. }
                | PipelineError::SchemaViolation { .. }
                | PipelineError::InvalidHalfLife { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violation_lists_columns() {
        let err = PipelineError::SchemaViolation {
            table: "message".to_string(),
            missing: vec!["date_sent".to_string(), "quote_id".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "table `message` is missing required columns: date_sent, quote_id"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_half_life_is_fatal() {
        let err = PipelineError::InvalidHalfLife { seconds: 0.0 };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("got 0"));
    }

    #[test]
    fn ranking_failures_are_not_fatal() {
        assert!(!PipelineError::EmptyGraph.is_fatal());
        let err = PipelineError::DidNotConverge {
            iterations: 100,
            tolerance: 1e-6,
        };
        assert!(!err.is_fatal());
    }
}
