use std::fmt;

use serde::Serialize;

use crate::frame::Table;

/// The five transform stages, in the only order the pipeline runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Impute,
    Dedupe,
    Outliers,
    Scale,
    Encode,
}

impl StageName {
    pub const ORDER: [StageName; 5] = [
        StageName::Impute,
        StageName::Dedupe,
        StageName::Outliers,
        StageName::Scale,
        StageName::Encode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Impute => "impute",
            StageName::Dedupe => "dedupe",
            StageName::Outliers => "outliers",
            StageName::Scale => "scale",
            StageName::Encode => "encode",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valid request, nothing to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    NoMatchingColumns {
        stage: StageName,
        expected: &'static str,
    },
    NoMissingValues,
    NoDuplicates,
    NoOutliers,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoMatchingColumns { stage, expected } => {
                write!(f, "No {expected} columns available for {stage}")
            }
            Notice::NoMissingValues => f.write_str("No missing values in the selected columns"),
            Notice::NoDuplicates => f.write_str("No duplicate rows found"),
            Notice::NoOutliers => f.write_str("No outlier rows found"),
        }
    }
}

/// Result of one stage call. A stage never edits its input: either it hands
/// back a complete new table or it reports why it did nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Applied { table: Table, summary: String },
    Skipped(Notice),
}

impl StageOutcome {
    pub fn applied(table: Table, summary: impl Into<String>) -> Self {
        StageOutcome::Applied {
            table,
            summary: summary.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, StageOutcome::Applied { .. })
    }

    pub fn table(&self) -> Option<&Table> {
        match self {
            StageOutcome::Applied { table, .. } => Some(table),
            StageOutcome::Skipped(_) => None,
        }
    }

    /// The table after this stage: the new one when applied, `input` otherwise.
    pub fn into_table_or(self, input: Table) -> Table {
        match self {
            StageOutcome::Applied { table, .. } => table,
            StageOutcome::Skipped(_) => input,
        }
    }
}
