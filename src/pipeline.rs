//! Stage orchestration.
//!
//! [`run_stages`] threads a table and its [`StageHistory`] through the enabled
//! stages in the fixed order impute, dedupe, outliers, scale, encode. A stage
//! that fails leaves the table as it was and the run moves on.
//!
//! [`Pipeline`] wraps the same engine in the interactive life cycle:
//! select columns, configure stages (previewing as often as needed), finish.

use log::{info, warn};
use serde::Serialize;

use crate::{
    dedupe,
    encode::{self, EncodeConfig},
    error::{ConfigError, PipelineError, StageError},
    frame::{Shape, Table},
    impute::{self, ImputeConfig},
    outliers::{self, OutlierConfig},
    scale::{self, ScaleMethod},
    stage::{Notice, StageName, StageOutcome},
};

/// A stage request: the resolved configuration (or the reason it could not be
/// resolved) and an optional column subset. `None` columns means every column
/// of the working table.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan<C> {
    pub config: Result<C, ConfigError>,
    pub columns: Option<Vec<String>>,
}

impl<C> StagePlan<C> {
    pub fn new(config: C) -> Self {
        Self {
            config: Ok(config),
            columns: None,
        }
    }

    pub fn invalid(error: ConfigError) -> Self {
        Self {
            config: Err(error),
            columns: None,
        }
    }

    pub fn on_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    fn run(
        &self,
        table: &Table,
        stage: impl FnOnce(&Table, &[String], &C) -> Result<StageOutcome, StageError>,
    ) -> Result<StageOutcome, StageError> {
        let config = self.config.as_ref().map_err(|err| err.clone())?;
        stage(table, self.columns.as_deref().unwrap_or(&[]), config)
    }
}

/// Which stages run, and how. Disabled stages are `None` (or `false`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageSettings {
    pub impute: Option<StagePlan<ImputeConfig>>,
    pub dedupe: bool,
    pub outliers: Option<StagePlan<OutlierConfig>>,
    pub scale: Option<StagePlan<ScaleMethod>>,
    pub encode: Option<StagePlan<EncodeConfig>>,
}

impl StageSettings {
    pub fn enabled(&self) -> Vec<StageName> {
        StageName::ORDER
            .into_iter()
            .filter(|stage| match stage {
                StageName::Impute => self.impute.is_some(),
                StageName::Dedupe => self.dedupe,
                StageName::Outliers => self.outliers.is_some(),
                StageName::Scale => self.scale.is_some(),
                StageName::Encode => self.encode.is_some(),
            })
            .collect()
    }

    fn run(&self, stage: StageName, table: &Table) -> Option<Result<StageOutcome, StageError>> {
        match stage {
            StageName::Impute => self
                .impute
                .as_ref()
                .map(|plan| plan.run(table, impute::impute)),
            StageName::Dedupe => self.dedupe.then(|| Ok(dedupe::deduplicate(table))),
            StageName::Outliers => self
                .outliers
                .as_ref()
                .map(|plan| plan.run(table, outliers::handle_outliers)),
            StageName::Scale => self
                .scale
                .as_ref()
                .map(|plan| plan.run(table, |t, cols, method| scale::scale(t, cols, *method))),
            StageName::Encode => self
                .encode
                .as_ref()
                .map(|plan| plan.run(table, encode::encode)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    Computation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Applied { summary: String },
    Skipped { notice: Notice, message: String },
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: StageName,
    #[serde(flatten)]
    pub status: StageStatus,
    pub before: Shape,
    pub after: Shape,
}

impl StageReport {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, StageStatus::Applied { .. })
    }

    pub fn render_row(&self) -> Vec<String> {
        let (status, detail) = match &self.status {
            StageStatus::Applied { summary } => ("applied", summary.clone()),
            StageStatus::Skipped { message, .. } => ("skipped", message.clone()),
            StageStatus::Failed { message, .. } => ("failed", message.clone()),
        };
        vec![
            self.stage.to_string(),
            status.to_string(),
            format!("{}x{}", self.before.rows, self.before.columns),
            format!("{}x{}", self.after.rows, self.after.columns),
            detail,
        ]
    }
}

pub const HISTORY_HEADERS: [&str; 5] = ["stage", "status", "before", "after", "detail"];

/// Ordered record of every stage call across one or more runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct StageHistory {
    reports: Vec<StageReport>,
}

impl StageHistory {
    pub fn push(&mut self, report: StageReport) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, StageStatus::Failed { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub table: Table,
    pub history: StageHistory,
    /// True iff at least one stage of this run was applied.
    pub changed: bool,
}

/// Runs the enabled stages over `table`, appending one report per enabled
/// stage to `history`.
pub fn run_stages(table: Table, settings: &StageSettings, mut history: StageHistory) -> RunOutput {
    let mut working = table;
    let mut changed = false;
    for stage in StageName::ORDER {
        let Some(result) = settings.run(stage, &working) else {
            continue;
        };
        let before = working.shape();
        let status = match result {
            Ok(StageOutcome::Applied { table, summary }) => {
                info!("Stage '{stage}' applied: {summary}");
                working = table;
                changed = true;
                StageStatus::Applied { summary }
            }
            Ok(StageOutcome::Skipped(notice)) => {
                info!("Stage '{stage}' skipped: {notice}");
                StageStatus::Skipped {
                    message: notice.to_string(),
                    notice,
                }
            }
            Err(err) => {
                warn!("Stage '{stage}' failed, table left unchanged: {err}");
                StageStatus::Failed {
                    kind: if err.is_config() {
                        FailureKind::Config
                    } else {
                        FailureKind::Computation
                    },
                    message: err.to_string(),
                }
            }
        };
        history.push(StageReport {
            stage,
            status,
            before,
            after: working.shape(),
        });
    }
    RunOutput {
        table: working,
        history,
        changed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    SelectingColumns,
    ConfiguringStages,
    Finalized,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::SelectingColumns => "selecting columns",
            PipelineState::ConfiguringStages => "configuring stages",
            PipelineState::Finalized => "finalized",
        }
    }
}

/// Interactive wrapper around [`run_stages`]. The source table is never
/// modified; every preview starts from a fresh copy of the selected columns.
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: Table,
    state: PipelineState,
    selection: Vec<String>,
    settings: StageSettings,
}

impl Pipeline {
    pub fn new(source: Table) -> Self {
        Self {
            source,
            state: PipelineState::SelectingColumns,
            selection: Vec::new(),
            settings: StageSettings::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    fn ensure(&self, action: &'static str, allowed: &[PipelineState]) -> Result<(), PipelineError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PipelineError::InvalidTransition {
                action,
                state: self.state.as_str(),
            })
        }
    }

    /// Chooses the working columns. May be repeated until the pipeline is
    /// finalized.
    pub fn select_columns(&mut self, columns: Vec<String>) -> Result<(), PipelineError> {
        self.ensure(
            "select columns",
            &[
                PipelineState::SelectingColumns,
                PipelineState::ConfiguringStages,
            ],
        )?;
        if columns.is_empty() {
            return Err(ConfigError::EmptySelection.into());
        }
        self.source.select(&columns)?;
        info!("Selected {} column(s)", columns.len());
        self.selection = columns;
        self.state = PipelineState::ConfiguringStages;
        Ok(())
    }

    pub fn configure(&mut self, settings: StageSettings) -> Result<(), PipelineError> {
        self.ensure("configure stages", &[PipelineState::ConfiguringStages])?;
        self.settings = settings;
        Ok(())
    }

    /// Runs the configured stages without leaving the configuring state.
    pub fn preview(&self) -> Result<RunOutput, PipelineError> {
        self.ensure("preview", &[PipelineState::ConfiguringStages])?;
        let working = self.source.select(&self.selection)?;
        Ok(run_stages(working, &self.settings, StageHistory::default()))
    }

    pub fn finish(&mut self) -> Result<RunOutput, PipelineError> {
        let output = self.preview()?;
        self.state = PipelineState::Finalized;
        info!(
            "Pipeline finalized: {} stage report(s), changed = {}",
            output.history.len(),
            output.changed
        );
        Ok(output)
    }
}
