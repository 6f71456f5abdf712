use crate::eval::EvalReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    LoadingDataset,
    InvokingModel,
    Scoring,
    Completed,
    Failed,
}

/// Record of one evaluation run, advanced stage by stage by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRun {
    pub run_id: String,
    pub dataset: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_secs: Option<f64>,
    pub question_count: Option<usize>,
    pub skipped_rows: Option<usize>,
    pub report: Option<EvalReport>,
    pub error: Option<String>,
}

impl EvalRun {
    pub fn start(dataset: String) -> Self {
        let now = Utc::now();
        Self {
            run_id: format!("eval-{}", now.timestamp_millis()),
            dataset,
            status: RunStatus::LoadingDataset,
            started_at: now,
            completed_at: None,
            elapsed_secs: None,
            question_count: None,
            skipped_rows: None,
            report: None,
            error: None,
        }
    }

    pub fn on_dataset_loaded(&mut self, question_count: usize, skipped_rows: usize) {
        if self.status != RunStatus::LoadingDataset {
            return;
        }
        self.status = RunStatus::InvokingModel;
        self.question_count = Some(question_count);
        self.skipped_rows = Some(skipped_rows);
    }

    pub fn on_model_returned(&mut self) {
        if self.status != RunStatus::InvokingModel {
            return;
        }
        self.status = RunStatus::Scoring;
    }

    pub fn on_completed(&mut self, report: EvalReport, elapsed_secs: f64) {
        if self.status != RunStatus::Scoring {
            return;
        }
        self.status = RunStatus::Completed;
        self.report = Some(report);
        self.elapsed_secs = Some(elapsed_secs);
        self.completed_at = Some(Utc::now());
    }

    pub fn on_failed(&mut self, reason: impl Into<String>, elapsed_secs: f64) {
        if self.is_finished() {
            return;
        }
        self.status = RunStatus::Failed;
        self.error = Some(reason.into());
        self.elapsed_secs = Some(elapsed_secs);
        self.completed_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }
}
