use crate::error::{Error, Result};
use crate::eval::{evaluate, EvalConfig, EvalReport};
use crate::model::Prediction;
use crate::orchestration::EvalRun;
use crate::registry::SharedModel;
use crate::storage::{read_dataset, write_predictions};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct EvalJob {
    pub dataset_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub config: EvalConfig,
    pub timeout: Duration,
}

/// Calls the model once with the whole batch on a worker thread and waits at
/// most `timeout` for the answer. A model that times out is left running on
/// its thread.
pub fn invoke_with_deadline(
    model: SharedModel,
    questions: Vec<String>,
    timeout: Duration,
) -> Result<Vec<Vec<Prediction>>> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("odqa-model".to_string())
        .spawn(move || {
            let _ = tx.send(model.answer(&questions));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(predictions)) => Ok(predictions),
        Ok(Err(err @ Error::ModelInvocation(_))) => Err(err),
        Ok(Err(err)) => Err(Error::ModelInvocation(err.to_string())),
        Err(RecvTimeoutError::Timeout) => Err(Error::ModelInvocation(format!(
            "no answer within {:.1}s",
            timeout.as_secs_f64()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(Error::ModelInvocation(
            "model worker exited without an answer".to_string(),
        )),
    }
}

/// Runs `load dataset -> invoke model -> score -> write predictions`.
///
/// Bad dataset rows are skipped. Any other failure is logged together with
/// the elapsed time and returned; the predictions file is only written once
/// scoring has succeeded.
pub fn run_evaluation(model: SharedModel, job: &EvalJob) -> Result<EvalRun> {
    let mut run = EvalRun::start(job.dataset_path.display().to_string());
    let start = Instant::now();
    info!(run_id = %run.run_id, dataset = %run.dataset, "evaluation started");

    match execute(model, job, &mut run) {
        Ok(report) => {
            let elapsed = start.elapsed().as_secs_f64();
            run.on_completed(report, elapsed);
            info!(run_id = %run.run_id, elapsed_secs = elapsed, "completed successfully");
            Ok(run)
        }
        Err(err) => {
            let elapsed = start.elapsed().as_secs_f64();
            let stage = run.status;
            run.on_failed(err.to_string(), elapsed);
            error!(
                run_id = %run.run_id,
                stage = ?stage,
                question_count = run.question_count.unwrap_or(0),
                elapsed_secs = elapsed,
                error = %err,
                "completed with exception"
            );
            Err(err)
        }
    }
}

fn execute(model: SharedModel, job: &EvalJob, run: &mut EvalRun) -> Result<EvalReport> {
    job.config.validate()?;

    let load = read_dataset(&job.dataset_path)?;
    info!(size = load.records.len(), skipped = load.skipped, "QA dataset size");
    run.on_dataset_loaded(load.records.len(), load.skipped);

    let questions: Vec<String> = load.records.iter().map(|r| r.question.clone()).collect();
    let predictions = invoke_with_deadline(model, questions, job.timeout)?;
    if predictions.len() != load.records.len() {
        return Err(Error::ModelInvocation(format!(
            "model returned {} prediction lists for {} questions",
            predictions.len(),
            load.records.len()
        )));
    }
    info!(
        top_n = predictions.first().map_or(0, Vec::len),
        "returned top n size"
    );
    run.on_model_returned();

    let report = evaluate(&load.records, &predictions, &job.config)?;
    if let Some(out) = &job.output_path {
        write_predictions(out, &load.records, &predictions)?;
        info!(path = %out.display(), "wrote predictions");
    }
    Ok(report)
}

pub fn default_output_path(dataset: &Path) -> PathBuf {
    dataset.with_file_name("predictions.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::RunStatus;
    use crate::retrieval::QaModel;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct EchoModel;

    impl QaModel for EchoModel {
        fn answer(&self, questions: &[String]) -> Result<Vec<Vec<Prediction>>> {
            Ok(questions
                .iter()
                .map(|q| {
                    let subject = q.trim_end_matches('?').rsplit(' ').next().unwrap_or("");
                    vec![
                        Prediction::new(format!("{subject} is a compound"), "d1"),
                        Prediction::new(subject, "d2"),
                    ]
                })
                .collect())
        }
    }

    struct FailingModel;

    impl QaModel for FailingModel {
        fn answer(&self, _questions: &[String]) -> Result<Vec<Vec<Prediction>>> {
            Err(Error::ModelInvocation("backend down".to_string()))
        }
    }

    struct SlowModel;

    impl QaModel for SlowModel {
        fn answer(&self, questions: &[String]) -> Result<Vec<Vec<Prediction>>> {
            thread::sleep(Duration::from_secs(5));
            Ok(vec![Vec::new(); questions.len()])
        }
    }

    struct ShortModel;

    impl QaModel for ShortModel {
        fn answer(&self, _questions: &[String]) -> Result<Vec<Vec<Prediction>>> {
            Ok(Vec::new())
        }
    }

    fn job(dir: &Path, timeout: Duration) -> EvalJob {
        let dataset = dir.join("qa.csv");
        fs::write(
            &dataset,
            "1,what is polyol?,polyol\nbroken row\n2,what is soda?,soda\n",
        )
        .unwrap();
        EvalJob {
            output_path: Some(default_output_path(&dataset)),
            dataset_path: dataset,
            config: EvalConfig::new(vec![1, 2]).unwrap(),
            timeout,
        }
    }

    #[test]
    fn successful_run_scores_and_writes_predictions() {
        let dir = tempdir().unwrap();
        let job = job(dir.path(), Duration::from_secs(10));

        let run = run_evaluation(Arc::new(EchoModel), &job).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.question_count, Some(2));
        assert_eq!(run.skipped_rows, Some(1));

        let report = run.report.unwrap();
        assert_eq!(report.question_count, 2);
        assert_eq!(report.at(1).unwrap().exact_match, 0.0);
        assert_eq!(report.at(2).unwrap().exact_match, 1.0);

        let written = fs::read_to_string(dir.path().join("predictions.csv")).unwrap();
        assert_eq!(written.lines().count(), 5);
    }

    #[test]
    fn model_failure_propagates_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let job = job(dir.path(), Duration::from_secs(10));

        let log_path = dir.path().join("run.log");
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(Mutex::new(fs::File::create(&log_path).unwrap()))
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            run_evaluation(Arc::new(FailingModel), &job).unwrap_err()
        });
        assert!(matches!(err, Error::ModelInvocation(msg) if msg == "backend down"));
        assert!(!dir.path().join("predictions.csv").exists());

        let logged = fs::read_to_string(&log_path).unwrap();
        let line = logged
            .lines()
            .find(|l| l.contains("completed with exception"))
            .expect("failure line");
        assert!(line.contains("ERROR"));
        assert!(line.contains("elapsed_secs="));
        assert!(line.contains("stage=InvokingModel"));
        assert!(line.contains("question_count=2"));
        assert!(line.contains("backend down"));
    }

    #[test]
    fn slow_model_hits_the_deadline() {
        let dir = tempdir().unwrap();
        let job = job(dir.path(), Duration::from_millis(50));

        let err = run_evaluation(Arc::new(SlowModel), &job).unwrap_err();
        assert!(matches!(err, Error::ModelInvocation(msg) if msg.starts_with("no answer within")));
    }

    #[test]
    fn wrong_number_of_prediction_lists_is_fatal() {
        let dir = tempdir().unwrap();
        let job = job(dir.path(), Duration::from_secs(10));

        let err = run_evaluation(Arc::new(ShortModel), &job).unwrap_err();
        assert!(matches!(err, Error::ModelInvocation(_)));
        assert!(!dir.path().join("predictions.csv").exists());
    }

    #[test]
    fn missing_dataset_fails_the_run() {
        let dir = tempdir().unwrap();
        let job = EvalJob {
            dataset_path: dir.path().join("missing.csv"),
            output_path: None,
            config: EvalConfig::default(),
            timeout: Duration::from_secs(1),
        };
        assert!(run_evaluation(Arc::new(EchoModel), &job).is_err());
    }
}
