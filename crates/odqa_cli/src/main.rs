mod cli;
mod output;

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use odqa_core::{
    build_embedder, build_model, default_output_path, invoke_with_deadline, run_evaluation,
    EmbedderConfig, EvalConfig, EvalJob, ModelConfig, RankerConfig, RankerOutput, SentenceRanker,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SAMPLE_QUESTIONS};

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!(e))
                .context("install log subscriber")?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow!(e))
                .context("install log subscriber")?;
        }
    }
    Ok(())
}

fn load_model_config(path: &Path) -> Result<ModelConfig> {
    ModelConfig::load(path).with_context(|| format!("load model config {}", path.display()))
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Eval {
            config,
            dataset,
            output,
            cutoffs,
            format,
            timeout_secs,
        } => {
            output::check_format(&format)?;
            let model_config = load_model_config(&config)?;
            let embedder = build_embedder(&model_config.embedder);
            let model = build_model(&model_config, embedder).context("build model")?;

            let job = EvalJob {
                output_path: Some(output.unwrap_or_else(|| default_output_path(&dataset))),
                dataset_path: dataset,
                config: EvalConfig::new(cutoffs)?,
                timeout: timeout_secs
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| model_config.timeout()),
            };

            let run = run_evaluation(model, &job).context("evaluation failed")?;
            output::print_run(&format, &run)?;
        }
        Commands::Infer { config, questions } => {
            let model_config = load_model_config(&config)?;
            let embedder = build_embedder(&model_config.embedder);
            let model = build_model(&model_config, embedder).context("build model")?;

            let questions = if questions.is_empty() {
                SAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect()
            } else {
                questions
            };
            info!(questions = questions.len(), "running inference");
            let answers = invoke_with_deadline(model, questions.clone(), model_config.timeout())?;
            output::print_answers(&questions, &answers)?;
        }
        Commands::Rank {
            config,
            query,
            candidates,
            top_n,
            inactive,
            select,
            return_vectors,
        } => {
            let embedder_config = match &config {
                Some(path) => load_model_config(path)?.embedder,
                None => EmbedderConfig::default(),
            };
            let ranker = SentenceRanker::new(
                build_embedder(&embedder_config),
                RankerConfig {
                    top_n,
                    active: !inactive,
                    selection: select.into(),
                    return_vectors,
                    ..RankerConfig::default()
                },
            )?;

            match ranker.rank(&[(query, candidates)])? {
                RankerOutput::Sentences(ranked) => {
                    for r in &ranked {
                        output::print_ranked(r)?;
                    }
                }
                RankerOutput::Vectors { vectors, scores } => {
                    let Some((q, c)) = vectors.first() else {
                        bail!("ranker returned no vectors");
                    };
                    println!(
                        "query_dim={} candidates={} score={}",
                        q.len(),
                        c.len(),
                        scores.first().copied().unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
