use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use odqa_core::SelectionPolicy;

pub const SAMPLE_QUESTIONS: [&str; 3] = [
    "what is polyol?",
    "Usage of caustic soda",
    "What is filter cake?",
];

#[derive(Debug, Parser)]
#[command(name = "odqa", version, about = "Rank and evaluate open-domain QA answers")]
pub struct Cli {
    /// Write logs to this file instead of stderr.
    #[arg(long, global = true, env = "ODQA_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the model over a QA dataset and report recall@k, EM and F1.
    Eval {
        #[arg(long, default_value = "config/odqa.json")]
        config: PathBuf,
        #[arg(long, default_value = "data/questions.csv")]
        dataset: PathBuf,
        /// Predictions CSV; defaults to predictions.csv next to the dataset.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,10")]
        cutoffs: Vec<usize>,
        #[arg(long, default_value = "text")]
        format: String,
        /// Overrides the config's model timeout.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run the model on a few questions and print the ranked answers.
    Infer {
        #[arg(long, default_value = "config/odqa.json")]
        config: PathBuf,
        questions: Vec<String>,
    },
    /// Score candidate sentences against a query.
    Rank {
        /// Take the embedder from this model config instead of the default.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        query: String,
        #[arg(long = "candidate", required = true)]
        candidates: Vec<String>,
        #[arg(long, default_value_t = odqa_core::DEFAULT_TOP_N)]
        top_n: usize,
        /// Keep every candidate score.
        #[arg(long)]
        inactive: bool,
        #[arg(long, value_enum, default_value_t = SelectArg::Passthrough)]
        select: SelectArg,
        #[arg(long)]
        return_vectors: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectArg {
    Passthrough,
    TopN,
}

impl From<SelectArg> for SelectionPolicy {
    fn from(arg: SelectArg) -> Self {
        match arg {
            SelectArg::Passthrough => SelectionPolicy::Passthrough,
            SelectArg::TopN => SelectionPolicy::TopN,
        }
    }
}
