pub mod embed;
pub mod error;
pub mod eval;
pub mod metrics;
pub mod model;
pub mod orchestration;
pub mod ranker;
pub mod registry;
pub mod retrieval;
pub mod runner;
pub mod storage;

pub use embed::{
    EmbedderConfig, Embedding, EmbeddingProvider, HashEmbeddingProvider, DEFAULT_EMBEDDING_DIM,
};
pub use error::{Error, Result};
pub use eval::{evaluate, EvalConfig, EvalReport, RecallAtK, Top1Scores, DEFAULT_CUTOFFS};
pub use metrics::{best_over_gold, contains_answer, exact_match, normalize_answer, token_f1};
pub use model::{Document, Prediction, QaRecord, RankedSentences};
pub use orchestration::{EvalRun, RunStatus};
pub use ranker::{
    RankerConfig, RankerOutput, SelectionPolicy, SentenceRanker, DEFAULT_TOP_N, PLACEHOLDER_SCORE,
};
pub use registry::{
    build_embedder, build_model, known_models, ModelConfig, SharedEmbedder, SharedModel,
};
pub use retrieval::{
    cosine_similarity, dot, split_sentences, top_k, EmbeddingRetriever, QaModel, DEFAULT_TOP_K,
};
pub use runner::{default_output_path, invoke_with_deadline, run_evaluation, EvalJob};
pub use storage::{load_corpus_jsonl, read_dataset, write_predictions, DatasetLoad};
