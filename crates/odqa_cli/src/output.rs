use std::io::{self, Write};

use anyhow::{bail, Result};
use odqa_core::{EvalRun, Prediction, RankedSentences};

pub fn print_run(format: &str, run: &EvalRun) -> Result<()> {
    match format {
        "text" => print_run_text(run),
        "json" => {
            let mut out = io::stdout();
            serde_json::to_writer_pretty(&mut out, run)?;
            writeln!(out)?;
            Ok(())
        }
        other => bail!("unknown output format: {other}"),
    }
}

pub fn check_format(format: &str) -> Result<()> {
    match format {
        "text" | "json" => Ok(()),
        other => bail!("unknown output format: {other}"),
    }
}

fn print_run_text(run: &EvalRun) -> Result<()> {
    let mut out = io::stdout();
    writeln!(
        out,
        "run_id={} status={:?} questions={} skipped={} elapsed={:.2}s",
        run.run_id,
        run.status,
        run.question_count.unwrap_or(0),
        run.skipped_rows.unwrap_or(0),
        run.elapsed_secs.unwrap_or(0.0)
    )?;

    let Some(report) = &run.report else {
        return Ok(());
    };
    writeln!(out, "returned_top_n={}", report.top_n_size)?;
    for r in &report.recall {
        writeln!(
            out,
            "recall@{}: em: {:.2} f1: {:.2} contains: {:.2} id: {:.2}",
            r.k, r.exact_match, r.f1, r.containment, r.id_recall
        )?;
    }
    writeln!(out, "f1_top_1: {:.2}", report.top1.f1)?;
    writeln!(out, "em_top_1: {:.2}", report.top1.exact_match)?;
    Ok(())
}

pub fn print_answers(questions: &[String], answers: &[Vec<Prediction>]) -> Result<()> {
    let mut out = io::stdout();
    for (question, ranked) in questions.iter().zip(answers) {
        writeln!(out, "question={question}")?;
        for (i, p) in ranked.iter().enumerate() {
            writeln!(out, "  {}. [{}] {}", i + 1, p.id, p.text)?;
        }
    }
    Ok(())
}

pub fn print_ranked(ranked: &RankedSentences) -> Result<()> {
    let mut out = io::stdout();
    let scores: Vec<String> = ranked.top_scores.iter().map(|s| format!("{s:.4}")).collect();
    writeln!(out, "scores={}", scores.join(","))?;
    writeln!(out, "text={}", ranked.text)?;
    Ok(())
}
