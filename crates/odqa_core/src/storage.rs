use crate::error::{Error, Result};
use crate::metrics::{best_over_gold, token_f1};
use crate::model::{Document, Prediction, QaRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct DatasetLoad {
    pub records: Vec<QaRecord>,
    pub skipped: usize,
}

/// Reads a headerless `id,question,answer[,answer...]` CSV file.
///
/// Rows that cannot be turned into a record are logged and skipped; only a
/// failure to open or read the file aborts the load.
pub fn read_dataset(path: &Path) -> Result<DatasetLoad> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut load = DatasetLoad::default();
    let mut row: u64 = 0;

    for result in reader.records() {
        row += 1;
        let parsed = match result {
            Ok(record) => {
                let line = record.position().map_or(row, |p| p.line());
                parse_record(&record, line)
            }
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(err.into()),
            Err(err) => Err(Error::RecordParse {
                line: err.position().map_or(row, |p| p.line()),
                reason: err.to_string(),
            }),
        };

        match parsed {
            Ok(record) => load.records.push(record),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping dataset row");
                load.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        records = load.records.len(),
        skipped = load.skipped,
        "loaded dataset"
    );
    Ok(load)
}

fn parse_record(record: &csv::StringRecord, line: u64) -> Result<QaRecord> {
    if record.len() < 3 {
        return Err(Error::RecordParse {
            line,
            reason: format!("expected at least 3 fields, got {}", record.len()),
        });
    }

    let question = record[1].trim();
    if question.is_empty() {
        return Err(Error::RecordParse {
            line,
            reason: "empty question".to_string(),
        });
    }

    let answers: Vec<String> = record
        .iter()
        .skip(2)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if answers.is_empty() {
        return Err(Error::RecordParse {
            line,
            reason: "no gold answer".to_string(),
        });
    }

    Ok(QaRecord {
        id: record[0].trim().to_string(),
        question: question.to_string(),
        answers,
    })
}

const PREDICTION_COLUMNS: [&str; 6] = [
    "id",
    "question",
    "rank",
    "predicted_answer",
    "predicted_id",
    "score",
];

#[derive(Debug, Serialize)]
struct PredictionRow<'a> {
    id: &'a str,
    question: &'a str,
    rank: Option<usize>,
    predicted_answer: Option<&'a str>,
    predicted_id: Option<&'a str>,
    score: Option<f32>,
}

/// Writes one CSV row per ranked prediction. A question without predictions
/// still gets a row with the prediction columns left empty. The header is
/// always written, even when there are no records.
///
/// The file is written to a temporary sibling and renamed into place, so the
/// target is either fully written or left untouched.
pub fn write_predictions(
    path: &Path,
    records: &[QaRecord],
    predictions: &[Vec<Prediction>],
) -> Result<()> {
    if records.len() != predictions.len() {
        return Err(Error::ModelInvocation(format!(
            "{} prediction lists for {} records",
            predictions.len(),
            records.len()
        )));
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer.write_record(PREDICTION_COLUMNS)?;
        for (record, preds) in records.iter().zip(predictions) {
            if preds.is_empty() {
                writer.serialize(PredictionRow {
                    id: &record.id,
                    question: &record.question,
                    rank: None,
                    predicted_answer: None,
                    predicted_id: None,
                    score: None,
                })?;
                continue;
            }

            for (i, p) in preds.iter().enumerate() {
                writer.serialize(PredictionRow {
                    id: &record.id,
                    question: &record.question,
                    rank: Some(i + 1),
                    predicted_answer: Some(&p.text),
                    predicted_id: Some(&p.id),
                    score: Some(best_over_gold(&record.answers, &p.text, token_f1)),
                })?;
            }
        }
        writer.flush()?;
    }

    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

pub fn load_corpus_jsonl(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut docs = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        docs.push(serde_json::from_str::<Document>(&line)?);
    }

    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_rows_and_skips_malformed_ones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa.csv");
        fs::write(
            &path,
            "1,what is polyol?,polyol\n\
             2,only two fields\n\
             3,,empty question\n\
             4,Usage of caustic soda,soap making,drain cleaning\n\
             5,no answer here,\n",
        )
        .unwrap();

        let load = read_dataset(&path).unwrap();
        assert_eq!(load.skipped, 3);
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.records[0].answers, vec!["polyol"]);
        assert_eq!(
            load.records[1].answers,
            vec!["soap making", "drain cleaning"]
        );
    }

    #[test]
    fn invalid_utf8_row_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa.csv");
        let mut bytes = b"1,what is polyol?,polyol\n2,bad \xff bytes,x\n".to_vec();
        bytes.extend_from_slice(b"3,What is filter cake?,residue\n");
        fs::write(&path, bytes).unwrap();

        let load = read_dataset(&path).unwrap();
        assert_eq!(load.skipped, 1);
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.records[1].id, "3");
    }

    #[test]
    fn missing_dataset_is_fatal() {
        let dir = tempdir().unwrap();
        assert!(read_dataset(&dir.path().join("nope.csv")).is_err());
    }

    #[test]
    fn writes_predictions_with_header_and_scores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            QaRecord {
                id: "1".to_string(),
                question: "what is polyol?".to_string(),
                answers: vec!["polyol".to_string()],
            },
            QaRecord {
                id: "2".to_string(),
                question: "unanswered".to_string(),
                answers: vec!["x".to_string()],
            },
        ];
        let preds = vec![
            vec![
                Prediction::new("polyol", "d1"),
                Prediction::new("unrelated", "d2"),
            ],
            Vec::new(),
        ];

        write_predictions(&path, &records, &preds).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,question,rank,predicted_answer,predicted_id,score"
        );
        assert_eq!(lines[1], "1,what is polyol?,1,polyol,d1,1.0");
        assert_eq!(lines[2], "1,what is polyol?,2,unrelated,d2,0.0");
        assert_eq!(lines[3], "2,unanswered,,,,");
    }

    #[test]
    fn empty_run_writes_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_predictions(&path, &[], &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "id,question,rank,predicted_answer,predicted_id,score\n"
        );
    }

    #[test]
    fn shape_mismatch_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "previous").unwrap();

        let records = vec![QaRecord {
            id: "1".to_string(),
            question: "q".to_string(),
            answers: vec!["a".to_string()],
        }];
        assert!(write_predictions(&path, &records, &[]).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
    }

    #[test]
    fn loads_corpus_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        fs::write(
            &path,
            "{\"id\":\"1\",\"text\":\"Polyol is a compound.\"}\n\n{\"id\":\"2\",\"text\":\"Filter cake.\"}\n",
        )
        .unwrap();

        let docs = load_corpus_jsonl(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].id, "2");
    }
}
