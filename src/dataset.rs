//! Dataset and question-set loading.
//!
//! Datasets are per-industry business data: CSV files (one text column
//! feeds retrieval, the full row rides along as metadata) or plain text
//! files (one document per non-empty line). The question set is a JSON
//! object mapping industry name to an ordered list of question strings.

use crate::error::{BenchError, Result};
use crate::index::RowMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Supported dataset file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Csv,
    Text,
}

impl FromStr for DatasetKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(DatasetKind::Csv),
            "text" | "txt" => Ok(DatasetKind::Text),
            other => Err(BenchError::Config(format!(
                "unknown dataset kind '{}', expected 'csv' or 'text'",
                other
            ))),
        }
    }
}

/// Documents loaded from a dataset, with per-document row metadata when the
/// source was a CSV file.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    /// One entry per source document, in file order.
    pub documents: Vec<String>,
    /// Parallel to `documents` for CSV sources; `None` for text sources.
    pub rows: Option<Vec<RowMetadata>>,
}

/// Load documents from a dataset file.
///
/// CSV: takes the named `text_column` (or the first column when
/// unspecified) from each row, dropping rows whose value is empty; the
/// full row is kept as metadata. Text: each non-empty line is one
/// document, so a single-line file is a single document.
pub fn load_documents(
    path: &Path,
    kind: DatasetKind,
    text_column: Option<&str>,
) -> Result<LoadedDataset> {
    if !path.exists() {
        return Err(BenchError::DatasetNotFound(path.to_path_buf()));
    }

    match kind {
        DatasetKind::Csv => load_csv(path, text_column),
        DatasetKind::Text => load_text(path),
    }
}

fn load_csv(path: &Path, text_column: Option<&str>) -> Result<LoadedDataset> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| match e.kind() {
        csv::ErrorKind::Io(_) => BenchError::DatasetNotFound(path.to_path_buf()),
        _ => BenchError::Serialization(e.to_string()),
    })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BenchError::Serialization(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() {
        return Err(BenchError::ColumnNotFound {
            column: text_column.unwrap_or("<first>").to_string(),
            path: path.to_path_buf(),
        });
    }

    let column_index = match text_column {
        Some(name) => headers.iter().position(|h| h == name).ok_or_else(|| {
            BenchError::ColumnNotFound {
                column: name.to_string(),
                path: path.to_path_buf(),
            }
        })?,
        None => 0,
    };

    let mut documents = Vec::new();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| BenchError::Serialization(e.to_string()))?;
        let text = record.get(column_index).unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }

        let mut row = RowMetadata::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), value.trim().to_string());
        }

        documents.push(text.to_string());
        rows.push(row);
    }

    Ok(LoadedDataset {
        documents,
        rows: Some(rows),
    })
}

fn load_text(path: &Path) -> Result<LoadedDataset> {
    let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;

    let documents: Vec<String> = content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect();

    Ok(LoadedDataset {
        documents,
        rows: None,
    })
}

/// Questions grouped by industry, in a stable order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionSet {
    #[serde(flatten)]
    industries: BTreeMap<String, Vec<String>>,
}

impl QuestionSet {
    /// Load from a JSON object mapping industry name to question list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BenchError::DatasetNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        let set: QuestionSet = serde_json::from_str(&content)?;
        Ok(set)
    }

    /// Industries present in the set.
    pub fn industries(&self) -> impl Iterator<Item = &str> {
        self.industries.keys().map(|k| k.as_str())
    }

    /// Questions for one industry.
    pub fn questions(&self, industry: &str) -> &[String] {
        self.industries
            .get(industry)
            .map(|q| q.as_slice())
            .unwrap_or(&[])
    }

    /// Flatten to (industry, question) pairs, industry order preserved.
    pub fn flatten(&self) -> Vec<(String, String)> {
        self.industries
            .iter()
            .flat_map(|(industry, questions)| {
                questions
                    .iter()
                    .map(move |q| (industry.clone(), q.clone()))
            })
            .collect()
    }

    /// Total question count across industries.
    pub fn len(&self) -> usize {
        self.industries.values().map(|q| q.len()).sum()
    }

    /// Check if the set holds no questions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an industry's question list.
    pub fn insert(&mut self, industry: impl Into<String>, questions: Vec<String>) {
        self.industries.insert(industry.into(), questions);
    }
}

/// Create a small built-in question set for demos and tests.
pub fn sample_question_set() -> QuestionSet {
    let mut set = QuestionSet::default();
    set.insert(
        "retail",
        vec![
            "Which product category drives the most revenue?".to_string(),
            "Are there regional differences in customer spending?".to_string(),
            "What does the data suggest about seasonal demand?".to_string(),
        ],
    );
    set.insert(
        "finance",
        vec![
            "Which expense category grew fastest over the period?".to_string(),
            "What trends are visible in transaction volumes?".to_string(),
        ],
    );
    set
}

/// A small retail CSV fixture for demos and tests.
pub fn sample_retail_csv() -> &'static str {
    "category,location,date,description\n\
     Electronics,Austin,2024-01-12,Electronics sales rose sharply after the January promotion.\n\
     Grocery,Dallas,2024-01-19,Grocery demand stayed flat with steady weekly baskets.\n\
     Apparel,Austin,2024-02-02,Apparel revenue dipped as winter clearance ended.\n"
}
