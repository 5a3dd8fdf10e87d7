//! The index-to-label lookup table and the argmax that reads it

use crate::error::{ClassifyError, Result};
use serde::Serialize;
use std::path::Path;

/// The top class picked from a model's scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Ordered class names; entry `i` names output score `i`
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(ClassifyError::ConsistencyError(
                "label table is empty".into(),
            ));
        }
        Ok(LabelTable { labels })
    }

    /// Load a label file with one class name per line
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| ClassifyError::ResourceMissing {
                what: "label file",
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        // `lines` already drops a single trailing newline and any `\r`
        let mut labels: Vec<String> = contents
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect();
        while matches!(labels.last(), Some(label) if label.is_empty()) {
            labels.pop();
        }
        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Pick the highest score and name it. Ties go to the lowest index and NaN
    /// never wins.
    pub fn resolve(&self, scores: &[f32]) -> Result<Prediction> {
        if scores.len() != self.labels.len() {
            return Err(ClassifyError::ConsistencyError(format!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }

        let (index, confidence) = argmax(scores).ok_or_else(|| {
            ClassifyError::InferenceFailure("model produced no comparable scores".into())
        })?;

        Ok(Prediction {
            label: self.labels[index].clone(),
            confidence,
        })
    }
}

/// Index and value of the first maximum, skipping NaN
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if s <= b => best,
            _ => Some((i, s)),
        })
}
