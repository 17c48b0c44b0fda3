// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Numeric matrices and their content addressing.
//!
//! Time series in a study are 2-D numeric arrays. The tree never carries
//! their data around. Instead every distinct array is stored once in a
//! [`MatrixRepository`] and referenced by a [`MatrixId`] computed from its
//! content, so identical arrays always share one id.
//!
//! On disk, a matrix that has not been imported yet is a plain text file of
//! tab-separated rows. Once imported, the text file is replaced by a
//! `<file>.link` sidecar holding a `matrix://<id>` reference.

pub mod store;

pub use store::{FsMatrixStore, MatrixRepository, MemoryMatrixStore};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// 2-D numeric array with optional row and column labels.
///
/// # Invariant
///
/// - Every row has the same width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    #[serde(default)]
    index: Vec<String>,
    #[serde(default)]
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl Matrix {
    /// Construct new unlabeled matrix.
    ///
    /// # Errors
    ///
    /// - Return [`MatrixError::Ragged`] if rows differ in width.
    pub fn new(data: Vec<Vec<f64>>) -> Result<Self> {
        Self::with_labels(Vec::new(), Vec::new(), data)
    }

    /// Construct new matrix with row and column labels.
    ///
    /// Empty label lists mean "unlabeled".
    ///
    /// # Errors
    ///
    /// - Return [`MatrixError::Ragged`] if rows differ in width.
    /// - Return [`MatrixError::Labels`] if a non-empty label list does not
    ///   match the matching dimension.
    pub fn with_labels(index: Vec<String>, columns: Vec<String>, data: Vec<Vec<f64>>) -> Result<Self> {
        let width = data.first().map_or(0, Vec::len);
        if let Some(row) = data.iter().position(|row| row.len() != width) {
            return Err(MatrixError::Ragged { row, width });
        }

        if !index.is_empty() && index.len() != data.len() {
            return Err(MatrixError::Labels("index"));
        }

        if !columns.is_empty() && columns.len() != width {
            return Err(MatrixError::Labels("columns"));
        }

        Ok(Self {
            index,
            columns,
            data,
        })
    }

    /// Matrix of `height` rows filled with `row`.
    pub fn filled(height: usize, row: &[f64]) -> Self {
        Self {
            index: Vec::new(),
            columns: Vec::new(),
            data: vec![row.to_vec(); height],
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.data.len()
    }

    /// Row labels.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Column labels.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw rows.
    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Content id of this matrix.
    pub fn id(&self) -> MatrixId {
        MatrixId::compute(self)
    }

    /// Parse tab-separated text, one row per line.
    ///
    /// # Errors
    ///
    /// - Return [`MatrixError::Cell`] if a cell is not a number.
    /// - Return [`MatrixError::Ragged`] if rows differ in width.
    pub fn from_tsv(text: &str) -> Result<Self> {
        let mut data = Vec::new();
        for (row, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let cells = line
                .split('\t')
                .enumerate()
                .map(|(column, cell)| {
                    cell.trim().parse::<f64>().map_err(|_| MatrixError::Cell {
                        row,
                        column,
                        content: cell.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            data.push(cells);
        }

        Self::new(data)
    }

    /// Render as tab-separated text, one row per line.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for row in &self.data {
            let line = row.iter().map(f64::to_string).collect::<Vec<_>>().join("\t");
            out.push_str(&line);
            out.push('\n');
        }

        out
    }

    /// Interpret a JSON value as a 2-D numeric array.
    ///
    /// # Errors
    ///
    /// - Return [`MatrixError::NotAnArray`] if the value is not a list of
    ///   lists of numbers.
    /// - Return [`MatrixError::Ragged`] if rows differ in width.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Array(rows) = value else {
            return Err(MatrixError::NotAnArray);
        };

        let data = rows
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells
                    .iter()
                    .map(|cell| cell.as_f64().ok_or(MatrixError::NotAnArray))
                    .collect::<Result<Vec<_>>>(),
                _ => Err(MatrixError::NotAnArray),
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(data)
    }
}

/// A 32-byte content id (Blake3).
///
/// Computed over the dimensions, the labels, and the bit pattern of every
/// cell, so two matrices share an id if and only if they are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatrixId([u8; 32]);

impl MatrixId {
    /// Compute content id of a matrix.
    pub fn compute(matrix: &Matrix) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(matrix.height() as u64).to_le_bytes());
        hasher.update(&(matrix.width() as u64).to_le_bytes());
        for labels in [&matrix.index, &matrix.columns] {
            hasher.update(&(labels.len() as u64).to_le_bytes());
            for label in labels {
                hasher.update(&(label.len() as u64).to_le_bytes());
                hasher.update(label.as_bytes());
            }
        }

        for row in &matrix.data {
            for cell in row {
                hasher.update(&cell.to_bits().to_le_bytes());
            }
        }

        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars).
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for MatrixId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for MatrixId {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| MatrixError::InvalidId(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| MatrixError::InvalidId(s.to_string()))?;

        Ok(Self(bytes))
    }
}

impl Serialize for MatrixId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MatrixId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Matrix error types.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// Row width differs from the first row.
    #[error("row {row} does not have the expected width of {width}")]
    Ragged { row: usize, width: usize },

    /// Label list does not fit the data.
    #[error("{0} labels do not match matrix dimensions")]
    Labels(&'static str),

    /// Text cell is not a number.
    #[error("cell ({row}, {column}) is not a number: {content:?}")]
    Cell {
        row: usize,
        column: usize,
        content: String,
    },

    /// JSON value is not a 2-D numeric array.
    #[error("value is not a 2-D array of numbers")]
    NotAnArray,

    /// Malformed content id.
    #[error("invalid matrix id {0:?}")]
    InvalidId(String),

    /// No matrix stored under id.
    #[error("matrix {0} not found")]
    NotFound(MatrixId),

    /// Stored matrix document cannot be (de)serialized.
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),

    /// Repository storage cannot be accessed.
    #[error("matrix storage failure at {path:?}")]
    Storage {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MatrixError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn identical_content_shares_id() -> anyhow::Result<()> {
        let a = Matrix::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
        let b = Matrix::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
        assert_eq!(a.id(), b.id());

        let transposed = Matrix::new(vec![vec![1.0, 3.0], vec![2.0, 4.0]])?;
        assert_ne!(a.id(), transposed.id());

        let reshaped = Matrix::new(vec![vec![1.0, 2.0, 3.0, 4.0]])?;
        assert_ne!(a.id(), reshaped.id());

        Ok(())
    }

    #[test]
    fn id_display_and_parse() -> anyhow::Result<()> {
        let id = Matrix::filled(3, &[0.5]).id();
        let parsed: MatrixId = id.to_string().parse()?;
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with(&id.short()));
        assert!("xyz".parse::<MatrixId>().is_err());

        Ok(())
    }

    #[test]
    fn ragged_rows_rejected() {
        let result = Matrix::new(vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(result, Err(MatrixError::Ragged { row: 1, width: 2 })));
    }

    #[test]
    fn tsv_text() -> anyhow::Result<()> {
        let matrix = Matrix::from_tsv("1\t2.5\n\n-3\t4\n")?;
        assert_eq!(matrix.data(), &[vec![1.0, 2.5], vec![-3.0, 4.0]]);
        assert_eq!(matrix.to_tsv(), "1\t2.5\n-3\t4\n");
        assert_eq!(Matrix::from_tsv("")?.height(), 0);
        assert!(matches!(
            Matrix::from_tsv("1\tx\n"),
            Err(MatrixError::Cell { row: 0, column: 1, .. })
        ));

        Ok(())
    }

    #[test]
    fn json_arrays() -> anyhow::Result<()> {
        let matrix = Matrix::from_value(&json!([[1, 2], [3, 4.5]]))?;
        assert_eq!(matrix.width(), 2);
        assert_eq!(matrix.height(), 2);
        assert!(matches!(
            Matrix::from_value(&json!([["a"]])),
            Err(MatrixError::NotAnArray)
        ));
        assert!(matches!(
            Matrix::from_value(&json!("matrix://abc")),
            Err(MatrixError::NotAnArray)
        ));

        Ok(())
    }
}
