// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reference strings handed out by leaf reads.
//!
//! Blob and matrix leaves never return their content from a tree read.
//! They return a __reference__ instead:
//!
//! - `file://<path>` names a file relative to the study root,
//! - `matrix://<id>` names a matrix in the matrix repository.
//!
//! Turning a reference back into data is an explicit, separate step.

use crate::matrix::{MatrixError, MatrixId};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path, PathBuf},
    str::FromStr,
};

const FILE_SCHEME: &str = "file://";
const MATRIX_SCHEME: &str = "matrix://";

/// Parsed leaf reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// File relative to the study root.
    File(PathBuf),

    /// Matrix stored in the repository.
    Matrix(MatrixId),
}

impl Reference {
    /// Construct file reference from a path relative to the study root.
    ///
    /// # Errors
    ///
    /// - Return [`ReferenceError::Escapes`] if the path is absolute or climbs
    ///   out of the study root.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let confined = path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !confined || path.as_os_str().is_empty() {
            return Err(ReferenceError::Escapes(path.display().to_string()));
        }

        Ok(Self::File(path))
    }

    /// Check if a string is shaped like any reference.
    pub fn is_reference(raw: &str) -> bool {
        raw.starts_with(FILE_SCHEME) || raw.starts_with(MATRIX_SCHEME)
    }

    /// Resolve file reference against study root.
    pub fn file_path(&self, root: &Path) -> Option<PathBuf> {
        match self {
            Self::File(relative) => Some(root.join(relative)),
            Self::Matrix(_) => None,
        }
    }

    /// Matrix id of a matrix reference.
    pub fn matrix_id(&self) -> Option<MatrixId> {
        match self {
            Self::Matrix(id) => Some(*id),
            Self::File(_) => None,
        }
    }
}

impl Display for Reference {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            // INVARIANT: Always print forward slashes so references are portable.
            Self::File(path) => {
                let segments = path
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(segment) => Some(segment.to_string_lossy()),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                write!(fmt, "{FILE_SCHEME}{}", segments.join("/"))
            }
            Self::Matrix(id) => write!(fmt, "{MATRIX_SCHEME}{id}"),
        }
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if let Some(path) = raw.strip_prefix(FILE_SCHEME) {
            return Self::file(path);
        }

        if let Some(id) = raw.strip_prefix(MATRIX_SCHEME) {
            return Ok(Self::Matrix(id.parse().map_err(ReferenceError::Matrix)?));
        }

        Err(ReferenceError::UnknownScheme(raw.to_string()))
    }
}

/// Reference error types.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// String carries neither a `file://` nor a `matrix://` prefix.
    #[error("unknown reference scheme in {0:?}")]
    UnknownScheme(String),

    /// File reference points outside the study root.
    #[error("file reference {0:?} escapes the study root")]
    Escapes(String),

    /// Matrix reference does not carry a valid content id.
    #[error(transparent)]
    Matrix(MatrixError),
}

/// Friendly result alias :3
pub type Result<T, E = ReferenceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test]
    fn parse_and_print() -> anyhow::Result<()> {
        let file: Reference = "file://input/areas/list.txt".parse()?;
        assert_eq!(file, Reference::File("input/areas/list.txt".into()));
        assert_eq!(file.to_string(), "file://input/areas/list.txt");
        assert_eq!(
            file.file_path(Path::new("/study")),
            Some(PathBuf::from("/study/input/areas/list.txt"))
        );

        let id = Matrix::filled(2, &[1.0]).id();
        let matrix: Reference = format!("matrix://{id}").parse()?;
        assert_eq!(matrix.matrix_id(), Some(id));
        assert_eq!(matrix.to_string(), format!("matrix://{id}"));

        Ok(())
    }

    #[test_case("file://../secret"; "parent directory")]
    #[test_case("file:///etc/passwd"; "absolute path")]
    #[test_case("file://input/../../secret"; "nested parent")]
    #[test_case("file://"; "empty path")]
    #[test]
    fn reject_escaping_files(raw: &str) {
        assert!(matches!(raw.parse::<Reference>(), Err(ReferenceError::Escapes(_))));
    }

    #[test]
    fn reject_other_strings() {
        assert!(matches!(
            "https://example.org".parse::<Reference>(),
            Err(ReferenceError::UnknownScheme(_))
        ));
        assert!(matches!(
            "matrix://nothex".parse::<Reference>(),
            Err(ReferenceError::Matrix(_))
        ));
        assert!(Reference::is_reference("matrix://abc"));
        assert!(!Reference::is_reference("plain text"));
    }
}
