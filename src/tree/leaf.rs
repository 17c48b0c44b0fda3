// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Blob and matrix leaves.
//!
//! Neither leaf kind ever returns file content from a read. A blob reads as
//! `file://<path>`. A matrix reads as `matrix://<id>` once imported into the
//! matrix repository, and as `file://<path>` while it still lives as raw text
//! in the study.
//!
//! # Link Sidecars
//!
//! An imported matrix is represented on disk by `<file>.link`, a one-line
//! file holding its `matrix://` reference. Linking a matrix removes the raw
//! text file, so at most one of the two exists.

use crate::{
    matrix::Matrix,
    study::config::StudyConfig,
    tree::{reference::Reference, Result, TreeContext, TreeError},
};

use serde_json::Value;
use std::{
    ffi::OsString,
    fs::{read_to_string, remove_file, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Opaque file.
#[derive(Debug)]
pub struct Blob {
    config: StudyConfig,
}

impl Blob {
    pub fn new(config: StudyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Reference to this blob.
    pub fn reference(&self) -> String {
        file_reference(&self.config)
    }

    pub fn get(&self, path: &[String]) -> Result<Value> {
        ensure_leaf(&self.config, path)?;
        Ok(Value::String(self.reference()))
    }

    /// Write blob content.
    ///
    /// Writing the blob's own reference leaves the file alone. Any other
    /// string becomes the new file content.
    pub fn set(&self, value: Value, path: &[String]) -> Result<()> {
        ensure_leaf(&self.config, path)?;
        self.validate(&value)?;
        let Value::String(text) = value else {
            return Ok(());
        };

        if text == self.reference() {
            return Ok(());
        }

        let path = self.config.path();
        create_parent(&path)?;
        write(&path, text).map_err(|error| TreeError::io(error, &path))?;
        debug!("wrote blob {:?}", path.display());

        Ok(())
    }

    pub fn delete(&self, path: &[String]) -> Result<()> {
        ensure_leaf(&self.config, path)?;
        remove_if_present(&self.config.path())
    }

    pub fn check_write(&self, value: &Value, path: &[String]) -> Result<()> {
        ensure_leaf(&self.config, path)?;
        self.validate(value)
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        match value {
            Value::String(text) if text.starts_with("file://") && *text != self.reference() => {
                Err(TreeError::violation(
                    &self.config,
                    format!("blob cannot be replaced by reference {text:?}"),
                ))
            }
            Value::String(_) => Ok(()),
            _ => Err(TreeError::violation(&self.config, "expected text or a file reference")),
        }
    }
}

/// Numeric matrix file.
#[derive(Debug)]
pub struct MatrixLeaf {
    config: StudyConfig,
    context: TreeContext,
}

impl MatrixLeaf {
    pub fn new(config: StudyConfig, context: TreeContext) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Path of the link sidecar.
    pub fn link_path(&self) -> PathBuf {
        link_path(&self.config.path())
    }

    /// Reference to this matrix.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Io`] if the link sidecar cannot be read.
    pub fn reference(&self) -> Result<String> {
        let link = self.link_path();
        match read_to_string(&link) {
            Ok(content) => Ok(content.trim().to_string()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(file_reference(&self.config)),
            Err(error) => Err(TreeError::io(error, link)),
        }
    }

    pub fn get(&self, path: &[String]) -> Result<Value> {
        ensure_leaf(&self.config, path)?;
        Ok(Value::String(self.reference()?))
    }

    /// Write matrix.
    ///
    /// Accepts a `matrix://` reference to an already stored matrix, the
    /// leaf's own `file://` reference, or an inline 2-D numeric array, which
    /// is stored first.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::SchemaViolation`] if the value is none of the
    ///   accepted forms.
    /// - Return [`TreeError::Matrix`] if a referenced matrix is not stored.
    #[instrument(skip(self, value), level = "debug")]
    pub fn set(&self, value: Value, path: &[String]) -> Result<()> {
        ensure_leaf(&self.config, path)?;
        self.validate(&value)?;

        let id = match &value {
            Value::String(text) if *text == file_reference(&self.config) => return Ok(()),
            Value::String(text) => {
                let Some(id) = text.parse::<Reference>()?.matrix_id() else {
                    return Err(TreeError::violation(&self.config, "expected a matrix reference"));
                };
                if !self.context.matrices().exists(&id) {
                    return Err(crate::matrix::MatrixError::NotFound(id).into());
                }
                id
            }
            array => self.context.matrices().store(&Matrix::from_value(array)?)?,
        };

        let path = self.config.path();
        let link = self.link_path();
        create_parent(&link)?;
        write(&link, format!("{}\n", Reference::Matrix(id)))
            .map_err(|error| TreeError::io(error, &link))?;
        remove_if_present(&path)?;
        debug!("linked {:?} to matrix {}", path.display(), id.short());

        Ok(())
    }

    pub fn delete(&self, path: &[String]) -> Result<()> {
        ensure_leaf(&self.config, path)?;
        remove_if_present(&self.config.path())?;
        remove_if_present(&self.link_path())
    }

    /// Check that a write would succeed without storing or linking anything.
    pub fn check_write(&self, value: &Value, path: &[String]) -> Result<()> {
        ensure_leaf(&self.config, path)?;
        self.validate(value)?;
        let Value::String(text) = value else {
            return Ok(());
        };

        match text.parse::<Reference>()?.matrix_id() {
            Some(id) if !self.context.matrices().exists(&id) => {
                Err(crate::matrix::MatrixError::NotFound(id).into())
            }
            _ => Ok(()),
        }
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        match value {
            Value::String(text) if *text == file_reference(&self.config) => Ok(()),
            Value::String(text) => match text.parse::<Reference>()? {
                Reference::Matrix(_) => Ok(()),
                Reference::File(_) => Err(TreeError::violation(
                    &self.config,
                    format!("matrix cannot be replaced by reference {text:?}"),
                )),
            },
            Value::Array(_) => Matrix::from_value(value)
                .map(|_| ())
                .map_err(|error| TreeError::violation(&self.config, error.to_string())),
            _ => Err(TreeError::violation(
                &self.config,
                "expected a matrix reference or a 2-D array of numbers",
            )),
        }
    }
}

/// Path of the link sidecar of a matrix file.
pub fn link_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".link");
    path.with_file_name(name)
}

fn file_reference(config: &StudyConfig) -> String {
    Reference::File(config.relative_path().to_path_buf()).to_string()
}

fn ensure_leaf(config: &StudyConfig, path: &[String]) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }

    Err(TreeError::PathTooLong {
        node: config.relative_path().to_path_buf(),
        rest: path.join("/"),
    })
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => mkdirp::mkdirp(parent)
            .map(|_| ())
            .map_err(|error| TreeError::io(error, parent)),
        None => Ok(()),
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(TreeError::io(error, path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        matrix::{MatrixRepository, MemoryMatrixStore},
        study::config::StudyMetadata,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::{fs, sync::Arc};

    fn config(root: &Path, file: &str) -> StudyConfig {
        StudyConfig::new(StudyMetadata::new(root, 860))
            .scope("input")
            .scope(file)
    }

    #[test]
    fn blob_reads_reference() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blob = Blob::new(config(dir.path(), "list.txt"));

        assert_eq!(blob.get(&[])?, json!("file://input/list.txt"));
        blob.set(json!("FR\nDE\n"), &[])?;
        assert_eq!(fs::read_to_string(blob.config().path())?, "FR\nDE\n");

        blob.set(json!("file://input/list.txt"), &[])?;
        assert_eq!(fs::read_to_string(blob.config().path())?, "FR\nDE\n");
        assert!(matches!(
            blob.set(json!("file://other.txt"), &[]),
            Err(TreeError::SchemaViolation { .. })
        ));
        assert!(matches!(
            blob.get(&["x".to_string()]),
            Err(TreeError::PathTooLong { .. })
        ));

        Ok(())
    }

    #[test]
    fn matrix_link_lifecycle() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(MemoryMatrixStore::new());
        let leaf = MatrixLeaf::new(config(dir.path(), "series.txt"), TreeContext::new(store.clone()));
        fs::create_dir_all(dir.path().join("input"))?;
        fs::write(leaf.config().path(), "1\t2\n")?;

        assert_eq!(leaf.get(&[])?, json!("file://input/series.txt"));
        leaf.set(json!("file://input/series.txt"), &[])?;
        assert!(leaf.config().path().exists());

        leaf.set(json!([[1, 2], [3, 4]]), &[])?;
        let id = Matrix::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?.id();
        assert_eq!(leaf.get(&[])?, json!(format!("matrix://{id}")));
        assert!(!leaf.config().path().exists());
        assert_eq!(store.len(), 1);

        let other = store.store(&Matrix::filled(2, &[0.0]))?;
        leaf.set(json!(format!("matrix://{other}")), &[])?;
        assert_eq!(leaf.get(&[])?, json!(format!("matrix://{other}")));

        leaf.delete(&[])?;
        assert!(!leaf.link_path().exists());
        assert_eq!(leaf.get(&[])?, json!("file://input/series.txt"));

        Ok(())
    }

    #[test]
    fn matrix_rejects_bad_values() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let leaf = MatrixLeaf::new(
            config(dir.path(), "series.txt"),
            TreeContext::new(Arc::new(MemoryMatrixStore::new())),
        );

        let unknown = Matrix::filled(1, &[9.0]).id();
        assert!(matches!(
            leaf.set(json!(format!("matrix://{unknown}")), &[]),
            Err(TreeError::Matrix(_))
        ));
        assert!(matches!(
            leaf.set(json!([[1], [2, 3]]), &[]),
            Err(TreeError::SchemaViolation { .. })
        ));
        assert!(matches!(leaf.set(json!(true), &[]), Err(TreeError::SchemaViolation { .. })));
        assert!(matches!(
            leaf.check_write(&json!(format!("matrix://{unknown}")), &[]),
            Err(TreeError::Matrix(_))
        ));
        leaf.check_write(&json!([[1, 2]]), &[])?;
        assert!(!leaf.link_path().exists());

        Ok(())
    }

    #[test]
    fn sidecar_path() {
        assert_eq!(
            link_path(Path::new("/s/input/a.txt")),
            PathBuf::from("/s/input/a.txt.link")
        );
    }
}
