// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content-addressed matrix repositories.
//!
//! A repository maps a [`MatrixId`] to exactly one stored [`Matrix`].
//! Storing is idempotent: identical content always lands on the same id and
//! is written once. Repositories do not count references. Whoever calls
//! [`MatrixRepository::delete`] must already know that nothing points at the
//! matrix anymore.

use crate::matrix::{Matrix, MatrixError, MatrixId, Result};

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fs::{read, remove_file},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Layer of indirection for matrix storage.
pub trait MatrixRepository: Send + Sync + 'static {
    /// Store matrix, returning its content id.
    ///
    /// Storing content that is already present performs no write.
    fn store(&self, matrix: &Matrix) -> Result<MatrixId>;

    /// Fetch matrix by content id.
    fn fetch(&self, id: &MatrixId) -> Result<Matrix>;

    /// Check whether a matrix is stored under id.
    fn exists(&self, id: &MatrixId) -> bool;

    /// Delete matrix by content id.
    fn delete(&self, id: &MatrixId) -> Result<()>;

    /// List every stored id.
    fn ids(&self) -> Result<Vec<MatrixId>>;
}

/// Matrix repository backed by a directory of JSON documents.
///
/// Each matrix lives at `<dir>/<id>.json`. Writes go through a temporary file
/// in the same directory followed by an atomic rename, so concurrent stores
/// of identical content cannot leave a torn document behind.
#[derive(Debug, Clone)]
pub struct FsMatrixStore {
    dir: PathBuf,
}

impl FsMatrixStore {
    /// Open matrix store at target directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// - Return [`MatrixError::Storage`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        mkdirp::mkdirp(&dir).map_err(|source| MatrixError::Storage {
            source,
            path: dir.clone(),
        })?;

        Ok(Self { dir })
    }

    /// Directory holding stored matrices.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &MatrixId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl MatrixRepository for FsMatrixStore {
    #[instrument(skip(self, matrix), level = "debug")]
    fn store(&self, matrix: &Matrix) -> Result<MatrixId> {
        let id = matrix.id();
        let path = self.document_path(&id);
        if path.exists() {
            debug!("matrix {} already stored", id.short());
            return Ok(id);
        }

        let storage = |source| MatrixError::Storage {
            source,
            path: path.clone(),
        };
        let document = serde_json::to_vec(matrix)?;
        let mut staged = NamedTempFile::new_in(&self.dir).map_err(storage)?;
        staged.write_all(&document).map_err(storage)?;
        staged
            .persist(&path)
            .map_err(|err| MatrixError::Storage {
                source: err.error,
                path: path.clone(),
            })?;
        debug!("stored matrix {} ({}x{})", id.short(), matrix.height(), matrix.width());

        Ok(id)
    }

    fn fetch(&self, id: &MatrixId) -> Result<Matrix> {
        let path = self.document_path(id);
        let document = read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => MatrixError::NotFound(*id),
            _ => MatrixError::Storage { source, path },
        })?;

        Ok(serde_json::from_slice(&document)?)
    }

    fn exists(&self, id: &MatrixId) -> bool {
        self.document_path(id).exists()
    }

    #[instrument(skip(self), level = "debug")]
    fn delete(&self, id: &MatrixId) -> Result<()> {
        let path = self.document_path(id);
        remove_file(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => MatrixError::NotFound(*id),
            _ => MatrixError::Storage { source, path },
        })
    }

    fn ids(&self) -> Result<Vec<MatrixId>> {
        let pattern = format!("{}/*.json", glob::Pattern::escape(&self.dir.to_string_lossy()));
        let entries = glob::glob(&pattern).map_err(|err| MatrixError::Storage {
            source: std::io::Error::other(err),
            path: self.dir.clone(),
        })?;

        let mut ids = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.parse().ok())
            })
            .collect::<Vec<MatrixId>>();
        ids.sort();

        Ok(ids)
    }
}

/// Matrix repository kept in memory.
///
/// Useful for tests and for throwaway generations whose matrices never need
/// to outlive the process.
#[derive(Debug, Default)]
pub struct MemoryMatrixStore {
    matrices: RwLock<HashMap<MatrixId, Arc<Matrix>>>,
}

impl MemoryMatrixStore {
    /// Construct new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored matrices.
    pub fn len(&self) -> usize {
        self.matrices.read().len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.matrices.read().is_empty()
    }
}

impl MatrixRepository for MemoryMatrixStore {
    fn store(&self, matrix: &Matrix) -> Result<MatrixId> {
        let id = matrix.id();
        self.matrices
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(matrix.clone()));

        Ok(id)
    }

    fn fetch(&self, id: &MatrixId) -> Result<Matrix> {
        self.matrices
            .read()
            .get(id)
            .map(|matrix| matrix.as_ref().clone())
            .ok_or(MatrixError::NotFound(*id))
    }

    fn exists(&self, id: &MatrixId) -> bool {
        self.matrices.read().contains_key(id)
    }

    fn delete(&self, id: &MatrixId) -> Result<()> {
        self.matrices
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or(MatrixError::NotFound(*id))
    }

    fn ids(&self) -> Result<Vec<MatrixId>> {
        let mut ids = self.matrices.read().keys().copied().collect::<Vec<_>>();
        ids.sort();

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn sample() -> Matrix {
        Matrix::filled(24, &[1.0, 0.0, 2.5])
    }

    #[test]
    fn memory_store_is_idempotent() -> anyhow::Result<()> {
        let store = MemoryMatrixStore::new();
        let first = store.store(&sample())?;
        let second = store.store(&sample())?;

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.fetch(&first)?, sample());

        Ok(())
    }

    #[test]
    fn fs_store_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FsMatrixStore::open(dir.path().join("matrices"))?;
        let first = store.store(&sample())?;
        let second = store.store(&sample())?;

        assert_eq!(first, second);
        assert_eq!(store.ids()?, vec![first]);
        assert_eq!(std::fs::read_dir(store.dir())?.count(), 1);
        assert_eq!(store.fetch(&first)?, sample());

        Ok(())
    }

    #[test]
    fn fs_store_concurrent_identical_stores() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(FsMatrixStore::open(dir.path())?);

        let handles = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.store(&sample()))
            })
            .collect::<Vec<_>>();
        let ids = handles
            .into_iter()
            .map(|handle| handle.join().expect("store thread panicked"))
            .collect::<Result<Vec<_>>>()?;

        assert!(ids.iter().all(|id| *id == sample().id()));
        assert_eq!(store.ids()?.len(), 1);
        assert_eq!(store.fetch(&ids[0])?, sample());

        Ok(())
    }

    #[test]
    fn missing_matrix_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let stores: [Box<dyn MatrixRepository>; 2] = [
            Box::new(MemoryMatrixStore::new()),
            Box::new(FsMatrixStore::open(dir.path())?),
        ];

        for store in stores {
            let id = sample().id();
            assert!(!store.exists(&id));
            assert!(matches!(store.fetch(&id), Err(MatrixError::NotFound(_))));
            assert!(matches!(store.delete(&id), Err(MatrixError::NotFound(_))));

            store.store(&sample())?;
            assert!(store.exists(&id));
            store.delete(&id)?;
            assert!(!store.exists(&id));
        }

        Ok(())
    }
}
