// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Studies on disk.
//!
//! A [`FileStudy`] bundles everything needed to work on one study
//! directory: its [`StudyConfig`], the root [`Node`] built over it, and the
//! [`TreeContext`] that nodes share. Commands operate on a file study.
//!
//! # Rebuilds
//!
//! The node tree is derived from the configuration. Whenever a command
//! reshapes a study, e.g., adds an area, it hands a new configuration to
//! [`FileStudy::update_config`], which rebuilds the tree. Writes that change
//! declaration files directly are followed by [`FileStudy::reload`], which
//! rescans the study from disk.

pub mod config;
pub mod scan;

use crate::{
    matrix::Matrix,
    study::config::{ConfigError, StudyConfig, StudyMetadata},
    tree::{
        path::{Depth, StudyPath},
        reference::Reference,
        Node, NodeKind, TreeContext, TreeError,
    },
};

use serde_json::Value;
use std::{
    fs::read,
    io::ErrorKind,
    path::Path,
};
use tracing::{debug, info, instrument};

/// Study directory with its configuration and node tree.
#[derive(Debug)]
pub struct FileStudy {
    config: StudyConfig,
    tree: Node,
    context: TreeContext,
}

impl FileStudy {
    /// Open study by scanning its directory.
    ///
    /// # Errors
    ///
    /// - Return [`StudyError::Config`] if the study declarations cannot be
    ///   read or parsed.
    #[instrument(skip(root, context), level = "debug")]
    pub fn open(root: impl AsRef<Path>, context: TreeContext) -> Result<Self> {
        let config = StudyConfig::scan(root.as_ref())?;
        info!(
            "open study {:?} (version {}, {} areas)",
            root.as_ref().display(),
            config.version(),
            config.area_names().len()
        );

        Ok(Self::from_config(config, context))
    }

    /// Construct study over an already built configuration.
    pub fn from_config(config: StudyConfig, context: TreeContext) -> Self {
        let tree = Node::study(config.clone(), context.clone());
        Self {
            config,
            tree,
            context,
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    pub fn context(&self) -> &TreeContext {
        &self.context
    }

    /// Absolute path of study root.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Study format version.
    pub fn version(&self) -> u32 {
        self.config.version()
    }

    /// Read value at slash-delimited path.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Path`] if the path is malformed.
    /// - Return any error of [`Node::get`].
    pub fn get(&self, path: &str, depth: Depth) -> Result<Value, TreeError> {
        let path: StudyPath = path.parse()?;
        self.tree.get(path.segments(), depth)
    }

    /// Write value at slash-delimited path.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Path`] if the path is malformed.
    /// - Return any error of [`Node::set`].
    pub fn set(&self, path: &str, value: Value) -> Result<(), TreeError> {
        let path: StudyPath = path.parse()?;
        self.tree.set(value, path.segments())
    }

    /// Check a write at slash-delimited path without touching the study.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Path`] if the path is malformed.
    /// - Return any error of [`Node::check_write`].
    pub fn check_write(&self, path: &str, value: &Value) -> Result<(), TreeError> {
        let path: StudyPath = path.parse()?;
        self.tree.check_write(value, path.segments())
    }

    /// Delete whatever a slash-delimited path addresses.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Path`] if the path is malformed.
    /// - Return any error of [`Node::delete`].
    pub fn delete(&self, path: &str) -> Result<(), TreeError> {
        let path: StudyPath = path.parse()?;
        self.tree.delete(path.segments())
    }

    /// Kind of node a slash-delimited path resolves into.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Path`] if the path is malformed.
    /// - Return any error of [`Node::kind_at`].
    pub fn kind_at(&self, path: &str) -> Result<NodeKind, TreeError> {
        let path: StudyPath = path.parse()?;
        self.tree.kind_at(path.segments())
    }

    /// Resolve a reference into matrix data.
    ///
    /// A `file://` reference to a missing file resolves to an empty matrix,
    /// since matrix leaves exist whether or not their file was ever written.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Reference`] if the reference is malformed.
    /// - Return [`TreeError::Matrix`] if the matrix is not stored or the file
    ///   does not hold numeric text.
    pub fn fetch_matrix(&self, reference: &str) -> Result<Matrix, TreeError> {
        match reference.parse::<Reference>()? {
            Reference::Matrix(id) => Ok(self.context.matrices().fetch(&id)?),
            Reference::File(relative) => {
                let path = self.root().join(relative);
                match read(&path) {
                    Ok(bytes) => Ok(Matrix::from_tsv(&String::from_utf8_lossy(&bytes))?),
                    Err(error) if error.kind() == ErrorKind::NotFound => Ok(Matrix::default()),
                    Err(error) => Err(TreeError::io(error, path)),
                }
            }
        }
    }

    /// Resolve a `file://` reference into raw bytes.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Reference`] if the reference is malformed.
    /// - Return [`TreeError::SchemaViolation`] if given a matrix reference.
    /// - Return [`TreeError::Io`] if the file cannot be read.
    pub fn fetch_bytes(&self, reference: &str) -> Result<Vec<u8>, TreeError> {
        let parsed = reference.parse::<Reference>()?;
        let Some(path) = parsed.file_path(self.root()) else {
            return Err(TreeError::violation(
                &self.config,
                format!("{reference:?} does not name a file"),
            ));
        };

        read(&path).map_err(|error| TreeError::io(error, path))
    }

    /// Read a study file as text, empty if missing.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Io`] if the file exists but cannot be read.
    pub fn read_text(&self, relative: impl AsRef<Path>) -> Result<String, TreeError> {
        let path = self.root().join(relative);
        match read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(error) => Err(TreeError::io(error, path)),
        }
    }

    /// Replace configuration by an edited copy and rebuild the tree.
    pub fn update_config<E>(&mut self, editor: E)
    where
        E: FnOnce(&mut StudyMetadata),
    {
        self.config = self.config.edit(editor);
        self.rebuild();
    }

    /// Put back a configuration taken earlier and rebuild the tree.
    pub fn restore_config(&mut self, config: StudyConfig) {
        if !self.config.shares_metadata(&config) {
            self.config = config;
            self.rebuild();
        }
    }

    /// Rescan configuration from disk and rebuild the tree.
    ///
    /// # Errors
    ///
    /// - Return [`StudyError::Config`] if the declarations on disk are
    ///   unreadable.
    pub fn reload(&mut self) -> Result<()> {
        self.config = StudyConfig::scan(self.root().to_path_buf())?;
        self.rebuild();

        Ok(())
    }

    /// Rebuild node tree over the current configuration.
    pub fn rebuild(&mut self) {
        debug!("rebuild tree of {:?}", self.root().display());
        self.tree = Node::study(self.config.clone(), self.context.clone());
    }
}

/// Study error types.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    /// Study configuration cannot be built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Study tree operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Friendly result alias :3
pub type Result<T, E = StudyError> = std::result::Result<T, E>;
