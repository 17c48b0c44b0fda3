// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Study node tree.
//!
//! A study directory is exposed as a tree of [`Node`]s addressable by
//! slash-delimited paths. There are exactly four node kinds:
//!
//! - __Composite__: folder-like node with named children,
//! - __Record__: sectioned `key = value` file,
//! - __Blob__: opaque file, read as a `file://` reference,
//! - __Matrix__: numeric series, read as a `matrix://` or `file://`
//!   reference.
//!
//! Which kind lives where is data, see [`schema`]. Nodes are built by a
//! single factory, [`Node::build`], from a spec, a config scope, and a
//! [`TreeContext`] carrying the collaborators nodes need at run time.
//!
//! # Reads
//!
//! [`Node::get`] takes path segments and a [`Depth`]. Segments select
//! children (`a`, `a,b`, `*`) and every node kind decides what the remaining
//! segments mean. Depth bounds how far folders expand below the addressed
//! node, where depth zero gives an empty mapping.
//!
//! # Writes
//!
//! [`Node::set`] resolves paths the same way, validates, and persists at the
//! leaves. [`Node::delete`] removes whatever the path addresses.

pub mod composite;
pub mod leaf;
pub mod path;
pub mod record;
pub mod reference;
pub mod schema;

use crate::{
    ini::IniError,
    matrix::{MatrixError, MatrixRepository},
    study::config::StudyConfig,
    tree::{
        composite::Composite,
        leaf::{Blob, MatrixLeaf},
        path::{Depth, PathError},
        record::Record,
        reference::ReferenceError,
        schema::{Binding, Spec},
    },
};

use serde_json::Value;
use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    path::PathBuf,
    sync::Arc,
};

/// Collaborators shared by every node of a tree.
#[derive(Clone)]
pub struct TreeContext {
    matrices: Arc<dyn MatrixRepository>,
}

impl TreeContext {
    /// Construct new context over a matrix repository.
    pub fn new(matrices: Arc<dyn MatrixRepository>) -> Self {
        Self { matrices }
    }

    /// Matrix repository that matrix leaves store into.
    pub fn matrices(&self) -> &dyn MatrixRepository {
        self.matrices.as_ref()
    }
}

impl Debug for TreeContext {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("TreeContext").finish_non_exhaustive()
    }
}

/// Node kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Composite,
    Record,
    Blob,
    Matrix,
}

impl Display for NodeKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Composite => "composite",
            Self::Record => "record",
            Self::Blob => "blob",
            Self::Matrix => "matrix",
        };
        fmt.write_str(name)
    }
}

/// Study tree node.
#[derive(Debug)]
pub enum Node {
    Composite(Composite),
    Record(Record),
    Blob(Blob),
    Matrix(MatrixLeaf),
}

impl Node {
    /// Build node from spec over a config scope.
    ///
    /// The scope must already point at the node's own file or directory.
    pub fn build(
        spec: &'static Spec,
        config: StudyConfig,
        binding: Binding,
        context: TreeContext,
    ) -> Self {
        match spec {
            Spec::Folder(entries) => {
                Self::Composite(Composite::folder(entries, config, binding, context))
            }
            Spec::Bucket { matrices } => Self::Composite(Composite::bucket(*matrices, config, context)),
            Spec::Record(schema) => Self::Record(Record::new(config, schema.as_ref())),
            Spec::Blob => Self::Blob(Blob::new(config)),
            Spec::Matrix => Self::Matrix(MatrixLeaf::new(config, context)),
        }
    }

    /// Build root node of a whole study.
    pub fn study(config: StudyConfig, context: TreeContext) -> Self {
        Self::build(&schema::STUDY_LAYOUT, config, Binding::default(), context)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Composite(_) => NodeKind::Composite,
            Self::Record(_) => NodeKind::Record,
            Self::Blob(_) => NodeKind::Blob,
            Self::Matrix(_) => NodeKind::Matrix,
        }
    }

    /// Config scope of this node.
    pub fn config(&self) -> &StudyConfig {
        match self {
            Self::Composite(node) => node.config(),
            Self::Record(node) => node.config(),
            Self::Blob(node) => node.config(),
            Self::Matrix(node) => node.config(),
        }
    }

    /// Read value at path.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::UnknownChild`] if a segment names no child.
    /// - Return [`TreeError::HeterogeneousSelection`] if a selection mixes
    ///   node kinds.
    /// - Return [`TreeError::PathTooLong`] if segments remain past a leaf.
    /// - Return [`TreeError::Io`] or [`TreeError::Ini`] if a file cannot be
    ///   read.
    pub fn get(&self, path: &[String], depth: Depth) -> Result<Value> {
        match self {
            Self::Composite(node) => node.get(path, depth),
            Self::Record(node) => node.get(path, depth),
            Self::Blob(node) => node.get(path),
            Self::Matrix(node) => node.get(path),
        }
    }

    /// Write value at path.
    ///
    /// # Errors
    ///
    /// - Return any resolution error of [`Node::get`].
    /// - Return [`TreeError::SchemaViolation`] if the value does not fit.
    /// - Return [`TreeError::Io`] if a file cannot be written.
    pub fn set(&self, value: Value, path: &[String]) -> Result<()> {
        match self {
            Self::Composite(node) => node.set(value, path),
            Self::Record(node) => node.set(value, path),
            Self::Blob(node) => node.set(value, path),
            Self::Matrix(node) => node.set(value, path),
        }
    }

    /// Check that [`Node::set`] would accept value at path, writing nothing.
    ///
    /// # Errors
    ///
    /// - Return any error [`Node::set`] would return before its first write.
    pub fn check_write(&self, value: &Value, path: &[String]) -> Result<()> {
        match self {
            Self::Composite(node) => node.check_write(value, path),
            Self::Record(node) => node.check_write(value, path),
            Self::Blob(node) => node.check_write(value, path),
            Self::Matrix(node) => node.check_write(value, path),
        }
    }

    /// Delete whatever path addresses.
    ///
    /// # Errors
    ///
    /// - Return any resolution error of [`Node::get`].
    /// - Return [`TreeError::Io`] if a file cannot be removed.
    pub fn delete(&self, path: &[String]) -> Result<()> {
        match self {
            Self::Composite(node) => node.delete(path),
            Self::Record(node) => node.delete(path),
            Self::Blob(node) => node.delete(path),
            Self::Matrix(node) => node.delete(path),
        }
    }

    /// Check value against this node without writing anything.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::SchemaViolation`] if the value does not fit.
    pub fn validate(&self, value: &Value) -> Result<()> {
        match self {
            Self::Composite(node) => node.validate(value),
            Self::Record(node) => node.validate(value),
            Self::Blob(node) => node.validate(value),
            Self::Matrix(node) => node.validate(value),
        }
    }

    /// Kind of the node a path resolves into.
    ///
    /// Paths that continue into a record resolve to [`NodeKind::Record`].
    ///
    /// # Errors
    ///
    /// - Return any resolution error of [`Node::get`].
    pub fn kind_at(&self, path: &[String]) -> Result<NodeKind> {
        match (self, path) {
            (Self::Composite(node), [_, ..]) => node.kind_at(path),
            (Self::Blob(_) | Self::Matrix(_), [_, ..]) => Err(self.path_too_long(path)),
            (node, _) => Ok(node.kind()),
        }
    }

    pub(crate) fn path_too_long(&self, rest: &[String]) -> TreeError {
        TreeError::PathTooLong {
            node: self.config().relative_path().to_path_buf(),
            rest: rest.join("/"),
        }
    }
}

/// Class of a tree error as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    BadRequest,
    Unprocessable,
    Internal,
}

/// Tree error types.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Path segment names no child.
    #[error("{:?} has no child named {name:?}", node.display())]
    UnknownChild { node: PathBuf, name: String },

    /// Selection mixes node kinds.
    #[error("selection {names:?} under {:?} mixes node kinds", node.display())]
    HeterogeneousSelection { node: PathBuf, names: Vec<String> },

    /// Path continues past a fully resolved node.
    #[error("path continues past {:?} with {rest:?}", node.display())]
    PathTooLong { node: PathBuf, rest: String },

    /// Value does not fit the node.
    #[error("invalid value for {:?}: {reason}", node.display())]
    SchemaViolation { node: PathBuf, reason: String },

    /// Path string cannot be parsed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// File cannot be accessed.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record file cannot be parsed or rendered.
    #[error("malformed record at {:?}", path.display())]
    Ini {
        #[source]
        source: IniError,
        path: PathBuf,
    },

    /// Matrix cannot be parsed, stored, or fetched.
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// Reference cannot be parsed or resolved.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

impl TreeError {
    /// Caller-facing class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownChild { .. } | Self::Matrix(MatrixError::NotFound(_)) => {
                ErrorClass::NotFound
            }
            Self::HeterogeneousSelection { .. }
            | Self::PathTooLong { .. }
            | Self::Path(_)
            | Self::Reference(_) => ErrorClass::BadRequest,
            Self::SchemaViolation { .. }
            | Self::Matrix(
                MatrixError::Ragged { .. }
                | MatrixError::Labels(_)
                | MatrixError::Cell { .. }
                | MatrixError::NotAnArray,
            ) => ErrorClass::Unprocessable,
            Self::Io { .. } | Self::Ini { .. } | Self::Matrix(_) => ErrorClass::Internal,
        }
    }

    pub(crate) fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub(crate) fn violation(config: &StudyConfig, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            node: config.relative_path().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = TreeError> = std::result::Result<T, E>;
