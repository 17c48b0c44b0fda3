// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Study mutation commands.
//!
//! A [`Command`] is a serializable unit of mutation: create an area, add a
//! storage unit, replace a matrix, patch a record, and so on. Commands are
//! plain data. They hold no reference to any study, so one command can be
//! replayed against any number of study copies.
//!
//! # Application
//!
//! [`Command::apply`] first checks every precondition against the study,
//! e.g., that a target area exists or that the study format is recent
//! enough, and resolves every matrix payload into the matrix repository.
//! Only then does it touch the study. A failed precondition is reported
//! through [`CommandOutput`] and leaves the study exactly as it was.
//!
//! # Identity
//!
//! Two commands address the same logical entity when their
//! [`Command::match_signature`] strings are equal. For such pairs,
//! [`Command::diff_against`] produces corrective commands that turn the
//! effect of one into the effect of the other.
//!
//! # Wire Format
//!
//! Commands travel as [`CommandDto`] values of the shape
//! `{kind, version, args}`.

mod area;
mod binding;
mod cluster;
mod link;
mod patch;

pub use area::{CreateArea, RemoveArea};
pub use binding::{CreateBindingConstraint, RemoveBindingConstraint, UpdateBindingConstraint};
pub use cluster::{CreateCluster, CreateRenewablesCluster, CreateShortTermStorage, RemoveCluster};
pub use link::{CreateLink, RemoveLink};
pub use patch::{ReplaceMatrix, UpdateConfig};

use crate::{
    ini,
    matrix::{Matrix, MatrixError, MatrixRepository},
    study::{
        config::{ClusterKind, ConfigError},
        FileStudy, StudyError,
    },
    tree::{reference::Reference, TreeError},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{info, instrument, warn};

/// Study mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateArea(CreateArea),
    RemoveArea(RemoveArea),
    CreateLink(CreateLink),
    RemoveLink(RemoveLink),
    CreateCluster(CreateCluster),
    CreateRenewablesCluster(CreateRenewablesCluster),
    CreateShortTermStorage(CreateShortTermStorage),
    RemoveCluster(RemoveCluster),
    RemoveRenewablesCluster(RemoveCluster),
    RemoveShortTermStorage(RemoveCluster),
    ReplaceMatrix(ReplaceMatrix),
    UpdateConfig(UpdateConfig),
    CreateBindingConstraint(CreateBindingConstraint),
    UpdateBindingConstraint(UpdateBindingConstraint),
    RemoveBindingConstraint(RemoveBindingConstraint),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::CreateArea(_) => CommandKind::CreateArea,
            Self::RemoveArea(_) => CommandKind::RemoveArea,
            Self::CreateLink(_) => CommandKind::CreateLink,
            Self::RemoveLink(_) => CommandKind::RemoveLink,
            Self::CreateCluster(_) => CommandKind::CreateCluster,
            Self::CreateRenewablesCluster(_) => CommandKind::CreateRenewablesCluster,
            Self::CreateShortTermStorage(_) => CommandKind::CreateShortTermStorage,
            Self::RemoveCluster(_) => CommandKind::RemoveCluster,
            Self::RemoveRenewablesCluster(_) => CommandKind::RemoveRenewablesCluster,
            Self::RemoveShortTermStorage(_) => CommandKind::RemoveShortTermStorage,
            Self::ReplaceMatrix(_) => CommandKind::ReplaceMatrix,
            Self::UpdateConfig(_) => CommandKind::UpdateConfig,
            Self::CreateBindingConstraint(_) => CommandKind::CreateBindingConstraint,
            Self::UpdateBindingConstraint(_) => CommandKind::UpdateBindingConstraint,
            Self::RemoveBindingConstraint(_) => CommandKind::RemoveBindingConstraint,
        }
    }

    /// Apply command to a study.
    ///
    /// Never fails outright: precondition and storage failures are reported
    /// in the returned output, alongside any extra data the command produced.
    /// A failed command leaves the study configuration as it found it.
    #[instrument(skip_all, fields(kind = %self.kind()), level = "debug")]
    pub fn apply(&self, study: &mut FileStudy) -> (CommandOutput, Map<String, Value>) {
        let snapshot = study.config().clone();
        let result = match self {
            Self::CreateArea(command) => command.apply(study),
            Self::RemoveArea(command) => command.apply(study),
            Self::CreateLink(command) => command.apply(study),
            Self::RemoveLink(command) => command.apply(study),
            Self::CreateCluster(command) => command.apply(study),
            Self::CreateRenewablesCluster(command) => command.apply(study),
            Self::CreateShortTermStorage(command) => command.apply(study),
            Self::RemoveCluster(command) => command.apply(study, ClusterKind::Thermal),
            Self::RemoveRenewablesCluster(command) => command.apply(study, ClusterKind::Renewable),
            Self::RemoveShortTermStorage(command) => command.apply(study, ClusterKind::ShortTermStorage),
            Self::ReplaceMatrix(command) => command.apply(study),
            Self::UpdateConfig(command) => command.apply(study),
            Self::CreateBindingConstraint(command) => command.apply(study),
            Self::UpdateBindingConstraint(command) => command.apply(study),
            Self::RemoveBindingConstraint(command) => command.apply(study),
        };

        match result {
            Ok(Applied { message, extra }) => {
                info!("{}: {message}", self.kind());
                (CommandOutput::success(message), extra)
            }
            Err(error) => {
                warn!("{} failed: {error}", self.kind());
                study.restore_config(snapshot);
                (CommandOutput::failure(error.to_string()), Map::new())
            }
        }
    }

    /// Stable identity of the entity this command targets.
    pub fn match_signature(&self) -> String {
        let target = match self {
            Self::CreateArea(command) => command.target(),
            Self::RemoveArea(command) => command.target(),
            Self::CreateLink(command) => command.target(),
            Self::RemoveLink(command) => command.target(),
            Self::CreateCluster(command) => command.target(),
            Self::CreateRenewablesCluster(command) => command.target(),
            Self::CreateShortTermStorage(command) => command.target(),
            Self::RemoveCluster(command)
            | Self::RemoveRenewablesCluster(command)
            | Self::RemoveShortTermStorage(command) => command.target(),
            Self::ReplaceMatrix(command) => command.target.clone(),
            Self::UpdateConfig(command) => command.target.clone(),
            Self::CreateBindingConstraint(command) => command.target(),
            Self::UpdateBindingConstraint(command) => command.id.clone(),
            Self::RemoveBindingConstraint(command) => command.id.clone(),
        };

        format!("{}{SIGNATURE_SEPARATOR}{target}", self.kind())
    }

    /// Check if two commands target the same entity.
    ///
    /// With `exact`, payloads must be equal as well.
    pub fn matches(&self, other: &Self, exact: bool) -> bool {
        if exact {
            self == other
        } else {
            self.match_signature() == other.match_signature()
        }
    }

    /// Commands turning the effect of `self` into the effect of `other`.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Precondition`] if the commands do not share
    ///   a match signature.
    pub fn diff_against(&self, other: &Self) -> Result<Vec<Command>> {
        if self.match_signature() != other.match_signature() {
            return Err(CommandError::Precondition(format!(
                "cannot diff {} against {}",
                self.match_signature(),
                other.match_signature()
            )));
        }

        let patches = match (self, other) {
            (Self::CreateLink(mine), Self::CreateLink(theirs)) => mine.diff(theirs),
            (Self::CreateCluster(mine), Self::CreateCluster(theirs)) => mine.diff(theirs),
            (Self::CreateRenewablesCluster(mine), Self::CreateRenewablesCluster(theirs)) => {
                mine.diff(theirs)
            }
            (Self::CreateShortTermStorage(mine), Self::CreateShortTermStorage(theirs)) => {
                mine.diff(theirs)
            }
            (Self::CreateBindingConstraint(mine), Self::CreateBindingConstraint(theirs)) => {
                mine.diff(theirs)
            }
            (Self::ReplaceMatrix(_), Self::ReplaceMatrix(_))
            | (Self::UpdateConfig(_), Self::UpdateConfig(_))
            | (Self::UpdateBindingConstraint(_), Self::UpdateBindingConstraint(_)) => {
                if self == other {
                    Vec::new()
                } else {
                    vec![other.clone()]
                }
            }
            _ => Vec::new(),
        };

        Ok(patches)
    }

    /// Move every inline matrix payload into the repository.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Payload`] if an inline payload is not a
    ///   rectangular array.
    /// - Return [`CommandError::Matrix`] if the repository rejects a store.
    pub fn normalize(&mut self, repository: &dyn MatrixRepository) -> Result<()> {
        let payloads: Vec<&mut Option<MatrixPayload>> = match self {
            Self::CreateLink(command) => {
                vec![&mut command.series, &mut command.direct, &mut command.indirect]
            }
            Self::CreateCluster(command) => vec![&mut command.prepro, &mut command.modulation],
            Self::CreateShortTermStorage(command) => vec![
                &mut command.pmax_injection,
                &mut command.pmax_withdrawal,
                &mut command.inflows,
                &mut command.lower_rule_curve,
                &mut command.upper_rule_curve,
            ],
            Self::CreateBindingConstraint(command) => vec![
                &mut command.values,
                &mut command.less_term_matrix,
                &mut command.greater_term_matrix,
                &mut command.equal_term_matrix,
            ],
            Self::UpdateBindingConstraint(command) => vec![
                &mut command.values,
                &mut command.less_term_matrix,
                &mut command.greater_term_matrix,
                &mut command.equal_term_matrix,
            ],
            Self::ReplaceMatrix(command) => {
                command.matrix = command.matrix.normalized(repository)?;
                return Ok(());
            }
            _ => return Ok(()),
        };

        for payload in payloads.into_iter().flatten() {
            *payload = payload.normalized(repository)?;
        }

        Ok(())
    }

    /// Convert into wire form.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Payload`] if arguments cannot be serialized.
    pub fn to_dto(&self) -> Result<CommandDto> {
        let kind = self.kind();
        let args = match self {
            Self::CreateArea(args) => serde_json::to_value(args),
            Self::RemoveArea(args) => serde_json::to_value(args),
            Self::CreateLink(args) => serde_json::to_value(args),
            Self::RemoveLink(args) => serde_json::to_value(args),
            Self::CreateCluster(args) => serde_json::to_value(args),
            Self::CreateRenewablesCluster(args) => serde_json::to_value(args),
            Self::CreateShortTermStorage(args) => serde_json::to_value(args),
            Self::RemoveCluster(args)
            | Self::RemoveRenewablesCluster(args)
            | Self::RemoveShortTermStorage(args) => serde_json::to_value(args),
            Self::ReplaceMatrix(args) => serde_json::to_value(args),
            Self::UpdateConfig(args) => serde_json::to_value(args),
            Self::CreateBindingConstraint(args) => serde_json::to_value(args),
            Self::UpdateBindingConstraint(args) => serde_json::to_value(args),
            Self::RemoveBindingConstraint(args) => serde_json::to_value(args),
        }
        .map_err(|source| CommandError::Payload { kind, source })?;

        Ok(CommandDto {
            kind: kind.to_string(),
            version: kind.version(),
            args,
        })
    }

    /// Convert from wire form.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::UnknownKind`] if the kind is not recognized.
    /// - Return [`CommandError::UnsupportedVersion`] if the payload version
    ///   is zero or newer than this crate knows.
    /// - Return [`CommandError::Payload`] if arguments do not fit the kind.
    pub fn from_dto(dto: &CommandDto) -> Result<Self> {
        let kind: CommandKind = dto.kind.parse()?;
        if dto.version == 0 || dto.version > kind.version() {
            return Err(CommandError::UnsupportedVersion {
                kind,
                version: dto.version,
            });
        }

        fn args<T: serde::de::DeserializeOwned>(kind: CommandKind, value: &Value) -> Result<T> {
            T::deserialize(value).map_err(|source| CommandError::Payload { kind, source })
        }

        let value = &dto.args;
        let command = match kind {
            CommandKind::CreateArea => Self::CreateArea(args(kind, value)?),
            CommandKind::RemoveArea => Self::RemoveArea(args(kind, value)?),
            CommandKind::CreateLink => Self::CreateLink(args(kind, value)?),
            CommandKind::RemoveLink => Self::RemoveLink(args(kind, value)?),
            CommandKind::CreateCluster => Self::CreateCluster(args(kind, value)?),
            CommandKind::CreateRenewablesCluster => {
                Self::CreateRenewablesCluster(args(kind, value)?)
            }
            CommandKind::CreateShortTermStorage => Self::CreateShortTermStorage(args(kind, value)?),
            CommandKind::RemoveCluster => Self::RemoveCluster(args(kind, value)?),
            CommandKind::RemoveRenewablesCluster => {
                Self::RemoveRenewablesCluster(args(kind, value)?)
            }
            CommandKind::RemoveShortTermStorage => Self::RemoveShortTermStorage(args(kind, value)?),
            CommandKind::ReplaceMatrix => Self::ReplaceMatrix(args(kind, value)?),
            CommandKind::UpdateConfig => Self::UpdateConfig(args(kind, value)?),
            CommandKind::CreateBindingConstraint => {
                Self::CreateBindingConstraint(args(kind, value)?)
            }
            CommandKind::UpdateBindingConstraint => {
                Self::UpdateBindingConstraint(args(kind, value)?)
            }
            CommandKind::RemoveBindingConstraint => {
                Self::RemoveBindingConstraint(args(kind, value)?)
            }
        };

        Ok(command)
    }
}

/// Separator joining the parts of a match signature.
pub const SIGNATURE_SEPARATOR: &str = "%";

/// Command kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CreateArea,
    RemoveArea,
    CreateLink,
    RemoveLink,
    CreateCluster,
    CreateRenewablesCluster,
    CreateShortTermStorage,
    RemoveCluster,
    RemoveRenewablesCluster,
    RemoveShortTermStorage,
    ReplaceMatrix,
    UpdateConfig,
    CreateBindingConstraint,
    UpdateBindingConstraint,
    RemoveBindingConstraint,
}

impl CommandKind {
    /// Every command kind.
    pub const ALL: [CommandKind; 15] = [
        Self::CreateArea,
        Self::RemoveArea,
        Self::CreateLink,
        Self::RemoveLink,
        Self::CreateCluster,
        Self::CreateRenewablesCluster,
        Self::CreateShortTermStorage,
        Self::RemoveCluster,
        Self::RemoveRenewablesCluster,
        Self::RemoveShortTermStorage,
        Self::ReplaceMatrix,
        Self::UpdateConfig,
        Self::CreateBindingConstraint,
        Self::UpdateBindingConstraint,
        Self::RemoveBindingConstraint,
    ];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateArea => "create_area",
            Self::RemoveArea => "remove_area",
            Self::CreateLink => "create_link",
            Self::RemoveLink => "remove_link",
            Self::CreateCluster => "create_cluster",
            Self::CreateRenewablesCluster => "create_renewables_cluster",
            Self::CreateShortTermStorage => "create_st_storage",
            Self::RemoveCluster => "remove_cluster",
            Self::RemoveRenewablesCluster => "remove_renewables_cluster",
            Self::RemoveShortTermStorage => "remove_st_storage",
            Self::ReplaceMatrix => "replace_matrix",
            Self::UpdateConfig => "update_config",
            Self::CreateBindingConstraint => "create_binding_constraint",
            Self::UpdateBindingConstraint => "update_binding_constraint",
            Self::RemoveBindingConstraint => "remove_binding_constraint",
        }
    }

    /// Current payload version of the kind.
    pub fn version(self) -> u32 {
        1
    }
}

impl Display for CommandKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| CommandError::UnknownKind(raw.to_string()))
    }
}

impl Serialize for CommandKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Wire form of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDto {
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub args: Value,
}

/// Outcome of one command application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub status: bool,
    pub message: String,
}

impl CommandOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}

/// Matrix argument of a command.
///
/// Either a `matrix://` reference to stored content or an inline 2-D array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatrixPayload {
    Reference(String),
    Inline(Vec<Vec<f64>>),
}

impl MatrixPayload {
    /// Inline payload holding a copy of a matrix.
    pub fn inline(matrix: &Matrix) -> Self {
        Self::Inline(matrix.data().to_vec())
    }

    /// Store payload if needed, returning its `matrix://` reference.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Precondition`] if a reference is malformed
    ///   or names a matrix that is not stored.
    /// - Return [`CommandError::Payload`] if an inline array is ragged.
    /// - Return [`CommandError::Matrix`] if the repository rejects a store.
    pub fn resolve(&self, repository: &dyn MatrixRepository) -> Result<String> {
        match self {
            Self::Reference(raw) => {
                let id = raw
                    .parse::<Reference>()
                    .ok()
                    .and_then(|reference| reference.matrix_id())
                    .ok_or_else(|| {
                        CommandError::Precondition(format!("{raw:?} is not a matrix reference"))
                    })?;
                if !repository.exists(&id) {
                    return Err(CommandError::Precondition(format!("matrix {id} does not exist")));
                }

                Ok(raw.clone())
            }
            Self::Inline(rows) => {
                let matrix = Matrix::new(rows.clone()).map_err(|error| {
                    CommandError::Precondition(format!("invalid inline matrix: {error}"))
                })?;
                let id = repository.store(&matrix)?;

                Ok(Reference::Matrix(id).to_string())
            }
        }
    }

    fn normalized(&self, repository: &dyn MatrixRepository) -> Result<Self> {
        Ok(Self::Reference(self.resolve(repository)?))
    }
}

/// Resolve optional payload, falling back to a default matrix.
pub(crate) fn resolve_or(
    payload: Option<&MatrixPayload>,
    default: impl FnOnce() -> Matrix,
    repository: &dyn MatrixRepository,
) -> Result<String> {
    match payload {
        Some(payload) => payload.resolve(repository),
        None => Ok(Reference::Matrix(repository.store(&default())?).to_string()),
    }
}

/// Replace-matrix patch for an optional payload that differs.
pub(crate) fn matrix_patch(
    target: String,
    mine: Option<&MatrixPayload>,
    theirs: Option<&MatrixPayload>,
    default: impl FnOnce() -> Matrix,
) -> Option<Command> {
    if mine == theirs {
        return None;
    }

    let matrix = theirs
        .cloned()
        .unwrap_or_else(|| MatrixPayload::inline(&default()));

    Some(Command::ReplaceMatrix(ReplaceMatrix { target, matrix }))
}

/// Fail unless every parameter can be stored in a record.
pub(crate) fn ensure_scalars(parameters: &Map<String, Value>) -> Result<()> {
    match parameters.iter().find(|(_, value)| !ini::is_storable(value)) {
        Some((key, _)) => Err(CommandError::Precondition(format!(
            "parameter {key:?} must be a scalar or a list of scalars"
        ))),
        None => Ok(()),
    }
}

/// Fail unless the study format is at least `version`.
pub(crate) fn ensure_version(study: &FileStudy, version: u32, what: &str) -> Result<()> {
    if study.version() < version {
        return Err(CommandError::Precondition(format!(
            "{what} needs study format {version} or later, study is {}",
            study.version()
        )));
    }

    Ok(())
}

/// Delete path, ignoring parts of it that do not exist.
pub(crate) fn delete_if_present(study: &FileStudy, path: &str) -> Result<()> {
    match study.delete(path) {
        Ok(()) | Err(TreeError::UnknownChild { .. }) => Ok(()),
        Err(error) => Err(error.into()),
    }
}

/// Coefficient keys of every binding constraint section.
pub(crate) fn constraint_terms(study: &FileStudy) -> Result<Vec<String>> {
    let document = study.get(
        "input/bindingconstraints/bindingconstraints",
        crate::tree::path::Depth::Unbounded,
    )?;

    let Value::Object(sections) = document else {
        return Ok(Vec::new());
    };

    Ok(sections
        .values()
        .filter_map(Value::as_object)
        .flat_map(|body| body.keys())
        .filter(|key| key.contains('%') || key.contains('.'))
        .cloned()
        .collect())
}

/// Successful application: message plus extra data.
pub(crate) struct Applied {
    message: String,
    extra: Map<String, Value>,
}

impl Applied {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extra: Map::new(),
        }
    }

    pub(crate) fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Default matrices of new entities.
pub(crate) mod defaults {
    use crate::{matrix::Matrix, study::config::TimeStep};

    const HOURS: usize = 8760;
    const DAYS: usize = 365;

    pub(crate) fn empty() -> Matrix {
        Matrix::default()
    }

    pub(crate) fn link_parameters() -> Matrix {
        Matrix::filled(HOURS, &[0.0; 6])
    }

    pub(crate) fn link_capacity() -> Matrix {
        Matrix::filled(HOURS, &[1.0])
    }

    pub(crate) fn link_series_legacy() -> Matrix {
        Matrix::filled(HOURS, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    pub(crate) fn thermal_prepro() -> Matrix {
        Matrix::filled(DAYS, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0])
    }

    pub(crate) fn thermal_modulation() -> Matrix {
        Matrix::filled(HOURS, &[1.0, 1.0, 1.0, 0.0])
    }

    pub(crate) fn hourly_ones() -> Matrix {
        Matrix::filled(HOURS, &[1.0])
    }

    pub(crate) fn hourly_zeros() -> Matrix {
        Matrix::filled(HOURS, &[0.0])
    }

    pub(crate) fn constraint_values(time_step: TimeStep) -> Matrix {
        Matrix::filled(time_step.rows(), &[0.0; 3])
    }

    pub(crate) fn constraint_term(time_step: TimeStep) -> Matrix {
        Matrix::filled(time_step.rows(), &[0.0])
    }
}

/// Command error types.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Kind string names no command.
    #[error("unknown command kind {0:?}")]
    UnknownKind(String),

    /// Payload version is not supported.
    #[error("command {kind} does not support payload version {version}")]
    UnsupportedVersion { kind: CommandKind, version: u32 },

    /// Business rule violated before anything was changed.
    #[error("{0}")]
    Precondition(String),

    /// Arguments do not fit the command kind.
    #[error("invalid arguments for command {kind}")]
    Payload {
        kind: CommandKind,
        #[source]
        source: serde_json::Error,
    },

    /// Study tree operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Study configuration cannot be rebuilt.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Matrix repository operation failed.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

impl From<StudyError> for CommandError {
    fn from(error: StudyError) -> Self {
        match error {
            StudyError::Config(error) => Self::Config(error),
            StudyError::Tree(error) => Self::Tree(error),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = CommandError> = std::result::Result<T, E>;
