// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Logical shape of a study.
//!
//! A [`StudyConfig`] describes which areas, links, clusters, binding
//! constraints and simulation outputs a study has, independently of the
//! content of any file. The node tree is built from it: "one child per area"
//! style folders ask the config which areas exist.
//!
//! # Scopes
//!
//! Every node holds a config __scope__: the shared study metadata plus the
//! path of that node relative to the study root. Descending one level is
//! [`StudyConfig::scope`], which clones a reference to the metadata and
//! extends the relative path. The metadata itself is never copied by a
//! descent and never changes under a live tree. Commands that reshape a study
//! go through [`StudyConfig::edit`], which produces a new metadata block that
//! a fresh tree is then built from.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

/// Output filter frequencies, in canonical order.
pub const FREQUENCIES: [&str; 5] = ["hourly", "daily", "weekly", "monthly", "annual"];

/// Scoped view over shared study metadata.
#[derive(Debug, Clone)]
pub struct StudyConfig {
    metadata: Arc<StudyMetadata>,
    relative: PathBuf,
}

impl StudyConfig {
    /// Construct root scope over study metadata.
    pub fn new(metadata: StudyMetadata) -> Self {
        Self {
            metadata: Arc::new(metadata),
            relative: PathBuf::new(),
        }
    }

    /// Narrow scope by one path segment.
    ///
    /// The returned config shares metadata with `self`.
    pub fn scope(&self, segment: impl AsRef<Path>) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            relative: self.relative.join(segment),
        }
    }

    /// Produce a new root scope whose metadata is edited by `editor`.
    ///
    /// Existing scopes keep observing the metadata they were built with.
    pub fn edit<E>(&self, editor: E) -> Self
    where
        E: FnOnce(&mut StudyMetadata),
    {
        let mut metadata = self.metadata.as_ref().clone();
        editor(&mut metadata);
        Self::new(metadata)
    }

    /// Shared study metadata.
    pub fn metadata(&self) -> &StudyMetadata {
        &self.metadata
    }

    /// Check if two scopes observe the same metadata block.
    pub fn shares_metadata(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.metadata, &other.metadata)
    }

    /// Absolute path of study root.
    pub fn root(&self) -> &Path {
        &self.metadata.root
    }

    /// Absolute path of this scope.
    pub fn path(&self) -> PathBuf {
        self.metadata.root.join(&self.relative)
    }

    /// Path of this scope relative to study root.
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    /// Study format version, e.g., `860` for 8.6.
    pub fn version(&self) -> u32 {
        self.metadata.version
    }

    /// Ordered area ids.
    pub fn area_names(&self) -> Vec<&str> {
        self.metadata.areas.keys().map(String::as_str).collect()
    }

    /// Check if area exists.
    pub fn has_area(&self, id: &str) -> bool {
        self.metadata.areas.contains_key(id)
    }

    /// Look up area by id.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnknownArea`] if area does not exist.
    pub fn area(&self, id: &str) -> Result<&Area> {
        self.metadata
            .areas
            .get(id)
            .ok_or_else(|| ConfigError::UnknownArea(id.to_string()))
    }

    /// Ordered cluster ids of one kind in an area.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnknownArea`] if area does not exist.
    pub fn clusters_of(&self, area: &str, kind: ClusterKind) -> Result<&[String]> {
        Ok(self.area(area)?.clusters(kind))
    }

    /// Links leaving an area, keyed by target area id.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnknownArea`] if area does not exist.
    pub fn links_of(&self, area: &str) -> Result<&BTreeMap<String, Link>> {
        Ok(&self.area(area)?.links)
    }

    /// Check if a link exists between two areas, in either direction.
    pub fn has_link(&self, area1: &str, area2: &str) -> bool {
        let (from, to) = link_endpoints(area1, area2);
        self.metadata
            .areas
            .get(from)
            .is_some_and(|area| area.links.contains_key(to))
    }

    /// Simulation outputs keyed by output id.
    pub fn outputs(&self) -> &BTreeMap<String, Simulation> {
        &self.metadata.outputs
    }

    /// Binding constraints in declaration order.
    pub fn bindings(&self) -> &[BindingConstraint] {
        &self.metadata.bindings
    }

    /// Look up binding constraint by id.
    pub fn binding(&self, id: &str) -> Option<&BindingConstraint> {
        self.metadata.bindings.iter().find(|binding| binding.id == id)
    }
}

impl PartialEq for StudyConfig {
    fn eq(&self, other: &Self) -> bool {
        self.relative == other.relative && self.metadata == other.metadata
    }
}

/// Study-wide metadata shared by every scope.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyMetadata {
    /// Absolute path of study root.
    pub root: PathBuf,

    /// Study format version.
    pub version: u32,

    /// Areas keyed by id.
    pub areas: BTreeMap<String, Area>,

    /// Simulation outputs keyed by output directory name.
    pub outputs: BTreeMap<String, Simulation>,

    /// Binding constraints in declaration order.
    pub bindings: Vec<BindingConstraint>,
}

impl StudyMetadata {
    /// Construct new empty metadata.
    pub fn new(root: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            root: root.into(),
            version,
            areas: BTreeMap::new(),
            outputs: BTreeMap::new(),
            bindings: Vec::new(),
        }
    }
}

/// Area declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    /// Links to areas with a greater id, keyed by target id.
    pub links: BTreeMap<String, Link>,

    /// Thermal cluster ids.
    pub thermals: Vec<String>,

    /// Renewable cluster ids.
    pub renewables: Vec<String>,

    /// Short-term storage ids.
    pub st_storages: Vec<String>,

    /// Synthesis output filter.
    pub filters_synthesis: Vec<String>,

    /// Year-by-year output filter.
    pub filters_year: Vec<String>,
}

impl Default for Area {
    fn default() -> Self {
        Self {
            links: BTreeMap::new(),
            thermals: Vec::new(),
            renewables: Vec::new(),
            st_storages: Vec::new(),
            filters_synthesis: all_frequencies(),
            filters_year: all_frequencies(),
        }
    }
}

impl Area {
    /// Cluster ids of one kind.
    pub fn clusters(&self, kind: ClusterKind) -> &[String] {
        match kind {
            ClusterKind::Thermal => &self.thermals,
            ClusterKind::Renewable => &self.renewables,
            ClusterKind::ShortTermStorage => &self.st_storages,
        }
    }

    /// Mutable cluster ids of one kind.
    pub fn clusters_mut(&mut self, kind: ClusterKind) -> &mut Vec<String> {
        match kind {
            ClusterKind::Thermal => &mut self.thermals,
            ClusterKind::Renewable => &mut self.renewables,
            ClusterKind::ShortTermStorage => &mut self.st_storages,
        }
    }
}

/// Link declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub filters_synthesis: Vec<String>,
    pub filters_year: Vec<String>,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            filters_synthesis: all_frequencies(),
            filters_year: all_frequencies(),
        }
    }
}

/// Kinds of generation or storage units attached to an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterKind {
    Thermal,
    Renewable,
    ShortTermStorage,
}

impl ClusterKind {
    /// Every cluster kind.
    pub const ALL: [ClusterKind; 3] = [Self::Thermal, Self::Renewable, Self::ShortTermStorage];

    /// Directory under `input/` holding this kind.
    pub fn dir(self) -> &'static str {
        match self {
            Self::Thermal => "thermal",
            Self::Renewable => "renewables",
            Self::ShortTermStorage => "st-storage",
        }
    }

    /// First format version that knows this kind.
    pub fn since(self) -> u32 {
        match self {
            Self::Thermal => 0,
            Self::Renewable => 810,
            Self::ShortTermStorage => 860,
        }
    }
}

impl Display for ClusterKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.dir())
    }
}

/// Simulation output declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    /// Launch date as `YYYYMMDD-HHMM`.
    pub date: String,

    /// Free-form suffix of the output name.
    pub name: String,

    pub mode: SimulationMode,

    /// Number of Monte-Carlo years.
    pub nbyears: u32,

    /// Year-by-year results were written.
    pub by_year: bool,

    /// Synthesis results were written.
    pub synthesis: bool,
}

/// Simulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    Economy,
    Adequacy,
    Draft,
}

impl SimulationMode {
    /// Three-letter tag used in output directory names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Economy => "eco",
            Self::Adequacy => "adq",
            Self::Draft => "dft",
        }
    }

    /// Name of the per-mode result folder inside an output.
    pub fn folder(self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::Adequacy => "adequacy",
            Self::Draft => "adequacy-draft",
        }
    }

    /// Parse three-letter tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "eco" => Some(Self::Economy),
            "adq" => Some(Self::Adequacy),
            "dft" => Some(Self::Draft),
            _ => None,
        }
    }
}

/// Binding constraint declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConstraint {
    pub id: String,
    pub operator: Operator,
    pub time_step: TimeStep,
    pub group: Option<String>,
}

/// Binding constraint comparison operator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Less,
    Greater,
    Both,
    Equal,
}

impl Operator {
    /// Suffixes of the term matrices this operator needs.
    pub fn terms(self) -> &'static [&'static str] {
        match self {
            Self::Less => &["lt"],
            Self::Greater => &["gt"],
            Self::Both => &["lt", "gt"],
            Self::Equal => &["eq"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Less => "less",
            Self::Greater => "greater",
            Self::Both => "both",
            Self::Equal => "equal",
        }
    }
}

impl FromStr for Operator {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "less" => Ok(Self::Less),
            "greater" => Ok(Self::Greater),
            "both" => Ok(Self::Both),
            "equal" => Ok(Self::Equal),
            other => Err(ConfigError::Invalid {
                path: PathBuf::new(),
                reason: format!("unknown operator {other:?}"),
            }),
        }
    }
}

/// Binding constraint time step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeStep {
    #[default]
    Hourly,
    Daily,
    Weekly,
}

impl TimeStep {
    /// Number of rows of a term matrix at this time step.
    pub fn rows(self) -> usize {
        match self {
            Self::Hourly => 8784,
            Self::Daily | Self::Weekly => 366,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl FromStr for TimeStep {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(ConfigError::Invalid {
                path: PathBuf::new(),
                reason: format!("unknown time step {other:?}"),
            }),
        }
    }
}

/// Derive an entity id from a display name.
///
/// Characters outside `[A-Za-z0-9_(),& -]` become spaces, runs of
/// whitespace collapse into one space, and the result is trimmed and
/// lower-cased.
pub fn to_entity_id(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "_(),& -".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect::<String>();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Order link endpoints the way they are stored: under the smaller id.
pub fn link_endpoints<'a>(area1: &'a str, area2: &'a str) -> (&'a str, &'a str) {
    if area1 <= area2 {
        (area1, area2)
    } else {
        (area2, area1)
    }
}

/// Split a comma-separated filter declaration.
pub fn parse_filters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

pub(crate) fn all_frequencies() -> Vec<String> {
    FREQUENCIES.iter().map(|item| (*item).to_string()).collect()
}

/// Study configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Declaration file cannot be read.
    #[error("failed to read study declaration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Declaration file is not valid record text.
    #[error("failed to parse study declaration at {:?}", path.display())]
    Parse {
        #[source]
        source: crate::ini::IniError,
        path: PathBuf,
    },

    /// Declaration parses but its content is unusable.
    #[error("invalid study declaration at {:?}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    /// Area id does not name an existing area.
    #[error("unknown area {0:?}")]
    UnknownArea(String),
}

impl ConfigError {
    /// Check if this error aborted configuration construction.
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, Self::UnknownArea(_))
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
