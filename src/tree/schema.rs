// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Declarative study layout.
//!
//! The shape of a study is plain data: a [`Spec`] says which node kind lives
//! at a position, and a folder lists [`Entry`] rules that expand into named
//! children once a [`StudyConfig`] scope is known. The node factory in
//! [`crate::tree`] turns a spec and a scope into a node. Nothing here touches
//! disk.
//!
//! # Children Rules
//!
//! - [`Children::Named`]: one fixed child.
//! - [`Children::PerArea`]: one child per area of the study.
//! - [`Children::PerLink`]: one child per link leaving the bound area.
//! - [`Children::PerCluster`]: one child per cluster of a kind in the bound
//!   area.
//! - [`Children::PerOutput`]: one child per simulation output.
//! - [`Children::ResultFolder`]: the result folder of the bound output.
//! - [`Children::ConstraintTerms`]: the term matrices of every binding
//!   constraint.
//!
//! Every entry may be restricted to a range of study format versions.

use crate::study::config::{ClusterKind, StudyConfig};

use serde_json::Value;
use std::sync::LazyLock;

/// Whole study layout, built on first use.
pub static STUDY_LAYOUT: LazyLock<Spec> = LazyLock::new(study_layout);

/// Node kind declaration.
#[derive(Debug)]
pub enum Spec {
    /// Folder with statically declared children rules.
    Folder(Vec<Entry>),

    /// Folder whose children mirror the directory listing.
    Bucket {
        /// Treat `.txt` entries as matrices instead of blobs.
        matrices: bool,
    },

    /// Record file with an optional typed schema.
    Record(Option<RecordSchema>),

    /// Opaque file.
    Blob,

    /// Numeric matrix file.
    Matrix,
}

/// Children rule inside a folder.
#[derive(Debug)]
pub struct Entry {
    pub children: Children,
    pub spec: Spec,
    since: u32,
    before: Option<u32>,
}

impl Entry {
    /// Construct new entry available in every format version.
    pub fn new(children: Children, spec: Spec) -> Self {
        Self {
            children,
            spec,
            since: 0,
            before: None,
        }
    }

    /// Restrict entry to format versions at or above `version`.
    pub fn since(mut self, version: u32) -> Self {
        self.since = version;
        self
    }

    /// Restrict entry to format versions strictly below `version`.
    pub fn before(mut self, version: u32) -> Self {
        self.before = Some(version);
        self
    }

    /// Check if entry exists in a format version.
    pub fn applies(&self, version: u32) -> bool {
        version >= self.since && self.before.is_none_or(|before| version < before)
    }
}

/// Children expansion rules.
#[derive(Debug)]
pub enum Children {
    Named { key: &'static str, file: &'static str },
    PerArea(Template),
    PerLink(Template),
    PerCluster(ClusterKind, Template),
    PerOutput,
    ResultFolder,
    ConstraintTerms,
}

/// Name template of generated children.
///
/// A child generated for id `fr` is keyed `<prefix>fr<suffix>` and stored in
/// file `<prefix>fr<suffix><ext>`.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    prefix: &'static str,
    suffix: &'static str,
    ext: &'static str,
}

impl Template {
    /// Child named after the id itself, e.g., a per-area folder.
    pub const ID: Template = Template::new("", "", "");

    pub const fn new(prefix: &'static str, suffix: &'static str, ext: &'static str) -> Self {
        Self {
            prefix,
            suffix,
            ext,
        }
    }

    /// Key of child generated for id.
    pub fn key(&self, id: &str) -> String {
        format!("{}{id}{}", self.prefix, self.suffix)
    }

    /// File name of child generated for id.
    pub fn file(&self, id: &str) -> String {
        format!("{}{}", self.key(id), self.ext)
    }
}

/// Bindings collected while descending generated children.
///
/// Rules such as [`Children::PerLink`] need to know which area the
/// enclosing folder was generated for.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Binding {
    pub area: Option<String>,
    pub output: Option<String>,
}

impl Binding {
    pub fn with_area(&self, area: &str) -> Self {
        Self {
            area: Some(area.to_string()),
            output: self.output.clone(),
        }
    }

    pub fn with_output(&self, output: &str) -> Self {
        Self {
            area: self.area.clone(),
            output: Some(output.to_string()),
        }
    }
}

/// Child generated from a folder entry.
#[derive(Debug)]
pub struct Expanded {
    pub key: String,
    pub file: String,
    pub binding: Binding,
}

impl Children {
    /// Expand rule against a config scope.
    pub fn expand(&self, config: &StudyConfig, binding: &Binding) -> Vec<Expanded> {
        let area = binding.area.as_deref().unwrap_or_default();
        match self {
            Self::Named { key, file } => vec![Expanded {
                key: (*key).to_string(),
                file: (*file).to_string(),
                binding: binding.clone(),
            }],
            Self::PerArea(template) => config
                .area_names()
                .into_iter()
                .map(|id| Expanded {
                    key: template.key(id),
                    file: template.file(id),
                    binding: binding.with_area(id),
                })
                .collect(),
            Self::PerLink(template) => config
                .links_of(area)
                .map(|links| {
                    links
                        .keys()
                        .map(|target| Expanded {
                            key: template.key(target),
                            file: template.file(target),
                            binding: binding.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            Self::PerCluster(kind, template) => config
                .clusters_of(area, *kind)
                .map(|clusters| {
                    clusters
                        .iter()
                        .map(|id| Expanded {
                            key: template.key(id),
                            file: template.file(id),
                            binding: binding.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            Self::PerOutput => config
                .outputs()
                .keys()
                .map(|id| Expanded {
                    key: id.clone(),
                    file: id.clone(),
                    binding: binding.with_output(id),
                })
                .collect(),
            Self::ResultFolder => binding
                .output
                .as_deref()
                .and_then(|output| config.outputs().get(output))
                .map(|simulation| {
                    let folder = simulation.mode.folder();
                    vec![Expanded {
                        key: folder.to_string(),
                        file: folder.to_string(),
                        binding: binding.clone(),
                    }]
                })
                .unwrap_or_default(),
            Self::ConstraintTerms => config
                .bindings()
                .iter()
                .flat_map(|constraint| {
                    if config.version() >= 870 {
                        constraint
                            .operator
                            .terms()
                            .iter()
                            .map(|term| format!("{}_{term}", constraint.id))
                            .collect::<Vec<_>>()
                    } else {
                        vec![constraint.id.clone()]
                    }
                })
                .map(|key| Expanded {
                    file: format!("{key}.txt"),
                    key,
                    binding: binding.clone(),
                })
                .collect(),
        }
    }
}

/// Typed record schema.
///
/// Keys that the schema does not declare are always allowed.
#[derive(Debug)]
pub enum RecordSchema {
    /// Fixed set of named sections.
    Fixed(Vec<(&'static str, Vec<Field>)>),

    /// Every section follows the same field table.
    Each(Vec<Field>),
}

impl RecordSchema {
    /// Check document against schema.
    ///
    /// Return a description of the first violation found.
    pub fn check(&self, document: &serde_json::Map<String, Value>) -> Result<(), String> {
        match self {
            Self::Fixed(sections) => {
                for (name, fields) in sections {
                    match document.get(*name) {
                        Some(body) => check_section(name, body, fields)?,
                        None if fields.iter().any(|field| field.required) => {
                            return Err(format!("missing section {name:?}"));
                        }
                        None => {}
                    }
                }
            }
            Self::Each(fields) => {
                for (name, body) in document {
                    check_section(name, body, fields)?;
                }
            }
        }

        Ok(())
    }
}

fn check_section(name: &str, body: &Value, fields: &[Field]) -> Result<(), String> {
    let Value::Object(body) = body else {
        return Err(format!("section {name:?} is not a mapping"));
    };

    for field in fields {
        match body.get(field.name) {
            Some(value) if !field.kind.accepts(value) => {
                return Err(format!(
                    "field {:?} of section {name:?} is not {}",
                    field.name,
                    field.kind.describe()
                ));
            }
            None if field.required => {
                return Err(format!("section {name:?} lacks field {:?}", field.name));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Typed record field.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

/// Scalar type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Str,
}

impl FieldKind {
    /// Check if value fits the field type.
    ///
    /// Repeated keys hold lists: every element must fit.
    pub fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().all(|item| self.accepts_scalar(item)),
            scalar => self.accepts_scalar(scalar),
        }
    }

    fn accepts_scalar(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Str => !matches!(value, Value::Object(_) | Value::Array(_)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::Int => "an integer",
            Self::Float => "a number",
            Self::Str => "a scalar",
        }
    }
}

const fn required(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        required: false,
    }
}

fn named(key: &'static str, file: &'static str, spec: Spec) -> Entry {
    Entry::new(Children::Named { key, file }, spec)
}

fn folder(key: &'static str, entries: Vec<Entry>) -> Entry {
    named(key, key, Spec::Folder(entries))
}

fn ini(key: &'static str, file: &'static str, schema: Option<RecordSchema>) -> Entry {
    named(key, file, Spec::Record(schema))
}

fn matrix(key: &'static str, file: &'static str) -> Entry {
    named(key, file, Spec::Matrix)
}

fn per_area(template: Template, spec: Spec) -> Entry {
    Entry::new(Children::PerArea(template), spec)
}

fn per_cluster(kind: ClusterKind, spec: Spec) -> Entry {
    Entry::new(Children::PerCluster(kind, Template::ID), spec)
}

fn study_layout() -> Spec {
    use FieldKind::{Bool, Float, Int, Str};

    let study = RecordSchema::Fixed(vec![(
        "antares",
        vec![
            required("version", Int),
            optional("caption", Str),
            optional("author", Str),
            optional("created", Int),
            optional("lastsave", Int),
        ],
    )]);
    let general_data = RecordSchema::Fixed(vec![
        (
            "general",
            vec![
                optional("mode", Str),
                optional("nbyears", Int),
                optional("year-by-year", Bool),
                optional("simulation.start", Int),
                optional("simulation.end", Int),
            ],
        ),
        ("output", vec![optional("synthesis", Bool), optional("storenewset", Bool)]),
    ]);
    let optimization = RecordSchema::Fixed(vec![
        (
            "nodal optimization",
            vec![
                optional("non-dispatchable-power", Bool),
                optional("dispatchable-hydro-power", Bool),
                optional("other-dispatchable-power", Bool),
                optional("spread-unsupplied-energy-cost", Float),
                optional("spread-spilled-energy-cost", Float),
            ],
        ),
        (
            "filtering",
            vec![optional("filter-synthesis", Str), optional("filter-year-by-year", Str)],
        ),
    ]);
    let ui = RecordSchema::Fixed(vec![(
        "ui",
        vec![
            optional("x", Int),
            optional("y", Int),
            optional("color_r", Int),
            optional("color_g", Int),
            optional("color_b", Int),
        ],
    )]);
    let link_properties = RecordSchema::Each(vec![
        optional("hurdles-cost", Bool),
        optional("loop-flow", Bool),
        optional("use-phase-shifter", Bool),
        optional("transmission-capacities", Str),
        optional("asset-type", Str),
        optional("display-comments", Bool),
        optional("filter-synthesis", Str),
        optional("filter-year-by-year", Str),
    ]);
    let thermal_list = RecordSchema::Each(vec![
        required("name", Str),
        optional("group", Str),
        optional("enabled", Bool),
        optional("unitcount", Int),
        optional("nominalcapacity", Float),
        optional("min-stable-power", Float),
        optional("marginal-cost", Float),
        optional("market-bid-cost", Float),
        optional("spread-cost", Float),
        optional("co2", Float),
    ]);
    let renewable_list = RecordSchema::Each(vec![
        required("name", Str),
        optional("group", Str),
        optional("enabled", Bool),
        optional("unitcount", Int),
        optional("nominalcapacity", Float),
        optional("ts-interpretation", Str),
    ]);
    let storage_list = RecordSchema::Each(vec![
        required("name", Str),
        optional("group", Str),
        optional("injectionnominalcapacity", Float),
        optional("withdrawalnominalcapacity", Float),
        optional("reservoircapacity", Float),
        optional("efficiency", Float),
        optional("initiallevel", Float),
        optional("initialleveloptim", Bool),
        optional("enabled", Bool),
    ]);
    let constraints = RecordSchema::Each(vec![
        required("name", Str),
        required("id", Str),
        optional("enabled", Bool),
        optional("type", Str),
        optional("operator", Str),
        optional("comments", Str),
        optional("group", Str),
    ]);
    let parameters = RecordSchema::Fixed(vec![
        (
            "general",
            vec![optional("mode", Str), optional("nbyears", Int), optional("year-by-year", Bool)],
        ),
        ("output", vec![optional("synthesis", Bool)]),
    ]);

    let cluster_lists = |kind: ClusterKind, schema: RecordSchema| {
        per_area(
            Template::ID,
            Spec::Folder(vec![ini("list", "list.ini", Some(schema))]),
        )
        .since(kind.since())
    };
    let cluster_series = |kind: ClusterKind, series: Vec<Entry>| {
        per_area(
            Template::ID,
            Spec::Folder(vec![per_cluster(kind, Spec::Folder(series))]),
        )
    };

    let thermal = folder(
        "thermal",
        vec![
            ini("areas", "areas.ini", None),
            named(
                "clusters",
                "clusters",
                Spec::Folder(vec![cluster_lists(ClusterKind::Thermal, thermal_list)]),
            ),
            folder(
                "prepro",
                vec![cluster_series(
                    ClusterKind::Thermal,
                    vec![matrix("data", "data.txt"), matrix("modulation", "modulation.txt")],
                )],
            ),
            folder(
                "series",
                vec![cluster_series(ClusterKind::Thermal, vec![matrix("series", "series.txt")])],
            ),
        ],
    );

    let renewables = folder(
        "renewables",
        vec![
            named(
                "clusters",
                "clusters",
                Spec::Folder(vec![cluster_lists(ClusterKind::Renewable, renewable_list)]),
            ),
            folder(
                "series",
                vec![cluster_series(ClusterKind::Renewable, vec![matrix("series", "series.txt")])],
            ),
        ],
    )
    .since(ClusterKind::Renewable.since());

    let storage = folder(
        "st-storage",
        vec![
            named(
                "clusters",
                "clusters",
                Spec::Folder(vec![cluster_lists(ClusterKind::ShortTermStorage, storage_list)]),
            ),
            folder(
                "series",
                vec![cluster_series(
                    ClusterKind::ShortTermStorage,
                    STORAGE_SERIES
                        .iter()
                        .map(|(key, file)| matrix(key, file))
                        .collect(),
                )],
            ),
        ],
    )
    .since(ClusterKind::ShortTermStorage.since());

    let links = folder(
        "links",
        vec![per_area(
            Template::ID,
            Spec::Folder(vec![
                ini("properties", "properties.ini", Some(link_properties)),
                Entry::new(Children::PerLink(Template::new("", "", ".txt")), Spec::Matrix).before(820),
                Entry::new(
                    Children::PerLink(Template::new("", "_parameters", ".txt")),
                    Spec::Matrix,
                )
                .since(820),
                named(
                    "capacities",
                    "capacities",
                    Spec::Folder(vec![
                        Entry::new(
                            Children::PerLink(Template::new("", "_direct", ".txt")),
                            Spec::Matrix,
                        ),
                        Entry::new(
                            Children::PerLink(Template::new("", "_indirect", ".txt")),
                            Spec::Matrix,
                        ),
                    ]),
                )
                .since(820),
            ]),
        )],
    );

    let areas = folder(
        "areas",
        vec![
            named("list", "list.txt", Spec::Blob),
            ini("sets", "sets.ini", None),
            per_area(
                Template::ID,
                Spec::Folder(vec![
                    ini("optimization", "optimization.ini", Some(optimization)),
                    ini("ui", "ui.ini", Some(ui)),
                ]),
            ),
        ],
    );

    let load = folder(
        "load",
        vec![folder(
            "series",
            vec![per_area(Template::new("load_", "", ".txt"), Spec::Matrix)],
        )],
    );

    let binding_constraints = folder(
        "bindingconstraints",
        vec![
            ini("bindingconstraints", "bindingconstraints.ini", Some(constraints)),
            Entry::new(Children::ConstraintTerms, Spec::Matrix),
        ],
    );

    let output = folder(
        "output",
        vec![Entry::new(
            Children::PerOutput,
            Spec::Folder(vec![
                folder(
                    "about-the-study",
                    vec![ini("parameters", "parameters.ini", Some(parameters))],
                ),
                named("info", "info.antares-output", Spec::Record(None)),
                Entry::new(Children::ResultFolder, Spec::Bucket { matrices: true }),
            ]),
        )],
    );

    Spec::Folder(vec![
        ini("study", "study.antares", Some(study)),
        folder(
            "settings",
            vec![ini("generaldata", "generaldata.ini", Some(general_data))],
        ),
        folder(
            "input",
            vec![areas, links, thermal, renewables, storage, load, binding_constraints],
        ),
        output,
        named("user", "user", Spec::Bucket { matrices: false }),
    ])
}

/// Short-term storage series: key and file name.
pub const STORAGE_SERIES: [(&str, &str); 5] = [
    ("pmax_injection", "pmax_injection.txt"),
    ("pmax_withdrawal", "pmax_withdrawal.txt"),
    ("inflows", "inflows.txt"),
    ("lower_rule_curve", "lower_rule_curve.txt"),
    ("upper_rule_curve", "upper_rule_curve.txt"),
];
