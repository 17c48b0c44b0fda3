// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Study configuration construction.
//!
//! A [`StudyConfig`] can be built two ways:
//!
//! 1. By scanning a study directory on disk.
//! 2. From a value tree previously exported by a full, unbounded read of the
//!    study's node tree.
//!
//! Both paths funnel every declaration through the same interpretation
//! helpers, so they produce identical metadata for the same logical study.

use crate::{
    ini::{self, Document},
    study::config::{
        all_frequencies, parse_filters, to_entity_id, Area, BindingConstraint, ClusterKind,
        ConfigError, Link, Result, Simulation, SimulationMode, StudyConfig, StudyMetadata,
    },
};

use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

impl StudyConfig {
    /// Build configuration by scanning study directory.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if `study.antares` or the area list
    ///   cannot be read.
    /// - Return [`ConfigError::Parse`] if any declaration file is malformed.
    /// - Return [`ConfigError::Invalid`] if a declaration is unusable, e.g., a
    ///   binding constraint without id.
    #[instrument(skip(root), level = "debug")]
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        debug!("scan study at {:?}", root.display());

        let study_path = root.join("study.antares");
        let study = read_document(&study_path)?.ok_or_else(|| missing(&study_path))?;
        let version = version_from(&study).ok_or_else(|| ConfigError::Invalid {
            path: study_path.clone(),
            reason: "missing [antares] version".into(),
        })?;

        let list_path = root.join("input").join("areas").join("list.txt");
        let list = read_text(&list_path)?.ok_or_else(|| missing(&list_path))?;

        let mut metadata = StudyMetadata::new(root, version);
        for id in area_ids_from_list(&list) {
            let area = scan_area(root, &id, version)?;
            metadata.areas.insert(id, area);
        }

        let bindings_path = root
            .join("input")
            .join("bindingconstraints")
            .join("bindingconstraints.ini");
        if let Some(bindings) = read_document(&bindings_path)? {
            metadata.bindings = bindings_from(&bindings).map_err(|reason| ConfigError::Invalid {
                path: bindings_path.clone(),
                reason,
            })?;
        }

        metadata.outputs = scan_outputs(&root.join("output"))?;
        debug!(
            "found {} areas, {} outputs, {} binding constraints",
            metadata.areas.len(),
            metadata.outputs.len(),
            metadata.bindings.len()
        );

        Ok(Self::new(metadata))
    }

    /// Build configuration from an exported value tree.
    ///
    /// The value must come from an unbounded read of the whole study. Disk is
    /// never touched.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Invalid`] if the value tree lacks the study
    ///   version or the area folder, or holds an unusable declaration.
    pub fn from_tree_value(root: impl Into<PathBuf>, tree: &Value) -> Result<Self> {
        let root = root.into();
        let invalid = |reason: &str| ConfigError::Invalid {
            path: root.clone(),
            reason: reason.to_string(),
        };

        let version = object_at(tree, &["study"])
            .and_then(version_from)
            .ok_or_else(|| invalid("value tree has no study version"))?;
        let areas = object_at(tree, &["input", "areas"])
            .ok_or_else(|| invalid("value tree has no input/areas folder"))?;

        let mut metadata = StudyMetadata::new(root.clone(), version);
        for id in areas
            .keys()
            .map(String::as_str)
            .filter(|key| !matches!(*key, "list" | "sets"))
        {
            let mut area = Area::default();
            if let Some(optimization) = object_at(tree, &["input", "areas", id, "optimization"]) {
                (area.filters_synthesis, area.filters_year) = filters_from(optimization);
            }

            if let Some(properties) = object_at(tree, &["input", "links", id, "properties"]) {
                area.links = links_from(properties);
            }

            for kind in ClusterKind::ALL {
                if version < kind.since() {
                    continue;
                }

                if let Some(list) = object_at(tree, &["input", kind.dir(), "clusters", id, "list"]) {
                    *area.clusters_mut(kind) = cluster_ids_from(list);
                }
            }

            metadata.areas.insert(id.to_string(), area);
        }

        if let Some(bindings) =
            object_at(tree, &["input", "bindingconstraints", "bindingconstraints"])
        {
            metadata.bindings = bindings_from(bindings).map_err(|reason| invalid(&reason))?;
        }

        if let Some(outputs) = object_at(tree, &["output"]) {
            for name in outputs.keys().map(String::as_str) {
                let parameters = object_at(tree, &["output", name, "about-the-study", "parameters"]);
                if let Some(simulation) = simulation_from(name, parameters) {
                    metadata.outputs.insert(name.to_string(), simulation);
                }
            }
        }

        Ok(Self::new(metadata))
    }
}

fn scan_area(root: &Path, id: &str, version: u32) -> Result<Area> {
    let input = root.join("input");
    let mut area = Area::default();

    let optimization = input.join("areas").join(id).join("optimization.ini");
    if let Some(document) = read_document(&optimization)? {
        (area.filters_synthesis, area.filters_year) = filters_from(&document);
    }

    let properties = input.join("links").join(id).join("properties.ini");
    if let Some(document) = read_document(&properties)? {
        area.links = links_from(&document);
    }

    for kind in ClusterKind::ALL {
        if version < kind.since() {
            continue;
        }

        let list = input.join(kind.dir()).join("clusters").join(id).join("list.ini");
        if let Some(document) = read_document(&list)? {
            *area.clusters_mut(kind) = cluster_ids_from(&document);
        }
    }

    Ok(area)
}

fn scan_outputs(output_dir: &Path) -> Result<BTreeMap<String, Simulation>> {
    let mut outputs = BTreeMap::new();
    if !output_dir.is_dir() {
        return Ok(outputs);
    }

    let pattern = format!("{}/*", glob::Pattern::escape(&output_dir.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|err| ConfigError::Invalid {
        path: output_dir.to_path_buf(),
        reason: err.to_string(),
    })?;

    for path in entries.filter_map(std::result::Result::ok) {
        if !path.is_dir() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        let parameters = read_document(&path.join("about-the-study").join("parameters.ini"))?;
        match simulation_from(name, parameters.as_ref()) {
            Some(simulation) => {
                outputs.insert(name.to_string(), simulation);
            }
            None => warn!("skip unrecognized output directory {name:?}"),
        }
    }

    Ok(outputs)
}

fn read_text(path: &Path) -> Result<Option<String>> {
    match read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            source,
            path: path.to_path_buf(),
        }),
    }
}

fn read_document(path: &Path) -> Result<Option<Document>> {
    let Some(text) = read_text(path)? else {
        return Ok(None);
    };

    ini::parse(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })
}

fn missing(path: &Path) -> ConfigError {
    ConfigError::Read {
        source: std::io::Error::from(ErrorKind::NotFound),
        path: path.to_path_buf(),
    }
}

fn object_at<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Document> {
    path.iter()
        .try_fold(tree, |value, key| value.get(*key))
        .and_then(Value::as_object)
}

pub(crate) fn area_ids_from_list(list: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for line in list.lines() {
        let id = to_entity_id(line);
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }

    ids
}

/// Interpret a study version declaration.
///
/// Accepts the integer form (`860`) and the dotted form (`8.6` as a string
/// or a float).
pub(crate) fn parse_version(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => match number.as_u64() {
            Some(integer) => u32::try_from(integer).ok(),
            None => number.as_f64().map(dotted_version),
        },
        Value::String(text) => text.trim().parse::<f64>().ok().map(dotted_version),
        _ => None,
    }
}

fn dotted_version(raw: f64) -> u32 {
    if raw < 100.0 {
        (raw * 100.0).round() as u32
    } else {
        raw.round() as u32
    }
}

fn version_from(study: &Document) -> Option<u32> {
    study
        .get("antares")
        .and_then(|section| section.get("version"))
        .and_then(parse_version)
}

pub(crate) fn filters_of(section: Option<&Value>) -> (Vec<String>, Vec<String>) {
    let read = |key: &str| {
        section
            .and_then(|section| section.get(key))
            .map(|raw| match raw {
                Value::String(text) => parse_filters(text),
                _ => Vec::new(),
            })
            .unwrap_or_else(all_frequencies)
    };

    (read("filter-synthesis"), read("filter-year-by-year"))
}

fn filters_from(optimization: &Document) -> (Vec<String>, Vec<String>) {
    filters_of(optimization.get("filtering"))
}

fn links_from(properties: &Document) -> BTreeMap<String, Link> {
    properties
        .iter()
        .map(|(target, section)| {
            let (filters_synthesis, filters_year) = filters_of(Some(section));
            (
                target.clone(),
                Link {
                    filters_synthesis,
                    filters_year,
                },
            )
        })
        .collect()
}

fn cluster_ids_from(list: &Document) -> Vec<String> {
    let mut ids = Vec::new();
    for section in list.keys() {
        let id = to_entity_id(section);
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }

    ids
}

fn bindings_from(document: &Document) -> std::result::Result<Vec<BindingConstraint>, String> {
    let mut bindings = Vec::new();
    for (section, body) in document {
        let text = |key: &str| body.get(key).map(scalar_text);
        let id = text("id").ok_or_else(|| format!("section [{section}] has no id"))?;
        let operator = match text("operator") {
            Some(raw) => raw.parse().map_err(|_| format!("section [{section}]: bad operator"))?,
            None => Default::default(),
        };
        let time_step = match text("type") {
            Some(raw) => raw.parse().map_err(|_| format!("section [{section}]: bad type"))?,
            None => Default::default(),
        };

        bindings.push(BindingConstraint {
            id,
            operator,
            time_step,
            group: text("group"),
        });
    }

    Ok(bindings)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Interpret an output directory name plus its parameters.
///
/// Output names look like `YYYYMMDD-HHMM<tag>[-name]` where `<tag>` is the
/// three-letter simulation mode.
pub(crate) fn simulation_from(name: &str, parameters: Option<&Document>) -> Option<Simulation> {
    let bytes = name.as_bytes();
    let dated = bytes.len() >= 16
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'-'
        && bytes[9..13].iter().all(u8::is_ascii_digit);
    if !dated {
        return None;
    }

    let mode = SimulationMode::from_tag(name.get(13..16)?)?;
    let suffix = name.get(16..)?;
    let label = match suffix.strip_prefix('-') {
        Some(label) => label.to_string(),
        None if suffix.is_empty() => String::new(),
        None => return None,
    };

    let field = |section: &str, key: &str| {
        parameters
            .and_then(|document| document.get(section))
            .and_then(|section| section.get(key))
    };

    Some(Simulation {
        date: name[..13].to_string(),
        name: label,
        mode,
        nbyears: field("general", "nbyears")
            .and_then(Value::as_u64)
            .and_then(|years| u32::try_from(years).ok())
            .unwrap_or(1),
        by_year: field("general", "year-by-year")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        synthesis: field("output", "synthesis")
            .and_then(Value::as_bool)
            .unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::config::Operator;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, write};

    #[test_case(json!(860), Some(860); "integer")]
    #[test_case(json!(8.6), Some(860); "dotted float")]
    #[test_case(json!("8.7"), Some(870); "dotted string")]
    #[test_case(json!(true), None; "not a version")]
    #[test]
    fn versions(value: Value, expect: Option<u32>) {
        pretty_assertions::assert_eq!(parse_version(&value), expect);
    }

    #[test]
    fn output_names() {
        let Value::Object(parameters) = json!({
            "general": { "nbyears": 10, "year-by-year": true },
            "output": { "synthesis": false },
        }) else {
            unreachable!()
        };

        let simulation = simulation_from("20240105-0930eco-winter peak", Some(&parameters));
        assert_eq!(
            simulation,
            Some(Simulation {
                date: "20240105-0930".into(),
                name: "winter peak".into(),
                mode: SimulationMode::Economy,
                nbyears: 10,
                by_year: true,
                synthesis: false,
            })
        );

        let bare = simulation_from("20240105-0930adq", None);
        assert_eq!(bare.map(|simulation| simulation.mode), Some(SimulationMode::Adequacy));
        assert_eq!(simulation_from("logs", None), None);
        assert_eq!(simulation_from("20240105-0930xyz-a", None), None);
        assert_eq!(simulation_from("20240105-0930ecoish", None), None);
    }

    #[test]
    fn scan_minimal_study() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        create_dir_all(root.join("input/areas/fr"))?;
        create_dir_all(root.join("input/links/de"))?;
        create_dir_all(root.join("input/thermal/clusters/fr"))?;
        create_dir_all(root.join("input/bindingconstraints"))?;
        write(root.join("study.antares"), "[antares]\nversion = 870\n")?;
        write(root.join("input/areas/list.txt"), "FR\nde\n\n")?;
        write(
            root.join("input/areas/fr/optimization.ini"),
            "[filtering]\nfilter-synthesis = hourly, annual\nfilter-year-by-year = \n",
        )?;
        write(root.join("input/links/de/properties.ini"), "[fr]\nhurdles-cost = false\n")?;
        write(
            root.join("input/thermal/clusters/fr/list.ini"),
            "[Gas]\nname = Gas\n[nuclear]\nname = nuclear\n",
        )?;
        write(
            root.join("input/bindingconstraints/bindingconstraints.ini"),
            "[0]\nid = bc1\nname = BC1\noperator = both\ntype = daily\n",
        )?;

        let config = StudyConfig::scan(root)?;
        assert_eq!(config.version(), 870);
        assert_eq!(config.area_names(), vec!["de", "fr"]);
        assert_eq!(
            config.clusters_of("fr", ClusterKind::Thermal)?,
            &["gas".to_string(), "nuclear".to_string()]
        );

        let fr = config.area("fr")?;
        assert_eq!(fr.filters_synthesis, vec!["hourly", "annual"]);
        assert!(fr.filters_year.is_empty());
        assert!(config.has_link("fr", "de"));
        assert_eq!(config.bindings()[0].operator, Operator::Both);

        Ok(())
    }

    #[test]
    fn scan_aborts_on_malformed_declaration() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        create_dir_all(root.join("input/areas/fr"))?;
        write(root.join("study.antares"), "[antares]\nversion = 860\n")?;
        write(root.join("input/areas/list.txt"), "fr\n")?;
        write(root.join("input/areas/fr/optimization.ini"), "not an ini line\n")?;

        let result = StudyConfig::scan(root);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        Ok(())
    }

    #[test]
    fn scan_requires_study_declaration() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = StudyConfig::scan(dir.path());
        assert!(matches!(&result, Err(err) if err.is_parse_error()));

        Ok(())
    }
}
