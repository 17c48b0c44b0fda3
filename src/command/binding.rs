// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Binding constraint commands.
//!
//! Constraints live as numbered sections of one declaration record. Their
//! right-hand sides are matrices named after the constraint id: a single
//! `<id>` matrix before format 870, one `<id>_<term>` matrix per operator
//! term from 870 on.

use crate::{
    command::{
        defaults, delete_if_present, ensure_scalars, ensure_version, resolve_or, Applied, Command,
        CommandError, MatrixPayload, Result,
    },
    study::{
        config::{to_entity_id, BindingConstraint, ClusterKind, Operator, TimeStep},
        FileStudy,
    },
    tree::path::Depth,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

const DECLARATIONS: &str = "input/bindingconstraints/bindingconstraints";
const MATRICES: &str = "input/bindingconstraints";
const TERMS_SINCE: u32 = 870;
const DEFAULT_GROUP: &str = "default";

/// Add a binding constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBindingConstraint {
    pub name: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    #[serde(default)]
    pub time_step: TimeStep,

    #[serde(default)]
    pub operator: Operator,

    #[serde(default)]
    pub comments: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub coeffs: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_term_matrix: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_term_matrix: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_term_matrix: Option<MatrixPayload>,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for CreateBindingConstraint {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            time_step: TimeStep::default(),
            operator: Operator::default(),
            comments: String::new(),
            group: None,
            coeffs: Map::new(),
            values: None,
            less_term_matrix: None,
            greater_term_matrix: None,
            equal_term_matrix: None,
        }
    }
}

impl CreateBindingConstraint {
    pub(crate) fn target(&self) -> String {
        to_entity_id(&self.name)
    }

    fn payloads(&self) -> Payloads<'_> {
        Payloads {
            values: self.values.as_ref(),
            less: self.less_term_matrix.as_ref(),
            greater: self.greater_term_matrix.as_ref(),
            equal: self.equal_term_matrix.as_ref(),
        }
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let id = self.target();
        if id.is_empty() {
            return Err(CommandError::Precondition(format!(
                "constraint name {:?} yields an empty id",
                self.name
            )));
        }
        if study.config().binding(&id).is_some() {
            return Err(CommandError::Precondition(format!("binding constraint {id} already exists")));
        }
        if self.group.is_some() {
            ensure_version(study, TERMS_SINCE, "binding constraint groups")?;
        }
        let payloads = self.payloads();
        payloads.check(study, self.operator)?;
        check_coeffs(study, &self.coeffs)?;

        let modern = study.version() >= TERMS_SINCE;
        let writes = if modern {
            self.operator
                .terms()
                .iter()
                .map(|term| {
                    let reference = resolve_or(
                        payloads.term(term),
                        || defaults::constraint_term(self.time_step),
                        study.context().matrices(),
                    )?;
                    Ok((format!("{MATRICES}/{id}_{term}"), reference))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![(
                format!("{MATRICES}/{id}"),
                resolve_or(
                    payloads.values,
                    || defaults::constraint_values(self.time_step),
                    study.context().matrices(),
                )?,
            )]
        };

        let group = modern.then(|| self.group.clone().unwrap_or_else(|| DEFAULT_GROUP.into()));
        let mut section = Map::new();
        section.insert("name".into(), json!(self.name));
        section.insert("id".into(), json!(id));
        section.insert("enabled".into(), json!(self.enabled));
        section.insert("type".into(), json!(self.time_step.as_str()));
        section.insert("operator".into(), json!(self.operator.as_str()));
        section.insert("comments".into(), json!(self.comments));
        if let Some(group) = &group {
            section.insert("group".into(), json!(group));
        }
        section.extend(self.coeffs.clone());

        let index = next_index(study)?;
        study.set(&format!("{DECLARATIONS}/{index}"), Value::Object(section))?;
        study.update_config(|metadata| {
            metadata.bindings.push(BindingConstraint {
                id: id.clone(),
                operator: self.operator,
                time_step: self.time_step,
                group,
            });
        });
        for (path, reference) in writes {
            study.set(&path, json!(reference))?;
        }

        Ok(Applied::new(format!("binding constraint {id} created")).with("id", id))
    }

    pub(crate) fn diff(&self, other: &Self) -> Vec<Command> {
        if self == other {
            return Vec::new();
        }

        let group = other
            .group
            .clone()
            .or_else(|| self.group.as_ref().map(|_| DEFAULT_GROUP.to_string()));

        vec![Command::UpdateBindingConstraint(UpdateBindingConstraint {
            id: other.target(),
            name: Some(other.name.clone()),
            enabled: Some(other.enabled),
            time_step: Some(other.time_step),
            operator: Some(other.operator),
            comments: Some(other.comments.clone()),
            group,
            coeffs: Some(other.coeffs.clone()),
            values: other.values.clone(),
            less_term_matrix: other.less_term_matrix.clone(),
            greater_term_matrix: other.greater_term_matrix.clone(),
            equal_term_matrix: other.equal_term_matrix.clone(),
        })]
    }
}

/// Change an existing binding constraint.
///
/// Fields left out keep their current value. Given coefficients replace
/// every existing coefficient.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBindingConstraint {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_step: Option<TimeStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coeffs: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_term_matrix: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_term_matrix: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_term_matrix: Option<MatrixPayload>,
}

impl UpdateBindingConstraint {
    fn payloads(&self) -> Payloads<'_> {
        Payloads {
            values: self.values.as_ref(),
            less: self.less_term_matrix.as_ref(),
            greater: self.greater_term_matrix.as_ref(),
            equal: self.equal_term_matrix.as_ref(),
        }
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let id = self.id.as_str();
        let Some(current) = study.config().binding(id).cloned() else {
            return Err(CommandError::Precondition(format!("binding constraint {id} does not exist")));
        };
        if self.group.is_some() {
            ensure_version(study, TERMS_SINCE, "binding constraint groups")?;
        }
        if let Some(name) = &self.name {
            if to_entity_id(name) != id {
                return Err(CommandError::Precondition(format!(
                    "name {name:?} does not match constraint id {id}"
                )));
            }
        }

        let operator = self.operator.unwrap_or(current.operator);
        let time_step = self.time_step.unwrap_or(current.time_step);
        let payloads = self.payloads();
        payloads.check(study, operator)?;
        if let Some(coeffs) = &self.coeffs {
            check_coeffs(study, coeffs)?;
        }

        let (index, mut section) = find_section(study, id)?;
        let modern = study.version() >= TERMS_SINCE;
        let mut writes = Vec::new();
        let mut obsolete = Vec::new();
        if modern {
            let before = current.operator.terms();
            obsolete.extend(
                before
                    .iter()
                    .filter(|term| !operator.terms().contains(*term))
                    .map(|term| format!("{MATRICES}/{id}_{term}")),
            );
            for term in operator.terms() {
                let payload = payloads.term(term);
                let rewrite = self.time_step.is_some() || !before.contains(term);
                if payload.is_none() && !rewrite {
                    continue;
                }
                let reference = resolve_or(
                    payload,
                    || defaults::constraint_term(time_step),
                    study.context().matrices(),
                )?;
                writes.push((format!("{MATRICES}/{id}_{term}"), reference));
            }
        } else if payloads.values.is_some() || self.time_step.is_some() {
            let reference = resolve_or(
                payloads.values,
                || defaults::constraint_values(time_step),
                study.context().matrices(),
            )?;
            writes.push((format!("{MATRICES}/{id}"), reference));
        }

        if let Some(name) = &self.name {
            section.insert("name".into(), json!(name));
        }
        if let Some(enabled) = self.enabled {
            section.insert("enabled".into(), json!(enabled));
        }
        section.insert("type".into(), json!(time_step.as_str()));
        section.insert("operator".into(), json!(operator.as_str()));
        if let Some(comments) = &self.comments {
            section.insert("comments".into(), json!(comments));
        }
        if let Some(group) = &self.group {
            section.insert("group".into(), json!(group));
        }
        if let Some(coeffs) = &self.coeffs {
            section.retain(|key, _| !is_coefficient(key));
            section.extend(coeffs.clone());
        }

        study.set(&format!("{DECLARATIONS}/{index}"), Value::Object(section))?;
        for path in &obsolete {
            debug!("drop obsolete term matrix {path}");
            delete_if_present(study, path)?;
        }

        let group = self.group.clone().or(current.group);
        study.update_config(|metadata| {
            if let Some(binding) = metadata.bindings.iter_mut().find(|binding| binding.id == id) {
                binding.operator = operator;
                binding.time_step = time_step;
                binding.group = group;
            }
        });
        for (path, reference) in writes {
            study.set(&path, json!(reference))?;
        }

        Ok(Applied::new(format!("binding constraint {id} updated")))
    }
}

/// Remove a binding constraint and its matrices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveBindingConstraint {
    pub id: String,
}

impl RemoveBindingConstraint {
    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let id = self.id.as_str();
        let Some(current) = study.config().binding(id).cloned() else {
            return Err(CommandError::Precondition(format!("binding constraint {id} does not exist")));
        };

        let (index, _) = find_section(study, id)?;
        study.delete(&format!("{DECLARATIONS}/{index}"))?;
        if study.version() >= TERMS_SINCE {
            for term in current.operator.terms() {
                delete_if_present(study, &format!("{MATRICES}/{id}_{term}"))?;
            }
        } else {
            delete_if_present(study, &format!("{MATRICES}/{id}"))?;
        }

        study.update_config(|metadata| metadata.bindings.retain(|binding| binding.id != id));

        Ok(Applied::new(format!("binding constraint {id} removed")))
    }
}

/// Matrix arguments of a constraint command.
struct Payloads<'a> {
    values: Option<&'a MatrixPayload>,
    less: Option<&'a MatrixPayload>,
    greater: Option<&'a MatrixPayload>,
    equal: Option<&'a MatrixPayload>,
}

impl<'a> Payloads<'a> {
    fn term(&self, term: &str) -> Option<&'a MatrixPayload> {
        match term {
            "lt" => self.less,
            "gt" => self.greater,
            "eq" => self.equal,
            _ => None,
        }
    }

    fn check(&self, study: &FileStudy, operator: Operator) -> Result<()> {
        if self.values.is_some() && study.version() >= TERMS_SINCE {
            return Err(CommandError::Precondition(format!(
                "constraint values matrix only exists before study format {TERMS_SINCE}, use term matrices"
            )));
        }

        for term in ["lt", "gt", "eq"] {
            if self.term(term).is_none() {
                continue;
            }
            ensure_version(study, TERMS_SINCE, "binding constraint term matrices")?;
            if !operator.terms().contains(&term) {
                return Err(CommandError::Precondition(format!(
                    "operator {} has no {term} term matrix",
                    operator.as_str()
                )));
            }
        }

        Ok(())
    }
}

fn is_coefficient(key: &str) -> bool {
    key.contains('%') || key.contains('.')
}

/// Check that every coefficient names an existing link or thermal cluster.
fn check_coeffs(study: &FileStudy, coeffs: &Map<String, Value>) -> Result<()> {
    ensure_scalars(coeffs)?;

    for key in coeffs.keys() {
        let exists = if let Some((area1, area2)) = key.split_once('%') {
            study.config().has_link(area1, area2)
        } else if let Some((area, cluster)) = key.split_once('.') {
            study
                .config()
                .clusters_of(area, ClusterKind::Thermal)
                .is_ok_and(|clusters| clusters.iter().any(|id| id == cluster))
        } else {
            return Err(CommandError::Precondition(format!(
                "coefficient {key:?} names neither a link nor a cluster"
            )));
        };

        if !exists {
            return Err(CommandError::Precondition(format!(
                "coefficient {key:?} names a missing link or cluster"
            )));
        }
    }

    Ok(())
}

fn declarations(study: &FileStudy) -> Result<Map<String, Value>> {
    match study.get(DECLARATIONS, Depth::Unbounded)? {
        Value::Object(sections) => Ok(sections),
        _ => Ok(Map::new()),
    }
}

fn next_index(study: &FileStudy) -> Result<u64> {
    Ok(declarations(study)?
        .keys()
        .filter_map(|key| key.parse::<u64>().ok())
        .max()
        .map_or(0, |index| index + 1))
}

fn find_section(study: &FileStudy, id: &str) -> Result<(String, Map<String, Value>)> {
    declarations(study)?
        .into_iter()
        .find_map(|(index, body)| match body {
            Value::Object(body) if body.get("id").is_some_and(|value| scalar_text(value) == id) => {
                Some((index, body))
            }
            _ => None,
        })
        .ok_or_else(|| {
            CommandError::Precondition(format!("binding constraint {id} has no declaration"))
        })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_diff_carries_every_field() {
        let mine = CreateBindingConstraint {
            name: "Export cap".into(),
            group: Some("north".into()),
            ..CreateBindingConstraint::default()
        };
        let theirs = CreateBindingConstraint {
            name: "Export cap".into(),
            operator: Operator::Both,
            ..CreateBindingConstraint::default()
        };

        let patches = mine.diff(&theirs);
        assert_eq!(
            patches,
            vec![Command::UpdateBindingConstraint(UpdateBindingConstraint {
                id: "export cap".into(),
                name: Some("Export cap".into()),
                enabled: Some(true),
                time_step: Some(TimeStep::Hourly),
                operator: Some(Operator::Both),
                comments: Some(String::new()),
                group: Some("default".into()),
                coeffs: Some(Map::new()),
                ..UpdateBindingConstraint::default()
            })]
        );
        assert!(mine.diff(&mine).is_empty());
    }

    #[test]
    fn update_payload_defaults() -> anyhow::Result<()> {
        let update: UpdateBindingConstraint = serde_json::from_value(json!({"id": "c1"}))?;
        assert_eq!(
            update,
            UpdateBindingConstraint {
                id: "c1".into(),
                ..UpdateBindingConstraint::default()
            }
        );

        let create: CreateBindingConstraint =
            serde_json::from_value(json!({"name": "C1", "operator": "equal", "time_step": "daily"}))?;
        assert!(create.enabled);
        assert_eq!(create.operator, Operator::Equal);
        assert_eq!(create.time_step, TimeStep::Daily);

        Ok(())
    }

    #[test]
    fn coefficient_keys() {
        assert!(is_coefficient("de%fr"));
        assert!(is_coefficient("fr.gas"));
        assert!(!is_coefficient("comments"));
        assert_eq!(scalar_text(&json!(12)), "12");
        assert_eq!(scalar_text(&json!("c1")), "c1");
    }
}
