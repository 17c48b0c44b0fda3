// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    command::{
        constraint_terms, defaults, delete_if_present, ensure_scalars, ensure_version,
        matrix_patch, resolve_or, Applied, Command, CommandError, MatrixPayload, Result,
        UpdateConfig,
    },
    matrix::Matrix,
    study::{
        config::{to_entity_id, ClusterKind},
        FileStudy,
    },
    tree::path::Depth,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

const POLLUTANTS: [&str; 12] = [
    "nh3", "so2", "nox", "pm2_5", "pm5", "pm10", "nmvoc", "op1", "op2", "op3", "op4", "op5",
];
const COSTS: [&str; 3] = ["costgeneration", "efficiency", "variableomcost"];

/// Add a thermal cluster to an area.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCluster {
    pub area_id: String,
    pub cluster_name: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepro: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulation: Option<MatrixPayload>,
}

impl CreateCluster {
    fn unit(&self) -> Unit<'_> {
        Unit {
            kind: ClusterKind::Thermal,
            area: &self.area_id,
            name: &self.cluster_name,
            parameters: &self.parameters,
        }
    }

    pub(crate) fn target(&self) -> String {
        self.unit().signature()
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let unit = self.unit();
        unit.check(study)?;
        if let Some(key) = unit.first_key(&POLLUTANTS) {
            ensure_version(study, 860, &format!("thermal parameter {key:?}"))?;
        }
        if let Some(key) = unit.first_key(&COSTS) {
            ensure_version(study, 870, &format!("thermal parameter {key:?}"))?;
        }

        let matrices = study.context().matrices();
        let id = unit.id();
        let area = &self.area_id;
        let series = vec![
            (
                format!("input/thermal/prepro/{area}/{id}/data"),
                resolve_or(self.prepro.as_ref(), defaults::thermal_prepro, matrices)?,
            ),
            (
                format!("input/thermal/prepro/{area}/{id}/modulation"),
                resolve_or(self.modulation.as_ref(), defaults::thermal_modulation, matrices)?,
            ),
            (
                format!("input/thermal/series/{area}/{id}/series"),
                resolve_or(None, defaults::empty, matrices)?,
            ),
        ];

        unit.create(study, series)
    }

    pub(crate) fn diff(&self, other: &Self) -> Vec<Command> {
        let mut patches = self.unit().section_patch(&other.unit());
        let (area, id) = (&other.area_id, other.unit().id());
        patches.extend(matrix_patch(
            format!("input/thermal/prepro/{area}/{id}/data"),
            self.prepro.as_ref(),
            other.prepro.as_ref(),
            defaults::thermal_prepro,
        ));
        patches.extend(matrix_patch(
            format!("input/thermal/prepro/{area}/{id}/modulation"),
            self.modulation.as_ref(),
            other.modulation.as_ref(),
            defaults::thermal_modulation,
        ));

        patches
    }
}

/// Add a renewable cluster to an area.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRenewablesCluster {
    pub area_id: String,
    pub cluster_name: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl CreateRenewablesCluster {
    fn unit(&self) -> Unit<'_> {
        Unit {
            kind: ClusterKind::Renewable,
            area: &self.area_id,
            name: &self.cluster_name,
            parameters: &self.parameters,
        }
    }

    pub(crate) fn target(&self) -> String {
        self.unit().signature()
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let unit = self.unit();
        unit.check(study)?;

        let id = unit.id();
        let series = vec![(
            format!("input/renewables/series/{}/{id}/series", self.area_id),
            resolve_or(None, defaults::empty, study.context().matrices())?,
        )];

        unit.create(study, series)
    }

    pub(crate) fn diff(&self, other: &Self) -> Vec<Command> {
        self.unit().section_patch(&other.unit())
    }
}

/// Add a short-term storage unit to an area.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShortTermStorage {
    pub area_id: String,
    pub storage_name: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmax_injection: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmax_withdrawal: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflows: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_rule_curve: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_rule_curve: Option<MatrixPayload>,
}

impl CreateShortTermStorage {
    fn unit(&self) -> Unit<'_> {
        Unit {
            kind: ClusterKind::ShortTermStorage,
            area: &self.area_id,
            name: &self.storage_name,
            parameters: &self.parameters,
        }
    }

    pub(crate) fn target(&self) -> String {
        self.unit().signature()
    }

    /// Series payloads with their file keys and default content.
    fn series(&self) -> [(&'static str, Option<&MatrixPayload>, fn() -> Matrix); 5] {
        [
            ("pmax_injection", self.pmax_injection.as_ref(), defaults::hourly_ones),
            ("pmax_withdrawal", self.pmax_withdrawal.as_ref(), defaults::hourly_ones),
            ("inflows", self.inflows.as_ref(), defaults::hourly_zeros),
            ("lower_rule_curve", self.lower_rule_curve.as_ref(), defaults::hourly_zeros),
            ("upper_rule_curve", self.upper_rule_curve.as_ref(), defaults::hourly_ones),
        ]
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let unit = self.unit();
        unit.check(study)?;
        if self.parameters.contains_key("enabled") {
            ensure_version(study, 880, "storage parameter \"enabled\"")?;
        }

        let matrices = study.context().matrices();
        let id = unit.id();
        let series = self
            .series()
            .into_iter()
            .map(|(key, payload, default)| {
                Ok((
                    format!("input/st-storage/series/{}/{id}/{key}", self.area_id),
                    resolve_or(payload, default, matrices)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        unit.create(study, series)
    }

    pub(crate) fn diff(&self, other: &Self) -> Vec<Command> {
        let mut patches = self.unit().section_patch(&other.unit());
        let id = other.unit().id();
        for ((key, mine, default), (_, theirs, _)) in self.series().into_iter().zip(other.series()) {
            patches.extend(matrix_patch(
                format!("input/st-storage/series/{}/{id}/{key}", other.area_id),
                mine,
                theirs,
                default,
            ));
        }

        patches
    }
}

/// Remove a cluster or storage unit from an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCluster {
    pub area_id: String,
    pub cluster_id: String,
}

impl RemoveCluster {
    pub(crate) fn target(&self) -> String {
        format!("{}%{}", self.area_id, self.cluster_id)
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy, kind: ClusterKind) -> Result<Applied> {
        let (area, id) = (self.area_id.as_str(), self.cluster_id.as_str());
        ensure_version(study, kind.since(), &format!("{kind} units"))?;
        let clusters = study
            .config()
            .clusters_of(area, kind)
            .map_err(|error| CommandError::Precondition(error.to_string()))?;
        if !clusters.iter().any(|cluster| cluster == id) {
            return Err(CommandError::Precondition(format!(
                "{kind} unit {id} does not exist in area {area}"
            )));
        }

        if kind == ClusterKind::Thermal {
            let term = format!("{area}.{id}");
            if constraint_terms(study)?.contains(&term) {
                return Err(CommandError::Precondition(format!(
                    "thermal cluster {term} is referenced by a binding constraint"
                )));
            }
        }

        let dir = kind.dir();
        let list = format!("input/{dir}/clusters/{area}/list");
        let sections = match study.get(&list, Depth::Limited(1))? {
            Value::Object(sections) => sections,
            _ => Map::new(),
        };
        for section in sections.keys().filter(|section| to_entity_id(section) == id) {
            debug!("remove section {section:?} of {list}");
            delete_if_present(study, &format!("{list}/{section}"))?;
        }
        delete_if_present(study, &format!("input/{dir}/series/{area}/{id}"))?;
        if kind == ClusterKind::Thermal {
            delete_if_present(study, &format!("input/thermal/prepro/{area}/{id}"))?;
        }

        study.update_config(|metadata| {
            if let Some(entry) = metadata.areas.get_mut(area) {
                entry.clusters_mut(kind).retain(|cluster| cluster != id);
            }
        });

        Ok(Applied::new(format!("{kind} unit {id} removed from area {area}")))
    }
}

/// Creation arguments shared by every unit kind.
struct Unit<'a> {
    kind: ClusterKind,
    area: &'a str,
    name: &'a str,
    parameters: &'a Map<String, Value>,
}

impl Unit<'_> {
    fn id(&self) -> String {
        to_entity_id(self.name)
    }

    fn signature(&self) -> String {
        format!("{}%{}", self.area, self.id())
    }

    fn list_path(&self) -> String {
        format!("input/{}/clusters/{}/list/{}", self.kind.dir(), self.area, self.id())
    }

    /// List section: display name first, then parameters.
    fn section(&self) -> Map<String, Value> {
        let mut section = Map::new();
        section.insert("name".into(), json!(self.name));
        for (key, value) in self.parameters.iter().filter(|(key, _)| *key != "name") {
            section.insert(key.clone(), value.clone());
        }

        section
    }

    fn first_key<'k>(&self, keys: &[&'k str]) -> Option<&'k str> {
        keys.iter()
            .copied()
            .find(|key| self.parameters.contains_key(*key))
    }

    fn check(&self, study: &FileStudy) -> Result<()> {
        ensure_version(study, self.kind.since(), &format!("{} units", self.kind))?;

        let id = self.id();
        if id.is_empty() {
            return Err(CommandError::Precondition(format!(
                "name {:?} yields an empty id",
                self.name
            )));
        }

        let clusters = study
            .config()
            .clusters_of(self.area, self.kind)
            .map_err(|error| CommandError::Precondition(error.to_string()))?;
        if clusters.contains(&id) {
            return Err(CommandError::Precondition(format!(
                "{} unit {id} already exists in area {}",
                self.kind, self.area
            )));
        }

        ensure_scalars(self.parameters)?;
        study.check_write(&self.list_path(), &Value::Object(self.section()))?;

        Ok(())
    }

    fn create(&self, study: &mut FileStudy, series: Vec<(String, String)>) -> Result<Applied> {
        let id = self.id();
        study.update_config(|metadata| {
            if let Some(area) = metadata.areas.get_mut(self.area) {
                area.clusters_mut(self.kind).push(id.clone());
            }
        });

        study.set(&self.list_path(), Value::Object(self.section()))?;
        for (path, reference) in series {
            study.set(&path, json!(reference))?;
        }

        Ok(Applied::new(format!("{} unit {id} created in area {}", self.kind, self.area))
            .with("id", id))
    }

    fn section_patch(&self, other: &Self) -> Vec<Command> {
        if self.section() == other.section() {
            return Vec::new();
        }

        vec![Command::UpdateConfig(UpdateConfig {
            target: other.list_path(),
            data: Value::Object(other.section()),
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn section_starts_with_display_name() {
        let mut parameters = Map::new();
        parameters.insert("name".into(), json!("ignored"));
        parameters.insert("unitcount".into(), json!(2));
        let command = CreateCluster {
            area_id: "fr".into(),
            cluster_name: "Gas CCGT".into(),
            parameters,
            ..CreateCluster::default()
        };

        let section = command.unit().section();
        assert_eq!(
            section.iter().collect::<Vec<_>>(),
            vec![
                (&"name".to_string(), &json!("Gas CCGT")),
                (&"unitcount".to_string(), &json!(2)),
            ]
        );
        assert_eq!(command.unit().list_path(), "input/thermal/clusters/fr/list/gas ccgt");
    }

    #[test]
    fn storage_diff_patches_section_and_series() {
        let mine = CreateShortTermStorage {
            area_id: "fr".into(),
            storage_name: "Battery".into(),
            ..CreateShortTermStorage::default()
        };
        let mut parameters = Map::new();
        parameters.insert("efficiency".into(), json!(0.9));
        let theirs = CreateShortTermStorage {
            parameters,
            inflows: Some(MatrixPayload::Reference("matrix://abc".into())),
            ..mine.clone()
        };

        let patches = mine.diff(&theirs);
        assert_eq!(patches.len(), 2);
        assert!(matches!(
            &patches[0],
            Command::UpdateConfig(patch) if patch.target == "input/st-storage/clusters/fr/list/battery"
        ));
        assert!(matches!(
            &patches[1],
            Command::ReplaceMatrix(patch)
                if patch.target == "input/st-storage/series/fr/battery/inflows"
                    && patch.matrix == MatrixPayload::Reference("matrix://abc".into())
        ));

        let back = theirs.diff(&mine);
        assert!(matches!(
            &back[1],
            Command::ReplaceMatrix(patch) if matches!(&patch.matrix, MatrixPayload::Inline(rows) if rows.len() == 8760)
        ));
    }
}
