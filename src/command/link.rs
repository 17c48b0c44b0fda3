// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    command::{
        area::delete_link_files, constraint_terms, defaults, ensure_scalars, ensure_version,
        matrix_patch, resolve_or, Applied, Command, CommandError, MatrixPayload, Result,
        UpdateConfig,
    },
    study::{
        config::{all_frequencies, link_endpoints, Link},
        scan::filters_of,
        FileStudy,
    },
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::instrument;

/// Add a transmission link between two areas.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLink {
    pub area1: String,
    pub area2: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct: Option<MatrixPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirect: Option<MatrixPayload>,
}

impl CreateLink {
    fn endpoints(&self) -> (&str, &str) {
        link_endpoints(&self.area1, &self.area2)
    }

    pub(crate) fn target(&self) -> String {
        let (from, to) = self.endpoints();
        format!("{from}%{to}")
    }

    /// Properties section this command writes.
    pub fn section(&self) -> Map<String, Value> {
        let frequencies = all_frequencies().join(", ");
        let mut section: Map<String, Value> = [
            ("hurdles-cost", json!(false)),
            ("loop-flow", json!(false)),
            ("use-phase-shifter", json!(false)),
            ("transmission-capacities", json!("enabled")),
            ("asset-type", json!("ac")),
            ("display-comments", json!(true)),
            ("filter-synthesis", json!(frequencies)),
            ("filter-year-by-year", json!(frequencies)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        section.extend(self.parameters.clone());

        section
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let (from, to) = self.endpoints();
        if from == to {
            return Err(CommandError::Precondition(format!("cannot link area {from} to itself")));
        }
        for area in [from, to] {
            if !study.config().has_area(area) {
                return Err(CommandError::Precondition(format!("area {area} does not exist")));
            }
        }
        if study.config().has_link(from, to) {
            return Err(CommandError::Precondition(format!("link {from}/{to} already exists")));
        }
        if self.direct.is_some() || self.indirect.is_some() {
            ensure_version(study, 820, "link capacity series")?;
        }
        ensure_scalars(&self.parameters)?;

        let matrices = study.context().matrices();
        let modern = study.version() >= 820;
        let series = if modern {
            resolve_or(self.series.as_ref(), defaults::link_parameters, matrices)?
        } else {
            resolve_or(self.series.as_ref(), defaults::link_series_legacy, matrices)?
        };
        let capacities = if modern {
            Some((
                resolve_or(self.direct.as_ref(), defaults::link_capacity, matrices)?,
                resolve_or(self.indirect.as_ref(), defaults::link_capacity, matrices)?,
            ))
        } else {
            None
        };

        let section = Value::Object(self.section());
        let properties = format!("input/links/{from}/properties/{to}");
        study.check_write(&properties, &section)?;
        let (filters_synthesis, filters_year) = filters_of(Some(&section));
        study.update_config(|metadata| {
            if let Some(area) = metadata.areas.get_mut(from) {
                area.links.insert(
                    to.to_string(),
                    Link {
                        filters_synthesis,
                        filters_year,
                    },
                );
            }
        });

        study.set(&properties, section)?;
        match capacities {
            Some((direct, indirect)) => {
                study.set(&format!("input/links/{from}/{to}_parameters"), json!(series))?;
                study.set(&format!("input/links/{from}/capacities/{to}_direct"), json!(direct))?;
                study.set(
                    &format!("input/links/{from}/capacities/{to}_indirect"),
                    json!(indirect),
                )?;
            }
            None => study.set(&format!("input/links/{from}/{to}"), json!(series))?,
        }

        Ok(Applied::new(format!("link {from}/{to} created")))
    }

    /// Corrective commands, addressed in the capacity-split layout.
    pub(crate) fn diff(&self, other: &Self) -> Vec<Command> {
        let (from, to) = other.endpoints();
        let mut patches = Vec::new();
        if self.section() != other.section() {
            patches.push(Command::UpdateConfig(UpdateConfig {
                target: format!("input/links/{from}/properties/{to}"),
                data: Value::Object(other.section()),
            }));
        }

        patches.extend(matrix_patch(
            format!("input/links/{from}/{to}_parameters"),
            self.series.as_ref(),
            other.series.as_ref(),
            defaults::link_parameters,
        ));
        patches.extend(matrix_patch(
            format!("input/links/{from}/capacities/{to}_direct"),
            self.direct.as_ref(),
            other.direct.as_ref(),
            defaults::link_capacity,
        ));
        patches.extend(matrix_patch(
            format!("input/links/{from}/capacities/{to}_indirect"),
            self.indirect.as_ref(),
            other.indirect.as_ref(),
            defaults::link_capacity,
        ));

        patches
    }
}

/// Remove a transmission link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLink {
    pub area1: String,
    pub area2: String,
}

impl RemoveLink {
    pub(crate) fn target(&self) -> String {
        let (from, to) = link_endpoints(&self.area1, &self.area2);
        format!("{from}%{to}")
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let (from, to) = link_endpoints(&self.area1, &self.area2);
        if !study.config().has_link(from, to) {
            return Err(CommandError::Precondition(format!("link {from}/{to} does not exist")));
        }

        let signature = self.target();
        let referenced = constraint_terms(study)?.into_iter().any(|term| {
            term.split_once('%')
                .is_some_and(|(a, b)| link_endpoints(a, b) == (from, to))
                || term == signature
        });
        if referenced {
            return Err(CommandError::Precondition(format!(
                "link {from}/{to} is referenced by a binding constraint"
            )));
        }

        delete_link_files(study, from, to)?;
        study.update_config(|metadata| {
            if let Some(area) = metadata.areas.get_mut(from) {
                area.links.remove(to);
            }
        });

        Ok(Applied::new(format!("link {from}/{to} removed")))
    }
}
