// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    command::{constraint_terms, defaults, delete_if_present, resolve_or, Applied, CommandError, Result},
    study::{
        config::{all_frequencies, to_entity_id, Area, ClusterKind},
        FileStudy,
    },
};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

/// Add an area to a study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateArea {
    pub area_name: String,
}

impl CreateArea {
    pub(crate) fn target(&self) -> String {
        to_entity_id(&self.area_name)
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let id = self.target();
        if id.is_empty() {
            return Err(CommandError::Precondition(format!(
                "area name {:?} yields an empty id",
                self.area_name
            )));
        }
        if study.config().has_area(&id) {
            return Err(CommandError::Precondition(format!("area {id} already exists")));
        }

        let load = resolve_or(None, defaults::empty, study.context().matrices())?;
        let mut list = study.read_text("input/areas/list.txt")?;
        if !list.is_empty() && !list.ends_with('\n') {
            list.push('\n');
        }
        list.push_str(&self.area_name);
        list.push('\n');

        study.update_config(|metadata| {
            metadata.areas.insert(id.clone(), Area::default());
        });

        let frequencies = all_frequencies().join(", ");
        study.set("input/areas/list", json!(list))?;
        study.set(
            &format!("input/areas/{id}/optimization"),
            json!({
                "nodal optimization": {
                    "non-dispatchable-power": true,
                    "dispatchable-hydro-power": true,
                    "other-dispatchable-power": true,
                    "spread-unsupplied-energy-cost": 0.0,
                    "spread-spilled-energy-cost": 0.0,
                },
                "filtering": {
                    "filter-synthesis": frequencies,
                    "filter-year-by-year": frequencies,
                },
            }),
        )?;
        study.set(
            &format!("input/areas/{id}/ui"),
            json!({"ui": {"x": 0, "y": 0, "color_r": 230, "color_g": 108, "color_b": 44}}),
        )?;
        study.set(&format!("input/thermal/areas/unserverdenergycost/{id}"), json!(0.0))?;
        study.set(&format!("input/thermal/areas/spilledenergycost/{id}"), json!(0.0))?;
        study.set(&format!("input/load/series/load_{id}"), json!(load))?;

        Ok(Applied::new(format!("area {id} created")).with("id", id))
    }
}

/// Remove an area and everything declared under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveArea {
    pub id: String,
}

impl RemoveArea {
    pub(crate) fn target(&self) -> String {
        self.id.clone()
    }

    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let id = self.id.as_str();
        if !study.config().has_area(id) {
            return Err(CommandError::Precondition(format!("area {id} does not exist")));
        }

        let referenced = constraint_terms(study)?.into_iter().find(|term| {
            term.split(['%', '.'])
                .next()
                .is_some_and(|head| head == id)
                || term.split_once('%').is_some_and(|(_, tail)| tail == id)
        });
        if let Some(term) = referenced {
            return Err(CommandError::Precondition(format!(
                "area {id} is referenced by binding constraint term {term}"
            )));
        }

        let linked_from: Vec<String> = study
            .config()
            .area_names()
            .into_iter()
            .filter(|other| study.config().has_link(other, id) && *other < id)
            .map(str::to_owned)
            .collect();
        for other in &linked_from {
            delete_link_files(study, other, id)?;
        }

        delete_if_present(study, &format!("input/links/{id}"))?;
        delete_if_present(study, &format!("input/areas/{id}"))?;
        for kind in ClusterKind::ALL {
            if study.version() < kind.since() {
                continue;
            }
            let dir = kind.dir();
            delete_if_present(study, &format!("input/{dir}/clusters/{id}"))?;
            delete_if_present(study, &format!("input/{dir}/series/{id}"))?;
        }
        delete_if_present(study, &format!("input/thermal/prepro/{id}"))?;
        delete_if_present(study, &format!("input/load/series/load_{id}"))?;
        delete_if_present(study, &format!("input/thermal/areas/unserverdenergycost/{id}"))?;
        delete_if_present(study, &format!("input/thermal/areas/spilledenergycost/{id}"))?;

        let list = study
            .read_text("input/areas/list.txt")?
            .lines()
            .filter(|line| !line.trim().is_empty() && to_entity_id(line) != id)
            .map(|line| format!("{line}\n"))
            .collect::<String>();
        study.set("input/areas/list", json!(list))?;

        study.update_config(|metadata| {
            metadata.areas.remove(id);
            for area in metadata.areas.values_mut() {
                area.links.remove(id);
            }
        });

        Ok(Applied::new(format!("area {id} removed")))
    }
}

/// Delete link declaration and series stored under `from`.
pub(crate) fn delete_link_files(study: &FileStudy, from: &str, to: &str) -> Result<()> {
    delete_if_present(study, &format!("input/links/{from}/properties/{to}"))?;
    if study.version() >= 820 {
        delete_if_present(study, &format!("input/links/{from}/{to}_parameters"))?;
        delete_if_present(study, &format!("input/links/{from}/capacities/{to}_direct"))?;
        delete_if_present(study, &format!("input/links/{from}/capacities/{to}_indirect"))?;
    } else {
        delete_if_present(study, &format!("input/links/{from}/{to}"))?;
    }

    Ok(())
}
