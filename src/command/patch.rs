// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    command::{Applied, CommandError, MatrixPayload, Result},
    study::FileStudy,
    tree::NodeKind,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

/// Replace the matrix at a tree path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceMatrix {
    pub target: String,
    pub matrix: MatrixPayload,
}

impl ReplaceMatrix {
    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let kind = study
            .kind_at(&self.target)
            .map_err(|error| CommandError::Precondition(error.to_string()))?;
        if kind != NodeKind::Matrix {
            return Err(CommandError::Precondition(format!(
                "{} is a {kind}, not a matrix",
                self.target
            )));
        }

        let reference = self.matrix.resolve(study.context().matrices())?;
        study.set(&self.target, json!(reference))?;

        Ok(Applied::new(format!("matrix {} replaced", self.target)).with("matrix", reference))
    }
}

/// Write a value into a record or part of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub target: String,
    pub data: Value,
}

impl UpdateConfig {
    #[instrument(skip(self, study), level = "debug")]
    pub(crate) fn apply(&self, study: &mut FileStudy) -> Result<Applied> {
        let kind = study
            .kind_at(&self.target)
            .map_err(|error| CommandError::Precondition(error.to_string()))?;
        if kind != NodeKind::Record {
            return Err(CommandError::Precondition(format!(
                "{} is a {kind}, not a record",
                self.target
            )));
        }

        study.set(&self.target, self.data.clone())?;
        study.reload()?;

        Ok(Applied::new(format!("{} updated", self.target)))
    }
}
