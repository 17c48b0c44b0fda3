// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record file leaves.
//!
//! A record leaf reads its file as a two-level mapping, section → key →
//! typed scalar, and addresses sub-values with at most two more path
//! segments: `[section]` and `[section, key]`.
//!
//! Writes always merge with the content already on disk. A whole-document
//! write replaces the sections it names and leaves the others alone, a
//! section write replaces that section, and a key write replaces that key.
//! The merged document is validated against the record schema before the
//! file is touched. A missing file reads as an empty document.

use crate::{
    ini::{self, Document},
    study::config::StudyConfig,
    tree::{path::Depth, schema::RecordSchema, Result, TreeError},
};

use serde_json::{Map, Value};
use std::{
    fs::{read_to_string, remove_file, write},
    io::ErrorKind,
};
use tracing::{debug, instrument};

/// Sectioned `key = value` file.
#[derive(Debug)]
pub struct Record {
    config: StudyConfig,
    schema: Option<&'static RecordSchema>,
}

impl Record {
    pub fn new(config: StudyConfig, schema: Option<&'static RecordSchema>) -> Self {
        Self { config, schema }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Read file as document, empty if missing.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Io`] if the file exists but cannot be read.
    /// - Return [`TreeError::Ini`] if the file is malformed.
    pub fn read(&self) -> Result<Document> {
        let path = self.config.path();
        match read_to_string(&path) {
            Ok(text) => ini::parse(&text).map_err(|source| TreeError::Ini { source, path }),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(error) => Err(TreeError::io(error, path)),
        }
    }

    #[instrument(skip(self, document), level = "debug")]
    fn write(&self, document: &Document) -> Result<()> {
        let path = self.config.path();
        let text = ini::to_string(document).map_err(|source| TreeError::Ini {
            source,
            path: path.clone(),
        })?;

        if let Some(parent) = path.parent() {
            mkdirp::mkdirp(parent).map_err(|error| TreeError::io(error, parent))?;
        }
        write(&path, text).map_err(|error| TreeError::io(error, &path))?;
        debug!("wrote {} sections to {:?}", document.len(), path.display());

        Ok(())
    }

    pub fn get(&self, path: &[String], depth: Depth) -> Result<Value> {
        if path.is_empty() && depth.is_exhausted() {
            return Ok(Value::Object(Map::new()));
        }

        let document = self.read()?;
        match path {
            [] if depth == Depth::Limited(1) => Ok(Value::Object(
                document
                    .keys()
                    .map(|section| (section.clone(), Value::Object(Map::new())))
                    .collect(),
            )),
            [] => Ok(Value::Object(document)),
            [section] => self
                .section(&document, section)
                .map(|body| Value::Object(body.clone())),
            [section, key] => self
                .section(&document, section)?
                .get(key)
                .cloned()
                .ok_or_else(|| self.unknown(format!("{section}/{key}"))),
            [_, _, rest @ ..] => Err(self.too_long(rest)),
        }
    }

    pub fn set(&self, value: Value, path: &[String]) -> Result<()> {
        match self.merge(value, path)? {
            Some(document) => self.write(&document),
            None => Ok(()),
        }
    }

    /// Check that a write would succeed without touching the file.
    pub fn check_write(&self, value: &Value, path: &[String]) -> Result<()> {
        self.merge(value.clone(), path).map(|_| ())
    }

    /// Merge value into the document on disk and validate the result.
    ///
    /// Return `None` if the write would leave the file system unchanged.
    fn merge(&self, value: Value, path: &[String]) -> Result<Option<Document>> {
        let mut document = self.read()?;
        let exists = self.config.path().exists();
        match path {
            [] => {
                let Value::Object(sections) = value else {
                    return Err(TreeError::violation(&self.config, "expected section mapping"));
                };

                // INVARIANT: Writing nothing over a missing file never creates it.
                if sections.is_empty() && !exists {
                    return Ok(None);
                }

                for (section, body) in sections {
                    self.ensure_section(&section, &body)?;
                    document.insert(section, body);
                }
            }
            [section] => {
                self.ensure_section(section, &value)?;
                document.insert(section.clone(), value);
            }
            [section, key] => {
                if !ini::is_storable(&value) {
                    return Err(TreeError::violation(
                        &self.config,
                        format!("{section}/{key} must hold a scalar or a list of scalars"),
                    ));
                }

                let body = document
                    .entry(section.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(body) = body {
                    body.insert(key.clone(), value);
                }
            }
            [_, _, rest @ ..] => return Err(self.too_long(rest)),
        }

        self.check(&document)?;
        Ok(Some(document))
    }

    pub fn delete(&self, path: &[String]) -> Result<()> {
        match path {
            [] => {
                let path = self.config.path();
                match remove_file(&path) {
                    Ok(()) => Ok(()),
                    Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                    Err(error) => Err(TreeError::io(error, path)),
                }
            }
            [section] => {
                let mut document = self.read()?;
                if document.shift_remove(section).is_none() {
                    return Err(self.unknown(section.clone()));
                }
                self.write(&document)
            }
            [section, key] => {
                let mut document = self.read()?;
                let removed = match document.get_mut(section.as_str()) {
                    Some(Value::Object(body)) => body.shift_remove(key.as_str()).is_some(),
                    _ => false,
                };
                if !removed {
                    return Err(self.unknown(format!("{section}/{key}")));
                }
                self.write(&document)
            }
            [_, _, rest @ ..] => Err(self.too_long(rest)),
        }
    }

    /// Validate a whole document.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let Value::Object(document) = value else {
            return Err(TreeError::violation(&self.config, "expected section mapping"));
        };

        for (section, body) in document {
            self.ensure_section(section, body)?;
        }

        self.check(document)
    }

    fn check(&self, document: &Document) -> Result<()> {
        match self.schema {
            Some(schema) => schema
                .check(document)
                .map_err(|reason| TreeError::violation(&self.config, reason)),
            None => Ok(()),
        }
    }

    fn ensure_section(&self, section: &str, body: &Value) -> Result<()> {
        let Value::Object(body) = body else {
            return Err(TreeError::violation(
                &self.config,
                format!("section {section:?} must be a mapping"),
            ));
        };

        if let Some(key) = body.iter().find_map(|(key, value)| (!ini::is_storable(value)).then_some(key)) {
            return Err(TreeError::violation(
                &self.config,
                format!("{section}/{key} must hold a scalar or a list of scalars"),
            ));
        }

        Ok(())
    }

    fn section<'a>(&self, document: &'a Document, section: &str) -> Result<&'a Map<String, Value>> {
        match document.get(section) {
            Some(Value::Object(body)) => Ok(body),
            _ => Err(self.unknown(section.to_string())),
        }
    }

    fn unknown(&self, name: String) -> TreeError {
        TreeError::UnknownChild {
            node: self.config.relative_path().to_path_buf(),
            name,
        }
    }

    fn too_long(&self, rest: &[String]) -> TreeError {
        TreeError::PathTooLong {
            node: self.config.relative_path().to_path_buf(),
            rest: rest.join("/"),
        }
    }
}
