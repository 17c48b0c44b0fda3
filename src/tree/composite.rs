// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Folder-like nodes.
//!
//! A composite either follows a static list of schema entries or mirrors a
//! directory listing (a __bucket__). Either way its children are computed on
//! first access and then kept for the lifetime of the node instance. Buckets
//! never rescan: files that appear later are only visible through a freshly
//! built tree.

use crate::{
    study::config::StudyConfig,
    tree::{
        path::{Depth, Selector},
        schema::{Binding, Entry, Spec},
        Node, NodeKind, Result, TreeContext, TreeError,
    },
};

use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fs::remove_dir_all,
    io::ErrorKind,
    sync::OnceLock,
};
use tracing::{debug, instrument};

static BLOB: Spec = Spec::Blob;
static MATRIX: Spec = Spec::Matrix;
static RECORD: Spec = Spec::Record(None);
static PLAIN_BUCKET: Spec = Spec::Bucket { matrices: false };
static MATRIX_BUCKET: Spec = Spec::Bucket { matrices: true };

#[derive(Debug)]
enum Source {
    Folder {
        entries: &'static [Entry],
        binding: Binding,
    },
    Bucket {
        matrices: bool,
    },
}

/// Node with named children.
#[derive(Debug)]
pub struct Composite {
    config: StudyConfig,
    context: TreeContext,
    source: Source,
    children: OnceLock<Vec<(String, Node)>>,
}

impl Composite {
    /// Construct folder following schema entries.
    pub fn folder(
        entries: &'static [Entry],
        config: StudyConfig,
        binding: Binding,
        context: TreeContext,
    ) -> Self {
        Self {
            config,
            context,
            source: Source::Folder { entries, binding },
            children: OnceLock::new(),
        }
    }

    /// Construct folder mirroring its directory listing.
    pub fn bucket(matrices: bool, config: StudyConfig, context: TreeContext) -> Self {
        Self {
            config,
            context,
            source: Source::Bucket { matrices },
            children: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Children in declaration order, built on first access.
    pub fn children(&self) -> &[(String, Node)] {
        self.children.get_or_init(|| match &self.source {
            Source::Folder { entries, binding } => self.build_folder(entries, binding),
            Source::Bucket { matrices } => self.snapshot(*matrices),
        })
    }

    /// Look up child by name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    fn build_folder(&self, entries: &'static [Entry], binding: &Binding) -> Vec<(String, Node)> {
        let version = self.config.version();
        entries
            .iter()
            .filter(|entry| entry.applies(version))
            .flat_map(|entry| {
                entry
                    .children
                    .expand(&self.config, binding)
                    .into_iter()
                    .map(move |expanded| {
                        let node = Node::build(
                            &entry.spec,
                            self.config.scope(&expanded.file),
                            expanded.binding,
                            self.context.clone(),
                        );
                        (expanded.key, node)
                    })
            })
            .collect()
    }

    #[instrument(skip(self), level = "debug")]
    fn snapshot(&self, matrices: bool) -> Vec<(String, Node)> {
        let dir = self.config.path();
        let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
        let Ok(entries) = glob::glob(&pattern) else {
            return Vec::new();
        };

        let mut children = BTreeMap::new();
        for path in entries.filter_map(std::result::Result::ok) {
            let Some(file) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            let bucket = if matrices { &MATRIX_BUCKET } else { &PLAIN_BUCKET };
            let (key, spec, name) = if path.is_dir() {
                (file, bucket, file.to_string())
            } else if let Some(stem) = file.strip_suffix(".ini") {
                (stem, &RECORD, file.to_string())
            } else if let Some(stem) = file
                .strip_suffix(".txt")
                .or_else(|| file.strip_suffix(".txt.link"))
                .filter(|_| matrices)
            {
                // INVARIANT: Matrix leaves own their link sidecar, so both map onto one child.
                (stem, &MATRIX, format!("{stem}.txt"))
            } else {
                (file, &BLOB, file.to_string())
            };

            children.entry(key.to_string()).or_insert_with(|| {
                Node::build(spec, self.config.scope(name), Binding::default(), self.context.clone())
            });
        }
        debug!("snapshot {} entries of {:?}", children.len(), dir.display());

        children.into_iter().collect()
    }

    /// Resolve selection segment into named children.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::UnknownChild`] if any selected name is missing.
    /// - Return [`TreeError::HeterogeneousSelection`] if selected children
    ///   differ in kind.
    pub fn select(&self, segment: &str) -> Result<Vec<(&str, &Node)>> {
        let selected = match Selector::parse(segment) {
            Selector::All => self
                .children()
                .iter()
                .map(|(key, node)| (key.as_str(), node))
                .collect::<Vec<_>>(),
            Selector::Names(names) => names
                .iter()
                .map(|name| {
                    self.children()
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(key, node)| (key.as_str(), node))
                        .ok_or_else(|| TreeError::UnknownChild {
                            node: self.config.relative_path().to_path_buf(),
                            name: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        if let Some((_, first)) = selected.first() {
            if selected.iter().any(|(_, node)| node.kind() != first.kind()) {
                return Err(TreeError::HeterogeneousSelection {
                    node: self.config.relative_path().to_path_buf(),
                    names: selected.iter().map(|(key, _)| (*key).to_string()).collect(),
                });
            }
        }

        Ok(selected)
    }

    pub fn get(&self, path: &[String], depth: Depth) -> Result<Value> {
        let Some((segment, rest)) = path.split_first() else {
            if depth.is_exhausted() {
                return Ok(Value::Object(Map::new()));
            }

            let mut value = Map::new();
            for (key, child) in self.children() {
                value.insert(key.clone(), child.get(&[], depth.descend())?);
            }
            let value = Value::Object(value);
            self.validate(&value)?;

            return Ok(value);
        };

        let selected = self.select(segment)?;
        if let [(_, child)] = selected.as_slice() {
            return child.get(rest, depth);
        }

        let mut value = Map::new();
        for (key, child) in selected {
            value.insert(key.to_string(), child.get(rest, depth)?);
        }

        Ok(Value::Object(value))
    }

    /// Write value at path.
    ///
    /// Every child the write reaches is checked before the first file is
    /// touched, so a value rejected anywhere leaves the study unchanged.
    pub fn set(&self, value: Value, path: &[String]) -> Result<()> {
        self.check_write(&value, path)?;
        self.write(value, path)
    }

    pub fn check_write(&self, value: &Value, path: &[String]) -> Result<()> {
        let Some((segment, rest)) = path.split_first() else {
            self.validate(value)?;
            let Value::Object(entries) = value else {
                return Err(TreeError::violation(&self.config, "expected a mapping"));
            };

            for (key, sub) in entries {
                if let Some(child) = self.child(key) {
                    child.check_write(sub, &[])?;
                }
            }

            return Ok(());
        };

        let selected = self.select(segment)?;
        if let [(_, child)] = selected.as_slice() {
            return child.check_write(value, rest);
        }

        let Value::Object(entries) = value else {
            return Err(TreeError::violation(
                &self.config,
                "multi-child writes expect a mapping keyed by child name",
            ));
        };
        for (key, child) in selected {
            let sub = entries.get(key).ok_or_else(|| {
                TreeError::violation(&self.config, format!("no value given for child {key:?}"))
            })?;
            child.check_write(sub, rest)?;
        }

        Ok(())
    }

    // INVARIANT: check_write() already accepted value at path.
    fn write(&self, value: Value, path: &[String]) -> Result<()> {
        let Some((segment, rest)) = path.split_first() else {
            let Value::Object(entries) = value else {
                return Err(TreeError::violation(&self.config, "expected a mapping"));
            };

            for (key, sub) in entries {
                if let Some(child) = self.child(&key) {
                    write_child(child, sub, &[])?;
                }
            }

            return Ok(());
        };

        let selected = self.select(segment)?;
        if let [(_, child)] = selected.as_slice() {
            return write_child(child, value, rest);
        }

        let Value::Object(mut entries) = value else {
            return Err(TreeError::violation(
                &self.config,
                "multi-child writes expect a mapping keyed by child name",
            ));
        };
        for (key, child) in selected {
            if let Some(sub) = entries.remove(key) {
                write_child(child, sub, rest)?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    pub fn delete(&self, path: &[String]) -> Result<()> {
        let Some((segment, rest)) = path.split_first() else {
            let dir = self.config.path();
            return match remove_dir_all(&dir) {
                Ok(()) => {
                    debug!("removed {:?}", dir.display());
                    Ok(())
                }
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                Err(error) => Err(TreeError::io(error, dir)),
            };
        };

        for (_, child) in self.select(segment)? {
            child.delete(rest)?;
        }

        Ok(())
    }

    /// Check that every key of a mapping names a child.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let Value::Object(entries) = value else {
            return Err(TreeError::violation(&self.config, "expected a mapping"));
        };

        if let Some(key) = entries.keys().find(|key| self.child(key).is_none()) {
            return Err(TreeError::violation(
                &self.config,
                format!("{key:?} is not a child"),
            ));
        }

        Ok(())
    }

    pub fn kind_at(&self, path: &[String]) -> Result<NodeKind> {
        let Some((segment, rest)) = path.split_first() else {
            return Ok(NodeKind::Composite);
        };

        let mut kinds = self
            .select(segment)?
            .into_iter()
            .map(|(_, child)| child.kind_at(rest))
            .collect::<Result<Vec<_>>>()?;
        kinds.dedup();

        match kinds.as_slice() {
            [kind] => Ok(*kind),
            [] => Err(TreeError::UnknownChild {
                node: self.config.relative_path().to_path_buf(),
                name: segment.clone(),
            }),
            _ => Err(TreeError::HeterogeneousSelection {
                node: self.config.relative_path().to_path_buf(),
                names: vec![segment.clone()],
            }),
        }
    }
}

fn write_child(child: &Node, value: Value, path: &[String]) -> Result<()> {
    match child {
        Node::Composite(node) => node.write(value, path),
        node => node.set(value, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        matrix::MemoryMatrixStore,
        study::config::{Area, StudyMetadata},
        tree::schema::{Children, Template},
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::{
        fs,
        sync::{Arc, LazyLock},
    };

    fn context() -> TreeContext {
        TreeContext::new(Arc::new(MemoryMatrixStore::new()))
    }

    fn config(root: &std::path::Path) -> StudyConfig {
        let mut metadata = StudyMetadata::new(root, 860);
        metadata.areas.insert("de".into(), Area::default());
        metadata.areas.insert("fr".into(), Area::default());
        StudyConfig::new(metadata)
    }

    static AREAS: LazyLock<Vec<Entry>> = LazyLock::new(|| {
        vec![
            Entry::new(
                Children::PerArea(Template::new("", "", ".ini")),
                Spec::Record(None),
            ),
            Entry::new(
                Children::Named {
                    key: "notes",
                    file: "notes.txt",
                },
                Spec::Blob,
            ),
        ]
    });

    fn build(root: &std::path::Path) -> Composite {
        Composite::folder(&AREAS, config(root), Binding::default(), context())
    }

    fn segments(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|segment| (*segment).to_string()).collect()
    }

    #[test]
    fn children_follow_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let node = build(dir.path());
        let keys = node.children().iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["de", "fr", "notes"]);

        Ok(())
    }

    #[test]
    fn selections() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("fr.ini"), "[a]\nx = 1\n")?;
        let node = build(dir.path());

        assert_eq!(node.get(&segments(&["fr"]), Depth::Unbounded)?, json!({"a": {"x": 1}}));
        assert_eq!(
            node.get(&segments(&["de,fr"]), Depth::Unbounded)?,
            json!({"de": {}, "fr": {"a": {"x": 1}}})
        );
        assert!(matches!(
            node.get(&segments(&["fr,notes"]), Depth::Unbounded),
            Err(TreeError::HeterogeneousSelection { .. })
        ));
        assert!(matches!(
            node.get(&segments(&["*"]), Depth::Unbounded),
            Err(TreeError::HeterogeneousSelection { .. })
        ));
        assert!(matches!(
            node.get(&segments(&["es"]), Depth::Unbounded),
            Err(TreeError::UnknownChild { name, .. }) if name == "es"
        ));
        assert!(matches!(
            node.get(&segments(&["notes", "deeper"]), Depth::Unbounded),
            Err(TreeError::PathTooLong { .. })
        ));

        Ok(())
    }

    #[test]
    fn depth_zero_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("fr.ini"), "[a]\nx = 1\n")?;
        let node = build(dir.path());

        assert_eq!(node.get(&[], Depth::Limited(0))?, json!({}));
        assert_eq!(
            node.get(&[], Depth::Limited(1))?,
            json!({"de": {}, "fr": {}, "notes": "file://notes.txt"})
        );

        Ok(())
    }

    #[test]
    fn set_rejects_unknown_keys() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let node = build(dir.path());

        let result = node.set(json!({"es": {"a": {"x": 1}}}), &[]);
        assert!(matches!(result, Err(TreeError::SchemaViolation { .. })));
        assert!(!dir.path().join("es.ini").exists());

        node.set(json!({"de": {"a": {"x": true}}}), &[])?;
        assert_eq!(node.get(&segments(&["de", "a", "x"]), Depth::Unbounded)?, json!(true));

        Ok(())
    }

    #[test]
    fn rejected_write_touches_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let node = build(dir.path());

        let whole = node.set(json!({"de": {"a": {"x": 1}}, "notes": 7}), &[]);
        assert!(matches!(whole, Err(TreeError::SchemaViolation { .. })));
        assert!(!dir.path().join("de.ini").exists());

        let selected = node.set(json!({"de": {"a": {"x": 1}}, "fr": "flat"}), &segments(&["de,fr"]));
        assert!(matches!(selected, Err(TreeError::SchemaViolation { .. })));
        assert!(!dir.path().join("de.ini").exists());
        assert!(!dir.path().join("fr.ini").exists());

        node.set(json!({"de": {"a": {"x": 1}}, "fr": {"b": {"y": 2}}}), &segments(&["de,fr"]))?;
        assert_eq!(
            node.get(&segments(&["de,fr"]), Depth::Unbounded)?,
            json!({"de": {"a": {"x": 1}}, "fr": {"b": {"y": 2}}})
        );

        Ok(())
    }

    #[test]
    fn bucket_snapshot_is_stable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("nested"))?;
        fs::write(dir.path().join("a.ini"), "[s]\nk = v\n")?;
        fs::write(dir.path().join("b.txt"), "1\t2\n")?;
        fs::write(dir.path().join("nested").join("c.bin"), "raw")?;
        let bucket = Composite::bucket(true, config(dir.path()), context());

        assert_eq!(
            bucket.get(&[], Depth::Unbounded)?,
            json!({
                "a": {"s": {"k": "v"}},
                "b": "file://b.txt",
                "nested": {"c.bin": "file://nested/c.bin"},
            })
        );
        assert_eq!(bucket.kind_at(&segments(&["b"]))?, NodeKind::Matrix);

        fs::write(dir.path().join("late.ini"), "[s]\n")?;
        assert!(bucket.child("late").is_none());

        let rebuilt = Composite::bucket(true, config(dir.path()), context());
        assert!(rebuilt.child("late").is_some());

        Ok(())
    }

    #[test]
    fn delete_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bucket_dir = dir.path().join("user");
        fs::create_dir_all(&bucket_dir)?;
        fs::write(bucket_dir.join("a.ini"), "[s]\n")?;
        let bucket = Composite::bucket(false, config(dir.path()).scope("user"), context());

        bucket.delete(&segments(&["a"]))?;
        assert!(!bucket_dir.join("a.ini").exists());
        bucket.delete(&[])?;
        assert!(!bucket_dir.exists());

        Ok(())
    }
}
