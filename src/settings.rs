// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings layout.
//!
//! Specify the layout of the TOML settings file that the `studytree` binary
//! reads at startup. Every field is optional. A missing settings file means
//! default settings.
//!
//! # General Layout
//!
//! ```toml
//! [store]
//! matrix_dir = "$XDG_DATA_HOME/studytree-matrices"
//!
//! [tree]
//! depth = -1
//!
//! [log]
//! filter = "info"
//! ```
//!
//! Path fields go through shell expansion, so `~` and environment variables
//! can be used freely.

use crate::path::{default_matrix_store_dir, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Matrix repository settings.
    pub store: StoreSettings,

    /// Tree read settings.
    pub tree: TreeSettings,

    /// Logging settings.
    pub log: LogSettings,
}

impl Settings {
    /// Load settings file, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`SettingsError::Read`] if the file exists but cannot be read.
    /// - Return [`SettingsError::Deserialize`] if the file is malformed.
    /// - Return [`SettingsError::ShellExpansion`] if a path cannot be
    ///   expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load settings from {:?}", path.display());
                data.parse()
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no settings at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Read {
                source,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Directory of the matrix repository.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if no directory was configured and the default
    ///   cannot be determined.
    pub fn matrix_dir(&self) -> Result<PathBuf, NoWayHome> {
        match &self.store.matrix_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_matrix_store_dir(),
        }
    }
}

impl FromStr for Settings {
    type Err = SettingsError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(SettingsError::Deserialize)?;

        // INVARIANT: Perform shell expansion on matrix directory field.
        if let Some(dir) = &settings.store.matrix_dir {
            let expanded = shellexpand::full(dir.to_string_lossy().as_ref())
                .map_err(SettingsError::ShellExpansion)?
                .into_owned();
            settings.store.matrix_dir = Some(PathBuf::from(expanded));
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(SettingsError::Serialize)?
                .as_str(),
        )
    }
}

/// Matrix repository settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory holding stored matrices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_dir: Option<PathBuf>,
}

/// Tree read settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Default read depth, `-1` for unbounded.
    pub depth: i64,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self { depth: -1 }
    }
}

/// Logging settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Settings error types.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Failed to read settings file.
    #[error("failed to read settings file {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<SettingsError> for FmtError {
    fn from(_: SettingsError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = SettingsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah/blah")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [store]
            matrix_dir = "$BLAH/matrices"

            [tree]
            depth = 2

            [log]
            filter = "studytree=debug"
        "#
        .parse()?;

        let expect = Settings {
            store: StoreSettings {
                matrix_dir: Some(PathBuf::from("/home/blah/blah/matrices")),
            },
            tree: TreeSettings { depth: 2 },
            log: LogSettings {
                filter: Some("studytree=debug".into()),
            },
        };

        assert_eq!(result, expect);
        assert_eq!(result.matrix_dir()?, PathBuf::from("/home/blah/blah/matrices"));

        Ok(())
    }

    #[test]
    fn deserialize_empty_settings() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());
        assert_eq!(result.tree.depth, -1);

        Ok(())
    }

    #[sealed_test]
    fn reject_unknown_variable() {
        let result = r#"
            [store]
            matrix_dir = "$STUDYTREE_SURELY_UNSET/matrices"
        "#
        .parse::<Settings>();

        assert!(matches!(result, Err(SettingsError::ShellExpansion(_))));
    }

    #[test]
    fn serialize_settings() {
        let result = Settings {
            store: StoreSettings {
                matrix_dir: Some(PathBuf::from("/home/blah/matrices")),
            },
            tree: TreeSettings { depth: 3 },
            log: LogSettings {
                filter: Some("info".into()),
            },
        }
        .to_string();

        let expect = indoc! {r#"
            [store]
            matrix_dir = "/home/blah/matrices"

            [tree]
            depth = 3

            [log]
            filter = "info"
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn load_missing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = Settings::load(dir.path().join("settings.toml"))?;
        assert_eq!(result, Settings::default());

        Ok(())
    }
}
