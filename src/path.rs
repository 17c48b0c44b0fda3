// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations of the files `studytree` keeps outside of
//! any study: its settings file and its matrix repository.

use std::path::PathBuf;

/// Determine default absolute path to matrix repository directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/studytree-matrices` as the
/// default absolute path. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_matrix_store_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("studytree-matrices"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to settings file.
///
/// Uses `$XDG_CONFIG_HOME/studytree/settings.toml`. Does not check if the
/// path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("studytree").join("settings.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("XDG_DATA_HOME", "/tmp/blah/data"), ("XDG_CONFIG_HOME", "/tmp/blah/config")])]
    fn xdg_locations() -> anyhow::Result<()> {
        if cfg!(target_os = "linux") {
            assert_eq!(default_matrix_store_dir()?, PathBuf::from("/tmp/blah/data/studytree-matrices"));
            assert_eq!(
                default_settings_path()?,
                PathBuf::from("/tmp/blah/config/studytree/settings.toml")
            );
        }

        Ok(())
    }
}
