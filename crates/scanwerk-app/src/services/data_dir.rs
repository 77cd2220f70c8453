// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "scanwerk";

/// Return the application data directory. Not created here.
pub fn data_dir() -> PathBuf {
    data_dir_from(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

/// XDG data dir, then `~/.local/share`, then `/tmp`. Empty values are unset.
pub fn data_dir_from(xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    let base = xdg
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| {
            home.filter(|p| !p.as_os_str().is_empty())
                .map(|h| h.join(".local").join("share"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join(APP_DIR)
}

/// Log file used by `--log-file` without a path.
pub fn default_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("scanwerk.log")
}

/// Configuration picked up when `--config` is not given.
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}
