// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stage snapshots for troubleshooting correction and classification.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, warn};

/// Writes a numbered PNG after each stage when a dump directory is configured.
/// Disabled dumps cost nothing; write failures are logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct DebugDump {
    dir: Option<PathBuf>,
}

impl DebugDump {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Path a snapshot for `page`, `step`, `label` is written to.
    pub fn snapshot_path(dir: &Path, page: usize, step: u8, label: &str) -> PathBuf {
        dir.join(format!("page{page:03}-{step}-{label}.png"))
    }

    pub fn write(&self, page: usize, step: u8, label: &str, image: &DynamicImage) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), %err, "Cannot create debug dump directory");
            return;
        }
        let path = Self::snapshot_path(dir, page, step, label);
        match image.save(&path) {
            Ok(()) => debug!(path = %path.display(), "Stage snapshot written"),
            Err(err) => warn!(path = %path.display(), %err, "Stage snapshot failed"),
        }
    }
}
