// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Scan — page acquisition. The scanner source contract, the
// `scanimage` and directory-replay backends, the bounded page queue, and the
// acquisition loop that feeds it from a dedicated thread.

pub mod acquisition;
pub mod directory;
pub mod queue;
pub mod scanimage;
pub mod source;

pub use acquisition::acquire;
pub use directory::DirectorySource;
pub use queue::PageQueue;
pub use scanimage::{DeviceInfo, ScanimageSource, list_devices, pick_device};
pub use source::{Frame, ScanParameters, ScannerSource, read_page};
