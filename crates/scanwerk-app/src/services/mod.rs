// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: the consumer side of the pipeline and the operator-facing
// collaborators it needs.

pub mod data_dir;
pub mod digest;
pub mod gate;
pub mod pipeline;
