// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Per-call runtime context.

use crate::config::DebugOptions;
use crate::error::Diagnostic;

/// State threaded through every operation.
///
/// The caller owns it; each operation resets [`RuntimeContext::error`] and
/// fills it again on failure.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    /// Diagnostic of the last operation, `None` if it succeeded.
    pub error: Option<Diagnostic>,
    /// Debug and transport switches.
    pub options: DebugOptions,
}

impl RuntimeContext {
    /// Creates a context with the given options.
    #[must_use]
    pub const fn new(options: DebugOptions) -> Self {
        Self {
            error: None,
            options,
        }
    }
}

/// Former process-wide last-error accessor.
///
/// Always returns an empty diagnostic; read [`RuntimeContext::error`] instead.
#[deprecated(note = "read `RuntimeContext::error` instead")]
#[must_use]
pub fn last_error() -> Diagnostic {
    Diagnostic::default()
}

/// Former process-wide options setter. Does nothing.
#[deprecated(note = "set `RuntimeContext::options` instead")]
pub fn set_options(_options: DebugOptions) {}
