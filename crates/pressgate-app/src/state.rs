// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared state for gateway handlers.

use std::sync::Arc;

use pressgate_print::PrintEngine;

use crate::services::app_services::AppServices;

/// Available to every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PrintEngine>,
    /// Bearer token callers must present. `None` disables auth.
    pub token: Option<Arc<str>>,
    /// Upper bound on a raw image upload.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: Arc<PrintEngine>, token: Option<String>, max_body_bytes: usize) -> Self {
        Self {
            engine,
            token: token.map(Arc::from),
            max_body_bytes,
        }
    }

    pub fn from_services(services: &AppServices) -> Self {
        let config = services.config();
        Self::new(
            Arc::clone(services.engine()),
            config.server.token.clone(),
            config.max_source_bytes,
        )
    }
}
