// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressgate gateway service: axum router, bearer auth, and the service layer
// shared with the `pressgate` binary.

pub mod auth;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::build_router;
pub use services::app_services::AppServices;
pub use state::AppState;
