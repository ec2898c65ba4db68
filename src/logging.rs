// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structured logging setup, adapted from the teacher daemon's
//! `logging.rs`: a `tracing_subscriber` fmt layer with UTC timestamps and
//! an `env_filter` driven by `RUST_LOG`, defaulting to `info` (or `debug`
//! for this crate's own target when `-d` is passed).

use time::format_description::well_known::Rfc3339;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Safe to call once, at
/// process start; subsequent calls are ignored.
pub fn initialize(debug: bool) {
    let default_directive = if debug { "focus=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let timer = OffsetTime::new(time::UtcOffset::UTC, Rfc3339);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_thread_ids(debug)
        .with_target(debug)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
