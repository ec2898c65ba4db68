// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `focusd`: wires the registry and an in-memory store together. The
//! network transport (WebSocket upgrade, HTTP serving) is out of scope
//! (spec §1); this binary exists to keep the crate runnable end-to-end,
//! grounded on the teacher's `cli.rs`/`main.rs` (a single `-d/--debug`
//! flag, then `logging::initialize`, then run until interrupted).

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "focusd", about = "Collaborative text editor server (OT core)")]
struct Args {
    /// Enable debug-level logging.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    focus::logging::initialize(args.debug);

    let store = Arc::new(focus::store::MemoryStore::spawn());
    let _registry = focus::registry::spawn(store);

    tracing::info!("focusd ready (no transport wired up; see DESIGN.md)");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("received ctrl-c, shutting down");
    Ok(())
}
