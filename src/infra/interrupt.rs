// ============================================================
// Layer 6 — Interrupt Flag
// ============================================================
// A shared cancel flag set from the Ctrl-C handler.
//
// The trainer polls it at every epoch boundary. When it is set,
// the current level stops early and still goes through its
// final evaluation and save, so an interrupted run leaves a
// usable best model on disk.
//
// Reference: ctrlc crate documentation
//            Rust Book §16 (Shared-State Concurrency)

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Install the process-wide Ctrl-C handler. Call once, from the CLI layer.
    pub fn install() -> Result<Self> {
        let flag    = Self::default();
        let handler = flag.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("Interrupt received; finishing the current epoch");
            handler.trigger();
        })
        .context("Cannot install the Ctrl-C handler")?;
        Ok(flag)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
