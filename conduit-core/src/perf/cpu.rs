//! CPU affinity for stage threads
//!
//! One dedicated thread per stage is only predictable if the OS keeps each
//! thread on its own core. Pinning is best-effort: a failure is reported
//! and the thread keeps running unpinned.

use anyhow::Result;
use core_affinity::CoreId;

/// Pin the current thread to a specific CPU core
pub fn pin_to_core(core: usize) -> Result<()> {
    if core >= num_cores() {
        anyhow::bail!(
            "Cannot pin to core {}: only {} cores available",
            core,
            num_cores()
        );
    }

    if core_affinity::set_for_current(CoreId { id: core }) {
        tracing::info!("Pinned thread to CPU core {}", core);
        Ok(())
    } else {
        anyhow::bail!("Failed to pin thread to core {}", core)
    }
}

/// Get the number of available CPU cores
pub fn num_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
}

/// Core for the `index`-th stage, if the configuration names one
pub fn core_for_stage(pin_cores: &[usize], index: usize) -> Option<usize> {
    pin_cores.get(index).copied()
}
