//! `stratus run`: execute a chunk's entry point

use anyhow::Context;
use std::path::Path;
use stratus_engine::{exit_status, Vm, VmOptions};

/// Run the chunk and return the process exit status
pub fn execute(path: &Path, args: Vec<String>, options: VmOptions, stats: bool) -> anyhow::Result<i32> {
    let chunk = super::read_chunk(path)?;
    let mut vm = Vm::new(chunk, args, options).with_context(|| format!("starting {}", path.display()))?;
    let result = vm.run().with_context(|| format!("running {}", path.display()));

    if stats {
        let gc = vm.gc_stats();
        eprintln!(
            "gc: {} collection(s), {} allocated, {} freed, {} live",
            gc.collections, gc.allocations, gc.freed, gc.live
        );
    }

    let value = result?;
    log::info!("main returned {}", value);
    Ok(exit_status(&value))
}
