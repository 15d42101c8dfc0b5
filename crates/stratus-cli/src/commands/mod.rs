//! Subcommand implementations

pub mod disasm;
pub mod info;
pub mod run;

use anyhow::Context;
use std::path::Path;
use stratus_engine::Chunk;

fn read_chunk(path: &Path) -> anyhow::Result<Chunk> {
    Chunk::read_from(path).with_context(|| format!("loading chunk {}", path.display()))
}
