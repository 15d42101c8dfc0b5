//! `stratus disasm`: print a chunk listing

use std::path::Path;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    let chunk = super::read_chunk(path)?;
    print!("{}", stratus_engine::disassemble(&chunk));
    Ok(())
}
