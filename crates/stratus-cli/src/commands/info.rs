//! `stratus info`: summarize a chunk's tables

use std::path::Path;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    let chunk = super::read_chunk(path)?;

    println!("Chunk:      {}", path.display());
    println!("Code:       {} bytes", chunk.code.len());
    println!("Constants:  {}", chunk.constants.len());
    println!("Entry:      {:#06x}", chunk.main);

    println!();
    println!("Functions:  {}", chunk.functions.len());
    for function in &chunk.functions {
        println!("  {:#06x}  {} ({} local(s))", function.address, function.name, function.locals.len());
    }

    if !chunk.layouts.is_empty() {
        println!();
        println!("Layouts:    {}", chunk.layouts.len());
        for (index, layout) in chunk.layouts.iter().enumerate() {
            println!("  #{:<3} {} {:?}, {} bytes", index, layout.name, layout.kind, layout.size);
        }
    }

    if !chunk.foreign_functions.is_empty() {
        println!();
        println!("Native:     {}", chunk.foreign_functions.len());
        for native in &chunk.foreign_functions {
            let params: Vec<&str> = native.params.iter().map(|k| k.name()).collect();
            let ret = native.ret.map_or("void", |k| k.name());
            println!("  {}({}) -> {}", native.name, params.join(", "), ret);
        }
    }

    Ok(())
}
