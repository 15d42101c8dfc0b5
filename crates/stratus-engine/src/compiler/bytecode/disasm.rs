//! Human-readable chunk listings

use super::chunk::Chunk;
use super::encoder::{BytecodeReader, DecodeError};
use super::opcode::{Opcode, Operands};
use crate::compiler::layout::SlotKind;
use std::fmt::Write;

/// Render every instruction of a chunk, labelling function entries
///
/// Undecodable bytes end the listing with an error line rather than failing.
pub fn disassemble(chunk: &Chunk) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "; {} bytes, {} constants, {} functions, entry {:06}",
        chunk.code.len(),
        chunk.constants.len(),
        chunk.functions.len(),
        chunk.main
    );

    let mut reader = BytecodeReader::new(&chunk.code);
    while !reader.is_at_end() {
        let offset = reader.offset();
        if let Some(function) = chunk.function_at(offset as u64) {
            let _ = writeln!(out, "\n{}:", function.name);
        }
        match instruction(chunk, &mut reader) {
            Ok(text) => {
                let _ = writeln!(out, "  {:06}  {}", offset, text);
            }
            Err(err) => {
                let _ = writeln!(out, "  {:06}  <error: {}>", offset, err);
                break;
            }
        }
    }
    out
}

fn instruction(chunk: &Chunk, reader: &mut BytecodeReader<'_>) -> Result<String, DecodeError> {
    let op = reader.read_opcode()?;
    let name = op.name();
    let text = match op.operands() {
        Operands::None => name.to_string(),
        Operands::I8 => format!("{} {}", name, reader.read_i8()?),
        Operands::I16 => format!("{} {}", name, reader.read_i16()?),
        Operands::I32 => format!("{} {}", name, reader.read_i32()?),
        Operands::I64 => format!("{} {}", name, reader.read_i64()?),
        Operands::F32 => format!("{} {}", name, reader.read_f32()?),
        Operands::F64 => format!("{} {}", name, reader.read_f64()?),
        Operands::U16 => format!("{} {}", name, reader.read_u16()?),
        Operands::U8 => {
            let byte = reader.read_u8()?;
            match op {
                Opcode::LoadElem | Opcode::StoreElem | Opcode::UnionPayload => {
                    let kind = SlotKind::from_u8(byte).map_or("?", SlotKind::name);
                    format!("{} {}", name, kind)
                }
                _ => format!("{} {}", name, byte),
            }
        }
        Operands::U32 => {
            let operand = reader.read_u32()?;
            match op {
                Opcode::PushConst | Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue => {
                    let constant = chunk
                        .constants
                        .get(operand)
                        .map_or_else(|| "?".to_string(), |c| c.to_string());
                    format!("{} #{} ({})", name, operand, constant)
                }
                Opcode::New | Opcode::Array | Opcode::InterfaceNew => {
                    let layout = chunk.layouts.get(operand as usize).map_or("?", |l| l.name.as_str());
                    format!("{} {} ({})", name, operand, layout)
                }
                Opcode::NativeCall => {
                    let foreign = chunk
                        .foreign_functions
                        .get(operand as usize)
                        .map_or("?", |f| f.name.as_str());
                    format!("{} {} ({})", name, operand, foreign)
                }
                _ => format!("{} {}", name, operand),
            }
        }
        Operands::U32U32 => {
            let layout = reader.read_u32()?;
            let second = reader.read_u32()?;
            match op {
                Opcode::UnionEq => format!("{} {} strings {:#b}", name, layout, second),
                _ => format!("{} {} tag {}", name, layout, second),
            }
        }
        Operands::U64U8 => {
            let address = reader.read_u64()?;
            let argc = reader.read_u8()?;
            let target = chunk.function_at(address).map_or("?", |f| f.name.as_str());
            format!("{} {:06} ({}) argc {}", name, address, target, argc)
        }
    };
    Ok(text)
}
