//! Human-readable listings of compiled prototypes.

use std::fmt::Write;

use memory::FuncPrototype;

use crate::instruction::Instruction;

/// Render a prototype: every instruction with its byte offset, then the
/// constant, upvalue and local tables. The caller supplies the heading
/// (`main`, `#0`, ...).
pub fn disassemble(proto: &FuncPrototype) -> String {
    let mut out = String::new();

    writeln!(out, "  instructions").unwrap();
    let mut offset = 0;
    while offset < proto.bytecode.len() {
        match Instruction::decode_at(&proto.bytecode, offset) {
            Ok((inst, next)) => {
                writeln!(out, "   {:4} {}", offset, inst).unwrap();
                offset = next;
            }
            Err(err) => {
                writeln!(out, "   {:4} !! {}", offset, err).unwrap();
                break;
            }
        }
    }

    writeln!(out, "  constants ({})", proto.constants.len()).unwrap();
    for (i, constant) in proto.constants.iter().enumerate() {
        writeln!(out, "   #{} {:?}", i, constant).unwrap();
    }

    writeln!(out, "  upvalues ({})", proto.upvalues.len()).unwrap();
    for (i, record) in proto.upvalues.iter().enumerate() {
        writeln!(
            out,
            "   #{} \"{}\" localToParent={} lookupIndex={}",
            i, record.name, record.local_to_parent, record.lookup_index
        )
        .unwrap();
    }

    writeln!(out, "  locals ({})", proto.locals.len()).unwrap();
    for record in &proto.locals {
        writeln!(
            out,
            "   #{} r{} \"{}\" isParam={}",
            record.lookup_index,
            1 + record.lookup_index,
            record.name,
            record.is_parameter
        )
        .unwrap();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn lists_offsets_and_mnemonics() {
        let mut proto = FuncPrototype::default();
        Instruction::IntConst { value: 1, dest: 2 }.encode(&mut proto.bytecode);
        Instruction::Print { source: 2 }.encode(&mut proto.bytecode);
        Instruction::Halt.encode(&mut proto.bytecode);

        let listing = disassemble(&proto);
        assert!(listing.contains("0 IntConst"));
        assert!(listing.contains("9 Print"));
        assert!(listing.contains("14 Halt"));
    }

    #[test]
    fn reports_bad_opcode_instead_of_panicking() {
        let proto = FuncPrototype {
            bytecode: vec![0xFF],
            ..Default::default()
        };
        let listing = disassemble(&proto);
        assert!(listing.contains("unknown opcode"));
    }
}
