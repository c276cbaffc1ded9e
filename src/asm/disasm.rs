//! Disassembler for warrior programs.
//!
//! Converts program bytes back to the syntax accepted by
//! [`assemble`](super::assemble). Every listing line assembles back to the
//! bytes it was printed from; headers the assembler would never produce
//! (unassigned opcodes, junk in unused slots, unencodable locations) are
//! listed as `DB`.

use super::assemble;
use crate::cpu::decode::{Instruction, HEADER_SIZE, IMMEDIATE_SIZE};
use crate::cpu::location::{AccessMode, Location, Position};

/// Disassemble one instruction from its header and immediates.
pub fn disassemble_instruction(instr: &Instruction, immediates: &[u16]) -> String {
    let arity = instr.opcode.arity();
    let mut imds = immediates.iter().copied();
    let mut operands = Vec::new();

    for position in [Position::Destination, Position::Source] {
        let location = instr.location(position);
        let imd = if location.has_immediate() { imds.next() } else { None };
        if operands.len() < arity as usize {
            operands.push(format_operand(location, instr.mode(position), imd));
        }
    }

    if operands.is_empty() {
        instr.opcode.to_string()
    } else {
        format!("{} {}", instr.opcode, operands.join(", "))
    }
}

/// Disassemble a whole program.
pub fn disassemble(program: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; Warrior Disassembly\n");
    output.push_str("; -------------------\n\n");

    let mut addr = 0usize;
    while addr < program.len() {
        let rest = &program[addr..];
        if rest.len() < HEADER_SIZE as usize {
            output.push_str(&format!("{:04X}: {}\n", addr, data_directive(rest)));
            break;
        }

        let instr = Instruction::from_header(rest[0], rest[1]);
        let size = instr.size() as usize;
        if rest.len() < size {
            output.push_str(&format!("{:04X}: {}\n", addr, data_directive(rest)));
            break;
        }

        let immediates: Vec<u16> = rest[HEADER_SIZE as usize..size]
            .chunks(IMMEDIATE_SIZE as usize)
            .map(|w| u16::from_be_bytes([w[0], w[1]]))
            .collect();
        let raw = &rest[..size];
        let mut text = disassemble_instruction(&instr, &immediates);
        if assemble(&text).map_or(true, |bytes| bytes != raw) {
            text = data_directive(raw);
        }
        let hex: Vec<String> = raw.iter().map(|b| format!("{:02X}", b)).collect();
        output.push_str(&format!("{:04X}: {:<24} ; {}\n", addr, text, hex.join(" ")));
        addr += size;
    }

    output
}

/// Raw bytes as a `DB` line.
fn data_directive(bytes: &[u8]) -> String {
    let values: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
    format!("DB {}", values.join(", "))
}

/// Format an operand with its mode prefix.
fn format_operand(location: Location, mode: AccessMode, imd: Option<u16>) -> String {
    let relative = mode == AccessMode::Relative;
    let prefix = if relative { "$" } else { "" };
    let value = imd.unwrap_or(0);

    match location {
        Location::Pax => format!("{}[AX]", prefix),
        Location::Pbx => format!("{}[BX]", prefix),
        Location::Pcx => format!("{}[CX]", prefix),
        Location::Imd if relative => format!("${}", value as i16),
        Location::Imd => format!("0x{:04X}", value),
        Location::Pimd if relative => format!("$[{}]", value as i16),
        Location::Pimd => format!("[0x{:04X}]", value),
        Location::None => "???".to_string(),
        register => format!("{}{}", prefix, register),
    }
}
