//! Simple assembler for warrior programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! loop:               ; Define a label
//!     MOV [BX], AL    ; Store through a register
//!     ADD BX, 1       ; Immediate operand
//!     SUB $[CX], AX   ; $ makes an address relative to the instruction
//!     MOV [0x100], CX ; Store through an immediate address
//!     JMP loop        ; Labels are always relative
//!     DAT             ; Kills any thread that executes it
//!     DB 1, 2, 0xFF   ; Raw bytes
//!     DW 0x1234       ; Raw big-endian words
//! ```
//!
//! Warriors are placed at random offsets, so a label is encoded as the
//! distance from the instruction that refers to it, in relative mode.

use crate::cpu::decode::{encode, EncodeError, Instruction};
use crate::cpu::location::{AccessMode, Location};
use crate::cpu::opcode::Opcode;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Assemble source code to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Operand {
    location: Location,
    mode: AccessMode,
    /// Immediate value, for `IMD` and `PIMD`.
    value: Option<u16>,
    /// Label whose offset fills the immediate in pass 2.
    label: Option<String>,
}

impl Operand {
    fn register(location: Location) -> Self {
        Self { location, mode: AccessMode::Direct, value: None, label: None }
    }
}

/// A label reference waiting for its address.
struct Pending {
    /// Offset of the immediate in the output.
    offset: usize,
    /// Address of the referring instruction.
    origin: u16,
    label: String,
    line: usize,
}

/// The assembler state.
struct Assembler {
    /// Address of the next emitted byte.
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    pending: Vec<Pending>,
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: patch label references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "invalid label".into(),
                });
            }
            if self.symbols.insert(label.clone(), self.current_addr as u16).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }
        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, r)) => (m.to_uppercase(), r.trim()),
            None => (line.to_uppercase(), ""),
        };
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        match mnemonic.as_str() {
            // Directives
            "DB" => {
                for op in operands {
                    let value = parse_number(op, line_num)?;
                    let byte = u8::try_from(value)
                        .or_else(|_| i8::try_from(value).map(|v| v as u8))
                        .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })?;
                    self.emit(&[byte]);
                }
            }
            "DW" => {
                for op in operands {
                    let word = to_word(parse_number(op, line_num)?, line_num)?;
                    self.emit(&word.to_be_bytes());
                }
            }

            // Instructions
            _ => {
                let opcode = Opcode::from_str(&mnemonic).map_err(|_| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
                })?;
                self.emit_instruction(opcode, &operands, line_num)?;
            }
        }

        Ok(())
    }

    fn emit_instruction(
        &mut self,
        opcode: Opcode,
        operands: &[&str],
        line_num: usize,
    ) -> Result<(), AssemblerError> {
        let arity = opcode.arity() as usize;
        if operands.len() != arity {
            return Err(AssemblerError::OperandCount {
                line: line_num,
                mnemonic: opcode.to_string(),
                expected: arity,
                found: operands.len(),
            });
        }

        let mut parsed = operands
            .iter()
            .map(|op| parse_operand(op, line_num))
            .collect::<Result<Vec<_>, _>>()?;
        // Unused slots encode as AL and are never resolved.
        parsed.resize(2, Operand::register(Location::Al));

        let instr = Instruction::new(opcode, parsed[0].location, parsed[1].location)
            .with_modes(parsed[0].mode, parsed[1].mode);
        let immediates: Vec<u16> = parsed
            .iter()
            .filter(|op| op.location.has_immediate())
            .map(|op| op.value.unwrap_or(0))
            .collect();
        let bytes = encode(instr, &immediates)
            .map_err(|source| AssemblerError::Encode { line: line_num, source })?;

        let origin = self.current_addr as u16;
        let mut offset = self.output.len() + 2;
        for op in parsed.iter().filter(|op| op.location.has_immediate()) {
            if let Some(label) = &op.label {
                self.pending.push(Pending { offset, origin, label: label.clone(), line: line_num });
            }
            offset += 2;
        }

        self.emit(&bytes);
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
        self.current_addr += bytes.len();
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for pending in &self.pending {
            let addr = self.symbols.get(&pending.label).ok_or_else(|| {
                AssemblerError::UndefinedLabel { line: pending.line, label: pending.label.clone() }
            })?;
            let distance = addr.wrapping_sub(pending.origin);
            self.output[pending.offset..pending.offset + 2].copy_from_slice(&distance.to_be_bytes());
        }
        Ok(())
    }
}

fn parse_operand(text: &str, line_num: usize) -> Result<Operand, AssemblerError> {
    let (relative, body) = match text.strip_prefix('$') {
        Some(rest) => (true, rest.trim()),
        None => (false, text),
    };
    let mode = if relative { AccessMode::Relative } else { AccessMode::Direct };

    if let Some(inner) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
        let inner = inner.trim().to_uppercase();
        let location = match inner.as_str() {
            "AX" => Some(Location::Pax),
            "BX" => Some(Location::Pbx),
            "CX" => Some(Location::Pcx),
            _ => None,
        };
        if let Some(location) = location {
            return Ok(Operand { location, mode, value: None, label: None });
        }
        return immediate(Location::Pimd, &inner, relative, line_num);
    }

    let upper = body.to_uppercase();
    if let Ok(location) = Location::from_str(&upper) {
        if matches!(
            location,
            Location::Al
                | Location::Ah
                | Location::Bl
                | Location::Bh
                | Location::Cl
                | Location::Ch
                | Location::Ax
                | Location::Bx
                | Location::Cx
                | Location::Ip
        ) {
            return Ok(Operand { location, mode, value: None, label: None });
        }
    }
    immediate(Location::Imd, &upper, relative, line_num)
}

/// An `IMD` or `PIMD` operand holding a number or a label.
fn immediate(
    location: Location,
    text: &str,
    relative: bool,
    line_num: usize,
) -> Result<Operand, AssemblerError> {
    if text.is_empty() {
        return Err(AssemblerError::SyntaxError { line: line_num, message: "missing operand".into() });
    }
    let starts_numeric = text.starts_with(|c: char| c.is_ascii_digit() || c == '-');
    if starts_numeric {
        let value = to_word(parse_number(text, line_num)?, line_num)?;
        let mode = if relative { AccessMode::Relative } else { AccessMode::Direct };
        return Ok(Operand { location, mode, value: Some(value), label: None });
    }
    if !text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid operand: {}", text),
        });
    }
    Ok(Operand {
        location,
        mode: AccessMode::Relative,
        value: None,
        label: Some(text.to_string()),
    })
}

fn parse_number(text: &str, line_num: usize) -> Result<i32, AssemblerError> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16),
        None => digits.parse::<i32>(),
    };
    let value = parsed.map_err(|_| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid number: {}", text),
    })?;
    Ok(if negative { -value } else { value })
}

/// Accept anything representable as a signed or unsigned 16-bit value.
fn to_word(value: i32, line_num: usize) -> Result<u16, AssemblerError> {
    if (i16::MIN as i32..=u16::MAX as i32).contains(&value) {
        Ok(value as u16)
    } else {
        Err(AssemblerError::ValueOutOfRange { line: line_num, value })
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i32 },

    #[error("{mnemonic} on line {line} takes {expected} operands, found {found}")]
    OperandCount { line: usize, mnemonic: String, expected: usize, found: usize },

    #[error("cannot encode line {line}: {source}")]
    Encode { line: usize, source: EncodeError },
}
