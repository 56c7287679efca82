//! Bit-exact instruction codec.
//!
//! Wire format: an 8-bit opcode followed by a fixed operand sequence.
//! Every operand is 32 bits wide, big-endian: register addresses and
//! constant-pool indices as `u32`, upvalue indices and embedded integers
//! as `i32`, decimals as an IEEE-754 bit pattern, branch targets as
//! absolute byte offsets within the enclosing prototype's bytecode.
//!
//! Branch instructions keep their target in the final four bytes of the
//! encoding so the compiler's jump patcher can overwrite it in place.

use std::fmt;

use crate::error::RuntimeError;
use crate::opcode::OpCode;

const INT_BLOCK: u8 = 0x70;
const DEC_BLOCK: u8 = 0x80;

/// The nine three-register operations shared by the integer and decimal
/// opcode blocks, in opcode-offset order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryKind {
    LT,
    LTEq,
    GT,
    GTEq,
    Eq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryKind {
    pub const ALL: [BinaryKind; 9] = [
        BinaryKind::LT,
        BinaryKind::LTEq,
        BinaryKind::GT,
        BinaryKind::GTEq,
        BinaryKind::Eq,
        BinaryKind::Add,
        BinaryKind::Sub,
        BinaryKind::Mul,
        BinaryKind::Div,
    ];

    fn offset(self) -> u8 {
        match self {
            BinaryKind::LT => 0,
            BinaryKind::LTEq => 1,
            BinaryKind::GT => 2,
            BinaryKind::GTEq => 3,
            BinaryKind::Eq => 4,
            BinaryKind::Add => 5,
            BinaryKind::Sub => 6,
            BinaryKind::Mul => 7,
            BinaryKind::Div => 8,
        }
    }

    fn from_offset(offset: u8) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }

    /// True for the comparison kinds, which write a boolean.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryKind::LT | BinaryKind::LTEq | BinaryKind::GT | BinaryKind::GTEq | BinaryKind::Eq
        )
    }
}

/// One decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    Halt,
    BoolConst { value: i32, dest: u32 },
    IntConst { value: i32, dest: u32 },
    DecConst { value: f32, dest: u32 },
    StrConst { index: u32, dest: u32 },
    FuncConst { index: u32, dest: u32 },
    Move { source: u32, dest: u32 },
    LoadUpVal { index: i32, dest: u32 },
    SetUpVal { source: u32, index: i32 },
    BrAlways { addr: u32 },
    BrTrue { test: u32, addr: u32 },
    BrFalse { test: u32, addr: u32 },
    Dispatch { source: u32, first_arg: u32 },
    Return { source: u32 },
    Print { source: u32 },
    IntBinary { kind: BinaryKind, left: u32, right: u32, dest: u32 },
    IntNeg { operand: u32, dest: u32 },
    DecBinary { kind: BinaryKind, left: u32, right: u32, dest: u32 },
    DecNeg { operand: u32, dest: u32 },
}

impl Instruction {
    /// The opcode byte this instruction encodes to.
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::Nop => OpCode::Nop,
            Instruction::Halt => OpCode::Halt,
            Instruction::BoolConst { .. } => OpCode::BoolConst,
            Instruction::IntConst { .. } => OpCode::IntConst,
            Instruction::DecConst { .. } => OpCode::DecConst,
            Instruction::StrConst { .. } => OpCode::StrConst,
            Instruction::FuncConst { .. } => OpCode::FuncConst,
            Instruction::Move { .. } => OpCode::Move,
            Instruction::LoadUpVal { .. } => OpCode::LoadUpVal,
            Instruction::SetUpVal { .. } => OpCode::SetUpVal,
            Instruction::BrAlways { .. } => OpCode::BrAlways,
            Instruction::BrTrue { .. } => OpCode::BrTrue,
            Instruction::BrFalse { .. } => OpCode::BrFalse,
            Instruction::Dispatch { .. } => OpCode::Dispatch,
            Instruction::Return { .. } => OpCode::Return,
            Instruction::Print { .. } => OpCode::Print,
            Instruction::IntBinary { kind, .. } => {
                OpCode::from_u8(INT_BLOCK + kind.offset()).expect("integer block opcode")
            }
            Instruction::IntNeg { .. } => OpCode::IntNeg,
            Instruction::DecBinary { kind, .. } => {
                OpCode::from_u8(DEC_BLOCK + kind.offset()).expect("decimal block opcode")
            }
            Instruction::DecNeg { .. } => OpCode::DecNeg,
        }
    }

    /// Append this instruction's encoding to `buf`. Encoding is total for
    /// any operand values.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode().as_u8());
        match *self {
            Instruction::Nop | Instruction::Halt => {}
            Instruction::BoolConst { value, dest } | Instruction::IntConst { value, dest } => {
                write_i32(buf, value);
                write_u32(buf, dest);
            }
            Instruction::DecConst { value, dest } => {
                write_u32(buf, value.to_bits());
                write_u32(buf, dest);
            }
            Instruction::StrConst { index, dest } | Instruction::FuncConst { index, dest } => {
                write_u32(buf, index);
                write_u32(buf, dest);
            }
            Instruction::Move { source, dest } => {
                write_u32(buf, source);
                write_u32(buf, dest);
            }
            Instruction::LoadUpVal { index, dest } => {
                write_i32(buf, index);
                write_u32(buf, dest);
            }
            Instruction::SetUpVal { source, index } => {
                write_u32(buf, source);
                write_i32(buf, index);
            }
            Instruction::BrAlways { addr } => {
                write_u32(buf, addr);
            }
            Instruction::BrTrue { test, addr } | Instruction::BrFalse { test, addr } => {
                write_u32(buf, test);
                write_u32(buf, addr);
            }
            Instruction::Dispatch { source, first_arg } => {
                write_u32(buf, source);
                write_u32(buf, first_arg);
            }
            Instruction::Return { source } | Instruction::Print { source } => {
                write_u32(buf, source);
            }
            Instruction::IntBinary { left, right, dest, .. }
            | Instruction::DecBinary { left, right, dest, .. } => {
                write_u32(buf, left);
                write_u32(buf, right);
                write_u32(buf, dest);
            }
            Instruction::IntNeg { operand, dest } | Instruction::DecNeg { operand, dest } => {
                write_u32(buf, operand);
                write_u32(buf, dest);
            }
        }
    }

    /// Number of bytes [`Instruction::encode`] appends.
    pub fn encoded_len(&self) -> usize {
        let operands = match self {
            Instruction::Nop | Instruction::Halt => 0,
            Instruction::Return { .. } | Instruction::Print { .. } | Instruction::BrAlways { .. } => 1,
            Instruction::BoolConst { .. }
            | Instruction::IntConst { .. }
            | Instruction::DecConst { .. }
            | Instruction::StrConst { .. }
            | Instruction::FuncConst { .. }
            | Instruction::Move { .. }
            | Instruction::LoadUpVal { .. }
            | Instruction::SetUpVal { .. }
            | Instruction::BrTrue { .. }
            | Instruction::BrFalse { .. }
            | Instruction::Dispatch { .. }
            | Instruction::IntNeg { .. }
            | Instruction::DecNeg { .. } => 2,
            Instruction::IntBinary { .. } | Instruction::DecBinary { .. } => 3,
        };
        1 + operands * 4
    }

    /// Decode the instruction starting at byte `offset`, returning it and
    /// the offset of the following instruction. The distance between the
    /// two offsets always equals the instruction's encoded length.
    pub fn decode_at(bytes: &[u8], offset: usize) -> Result<(Instruction, usize), RuntimeError> {
        let mut reader = Reader { bytes, pos: offset };
        let byte = reader.read_u8()?;
        let opcode = OpCode::from_u8(byte).ok_or(RuntimeError::UnknownOpcode { byte, offset })?;

        let inst = match opcode {
            OpCode::Nop => Instruction::Nop,
            OpCode::Halt => Instruction::Halt,
            OpCode::BoolConst => Instruction::BoolConst {
                value: reader.read_i32()?,
                dest: reader.read_u32()?,
            },
            OpCode::IntConst => Instruction::IntConst {
                value: reader.read_i32()?,
                dest: reader.read_u32()?,
            },
            OpCode::DecConst => Instruction::DecConst {
                value: f32::from_bits(reader.read_u32()?),
                dest: reader.read_u32()?,
            },
            OpCode::StrConst => Instruction::StrConst {
                index: reader.read_u32()?,
                dest: reader.read_u32()?,
            },
            OpCode::FuncConst => Instruction::FuncConst {
                index: reader.read_u32()?,
                dest: reader.read_u32()?,
            },
            OpCode::Move => Instruction::Move {
                source: reader.read_u32()?,
                dest: reader.read_u32()?,
            },
            OpCode::LoadUpVal => Instruction::LoadUpVal {
                index: reader.read_i32()?,
                dest: reader.read_u32()?,
            },
            OpCode::SetUpVal => Instruction::SetUpVal {
                source: reader.read_u32()?,
                index: reader.read_i32()?,
            },
            OpCode::BrAlways => Instruction::BrAlways {
                addr: reader.read_u32()?,
            },
            OpCode::BrTrue => Instruction::BrTrue {
                test: reader.read_u32()?,
                addr: reader.read_u32()?,
            },
            OpCode::BrFalse => Instruction::BrFalse {
                test: reader.read_u32()?,
                addr: reader.read_u32()?,
            },
            OpCode::Dispatch => Instruction::Dispatch {
                source: reader.read_u32()?,
                first_arg: reader.read_u32()?,
            },
            OpCode::Return => Instruction::Return {
                source: reader.read_u32()?,
            },
            OpCode::Print => Instruction::Print {
                source: reader.read_u32()?,
            },
            OpCode::IntNeg => Instruction::IntNeg {
                operand: reader.read_u32()?,
                dest: reader.read_u32()?,
            },
            OpCode::DecNeg => Instruction::DecNeg {
                operand: reader.read_u32()?,
                dest: reader.read_u32()?,
            },
            other => {
                let code = other.as_u8();
                let kind = if code >= DEC_BLOCK {
                    BinaryKind::from_offset(code - DEC_BLOCK)
                } else {
                    BinaryKind::from_offset(code - INT_BLOCK)
                }
                .expect("three-register opcode");
                let left = reader.read_u32()?;
                let right = reader.read_u32()?;
                let dest = reader.read_u32()?;
                if code >= DEC_BLOCK {
                    Instruction::DecBinary { kind, left, right, dest }
                } else {
                    Instruction::IntBinary { kind, left, right, dest }
                }
            }
        };

        Ok((inst, reader.pos))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match *self {
            Instruction::Nop | Instruction::Halt => write!(f, "{}", name),
            Instruction::BoolConst { value, dest } | Instruction::IntConst { value, dest } => {
                write!(f, "{:<9} ${}, r{}", name, value, dest)
            }
            Instruction::DecConst { value, dest } => {
                write!(f, "{:<9} ${}, r{}", name, value, dest)
            }
            Instruction::StrConst { index, dest } | Instruction::FuncConst { index, dest } => {
                write!(f, "{:<9} #{}, r{}", name, index, dest)
            }
            Instruction::Move { source, dest } => write!(f, "{:<9} r{}, r{}", name, source, dest),
            Instruction::LoadUpVal { index, dest } => {
                write!(f, "{:<9} #{}, r{}", name, index, dest)
            }
            Instruction::SetUpVal { source, index } => {
                write!(f, "{:<9} r{}, #{}", name, source, index)
            }
            Instruction::BrAlways { addr } => write!(f, "{:<9} @{}", name, addr),
            Instruction::BrTrue { test, addr } | Instruction::BrFalse { test, addr } => {
                write!(f, "{:<9} r{}, @{}", name, test, addr)
            }
            Instruction::Dispatch { source, first_arg } => {
                write!(f, "{:<9} r{}, (r{}...)", name, source, first_arg)
            }
            Instruction::Return { source } | Instruction::Print { source } => {
                write!(f, "{:<9} r{}", name, source)
            }
            Instruction::IntBinary { left, right, dest, .. }
            | Instruction::DecBinary { left, right, dest, .. } => {
                write!(f, "{:<9} r{}, r{}, r{}", name, left, right, dest)
            }
            Instruction::IntNeg { operand, dest } | Instruction::DecNeg { operand, dest } => {
                write!(f, "{:<9} r{}, r{}", name, operand, dest)
            }
        }
    }
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn read_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(RuntimeError::TruncatedBytecode { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u32(&mut self) -> Result<u32, RuntimeError> {
        let end = self.pos + 4;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(RuntimeError::TruncatedBytecode { offset: self.pos })?;
        self.pos = end;
        Ok(u32::from_be_bytes(slice.try_into().expect("4-byte slice")))
    }

    fn read_i32(&mut self) -> Result<i32, RuntimeError> {
        self.read_u32().map(|v| v as i32)
    }
}
