//! RV32I/M field layouts and the instruction packer.
//!
//! ```text
//!  31        25 24   20 19   15 14  12 11        7 6      0
//! | funct7     | rs2   | rs1   |funct3| rd        | opcode | R
//! | imm[11:0]          | rs1   |funct3| rd        | opcode | I
//! | imm[11:5]  | rs2   | rs1   |funct3| imm[4:0]  | opcode | S
//! |imm[12|10:5]| rs2   | rs1   |funct3|imm[4:1|11]| opcode | B
//! | imm[31:12]                        | rd        | opcode | U
//! |imm[20|10:1|11|19:12]              | rd        | opcode | J
//! ```
//!
//! Immediates are carried as MSB-first bit strings. B and J immediates are
//! the halved offset (bit 0 of the byte offset is always zero), so index 0 of
//! a 12-bit B immediate is `imm[12]` and index 0 of a 20-bit J immediate is
//! `imm[20]`. [`Rule::Imm`] lists which index runs of that string land in a
//! given field, which is all the split-immediate handling there is.

use serde::Serialize;

use crate::error::{ErrorKind, Result};
use crate::instructions::Shape;
use crate::numeric::{bits_to_hex, bits_to_int, int_to_bits, sign_extend, Bits, BitsRef};
use crate::register::Register;

/// Where a field's bits come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Opcode,
    Funct3,
    Funct7,
    Zero,
    Rd,
    Rs1,
    Rs2,
    /// Concatenation of `start..end` runs of the immediate bit string.
    Imm(&'static [(usize, usize)]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub hi: u8,
    pub lo: u8,
    pub rule: Rule,
}

impl FieldSpec {
    pub const fn width(&self) -> usize {
        (self.hi - self.lo + 1) as usize
    }
}

const fn field(name: &'static str, hi: u8, lo: u8, rule: Rule) -> FieldSpec {
    FieldSpec { name, hi, lo, rule }
}

const OPCODE: FieldSpec = field("opcode", 6, 0, Rule::Opcode);
const RD: FieldSpec = field("rd", 11, 7, Rule::Rd);
const FUNCT3: FieldSpec = field("funct3", 14, 12, Rule::Funct3);
const RS1: FieldSpec = field("rs1", 19, 15, Rule::Rs1);
const RS2: FieldSpec = field("rs2", 24, 20, Rule::Rs2);
const FUNCT7: FieldSpec = field("funct7", 31, 25, Rule::Funct7);

pub const R_LAYOUT: &[FieldSpec] = &[FUNCT7, RS2, RS1, FUNCT3, RD, OPCODE];

pub const I_LAYOUT: &[FieldSpec] = &[
    field("imm[11:0]", 31, 20, Rule::Imm(&[(0, 12)])),
    RS1,
    FUNCT3,
    RD,
    OPCODE,
];

/// `slli`/`srli`/`srai`: funct7 sits where the upper immediate bits would.
pub const SHIFT_LAYOUT: &[FieldSpec] = &[
    FUNCT7,
    field("shamt", 24, 20, Rule::Imm(&[(0, 5)])),
    RS1,
    FUNCT3,
    RD,
    OPCODE,
];

/// `ecall`/`ebreak`/`fence`: I-type with no register operands.
pub const SYSTEM_LAYOUT: &[FieldSpec] = &[
    field("imm[11:0]", 31, 20, Rule::Imm(&[(0, 12)])),
    field("rs1", 19, 15, Rule::Zero),
    FUNCT3,
    field("rd", 11, 7, Rule::Zero),
    OPCODE,
];

pub const S_LAYOUT: &[FieldSpec] = &[
    field("imm[11:5]", 31, 25, Rule::Imm(&[(0, 7)])),
    RS2,
    RS1,
    FUNCT3,
    field("imm[4:0]", 11, 7, Rule::Imm(&[(7, 12)])),
    OPCODE,
];

pub const B_LAYOUT: &[FieldSpec] = &[
    field("imm[12|10:5]", 31, 25, Rule::Imm(&[(0, 1), (2, 8)])),
    RS2,
    RS1,
    FUNCT3,
    field("imm[4:1|11]", 11, 7, Rule::Imm(&[(8, 12), (1, 2)])),
    OPCODE,
];

pub const U_LAYOUT: &[FieldSpec] = &[field("imm[31:12]", 31, 12, Rule::Imm(&[(0, 20)])), RD, OPCODE];

pub const J_LAYOUT: &[FieldSpec] = &[
    field("imm[20]", 31, 31, Rule::Imm(&[(0, 1)])),
    field("imm[10:1]", 30, 21, Rule::Imm(&[(10, 20)])),
    field("imm[11]", 20, 20, Rule::Imm(&[(9, 10)])),
    field("imm[19:12]", 19, 12, Rule::Imm(&[(1, 9)])),
    RD,
    OPCODE,
];

/// Total immediate width a layout consumes.
pub fn imm_width(layout: &[FieldSpec]) -> usize {
    layout
        .iter()
        .filter(|f| matches!(f.rule, Rule::Imm(_)))
        .map(FieldSpec::width)
        .sum()
}

/// Gather the listed index runs of `imm` into one contiguous bit string.
pub fn reslice(imm: &BitsRef, runs: &[(usize, usize)]) -> Bits {
    let mut out = Bits::new();
    for &(start, end) in runs {
        out.extend_from_bitslice(&imm[start..end]);
    }
    out
}

/// Operand values bound for one source instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operands {
    pub rd: Option<Register>,
    pub rs1: Option<Register>,
    pub rs2: Option<Register>,
    pub imm: Option<Bits>,
    /// Jump target that was not defined in this program.
    pub external: Option<String>,
}

/// An instantiated shape with its field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    shape: &'static Shape,
    fields: Vec<Option<Bits>>,
    pub external_label: Option<String>,
}

impl Instruction {
    pub fn new(shape: &'static Shape) -> Self {
        Self {
            shape,
            fields: vec![None; shape.layout.len()],
            external_label: None,
        }
    }

    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    pub fn set_field(&mut self, name: &str, bits: Bits) -> Result<()> {
        let idx = self
            .shape
            .layout
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| ErrorKind::UnknownField {
                mnemonic: self.shape.mnemonic.to_string(),
                field: name.to_string(),
            })?;
        let expected = self.shape.layout[idx].width();
        if bits.len() != expected {
            return Err(ErrorKind::FieldWidth {
                field: name.to_string(),
                expected,
                got: bits.len(),
            }
            .into());
        }
        self.fields[idx] = Some(bits);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&BitsRef> {
        let idx = self.shape.layout.iter().position(|f| f.name == name)?;
        self.fields[idx].as_deref()
    }

    /// Concatenate every field in declared order.
    pub fn to_binary(&self) -> Result<Bits> {
        let mut out = Bits::with_capacity(32);
        for (spec, value) in self.shape.layout.iter().zip(&self.fields) {
            let bits = value.as_ref().ok_or_else(|| ErrorKind::IncompleteInstruction {
                mnemonic: self.shape.mnemonic.to_string(),
                field: spec.name.to_string(),
            })?;
            out.extend_from_bitslice(bits);
        }
        Ok(out)
    }

    pub fn to_word(&self) -> Result<u32> {
        Ok(bits_to_int(&self.to_binary()?, false) as u32)
    }

    pub fn to_hex(&self) -> Result<String> {
        bits_to_hex(&self.to_binary()?)
    }
}

/// Pack an operand record into a fresh instruction of `shape`.
///
/// Fields whose operand is missing stay unbound, so an incomplete record
/// surfaces as `IncompleteInstruction` when the word is emitted.
pub fn encode(shape: &'static Shape, ops: &Operands) -> Result<Instruction> {
    let mut inst = Instruction::new(shape);
    if let Some(imm) = &ops.imm {
        let expected = imm_width(shape.layout);
        if imm.len() != expected {
            return Err(ErrorKind::FieldWidth {
                field: "imm".into(),
                expected,
                got: imm.len(),
            }
            .into());
        }
    }
    let reg = |r: Option<Register>| r.map(|r| int_to_bits(r.index() as i64, 5));
    for spec in shape.layout {
        let bits = match spec.rule {
            Rule::Opcode => Some(int_to_bits(shape.opcode as i64, spec.width())),
            Rule::Funct3 => Some(int_to_bits(shape.funct3 as i64, spec.width())),
            Rule::Funct7 => Some(int_to_bits(shape.funct7 as i64, spec.width())),
            Rule::Zero => Some(int_to_bits(0, spec.width())),
            Rule::Rd => reg(ops.rd),
            Rule::Rs1 => reg(ops.rs1),
            Rule::Rs2 => reg(ops.rs2),
            Rule::Imm(runs) => ops.imm.as_deref().map(|imm| reslice(imm, runs)),
        };
        if let Some(bits) = bits {
            inst.set_field(spec.name, bits)?;
        }
    }
    inst.external_label = ops.external.clone();
    Ok(inst)
}

/// Raw fields of an encoded word, with every immediate interpretation.
/// Immediates are sign-extended byte offsets, except `imm_u` which is the
/// raw 20-bit upper field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub opcode: u32,
    pub rd: u8,
    pub funct3: u32,
    pub rs1: u8,
    pub rs2: u8,
    pub funct7: u32,
    pub imm_i: i32,
    pub imm_s: i32,
    pub imm_b: i32,
    pub imm_u: u32,
    pub imm_j: i32,
}

pub fn decode(word: u32) -> Decoded {
    let bit = |n: u32| (word >> n) & 1;
    let imm_s = ((word >> 25) << 5) | ((word >> 7) & 0x1F);
    let imm_b = (bit(31) << 12) | (bit(7) << 11) | (((word >> 25) & 0x3F) << 5) | (((word >> 8) & 0xF) << 1);
    let imm_j = (bit(31) << 20) | (((word >> 12) & 0xFF) << 12) | (bit(20) << 11) | (((word >> 21) & 0x3FF) << 1);
    Decoded {
        opcode: word & 0x7F,
        rd: ((word >> 7) & 0x1F) as u8,
        funct3: (word >> 12) & 0x7,
        rs1: ((word >> 15) & 0x1F) as u8,
        rs2: ((word >> 20) & 0x1F) as u8,
        funct7: word >> 25,
        imm_i: sign_extend(word >> 20, 12),
        imm_s: sign_extend(imm_s, 12),
        imm_b: sign_extend(imm_b, 13),
        imm_u: word >> 12,
        imm_j: sign_extend(imm_j, 21),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{lookup, TABLE};
    use crate::numeric::{bits_to_string, literal_to_bits};
    use pretty_assertions::assert_eq;

    fn bits(s: &str) -> Bits {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn every_layout_covers_32_bits_once() {
        for shape in TABLE {
            let mut next_hi = 31i32;
            for f in shape.layout {
                assert_eq!(f.hi as i32, next_hi, "{} field {}", shape.mnemonic, f.name);
                assert!(f.hi >= f.lo);
                next_hi = f.lo as i32 - 1;
            }
            assert_eq!(next_hi, -1, "{}", shape.mnemonic);
        }
    }

    #[test]
    fn b_reslice_bit_by_bit() {
        // Halved offset bits, named by the byte-offset bit each one carries.
        let imm = bits("100000000000"); // imm[12]
        assert_eq!(bits_to_string(&reslice(&imm, &[(0, 1), (2, 8)])), "1000000");
        assert_eq!(bits_to_string(&reslice(&imm, &[(8, 12), (1, 2)])), "00000");

        let imm = bits("010000000000"); // imm[11]
        assert_eq!(bits_to_string(&reslice(&imm, &[(0, 1), (2, 8)])), "0000000");
        assert_eq!(bits_to_string(&reslice(&imm, &[(8, 12), (1, 2)])), "00001");

        let imm = bits("001000000000"); // imm[10]
        assert_eq!(bits_to_string(&reslice(&imm, &[(0, 1), (2, 8)])), "0100000");

        let imm = bits("000000010000"); // imm[5]
        assert_eq!(bits_to_string(&reslice(&imm, &[(0, 1), (2, 8)])), "0000001");

        let imm = bits("000000001000"); // imm[4]
        assert_eq!(bits_to_string(&reslice(&imm, &[(8, 12), (1, 2)])), "10000");

        let imm = bits("000000000001"); // imm[1]
        assert_eq!(bits_to_string(&reslice(&imm, &[(8, 12), (1, 2)])), "00010");
    }

    #[test]
    fn j_reslice_bit_by_bit() {
        let mut imm = Bits::repeat(false, 20);
        for (idx, byte_bit) in (1..=20).rev().enumerate() {
            imm.fill(false);
            imm.set(idx, true);
            let shape = lookup("jal").unwrap();
            let ops = Operands {
                rd: Some(Register::Zero),
                imm: Some(imm.clone()),
                ..Default::default()
            };
            let word = encode(shape, &ops).unwrap().to_word().unwrap();
            let expected_pos = match byte_bit {
                20 => 31,
                1..=10 => 20 + byte_bit,
                11 => 20,
                _ => byte_bit, // 12..=19
            };
            assert_eq!(word & !0x7F, 1 << expected_pos, "imm[{byte_bit}]");
            assert_eq!(decode(word).imm_j.unsigned_abs(), 1 << byte_bit);
        }
    }

    #[test]
    fn b_fields_land_on_isa_positions() {
        let shape = lookup("beq").unwrap();
        for (idx, byte_bit) in (1..=12).rev().enumerate() {
            let mut imm = Bits::repeat(false, 12);
            imm.set(idx, true);
            let ops = Operands {
                rs1: Some(Register::Zero),
                rs2: Some(Register::Zero),
                imm: Some(imm),
                ..Default::default()
            };
            let word = encode(shape, &ops).unwrap().to_word().unwrap();
            let expected_pos = match byte_bit {
                12 => 31,
                11 => 7,
                5..=10 => 20 + byte_bit,
                _ => 7 + byte_bit, // 1..=4
            };
            assert_eq!(word & !0x7F, 1 << expected_pos, "imm[{byte_bit}]");
        }
    }

    #[test]
    fn add_packs_r_type_fields() {
        let shape = lookup("ADD").unwrap();
        let ops = Operands {
            rd: Some(Register::Ra),
            rs1: Some(Register::Sp),
            rs2: Some(Register::Gp),
            ..Default::default()
        };
        let inst = encode(shape, &ops).unwrap();
        let d = decode(inst.to_word().unwrap());
        assert_eq!((d.rd, d.rs1, d.rs2), (1, 2, 3));
        assert_eq!((d.opcode, d.funct3, d.funct7), (0b011_0011, 0, 0));
        assert_eq!(inst.to_hex().unwrap(), "003100B3");
    }

    #[test]
    fn missing_operand_is_incomplete() {
        let shape = lookup("addi").unwrap();
        let ops = Operands { rd: Some(Register::A0), ..Default::default() };
        let err = encode(shape, &ops).unwrap().to_binary().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IncompleteInstruction { ref field, .. } if field == "imm[11:0]"));
    }

    #[test]
    fn set_field_validates_name_and_width() {
        let mut inst = Instruction::new(lookup("sw").unwrap());
        assert!(matches!(
            inst.set_field("rd", bits("00001")).unwrap_err().kind,
            ErrorKind::UnknownField { .. }
        ));
        assert!(matches!(
            inst.set_field("rs1", bits("001")).unwrap_err().kind,
            ErrorKind::FieldWidth { expected: 5, got: 3, .. }
        ));
        inst.set_field("rs1", bits("00010")).unwrap();
        assert_eq!(bits_to_string(inst.field("rs1").unwrap()), "00010");
    }

    #[test]
    fn store_immediate_splits_upper_and_lower() {
        let shape = lookup("sw").unwrap();
        let ops = Operands {
            rs1: Some(Register::Sp),
            rs2: Some(Register::A0),
            imm: Some(literal_to_bits("-4", 12, true).unwrap()),
            ..Default::default()
        };
        let inst = encode(shape, &ops).unwrap();
        assert_eq!(bits_to_string(inst.field("imm[11:5]").unwrap()), "1111111");
        assert_eq!(bits_to_string(inst.field("imm[4:0]").unwrap()), "11100");
        assert_eq!(decode(inst.to_word().unwrap()).imm_s, -4);
    }
}
