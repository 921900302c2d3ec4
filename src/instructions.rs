use serde::Serialize;

use crate::isa::rv32::{
    FieldSpec, B_LAYOUT, I_LAYOUT, J_LAYOUT, R_LAYOUT, SHIFT_LAYOUT, SYSTEM_LAYOUT, S_LAYOUT,
    U_LAYOUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Kind {
    R,
    I,
    S,
    B,
    U,
    J,
}

/// Operand syntax accepted after the mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `rd, rs1, rs2`
    RegRegReg,
    /// `rd, rs1, imm`
    RegRegImm,
    /// `rd, rs1, shamt`
    Shift,
    /// `rd, imm(rs1)` or `rd, var`
    Load,
    /// `rs2, imm(rs1)` or `rs2, var`
    Store,
    /// `rs1, rs2, label`
    Branch,
    /// `rd, imm20`
    Upper,
    /// `label` or `rd, label`
    Jal,
    /// `rd, rs1, imm`, `rd, imm(rs1)` or `rd, rs1`
    Jalr,
    None,
}

impl Syntax {
    pub fn expected(self) -> &'static str {
        match self {
            Syntax::RegRegReg | Syntax::RegRegImm | Syntax::Shift | Syntax::Branch => "3",
            Syntax::Load | Syntax::Store | Syntax::Upper => "2",
            Syntax::Jal => "1 or 2",
            Syntax::Jalr => "2 or 3",
            Syntax::None => "0",
        }
    }
}

/// Immutable description of one mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub mnemonic: &'static str,
    pub description: &'static str,
    pub pseudo: &'static str,
    pub kind: Kind,
    pub syntax: Syntax,
    pub opcode: u32,
    pub funct3: u32,
    pub funct7: u32,
    /// Immediate for operand-less system instructions.
    pub fixed_imm: i64,
    pub layout: &'static [FieldSpec],
}

const OP: u32 = 0b011_0011;
const OP_IMM: u32 = 0b001_0011;
const LOAD: u32 = 0b000_0011;
const STORE: u32 = 0b010_0011;
const BRANCH: u32 = 0b110_0011;
const JALR: u32 = 0b110_0111;
const JAL: u32 = 0b110_1111;
const LUI: u32 = 0b011_0111;
const AUIPC: u32 = 0b001_0111;
const SYSTEM: u32 = 0b111_0011;
const MISC_MEM: u32 = 0b000_1111;

const MULDIV: u32 = 0b000_0001;
const ALT: u32 = 0b010_0000;

#[allow(clippy::too_many_arguments)]
const fn shape(
    mnemonic: &'static str,
    kind: Kind,
    syntax: Syntax,
    layout: &'static [FieldSpec],
    opcode: u32,
    funct3: u32,
    funct7: u32,
    description: &'static str,
    pseudo: &'static str,
) -> Shape {
    Shape {
        mnemonic,
        description,
        pseudo,
        kind,
        syntax,
        opcode,
        funct3,
        funct7,
        fixed_imm: 0,
        layout,
    }
}

const fn r(m: &'static str, funct7: u32, funct3: u32, d: &'static str, p: &'static str) -> Shape {
    shape(m, Kind::R, Syntax::RegRegReg, R_LAYOUT, OP, funct3, funct7, d, p)
}

const fn imm(m: &'static str, funct3: u32, d: &'static str, p: &'static str) -> Shape {
    shape(m, Kind::I, Syntax::RegRegImm, I_LAYOUT, OP_IMM, funct3, 0, d, p)
}

const fn shift(m: &'static str, funct7: u32, funct3: u32, d: &'static str, p: &'static str) -> Shape {
    shape(m, Kind::I, Syntax::Shift, SHIFT_LAYOUT, OP_IMM, funct3, funct7, d, p)
}

const fn load(m: &'static str, funct3: u32, d: &'static str, p: &'static str) -> Shape {
    shape(m, Kind::I, Syntax::Load, I_LAYOUT, LOAD, funct3, 0, d, p)
}

const fn store(m: &'static str, funct3: u32, d: &'static str, p: &'static str) -> Shape {
    shape(m, Kind::S, Syntax::Store, S_LAYOUT, STORE, funct3, 0, d, p)
}

const fn branch(m: &'static str, funct3: u32, d: &'static str, p: &'static str) -> Shape {
    shape(m, Kind::B, Syntax::Branch, B_LAYOUT, BRANCH, funct3, 0, d, p)
}

const fn system(m: &'static str, opcode: u32, fixed_imm: i64, d: &'static str) -> Shape {
    let mut s = shape(m, Kind::I, Syntax::None, SYSTEM_LAYOUT, opcode, 0, 0, d, "");
    s.fixed_imm = fixed_imm;
    s
}

pub const TABLE: &[Shape] = &[
    r("add", 0, 0b000, "Add", "(rd)←(rs1)+(rs2)"),
    r("sub", ALT, 0b000, "Subtract", "(rd)←(rs1)-(rs2)"),
    r("sll", 0, 0b001, "Shift left logical", "(rd)←(rs1)<<(rs2)[4:0]"),
    r("slt", 0, 0b010, "Set less than", "(rd)←(rs1)<(rs2) ? 1 : 0"),
    r("sltu", 0, 0b011, "Set less than unsigned", "(rd)←(rs1)<u(rs2) ? 1 : 0"),
    r("xor", 0, 0b100, "Exclusive or", "(rd)←(rs1)^(rs2)"),
    r("srl", 0, 0b101, "Shift right logical", "(rd)←(rs1)>>(rs2)[4:0]"),
    r("sra", ALT, 0b101, "Shift right arithmetic", "(rd)←(rs1)>>s(rs2)[4:0]"),
    r("or", 0, 0b110, "Or", "(rd)←(rs1)|(rs2)"),
    r("and", 0, 0b111, "And", "(rd)←(rs1)&(rs2)"),
    r("mul", MULDIV, 0b000, "Multiply", "(rd)←((rs1)*(rs2))[31:0]"),
    r("mulh", MULDIV, 0b001, "Multiply high signed", "(rd)←((rs1)s*s(rs2))[63:32]"),
    r("mulhsu", MULDIV, 0b010, "Multiply high signed-unsigned", "(rd)←((rs1)s*u(rs2))[63:32]"),
    r("mulhu", MULDIV, 0b011, "Multiply high unsigned", "(rd)←((rs1)u*u(rs2))[63:32]"),
    r("div", MULDIV, 0b100, "Divide", "(rd)←(rs1)/s(rs2)"),
    r("divu", MULDIV, 0b101, "Divide unsigned", "(rd)←(rs1)/u(rs2)"),
    r("rem", MULDIV, 0b110, "Remainder", "(rd)←(rs1)%s(rs2)"),
    r("remu", MULDIV, 0b111, "Remainder unsigned", "(rd)←(rs1)%u(rs2)"),
    imm("addi", 0b000, "Add immediate", "(rd)←(rs1)+sext(imm)"),
    imm("slti", 0b010, "Set less than immediate", "(rd)←(rs1)<sext(imm) ? 1 : 0"),
    imm("sltiu", 0b011, "Set less than immediate unsigned", "(rd)←(rs1)<u sext(imm) ? 1 : 0"),
    imm("xori", 0b100, "Exclusive or immediate", "(rd)←(rs1)^sext(imm)"),
    imm("ori", 0b110, "Or immediate", "(rd)←(rs1)|sext(imm)"),
    imm("andi", 0b111, "And immediate", "(rd)←(rs1)&sext(imm)"),
    shift("slli", 0, 0b001, "Shift left logical immediate", "(rd)←(rs1)<<shamt"),
    shift("srli", 0, 0b101, "Shift right logical immediate", "(rd)←(rs1)>>shamt"),
    shift("srai", ALT, 0b101, "Shift right arithmetic immediate", "(rd)←(rs1)>>s shamt"),
    load("lb", 0b000, "Load byte", "(rd)←sext(M[(rs1)+sext(imm)][7:0])"),
    load("lh", 0b001, "Load halfword", "(rd)←sext(M[(rs1)+sext(imm)][15:0])"),
    load("lw", 0b010, "Load word", "(rd)←M[(rs1)+sext(imm)]"),
    load("lbu", 0b100, "Load byte unsigned", "(rd)←zext(M[(rs1)+sext(imm)][7:0])"),
    load("lhu", 0b101, "Load halfword unsigned", "(rd)←zext(M[(rs1)+sext(imm)][15:0])"),
    store("sb", 0b000, "Store byte", "M[(rs1)+sext(imm)]←(rs2)[7:0]"),
    store("sh", 0b001, "Store halfword", "M[(rs1)+sext(imm)]←(rs2)[15:0]"),
    store("sw", 0b010, "Store word", "M[(rs1)+sext(imm)]←(rs2)"),
    branch("beq", 0b000, "Branch if equal", "if (rs1)==(rs2) PC←PC+sext(offset)"),
    branch("bne", 0b001, "Branch if not equal", "if (rs1)!=(rs2) PC←PC+sext(offset)"),
    branch("blt", 0b100, "Branch if less than", "if (rs1)<s(rs2) PC←PC+sext(offset)"),
    branch("bge", 0b101, "Branch if greater or equal", "if (rs1)>=s(rs2) PC←PC+sext(offset)"),
    branch("bltu", 0b110, "Branch if less than unsigned", "if (rs1)<u(rs2) PC←PC+sext(offset)"),
    branch("bgeu", 0b111, "Branch if greater or equal unsigned", "if (rs1)>=u(rs2) PC←PC+sext(offset)"),
    shape("jalr", Kind::I, Syntax::Jalr, I_LAYOUT, JALR, 0b000, 0, "Jump and link register", "(rd)←PC+4; PC←((rs1)+sext(imm))&~1"),
    shape("jal", Kind::J, Syntax::Jal, J_LAYOUT, JAL, 0, 0, "Jump and link", "(rd)←PC+4; PC←PC+sext(offset)"),
    shape("lui", Kind::U, Syntax::Upper, U_LAYOUT, LUI, 0, 0, "Load upper immediate", "(rd)←imm<<12"),
    shape("auipc", Kind::U, Syntax::Upper, U_LAYOUT, AUIPC, 0, 0, "Add upper immediate to PC", "(rd)←PC+(imm<<12)"),
    system("ecall", SYSTEM, 0, "Environment call"),
    system("ebreak", SYSTEM, 1, "Environment breakpoint"),
    system("fence", MISC_MEM, 0, "Memory fence"),
];

/// Case-insensitive mnemonic lookup.
pub fn lookup(mnemonic: &str) -> Option<&'static Shape> {
    TABLE.iter().find(|s| s.mnemonic.eq_ignore_ascii_case(mnemonic))
}
