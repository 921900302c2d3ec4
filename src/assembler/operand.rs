//! Operand parsing and per-shape binding.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ErrorKind, Result};
use crate::instructions::{Shape, Syntax};
use crate::isa::rv32::Operands;
use crate::numeric::{bits_to_int, int_to_bits, is_literal, literal_to_bits, parse_literal, value_to_bits, Bits};
use crate::register::Register;

static MEM_OPERAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^()]*?)\(\$?([xX]?\w+)\)$").expect("valid regex"));

/// Symbol lookups available while binding operands.
pub trait SymbolResolver {
    /// Text-relative byte address of a label.
    fn label(&self, name: &str) -> Option<u32>;
    /// Absolute byte address of a data variable.
    fn variable(&self, name: &str) -> Option<u32>;
    /// Stores through `x0` below this address are rejected.
    fn protected_limit(&self) -> u32;
}

fn arity(mnemonic: &str, expected: &'static str, got: usize) -> crate::Error {
    ErrorKind::InvalidParameterCount {
        mnemonic: mnemonic.to_string(),
        expected,
        got,
    }
    .into()
}

/// Rewrite a pseudo-instruction into its single real instruction.
/// Returns `None` for anything that is not a pseudo-instruction.
pub fn desugar(
    mnemonic: &str,
    args: &[String],
    symbols: &dyn SymbolResolver,
) -> Result<Option<(&'static str, Vec<String>)>> {
    let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let real = match mnemonic.to_ascii_lowercase().as_str() {
        "nop" => match args {
            [] => ("addi", owned(&["x0", "x0", "0"])),
            _ => return Err(arity(mnemonic, "0", args.len())),
        },
        "li" => match args {
            [rd, imm] => ("addi", owned(&[rd.as_str(), "x0", imm.as_str()])),
            _ => return Err(arity(mnemonic, "2", args.len())),
        },
        "la" => match args {
            [rd, var] => {
                let addr = symbols
                    .variable(var)
                    .ok_or_else(|| ErrorKind::UndefinedVariable(var.clone()))?;
                ("addi", vec![rd.clone(), "x0".into(), addr.to_string()])
            }
            _ => return Err(arity(mnemonic, "2", args.len())),
        },
        "mv" => match args {
            [rd, rs] => ("addi", owned(&[rd.as_str(), rs.as_str(), "0"])),
            _ => return Err(arity(mnemonic, "2", args.len())),
        },
        "j" => match args {
            [target] => ("jal", owned(&["x0", target.as_str()])),
            _ => return Err(arity(mnemonic, "1", args.len())),
        },
        "ret" => match args {
            [] => ("jalr", owned(&["x0", "x1", "0"])),
            _ => return Err(arity(mnemonic, "0", args.len())),
        },
        _ => return Ok(None),
    };
    Ok(Some(real))
}

/// `offset(base)` split into its parts, or `None` for a bare token.
fn split_mem(token: &str) -> Option<(&str, &str)> {
    let caps = MEM_OPERAND.captures(token)?;
    let offset = caps.get(1).map_or("", |m| m.as_str()).trim();
    let base = caps.get(2).map_or("", |m| m.as_str());
    Some((if offset.is_empty() { "0" } else { offset }, base))
}

struct MemRef {
    base: Register,
    imm: Bits,
    /// Statically known address when the base is `x0`.
    addr: Option<i64>,
}

/// Resolve a memory operand: `imm(reg)`, `var(reg)`, `(reg)` or a bare variable.
fn mem_operand(token: &str, symbols: &dyn SymbolResolver) -> Result<MemRef> {
    let var_addr = |name: &str| {
        symbols
            .variable(name)
            .map(i64::from)
            .ok_or_else(|| crate::Error::from(ErrorKind::UndefinedVariable(name.to_string())))
    };
    match split_mem(token) {
        Some((offset, base)) => {
            let base = Register::parse(base)?;
            let (imm, value) = if is_literal(offset) {
                // hex offsets truncate, so check the address the encoding reaches
                let imm = literal_to_bits(offset, 12, true)?;
                let value = bits_to_int(&imm, true);
                (imm, value)
            } else {
                let addr = var_addr(offset)?;
                (value_to_bits(addr, 12, true, offset)?, addr)
            };
            Ok(MemRef { base, imm, addr: base.is_zero().then_some(value) })
        }
        None => {
            let addr = var_addr(token)?;
            Ok(MemRef {
                base: Register::Zero,
                imm: value_to_bits(addr, 12, true, token)?,
                addr: Some(addr),
            })
        }
    }
}

/// Halved PC-relative offset to a label, or to a literal byte offset.
fn relative(target: &str, pc: u32, width: usize, symbols: &dyn SymbolResolver) -> Result<Option<Bits>> {
    let delta = match symbols.label(target) {
        Some(addr) => addr as i64 - pc as i64,
        None if is_literal(target) => parse_literal(target)?.value,
        None => return Ok(None),
    };
    if delta % 2 != 0 {
        return Err(ErrorKind::Syntax(format!("jump offset {delta} is not a multiple of 2")).into());
    }
    value_to_bits(delta / 2, width, true, target).map(Some)
}

fn reg(token: &str) -> Result<Option<Register>> {
    Register::parse(token).map(Some)
}

fn imm12(token: &str) -> Result<Bits> {
    literal_to_bits(token, 12, true)
}

/// Bind operand tokens for `shape` at instruction address `pc`.
pub fn bind(shape: &Shape, args: &[String], pc: u32, symbols: &dyn SymbolResolver) -> Result<Operands> {
    let m = shape.mnemonic;
    let wrong = || arity(m, shape.syntax.expected(), args.len());
    let mut ops = Operands::default();

    match shape.syntax {
        Syntax::RegRegReg => {
            let [rd, rs1, rs2] = args else { return Err(wrong()) };
            ops.rd = reg(rd)?;
            ops.rs1 = reg(rs1)?;
            ops.rs2 = reg(rs2)?;
        }
        Syntax::RegRegImm => {
            let [rd, rs1, imm] = args else { return Err(wrong()) };
            ops.rd = reg(rd)?;
            ops.rs1 = reg(rs1)?;
            ops.imm = Some(imm12(imm)?);
        }
        Syntax::Shift => {
            let [rd, rs1, shamt] = args else { return Err(wrong()) };
            ops.rd = reg(rd)?;
            ops.rs1 = reg(rs1)?;
            ops.imm = Some(literal_to_bits(shamt, 5, false)?);
        }
        Syntax::Load => {
            let [rd, mem] = args else { return Err(wrong()) };
            let mem = mem_operand(mem, symbols)?;
            ops.rd = reg(rd)?;
            ops.rs1 = Some(mem.base);
            ops.imm = Some(mem.imm);
        }
        Syntax::Store => {
            let [rs2, mem] = args else { return Err(wrong()) };
            let mem = mem_operand(mem, symbols)?;
            let limit = symbols.protected_limit();
            if let Some(addr) = mem.addr.filter(|a| (0..limit as i64).contains(a)) {
                return Err(ErrorKind::MemoryProtectionViolation { addr: addr as u32, limit }.into());
            }
            ops.rs2 = reg(rs2)?;
            ops.rs1 = Some(mem.base);
            ops.imm = Some(mem.imm);
        }
        Syntax::Branch => {
            let [rs1, rs2, target] = args else { return Err(wrong()) };
            ops.rs1 = reg(rs1)?;
            ops.rs2 = reg(rs2)?;
            ops.imm = Some(
                relative(target, pc, 12, symbols)?
                    .ok_or_else(|| ErrorKind::UndefinedLabel(target.clone()))?,
            );
        }
        Syntax::Upper => {
            let [rd, imm] = args else { return Err(wrong()) };
            let signed_first = m.eq_ignore_ascii_case("auipc");
            ops.rd = reg(rd)?;
            ops.imm = Some(
                literal_to_bits(imm, 20, signed_first)
                    .or_else(|_| literal_to_bits(imm, 20, !signed_first))?,
            );
        }
        Syntax::Jal => {
            let (rd, target) = match args {
                [target] => ("x0", target),
                [rd, target] => (rd.as_str(), target),
                _ => return Err(wrong()),
            };
            ops.rd = reg(rd)?;
            match relative(target, pc, 20, symbols)? {
                Some(imm) => ops.imm = Some(imm),
                None => {
                    ops.imm = Some(int_to_bits(0, 20));
                    ops.external = Some(target.clone());
                }
            }
        }
        Syntax::Jalr => {
            let (rd, rs1, imm) = match args {
                [rd, rs1, imm] => (rd.as_str(), rs1.as_str(), imm.as_str()),
                [rd, second] => match split_mem(second) {
                    Some((offset, base)) => (rd.as_str(), base, offset),
                    None => (rd.as_str(), second.as_str(), "0"),
                },
                _ => return Err(wrong()),
            };
            ops.rd = reg(rd)?;
            ops.rs1 = reg(rs1)?;
            ops.imm = Some(imm12(imm)?);
        }
        Syntax::None => {
            if !args.is_empty() {
                return Err(wrong());
            }
            ops.imm = Some(int_to_bits(shape.fixed_imm, 12));
        }
    }
    Ok(ops)
}
