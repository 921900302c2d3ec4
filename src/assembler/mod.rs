//! Two-pass assembler.
//!
//! `assemble` strips comments, splits the `.data` and `.text` segments,
//! lays out variables, expands macros, then walks the expanded text twice:
//! once to collect label addresses and once to bind and encode instructions.
//! Each [`Assembler`] owns its symbol tables, so firmware, interrupt handler
//! and user program are assembled independently.

pub mod data;
pub mod macros;
pub mod operand;
pub mod program;
pub mod source;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtLine, Error, ErrorKind, Result};
use crate::instructions::lookup;
use crate::isa::rv32::{encode, Instruction};

pub use data::{DataComponent, DataKind, DataSegment};
pub use operand::SymbolResolver;
pub use program::{AssembledInstruction, AssembledProgram, TextSegment};
use source::{split_operands, split_segments, strip, SourceLine};

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([.A-Za-z_][.A-Za-z0-9_]*)\s*:").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Address of the first data variable.
    pub data_base: u32,
    /// Stores through `x0` below this address are rejected.
    pub protected_limit: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            data_base: 0x0001_0000,
            protected_limit: 0x800,
        }
    }
}

/// Split a leading `label:` off a line.
fn split_label(text: &str) -> (Option<&str>, &str) {
    match LABEL.captures(text) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            (caps.get(1).map(|m| m.as_str()), text[whole..].trim())
        }
        None => (None, text),
    }
}

#[derive(Debug)]
pub struct Assembler {
    config: AssemblerConfig,
    data: DataSegment,
    labels: IndexMap<String, u32>,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            data: DataSegment::new(config.data_base),
            labels: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Assemble one complete source text. Symbol tables start empty on
    /// every call.
    pub fn assemble(&mut self, source: &str) -> Result<AssembledProgram> {
        self.data = DataSegment::new(self.config.data_base);
        self.labels.clear();

        let segs = split_segments(strip(source));
        self.parse_data(&segs.data)?;

        let (lines, macros) = macros::expand(&segs.text)?;
        debug!(macros = macros.len(), lines = lines.len(), "expanded text segment");

        self.collect_labels(&lines)?;
        let instructions = self.resolve(&lines)?;
        debug!(
            instructions = instructions.len(),
            labels = self.labels.len(),
            variables = self.data.len(),
            "assembled"
        );

        Ok(AssembledProgram {
            data: std::mem::replace(&mut self.data, DataSegment::new(self.config.data_base)),
            text: TextSegment {
                instructions,
                labels: std::mem::take(&mut self.labels),
            },
        })
    }

    fn parse_data(&mut self, lines: &[SourceLine]) -> Result<()> {
        for src in lines {
            let (name, comps) = data::parse_data_line(&src.text).at_line(src.line)?;
            let addr = self.data.define(&name, comps).at_line(src.line)?;
            debug!("variable {name} at {addr:#010x}");
        }
        Ok(())
    }

    /// Pass 1: every line with an instruction advances PC by 4; directives
    /// and bare labels do not.
    fn collect_labels(&mut self, lines: &[SourceLine]) -> Result<()> {
        let mut pc = 0u32;
        for src in lines {
            let (label, rest) = split_label(&src.text);
            if let Some(label) = label {
                if self.labels.contains_key(label) {
                    return Err(Error::from(ErrorKind::DuplicateLabel(label.to_string())).at(src.line));
                }
                self.labels.insert(label.to_string(), pc);
            }
            if !rest.is_empty() && !rest.starts_with('.') {
                pc += 4;
            }
        }
        Ok(())
    }

    /// Pass 2: bind operands and encode each instruction at its PC.
    fn resolve(&self, lines: &[SourceLine]) -> Result<Vec<AssembledInstruction>> {
        let mut pc = 0u32;
        let mut out = Vec::new();
        for src in lines {
            let (_, rest) = split_label(&src.text);
            if rest.is_empty() {
                continue;
            }
            if rest.starts_with('.') {
                debug!(line = src.line, "ignoring directive `{rest}`");
                continue;
            }
            let instruction = self.resolve_line(rest, pc).at_line(src.line)?;
            out.push(AssembledInstruction {
                pc,
                line: src.line,
                source: rest.to_string(),
                instruction,
            });
            pc += 4;
        }
        Ok(out)
    }

    fn resolve_line(&self, text: &str, pc: u32) -> Result<Instruction> {
        let (mnemonic, operands) = text
            .split_once(char::is_whitespace)
            .map(|(m, o)| (m, o.trim()))
            .unwrap_or((text, ""));
        let args = split_operands(operands);
        let (name, args) = match operand::desugar(mnemonic, &args, self)? {
            Some((real, rewritten)) => (real, rewritten),
            None => (mnemonic, args),
        };
        let shape = lookup(name).ok_or_else(|| ErrorKind::UnknownInstruction(name.to_string()))?;
        let ops = operand::bind(shape, &args, pc, self)?;
        let inst = encode(shape, &ops)?;
        inst.to_binary()?;
        Ok(inst)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl SymbolResolver for Assembler {
    fn label(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    fn variable(&self, name: &str) -> Option<u32> {
        self.data.address(name)
    }

    fn protected_limit(&self) -> u32 {
        self.config.protected_limit
    }
}

/// Assemble `source` with a fresh assembler.
pub fn assemble(source: &str, config: AssemblerConfig) -> Result<AssembledProgram> {
    Assembler::new(config).assemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn labels_split_off_including_dotted() {
        assert_eq!(split_label("main: addi x1, x0, 1"), (Some("main"), "addi x1, x0, 1"));
        assert_eq!(split_label(".L1:"), (Some(".L1"), ""));
        assert_eq!(split_label("li a0, ':'"), (None, "li a0, ':'"));
    }

    #[test]
    fn directives_and_labels_do_not_advance_pc() {
        let prog = assemble(
            ".text\n.globl main\nmain:\n  nop\n.L2: nop\nend:\n",
            AssemblerConfig::default(),
        )
        .unwrap();
        assert_eq!(prog.text.labels.get("main"), Some(&0));
        assert_eq!(prog.text.labels.get(".L2"), Some(&4));
        assert_eq!(prog.text.labels.get("end"), Some(&8));
        assert_eq!(prog.text.instructions.len(), 2);
    }

    #[test]
    fn errors_carry_source_line() {
        let err = assemble("nop\n\n  frob x1\n", AssemblerConfig::default()).unwrap_err();
        assert_eq!(err.line, Some(3));
        assert_eq!(err.kind, ErrorKind::UnknownInstruction("frob".into()));
    }

    #[test]
    fn reused_assembler_starts_clean() {
        let mut asm = Assembler::default();
        asm.assemble(".data\nv: .word 1\n.text\nmain: nop\n").unwrap();
        let prog = asm.assemble(".data\nv: .word 2\n.text\nmain: nop\n").unwrap();
        assert_eq!(prog.data.address("v"), Some(0x1_0000));
    }
}
