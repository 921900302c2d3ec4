use indexmap::IndexMap;

use crate::error::Result;
use crate::isa::rv32::Instruction;

use super::data::DataSegment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledInstruction {
    /// Byte address relative to the start of the text segment.
    pub pc: u32,
    pub line: usize,
    pub source: String,
    pub instruction: Instruction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSegment {
    pub instructions: Vec<AssembledInstruction>,
    pub labels: IndexMap<String, u32>,
}

impl TextSegment {
    pub fn size(&self) -> usize {
        self.instructions.len() * 4
    }

    pub fn words(&self) -> Result<Vec<u32>> {
        self.instructions.iter().map(|i| i.instruction.to_word()).collect()
    }

    /// Instructions whose jump target was left for the linker.
    pub fn externals(&self) -> impl Iterator<Item = (&AssembledInstruction, &str)> + '_ {
        self.instructions
            .iter()
            .filter_map(|i| i.instruction.external_label.as_deref().map(|sym| (i, sym)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledProgram {
    pub data: DataSegment,
    pub text: TextSegment,
}
