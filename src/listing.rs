use std::fmt::Write;

use crate::assembler::AssembledProgram;

/// Human-readable listing: label lines interleaved with
/// `[pc] WORD  source` for each instruction.
pub fn render(program: &AssembledProgram) -> String {
    let text = &program.text;
    let mut out = String::new();
    for inst in &text.instructions {
        for (label, _) in text.labels.iter().filter(|&(_, &pc)| pc == inst.pc) {
            let _ = writeln!(out, "{label}:");
        }
        let word = inst
            .instruction
            .to_hex()
            .unwrap_or_else(|_| "????????".to_string());
        let _ = writeln!(out, "[{:08x}] {word}  {}", inst.pc, inst.source);
    }
    // labels at the end of the segment
    for (label, _) in text.labels.iter().filter(|&(_, &pc)| pc as usize >= text.size()) {
        let _ = writeln!(out, "{label}:");
    }
    for (name, addr, comps) in program.data.iter() {
        let bytes: u32 = comps.iter().map(|c| c.size()).sum();
        let _ = writeln!(out, "[{addr:08x}] {name} ({bytes} bytes)");
    }
    out
}
