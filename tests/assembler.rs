use minisys_asm::isa::rv32::decode;
use minisys_asm::{assemble, Assembler, AssemblerConfig, Category, ErrorKind};
use pretty_assertions::assert_eq;

const PROGRAM: &str = r#"
# counts down from ten
.data
msg:   .asciiz "done\n"
count: .word 10
.text
main:
    li   t0, 10
loop:
    addi t0, t0, -1
    bne  t0, zero, loop
    jal  ra, finish
    nop
finish:
    ret
"#;

fn cfg() -> AssemblerConfig {
    AssemblerConfig::default()
}

#[test]
fn assembling_twice_gives_identical_programs() {
    let mut asm = Assembler::default();
    let first = asm.assemble(PROGRAM).unwrap();
    let second = asm.assemble(PROGRAM).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, assemble(PROGRAM, cfg()).unwrap());
}

#[test]
fn labels_and_variables_are_laid_out() {
    let prog = assemble(PROGRAM, cfg()).unwrap();
    let labels: Vec<(&str, u32)> = prog.text.labels.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(labels, vec![("main", 0), ("loop", 4), ("finish", 20)]);
    assert_eq!(prog.data.address("msg"), Some(0x1_0000));
    assert_eq!(prog.data.address("count"), Some(0x1_0006));
    assert_eq!(prog.text.size(), 24);
}

#[test]
fn backward_branch_is_negative_and_halved() {
    let prog = assemble(PROGRAM, cfg()).unwrap();
    let words = prog.text.words().unwrap();
    // bne at 8 targets loop at 4
    assert_eq!(decode(words[2]).imm_b, -4);
    // jal at 12 targets finish at 20
    let jal = decode(words[3]);
    assert_eq!((jal.rd, jal.imm_j), (1, 8));
    assert!(prog.text.externals().next().is_none());
}

#[test]
fn lines_before_any_segment_directive_are_text() {
    let prog = assemble("addi x1, x0, 1\n", cfg()).unwrap();
    assert_eq!(prog.text.instructions.len(), 1);
    assert!(prog.data.is_empty());
}

#[test]
fn unknown_jump_target_is_left_for_the_linker() {
    let prog = assemble("main: jal ra, print\n", cfg()).unwrap();
    let externals: Vec<&str> = prog.text.externals().map(|(_, sym)| sym).collect();
    assert_eq!(externals, vec!["print"]);
    assert_eq!(decode(prog.text.words().unwrap()[0]).imm_j, 0);
}

#[test]
fn variables_resolve_to_absolute_addresses() {
    let config = AssemblerConfig { data_base: 0x400, ..cfg() };
    let prog = assemble(".data\nv: .word 7\n.text\nla a0, v\nlw a1, v(zero)\nlw a2, 0(a0)\n", config).unwrap();
    let words = prog.text.words().unwrap();
    assert_eq!(decode(words[0]).imm_i, 0x400);
    assert_eq!(decode(words[1]).imm_i, 0x400);

    let err = assemble(".data\nv: .word 7\n.text\nla a0, v\n", cfg()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LiteralOutOfRange { width: 12, .. }));
}

#[test]
fn errors_report_line_and_category() {
    let cases: &[(&str, usize, Category)] = &[
        ("nop\nbeq x1, x2, nowhere\n", 2, Category::UndefinedReference),
        ("a: nop\na: nop\n", 2, Category::DuplicateDefinition),
        ("\n\nadd x1, x2, x99\n", 3, Category::UnknownSymbol),
        ("add x1, x2\n", 1, Category::Syntax),
        ("addi x1, x0, 4096\n", 1, Category::Range),
        (".data\nx: .word 1\nx: .word 2\n", 3, Category::DuplicateDefinition),
        (".data\nx: .float 1\n", 2, Category::UnknownSymbol),
        ("lw x1, missing\n", 1, Category::UndefinedReference),
    ];
    for (src, line, category) in cases {
        let err = assemble(src, cfg()).unwrap_err();
        assert_eq!((err.line, err.category()), (Some(*line), *category), "{src:?}: {err}");
    }
}

#[test]
fn error_display_includes_line() {
    let err = assemble("nop\nfrob x1\n", cfg()).unwrap_err();
    assert_eq!(err.to_string(), "line 2: Unknown instruction: frob");
}

#[test]
fn case_insensitive_mnemonics_and_directives() {
    let upper = assemble(".TEXT\nADD X1, X2, X3\n", cfg()).unwrap();
    let lower = assemble(".text\nadd x1, x2, x3\n", cfg()).unwrap();
    assert_eq!(upper.text.words().unwrap(), vec![0x0031_00B3]);
    assert_eq!(upper.text.words().unwrap(), lower.text.words().unwrap());
}

#[test]
fn loop_branch_offset_is_minus_two_units() {
    let prog = assemble("loop: addi x4, x4, 1\nbne x4, x0, loop\n", cfg()).unwrap();
    let bne = decode(prog.text.words().unwrap()[1]);
    assert_eq!(bne.imm_b / 2, -2);
    assert_eq!((bne.rs1, bne.rs2, bne.funct3), (4, 0, 0b001));
}

#[test]
fn add_decodes_to_its_operands() {
    let prog = assemble("add x1, x2, x3\n", cfg()).unwrap();
    let d = decode(prog.text.words().unwrap()[0]);
    assert_eq!(
        (d.opcode, d.rd, d.funct3, d.rs1, d.rs2, d.funct7),
        (0b011_0011, 1, 0, 2, 3, 0)
    );
}
