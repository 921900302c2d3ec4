use minisys_asm::isa::rv32::decode;
use minisys_asm::{assemble, AssemblerConfig};
use pretty_assertions::assert_eq;

fn words(src: &str) -> Vec<u32> {
    assemble(src, AssemblerConfig::default())
        .unwrap()
        .text
        .words()
        .unwrap()
}

fn hex(src: &str) -> Vec<String> {
    assemble(src, AssemblerConfig::default())
        .unwrap()
        .text
        .instructions
        .iter()
        .map(|i| i.instruction.to_hex().unwrap())
        .collect()
}

#[test]
fn r_type_and_m_extension() {
    assert_eq!(
        hex("add x1, x2, x3\nsub x1, x2, x3\nmul x1, x2, x3\ndiv x5, x6, x7\n"),
        vec!["003100B3", "403100B3", "023100B3", "027342B3"]
    );
}

#[test]
fn immediate_forms() {
    assert_eq!(
        words(
            "addi x1, x0, -1\n\
             addi a0, zero, 5\n\
             srai x1, x2, 3\n\
             lui x5, 0x12345\n\
             lw x1, 4(x2)\n\
             sw x5, 8(x2)\n\
             ecall\n\
             ebreak\n"
        ),
        vec![
            0xFFF0_0093,
            0x0050_0513,
            0x4031_5093,
            0x1234_52B7,
            0x0041_2083,
            0x0051_2423,
            0x0000_0073,
            0x0010_0073,
        ]
    );
}

#[test]
fn hex_literals_truncate_decimal_literals_do_not() {
    let w = words("addi x1, x0, 0x1FFF\n");
    assert_eq!(decode(w[0]).imm_i, -1);
    assert!(assemble("addi x1, x0, 2048\n", AssemblerConfig::default()).is_err());
    assert!(assemble("addi x1, x0, 0b100000000000\n", AssemblerConfig::default()).is_err());
}

#[test]
fn split_immediates_place_every_bit() {
    // literal targets are byte offsets at both ends of each range
    let w = words("beq x1, x2, 0x7FE\nbne x1, x2, -0x800\njal x0, 0xFFFFE\njal x0, -0x100000\n");
    assert_eq!(decode(w[0]).imm_b, 0x7FE);
    assert_eq!(decode(w[1]).imm_b, -0x800);
    assert_eq!(decode(w[2]).imm_j, 0xFFFFE);
    assert_eq!(decode(w[3]).imm_j, -0x10_0000);
}

#[test]
fn registers_accept_aliases_and_dollar_prefix() {
    assert_eq!(words("add $t0, sp, fp\n"), words("add x5, x2, x8\n"));
}

#[test]
fn char_literal_containing_comment_marker() {
    let w = words("li a0, '#'  # load a hash\n");
    assert_eq!(decode(w[0]).imm_i, '#' as i32);
}
