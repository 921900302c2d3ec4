//! Text renderings of a linked image for FPGA block-RAM init and serial boot.

use std::path::{Path, PathBuf};

pub const COE_HEADER: &str = "memory_initialization_radix=16;\nmemory_initialization_vector=\n";
pub const SERIAL_PROGRAM_HANDSHAKE: &str = "03020000";
pub const SERIAL_DATA_HANDSHAKE: &str = "03030000";
/// Start marker used for user-program HEX files.
pub const HEX_START: &str = "@00000800";

/// Pack bytes into big-endian words, zero-padding the last one.
pub fn pack_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_be_bytes(word)
        })
        .collect()
}

fn hex_words(words: &[u32]) -> impl Iterator<Item = String> + '_ {
    words.iter().map(|w| format!("{w:08x}"))
}

/// COE file body: header, then one word per line with no trailing newline.
pub fn coe(words: &[u32]) -> String {
    let mut out = String::from(COE_HEADER);
    out.push_str(&hex_words(words).collect::<Vec<_>>().join("\n"));
    out
}

/// `$readmemh`-style listing: start marker, program words with trailing
/// zero words dropped, then data words. `skip` drops leading program words.
pub fn hex(program: &[u32], data: &[u32], start: &str, skip: usize) -> String {
    let program = program.get(skip..).unwrap_or(&[]);
    let used = program.iter().rposition(|&w| w != 0).map_or(0, |i| i + 1);
    std::iter::once(start.to_string())
        .chain(hex_words(&program[..used]))
        .chain(hex_words(data))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serial-boot stream: program handshake and words, then the data
/// handshake and words when there is data.
pub fn serial(program: &[u32], data: &[u32]) -> String {
    let mut lines = vec![SERIAL_PROGRAM_HANDSHAKE.to_string()];
    lines.extend(hex_words(program));
    if !data.is_empty() {
        lines.push(SERIAL_DATA_HANDSHAKE.to_string());
        lines.extend(hex_words(data));
    }
    lines.join("\n")
}

/// Where one run writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub text_coe: PathBuf,
    pub data_coe: PathBuf,
    pub serial: PathBuf,
    pub hex: PathBuf,
}

impl OutputPaths {
    /// `{stem}_text.coe`, `{stem}_data.coe`, `{stem}_serial.txt`, `{stem}.hex`.
    pub fn for_input(input: &Path, out_dir: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        Self::with_stem(&stem, out_dir)
    }

    pub fn firmware(out_dir: &Path) -> Self {
        Self::with_stem("bios", out_dir)
    }

    fn with_stem(stem: &str, out_dir: &Path) -> Self {
        Self {
            text_coe: out_dir.join(format!("{stem}_text.coe")),
            data_coe: out_dir.join(format!("{stem}_data.coe")),
            serial: out_dir.join(format!("{stem}_serial.txt")),
            hex: out_dir.join(format!("{stem}.hex")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn data_bytes_pack_big_endian_with_padding() {
        assert_eq!(pack_words(&[1, 2, 3, 4, 5]), vec![0x0102_0304, 0x0500_0000]);
        assert!(pack_words(&[]).is_empty());
    }

    #[test]
    fn coe_has_header_and_no_trailing_newline() {
        assert_eq!(
            coe(&[0x003100b3, 0]),
            "memory_initialization_radix=16;\nmemory_initialization_vector=\n003100b3\n00000000"
        );
        assert_eq!(coe(&[]), COE_HEADER);
    }

    #[test]
    fn hex_strips_trailing_zero_words() {
        let out = hex(&[0xdead, 0, 0xbeef, 0, 0], &[0x41424300], HEX_START, 0);
        assert_eq!(out, "@00000800\n0000dead\n00000000\n0000beef\n41424300");
        assert_eq!(hex(&[1, 2], &[], "@00000000", 1), "@00000000\n00000002");
        assert_eq!(hex(&[1], &[], "@00000000", 5), "@00000000");
    }

    #[test]
    fn serial_adds_data_handshake_only_with_data() {
        assert_eq!(serial(&[1], &[]), "03020000\n00000001");
        assert_eq!(serial(&[1], &[2]), "03020000\n00000001\n03030000\n00000002");
    }

    #[test]
    fn output_names_follow_input_stem() {
        let paths = OutputPaths::for_input(Path::new("src/prog.asm"), Path::new("out"));
        assert_eq!(paths.text_coe, Path::new("out/prog_text.coe"));
        assert_eq!(paths.hex, Path::new("out/prog.hex"));
        assert_eq!(OutputPaths::firmware(Path::new(".")).serial, Path::new("./bios_serial.txt"));
    }
}
