//! Composes firmware, user program and interrupt handler into one image.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembler::{AssembledProgram, Assembler, AssemblerConfig, DataSegment, TextSegment};
use crate::error::{AtLine, Error, ErrorKind, Result};
use crate::isa::rv32::decode;
use crate::memory::{LinkedImage, MemoryImage, Region, RegionKind};
use crate::numeric::value_to_bits;

pub const FIRMWARE_FILE: &str = "minisys-bios.asm";
pub const INTERRUPT_FILES: [&str; 2] = ["minisys-interrupt-entry.asm", "minisys-interrupt-handler.asm"];

/// Word written to unused firmware slots.
pub const NOP: u32 = 0x0000_0000;

const JAL_OPCODE: u32 = 0b110_1111;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLayout {
    pub firmware_size: u32,
    pub user_base: u32,
    pub user_size: u32,
    pub int_base: u32,
    pub int_size: u32,
    pub total_size: u32,
    /// Cap on the flattened data image, in bytes.
    pub data_limit: u32,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            firmware_size: 0x0000_0800,
            user_base: 0x0000_0800,
            user_size: 0x0000_E800,
            int_base: 0x0000_F000,
            int_size: 0x0000_1000,
            total_size: 0x0001_0000,
            data_limit: 0x0010_0000,
        }
    }
}

impl MemoryLayout {
    pub fn from_json(text: &str) -> Result<Self> {
        let layout: Self =
            serde_json::from_str(text).map_err(|e| ErrorKind::InvalidLayout(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn regions(&self) -> Vec<Region> {
        vec![
            Region { kind: RegionKind::Firmware, base: 0, size: self.firmware_size },
            Region { kind: RegionKind::User, base: self.user_base, size: self.user_size },
            Region { kind: RegionKind::Interrupt, base: self.int_base, size: self.int_size },
        ]
    }

    /// Regions must be word-aligned, ordered, non-overlapping and inside
    /// the total size, with the user region directly after the firmware.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("firmware_size", self.firmware_size),
            ("user_base", self.user_base),
            ("user_size", self.user_size),
            ("int_base", self.int_base),
            ("int_size", self.int_size),
            ("total_size", self.total_size),
        ];
        if let Some((name, v)) = fields.iter().find(|(_, v)| v % 4 != 0) {
            return Err(ErrorKind::InvalidLayout(format!("{name} {v:#x} is not word-aligned")).into());
        }
        if self.user_base != self.firmware_size {
            return Err(ErrorKind::InvalidLayout(format!(
                "user region starts at {:#x} but firmware ends at {:#x}",
                self.user_base, self.firmware_size
            ))
            .into());
        }
        // Regions are stored in address order; each must end before the next begins.
        let regions = self.regions();
        let limits = regions
            .iter()
            .skip(1)
            .map(|r| r.base)
            .chain(std::iter::once(self.total_size));
        for (region, limit) in regions.iter().zip(limits) {
            let end = region.base as u64 + region.size as u64;
            if end > limit as u64 {
                return Err(ErrorKind::RegionOverflow {
                    region: region.kind.name(),
                    size: region.size as usize,
                    limit: limit.saturating_sub(region.base) as usize,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Firmware and interrupt-handler sources. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    pub firmware: Option<String>,
    pub interrupt: Option<String>,
}

fn read_asset(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "asset unavailable, region stays zero-filled");
            None
        }
    }
}

impl Assets {
    /// Read the firmware file and the interrupt-handler parts, which are
    /// concatenated in order. A missing part drops the whole handler.
    pub fn load(firmware: Option<&Path>, interrupt: &[PathBuf]) -> Self {
        let firmware = firmware.and_then(read_asset);
        let parts: Vec<String> = interrupt.iter().filter_map(|p| read_asset(p)).collect();
        let interrupt = (!parts.is_empty() && parts.len() == interrupt.len()).then(|| parts.join("\n"));
        Self { firmware, interrupt }
    }

    /// Look up the conventional asset file names inside `dir`.
    pub fn from_dir(dir: &Path) -> Self {
        let interrupt = INTERRUPT_FILES.map(|f| dir.join(f));
        Self::load(Some(&dir.join(FIRMWARE_FILE)), &interrupt)
    }
}

/// Encode `jal rd, offset` directly from its bit layout.
fn jal_word(rd: u8, offset: i64) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32 & 0x1F) << 7)
        | JAL_OPCODE
}

/// `jal ra, target` placed at address 0.
pub fn entry_jump(target: u32) -> Result<u32> {
    value_to_bits(target as i64 / 2, 20, true, "main")?;
    Ok(jal_word(1, target as i64))
}

/// Data bytes in address order, big-endian.
pub fn flatten_data(data: &DataSegment, limit: usize) -> Result<Vec<u8>> {
    let size = data.size() as usize;
    if size > limit {
        return Err(ErrorKind::DataSegmentTooLarge { size, limit }.into());
    }
    let mut bytes = Vec::with_capacity(size);
    for (_, _, comps) in data.iter() {
        for comp in comps {
            bytes.extend(comp.to_bytes()?);
        }
    }
    Ok(bytes)
}

fn physical_labels(region: Region, text: &TextSegment) -> IndexMap<String, u32> {
    text.labels
        .iter()
        .map(|(name, off)| (name.clone(), region.base + off))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Linker {
    layout: MemoryLayout,
    config: AssemblerConfig,
}

impl Linker {
    pub fn new(layout: MemoryLayout, config: AssemblerConfig) -> Result<Self> {
        layout.validate()?;
        Ok(Self { layout, config })
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    fn region(&self, kind: RegionKind) -> Region {
        self.layout
            .regions()
            .into_iter()
            .find(|r| r.kind == kind)
            .unwrap_or(Region { kind, base: 0, size: 0 })
    }

    /// Assemble an optional asset on its own; any failure degrades to `None`.
    fn assemble_asset(&self, kind: RegionKind, source: Option<&str>) -> Option<AssembledProgram> {
        let source = source?;
        let limit = self.region(kind).size as usize;
        match Assembler::new(self.config).assemble(source) {
            Ok(p) if p.text.size() <= limit => {
                debug!(region = kind.name(), instructions = p.text.instructions.len(), "asset assembled");
                Some(p)
            }
            Ok(p) => {
                warn!(region = kind.name(), size = p.text.size(), limit, "asset too large, region stays zero-filled");
                None
            }
            Err(e) => {
                warn!(region = kind.name(), error = %e, "asset failed to assemble, region stays zero-filled");
                None
            }
        }
    }

    /// Patch external `jal` placeholders against other regions' labels.
    /// `strict` turns an unresolved symbol into an error instead of a warning.
    fn relocate(
        &self,
        region: Region,
        text: &TextSegment,
        words: &mut [u32],
        tables: &[&IndexMap<String, u32>],
        strict: bool,
    ) -> Result<()> {
        for (inst, symbol) in text.externals() {
            let addr = region.base + inst.pc;
            let idx = (inst.pc / 4) as usize;
            match tables.iter().find_map(|t| t.get(symbol).copied()) {
                Some(target) => {
                    let offset = target as i64 - addr as i64;
                    value_to_bits(offset / 2, 20, true, symbol).at_line(inst.line)?;
                    words[idx] = jal_word(decode(words[idx]).rd, offset);
                    debug!(symbol, "relocated jump at {addr:#010x} to {target:#010x}");
                }
                None if strict => {
                    return Err(Error::from(ErrorKind::UnresolvedExternal {
                        symbol: symbol.to_string(),
                        addr,
                    })
                    .at(inst.line));
                }
                None => warn!(region = region.kind.name(), symbol, "unresolved external jump left as placeholder"),
            }
        }
        Ok(())
    }

    /// Link a user program with the firmware and interrupt-handler assets.
    pub fn link(&self, program: &AssembledProgram, assets: &Assets) -> Result<LinkedImage> {
        let user = self.region(RegionKind::User);
        let size = program.text.size();
        if size > user.size as usize {
            return Err(ErrorKind::ProgramTooLarge { size, limit: user.size as usize }.into());
        }

        let fw_region = self.region(RegionKind::Firmware);
        let int_region = self.region(RegionKind::Interrupt);
        let firmware = self.assemble_asset(RegionKind::Firmware, assets.firmware.as_deref());
        let interrupt = self.assemble_asset(RegionKind::Interrupt, assets.interrupt.as_deref());

        let empty = IndexMap::new();
        let entry = program.text.labels.get("main").copied();
        let user_syms = physical_labels(user, &program.text);
        // the entry patch blanks the firmware, so its labels are not exported
        let fw_syms = firmware
            .as_ref()
            .filter(|_| entry.is_none())
            .map(|p| physical_labels(fw_region, &p.text));
        let int_syms = interrupt.as_ref().map(|p| physical_labels(int_region, &p.text));
        let fw_syms = fw_syms.as_ref().unwrap_or(&empty);
        let int_syms = int_syms.as_ref().unwrap_or(&empty);

        let mut memory = MemoryImage::new(self.layout.total_size, self.layout.regions());

        let mut words = program.text.words()?;
        self.relocate(user, &program.text, &mut words, &[int_syms, fw_syms], true)?;
        memory.load_region(RegionKind::User, &words)?;

        if let Some(p) = &interrupt {
            let mut words = p.text.words()?;
            self.relocate(int_region, &p.text, &mut words, &[&user_syms, fw_syms], false)?;
            memory.load_region(RegionKind::Interrupt, &words)?;
        }

        match entry {
            Some(main) => {
                let target = self.layout.firmware_size + main;
                let mut words = vec![NOP; (fw_region.size / 4) as usize];
                if let Some(first) = words.first_mut() {
                    *first = entry_jump(target)?;
                    info!("firmware entry patched: jal ra, {target:#010x} ({first:08x})");
                }
                memory.load_region(RegionKind::Firmware, &words)?;
            }
            None => {
                if let Some(p) = &firmware {
                    let mut words = p.text.words()?;
                    self.relocate(fw_region, &p.text, &mut words, &[&user_syms, int_syms], false)?;
                    memory.load_region(RegionKind::Firmware, &words)?;
                }
            }
        }

        let data = flatten_data(&program.data, self.layout.data_limit as usize)?;
        info!(
            user_bytes = size,
            data_bytes = data.len(),
            firmware = firmware.is_some(),
            interrupt = interrupt.is_some(),
            "linked"
        );
        Ok(LinkedImage { memory, data })
    }

    /// Image holding only an assembled firmware program.
    pub fn link_firmware(&self, firmware: &AssembledProgram) -> Result<LinkedImage> {
        let mut memory = MemoryImage::new(self.layout.total_size, self.layout.regions());
        memory.load_region(RegionKind::Firmware, &firmware.text.words()?)?;
        let data = flatten_data(&firmware.data, self.layout.data_limit as usize)?;
        Ok(LinkedImage { memory, data })
    }
}

impl Default for Linker {
    fn default() -> Self {
        Self {
            layout: MemoryLayout::default(),
            config: AssemblerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn jal_word_matches_isa_layout() {
        // jal ra, 0x820
        let word = jal_word(1, 0x820);
        let d = decode(word);
        assert_eq!((d.opcode, d.rd, d.imm_j), (JAL_OPCODE, 1, 0x820));
        // backward jump
        assert_eq!(decode(jal_word(0, -8)).imm_j, -8);
    }

    #[test]
    fn default_layout_is_valid() {
        MemoryLayout::default().validate().unwrap();
    }

    #[test]
    fn layout_rejects_overlap_and_misalignment() {
        let layout = MemoryLayout { user_size: 0xF000, ..Default::default() };
        assert!(matches!(
            layout.validate().unwrap_err().kind,
            ErrorKind::RegionOverflow { region: "User", .. }
        ));
        let layout = MemoryLayout { int_size: 0x2000, ..Default::default() };
        assert!(matches!(
            layout.validate().unwrap_err().kind,
            ErrorKind::RegionOverflow { region: "Interrupt", .. }
        ));
        let layout = MemoryLayout { user_base: 0x802, ..Default::default() };
        assert!(matches!(layout.validate().unwrap_err().kind, ErrorKind::InvalidLayout(_)));
    }

    #[test]
    fn layout_from_json_fills_defaults() {
        let layout = MemoryLayout::from_json(r#"{ "data_limit": 16 }"#).unwrap();
        assert_eq!(layout.data_limit, 16);
        assert_eq!(layout.user_size, 0xE800);
        assert!(MemoryLayout::from_json("{ nope").is_err());
    }
}
