use serde::Serialize;

use crate::error::{ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegionKind {
    Firmware,
    User,
    Interrupt,
}

impl RegionKind {
    pub fn name(self) -> &'static str {
        match self {
            RegionKind::Firmware => "Firmware",
            RegionKind::User => "User",
            RegionKind::Interrupt => "Interrupt",
        }
    }
}

/// A word-aligned byte range of the instruction memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub kind: RegionKind,
    pub base: u32,
    pub size: u32,
}

impl Region {
    pub fn end(&self) -> u32 {
        self.base + self.size
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end()
    }
}

/// Whole instruction address space as 32-bit words, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryImage {
    words: Vec<u32>,
    regions: Vec<Region>,
}

impl MemoryImage {
    pub fn new(total_size: u32, regions: Vec<Region>) -> Self {
        Self {
            words: vec![0; (total_size / 4) as usize],
            regions,
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    pub fn word(&self, addr: u32) -> Option<u32> {
        self.words.get((addr / 4) as usize).copied()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, kind: RegionKind) -> Option<Region> {
        self.regions.iter().copied().find(|r| r.kind == kind)
    }

    pub fn region_words(&self, kind: RegionKind) -> &[u32] {
        match self.region(kind) {
            Some(r) => &self.words[(r.base / 4) as usize..(r.end() / 4) as usize],
            None => &[],
        }
    }

    /// Copy `words` to the start of a region.
    pub(crate) fn load_region(&mut self, kind: RegionKind, words: &[u32]) -> Result<()> {
        let region = self
            .region(kind)
            .ok_or_else(|| ErrorKind::InvalidLayout(format!("no {} region", kind.name())))?;
        if words.len() * 4 > region.size as usize {
            return Err(ErrorKind::RegionOverflow {
                region: kind.name(),
                size: words.len() * 4,
                limit: region.size as usize,
            }
            .into());
        }
        let start = (region.base / 4) as usize;
        self.words[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Lower-case 8-digit hex, one entry per word.
    pub fn to_hex_lines(&self) -> Vec<String> {
        self.words.iter().map(|w| format!("{w:08x}")).collect()
    }
}

/// Output of a link: the instruction image and the flattened data bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedImage {
    pub memory: MemoryImage,
    pub data: Vec<u8>,
}
