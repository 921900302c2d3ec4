pub mod assembler;
pub mod error;
pub mod instructions;
pub mod linker;
pub mod listing;
pub mod memory;
pub mod numeric;
pub mod register;

pub mod isa {
    pub mod rv32; // RV32I base with the M extension
}

pub use assembler::{assemble, AssembledProgram, Assembler, AssemblerConfig};
pub use error::{Category, Error, ErrorKind, Result};
pub use linker::{Assets, Linker, MemoryLayout};
pub use memory::{LinkedImage, MemoryImage, Region, RegionKind};
pub use register::Register;
