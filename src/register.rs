use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{ErrorKind, Result};

/// RV32 integer registers with their ABI aliases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Register {
    #[strum(to_string = "x0", serialize = "zero")]
    Zero = 0,
    #[strum(to_string = "x1", serialize = "ra")]
    Ra,
    #[strum(to_string = "x2", serialize = "sp")]
    Sp,
    #[strum(to_string = "x3", serialize = "gp")]
    Gp,
    #[strum(to_string = "x4", serialize = "tp")]
    Tp,
    #[strum(to_string = "x5", serialize = "t0")]
    T0,
    #[strum(to_string = "x6", serialize = "t1")]
    T1,
    #[strum(to_string = "x7", serialize = "t2")]
    T2,
    #[strum(to_string = "x8", serialize = "s0", serialize = "fp")]
    S0,
    #[strum(to_string = "x9", serialize = "s1")]
    S1,
    #[strum(to_string = "x10", serialize = "a0")]
    A0,
    #[strum(to_string = "x11", serialize = "a1")]
    A1,
    #[strum(to_string = "x12", serialize = "a2")]
    A2,
    #[strum(to_string = "x13", serialize = "a3")]
    A3,
    #[strum(to_string = "x14", serialize = "a4")]
    A4,
    #[strum(to_string = "x15", serialize = "a5")]
    A5,
    #[strum(to_string = "x16", serialize = "a6")]
    A6,
    #[strum(to_string = "x17", serialize = "a7")]
    A7,
    #[strum(to_string = "x18", serialize = "s2")]
    S2,
    #[strum(to_string = "x19", serialize = "s3")]
    S3,
    #[strum(to_string = "x20", serialize = "s4")]
    S4,
    #[strum(to_string = "x21", serialize = "s5")]
    S5,
    #[strum(to_string = "x22", serialize = "s6")]
    S6,
    #[strum(to_string = "x23", serialize = "s7")]
    S7,
    #[strum(to_string = "x24", serialize = "s8")]
    S8,
    #[strum(to_string = "x25", serialize = "s9")]
    S9,
    #[strum(to_string = "x26", serialize = "s10")]
    S10,
    #[strum(to_string = "x27", serialize = "s11")]
    S11,
    #[strum(to_string = "x28", serialize = "t3")]
    T3,
    #[strum(to_string = "x29", serialize = "t4")]
    T4,
    #[strum(to_string = "x30", serialize = "t5")]
    T5,
    #[strum(to_string = "x31", serialize = "t6")]
    T6,
}

impl Register {
    /// Accepts `x5`, `t0`, `$t0`, or a bare index such as `5`.
    pub fn parse(token: &str) -> Result<Self> {
        let name = token.trim();
        let name = name.strip_prefix('$').unwrap_or(name);
        if let Ok(idx) = name.parse::<u8>() {
            return Self::from_index(idx).ok_or_else(|| ErrorKind::UnknownRegister(token.to_string()).into());
        }
        name.parse::<Self>()
            .map_err(|_| ErrorKind::UnknownRegister(token.to_string()).into())
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().nth(idx as usize)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn is_zero(self) -> bool {
        self == Register::Zero
    }
}

/// Resolve a register token to its 5-bit code.
pub fn register_to_bits(token: &str) -> Result<u32> {
    Register::parse(token).map(|r| r.index() as u32)
}
