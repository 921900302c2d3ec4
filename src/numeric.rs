//! Literal parsing and fixed-width bit-string helpers.
//!
//! Bit strings are MSB-first: index 0 holds the most significant bit, which
//! matches how instruction fields are written in the ISA manual.

use bitvec::prelude::*;

use crate::error::{Error, ErrorKind, Result};

pub type Bits = BitVec<u32, Msb0>;
pub type BitsRef = BitSlice<u32, Msb0>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Dec,
    Hex,
    Bin,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub value: i64,
    pub radix: Radix,
}

fn invalid(text: &str) -> Error {
    ErrorKind::InvalidLiteral(text.to_string()).into()
}

/// Parse a decimal, `0x` hex, `0b` binary or `'c'` character literal.
pub fn parse_literal(text: &str) -> Result<Literal> {
    let t = text.trim();
    if let Some(inner) = t.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        let decoded = unescape(inner).map_err(|_| invalid(text))?;
        let mut chars = decoded.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Literal { value: c as i64, radix: Radix::Char }),
            _ => Err(invalid(text)),
        };
    }

    let (negative, body) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let (radix, digits, base) = if let Some(h) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (Radix::Hex, h, 16)
    } else if let Some(b) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (Radix::Bin, b, 2)
    } else {
        (Radix::Dec, body, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(base)) {
        return Err(invalid(text));
    }
    let magnitude = u64::from_str_radix(digits, base).map_err(|_| invalid(text))?;
    let value = match radix {
        // Hex patterns are bit patterns; wide ones are reinterpreted, not rejected.
        Radix::Hex => magnitude as i64,
        _ => i64::try_from(magnitude).map_err(|_| invalid(text))?,
    };
    let value = if negative { value.wrapping_neg() } else { value };
    Ok(Literal { value, radix })
}

pub fn is_literal(text: &str) -> bool {
    parse_literal(text).is_ok()
}

/// Inclusive bounds of a `width`-bit field.
pub fn field_range(width: usize, signed: bool) -> (i64, i64) {
    if signed {
        (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1)
    } else {
        (0, (1i64 << width) - 1)
    }
}

/// Low `width` bits of `value` in two's complement, MSB first.
pub fn int_to_bits(value: i64, width: usize) -> Bits {
    (0..width).rev().map(|i| (value >> i) & 1 == 1).collect()
}

/// Range-check an already computed integer and convert it to a bit string.
/// `source` names the value in the error message.
pub fn value_to_bits(value: i64, width: usize, signed: bool, source: &str) -> Result<Bits> {
    let (min, max) = field_range(width, signed);
    if value < min || value > max {
        return Err(ErrorKind::LiteralOutOfRange {
            literal: source.to_string(),
            width,
            min,
            max,
        }
        .into());
    }
    Ok(int_to_bits(value, width))
}

/// Convert a literal token to a `width`-bit string.
///
/// Hex literals truncate to the low `width` bits; every other radix must fit
/// the signed or unsigned range of the field.
pub fn literal_to_bits(text: &str, width: usize, signed: bool) -> Result<Bits> {
    let lit = parse_literal(text)?;
    if lit.radix == Radix::Hex {
        return Ok(int_to_bits(lit.value, width));
    }
    value_to_bits(lit.value, width, signed, text.trim())
}

pub fn bits_to_int(bits: &BitsRef, signed: bool) -> i64 {
    let raw = bits.iter().fold(0i64, |acc, b| (acc << 1) | *b as i64);
    match bits.first() {
        Some(msb) if signed && *msb => raw - (1i64 << bits.len()),
        _ => raw,
    }
}

#[inline]
pub fn sign_extend(v: u32, bits: u32) -> i32 {
    let s = 32 - bits;
    ((v << s) as i32) >> s
}

pub fn bits_to_string(bits: &BitsRef) -> String {
    bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
}

/// Render a bit string as upper-case hex, one digit per nibble.
pub fn bits_to_hex(bits: &BitsRef) -> Result<String> {
    if bits.len() % 4 != 0 {
        return Err(ErrorKind::UnalignedBits(bits.len()).into());
    }
    Ok(bits
        .chunks(4)
        .map(|nibble| {
            let v = bits_to_int(nibble, false) as u32;
            std::char::from_digit(v, 16).unwrap_or('0').to_ascii_uppercase()
        })
        .collect())
}

/// Resolve backslash escapes inside a string or character literal.
pub fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            _ => return Err(invalid(raw)),
        }
    }
    Ok(out)
}
