use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{ErrorKind, Result};
use crate::numeric::{literal_to_bits, parse_literal, unescape, Radix};

use super::source::split_operands;

static VAR_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$").expect("valid regex"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"(.*)"$"#).expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataKind {
    Byte,
    Half,
    Word,
    Asciiz,
    Space,
}

impl DataKind {
    /// Bit width of one numeric value, or `None` for non-numeric kinds.
    pub fn width(self) -> Option<usize> {
        match self {
            Self::Byte => Some(8),
            Self::Half => Some(16),
            Self::Word => Some(32),
            Self::Asciiz | Self::Space => None,
        }
    }

    pub fn from_directive(directive: &str) -> Option<Self> {
        match directive.to_ascii_lowercase().as_str() {
            ".byte" => Some(Self::Byte),
            ".half" => Some(Self::Half),
            ".word" => Some(Self::Word),
            ".asciiz" => Some(Self::Asciiz),
            ".space" => Some(Self::Space),
            _ => None,
        }
    }
}

/// One value of a data directive. `value` holds the literal text for
/// numeric kinds, the unescaped string for `asciiz`, and the count for `space`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataComponent {
    pub kind: DataKind,
    pub value: String,
}

impl DataComponent {
    pub fn size(&self) -> u32 {
        match self.kind {
            DataKind::Byte => 1,
            DataKind::Half => 2,
            DataKind::Word => 4,
            DataKind::Asciiz => self.value.len() as u32 + 1,
            DataKind::Space => self.value.parse().unwrap_or(0),
        }
    }

    /// Big-endian bytes of this component. Numeric values keep their low bits.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(match self.kind {
            DataKind::Byte => vec![parse_literal(&self.value)?.value as u8],
            DataKind::Half => (parse_literal(&self.value)?.value as u16).to_be_bytes().to_vec(),
            DataKind::Word => (parse_literal(&self.value)?.value as u32).to_be_bytes().to_vec(),
            DataKind::Asciiz => {
                let mut bytes = self.value.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            DataKind::Space => vec![0; self.size() as usize],
        })
    }
}

/// Variables in definition order with their byte addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSegment {
    base: u32,
    next: u32,
    vars: IndexMap<String, Vec<DataComponent>>,
    addrs: IndexMap<String, u32>,
}

impl DataSegment {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            next: base,
            vars: IndexMap::new(),
            addrs: IndexMap::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Register a variable at the next free address and return that address.
    pub fn define(&mut self, name: &str, components: Vec<DataComponent>) -> Result<u32> {
        if self.vars.contains_key(name) {
            return Err(ErrorKind::DuplicateVariable(name.to_string()).into());
        }
        let addr = self.next;
        self.next = components
            .iter()
            .fold(self.next, |acc, c| acc.saturating_add(c.size()));
        self.vars.insert(name.to_string(), components);
        self.addrs.insert(name.to_string(), addr);
        Ok(addr)
    }

    pub fn address(&self, name: &str) -> Option<u32> {
        self.addrs.get(name).copied()
    }

    pub fn components(&self, name: &str) -> Option<&[DataComponent]> {
        self.vars.get(name).map(Vec::as_slice)
    }

    /// `(name, address, components)` in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32, &[DataComponent])> + '_ {
        self.vars
            .iter()
            .map(|(name, comps)| (name.as_str(), self.addrs[name], comps.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Bytes allocated so far.
    pub fn size(&self) -> u32 {
        self.next - self.base
    }
}

/// Numeric values must fit the directive's width as either a signed or an
/// unsigned number; hex values truncate.
fn numeric(kind: DataKind, value: &str) -> Result<DataComponent> {
    let width = kind.width().unwrap_or(32);
    literal_to_bits(value, width, true).or_else(|_| literal_to_bits(value, width, false))?;
    Ok(DataComponent { kind, value: value.to_string() })
}

/// Parse `name: .directive v1, v2, ...` into a name and its components.
pub fn parse_data_line(line: &str) -> Result<(String, Vec<DataComponent>)> {
    let caps = VAR_DEF
        .captures(line)
        .ok_or_else(|| ErrorKind::Syntax(format!("invalid data segment line: {line}")))?;
    let name = caps[1].to_string();
    let content = caps[2].trim();
    if content.is_empty() {
        return Ok((name, Vec::new()));
    }

    let (directive, values) = content
        .split_once(char::is_whitespace)
        .map(|(d, v)| (d, v.trim()))
        .unwrap_or((content, ""));
    let kind = DataKind::from_directive(directive)
        .ok_or_else(|| ErrorKind::UnknownDirective(directive.to_string()))?;
    if values.is_empty() {
        return Err(ErrorKind::Syntax(format!("{directive} needs a value")).into());
    }

    let mut comps = Vec::new();
    for v in split_operands(values) {
        let comp = match kind {
            DataKind::Byte | DataKind::Half | DataKind::Word => numeric(kind, &v)?,
            DataKind::Asciiz => {
                let inner = QUOTED
                    .captures(&v)
                    .ok_or_else(|| ErrorKind::Syntax(format!("invalid asciiz format: {v}")))?;
                DataComponent { kind, value: unescape(&inner[1])? }
            }
            DataKind::Space => {
                let lit = parse_literal(&v)?;
                if lit.value < 0 || lit.value > u32::MAX as i64 || lit.radix == Radix::Char {
                    return Err(ErrorKind::InvalidLiteral(v).into());
                }
                DataComponent { kind, value: lit.value.to_string() }
            }
        };
        comps.push(comp);
    }
    Ok((name, comps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn addresses_advance_by_natural_size() {
        let mut seg = DataSegment::new(0x1000);
        for line in [
            "a: .byte 1, 'x'",
            "b: .half 0x1234",
            "c: .word -1",
            "msg: .asciiz \"hi\\n\"",
            "buf: .space 8",
            "end:",
        ] {
            let (name, comps) = parse_data_line(line).unwrap();
            seg.define(&name, comps).unwrap();
        }
        assert_eq!(seg.address("a"), Some(0x1000));
        assert_eq!(seg.address("b"), Some(0x1002));
        assert_eq!(seg.address("c"), Some(0x1004));
        assert_eq!(seg.address("msg"), Some(0x1008));
        assert_eq!(seg.address("buf"), Some(0x100C));
        assert_eq!(seg.address("end"), Some(0x1014));
        assert_eq!(seg.size(), 0x14);
        assert_eq!(seg.components("msg").unwrap()[0].value, "hi\n");
    }

    #[test]
    fn duplicate_and_unknown_directive() {
        let mut seg = DataSegment::new(0);
        seg.define("x", vec![]).unwrap();
        assert_eq!(
            seg.define("x", vec![]).unwrap_err().kind,
            ErrorKind::DuplicateVariable("x".into())
        );
        assert_eq!(
            parse_data_line("y: .float 1.0").unwrap_err().kind,
            ErrorKind::UnknownDirective(".float".into())
        );
        assert!(matches!(
            parse_data_line("1bad: .word 1").unwrap_err().kind,
            ErrorKind::Syntax(_)
        ));
    }

    #[test]
    fn numeric_values_must_fit_the_directive() {
        assert!(parse_data_line("b: .byte 255, -128, 'z'").is_ok());
        assert!(matches!(
            parse_data_line("b: .byte 300").unwrap_err().kind,
            ErrorKind::LiteralOutOfRange { width: 8, .. }
        ));
        assert!(parse_data_line("h: .half 70000").is_err());
        assert!(parse_data_line("h: .half 0b10000000000000000").is_err());
        let (_, comps) = parse_data_line("h: .half 0x12345").unwrap();
        assert_eq!(comps[0].to_bytes().unwrap(), vec![0x23, 0x45]);
    }

    #[test]
    fn components_flatten_big_endian() {
        let (_, comps) = parse_data_line("w: .word 0x11223344, 0x1FF").unwrap();
        assert_eq!(comps[0].to_bytes().unwrap(), vec![0x11, 0x22, 0x33, 0x44]);
        assert_eq!(comps[1].to_bytes().unwrap(), vec![0, 0, 1, 0xFF]);
        let (_, comps) = parse_data_line("h: .half -2").unwrap();
        assert_eq!(comps[0].to_bytes().unwrap(), vec![0xFF, 0xFE]);
        let (_, comps) = parse_data_line("s: .asciiz \"a,b\", \"c\"").unwrap();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].to_bytes().unwrap(), b"a,b\0".to_vec());
    }
}
