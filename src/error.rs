use serde::Serialize;
use std::fmt;

/// Every way an assembly or link job can fail.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Malformed line: {0}")]
    Syntax(String),
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),
    #[error("Unknown directive: {0}")]
    UnknownDirective(String),
    #[error("Unknown register: {0}")]
    UnknownRegister(String),
    #[error("Unknown field `{field}` for {mnemonic}")]
    UnknownField { mnemonic: String, field: String },
    #[error("Invalid parameter count for {mnemonic}: expected {expected}, got {got}")]
    InvalidParameterCount {
        mnemonic: String,
        expected: &'static str,
        got: usize,
    },
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("Unresolved external symbol `{symbol}` at {addr:#010x}")]
    UnresolvedExternal { symbol: String, addr: u32 },
    #[error("Label '{0}' already exists")]
    DuplicateLabel(String),
    #[error("Variable '{0}' already exists")]
    DuplicateVariable(String),
    #[error("Memory protection error: cannot write to firmware area (below {limit:#010x}) at {addr:#010x}")]
    MemoryProtectionViolation { addr: u32, limit: u32 },
    #[error("Literal {literal} does not fit in {width} bits (range {min}..={max})")]
    LiteralOutOfRange {
        literal: String,
        width: usize,
        min: i64,
        max: i64,
    },
    #[error("Field `{field}` expects {expected} bits, got {got}")]
    FieldWidth {
        field: String,
        expected: usize,
        got: usize,
    },
    #[error("Instruction {mnemonic} has unbound field `{field}`")]
    IncompleteInstruction { mnemonic: String, field: String },
    #[error("Bit string of length {0} is not a multiple of 4")]
    UnalignedBits(usize),
    #[error("Macro '{0}' not closed with .end_macro")]
    UnclosedMacro(String),
    #[error(".end_macro without .macro")]
    StrayEndMacro,
    #[error("{region} region overflow: {size} bytes, maximum is {limit} bytes")]
    RegionOverflow {
        region: &'static str,
        size: usize,
        limit: usize,
    },
    #[error("User program too large: {size} bytes, maximum is {limit} bytes")]
    ProgramTooLarge { size: usize, limit: usize },
    #[error("Data segment too large: {size} bytes, maximum is {limit} bytes")]
    DataSegmentTooLarge { size: usize, limit: usize },
    #[error("Invalid memory layout: {0}")]
    InvalidLayout(String),
}

/// Coarse error classes reported to users and tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Syntax,
    UnknownSymbol,
    DuplicateDefinition,
    UndefinedReference,
    Range,
    Protection,
    Capacity,
}

impl ErrorKind {
    pub fn category(&self) -> Category {
        use ErrorKind::*;
        match self {
            Syntax(_)
            | InvalidLiteral(_)
            | InvalidParameterCount { .. }
            | IncompleteInstruction { .. }
            | FieldWidth { .. }
            | UnalignedBits(_)
            | UnclosedMacro(_)
            | StrayEndMacro
            | InvalidLayout(_) => Category::Syntax,
            UnknownInstruction(_) | UnknownDirective(_) | UnknownRegister(_) | UnknownField { .. } => {
                Category::UnknownSymbol
            }
            DuplicateLabel(_) | DuplicateVariable(_) => Category::DuplicateDefinition,
            UndefinedLabel(_) | UndefinedVariable(_) | UnresolvedExternal { .. } => {
                Category::UndefinedReference
            }
            LiteralOutOfRange { .. } | RegionOverflow { .. } => Category::Range,
            MemoryProtectionViolation { .. } => Category::Protection,
            ProgramTooLarge { .. } | DataSegmentTooLarge { .. } => Category::Capacity,
        }
    }
}

/// An [`ErrorKind`] tagged with the 1-based source line it came from, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub line: Option<usize>,
    pub kind: ErrorKind,
}

impl Error {
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Attach a line number unless a more precise one is already recorded.
    pub fn at(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { line: None, kind }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) trait AtLine<T> {
    fn at_line(self, line: usize) -> Result<T>;
}

impl<T> AtLine<T> for Result<T> {
    fn at_line(self, line: usize) -> Result<T> {
        self.map_err(|e| e.at(line))
    }
}
