//! Textual `.macro` / `.end_macro` expansion.
//!
//! Labels inside a macro body are not renamed per call site, so a body that
//! defines a label can be expanded at most once per program.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{Error, ErrorKind, Result};

use super::source::{split_operands, SourceLine};

static MACRO_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.macro\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));
static MACRO_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(?:\((.*)\))?$").expect("valid regex")
});
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").expect("valid regex"));

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    bodies: IndexMap<String, Vec<String>>,
}

impl MacroTable {
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.bodies.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Replace `$1`, `$2`, ... with call arguments. Placeholders without a
/// matching argument are left as written.
fn substitute(line: &str, args: &[String]) -> String {
    PLACEHOLDER
        .replace_all(line, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Record macro definitions and splice their bodies in at each call site.
/// Expanded lines carry the call site's line number. Bodies are not
/// rescanned, so a macro cannot call another macro.
pub fn expand(lines: &[SourceLine]) -> Result<(Vec<SourceLine>, MacroTable)> {
    let mut table = MacroTable::default();
    let mut out = Vec::with_capacity(lines.len());
    let mut open: Option<(String, usize, Vec<String>)> = None;

    for src in lines {
        if let Some(caps) = MACRO_START.captures(&src.text) {
            if let Some((name, line, _)) = &open {
                return Err(Error::from(ErrorKind::UnclosedMacro(name.clone())).at(*line));
            }
            open = Some((caps[1].to_string(), src.line, Vec::new()));
            continue;
        }
        if src.text == ".end_macro" {
            let (name, _, body) = open
                .take()
                .ok_or_else(|| Error::from(ErrorKind::StrayEndMacro).at(src.line))?;
            table.bodies.insert(name, body);
            continue;
        }
        if let Some((_, _, body)) = open.as_mut() {
            body.push(src.text.clone());
            continue;
        }

        let call = MACRO_CALL
            .captures(&src.text)
            .and_then(|caps| table.get(&caps[1]).map(|body| (body.to_vec(), caps.get(2))));
        match call {
            Some((body, args)) => {
                let args = args.map(|m| split_operands(m.as_str())).unwrap_or_default();
                out.extend(body.iter().map(|l| SourceLine {
                    line: src.line,
                    text: substitute(l, &args),
                }));
            }
            None => out.push(src.clone()),
        }
    }

    if let Some((name, line, _)) = open {
        return Err(Error::from(ErrorKind::UnclosedMacro(name)).at(line));
    }
    Ok((out, table))
}
