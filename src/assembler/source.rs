/// One non-blank source line with its comment removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the original text.
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub data: Vec<SourceLine>,
    pub text: Vec<SourceLine>,
}

/// Drop a `#` comment, ignoring `#` inside string or character literals.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '#' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}

/// Remove comments and blank lines, keeping original line numbers.
pub fn strip(source: &str) -> Vec<SourceLine> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = strip_comment(raw).trim();
            (!text.is_empty()).then(|| SourceLine { line: i + 1, text: text.to_string() })
        })
        .collect()
}

/// Route lines to the data or text segment on `.data` / `.text` switches.
/// Lines before the first switch belong to the text segment.
pub fn split_segments(lines: Vec<SourceLine>) -> Segments {
    let mut segs = Segments::default();
    let mut in_data = false;
    for line in lines {
        if line.text.eq_ignore_ascii_case(".data") {
            in_data = true;
        } else if line.text.eq_ignore_ascii_case(".text") {
            in_data = false;
        } else if in_data {
            segs.data.push(line);
        } else {
            segs.text.push(line);
        }
    }
    segs
}

/// Split an operand list on commas that are not inside quotes.
pub fn split_operands(s: &str) -> Vec<String> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        match quote {
            Some(q) => {
                cur.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                ',' => out.push(std::mem::take(&mut cur).trim().to_string()),
                '"' | '\'' => {
                    quote = Some(c);
                    cur.push(c);
                }
                _ => cur.push(c),
            },
        }
    }
    out.push(cur.trim().to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let lines = strip("  # header\n\naddi x1, x0, 1 # one\n  msg: .asciiz \"a#b\"\n");
        assert_eq!(
            lines,
            vec![
                SourceLine { line: 3, text: "addi x1, x0, 1".into() },
                SourceLine { line: 4, text: "msg: .asciiz \"a#b\"".into() },
            ]
        );
    }

    #[test]
    fn segments_follow_directives() {
        let segs = split_segments(strip("nop\n.data\nv: .word 1\n.text\nmain: nop\n"));
        assert_eq!(segs.data.len(), 1);
        assert_eq!(segs.text.iter().map(|l| l.line).collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn operand_split_respects_quotes() {
        assert_eq!(split_operands("x1, 0(sp)"), vec!["x1", "0(sp)"]);
        assert_eq!(split_operands("\"a, b\", ','"), vec!["\"a, b\"", "','"]);
        assert!(split_operands("  ").is_empty());
    }
}
