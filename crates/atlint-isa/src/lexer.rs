//! Source scanning: comment removal, string-literal continuation and
//! operand tokenization.

/// One logical source line after comment removal.
///
/// A string directive whose literal spans several physical lines is
/// folded into a single logical line anchored at its first line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalLine {
    /// Zero-based physical line the logical line starts on.
    pub line: u32,
    /// Number of physical lines consumed.
    pub span: u32,
    pub text: String,
}

/// Stateful comment stripper; block comments may span lines.
#[derive(Debug, Default)]
pub struct CommentStripper {
    in_block: bool,
}

impl CommentStripper {
    /// Remove comments from one physical line.
    ///
    /// `/* */` is removed anywhere, `#` at line start or after whitespace
    /// ends the line, and a line whose first non-blank text is `//` or `;`
    /// is dropped entirely.
    pub fn strip(&mut self, line: &str) -> String {
        if !self.in_block {
            let lead = line.trim_start();
            if lead.starts_with("//") || lead.starts_with(';') {
                return String::new();
            }
        }

        let mut out = String::with_capacity(line.len());
        let mut chars = line.chars().peekable();
        let mut in_quote = false;
        let mut after_space = true;
        while let Some(c) = chars.next() {
            if self.in_block {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block = false;
                    out.push(' ');
                    after_space = true;
                }
                continue;
            }
            if in_quote {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == '"' {
                    in_quote = false;
                }
                continue;
            }
            match c {
                '"' => {
                    in_quote = true;
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.in_block = true;
                }
                '#' if after_space => break,
                _ => out.push(c),
            }
            after_space = c.is_whitespace();
        }
        out
    }
}

/// True if the text ends inside an open string literal.
#[must_use]
pub fn has_open_quote(text: &str) -> bool {
    let mut in_quote = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quote => {
                chars.next();
            }
            '"' => in_quote = !in_quote,
            _ => {}
        }
    }
    in_quote
}

fn is_string_directive(text: &str) -> bool {
    text.split_whitespace().any(|tok| {
        let tok = tok.rsplit(':').next().unwrap_or(tok);
        [".ascii", ".asciz", ".string"]
            .iter()
            .any(|d| tok.eq_ignore_ascii_case(d))
    })
}

/// Cut a `;` comment that follows the close of a continued string.
fn strip_continuation(line: &str) -> &str {
    let mut in_quote = true;
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_quote => {
                chars.next();
            }
            '"' => in_quote = !in_quote,
            ';' if !in_quote => return &line[..i],
            _ => {}
        }
    }
    line
}

fn line_number(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Split source text into logical lines.
#[must_use]
pub fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let physical: Vec<&str> = source.lines().collect();
    let mut stripper = CommentStripper::default();
    let mut out = Vec::with_capacity(physical.len());
    let mut i = 0;
    while i < physical.len() {
        let start = i;
        let mut text = stripper.strip(physical[i]);
        i += 1;
        if is_string_directive(&text) {
            while has_open_quote(&text) && i < physical.len() {
                text.push('\n');
                text.push_str(strip_continuation(physical[i]));
                i += 1;
            }
        }
        out.push(LogicalLine {
            line: line_number(start),
            span: line_number(i - start),
            text,
        });
    }
    out
}

/// Split an instruction into mnemonic and operand tokens.
///
/// Separators are whitespace and commas outside parentheses and string
/// literals, so `8(%ebp, %esi, 4)` and `"a, b"` stay whole.
#[must_use]
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_quote = true;
                start.get_or_insert(i);
            }
            '(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                start.get_or_insert(i);
            }
            c if depth == 0 && (c.is_whitespace() || c == ',') => {
                if let Some(s) = start.take() {
                    tokens.push(&text[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}
