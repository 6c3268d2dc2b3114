// NetworkManager keyfile editing

//! INI-style profile file editing
//!
//! NetworkManager stores system profiles as GLib key files. This editor keeps
//! every line it does not touch verbatim, including comments, blank lines,
//! key order and the exact text of section headers, so rewriting a profile
//! only changes the keys that were explicitly set. Line endings follow the
//! file's convention (LF or CRLF), as does the presence of a final newline.
//! Files mixing both line endings come back with the CRLF one throughout.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Section { name: String, raw: String },
    Entry { key: String, raw: String },
    Other(String),
}

impl Line {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        // Like GKeyFile: the group name runs up to the last ']' and is not trimmed
        if let Some(rest) = raw.trim_start().strip_prefix('[') {
            if let Some(end) = rest.rfind(']') {
                return Line::Section {
                    name: rest[..end].to_string(),
                    raw: raw.to_string(),
                };
            }
        }

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            return Line::Other(raw.to_string());
        }

        match raw.split_once('=') {
            Some((key, _)) => Line::Entry {
                key: key.trim().to_string(),
                raw: raw.to_string(),
            },
            None => Line::Other(raw.to_string()),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Line::Section { raw, .. } | Line::Entry { raw, .. } | Line::Other(raw) => raw,
        }
    }
}

/// Escape a value the way `g_key_file_set_string` does
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ' ' if i == 0 => escaped.push_str("\\s"),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Inverse of [`escape_value`]; unknown escapes are kept as written
fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// A parsed key file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyfile {
    lines: Vec<Line>,
    crlf: bool,
    unterminated: bool,
}

impl Keyfile {
    /// Parse key file text. Never fails: unrecognised lines are kept verbatim.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(Line::parse).collect(),
            crlf: text.contains("\r\n"),
            unterminated: !text.is_empty() && !text.ends_with('\n'),
        }
    }

    /// Index range `(header, end)` of the first section called `section`
    fn section_range(&self, section: &str) -> Option<(usize, usize)> {
        let start = self
            .lines
            .iter()
            .position(|l| matches!(l, Line::Section { name, .. } if name == section))?;
        let end = self.lines[start + 1..]
            .iter()
            .position(|l| matches!(l, Line::Section { .. }))
            .map(|p| start + 1 + p)
            .unwrap_or(self.lines.len());
        Some((start, end))
    }

    /// Whether the file has a section called `section`
    pub fn has_section(&self, section: &str) -> bool {
        self.section_range(section).is_some()
    }

    /// Append an empty section; no-op when it already exists
    pub fn add_section(&mut self, section: &str) {
        if self.has_section(section) {
            return;
        }
        if matches!(self.lines.last(), Some(l) if !l.raw().trim().is_empty()) {
            self.lines.push(Line::Other(String::new()));
        }
        self.lines.push(Line::Section {
            name: section.to_string(),
            raw: format!("[{}]", section),
        });
    }

    /// Unescaped value of `section.key`
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        let (start, end) = self.section_range(section)?;
        self.lines[start + 1..end].iter().find_map(|l| match l {
            Line::Entry { key: k, raw } if k == key => raw
                .split_once('=')
                .map(|(_, v)| unescape_value(v.trim_start())),
            _ => None,
        })
    }

    /// Set `section.key`, creating the section and key as needed.
    ///
    /// An existing key is replaced in place; a new key goes after the last
    /// non-blank line of its section.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.add_section(section);
        let Some((start, end)) = self.section_range(section) else {
            return;
        };

        let entry = Line::Entry {
            key: key.to_string(),
            raw: format!("{}={}", key, escape_value(value)),
        };

        let existing = (start + 1..end)
            .find(|&i| matches!(&self.lines[i], Line::Entry { key: k, .. } if k == key));
        if let Some(i) = existing {
            self.lines[i] = entry;
            return;
        }

        let insert_at = (start + 1..end)
            .rev()
            .find(|&i| !self.lines[i].raw().trim().is_empty())
            .map(|i| i + 1)
            .unwrap_or(start + 1);
        self.lines.insert(insert_at, entry);
    }
}

impl fmt::Display for Keyfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eol = if self.crlf { "\r\n" } else { "\n" };
        for (i, line) in self.lines.iter().enumerate() {
            f.write_str(line.raw())?;
            if i + 1 < self.lines.len() || !self.unterminated {
                f.write_str(eol)?;
            }
        }
        Ok(())
    }
}
