//! MIME type parsing and serialization.
//!
//! Implements the WHATWG MIME Sniffing grammar: a `type/subtype` essence
//! followed by `;`-separated parameters whose values may be HTTP quoted
//! strings. [`MimeType::parse`] is the tolerant entry point (returns
//! `None`); [`str::parse`] via [`FromStr`] is the strict one.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ── Code point classes ──────────────────────────────────────────────

pub(crate) fn is_http_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

pub(crate) fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

/// True if every char is an HTTP token code point. Empty strings pass.
pub(crate) fn is_token(s: &str) -> bool {
    s.chars().all(is_token_char)
}

/// True if every char may appear inside an HTTP quoted string.
pub(crate) fn is_quoted_string_safe(s: &str) -> bool {
    s.chars()
        .all(|c| c == '\t' || (' '..='~').contains(&c) || ('\u{80}'..='\u{ff}').contains(&c))
}

// ── Parameters ──────────────────────────────────────────────────────

/// Ordered MIME type parameters. Names are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeParameters {
    entries: Vec<(String, String)>,
}

impl MimeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace a parameter, keeping the original position on replace.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if !is_token(&name) {
            return Err(Error::InvalidMime {
                what: "parameter name",
                value: name,
                reason: "only HTTP token code points are valid",
            });
        }
        if !is_quoted_string_safe(&value) {
            return Err(Error::InvalidMime {
                what: "parameter value",
                value,
                reason: "only HTTP quoted-string token code points are valid",
            });
        }
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

// ── MimeType ────────────────────────────────────────────────────────

/// A parsed MIME type such as `text/html;charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    type_: String,
    subtype: String,
    parameters: MimeParameters,
}

impl MimeType {
    /// Parse `input`, returning `None` if it is not a valid MIME type.
    pub fn parse(input: &str) -> Option<Self> {
        parse_mime_type(input)
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    pub fn parameters(&self) -> &MimeParameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut MimeParameters {
        &mut self.parameters
    }

    pub fn set_type(&mut self, value: &str) -> Result<()> {
        self.type_ = validate_component("type", value)?;
        Ok(())
    }

    pub fn set_subtype(&mut self, value: &str) -> Result<()> {
        self.subtype = validate_component("subtype", value)?;
        Ok(())
    }

    /// JavaScript MIME type essence match. With `prohibit_parameters`,
    /// any parameter disqualifies the type.
    pub fn is_javascript(&self, prohibit_parameters: bool) -> bool {
        let matches = match self.type_.as_str() {
            "text" => matches!(
                self.subtype.as_str(),
                "ecmascript"
                    | "javascript"
                    | "javascript1.0"
                    | "javascript1.1"
                    | "javascript1.2"
                    | "javascript1.3"
                    | "javascript1.4"
                    | "javascript1.5"
                    | "jscript"
                    | "livescript"
                    | "x-ecmascript"
                    | "x-javascript"
            ),
            "application" => matches!(
                self.subtype.as_str(),
                "ecmascript" | "javascript" | "x-ecmascript" | "x-javascript"
            ),
            _ => false,
        };
        matches && (!prohibit_parameters || self.parameters.is_empty())
    }

    pub fn is_xml(&self) -> bool {
        (self.subtype == "xml" && (self.type_ == "text" || self.type_ == "application"))
            || self.subtype.ends_with("+xml")
    }

    pub fn is_html(&self) -> bool {
        self.subtype == "html" && self.type_ == "text"
    }
}

fn validate_component(what: &'static str, value: &str) -> Result<String> {
    let value = value.to_ascii_lowercase();
    if value.is_empty() {
        return Err(Error::InvalidMime {
            what,
            value,
            reason: "must be a non-empty string",
        });
    }
    if !is_token(&value) {
        return Err(Error::InvalidMime {
            what,
            value,
            reason: "must contain only HTTP token code points",
        });
    }
    Ok(value)
}

impl FromStr for MimeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_mime_type(s).ok_or_else(|| Error::MimeParse(s.to_string()))
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in self.parameters.iter() {
            write!(f, ";{name}=")?;
            if value.is_empty() || !is_token(value) {
                f.write_str("\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")?;
            } else {
                f.write_str(value)?;
            }
        }
        Ok(())
    }
}

// ── Parser ──────────────────────────────────────────────────────────

fn parse_mime_type(input: &str) -> Option<MimeType> {
    let input: Vec<char> = input.trim_matches(is_http_whitespace).chars().collect();
    let len = input.len();
    let mut pos = 0;

    let start = pos;
    while pos < len && input[pos] != '/' {
        pos += 1;
    }
    let type_: String = input[start..pos].iter().collect();
    if type_.is_empty() || !is_token(&type_) || pos >= len {
        return None;
    }
    pos += 1;

    let start = pos;
    while pos < len && input[pos] != ';' {
        pos += 1;
    }
    let subtype: String = input[start..pos].iter().collect();
    let subtype = subtype.trim_end_matches(is_http_whitespace);
    if subtype.is_empty() || !is_token(subtype) {
        return None;
    }

    let mut mime = MimeType {
        type_: type_.to_ascii_lowercase(),
        subtype: subtype.to_ascii_lowercase(),
        parameters: MimeParameters::new(),
    };

    while pos < len {
        // Skip the `;` that ended the previous component.
        pos += 1;
        while pos < len && is_http_whitespace(input[pos]) {
            pos += 1;
        }

        let start = pos;
        while pos < len && input[pos] != ';' && input[pos] != '=' {
            pos += 1;
        }
        let name = input[start..pos].iter().collect::<String>().to_ascii_lowercase();

        if pos < len {
            if input[pos] == ';' {
                continue;
            }
            pos += 1;
        }

        let value = if pos < len && input[pos] == '"' {
            let (value, next) = collect_quoted_string(&input, pos);
            pos = next;
            while pos < len && input[pos] != ';' {
                pos += 1;
            }
            value
        } else {
            let start = pos;
            while pos < len && input[pos] != ';' {
                pos += 1;
            }
            let raw: String = input[start..pos].iter().collect();
            let value = raw.trim_end_matches(is_http_whitespace);
            if value.is_empty() {
                continue;
            }
            value.to_string()
        };

        if !name.is_empty()
            && is_token(&name)
            && is_quoted_string_safe(&value)
            && !mime.parameters.has(&name)
        {
            mime.parameters.entries.push((name, value));
        }
    }

    Some(mime)
}

/// Collect an HTTP quoted string starting at the opening `"` at `pos`.
/// Returns the unescaped value and the position after the closing quote.
/// An unterminated string takes the remainder of the input.
fn collect_quoted_string(input: &[char], mut pos: usize) -> (String, usize) {
    let len = input.len();
    let mut value = String::new();
    pos += 1;
    loop {
        while pos < len && input[pos] != '"' && input[pos] != '\\' {
            value.push(input[pos]);
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let quote_or_backslash = input[pos];
        pos += 1;
        if quote_or_backslash == '\\' {
            if pos >= len {
                value.push('\\');
                break;
            }
            value.push(input[pos]);
            pos += 1;
        } else {
            break;
        }
    }
    (value, pos)
}
