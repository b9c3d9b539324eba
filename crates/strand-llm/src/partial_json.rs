//! # Progressive JSON Parsing
//!
//! Tool call arguments arrive as raw JSON fragments. While the stream is in
//! flight, consumers still want a structured view of what has arrived so
//! far. [`parse_partial`] recovers a best-effort [`Value`] from any prefix of
//! a JSON document and reports which parts of it may still change.
//!
//! Recovery rules:
//! - Unclosed objects and arrays are closed.
//! - A string cut mid-way keeps the characters received so far. A dangling
//!   escape sequence is dropped.
//! - A number at the end of input is kept when it parses (`12`, `1.5`) and
//!   dropped when it does not (`-`, `1e`).
//! - An object key without a value, and a truncated `true`/`false`/`null`,
//!   are dropped entirely.
//! - Nesting deeper than [`MAX_DEPTH`] is rejected, as `serde_json` does.
//!
//! Every value that is present but may still grow is listed in
//! [`PartialJson::incomplete`] by its JSON Pointer (RFC 6901). Ancestors of
//! an incomplete value are incomplete too. Partial values must never be fed
//! to a tool: the final arguments are parsed strictly once the block ends.

use std::collections::BTreeSet;

use serde_json::{Map, Number, Value};

/// Deepest object/array nesting accepted. Matches `serde_json`'s limit.
pub const MAX_DEPTH: usize = 128;

/// A best-effort parse of a JSON prefix.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialJson {
    /// Recovered value.
    pub value: Value,
    /// JSON Pointers of values that may still change. Empty when complete.
    pub incomplete: BTreeSet<String>,
}

impl PartialJson {
    /// Whether the input was a complete JSON document.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    /// Whether the value at `pointer` is final.
    ///
    /// Absent paths report `false`.
    #[must_use]
    pub fn is_field_complete(&self, pointer: &str) -> bool {
        self.value.pointer(pointer).is_some() && !self.incomplete.contains(pointer)
    }

    /// The recovered value as an object, or an empty object otherwise.
    #[must_use]
    pub fn into_object(self) -> Map<String, Value> {
        match self.value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Parse a possibly truncated JSON document.
///
/// Returns `None` for empty input, for input nested deeper than
/// [`MAX_DEPTH`], and for input that is not a prefix of valid JSON.
pub fn parse_partial(input: &str) -> Option<PartialJson> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
        incomplete: BTreeSet::new(),
    };
    let step = parser.value("").ok()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return None;
    }
    match step {
        Step::Value(value) => Some(PartialJson {
            value,
            incomplete: parser.incomplete,
        }),
        Step::Eof => None,
    }
}

/// Parse streaming tool call arguments into an object.
///
/// Always returns an object: empty, unparseable, or non-object input yields
/// an empty map.
pub fn parse_streaming_arguments(input: &str) -> Map<String, Value> {
    if input.trim().is_empty() {
        return Map::new();
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(input) {
        return map;
    }
    parse_partial(input).map(PartialJson::into_object).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of parsing one value.
enum Step {
    /// A value (complete or recovered).
    Value(Value),
    /// Input ended before any part of a value.
    Eof,
}

/// Input is not a prefix of valid JSON, or nests too deeply.
struct Invalid;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    incomplete: BTreeSet<String>,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn mark(&mut self, path: &str) {
        let _ = self.incomplete.insert(path.to_string());
    }

    fn value(&mut self, path: &str) -> Result<Step, Invalid> {
        self.skip_ws();
        let Some(c) = self.peek() else {
            return Ok(Step::Eof);
        };
        match c {
            '{' | '[' => {
                if self.depth >= MAX_DEPTH {
                    return Err(Invalid);
                }
                self.depth += 1;
                let container = if c == '{' { self.object(path) } else { self.array(path) };
                self.depth -= 1;
                container.map(Step::Value)
            }
            '"' => {
                let (s, complete) = self.string()?;
                if !complete {
                    self.mark(path);
                }
                Ok(Step::Value(Value::String(s)))
            }
            't' => self.literal("true", Value::Bool(true)),
            'f' => self.literal("false", Value::Bool(false)),
            'n' => self.literal("null", Value::Null),
            '-' | '0'..='9' => self.number(path),
            _ => Err(Invalid),
        }
    }

    fn object(&mut self, path: &str) -> Result<Value, Invalid> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => {
                    self.mark(path);
                    return Ok(Value::Object(map));
                }
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some('"') => {}
                Some(_) => return Err(Invalid),
            }

            let (key, key_complete) = self.string()?;
            self.skip_ws();
            if !key_complete || self.at_end() {
                self.mark(path);
                return Ok(Value::Object(map));
            }
            if self.peek() != Some(':') {
                return Err(Invalid);
            }
            self.pos += 1;

            let child = format!("{path}/{}", escape_pointer(&key));
            match self.value(&child)? {
                Step::Eof => {
                    self.mark(path);
                    return Ok(Value::Object(map));
                }
                Step::Value(v) => {
                    let _ = map.insert(key, v);
                }
            }
            if self.incomplete.contains(&child) {
                self.mark(path);
            }

            self.skip_ws();
            match self.peek() {
                None => {
                    self.mark(path);
                    return Ok(Value::Object(map));
                }
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(_) => return Err(Invalid),
            }
        }
    }

    fn array(&mut self, path: &str) -> Result<Value, Invalid> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => {
                    self.mark(path);
                    return Ok(Value::Array(items));
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(_) => {}
            }

            let child = format!("{path}/{}", items.len());
            match self.value(&child)? {
                Step::Eof => {
                    self.mark(path);
                    return Ok(Value::Array(items));
                }
                Step::Value(v) => items.push(v),
            }
            if self.incomplete.contains(&child) {
                self.mark(path);
            }

            self.skip_ws();
            match self.peek() {
                None => {
                    self.mark(path);
                    return Ok(Value::Array(items));
                }
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(_) => return Err(Invalid),
            }
        }
    }

    /// Parse a string starting at the opening quote.
    ///
    /// Returns the decoded text and whether the closing quote was seen.
    fn string(&mut self) -> Result<(String, bool), Invalid> {
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '"' => return Ok((out, true)),
                '\\' => match self.escape()? {
                    Some(decoded) => out.push(decoded),
                    None => return Ok((out, false)),
                },
                c if (c as u32) < 0x20 => return Err(Invalid),
                c => out.push(c),
            }
        }
        Ok((out, false))
    }

    /// Decode one escape sequence after the backslash.
    ///
    /// `None` means the input ended inside the sequence.
    fn escape(&mut self) -> Result<Option<char>, Invalid> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        self.pos += 1;
        let decoded = match c {
            '"' => '"',
            '\\' => '\\',
            '/' => '/',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let Some(high) = self.hex4()? else {
                    return Ok(None);
                };
                if (0xD800..0xDC00).contains(&high) {
                    // Surrogate pair: need `\uXXXX` for the low half.
                    if self.at_end() || (self.peek() == Some('\\') && self.pos + 1 >= self.chars.len()) {
                        return Ok(None);
                    }
                    if self.peek() == Some('\\') && self.chars.get(self.pos + 1) == Some(&'u') {
                        self.pos += 2;
                        let Some(low) = self.hex4()? else {
                            return Ok(None);
                        };
                        if (0xDC00..0xE000).contains(&low) {
                            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                            return Ok(Some(char::from_u32(code).unwrap_or('\u{FFFD}')));
                        }
                    }
                    '\u{FFFD}'
                } else {
                    char::from_u32(high).unwrap_or('\u{FFFD}')
                }
            }
            _ => return Err(Invalid),
        };
        Ok(Some(decoded))
    }

    fn hex4(&mut self) -> Result<Option<u32>, Invalid> {
        let mut code = 0u32;
        for _ in 0..4 {
            let Some(c) = self.peek() else {
                return Ok(None);
            };
            let digit = c.to_digit(16).ok_or(Invalid)?;
            code = code * 16 + digit;
            self.pos += 1;
        }
        Ok(Some(code))
    }

    fn literal(&mut self, word: &str, value: Value) -> Result<Step, Invalid> {
        for expected in word.chars() {
            match self.peek() {
                None => return Ok(Step::Eof),
                Some(c) if c == expected => self.pos += 1,
                Some(_) => return Err(Invalid),
            }
        }
        Ok(Step::Value(value))
    }

    fn number(&mut self, path: &str) -> Result<Step, Invalid> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let at_end = self.at_end();

        if let Some(n) = parse_number(&text) {
            if at_end {
                self.mark(path);
            }
            return Ok(Step::Value(Value::Number(n)));
        }
        if at_end {
            // Trailing `-`, `.`, or exponent marker still being written.
            Ok(Step::Eof)
        } else {
            Err(Invalid)
        }
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(Value::Number(n)) = serde_json::from_str::<Value>(text) {
        return Some(n);
    }
    None
}

/// Escape a key for use in a JSON Pointer.
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
