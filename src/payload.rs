// 🧩 Payload Parsing - NEW_VALUE as structured data
//
// A change-log NEW_VALUE is either a plain value (name, status, capital) or a
// serialized mapping of company attributes. Mappings are accepted as JSON or
// as a Python-style literal ({'NIC_CODE': 5, 'ACTIVE': True}). Parsing never
// fails: anything unparseable is reported as Unstructured.

use serde_json::{Map, Number, Value};
use std::iter::Peekable;
use std::str::Chars;

pub type Mapping = Map<String, Value>;

/// Outcome of parsing a NEW_VALUE field
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// The value was (or parsed to) a mapping
    Mapping(Mapping),

    /// Empty or absent value
    Empty,

    /// Text that is not a mapping
    Unstructured,
}

impl ParsedValue {
    pub fn is_mapping(&self) -> bool {
        matches!(self, ParsedValue::Mapping(_))
    }

    /// Mapping view; anything that is not a mapping is an empty mapping
    pub fn into_mapping(self) -> Mapping {
        match self {
            ParsedValue::Mapping(map) => map,
            ParsedValue::Empty | ParsedValue::Unstructured => Mapping::new(),
        }
    }
}

/// Parse a value that may already be structured
pub fn parse_value(value: &Value) -> ParsedValue {
    match value {
        Value::Object(map) => ParsedValue::Mapping(map.clone()),
        Value::Null => ParsedValue::Empty,
        Value::String(s) => parse_new_value(s),
        _ => ParsedValue::Unstructured,
    }
}

/// Parse a NEW_VALUE string: JSON object first, then a Python-style dict literal
pub fn parse_new_value(raw: &str) -> ParsedValue {
    let text = raw.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return ParsedValue::Empty;
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return match value {
            Value::Object(map) => ParsedValue::Mapping(map),
            _ => ParsedValue::Unstructured,
        };
    }

    match LiteralParser::new(text).parse_document() {
        Some(Value::Object(map)) => ParsedValue::Mapping(map),
        _ => ParsedValue::Unstructured,
    }
}

/// Render a payload value the way it reads in a CSV cell
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join("; "),
        Value::Object(_) => value.to_string(),
    }
}

// ============================================================================
// LITERAL PARSER
// ============================================================================

/// Recursive-descent reader for Python literal syntax:
/// dicts, lists, tuples, quoted strings, numbers, True/False/None
struct LiteralParser<'a> {
    chars: Peekable<Chars<'a>>,
    depth: usize,
}

/// Containers nested deeper than this are rejected
const MAX_DEPTH: usize = 64;

impl<'a> LiteralParser<'a> {
    fn new(text: &'a str) -> Self {
        LiteralParser {
            chars: text.chars().peekable(),
            depth: 0,
        }
    }

    fn enter(&mut self) -> Option<()> {
        self.depth += 1;
        (self.depth <= MAX_DEPTH).then_some(())
    }

    /// Whole input must be exactly one literal
    fn parse_document(&mut self) -> Option<Value> {
        let value = self.parse_value()?;
        self.skip_whitespace();
        if self.chars.peek().is_some() {
            return None;
        }
        Some(value)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        self.skip_whitespace();
        (self.chars.next()? == expected).then_some(())
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_whitespace();
        match *self.chars.peek()? {
            '{' => self.parse_dict(),
            '[' => self.parse_sequence('[', ']'),
            '(' => self.parse_sequence('(', ')'),
            '\'' | '"' => self.parse_string().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            c if c.is_alphabetic() => self.parse_keyword(),
            _ => None,
        }
    }

    fn parse_dict(&mut self) -> Option<Value> {
        self.enter()?;
        let value = self.parse_dict_body();
        self.depth -= 1;
        value
    }

    fn parse_dict_body(&mut self) -> Option<Value> {
        self.expect('{')?;
        let mut map = Map::new();

        loop {
            self.skip_whitespace();
            if self.chars.peek() == Some(&'}') {
                self.chars.next();
                return Some(Value::Object(map));
            }

            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Null => "None".to_string(),
                other => value_text(&other),
            };
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.chars.next()? {
                ',' => continue,
                '}' => return Some(Value::Object(map)),
                _ => return None,
            }
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Option<Value> {
        self.enter()?;
        let value = self.parse_sequence_body(open, close);
        self.depth -= 1;
        value
    }

    fn parse_sequence_body(&mut self, open: char, close: char) -> Option<Value> {
        self.expect(open)?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.chars.peek() == Some(&close) {
                self.chars.next();
                return Some(Value::Array(items));
            }

            items.push(self.parse_value()?);

            self.skip_whitespace();
            match self.chars.next()? {
                ',' => continue,
                c if c == close => return Some(Value::Array(items)),
                _ => return None,
            }
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.chars.next()?;
        let mut out = String::new();

        loop {
            match self.chars.next()? {
                c if c == quote => return Some(out),
                '\\' => {
                    let escaped = match self.chars.next()? {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        'x' => self.parse_hex_escape(2)?,
                        'u' => self.parse_hex_escape(4)?,
                        other => other,
                    };
                    out.push(escaped);
                }
                c => out.push(c),
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            code = code * 16 + self.chars.next()?.to_digit(16)?;
        }
        char::from_u32(code)
    }

    fn parse_number(&mut self) -> Option<Value> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_') {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        let text = text.replace('_', "");

        if let Ok(n) = text.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        if let Ok(n) = text.parse::<u64>() {
            return Some(Value::Number(n.into()));
        }
        let float = text.parse::<f64>().ok()?;
        Number::from_f64(float).map(Value::Number)
    }

    fn parse_keyword(&mut self) -> Option<Value> {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        match word.as_str() {
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            "None" => Some(Value::Null),
            _ => None,
        }
    }
}
