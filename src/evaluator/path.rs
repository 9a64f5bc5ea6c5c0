//! Built-in path expression engine
//!
//! Supports a small, predictable query language over JSON and YAML input:
//!
//! - `.` or an empty query returns the input unchanged
//! - `a.b`, `.a.b` select object fields
//! - `a[0]`, `a[-1]`, `.[2]` select array elements (negative counts from the end)
//! - `["odd key"]` selects fields whose names are not plain identifiers
//!
//! Missing fields and out-of-range indexes yield `null`.

use super::{parse_input, render_output, Engine, EvalRequest};
use crate::error::{Error, Result};
use crate::types::TypedDocument;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(i64),
}

/// Path expression engine
#[derive(Debug, Default)]
pub struct PathEngine;

impl PathEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for PathEngine {
    fn name(&self) -> &'static str {
        "path"
    }

    // Path lookups finish quickly, so cancellation is not checked.
    fn evaluate(
        &mut self,
        request: &EvalRequest,
        _cancel: &CancellationToken,
    ) -> Result<TypedDocument> {
        let segments = parse_path(&request.query)?;
        let input = parse_input(&request.data)?;
        let selected = select(&input, &segments)?;
        render_output(selected.unwrap_or(&Value::Null), request.output_type, request.indent)
    }
}

fn syntax_error(message: impl std::fmt::Display, position: usize) -> Error {
    Error::evaluation(format!("syntax error at position {position}: {message}"))
}

struct Parser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().collect(),
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    /// Byte offset of the current character, or the end of input
    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.source.len(), |(offset, _)| *offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(syntax_error(
                format!("expected '{expected}', found '{c}'"),
                self.offset(),
            )),
            None => Err(syntax_error(
                format!("expected '{expected}', found end of query"),
                self.offset(),
            )),
        }
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    fn bracket(&mut self) -> Result<Segment> {
        self.expect('[')?;
        let segment = match self.peek() {
            Some('"') => Segment::Field(self.quoted()?),
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let start = self.offset();
                let mut digits = String::new();
                if c == '-' {
                    digits.push(c);
                    self.pos += 1;
                }
                while let Some(d) = self.peek().filter(char::is_ascii_digit) {
                    digits.push(d);
                    self.pos += 1;
                }
                let index = digits
                    .parse::<i64>()
                    .map_err(|_| syntax_error(format!("invalid index '{digits}'"), start))?;
                Segment::Index(index)
            }
            Some(c) => {
                return Err(syntax_error(
                    format!("unexpected '{c}' inside brackets"),
                    self.offset(),
                ));
            }
            None => return Err(syntax_error("unterminated '['", self.offset())),
        };
        self.expect(']')?;
        Ok(segment)
    }

    fn quoted(&mut self) -> Result<String> {
        let start = self.offset();
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(syntax_error("unterminated string", start)),
                },
                Some(c) => value.push(c),
                None => return Err(syntax_error("unterminated string", start)),
            }
        }
    }

    /// Parse one segment following a '.' or at the start of the query
    fn segment(&mut self) -> Result<Segment> {
        match self.peek() {
            Some('[') => self.bracket(),
            Some(c) if c.is_alphabetic() || c == '_' => Ok(Segment::Field(self.identifier())),
            Some(c) => Err(syntax_error(format!("unexpected '{c}'"), self.offset())),
            None => Err(syntax_error("expected a field name", self.offset())),
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        if self.peek() == Some('.') {
            self.pos += 1;
            if self.peek().is_none() {
                return Ok(segments);
            }
        }

        segments.push(self.segment()?);
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(self.segment()?);
                }
                '[' => segments.push(self.bracket()?),
                other => {
                    return Err(syntax_error(format!("unexpected '{other}'"), self.offset()));
                }
            }
        }
        Ok(segments)
    }
}

fn parse_path(query: &str) -> Result<Vec<Segment>> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Parser::new(trimmed).parse()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walk `segments` from `root`; `None` means the path ran off the document
fn select<'v>(root: &'v Value, segments: &[Segment]) -> Result<Option<&'v Value>> {
    let mut current = root;
    for segment in segments {
        let next = match (current, segment) {
            (Value::Null, _) => return Ok(None),
            (Value::Object(map), Segment::Field(name)) => map.get(name),
            (Value::Array(items), Segment::Index(index)) => {
                let len = items.len() as i64;
                let resolved = if *index < 0 { len + index } else { *index };
                usize::try_from(resolved).ok().and_then(|i| items.get(i))
            }
            (other, Segment::Field(name)) => {
                return Err(Error::evaluation(format!(
                    "cannot index {} with \"{}\"",
                    type_name(other),
                    name
                )));
            }
            (other, Segment::Index(_)) => {
                return Err(Error::evaluation(format!(
                    "cannot index {} with number",
                    type_name(other)
                )));
            }
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentKind;
    use pretty_assertions::assert_eq;

    fn eval(query: &str, input: &str) -> Result<String> {
        let mut engine = PathEngine::new();
        let request = EvalRequest {
            query: query.to_string(),
            data: TypedDocument::json(input),
            output_type: DocumentKind::Json,
            indent: 0,
        };
        engine
            .evaluate(&request, &CancellationToken::new())
            .map(|doc| doc.content)
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(parse_path("").unwrap(), vec![]);
        assert_eq!(parse_path(".").unwrap(), vec![]);
        assert_eq!(
            parse_path(".a.b[0][\"c d\"]").unwrap(),
            vec![
                Segment::Field("a".to_string()),
                Segment::Field("b".to_string()),
                Segment::Index(0),
                Segment::Field("c d".to_string()),
            ]
        );
        assert_eq!(parse_path(".[-1]").unwrap(), vec![Segment::Index(-1)]);
    }

    #[test]
    fn test_malformed_queries() {
        for query in ["a..b", "a[", "a[x]", "a.", "..", "a b", "[\"open", "3a"] {
            let err = parse_path(query).unwrap_err();
            assert!(
                err.to_string().starts_with("syntax error at position"),
                "{query}: {err}"
            );
        }
    }

    #[test]
    fn test_field_selection() {
        assert_eq!(eval("a", r#"{"a":1}"#).unwrap(), "1");
        assert_eq!(eval(".a.b", r#"{"a":{"b":"x"}}"#).unwrap(), "\"x\"");
        assert_eq!(eval("missing", r#"{"a":1}"#).unwrap(), "null");
        assert_eq!(eval("a.b", r#"{"a":null}"#).unwrap(), "null");
    }

    #[test]
    fn test_index_selection() {
        let input = r#"{"xs":[10,20,30]}"#;
        assert_eq!(eval("xs[0]", input).unwrap(), "10");
        assert_eq!(eval("xs[-1]", input).unwrap(), "30");
        assert_eq!(eval("xs[5]", input).unwrap(), "null");
        assert_eq!(eval("xs[-4]", input).unwrap(), "null");
    }

    #[test]
    fn test_identity() {
        assert_eq!(eval(".", r#"{"a": 1}"#).unwrap(), r#"{"a":1}"#);
        assert_eq!(eval("   ", "[1]").unwrap(), "[1]");
    }

    #[test]
    fn test_type_errors() {
        assert_eq!(
            eval("a.b", r#"{"a":1}"#).unwrap_err().to_string(),
            "cannot index number with \"b\""
        );
        assert_eq!(
            eval("[0]", r#"{"a":1}"#).unwrap_err().to_string(),
            "cannot index object with number"
        );
    }

    #[test]
    fn test_invalid_input() {
        let err = eval("a", "{not json").unwrap_err();
        assert!(err.to_string().starts_with("invalid JSON input"));
    }

    #[test]
    fn test_yaml_to_json() {
        let mut engine = PathEngine::new();
        let request = EvalRequest {
            query: "server.ports".to_string(),
            data: TypedDocument::new("server:\n  ports: [80, 443]\n", DocumentKind::Yaml),
            output_type: DocumentKind::Json,
            indent: 2,
        };
        let output = engine
            .evaluate(&request, &CancellationToken::new())
            .unwrap();
        assert_eq!(output.content, "[\n  80,\n  443\n]");
    }
}
