//! Transformations applied to a resolved secret value, written after the
//! placeholder reference as `<path:kv/app#config | jsonParse | jsonPath {.db.host}>`.

use avp_core::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    Base64Encode,
    Base64Decode,
    JsonParse,
    YamlParse,
    JsonPath(JsonPath),
    Indent(usize),
    Sha256Sum,
}

impl Modifier {
    /// Parse one `name [argument]` segment
    pub fn parse(segment: &str) -> Result<Self> {
        let segment = segment.trim();
        let (name, argument) = match segment.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, Some(argument.trim())),
            None => (segment, None),
        };

        let modifier = match (name, argument) {
            ("base64encode", None) => Modifier::Base64Encode,
            ("base64decode", None) => Modifier::Base64Decode,
            ("jsonParse", None) => Modifier::JsonParse,
            ("yamlParse", None) => Modifier::YamlParse,
            ("sha256sum", None) => Modifier::Sha256Sum,
            ("jsonPath", Some(expression)) => Modifier::JsonPath(JsonPath::parse(expression)?),
            ("indent", Some(width)) => Modifier::Indent(width.parse().map_err(|_| {
                Error::modifier(segment, format!("'{width}' is not a valid indent width"))
            })?),
            ("jsonPath" | "indent", None) => {
                return Err(Error::modifier(name, "missing argument"));
            }
            (
                "base64encode" | "base64decode" | "jsonParse" | "yamlParse" | "sha256sum",
                Some(_),
            ) => {
                return Err(Error::modifier(segment, "takes no argument"));
            }
            _ => return Err(Error::modifier(name, "unknown modifier")),
        };
        Ok(modifier)
    }

    /// Apply the modifier to a resolved value
    pub fn apply(&self, value: Value) -> Result<Value> {
        let fail = |message: String| Error::modifier(self.to_string(), message);

        match self {
            Modifier::Base64Encode => Ok(Value::String(STANDARD.encode(stringify(&value)))),
            Modifier::Base64Decode => {
                let bytes = STANDARD
                    .decode(stringify(&value).trim())
                    .map_err(|e| fail(e.to_string()))?;
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|_| fail("decoded value is not valid UTF-8".to_string()))
            }
            Modifier::JsonParse => {
                serde_json::from_str(&stringify(&value)).map_err(|e| fail(e.to_string()))
            }
            Modifier::YamlParse => {
                serde_yaml::from_str(&stringify(&value)).map_err(|e| fail(e.to_string()))
            }
            Modifier::JsonPath(path) => {
                if !matches!(value, Value::Object(_) | Value::Array(_)) {
                    return Err(fail(
                        "input is not structured, apply jsonParse or yamlParse first".to_string(),
                    ));
                }
                path.select(&value).cloned().ok_or_else(|| {
                    fail(format!("{path} did not match anything"))
                })
            }
            Modifier::Indent(width) => {
                let padding = format!("\n{}", " ".repeat(*width));
                Ok(Value::String(stringify(&value).replace('\n', &padding)))
            }
            Modifier::Sha256Sum => {
                let digest = Sha256::digest(stringify(&value).as_bytes());
                Ok(Value::String(hex::encode(digest)))
            }
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Base64Encode => write!(f, "base64encode"),
            Modifier::Base64Decode => write!(f, "base64decode"),
            Modifier::JsonParse => write!(f, "jsonParse"),
            Modifier::YamlParse => write!(f, "yamlParse"),
            Modifier::JsonPath(path) => write!(f, "jsonPath {path}"),
            Modifier::Indent(width) => write!(f, "indent {width}"),
            Modifier::Sha256Sum => write!(f, "sha256sum"),
        }
    }
}

/// Text form of a resolved value: strings as-is, everything else as JSON
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A restricted JSONPath: `{.field}`, `{.list[0]}`, `{['dotted.key']}` and
/// chains of those, optionally rooted with `$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    expression: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
}

impl JsonPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |message: &str| Error::modifier(format!("jsonPath {expression}"), message);

        let inner = expression
            .trim()
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| invalid("expression must be wrapped in braces"))?
            .trim();
        let inner = inner.strip_prefix('$').unwrap_or(inner);

        let mut segments = Vec::new();
        let mut rest = inner;
        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot.find(|c: char| c == '.' || c == '[').unwrap_or(after_dot.len());
                let field = &after_dot[..end];
                if field.is_empty() {
                    // `{.}` selects the whole value
                    if after_dot.is_empty() && segments.is_empty() {
                        break;
                    }
                    return Err(invalid("empty field name"));
                }
                segments.push(Segment::Field(field.to_string()));
                rest = &after_dot[end..];
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let end = after_bracket
                    .find(']')
                    .ok_or_else(|| invalid("unterminated '['"))?;
                let token = after_bracket[..end].trim();
                let quoted = token
                    .strip_prefix('\'')
                    .and_then(|t| t.strip_suffix('\''))
                    .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')));
                let segment = match quoted {
                    Some(field) => Segment::Field(field.to_string()),
                    None => Segment::Index(
                        token
                            .parse()
                            .map_err(|_| invalid("index must be a non-negative integer"))?,
                    ),
                };
                segments.push(segment);
                rest = &after_bracket[end + 1..];
            } else {
                return Err(invalid("expected '.' or '['"));
            }
        }

        Ok(Self {
            expression: expression.trim().to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn select<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Field(name) => current.get(name.as_str()),
                Segment::Index(index) => current.get(*index),
            })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
