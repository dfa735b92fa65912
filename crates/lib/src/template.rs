//! Brace-style template rendering.
//!
//! Templates are used for pack names and descriptions (`{normalized_name}_resources`)
//! and for generated item names (`beet:generated/function_{id:08X}`).
//!
//! # Syntax
//!
//! - `{name}` - substitute the variable `name`
//! - `{name:spec}` - substitute with a format spec of the form `[0][width][type]`,
//!   where `type` is one of `d`, `x`, `X`, `o`, `b` for integers or `s` for text
//! - `{{` and `}}` - literal braces
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use beet_lib::template::{render, Value};
//!
//! let mut vars = BTreeMap::new();
//! vars.insert("id".to_string(), Value::Int(10));
//! assert_eq!(render("ns:generated/{id:08X}", &vars).unwrap(), "ns:generated/0000000A");
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// A value that can be substituted into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Text(String),
  Int(u64),
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Text(value.to_string())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::Text(value)
  }
}

impl From<u64> for Value {
  fn from(value: u64) -> Self {
    Value::Int(value)
  }
}

/// Variables available while rendering a template.
pub type Variables = BTreeMap<String, Value>;

/// Widest padding a format spec may ask for.
pub const MAX_WIDTH: usize = 256;

/// A parsed format spec (`08X` in `{id:08X}`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spec {
  pub zero_pad: bool,
  pub width: usize,
  pub kind: Option<char>,
}

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text, with `{{`/`}}` escapes already collapsed
  Literal(String),

  /// A replacement field
  Field { name: String, spec: Spec },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed replacement field at position {0}")]
  Unclosed(usize),

  #[error("single '}}' encountered at position {0}")]
  StrayBrace(usize),

  #[error("empty replacement field at position {0}")]
  EmptyField(usize),

  #[error("invalid format spec '{0}'")]
  InvalidSpec(String),

  #[error("unknown template variable '{0}'")]
  UnknownVariable(String),

  #[error("format spec '{spec}' cannot be applied to {value}")]
  IncompatibleSpec { spec: String, value: String },
}

/// Parse a template into segments.
///
/// # Errors
///
/// Returns an error if a field is unclosed or empty, if a lone `}` appears,
/// or if a format spec is malformed.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      '{' => {
        if let Some((_, '{')) = chars.peek() {
          chars.next();
          literal.push('{');
          continue;
        }

        let mut content = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          content.push(c);
        }

        if !found_close {
          return Err(TemplateError::Unclosed(pos));
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(parse_field(&content, pos)?);
      }
      '}' => match chars.peek() {
        Some((_, '}')) => {
          chars.next();
          literal.push('}');
        }
        _ => return Err(TemplateError::StrayBrace(pos)),
      },
      _ => literal.push(ch),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn parse_field(content: &str, pos: usize) -> Result<Segment, TemplateError> {
  let (name, spec) = match content.split_once(':') {
    Some((name, spec)) => (name, parse_spec(spec)?),
    None => (content, Spec::default()),
  };

  if name.is_empty() {
    return Err(TemplateError::EmptyField(pos));
  }

  Ok(Segment::Field {
    name: name.to_string(),
    spec,
  })
}

fn parse_spec(raw: &str) -> Result<Spec, TemplateError> {
  let invalid = || TemplateError::InvalidSpec(raw.to_string());
  let mut spec = Spec::default();
  let mut rest = raw;

  if let Some(stripped) = rest.strip_prefix('0') {
    spec.zero_pad = true;
    rest = stripped;
  }

  let digits = rest.chars().take_while(char::is_ascii_digit).count();
  if digits > 0 {
    spec.width = rest[..digits].parse().map_err(|_| invalid())?;
    if spec.width > MAX_WIDTH {
      return Err(invalid());
    }
    rest = &rest[digits..];
  }

  let mut kind = rest.chars();
  spec.kind = kind.next();
  if kind.next().is_some() {
    return Err(invalid());
  }

  match spec.kind {
    None | Some('d' | 'x' | 'X' | 'o' | 'b' | 's') => Ok(spec),
    Some(_) => Err(invalid()),
  }
}

/// Render a template with the given variables.
///
/// # Errors
///
/// Returns an error if parsing fails, if a field names an unknown variable, or
/// if a format spec does not fit the variable's value.
pub fn render(input: &str, vars: &Variables) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  render_segments(&segments, vars)
}

/// Render pre-parsed segments.
pub fn render_segments(segments: &[Segment], vars: &Variables) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Field { name, spec } => {
        let value = vars
          .get(name)
          .ok_or_else(|| TemplateError::UnknownVariable(name.clone()))?;
        result.push_str(&format_value(value, spec)?);
      }
    }
  }

  Ok(result)
}

fn format_value(value: &Value, spec: &Spec) -> Result<String, TemplateError> {
  let width = spec.width;
  match (value, spec.kind) {
    (Value::Int(n), None | Some('d')) if spec.zero_pad => Ok(format!("{n:0width$}")),
    (Value::Int(n), None | Some('d')) => Ok(format!("{n:>width$}")),
    (Value::Int(n), Some('x')) if spec.zero_pad => Ok(format!("{n:0width$x}")),
    (Value::Int(n), Some('x')) => Ok(format!("{:>width$}", format!("{n:x}"))),
    (Value::Int(n), Some('X')) if spec.zero_pad => Ok(format!("{n:0width$X}")),
    (Value::Int(n), Some('X')) => Ok(format!("{:>width$}", format!("{n:X}"))),
    (Value::Int(n), Some('o')) if spec.zero_pad => Ok(format!("{n:0width$o}")),
    (Value::Int(n), Some('o')) => Ok(format!("{:>width$}", format!("{n:o}"))),
    (Value::Int(n), Some('b')) if spec.zero_pad => Ok(format!("{n:0width$b}")),
    (Value::Int(n), Some('b')) => Ok(format!("{:>width$}", format!("{n:b}"))),
    (Value::Text(s), None | Some('s')) if !spec.zero_pad => Ok(format!("{s:<width$}")),
    (value, _) => Err(TemplateError::IncompatibleSpec {
      spec: spec_to_string(spec),
      value: match value {
        Value::Text(_) => "text".to_string(),
        Value::Int(_) => "an integer".to_string(),
      },
    }),
  }
}

fn spec_to_string(spec: &Spec) -> String {
  let mut out = String::new();
  if spec.zero_pad {
    out.push('0');
  }
  if spec.width > 0 {
    out.push_str(&spec.width.to_string());
  }
  if let Some(kind) = spec.kind {
    out.push(kind);
  }
  out
}
