//! Permissive grammar for function calls embedded in model text
//!
//! Models wrap their calls in chatter ("Sure! findTrees({...}) on it"), use
//! single quotes, bare keys, `key=value` pairs or trailing commas. The
//! parser finds the first `identifier(arguments)` in the text and reads the
//! arguments as strict JSON first, then as a relaxed object literal.

use crate::core::error::{AgentError, Result};
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0, one_of};
use nom::combinator::{all_consuming, map, opt};
use nom::error::{Error, ErrorKind};
use nom::multi::separated_list0;
use nom::sequence::{delimited, separated_pair, terminated};
use nom::{IResult, Parser};
use serde_json::{Map, Value};

/// Deepest bracket nesting accepted in argument text
const MAX_NESTING: usize = 32;

/// Characters scanned for the end of one call's arguments
const MAX_ARGUMENT_CHARS: usize = 2048;

/// A function-call-shaped substring of model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    /// Raw text between the parentheses (possibly empty)
    pub args: &'a str,
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Find the first `identifier(arguments)` in `text`
pub fn find_function_call(text: &str) -> Option<FunctionCall<'_>> {
    let mut previous: Option<char> = None;
    for (start, ch) in text.char_indices() {
        let at_word_start = is_word(ch) && !previous.is_some_and(is_word);
        previous = Some(ch);
        if !at_word_start {
            continue;
        }

        if let Ok((rest, name)) = call_head(&text[start..]) {
            if let Some(args) = argument_text(rest) {
                return Some(FunctionCall { name, args });
            }
        }
    }
    None
}

fn call_head(input: &str) -> IResult<&str, &str> {
    terminated(take_while1(is_word), char('(')).parse(input)
}

/// Text up to the `)` closing the call
///
/// Brackets and quoted strings are balanced. When the call is never closed
/// the first `)` on the same line is taken instead. Only the first
/// `MAX_ARGUMENT_CHARS` characters are looked at, so scanning every
/// candidate stays linear in the text length.
fn argument_text(rest: &str) -> Option<&str> {
    let end = rest
        .char_indices()
        .nth(MAX_ARGUMENT_CHARS)
        .map_or(rest.len(), |(i, _)| i);
    let rest = &rest[..end];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(&rest[..i]),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    let line = rest.split('\n').next().unwrap_or("");
    line.find(')').map(|i| &line[..i])
}

/// Parse argument text into a parameter object
///
/// Empty text is an empty object. Anything that is neither JSON nor a
/// relaxed object literal is a `Resolution` error.
pub fn parse_arguments(text: &str) -> Result<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    if nesting_depth(trimmed) > MAX_NESTING {
        return Err(AgentError::Resolution(format!(
            "arguments nested deeper than {}",
            MAX_NESTING
        )));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => {
            return Err(AgentError::Resolution(format!(
                "arguments are not an object: {}",
                other
            )))
        }
        Err(_) => {}
    }

    all_consuming(delimited(multispace0, alt((object, members)), multispace0))
        .parse(trimmed)
        .map(|(_, map)| map)
        .map_err(|e| AgentError::Resolution(format!("unparsable arguments '{}': {}", trimmed, e)))
}

fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                max = max.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

fn object(input: &str) -> IResult<&str, Map<String, Value>> {
    delimited((char('{'), multispace0), members, (multispace0, char('}'))).parse(input)
}

fn members(input: &str) -> IResult<&str, Map<String, Value>> {
    map(
        terminated(
            separated_list0((multispace0, char(','), multispace0), member),
            opt((multispace0, char(','))),
        ),
        |pairs| pairs.into_iter().collect(),
    )
    .parse(input)
}

fn member(input: &str) -> IResult<&str, (String, Value)> {
    separated_pair(key, (multispace0, one_of(":="), multispace0), value).parse(input)
}

fn key(input: &str) -> IResult<&str, String> {
    alt((quoted, map(take_while1(is_word), String::from))).parse(input)
}

fn value(input: &str) -> IResult<&str, Value> {
    alt((
        map(quoted, Value::String),
        map(object, Value::Object),
        map(array, Value::Array),
        map(bare_word, classify_bare),
    ))
    .parse(input)
}

fn array(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        (char('['), multispace0),
        terminated(
            separated_list0((multispace0, char(','), multispace0), value),
            opt((multispace0, char(','))),
        ),
        (multispace0, char(']')),
    )
    .parse(input)
}

fn bare_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| is_word(c) || matches!(c, '-' | '+' | '.')).parse(input)
}

fn classify_bare(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" | "undefined" => Value::Null,
        _ => {
            if let Ok(i) = word.parse::<i64>() {
                Value::from(i)
            } else if let Some(n) = word.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(word.to_string())
            }
        }
    }
}

/// Single- or double-quoted string with backslash escapes
fn quoted(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}
