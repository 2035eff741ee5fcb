//! Values a description body's restricted scripting surface can produce,
//! and the substitution pass (§4.1 step 8) that resolves `${name}` tokens
//! against the project substitutions table.

use crate::utils::IResult;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Dict(Vec<(String, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn strings(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect(),
            Value::Str(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Resolves `${name}` tokens in `template` against `env`. The only
/// substitution key the engine itself provides is `project_root` (§9); a
/// reference to an unknown name is left untouched rather than failing, so a
/// toolchain extension free to define its own names doesn't need to be
/// plumbed through this function.
pub fn subst(template: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = template[i + 2..].find('}') {
                let name = &template[i + 2..i + 2 + end];
                if let Some(value) = env.get(name) {
                    out.push_str(value);
                } else {
                    out.push_str(&template[i..i + 2 + end + 1]);
                }
                i += 2 + end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Applies [`subst`] to every string leaf of a value, recursively.
pub fn subst_value(value: &Value, env: &HashMap<String, String>) -> Value {
    match value {
        Value::Str(s) => Value::Str(subst(s, env)),
        Value::List(items) => Value::List(items.iter().map(|v| subst_value(v, env)).collect()),
        Value::Dict(entries) => {
            Value::Dict(entries.iter().map(|(k, v)| (k.clone(), subst_value(v, env))).collect())
        }
        other => other.clone(),
    }
}

/// Parses one logical statement's right-hand side: a restricted literal
/// expression grammar - strings, integers, booleans, `None`, lists, dicts,
/// identifier references (resolved against `known`), and `+` concatenation
/// of two strings or two lists. No function calls, no control flow: this is
/// deliberately not a general-purpose expression language.
pub struct Parser<'a> {
    input: &'a str,
    pos: usize,
    known: &'a HashMap<String, Value>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, known: &'a HashMap<String, Value>) -> Self {
        Parser { input, pos: 0, known }
    }

    pub fn parse_expr(&mut self) -> IResult<Value> {
        let mut value = self.parse_atom()?;
        loop {
            self.skip_ws();
            if self.peek() == Some('+') {
                self.pos += 1;
                let rhs = self.parse_atom()?;
                value = concat(value, rhs)?;
            } else {
                break;
            }
        }
        Ok(value)
    }

    fn parse_atom(&mut self) -> IResult<Value> {
        self.skip_ws();
        match self.peek() {
            Some('\'') | Some('"') => self.parse_string(),
            Some('[') => self.parse_list(),
            Some('{') => self.parse_dict(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(_) => self.parse_ident(),
            None => anyhow::bail!("unexpected end of expression"),
        }
    }

    fn parse_string(&mut self) -> IResult<Value> {
        let quote = self.peek().unwrap();
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some() && self.peek() != Some(quote) {
            self.pos += 1;
        }
        if self.peek() != Some(quote) {
            anyhow::bail!("unterminated string literal");
        }
        let s = self.input[start..self.pos].to_owned();
        self.pos += 1;
        Ok(Value::Str(s))
    }

    fn parse_list(&mut self) -> IResult<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.pos += 1;
                break;
            }
            items.push(self.parse_expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                _ => anyhow::bail!("expected `,` or `]` in list literal"),
            }
        }
        Ok(Value::List(items))
    }

    fn parse_dict(&mut self) -> IResult<Value> {
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                break;
            }
            let key = match self.parse_atom()? {
                Value::Str(s) => s,
                other => anyhow::bail!("dict keys must be string literals, got {other:?}"),
            };
            self.skip_ws();
            if self.peek() != Some(':') {
                anyhow::bail!("expected `:` after dict key `{key}`");
            }
            self.pos += 1;
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => anyhow::bail!("expected `,` or `}}` in dict literal"),
            }
        }
        Ok(Value::Dict(entries))
    }

    fn parse_number(&mut self) -> IResult<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| anyhow::anyhow!("invalid integer literal `{}`", &self.input[start..self.pos]))
    }

    fn parse_ident(&mut self) -> IResult<Value> {
        let start = self.pos;
        while self.peek().map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false) {
            self.pos += 1;
        }
        let ident = &self.input[start..self.pos];
        match ident {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::None),
            "" => anyhow::bail!("unexpected character `{:?}` in expression", self.peek()),
            name => self
                .known
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("reference to undefined name `{name}`")),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.pos += 1;
        }
    }
}

fn concat(lhs: Value, rhs: Value) -> IResult<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (a, b) => anyhow::bail!("cannot concatenate {a:?} with {b:?}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn substitutes_project_root() {
        let mut env = HashMap::new();
        env.insert("project_root".to_owned(), "/proj".to_owned());
        assert_eq!(subst("${project_root}/inc", &env), "/proj/inc");
        assert_eq!(subst("${unknown}/inc", &env), "${unknown}/inc");
    }

    #[test]
    fn parses_list_literal() {
        let known = HashMap::new();
        let mut p = Parser::new("['a.c', 'b.c']", &known);
        let v = p.parse_expr().unwrap();
        assert_eq!(v.strings(), vec!["a.c".to_owned(), "b.c".to_owned()]);
    }

    #[test]
    fn parses_dict_literal() {
        let known = HashMap::new();
        let mut p = Parser::new("{'zip_file': 'out.zip'}", &known);
        match p.parse_expr().unwrap() {
            Value::Dict(entries) => assert_eq!(entries[0].0, "zip_file"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn concatenates_lists_across_refinement() {
        let known = HashMap::new();
        let mut p = Parser::new("['a.c'] + ['b.c']", &known);
        assert_eq!(p.parse_expr().unwrap().strings(), vec!["a.c".to_owned(), "b.c".to_owned()]);
    }
}
