// param.rs — Block parameters and schema-checked access
//
// A `ParamSet` is the loosely typed key/value bag the editor stores per node.
// Each block type declares a `ParamSpec` table (see block.rs); `ParamReader`
// reads values through that table, falling back to the declared default, and
// turns every out-of-schema value into a `ShapeError::InvalidParam` so that
// schema violations flow through the same channel as dimension errors.
//
// Preconditions: none.
// Postconditions: accessors never panic; they return a value within the
//   declared bounds or an `InvalidParam` failure.
// Failure modes: wrong kind, non-integral integer, out of bounds, unknown choice.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

// ── Values ──────────────────────────────────────────────────────────────────

/// A single parameter value as stored by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Seq(Vec<f64>),
    Text(String),
    /// Anything else the document holds (`null`, objects, mixed arrays).
    /// Decodes fine; every schema rejects it.
    Other(serde_json::Value),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Seq(items) => {
                write!(f, "[")?;
                for (i, n) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", n)?;
                }
                write!(f, "]")
            }
            ParamValue::Text(s) => write!(f, "{:?}", s),
            ParamValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<u64> for ParamValue {
    fn from(n: u64) -> Self {
        ParamValue::Number(n as f64)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(items: Vec<f64>) -> Self {
        ParamValue::Seq(items)
    }
}

/// Parameter bag of one node. Ordered so that serialization is canonical.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(pub BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

// ── Schema ──────────────────────────────────────────────────────────────────

/// Editor-facing kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Whole number.
    Int,
    /// Real number.
    Float,
    /// One of `options`.
    Select,
    Boolean,
    /// A number or a `[h, w]` pair.
    Tuple,
    /// Free text.
    Text,
}

/// Declared default of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Number(f64),
    Text(&'static str),
    Bool(bool),
}

impl ParamDefault {
    pub fn to_value(self) -> ParamValue {
        match self {
            ParamDefault::Number(n) => ParamValue::Number(n),
            ParamDefault::Text(s) => ParamValue::Text(s.to_string()),
            ParamDefault::Bool(b) => ParamValue::Bool(b),
        }
    }
}

/// One entry of a block's parameter schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub options: &'static [&'static str],
    pub default: ParamDefault,
}

impl ParamSpec {
    pub const fn int(key: &'static str, min: f64, default: f64) -> Self {
        ParamSpec {
            key,
            kind: ParamKind::Int,
            min: Some(min),
            max: None,
            options: &[],
            default: ParamDefault::Number(default),
        }
    }

    pub const fn float(key: &'static str, min: f64, max: f64, default: f64) -> Self {
        ParamSpec {
            key,
            kind: ParamKind::Float,
            min: Some(min),
            max: Some(max),
            options: &[],
            default: ParamDefault::Number(default),
        }
    }

    pub const fn tuple(key: &'static str, min: f64, default: f64) -> Self {
        ParamSpec {
            key,
            kind: ParamKind::Tuple,
            min: Some(min),
            max: None,
            options: &[],
            default: ParamDefault::Number(default),
        }
    }

    pub const fn select(
        key: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        ParamSpec {
            key,
            kind: ParamKind::Select,
            min: None,
            max: None,
            options,
            default: ParamDefault::Text(default),
        }
    }

    pub const fn boolean(key: &'static str, default: bool) -> Self {
        ParamSpec {
            key,
            kind: ParamKind::Boolean,
            min: None,
            max: None,
            options: &[],
            default: ParamDefault::Bool(default),
        }
    }

    pub const fn text(key: &'static str, default: &'static str) -> Self {
        ParamSpec {
            key,
            kind: ParamKind::Text,
            min: None,
            max: None,
            options: &[],
            default: ParamDefault::Text(default),
        }
    }

    pub const fn with_range(self, min: f64, max: f64) -> Self {
        ParamSpec {
            min: Some(min),
            max: Some(max),
            ..self
        }
    }

    /// Check one value against this spec.
    pub fn check(&self, value: &ParamValue) -> Result<(), ShapeError> {
        match (self.kind, value) {
            (ParamKind::Int, ParamValue::Number(n)) => {
                self.check_number(*n)?;
                self.check_integral(*n)
            }
            (ParamKind::Float, ParamValue::Number(n)) => self.check_number(*n),
            (ParamKind::Tuple, ParamValue::Number(n)) => {
                self.check_number(*n)?;
                self.check_integral(*n)
            }
            (ParamKind::Tuple, ParamValue::Seq(items)) => {
                if items.len() != 2 {
                    return Err(ShapeError::invalid_param(
                        self.key,
                        format!("expected a number or a pair, got {} values", items.len()),
                    ));
                }
                for n in items {
                    self.check_number(*n)?;
                    self.check_integral(*n)?;
                }
                Ok(())
            }
            (ParamKind::Select, ParamValue::Text(s)) => {
                if self.options.iter().any(|o| o.eq_ignore_ascii_case(s)) {
                    Ok(())
                } else {
                    Err(ShapeError::invalid_param(
                        self.key,
                        format!("'{}' is not one of {}", s, self.options.join(", ")),
                    ))
                }
            }
            (ParamKind::Boolean, ParamValue::Bool(_)) => Ok(()),
            (ParamKind::Text, ParamValue::Text(_)) => Ok(()),
            (kind, other) => Err(ShapeError::invalid_param(
                self.key,
                format!("expected {}, got {}", kind_name(kind), other),
            )),
        }
    }

    fn check_number(&self, n: f64) -> Result<(), ShapeError> {
        if !n.is_finite() {
            return Err(ShapeError::invalid_param(self.key, "value is not finite"));
        }
        if let Some(min) = self.min {
            if n < min {
                return Err(ShapeError::invalid_param(
                    self.key,
                    format!("{} is below the minimum {}", n, min),
                ));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return Err(ShapeError::invalid_param(
                    self.key,
                    format!("{} is above the maximum {}", n, max),
                ));
            }
        }
        Ok(())
    }

    fn check_integral(&self, n: f64) -> Result<(), ShapeError> {
        if n.fract() != 0.0 {
            return Err(ShapeError::invalid_param(
                self.key,
                format!("{} is not a whole number", n),
            ));
        }
        Ok(())
    }
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Int => "a whole number",
        ParamKind::Float => "a number",
        ParamKind::Select => "a choice",
        ParamKind::Boolean => "a boolean",
        ParamKind::Tuple => "a number or a pair",
        ParamKind::Text => "text",
    }
}

/// Check every declared parameter (explicit value or default) in declaration
/// order. Keys not in the schema are ignored; the editor may store extra data.
pub fn check_schema(specs: &[ParamSpec], params: &ParamSet) -> Result<(), ShapeError> {
    for spec in specs {
        if let Some(value) = params.get(spec.key) {
            spec.check(value)?;
        }
    }
    Ok(())
}

// ── Typed access ────────────────────────────────────────────────────────────

/// Schema-aware reader over one node's parameters.
pub struct ParamReader<'a> {
    specs: &'static [ParamSpec],
    params: &'a ParamSet,
}

impl<'a> ParamReader<'a> {
    pub fn new(specs: &'static [ParamSpec], params: &'a ParamSet) -> Self {
        ParamReader { specs, params }
    }

    fn spec(&self, key: &str) -> Result<&'static ParamSpec, ShapeError> {
        self.specs
            .iter()
            .find(|s| s.key == key)
            .ok_or_else(|| ShapeError::invalid_param(key, "not declared for this block"))
    }

    /// The explicit value, or the declared default, after schema checks.
    fn value(&self, key: &str) -> Result<ParamValue, ShapeError> {
        let spec = self.spec(key)?;
        let value = match self.params.get(key) {
            Some(v) => v.clone(),
            None => spec.default.to_value(),
        };
        spec.check(&value)?;
        Ok(value)
    }

    /// Non-negative whole number.
    pub fn uint(&self, key: &str) -> Result<u64, ShapeError> {
        match self.value(key)? {
            ParamValue::Number(n) if n >= 0.0 => Ok(n as u64),
            other => Err(ShapeError::invalid_param(
                key,
                format!("expected a non-negative whole number, got {}", other),
            )),
        }
    }

    /// Optional size constraint where 0 means "unconstrained".
    pub fn size_constraint(&self, key: &str) -> Result<Option<u64>, ShapeError> {
        Ok(Some(self.uint(key)?).filter(|&n| n > 0))
    }

    /// Signed whole number (axis indices).
    pub fn int(&self, key: &str) -> Result<i64, ShapeError> {
        match self.value(key)? {
            ParamValue::Number(n) => Ok(n as i64),
            other => Err(ShapeError::invalid_param(
                key,
                format!("expected a whole number, got {}", other),
            )),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool, ShapeError> {
        match self.value(key)? {
            ParamValue::Bool(b) => Ok(b),
            other => Err(ShapeError::invalid_param(
                key,
                format!("expected a boolean, got {}", other),
            )),
        }
    }

    pub fn text(&self, key: &str) -> Result<String, ShapeError> {
        match self.value(key)? {
            ParamValue::Text(s) => Ok(s),
            other => Err(ShapeError::invalid_param(
                key,
                format!("expected text, got {}", other),
            )),
        }
    }

    /// `(h, w)` from either a single number or a two-element sequence.
    pub fn pair(&self, key: &str) -> Result<(u64, u64), ShapeError> {
        match self.value(key)? {
            ParamValue::Number(n) => Ok((n as u64, n as u64)),
            ParamValue::Seq(items) if items.len() == 2 => Ok((items[0] as u64, items[1] as u64)),
            other => Err(ShapeError::invalid_param(
                key,
                format!("expected a number or a pair, got {}", other),
            )),
        }
    }
}
