//! Statically declared operation signatures and argument binding.
//!
//! Every operation declares its parameters up front. Binding happens once,
//! when a unit of work is created, and fails fast on arity, name, or type
//! mismatches. Only the supplied arguments are stored; defaults are filled in
//! when the arguments are read.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::display::TemplateError;
use crate::core::value::Value;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Bool,
    /// Any JSON value.
    Any,
}

impl ParamType {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Bool => value.is_boolean(),
            ParamType::Any => true,
        }
    }

    /// Parse a raw command-line string into a value of this type.
    ///
    /// `Any` accepts JSON and falls back to the raw string.
    pub fn parse(self, raw: &str) -> Option<Value> {
        match self {
            ParamType::String => Some(Value::String(raw.to_string())),
            ParamType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            ParamType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            ParamType::Bool => match raw.trim() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            ParamType::Any => Some(
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
            ),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Any => "any",
        };
        f.write_str(name)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamType,
    pub default: Option<Value>,
    /// Help text shown by the command-line dispatcher.
    pub help: Option<String>,
}

impl Param {
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            help: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::required(name, kind)
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Errors raised while registering an operation.
#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("operation name must not be empty")]
    EmptyName,
    #[error("{operation}: parameter name must not be empty")]
    EmptyParameter { operation: String },
    #[error("{operation}: duplicate parameter `{name}`")]
    DuplicateParameter { operation: String, name: String },
    #[error("{operation}: required parameter `{name}` follows a parameter with a default")]
    RequiredAfterDefault { operation: String, name: String },
    #[error("{operation}: default for `{name}` is not a {expected}")]
    DefaultTypeMismatch {
        operation: String,
        name: String,
        expected: ParamType,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Errors raised while binding arguments to a signature.
///
/// Binding errors are never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("{operation}: takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        operation: String,
        expected: usize,
        given: usize,
    },
    #[error("{operation}: unknown parameter `{name}`")]
    UnknownParameter { operation: String, name: String },
    #[error("{operation}: multiple values for parameter `{name}`")]
    DuplicateArgument { operation: String, name: String },
    #[error("{operation}: missing required argument `{name}`")]
    MissingArgument { operation: String, name: String },
    #[error("{operation}: `{name}` expects {expected}, got {found}")]
    TypeMismatch {
        operation: String,
        name: String,
        expected: ParamType,
        found: &'static str,
    },
    #[error("{operation}: `{name}` expects {expected}, could not parse {raw:?}")]
    InvalidValue {
        operation: String,
        name: String,
        expected: ParamType,
        raw: String,
    },
}

/// Declared parameter list of an operation, validated at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    name: String,
    summary: Option<String>,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: Vec<Param>) -> Result<Self, SignatureError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SignatureError::EmptyName);
        }
        let mut seen_default = false;
        for (index, param) in params.iter().enumerate() {
            if param.name.trim().is_empty() {
                return Err(SignatureError::EmptyParameter { operation: name });
            }
            if params[..index].iter().any(|p| p.name == param.name) {
                return Err(SignatureError::DuplicateParameter {
                    operation: name,
                    name: param.name.clone(),
                });
            }
            match &param.default {
                Some(default) => {
                    if !param.kind.accepts(default) {
                        return Err(SignatureError::DefaultTypeMismatch {
                            operation: name,
                            name: param.name.clone(),
                            expected: param.kind,
                        });
                    }
                    seen_default = true;
                }
                None if seen_default => {
                    return Err(SignatureError::RequiredAfterDefault {
                        operation: name,
                        name: param.name.clone(),
                    });
                }
                None => {}
            }
        }
        Ok(Self {
            name,
            summary: None,
            params,
        })
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Bind positional and keyword arguments to this signature.
    pub fn bind(&self, args: Args) -> Result<BoundArguments, BindingError> {
        if args.positional.len() > self.params.len() {
            return Err(BindingError::TooManyPositional {
                operation: self.name.clone(),
                expected: self.params.len(),
                given: args.positional.len(),
            });
        }

        let mut supplied: Vec<Option<Value>> = vec![None; self.params.len()];
        for (slot, value) in supplied.iter_mut().zip(args.positional) {
            *slot = Some(value);
        }
        for (name, value) in args.keyword {
            let index = self
                .position(&name)
                .ok_or_else(|| BindingError::UnknownParameter {
                    operation: self.name.clone(),
                    name: name.clone(),
                })?;
            if supplied[index].is_some() {
                return Err(BindingError::DuplicateArgument {
                    operation: self.name.clone(),
                    name,
                });
            }
            supplied[index] = Some(value);
        }

        for (param, slot) in self.params.iter().zip(&supplied) {
            match slot {
                None if param.default.is_none() => {
                    return Err(BindingError::MissingArgument {
                        operation: self.name.clone(),
                        name: param.name.clone(),
                    });
                }
                Some(value) if !param.kind.accepts(value) => {
                    return Err(BindingError::TypeMismatch {
                        operation: self.name.clone(),
                        name: param.name.clone(),
                        expected: param.kind,
                        found: type_name(value),
                    });
                }
                _ => {}
            }
        }

        Ok(BoundArguments { supplied })
    }
}

/// Positional and keyword arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

/// Arguments as supplied at construction, indexed by parameter position.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments {
    supplied: Vec<Option<Value>>,
}

impl BoundArguments {
    /// Ordered view with defaults filled in for unsupplied parameters.
    pub fn with_defaults(&self, signature: &Signature) -> Arguments {
        let values = signature
            .params()
            .iter()
            .zip(&self.supplied)
            .map(|(param, slot)| {
                let value = slot
                    .clone()
                    .or_else(|| param.default.clone())
                    .unwrap_or(Value::Null);
                (param.name.clone(), value)
            })
            .collect();
        Arguments {
            operation: signature.name().to_string(),
            values,
        }
    }

    pub fn is_supplied(&self, index: usize) -> bool {
        matches!(self.supplied.get(index), Some(Some(_)))
    }
}

/// Named arguments in declaration order, defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments {
    operation: String,
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn str(&self, name: &str) -> Result<&str, BindingError> {
        let value = self.require(name)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(name, ParamType::String, value))
    }

    pub fn i64(&self, name: &str) -> Result<i64, BindingError> {
        let value = self.require(name)?;
        value
            .as_i64()
            .ok_or_else(|| self.mismatch(name, ParamType::Integer, value))
    }

    pub fn u64(&self, name: &str) -> Result<u64, BindingError> {
        let value = self.require(name)?;
        value
            .as_u64()
            .ok_or_else(|| self.mismatch(name, ParamType::Integer, value))
    }

    pub fn f64(&self, name: &str) -> Result<f64, BindingError> {
        let value = self.require(name)?;
        value
            .as_f64()
            .ok_or_else(|| self.mismatch(name, ParamType::Float, value))
    }

    pub fn bool(&self, name: &str) -> Result<bool, BindingError> {
        let value = self.require(name)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(name, ParamType::Bool, value))
    }

    fn require(&self, name: &str) -> Result<&Value, BindingError> {
        self.get(name).ok_or_else(|| BindingError::UnknownParameter {
            operation: self.operation.clone(),
            name: name.to_string(),
        })
    }

    fn mismatch(&self, name: &str, expected: ParamType, value: &Value) -> BindingError {
        BindingError::TypeMismatch {
            operation: self.operation.clone(),
            name: name.to_string(),
            expected,
            found: type_name(value),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
