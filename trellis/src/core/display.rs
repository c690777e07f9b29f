//! How a unit of work renders itself in trace lines.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::signature::{Arguments, Signature};
use crate::core::value::{display_str, repr};

/// Formatting function over the named arguments.
pub type Formatter = Arc<dyn Fn(&Arguments) -> String + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {template:?} names unknown parameter `{name}`")]
    UnknownPlaceholder { template: String, name: String },
    #[error("template {template:?} has an unmatched `{brace}` at byte {offset}")]
    UnbalancedBrace {
        template: String,
        brace: char,
        offset: usize,
    },
}

/// Display configuration of an operation.
#[derive(Clone, Default)]
pub enum Display {
    /// `name(arg='value', ...)` in declaration order.
    #[default]
    Default,
    Template(Template),
    Formatter(Formatter),
}

impl Display {
    pub fn formatter<F>(f: F) -> Self
    where
        F: Fn(&Arguments) -> String + Send + Sync + 'static,
    {
        Display::Formatter(Arc::new(f))
    }

    pub fn render(&self, signature: &Signature, args: &Arguments) -> String {
        match self {
            Display::Default => default_rendering(signature.name(), args),
            Display::Template(template) => template.render(args),
            Display::Formatter(f) => f(args),
        }
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Display::Default => f.write_str("Default"),
            Display::Template(template) => f.debug_tuple("Template").field(&template.source).finish(),
            Display::Formatter(_) => f.write_str("Formatter(..)"),
        }
    }
}

fn default_rendering(name: &str, args: &Arguments) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|(param, value)| format!("{param}={}", repr(value)))
        .collect();
    format!("{name}({})", rendered.join(", "))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(String),
}

/// `{name}` substitution template, checked against a signature when compiled.
///
/// `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn compile(source: &str, signature: &Signature) -> Result<Self, TemplateError> {
        use std::sync::LazyLock;
        static TOKEN_RE: LazyLock<regex::Regex> =
            LazyLock::new(|| regex::Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").unwrap());

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut last = 0;
        for caps in TOKEN_RE.captures_iter(source) {
            let Some(token) = caps.get(0) else { continue };
            literal.push_str(&source[last..token.start()]);
            last = token.end();
            match token.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                "{" | "}" => {
                    return Err(TemplateError::UnbalancedBrace {
                        template: source.to_string(),
                        brace: token.as_str().chars().next().unwrap_or('{'),
                        offset: token.start(),
                    });
                }
                _ => {
                    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    if signature.position(name).is_none() {
                        return Err(TemplateError::UnknownPlaceholder {
                            template: source.to_string(),
                            name: name.to_string(),
                        });
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Field(name.to_string()));
                }
            }
        }
        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, args: &Arguments) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field(name) => {
                    if let Some(value) = args.get(name) {
                        out.push_str(&display_str(value));
                    }
                }
            }
        }
        out
    }
}
