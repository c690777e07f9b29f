//! Registered operations and the units of work bound from them.
//!
//! An [`Operation`] is declared once: signature, display, retry eligibility,
//! start-line severity, and a factory that builds a fresh [`Body`] for every
//! attempt. [`Operation::bind`] produces a [`Unit`], one invocation with its
//! own arguments and resolution slot, which is driven by
//! [`Unit::execute`](crate::unit::Unit::execute) exactly once.

use std::fmt;
use std::sync::Arc;

use crate::core::display::{Display, Template};
use crate::core::resolution::{Failure, Resolution};
use crate::core::signature::{
    Arguments, Args, BindingError, BoundArguments, Signature, SignatureError,
};
use crate::core::step::{Body, Leaf, Sequence};
use crate::core::value::Value;
use crate::trace::Severity;

/// Builds the body for one attempt from the unit's arguments.
pub type BodyFactory = Arc<dyn Fn(&Arguments) -> Result<Box<dyn Body>, Failure> + Send + Sync>;

struct OperationInner {
    signature: Signature,
    display: Display,
    retryable: bool,
    severity: Severity,
    factory: BodyFactory,
}

/// A registered operation. Cheap to clone.
#[derive(Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

impl Operation {
    pub fn builder(signature: Signature) -> OperationBuilder {
        OperationBuilder {
            signature,
            template: None,
            display: Display::Default,
            retryable: false,
            severity: Severity::Info,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.signature.name()
    }

    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    pub fn is_retryable(&self) -> bool {
        self.inner.retryable
    }

    /// Bind arguments eagerly; the returned unit is ready to execute.
    pub fn bind(&self, args: Args) -> Result<Unit, BindingError> {
        let arguments = self.inner.signature.bind(args)?;
        Ok(Unit {
            operation: self.clone(),
            arguments,
            retryable: self.inner.retryable,
            severity: self.inner.severity,
            resolution: Resolution::Pending,
        })
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .field("display", &self.inner.display)
            .field("retryable", &self.inner.retryable)
            .field("severity", &self.inner.severity)
            .finish_non_exhaustive()
    }
}

/// Collects an operation's configuration before its body is supplied.
pub struct OperationBuilder {
    signature: Signature,
    template: Option<String>,
    display: Display,
    retryable: bool,
    severity: Severity,
}

impl OperationBuilder {
    /// Render as a `{name}` template; checked against the signature on build.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arguments) -> String + Send + Sync + 'static,
    {
        self.template = None;
        self.display = Display::formatter(f);
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Finish with a body factory called once per attempt.
    pub fn body<F, B>(self, factory: F) -> Result<Operation, SignatureError>
    where
        F: Fn(&Arguments) -> Result<B, Failure> + Send + Sync + 'static,
        B: Body + 'static,
    {
        let factory: BodyFactory = Arc::new(move |args: &Arguments| {
            factory(args).map(|body| Box::new(body) as Box<dyn Body>)
        });
        self.build(factory)
    }

    /// Finish with a body that never suspends.
    pub fn leaf<F>(self, run: F) -> Result<Operation, SignatureError>
    where
        F: Fn(&Arguments) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        let run = Arc::new(run);
        self.body(move |args| {
            let run = Arc::clone(&run);
            let args = args.clone();
            Ok(Leaf::new(move || (*run)(&args)))
        })
    }

    /// Finish with a [`Sequence`] of children built per attempt.
    pub fn sequence<F>(self, children: F) -> Result<Operation, SignatureError>
    where
        F: Fn(&Arguments) -> Result<Sequence, Failure> + Send + Sync + 'static,
    {
        self.body(children)
    }

    fn build(self, factory: BodyFactory) -> Result<Operation, SignatureError> {
        let display = match &self.template {
            Some(source) => Display::Template(Template::compile(source, &self.signature)?),
            None => self.display,
        };
        Ok(Operation {
            inner: Arc::new(OperationInner {
                signature: self.signature,
                display,
                retryable: self.retryable,
                severity: self.severity,
                factory,
            }),
        })
    }
}

/// One bound invocation of an operation.
pub struct Unit {
    operation: Operation,
    arguments: BoundArguments,
    pub(crate) retryable: bool,
    pub(crate) severity: Severity,
    pub(crate) resolution: Resolution,
}

impl Unit {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Override the operation's retry eligibility for this unit only.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Override the start-line severity for this unit only.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Arguments in declaration order with defaults applied.
    pub fn arguments(&self) -> Arguments {
        self.arguments.with_defaults(self.operation.signature())
    }

    /// Trace text for this unit. Used only for tracing.
    pub fn render(&self) -> String {
        let inner = &self.operation.inner;
        inner.display.render(&inner.signature, &self.arguments())
    }

    pub(crate) fn instantiate(&self) -> Result<Box<dyn Body>, Failure> {
        (*self.operation.inner.factory)(&self.arguments())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("operation", &self.operation.name())
            .field("arguments", &self.arguments())
            .field("retryable", &self.retryable)
            .field("severity", &self.severity)
            .field("pending", &self.resolution.is_pending())
            .finish()
    }
}
