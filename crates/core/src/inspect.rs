//! Inspection result model
//!
//! Every pipe threads a single state value through its inspectors. The state
//! type decides, through [`Inspected`], whether a value is still a plain
//! target, an accepted result, an issue (the content failed a check) or an
//! exception (the operation itself failed). Pipes stop at the first issue or
//! exception.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Shared, cloneable error carried by an [`InspectionException`].
pub type InspectionError = Arc<dyn StdError + Send + Sync + 'static>;

/// Discriminant queries every pipe state answers.
pub trait Inspected {
    /// The subject the inspection started from.
    type Target;

    /// The pre-inspection subject, however many enrichments were layered on.
    fn inspection_target(&self) -> &Self::Target;

    /// `false` only while no inspector has touched the target.
    fn is_inspection_result(&self) -> bool;

    /// Diagnostics when this value is an issue.
    fn diagnostics(&self) -> Option<&Diagnostics>;

    /// The caught error when this value is an exception.
    fn exception(&self) -> Option<&InspectionError>;

    fn is_issue(&self) -> bool {
        self.diagnostics().is_some()
    }

    fn is_exception(&self) -> bool {
        self.exception().is_some()
    }

    /// Issues and exceptions halt a pipe.
    fn is_terminal(&self) -> bool {
        self.is_issue() || self.is_exception()
    }
}

/// Ordered, de-duplicated diagnostic messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<String>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message unless an identical one is already present.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.0.contains(&message) {
            self.0.push(message);
        }
    }

    pub fn unique_diagnostics(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<S> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut diagnostics = Diagnostics::new();
        for message in iter {
            diagnostics.push(message);
        }
        diagnostics
    }
}

impl From<&str> for Diagnostics {
    fn from(message: &str) -> Self {
        std::iter::once(message).collect()
    }
}

impl From<String> for Diagnostics {
    fn from(message: String) -> Self {
        std::iter::once(message).collect()
    }
}

impl From<Vec<String>> for Diagnostics {
    fn from(messages: Vec<String>) -> Self {
        messages.into_iter().collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

/// The subject completed its operation but failed a required condition.
#[derive(Debug, Clone)]
pub struct InspectionIssue<T> {
    pub subject: T,
    pub diagnostics: Diagnostics,
}

impl<T> InspectionIssue<T> {
    pub fn new(subject: T, diagnostics: impl Into<Diagnostics>) -> Self {
        Self {
            subject,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn unique_diagnostics(&self) -> &[String] {
        self.diagnostics.unique_diagnostics()
    }
}

/// The operation on the subject could not be completed.
#[derive(Debug, Clone)]
pub struct InspectionException<T> {
    pub subject: T,
    pub exception: InspectionError,
}

impl<T> InspectionException<T> {
    pub fn new<E>(subject: T, exception: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            subject,
            exception: Arc::new(exception),
        }
    }

    pub fn from_shared(subject: T, exception: InspectionError) -> Self {
        Self { subject, exception }
    }
}

/// General purpose pipe state for subjects that carry no fetch lifecycle.
#[derive(Debug, Clone)]
pub enum Inspection<T> {
    /// Not yet inspected.
    Target(T),
    /// Accepted, possibly enriched, by at least one inspector.
    Result(T),
    Issue(InspectionIssue<T>),
    Exception(InspectionException<T>),
}

impl<T> Inspection<T> {
    /// The current subject, whatever the discriminant.
    pub fn value(&self) -> &T {
        match self {
            Inspection::Target(value) | Inspection::Result(value) => value,
            Inspection::Issue(issue) => &issue.subject,
            Inspection::Exception(exception) => &exception.subject,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Inspection::Target(value) | Inspection::Result(value) => value,
            Inspection::Issue(issue) => issue.subject,
            Inspection::Exception(exception) => exception.subject,
        }
    }

    /// Turns the current value into an issue; an existing issue gains the
    /// new diagnostics.
    pub fn into_issue(self, diagnostics: impl Into<Diagnostics>) -> Self {
        let diagnostics = diagnostics.into();
        match self {
            Inspection::Issue(mut issue) => {
                for message in diagnostics.unique_diagnostics() {
                    issue.diagnostics.push(message.clone());
                }
                Inspection::Issue(issue)
            }
            other => Inspection::Issue(InspectionIssue::new(other.into_value(), diagnostics)),
        }
    }
}

impl<T> Inspected for Inspection<T> {
    type Target = T;

    fn inspection_target(&self) -> &T {
        self.value()
    }

    fn is_inspection_result(&self) -> bool {
        !matches!(self, Inspection::Target(_))
    }

    fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Inspection::Issue(issue) => Some(&issue.diagnostics),
            _ => None,
        }
    }

    fn exception(&self) -> Option<&InspectionError> {
        match self {
            Inspection::Exception(exception) => Some(&exception.exception),
            _ => None,
        }
    }
}
