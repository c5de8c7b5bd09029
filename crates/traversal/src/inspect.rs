//! Inspectors and inspection pipes
//!
//! An [`Inspector`] takes a pipe state and returns the next one, optionally
//! reading a shared context. An [`InspectionPipe`] runs inspectors strictly in
//! order and stops as soon as a step returns a terminal value (an issue or an
//! exception). A pipe is an inspector itself, so pipes nest.

use std::sync::Arc;

use futures::future::BoxFuture;
use traversal_core::inspect::Inspected;

pub trait Inspector<S, C = ()>: Send + Sync {
    fn inspect<'a>(&'a self, target: S, ctx: Option<&'a C>) -> BoxFuture<'a, S>;
}

/// Ordered list of inspectors applied left to right.
pub struct InspectionPipe<S, C = ()> {
    steps: Vec<Arc<dyn Inspector<S, C>>>,
}

impl<S, C> Clone for InspectionPipe<S, C> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<S, C> Default for InspectionPipe<S, C> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<S, C> std::fmt::Debug for InspectionPipe<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionPipe")
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl<S, C> InspectionPipe<S, C>
where
    S: Inspected + Send + 'static,
    C: Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Arc<dyn Inspector<S, C>>>) -> Self {
        Self { steps }
    }

    /// Appends a step.
    pub fn then(mut self, step: impl Inspector<S, C> + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn then_shared(mut self, step: Arc<dyn Inspector<S, C>>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order, stopping after the first terminal result.
    pub async fn run(&self, target: S, ctx: Option<&C>) -> S {
        let mut value = target;
        for (index, step) in self.steps.iter().enumerate() {
            value = step.inspect(value, ctx).await;
            if value.is_terminal() {
                log::debug!(
                    "Inspection pipe stopped at step {} of {}",
                    index + 1,
                    self.steps.len()
                );
                break;
            }
        }
        value
    }
}

impl<S, C> Inspector<S, C> for InspectionPipe<S, C>
where
    S: Inspected + Send + 'static,
    C: Sync + 'static,
{
    fn inspect<'a>(&'a self, target: S, ctx: Option<&'a C>) -> BoxFuture<'a, S> {
        Box::pin(self.run(target, ctx))
    }
}

/// Inspector built from a synchronous function.
pub struct InspectorFn<F>(F);

pub fn inspector_fn<F>(f: F) -> InspectorFn<F> {
    InspectorFn(f)
}

impl<S, C, F> Inspector<S, C> for InspectorFn<F>
where
    S: Send + 'static,
    F: Fn(S, Option<&C>) -> S + Send + Sync,
{
    fn inspect<'a>(&'a self, target: S, ctx: Option<&'a C>) -> BoxFuture<'a, S> {
        let inspected = (self.0)(target, ctx);
        Box::pin(futures::future::ready(inspected))
    }
}
