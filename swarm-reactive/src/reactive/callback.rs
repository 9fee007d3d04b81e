//! Callback Dispatch
//!
//! Host closures are opaque to the engine. They are stored as [`Callback`]
//! capabilities and invoked once per refreshed node, in registration order,
//! after every node of the pass has been evaluated.
//!
//! # Nested Propagation
//!
//! A callback never re-enters the runtime. It receives an [`Invocation`],
//! through which it may ask for another reactive to be recalculated. The
//! request goes to the [`Deferred`] queue, which either holds it until the
//! current pass has finished or rejects it, depending on the configured
//! [`NestedPolicy`].
//!
//! A request is checked against the graph before anything is written: the
//! value must belong to this registry and its propagation must plan without
//! a cycle. The graph cannot change while callbacks run, so a request that
//! plans here also plans when its follow-up pass starts.

use indexmap::IndexSet;

use super::value::{Datum, Value};
use crate::config::NestedPolicy;
use crate::error::{CallbackFault, Error, Result};
use crate::graph::{ReactiveId, Registry, UpdateScheduler};

/// A host closure invoked when a reactive is refreshed.
pub trait Callback {
    fn invoke(&mut self, call: &mut Invocation<'_>) -> std::result::Result<(), CallbackFault>;
}

/// Adapter turning a Rust closure into a [`Callback`].
pub struct FnCallback<F>(pub F);

impl<F> Callback for FnCallback<F>
where
    F: FnMut(&mut Invocation<'_>) -> std::result::Result<(), CallbackFault>,
{
    fn invoke(&mut self, call: &mut Invocation<'_>) -> std::result::Result<(), CallbackFault> {
        (self.0)(call)
    }
}

/// Box a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Box<dyn Callback>
where
    F: FnMut(&mut Invocation<'_>) -> std::result::Result<(), CallbackFault> + 'static,
{
    Box::new(FnCallback(f))
}

/// Arguments of a single callback call.
pub struct Invocation<'a> {
    id: ReactiveId,
    value: &'a Value,
    registry: &'a Registry,
    deferred: &'a mut Deferred,
}

impl<'a> Invocation<'a> {
    /// The reactive whose value was refreshed.
    pub fn id(&self) -> ReactiveId {
        self.id
    }

    /// The refreshed value.
    pub fn value(&self) -> &Value {
        self.value
    }

    /// Ask for `value`'s dependents to be recalculated.
    pub fn recalculate(&mut self, value: &Value) -> Result<()> {
        let id = self.admit(value)?;
        self.deferred.request(id)
    }

    /// Overwrite `value` and ask for its dependents to be recalculated.
    ///
    /// The value is left untouched when the request is refused: under
    /// [`NestedPolicy::Reject`], for a value of another runtime, or when the
    /// propagation from it would hit a cycle.
    pub fn set(&mut self, value: &Value, datum: impl Into<Datum>) -> Result<()> {
        let id = self.admit(value)?;
        value.set(datum);
        self.deferred.request(id)
    }

    /// Resolve `value` and check that a follow-up pass from it can run.
    fn admit(&self, value: &Value) -> Result<ReactiveId> {
        let id = self.registry.resolve(value)?;
        self.deferred.check(id)?;
        UpdateScheduler::new(self.registry).plan(id)?;
        Ok(id)
    }
}

/// Recalculations requested by callbacks, in request order.
#[derive(Debug, Default)]
pub struct Deferred {
    policy: NestedPolicy,
    queue: IndexSet<ReactiveId>,
}

impl Deferred {
    pub fn new(policy: NestedPolicy) -> Self {
        Self {
            policy,
            queue: IndexSet::new(),
        }
    }

    fn check(&self, id: ReactiveId) -> Result<()> {
        match self.policy {
            NestedPolicy::Queue => Ok(()),
            NestedPolicy::Reject => Err(Error::NestedPropagation { id }),
        }
    }

    fn request(&mut self, id: ReactiveId) -> Result<()> {
        self.check(id)?;
        if self.queue.insert(id) {
            tracing::trace!(root = %id, "propagation deferred");
        }
        Ok(())
    }

    /// Take the oldest queued root.
    pub fn pop(&mut self) -> Option<ReactiveId> {
        self.queue.shift_remove_index(0)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// Invoke the callbacks of every node in `dirty`, in order.
///
/// Returns the number of callbacks invoked. The first fault stops dispatch.
pub fn dispatch(registry: &mut Registry, dirty: &[ReactiveId], deferred: &mut Deferred) -> Result<usize> {
    let mut invoked = 0;

    for &id in dirty {
        let node = registry.get_mut(id)?;
        let value = node.value().clone();
        let mut callbacks = node.take_callbacks();

        let outcome = invoke_all(id, &value, &mut callbacks, registry, deferred);
        registry.get_mut(id)?.restore_callbacks(callbacks);
        invoked += outcome?;
    }

    Ok(invoked)
}

fn invoke_all(
    id: ReactiveId,
    value: &Value,
    callbacks: &mut [Box<dyn Callback>],
    registry: &Registry,
    deferred: &mut Deferred,
) -> Result<usize> {
    for callback in callbacks.iter_mut() {
        let mut call = Invocation {
            id,
            value,
            registry,
            deferred: &mut *deferred,
        };
        tracing::trace!(reactive = %id, "invoking callback");
        if let Err(source) = callback.invoke(&mut call) {
            tracing::warn!(reactive = %id, error = %source, "callback faulted, dispatch halted");
            return Err(Error::Callback { id, source });
        }
    }

    Ok(callbacks.len())
}
