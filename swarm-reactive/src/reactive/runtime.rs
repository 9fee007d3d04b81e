//! Reactive Runtime
//!
//! The runtime is the per-VM coordinator that connects the registry, the
//! scheduler, the evaluator and the callback dispatcher. Each robot VM owns
//! exactly one runtime; runtimes share nothing.
//!
//! # How It Works
//!
//! 1. `create` marks a host value reactive and registers a node for it.
//!
//! 2. `bind` (or `derive`) attaches an expression, recording an edge from
//!    each reactive operand to the node.
//!
//! 3. When a value changes, `set` or `recalculate`:
//!    a. plans the propagation (discovery, cycle check, topological order)
//!       before the changed value itself is written,
//!    b. evaluates every dirty node in order, overwriting values in place,
//!    c. dispatches callbacks for the dirty nodes in the same order,
//!    d. runs any follow-up passes callbacks queued.
//!
//! A cycle aborts the pass before any write. An evaluation error stops the
//! pass at the failing node; nodes refreshed before it keep their values
//! and no callback runs.

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::callback::{self, Callback, Deferred, Invocation};
use super::expr::{Expression, Operand, Operator};
use super::value::{Datum, Value};
use crate::config::RuntimeConfig;
use crate::error::{CallbackFault, Error, Result};
use crate::graph::{GraphSnapshot, PropagationPlan, ReactiveId, ReactiveNode, Registry, UpdateScheduler};

/// What a recalculation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Nodes recomputed by the pass, in evaluation order.
    pub dirty: SmallVec<[ReactiveId; 8]>,

    /// Number of callbacks invoked by the pass.
    pub callbacks: usize,

    /// Passes queued by callbacks and run after this one.
    pub followups: Vec<Propagation>,
}

impl Propagation {
    /// Whether the pass, including follow-ups, changed nothing.
    pub fn is_noop(&self) -> bool {
        self.dirty.is_empty() && self.followups.is_empty()
    }

    /// Total callbacks invoked, including follow-up passes.
    pub fn total_callbacks(&self) -> usize {
        self.callbacks + self.followups.iter().map(Propagation::total_callbacks).sum::<usize>()
    }
}

/// The reactive engine of one VM instance.
pub struct Runtime {
    registry: Registry,
    config: RuntimeConfig,
    deferred: Deferred,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            registry: Registry::new(config.id_limit),
            deferred: Deferred::new(config.nested_policy),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mark `value` reactive. Idempotent.
    pub fn create(&mut self, value: &Value) -> Result<ReactiveId> {
        self.registry.create(value)
    }

    /// Attach `op(left, right)` to `dependent`.
    pub fn bind(
        &mut self,
        dependent: ReactiveId,
        op: Operator,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Result<()> {
        self.registry.bind(dependent, Expression::new(op, left, right))
    }

    /// Make `value` a derived reactive and compute its initial value.
    ///
    /// This is what the host does on assigning a reactive expression. No
    /// callback runs for the initial value.
    pub fn derive(
        &mut self,
        value: &Value,
        op: Operator,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Result<ReactiveId> {
        let id = self.registry.create(value)?;
        self.registry.bind(id, Expression::new(op, left, right))?;
        self.refresh(id)?;
        Ok(id)
    }

    /// Append a closure to `id`'s callback list.
    pub fn on_change<F>(&mut self, id: ReactiveId, f: F) -> Result<()>
    where
        F: FnMut(&mut Invocation<'_>) -> std::result::Result<(), CallbackFault> + 'static,
    {
        self.on_change_with(id, callback::callback(f))
    }

    /// Append a host callback capability to `id`'s callback list.
    pub fn on_change_with(&mut self, id: ReactiveId, callback: Box<dyn Callback>) -> Result<()> {
        let node = self.registry.get_mut(id)?;
        node.push_callback(callback);
        debug!(reactive = %id, callbacks = node.callback_count(), "callback registered");
        Ok(())
    }

    pub fn get(&self, id: ReactiveId) -> Result<&ReactiveNode> {
        self.registry.get(id)
    }

    /// The host value registered under `id`.
    pub fn value(&self, id: ReactiveId) -> Result<Value> {
        Ok(self.registry.get(id)?.value().clone())
    }

    /// Overwrite `value` and propagate if it is reactive.
    ///
    /// The propagation is planned before the write, so a refused change
    /// (a cycle, or a value registered in another runtime) leaves `value`
    /// untouched.
    pub fn set(&mut self, value: &Value, datum: impl Into<Datum>) -> Result<Propagation> {
        let id = match self.registry.resolve(value) {
            Ok(id) => id,
            Err(Error::NotReactive) => {
                value.set(datum);
                return Ok(Propagation::default());
            }
            Err(err) => return Err(err),
        };

        let plan = self.plan(id)?;
        value.set(datum);
        self.run(plan)
    }

    /// Plan a propagation from `id` without changing anything.
    pub fn plan(&self, id: ReactiveId) -> Result<PropagationPlan> {
        UpdateScheduler::new(&self.registry).plan(id)
    }

    /// Recompute everything that depends on `id`, then run queued follow-ups.
    pub fn recalculate(&mut self, id: ReactiveId) -> Result<Propagation> {
        let plan = self.plan(id)?;
        self.run(plan)
    }

    /// Recompute everything that depends on a host value.
    pub fn recalculate_value(&mut self, value: &Value) -> Result<Propagation> {
        let id = self.registry.resolve(value)?;
        self.recalculate(id)
    }

    fn run(&mut self, plan: PropagationPlan) -> Result<Propagation> {
        let result = self.run_with_followups(plan);
        if result.is_err() {
            self.deferred.clear();
        }
        result
    }

    fn run_with_followups(&mut self, plan: PropagationPlan) -> Result<Propagation> {
        let root = plan.root;
        let mut propagation = self.pass(plan)?;

        let mut passes = 0;
        while let Some(next) = self.deferred.pop() {
            if passes == self.config.max_deferred_passes {
                warn!(root = %root, limit = passes, "deferred propagation limit reached");
                return Err(Error::DeferredLimit { limit: passes });
            }
            passes += 1;
            debug!(root = %next, pass = passes, "running deferred propagation");
            let plan = self.plan(next)?;
            propagation.followups.push(self.pass(plan)?);
        }

        Ok(propagation)
    }

    /// One propagation pass over a checked plan: evaluate, dispatch.
    fn pass(&mut self, plan: PropagationPlan) -> Result<Propagation> {
        let span = tracing::debug_span!("recalculate", root = %plan.root);
        let _guard = span.enter();

        debug!(edges = ?plan.edges, order = ?plan.order, "propagation planned");
        if plan.is_noop() {
            return Ok(Propagation::default());
        }

        let mut dirty = SmallVec::new();
        for &id in plan.dirty() {
            if self.refresh(id)? {
                dirty.push(id);
            }
        }

        let callbacks = callback::dispatch(&mut self.registry, &dirty, &mut self.deferred)?;

        Ok(Propagation {
            dirty,
            callbacks,
            followups: Vec::new(),
        })
    }

    /// Re-evaluate one node against the current values of its operands.
    ///
    /// Returns `false` for a leaf, which is left untouched.
    fn refresh(&mut self, id: ReactiveId) -> Result<bool> {
        let node = self.registry.get(id)?;
        let Some(expr) = node.expression() else {
            return Ok(false);
        };

        let registry = &self.registry;
        let result = expr
            .evaluate(id, |operand| Ok(registry.get(operand)?.value().get()))
            .map_err(|err| {
                warn!(reactive = %id, error = %err, "evaluation failed, pass aborted");
                err
            })?;

        trace!(reactive = %id, expr = %expr, value = %result, "reactive refreshed");
        node.value().set(result);
        Ok(true)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.registry.snapshot()
    }

    /// Number of registered reactives.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Tear down every node. Called once when the VM is destroyed.
    pub fn destroy_all(&mut self) {
        self.deferred.clear();
        self.registry.destroy_all();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}
