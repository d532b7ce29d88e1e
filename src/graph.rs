//! The asynchronous task dependency engine.
//!
//! A [`TaskGraph`] is a registry of named tasks. Each task has a handler and
//! zero or more dependency patterns ([`TaskPattern`]), declared with
//! [`TaskBuilder::wait_for`]. Calling a task resolves every pattern against
//! the *currently* registered task names, invokes each matched task (which
//! recursively resolves its own dependencies), and threads the collected
//! results into the handler: one ordered sequence of results per pattern,
//! followed by the caller-supplied arguments.
//!
//! # Execution model
//!
//! Execution is cooperative and strictly sequential: matched dependencies are
//! invoked one at a time, in pattern declaration order and, within a wildcard
//! pattern, in task registration order. The future returned by a call settles
//! when the handler's own future settles. A failed dependency means the
//! dependent handler is never invoked and the failure propagates to the
//! caller.
//!
//! # Cascades
//!
//! Every top-level call starts a *cascade*. Within one cascade each task runs
//! at most once: a later reference to an already-settled task (a diamond
//! dependency, or a wildcard overlapping an earlier in-cascade call) reuses
//! the settled result instead of re-running the work. Nothing is shared
//! across cascades: calling the same task twice performs the work twice.
//!
//! Reaching a task that is still in flight within its own cascade is a
//! dependency cycle and fails with [`Error::CircularDependency`] instead of
//! hanging. Handlers receive a [`TaskContext`] whose [`TaskContext::call`]
//! joins the same cascade, so imperative sub-calls made from inside a handler
//! participate in the same sharing and cycle detection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::pattern::TaskPattern;

/// Future returned by task handlers and task invocations.
pub type TaskFuture<V> = BoxFuture<'static, Result<V>>;

type Handler<V> = Arc<dyn Fn(TaskContext<V>, TaskInvocation<V>) -> TaskFuture<V> + Send + Sync>;

/// Everything a handler invocation receives.
#[derive(Debug)]
pub struct TaskInvocation<V> {
    /// Settled dependency results: one inner sequence per declared pattern,
    /// in declaration order; within a pattern, in task registration order.
    pub deps: Vec<Vec<V>>,
    /// Arguments supplied by the caller of this invocation.
    pub args: Vec<V>,
}

struct TaskEntry<V> {
    handler: Handler<V>,
    deps: Vec<TaskPattern>,
}

/// Registered tasks plus their registration order.
///
/// The order vector is load-bearing: wildcard resolution yields matches in
/// registration order, which the pipeline relies on for extension ordering.
struct TaskTable<V> {
    order: Vec<String>,
    entries: HashMap<String, TaskEntry<V>>,
}

impl<V> Default for TaskTable<V> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

/// State of one task within a cascade.
enum Slot<V> {
    /// The task's handler chain is currently executing.
    Running,
    /// The task settled with this result.
    Done(Result<V>),
}

/// Per-call bookkeeping for cascade sharing and cycle detection.
struct Cascade<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V> Cascade<V> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
        })
    }
}

/// A registry of named, interdependent asynchronous tasks.
///
/// Cloning a `TaskGraph` yields another handle to the same registry. The
/// value type `V` is whatever the embedding application threads between
/// tasks; the build pipeline uses its own stage value enum, and tests use
/// plain integers.
pub struct TaskGraph<V> {
    inner: Arc<Mutex<TaskTable<V>>>,
}

impl<V> Clone for TaskGraph<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for TaskGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TaskGraph<V> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TaskTable::default())),
        }
    }

    /// Downgrade to a weak handle that does not keep the registry alive.
    pub fn downgrade(&self) -> WeakTaskGraph<V> {
        WeakTaskGraph {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether a task with this exact name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().unwrap().entries.contains_key(name)
    }

    /// Snapshot of the registered task names, in registration order.
    pub fn task_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().order.clone()
    }
}

impl<V: Clone + Send + Sync + 'static> TaskGraph<V> {
    /// Register a task under `name`, replacing any prior registration.
    ///
    /// Replacement is last-writer-wins and also clears previously declared
    /// dependency patterns; the returned builder re-declares them. The task's
    /// position in registration order is kept from its first registration.
    pub fn create<F>(&self, name: impl Into<String>, handler: F) -> TaskBuilder<V>
    where
        F: Fn(TaskContext<V>, TaskInvocation<V>) -> TaskFuture<V> + Send + Sync + 'static,
    {
        let name = name.into();
        {
            let mut table = self.inner.lock().unwrap();
            if !table.entries.contains_key(&name) {
                table.order.push(name.clone());
            }
            table.entries.insert(
                name.clone(),
                TaskEntry {
                    handler: Arc::new(handler),
                    deps: Vec::new(),
                },
            );
        }
        trace!(task = %name, "registered task");
        TaskBuilder {
            graph: self.clone(),
            name,
        }
    }

    /// Invoke the named task now, starting a fresh cascade.
    ///
    /// The returned future settles when the task's handler (and any deferred
    /// work it awaits) settles.
    pub fn call(&self, name: &str, args: Vec<V>) -> TaskFuture<V> {
        self.invoke(Cascade::new(), name.to_string(), args, Vec::new())
    }

    /// Invoke `name` within `cascade`, reusing a settled result if the task
    /// already ran there.
    fn invoke(
        &self,
        cascade: Arc<Cascade<V>>,
        name: String,
        args: Vec<V>,
        path: Vec<String>,
    ) -> TaskFuture<V> {
        let graph = self.clone();
        Box::pin(async move {
            {
                let mut slots = cascade.slots.lock().unwrap();
                match slots.get(&name) {
                    Some(Slot::Done(result)) => {
                        trace!(task = %name, "reusing settled result from this cascade");
                        return result.clone();
                    }
                    Some(Slot::Running) => {
                        // Execution within a cascade is sequential, so an
                        // in-flight task is necessarily an ancestor of this
                        // invocation.
                        let mut cycle = path;
                        cycle.push(name.clone());
                        return Err(Error::CircularDependency {
                            cycle: cycle.join(" -> "),
                        });
                    }
                    None => {
                        slots.insert(name.clone(), Slot::Running);
                    }
                }
            }

            let result = graph.run(Arc::clone(&cascade), &name, args, &path).await;
            cascade
                .slots
                .lock()
                .unwrap()
                .insert(name, Slot::Done(result.clone()));
            result
        })
    }

    /// Resolve dependencies and execute the handler for one invocation.
    async fn run(
        &self,
        cascade: Arc<Cascade<V>>,
        name: &str,
        args: Vec<V>,
        path: &[String],
    ) -> Result<V> {
        let (handler, patterns) = {
            let table = self.inner.lock().unwrap();
            match table.entries.get(name) {
                Some(entry) => (Arc::clone(&entry.handler), entry.deps.clone()),
                None => {
                    return Err(Error::TaskNotFound {
                        name: name.to_string(),
                    });
                }
            }
        };

        let mut next_path = path.to_vec();
        next_path.push(name.to_string());

        let mut deps = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let matched = self.resolve(pattern)?;
            debug!(
                task = name,
                pattern = %pattern,
                matches = matched.len(),
                "resolved dependency pattern"
            );

            let mut results = Vec::with_capacity(matched.len());
            for dep in matched {
                let value = self
                    .invoke(Arc::clone(&cascade), dep, Vec::new(), next_path.clone())
                    .await?;
                results.push(value);
            }
            deps.push(results);
        }

        debug!(task = name, "invoking task handler");
        let ctx = TaskContext {
            graph: self.clone(),
            cascade,
            path: next_path,
        };
        (handler)(ctx, TaskInvocation { deps, args }).await
    }

    /// Match a dependency pattern against the current registry.
    ///
    /// Exact patterns must name a registered task; wildcard patterns may
    /// match zero, one, or many names, yielded in registration order.
    fn resolve(&self, pattern: &TaskPattern) -> Result<Vec<String>> {
        let table = self.inner.lock().unwrap();
        if let Some(exact) = pattern.as_exact() {
            if table.entries.contains_key(exact) {
                Ok(vec![exact.to_string()])
            } else {
                Err(Error::TaskNotFound {
                    name: exact.to_string(),
                })
            }
        } else {
            Ok(table
                .order
                .iter()
                .filter(|name| pattern.matches(name))
                .cloned()
                .collect())
        }
    }
}

/// Weak counterpart of [`TaskGraph`], used where a strong handle would keep
/// the registry (and every closure it stores) alive forever.
pub struct WeakTaskGraph<V> {
    inner: Weak<Mutex<TaskTable<V>>>,
}

impl<V> Clone for WeakTaskGraph<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> WeakTaskGraph<V> {
    /// Recover a strong handle, if the registry is still alive.
    pub fn upgrade(&self) -> Option<TaskGraph<V>> {
        self.inner.upgrade().map(|inner| TaskGraph { inner })
    }
}

/// Builder returned by [`TaskGraph::create`]: declare dependencies, then
/// call.
pub struct TaskBuilder<V> {
    graph: TaskGraph<V>,
    name: String,
}

impl<V: Clone + Send + Sync + 'static> TaskBuilder<V> {
    /// Append a dependency pattern to the task.
    ///
    /// May be called repeatedly; patterns are resolved at call time, in
    /// declaration order.
    pub fn wait_for(self, pattern: &str) -> Result<Self> {
        let pattern = TaskPattern::parse(pattern)?;
        {
            let mut table = self.graph.inner.lock().unwrap();
            match table.entries.get_mut(&self.name) {
                Some(entry) => entry.deps.push(pattern),
                None => {
                    return Err(Error::TaskNotFound {
                        name: self.name.clone(),
                    });
                }
            }
        }
        Ok(self)
    }

    /// Invoke the task now. Equivalent to [`TaskGraph::call`] with this
    /// task's name.
    pub fn call(&self, args: Vec<V>) -> TaskFuture<V> {
        self.graph.call(&self.name, args)
    }

    /// The task's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handle passed to every handler, scoped to the invocation's cascade.
pub struct TaskContext<V> {
    graph: TaskGraph<V>,
    cascade: Arc<Cascade<V>>,
    path: Vec<String>,
}

impl<V: Clone + Send + Sync + 'static> TaskContext<V> {
    /// Invoke another task within the current cascade.
    ///
    /// If the task already settled in this cascade its result is reused and
    /// `args` are ignored; if it is an ancestor of the current invocation the
    /// call fails with [`Error::CircularDependency`].
    pub fn call(&self, name: &str, args: Vec<V>) -> TaskFuture<V> {
        self.graph
            .invoke(Arc::clone(&self.cascade), name.to_string(), args, self.path.clone())
    }

    /// The graph this invocation is executing on.
    pub fn graph(&self) -> &TaskGraph<V> {
        &self.graph
    }
}
