//! Build graph executor.
//!
//! Orders targets topologically, runs each at most once per run, and runs
//! independent targets in parallel on a rayon pool. Results are memoized: a
//! second request for a target that already succeeded or failed returns the
//! recorded result without running the action again.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::builder::errors::BuildError;
use crate::core::target::{BuildInputs, BuildTarget, Outputs, TargetId, TargetState};

/// A validated, acyclic graph of build targets.
pub struct BuildGraph<T: BuildTarget> {
    /// Edges point from a dependency to its dependent
    graph: DiGraph<TargetId, ()>,
    index: HashMap<TargetId, NodeIndex>,
    /// Topological order, dependencies first
    order: Vec<NodeIndex>,
    targets: Vec<T>,
    states: Mutex<Vec<TargetState>>,
    /// Signalled whenever a target reaches a terminal state
    finished: Condvar,
    progress: BuildProgress,
    jobs: Option<usize>,
}

impl<T: BuildTarget> BuildGraph<T> {
    /// Build a graph from its targets.
    ///
    /// Targets sharing an identity are deduplicated (the first one wins).
    /// Every dependency must name a target in the set, and the graph must be
    /// acyclic.
    pub fn new(targets: impl IntoIterator<Item = T>) -> Result<Self, BuildError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut kept = Vec::new();

        for target in targets {
            let id = target.id();
            if index.contains_key(&id) {
                tracing::debug!("Target `{}` declared more than once", id);
                continue;
            }
            let node = graph.add_node(id.clone());
            debug_assert_eq!(node.index(), kept.len());
            index.insert(id, node);
            kept.push(target);
        }

        for target in &kept {
            let dependent = index[&target.id()];
            for dep in target.dependencies() {
                let Some(&dependency) = index.get(&dep) else {
                    return Err(BuildError::UnknownTarget {
                        target: dep.to_string(),
                    });
                };
                graph.update_edge(dependency, dependent, ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| BuildError::Cycle {
            target: graph[cycle.node_id()].to_string(),
        })?;

        let states = Mutex::new(vec![TargetState::Pending; kept.len()]);

        Ok(BuildGraph {
            graph,
            index,
            order,
            targets: kept,
            states,
            finished: Condvar::new(),
            progress: BuildProgress::new(),
            jobs: None,
        })
    }

    /// Limit the number of targets built in parallel.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Look up a target by identity.
    pub fn get(&self, id: &TargetId) -> Option<&T> {
        self.index.get(id).map(|n| &self.targets[n.index()])
    }

    /// Number of targets in the graph.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Current state of a target.
    pub fn state(&self, id: &TargetId) -> Option<TargetState> {
        let node = self.index.get(id)?;
        Some(self.lock_states()[node.index()].clone())
    }

    /// Execution counters for this graph.
    pub fn progress(&self) -> &BuildProgress {
        &self.progress
    }

    /// A runnable step that builds `id` and everything it depends on.
    pub fn rule(&self, id: &TargetId) -> Result<Rule<'_, T>, BuildError> {
        if !self.index.contains_key(id) {
            return Err(BuildError::UnknownTarget {
                target: id.to_string(),
            });
        }
        Ok(Rule {
            graph: self,
            goal: id.clone(),
        })
    }

    /// Build `goal` and its transitive dependencies.
    ///
    /// On failure the error is the root cause: when the goal was skipped
    /// because a dependency failed, the dependency's own error is returned.
    pub fn execute(&self, goal: &TargetId) -> Result<Outputs, BuildError> {
        let goal_node = *self.index.get(goal).ok_or_else(|| BuildError::UnknownTarget {
            target: goal.to_string(),
        })?;

        let start = Instant::now();
        let closure = self.closure(goal_node);

        let pending: Vec<NodeIndex> = {
            let states = self.lock_states();
            self.order
                .iter()
                .copied()
                .filter(|n| closure.contains(n) && !states[n.index()].is_terminal())
                .collect()
        };

        if !pending.is_empty() {
            tracing::debug!("Scheduling {} target(s) for `{}`", pending.len(), goal);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs.unwrap_or(0))
                .build();
            match pool {
                Ok(pool) => pool.in_place_scope(|scope| self.schedule(scope, &pending)),
                Err(e) => {
                    tracing::warn!("Failed to create build thread pool: {}", e);
                    rayon::in_place_scope(|scope| self.schedule(scope, &pending));
                }
            }
            tracing::debug!(
                "Finished `{}` in {:.2}s",
                goal,
                start.elapsed().as_secs_f64()
            );
        }

        self.result_of(goal_node)
    }

    /// Targets reachable from `goal` through dependency edges, goal included.
    fn closure(&self, goal: NodeIndex) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut stack = vec![goal];
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.graph.neighbors_directed(node, Direction::Incoming));
            }
        }
        seen
    }

    /// Run `pending` (in topological order) until done or a target fails.
    ///
    /// A target is claimed (`Pending` to `Building`) under the state lock
    /// before its action starts. A target claimed by a concurrent `execute`
    /// is awaited instead of run again.
    fn schedule<'s>(&'s self, scope: &rayon::Scope<'s>, pending: &[NodeIndex]) {
        let in_run: HashSet<NodeIndex> = pending.iter().copied().collect();
        let mut waiting: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ready = VecDeque::new();

        {
            let mut states = self.lock_states();
            for &node in pending {
                // Finished by another request since `pending` was computed
                if states[node.index()].is_terminal() {
                    continue;
                }
                let mut unfinished = 0;
                let mut failed_dep = None;
                for dep in self.graph.neighbors_directed(node, Direction::Incoming) {
                    match &states[dep.index()] {
                        TargetState::Succeeded(_) => {}
                        TargetState::Failed(_) => failed_dep = Some(dep),
                        _ => unfinished += 1,
                    }
                }
                if let Some(dep) = failed_dep {
                    states[node.index()] = TargetState::Failed(BuildError::DependencyFailed {
                        target: self.graph[node].to_string(),
                        dependency: self.graph[dep].to_string(),
                    });
                    self.progress.skipped();
                } else if unfinished == 0 {
                    ready.push_back(node);
                } else {
                    waiting.insert(node, unfinished);
                }
            }
        }
        self.finished.notify_all();

        let (tx, rx) = mpsc::channel::<Completion>();
        let mut running = 0usize;
        let mut halted = false;

        loop {
            while !halted {
                let Some(node) = ready.pop_front() else { break };
                running += 1;
                let tx = tx.clone();

                match self.claim(node) {
                    Claim::Owned(inputs) => {
                        self.progress.started();
                        let target = &self.targets[node.index()];
                        scope.spawn(move |_| {
                            tracing::debug!("Building `{}`", target.id());
                            let result = catch_unwind(AssertUnwindSafe(|| target.build(&inputs)))
                                .unwrap_or_else(|_| {
                                    Err(BuildError::Toolchain {
                                        target: target.id().to_string(),
                                        message: format!(
                                            "build action for `{}` panicked",
                                            target.id()
                                        ),
                                    })
                                })
                                .map(Arc::new);
                            let _ = tx.send(Completion {
                                node,
                                result,
                                owned: true,
                            });
                        });
                    }
                    Claim::InFlight => {
                        tracing::debug!("Waiting for `{}` built by another request", self.graph[node]);
                        scope.spawn(move |_| {
                            let result = self.wait_for(node);
                            let _ = tx.send(Completion {
                                node,
                                result,
                                owned: false,
                            });
                        });
                    }
                    Claim::Done(result) => {
                        let _ = tx.send(Completion {
                            node,
                            result,
                            owned: false,
                        });
                    }
                }
            }

            if running == 0 {
                break;
            }

            let Ok(Completion {
                node,
                result,
                owned,
            }) = rx.recv()
            else {
                break;
            };
            running -= 1;

            match result {
                Ok(outputs) => {
                    if owned {
                        self.finish(node, TargetState::Succeeded(outputs));
                        self.progress.succeeded();
                    }
                    for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                        if let Some(count) = waiting.get_mut(&dependent) {
                            *count -= 1;
                            if *count == 0 {
                                waiting.remove(&dependent);
                                ready.push_back(dependent);
                            }
                        }
                    }
                }
                Err(err) => {
                    if owned {
                        tracing::debug!("`{}` failed: {}", self.graph[node], err);
                        self.finish(node, TargetState::Failed(err));
                        self.progress.failed();
                    }
                    self.skip_dependents(node, &in_run);
                    halted = true;
                }
            }
        }

        if !waiting.is_empty() || !ready.is_empty() {
            tracing::debug!(
                "{} target(s) left pending after failure",
                waiting.len() + ready.len()
            );
        }
    }

    /// Take ownership of `node` if nobody has started it yet.
    fn claim(&self, node: NodeIndex) -> Claim {
        let mut states = self.lock_states();
        match &states[node.index()] {
            TargetState::Pending => {
                let inputs = self.inputs_from(&states, node);
                states[node.index()] = TargetState::Building;
                Claim::Owned(inputs)
            }
            TargetState::Building => Claim::InFlight,
            TargetState::Succeeded(outputs) => Claim::Done(Ok(Arc::clone(outputs))),
            TargetState::Failed(err) => Claim::Done(Err(err.clone())),
        }
    }

    /// Block until another request finishes `node`.
    fn wait_for(&self, node: NodeIndex) -> Result<Outputs, BuildError> {
        let mut states = self.lock_states();
        loop {
            match &states[node.index()] {
                TargetState::Succeeded(outputs) => return Ok(Arc::clone(outputs)),
                TargetState::Failed(err) => return Err(err.clone()),
                TargetState::Pending | TargetState::Building => {
                    states = self
                        .finished
                        .wait(states)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Record a terminal state and wake waiting requests.
    fn finish(&self, node: NodeIndex, state: TargetState) {
        self.lock_states()[node.index()] = state;
        self.finished.notify_all();
    }

    /// Mark every target in this run that depends on `failed` as failed.
    fn skip_dependents(&self, failed: NodeIndex, in_run: &HashSet<NodeIndex>) {
        {
            let mut states = self.lock_states();
            let mut stack = vec![failed];
            while let Some(node) = stack.pop() {
                for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    if !in_run.contains(&dependent)
                        || !matches!(states[dependent.index()], TargetState::Pending)
                    {
                        continue;
                    }
                    tracing::debug!("Skipping `{}`", self.graph[dependent]);
                    states[dependent.index()] =
                        TargetState::Failed(BuildError::DependencyFailed {
                            target: self.graph[dependent].to_string(),
                            dependency: self.graph[node].to_string(),
                        });
                    self.progress.skipped();
                    stack.push(dependent);
                }
            }
        }
        self.finished.notify_all();
    }

    fn inputs_from(&self, states: &[TargetState], node: NodeIndex) -> BuildInputs {
        let mut inputs = BuildInputs::new();
        for dep in self.graph.neighbors_directed(node, Direction::Incoming) {
            if let TargetState::Succeeded(outputs) = &states[dep.index()] {
                inputs.insert(self.graph[dep].clone(), Arc::clone(outputs));
            }
        }
        inputs
    }

    fn result_of(&self, node: NodeIndex) -> Result<Outputs, BuildError> {
        let states = self.lock_states();
        let mut current = node;
        loop {
            match &states[current.index()] {
                TargetState::Succeeded(outputs) => return Ok(Arc::clone(outputs)),
                TargetState::Failed(err) => {
                    if let BuildError::DependencyFailed { dependency, .. } = err {
                        if let Some(&dep) = self.index.get(&TargetId::named(dependency.clone())) {
                            current = dep;
                            continue;
                        }
                    }
                    return Err(err.clone());
                }
                TargetState::Pending | TargetState::Building => {
                    return Err(BuildError::NotBuilt {
                        target: self.graph[current].to_string(),
                    })
                }
            }
        }
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, Vec<TargetState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a scheduler may proceed with a ready target.
enum Claim {
    /// This request runs the action with these inputs
    Owned(BuildInputs),
    /// Another request is running it
    InFlight,
    Done(Result<Outputs, BuildError>),
}

/// A finished target reported back to the scheduler.
struct Completion {
    node: NodeIndex,
    result: Result<Outputs, BuildError>,
    /// Whether this request ran the action and owns its state transition
    owned: bool,
}

/// A runnable build step for one goal target.
pub struct Rule<'g, T: BuildTarget> {
    graph: &'g BuildGraph<T>,
    goal: TargetId,
}

impl<'g, T: BuildTarget> Rule<'g, T> {
    /// The goal this rule builds.
    pub fn goal(&self) -> &TargetId {
        &self.goal
    }

    /// Build the goal.
    pub fn run(&self) -> Result<Outputs, BuildError> {
        self.graph.execute(&self.goal)
    }

    /// Build the goal, then run `next` on its outputs.
    ///
    /// `next` never runs unless the goal built successfully.
    pub fn then<R>(
        &self,
        next: impl FnOnce(&Outputs) -> Result<R, BuildError>,
    ) -> Result<R, BuildError> {
        let outputs = self.run()?;
        next(&outputs)
    }
}

/// Counters for target executions.
#[derive(Debug, Default)]
pub struct BuildProgress {
    started: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl BuildProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    /// Build actions started.
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Targets never run because a dependency failed.
    pub fn skipped_count(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }
}
