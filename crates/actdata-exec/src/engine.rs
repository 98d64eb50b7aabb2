//! Execution of Tree Functions in dependency order.
//!
//! # Architecture
//!
//! An execution pass analyses the dependency graph (cached per document
//! instance, bindings revision and loop strategy), refuses graphs with
//! loops, then visits vertices level by level. A vertex's global level is
//! the deepest level it reaches from any root, so every producer runs
//! before its consumers.
//! Within a level, [`TreeFunctionPriority::High`] vertices come first.
//!
//! Per vertex the engine decides between:
//!
//! - **Skipped**: a predecessor failed, was skipped, deferred or canceled;
//!   outputs are marked pending.
//! - **Intact**: nothing it depends on changed since the last pass.
//! - **Deferred**: heavy work postponed; outputs pending, the function is
//!   forced for the next pass.
//! - **Failed**: validation or the function body failed; outputs are
//!   invalidated. Failure never stops unrelated vertices.
//! - **Succeeded**: outputs written, valid and not pending.
//!
//! Heavy jobs of one level run on scoped worker threads when
//! [`ExecuteOptions::parallel`] is set. All document writes happen on the
//! calling thread.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};

use actdata_core::{Document, ParamKind, ParamValue, ParameterId, TreeFunctionPriority};

use crate::analyzer::{DependencyAnalyzer, GraphState, LoopStrategy};
use crate::error::{ExecError, FunctionError, ValidationError};
use crate::function::{FunctionRegistry, TreeFunction};
use crate::graph::{DependencyGraph, Direction, Vertex, VertexId};
use crate::iterator::LevelIterator;

/// Options for one execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteOptions {
    pub strategy: LoopStrategy,
    /// Run heavy functions of a level on worker threads.
    pub parallel: bool,
    /// Postpone heavy functions to a later pass.
    pub defer_heavy: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            strategy: LoopStrategy::default(),
            parallel: true,
            defer_heavy: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexStatus {
    NotExecuted,
    Intact,
    Succeeded,
    Failed,
    Skipped,
    Deferred,
    Canceled,
}

impl VertexStatus {
    /// Whether successors of a vertex in this state must be skipped.
    fn blocks_successors(self) -> bool {
        matches!(
            self,
            VertexStatus::Failed
                | VertexStatus::Skipped
                | VertexStatus::Deferred
                | VertexStatus::Canceled
        )
    }
}

/// Outcome of one execution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: RunStatus,
    pub vertices: BTreeMap<VertexId, VertexStatus>,
    /// Failure message per failed vertex.
    pub failures: BTreeMap<VertexId, String>,
    /// Number of levels in the schedule.
    pub levels: usize,
}

impl ExecutionReport {
    fn new(levels: usize) -> Self {
        Self {
            status: RunStatus::Running,
            vertices: BTreeMap::new(),
            failures: BTreeMap::new(),
            levels,
        }
    }

    pub fn status_of(&self, id: VertexId) -> VertexStatus {
        self.vertices
            .get(&id)
            .copied()
            .unwrap_or(VertexStatus::NotExecuted)
    }

    /// Vertices that ended in `status`, in id order.
    pub fn with_status(&self, status: VertexStatus) -> Vec<VertexId> {
        self.vertices
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| *id)
            .collect()
    }

    fn record(&mut self, id: VertexId, status: VertexStatus) {
        self.vertices.insert(id, status);
    }
}

// ---- analysis cache ----

#[derive(Debug)]
struct Analysis {
    document: u64,
    revision: u64,
    strategy: LoopStrategy,
    state: GraphState,
    graph: DependencyGraph,
    cyclic: BTreeSet<ParameterId>,
}

/// A unit of work detached from the document.
struct Job {
    vertex: VertexId,
    function: Arc<dyn TreeFunction>,
    inputs: Vec<ParamValue>,
    heavy: bool,
}

enum Plan {
    Skip,
    Intact,
    Defer,
    Fail(ValidationError),
    Run(Job),
}

/// Runs the Tree Functions of a document.
#[derive(Debug)]
pub struct ExecutionEngine {
    functions: Arc<FunctionRegistry>,
    cache: Mutex<Option<Arc<Analysis>>>,
}

impl ExecutionEngine {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            functions,
            cache: Mutex::new(None),
        }
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    /// Runs loop detection without executing anything.
    pub fn analyze(
        &self,
        doc: &Document,
        strategy: LoopStrategy,
    ) -> Result<(GraphState, BTreeSet<ParameterId>), ExecError> {
        let analysis = self.analysis(doc, strategy)?;
        Ok((analysis.state, analysis.cyclic.clone()))
    }

    pub fn execute_all(
        &self,
        doc: &mut Document,
        options: &ExecuteOptions,
    ) -> Result<ExecutionReport, ExecError> {
        self.execute_with_cancel(doc, options, &AtomicBool::new(false))
    }

    /// Like [`execute_all`](Self::execute_all), checking `cancel` between
    /// vertices. A canceled pass aborts the transaction the engine opened.
    pub fn execute_with_cancel(
        &self,
        doc: &mut Document,
        options: &ExecuteOptions,
        cancel: &AtomicBool,
    ) -> Result<ExecutionReport, ExecError> {
        let analysis = self.analysis(doc, options.strategy)?;
        match analysis.state {
            GraphState::HasLoops => {
                tracing::warn!(
                    parameters = analysis.cyclic.len(),
                    "execution refused: dependency graph has loops"
                );
                return Err(ExecError::Cycle {
                    parameters: analysis.cyclic.iter().copied().collect(),
                });
            }
            GraphState::NoGraph => {
                let mut report = ExecutionReport::new(0);
                report.status = RunStatus::Succeeded;
                return Ok(report);
            }
            GraphState::Ok | GraphState::Undefined => {}
        }

        let schedule = self.schedule(&analysis.graph);
        let owned = doc.transactions_enabled() && !doc.has_open_command();
        if owned {
            doc.open_command()?;
        }

        let outcome = self.run(doc, &analysis.graph, &schedule, options, cancel);
        match outcome {
            Ok(report) => {
                if owned {
                    if report.status == RunStatus::Canceled {
                        doc.abort_command()?;
                    } else {
                        doc.commit_command()?;
                    }
                }
                tracing::info!(
                    status = ?report.status,
                    levels = report.levels,
                    vertices = report.vertices.len(),
                    "execution pass finished"
                );
                Ok(report)
            }
            Err(err) => {
                if owned {
                    if let Err(abort) = doc.abort_command() {
                        tracing::error!(error = %abort, "could not abort execution transaction");
                    }
                }
                Err(err)
            }
        }
    }

    fn analysis(&self, doc: &Document, strategy: LoopStrategy) -> Result<Arc<Analysis>, ExecError> {
        let document = doc.instance_id();
        let revision = doc.bindings_revision();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.as_ref() {
            if cached.document == document
                && cached.revision == revision
                && cached.strategy == strategy
            {
                return Ok(Arc::clone(cached));
            }
        }

        let graph = DependencyGraph::build(doc)?;
        let mut analyzer = DependencyAnalyzer::from_graph(graph.clone());
        let state = analyzer.detect_loops(strategy);
        let cyclic = analyzer.cyclic_parameters(true);

        let analysis = Arc::new(Analysis {
            document,
            revision,
            strategy,
            state,
            graph,
            cyclic,
        });
        *cache = Some(Arc::clone(&analysis));
        Ok(analysis)
    }

    /// Groups vertices by global level, high priority first in each level.
    fn schedule(&self, graph: &DependencyGraph) -> Vec<Vec<VertexId>> {
        let mut levels: HashMap<VertexId, usize> = HashMap::new();
        for root in graph.roots() {
            let mut it = LevelIterator::new(graph, root, Direction::Successors);
            while let Some(vertex) = it.next() {
                let level = it.level();
                levels
                    .entry(vertex)
                    .and_modify(|l| *l = (*l).max(level))
                    .or_insert(level);
            }
        }

        let depth = levels.values().max().map_or(0, |max| max + 1);
        let mut schedule: Vec<Vec<VertexId>> = vec![Vec::new(); depth];
        for (vertex, level) in levels {
            schedule[level].push(vertex);
        }
        for level in &mut schedule {
            level.sort_by_key(|id| (std::cmp::Reverse(self.priority(graph, *id)), *id));
        }
        schedule
    }

    fn priority(&self, graph: &DependencyGraph, id: VertexId) -> TreeFunctionPriority {
        let Some(vertex) = graph.vertex(id) else {
            return TreeFunctionPriority::Normal;
        };
        let declared = vertex.binding.priority;
        match self.functions.get(&vertex.binding.function) {
            Some(function) => declared.max(function.priority()),
            None => declared,
        }
    }

    fn run(
        &self,
        doc: &mut Document,
        graph: &DependencyGraph,
        schedule: &[Vec<VertexId>],
        options: &ExecuteOptions,
        cancel: &AtomicBool,
    ) -> Result<ExecutionReport, ExecError> {
        let mut report = ExecutionReport::new(schedule.len());
        let mut deferred = Vec::new();

        for (level, vertices) in schedule.iter().enumerate() {
            let mut jobs = Vec::new();
            for &id in vertices {
                let Some(vertex) = graph.vertex(id) else {
                    continue;
                };
                match self.plan(doc, graph, vertex, &report, options) {
                    Plan::Skip => {
                        mark_pending(doc, vertex)?;
                        report.record(id, VertexStatus::Skipped);
                    }
                    Plan::Intact => report.record(id, VertexStatus::Intact),
                    Plan::Defer => {
                        mark_pending(doc, vertex)?;
                        deferred.push(vertex.parameter);
                        report.record(id, VertexStatus::Deferred);
                    }
                    Plan::Fail(err) => fail(doc, vertex, err, &mut report)?,
                    Plan::Run(job) => jobs.push(job),
                }
            }

            tracing::debug!(level, jobs = jobs.len(), "running level");
            let (results, canceled) = run_jobs(jobs, options.parallel, cancel);
            for (vertex, outcome) in results {
                let Some(vertex) = graph.vertex(vertex) else {
                    continue;
                };
                match outcome {
                    Some(result) => self.finish(doc, vertex, result, &mut report)?,
                    None => report.record(vertex.id, VertexStatus::Canceled),
                }
            }

            if canceled {
                for later in schedule[level..].iter().flatten() {
                    if !report.vertices.contains_key(later) {
                        report.record(*later, VertexStatus::Canceled);
                    }
                }
                tracing::info!(level, "execution canceled");
                report.status = RunStatus::Canceled;
                return Ok(report);
            }
        }

        doc.clear_logbook();
        for parameter in deferred {
            doc.force(parameter)?;
        }

        report.status = if report.failures.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        Ok(report)
    }

    fn plan(
        &self,
        doc: &Document,
        graph: &DependencyGraph,
        vertex: &Vertex,
        report: &ExecutionReport,
        options: &ExecuteOptions,
    ) -> Plan {
        let blocked = graph
            .predecessors(vertex.id)
            .into_iter()
            .any(|p| report.status_of(p).blocks_successors());
        if blocked {
            return Plan::Skip;
        }

        let Some(function) = self.functions.get(&vertex.binding.function) else {
            return Plan::Fail(ValidationError::UnknownFunction {
                name: vertex.binding.function.clone(),
            });
        };
        if !must_execute(doc, vertex, function.as_ref()) {
            return Plan::Intact;
        }

        let heavy = vertex.binding.heavy || function.is_heavy();
        if heavy && options.defer_heavy {
            return Plan::Defer;
        }

        match collect_inputs(doc, vertex, function.as_ref()) {
            Ok(inputs) => Plan::Run(Job {
                vertex: vertex.id,
                function,
                inputs,
                heavy,
            }),
            Err(err) => Plan::Fail(err),
        }
    }

    fn finish(
        &self,
        doc: &mut Document,
        vertex: &Vertex,
        result: Result<Vec<ParamValue>, FunctionError>,
        report: &mut ExecutionReport,
    ) -> Result<(), ExecError> {
        let checked = result
            .map_err(ValidationError::from)
            .and_then(|outputs| check_outputs(self, vertex, outputs));
        match checked {
            Ok(outputs) => {
                for (id, value) in vertex.outputs.iter().zip(outputs) {
                    doc.set_computed_value(*id, value)?;
                }
                report.record(vertex.id, VertexStatus::Succeeded);
                Ok(())
            }
            Err(err) => fail(doc, vertex, err, report),
        }
    }
}

/// Whether anything this vertex depends on changed since the last pass.
fn must_execute(doc: &Document, vertex: &Vertex, function: &dyn TreeFunction) -> bool {
    let logbook = doc.logbook();
    if logbook.is_forced(vertex.parameter) || logbook.is_modified(vertex.parameter) {
        return true;
    }
    if vertex.inputs.iter().any(|id| logbook.is_modified(*id)) {
        return true;
    }
    let stale_output = vertex.outputs.iter().any(|id| match doc.param(*id) {
        Ok(param) => param.is_pending() || !param.is_well_formed(),
        Err(_) => true,
    });
    stale_output || function.must_execute_intact()
}

fn collect_inputs(
    doc: &Document,
    vertex: &Vertex,
    function: &dyn TreeFunction,
) -> Result<Vec<ParamValue>, ValidationError> {
    let signature = function.input_signature();
    if signature.len() != vertex.inputs.len() {
        return Err(ValidationError::InputCount {
            expected: signature.len(),
            actual: vertex.inputs.len(),
        });
    }
    let outputs = function.output_signature();
    if outputs.len() != vertex.outputs.len() {
        return Err(ValidationError::OutputCount {
            expected: outputs.len(),
            actual: vertex.outputs.len(),
        });
    }

    let mut values = Vec::with_capacity(signature.len());
    for (index, (id, expected)) in vertex.inputs.iter().zip(signature).enumerate() {
        let Ok(param) = doc.param(*id) else {
            return Err(ValidationError::IllFormedInput { index });
        };
        let actual = param.kind();
        if actual != Some(expected) {
            return Err(ValidationError::InputKind {
                index,
                expected,
                actual: actual.map_or_else(|| "nothing".to_string(), |k| k.to_string()),
            });
        }
        let Some(value) = param.value().filter(|_| param.is_well_formed()) else {
            return Err(ValidationError::IllFormedInput { index });
        };
        if !param.is_valid() {
            return Err(ValidationError::InvalidInput { index });
        }
        values.push(value);
    }
    Ok(values)
}

fn check_outputs(
    engine: &ExecutionEngine,
    vertex: &Vertex,
    outputs: Vec<ParamValue>,
) -> Result<Vec<ParamValue>, ValidationError> {
    let signature: Vec<ParamKind> = engine
        .functions
        .get(&vertex.binding.function)
        .map(|f| f.output_signature())
        .unwrap_or_default();
    if outputs.len() != vertex.outputs.len() {
        return Err(ValidationError::OutputCount {
            expected: outputs.len(),
            actual: vertex.outputs.len(),
        });
    }
    for (index, (value, expected)) in outputs.iter().zip(&signature).enumerate() {
        if value.kind() != *expected {
            return Err(ValidationError::OutputKind {
                index,
                expected: *expected,
                actual: value.kind(),
            });
        }
    }
    Ok(outputs)
}

fn mark_pending(doc: &mut Document, vertex: &Vertex) -> Result<(), ExecError> {
    for id in &vertex.outputs {
        doc.set_pending(*id, true)?;
    }
    Ok(())
}

fn fail(
    doc: &mut Document,
    vertex: &Vertex,
    err: ValidationError,
    report: &mut ExecutionReport,
) -> Result<(), ExecError> {
    tracing::warn!(
        vertex = %vertex.id,
        function = %vertex.binding.function,
        error = %err,
        "tree function failed"
    );
    for id in &vertex.outputs {
        doc.invalidate(*id)?;
    }
    report.failures.insert(vertex.id, err.to_string());
    report.record(vertex.id, VertexStatus::Failed);
    Ok(())
}

type JobResult = Option<Result<Vec<ParamValue>, FunctionError>>;

/// Runs one level's jobs. A job that never started because `cancel` was
/// set yields `None`. The flag reports whether cancellation was seen.
fn run_jobs(
    jobs: Vec<Job>,
    parallel: bool,
    cancel: &AtomicBool,
) -> (Vec<(VertexId, JobResult)>, bool) {
    let mut results: Vec<(VertexId, JobResult)> = Vec::with_capacity(jobs.len());
    let mut canceled = false;

    thread::scope(|scope| {
        let mut workers = Vec::new();
        for job in jobs {
            if cancel.load(Ordering::SeqCst) {
                canceled = true;
                results.push((job.vertex, None));
                continue;
            }
            if job.heavy && parallel {
                let Job {
                    vertex,
                    function,
                    inputs,
                    ..
                } = job;
                workers.push((vertex, scope.spawn(move || function.execute(&inputs))));
            } else {
                let outcome = job.function.execute(&job.inputs);
                results.push((job.vertex, Some(outcome)));
            }
        }
        for (vertex, worker) in workers {
            let outcome = worker.join().unwrap_or_else(|_| {
                Err(FunctionError::Computation("tree function panicked".into()))
            });
            results.push((vertex, Some(outcome)));
        }
    });

    results.sort_by_key(|(vertex, _)| *vertex);
    (results, canceled || cancel.load(Ordering::SeqCst))
}
