#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use actdata_core::{
    Document, ModificationKind, NodeRegistry, NodeSchema, ParamKind, ParamSlot, ParamValue,
    ParameterId, TreeFunctionBinding,
};
use actdata_exec::{FunctionError, TreeFunction, VertexId};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// "Cell": a real value plus an optional Tree-Function slot.
pub fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry
        .register(NodeSchema::new(
            "Cell",
            vec![
                ParamSlot::mandatory("value", ParamKind::Real).with_default(ParamValue::Real(0.0)),
                ParamSlot::optional("compute", ParamKind::TreeFunction),
            ],
        ))
        .unwrap();
    Arc::new(registry)
}

pub fn edit<T>(doc: &mut Document, f: impl FnOnce(&mut Document) -> T) -> T {
    doc.open_command().unwrap();
    let out = f(doc);
    doc.commit_command().unwrap();
    out
}

pub struct Cell {
    pub value: ParameterId,
    pub compute: ParameterId,
}

impl Cell {
    pub fn vertex(&self) -> VertexId {
        VertexId::from(self.compute)
    }
}

pub fn cell(doc: &mut Document, value: f64) -> Cell {
    edit(doc, |doc| {
        let node = doc.create_node("Cell").unwrap();
        let value_id = doc.parameter(node, 0).unwrap().id();
        let compute = doc.parameter(node, 1).unwrap().id();
        doc.set_value(value_id, ParamValue::Real(value), ModificationKind::Silent)
            .unwrap();
        Cell {
            value: value_id,
            compute,
        }
    })
}

pub fn bind(doc: &mut Document, target: &Cell, function: &str, inputs: &[ParameterId]) {
    bind_with(doc, target, TreeFunctionBinding::new(function), inputs);
}

pub fn bind_with(
    doc: &mut Document,
    target: &Cell,
    binding: TreeFunctionBinding,
    inputs: &[ParameterId],
) {
    let inputs: Vec<_> = inputs.iter().map(|id| doc.entry(*id).unwrap()).collect();
    let output = doc.entry(target.value).unwrap();
    let binding = binding.with_inputs(inputs).with_outputs([output]);
    edit(doc, |doc| doc.connect_tree_function(target.compute, binding).unwrap());
}

pub fn real(doc: &Document, id: ParameterId) -> f64 {
    doc.param(id)
        .unwrap()
        .value()
        .and_then(|v| v.as_real())
        .unwrap()
}

/// Arithmetic over real inputs, counting calls.
pub struct Arith {
    name: &'static str,
    arity: usize,
    heavy: bool,
    op: fn(&[f64]) -> Result<f64, FunctionError>,
    pub calls: AtomicUsize,
    pub threads: Mutex<Vec<ThreadId>>,
    pub journal: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl Arith {
    pub fn new(name: &'static str, arity: usize, op: fn(&[f64]) -> Result<f64, FunctionError>) -> Self {
        Self {
            name,
            arity,
            heavy: false,
            op,
            calls: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
            journal: None,
        }
    }

    pub fn heavy(mut self) -> Self {
        self.heavy = true;
        self
    }

    pub fn journal(mut self, journal: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TreeFunction for Arith {
    fn name(&self) -> &str {
        self.name
    }

    fn input_signature(&self) -> Vec<ParamKind> {
        vec![ParamKind::Real; self.arity]
    }

    fn output_signature(&self) -> Vec<ParamKind> {
        vec![ParamKind::Real]
    }

    fn is_heavy(&self) -> bool {
        self.heavy
    }

    fn execute(&self, inputs: &[ParamValue]) -> Result<Vec<ParamValue>, FunctionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().unwrap().push(thread::current().id());
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(self.name);
        }
        let values: Vec<f64> = inputs.iter().filter_map(|v| v.as_real()).collect();
        Ok(vec![ParamValue::Real((self.op)(&values)?)])
    }
}

pub fn copy() -> Arith {
    Arith::new("copy", 1, |v| Ok(v[0]))
}

pub fn double() -> Arith {
    Arith::new("double", 1, |v| Ok(v[0] * 2.0))
}

pub fn add_one() -> Arith {
    Arith::new("add_one", 1, |v| Ok(v[0] + 1.0))
}

pub fn sum() -> Arith {
    Arith::new("sum", 2, |v| Ok(v.iter().sum()))
}

pub fn broken() -> Arith {
    Arith::new("broken", 1, |_| {
        Err(FunctionError::Computation("division by zero".into()))
    })
}
