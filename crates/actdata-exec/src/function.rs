//! Tree-Function implementations and their registry.
//!
//! A binding stored in the document only names its function. The engine
//! resolves that name through a [`FunctionRegistry`] built by the host
//! application.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use actdata_core::{ParamKind, ParamValue, TreeFunctionPriority};

use crate::error::{ExecError, FunctionError};

/// A computation from input Parameter values to output Parameter values.
pub trait TreeFunction: Send + Sync {
    fn name(&self) -> &str;

    fn input_signature(&self) -> Vec<ParamKind>;

    fn output_signature(&self) -> Vec<ParamKind>;

    /// Heavy functions may run on worker threads or be deferred.
    fn is_heavy(&self) -> bool {
        false
    }

    fn priority(&self) -> TreeFunctionPriority {
        TreeFunctionPriority::Normal
    }

    /// Runs even when nothing upstream changed.
    fn must_execute_intact(&self) -> bool {
        false
    }

    fn execute(&self, inputs: &[ParamValue]) -> Result<Vec<ParamValue>, FunctionError>;
}

/// Tree Functions by name.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn TreeFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Arc<dyn TreeFunction>) -> Result<(), ExecError> {
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(ExecError::DuplicateFunction { name });
        }
        tracing::debug!(function = %name, "registered tree function");
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TreeFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Negate;

    impl TreeFunction for Negate {
        fn name(&self) -> &str {
            "negate"
        }

        fn input_signature(&self) -> Vec<ParamKind> {
            vec![ParamKind::Int]
        }

        fn output_signature(&self) -> Vec<ParamKind> {
            vec![ParamKind::Int]
        }

        fn execute(&self, inputs: &[ParamValue]) -> Result<Vec<ParamValue>, FunctionError> {
            match inputs.first().and_then(|v| v.as_int()) {
                Some(v) => Ok(vec![ParamValue::Int(-v)]),
                None => Err(FunctionError::InvalidInput {
                    index: 0,
                    reason: "expected an integer".into(),
                }),
            }
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Negate)).unwrap();

        let function = registry.get("negate").unwrap();
        assert_eq!(
            function.execute(&[ParamValue::Int(4)]).unwrap(),
            vec![ParamValue::Int(-4)]
        );
        assert!(!function.is_heavy());
        assert_eq!(function.priority(), TreeFunctionPriority::Normal);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Negate)).unwrap();
        let err = registry.register(Arc::new(Negate)).unwrap_err();
        assert!(matches!(err, ExecError::DuplicateFunction { name } if name == "negate"));
        assert_eq!(registry.len(), 1);
    }
}
