//! Parameter kinds and values, and their encoding as label attributes.
//!
//! A Parameter label carries its kind under [`KIND`] and its value under
//! [`VALUE`]. Tree-Function bindings spread over [`VALUE`] (the function
//! name) plus the `tf_*` keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LabelError;
use crate::function::{TreeFunctionBinding, TreeFunctionPriority};
use crate::id::LabelId;
use crate::label::{AttrKey, AttrValue, Entry, LabelStore};

pub const KIND: AttrKey = "param_kind";
pub const VALUE: AttrKey = "value";
pub const TF_INPUTS: AttrKey = "tf_inputs";
pub const TF_OUTPUTS: AttrKey = "tf_outputs";
pub const TF_HEAVY: AttrKey = "tf_heavy";
pub const TF_PRIORITY: AttrKey = "tf_priority";

const VALUE_KEYS: [AttrKey; 5] = [VALUE, TF_INPUTS, TF_OUTPUTS, TF_HEAVY, TF_PRIORITY];

/// The kind of value a Parameter slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamKind {
    Int,
    Real,
    Bool,
    AsciiString,
    IntArray,
    RealArray,
    StringArray,
    Reference,
    ReferenceList,
    TreeFunction,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Real => "real",
            ParamKind::Bool => "bool",
            ParamKind::AsciiString => "ascii_string",
            ParamKind::IntArray => "int_array",
            ParamKind::RealArray => "real_array",
            ParamKind::StringArray => "string_array",
            ParamKind::Reference => "reference",
            ParamKind::ReferenceList => "reference_list",
            ParamKind::TreeFunction => "tree_function",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int" => ParamKind::Int,
            "real" => ParamKind::Real,
            "bool" => ParamKind::Bool,
            "ascii_string" => ParamKind::AsciiString,
            "int_array" => ParamKind::IntArray,
            "real_array" => ParamKind::RealArray,
            "string_array" => ParamKind::StringArray,
            "reference" => ParamKind::Reference,
            "reference_list" => ParamKind::ReferenceList,
            "tree_function" => ParamKind::TreeFunction,
            other => return Err(format!("unknown parameter kind '{}'", other)),
        })
    }
}

/// A Parameter value. One variant per [`ParamKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParamValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    AsciiString(String),
    IntArray(Vec<i64>),
    RealArray(Vec<f64>),
    StringArray(Vec<String>),
    Reference(Entry),
    ReferenceList(Vec<Entry>),
    TreeFunction(TreeFunctionBinding),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Real(_) => ParamKind::Real,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::AsciiString(_) => ParamKind::AsciiString,
            ParamValue::IntArray(_) => ParamKind::IntArray,
            ParamValue::RealArray(_) => ParamKind::RealArray,
            ParamValue::StringArray(_) => ParamKind::StringArray,
            ParamValue::Reference(_) => ParamKind::Reference,
            ParamValue::ReferenceList(_) => ParamKind::ReferenceList,
            ParamValue::TreeFunction(_) => ParamKind::TreeFunction,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            ParamValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::AsciiString(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_binding(&self) -> Option<&TreeFunctionBinding> {
        match self {
            ParamValue::TreeFunction(b) => Some(b),
            _ => None,
        }
    }

    /// Every entry this value points at.
    pub fn references(&self) -> Vec<&Entry> {
        match self {
            ParamValue::Reference(e) => vec![e],
            ParamValue::ReferenceList(list) => list.iter().collect(),
            ParamValue::TreeFunction(b) => b.inputs.iter().chain(b.outputs.iter()).collect(),
            _ => Vec::new(),
        }
    }

    /// Writes the value attributes of a Parameter label.
    pub(crate) fn write(&self, store: &mut LabelStore, label: LabelId) -> Result<(), LabelError> {
        let encoded = match self {
            ParamValue::Int(v) => AttrValue::Integer(*v),
            ParamValue::Real(v) => AttrValue::Real(*v),
            ParamValue::Bool(v) => AttrValue::Bool(*v),
            ParamValue::AsciiString(v) => AttrValue::Text(v.clone()),
            ParamValue::IntArray(v) => AttrValue::IntArray(v.clone()),
            ParamValue::RealArray(v) => AttrValue::RealArray(v.clone()),
            ParamValue::StringArray(v) => AttrValue::TextArray(v.clone()),
            ParamValue::Reference(v) => AttrValue::Reference(v.clone()),
            ParamValue::ReferenceList(v) => AttrValue::ReferenceList(v.clone()),
            ParamValue::TreeFunction(binding) => {
                store.set_attribute(label, TF_INPUTS, AttrValue::ReferenceList(binding.inputs.clone()))?;
                store.set_attribute(label, TF_OUTPUTS, AttrValue::ReferenceList(binding.outputs.clone()))?;
                store.set_attribute(label, TF_HEAVY, AttrValue::Bool(binding.heavy))?;
                store.set_attribute(label, TF_PRIORITY, AttrValue::Integer(binding.priority.code()))?;
                AttrValue::Text(binding.function.clone())
            }
        };
        store.set_attribute(label, VALUE, encoded)?;
        Ok(())
    }

    /// Reads the value attributes of a Parameter label, expecting `kind`.
    /// Returns `None` when no value of that kind is present.
    pub(crate) fn read(store: &LabelStore, label: LabelId, kind: ParamKind) -> Option<ParamValue> {
        let raw = store.attribute(label, VALUE)?;
        let value = match (kind, raw) {
            (ParamKind::Int, AttrValue::Integer(v)) => ParamValue::Int(*v),
            (ParamKind::Real, AttrValue::Real(v)) => ParamValue::Real(*v),
            (ParamKind::Bool, AttrValue::Bool(v)) => ParamValue::Bool(*v),
            (ParamKind::AsciiString, AttrValue::Text(v)) => ParamValue::AsciiString(v.clone()),
            (ParamKind::IntArray, AttrValue::IntArray(v)) => ParamValue::IntArray(v.clone()),
            (ParamKind::RealArray, AttrValue::RealArray(v)) => ParamValue::RealArray(v.clone()),
            (ParamKind::StringArray, AttrValue::TextArray(v)) => ParamValue::StringArray(v.clone()),
            (ParamKind::Reference, AttrValue::Reference(v)) => ParamValue::Reference(v.clone()),
            (ParamKind::ReferenceList, AttrValue::ReferenceList(v)) => {
                ParamValue::ReferenceList(v.clone())
            }
            (ParamKind::TreeFunction, AttrValue::Text(function)) => {
                let inputs = store.attribute(label, TF_INPUTS)?.as_references()?.to_vec();
                let outputs = store.attribute(label, TF_OUTPUTS)?.as_references()?.to_vec();
                let heavy = store
                    .attribute(label, TF_HEAVY)
                    .and_then(AttrValue::as_bool)
                    .unwrap_or(false);
                let priority = store
                    .attribute(label, TF_PRIORITY)
                    .and_then(AttrValue::as_integer)
                    .map(TreeFunctionPriority::from_code)
                    .unwrap_or_default();
                ParamValue::TreeFunction(TreeFunctionBinding {
                    function: function.clone(),
                    inputs,
                    outputs,
                    heavy,
                    priority,
                })
            }
            _ => return None,
        };
        Some(value)
    }

    /// Removes every value attribute from a Parameter label.
    pub(crate) fn clear(store: &mut LabelStore, label: LabelId) -> Result<(), LabelError> {
        for key in VALUE_KEYS {
            store.remove_attribute(label, key)?;
        }
        Ok(())
    }
}
