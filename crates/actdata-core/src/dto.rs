//! Plain data transfer objects for Parameters.
//!
//! DTOs carry a Parameter's content without any connectivity: they are what
//! persistence drivers, scripting layers and tests exchange with the
//! document.

use serde::{Deserialize, Serialize};

use crate::value::{ParamKind, ParamValue};

/// Global address of a Parameter: owning Node's data object id plus the
/// Parameter's index within that Node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterGid {
    pub node: String,
    pub pid: usize,
}

impl ParameterGid {
    pub fn new(node: impl Into<String>, pid: usize) -> Self {
        ParameterGid {
            node: node.into(),
            pid,
        }
    }
}

/// Snapshot of a Parameter's content and state flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDto {
    pub gid: ParameterGid,
    pub kind: ParamKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub semantic_id: String,
    #[serde(default)]
    pub eval_string: String,
    #[serde(default)]
    pub user_flags: i64,
    pub is_valid: bool,
    pub is_pending: bool,
    /// `None` when the Parameter holds no value.
    pub value: Option<ParamValue>,
}

impl ParameterDto {
    /// A valid, non-pending DTO holding `value`.
    pub fn new(gid: ParameterGid, value: ParamValue) -> Self {
        ParameterDto {
            gid,
            kind: value.kind(),
            name: String::new(),
            semantic_id: String::new(),
            eval_string: String::new(),
            user_flags: 0,
            is_valid: true,
            is_pending: false,
            value: Some(value),
        }
    }

    /// A DTO of the given kind holding no value.
    pub fn empty(gid: ParameterGid, kind: ParamKind) -> Self {
        ParameterDto {
            gid,
            kind,
            name: String::new(),
            semantic_id: String::new(),
            eval_string: String::new(),
            user_flags: 0,
            is_valid: true,
            is_pending: false,
            value: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dto_wire_shape() {
        let dto = ParameterDto::new(ParameterGid::new("0:2:1:1", 0), ParamValue::Int(5))
            .with_name("count");
        insta::assert_json_snapshot!(dto, @r#"
        {
          "gid": {
            "node": "0:2:1:1",
            "pid": 0
          },
          "kind": "Int",
          "name": "count",
          "semantic_id": "",
          "eval_string": "",
          "user_flags": 0,
          "is_valid": true,
          "is_pending": false,
          "value": {
            "kind": "Int",
            "value": 5
          }
        }
        "#);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{
            "gid": {"node": "0:2:1:1", "pid": 2},
            "kind": "Real",
            "is_valid": false,
            "is_pending": true,
            "value": null
        }"#;
        let dto: ParameterDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.kind, ParamKind::Real);
        assert_eq!(dto.name, "");
        assert!(dto.value.is_none());
        assert!(dto.is_pending);
    }
}
