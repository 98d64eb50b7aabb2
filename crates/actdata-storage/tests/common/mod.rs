#![allow(dead_code)]

use std::sync::Arc;

use actdata_core::{
    Document, NodeRegistry, NodeSchema, ParamKind, ParamSlot, ParamValue, ParameterDto,
    ParameterGid,
};
use actdata_storage::{
    ConversionContext, ConversionTuple, Converter, DocumentSnapshot, NodeSnapshot, StorageError,
};

/// Current (version 3) layout.
pub fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry
        .register(NodeSchema::new(
            "Gauge",
            vec![
                ParamSlot::mandatory("offset", ParamKind::Real).with_default(ParamValue::Real(0.0)),
                ParamSlot::mandatory("reading", ParamKind::Real).with_default(ParamValue::Real(0.0)),
                ParamSlot::mandatory("unit", ParamKind::AsciiString)
                    .with_default(ParamValue::AsciiString("bar".into())),
            ],
        ))
        .unwrap();
    registry
        .register(NodeSchema::new(
            "Link",
            vec![ParamSlot::mandatory("target", ParamKind::Reference)],
        ))
        .unwrap();
    Arc::new(registry)
}

/// Version 1: a Gauge holds only its reading; a Link points at it.
pub fn v1_snapshot() -> DocumentSnapshot {
    DocumentSnapshot {
        schema_version: Some(1),
        nodes: vec![
            NodeSnapshot {
                node_type: "Gauge".into(),
                data_object_id: "0:2:1:1".into(),
                name: Some("boiler".into()),
                parameters: vec![ParameterDto::new(
                    ParameterGid::new("0:2:1:1", 0),
                    ParamValue::Real(5.0),
                )
                .with_name("reading")],
                children: Vec::new(),
            },
            NodeSnapshot {
                node_type: "Link".into(),
                data_object_id: "0:2:2:1".into(),
                name: None,
                parameters: vec![ParameterDto::new(
                    ParameterGid::new("0:2:2:1", 0),
                    ParamValue::Reference("0:2:1:1:1".parse().unwrap()),
                )
                .with_name("target")],
                children: Vec::new(),
            },
        ],
    }
}

fn gauges(doc: &Document) -> Result<Vec<String>, StorageError> {
    doc.partition("Gauge")?
        .nodes()
        .into_iter()
        .map(|id| Ok(doc.node(id)?.data_object_id()))
        .collect()
}

fn unit(node: &str) -> ParameterDto {
    ParameterDto::new(ParameterGid::new(node, 0), ParamValue::AsciiString("bar".into()))
        .with_name("unit")
}

fn offset(node: &str) -> ParameterDto {
    ParameterDto::new(ParameterGid::new(node, 0), ParamValue::Real(0.0)).with_name("offset")
}

/// 1 -> 2: append the unit.
pub fn add_unit(doc: &mut Document) -> Result<(), StorageError> {
    let mut ctx = ConversionContext::new();
    for node in gauges(doc)? {
        ctx.insert(node.clone(), unit(&node), None);
    }
    ctx.apply(doc)
}

/// 2 -> 3: prepend the offset.
pub fn add_offset(doc: &mut Document) -> Result<(), StorageError> {
    let mut ctx = ConversionContext::new();
    for node in gauges(doc)? {
        ctx.insert(node.clone(), offset(&node), Some(0));
    }
    ctx.apply(doc)
}

/// 1 -> 3 in one step.
pub fn add_both(doc: &mut Document) -> Result<(), StorageError> {
    let mut ctx = ConversionContext::new();
    for node in gauges(doc)? {
        ctx.insert(node.clone(), offset(&node), Some(0));
        ctx.insert(node.clone(), unit(&node), None);
    }
    ctx.apply(doc)
}

pub fn chained() -> Converter {
    let mut converter = Converter::new();
    converter
        .register(ConversionTuple::new(1, 2, add_unit))
        .unwrap();
    converter
        .register(ConversionTuple::new(2, 3, add_offset))
        .unwrap();
    converter
}

pub fn direct() -> Converter {
    let mut converter = Converter::new();
    converter
        .register(ConversionTuple::new(1, 3, add_both))
        .unwrap();
    converter
}
