//! Parameter-level edits recorded by conversion routines.
//!
//! Operations address Parameters by their index in the layout the document
//! has when [`ConversionContext::apply`] runs. Applying renumbers each
//! touched Node's Parameters densely and rewrites every reference in the
//! document (Reference values, Reference lists, Tree-Function inputs and
//! outputs) that pointed at a moved Parameter. References to deleted
//! Parameters are dropped from lists; a single Reference to a deleted
//! Parameter loses its value.

use std::collections::{BTreeMap, HashMap, HashSet};

use actdata_core::{
    CoreError, Document, Entry, ModificationKind, NodeId, ParamValue, ParameterDto, ParameterGid,
};

use crate::error::StorageError;

type Moves = HashMap<Entry, Option<Entry>>;

#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Insert {
        before: Option<usize>,
        dto: ParameterDto,
    },
    Update {
        index: usize,
        dto: ParameterDto,
    },
    Delete {
        index: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    /// Operations per Node data object id, in recording order.
    operations: BTreeMap<String, Vec<Operation>>,
}

struct Layout {
    node: NodeId,
    entry: Entry,
    old_indices: Vec<usize>,
    parameters: Vec<ParameterDto>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a Parameter into `node` before the Parameter currently at
    /// `before`, or after the last one.
    pub fn insert(
        &mut self,
        node: impl Into<String>,
        dto: ParameterDto,
        before: Option<usize>,
    ) -> &mut Self {
        self.push(node.into(), Operation::Insert { before, dto });
        self
    }

    /// Replaces the content of an existing Parameter. The DTO may change
    /// its kind.
    pub fn update(&mut self, gid: ParameterGid, dto: ParameterDto) -> &mut Self {
        self.push(gid.node, Operation::Update { index: gid.pid, dto });
        self
    }

    pub fn delete(&mut self, gid: ParameterGid) -> &mut Self {
        self.push(gid.node, Operation::Delete { index: gid.pid });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn push(&mut self, node: String, operation: Operation) {
        self.operations.entry(node).or_default().push(operation);
    }

    pub fn apply(self, doc: &mut Document) -> Result<(), StorageError> {
        let mut moves = Moves::new();
        let mut layouts = Vec::new();
        for (node, operations) in self.operations {
            layouts.push(plan_layout(doc, &node, operations, &mut moves)?);
        }

        for layout in layouts {
            for index in layout.old_indices.iter().rev() {
                doc.detach_parameter(layout.node, *index)?;
            }
            for (index, mut dto) in layout.parameters.into_iter().enumerate() {
                dto.gid = ParameterGid::new(layout.entry.to_string(), index);
                doc.put_parameter(layout.node, index, &dto)?;
            }
        }

        moves.retain(|from, to| to.as_ref() != Some(from));
        if !moves.is_empty() {
            rewrite_references(doc, &moves)?;
        }
        Ok(())
    }
}

fn plan_layout(
    doc: &Document,
    key: &str,
    operations: Vec<Operation>,
    moves: &mut Moves,
) -> Result<Layout, StorageError> {
    let node = doc
        .find_node(key)
        .ok_or_else(|| StorageError::UnknownNode {
            node: key.to_string(),
        })?;
    let view = doc.node(node)?;
    let entry = view.entry();
    let current = view
        .parameters()
        .iter()
        .map(|param| Ok((param.index(), param.export_dto()?)))
        .collect::<Result<Vec<_>, CoreError>>()?;
    let exists = |index: usize| current.iter().any(|(i, _)| *i == index);

    let mut inserted: BTreeMap<usize, Vec<ParameterDto>> = BTreeMap::new();
    let mut appended = Vec::new();
    let mut updates: HashMap<usize, ParameterDto> = HashMap::new();
    let mut deleted: HashSet<usize> = HashSet::new();
    for operation in operations {
        match operation {
            Operation::Insert {
                before: Some(index),
                dto,
            } => inserted.entry(index).or_default().push(dto),
            Operation::Insert { before: None, dto } => appended.push(dto),
            Operation::Update { index, dto } => {
                if !exists(index) {
                    return Err(CoreError::MissingParameter { node, index }.into());
                }
                updates.insert(index, dto);
            }
            Operation::Delete { index } => {
                if !exists(index) {
                    return Err(CoreError::MissingParameter { node, index }.into());
                }
                deleted.insert(index);
            }
        }
    }

    let old_indices: Vec<usize> = current.iter().map(|(i, _)| *i).collect();
    let mut parameters = Vec::with_capacity(current.len() + appended.len());
    for (index, dto) in current {
        if let Some(before) = inserted.remove(&index) {
            parameters.extend(before);
        }
        let from = entry.child(index as u32 + 1);
        if deleted.contains(&index) {
            moves.insert(from, None);
            continue;
        }
        moves.insert(from, Some(entry.child(parameters.len() as u32 + 1)));
        parameters.push(updates.remove(&index).unwrap_or(dto));
    }
    parameters.extend(inserted.into_values().flatten());
    parameters.extend(appended);

    tracing::debug!(
        node = key,
        before = old_indices.len(),
        after = parameters.len(),
        "parameter layout converted"
    );
    Ok(Layout {
        node,
        entry,
        old_indices,
        parameters,
    })
}

fn rewrite_references(doc: &mut Document, moves: &Moves) -> Result<(), StorageError> {
    let mut rewrites = Vec::new();
    for node in doc.nodes() {
        for param in doc.node(node)?.parameters() {
            let Some(value) = param.value() else {
                continue;
            };
            if let Some(rewritten) = rewrite(&value, moves) {
                let mut dto = param.export_dto()?;
                dto.value = rewritten;
                rewrites.push((param.id(), dto));
            }
        }
    }
    for (id, dto) in rewrites {
        doc.set_from_dto(id, &dto, ModificationKind::Silent, false, false)?;
    }
    Ok(())
}

/// The value after `moves`, or `None` when it does not change.
fn rewrite(value: &ParamValue, moves: &Moves) -> Option<Option<ParamValue>> {
    let rewritten = match value {
        ParamValue::Reference(entry) => moves
            .get(entry)?
            .as_ref()
            .map(|target| ParamValue::Reference(target.clone())),
        ParamValue::ReferenceList(entries) => {
            Some(ParamValue::ReferenceList(remap(entries, moves)))
        }
        ParamValue::TreeFunction(binding) => {
            let mut binding = binding.clone();
            binding.inputs = remap(&binding.inputs, moves);
            binding.outputs = remap(&binding.outputs, moves);
            Some(ParamValue::TreeFunction(binding))
        }
        _ => return None,
    };
    (rewritten.as_ref() != Some(value)).then_some(rewritten)
}

fn remap(entries: &[Entry], moves: &Moves) -> Vec<Entry> {
    entries
        .iter()
        .filter_map(|entry| match moves.get(entry) {
            None => Some(entry.clone()),
            Some(target) => target.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use actdata_core::{NodeRegistry, NodeSchema, ParamKind, ParamSlot, TreeFunctionBinding};

    fn registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry
            .register(NodeSchema::new(
                "Shape",
                vec![
                    ParamSlot::mandatory("a", ParamKind::Int).with_default(ParamValue::Int(1)),
                    ParamSlot::mandatory("b", ParamKind::Int).with_default(ParamValue::Int(2)),
                    ParamSlot::mandatory("c", ParamKind::Int).with_default(ParamValue::Int(3)),
                ],
            ))
            .unwrap();
        registry
            .register(NodeSchema::new(
                "Watcher",
                vec![
                    ParamSlot::optional("one", ParamKind::Reference),
                    ParamSlot::optional("many", ParamKind::ReferenceList),
                    ParamSlot::optional("rule", ParamKind::TreeFunction),
                ],
            ))
            .unwrap();
        Arc::new(registry)
    }

    fn int_values(doc: &Document, node: NodeId) -> Vec<i64> {
        doc.node(node)
            .unwrap()
            .parameters()
            .iter()
            .filter_map(|p| p.value().and_then(|v| v.as_int()))
            .collect()
    }

    #[test]
    fn insert_delete_update_renumber_densely() {
        let mut doc = Document::new(registry()).unwrap();
        doc.disable_transactions().unwrap();
        let shape = doc.create_node("Shape").unwrap();
        let key = doc.node(shape).unwrap().data_object_id();

        let mut ctx = ConversionContext::new();
        ctx.insert(
            key.clone(),
            ParameterDto::new(ParameterGid::new(key.clone(), 0), ParamValue::Int(0)),
            Some(0),
        )
        .delete(ParameterGid::new(key.clone(), 1))
        .update(
            ParameterGid::new(key.clone(), 2),
            ParameterDto::new(ParameterGid::new(key.clone(), 2), ParamValue::Int(30)),
        )
        .insert(
            key.clone(),
            ParameterDto::new(ParameterGid::new(key.clone(), 0), ParamValue::Int(4)),
            None,
        );
        ctx.apply(&mut doc).unwrap();

        assert_eq!(int_values(&doc, shape), vec![0, 1, 30, 4]);
        let gids: Vec<usize> = doc
            .node(shape)
            .unwrap()
            .parameters()
            .iter()
            .map(|p| p.gid().pid)
            .collect();
        assert_eq!(gids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn references_follow_moved_parameters() {
        let mut doc = Document::new(registry()).unwrap();
        doc.disable_transactions().unwrap();
        let shape = doc.create_node("Shape").unwrap();
        let watcher = doc.create_node("Watcher").unwrap();
        let key = doc.node(shape).unwrap().data_object_id();
        let entry_of = |doc: &Document, index| doc.parameter(shape, index).unwrap().entry();
        let (a, b, c) = (entry_of(&doc, 0), entry_of(&doc, 1), entry_of(&doc, 2));

        let one = doc.parameter(watcher, 0).unwrap().id();
        let many = doc.parameter(watcher, 1).unwrap().id();
        let rule = doc.parameter(watcher, 2).unwrap().id();
        doc.set_value(one, ParamValue::Reference(c.clone()), ModificationKind::Silent)
            .unwrap();
        doc.set_value(
            many,
            ParamValue::ReferenceList(vec![a.clone(), b.clone(), c.clone()]),
            ModificationKind::Silent,
        )
        .unwrap();
        doc.set_value(
            rule,
            ParamValue::TreeFunction(
                TreeFunctionBinding::new("f")
                    .with_inputs([b.clone()])
                    .with_outputs([c.clone()]),
            ),
            ModificationKind::Silent,
        )
        .unwrap();

        // Drop `a`: `b` and `c` move down by one.
        let mut ctx = ConversionContext::new();
        ctx.delete(ParameterGid::new(key, 0));
        ctx.apply(&mut doc).unwrap();

        assert_eq!(
            doc.param(one).unwrap().value(),
            Some(ParamValue::Reference(b.clone()))
        );
        assert_eq!(
            doc.param(many).unwrap().value(),
            Some(ParamValue::ReferenceList(vec![a.clone(), b.clone()]))
        );
        let binding = doc.param(rule).unwrap().value().unwrap();
        let binding = binding.as_binding().unwrap();
        assert_eq!(binding.inputs, vec![a]);
        assert_eq!(binding.outputs, vec![b]);
    }

    #[test]
    fn unknown_node_and_index_are_rejected() {
        let mut doc = Document::new(registry()).unwrap();
        doc.disable_transactions().unwrap();
        let shape = doc.create_node("Shape").unwrap();
        let key = doc.node(shape).unwrap().data_object_id();

        let mut ctx = ConversionContext::new();
        ctx.delete(ParameterGid::new("0:2:1:99", 0));
        assert!(matches!(
            ctx.apply(&mut doc),
            Err(StorageError::UnknownNode { .. })
        ));

        let mut ctx = ConversionContext::new();
        ctx.delete(ParameterGid::new(key, 7));
        assert!(matches!(
            ctx.apply(&mut doc),
            Err(StorageError::Core(CoreError::MissingParameter { index: 7, .. }))
        ));
        assert_eq!(int_values(&doc, shape), vec![1, 2, 3]);
    }
}
