use std::sync::Arc;

use actdata_core::{
    CoreError, Document, Entry, ModificationKind, NodeClipboard, NodeId, NodeRegistry,
    NodeSchema, ParamKind, ParamSlot, ParamValue, ReferenceFilter, TreeFunctionBinding,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const VALUE: usize = 0;
const TARGET: usize = 1;
const PEERS: usize = 2;
const COMPUTE: usize = 3;

fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry
        .register(NodeSchema::new(
            "Part",
            vec![
                ParamSlot::mandatory("value", ParamKind::Real).with_default(ParamValue::Real(0.0)),
                ParamSlot::optional("target", ParamKind::Reference),
                ParamSlot::optional("peers", ParamKind::ReferenceList),
                ParamSlot::optional("compute", ParamKind::TreeFunction),
            ],
        ))
        .unwrap();
    Arc::new(registry)
}

fn in_tx<T>(doc: &mut Document, f: impl FnOnce(&mut Document) -> T) -> T {
    doc.open_command().unwrap();
    let out = f(doc);
    doc.commit_command().unwrap();
    out
}

fn part(doc: &mut Document) -> NodeId {
    in_tx(doc, |doc| doc.create_node("Part").unwrap())
}

fn slot(doc: &Document, node: NodeId, index: usize) -> Entry {
    doc.parameter(node, index).unwrap().entry()
}

fn value(doc: &Document, node: NodeId, index: usize) -> Option<ParamValue> {
    doc.parameter(node, index).unwrap().value()
}

fn write(doc: &mut Document, node: NodeId, index: usize, value: ParamValue) {
    let id = doc.parameter(node, index).unwrap().id();
    in_tx(doc, |doc| {
        doc.set_value(id, value, ModificationKind::Silent).unwrap()
    });
}

fn link(doc: &mut Document, parent: NodeId, child: NodeId) {
    in_tx(doc, |doc| doc.add_child_node(parent, child).unwrap());
}

fn name(doc: &Document, node: NodeId) -> Option<String> {
    doc.node(node).unwrap().name().map(str::to_string)
}

// ---------------------------------------------------------------------------
// Parent/child links
// ---------------------------------------------------------------------------

#[test]
fn children_keep_insertion_order() {
    let mut doc = Document::new(registry()).unwrap();
    let root = part(&mut doc);
    let a = part(&mut doc);
    let b = part(&mut doc);
    link(&mut doc, root, b);
    link(&mut doc, root, a);

    assert_eq!(doc.child_nodes(root), vec![b, a]);
    assert_eq!(doc.parent_node(a), Some(root));
    assert_eq!(doc.node(b).unwrap().parent_node(), Some(root));
    assert_eq!(doc.node(root).unwrap().child_nodes(), vec![b, a]);
    assert_eq!(doc.root_nodes(), vec![root]);
    assert_eq!(doc.subtree(root), vec![root, b, a]);
}

#[test]
fn links_cannot_close_cycles_or_share_children() {
    let mut doc = Document::new(registry()).unwrap();
    let root = part(&mut doc);
    let a = part(&mut doc);
    let b = part(&mut doc);
    link(&mut doc, root, a);
    link(&mut doc, a, b);

    doc.open_command().unwrap();
    assert!(matches!(
        doc.add_child_node(b, root),
        Err(CoreError::Hierarchy { node, .. }) if node == root
    ));
    assert!(matches!(
        doc.add_child_node(root, b),
        Err(CoreError::Hierarchy { node, .. }) if node == b
    ));
    assert!(matches!(
        doc.add_child_node(a, a),
        Err(CoreError::Hierarchy { .. })
    ));

    assert!(!doc.remove_child_node(root, b).unwrap());
    assert!(doc.remove_child_node(a, b).unwrap());
    doc.commit_command().unwrap();

    assert_eq!(doc.parent_node(b), None);
    assert!(doc.child_nodes(a).is_empty());
    assert_eq!(doc.root_nodes(), vec![root, b]);
}

#[test]
fn removing_a_node_removes_its_subtree() {
    let mut doc = Document::new(registry()).unwrap();
    let root = part(&mut doc);
    let a = part(&mut doc);
    let b = part(&mut doc);
    let outside = part(&mut doc);
    link(&mut doc, root, a);
    link(&mut doc, a, b);

    let b_value = slot(&doc, b, VALUE);
    let a_value = slot(&doc, a, VALUE);
    let own_value = slot(&doc, outside, VALUE);
    write(&mut doc, outside, TARGET, ParamValue::Reference(b_value.clone()));
    write(
        &mut doc,
        outside,
        PEERS,
        ParamValue::ReferenceList(vec![a_value, own_value.clone()]),
    );
    let compute = doc.parameter(outside, COMPUTE).unwrap().id();
    in_tx(&mut doc, |doc| {
        doc.connect_tree_function(
            compute,
            TreeFunctionBinding::new("copy")
                .with_inputs([b_value.clone()])
                .with_outputs([own_value.clone()]),
        )
        .unwrap()
    });
    assert_eq!(doc.tree_functions().len(), 1);

    in_tx(&mut doc, |doc| doc.remove_node(a).unwrap());

    assert!(matches!(doc.node(a), Err(CoreError::NodeNotFound { .. })));
    assert!(matches!(doc.node(b), Err(CoreError::NodeNotFound { .. })));
    assert!(doc.child_nodes(root).is_empty());
    assert_eq!(value(&doc, outside, TARGET), None);
    assert_eq!(
        value(&doc, outside, PEERS),
        Some(ParamValue::ReferenceList(vec![own_value]))
    );
    assert_eq!(value(&doc, outside, COMPUTE), None);
    assert!(doc.tree_functions().is_empty());
    assert!(doc.check_well_formed().is_empty());

    doc.undo(1).unwrap();
    assert_eq!(doc.child_nodes(root), vec![a]);
    assert_eq!(doc.child_nodes(a), vec![b]);
    assert_eq!(
        value(&doc, outside, TARGET),
        Some(ParamValue::Reference(b_value))
    );
    assert_eq!(doc.tree_functions().len(), 1);
}

#[test]
fn removing_a_parameter_clears_references_to_it() {
    let mut doc = Document::new(registry()).unwrap();
    let source = part(&mut doc);
    let reader = part(&mut doc);
    let source_value = slot(&doc, source, VALUE);
    write(&mut doc, reader, TARGET, ParamValue::Reference(source_value.clone()));
    write(
        &mut doc,
        reader,
        PEERS,
        ParamValue::ReferenceList(vec![source_value.clone(), source_value]),
    );

    in_tx(&mut doc, |doc| doc.remove_parameter(source, VALUE).unwrap());

    assert_eq!(value(&doc, reader, TARGET), None);
    assert_eq!(
        value(&doc, reader, PEERS),
        Some(ParamValue::ReferenceList(Vec::new()))
    );
}

// ---------------------------------------------------------------------------
// Copy and paste
// ---------------------------------------------------------------------------

#[test]
fn paste_relocates_relations_inside_the_copy() {
    let mut doc = Document::new(registry()).unwrap();
    let frame = part(&mut doc);
    let child = part(&mut doc);
    let outside = part(&mut doc);
    link(&mut doc, frame, child);
    in_tx(&mut doc, |doc| doc.set_node_name(frame, "Frame").unwrap());
    in_tx(&mut doc, |doc| doc.set_node_name(child, "Leg").unwrap());

    let frame_value = slot(&doc, frame, VALUE);
    let child_value = slot(&doc, child, VALUE);
    let outside_value = slot(&doc, outside, VALUE);
    write(&mut doc, frame, VALUE, ParamValue::Real(2.5));
    write(&mut doc, frame, TARGET, ParamValue::Reference(outside_value.clone()));
    write(
        &mut doc,
        frame,
        PEERS,
        ParamValue::ReferenceList(vec![child_value.clone(), outside_value]),
    );
    write(&mut doc, child, TARGET, ParamValue::Reference(frame_value.clone()));
    let compute = doc.parameter(child, COMPUTE).unwrap().id();
    in_tx(&mut doc, |doc| {
        doc.connect_tree_function(
            compute,
            TreeFunctionBinding::new("copy")
                .with_inputs([frame_value])
                .with_outputs([child_value]),
        )
        .unwrap()
    });

    let clipboard = doc.copy_node(frame).unwrap();
    assert_eq!(clipboard.len(), 2);
    assert_eq!(clipboard.nodes()[1].parent, Some(0));

    let pasted = in_tx(&mut doc, |doc| doc.paste_as_child(&clipboard, None).unwrap());
    let pasted_child = doc.child_nodes(pasted)[0];
    let pasted_value = slot(&doc, pasted, VALUE);
    let pasted_child_value = slot(&doc, pasted_child, VALUE);

    assert_eq!(name(&doc, pasted).as_deref(), Some("Frame 1"));
    assert_eq!(name(&doc, pasted_child).as_deref(), Some("Leg"));
    assert_eq!(doc.parent_node(pasted), None);
    assert_eq!(value(&doc, pasted, VALUE), Some(ParamValue::Real(2.5)));
    assert_eq!(value(&doc, pasted, TARGET), None);
    assert_eq!(
        value(&doc, pasted, PEERS),
        Some(ParamValue::ReferenceList(vec![pasted_child_value.clone()]))
    );
    assert_eq!(
        value(&doc, pasted_child, TARGET),
        Some(ParamValue::Reference(pasted_value.clone()))
    );
    let binding = value(&doc, pasted_child, COMPUTE).unwrap();
    let binding = binding.as_binding().unwrap();
    assert_eq!(binding.inputs, vec![pasted_value]);
    assert_eq!(binding.outputs, vec![pasted_child_value]);
    assert_eq!(doc.tree_functions().len(), 2);

    let again = in_tx(&mut doc, |doc| doc.paste_as_child(&clipboard, None).unwrap());
    assert_eq!(name(&doc, again).as_deref(), Some("Frame 2"));
}

#[test]
fn filter_keeps_selected_outside_relations() {
    let mut doc = Document::new(registry()).unwrap();
    let frame = part(&mut doc);
    let outside = part(&mut doc);
    let frame_value = slot(&doc, frame, VALUE);
    let outside_value = slot(&doc, outside, VALUE);
    write(&mut doc, frame, TARGET, ParamValue::Reference(outside_value.clone()));
    let compute = doc.parameter(frame, COMPUTE).unwrap().id();
    in_tx(&mut doc, |doc| {
        doc.connect_tree_function(
            compute,
            TreeFunctionBinding::new("scale")
                .with_inputs([outside_value.clone()])
                .with_outputs([frame_value]),
        )
        .unwrap()
    });

    let filter = ReferenceFilter::default()
        .pass_reference("Part", TARGET)
        .pass_function("scale");
    let clipboard = doc.copy_node_with(frame, &filter).unwrap();
    let pasted = in_tx(&mut doc, |doc| {
        doc.paste_as_child(&clipboard, Some(outside)).unwrap()
    });

    assert_eq!(doc.parent_node(pasted), Some(outside));
    assert_eq!(name(&doc, pasted).as_deref(), Some("Part 1"));
    assert_eq!(
        value(&doc, pasted, TARGET),
        Some(ParamValue::Reference(outside_value.clone()))
    );
    let binding = value(&doc, pasted, COMPUTE).unwrap();
    let binding = binding.as_binding().unwrap();
    assert_eq!(binding.inputs, vec![outside_value]);
    assert_eq!(binding.outputs, vec![slot(&doc, pasted, VALUE)]);
}

#[test]
fn paste_is_undone_as_one_command() {
    let mut doc = Document::new(registry()).unwrap();
    let frame = part(&mut doc);
    let child = part(&mut doc);
    link(&mut doc, frame, child);
    let clipboard = doc.copy_node(frame).unwrap();

    let pasted = in_tx(&mut doc, |doc| doc.paste_as_child(&clipboard, Some(frame)).unwrap());
    assert_eq!(doc.nodes().len(), 4);
    assert_eq!(doc.child_nodes(frame), vec![child, pasted]);

    doc.undo(1).unwrap();
    assert_eq!(doc.nodes(), vec![frame, child]);
    assert_eq!(doc.child_nodes(frame), vec![child]);
}

#[test]
fn empty_clipboard_is_rejected() {
    let mut doc = Document::new(registry()).unwrap();
    doc.open_command().unwrap();
    let err = doc
        .paste_as_child(&NodeClipboard::default(), None)
        .unwrap_err();
    assert!(matches!(err, CoreError::EmptyClipboard));
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[test]
fn unique_names_count_siblings_of_the_same_parent() {
    let mut doc = Document::new(registry()).unwrap();
    let parent = part(&mut doc);
    let first = part(&mut doc);
    let second = part(&mut doc);
    link(&mut doc, parent, first);
    link(&mut doc, parent, second);
    in_tx(&mut doc, |doc| {
        doc.set_node_name(first, "Part 1").unwrap();
        doc.set_node_name(second, "Part 4").unwrap();
    });

    assert_eq!(doc.unique_child_name(Some(parent), "Part", ""), "Part 5");
    assert_eq!(doc.unique_child_name(Some(parent), "Part", "Wheel"), "Wheel 1");
    assert_eq!(doc.unique_child_name(None, "Part", "  "), "Part 1");
}
