//! The document: typed Partitions, Nodes and Parameters layered on a label
//! store, plus the LogBook and the transaction engine.
//!
//! # Label layout
//!
//! ```text
//! 0            root
//! 0:1          version section (schema_version)
//! 0:2          partitions
//! 0:2:p        one partition per registered node type, registration order
//! 0:2:p:n      a Node
//! 0:2:p:n:k    the Node's Parameter at index k - 1
//! ```
//!
//! Nodes of any Partition may be linked into a parent/child hierarchy. The
//! links are attributes on the Node labels (`parent`, `children`), so they
//! are recorded and undone like any other mutation.
//!
//! # Dependents
//!
//! A `Touched` write to a Parameter marks the outputs of every Tree Function
//! reading it as pending, transitively. The consumer index used for that walk
//! is cached against [`Document::bindings_revision`], which moves whenever a
//! binding may have changed.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::DocumentConfig;
use crate::dto::ParameterDto;
use crate::error::CoreError;
use crate::function::TreeFunctionBinding;
use crate::id::{LabelId, NodeId, ParameterId};
use crate::label::{AttrKey, AttrValue, Entry, LabelStore};
use crate::logbook::LogBook;
use crate::node::{Node, WellFormedReport};
use crate::parameter::{ModificationKind, Parameter};
use crate::partition::Partition;
use crate::schema::NodeRegistry;
use crate::transaction::{TransactionEngine, TxParameter, TxResult};
use crate::value::{ParamKind, ParamValue, KIND};

const VERSION_TAG: u32 = 1;
const PARTITIONS_TAG: u32 = 2;

pub(crate) const NODE_TYPE: AttrKey = "node_type";
pub(crate) const NAME: AttrKey = "name";
pub(crate) const VALID: AttrKey = "valid";
pub(crate) const PENDING: AttrKey = "pending";
pub(crate) const SEMANTIC_ID: AttrKey = "semantic_id";
pub(crate) const EVAL_STRING: AttrKey = "eval_string";
pub(crate) const USER_FLAGS: AttrKey = "user_flags";
pub(crate) const PARENT: AttrKey = "parent";
pub(crate) const CHILDREN: AttrKey = "children";
const SCHEMA_VERSION: AttrKey = "schema_version";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Root container of Partitions, Nodes and Parameters.
#[derive(Debug)]
pub struct Document {
    instance: u64,
    pub(crate) store: LabelStore,
    pub(crate) registry: Arc<NodeRegistry>,
    config: DocumentConfig,
    transactions: TransactionEngine,
    pub(crate) logbook: LogBook,
    /// Node type name -> partition label.
    partitions: IndexMap<String, LabelId>,
    version_label: LabelId,
    bindings_revision: u64,
    /// Input Parameter -> outputs of the Tree Functions reading it.
    consumers: Option<(u64, HashMap<ParameterId, Vec<ParameterId>>)>,
}

impl Document {
    /// Creates an empty document with one partition per registered type and
    /// transactions enabled.
    pub fn new(registry: Arc<NodeRegistry>) -> Result<Self, CoreError> {
        Self::with_config(registry, DocumentConfig::default())
    }

    pub fn with_config(
        registry: Arc<NodeRegistry>,
        config: DocumentConfig,
    ) -> Result<Self, CoreError> {
        let mut store = LabelStore::new();
        let root = store.root();
        let version_label = store.child_or_create(root, VERSION_TAG)?;
        let partitions_root = store.child_or_create(root, PARTITIONS_TAG)?;

        let mut partitions = IndexMap::new();
        for (position, schema) in registry.iter().enumerate() {
            let label = store.child_or_create(partitions_root, position as u32 + 1)?;
            store.set_attribute(label, NODE_TYPE, AttrValue::Text(schema.type_name.clone()))?;
            partitions.insert(schema.type_name.clone(), label);
        }

        let mut transactions = TransactionEngine::new(config.undo_limit);
        transactions.enable(&mut store)?;

        tracing::debug!(partitions = partitions.len(), "document created");
        Ok(Document {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            store,
            registry,
            config,
            transactions,
            logbook: LogBook::new(),
            partitions,
            version_label,
            bindings_revision: 0,
            consumers: None,
        })
    }

    /// Identity of this document, unique within the process. Caches keyed
    /// by [`bindings_revision`](Self::bindings_revision) pair it with this.
    pub fn instance_id(&self) -> u64 {
        self.instance
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Read access to the underlying label store.
    pub fn store(&self) -> &LabelStore {
        &self.store
    }

    pub fn logbook(&self) -> &LogBook {
        &self.logbook
    }

    /// Moves whenever a Tree-Function binding may have changed.
    pub fn bindings_revision(&self) -> u64 {
        self.bindings_revision
    }

    pub(crate) fn bump_revision(&mut self) {
        self.bindings_revision += 1;
    }

    // ---- classification ----

    fn is_partition(&self, label: LabelId) -> bool {
        self.partitions.values().any(|p| *p == label)
    }

    pub(crate) fn is_node_label(&self, label: LabelId) -> bool {
        self.store.is_alive(label)
            && self.store.attribute(label, NODE_TYPE).is_some()
            && self
                .store
                .parent(label)
                .is_some_and(|parent| self.is_partition(parent))
    }

    fn is_parameter_label(&self, label: LabelId) -> bool {
        self.store.attribute(label, KIND).is_some()
            && self
                .store
                .parent(label)
                .is_some_and(|parent| self.store.attribute(parent, NODE_TYPE).is_some())
    }

    pub(crate) fn node_label(&self, id: NodeId) -> Result<LabelId, CoreError> {
        let label = LabelId::from(id);
        if self.is_node_label(label) {
            Ok(label)
        } else {
            Err(CoreError::NodeNotFound { id })
        }
    }

    fn parameter_label(&self, id: ParameterId) -> Result<LabelId, CoreError> {
        let label = LabelId::from(id);
        if self.is_parameter_label(label) && self.store.is_alive(label) {
            Ok(label)
        } else {
            Err(CoreError::ParameterNotFound { id })
        }
    }

    fn partition_label(&self, node_type: &str) -> Result<LabelId, CoreError> {
        self.partitions
            .get(node_type)
            .copied()
            .ok_or_else(|| CoreError::UnknownType {
                name: node_type.to_string(),
            })
    }

    // ---- partitions and nodes ----

    pub fn partition(&self, node_type: &str) -> Result<Partition<'_>, CoreError> {
        let (name, label) = self
            .partitions
            .get_key_value(node_type)
            .ok_or_else(|| CoreError::UnknownType {
                name: node_type.to_string(),
            })?;
        Ok(Partition::new(self, name, *label))
    }

    pub fn partitions(&self) -> impl Iterator<Item = Partition<'_>> {
        self.partitions
            .iter()
            .map(move |(name, label)| Partition::new(self, name, *label))
    }

    /// Allocates a Node of a registered type in its Partition.
    pub fn create_node(&mut self, node_type: &str) -> Result<NodeId, CoreError> {
        let registry = Arc::clone(&self.registry);
        let schema = registry.get(node_type)?;
        let partition = self.partition_label(node_type)?;

        let label = self.store.new_child(partition)?;
        self.store
            .set_attribute(label, NODE_TYPE, AttrValue::Text(schema.type_name.clone()))?;
        for (index, slot) in schema.slots.iter().enumerate() {
            let param = self.store.child_or_create(label, index as u32 + 1)?;
            self.store
                .set_attribute(param, KIND, AttrValue::Text(slot.kind.as_str().to_string()))?;
            self.store
                .set_attribute(param, NAME, AttrValue::Text(slot.name.clone()))?;
            self.store.set_attribute(param, VALID, AttrValue::Bool(true))?;
            self.store.set_attribute(param, PENDING, AttrValue::Bool(false))?;
            if let Some(default) = &slot.default {
                default.write(&mut self.store, param)?;
            }
        }
        // New entries may be what an existing binding was waiting for.
        self.bump_revision();

        let id = NodeId::from(label);
        tracing::debug!(node = %id, node_type, "node created");
        Ok(id)
    }

    /// Re-creates a Node of `node_type` at an exact entry, with no
    /// Parameters. Used when importing persisted documents.
    pub fn restore_node(&mut self, node_type: &str, entry: &Entry) -> Result<NodeId, CoreError> {
        self.registry.get(node_type)?;
        let partition = self.partition_label(node_type)?;
        let partition_entry = self.store.entry(partition)?;
        if entry.parent().as_ref() != Some(&partition_entry) {
            return Err(CoreError::InvalidEntry {
                entry: entry.to_string(),
                reason: format!("not a child of the '{}' partition", node_type),
            });
        }

        let label = self.store.child_or_create(partition, entry.last_tag())?;
        self.store
            .set_attribute(label, NODE_TYPE, AttrValue::Text(node_type.to_string()))?;
        self.bump_revision();
        Ok(NodeId::from(label))
    }

    /// Deletes a Node together with all of its child Nodes.
    ///
    /// The Node is unlinked from its parent first. Tree Functions outside
    /// the deleted subtree that read or write one of its Parameters are
    /// disconnected; References into the subtree lose their value and
    /// Reference lists drop the deleted entries.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.node_label(id)?;
        let subtree = self.subtree(id);
        if let Some(parent) = self.parent_node(id) {
            self.unlink_child(parent, id)?;
        }

        let removed = subtree
            .iter()
            .map(|node| self.store.entry(LabelId::from(*node)))
            .collect::<Result<Vec<_>, _>>()?;
        self.release_relations(&removed)?;

        for node in subtree.iter().rev() {
            for param in self.parameter_labels(*node) {
                self.logbook.release(param);
            }
            self.store.forget(LabelId::from(*node))?;
        }
        self.bump_revision();
        tracing::debug!(node = %id, removed = subtree.len(), "node removed");
        Ok(())
    }

    /// Cuts every relation pointing into `removed` from the Parameters that
    /// survive.
    fn release_relations(&mut self, removed: &[Entry]) -> Result<(), CoreError> {
        let hit = |entry: &Entry| {
            removed
                .iter()
                .any(|gone| entry == gone || entry.is_descendant_of(gone))
        };

        let mut disconnected = Vec::new();
        let mut rewrites: Vec<(ParameterId, Option<ParamValue>)> = Vec::new();
        for node in self.nodes() {
            for id in self.parameter_labels(node) {
                if hit(&self.store.entry(id.into())?) {
                    continue;
                }
                match Parameter::new(self, id).value() {
                    Some(ParamValue::TreeFunction(binding)) => {
                        if binding.inputs.iter().chain(&binding.outputs).any(|e| hit(e)) {
                            disconnected.push(id);
                        }
                    }
                    Some(ParamValue::Reference(target)) if hit(&target) => {
                        rewrites.push((id, None));
                    }
                    Some(ParamValue::ReferenceList(targets)) if targets.iter().any(|e| hit(e)) => {
                        let kept = targets.into_iter().filter(|e| !hit(e)).collect();
                        rewrites.push((id, Some(ParamValue::ReferenceList(kept))));
                    }
                    _ => {}
                }
            }
        }

        for id in &disconnected {
            ParamValue::clear(&mut self.store, (*id).into())?;
            self.logbook.release(*id);
            tracing::debug!(function = %id, "tree function disconnected from removed data");
        }
        for (id, value) in rewrites {
            match value {
                Some(value) => value.write(&mut self.store, id.into())?,
                None => ParamValue::clear(&mut self.store, id.into())?,
            }
        }
        if !disconnected.is_empty() {
            self.bump_revision();
        }
        Ok(())
    }

    pub fn set_node_name(&mut self, id: NodeId, name: &str) -> Result<(), CoreError> {
        let label = self.node_label(id)?;
        self.store
            .set_attribute(label, NAME, AttrValue::Text(name.to_string()))?;
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Result<Node<'_>, CoreError> {
        self.node_label(id)?;
        Ok(Node::new(self, id))
    }

    /// Node by its data object id.
    pub fn find_node(&self, data_object_id: &str) -> Option<NodeId> {
        let entry: Entry = data_object_id.parse().ok()?;
        let label = self.store.find(&entry)?;
        self.is_node_label(label).then(|| NodeId::from(label))
    }

    /// Every attached Node, partition by partition.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.partitions().flat_map(|p| p.nodes()).collect()
    }

    /// Attached Parameter labels of a Node, ordered by index.
    pub(crate) fn parameter_labels(&self, id: NodeId) -> Vec<ParameterId> {
        let mut params: Vec<(u32, ParameterId)> = self
            .store
            .children(id.into())
            .filter(|child| self.store.attribute(*child, KIND).is_some())
            .filter_map(|child| Some((self.store.tag(child).ok()?, ParameterId::from(child))))
            .collect();
        params.sort_by_key(|(tag, _)| *tag);
        params.into_iter().map(|(_, id)| id).collect()
    }

    // ---- parameters ----

    /// The Parameter registered at `index` on `node`.
    pub fn parameter(&self, node: NodeId, index: usize) -> Result<Parameter<'_>, CoreError> {
        self.node(node)?.parameter(index)
    }

    pub fn param(&self, id: ParameterId) -> Result<Parameter<'_>, CoreError> {
        self.parameter_label(id)?;
        Ok(Parameter::new(self, id))
    }

    /// Parameter addressed by an entry, if attached.
    pub fn resolve(&self, entry: &Entry) -> Option<ParameterId> {
        let label = self.store.find(entry)?;
        self.is_parameter_label(label)
            .then(|| ParameterId::from(label))
    }

    pub fn entry(&self, id: ParameterId) -> Result<Entry, CoreError> {
        let label = self.parameter_label(id)?;
        Ok(self.store.entry(label)?)
    }

    fn declared_kind(&self, id: ParameterId) -> Result<ParamKind, CoreError> {
        self.param(id)?
            .kind()
            .ok_or(CoreError::ParameterNotFound { id })
    }

    /// Writes a value of the Parameter's kind.
    pub fn set_value(
        &mut self,
        id: ParameterId,
        value: ParamValue,
        modification: ModificationKind,
    ) -> Result<(), CoreError> {
        let expected = self.declared_kind(id)?;
        if value.kind() != expected {
            return Err(CoreError::KindMismatch {
                id,
                expected,
                actual: value.kind(),
            });
        }
        value.write(&mut self.store, id.into())?;
        if expected == ParamKind::TreeFunction {
            self.bump_revision();
        }
        self.apply_modification(id, modification)
    }

    /// Copies a DTO into the Parameter.
    ///
    /// Name, semantic id, evaluation string, user flags and value come from
    /// the DTO. Validity and pending come from the DTO too, unless the
    /// matching reset flag is set, in which case the Parameter becomes valid
    /// and not pending.
    pub fn set_from_dto(
        &mut self,
        id: ParameterId,
        dto: &ParameterDto,
        modification: ModificationKind,
        reset_validity: bool,
        reset_pending: bool,
    ) -> Result<(), CoreError> {
        let expected = self.declared_kind(id)?;
        if dto.kind != expected {
            return Err(CoreError::KindMismatch {
                id,
                expected,
                actual: dto.kind,
            });
        }
        self.write_dto(id, dto, reset_validity, reset_pending)?;
        if expected == ParamKind::TreeFunction {
            self.bump_revision();
        }
        self.apply_modification(id, modification)
    }

    fn write_dto(
        &mut self,
        id: ParameterId,
        dto: &ParameterDto,
        reset_validity: bool,
        reset_pending: bool,
    ) -> Result<(), CoreError> {
        if let Some(value) = &dto.value {
            if value.kind() != dto.kind {
                return Err(CoreError::KindMismatch {
                    id,
                    expected: dto.kind,
                    actual: value.kind(),
                });
            }
        }

        let label = LabelId::from(id);
        self.store
            .set_attribute(label, NAME, AttrValue::Text(dto.name.clone()))?;
        self.store
            .set_attribute(label, SEMANTIC_ID, AttrValue::Text(dto.semantic_id.clone()))?;
        self.store
            .set_attribute(label, EVAL_STRING, AttrValue::Text(dto.eval_string.clone()))?;
        self.store
            .set_attribute(label, USER_FLAGS, AttrValue::Integer(dto.user_flags))?;
        match &dto.value {
            Some(value) => value.write(&mut self.store, label)?,
            None => ParamValue::clear(&mut self.store, label)?,
        }
        let valid = reset_validity || dto.is_valid;
        let pending = !reset_pending && dto.is_pending;
        self.store.set_attribute(label, VALID, AttrValue::Bool(valid))?;
        self.store.set_attribute(label, PENDING, AttrValue::Bool(pending))?;
        Ok(())
    }

    /// Creates or overwrites the Parameter at `index` on `node` from a DTO,
    /// taking the kind from the DTO. No modification is logged.
    pub fn put_parameter(
        &mut self,
        node: NodeId,
        index: usize,
        dto: &ParameterDto,
    ) -> Result<ParameterId, CoreError> {
        let node_label = self.node_label(node)?;
        let label = self.store.child_or_create(node_label, index as u32 + 1)?;
        self.store.clear_attributes(label)?;
        self.store
            .set_attribute(label, KIND, AttrValue::Text(dto.kind.as_str().to_string()))?;
        let id = ParameterId::from(label);
        self.write_dto(id, dto, false, false)?;
        self.bump_revision();
        Ok(id)
    }

    /// Detaches the Parameter at `index` on `node`, if any. Tree Functions
    /// reading or writing it are disconnected and References to it cleared,
    /// as for [`remove_node`](Self::remove_node).
    pub fn remove_parameter(&mut self, node: NodeId, index: usize) -> Result<(), CoreError> {
        let node_label = self.node_label(node)?;
        if let Some(label) = self.store.find_child(node_label, index as u32 + 1) {
            let entry = self.store.entry(label)?;
            self.release_relations(&[entry])?;
            self.detach_parameter(node, index)?;
        }
        Ok(())
    }

    /// Detaches the Parameter at `index` on `node`, if any, leaving
    /// references to it untouched. For layout conversions that relocate
    /// those references themselves.
    pub fn detach_parameter(&mut self, node: NodeId, index: usize) -> Result<(), CoreError> {
        let node_label = self.node_label(node)?;
        if let Some(label) = self.store.find_child(node_label, index as u32 + 1) {
            self.logbook.release(label.into());
            self.store.forget(label)?;
            self.bump_revision();
        }
        Ok(())
    }

    pub fn set_validity(&mut self, id: ParameterId, valid: bool) -> Result<(), CoreError> {
        let label = self.parameter_label(id)?;
        self.store.set_attribute(label, VALID, AttrValue::Bool(valid))?;
        Ok(())
    }

    pub fn set_pending(&mut self, id: ParameterId, pending: bool) -> Result<(), CoreError> {
        let label = self.parameter_label(id)?;
        self.store
            .set_attribute(label, PENDING, AttrValue::Bool(pending))?;
        Ok(())
    }

    /// Stores a freshly computed value: touched, valid and not pending.
    pub fn set_computed_value(&mut self, id: ParameterId, value: ParamValue) -> Result<(), CoreError> {
        self.set_value(id, value, ModificationKind::Touched)?;
        self.set_validity(id, true)?;
        self.set_pending(id, false)
    }

    /// Marks a Parameter invalid and pending.
    pub fn invalidate(&mut self, id: ParameterId) -> Result<(), CoreError> {
        self.set_validity(id, false)?;
        self.set_pending(id, true)
    }

    /// Logs a Parameter as touched and marks its dependents pending.
    pub fn touch(&mut self, id: ParameterId) -> Result<(), CoreError> {
        self.parameter_label(id)?;
        self.apply_modification(id, ModificationKind::Touched)
    }

    fn apply_modification(
        &mut self,
        id: ParameterId,
        modification: ModificationKind,
    ) -> Result<(), CoreError> {
        match modification {
            ModificationKind::Touched => {
                self.logbook.touch(id);
                self.mark_dependents_pending(id)
            }
            ModificationKind::Impacted => {
                self.logbook.impact(id);
                Ok(())
            }
            ModificationKind::Silent => Ok(()),
        }
    }

    /// Outputs of every Tree Function downstream of `id`, breadth first.
    /// Each Parameter is listed once, so cycles terminate.
    pub fn dependents(&mut self, id: ParameterId) -> Vec<ParameterId> {
        let mut seen: HashSet<ParameterId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<ParameterId> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for output in self.consumer_outputs(current) {
                if seen.insert(output) {
                    order.push(output);
                    queue.push_back(output);
                }
            }
        }
        order
    }

    fn mark_dependents_pending(&mut self, id: ParameterId) -> Result<(), CoreError> {
        for output in self.dependents(id) {
            if self.store.is_alive(output.into()) {
                self.store
                    .set_attribute(output.into(), PENDING, AttrValue::Bool(true))?;
            }
        }
        Ok(())
    }

    fn consumer_outputs(&mut self, id: ParameterId) -> Vec<ParameterId> {
        let stale = self
            .consumers
            .as_ref()
            .map_or(true, |(revision, _)| *revision != self.bindings_revision);
        if stale {
            let index = self.build_consumer_index();
            self.consumers = Some((self.bindings_revision, index));
        }
        self.consumers
            .as_ref()
            .and_then(|(_, index)| index.get(&id))
            .cloned()
            .unwrap_or_default()
    }

    fn build_consumer_index(&self) -> HashMap<ParameterId, Vec<ParameterId>> {
        let mut index: HashMap<ParameterId, Vec<ParameterId>> = HashMap::new();
        for (_, binding) in self.tree_functions() {
            let outputs: Vec<ParameterId> = binding
                .outputs
                .iter()
                .filter_map(|entry| self.resolve(entry))
                .collect();
            for input in binding.inputs.iter().filter_map(|entry| self.resolve(entry)) {
                index.entry(input).or_default().extend(outputs.iter().copied());
            }
        }
        index
    }

    // ---- tree functions ----

    /// Binds a Tree-Function invocation to a `TreeFunction` Parameter.
    pub fn connect_tree_function(
        &mut self,
        id: ParameterId,
        binding: TreeFunctionBinding,
    ) -> Result<(), CoreError> {
        self.set_value(id, ParamValue::TreeFunction(binding), ModificationKind::Touched)
    }

    /// Removes the invocation bound to a `TreeFunction` Parameter.
    pub fn disconnect_tree_function(&mut self, id: ParameterId) -> Result<(), CoreError> {
        let expected = self.declared_kind(id)?;
        if expected != ParamKind::TreeFunction {
            return Err(CoreError::KindMismatch {
                id,
                expected: ParamKind::TreeFunction,
                actual: expected,
            });
        }
        ParamValue::clear(&mut self.store, id.into())?;
        self.logbook.release(id);
        self.bump_revision();
        Ok(())
    }

    /// Every attached, well-formed Tree-Function invocation, in label order.
    pub fn tree_functions(&self) -> Vec<(ParameterId, TreeFunctionBinding)> {
        let mut found = Vec::new();
        for node in self.nodes() {
            for id in self.parameter_labels(node) {
                let param = Parameter::new(self, id);
                if param.kind() != Some(ParamKind::TreeFunction) {
                    continue;
                }
                if let Some(ParamValue::TreeFunction(binding)) = param.value() {
                    found.push((id, binding));
                }
            }
        }
        found.sort_by_key(|(id, _)| *id);
        found
    }

    /// Forces a Tree Function to run on the next execution pass.
    pub fn force(&mut self, id: ParameterId) -> Result<(), CoreError> {
        self.parameter_label(id)?;
        self.logbook.force(id);
        Ok(())
    }

    /// Drops a Parameter from every LogBook section.
    pub fn release(&mut self, id: ParameterId) {
        self.logbook.release(id);
    }

    pub fn clear_logbook(&mut self) {
        self.logbook.clear();
    }

    // ---- version ----

    /// Schema version stored in the version section.
    pub fn version(&self) -> Option<u32> {
        self.store
            .attribute(self.version_label, SCHEMA_VERSION)
            .and_then(AttrValue::as_integer)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn set_version(&mut self, version: u32) -> Result<(), CoreError> {
        self.store.set_attribute(
            self.version_label,
            SCHEMA_VERSION,
            AttrValue::Integer(i64::from(version)),
        )?;
        Ok(())
    }

    // ---- well-formedness ----

    /// Reports for every ill-formed Node.
    pub fn check_well_formed(&self) -> Vec<WellFormedReport> {
        self.nodes()
            .into_iter()
            .map(|id| Node::new(self, id).well_formed_report())
            .filter(|report| !report.is_well_formed())
            .collect()
    }

    // ---- transactions ----

    pub fn open_command(&mut self) -> Result<(), CoreError> {
        self.transactions.open(&mut self.store, &self.logbook)?;
        Ok(())
    }

    pub fn commit_command(&mut self) -> Result<(), CoreError> {
        self.transactions.commit(&mut self.store)?;
        Ok(())
    }

    pub fn abort_command(&mut self) -> Result<(), CoreError> {
        self.transactions.abort(&mut self.store, &mut self.logbook)?;
        self.bump_revision();
        Ok(())
    }

    pub fn has_open_command(&self) -> bool {
        self.transactions.is_open()
    }

    pub fn transactions_enabled(&self) -> bool {
        self.transactions.is_enabled()
    }

    /// Stops recording: mutations apply directly and leave no history.
    pub fn disable_transactions(&mut self) -> Result<(), CoreError> {
        self.transactions.disable(&mut self.store)?;
        Ok(())
    }

    pub fn enable_transactions(&mut self) -> Result<(), CoreError> {
        self.transactions.enable(&mut self.store)?;
        Ok(())
    }

    pub fn nb_undos(&self) -> usize {
        self.transactions.nb_undos()
    }

    pub fn nb_redos(&self) -> usize {
        self.transactions.nb_redos()
    }

    pub fn set_undo_limit(&mut self, limit: usize) {
        self.config.undo_limit = limit;
        self.transactions.set_undo_limit(limit);
    }

    pub fn clear_history(&mut self) {
        self.transactions.clear_history();
    }

    /// Reverts the `n` most recent transactions, then touches every
    /// well-formed Parameter they affected.
    pub fn undo(&mut self, n: usize) -> Result<TxResult, CoreError> {
        let affected = self.transactions.undo(&mut self.store, n)?;
        self.bump_revision();
        self.retouch(affected)
    }

    /// Replays the `n` most recently undone transactions, then touches every
    /// well-formed Parameter they affected.
    pub fn redo(&mut self, n: usize) -> Result<TxResult, CoreError> {
        let affected = self.transactions.redo(&mut self.store, n)?;
        self.bump_revision();
        self.retouch(affected)
    }

    fn retouch(&mut self, affected: BTreeSet<LabelId>) -> Result<TxResult, CoreError> {
        let mut candidates: BTreeSet<ParameterId> = BTreeSet::new();
        for label in affected {
            if self.is_parameter_label(label) {
                candidates.insert(label.into());
            } else if self.is_node_label(label) {
                candidates.extend(self.parameter_labels(label.into()));
            }
        }

        // Touching after undo/redo must not land in any history.
        let recording = self.store.is_recording();
        self.store.set_recording(false);
        let result = self.touch_candidates(&candidates);
        self.store.set_recording(recording);
        result
    }

    fn touch_candidates(&mut self, candidates: &BTreeSet<ParameterId>) -> Result<TxResult, CoreError> {
        let mut result = TxResult::default();
        for &id in candidates {
            let alive = self.store.is_alive(id.into());
            if !alive {
                self.logbook.release(id);
            } else if Parameter::new(self, id).is_well_formed() {
                self.apply_modification(id, ModificationKind::Touched)?;
            }
            result.parameters.push(TxParameter { id, alive });
        }
        Ok(result)
    }
}
