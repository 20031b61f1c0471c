//! Builds linked record trees from staged candidates.

use crate::serialize::serialize_deltas;
use auditlog_capture::{StagedChanges, TouchedObject};
use auditlog_strategy::StrategyResolver;
use auditlog_types::{
    AuditAction, AuditActor, AuditRecord, ChangeCandidate, EntityState, ObjectRef,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};
use uuid::Uuid;

type ObservedState<'a> = (&'a ObjectRef, Option<&'a EntityState>, Option<&'a EntityState>);

/// Metadata shared by every record of one unit of work.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub actor: AuditActor,
    pub timestamp: DateTime<Utc>,
    pub tool_version: String,
}

/// Turns the candidates of one unit of work into record trees.
#[derive(Clone)]
pub struct AuditRecordAssembler {
    strategy: StrategyResolver,
}

impl AuditRecordAssembler {
    pub fn new(strategy: StrategyResolver) -> Self {
        Self { strategy }
    }

    /// Assemble the root records of one unit of work.
    ///
    /// A candidate becomes the child of the nearest candidate that
    /// contains it, following containment properties of the observed
    /// snapshots. Owners that were written without changes are promoted to
    /// bare updates when one of their contained objects changed.
    pub fn assemble(&self, staged: StagedChanges, context: &RecordContext) -> Vec<AuditRecord> {
        let StagedChanges {
            mut candidates,
            touched,
        } = staged;
        if candidates.is_empty() {
            return Vec::new();
        }

        let owners = {
            let states: Vec<ObservedState<'_>> = candidates
                .iter()
                .map(|c| (&c.object, c.before.as_ref(), c.after.as_ref()))
                .chain(
                    touched
                        .iter()
                        .map(|t| (&t.object, t.before.as_ref(), t.after.as_ref())),
                )
                .collect();
            self.owner_index(&states)
        };

        let mut staged: HashSet<Uuid> = candidates.iter().map(|c| c.object.uuid).collect();
        let promoted = self.promote_owners(&candidates, &touched, &owners, &mut staged);
        candidates.extend(promoted);

        let parents: HashMap<Uuid, Uuid> = candidates
            .iter()
            .filter_map(|c| {
                nearest_staged_ancestor(c.object.uuid, &owners, &staged)
                    .map(|parent| (c.object.uuid, parent))
            })
            .collect();

        let roots = build_trees(candidates, &parents, context);
        debug!(
            roots = roots.len(),
            records = roots.iter().map(AuditRecord::tree_size).sum::<usize>(),
            "audit records assembled"
        );
        roots
    }

    /// Map each contained object to the object holding it.
    fn owner_index(&self, states: &[ObservedState<'_>]) -> HashMap<Uuid, Uuid> {
        let types = self.strategy.type_graph();
        let mut owners = HashMap::new();
        for (object, before, after) in states {
            let properties = types.containment_properties(&object.type_id);
            // after first, so current membership wins over removed members
            for state in [after, before].into_iter().flatten() {
                for property in &properties {
                    for member in state.get(property).entity_refs() {
                        if member.uuid != object.uuid {
                            owners.entry(member.uuid).or_insert(object.uuid);
                        }
                    }
                }
            }
        }
        owners
    }

    fn promote_owners(
        &self,
        candidates: &[ChangeCandidate],
        touched: &[TouchedObject],
        owners: &HashMap<Uuid, Uuid>,
        staged: &mut HashSet<Uuid>,
    ) -> Vec<ChangeCandidate> {
        let touched: HashMap<Uuid, &TouchedObject> =
            touched.iter().map(|t| (t.object.uuid, t)).collect();
        let mut pending: Vec<Uuid> = candidates.iter().map(|c| c.object.uuid).collect();
        let mut promoted = Vec::new();

        while let Some(uuid) = pending.pop() {
            let Some(owner) = owners.get(&uuid) else {
                continue;
            };
            if staged.contains(owner) {
                continue;
            }
            let Some(object) = touched.get(owner) else {
                continue;
            };
            if !self.strategy.is_audited_or_implicit(&object.object.type_id) {
                continue;
            }

            trace!(owner = %owner, child = %uuid, "promoting unchanged owner");
            staged.insert(*owner);
            pending.push(*owner);
            promoted.push(
                ChangeCandidate::new(object.object.clone(), AuditAction::Updated)
                    .with_states(object.before.clone(), object.after.clone()),
            );
        }
        promoted
    }
}

fn nearest_staged_ancestor(
    uuid: Uuid,
    owners: &HashMap<Uuid, Uuid>,
    staged: &HashSet<Uuid>,
) -> Option<Uuid> {
    let mut visited = HashSet::from([uuid]);
    let mut current = uuid;
    while let Some(&owner) = owners.get(&current) {
        if !visited.insert(owner) {
            return None;
        }
        if staged.contains(&owner) {
            return Some(owner);
        }
        current = owner;
    }
    None
}

fn build_trees(
    candidates: Vec<ChangeCandidate>,
    parents: &HashMap<Uuid, Uuid>,
    context: &RecordContext,
) -> Vec<AuditRecord> {
    let order: Vec<Uuid> = candidates.iter().map(|c| c.object.uuid).collect();
    let mut records: HashMap<Uuid, AuditRecord> = candidates
        .into_iter()
        .map(|c| (c.object.uuid, to_record(c, context)))
        .collect();

    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for uuid in &order {
        if let Some(parent) = parents.get(uuid) {
            children.entry(*parent).or_default().push(*uuid);
        }
    }

    let mut attached = HashSet::new();
    let mut roots = Vec::new();
    // Parentless candidates first, then whatever a containment cycle left over.
    let starts = order
        .iter()
        .filter(|u| !parents.contains_key(*u))
        .chain(order.iter());
    for uuid in starts.copied().collect::<Vec<_>>() {
        if attached.contains(&uuid) {
            continue;
        }
        if let Some(mut root) = attach(uuid, &mut records, &children, &mut attached) {
            root.parent = None;
            roots.push(root);
        }
    }
    roots
}

fn attach(
    uuid: Uuid,
    records: &mut HashMap<Uuid, AuditRecord>,
    children: &HashMap<Uuid, Vec<Uuid>>,
    attached: &mut HashSet<Uuid>,
) -> Option<AuditRecord> {
    if !attached.insert(uuid) {
        return None;
    }
    let mut record = records.remove(&uuid)?;
    for child in children.get(&uuid).into_iter().flatten() {
        if let Some(child) = attach(*child, records, children, attached) {
            record.add_child(child);
        }
    }
    Some(record)
}

fn to_record(candidate: ChangeCandidate, context: &RecordContext) -> AuditRecord {
    AuditRecord::builder(candidate.object.type_id, candidate.object.uuid, candidate.action)
        .actor(context.actor.clone())
        .timestamp(context.timestamp)
        .tool_version(context.tool_version.clone())
        .changes(serialize_deltas(&candidate.deltas))
        .build()
}
