//! The strategy resolver.

use crate::snapshot::{AuditedTypeSet, PolicySnapshot, Verdict};
use crate::{Result, StrategyError};
use auditlog_common_config::{join_csv, parse_csv, ConfigStore, PolicyKeys};
use auditlog_common_log::spans::{policy_rebuild_span, Timer};
use auditlog_metadata::TypeGraphResolver;
use auditlog_types::{AuditPolicy, PolicyKind, TypeId};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Decides which types are audited.
///
/// Cheap to clone; clones share the cached snapshot.
#[derive(Clone)]
pub struct StrategyResolver {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ConfigStore>,
    types: Arc<TypeGraphResolver>,
    keys: PolicyKeys,
    snapshot: RwLock<Option<Arc<PolicySnapshot>>>,
    generation: AtomicU64,
    rebuild_lock: Mutex<()>,
    write_lock: Mutex<()>,
}

impl StrategyResolver {
    /// Create a resolver and subscribe it to configuration changes.
    pub fn new(store: Arc<dyn ConfigStore>, types: Arc<TypeGraphResolver>, keys: PolicyKeys) -> Self {
        let inner = Arc::new(Inner {
            store,
            types,
            keys,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
            rebuild_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        inner.store.subscribe(Arc::new(move |key: &str| {
            if let Some(inner) = weak.upgrade() {
                if inner.keys.contains(key) {
                    inner.invalidate();
                }
            }
        }));

        Self { inner }
    }

    /// The type graph this resolver consults.
    pub fn type_graph(&self) -> &Arc<TypeGraphResolver> {
        &self.inner.types
    }

    /// Whether the policy explicitly audits `type_id`.
    pub fn is_audited(&self, type_id: &TypeId) -> bool {
        self.verdict(type_id) == Verdict::Explicit
    }

    /// Whether `type_id` is audited only through containment.
    pub fn is_implicitly_audited(&self, type_id: &TypeId) -> bool {
        self.verdict(type_id) == Verdict::Implicit
    }

    /// Whether records should be written for `type_id`.
    pub fn is_audited_or_implicit(&self, type_id: &TypeId) -> bool {
        self.verdict(type_id).is_audited()
    }

    /// Coverage of a type under the current snapshot.
    pub fn verdict(&self, type_id: &TypeId) -> Verdict {
        self.snapshot().verdict(type_id)
    }

    /// The active policy.
    pub fn get_policy(&self) -> AuditPolicy {
        self.snapshot().policy().clone()
    }

    /// The inclusion or exclusion list of the active policy.
    pub fn exceptions(&self) -> Result<BTreeSet<TypeId>> {
        let snapshot = self.snapshot();
        snapshot
            .policy()
            .exceptions()
            .cloned()
            .ok_or(StrategyError::PolicyMismatch {
                policy: snapshot.policy().kind(),
            })
    }

    /// Types audited only through containment.
    pub fn implicitly_audited_types(&self) -> BTreeSet<TypeId> {
        self.snapshot().implicit().clone()
    }

    /// Explicitly and implicitly audited mapped types.
    pub fn audited_types(&self) -> AuditedTypeSet {
        self.snapshot().audited_types().clone()
    }

    /// Replace the active policy and its type list.
    ///
    /// The list belonging to the other policy family is cleared.
    pub fn update_policy(&self, policy: AuditPolicy) -> Result<()> {
        let _write = self.inner.write_lock.lock();
        let kind = policy.kind();
        let list = policy
            .exceptions()
            .map(|types| join_csv(types.iter()))
            .unwrap_or_default();
        let (inclusions, exclusions) = match kind {
            PolicyKind::NoneExcept => (list, String::new()),
            PolicyKind::AllExcept => (String::new(), list),
            PolicyKind::All | PolicyKind::None => (String::new(), String::new()),
        };
        let policy_name = kind.to_string();
        let keys = &self.inner.keys;
        self.write(&[
            (keys.policy.as_str(), policy_name.as_str()),
            (keys.inclusions.as_str(), inclusions.as_str()),
            (keys.exclusions.as_str(), exclusions.as_str()),
        ])?;
        info!(policy = %kind, "audit policy updated");
        Ok(())
    }

    /// Start or stop auditing one type and its concrete subtypes.
    pub fn mark_type(&self, type_id: &TypeId, audited: bool) -> Result<()> {
        self.mark_types(std::slice::from_ref(type_id), audited)
    }

    /// Start or stop auditing several types and their concrete subtypes,
    /// as one configuration update.
    pub fn mark_types(&self, type_ids: &[TypeId], audited: bool) -> Result<()> {
        let _write = self.inner.write_lock.lock();
        let snapshot = self.snapshot();
        let (key, mut list) = match snapshot.policy() {
            AuditPolicy::NoneExcept(included) => (&self.inner.keys.inclusions, included.clone()),
            AuditPolicy::AllExcept(excluded) => (&self.inner.keys.exclusions, excluded.clone()),
            other => {
                return Err(StrategyError::PolicyMismatch {
                    policy: other.kind(),
                })
            }
        };

        let affected = self.with_subtypes(type_ids);
        // Inclusion lists grow when auditing starts, exclusion lists shrink.
        let grow = matches!(snapshot.policy(), AuditPolicy::NoneExcept(_)) == audited;
        for type_id in affected {
            if grow {
                list.insert(type_id);
            } else {
                list.remove(&type_id);
            }
        }

        let value = join_csv(list.iter());
        self.write(&[(key.as_str(), value.as_str())])?;
        debug!(types = type_ids.len(), audited, "audit marks updated");
        Ok(())
    }

    /// Drop the cached snapshot; the next read rebuilds it.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Recompile the type graph and drop the cached snapshot.
    pub fn refresh_metadata(&self) {
        self.inner.types.rebuild();
        self.inner.invalidate();
    }

    /// The current snapshot, building it if needed.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.inner.snapshot()
    }

    fn with_subtypes(&self, type_ids: &[TypeId]) -> BTreeSet<TypeId> {
        let mut out = BTreeSet::new();
        for type_id in type_ids {
            out.insert(type_id.clone());
            match self.inner.types.concrete_subtypes(type_id) {
                Ok(subtypes) => out.extend(subtypes),
                Err(e) => warn!(error = %e, "marking a type unknown to the metadata catalog"),
            }
        }
        out
    }

    fn write(&self, entries: &[(&str, &str)]) -> Result<()> {
        let result = self.inner.store.set_all(entries);
        self.inner.invalidate();
        result.map_err(|e| {
            error!(error = %e, "audit configuration write failed; cached policy dropped");
            StrategyError::ConfigWriteFailure(e)
        })
    }
}

impl Inner {
    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.snapshot.write() = None;
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Arc::clone(snapshot);
        }

        let _rebuild = self.rebuild_lock.lock();
        // Another thread may have published while we waited.
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Arc::clone(snapshot);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let built = Arc::new(self.build(generation));

        let mut slot = self.snapshot.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(Arc::clone(&built));
        }
        built
    }

    fn build(&self, generation: u64) -> PolicySnapshot {
        let span = policy_rebuild_span(generation);
        let _entered = span.enter();
        let timer = Timer::start("policy_rebuild");

        let policy = {
            let _flush = self.store.manual_flush();
            self.read_policy()
        };
        let types = self.audited_type_set(&policy);

        debug!(
            policy = %policy.kind(),
            explicit = types.explicit.len(),
            implicit = types.implicit.len(),
            "audit policy snapshot built"
        );
        timer.finish();
        PolicySnapshot::new(generation, policy, types)
    }

    fn read_policy(&self) -> AuditPolicy {
        let raw = self.store.get(&self.keys.policy).unwrap_or_default();
        let kind = match PolicyKind::parse(&raw) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(error = %e, "falling back to the none audit policy");
                PolicyKind::None
            }
        };
        let types = match kind {
            PolicyKind::NoneExcept => self.read_type_list(&self.keys.inclusions),
            PolicyKind::AllExcept => self.read_type_list(&self.keys.exclusions),
            PolicyKind::All | PolicyKind::None => BTreeSet::new(),
        };
        AuditPolicy::from_kind(kind, types)
    }

    /// Parse a configured type list, adding concrete subtypes of each name.
    fn read_type_list(&self, key: &str) -> BTreeSet<TypeId> {
        let raw = self.store.get(key).unwrap_or_default();
        let mut types = BTreeSet::new();
        for name in parse_csv(&raw) {
            let type_id = TypeId::new(name);
            match self.types.concrete_subtypes(&type_id) {
                Ok(subtypes) => {
                    types.insert(type_id);
                    types.extend(subtypes);
                }
                Err(e) => warn!(key = key, error = %e, "skipping configured type"),
            }
        }
        types
    }

    fn audited_type_set(&self, policy: &AuditPolicy) -> AuditedTypeSet {
        let graph = self.types.graph();
        let explicit: BTreeSet<TypeId> = graph
            .types()
            .filter(|t| policy.audits(t))
            .cloned()
            .collect();

        let reachable = match policy {
            AuditPolicy::NoneExcept(included) => self
                .types
                .contained_types_from_all(included.iter().filter(|t| !t.is_reserved())),
            AuditPolicy::AllExcept(excluded) if !excluded.is_empty() => {
                self.types.contained_types_from_all(
                    graph
                        .types()
                        .filter(|t| !excluded.contains(*t) && !t.is_reserved()),
                )
            }
            _ => BTreeSet::new(),
        };

        let implicit = reachable
            .into_iter()
            .filter(|t| !t.is_reserved() && !policy.audits(t))
            .collect();

        AuditedTypeSet { explicit, implicit }
    }
}
