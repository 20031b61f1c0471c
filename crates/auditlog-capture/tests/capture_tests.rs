//! Capture engine tests against the fixture domain.

use auditlog_capture::{CaptureError, CaptureOutcome, ChangeCaptureEngine, EntityWrite, UnitOfWork};
use auditlog_common_config::{CaptureSettings, InMemoryConfigStore, PolicyKeys};
use auditlog_strategy::StrategyResolver;
use auditlog_test_utils::{
    assert_err, assert_ok, concept_name_state, concept_state, fixture_resolver, object, types,
};
use auditlog_types::{AuditAction, AuditActor, EntityState, PropertyValue};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use test_case::test_case;
use uuid::Uuid;

fn engine_with(policy: &str, list: &str, settings: CaptureSettings) -> ChangeCaptureEngine {
    let store = Arc::new(InMemoryConfigStore::with_values([
        ("auditlog.auditingStrategy", policy),
        ("auditlog.auditedTypes", list),
    ]));
    let strategy = StrategyResolver::new(store, fixture_resolver(), PolicyKeys::default());
    ChangeCaptureEngine::new(strategy, &settings)
}

fn concept_engine() -> ChangeCaptureEngine {
    engine_with("none_except", types::CONCEPT, CaptureSettings::default())
}

fn uow() -> UnitOfWork {
    UnitOfWork::new(AuditActor::system("tests"))
}

#[test]
fn test_create_stages_candidate_without_deltas() {
    let engine = concept_engine();
    let uow = uow();
    let concept = object(types::CONCEPT);

    let outcome = engine.before_commit(&uow, EntityWrite::created(concept.clone(), concept_state("CD4", &[], &[])));
    assert_eq!(outcome, Some(CaptureOutcome::Staged));

    let staged = uow.candidate(concept.uuid).unwrap();
    assert_eq!(staged.action, AuditAction::Created);
    assert!(staged.deltas.is_empty());
}

#[test]
fn test_unaudited_type_is_ignored() {
    let engine = concept_engine();
    let uow = uow();
    let location = object(types::LOCATION);

    let outcome = engine.before_commit(&uow, EntityWrite::created(location, EntityState::new()));
    assert_eq!(outcome, Some(CaptureOutcome::Ignored));
    assert_eq!(uow.staged_len(), 0);
}

#[test]
fn test_implicitly_audited_type_is_captured() {
    let engine = concept_engine();
    let uow = uow();
    let name = object(types::CONCEPT_NAME);

    let outcome = engine.before_commit(
        &uow,
        EntityWrite::created(name, concept_name_state("CD4 count", Uuid::new_v4())),
    );
    assert_eq!(outcome, Some(CaptureOutcome::Staged));
}

#[test]
fn test_update_without_difference_stages_nothing() {
    let engine = concept_engine();
    let uow = uow();
    let concept = object(types::CONCEPT);
    let state = concept_state("CD4", &[], &[]);

    let outcome = engine.before_commit(&uow, EntityWrite::updated(concept, state.clone(), state));
    assert_eq!(outcome, Some(CaptureOutcome::Unchanged));
    let staged = uow.drain();
    assert!(staged.candidates.is_empty());
    assert_eq!(staged.touched.len(), 1);
}

#[test]
fn test_update_of_ignored_field_only_stages_nothing() {
    let engine = concept_engine();
    let uow = uow();
    let before = concept_state("CD4", &[], &[]).with("dateChanged", "2020-01-01");
    let after = concept_state("CD4", &[], &[]).with("dateChanged", "2024-06-30");

    engine.before_commit(&uow, EntityWrite::updated(object(types::CONCEPT), before, after));
    assert_eq!(uow.staged_len(), 0);
}

#[test_case(PropertyValue::Null, PropertyValue::text(""), 0 ; "null to blank")]
#[test_case(PropertyValue::text(""), PropertyValue::Null, 0 ; "blank to null")]
#[test_case(PropertyValue::text("x"), PropertyValue::text("X"), 0 ; "case only")]
#[test_case(PropertyValue::text("x"), PropertyValue::text("y"), 1 ; "real change")]
fn test_string_noise(old: PropertyValue, new: PropertyValue, expected: usize) {
    let engine = concept_engine();
    let uow = uow();
    let concept = object(types::CONCEPT);
    let before = EntityState::new().with("shortName", old);
    let after = EntityState::new().with("shortName", new.clone());

    engine.before_commit(&uow, EntityWrite::updated(concept.clone(), before, after));
    assert_eq!(uow.staged_len(), expected);
    if expected == 1 {
        let candidate = uow.candidate(concept.uuid).unwrap();
        assert_eq!(candidate.deltas.len(), 1);
        assert_eq!(candidate.deltas["shortName"].new, new);
    }
}

#[test_case(PropertyValue::text("x"), PropertyValue::text("y"), PropertyValue::text("X") ; "back to original in another case")]
#[test_case(PropertyValue::Null, PropertyValue::text("a"), PropertyValue::text("") ; "null to text to blank")]
#[test_case(PropertyValue::text(" "), PropertyValue::text("a"), PropertyValue::Null ; "blank to text to null")]
fn test_repeated_updates_that_net_to_noise_stage_nothing(
    first: PropertyValue,
    second: PropertyValue,
    third: PropertyValue,
) {
    let engine = engine_with("all", "", CaptureSettings::default());
    let uow = uow();
    let location = object(types::LOCATION);
    let state = |value: &PropertyValue| EntityState::new().with("name", value.clone());

    engine.before_commit(&uow, EntityWrite::updated(location.clone(), state(&first), state(&second)));
    assert_eq!(uow.staged_len(), 1);
    engine.before_commit(&uow, EntityWrite::updated(location.clone(), state(&second), state(&third)));

    assert_eq!(uow.staged_len(), 0);
    let staged = uow.drain();
    assert!(staged.candidates.is_empty());
    assert_eq!(staged.touched.len(), 1);
}

#[test]
fn test_repeated_updates_keep_real_net_change() {
    let engine = engine_with("all", "", CaptureSettings::default());
    let uow = uow();
    let location = object(types::LOCATION);
    let state = |name: &str| EntityState::new().with("name", name);

    engine.before_commit(&uow, EntityWrite::updated(location.clone(), state("x"), state("y")));
    engine.before_commit(&uow, EntityWrite::updated(location.clone(), state("y"), state("Z")));

    let candidate = uow.candidate(location.uuid).unwrap();
    assert_eq!(candidate.deltas["name"].old, PropertyValue::text("x"));
    assert_eq!(candidate.deltas["name"].new, PropertyValue::text("Z"));
}

#[test]
fn test_all_differing_fields_are_recorded() {
    let engine = concept_engine();
    let uow = uow();
    let concept = object(types::CONCEPT);
    let before = concept_state("CD4", &[], &[]).with("changedBy", "admin");
    let after = concept_state("CD4 count", &[], &[])
        .with("retired", true)
        .with("changedBy", "clerk");

    engine.before_commit(&uow, EntityWrite::updated(concept.clone(), before, after));
    let candidate = uow.candidate(concept.uuid).unwrap();
    let fields: Vec<_> = candidate.deltas.keys().map(String::as_str).collect();
    assert_eq!(fields, vec!["retired", "shortName"]);
}

#[test]
fn test_update_without_previous_state_fails_but_is_swallowed() {
    let engine = concept_engine();
    let uow = uow();
    let write = EntityWrite {
        object: object(types::CONCEPT),
        action: AuditAction::Updated,
        before: None,
        after: Some(EntityState::new()),
    };

    let err = assert_err!(engine.try_capture(&uow, write.clone()));
    assert!(matches!(err, CaptureError::MissingState { .. }));
    assert_eq!(engine.before_commit(&uow, write), None);
    assert_eq!(uow.staged_len(), 0);
}

#[test]
fn test_drained_unit_of_work_rejects_capture() {
    let engine = concept_engine();
    let uow = uow();
    uow.drain();
    let write = EntityWrite::created(object(types::CONCEPT), EntityState::new());
    let err = assert_err!(engine.try_capture(&uow, write));
    assert!(matches!(err, CaptureError::UnitOfWorkClosed(_)));
}

#[test]
fn test_delete_records_last_state_when_enabled() {
    let settings = CaptureSettings {
        store_last_state_of_deleted_items: true,
        ..Default::default()
    };
    let engine = engine_with("none_except", types::CONCEPT, settings);
    let uow = uow();
    let concept = object(types::CONCEPT);

    assert_ok!(engine.try_capture(&uow, EntityWrite::deleted(concept.clone(), concept_state("CD4", &[], &[]))));
    let candidate = uow.candidate(concept.uuid).unwrap();
    assert_eq!(candidate.action, AuditAction::Deleted);
    assert_eq!(candidate.deltas["shortName"].old, PropertyValue::text("CD4"));
    assert!(candidate.deltas["shortName"].new.is_null());
}

#[test]
fn test_delete_without_last_state_has_no_deltas() {
    let engine = concept_engine();
    let uow = uow();
    let concept = object(types::CONCEPT);
    engine.before_commit(&uow, EntityWrite::deleted(concept.clone(), concept_state("CD4", &[], &[])));
    assert!(uow.candidate(concept.uuid).unwrap().deltas.is_empty());
}

#[test]
fn test_update_then_delete_coalesces_to_delete() {
    let engine = concept_engine();
    let uow = uow();
    let concept = object(types::CONCEPT);
    let before = concept_state("CD4", &[], &[]);
    let after = concept_state("CD4 count", &[], &[]);

    engine.before_commit(&uow, EntityWrite::updated(concept.clone(), before, after.clone()));
    engine.before_commit(&uow, EntityWrite::deleted(concept.clone(), after));

    let staged = uow.drain();
    assert_eq!(staged.candidates.len(), 1);
    assert_eq!(staged.candidates[0].action, AuditAction::Deleted);
}

#[test]
fn test_policy_change_applies_to_next_write() {
    let store = Arc::new(InMemoryConfigStore::with_values([("auditlog.auditingStrategy", "none")]));
    let strategy = StrategyResolver::new(store.clone(), fixture_resolver(), PolicyKeys::default());
    let engine = ChangeCaptureEngine::new(strategy, &CaptureSettings::default());
    let uow = uow();

    let write = EntityWrite::created(object(types::LOCATION), EntityState::new());
    assert_eq!(engine.before_commit(&uow, write), Some(CaptureOutcome::Ignored));

    use auditlog_common_config::ConfigStore;
    store.set("auditlog.auditingStrategy", "all").unwrap();
    let write = EntityWrite::created(object(types::LOCATION), EntityState::new());
    assert_eq!(engine.before_commit(&uow, write), Some(CaptureOutcome::Staged));
}

#[test]
fn test_concurrent_units_of_work_stay_independent() {
    let engine = concept_engine();
    let shared = object(types::CONCEPT);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = engine.clone();
            let shared = shared.clone();
            thread::spawn(move || {
                let uow = UnitOfWork::new(AuditActor::system(format!("worker-{i}")));
                let before = concept_state("CD4", &[], &[]);
                let after = concept_state(&format!("CD4 v{i}"), &[], &[]);
                engine.before_commit(&uow, EntityWrite::updated(shared, before, after));
                uow.drain()
            })
        })
        .collect();

    for handle in handles {
        let staged = handle.join().unwrap();
        assert_eq!(staged.candidates.len(), 1);
        assert_eq!(staged.candidates[0].action, AuditAction::Updated);
    }
}

/// A starting value and a final value that differ only by string noise.
fn noise_pair() -> impl Strategy<Value = (PropertyValue, PropertyValue)> {
    let blank = prop_oneof![
        Just(PropertyValue::Null),
        Just(PropertyValue::text("")),
        Just(PropertyValue::text("   ")),
    ];
    let recased = ("[a-z]{1,6}", prop::collection::vec(any::<bool>(), 6)).prop_map(|(text, upper)| {
        let variant: String = text
            .chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect();
        (PropertyValue::text(text), PropertyValue::text(variant))
    });
    prop_oneof![(blank.clone(), blank), recased]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_edits_ending_in_noise_stage_nothing(
        (start, end) in noise_pair(),
        middle in prop::collection::vec("[a-z]{0,4}", 0..5),
    ) {
        let engine = engine_with("all", "", CaptureSettings::default());
        let uow = uow();
        let location = object(types::LOCATION);

        let mut values = vec![start];
        values.extend(middle.into_iter().map(PropertyValue::text));
        values.push(end);
        for step in values.windows(2) {
            engine.before_commit(
                &uow,
                EntityWrite::updated(
                    location.clone(),
                    EntityState::new().with("name", step[0].clone()),
                    EntityState::new().with("name", step[1].clone()),
                ),
            );
        }

        prop_assert_eq!(uow.staged_len(), 0);
    }
}
