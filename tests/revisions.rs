use serde_json::json;

use modelstore::{
    ChangeOp, ChangeSetFile, ElementRange, ModelKind, Repository, RevisionId, RevisionStart,
    StoreConfig, StoreError,
};

fn range2d(lx: f64, ly: f64, hx: f64, hy: f64) -> ElementRange {
    ElementRange::from_coords(lx, ly, 0.0, hx, hy, 0.0)
}

fn briefcase() -> Repository {
    Repository::open(StoreConfig::default())
}

#[test]
fn revision_brackets_a_span_of_boundaries() {
    let repo = briefcase();
    let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();

    // Boundary committed before the draft opens: captured as pending.
    let a = repo
        .insert_element(model, "Test:Foo", json!({"v": 1}), None)
        .unwrap();
    repo.save_changes().unwrap();

    assert_eq!(
        repo.start_create_revision().unwrap(),
        RevisionStart::Started
    );

    // Boundary committed during the span: captured by the draft.
    let txn = repo.start_cache_transaction().unwrap();
    repo.update_element(a, json!({"v": 2}), None).unwrap();
    txn.commit().unwrap();

    let revision = repo.finish_create_revision().unwrap();
    assert_eq!(revision.id(), RevisionId::new(1));
    assert_eq!(revision.parent(), None);
    assert_eq!(revision.records().len(), 2);
    assert_eq!(revision.records()[0].op, ChangeOp::Insert);
    assert_eq!(revision.records()[1].op, ChangeOp::Update);
    assert_eq!(revision.records()[1].class, "Test:Foo");

    // Update records carry both sides of the delta.
    let before = revision.records()[1].before.as_ref().unwrap();
    let after = revision.records()[1].after.as_ref().unwrap();
    assert_eq!(before.properties().unwrap(), json!({"v": 1}));
    assert_eq!(after.properties().unwrap(), json!({"v": 2}));
}

#[test]
fn parent_links_chain_successive_revisions() {
    let repo = briefcase();
    let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();

    repo.insert_element(model, "Test:Foo", json!({}), None)
        .unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    let first = repo.finish_create_revision().unwrap();

    repo.insert_element(model, "Test:Foo", json!({}), None)
        .unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    let second = repo.finish_create_revision().unwrap();

    assert_eq!(first.parent(), None);
    assert_eq!(second.parent(), Some(first.id()));

    let log = repo.revisions().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].id(), first.id());
    assert_eq!(log[1].id(), second.id());
}

#[test]
fn start_twice_is_invalid_state_not_a_crash() {
    let repo = briefcase();
    repo.start_create_revision().unwrap();
    assert!(matches!(
        repo.start_create_revision(),
        Err(StoreError::InvalidState(_))
    ));
    // Housekeeping code paths recover by abandoning.
    repo.abandon_create_revision().unwrap();
    assert_eq!(
        repo.start_create_revision().unwrap(),
        RevisionStart::Started
    );
    repo.abandon_create_revision().unwrap();
}

#[test]
fn finish_without_start_is_invalid_state() {
    let repo = briefcase();
    assert!(matches!(
        repo.finish_create_revision(),
        Err(StoreError::InvalidState(_))
    ));
}

#[test]
fn master_copy_never_creates_revisions() {
    let repo = Repository::open(StoreConfig::master());
    let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();
    repo.insert_element(model, "Test:Foo", json!({}), None)
        .unwrap();
    repo.save_changes().unwrap();

    // No-op for all call sequences.
    assert_eq!(
        repo.start_create_revision().unwrap(),
        RevisionStart::MasterCopy
    );
    assert_eq!(
        repo.start_create_revision().unwrap(),
        RevisionStart::MasterCopy
    );
    assert!(repo.finish_create_revision().is_err());
    assert!(repo.revisions().unwrap().is_empty());
    assert!(!repo.has_pending_changes().unwrap());
}

#[test]
fn abandoned_draft_leaves_no_trace() {
    let repo = briefcase();
    let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();

    repo.insert_element(model, "Test:Foo", json!({"doomed": true}), None)
        .unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    repo.abandon_create_revision().unwrap();
    assert!(repo.revisions().unwrap().is_empty());

    // The next cycle sees only post-abandon boundaries.
    repo.insert_element(model, "Test:Foo", json!({"kept": true}), None)
        .unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    let revision = repo.finish_create_revision().unwrap();
    assert_eq!(revision.parent(), None);
    assert_eq!(revision.records().len(), 1);
    let image = revision.records()[0].after.as_ref().unwrap();
    assert_eq!(image.properties().unwrap(), json!({"kept": true}));
}

#[test]
fn finished_revision_is_immutable_while_work_continues() {
    let repo = briefcase();
    let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();

    let a = repo
        .insert_element(model, "Test:Foo", json!({"v": 1}), None)
        .unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    let revision = repo.finish_create_revision().unwrap();
    let snapshot: Vec<_> = revision.records().to_vec();

    // Keep mutating the database and producing more revisions.
    repo.update_element(a, json!({"v": 2}), None).unwrap();
    repo.delete_element(a).unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    repo.finish_create_revision().unwrap();

    // The first revision's content is exactly what finish returned.
    assert_eq!(revision.records(), snapshot.as_slice());
    assert_eq!(revision.records().len(), 1);
    assert_eq!(
        revision.records()[0]
            .after
            .as_ref()
            .unwrap()
            .properties()
            .unwrap(),
        json!({"v": 1})
    );
}

#[test]
fn finished_revision_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::open(StoreConfig::default().with_revision_dir(dir.path()));
    let model = repo.create_model("Site", ModelKind::Spatial).unwrap();

    repo.insert_element(
        model,
        "Test:Foo",
        json!({"name": "column"}),
        Some(ElementRange::from_coords(0.0, 0.0, 0.0, 1.0, 1.0, 3.0)),
    )
    .unwrap();
    repo.save_changes().unwrap();
    repo.start_create_revision().unwrap();
    let revision = repo.finish_create_revision().unwrap();

    let path = revision.file().expect("companion file written");
    let decoded = ChangeSetFile::read_from(path).unwrap();
    assert_eq!(decoded.revision, revision.id());
    assert_eq!(decoded.parent, None);
    assert_eq!(decoded.records.len(), 1);
    assert_eq!(decoded.records[0].class, "Test:Foo");
    assert_eq!(
        decoded.records[0].after.as_ref().unwrap().range,
        Some(ElementRange::from_coords(0.0, 0.0, 0.0, 1.0, 1.0, 3.0))
    );
}

#[test]
fn rolled_back_transactions_contribute_nothing() {
    let repo = briefcase();
    let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();

    let txn = repo.start_cache_transaction().unwrap();
    repo.insert_element(
        model,
        "Test:Foo",
        json!({}),
        Some(range2d(0.0, 0.0, 1.0, 1.0)),
    )
    .unwrap();
    txn.abandon().unwrap();

    assert!(!repo.has_pending_changes().unwrap());
    repo.start_create_revision().unwrap();
    let revision = repo.finish_create_revision().unwrap();
    assert!(revision.records().is_empty());
}
