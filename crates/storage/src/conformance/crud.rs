use std::future::Future;

use bizflow_model::{
    CustomerPatch, LeadPatch, LeadStage, Record, RecordId, RecordKind, RecordPatch,
};

use super::{customer_input, lead_input, owner, task_input, TestResult};
use crate::{ChangeFeed, RecordStorage, StorageError};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "crud",
        "create_assigns_id_and_owner",
        create_assigns_id_and_owner(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "create_ids_are_unique",
        create_ids_are_unique(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "create_lead_defaults_to_initial_stage",
        create_lead_defaults_to_initial_stage(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "created_record_is_listed",
        created_record_is_listed(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "update_patches_only_given_fields",
        update_patches_only_given_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "update_preserves_identity",
        update_preserves_identity(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "update_unknown_id_not_found",
        update_unknown_id_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "update_wrong_kind_rejected",
        update_wrong_kind_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_removes_record",
        delete_removes_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_unknown_id_is_ok",
        delete_unknown_id_is_ok(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_many_removes_all_given",
        delete_many_removes_all_given(factory).await,
    ));

    results
}

// ── Create ───────────────────────────────────────────────────────────────────

/// A created record carries a non-empty id and the creating owner.
async fn create_assigns_id_and_owner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create(&owner("owner-1"), customer_input("Acme Industries", &["vip"]))
        .await
        .map_err(|e| e.to_string())?;
    if rec.id().as_str().is_empty() {
        return Err("created record has an empty id".to_string());
    }
    if rec.owner_id() != &owner("owner-1") {
        return Err(format!("expected owner-1, got {}", rec.owner_id()));
    }
    if rec.kind() != RecordKind::Customer {
        return Err(format!("expected customer, got {}", rec.kind()));
    }
    Ok(())
}

/// Two creates never yield the same id, even across kinds.
async fn create_ids_are_unique<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let a = s.create(&o, customer_input("A", &[])).await.map_err(|e| e.to_string())?;
    let b = s.create(&o, customer_input("B", &[])).await.map_err(|e| e.to_string())?;
    let c = s.create(&o, task_input("C")).await.map_err(|e| e.to_string())?;
    if a.id() == b.id() || a.id() == c.id() || b.id() == c.id() {
        return Err(format!(
            "duplicate ids: {}, {}, {}",
            a.id(),
            b.id(),
            c.id()
        ));
    }
    Ok(())
}

/// A lead created without a stage starts in `new`.
async fn create_lead_defaults_to_initial_stage<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create(&owner("owner-1"), lead_input("Globex", 500))
        .await
        .map_err(|e| e.to_string())?;
    match rec {
        Record::Lead(l) if l.stage == LeadStage::New => Ok(()),
        Record::Lead(l) => Err(format!("expected stage new, got {}", l.stage)),
        other => Err(format!("expected a lead, got {}", other.kind())),
    }
}

/// `list` returns what `create` stored.
async fn created_record_is_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let rec = s.create(&o, customer_input("Nimbus Labs", &[])).await.map_err(|e| e.to_string())?;
    let rows = s.list(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    if rows != vec![rec] {
        return Err(format!("expected exactly the created record, got {} rows", rows.len()));
    }
    Ok(())
}

// ── Update ───────────────────────────────────────────────────────────────────

/// Fields absent from the patch keep their values.
async fn update_patches_only_given_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create(&owner("owner-1"), customer_input("BlueBay Retail", &["Retail"]))
        .await
        .map_err(|e| e.to_string())?;
    let patch = RecordPatch::Customer(CustomerPatch {
        email: Some("contact@bluebay.in".to_string()),
        ..CustomerPatch::default()
    });
    let updated = s.update(rec.id(), patch).await.map_err(|e| e.to_string())?;
    match updated {
        Record::Customer(c) => {
            if c.email != "contact@bluebay.in" {
                return Err(format!("email not patched: {}", c.email));
            }
            if c.name != "BlueBay Retail" || c.tags != vec!["Retail".to_string()] {
                return Err("unpatched fields changed".to_string());
            }
            Ok(())
        }
        other => Err(format!("expected a customer, got {}", other.kind())),
    }
}

/// Update never changes id, owner or creation time.
async fn update_preserves_identity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create(&owner("owner-1"), lead_input("Initech", 1200))
        .await
        .map_err(|e| e.to_string())?;
    let patch = RecordPatch::Lead(LeadPatch {
        stage: Some(LeadStage::Won),
        ..LeadPatch::default()
    });
    let updated = s.update(rec.id(), patch).await.map_err(|e| e.to_string())?;
    if updated.meta() != rec.meta() {
        return Err(format!(
            "identity changed: {:?} -> {:?}",
            rec.meta(),
            updated.meta()
        ));
    }
    Ok(())
}

async fn update_unknown_id_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s
        .update(
            &RecordId::from("missing-1"),
            RecordPatch::Customer(CustomerPatch::default()),
        )
        .await;
    match result {
        Err(StorageError::NotFound { id }) if id == "missing-1" => Ok(()),
        other => Err(format!("expected NotFound(missing-1), got {:?}", other)),
    }
}

async fn update_wrong_kind_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .create(&owner("owner-1"), task_input("Homepage UI"))
        .await
        .map_err(|e| e.to_string())?;
    let result = s
        .update(rec.id(), RecordPatch::Lead(LeadPatch::default()))
        .await;
    match result {
        Err(StorageError::KindMismatch { record, patch, .. })
            if record == RecordKind::Task && patch == RecordKind::Lead =>
        {
            Ok(())
        }
        other => Err(format!("expected KindMismatch, got {:?}", other)),
    }
}

// ── Delete ───────────────────────────────────────────────────────────────────

async fn delete_removes_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let keep = s.create(&o, customer_input("Keep", &[])).await.map_err(|e| e.to_string())?;
    let gone = s.create(&o, customer_input("Gone", &[])).await.map_err(|e| e.to_string())?;
    s.delete(gone.id()).await.map_err(|e| e.to_string())?;
    let rows = s.list(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    let ids: Vec<&RecordId> = rows.iter().map(|r| r.id()).collect();
    if ids != vec![keep.id()] {
        return Err(format!("expected only {}, got {:?}", keep.id(), ids));
    }
    Ok(())
}

async fn delete_unknown_id_is_ok<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.delete(&RecordId::from("missing-1"))
        .await
        .map_err(|e| format!("expected Ok, got {}", e))
}

async fn delete_many_removes_all_given<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let rec = s.create(&o, lead_input(name, 10)).await.map_err(|e| e.to_string())?;
        ids.push(rec.id().clone());
    }
    let survivor = s.create(&o, lead_input("D", 10)).await.map_err(|e| e.to_string())?;
    s.delete_many(&ids).await.map_err(|e| e.to_string())?;
    let rows = s.list(&o, RecordKind::Lead).await.map_err(|e| e.to_string())?;
    if rows.len() != 1 || rows[0].id() != survivor.id() {
        return Err(format!("expected only {}, got {} rows", survivor.id(), rows.len()));
    }
    Ok(())
}
