use std::future::Future;

use bizflow_model::RecordKind;

use super::{customer_input, lead_input, owner, TestResult};
use crate::{ChangeFeed, RecordStorage};

pub(super) async fn run_scope_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "scope",
        "list_empty_for_unknown_owner",
        list_empty_for_unknown_owner(factory).await,
    ));
    results.push(TestResult::from_result(
        "scope",
        "list_excludes_other_owners",
        list_excludes_other_owners(factory).await,
    ));
    results.push(TestResult::from_result(
        "scope",
        "list_excludes_other_kinds",
        list_excludes_other_kinds(factory).await,
    ));
    results.push(TestResult::from_result(
        "scope",
        "list_is_newest_first",
        list_is_newest_first(factory).await,
    ));

    results
}

async fn list_empty_for_unknown_owner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rows = s
        .list(&owner("nobody"), RecordKind::Customer)
        .await
        .map_err(|e| e.to_string())?;
    if !rows.is_empty() {
        return Err(format!("expected no rows, got {}", rows.len()));
    }
    Ok(())
}

async fn list_excludes_other_owners<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(&owner("owner-1"), customer_input("Mine", &[]))
        .await
        .map_err(|e| e.to_string())?;
    s.create(&owner("owner-2"), customer_input("Theirs", &[]))
        .await
        .map_err(|e| e.to_string())?;
    let rows = s
        .list(&owner("owner-1"), RecordKind::Customer)
        .await
        .map_err(|e| e.to_string())?;
    if rows.len() != 1 || rows[0].owner_id() != &owner("owner-1") {
        return Err(format!("expected one owner-1 row, got {} rows", rows.len()));
    }
    Ok(())
}

async fn list_excludes_other_kinds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    s.create(&o, customer_input("Acme", &[])).await.map_err(|e| e.to_string())?;
    s.create(&o, lead_input("Acme renewal", 900)).await.map_err(|e| e.to_string())?;
    let rows = s.list(&o, RecordKind::Lead).await.map_err(|e| e.to_string())?;
    if rows.len() != 1 || rows[0].kind() != RecordKind::Lead {
        return Err(format!("expected one lead, got {} rows", rows.len()));
    }
    Ok(())
}

/// Listing order is newest first; records created in sequence come back
/// in reverse.
async fn list_is_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let mut created = Vec::new();
    for name in ["first", "second", "third"] {
        let rec = s.create(&o, customer_input(name, &[])).await.map_err(|e| e.to_string())?;
        created.push(rec.id().clone());
    }
    let rows = s.list(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    let listed: Vec<_> = rows.iter().map(|r| r.id().clone()).collect();
    created.reverse();
    if listed != created {
        return Err(format!("expected {:?}, got {:?}", created, listed));
    }
    Ok(())
}
