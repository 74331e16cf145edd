use std::future::Future;

use bizflow_model::{
    ChangeEvent, CustomerPatch, NotePatch, RecordKind, RecordPatch, TaskPatch, TaskStage,
};

use super::{
    customer_input, expect_silence, next_event, note_input, owner, task_input, TestResult,
};
use crate::{ChangeFeed, RecordStorage, StorageError, SubscriptionId};

pub(super) async fn run_feed_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "feed",
        "insert_event_carries_post_image",
        insert_event_carries_post_image(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "update_event_carries_post_image",
        update_event_carries_post_image(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "delete_event_carries_key",
        delete_event_carries_key(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "events_arrive_in_emission_order",
        events_arrive_in_emission_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "other_owner_events_not_delivered",
        other_owner_events_not_delivered(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "other_kind_events_not_delivered",
        other_kind_events_not_delivered(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "note_feed_scoped_to_customer",
        note_feed_scoped_to_customer(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "unsubscribe_stops_delivery",
        unsubscribe_stops_delivery(factory).await,
    ));
    results.push(TestResult::from_result(
        "feed",
        "unsubscribe_unknown_handle_errors",
        unsubscribe_unknown_handle_errors(factory).await,
    ));

    results
}

async fn insert_event_carries_post_image<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let mut sub = s.subscribe(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    let rec = s.create(&o, customer_input("Acme", &["vip"])).await.map_err(|e| e.to_string())?;
    match next_event(&mut sub).await? {
        ChangeEvent::Insert(r) if r == rec => Ok(()),
        other => Err(format!("expected INSERT of {}, got {:?}", rec.id(), other)),
    }
}

async fn update_event_carries_post_image<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let rec = s.create(&o, customer_input("Acme", &[])).await.map_err(|e| e.to_string())?;
    let mut sub = s.subscribe(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    let patch = RecordPatch::Customer(CustomerPatch {
        name: Some("Acme Industries".to_string()),
        ..CustomerPatch::default()
    });
    let updated = s.update(rec.id(), patch).await.map_err(|e| e.to_string())?;
    match next_event(&mut sub).await? {
        ChangeEvent::Update(r) if r == updated => Ok(()),
        other => Err(format!("expected UPDATE post-image, got {:?}", other)),
    }
}

async fn delete_event_carries_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let rec = s.create(&o, task_input("Create repo")).await.map_err(|e| e.to_string())?;
    let mut sub = s.subscribe(&o, RecordKind::Task).await.map_err(|e| e.to_string())?;
    s.delete(rec.id()).await.map_err(|e| e.to_string())?;
    match next_event(&mut sub).await? {
        ChangeEvent::Delete(key) if &key.id == rec.id() && key.kind == RecordKind::Task => Ok(()),
        other => Err(format!("expected DELETE of {}, got {:?}", rec.id(), other)),
    }
}

/// Events for one record arrive in the order the mutations happened.
async fn events_arrive_in_emission_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let mut sub = s.subscribe(&o, RecordKind::Task).await.map_err(|e| e.to_string())?;
    let rec = s.create(&o, task_input("Homepage UI")).await.map_err(|e| e.to_string())?;
    for stage in [TaskStage::Doing, TaskStage::Done] {
        let patch = RecordPatch::Task(TaskPatch {
            stage: Some(stage),
            ..TaskPatch::default()
        });
        s.update(rec.id(), patch).await.map_err(|e| e.to_string())?;
    }
    s.delete(rec.id()).await.map_err(|e| e.to_string())?;

    let mut labels = Vec::new();
    for _ in 0..4 {
        labels.push(next_event(&mut sub).await?.label());
    }
    if labels != ["INSERT", "UPDATE", "UPDATE", "DELETE"] {
        return Err(format!("unexpected event order {:?}", labels));
    }
    Ok(())
}

async fn other_owner_events_not_delivered<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut sub = s
        .subscribe(&owner("owner-1"), RecordKind::Customer)
        .await
        .map_err(|e| e.to_string())?;
    s.create(&owner("owner-2"), customer_input("Theirs", &[]))
        .await
        .map_err(|e| e.to_string())?;
    expect_silence(&mut sub).await
}

async fn other_kind_events_not_delivered<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let mut sub = s.subscribe(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    s.create(&o, task_input("Collect requirements")).await.map_err(|e| e.to_string())?;
    expect_silence(&mut sub).await
}

async fn unsubscribe_stops_delivery<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let mut sub = s.subscribe(&o, RecordKind::Customer).await.map_err(|e| e.to_string())?;
    s.unsubscribe(sub.id).await.map_err(|e| e.to_string())?;
    s.create(&o, customer_input("Late", &[])).await.map_err(|e| e.to_string())?;
    expect_silence(&mut sub).await
}

async fn unsubscribe_unknown_handle_errors<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.unsubscribe(SubscriptionId(9_999)).await {
        Err(StorageError::UnknownSubscription(9_999)) => Ok(()),
        other => Err(format!("expected UnknownSubscription(9999), got {:?}", other)),
    }
}

async fn note_feed_scoped_to_customer<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStorage + ChangeFeed,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let o = owner("owner-1");
    let acme = s.create(&o, customer_input("Acme", &[])).await.map_err(|e| e.to_string())?;
    let other = s.create(&o, customer_input("Nimbus", &[])).await.map_err(|e| e.to_string())?;
    let mut sub = s.subscribe_notes(&o, acme.id()).await.map_err(|e| e.to_string())?;

    s.create(&o, note_input(other.id(), "not for acme")).await.map_err(|e| e.to_string())?;
    expect_silence(&mut sub).await?;

    let note = s.create(&o, note_input(acme.id(), "Called")).await.map_err(|e| e.to_string())?;
    match next_event(&mut sub).await? {
        ChangeEvent::Insert(r) if r == note => {}
        other => return Err(format!("expected INSERT of {}, got {:?}", note.id(), other)),
    }
    let patch = RecordPatch::Note(NotePatch {
        content: Some("Called twice".to_string()),
    });
    s.update(note.id(), patch).await.map_err(|e| e.to_string())?;
    match next_event(&mut sub).await? {
        ChangeEvent::Update(r) if r.id() == note.id() => {}
        other => return Err(format!("expected UPDATE of {}, got {:?}", note.id(), other)),
    }
    s.delete(note.id()).await.map_err(|e| e.to_string())?;
    match next_event(&mut sub).await? {
        ChangeEvent::Delete(key) if &key.id == note.id() && key.kind == RecordKind::Note => Ok(()),
        other => Err(format!("expected DELETE of {}, got {:?}", note.id(), other)),
    }
}
