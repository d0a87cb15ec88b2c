//! End-to-end workflow scenarios against a stub checkpoint service

mod common;

use common::CheckpointStub;
use lockstep::{CheckpointClient, Engine, Error, GroupRegistry, MemberView, Phase};
use std::sync::Arc;
use std::time::Duration;

fn engine_for(stub: &CheckpointStub) -> Engine {
    Engine::new(
        Arc::new(GroupRegistry::new()),
        CheckpointClient::new(&stub.addr),
    )
}

async fn phase_of(engine: &Engine, group: &str, user: &str) -> Option<Phase> {
    let handle = engine.registry().lookup(group).unwrap();
    let phase = handle.lock().await.phase_of(user);
    phase
}

#[tokio::test]
async fn test_three_member_round_rejected_at_two_thirds() {
    common::init_tracing();
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("trip", 3, None).await.unwrap();
    for user in ["alice", "bob", "carol"] {
        assert_eq!(engine.join("trip", user).await.unwrap(), MemberView::Submit);
    }

    assert_eq!(
        engine.submit("trip", "alice").await.unwrap(),
        MemberView::AwaitingSubmissions
    );
    assert_eq!(
        engine.submit("trip", "bob").await.unwrap(),
        MemberView::AwaitingSubmissions
    );
    // 2/3 submitted: the group is pending, not complete.
    assert_eq!(
        engine.poll("trip", "alice").await.unwrap(),
        MemberView::AwaitingSubmissions
    );

    // carol completes the set and gets to compose the artifact.
    assert_eq!(
        engine.submit("trip", "carol").await.unwrap(),
        MemberView::Compose
    );
    assert_eq!(engine.poll("trip", "alice").await.unwrap(), MemberView::Review);

    assert_eq!(
        engine.approve("trip", "alice").await.unwrap(),
        MemberView::AwaitingApprovals
    );
    assert_eq!(
        engine.approve("trip", "bob").await.unwrap(),
        MemberView::AwaitingApprovals
    );

    // carol rejects at 2/3 approvals: hard abort for everyone.
    assert_eq!(
        engine.reject("trip", "carol").await.unwrap(),
        MemberView::Submit
    );
    for user in ["alice", "bob", "carol"] {
        assert_eq!(phase_of(&engine, "trip", user).await, Some(Phase::Ready));
    }
    assert_eq!(engine.poll("trip", "bob").await.unwrap(), MemberView::Submit);
}

#[tokio::test]
async fn test_round_deadline_forces_restart() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine
        .create_group("duo", 2, Some(Duration::from_millis(250)))
        .await
        .unwrap();
    engine.join("duo", "alice").await.unwrap();
    engine.join("duo", "bob").await.unwrap();
    engine.submit("duo", "alice").await.unwrap();
    assert_eq!(engine.submit("duo", "bob").await.unwrap(), MemberView::Compose);

    assert_eq!(
        engine.approve("duo", "alice").await.unwrap(),
        MemberView::AwaitingApprovals
    );

    // bob never responds; past the deadline alice's next poll restarts
    // the whole group.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.poll("duo", "alice").await.unwrap(), MemberView::Submit);
    assert_eq!(phase_of(&engine, "duo", "alice").await, Some(Phase::Ready));
    assert_eq!(phase_of(&engine, "duo", "bob").await, Some(Phase::Ready));
}

#[tokio::test]
async fn test_full_group_rejects_new_member() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("duo", 2, None).await.unwrap();
    engine.join("duo", "alice").await.unwrap();
    engine.join("duo", "bob").await.unwrap();

    assert!(matches!(
        engine.join("duo", "carol").await,
        Err(Error::CapacityExceeded { capacity: 2, .. })
    ));

    // Re-entry by an existing member is not a join and stays welcome.
    assert_eq!(engine.join("duo", "bob").await.unwrap(), MemberView::Submit);
}

#[tokio::test]
async fn test_replace_submission_holds_the_rest() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("duo", 2, None).await.unwrap();
    engine.join("duo", "alice").await.unwrap();
    engine.join("duo", "bob").await.unwrap();
    engine.submit("duo", "alice").await.unwrap();
    engine.submit("duo", "bob").await.unwrap();

    // alice redoes her submission; bob holds at submitted.
    assert_eq!(
        engine.replace_submission("duo", "alice").await.unwrap(),
        MemberView::Submit
    );
    assert_eq!(phase_of(&engine, "duo", "bob").await, Some(Phase::Submitted));
    assert_eq!(
        engine.poll("duo", "bob").await.unwrap(),
        MemberView::AwaitingSubmissions
    );

    // Her new artifact completes the set again and reopens the round.
    assert_eq!(
        engine.submit("duo", "alice").await.unwrap(),
        MemberView::Compose
    );
    assert_eq!(engine.poll("duo", "bob").await.unwrap(), MemberView::Review);
}

#[tokio::test]
async fn test_stale_approval_follows_rollback() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("duo", 2, None).await.unwrap();
    engine.join("duo", "alice").await.unwrap();
    engine.join("duo", "bob").await.unwrap();
    engine.submit("duo", "alice").await.unwrap();
    engine.submit("duo", "bob").await.unwrap();

    engine.replace_submission("duo", "alice").await.unwrap();

    // bob's approval was racing the rollback; he converges back into
    // the waiting crowd instead of splitting the group.
    assert_eq!(
        engine.approve("duo", "bob").await.unwrap(),
        MemberView::AwaitingSubmissions
    );
    assert_eq!(phase_of(&engine, "duo", "bob").await, Some(Phase::Submitted));
    assert_eq!(phase_of(&engine, "duo", "alice").await, Some(Phase::Ready));

    // Views are stable from here: repolling changes nothing.
    assert_eq!(
        engine.poll("duo", "bob").await.unwrap(),
        MemberView::AwaitingSubmissions
    );
    assert_eq!(engine.poll("duo", "alice").await.unwrap(), MemberView::Submit);
}

#[tokio::test]
async fn test_full_lifecycle_completes_and_evicts() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("duo", 2, None).await.unwrap();
    engine.join("duo", "alice").await.unwrap();
    engine.join("duo", "bob").await.unwrap();
    engine.submit("duo", "alice").await.unwrap();
    engine.submit("duo", "bob").await.unwrap();

    assert_eq!(
        engine.approve("duo", "alice").await.unwrap(),
        MemberView::AwaitingApprovals
    );
    // bob's approval makes the round unanimous; he sees it and is done.
    assert_eq!(engine.approve("duo", "bob").await.unwrap(), MemberView::Done);
    assert_eq!(phase_of(&engine, "duo", "alice").await, Some(Phase::Approved));

    // alice observes the finished round on her next poll; as the last
    // member out, she tears the group down.
    assert_eq!(engine.poll("duo", "alice").await.unwrap(), MemberView::Done);
    assert!(engine.registry().is_empty());
    common::eventually(|| stub.stored().is_none()).await;

    assert!(matches!(
        engine.poll("duo", "alice").await,
        Err(Error::UnknownGroup(_))
    ));

    // The name is free for the next trip.
    engine.create_group("duo", 2, None).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_group_rejected() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("trip", 3, None).await.unwrap();
    assert!(matches!(
        engine.create_group("trip", 2, None).await,
        Err(Error::DuplicateGroup(_))
    ));
}

#[tokio::test]
async fn test_unknown_group_and_member() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    assert!(matches!(
        engine.poll("nowhere", "alice").await,
        Err(Error::UnknownGroup(_))
    ));

    engine.create_group("trip", 2, None).await.unwrap();
    engine.join("trip", "alice").await.unwrap();
    assert!(matches!(
        engine.submit("trip", "mallory").await,
        Err(Error::UnknownMember { .. })
    ));
    // The stranger's request left no trace.
    assert_eq!(phase_of(&engine, "trip", "mallory").await, None);
}

#[tokio::test]
async fn test_submit_retry_is_idempotent() {
    let stub = CheckpointStub::start().await;
    let engine = engine_for(&stub);

    engine.create_group("duo", 2, None).await.unwrap();
    engine.join("duo", "alice").await.unwrap();
    engine.join("duo", "bob").await.unwrap();

    assert_eq!(
        engine.submit("duo", "alice").await.unwrap(),
        MemberView::AwaitingSubmissions
    );
    // Duplicate request (double-click, retry after lost response).
    assert_eq!(
        engine.submit("duo", "alice").await.unwrap(),
        MemberView::AwaitingSubmissions
    );

    // A retry after the set completed doesn't recompose.
    assert_eq!(engine.submit("duo", "bob").await.unwrap(), MemberView::Compose);
    assert_eq!(engine.submit("duo", "bob").await.unwrap(), MemberView::Review);
}
