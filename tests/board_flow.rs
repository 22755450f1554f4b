use std::sync::Arc;

use anyhow::{Context, Result};
use board::{
    Board, BoardNotice, DealGateway, DragOutcome, DropTarget, GatewayError, SyncPolicy, SyncState,
};
use board_client::{ClientConfig, GraphqlGateway};
use board_server::graphql::{OpportunityStore, demo_opportunities};
use board_tests::TestApi;
use entity::{DealId, Stage, StageUpdate};
use platform_api::ApiError;

async fn board_for(api: &TestApi, policy: SyncPolicy) -> Result<Board<GraphqlGateway>> {
    let gateway = GraphqlGateway::new(ClientConfig::new(api.endpoint()))?;
    let mut board = Board::new(Arc::new(gateway), policy);
    board.refresh().await.context("initial load")?;
    Ok(board)
}

fn stage_in_store(rows: &[entity::OpportunityRecord], id: &str) -> Option<Stage> {
    rows.iter().find(|r| r.id == id).map(|r| r.stage)
}

#[tokio::test]
async fn loads_and_groups_remote_opportunities() -> Result<()> {
    let api = TestApi::start(demo_opportunities()).await?;
    let board = board_for(&api, SyncPolicy::default()).await?;

    let grouping = board.grouping().context("board should be ready")?;
    assert_eq!(grouping.total_len(), demo_opportunities().len());
    for stage in Stage::ALL {
        assert_eq!(grouping.deals(stage).len(), 1, "column {stage}");
    }

    let orphan = board
        .deals()
        .get(&DealId::from("opp-4"))
        .context("opp-4 loaded")?;
    assert_eq!(orphan.account_name, "Unknown Account");
    assert_eq!(orphan.owner_name, "Unknown");
    assert_eq!(orphan.contact_name.as_deref(), Some("Priya"));

    api.stop().await
}

#[tokio::test]
async fn cross_stage_move_persists_and_refetch_updates_probability() -> Result<()> {
    let api = TestApi::start(demo_opportunities()).await?;
    let mut board = board_for(
        &api,
        SyncPolicy {
            refetch_on_commit: true,
        },
    )
    .await?;
    let id = DealId::from("opp-1");

    board.on_drag_start(id.clone());
    let outcome = board.on_drag_end(&id, Some(&DropTarget::Stage(Stage::Negotiation)));
    assert_eq!(
        outcome,
        DragOutcome::Moved {
            id: id.clone(),
            from: Stage::Proposal,
            to: Stage::Negotiation,
        }
    );
    assert_eq!(board.deals().stage_of(&id), Some(Stage::Negotiation));
    assert!(board.has_pending_commits());

    board.settle().await?;

    assert!(board.take_notices().is_empty());
    assert!(!board.has_pending_commits());
    let deal = board.deals().get(&id).context("opp-1 still loaded")?;
    assert_eq!(deal.stage, Stage::Negotiation);
    assert_eq!(deal.probability, 80);
    assert_eq!(
        stage_in_store(&api.store.snapshot().await, "opp-1"),
        Some(Stage::Negotiation)
    );

    api.stop().await
}

#[tokio::test]
async fn rejected_update_rolls_back_with_notice() -> Result<()> {
    let store = OpportunityStore::new(demo_opportunities()).rejecting_updates();
    let api = TestApi::with_store(store).await?;
    let mut board = board_for(&api, SyncPolicy::default()).await?;
    let id = DealId::from("opp-1");

    board.on_drag_start(id.clone());
    let outcome = board.on_drag_end(&id, Some(&DropTarget::Stage(Stage::ClosedWon)));
    assert!(outcome.requires_commit());
    assert_eq!(board.deals().stage_of(&id), Some(Stage::ClosedWon));

    board.settle().await?;

    assert_eq!(board.deals().stage_of(&id), Some(Stage::Proposal));
    assert!(matches!(
        board.sync_state(&id),
        Some(SyncState::Failed { .. })
    ));
    let notices = board.take_notices();
    assert_eq!(notices.len(), 1);
    let BoardNotice::CommitFailed {
        id: noticed,
        attempted,
        restored,
        ..
    } = &notices[0];
    assert_eq!(noticed, &id);
    assert_eq!(*attempted, Stage::ClosedWon);
    assert_eq!(*restored, Stage::Proposal);
    assert_eq!(
        stage_in_store(&api.store.snapshot().await, "opp-1"),
        Some(Stage::Proposal)
    );

    api.stop().await
}

#[tokio::test]
async fn reorder_within_column_sends_nothing() -> Result<()> {
    let mut records = demo_opportunities();
    if let Some(row) = records.iter_mut().find(|r| r.id == "opp-3") {
        row.stage = Stage::Proposal;
    }
    let api = TestApi::start(records).await?;
    let mut board = board_for(&api, SyncPolicy::default()).await?;
    let before = api.store.snapshot().await;

    let moving = DealId::from("opp-3");
    board.on_drag_start(moving.clone());
    let outcome = board.on_drag_end(&moving, Some(&DropTarget::Deal(DealId::from("opp-1"))));

    assert!(matches!(
        outcome,
        DragOutcome::Reordered {
            stage: Stage::Proposal,
            ..
        }
    ));
    assert!(!board.has_pending_commits());
    let column: Vec<String> = board
        .grouping()
        .context("board ready")?
        .deals(Stage::Proposal)
        .iter()
        .map(|d| d.id.to_string())
        .collect();
    assert_eq!(column, vec!["opp-3", "opp-1"]);
    assert_eq!(api.store.snapshot().await, before);

    api.stop().await
}

#[tokio::test]
async fn unknown_deal_update_maps_to_not_found() -> Result<()> {
    let api = TestApi::start(demo_opportunities()).await?;
    let gateway = GraphqlGateway::new(ClientConfig::new(api.endpoint()))?;

    let err = gateway
        .update_stage(StageUpdate::new(DealId::from("missing"), Stage::Proposal))
        .await
        .expect_err("update of a missing deal must fail");
    assert!(matches!(err, GatewayError::Api(ApiError::NotFound)));

    api.stop().await
}
