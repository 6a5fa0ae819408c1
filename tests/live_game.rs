mod common;

use live_chess_back::{
    chess::{START_FEN, Side},
    dao::{
        live_store::{LiveStore, keys::LiveKey},
        record_store::RecordStore,
    },
    dto::live_game::JoinRequest,
    error::{GameError, ServiceError},
    services::live_game_service,
    state::live_game::{GameStatus, MoveOutcome},
};
use uuid::Uuid;

use common::{harness, pair, player};

#[tokio::test]
async fn out_of_turn_move_changes_nothing() {
    let h = harness().await;
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    let err = live_game_service::make_move(&h.state, game_id, "bob", "e7e5")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(GameError::NotYourTurn { ref waiting_for }) if waiting_for == "alice"
    ));

    let game = live_game_service::load_game(&h.state, game_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(game.fen, START_FEN);
    assert!(game.move_history.is_empty());
}

#[tokio::test]
async fn illegal_and_foreign_moves_are_rejected() {
    let h = harness().await;
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    let err = live_game_service::make_move(&h.state, game_id, "alice", "e2e5")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(GameError::IllegalMove(_))));

    let err = live_game_service::make_move(&h.state, game_id, "mallory", "e2e4")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(GameError::NotParticipant)));

    let err = live_game_service::make_move(&h.state, Uuid::new_v4(), "alice", "e2e4")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(GameError::GameNotFound)));
}

#[tokio::test]
async fn legal_move_flips_the_turn_and_detects_the_opening() {
    let h = harness().await;
    h.live
        .hash_set(
            &LiveKey::openings(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b",
            r#"{ "name": "King's Pawn Game", "eco": "B00" }"#,
        )
        .unwrap();
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    let result = live_game_service::make_move(&h.state, game_id, "alice", "e2e4")
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.outcome, Some(MoveOutcome::MoveMade));
    assert_eq!(result.next_turn, Some(Side::Black));
    assert_eq!(result.status, Some(GameStatus::InProgress));
    assert_eq!(result.detected_opening.as_deref(), Some("King's Pawn Game"));
    assert_eq!(result.detected_opening_eco.as_deref(), Some("B00"));

    let view = live_game_service::get_status(&h.state, game_id)
        .await
        .unwrap();
    assert_eq!(view.turn, Some(Side::Black));
    assert_eq!(view.last_move.as_deref(), Some("e2e4"));
    assert!(view.last_move_at.is_some());
    assert_eq!(view.move_count, 1);
}

#[tokio::test]
async fn fools_mate_ends_the_game_and_finalizes_once() {
    let h = harness().await;
    h.records.insert_player(player("alice", 1200));
    h.records.insert_player(player("bob", 1200));
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    let moves = [
        ("alice", "f2f3"),
        ("bob", "e7e5"),
        ("alice", "g2g4"),
        ("bob", "d8h4"),
    ];
    let mut last = None;
    for (mover, mv) in moves {
        last = Some(
            live_game_service::make_move(&h.state, game_id, mover, mv)
                .await
                .unwrap(),
        );
    }
    let last = last.unwrap();

    assert_eq!(last.outcome, Some(MoveOutcome::Checkmate));
    assert_eq!(last.status, Some(GameStatus::BlackWins));
    assert_eq!(last.next_turn, None);
    assert_eq!(last.finalized, Some(true));
    assert_eq!(h.records.save_game_calls(), 1);

    let record = h.records.find_game(game_id).await.unwrap().unwrap();
    assert_eq!(record.moves, "f3 e5 g4 Qh4# 0-1");
    assert_eq!(record.white_rating, Some(1200));

    assert_eq!(h.records.player("alice").unwrap().ratings.rapid, 1180);
    assert_eq!(h.records.player("bob").unwrap().ratings.rapid, 1220);
    for name in ["alice", "bob"] {
        assert_eq!(h.live.get(LiveKey::player_game(name)).await.unwrap(), None);
    }
    assert!(
        h.live
            .set_members(LiveKey::pending_finalize())
            .await
            .unwrap()
            .is_empty()
    );

    let err = live_game_service::make_move(&h.state, game_id, "alice", "e2e4")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(GameError::GameAlreadyEnded {
            status: GameStatus::BlackWins
        })
    ));
    assert_eq!(h.records.save_game_calls(), 1);
}

#[tokio::test]
async fn resignation_awards_the_opponent() {
    let h = harness().await;
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    let result = live_game_service::resign(&h.state, game_id, "alice")
        .await
        .unwrap();
    assert_eq!(result.outcome, Some(MoveOutcome::Resigned));
    assert_eq!(result.status, Some(GameStatus::BlackWins));

    let err = live_game_service::resign(&h.state, game_id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(GameError::GameAlreadyEnded { .. })
    ));
}

#[tokio::test]
async fn held_game_lock_reports_busy() {
    let h = harness().await;
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;
    h.live
        .set(LiveKey::game_lock(&game_id.to_string()), "other".into())
        .await
        .unwrap();

    let err = live_game_service::make_move(&h.state, game_id, "alice", "e2e4")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Busy));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn stalemate_is_a_draw_without_rating_change() {
    let h = harness().await;
    h.records.insert_player(player("alice", 1200));
    h.records.insert_player(player("bob", 1200));
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    // Loyd's ten-move stalemate.
    let moves = [
        "e2e3", "a7a5", "d1h5", "a8a6", "h5a5", "h7h5", "h2h4", "a6h6", "a5c7", "f7f6", "c7d7",
        "e8f7", "d7b7", "d8d3", "b7b8", "d3h7", "b8c8", "f7g6", "c8e6",
    ];
    let mut last = None;
    for (ply, mv) in moves.into_iter().enumerate() {
        let mover = if ply % 2 == 0 { "alice" } else { "bob" };
        last = Some(
            live_game_service::make_move(&h.state, game_id, mover, mv)
                .await
                .unwrap(),
        );
    }
    let last = last.unwrap();

    assert_eq!(last.outcome, Some(MoveOutcome::Stalemate));
    assert_eq!(last.status, Some(GameStatus::Stalemate));
    assert_eq!(last.next_turn, None);
    assert_eq!(last.finalized, Some(true));

    let record = h.records.find_game(game_id).await.unwrap().unwrap();
    assert!(record.moves.starts_with("e3 a5 Qh5"));
    assert!(record.moves.ends_with("Qe6 1/2-1/2"));
    for name in ["alice", "bob"] {
        assert_eq!(h.records.player(name).unwrap().ratings.rapid, 1200);
        assert_eq!(h.records.player(name).unwrap().games.len(), 1);
    }
}
