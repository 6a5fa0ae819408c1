mod common;

use std::time::Duration;

use live_chess_back::{
    dao::live_store::{LiveStore, keys::LiveKey},
    dto::live_game::{JoinRequest, MatchStatus},
    error::{GameError, ServiceError},
    services::{live_game_service, matchmaking},
};

use common::{harness, pair, until_queued};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_create_exactly_one_game() {
    let h = harness().await;
    let (a, b) = tokio::join!(
        matchmaking::join(&h.state, "alice", JoinRequest::default()),
        matchmaking::join(&h.state, "bob", JoinRequest::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.matched && b.matched);
    assert_eq!(a.game_id, b.game_id);
    let game_id = a.game_id.unwrap().to_string();

    for player in ["alice", "bob"] {
        let pointer = h.live.get(LiveKey::player_game(player)).await.unwrap();
        assert_eq!(pointer.as_deref(), Some(game_id.as_str()));
    }
    assert!(
        !h.live
            .list_contains(LiveKey::global_queue(), "alice".into())
            .await
            .unwrap()
    );
    assert!(
        !h.live
            .list_contains(LiveKey::global_queue(), "bob".into())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn queued_player_plays_white() {
    let h = harness().await;
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;

    let game = live_game_service::load_game(&h.state, game_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(game.white_player, "alice");
    assert_eq!(game.black_player, "bob");
}

#[tokio::test]
async fn player_in_a_running_game_cannot_join_again() {
    let h = harness().await;
    pair(&h, "alice", "bob", JoinRequest::default()).await;

    for request in [
        JoinRequest::default(),
        JoinRequest {
            tournament_id: Some("t1".into()),
            time_class: None,
        },
    ] {
        let err = matchmaking::join(&h.state, "alice", request)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(GameError::AlreadyInGame)));
    }
}

#[tokio::test]
async fn lonely_player_is_evicted_on_timeout() {
    let h = harness().await;
    let result = matchmaking::join(&h.state, "alice", JoinRequest::default())
        .await
        .unwrap();

    assert!(!result.matched);
    assert_eq!(result.status, MatchStatus::TimedOut);
    assert_eq!(result.message, "No opponent found. Removed from queue.");
    assert!(
        !h.live
            .list_contains(LiveKey::global_queue(), "alice".into())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn leaving_wakes_the_waiting_request() {
    let h = harness().await;
    let state = h.state.clone();
    let waiting =
        tokio::spawn(async move { matchmaking::join(&state, "alice", JoinRequest::default()).await });
    until_queued(&h.live, LiveKey::global_queue(), "alice").await;

    let left = matchmaking::leave(&h.state, "alice", None).await.unwrap();
    assert!(left.removed);

    let result = waiting.await.unwrap().unwrap();
    assert!(!result.matched);
    assert_eq!(result.status, MatchStatus::Left);
}

#[tokio::test]
async fn leaving_when_not_queued_succeeds() {
    let h = harness().await;
    let result = matchmaking::leave(&h.state, "ghost", None).await.unwrap();
    assert!(!result.removed);

    let result = matchmaking::leave(&h.state, "ghost", Some("t1")).await.unwrap();
    assert!(!result.removed);
}

#[tokio::test]
async fn finished_game_does_not_block_a_new_join() {
    let h = harness().await;
    let game_id = pair(&h, "alice", "bob", JoinRequest::default()).await;
    live_game_service::resign(&h.state, game_id, "bob")
        .await
        .unwrap();

    assert_eq!(
        h.live.get(LiveKey::player_game("alice")).await.unwrap(),
        None
    );
    let again = pair(&h, "alice", "bob", JoinRequest::default()).await;
    assert_ne!(again, game_id);
}

#[tokio::test]
async fn abandoned_join_leaves_no_ticket_behind() {
    let h = harness().await;
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        matchmaking::join(&h.state, "alice", JoinRequest::default()),
    )
    .await;
    assert!(abandoned.is_err());

    let mut queued = true;
    for _ in 0..100 {
        queued = h
            .live
            .list_contains(LiveKey::global_queue(), "alice".into())
            .await
            .unwrap();
        if !queued {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!queued);
    assert!(!h.state.notifier().notify("alice"));

    let bob = matchmaking::join(&h.state, "bob", JoinRequest::default())
        .await
        .unwrap();
    assert_eq!(bob.status, MatchStatus::TimedOut);
    assert_eq!(
        h.live.get(LiveKey::player_game("alice")).await.unwrap(),
        None
    );
}
