mod common;

use std::time::Duration;

use live_chess_back::{
    dao::{
        live_store::{LiveStore, keys::LiveKey},
        models::TournamentStatus,
    },
    dto::live_game::JoinRequest,
    error::{GameError, ServiceError},
    services::{matchmaking, scheduler, tournament_service},
};

use common::{DAYS, Harness, harness, pair, player, tournament};

fn domain(err: ServiceError) -> GameError {
    match err {
        ServiceError::Domain(err) => err,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

fn in_tournament(id: &str) -> JoinRequest {
    JoinRequest {
        tournament_id: Some(id.to_owned()),
        time_class: None,
    }
}

async fn open_tournament() -> Harness {
    let h = harness().await;
    for (name, rating) in [("alice", 1200), ("bob", 1300), ("carol", 2000), ("dave", 1100)] {
        h.records.insert_player(player(name, rating));
    }
    h.records
        .insert_tournament(tournament("t1", Duration::from_secs(30 * DAYS)));
    h
}

#[tokio::test]
async fn subscription_rules() {
    let h = open_tournament().await;

    tournament_service::subscribe(&h.state, "t1", "alice")
        .await
        .unwrap();
    assert_eq!(
        domain(
            tournament_service::subscribe(&h.state, "t1", "alice")
                .await
                .unwrap_err()
        ),
        GameError::AlreadySubscribed
    );
    assert_eq!(
        domain(
            tournament_service::subscribe(&h.state, "t1", "carol")
                .await
                .unwrap_err()
        ),
        GameError::RatingOutOfRange {
            rating: 2000,
            min: 1000,
            max: 1500
        }
    );

    tournament_service::subscribe(&h.state, "t1", "bob")
        .await
        .unwrap();
    assert_eq!(
        domain(
            tournament_service::subscribe(&h.state, "t1", "dave")
                .await
                .unwrap_err()
        ),
        GameError::TournamentFull
    );
    assert!(
        !tournament_service::is_subscribed(&h.state, "t1", "dave")
            .await
            .unwrap()
    );

    assert_eq!(
        domain(
            tournament_service::unsubscribe(&h.state, "t1", "dave")
                .await
                .unwrap_err()
        ),
        GameError::NotSubscribed
    );
    tournament_service::unsubscribe(&h.state, "t1", "bob")
        .await
        .unwrap();
    tournament_service::subscribe(&h.state, "t1", "dave")
        .await
        .unwrap();
}

#[tokio::test]
async fn subscriptions_close_before_the_finish() {
    let h = harness().await;
    h.records.insert_player(player("alice", 1200));
    h.records
        .insert_tournament(tournament("t1", Duration::from_secs(3 * DAYS)));

    assert_eq!(
        domain(
            tournament_service::subscribe(&h.state, "t1", "alice")
                .await
                .unwrap_err()
        ),
        GameError::SubscriptionClosed
    );
    assert_eq!(
        domain(
            tournament_service::subscribe(&h.state, "missing", "alice")
                .await
                .unwrap_err()
        ),
        GameError::TournamentNotFound
    );
}

#[tokio::test]
async fn tournament_join_requires_subscription_and_capacity() {
    let h = open_tournament().await;

    assert_eq!(
        domain(
            matchmaking::join(&h.state, "alice", in_tournament("t1"))
                .await
                .unwrap_err()
        ),
        GameError::NotSubscribed
    );

    tournament_service::subscribe(&h.state, "t1", "alice")
        .await
        .unwrap();
    h.live
        .set(
            LiveKey::tournament_player_games("t1", "alice"),
            "8".into(),
        )
        .await
        .unwrap();
    assert_eq!(
        domain(
            matchmaking::join(&h.state, "alice", in_tournament("t1"))
                .await
                .unwrap_err()
        ),
        GameError::CapacityReached { limit: 8 }
    );
    assert!(
        !h.live
            .list_contains(LiveKey::tournament_queue("t1"), "alice".into())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn tournament_pairing_counts_games_and_blocks_unsubscribe() {
    let h = open_tournament().await;
    for name in ["alice", "bob"] {
        tournament_service::subscribe(&h.state, "t1", name)
            .await
            .unwrap();
    }

    pair(&h, "alice", "bob", in_tournament("t1")).await;

    for name in ["alice", "bob"] {
        let count = h
            .live
            .get(LiveKey::tournament_player_games("t1", name))
            .await
            .unwrap();
        assert_eq!(count.as_deref(), Some("1"));
    }
    assert_eq!(
        domain(
            tournament_service::unsubscribe(&h.state, "t1", "alice")
                .await
                .unwrap_err()
        ),
        GameError::AlreadyPlayed
    );
}

#[tokio::test]
async fn sweep_finishes_due_tournaments_and_clears_keys() {
    let h = open_tournament().await;
    for name in ["alice", "bob"] {
        tournament_service::subscribe(&h.state, "t1", name)
            .await
            .unwrap();
    }
    h.live
        .incr_with_expiry(
            LiveKey::tournament_player_games("t1", "alice"),
            Duration::from_secs(DAYS),
        )
        .await
        .unwrap();

    let mut due = tournament("t1", Duration::ZERO);
    due.finish_time = std::time::SystemTime::now() - Duration::from_secs(60);
    h.records.insert_tournament(due);

    assert_eq!(scheduler::sweep_tournaments(&h.state).await.unwrap(), 1);
    assert_eq!(
        h.records.tournament("t1").unwrap().status,
        TournamentStatus::Finished
    );
    assert_eq!(
        h.live
            .set_size(LiveKey::tournament_subscribers("t1"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        h.live
            .get(LiveKey::tournament_player_games("t1", "alice"))
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        h.live.get(LiveKey::tournament_data("t1")).await.unwrap(),
        None
    );

    assert_eq!(
        domain(
            matchmaking::join(&h.state, "alice", in_tournament("t1"))
                .await
                .unwrap_err()
        ),
        GameError::NotSubscribed
    );
    assert_eq!(scheduler::sweep_tournaments(&h.state).await.unwrap(), 0);
}

#[tokio::test]
async fn publish_caches_live_tournament_data() {
    let h = open_tournament().await;

    let data = tournament_service::publish(&h.state, "t1").await.unwrap();
    assert_eq!(data.status, TournamentStatus::Active);
    assert_eq!((data.min_rating, data.max_rating), (1000, 1500));

    let raw = h
        .live
        .get(LiveKey::tournament_data("t1"))
        .await
        .unwrap()
        .expect("data cached");
    let cached: tournament_service::LiveTournamentData = serde_json::from_str(&raw).unwrap();
    assert_eq!(cached.max_participants, 2);
    assert_eq!(cached.finish_time, data.finish_time);

    let err = tournament_service::publish(&h.state, "missing")
        .await
        .unwrap_err();
    assert!(matches!(domain(err), GameError::TournamentNotFound));
}
