//! End-to-end behaviour of the ride service over the in-memory store

use chrono::{Duration, TimeZone, Utc};
use rides::models::{NewRide, NotificationKind, Ride, User};
use rides::store::FailPoint;
use rides::{
    ConflictError, ExpirySweeper, FixedClock, MemoryStore, RideError, RideService, SweepOutcome,
    SweepReport,
};
use std::sync::Arc;

struct World {
    store: MemoryStore,
    clock: Arc<FixedClock>,
    service: RideService,
}

impl World {
    async fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        ));
        let service = RideService::from_store(store.clone()).with_clock(clock.clone());
        Self {
            store,
            clock,
            service,
        }
    }

    async fn user(&self, handle: &str) -> User {
        let user = User::new(format!("uid-{handle}"), handle, None, self.clock_now());
        self.store.insert_user(user.clone()).await;
        user
    }

    fn clock_now(&self) -> chrono::DateTime<Utc> {
        use rides::Clock;
        self.clock.now()
    }

    async fn ride(&self, leader: &User, date: &str, seats: i32) -> Ride {
        self.service
            .create_ride(
                leader,
                NewRide {
                    origin: "Campus".to_string(),
                    destination: "Airport".to_string(),
                    date: date.to_string(),
                    time: "06:30".to_string(),
                    seats,
                    price: 15.0,
                },
            )
            .await
            .unwrap()
    }

    /// Send, approve and board
    async fn board(&self, leader: &User, rider: &User, ride: &Ride) {
        let request = self
            .service
            .send_join_request(rider, ride.id)
            .await
            .unwrap();
        self.service
            .approve_request(leader, request.id)
            .await
            .unwrap();
        self.service.join_ride(rider, ride.id).await.unwrap();
    }
}

fn conflict(err: RideError) -> ConflictError {
    match err {
        RideError::Conflict(conflict) => conflict,
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_posting_a_ride_gates_the_whole_day() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let other_leader = w.user("other").await;
    let ride = w.ride(&leader, "2025-06-10", 3).await;
    let other_ride = w.ride(&other_leader, "2025-06-10", 3).await;

    let report = w
        .service
        .check_involvement(&leader, "2025-06-10")
        .await
        .unwrap();
    assert!(report.has_involvement);
    assert_eq!(report.summary.posted_count, 1);

    let err = w
        .service
        .create_ride(
            &leader,
            NewRide {
                origin: "Campus".to_string(),
                destination: "Harbour".to_string(),
                date: "2025-06-10".to_string(),
                time: "18:00".to_string(),
                seats: 2,
                price: 5.0,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        conflict(err),
        ConflictError::InvolvementExists { .. }
    ));

    let err = w
        .service
        .send_join_request(&leader, other_ride.id)
        .await
        .unwrap_err();
    assert!(matches!(conflict(err), ConflictError::LeaderSameDay { .. }));

    // clearing leaves posted rides alone
    w.service
        .clear_involvement(&leader, "2025-06-10")
        .await
        .unwrap();
    assert!(
        w.service
            .check_involvement(&leader, "2025-06-10")
            .await
            .unwrap()
            .has_involvement
    );

    w.service.delete_ride(&leader, ride.id).await.unwrap();
    assert!(
        !w.service
            .check_involvement(&leader, "2025-06-10")
            .await
            .unwrap()
            .has_involvement
    );
    w.ride(&leader, "2025-06-10", 3).await;
}

#[tokio::test]
async fn test_pending_request_blocks_other_rides_until_cleared() {
    let w = World::new().await;
    let a = w.user("a").await;
    let b = w.user("b").await;
    let rider = w.user("rider").await;
    let first = w.ride(&a, "2025-06-10", 2).await;
    let second = w.ride(&b, "2025-06-10", 2).await;

    w.service
        .send_join_request(&rider, first.id)
        .await
        .unwrap();
    let err = w
        .service
        .send_join_request(&rider, second.id)
        .await
        .unwrap_err();
    match conflict(err) {
        ConflictError::InvolvementExists { report, .. } => {
            assert_eq!(report.summary.pending_count, 1);
            assert_eq!(report.details.pending_requests[0].leader_name, "a");
        }
        other => panic!("unexpected conflict {other:?}"),
    }

    let cleared = w
        .service
        .clear_involvement(&rider, "2025-06-10")
        .await
        .unwrap();
    assert_eq!(cleared.cancelled_requests, 1);
    assert_eq!(cleared.total_cancelled, 1);

    w.service
        .send_join_request(&rider, second.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_and_approved_resend_conflicts() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let rider = w.user("rider").await;
    let ride = w.ride(&leader, "2025-06-10", 2).await;

    let request = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap();
    let err = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap_err();
    assert_eq!(conflict(err), ConflictError::AlreadyPending);

    w.service
        .approve_request(&leader, request.id)
        .await
        .unwrap();
    let err = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap_err();
    assert_eq!(conflict(err), ConflictError::AlreadyApproved);

    let sent = w.service.list_sent_requests(&rider).await.unwrap();
    assert!(sent[0].can_join);
    assert!(!sent[0].can_cancel);
}

#[tokio::test]
async fn test_revocation_cooldown() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let rider = w.user("rider").await;
    let ride = w.ride(&leader, "2025-06-10", 2).await;
    let request = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap();
    w.service
        .revoke_request(&leader, request.id)
        .await
        .unwrap();

    w.clock.advance(Duration::minutes(29));
    let err = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap_err();
    assert_eq!(
        conflict(err),
        ConflictError::CooldownActive {
            remaining_minutes: 2
        }
    );

    w.clock.advance(Duration::minutes(2));
    let resent = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap();

    let requests = w.store.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, resent.id);
    assert_ne!(resent.id, request.id);
}

#[tokio::test]
async fn test_approving_on_a_full_ride_fails() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let first = w.user("first").await;
    let second = w.user("second").await;
    let ride = w.ride(&leader, "2025-06-10", 1).await;

    let late = w
        .service
        .send_join_request(&second, ride.id)
        .await
        .unwrap();
    w.board(&leader, &first, &ride).await;

    let err = w
        .service
        .approve_request(&leader, late.id)
        .await
        .unwrap_err();
    assert_eq!(conflict(err), ConflictError::RideFull);

    let stored = w.store.rides().await;
    assert_eq!(stored[0].seats_filled, 1);
    assert_eq!(w.store.participants().await.len(), 1);
}

#[tokio::test]
async fn test_delete_by_non_leader_changes_nothing() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let rider = w.user("rider").await;
    let ride = w.ride(&leader, "2025-06-10", 2).await;
    w.board(&leader, &rider, &ride).await;

    let rides = w.store.rides().await;
    let participants = w.store.participants().await;
    let requests = w.store.requests().await;
    let notifications = w.store.notifications().await;

    let err = w.service.delete_ride(&rider, ride.id).await.unwrap_err();
    assert!(matches!(err, RideError::Forbidden(_)));

    assert_eq!(w.store.rides().await, rides);
    assert_eq!(w.store.participants().await, participants);
    assert_eq!(w.store.requests().await, requests);
    assert_eq!(w.store.notifications().await, notifications);
}

#[tokio::test]
async fn test_delete_fans_out_to_participants() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let riders = [w.user("r1").await, w.user("r2").await, w.user("r3").await];
    let ride = w.ride(&leader, "2025-06-10", 3).await;
    for rider in &riders {
        w.board(&leader, rider, &ride).await;
    }
    let pending = w.user("pending").await;
    w.service
        .send_join_request(&pending, ride.id)
        .await
        .unwrap();
    assert!(!w.store.notifications().await.is_empty());
    w.store.fail_delivery_to("uid-r2");

    let deletion = w.service.delete_ride(&leader, ride.id).await.unwrap();

    assert_eq!(deletion.participants, 3);
    assert_eq!(deletion.participants_notified, 2);
    assert!(w.store.rides().await.is_empty());
    assert!(w.store.participants().await.is_empty());
    assert!(w.store.requests().await.is_empty());

    let notifications = w.store.notifications().await;
    assert_eq!(notifications.len(), 2);
    assert!(
        notifications
            .iter()
            .all(|n| n.kind == NotificationKind::RideCancelled.as_str())
    );
    assert_eq!(
        notifications[0].message,
        "The ride from Campus to Airport on 2025-06-10 at 06:30 has been cancelled by the leader leader"
    );
}

#[tokio::test]
async fn test_failed_cascade_step_leaves_everything() {
    for step in [
        FailPoint::DeleteNotifications,
        FailPoint::DeleteParticipants,
        FailPoint::DeleteRequests,
        FailPoint::DeleteRide,
        FailPoint::Commit,
    ] {
        let w = World::new().await;
        let leader = w.user("leader").await;
        let rider = w.user("rider").await;
        let ride = w.ride(&leader, "2025-06-10", 2).await;
        w.board(&leader, &rider, &ride).await;
        let notifications = w.store.notifications().await;

        w.store.fail_at(step);
        let err = w.service.delete_ride(&leader, ride.id).await.unwrap_err();
        w.store.clear_faults();

        assert!(matches!(err, RideError::Transaction(_)), "{step:?}");
        assert_eq!(w.store.rides().await.len(), 1, "{step:?}");
        assert_eq!(w.store.participants().await.len(), 1, "{step:?}");
        assert_eq!(w.store.notifications().await, notifications, "{step:?}");
    }
}

#[tokio::test]
async fn test_sweep_keeps_history_and_notifies_everyone() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let riders = [w.user("r1").await, w.user("r2").await];
    let ride = w.ride(&leader, "2025-06-01", 3).await;
    for rider in &riders {
        w.board(&leader, rider, &ride).await;
    }
    let waiting = w.user("waiting").await;
    w.service
        .send_join_request(&waiting, ride.id)
        .await
        .unwrap();
    let history = w.store.notifications().await.len();

    w.clock.advance(Duration::days(1));
    let outcome = ExpirySweeper::new(w.service.clone()).run().await.unwrap();

    assert_eq!(
        outcome,
        SweepOutcome::Completed(SweepReport {
            found: 1,
            deleted: 1,
            failed: 0,
            notifications_sent: 3,
        })
    );
    assert!(w.store.rides().await.is_empty());
    assert!(w.store.participants().await.is_empty());
    assert!(w.store.requests().await.is_empty());

    let notifications = w.store.notifications().await;
    assert_eq!(notifications.len(), history + 3);
    let completed: Vec<_> = notifications
        .iter()
        .filter(|n| n.kind == "ride_completed")
        .collect();
    assert_eq!(completed.len(), 3);
    assert!(
        completed
            .iter()
            .any(|n| n.recipient == "uid-leader" && n.message.ends_with("Total participants: 2"))
    );

    let views = w.service.list_notifications(&riders[0]).await.unwrap();
    assert!(views.iter().all(|v| v.origin == "Unknown"));
}

#[tokio::test]
async fn test_sweep_failure_is_retried_next_cycle() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    w.ride(&leader, "2025-06-01", 2).await;
    w.clock.advance(Duration::days(1));
    let sweeper = ExpirySweeper::new(w.service.clone());

    w.store.fail_at(FailPoint::DeleteParticipants);
    let outcome = sweeper.run().await.unwrap();
    assert_eq!(
        outcome,
        SweepOutcome::Completed(SweepReport {
            found: 1,
            deleted: 0,
            failed: 1,
            notifications_sent: 0,
        })
    );
    assert_eq!(w.store.rides().await.len(), 1);

    w.store.clear_faults();
    let outcome = sweeper.run().await.unwrap();
    assert_eq!(
        outcome,
        SweepOutcome::Completed(SweepReport {
            found: 1,
            deleted: 1,
            failed: 0,
            notifications_sent: 1,
        })
    );
}

#[tokio::test]
async fn test_clear_involvement_is_idempotent() {
    let w = World::new().await;
    let rider = w.user("rider").await;

    for _ in 0..2 {
        let cleared = w
            .service
            .clear_involvement(&rider, "2025-06-10")
            .await
            .unwrap();
        assert_eq!(cleared.cancelled_requests, 0);
        assert_eq!(cleared.cancelled_privileges, 0);
        assert_eq!(cleared.total_cancelled, 0);
    }
}

#[tokio::test]
async fn test_clear_involvement_drops_approved_privilege() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let rider = w.user("rider").await;
    let ride = w.ride(&leader, "2025-06-10", 2).await;
    let request = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap();
    w.service
        .approve_request(&leader, request.id)
        .await
        .unwrap();

    let report = w
        .service
        .check_involvement(&rider, "2025-06-10")
        .await
        .unwrap();
    assert_eq!(report.summary.approved_count, 1);

    let cleared = w
        .service
        .clear_involvement(&rider, "2025-06-10")
        .await
        .unwrap();
    assert_eq!(cleared.cancelled_requests, 0);
    assert_eq!(cleared.cancelled_privileges, 1);
    assert_eq!(cleared.total_cancelled, 1);
    assert!(w.store.requests().await.is_empty());

    let err = w.service.join_ride(&rider, ride.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Approved request not found");
    assert!(
        !w.service
            .check_involvement(&rider, "2025-06-10")
            .await
            .unwrap()
            .has_involvement
    );
}

#[tokio::test]
async fn test_cancel_withdraws_only_pending_requests() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let rider = w.user("rider").await;
    let ride = w.ride(&leader, "2025-06-10", 2).await;

    w.service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap();
    w.service
        .cancel_join_request(&rider, ride.id)
        .await
        .unwrap();
    assert!(w.store.requests().await.is_empty());
    assert!(
        w.service
            .list_pending_requests(&leader, ride.id)
            .await
            .unwrap()
            .is_empty()
    );

    // no cooldown after withdrawing
    let request = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap();
    w.service
        .approve_request(&leader, request.id)
        .await
        .unwrap();

    let err = w
        .service
        .cancel_join_request(&rider, ride.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RideError::NotFound(_)));
    assert_eq!(err.to_string(), "Pending request not found");

    let requests = w.store.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, request.id);
}

#[tokio::test]
async fn test_resending_after_boarding_is_already_joined() {
    let w = World::new().await;
    let leader = w.user("leader").await;
    let rider = w.user("rider").await;
    let ride = w.ride(&leader, "2025-06-10", 2).await;
    w.board(&leader, &rider, &ride).await;

    let err = w
        .service
        .send_join_request(&rider, ride.id)
        .await
        .unwrap_err();

    assert_eq!(conflict(err), ConflictError::AlreadyJoined);
    assert!(w.store.requests().await.is_empty());
    assert_eq!(w.store.participants().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_identity_is_not_found() {
    let w = World::new().await;

    let err = w.service.resolve_user("uid-nobody").await.unwrap_err();

    assert_eq!(err.to_string(), "User not found");
}
