//! Concurrency tests
//!
//! Joins and creates race from many threads; the store serializes commits and
//! re-checks capacity at commit time, so exactly the capacity is admitted and
//! nobody is charged without being a participant.

use std::sync::Arc;
use std::thread;

use spinwheel_engine::{
    Clock, EngineConfig, EventFanout, MemoryStore, NullPublisher, Role, RoundService, SystemClock,
};

fn test_engine() -> Arc<RoundService> {
    let config = EngineConfig {
        rng_seed: Some(7),
        ..EngineConfig::default()
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Arc::new(RoundService::new(
        Arc::new(MemoryStore::new()),
        config,
        clock,
        Arc::new(NullPublisher),
    ))
}

#[test]
fn test_hundred_concurrent_joins_admit_exactly_capacity() {
    let service = test_engine();

    let admin = service.register_account("admin", Role::Admin).unwrap();
    let users: Vec<_> = (0..100)
        .map(|i| service.register_account(&format!("u{}", i), Role::User).unwrap())
        .collect();
    let round = service.create_round(admin.id(), 100, 10).unwrap();

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let service = service.clone();
            let round_id = round.id();
            let account_id = user.id();
            thread::spawn(move || service.join(round_id, account_id).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|b| *b)
        .count();
    assert_eq!(successes, 10);

    let fresh = service.get_round(round.id()).unwrap();
    assert_eq!(fresh.participants().len(), 10);

    // Charged if and only if admitted, and the pools account for every coin.
    for user in &users {
        let balance = service.get_balance(user.id()).unwrap();
        if fresh.has_participant(user.id()) {
            assert_eq!(balance, 900, "admitted account must be charged once");
        } else {
            assert_eq!(balance, 1_000, "rejected account must not be charged");
        }
    }
    let pools = fresh.pools();
    assert_eq!(pools.winner + pools.admin + pools.app, 100 * 10);
}

#[test]
fn test_losers_observe_conflict() {
    let service = test_engine();

    let admin = service.register_account("admin", Role::Admin).unwrap();
    let users: Vec<_> = (0..20)
        .map(|i| service.register_account(&format!("u{}", i), Role::User).unwrap())
        .collect();
    let round = service.create_round(admin.id(), 100, 5).unwrap();

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let service = service.clone();
            let round_id = round.id();
            let account_id = user.id();
            thread::spawn(move || service.join(round_id, account_id))
        })
        .collect();

    let mut conflicts = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => {}
            Err(err) => {
                assert_eq!(err.kind(), "CONFLICT");
                assert!(err.retriable());
                conflicts += 1;
            }
        }
    }
    assert_eq!(conflicts, 15);
}

#[test]
fn test_parallel_creates_admit_exactly_one() {
    let service = test_engine();

    let admins: Vec<_> = (0..8)
        .map(|i| service.register_account(&format!("a{}", i), Role::Admin).unwrap())
        .collect();

    let handles: Vec<_> = admins
        .iter()
        .map(|admin| {
            let service = service.clone();
            let admin_id = admin.id();
            thread::spawn(move || service.create_round(admin_id, 100, 10))
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => ok += 1,
            Err(err) => assert_eq!(err.kind(), "CONFLICT"),
        }
    }
    assert_eq!(ok, 1, "singleton active round admits exactly one create");
    assert!(service.get_active_round().is_some());
}

#[test]
fn test_create_conflicts_while_waiting_round_exists() {
    let service = test_engine();

    let admin_a = service.register_account("a", Role::Admin).unwrap();
    let admin_b = service.register_account("b", Role::Admin).unwrap();

    service.create_round(admin_a.id(), 100, 10).unwrap();
    let err = service.create_round(admin_b.id(), 50, 10).unwrap_err();
    assert_eq!(err.kind(), "CONFLICT");
}

#[test]
fn test_joiners_and_subscribers_share_one_fanout() {
    // Joins racing with subscribers must not deadlock the fan-out.
    let config = EngineConfig {
        rng_seed: Some(7),
        ..EngineConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let fanout = Arc::new(EventFanout::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = Arc::new(RoundService::new(
        store,
        config,
        clock,
        fanout.clone(),
    ));

    let admin = service.register_account("admin", Role::Admin).unwrap();
    let users: Vec<_> = (0..10)
        .map(|i| service.register_account(&format!("u{}", i), Role::User).unwrap())
        .collect();
    let round = service.create_round(admin.id(), 100, 10).unwrap();

    let mut room = fanout.join_room(round.id());
    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let service = service.clone();
            let round_id = round.id();
            let account_id = user.id();
            thread::spawn(move || service.join(round_id, account_id).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut joined = 0;
    while let Ok(event) = room.try_recv() {
        assert_eq!(event.round_id(), round.id());
        if event.name() == "round.joined" {
            joined += 1;
        }
    }
    assert_eq!(joined, 10);
}
