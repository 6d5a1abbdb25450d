//! Ledger and pool property tests
//!
//! Exercises the money invariants over arbitrary fees, splits, and table
//! sizes: pools account for every collected coin, any balance reconstructs
//! from the record log, aborts net to zero, and a finished round leaves only
//! the house fee behind.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use spinwheel_engine::{
    models::round::split_entry_fee, AbortReason, Clock, EngineConfig, MemoryStore, NullPublisher,
    Role, RoundService, RoundStatus, SystemClock,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn build_service(initial_balance: i64, seed: u64) -> (Arc<RoundService>, Arc<MemoryStore>) {
    let config = EngineConfig {
        initial_balance,
        rng_seed: Some(seed),
        ..EngineConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = Arc::new(RoundService::new(
        store.clone(),
        config,
        clock,
        Arc::new(NullPublisher),
    ));
    (service, store)
}

fn pct_triple() -> impl Strategy<Value = (u8, u8, u8)> {
    (0u8..=100).prop_flat_map(|winner| {
        (0u8..=(100 - winner)).prop_map(move |admin| (winner, admin, 100 - winner - admin))
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_split_is_exact_and_non_negative(
        fee in 1i64..=1_000_000,
        (winner_pct, admin_pct, app_pct) in pct_triple(),
    ) {
        let shares = split_entry_fee(fee, winner_pct, admin_pct, app_pct);

        prop_assert_eq!(shares.winner + shares.admin + shares.app, fee);
        prop_assert!(shares.winner >= 0);
        prop_assert!(shares.admin >= 0);
        prop_assert!(shares.app >= 0);
        // The remainder tie-breaks toward the winner share.
        prop_assert!(shares.winner >= fee * winner_pct as i64 / 100);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pools_account_for_every_collected_coin(
        fee in 1i64..=10_000,
        joiners in 3usize..=20,
        seed in any::<u64>(),
    ) {
        let (service, _) = build_service(fee, seed);
        let admin = service.register_account("admin", Role::Admin).unwrap();
        let round = service.create_round(admin.id(), fee, 20).unwrap();

        for i in 0..joiners {
            let user = service.register_account(&format!("u{}", i), Role::User).unwrap();
            service.join(round.id(), user.id()).unwrap();
        }

        let fresh = service.get_round(round.id()).unwrap();
        let pools = fresh.pools();
        prop_assert_eq!(
            pools.winner + pools.admin + pools.app,
            fee * joiners as i64
        );

        // No account appears twice in the participant sequence.
        let ids: HashSet<_> = fresh.participants().iter().map(|p| p.account_id).collect();
        prop_assert_eq!(ids.len(), joiners);
    }

    #[test]
    fn prop_completed_round_conserves_every_coin(
        fee in 1i64..=10_000,
        joiners in 3usize..=12,
        seed in any::<u64>(),
    ) {
        let (service, store) = build_service(fee, seed);
        let admin = service.register_account("admin", Role::Admin).unwrap();
        let round = service.create_round(admin.id(), fee, 20).unwrap();

        let users: Vec<_> = (0..joiners)
            .map(|i| service.register_account(&format!("u{}", i), Role::User).unwrap())
            .collect();
        for user in &users {
            service.join(round.id(), user.id()).unwrap();
        }

        service.start(round.id()).unwrap();
        loop {
            let outcome = service.eliminate_next(round.id()).unwrap();
            if outcome.completion.is_some() {
                break;
            }
        }

        let finished = service.get_round(round.id()).unwrap();
        prop_assert_eq!(finished.status(), RoundStatus::Completed);

        // Exactly one survivor, and it is the recorded winner.
        prop_assert_eq!(finished.remaining(), 1);
        let survivor = finished.survivor().unwrap().account_id;
        prop_assert_eq!(finished.winner_id(), Some(survivor));

        // The order is a permutation of the participants.
        let participants: HashSet<_> =
            finished.participants().iter().map(|p| p.account_id).collect();
        let order: HashSet<_> = finished.elimination_order().iter().copied().collect();
        prop_assert_eq!(participants, order);

        // Every balance reconstructs from its record log.
        for account in users.iter().chain(std::iter::once(&admin)) {
            let recorded: i64 = service
                .list_transactions(account.id(), 1, 1_000, None)
                .unwrap()
                .iter()
                .map(|r| r.amount)
                .sum();
            let balance = service.get_balance(account.id()).unwrap();
            prop_assert_eq!(balance, fee + recorded);
            prop_assert!(balance >= 0);
        }

        // Across all accounts the round nets to minus the house fee.
        let pools = finished.pools();
        let account_sum: i64 = store
            .records_for_round(round.id())
            .iter()
            .filter(|r| r.account_id.is_some())
            .map(|r| r.amount)
            .sum();
        prop_assert_eq!(account_sum, -pools.app);
    }

    #[test]
    fn prop_abort_nets_to_zero(
        fee in 1i64..=10_000,
        joiners in 1usize..=10,
        seed in any::<u64>(),
    ) {
        let (service, store) = build_service(fee, seed);
        let admin = service.register_account("admin", Role::Admin).unwrap();
        let round = service.create_round(admin.id(), fee, 20).unwrap();

        let users: Vec<_> = (0..joiners)
            .map(|i| service.register_account(&format!("u{}", i), Role::User).unwrap())
            .collect();
        for user in &users {
            service.join(round.id(), user.id()).unwrap();
        }

        service.abort(round.id(), AbortReason::AdminRequest).unwrap();

        // Every participant got their fee back; the round log nets to zero.
        for user in &users {
            prop_assert_eq!(service.get_balance(user.id()).unwrap(), fee);
        }
        let net: i64 = store
            .records_for_round(round.id())
            .iter()
            .map(|r| r.amount)
            .sum();
        prop_assert_eq!(net, 0);

        let pools = service.get_round(round.id()).unwrap().pools();
        prop_assert_eq!(pools.winner + pools.admin + pools.app, 0);
    }
}
