//! Supply, signature and wire properties of ledger snapshots

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use tally_core::{LedgerSnapshot, SignedBalance};
use tally_testkit::{LedgerBuilder, GENESIS_TS};

/// Transfers as `(from, to, amount)` over `holders` holders
fn transfers(holders: usize) -> impl Strategy<Value = Vec<(usize, usize, u64)>> {
    proptest::collection::vec((0..holders, 0..holders, 1u64..40), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_transfers_conserve_supply(plan in transfers(3)) {
        let ledger = LedgerBuilder::new().holders(&[100, 60, 40]).burned(7).build();
        let mut table = ledger.genesis();
        let total = table.coin_sum();
        for (from, to, amount) in plan {
            if from == to || table.amount_of(&ledger.address(from)) < amount {
                continue;
            }
            let tx = ledger.transfer_between(&table, from, to, amount);
            let next = table.apply_transaction(&tx, ledger.clock.as_ref()).unwrap();
            prop_assert!(next.is_valid());
            prop_assert_eq!(next.coin_sum(), total);
            prop_assert_eq!(next.burned(), 7);
            // replaying the same transfer is always stale
            let replay = next.apply_transaction(&tx, ledger.clock.as_ref()).unwrap_err();
            prop_assert!(replay.is_stale());
            table = next;
        }
    }

    #[test]
    fn prop_unsigned_amount_change_invalidates(holder in 0usize..3, delta in 1u64..20) {
        let ledger = LedgerBuilder::new().holders(&[100, 60, 40]).build();
        let genesis = ledger.genesis();
        let address = ledger.address(holder);
        let mut balances = genesis.balances().clone();
        let entry = balances[&address];
        balances.insert(
            address,
            SignedBalance::new(entry.amount - delta, entry.timestamp, entry.signature),
        );
        let tampered = LedgerSnapshot::new(
            genesis.network().clone(),
            balances,
            delta,
            ledger.clock.as_ref(),
        );
        prop_assert!(!tampered.is_valid());
        prop_assert_eq!(tampered.invalid_reason().unwrap().code(), "invalid_signature");
    }

    #[test]
    fn prop_export_import_keeps_digest(burned in 0u64..50, amounts in proptest::collection::vec(1u64..1_000, 1..6)) {
        let ledger = LedgerBuilder::new().holders(&amounts).burned(burned).build();
        let table = ledger.genesis();
        let bytes = table.export_buffer();
        let back = LedgerSnapshot::import_buffer(
            table.network().clone(),
            &bytes,
            ledger.clock.as_ref(),
        )
        .unwrap();
        prop_assert_eq!(back.digest(), table.digest());
        prop_assert_eq!(back.burned(), burned);
        prop_assert!(back.is_valid());
    }
}

#[test]
fn test_digest_changes_with_any_entry() {
    let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
    let a = ledger.table(&[(0, 60, GENESIS_TS), (1, 40, GENESIS_TS)], 0);
    let b = ledger.table(&[(0, 60, GENESIS_TS + 1), (1, 40, GENESIS_TS)], 0);
    assert!(a.is_valid() && b.is_valid());
    assert_ne!(a.digest(), b.digest());
    assert_eq!(a.digest(), ledger.genesis().digest());
}
