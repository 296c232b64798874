//! Pure merge and settlement steps
//!
//! Nothing here touches the network: the engine feeds quorum verdicts in and gets
//! balance maps out, which keeps every step deterministic and directly testable.

use crate::report::{DisputeEntry, ReconcileReport, Resolution};
use std::collections::BTreeMap;
use tally_core::{Address, LedgerSnapshot, SignedBalance};
use tally_quorum::DisputeVerdict;

/// The naive merge of two tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// Per address, the entry with the greater timestamp (local wins ties)
    pub balances: BTreeMap<Address, SignedBalance>,
    /// `max(old.burned, new.burned)`
    pub burned: u64,
    /// Addresses present in only one table, or whose remote entry is at least as
    /// new as the local one and holds a different amount
    pub disputed: Vec<Address>,
}

/// Merge two tables entry by entry
pub fn merge_tables(old: &LedgerSnapshot, new: &LedgerSnapshot) -> MergePlan {
    let mut balances = old.balances().clone();
    let mut disputed = Vec::new();

    for (address, remote) in new.balances() {
        match old.balance(address) {
            Some(local) => {
                // a strictly newer local entry already supersedes the remote one
                if local.amount != remote.amount && remote.timestamp >= local.timestamp {
                    disputed.push(*address);
                }
                if remote.timestamp > local.timestamp {
                    balances.insert(*address, *remote);
                }
            }
            None => {
                disputed.push(*address);
                balances.insert(*address, *remote);
            }
        }
    }
    disputed.extend(
        old.addresses()
            .filter(|address| new.balance(address).is_none()),
    );
    disputed.sort_unstable();

    MergePlan {
        balances,
        burned: old.burned().max(new.burned()),
        disputed,
    }
}

/// Apply quorum verdicts to the disputed addresses of a plan
///
/// `Old`/`New` adopt that side's entry (an absent side removes it). Anything else
/// keeps the lower amount and burns the difference.
pub fn settle_disputes(
    plan: &MergePlan,
    old: &LedgerSnapshot,
    new: &LedgerSnapshot,
    verdicts: &BTreeMap<Address, DisputeVerdict>,
) -> (BTreeMap<Address, SignedBalance>, u64, ReconcileReport) {
    let mut balances = plan.balances.clone();
    let mut burned = plan.burned;
    let mut report = ReconcileReport::default();

    for address in &plan.disputed {
        let local = old.balance(address).copied();
        let remote = new.balance(address).copied();
        let verdict = verdicts
            .get(address)
            .copied()
            .unwrap_or(DisputeVerdict::Inconclusive);

        let resolution = match verdict {
            DisputeVerdict::Old => {
                set_entry(&mut balances, *address, local);
                Resolution::AdoptedOld
            }
            DisputeVerdict::New => {
                set_entry(&mut balances, *address, remote);
                Resolution::AdoptedNew
            }
            DisputeVerdict::Inconclusive => {
                let (kept, delta) = lower_side(local, remote);
                set_entry(&mut balances, *address, kept);
                burned = burned.saturating_add(delta);
                tracing::warn!(
                    address = %address.short(),
                    kept = kept.map_or(0, |entry| entry.amount),
                    burned = delta,
                    "dispute inconclusive, burning the difference"
                );
                Resolution::Burned {
                    kept: kept.map_or(0, |entry| entry.amount),
                    delta,
                }
            }
        };
        report.entries.push(DisputeEntry {
            address: *address,
            resolution,
        });
    }
    (balances, burned, report)
}

fn set_entry(
    balances: &mut BTreeMap<Address, SignedBalance>,
    address: Address,
    entry: Option<SignedBalance>,
) {
    match entry {
        Some(entry) => {
            balances.insert(address, entry);
        }
        None => {
            balances.remove(&address);
        }
    }
}

/// The lower of two sides (absent counts as zero) and the amount to burn
fn lower_side(
    local: Option<SignedBalance>,
    remote: Option<SignedBalance>,
) -> (Option<SignedBalance>, u64) {
    match (local, remote) {
        (Some(a), Some(b)) => {
            let (low, high) = if a.amount <= b.amount { (a, b) } else { (b, a) };
            (Some(low), high.amount - low.amount)
        }
        (Some(only), None) | (None, Some(only)) => (None, only.amount),
        (None, None) => (None, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_testkit::{LedgerBuilder, GENESIS_TS};

    #[test]
    fn test_greater_timestamp_wins_and_old_wins_ties() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let old = ledger.table(&[(0, 50, GENESIS_TS + 2), (1, 50, GENESIS_TS)], 0);
        let new = ledger.table(&[(0, 60, GENESIS_TS), (1, 40, GENESIS_TS)], 0);

        let plan = merge_tables(&old, &new);
        assert_eq!(plan.balances[&ledger.address(0)].amount, 50);
        // equal timestamps keep the local entry but are still disputed
        assert_eq!(plan.balances[&ledger.address(1)].amount, 50);
        assert_eq!(plan.disputed, vec![ledger.address(1)]);
    }

    #[test]
    fn test_newer_local_entry_is_not_disputed() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let old = ledger.table(&[(0, 55, GENESIS_TS + 5), (1, 45, GENESIS_TS + 5)], 0);
        let new = ledger.table(&[(0, 70, GENESIS_TS + 1), (1, 30, GENESIS_TS + 9)], 0);

        let plan = merge_tables(&old, &new);
        assert_eq!(plan.balances[&ledger.address(0)].amount, 55);
        assert_eq!(plan.balances[&ledger.address(1)].amount, 30);
        assert_eq!(plan.disputed, vec![ledger.address(1)]);

        // an inconclusive vote can only touch the remote-newer entry
        let (balances, burned, _) = settle_disputes(&plan, &old, &new, &BTreeMap::new());
        assert_eq!(balances[&ledger.address(0)].amount, 55);
        assert_eq!(balances[&ledger.address(1)].amount, 30);
        assert_eq!(burned, 15);
    }

    #[test]
    fn test_one_sided_entries_are_disputed() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let old = ledger.table(&[(0, 60, GENESIS_TS)], 40);
        let new = ledger.genesis();
        let plan = merge_tables(&old, &new);
        assert_eq!(plan.disputed, vec![ledger.address(1)]);
        assert!(plan.balances.contains_key(&ledger.address(1)));
        assert_eq!(plan.burned, 40);
    }

    #[test]
    fn test_identical_tables_have_no_disputes() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let plan = merge_tables(&ledger.genesis(), &ledger.genesis());
        assert!(plan.disputed.is_empty());
        assert_eq!(plan.balances, *ledger.genesis().balances());
    }

    #[test]
    fn test_inconclusive_burns_difference() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let old = ledger.table(&[(0, 60, GENESIS_TS), (1, 40, GENESIS_TS)], 0);
        let new = ledger.table(&[(0, 70, GENESIS_TS), (1, 30, GENESIS_TS)], 0);
        let plan = merge_tables(&old, &new);
        let (balances, burned, report) = settle_disputes(&plan, &old, &new, &BTreeMap::new());

        assert_eq!(balances[&ledger.address(0)].amount, 60);
        assert_eq!(balances[&ledger.address(1)].amount, 30);
        assert_eq!(burned, 20);
        assert_eq!(report.burned_total(), 20);
        assert_eq!(report.burned_addresses().count(), 2);
    }

    #[test]
    fn test_absent_side_removes_entry_on_burn() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let old = ledger.table(&[(0, 60, GENESIS_TS)], 40);
        let new = ledger.genesis();
        let plan = merge_tables(&old, &new);
        let (balances, burned, report) = settle_disputes(&plan, &old, &new, &BTreeMap::new());
        assert!(!balances.contains_key(&ledger.address(1)));
        assert_eq!(burned, 80);
        assert_eq!(
            report.entries[0].resolution,
            Resolution::Burned { kept: 0, delta: 40 }
        );
    }

    #[test]
    fn test_verdicts_adopt_sides() {
        let ledger = LedgerBuilder::new().holders(&[60, 40]).build();
        let old = ledger.table(&[(0, 60, GENESIS_TS), (1, 40, GENESIS_TS)], 0);
        let new = ledger.table(&[(0, 70, GENESIS_TS + 1), (1, 30, GENESIS_TS + 1)], 0);
        let plan = merge_tables(&old, &new);
        let verdicts = BTreeMap::from([
            (ledger.address(0), DisputeVerdict::Old),
            (ledger.address(1), DisputeVerdict::New),
        ]);
        let (balances, burned, report) = settle_disputes(&plan, &old, &new, &verdicts);
        assert_eq!(balances[&ledger.address(0)].amount, 60);
        assert_eq!(balances[&ledger.address(1)].amount, 30);
        assert_eq!(burned, 0);
        assert_eq!(report.burned_total(), 0);
    }
}
