use proptest::prelude::*;
use trisplit_splitter::{
    AssetLedger, DonationSplitter, InMemoryAssetLedger, InMemoryVault, SplitterError,
    StaticAuthority,
};
use trisplit_types::{Address, AssetInfo, Bps, Epoch, EpochPolicy, SharePrice, WAD};

const GOV: Address = Address::new([0x60; 20]);
const VAULT: Address = Address::new([0x70; 20]);

fn recipients() -> [Address; 3] {
    [
        Address::new([1; 20]),
        Address::new([2; 20]),
        Address::new([3; 20]),
    ]
}

fn splitter_with(weights: [Bps; 3], genesis: Epoch) -> DonationSplitter {
    let policy = EpochPolicy::new(recipients(), weights).expect("valid weights");
    DonationSplitter::in_memory(
        Box::new(StaticAuthority::new(GOV, VAULT)),
        genesis,
        Some(policy),
    )
    .expect("splitter")
}

/// Any triple of weights summing to exactly 10000.
fn valid_weights() -> impl Strategy<Value = [Bps; 3]> {
    (0u16..=10_000)
        .prop_flat_map(|a| (Just(a), 0u16..=(10_000 - a)))
        .prop_map(|(a, b)| [a, b, 10_000 - a - b])
}

proptest! {
    #[test]
    fn split_conserves_assets(weights in valid_weights(), total in any::<u128>()) {
        let policy = EpochPolicy::new(recipients(), weights).unwrap();
        let split = policy.split(total);

        prop_assert_eq!(split.amounts.iter().sum::<u128>(), total);
        prop_assert!(split.remainder < 3);
    }
}

proptest! {
    #[test]
    fn accrued_shares_are_all_redeemed(
        weights in valid_weights(),
        accruals in prop::collection::vec(0u128..=WAD, 1..20),
        price_bps in 5_000u128..=30_000,
    ) {
        let splitter = splitter_with(weights, 1);
        let price = SharePrice::from_wad(WAD * price_bps / 10_000);
        let mut vault = InMemoryVault::new(AssetInfo::default(), price);
        let mut ledger = InMemoryAssetLedger::new();

        let mut accrued = 0u128;
        for profit in &accruals {
            let shares = vault.report_profit(*profit).unwrap();
            splitter.accrue(&VAULT, shares).unwrap();
            accrued += shares;
        }

        let outcome = splitter.distribute_all(&mut vault, &mut ledger).unwrap();
        prop_assert_eq!(splitter.pending_shares().unwrap(), 0);
        prop_assert_eq!(outcome.shares_redeemed(), accrued);

        if let Some(record) = outcome.record() {
            prop_assert!(record.is_conserved());
            prop_assert_eq!(ledger.total_transferred(), record.assets_distributed);
        } else {
            prop_assert_eq!(accrued, 0);
        }
    }
}

proptest! {
    #[test]
    fn set_policy_at_or_before_current_always_fails(
        current in 1u64..1_000,
        offset in 0u64..1_000,
        weights in valid_weights(),
    ) {
        let splitter = splitter_with([5000, 3000, 2000], current);
        let epoch = current.saturating_sub(offset);

        let result = splitter.set_policy(&GOV, epoch, recipients(), weights);
        let rejected = matches!(result, Err(SplitterError::EpochNotFuture { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(splitter.policy_epochs().unwrap(), vec![current]);
    }
}

proptest! {
    #[test]
    fn advance_epoch_is_strictly_monotonic(targets in prop::collection::vec(0u64..100, 1..30)) {
        let splitter = splitter_with([5000, 3000, 2000], 1);
        let mut current = 1u64;

        for target in targets {
            let result = splitter.advance_epoch(&GOV, target);
            if target > current {
                prop_assert!(result.is_ok());
                current = target;
            } else {
                let rejected = matches!(result, Err(SplitterError::EpochNotFuture { .. }));
                prop_assert!(rejected);
            }
            prop_assert_eq!(splitter.current_epoch().unwrap(), current);
        }
    }
}

proptest! {
    #[test]
    fn invalid_weight_sums_are_rejected(a in 0u16..=10_000, b in 0u16..=10_000, c in 0u16..=10_000) {
        prop_assume!(a as u32 + b as u32 + c as u32 != 10_000);
        let splitter = splitter_with([5000, 3000, 2000], 1);

        let result = splitter.set_policy(&GOV, 2, recipients(), [a, b, c]);
        let rejected = matches!(result, Err(SplitterError::Policy(_)));
        prop_assert!(rejected);
        prop_assert_eq!(splitter.get_policy(2).unwrap(), None);
    }
}
