//! Settlement Smoke Test
//!
//! End-to-end walk through the splitter lifecycle:
//! - Governance configures future policies and advances epochs
//! - The vault reports profit and accrues donation shares
//! - Anyone settles; payouts always add up to the redeemed assets
//! - Failed redemptions and transfers leave no trace
//! - Re-entrant settlement is a no-op
//! - Sled-backed state survives a restart
//!
//! Run with: cargo test -p trisplit-splitter --test settlement_smoke -- --nocapture

use trisplit_splitter::{
    AssetLedger, DistributionOutcome, DonationSplitter, InMemoryAssetLedger, InMemoryVault,
    MockAssetLedger, Redemption, ShareVault, SplitterError, StaticAuthority, VaultError,
};
use trisplit_storage::SledStore;
use trisplit_types::{Address, AssetInfo, EpochPolicy, SharePrice, WAD};

// =============================================================================
// TEST HELPERS
// =============================================================================

const GOV: Address = Address::new([0x60; 20]);
const VAULT: Address = Address::new([0x70; 20]);

fn recipient(n: u8) -> Address {
    Address::new([n; 20])
}

fn authority() -> Box<StaticAuthority> {
    Box::new(StaticAuthority::new(GOV, VAULT))
}

fn genesis_policy() -> EpochPolicy {
    EpochPolicy::new([recipient(1), recipient(2), recipient(3)], [5000, 3000, 2000])
        .expect("valid genesis policy")
}

fn usdc_vault() -> InMemoryVault {
    InMemoryVault::new(AssetInfo::new("USDC", 6), SharePrice::ONE)
}

/// Report profit in the vault and forward the minted shares to the splitter.
fn report(splitter: &DonationSplitter, vault: &mut InMemoryVault, profit: u128) -> u128 {
    let shares = vault.report_profit(profit).expect("report profit");
    splitter.accrue(&VAULT, shares).expect("accrue")
}

// =============================================================================
// TEST 1: FULL LIFECYCLE ACROSS TWO EPOCHS
// =============================================================================

#[test]
fn test_full_lifecycle() {
    println!("\n=== TEST 1: Full Lifecycle ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut vault = usdc_vault();
    let mut ledger = InMemoryAssetLedger::new();

    // Epoch 1: genesis policy 50/30/20
    report(&splitter, &mut vault, 600);
    report(&splitter, &mut vault, 400);
    assert_eq!(splitter.pending_shares().unwrap(), 1000);

    let first = splitter.distribute_all(&mut vault, &mut ledger).unwrap();
    let record = first.record().expect("settled");
    println!("Epoch 1 payouts: {:?}", record.per_recipient_amounts());
    assert_eq!(record.per_recipient_amounts(), [500, 300, 200]);
    assert_eq!(record.shares_redeemed, 1000);
    assert_eq!(splitter.pending_shares().unwrap(), 0);

    // Governance queues epoch 2 with a new recipient
    splitter
        .set_policy(&GOV, 2, [recipient(4), recipient(2), recipient(3)], [3333, 3333, 3334])
        .unwrap();
    assert!(splitter.next_policy().unwrap().is_some());
    splitter.advance_epoch(&GOV, 2).unwrap();

    // Epoch 2: 10 units at 3333/3333/3334 pay 4/3/3
    report(&splitter, &mut vault, 10);
    let second = splitter.distribute_all(&mut vault, &mut ledger).unwrap();
    let record = second.record().expect("settled");
    println!("Epoch 2 payouts: {:?}", record.per_recipient_amounts());
    assert_eq!(record.per_recipient_amounts(), [4, 3, 3]);
    assert_eq!(record.epoch, 2);
    assert_eq!(record.sequence, 1);

    // Epoch 1 policy is unchanged after advancing past it
    assert_eq!(splitter.get_policy(1).unwrap(), Some(genesis_policy()));

    assert_eq!(ledger.balance_of(&recipient(1)), 500);
    assert_eq!(ledger.balance_of(&recipient(2)), 303);
    assert_eq!(ledger.balance_of(&recipient(3)), 203);
    assert_eq!(ledger.balance_of(&recipient(4)), 4);

    let stats = splitter.statistics().unwrap();
    assert_eq!(stats.settlements, 2);
    assert_eq!(stats.total_assets_distributed, 1010);
    assert_eq!(splitter.recipient_total(&recipient(2)).unwrap(), 303);
    assert_eq!(splitter.epoch_total(2).unwrap(), 10);

    println!("✓ Lifecycle settled 1010 units across two epochs");
}

// =============================================================================
// TEST 2: NO-OP SETTLEMENTS
// =============================================================================

#[test]
fn test_noop_settlements() {
    println!("\n=== TEST 2: No-op Settlements ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut vault = usdc_vault();
    let mut ledger = InMemoryAssetLedger::new();

    // accrue(0) + distribute on an empty ledger never records
    splitter.accrue(&VAULT, 0).unwrap();
    let outcome = splitter.distribute_all(&mut vault, &mut ledger).unwrap();
    assert_eq!(outcome, DistributionOutcome::NothingToDistribute);
    assert_eq!(splitter.records().unwrap().len(), 0);

    // Two settlements in a row: one record, then a no-op
    report(&splitter, &mut vault, 50);
    assert!(!splitter.distribute_all(&mut vault, &mut ledger).unwrap().is_noop());
    assert!(splitter.distribute_all(&mut vault, &mut ledger).unwrap().is_noop());
    assert_eq!(splitter.records().unwrap().len(), 1);

    println!("✓ Empty settlements emit no records");
}

// =============================================================================
// TEST 3: ROLLBACK ON COLLABORATOR FAILURE
// =============================================================================

#[test]
fn test_failed_redemption_rolls_back() {
    println!("\n=== TEST 3a: Failed Redemption ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut vault = usdc_vault();
    let mut ledger = InMemoryAssetLedger::new();

    report(&splitter, &mut vault, 1000);
    let deployed = vault.remove_liquidity(600);
    println!("Deployed {} units into the strategy; vault is illiquid", deployed);

    let err = splitter.distribute_all(&mut vault, &mut ledger).unwrap_err();
    println!("Error: {}", err);
    assert!(matches!(
        err,
        SplitterError::RedeemFailed(VaultError::Illiquid { .. })
    ));
    assert_eq!(splitter.pending_shares().unwrap(), 1000);
    assert_eq!(vault.donation_shares(), 1000);
    assert_eq!(ledger.total_transferred(), 0);
    assert!(splitter.records().unwrap().is_empty());

    // Liquidity returns and the same shares settle
    vault.add_liquidity(600);
    let outcome = splitter.distribute_all(&mut vault, &mut ledger).unwrap();
    assert_eq!(outcome.assets_distributed(), 1000);

    println!("✓ Illiquid vault left state untouched; retry succeeded");
}

#[test]
fn test_failed_transfer_rolls_back() {
    println!("\n=== TEST 3b: Failed Transfer ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut vault = usdc_vault();
    let mut ledger = InMemoryAssetLedger::new();

    report(&splitter, &mut vault, 1000);
    ledger.reject_recipient(recipient(3));

    let err = splitter.distribute_all(&mut vault, &mut ledger).unwrap_err();
    println!("Error: {}", err);
    assert!(matches!(
        err,
        SplitterError::TransferFailed { recipient: r, amount: 200, .. } if r == recipient(3)
    ));

    // No partial distribution is observable
    assert_eq!(ledger.balance_of(&recipient(1)), 0);
    assert_eq!(ledger.balance_of(&recipient(2)), 0);
    assert_eq!(vault.donation_shares(), 1000);
    assert_eq!(vault.idle_assets(), 1000);
    assert_eq!(splitter.pending_shares().unwrap(), 1000);
    assert!(splitter.records().unwrap().is_empty());

    println!("✓ Rejected payout unwound the whole settlement");
}

#[test]
fn test_mock_ledger_sees_reverse_reclaims() {
    println!("\n=== TEST 3c: Reclaim Order ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut vault = usdc_vault();
    let mut ledger = MockAssetLedger::new().fail_transfer_at(2);

    report(&splitter, &mut vault, 100);
    assert!(splitter.distribute_all(&mut vault, &mut ledger).is_err());

    println!("Transfers: {:?}", ledger.get_transfer_calls());
    println!("Reclaims:  {:?}", ledger.get_reclaim_calls());
    assert_eq!(
        ledger.get_reclaim_calls(),
        &[(recipient(2), 30), (recipient(1), 50)]
    );
    assert_eq!(ledger.total_transferred(), 0);

    println!("✓ Payouts reclaimed newest first");
}

// =============================================================================
// TEST 4: POLICY UNSET
// =============================================================================

#[test]
fn test_policy_unset_fails_fast() {
    println!("\n=== TEST 4: Policy Unset ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut vault = usdc_vault();
    let mut ledger = InMemoryAssetLedger::new();

    // Advance without configuring epoch 5
    splitter.advance_epoch(&GOV, 5).unwrap();
    report(&splitter, &mut vault, 100);

    let err = splitter.distribute_all(&mut vault, &mut ledger).unwrap_err();
    assert!(matches!(err, SplitterError::PolicyUnset { epoch: 5 }));
    assert_eq!(splitter.pending_shares().unwrap(), 100);
    assert_eq!(vault.donation_shares(), 100);

    println!("✓ Settlement refused without draining pending shares");
}

// =============================================================================
// TEST 5: RE-ENTRANCY
// =============================================================================

/// Vault that calls back into the splitter from inside a redemption.
struct ReentrantVault<'a> {
    splitter: &'a DonationSplitter,
    inner: InMemoryVault,
    nested_was_noop: Option<bool>,
    accrue_during_redeem: u128,
}

impl ShareVault for ReentrantVault<'_> {
    fn asset(&self) -> AssetInfo {
        self.inner.asset()
    }

    fn price_per_share(&self) -> Result<SharePrice, VaultError> {
        self.inner.price_per_share()
    }

    fn redeem_shares(&mut self, shares: u128, price: SharePrice) -> Result<Redemption, VaultError> {
        let mut other_vault = InMemoryVault::default();
        let mut other_ledger = InMemoryAssetLedger::new();
        let nested = self
            .splitter
            .distribute_all(&mut other_vault, &mut other_ledger)
            .map_err(|e| VaultError::PriceUnavailable(e.to_string()))?;
        self.nested_was_noop = Some(nested.is_noop());

        if self.accrue_during_redeem > 0 {
            self.splitter
                .accrue(&VAULT, self.accrue_during_redeem)
                .map_err(|e| VaultError::PriceUnavailable(e.to_string()))?;
        }

        self.inner.redeem_shares(shares, price)
    }

    fn revert_redemption(&mut self, redemption: &Redemption) -> Result<(), VaultError> {
        self.inner.revert_redemption(redemption)
    }
}

#[test]
fn test_reentrant_distribution_is_noop() {
    println!("\n=== TEST 5a: Re-entrant Settlement ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut inner = usdc_vault();
    let shares = inner.report_profit(100).unwrap();
    splitter.accrue(&VAULT, shares).unwrap();

    let mut vault = ReentrantVault {
        splitter: &splitter,
        inner,
        nested_was_noop: None,
        accrue_during_redeem: 7,
    };
    let mut ledger = InMemoryAssetLedger::new();

    let outcome = splitter.distribute_all(&mut vault, &mut ledger).unwrap();
    assert_eq!(vault.nested_was_noop, Some(true));
    assert_eq!(outcome.shares_redeemed(), 100);
    assert_eq!(splitter.records().unwrap().len(), 1);

    // Shares accrued mid-settlement wait for the next one
    assert_eq!(splitter.pending_shares().unwrap(), 7);

    println!("✓ Nested call saw zero pending; concurrent accrual preserved");
}

#[test]
fn test_accrual_during_failed_settlement_is_kept() {
    println!("\n=== TEST 5b: Accrual During Rollback ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();
    let mut inner = usdc_vault();
    let shares = inner.report_profit(100).unwrap();
    splitter.accrue(&VAULT, shares).unwrap();

    let mut vault = ReentrantVault {
        splitter: &splitter,
        inner,
        nested_was_noop: None,
        accrue_during_redeem: 7,
    };
    let mut ledger = InMemoryAssetLedger::new();
    ledger.reject_recipient(recipient(2));

    assert!(splitter.distribute_all(&mut vault, &mut ledger).is_err());
    assert_eq!(splitter.pending_shares().unwrap(), 107);

    println!("✓ Rollback re-credited shares on top of the new accrual");
}

// =============================================================================
// TEST 6: CONCURRENT ACCRUAL
// =============================================================================

#[test]
fn test_concurrent_accrual() {
    println!("\n=== TEST 6: Concurrent Accrual ===");

    let splitter = DonationSplitter::in_memory(authority(), 1, Some(genesis_policy())).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..250 {
                    splitter.accrue(&VAULT, WAD).unwrap();
                }
            });
        }
    });

    assert_eq!(splitter.pending_shares().unwrap(), 2000 * WAD);
    println!("✓ 2000 concurrent accruals summed exactly");
}

// =============================================================================
// TEST 7: PERSISTENCE ACROSS RESTART
// =============================================================================

#[test]
fn test_sled_state_survives_restart() {
    println!("\n=== TEST 7: Sled Persistence ===");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("splitter-db");

    {
        let store = SledStore::open_with_flush_interval(&path, None).unwrap();
        let splitter =
            DonationSplitter::new(Box::new(store), authority(), 1, Some(genesis_policy())).unwrap();
        let mut vault = usdc_vault();
        let mut ledger = InMemoryAssetLedger::new();

        report(&splitter, &mut vault, 100);
        splitter.distribute_all(&mut vault, &mut ledger).unwrap();

        splitter
            .set_policy(&GOV, 3, [recipient(1), recipient(2), recipient(3)], [10_000, 0, 0])
            .unwrap();
        splitter.advance_epoch(&GOV, 2).unwrap();
        splitter.accrue(&VAULT, 42).unwrap();
        splitter.flush().unwrap();
    }

    let store = SledStore::open_with_flush_interval(&path, None).unwrap();
    let splitter = DonationSplitter::new(Box::new(store), authority(), 1, None).unwrap();

    assert_eq!(splitter.current_epoch().unwrap(), 2);
    assert_eq!(splitter.pending_shares().unwrap(), 42);
    assert_eq!(splitter.get_policy(1).unwrap(), Some(genesis_policy()));
    assert_eq!(
        splitter.next_policy().unwrap().unwrap().weights_bps(),
        [10_000, 0, 0]
    );
    let records = splitter.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].per_recipient_amounts(), [50, 30, 20]);

    println!("✓ Epoch, policies, pending shares and records restored");
}
