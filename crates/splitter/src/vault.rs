//! Share vault interface
//!
//! The vault owns the yield strategy and the share price. The splitter only
//! reads the price once per settlement and redeems its pending donation
//! shares at that price; [`ShareVault::revert_redemption`] is the
//! compensation step used when a later payout fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use trisplit_types::{AssetInfo, SharePrice};

/// Vault collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("vault is illiquid: redeeming {shares} shares needs {required} assets, {available} idle")]
    Illiquid {
        shares: u128,
        required: u128,
        available: u128,
    },

    #[error("share price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("cannot redeem {shares} shares, splitter holds {available}")]
    InsufficientShares { shares: u128, available: u128 },

    #[error("quoted price {quoted} no longer matches vault price {current}")]
    StalePrice {
        quoted: SharePrice,
        current: SharePrice,
    },

    #[error("share conversion overflow")]
    Overflow,

    #[error("redemption is not known to this vault")]
    UnknownRedemption,
}

/// Outcome of a successful redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub shares: u128,
    pub assets: u128,
    pub price: SharePrice,
}

/// Interface to the yield vault that mints donation shares.
pub trait ShareVault: Send + Sync {
    /// Metadata of the underlying asset.
    fn asset(&self) -> AssetInfo;

    /// Current asset units per share.
    fn price_per_share(&self) -> Result<SharePrice, VaultError>;

    /// Burn `shares` donation shares at `price` and release the assets to
    /// the splitter.
    fn redeem_shares(&mut self, shares: u128, price: SharePrice)
        -> Result<Redemption, VaultError>;

    /// Undo a redemption returned by [`ShareVault::redeem_shares`].
    fn revert_redemption(&mut self, redemption: &Redemption) -> Result<(), VaultError>;
}

// -----------------------------------------------------------------------------
// In-memory vault
// -----------------------------------------------------------------------------

/// Simple vault with a settable price and a finite pool of idle assets.
///
/// `report_profit` mirrors the keeper flow: new profit is converted to shares
/// at the current price and minted to the donation address, so the price per
/// share is unchanged and the minted shares show up as pending donations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryVault {
    asset: AssetInfo,
    price: SharePrice,
    idle_assets: u128,
    donation_shares: u128,
    total_redeemed_shares: u128,
}

impl InMemoryVault {
    pub fn new(asset: AssetInfo, price: SharePrice) -> Self {
        Self {
            asset,
            price,
            idle_assets: 0,
            donation_shares: 0,
            total_redeemed_shares: 0,
        }
    }

    /// Book `profit` asset units as yield and mint the matching donation
    /// shares. Returns the number of shares minted; the caller forwards them
    /// to `DonationSplitter::accrue`.
    pub fn report_profit(&mut self, profit: u128) -> Result<u128, VaultError> {
        let shares = self
            .price
            .convert_to_shares(profit)
            .ok_or(VaultError::Overflow)?;
        self.idle_assets = self
            .idle_assets
            .checked_add(profit)
            .ok_or(VaultError::Overflow)?;
        self.donation_shares = self
            .donation_shares
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        debug!(target: "vault", profit, shares, price = %self.price, "Reported profit");
        Ok(shares)
    }

    pub fn set_price(&mut self, price: SharePrice) {
        self.price = price;
    }

    pub fn add_liquidity(&mut self, assets: u128) {
        self.idle_assets = self.idle_assets.saturating_add(assets);
    }

    /// Move idle assets out (e.g. deployed into a strategy). Returns the
    /// amount actually removed.
    pub fn remove_liquidity(&mut self, assets: u128) -> u128 {
        let removed = assets.min(self.idle_assets);
        self.idle_assets -= removed;
        removed
    }

    pub fn idle_assets(&self) -> u128 {
        self.idle_assets
    }

    pub fn donation_shares(&self) -> u128 {
        self.donation_shares
    }

    pub fn total_redeemed_shares(&self) -> u128 {
        self.total_redeemed_shares
    }
}

impl Default for InMemoryVault {
    fn default() -> Self {
        Self::new(AssetInfo::default(), SharePrice::ONE)
    }
}

impl ShareVault for InMemoryVault {
    fn asset(&self) -> AssetInfo {
        self.asset.clone()
    }

    fn price_per_share(&self) -> Result<SharePrice, VaultError> {
        Ok(self.price)
    }

    fn redeem_shares(
        &mut self,
        shares: u128,
        price: SharePrice,
    ) -> Result<Redemption, VaultError> {
        if price != self.price {
            return Err(VaultError::StalePrice {
                quoted: price,
                current: self.price,
            });
        }
        if shares > self.donation_shares {
            return Err(VaultError::InsufficientShares {
                shares,
                available: self.donation_shares,
            });
        }
        let assets = price
            .convert_to_assets(shares)
            .ok_or(VaultError::Overflow)?;
        if assets > self.idle_assets {
            return Err(VaultError::Illiquid {
                shares,
                required: assets,
                available: self.idle_assets,
            });
        }

        self.donation_shares -= shares;
        self.idle_assets -= assets;
        self.total_redeemed_shares = self.total_redeemed_shares.saturating_add(shares);
        Ok(Redemption {
            shares,
            assets,
            price,
        })
    }

    fn revert_redemption(&mut self, redemption: &Redemption) -> Result<(), VaultError> {
        if redemption.shares > self.total_redeemed_shares {
            return Err(VaultError::UnknownRedemption);
        }
        self.donation_shares = self
            .donation_shares
            .checked_add(redemption.shares)
            .ok_or(VaultError::Overflow)?;
        self.idle_assets = self
            .idle_assets
            .checked_add(redemption.assets)
            .ok_or(VaultError::Overflow)?;
        self.total_redeemed_shares -= redemption.shares;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Mock vault (records calls, injects failures)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MockVault {
    inner: InMemoryVault,
    price_unavailable: bool,
    fail_redeem: Option<VaultError>,
    fail_revert: bool,
    redeem_calls: Vec<(u128, SharePrice)>,
    revert_calls: Vec<Redemption>,
}

impl MockVault {
    pub fn new(inner: InMemoryVault) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn price_unavailable(mut self) -> Self {
        self.price_unavailable = true;
        self
    }

    pub fn fail_redeem_with(mut self, error: VaultError) -> Self {
        self.fail_redeem = Some(error);
        self
    }

    pub fn fail_reverts(mut self) -> Self {
        self.fail_revert = true;
        self
    }

    pub fn inner(&self) -> &InMemoryVault {
        &self.inner
    }

    pub fn get_redeem_calls(&self) -> &[(u128, SharePrice)] {
        &self.redeem_calls
    }

    pub fn get_revert_calls(&self) -> &[Redemption] {
        &self.revert_calls
    }
}

impl ShareVault for MockVault {
    fn asset(&self) -> AssetInfo {
        self.inner.asset()
    }

    fn price_per_share(&self) -> Result<SharePrice, VaultError> {
        if self.price_unavailable {
            return Err(VaultError::PriceUnavailable("oracle offline".into()));
        }
        self.inner.price_per_share()
    }

    fn redeem_shares(
        &mut self,
        shares: u128,
        price: SharePrice,
    ) -> Result<Redemption, VaultError> {
        self.redeem_calls.push((shares, price));
        if let Some(error) = &self.fail_redeem {
            return Err(error.clone());
        }
        self.inner.redeem_shares(shares, price)
    }

    fn revert_redemption(&mut self, redemption: &Redemption) -> Result<(), VaultError> {
        self.revert_calls.push(*redemption);
        if self.fail_revert {
            return Err(VaultError::UnknownRedemption);
        }
        self.inner.revert_redemption(redemption)
    }
}
