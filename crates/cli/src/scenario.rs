//! Scripted scenarios for `trisplit-cli simulate`
//!
//! A scenario is a TOML file with optional vault setup and a list of steps,
//! each tagged by `action`. Amounts may be TOML integers or decimal strings
//! (strings are needed above `i64::MAX`, and `_` separators are allowed):
//!
//! ```toml
//! [vault]
//! price_wad = "1000000000000000000"
//!
//! [[steps]]
//! action = "report_profit"
//! assets = "1_000_000"
//!
//! [[steps]]
//! action = "distribute"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use trisplit_splitter::{
    DistributionOutcome, DonationSplitter, InMemoryAssetLedger, InMemoryVault,
    SettlementStatistics, ShareVault, SplitterConfig, SplitterError, StorageBackend,
};
use trisplit_types::{Address, AssetInfo, Bps, Epoch, EpochPolicy, SettlementRecord, SharePrice};

// =============================================================================
// SCENARIO FORMAT
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub vault: VaultSetup,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultSetup {
    /// Initial share price (18-decimal fixed point); defaults to 1.0
    #[serde(default, deserialize_with = "optional_amount")]
    pub price_wad: Option<u128>,
    /// Idle assets present before any profit is reported
    #[serde(default, deserialize_with = "amount")]
    pub initial_liquidity: u128,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    SetPolicy {
        epoch: Epoch,
        recipients: [Address; 3],
        weights_bps: [Bps; 3],
        /// Defaults to the configured governance address
        #[serde(default)]
        caller: Option<Address>,
    },
    AdvanceEpoch {
        epoch: Epoch,
        #[serde(default)]
        caller: Option<Address>,
    },
    /// Book profit in the vault and accrue the minted shares
    ReportProfit {
        #[serde(deserialize_with = "amount")]
        assets: u128,
    },
    Accrue {
        #[serde(deserialize_with = "amount")]
        shares: u128,
        /// Defaults to the configured vault address
        #[serde(default)]
        caller: Option<Address>,
    },
    Distribute,
    SetPrice {
        #[serde(deserialize_with = "amount")]
        price_wad: u128,
    },
    RemoveLiquidity {
        #[serde(deserialize_with = "amount")]
        assets: u128,
    },
    AddLiquidity {
        #[serde(deserialize_with = "amount")]
        assets: u128,
    },
    RejectRecipient {
        address: Address,
    },
    AcceptRecipient {
        address: Address,
    },
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::SetPolicy { .. } => "set_policy",
            Step::AdvanceEpoch { .. } => "advance_epoch",
            Step::ReportProfit { .. } => "report_profit",
            Step::Accrue { .. } => "accrue",
            Step::Distribute => "distribute",
            Step::SetPrice { .. } => "set_price",
            Step::RemoveLiquidity { .. } => "remove_liquidity",
            Step::AddLiquidity { .. } => "add_liquidity",
            Step::RejectRecipient { .. } => "reject_recipient",
            Step::AcceptRecipient { .. } => "accept_recipient",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Int(u64),
    Text(String),
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u128, D::Error> {
    match AmountRepr::deserialize(deserializer)? {
        AmountRepr::Int(value) => Ok(value as u128),
        AmountRepr::Text(text) => text
            .trim()
            .replace('_', "")
            .parse::<u128>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", text, e))),
    }
}

fn optional_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u128>, D::Error> {
    amount(deserializer).map(Some)
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse scenario")
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    PolicySet { epoch: Epoch },
    EpochAdvanced { epoch: Epoch },
    ProfitReported {
        assets: u128,
        shares_minted: u128,
        pending_shares: u128,
    },
    Accrued { pending_shares: u128 },
    Distributed(DistributionOutcome),
    PriceSet { price: SharePrice },
    LiquidityChanged { idle_assets: u128 },
    RecipientRejected { address: Address },
    RecipientAccepted { address: Address },
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct FinalState {
    pub asset: AssetInfo,
    pub epoch: Epoch,
    pub pending_shares: u128,
    pub estimated_pending_assets: u128,
    pub current_policy: Option<EpochPolicy>,
    pub next_policy: Option<EpochPolicy>,
    pub statistics: SettlementStatistics,
    pub records: Vec<SettlementRecord>,
    pub balances: BTreeMap<Address, u128>,
    pub vault_idle_assets: u128,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub final_state: FinalState,
}

impl SimulationReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_ok()).count()
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Splitter plus in-memory vault and ledger, driven step by step.
pub struct Simulation {
    splitter: DonationSplitter,
    vault: InMemoryVault,
    ledger: InMemoryAssetLedger,
    governance: Address,
    vault_address: Address,
}

impl Simulation {
    /// Build a simulation from `config`. Storage is always in memory so a
    /// simulation never touches a persistent store.
    pub fn new(config: &SplitterConfig, setup: &VaultSetup) -> Result<Self> {
        let mut config = config.clone();
        config.storage.backend = StorageBackend::Memory;
        config.storage.path = None;

        let splitter =
            DonationSplitter::from_config(&config).context("Failed to build splitter")?;
        let price = setup.price_wad.map(SharePrice::from_wad).unwrap_or_default();
        let mut vault = InMemoryVault::new(config.asset.clone(), price);
        vault.add_liquidity(setup.initial_liquidity);

        Ok(Self {
            splitter,
            vault,
            ledger: InMemoryAssetLedger::new(),
            governance: config.roles.governance,
            vault_address: config.roles.vault,
        })
    }

    pub fn apply(&mut self, step: &Step) -> Result<StepOutcome> {
        let outcome = match step {
            Step::SetPolicy {
                epoch,
                recipients,
                weights_bps,
                caller,
            } => {
                let caller = caller.unwrap_or(self.governance);
                self.splitter
                    .set_policy(&caller, *epoch, *recipients, *weights_bps)?;
                StepOutcome::PolicySet { epoch: *epoch }
            }
            Step::AdvanceEpoch { epoch, caller } => {
                let caller = caller.unwrap_or(self.governance);
                self.splitter.advance_epoch(&caller, *epoch)?;
                StepOutcome::EpochAdvanced { epoch: *epoch }
            }
            Step::ReportProfit { assets } => {
                let shares_minted = self
                    .vault
                    .report_profit(*assets)
                    .context("Vault rejected profit report")?;
                let pending_shares = self.splitter.accrue(&self.vault_address, shares_minted)?;
                StepOutcome::ProfitReported {
                    assets: *assets,
                    shares_minted,
                    pending_shares,
                }
            }
            Step::Accrue { shares, caller } => {
                let caller = caller.unwrap_or(self.vault_address);
                let pending_shares = self.splitter.accrue(&caller, *shares)?;
                StepOutcome::Accrued { pending_shares }
            }
            Step::Distribute => {
                let outcome = self
                    .splitter
                    .distribute_all(&mut self.vault, &mut self.ledger)?;
                StepOutcome::Distributed(outcome)
            }
            Step::SetPrice { price_wad } => {
                let price = SharePrice::from_wad(*price_wad);
                self.vault.set_price(price);
                StepOutcome::PriceSet { price }
            }
            Step::RemoveLiquidity { assets } => {
                self.vault.remove_liquidity(*assets);
                StepOutcome::LiquidityChanged {
                    idle_assets: self.vault.idle_assets(),
                }
            }
            Step::AddLiquidity { assets } => {
                self.vault.add_liquidity(*assets);
                StepOutcome::LiquidityChanged {
                    idle_assets: self.vault.idle_assets(),
                }
            }
            Step::RejectRecipient { address } => {
                self.ledger.reject_recipient(*address);
                StepOutcome::RecipientRejected { address: *address }
            }
            Step::AcceptRecipient { address } => {
                self.ledger.accept_recipient(address);
                StepOutcome::RecipientAccepted { address: *address }
            }
        };
        Ok(outcome)
    }

    /// Run every step, recording failures. With `fail_fast` the run stops
    /// after the first failed step.
    pub fn run(&mut self, scenario: &Scenario, fail_fast: bool) -> Result<SimulationReport> {
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let report = match self.apply(step) {
                Ok(outcome) => StepReport {
                    index,
                    action: step.action(),
                    outcome: Some(outcome),
                    error: None,
                },
                Err(e) => {
                    warn!(target: "simulate", index, action = step.action(), error = %e, "Step failed");
                    let error = match e.downcast_ref::<SplitterError>() {
                        Some(splitter_error) => format!("{:?}: {}", splitter_error.kind(), e),
                        None => format!("{:#}", e),
                    };
                    StepReport {
                        index,
                        action: step.action(),
                        outcome: None,
                        error: Some(error),
                    }
                }
            };
            let failed = !report.is_ok();
            steps.push(report);
            if failed && fail_fast {
                break;
            }
        }

        let final_state = self.final_state()?;
        info!(
            target: "simulate",
            steps = steps.len(),
            settlements = final_state.statistics.settlements,
            "Scenario complete"
        );
        Ok(SimulationReport { steps, final_state })
    }

    pub fn final_state(&self) -> Result<FinalState> {
        let price = self
            .vault
            .price_per_share()
            .context("Vault price unavailable")?;
        let balances = self
            .ledger
            .balances()
            .iter()
            .map(|(address, balance)| (*address, *balance))
            .collect();

        Ok(FinalState {
            asset: self.vault.asset(),
            epoch: self.splitter.current_epoch()?,
            pending_shares: self.splitter.pending_shares()?,
            estimated_pending_assets: self.splitter.estimated_pending_assets(price)?,
            current_policy: self.splitter.current_policy()?,
            next_policy: self.splitter.next_policy()?,
            statistics: self.splitter.statistics()?,
            records: self.splitter.records()?,
            balances,
            vault_idle_assets: self.vault.idle_assets(),
        })
    }
}
