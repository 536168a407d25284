use std::sync::Arc;

use ethdesk_core::DuplicateContractPolicy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::WalletError;
use crate::kv_store::KeyValueStore;

/// Preference key holding the JSON array of deployed contracts.
pub const CONTRACTS_KEY: &str = "contracts";

/// A deployed contract as recorded right after its deployment was mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub address: String,
    pub balance: String,
    pub owner: String,
}

/// Ordered list of deployed contracts kept under [`CONTRACTS_KEY`].
///
/// The cache is never reconciled with the chain; balances and owners are
/// whatever they were at deployment time.
pub struct ContractCache {
    store: Arc<dyn KeyValueStore>,
    duplicates: DuplicateContractPolicy,
    writes: Mutex<()>,
}

impl ContractCache {
    pub fn new(store: Arc<dyn KeyValueStore>, duplicates: DuplicateContractPolicy) -> Self {
        Self {
            store,
            duplicates,
            writes: Mutex::new(()),
        }
    }

    /// Contracts in insertion order. Absent or blank means empty.
    pub fn load(&self) -> Result<Vec<Contract>, WalletError> {
        let Some(raw) = self.store.get(CONTRACTS_KEY)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            warn!(error = %e, "contract cache does not parse");
            WalletError::CacheCorrupted(e.to_string())
        })
    }

    /// Append one contract and return the full list.
    pub fn append(&self, contract: Contract) -> Result<Vec<Contract>, WalletError> {
        let _guard = self.writes.lock();
        let mut contracts = self.load()?;

        if self.duplicates == DuplicateContractPolicy::Reject
            && contracts
                .iter()
                .any(|c| c.address.eq_ignore_ascii_case(&contract.address))
        {
            return Err(WalletError::DuplicateContract(contract.address));
        }

        info!(address = %contract.address, owner = %contract.owner, "caching contract");
        contracts.push(contract);
        let json = serde_json::to_string(&contracts)
            .map_err(|e| WalletError::Internal(format!("cannot encode contracts: {e}")))?;
        self.store.put(CONTRACTS_KEY, &json)?;
        Ok(contracts)
    }

    /// Drop every cached contract, corrupted or not.
    pub fn clear(&self) -> Result<(), WalletError> {
        let _guard = self.writes.lock();
        self.store.clear(CONTRACTS_KEY)?;
        info!("contract cache cleared");
        Ok(())
    }
}
