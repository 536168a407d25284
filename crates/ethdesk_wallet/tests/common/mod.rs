#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use ethdesk_core::KeystorePassword;
use ethdesk_wallet::{
    ChainClient, Contract, Deployment, KeystoreDir, MemoryStore, ServiceOptions, TransferReceipt,
    WalletError, WalletService,
};
use parking_lot::Mutex;
use tempfile::TempDir;

pub const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const RECIPIENT: &str = "0x00000000000000000000000000000000000000b0";

/// Chain client that records every call instead of touching a node.
#[derive(Default)]
pub struct MockChain {
    pub balance_calls: AtomicUsize,
    pub transfers: Mutex<Vec<(Address, Address, U256)>>,
    pub deploys: AtomicUsize,
    pub balance_wei: U256,
    pub fail_writes: bool,
    pub delay: Option<Duration>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every call that would have gone to the network.
    pub fn network_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
            + self.transfers.lock().len()
            + self.deploys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn balance_wei(&self, _address: Address) -> Result<U256, WalletError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.balance_wei)
    }

    async fn transfer(
        &self,
        sender: &PrivateKeySigner,
        to: Address,
        amount_wei: U256,
    ) -> Result<TransferReceipt, WalletError> {
        self.transfers.lock().push((sender.address(), to, amount_wei));
        if self.fail_writes {
            return Err(WalletError::Transaction("insufficient funds for gas * price + value".into()));
        }
        Ok(TransferReceipt {
            tx_hash: format!("0x{:064x}", 1),
            block_number: Some(42),
            gas_used: 21_000,
        })
    }

    async fn deploy_greeter(
        &self,
        sender: &PrivateKeySigner,
        _greeting: &str,
    ) -> Result<Deployment, WalletError> {
        let n = self.deploys.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_writes {
            return Err(WalletError::Transaction("execution reverted".into()));
        }
        Ok(Deployment {
            tx_hash: format!("0x{:064x}", n),
            contract: Contract {
                address: format!("0x{:040x}", n),
                balance: "0".into(),
                owner: sender.address().to_string(),
            },
        })
    }
}

pub struct Fixture {
    pub tmp: TempDir,
    pub chain: Arc<MockChain>,
    pub store: Arc<MemoryStore>,
    pub service: Arc<WalletService>,
}

impl Fixture {
    pub fn keystore(&self) -> &KeystoreDir {
        self.service.keystore()
    }
}

pub fn fixture() -> Fixture {
    fixture_with(MockChain::new(), ServiceOptions::default())
}

pub fn fixture_with(chain: MockChain, options: ServiceOptions) -> Fixture {
    let tmp = tempfile::tempdir().expect("tempdir");
    let keystore = KeystoreDir::new(tmp.path().join("wallets"), KeystorePassword::new("test-password"));
    let chain = Arc::new(chain);
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(WalletService::new(
        keystore,
        chain.clone(),
        store.clone(),
        options,
    ));
    Fixture {
        tmp,
        chain,
        store,
        service,
    }
}
