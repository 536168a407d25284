use std::future::Future;
use std::sync::Arc;

use ethdesk_core::{
    AppNotification, BackgroundService, NotificationType, OutcomeReceiver, TaskHandle, TaskOutcome,
    describe,
};

use crate::contract_cache::Contract;
use crate::error::WalletError;
use crate::service::{DeployOutcome, TransferOutcome, WalletListing, WalletService};

/// What a finished wallet operation hands back to the presentation layer.
#[derive(Debug, Clone)]
pub enum WalletUpdate {
    Wallets(WalletListing),
    Transferred(TransferOutcome),
    Deployed(DeployOutcome),
    Contracts(Vec<Contract>),
    Suggested(Option<String>),
}

pub type WalletOutcome = TaskOutcome<WalletUpdate, WalletError>;
pub type WalletOutcomes = OutcomeReceiver<WalletUpdate, WalletError>;

/// Runs [`WalletService`] operations in the background.
///
/// Each call returns immediately with a [`TaskHandle`]; the result arrives
/// later on the [`WalletOutcomes`] receiver created alongside the dispatcher.
pub struct WalletDispatcher {
    service: Arc<WalletService>,
    tasks: BackgroundService<WalletUpdate, WalletError>,
}

impl WalletDispatcher {
    pub fn new(service: Arc<WalletService>, max_concurrent: usize) -> (Self, WalletOutcomes) {
        let (tasks, outcomes) = BackgroundService::new(max_concurrent);
        (Self { service, tasks }, outcomes)
    }

    pub fn service(&self) -> &Arc<WalletService> {
        &self.service
    }

    pub fn tasks(&self) -> &BackgroundService<WalletUpdate, WalletError> {
        &self.tasks
    }

    pub fn refresh_wallets(&self) -> TaskHandle {
        self.run("refresh wallets", |s| async move {
            s.refresh_wallets().await.map(WalletUpdate::Wallets)
        })
    }

    pub fn generate_wallet(&self) -> TaskHandle {
        self.run("generate wallet", |s| async move {
            s.generate_wallet().await.map(WalletUpdate::Wallets)
        })
    }

    pub fn import_wallet(&self, private_key: String) -> TaskHandle {
        self.run("import wallet", move |s| async move {
            s.import_wallet(&private_key).await.map(WalletUpdate::Wallets)
        })
    }

    pub fn send_transaction(&self, amount: String, from: String, to: String) -> TaskHandle {
        self.run("send funds", move |s| async move {
            s.send_transaction(&amount, &from, &to)
                .await
                .map(WalletUpdate::Transferred)
        })
    }

    pub fn deploy_contract(&self, wallet: String) -> TaskHandle {
        self.run("deploy contract", move |s| async move {
            s.deploy_contract(&wallet).await.map(WalletUpdate::Deployed)
        })
    }

    pub fn list_contracts(&self) -> TaskHandle {
        self.run("list contracts", |s| async move {
            s.list_contracts().await.map(WalletUpdate::Contracts)
        })
    }

    pub fn reset_wallets(&self) -> TaskHandle {
        self.run("reset wallets", |s| async move {
            s.reset_wallets().await.map(WalletUpdate::Wallets)
        })
    }

    pub fn reset_contracts(&self) -> TaskHandle {
        self.run("reset contracts", |s| async move {
            s.reset_contracts().await.map(WalletUpdate::Contracts)
        })
    }

    pub fn suggest_address(&self, current: Option<String>) -> TaskHandle {
        self.run("suggest address", move |s| async move {
            s.suggest_address(current.as_deref())
                .await
                .map(WalletUpdate::Suggested)
        })
    }

    /// Abort everything still in flight; late results are discarded.
    pub fn shutdown(&self) {
        self.tasks.shutdown();
    }

    fn run<F, Fut>(&self, name: &str, op: F) -> TaskHandle
    where
        F: FnOnce(Arc<WalletService>) -> Fut,
        Fut: Future<Output = Result<WalletUpdate, WalletError>> + Send + 'static,
    {
        self.tasks.submit(name, op(Arc::clone(&self.service)))
    }
}

/// Turn a finished operation into the message the user sees.
pub fn notification_for(outcome: &WalletOutcome) -> AppNotification {
    let update = match &outcome.result {
        Ok(update) => update,
        Err(err) => {
            return AppNotification::from_error(&describe(err)).with_title(outcome.name.clone());
        }
    };

    let (kind, message) = match update {
        WalletUpdate::Wallets(listing) if !listing.skipped.is_empty() => (
            NotificationType::Warning,
            format!(
                "{} wallet(s) loaded, {} keystore file(s) skipped",
                listing.wallets.len(),
                listing.skipped.len()
            ),
        ),
        WalletUpdate::Wallets(listing) => (
            NotificationType::Success,
            format!("{} wallet(s) loaded", listing.wallets.len()),
        ),
        WalletUpdate::Transferred(outcome) => (
            NotificationType::Success,
            match outcome.receipt.block_number {
                Some(block) => format!("Funds sent in block {block}: {}", outcome.receipt.tx_hash),
                None => format!("Funds sent: {}", outcome.receipt.tx_hash),
            },
        ),
        WalletUpdate::Deployed(outcome) => (
            NotificationType::Success,
            format!(
                "Contract deployed at {}",
                outcome.deployment.contract.address
            ),
        ),
        WalletUpdate::Contracts(contracts) => (
            NotificationType::Info,
            format!("{} contract(s) cached", contracts.len()),
        ),
        WalletUpdate::Suggested(Some(address)) => (NotificationType::Info, address.clone()),
        WalletUpdate::Suggested(None) => (NotificationType::Info, "No wallets yet".to_string()),
    };
    AppNotification::new(kind, message).with_title(outcome.name.clone())
}
