pub mod address_index;
pub mod chain;
pub mod contract_cache;
pub mod dispatch;
pub mod error;
pub mod greeter;
pub mod keystore;
pub mod kv_store;
pub mod network;
pub mod service;

pub use address_index::{AddressIndex, address_from_file_name, normalize_address};
pub use chain::{ChainClient, Deployment, RpcChainClient, TransferReceipt, display_ether};
pub use contract_cache::{CONTRACTS_KEY, Contract, ContractCache};
pub use dispatch::{WalletDispatcher, WalletOutcome, WalletOutcomes, WalletUpdate, notification_for};
pub use error::{LookupMiss, WalletError};
pub use keystore::{
    KeystoreDir, LoadFailure, LoadReport, StoredWallet, WalletCredentials, WriteAbort,
    keystore_file_name, parse_private_key,
};
pub use kv_store::{KeyValueStore, MemoryStore, PreferencesFile};
pub use network::Network;
pub use service::{
    DeployOutcome, ServiceOptions, SkippedKeystore, TransferOutcome, Wallet, WalletListing,
    WalletService, parse_address, parse_amount,
};
