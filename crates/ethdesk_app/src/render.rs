use std::fmt::Write as _;

use ethdesk_core::{AppNotification, NotificationType};
use ethdesk_wallet::{Contract, WalletListing, WalletUpdate};

/// Plain-text rendering of a successful update.
pub fn update(update: &WalletUpdate, show_keys: bool) -> String {
    match update {
        WalletUpdate::Wallets(listing) => wallets(listing, show_keys),
        WalletUpdate::Transferred(outcome) => {
            let mut out = String::new();
            let _ = writeln!(out, "tx hash:  {}", outcome.receipt.tx_hash);
            if let Some(block) = outcome.receipt.block_number {
                let _ = writeln!(out, "block:    {block}");
            }
            let _ = writeln!(out, "gas used: {}", outcome.receipt.gas_used);
            out.push('\n');
            out.push_str(&wallets(&outcome.wallets, false));
            out
        }
        WalletUpdate::Deployed(outcome) => {
            let mut out = String::new();
            let _ = writeln!(out, "tx hash:  {}", outcome.deployment.tx_hash);
            out.push('\n');
            out.push_str(&contracts(&outcome.contracts));
            out
        }
        WalletUpdate::Contracts(list) => contracts(list),
        WalletUpdate::Suggested(Some(address)) => format!("{address}\n"),
        WalletUpdate::Suggested(None) => String::new(),
    }
}

pub fn wallets(listing: &WalletListing, show_keys: bool) -> String {
    let mut out = String::new();
    if listing.wallets.is_empty() {
        out.push_str("No wallets.\n");
    }
    for wallet in &listing.wallets {
        let _ = writeln!(out, "{}  {} ETH", wallet.address, wallet.balance);
        if show_keys {
            let _ = writeln!(out, "    key: {}", wallet.private_key_hex);
        }
    }
    for skipped in &listing.skipped {
        let _ = writeln!(out, "skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    out
}

pub fn contracts(list: &[Contract]) -> String {
    if list.is_empty() {
        return "No contracts.\n".to_string();
    }
    let mut out = String::new();
    for contract in list {
        let _ = writeln!(
            out,
            "{}  owner {}  {} ETH",
            contract.address, contract.owner, contract.balance
        );
    }
    out
}

/// One-line status message, `[level] title: message`.
pub fn notification(n: &AppNotification) -> String {
    let level = match n.level {
        NotificationType::Info => "info",
        NotificationType::Success => "ok",
        NotificationType::Warning => "warn",
        NotificationType::Error => "error",
    };
    match &n.title {
        Some(title) => format!("[{level}] {title}: {}", n.message),
        None => format!("[{level}] {}", n.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethdesk_wallet::{SkippedKeystore, Wallet};

    fn listing() -> WalletListing {
        WalletListing {
            wallets: vec![Wallet {
                address: "0x00000000000000000000000000000000000000Aa".into(),
                balance: "1.5".into(),
                private_key_hex: "11".repeat(32),
            }],
            skipped: vec![SkippedKeystore {
                path: "broken.json".into(),
                reason: "DecryptionError".into(),
            }],
        }
    }

    #[test]
    fn wallets_hide_keys_by_default() {
        let text = wallets(&listing(), false);
        assert!(text.contains("1.5 ETH"));
        assert!(!text.contains(&"11".repeat(32)));
        assert!(text.contains("skipped broken.json"));

        assert!(wallets(&listing(), true).contains(&"11".repeat(32)));
    }

    #[test]
    fn empty_lists() {
        assert_eq!(wallets(&WalletListing::default(), false), "No wallets.\n");
        assert_eq!(contracts(&[]), "No contracts.\n");
    }

    #[test]
    fn notification_line() {
        let n = AppNotification::new(NotificationType::Error, "NetworkError: refused")
            .with_title("refresh wallets");
        assert_eq!(notification(&n), "[error] refresh wallets: NetworkError: refused");
    }
}
