//! What the wizards hand over to the host once the user has agreed: commit
//! payloads, the asynchronous persistence collaborators, and the selection
//! callback.

use super::{DefaultReassignment, Direction};
use crate::currency::Currency;
use crate::preview::CurrencyMode;
use crate::wallet::{Amount, CategoryId, WalletId};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// The persistence side refused the operation.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("commit rejected: {0}")]
pub struct CommitError(pub String);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCommit {
    pub mode: Direction,
    pub source_wallet_id: WalletId,
    pub target_wallet_id: WalletId,
    pub currency_mode: CurrencyMode,
    pub category_id: CategoryId,
    pub default_reassignment: Option<DefaultReassignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCommit {
    pub mode: Direction,
    pub source_wallet_id: WalletId,
    pub target_wallet_id: WalletId,
    pub amount: Amount,
    pub source_currency: Currency,
    pub target_currency: Currency,
    pub rate_used: Decimal,
    pub converted_amount: Amount,
}

#[async_trait]
pub trait MergeCommitter: Send + Sync {
    async fn commit_merge(&self, commit: MergeCommit) -> Result<(), CommitError>;
}

#[async_trait]
pub trait TransferCommitter: Send + Sync {
    async fn commit_transfer(&self, commit: TransferCommit) -> Result<(), CommitError>;
}

/// Told which wallet should become the active selection after a commit
/// (`None`: no selection at all).
pub trait SelectionSink: Send + Sync {
    fn select(&self, wallet: Option<WalletId>);
}

impl<F> SelectionSink for F
where
    F: Fn(Option<WalletId>) + Send + Sync,
{
    fn select(&self, wallet: Option<WalletId>) {
        self(wallet)
    }
}
