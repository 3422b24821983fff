//! Wallets as the engine sees them: a snapshot supplied by the host.
//!
//! Wallet: identity, currency, balance, transaction count and flags.
//! WalletDirectory: the wallets and categories a wizard works on. It is read
//! only, except for the results of a successful commit.

use crate::currency::Currency;
use crate::preview::{MergePreview, TransferPreview};
use crate::wizard::DefaultReassignment;

use thiserror::Error;

// Using named types doesn't provide any compiler help, but it helps a lot with
// readability: `HashMap<WalletId, Wallet>` needs no comment, `HashMap<u32, Wallet>`
// would.
pub type WalletId = u32;
pub type CategoryId = u32;

// Money is never a float.
pub type Amount = rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub id: WalletId,
    pub name: String,
    pub currency: Currency,
    pub balance: Amount,
    pub transaction_count: u64,

    /// Group wallet, as opposed to a personal one.
    pub is_shared: bool,

    /// The implicit choice for its currency elsewhere in the application.
    pub is_default: bool,
}

impl Wallet {
    pub fn new(
        id: WalletId,
        name: &str,
        currency: &str,
        balance: Amount,
        transaction_count: u64,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            currency: Currency::new(currency),
            balance,
            transaction_count,
            is_shared: false,
            is_default: false,
        }
    }

    pub fn shared(mut self) -> Self {
        self.is_shared = true;
        self
    }

    pub fn default_wallet(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Category used to tag the transaction that records a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(id: CategoryId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DirectoryError {
    #[error("wallet {0} is not in the directory")]
    UnknownWallet(WalletId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletDirectory {
    wallets: Vec<Wallet>,
    categories: Vec<Category>,
}

impl WalletDirectory {
    pub fn new(wallets: Vec<Wallet>, categories: Vec<Category>) -> Self {
        Self {
            wallets,
            categories,
        }
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn wallet(&self, id: WalletId) -> Option<&Wallet> {
        self.wallets.iter().find(|wallet| wallet.id == id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    /// Every wallet an operation on `current` can pair it with.
    pub fn candidates(&self, current: WalletId) -> impl Iterator<Item = &Wallet> {
        self.wallets.iter().filter(move |wallet| wallet.id != current)
    }

    fn wallet_mut(&mut self, id: WalletId) -> Result<&mut Wallet, DirectoryError> {
        self.wallets
            .iter_mut()
            .find(|wallet| wallet.id == id)
            .ok_or(DirectoryError::UnknownWallet(id))
    }

    /// Record a committed merge: the source wallet disappears, the
    /// destination takes the merged currency, balance and transactions.
    pub(crate) fn apply_merge(
        &mut self,
        preview: &MergePreview,
        default_reassignment: Option<DefaultReassignment>,
    ) -> Result<(), DirectoryError> {
        if self.wallet(preview.source_wallet_id).is_none() {
            return Err(DirectoryError::UnknownWallet(preview.source_wallet_id));
        }

        let destination = self.wallet_mut(preview.destination_wallet_id)?;
        destination.currency = preview.final_currency.clone();
        destination.balance = preview.new_balance;
        destination.transaction_count = preview.total_transaction_count;
        if default_reassignment == Some(DefaultReassignment::MakeTargetDefault) {
            destination.is_default = true;
        }

        self.wallets
            .retain(|wallet| wallet.id != preview.source_wallet_id);
        Ok(())
    }

    /// Record a committed transfer on both wallets.
    pub(crate) fn apply_transfer(&mut self, preview: &TransferPreview) -> Result<(), DirectoryError> {
        if self.wallet(preview.destination_wallet_id).is_none() {
            return Err(DirectoryError::UnknownWallet(preview.destination_wallet_id));
        }

        self.wallet_mut(preview.source_wallet_id)?.balance = preview.source_after;
        self.wallet_mut(preview.destination_wallet_id)?.balance = preview.destination_after;
        Ok(())
    }
}
