//! Wallet consolidation and transfer engine.
//!
//! Previews, then commits, two operations on a user's wallets:
//! - a merge, which folds a wallet (balance and transaction history) into
//!   another one and deletes it, possibly across currencies;
//! - a transfer, which moves part of a balance from one wallet to another,
//!   possibly across currencies.
//!
//! Both are multi-step wizards (see `wizard`), built on a static rate table,
//! a per-currency rounding policy and a pure preview builder.

pub mod config;
pub mod currency;
pub mod input;
pub mod output;
pub mod preview;
pub mod run;
pub mod wallet;
pub mod wizard;

pub use config::EngineConfig;
pub use currency::{ConversionResult, Converter, Currency};
pub use preview::{CurrencyMode, MergePreview, TransferPreview, WalletPair};
pub use wallet::{Amount, Category, CategoryId, Wallet, WalletDirectory, WalletId};
pub use wizard::{
    Direction, MergeWizard, Settlement, TransferWizard, ValidationError, Wizard, WizardError,
};
