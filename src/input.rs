use crate::wallet::{Wallet, WalletId};

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("malformed CSV: {0}")]
    Csv(String),

    #[error("invalid record: {0}")]
    Format(String),
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

// When reading wallets, I'm making the assumption that we want to completely
// abort on errors: a wallet list with holes in it would let the user merge
// into, or transfer to, the wrong wallet.
pub fn read_wallets(input: impl std::io::Read) -> Result<Vec<Wallet>, Error> {
    let mut reader = reader(input);
    let mut seen = HashSet::new();
    let mut wallets = Vec::new();

    for record in reader.deserialize::<WalletRecord>() {
        let wallet = Wallet::try_from(record?).map_err(|err| Error::Format(err.to_string()))?;
        if !seen.insert(wallet.id) {
            return Err(Error::Format(format!("duplicate wallet id {}", wallet.id)));
        }
        wallets.push(wallet);
    }

    log::debug!("read {} wallets", wallets.len());
    Ok(wallets)
}

fn reader<R: std::io::Read>(input: R) -> csv::Reader<std::io::BufReader<R>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(input))
}

// WalletRecord is the CSV shape, Wallet the domain type: the domain type makes
// no assumption on how wallets are formatted, so both stay easy to change.
#[derive(Debug, Deserialize)]
pub struct WalletRecord {
    id: WalletId,
    name: String,
    currency: String,
    balance: Decimal,

    #[serde(rename = "transactions")]
    transaction_count: u64,

    shared: bool,
    default: bool,
}

impl TryFrom<WalletRecord> for Wallet {
    type Error = &'static str;

    fn try_from(record: WalletRecord) -> Result<Self, Self::Error> {
        if record.currency.is_empty() {
            return Err("missing currency");
        }
        if record.name.is_empty() {
            return Err("missing wallet name");
        }

        let mut wallet = Wallet::new(
            record.id,
            &record.name,
            &record.currency,
            record.balance,
            record.transaction_count,
        );
        wallet.is_shared = record.shared;
        wallet.is_default = record.default;

        Ok(wallet)
    }
}
