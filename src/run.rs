//! Command line adapter: reads wallets from CSV and prints the preview of a
//! merge or a transfer.

use crate::config::EngineConfig;
use crate::currency::{ConversionError, RateError, RateTable};
use crate::input;
use crate::output::{write_merge_preview, write_transfer_preview};
use crate::preview::{merge_preview, transfer_preview, CurrencyMode};
use crate::wallet::{Amount, WalletDirectory, WalletId};
use crate::wizard::transfer::check_amount;
use crate::wizard::{pair_with, Direction, ValidationError};

use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str = "usage: wallet_engine <wallets.csv> [--rates <rates.csv>] \
merge <source> <target> [keep-source|keep-target] | \
transfer <source> <target> <amount>";

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}\n{}", USAGE)]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Input(#[from] input::Error),

    #[error(transparent)]
    Rates(#[from] RateError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Merge {
        source: WalletId,
        target: WalletId,
        mode: Option<CurrencyMode>,
    },
    Transfer {
        source: WalletId,
        target: WalletId,
        amount: Amount,
    },
}

#[derive(Debug, PartialEq)]
pub struct Args {
    pub wallets: PathBuf,
    pub rates: Option<PathBuf>,
    pub command: Command,
}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, Error> {
        let mut rates = None;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--rates" {
                let path = args
                    .next()
                    .ok_or_else(|| Error::Usage("--rates needs a file".to_string()))?;
                rates = Some(PathBuf::from(path));
            } else {
                positional.push(arg);
            }
        }

        let (wallets, command) = match positional.as_slice() {
            [wallets, command, rest @ ..] => (PathBuf::from(wallets), parse_command(command, rest)?),
            _ => return Err(Error::Usage("missing arguments".to_string())),
        };

        Ok(Self {
            wallets,
            rates,
            command,
        })
    }

    /// The default configuration, with the rate table replaced when a rates
    /// file was given.
    pub fn config(&self) -> Result<EngineConfig, Error> {
        let config = EngineConfig::default();
        match &self.rates {
            Some(path) => {
                let rates = RateTable::from_csv(std::fs::File::open(path)?)?;
                Ok(config.with_rates(rates))
            }
            None => Ok(config),
        }
    }
}

fn parse_command(command: &str, args: &[String]) -> Result<Command, Error> {
    match (command, args) {
        ("merge", [source, target]) => Ok(Command::Merge {
            source: parse_id(source)?,
            target: parse_id(target)?,
            mode: None,
        }),
        ("merge", [source, target, mode]) => Ok(Command::Merge {
            source: parse_id(source)?,
            target: parse_id(target)?,
            mode: Some(parse_mode(mode)?),
        }),
        ("transfer", [source, target, amount]) => Ok(Command::Transfer {
            source: parse_id(source)?,
            target: parse_id(target)?,
            amount: amount
                .parse()
                .map_err(|_| Error::Usage(format!("invalid amount: {}", amount)))?,
        }),
        _ => Err(Error::Usage(format!("unknown command: {}", command))),
    }
}

fn parse_id(raw: &str) -> Result<WalletId, Error> {
    raw.parse()
        .map_err(|_| Error::Usage(format!("invalid wallet id: {}", raw)))
}

fn parse_mode(raw: &str) -> Result<CurrencyMode, Error> {
    match raw {
        "keep-source" => Ok(CurrencyMode::KeepSource),
        "keep-target" => Ok(CurrencyMode::KeepTarget),
        _ => Err(Error::Usage(format!("invalid currency mode: {}", raw))),
    }
}

/// Read the wallets, compute the preview of the command, and write it as CSV.
pub fn run(
    wallets: impl std::io::Read,
    config: &EngineConfig,
    command: &Command,
    output: impl std::io::Write,
) -> Result<(), Error> {
    let directory = WalletDirectory::new(input::read_wallets(wallets)?, Vec::new());
    let converter = config.converter();

    match command {
        Command::Merge {
            source,
            target,
            mode,
        } => {
            let pairing = pair_with(&directory, *source, Direction::CurrentIntoOther, Some(*target))?;
            let mode = match mode {
                Some(mode) => *mode,
                None if pairing.wallets.same_currency() => CurrencyMode::KeepTarget,
                None => return Err(ValidationError::CurrencyModeMissing.into()),
            };

            let preview = merge_preview(&pairing.wallets, mode, &converter)?;
            write_merge_preview(output, &preview)?;
        }
        Command::Transfer {
            source,
            target,
            amount,
        } => {
            let pairing = pair_with(&directory, *source, Direction::CurrentIntoOther, Some(*target))?;
            let amount = config.rounding.round(*amount, &pairing.source().currency);
            if let Some(problem) = check_amount(pairing.source(), amount) {
                return Err(problem.into());
            }

            let preview = transfer_preview(&pairing.wallets, amount, &converter)?;
            write_transfer_preview(output, &preview)?;
        }
    }

    Ok(())
}
