//! Before/after projections of a merge or a transfer.
//!
//! These are pure functions of their inputs: recomputing a preview with the
//! same wallets, amount and currency mode always gives the same result.

use crate::currency::{ConversionError, Converter, Currency};
use crate::wallet::{Amount, Wallet, WalletId};

use rust_decimal::Decimal;
use serde::Serialize;

/// Which wallet's currency survives a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurrencyMode {
    KeepSource,
    KeepTarget,
}

/// Money (and for merges, transactions) flows from `source` to `destination`.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletPair {
    pub source: Wallet,
    pub destination: Wallet,
}

impl WalletPair {
    pub fn same_currency(&self) -> bool {
        self.source.currency == self.destination.currency
    }

    pub fn final_currency(&self, mode: CurrencyMode) -> &Currency {
        match mode {
            CurrencyMode::KeepSource => &self.source.currency,
            CurrencyMode::KeepTarget => &self.destination.currency,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergePreview {
    pub source_wallet_id: WalletId,
    pub destination_wallet_id: WalletId,
    pub final_currency: Currency,

    /// Both balances, expressed in `final_currency`.
    pub source_balance: Amount,
    pub destination_balance: Amount,

    pub new_balance: Amount,
    pub total_transaction_count: u64,

    // Rate of the leg that actually changes currency (1 when none does).
    pub rate_used: Decimal,
    pub rate_annotation: String,
}

pub fn merge_preview(
    pair: &WalletPair,
    mode: CurrencyMode,
    converter: &Converter<'_>,
) -> Result<MergePreview, ConversionError> {
    let final_currency = pair.final_currency(mode);

    let source = converter.convert(pair.source.balance, &pair.source.currency, final_currency)?;
    let destination = converter.convert(
        pair.destination.balance,
        &pair.destination.currency,
        final_currency,
    )?;

    let new_balance = destination
        .amount
        .checked_add(source.amount)
        .ok_or(ConversionError::BalanceOverflow(pair.destination.id))?;

    let converted_leg = match mode {
        CurrencyMode::KeepTarget => &source,
        CurrencyMode::KeepSource => &destination,
    };

    Ok(MergePreview {
        source_wallet_id: pair.source.id,
        destination_wallet_id: pair.destination.id,
        final_currency: final_currency.clone(),
        source_balance: source.amount,
        destination_balance: destination.amount,
        new_balance,
        total_transaction_count: pair
            .source
            .transaction_count
            .saturating_add(pair.destination.transaction_count),
        rate_used: converted_leg.rate_used,
        rate_annotation: converted_leg.rate_annotation.clone(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferPreview {
    pub source_wallet_id: WalletId,
    pub destination_wallet_id: WalletId,

    /// What leaves the source, in the source currency.
    pub amount: Amount,

    /// What reaches the destination, in the destination currency.
    pub converted_amount: Amount,
    pub rate_used: Decimal,
    pub rate_annotation: String,

    pub source_before: Amount,
    pub source_after: Amount,
    pub destination_before: Amount,
    pub destination_after: Amount,
}

/// Each leg is rounded on its own, in its own currency. Across currencies,
/// this can leave a sub-unit gap between what leaves the source and what the
/// rate says should arrive; nothing tries to balance it.
pub fn transfer_preview(
    pair: &WalletPair,
    amount: Amount,
    converter: &Converter<'_>,
) -> Result<TransferPreview, ConversionError> {
    let (source, destination) = (&pair.source, &pair.destination);
    let rounding = converter.rounding();

    let conversion = converter.convert(amount, &source.currency, &destination.currency)?;

    let source_after = source
        .balance
        .checked_sub(amount)
        .ok_or(ConversionError::BalanceOverflow(source.id))?;
    let destination_after = destination
        .balance
        .checked_add(conversion.amount)
        .ok_or(ConversionError::BalanceOverflow(destination.id))?;

    Ok(TransferPreview {
        source_wallet_id: source.id,
        destination_wallet_id: destination.id,
        amount,
        converted_amount: conversion.amount,
        rate_used: conversion.rate_used,
        rate_annotation: conversion.rate_annotation,
        source_before: source.balance,
        source_after: rounding.round(source_after, &source.currency),
        destination_before: destination.balance,
        destination_after: rounding.round(destination_after, &destination.currency),
    })
}
