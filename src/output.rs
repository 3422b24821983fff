use crate::preview::{MergePreview, TransferPreview};
use crate::wallet::{Amount, WalletId};

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Serialize)]
struct MergePreviewRecord<'a> {
    #[serde(rename = "source")]
    source_wallet_id: WalletId,

    #[serde(rename = "target")]
    destination_wallet_id: WalletId,

    #[serde(rename = "currency")]
    final_currency: &'a str,

    source_balance: Amount,
    target_balance: Amount,
    new_balance: Amount,

    #[serde(rename = "transactions")]
    total_transaction_count: u64,

    rate: Decimal,

    #[serde(rename = "annotation")]
    rate_annotation: &'a str,
}

impl<'a> MergePreviewRecord<'a> {
    fn new(preview: &'a MergePreview) -> Self {
        Self {
            source_wallet_id: preview.source_wallet_id,
            destination_wallet_id: preview.destination_wallet_id,
            final_currency: preview.final_currency.code(),
            source_balance: preview.source_balance,
            target_balance: preview.destination_balance,
            new_balance: preview.new_balance,
            total_transaction_count: preview.total_transaction_count,
            rate: preview.rate_used,
            rate_annotation: &preview.rate_annotation,
        }
    }
}

#[derive(Serialize)]
struct TransferPreviewRecord<'a> {
    #[serde(rename = "source")]
    source_wallet_id: WalletId,

    #[serde(rename = "target")]
    destination_wallet_id: WalletId,

    amount: Amount,
    converted_amount: Amount,
    rate: Decimal,

    #[serde(rename = "annotation")]
    rate_annotation: &'a str,

    source_before: Amount,
    source_after: Amount,
    target_before: Amount,
    target_after: Amount,
}

impl<'a> TransferPreviewRecord<'a> {
    fn new(preview: &'a TransferPreview) -> Self {
        Self {
            source_wallet_id: preview.source_wallet_id,
            destination_wallet_id: preview.destination_wallet_id,
            amount: preview.amount,
            converted_amount: preview.converted_amount,
            rate: preview.rate_used,
            rate_annotation: &preview.rate_annotation,
            source_before: preview.source_before,
            source_after: preview.source_after,
            target_before: preview.destination_before,
            target_after: preview.destination_after,
        }
    }
}

// Writes a merge preview, as a single CSV record, to the given stream.
pub fn write_merge_preview(
    output_stream: impl std::io::Write,
    preview: &MergePreview,
) -> Result<(), std::io::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);
    writer.serialize(MergePreviewRecord::new(preview))?;
    writer.flush()
}

pub fn write_transfer_preview(
    output_stream: impl std::io::Write,
    preview: &TransferPreview,
) -> Result<(), std::io::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);
    writer.serialize(TransferPreviewRecord::new(preview))?;
    writer.flush()
}
