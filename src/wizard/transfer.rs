use super::commit::{SelectionSink, TransferCommit, TransferCommitter};
use super::{pair_with, reselect, unavailable, Direction, OperationKind, Outcome, Pairing, ValidationError, Wizard, WizardError, WizardStep};
use crate::config::EngineConfig;
use crate::currency::Currency;
use crate::preview::{transfer_preview, TransferPreview};
use crate::wallet::{Amount, Wallet, WalletDirectory, WalletId};

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub pairing: Pairing,

    /// In the source currency, already rounded to its precision.
    pub amount: Amount,
}

impl TransferRequest {
    pub fn source_wallet_id(&self) -> WalletId {
        self.pairing.source().id
    }

    pub fn target_wallet_id(&self) -> WalletId {
        self.pairing.destination().id
    }

    pub fn source_currency(&self) -> &Currency {
        &self.pairing.source().currency
    }

    pub fn target_currency(&self) -> &Currency {
        &self.pairing.destination().currency
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferStep {
    SelectDirectionAndTarget {
        direction: Direction,
        target: Option<WalletId>,
    },

    /// `problem` is what's wrong with the amount typed so far, if anything.
    EnterAmount {
        pairing: Pairing,
        amount: Option<Amount>,
        problem: Option<ValidationError>,
    },

    Preview {
        request: TransferRequest,
    },

    Agree {
        request: TransferRequest,
        acknowledged: bool,
    },

    /// Transfers have no progress indicator, so `outcome` never lingers here.
    Commit {
        request: TransferRequest,
        preview: TransferPreview,
        outcome: Option<Outcome>,
    },

    /// Neither wallet is gone, so the host gets a wallet to select.
    Done {
        selected: WalletId,
    },
}

impl TransferStep {
    pub fn name(&self) -> &'static str {
        match self {
            TransferStep::SelectDirectionAndTarget { .. } => "direction and target selection",
            TransferStep::EnterAmount { .. } => "amount entry",
            TransferStep::Preview { .. } => "preview",
            TransferStep::Agree { .. } => "agreement",
            TransferStep::Commit { .. } => "commit",
            TransferStep::Done { .. } => "done",
        }
    }
}

// The balance check is done in the source currency, before any conversion.
pub(crate) fn check_amount(source: &Wallet, amount: Amount) -> Option<ValidationError> {
    if amount <= Amount::ZERO {
        return Some(ValidationError::AmountNotPositive);
    }

    if amount > source.balance {
        return Some(ValidationError::InsufficientFunds {
            requested: amount,
            available: source.balance,
            currency: source.currency.clone(),
        });
    }

    None
}

impl WizardStep for TransferStep {
    const KIND: OperationKind = OperationKind::Transfer;

    type Request = TransferRequest;
    type Preview = TransferPreview;
    type Commit = TransferCommit;

    fn name(&self) -> &'static str {
        TransferStep::name(self)
    }

    fn selection(direction: Direction, target: Option<WalletId>) -> Self {
        TransferStep::SelectDirectionAndTarget { direction, target }
    }

    fn selection_mut(&mut self) -> Option<(&mut Direction, &mut Option<WalletId>)> {
        match self {
            TransferStep::SelectDirectionAndTarget { direction, target } => Some((direction, target)),
            _ => None,
        }
    }

    fn agreement(request: TransferRequest, acknowledged: bool) -> Self {
        TransferStep::Agree {
            request,
            acknowledged,
        }
    }

    fn agreed(&self) -> Option<(&TransferRequest, bool)> {
        match self {
            TransferStep::Agree {
                request,
                acknowledged,
            } => Some((request, *acknowledged)),
            _ => None,
        }
    }

    fn acknowledgment_mut(&mut self) -> Option<&mut bool> {
        match self {
            TransferStep::Agree { acknowledged, .. } => Some(acknowledged),
            _ => None,
        }
    }

    fn in_flight(request: TransferRequest, preview: TransferPreview, outcome: Option<Outcome>) -> Self {
        TransferStep::Commit {
            request,
            preview,
            outcome,
        }
    }

    fn commit_in_flight(&self) -> Option<(&TransferRequest, &TransferPreview, Option<&Outcome>)> {
        match self {
            TransferStep::Commit {
                request,
                preview,
                outcome,
            } => Some((request, preview, outcome.as_ref())),
            _ => None,
        }
    }

    fn pairing(request: &TransferRequest) -> &Pairing {
        &request.pairing
    }

    fn project(config: &EngineConfig, request: &TransferRequest) -> Result<TransferPreview, WizardError> {
        Ok(transfer_preview(
            &request.pairing.wallets,
            request.amount,
            &config.converter(),
        )?)
    }

    fn payload(request: &TransferRequest, preview: &TransferPreview) -> TransferCommit {
        TransferCommit {
            mode: request.pairing.direction,
            source_wallet_id: request.source_wallet_id(),
            target_wallet_id: request.target_wallet_id(),
            amount: request.amount,
            source_currency: request.source_currency().clone(),
            target_currency: request.target_currency().clone(),
            rate_used: preview.rate_used,
            converted_amount: preview.converted_amount,
        }
    }

    fn pacing(_: &EngineConfig) -> Duration {
        Duration::ZERO
    }

    /// The host keeps showing the other side of the transfer: the
    /// destination when the current wallet sent the money, the source when
    /// it received it.
    fn committed(
        directory: &mut WalletDirectory,
        request: TransferRequest,
        preview: TransferPreview,
    ) -> (Self, Option<WalletId>) {
        log::info!(
            "transferred {} {} from wallet {} to wallet {}",
            preview.amount,
            request.source_currency(),
            preview.source_wallet_id,
            preview.destination_wallet_id
        );

        // Already committed on the persistence side, whatever the snapshot says.
        if let Err(err) = directory.apply_transfer(&preview) {
            log::error!(
                "transfer from wallet {} left the wallet list stale: {}",
                preview.source_wallet_id,
                err
            );
        }

        let selected = match request.pairing.direction {
            Direction::CurrentIntoOther => request.target_wallet_id(),
            Direction::OtherIntoCurrent => request.source_wallet_id(),
        };
        (TransferStep::Done { selected }, Some(selected))
    }
}

/// Moves part of a wallet's balance to another wallet. Both wallets survive.
pub type TransferWizard = Wizard<TransferStep>;

impl Wizard<TransferStep> {
    /// Record the amount typed so far. An invalid amount is kept, with the
    /// problem next to it; it only blocks `next`.
    pub fn enter_amount(&mut self, amount: Amount) -> Result<(), WizardError> {
        match &mut self.step {
            TransferStep::EnterAmount {
                pairing,
                amount: entered,
                problem,
            } => {
                let source = pairing.source();
                let amount = self.config.rounding.round(amount, &source.currency);
                *problem = check_amount(source, amount);
                *entered = Some(amount);
                Ok(())
            }
            step => Err(unavailable("enter_amount", &*step)),
        }
    }

    pub fn clear_amount(&mut self) -> Result<(), WizardError> {
        match &mut self.step {
            TransferStep::EnterAmount {
                amount, problem, ..
            } => {
                *amount = None;
                *problem = None;
                Ok(())
            }
            step => Err(unavailable("clear_amount", &*step)),
        }
    }

    pub fn next(&mut self) -> Result<(), WizardError> {
        let next = match &self.step {
            TransferStep::SelectDirectionAndTarget { direction, target } => {
                TransferStep::EnterAmount {
                    pairing: pair_with(&self.directory, self.current, *direction, *target)?,
                    amount: None,
                    problem: None,
                }
            }
            TransferStep::EnterAmount {
                pairing,
                amount,
                problem,
            } => {
                let amount = amount.ok_or(ValidationError::AmountMissing)?;
                if let Some(problem) = problem {
                    return Err(problem.clone().into());
                }

                let request = TransferRequest {
                    pairing: pairing.clone(),
                    amount,
                };
                TransferStep::project(&self.config, &request)?;
                TransferStep::Preview { request }
            }
            TransferStep::Preview { request } => TransferStep::Agree {
                request: request.clone(),
                acknowledged: false,
            },
            step => return Err(unavailable("next", step)),
        };

        self.transition(next);
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        let previous = match &self.step {
            TransferStep::EnterAmount { pairing, .. } => reselect(pairing),
            TransferStep::Preview { request } => TransferStep::EnterAmount {
                pairing: request.pairing.clone(),
                amount: Some(request.amount),
                problem: None,
            },
            TransferStep::Agree { request, .. } => TransferStep::Preview {
                request: request.clone(),
            },
            step => return Err(unavailable("back", step)),
        };

        self.transition(previous);
        Ok(())
    }

    /// Both legs, before and after, as soon as a valid amount is entered.
    pub fn preview(&self) -> Result<Option<TransferPreview>, WizardError> {
        let request = match &self.step {
            TransferStep::EnterAmount {
                pairing,
                amount: Some(amount),
                problem: None,
            } => TransferRequest {
                pairing: pairing.clone(),
                amount: *amount,
            },
            TransferStep::Preview { request }
            | TransferStep::Agree { request, .. }
            | TransferStep::Commit { request, .. } => request.clone(),
            _ => return Ok(None),
        };

        TransferStep::project(&self.config, &request).map(Some)
    }

    pub async fn finalize(
        &mut self,
        committer: &dyn TransferCommitter,
        selection: &dyn SelectionSink,
    ) -> Result<(), WizardError> {
        self.finalize_with(|commit| committer.commit_transfer(commit), selection)
            .await
    }
}

#[cfg(test)]
mod transfer_tests {
    use super::{TransferStep, TransferWizard};
    use crate::config::EngineConfig;
    use crate::currency::Currency;
    use crate::wallet::{Wallet, WalletDirectory, WalletId};
    use crate::wizard::{
        CommitError, Direction, OperationKind, Settlement, ValidationError, WizardError, WizardStep,
    };
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn wizard(current: WalletId) -> TransferWizard {
        let directory = WalletDirectory::new(
            vec![
                Wallet::new(1, "Checking", "USD", dec!(250), 12),
                Wallet::new(2, "Savings", "USD", dec!(1000), 3),
                Wallet::new(3, "Hanoi", "VND", dec!(500000), 8).shared(),
            ],
            vec![],
        );
        TransferWizard::new(Arc::new(EngineConfig::default()), directory, current)
            .expect("current wallet exists")
    }

    fn to_amount_entry(wizard: &mut TransferWizard, direction: Direction, target: WalletId) {
        wizard.choose_direction(direction).expect("choose direction");
        wizard.choose_target(target).expect("choose target");
        wizard.next().expect("leave selection");
    }

    #[test]
    fn test_amount_guard() {
        let mut wizard = wizard(1);
        to_amount_entry(&mut wizard, Direction::CurrentIntoOther, 2);

        assert_eq!(
            Err(WizardError::Invalid(ValidationError::AmountMissing)),
            wizard.next()
        );

        for (amount, want_err) in vec![
            (dec!(0), ValidationError::AmountNotPositive),
            (dec!(-5), ValidationError::AmountNotPositive),
            // Rounds to 0.00 at USD precision.
            (dec!(0.004), ValidationError::AmountNotPositive),
            (
                dec!(250.01),
                ValidationError::InsufficientFunds {
                    requested: dec!(250.01),
                    available: dec!(250),
                    currency: Currency::new("USD"),
                },
            ),
        ] {
            wizard.enter_amount(amount).expect("amount is recorded");
            match wizard.step() {
                TransferStep::EnterAmount { problem, .. } => {
                    assert_eq!(Some(&want_err), problem.as_ref())
                }
                step => panic!("unexpected step: {}", step.name()),
            }
            assert_eq!(Err(WizardError::Invalid(want_err)), wizard.next());
            assert_eq!(None, wizard.preview().expect("no preview for an invalid amount"));
        }

        wizard.enter_amount(dec!(250)).expect("amount is recorded");
        wizard.next().expect("the whole balance can be transferred");
        assert!(matches!(wizard.step(), TransferStep::Preview { .. }));
    }

    #[test]
    fn test_balance_check_uses_the_source_wallet() {
        // Receiving from the savings wallet: its balance is the limit.
        let mut wizard = wizard(1);
        to_amount_entry(&mut wizard, Direction::OtherIntoCurrent, 2);

        wizard.enter_amount(dec!(900)).expect("amount is recorded");
        wizard.next().expect("savings can cover it");

        let preview = wizard
            .preview()
            .expect("preview computes")
            .expect("preview available");
        assert_eq!(2, preview.source_wallet_id);
        assert_eq!(dec!(100), preview.source_after);
        assert_eq!(dec!(1150), preview.destination_after);
    }

    #[test]
    fn test_amount_is_rounded_to_source_precision() {
        let mut wizard = wizard(3);
        to_amount_entry(&mut wizard, Direction::CurrentIntoOther, 1);

        wizard.enter_amount(dec!(24350.5)).expect("amount is recorded");
        match wizard.step() {
            TransferStep::EnterAmount { amount, .. } => assert_eq!(Some(dec!(24351)), *amount),
            step => panic!("unexpected step: {}", step.name()),
        }

        wizard.clear_amount().expect("clear amount");
        wizard.enter_amount(dec!(24350)).expect("amount is recorded");
        let preview = wizard
            .preview()
            .expect("preview computes")
            .expect("preview available");
        assert_eq!(dec!(1), preview.converted_amount);
        assert_eq!(dec!(475650), preview.source_after);
        assert_eq!(dec!(251), preview.destination_after);
        assert_eq!("1 VND = 0.00004106776181 USD", preview.rate_annotation);
    }

    #[test]
    fn test_back_keeps_the_amount() {
        let mut wizard = wizard(1);
        to_amount_entry(&mut wizard, Direction::CurrentIntoOther, 3);
        wizard.enter_amount(dec!(10)).expect("amount is recorded");
        wizard.next().expect("leave amount entry");
        wizard.next().expect("leave preview");

        wizard.back().expect("back to preview");
        wizard.back().expect("back to amount entry");
        match wizard.step() {
            TransferStep::EnterAmount {
                amount, problem, ..
            } => {
                assert_eq!(Some(dec!(10)), *amount);
                assert_eq!(None, *problem);
            }
            step => panic!("unexpected step: {}", step.name()),
        }

        wizard.back().expect("back to selection");
        assert_eq!(
            &TransferStep::SelectDirectionAndTarget {
                direction: Direction::CurrentIntoOther,
                target: Some(3),
            },
            wizard.step()
        );
    }

    #[test]
    fn test_commit_lifecycle() {
        let mut wizard = wizard(1);
        to_amount_entry(&mut wizard, Direction::CurrentIntoOther, 3);
        wizard.enter_amount(dec!(10)).expect("amount is recorded");
        wizard.next().expect("leave amount entry");
        wizard.next().expect("leave preview");

        assert_eq!(
            Err(WizardError::Invalid(ValidationError::NotAcknowledged)),
            wizard.dispatch().map(|_| ())
        );
        wizard.acknowledge(true).expect("acknowledge");

        let commit = wizard.dispatch().expect("dispatch");
        assert_eq!(Direction::CurrentIntoOther, commit.mode);
        assert_eq!(1, commit.source_wallet_id);
        assert_eq!(3, commit.target_wallet_id);
        assert_eq!(dec!(10), commit.amount);
        assert_eq!(Currency::new("USD"), commit.source_currency);
        assert_eq!(Currency::new("VND"), commit.target_currency);
        assert_eq!(dec!(24350), commit.rate_used);
        assert_eq!(dec!(243500), commit.converted_amount);

        let locked = Err(WizardError::CommitInFlight(OperationKind::Transfer));
        assert_eq!(locked, wizard.back());
        assert_eq!(locked, wizard.next());

        let err = CommitError("timeout".to_string());
        assert_eq!(Err(WizardError::Commit(err.clone())), wizard.resolve(Err(err)));
        assert!(matches!(
            wizard.step(),
            TransferStep::Agree {
                acknowledged: true,
                ..
            }
        ));
        assert_eq!(dec!(250), wizard.directory().wallet(1).expect("wallet 1").balance);

        assert_eq!(commit, wizard.dispatch().expect("dispatch again"));
        assert_eq!(Ok(Settlement::Done(Some(3))), wizard.resolve(Ok(())));
        assert_eq!(&TransferStep::Done { selected: 3 }, wizard.step());
        assert_eq!(dec!(240), wizard.directory().wallet(1).expect("wallet 1").balance);
        assert_eq!(dec!(743500), wizard.directory().wallet(3).expect("wallet 3").balance);
    }

    #[test]
    fn test_selection_after_commit_follows_direction() {
        for (direction, want) in vec![
            (Direction::CurrentIntoOther, 2),
            (Direction::OtherIntoCurrent, 2),
        ] {
            let mut wizard = wizard(1);
            to_amount_entry(&mut wizard, direction, 2);
            wizard.enter_amount(dec!(1)).expect("amount is recorded");
            wizard.next().expect("leave amount entry");
            wizard.next().expect("leave preview");
            wizard.acknowledge(true).expect("acknowledge");
            wizard.dispatch().expect("dispatch");

            assert_eq!(Ok(Settlement::Done(Some(want))), wizard.resolve(Ok(())));
        }
    }

    #[test]
    fn test_committed_transfer_survives_a_stale_directory() {
        let mut wizard = wizard(1);
        to_amount_entry(&mut wizard, Direction::OtherIntoCurrent, 2);
        wizard.enter_amount(dec!(5)).expect("amount is recorded");
        wizard.next().expect("leave amount entry");
        wizard.next().expect("leave preview");
        wizard.acknowledge(true).expect("acknowledge");
        wizard.dispatch().expect("dispatch");
        assert_eq!(Some(100), wizard.progress(std::time::Duration::ZERO));

        let (request, preview) = match wizard.step() {
            TransferStep::Commit {
                request, preview, ..
            } => (request.clone(), preview.clone()),
            step => panic!("unexpected step: {}", step.name()),
        };

        let mut stale = WalletDirectory::default();
        let (step, selected) = TransferStep::committed(&mut stale, request, preview);
        assert_eq!(TransferStep::Done { selected: 2 }, step);
        assert_eq!(Some(2), selected);
    }
}
