//! The merge and transfer wizards.
//!
//! Both are enum-driven state machines: the current step is a single value
//! carrying only the data valid for that step, and every user action is a
//! method that either moves to another step or leaves the wizard untouched
//! and returns an error.
//!
//! `Wizard` is the shared driver. It owns the direction and target
//! selection, the agreement, and the two-phase commit (`dispatch`, then
//! `resolve`), and locks the wizard while a commit is in flight. Each
//! operation plugs its own steps in through `WizardStep`.

pub mod commit;
pub mod merge;
pub mod transfer;

pub use commit::{CommitError, MergeCommit, MergeCommitter, SelectionSink, TransferCommit, TransferCommitter};
pub use merge::{DefaultReassignment, MergePlan, MergeRequest, MergeStep, MergeWizard};
pub use transfer::{TransferRequest, TransferStep, TransferWizard};

use crate::config::EngineConfig;
use crate::currency::{ConversionError, Currency};
use crate::preview::WalletPair;
use crate::wallet::{Amount, CategoryId, Wallet, WalletDirectory, WalletId};

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Merge,
    Transfer,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Merge => f.write_str("merge"),
            OperationKind::Transfer => f.write_str("transfer"),
        }
    }
}

/// Which way money flows, relative to the wallet the user is looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    CurrentIntoOther,
    OtherIntoCurrent,
}

/// The current wallet and the one picked by the user, oriented by direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Pairing {
    pub direction: Direction,
    pub wallets: WalletPair,
}

impl Pairing {
    pub fn new(direction: Direction, current: Wallet, other: Wallet) -> Self {
        let wallets = match direction {
            Direction::CurrentIntoOther => WalletPair {
                source: current,
                destination: other,
            },
            Direction::OtherIntoCurrent => WalletPair {
                source: other,
                destination: current,
            },
        };

        Self { direction, wallets }
    }

    pub fn source(&self) -> &Wallet {
        &self.wallets.source
    }

    pub fn destination(&self) -> &Wallet {
        &self.wallets.destination
    }

    /// The wallet that was picked as target, i.e. not the current one.
    pub fn other(&self) -> &Wallet {
        match self.direction {
            Direction::CurrentIntoOther => &self.wallets.destination,
            Direction::OtherIntoCurrent => &self.wallets.source,
        }
    }
}

/// Input problems. They block the step they happen in, and are meant to be
/// shown next to the field that caused them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("select a wallet first")]
    NoTargetSelected,

    #[error("wallet {0} doesn't exist")]
    UnknownWallet(WalletId),

    #[error("wallet {0} can't be paired with itself")]
    SameWallet(WalletId),

    #[error("choose what happens to the default wallet")]
    DefaultChoiceMissing,

    #[error("choose which currency to keep")]
    CurrencyModeMissing,

    #[error("enter an amount")]
    AmountMissing,

    #[error("the amount must be greater than zero")]
    AmountNotPositive,

    #[error("only {available} {currency} available, {requested} requested")]
    InsufficientFunds {
        requested: Amount,
        available: Amount,
        currency: Currency,
    },

    #[error("choose a category")]
    CategoryMissing,

    #[error("category {0} doesn't exist")]
    UnknownCategory(CategoryId),

    #[error("confirm that this can't be undone")]
    NotAcknowledged,
}

#[derive(Debug, Error, PartialEq)]
pub enum WizardError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{action} is not available during {step}")]
    NotAvailable {
        action: &'static str,
        step: &'static str,
    },

    /// Nothing can happen until the persistence side answers.
    #[error("the {0} is being committed and can't be interrupted")]
    CommitInFlight(OperationKind),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// The wallet the user may pair `current` with.
pub(crate) fn check_target(
    directory: &WalletDirectory,
    current: WalletId,
    target: WalletId,
) -> Result<&Wallet, ValidationError> {
    if target == current {
        return Err(ValidationError::SameWallet(target));
    }

    directory
        .wallet(target)
        .ok_or(ValidationError::UnknownWallet(target))
}

pub(crate) fn pair_with(
    directory: &WalletDirectory,
    current: WalletId,
    direction: Direction,
    target: Option<WalletId>,
) -> Result<Pairing, ValidationError> {
    let target = target.ok_or(ValidationError::NoTargetSelected)?;
    let other = check_target(directory, current, target)?;
    let current = directory
        .wallet(current)
        .ok_or(ValidationError::UnknownWallet(current))?;

    Ok(Pairing::new(direction, current.clone(), other.clone()))
}

/// What the persistence side answered.
pub type Outcome = Result<(), CommitError>;

/// Where `resolve` leaves the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The wizard is done. The host should select this wallet, or nothing.
    Done(Option<WalletId>),

    /// The answer is kept until the progress indicator has run its course,
    /// see `Wizard::complete`.
    Held,
}

/// The steps of one operation, as driven by `Wizard`.
///
/// An implementation only describes its own states: which one selects the
/// target, which one collects the agreement, which one carries the commit in
/// flight. It also says how a request is projected and what a committed
/// request changes.
pub trait WizardStep: Sized {
    const KIND: OperationKind;

    type Request: Clone;
    type Preview: Clone;
    type Commit;

    fn name(&self) -> &'static str;

    fn selection(direction: Direction, target: Option<WalletId>) -> Self;
    fn selection_mut(&mut self) -> Option<(&mut Direction, &mut Option<WalletId>)>;

    fn agreement(request: Self::Request, acknowledged: bool) -> Self;
    fn agreed(&self) -> Option<(&Self::Request, bool)>;
    fn acknowledgment_mut(&mut self) -> Option<&mut bool>;

    /// `outcome` stays `None` until the persistence side has answered.
    fn in_flight(request: Self::Request, preview: Self::Preview, outcome: Option<Outcome>) -> Self;
    fn commit_in_flight(&self) -> Option<(&Self::Request, &Self::Preview, Option<&Outcome>)>;

    fn pairing(request: &Self::Request) -> &Pairing;
    fn project(config: &EngineConfig, request: &Self::Request) -> Result<Self::Preview, WizardError>;
    fn payload(request: &Self::Request, preview: &Self::Preview) -> Self::Commit;

    /// How long the answer is held back for the progress indicator.
    fn pacing(config: &EngineConfig) -> Duration;

    /// Record a committed request. Returns the final step and the wallet the
    /// host should select.
    fn committed(
        directory: &mut WalletDirectory,
        request: Self::Request,
        preview: Self::Preview,
    ) -> (Self, Option<WalletId>);
}

fn unavailable<S: WizardStep>(action: &'static str, step: &S) -> WizardError {
    if step.commit_in_flight().is_some() {
        return WizardError::CommitInFlight(S::KIND);
    }

    WizardError::NotAvailable {
        action,
        step: step.name(),
    }
}

// Back to the first step, with the earlier choices preselected.
fn reselect<S: WizardStep>(pairing: &Pairing) -> S {
    S::selection(pairing.direction, Some(pairing.other().id))
}

/// A wizard over a snapshot of the user's wallets, opened on `current`.
pub struct Wizard<S> {
    config: Arc<EngineConfig>,
    directory: WalletDirectory,
    current: WalletId,
    step: S,
}

impl<S: WizardStep> Wizard<S> {
    pub fn new(
        config: Arc<EngineConfig>,
        directory: WalletDirectory,
        current: WalletId,
    ) -> Result<Self, WizardError> {
        if directory.wallet(current).is_none() {
            return Err(ValidationError::UnknownWallet(current).into());
        }

        Ok(Self {
            config,
            directory,
            current,
            step: S::selection(Direction::default(), None),
        })
    }

    pub fn step(&self) -> &S {
        &self.step
    }

    pub fn directory(&self) -> &WalletDirectory {
        &self.directory
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Wallet> {
        self.directory.candidates(self.current)
    }

    pub fn is_locked(&self) -> bool {
        self.step.commit_in_flight().is_some()
    }

    pub fn choose_direction(&mut self, direction: Direction) -> Result<(), WizardError> {
        match self.step.selection_mut() {
            Some((chosen, _)) => {
                *chosen = direction;
                Ok(())
            }
            None => Err(unavailable("choose_direction", &self.step)),
        }
    }

    pub fn choose_target(&mut self, target: WalletId) -> Result<(), WizardError> {
        if self.step.selection_mut().is_none() {
            return Err(unavailable("choose_target", &self.step));
        }
        check_target(&self.directory, self.current, target)?;

        if let Some((_, chosen)) = self.step.selection_mut() {
            *chosen = Some(target);
        }
        Ok(())
    }

    pub fn acknowledge(&mut self, checked: bool) -> Result<(), WizardError> {
        match self.step.acknowledgment_mut() {
            Some(acknowledged) => {
                *acknowledged = checked;
                Ok(())
            }
            None => Err(unavailable("acknowledge", &self.step)),
        }
    }

    /// Share of the progress indicator to show while the commit is in
    /// flight, answered or not.
    pub fn progress(&self, elapsed: Duration) -> Option<u8> {
        if !self.is_locked() {
            return None;
        }

        let total = S::pacing(&self.config).as_millis();
        if total == 0 {
            return Some(100);
        }

        let percent = (elapsed.as_millis().saturating_mul(100) / total).min(100);
        Some(u8::try_from(percent).unwrap_or(100))
    }

    /// Lock the wizard and hand out the commit payload.
    pub fn dispatch(&mut self) -> Result<S::Commit, WizardError> {
        let request = match self.step.agreed() {
            Some((request, true)) => request.clone(),
            Some((_, false)) => return Err(ValidationError::NotAcknowledged.into()),
            None => return Err(unavailable("dispatch", &self.step)),
        };

        let preview = S::project(&self.config, &request)?;
        let commit = S::payload(&request, &preview);
        let pairing = S::pairing(&request);
        log::info!(
            "dispatching {} from wallet {} to wallet {}",
            S::KIND,
            pairing.source().id,
            pairing.destination().id
        );

        self.transition(S::in_flight(request, preview, None));
        Ok(commit)
    }

    /// Hand over the answer of the persistence side.
    ///
    /// When the operation paces its progress indicator, the answer is held
    /// and only surfaces through `complete`. Otherwise it settles right away:
    /// on success the wizard is done, on failure it goes back to the
    /// agreement step with the request intact, so the user can submit again.
    pub fn resolve(&mut self, result: Outcome) -> Result<Settlement, WizardError> {
        let (request, preview) = match self.step.commit_in_flight() {
            Some((request, preview, None)) => (request.clone(), preview.clone()),
            _ => return Err(unavailable("resolve", &self.step)),
        };

        if S::pacing(&self.config).is_zero() {
            return self.settle(request, preview, result).map(Settlement::Done);
        }

        log::debug!("{} answered, holding it for the progress indicator", S::KIND);
        self.step = S::in_flight(request, preview, Some(result));
        Ok(Settlement::Held)
    }

    /// Surface a held answer, once the progress indicator is full.
    pub fn complete(&mut self, elapsed: Duration) -> Result<Option<WalletId>, WizardError> {
        let (request, preview, outcome) = match self.step.commit_in_flight() {
            Some((request, preview, Some(outcome))) => {
                (request.clone(), preview.clone(), outcome.clone())
            }
            _ => return Err(unavailable("complete", &self.step)),
        };

        if elapsed < S::pacing(&self.config) {
            return Err(WizardError::CommitInFlight(S::KIND));
        }

        self.settle(request, preview, outcome)
    }

    fn settle(
        &mut self,
        request: S::Request,
        preview: S::Preview,
        outcome: Outcome,
    ) -> Result<Option<WalletId>, WizardError> {
        if let Err(err) = outcome {
            let pairing = S::pairing(&request);
            log::warn!(
                "{} from wallet {} to wallet {} failed: {}",
                S::KIND,
                pairing.source().id,
                pairing.destination().id,
                err
            );
            self.transition(S::agreement(request, true));
            return Err(err.into());
        }

        let (done, selected) = S::committed(&mut self.directory, request, preview);
        self.transition(done);
        Ok(selected)
    }

    // Dispatch, wait for the committer and for the progress indicator, then
    // tell the host what to select. Needs a tokio runtime with timers.
    async fn finalize_with<F, Fut>(
        &mut self,
        send: F,
        selection: &dyn SelectionSink,
    ) -> Result<(), WizardError>
    where
        F: FnOnce(S::Commit) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let started = Instant::now();
        let commit = self.dispatch()?;
        let result = send(commit).await;

        let selected = match self.resolve(result)? {
            Settlement::Done(selected) => selected,
            Settlement::Held => {
                tokio::time::sleep_until(started + S::pacing(&self.config)).await;
                self.complete(started.elapsed())?
            }
        };
        selection.select(selected);

        Ok(())
    }

    fn transition(&mut self, next: S) {
        log::debug!("{} wizard: {} -> {}", S::KIND, self.step.name(), next.name());
        self.step = next;
    }
}
