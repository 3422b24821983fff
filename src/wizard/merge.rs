use super::commit::{MergeCommit, MergeCommitter, SelectionSink};
use super::{pair_with, reselect, unavailable, Direction, OperationKind, Outcome, Pairing, ValidationError, Wizard, WizardError, WizardStep};
use crate::config::EngineConfig;
use crate::preview::{merge_preview, CurrencyMode, MergePreview, WalletPair};
use crate::wallet::{CategoryId, WalletDirectory, WalletId};

use serde::Serialize;
use std::time::Duration;

/// What happens to the default flag when the default wallet is merged away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultReassignment {
    MakeTargetDefault,
    NoDefault,
}

/// The user only has to decide about the default flag when exactly one of
/// the two wallets is the default one, and it's the one about to disappear.
/// When the default wallet survives the merge, nothing is ambiguous.
pub fn requires_default_handling(pair: &WalletPair) -> bool {
    pair.source.is_default && !pair.destination.is_default
}

/// Everything decided before the preview.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub pairing: Pairing,
    pub default_reassignment: Option<DefaultReassignment>,
    pub currency_mode: CurrencyMode,
}

/// A fully specified merge, consumed once by the commit.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    pub plan: MergePlan,
    pub category_id: CategoryId,
}

impl MergeRequest {
    pub fn source_wallet_id(&self) -> WalletId {
        self.plan.pairing.source().id
    }

    pub fn target_wallet_id(&self) -> WalletId {
        self.plan.pairing.destination().id
    }

    pub fn commit(&self) -> MergeCommit {
        MergeCommit {
            mode: self.plan.pairing.direction,
            source_wallet_id: self.source_wallet_id(),
            target_wallet_id: self.target_wallet_id(),
            currency_mode: self.plan.currency_mode,
            category_id: self.category_id,
            default_reassignment: self.plan.default_reassignment,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeStep {
    SelectDirectionAndTarget {
        direction: Direction,
        target: Option<WalletId>,
    },

    /// Only when the default wallet is the one merged away.
    DefaultHandling {
        pairing: Pairing,
        choice: Option<DefaultReassignment>,
    },

    /// Only when both wallets have different currencies. Nothing is
    /// preselected.
    CurrencySelection {
        pairing: Pairing,
        default_reassignment: Option<DefaultReassignment>,
        currency_mode: Option<CurrencyMode>,
    },

    Preview {
        plan: MergePlan,
        category: Option<CategoryId>,
    },

    Agree {
        request: MergeRequest,
        acknowledged: bool,
    },

    /// The commit is dispatched. There is no way back from here, only the
    /// answer of the persistence side, shown once the progress indicator is
    /// full.
    Processing {
        request: MergeRequest,
        preview: MergePreview,
        outcome: Option<Outcome>,
    },

    Done,
}

impl MergeStep {
    pub fn name(&self) -> &'static str {
        match self {
            MergeStep::SelectDirectionAndTarget { .. } => "direction and target selection",
            MergeStep::DefaultHandling { .. } => "default wallet handling",
            MergeStep::CurrencySelection { .. } => "currency selection",
            MergeStep::Preview { .. } => "preview",
            MergeStep::Agree { .. } => "agreement",
            MergeStep::Processing { .. } => "processing",
            MergeStep::Done => "done",
        }
    }
}

fn project_plan(config: &EngineConfig, plan: &MergePlan) -> Result<MergePreview, WizardError> {
    Ok(merge_preview(
        &plan.pairing.wallets,
        plan.currency_mode,
        &config.converter(),
    )?)
}

impl WizardStep for MergeStep {
    const KIND: OperationKind = OperationKind::Merge;

    type Request = MergeRequest;
    type Preview = MergePreview;
    type Commit = MergeCommit;

    fn name(&self) -> &'static str {
        MergeStep::name(self)
    }

    fn selection(direction: Direction, target: Option<WalletId>) -> Self {
        MergeStep::SelectDirectionAndTarget { direction, target }
    }

    fn selection_mut(&mut self) -> Option<(&mut Direction, &mut Option<WalletId>)> {
        match self {
            MergeStep::SelectDirectionAndTarget { direction, target } => Some((direction, target)),
            _ => None,
        }
    }

    fn agreement(request: MergeRequest, acknowledged: bool) -> Self {
        MergeStep::Agree {
            request,
            acknowledged,
        }
    }

    fn agreed(&self) -> Option<(&MergeRequest, bool)> {
        match self {
            MergeStep::Agree {
                request,
                acknowledged,
            } => Some((request, *acknowledged)),
            _ => None,
        }
    }

    fn acknowledgment_mut(&mut self) -> Option<&mut bool> {
        match self {
            MergeStep::Agree { acknowledged, .. } => Some(acknowledged),
            _ => None,
        }
    }

    fn in_flight(request: MergeRequest, preview: MergePreview, outcome: Option<Outcome>) -> Self {
        MergeStep::Processing {
            request,
            preview,
            outcome,
        }
    }

    fn commit_in_flight(&self) -> Option<(&MergeRequest, &MergePreview, Option<&Outcome>)> {
        match self {
            MergeStep::Processing {
                request,
                preview,
                outcome,
            } => Some((request, preview, outcome.as_ref())),
            _ => None,
        }
    }

    fn pairing(request: &MergeRequest) -> &Pairing {
        &request.plan.pairing
    }

    fn project(config: &EngineConfig, request: &MergeRequest) -> Result<MergePreview, WizardError> {
        project_plan(config, &request.plan)
    }

    fn payload(request: &MergeRequest, _: &MergePreview) -> MergeCommit {
        request.commit()
    }

    fn pacing(config: &EngineConfig) -> Duration {
        config.merge_progress
    }

    /// Nothing stays selected after a merge: the host reloads its wallets
    /// instead of reselecting the surviving one.
    fn committed(
        directory: &mut WalletDirectory,
        request: MergeRequest,
        preview: MergePreview,
    ) -> (Self, Option<WalletId>) {
        log::info!(
            "merged wallet {} into wallet {}",
            preview.source_wallet_id,
            preview.destination_wallet_id
        );

        // Already committed on the persistence side, whatever the snapshot says.
        if let Err(err) = directory.apply_merge(&preview, request.plan.default_reassignment) {
            log::error!("merge of wallet {} left the wallet list stale: {}", preview.source_wallet_id, err);
        }

        (MergeStep::Done, None)
    }
}

/// Folds one wallet into another: the source wallet is deleted, its balance
/// and transactions move to the destination.
pub type MergeWizard = Wizard<MergeStep>;

// Input, step by step.
impl Wizard<MergeStep> {
    pub fn choose_default_handling(&mut self, choice: DefaultReassignment) -> Result<(), WizardError> {
        match &mut self.step {
            MergeStep::DefaultHandling { choice: chosen, .. } => {
                *chosen = Some(choice);
                Ok(())
            }
            step => Err(unavailable("choose_default_handling", &*step)),
        }
    }

    pub fn choose_currency_mode(&mut self, mode: CurrencyMode) -> Result<(), WizardError> {
        match &mut self.step {
            MergeStep::CurrencySelection { currency_mode, .. } => {
                *currency_mode = Some(mode);
                Ok(())
            }
            step => Err(unavailable("choose_currency_mode", &*step)),
        }
    }

    pub fn choose_category(&mut self, category: CategoryId) -> Result<(), WizardError> {
        if !matches!(self.step, MergeStep::Preview { .. }) {
            return Err(unavailable("choose_category", &self.step));
        }
        if self.directory.category(category).is_none() {
            return Err(ValidationError::UnknownCategory(category).into());
        }

        if let MergeStep::Preview { category: chosen, .. } = &mut self.step {
            *chosen = Some(category);
        }
        Ok(())
    }
}

// Navigation.
impl Wizard<MergeStep> {
    /// Move forward, skipping the conditional steps that don't apply.
    pub fn next(&mut self) -> Result<(), WizardError> {
        let next = match &self.step {
            MergeStep::SelectDirectionAndTarget { direction, target } => {
                let pairing = pair_with(&self.directory, self.current, *direction, *target)?;
                self.after_selection(pairing)?
            }
            MergeStep::DefaultHandling { pairing, choice } => {
                let choice = choice.ok_or(ValidationError::DefaultChoiceMissing)?;
                self.after_default_handling(pairing.clone(), Some(choice))?
            }
            MergeStep::CurrencySelection {
                pairing,
                default_reassignment,
                currency_mode,
            } => {
                let currency_mode = currency_mode.ok_or(ValidationError::CurrencyModeMissing)?;
                self.enter_preview(MergePlan {
                    pairing: pairing.clone(),
                    default_reassignment: *default_reassignment,
                    currency_mode,
                })?
            }
            MergeStep::Preview { plan, category } => {
                let category_id = category.ok_or(ValidationError::CategoryMissing)?;
                MergeStep::Agree {
                    request: MergeRequest {
                        plan: plan.clone(),
                        category_id,
                    },
                    acknowledged: false,
                }
            }
            step => return Err(unavailable("next", step)),
        };

        self.transition(next);
        Ok(())
    }

    /// Go back to the previous step that was actually shown, keeping what
    /// was chosen there.
    pub fn back(&mut self) -> Result<(), WizardError> {
        let previous = match &self.step {
            MergeStep::DefaultHandling { pairing, .. } => reselect(pairing),
            MergeStep::CurrencySelection {
                pairing,
                default_reassignment,
                ..
            } => before_currency_selection(pairing, *default_reassignment),
            MergeStep::Preview { plan, .. } => before_preview(plan),
            MergeStep::Agree { request, .. } => MergeStep::Preview {
                plan: request.plan.clone(),
                category: Some(request.category_id),
            },
            step => return Err(unavailable("back", step)),
        };

        self.transition(previous);
        Ok(())
    }

    fn after_selection(&self, pairing: Pairing) -> Result<MergeStep, WizardError> {
        if requires_default_handling(&pairing.wallets) {
            return Ok(MergeStep::DefaultHandling {
                pairing,
                choice: None,
            });
        }

        self.after_default_handling(pairing, None)
    }

    fn after_default_handling(
        &self,
        pairing: Pairing,
        default_reassignment: Option<DefaultReassignment>,
    ) -> Result<MergeStep, WizardError> {
        if !pairing.wallets.same_currency() {
            return Ok(MergeStep::CurrencySelection {
                pairing,
                default_reassignment,
                currency_mode: None,
            });
        }

        // Same currency: keeping the target's is the same as keeping the source's.
        self.enter_preview(MergePlan {
            pairing,
            default_reassignment,
            currency_mode: CurrencyMode::KeepTarget,
        })
    }

    fn enter_preview(&self, plan: MergePlan) -> Result<MergeStep, WizardError> {
        // A preview that can't be computed can't be shown.
        project_plan(&self.config, &plan)?;

        Ok(MergeStep::Preview {
            plan,
            category: None,
        })
    }
}

fn before_currency_selection(
    pairing: &Pairing,
    default_reassignment: Option<DefaultReassignment>,
) -> MergeStep {
    if requires_default_handling(&pairing.wallets) {
        return MergeStep::DefaultHandling {
            pairing: pairing.clone(),
            choice: default_reassignment,
        };
    }

    reselect(pairing)
}

fn before_preview(plan: &MergePlan) -> MergeStep {
    if !plan.pairing.wallets.same_currency() {
        return MergeStep::CurrencySelection {
            pairing: plan.pairing.clone(),
            default_reassignment: plan.default_reassignment,
            currency_mode: Some(plan.currency_mode),
        };
    }

    before_currency_selection(&plan.pairing, plan.default_reassignment)
}

// Projection and commit.
impl Wizard<MergeStep> {
    /// The before/after projection, as soon as the final currency is known.
    /// Recomputed on every call.
    pub fn preview(&self) -> Result<Option<MergePreview>, WizardError> {
        let plan = match &self.step {
            MergeStep::CurrencySelection {
                pairing,
                default_reassignment,
                currency_mode: Some(currency_mode),
            } => MergePlan {
                pairing: pairing.clone(),
                default_reassignment: *default_reassignment,
                currency_mode: *currency_mode,
            },
            MergeStep::Preview { plan, .. } => plan.clone(),
            MergeStep::Agree { request, .. } | MergeStep::Processing { request, .. } => {
                request.plan.clone()
            }
            _ => return Ok(None),
        };

        project_plan(&self.config, &plan).map(Some)
    }

    /// Dispatch, wait for the committer, let the progress indicator fill up,
    /// and tell the host what to select. Needs a tokio runtime with timers.
    pub async fn finalize(
        &mut self,
        committer: &dyn MergeCommitter,
        selection: &dyn SelectionSink,
    ) -> Result<(), WizardError> {
        self.finalize_with(|commit| committer.commit_merge(commit), selection)
            .await
    }
}
