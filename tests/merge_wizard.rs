use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use wallet_engine::wizard::merge::MergeStep;
use wallet_engine::wizard::{
    CommitError, DefaultReassignment, MergeCommit, MergeCommitter,
};
use wallet_engine::{
    Category, CurrencyMode, Direction, EngineConfig, MergeWizard, ValidationError, Wallet,
    WalletDirectory, WalletId, WizardError,
};

const MERGE_CATEGORY: u32 = 7;

struct RecordingCommitter {
    commits: Mutex<Vec<MergeCommit>>,
    reject_with: Option<String>,
}

impl RecordingCommitter {
    fn accepting() -> Self {
        Self {
            commits: Mutex::new(Vec::new()),
            reject_with: None,
        }
    }

    fn rejecting(reason: &str) -> Self {
        Self {
            commits: Mutex::new(Vec::new()),
            reject_with: Some(reason.to_string()),
        }
    }

    fn commits(&self) -> Vec<MergeCommit> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl MergeCommitter for RecordingCommitter {
    async fn commit_merge(&self, commit: MergeCommit) -> Result<(), CommitError> {
        self.commits.lock().unwrap().push(commit);
        match &self.reject_with {
            Some(reason) => Err(CommitError(reason.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct Selection {
    calls: Mutex<Vec<Option<WalletId>>>,
}

impl Selection {
    fn sink(self: &Arc<Self>) -> impl Fn(Option<WalletId>) + Send + Sync {
        let selection = Arc::clone(self);
        move |wallet| selection.calls.lock().unwrap().push(wallet)
    }
}

fn directory() -> WalletDirectory {
    WalletDirectory::new(
        vec![
            Wallet::new(1, "Travel", "USD", dec!(100), 4).default_wallet(),
            Wallet::new(2, "Home", "VND", dec!(1000000), 10),
            Wallet::new(3, "Groceries", "VND", dec!(250000), 3).shared(),
        ],
        vec![Category::new(MERGE_CATEGORY, "Wallet merge")],
    )
}

fn wizard(current: WalletId) -> MergeWizard {
    MergeWizard::new(Arc::new(EngineConfig::default()), directory(), current)
        .expect("current wallet exists")
}

#[tokio::test(start_paused = true)]
async fn test_cross_currency_merge_end_to_end() {
    let mut wizard = wizard(1);
    wizard.choose_target(2).unwrap();
    wizard.next().unwrap();

    // Wallet 1 is the default one and is about to disappear.
    assert!(matches!(wizard.step(), MergeStep::DefaultHandling { .. }));
    wizard
        .choose_default_handling(DefaultReassignment::MakeTargetDefault)
        .unwrap();
    wizard.next().unwrap();

    wizard.choose_currency_mode(CurrencyMode::KeepTarget).unwrap();
    wizard.next().unwrap();

    let preview = wizard.preview().unwrap().expect("preview is available");
    assert_eq!(dec!(3435000), preview.new_balance);
    assert_eq!(14, preview.total_transaction_count);
    assert_eq!("1 USD = 24,350 VND", preview.rate_annotation);

    wizard.choose_category(MERGE_CATEGORY).unwrap();
    wizard.next().unwrap();
    wizard.acknowledge(true).unwrap();

    let committer = RecordingCommitter::accepting();
    let selection = Arc::new(Selection::default());
    wizard
        .finalize(&committer, &selection.sink())
        .await
        .expect("merge commits");

    assert_eq!(
        vec![MergeCommit {
            mode: Direction::CurrentIntoOther,
            source_wallet_id: 1,
            target_wallet_id: 2,
            currency_mode: CurrencyMode::KeepTarget,
            category_id: MERGE_CATEGORY,
            default_reassignment: Some(DefaultReassignment::MakeTargetDefault),
        }],
        committer.commits()
    );

    // Nothing stays selected after a merge.
    assert_eq!(vec![None], *selection.calls.lock().unwrap());
    assert_eq!(&MergeStep::Done, wizard.step());

    let survivor = wizard.directory().wallet(2).expect("target survives");
    assert_eq!(dec!(3435000), survivor.balance);
    assert_eq!(14, survivor.transaction_count);
    assert!(survivor.is_default);
    assert!(wizard.directory().wallet(1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_merge_can_be_retried() {
    let mut wizard = wizard(3);
    wizard.choose_direction(Direction::OtherIntoCurrent).unwrap();
    wizard.choose_target(2).unwrap();
    wizard.next().unwrap();

    // Same currency, no default wallet involved: straight to the preview.
    assert!(matches!(wizard.step(), MergeStep::Preview { .. }));
    wizard.choose_category(MERGE_CATEGORY).unwrap();
    wizard.next().unwrap();
    wizard.acknowledge(true).unwrap();

    let selection = Arc::new(Selection::default());
    let rejecting = RecordingCommitter::rejecting("wallet is locked");
    assert_eq!(
        Err(WizardError::Commit(CommitError("wallet is locked".to_string()))),
        wizard.finalize(&rejecting, &selection.sink()).await
    );
    assert!(matches!(
        wizard.step(),
        MergeStep::Agree {
            acknowledged: true,
            ..
        }
    ));
    assert!(selection.calls.lock().unwrap().is_empty());
    assert_eq!(dec!(1000000), wizard.directory().wallet(2).unwrap().balance);

    let accepting = RecordingCommitter::accepting();
    wizard
        .finalize(&accepting, &selection.sink())
        .await
        .expect("retry commits");

    assert_eq!(rejecting.commits(), accepting.commits());
    let survivor = wizard.directory().wallet(3).expect("current wallet survives");
    assert_eq!(dec!(1250000), survivor.balance);
    assert_eq!(13, survivor.transaction_count);
}

#[tokio::test(start_paused = true)]
async fn test_fast_merge_is_surfaced_only_when_progress_is_full() {
    let mut wizard = wizard(3);
    wizard.choose_target(2).unwrap();
    wizard.next().unwrap();
    wizard.choose_category(MERGE_CATEGORY).unwrap();
    wizard.next().unwrap();
    wizard.acknowledge(true).unwrap();

    let committer = RecordingCommitter::accepting();
    let selection = Arc::new(Selection::default());
    let surfaced_at = Arc::new(Mutex::new(None));
    let sink = {
        let selection = selection.sink();
        let surfaced_at = Arc::clone(&surfaced_at);
        move |wallet: Option<WalletId>| {
            *surfaced_at.lock().unwrap() = Some(Instant::now());
            selection(wallet)
        }
    };

    // The committer answers at once, but 1.999s in, nothing has surfaced.
    let started = Instant::now();
    let early = tokio::time::timeout(
        Duration::from_millis(1999),
        wizard.finalize(&committer, &sink),
    )
    .await;
    assert!(early.is_err());
    assert_eq!(1, committer.commits().len());
    assert!(selection.calls.lock().unwrap().is_empty());
    assert!(matches!(
        wizard.step(),
        MergeStep::Processing {
            outcome: Some(Ok(())),
            ..
        }
    ));
    assert_eq!(Some(99), wizard.progress(started.elapsed()));
    assert_eq!(dec!(250000), wizard.directory().wallet(3).unwrap().balance);

    assert_eq!(Ok(None), wizard.complete(Duration::from_secs(2)));
    assert_eq!(&MergeStep::Done, wizard.step());
    assert_eq!(None, wizard.progress(started.elapsed()));

    // Left alone, finalize surfaces the merge exactly when the indicator is full.
    let mut wizard = self::wizard(3);
    wizard.choose_target(2).unwrap();
    wizard.next().unwrap();
    wizard.choose_category(MERGE_CATEGORY).unwrap();
    wizard.next().unwrap();
    wizard.acknowledge(true).unwrap();

    let started = Instant::now();
    wizard.finalize(&committer, &sink).await.expect("merge commits");
    let surfaced_at = surfaced_at.lock().unwrap().expect("selection surfaced");
    assert!(surfaced_at - started >= Duration::from_secs(2));
    assert_eq!(vec![None], *selection.calls.lock().unwrap());
}

#[test]
fn test_same_currency_merge_is_exact_in_both_modes() {
    let wallets = vec![
        Wallet::new(1, "A", "USD", dec!(12.345), 2),
        Wallet::new(2, "B", "USD", dec!(0.005), 3),
    ];

    for mode in [CurrencyMode::KeepSource, CurrencyMode::KeepTarget] {
        let config = EngineConfig::default();
        let pair = wallet_engine::WalletPair {
            source: wallets[0].clone(),
            destination: wallets[1].clone(),
        };
        let preview = wallet_engine::preview::merge_preview(&pair, mode, &config.converter())
            .expect("should preview");

        assert_eq!(dec!(12.350), preview.new_balance);
        assert_eq!(5, preview.total_transaction_count);
    }
}

#[test]
fn test_default_wallet_rule_matrix() {
    // W (1) is the default wallet, X (3) isn't.
    for (current, target, direction, requires_choice) in [
        (3, 1, Direction::OtherIntoCurrent, true),  // W into X
        (1, 3, Direction::CurrentIntoOther, true),  // W into X
        (1, 3, Direction::OtherIntoCurrent, false), // X into W
        (3, 1, Direction::CurrentIntoOther, false), // X into W
    ] {
        let mut wizard = wizard(current);
        wizard.choose_direction(direction).unwrap();
        wizard.choose_target(target).unwrap();
        wizard.next().unwrap();

        if requires_choice {
            assert!(matches!(wizard.step(), MergeStep::DefaultHandling { .. }));
            assert_eq!(
                Err(WizardError::Invalid(ValidationError::DefaultChoiceMissing)),
                wizard.next()
            );
            assert_eq!(None, wizard.preview().unwrap());
        } else {
            assert!(!matches!(wizard.step(), MergeStep::DefaultHandling { .. }));
        }
    }
}
