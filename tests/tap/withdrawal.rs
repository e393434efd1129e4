use treasury_tap::{
    custody::{CustodyPort, InMemoryCustody},
    error::TreasuryErrorKind,
    tap::{TapLedger, TapPolicy},
    types::SECONDS_PER_DAY,
};

const DAY: u64 = SECONDS_PER_DAY;

fn setup(balance: u128) -> (TapLedger, InMemoryCustody) {
    let mut ledger = TapLedger::new(TapPolicy::default(), "org-vault");
    ledger.register("dai", 100, 0, 0).expect("register");
    let custody = InMemoryCustody::with_balances(vec![("dai".to_string(), balance)]);
    (ledger, custody)
}

#[test]
fn given_accrued_allowance_when_withdrawing_then_beneficiary_is_paid_and_clock_resets() {
    let (mut ledger, custody) = setup(10_000);

    let receipt = ledger
        .withdraw("dai", &custody, 3 * DAY)
        .expect("withdraw should succeed");
    assert_eq!(receipt.amount, 300);
    assert_eq!(receipt.destination, "org-vault");
    assert_eq!(receipt.tapped_at, 3 * DAY);

    assert_eq!(custody.raw_balance("dai").expect("balance"), 9_700);
    assert_eq!(ledger.record("dai").expect("record").last_tap_timestamp, 3 * DAY);
    assert_eq!(ledger.compute_allowance("dai", 9_700, 3 * DAY).expect("allowance"), 0);
}

#[test]
fn given_zero_allowance_when_withdrawing_then_nothing_to_withdraw_and_timestamp_kept() {
    let (mut ledger, custody) = setup(0);

    let err = ledger
        .withdraw("dai", &custody, 5 * DAY)
        .expect_err("empty custody yields no allowance");
    assert_eq!(err.kind, TreasuryErrorKind::NothingToWithdraw);
    assert_eq!(ledger.record("dai").expect("record").last_tap_timestamp, 0);
    assert!(custody.transfers().is_empty());
}

#[test]
fn given_failing_transfer_when_withdrawing_then_state_is_untouched() {
    let (mut ledger, custody) = setup(10_000);
    custody.fail_transfers(true);

    let err = ledger
        .withdraw("dai", &custody, 2 * DAY)
        .expect_err("transfer failure must surface");
    assert_eq!(err.kind, TreasuryErrorKind::InsufficientCustodyFunds);
    assert_eq!(ledger.record("dai").expect("record").last_tap_timestamp, 0);
    assert_eq!(custody.raw_balance("dai").expect("balance"), 10_000);

    custody.fail_transfers(false);
    let receipt = ledger
        .withdraw("dai", &custody, 2 * DAY)
        .expect("retry should succeed");
    assert_eq!(receipt.amount, 200);
}

#[test]
fn given_stale_ticket_when_committing_then_invariant_violation() {
    let (mut ledger, custody) = setup(10_000);
    let ticket = ledger
        .prepare_withdrawal("dai", 10_000, DAY)
        .expect("ticket should be issued");

    ledger.withdraw("dai", &custody, DAY).expect("first withdraw");
    let err = ledger
        .commit_withdrawal(&ticket)
        .expect_err("reused ticket must fail");
    assert_eq!(err.kind, TreasuryErrorKind::InvariantViolation);
}

#[test]
fn given_frequent_withdrawals_when_a_day_passes_then_truncation_loses_nothing() {
    let (mut ledger, custody) = setup(10_000);

    let mut withdrawn = 0;
    for step in 1..=86u64 {
        match ledger.withdraw("dai", &custody, step * 1_000) {
            Ok(receipt) => withdrawn += receipt.amount,
            Err(err) => assert_eq!(err.kind, TreasuryErrorKind::NothingToWithdraw),
        }
    }

    // 86 000s at 100/day accrues 99.54 units; the fraction stays pending.
    assert_eq!(withdrawn, 99);
    assert_eq!(custody.raw_balance("dai").expect("balance"), 10_000 - 99);
    let pending_since = ledger.record("dai").expect("record").last_tap_timestamp;
    assert_eq!(pending_since, 99 * 864);
    assert_eq!(
        ledger
            .compute_allowance("dai", 9_901, 86_400)
            .expect("allowance"),
        1
    );
}
