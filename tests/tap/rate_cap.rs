use treasury_tap::{
    error::TreasuryErrorKind,
    tap::{TapLedger, TapPolicy},
    types::{PCT_BASE, SECONDS_PER_DAY},
};

const MONTH: u64 = 30 * SECONDS_PER_DAY;

fn ledger() -> TapLedger {
    // 10% per 30 days
    let mut ledger = TapLedger::new(TapPolicy::default(), "org-vault");
    ledger.register("dai", 100, 0, 0).expect("register");
    ledger
}

#[test]
fn given_recent_change_when_rate_jumps_tenfold_then_rejected_and_unchanged() {
    let mut ledger = ledger();
    ledger.update_rate("dai", 105, MONTH).expect("small change after a month");

    let err = ledger
        .update_rate("dai", 1_050, MONTH + 1)
        .expect_err("tenfold increase must be rejected");
    assert_eq!(err.kind, TreasuryErrorKind::RateChangeTooLarge);

    let record = ledger.record("dai").expect("record exists");
    assert_eq!(record.tap_rate, 105);
    assert_eq!(record.last_rate_update, MONTH);
}

#[test]
fn given_full_period_elapsed_when_changing_rate_then_cap_is_symmetric() {
    let mut ledger = ledger();

    assert_eq!(
        ledger.clone().update_rate("dai", 111, MONTH).expect_err("over cap").kind,
        TreasuryErrorKind::RateChangeTooLarge
    );
    assert_eq!(
        ledger.clone().update_rate("dai", 89, MONTH).expect_err("over cap").kind,
        TreasuryErrorKind::RateChangeTooLarge
    );

    ledger.update_rate("dai", 90, MONTH).expect("decrease within cap");
    assert_eq!(ledger.record("dai").expect("record").tap_rate, 90);
}

#[test]
fn given_partial_period_when_changing_rate_then_cap_scales_with_elapsed_time() {
    let mut ledger = ledger();
    let half = MONTH / 2;

    assert!(ledger.clone().update_rate("dai", 106, half).is_err());
    ledger.update_rate("dai", 105, half).expect("half the cap after half the period");
}

#[test]
fn given_long_idle_when_changing_rate_then_cap_does_not_accumulate_beyond_one_period() {
    let mut ledger = ledger();
    assert!(ledger.clone().update_rate("dai", 120, 10 * MONTH).is_err());
    ledger.update_rate("dai", 110, 10 * MONTH).expect("one period worth of change");
}

#[test]
fn given_zero_rate_when_updating_then_any_rate_is_accepted() {
    let mut ledger = TapLedger::new(TapPolicy::default(), "org-vault");
    ledger.register("eth", 0, 0, 0).expect("register");
    ledger.update_rate("eth", 1_000_000, 1).expect("zero rate is uncapped");
    assert_eq!(ledger.record("eth").expect("record").tap_rate, 1_000_000);
}

#[test]
fn given_raised_max_change_when_updating_then_larger_moves_are_allowed() {
    let mut ledger = ledger();
    ledger.update_max_change_pct(PCT_BASE);
    ledger.update_rate("dai", 200, MONTH).expect("100% per period");
    assert_eq!(ledger.policy().max_tap_change_pct, PCT_BASE);
}

#[test]
fn given_rate_change_when_accruing_then_new_rate_applies_to_whole_window() {
    let mut ledger = ledger();
    ledger.update_rate("dai", 110, MONTH).expect("within cap");

    let allowance = ledger
        .compute_allowance("dai", u128::MAX, MONTH)
        .expect("allowance");
    assert_eq!(allowance, 110 * 30);
}
