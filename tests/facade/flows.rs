use treasury_tap::{error::TreasuryErrorKind, types::SECONDS_PER_DAY};

use crate::support::{BENEFICIARY, FINANCE, GOVERNOR, TRADER, curve_params, harness};

const DAY: u64 = SECONDS_PER_DAY;

#[test]
fn given_three_days_of_accrual_when_reading_and_withdrawing_then_balances_follow_the_tap() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");
    h.custody.deposit("dai", 10_000).expect("deposit");

    h.clock.advance(3 * DAY);
    assert_eq!(h.facade.compute_allowance("dai").expect("allowance"), 300);
    assert_eq!(h.facade.available_balance("dai").expect("available"), 9_700);

    let receipt = h.facade.withdraw(FINANCE, "dai").expect("withdraw");
    assert_eq!(receipt.amount, 300);
    assert_eq!(receipt.destination, BENEFICIARY);

    let view = h.facade.balance_view("dai").expect("view");
    assert_eq!(view.raw_balance, 9_700);
    assert_eq!(view.tap_allowance, 0);
    assert_eq!(view.available_balance, 9_700);
}

#[test]
fn given_nothing_accrued_when_withdrawing_then_timestamp_is_unchanged() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");

    h.clock.advance(DAY);
    let err = h.facade.withdraw(FINANCE, "dai").expect_err("no funds");
    assert_eq!(err.kind, TreasuryErrorKind::NothingToWithdraw);
    assert_eq!(h.facade.tap_record("dai").expect("record").last_tap_timestamp, 0);
}

#[test]
fn given_curve_refusal_when_adding_asset_then_tap_is_not_registered() {
    let h = harness();
    h.curve.fail_registrations(true);

    let err = h
        .facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect_err("curve refusal must abort");
    assert_eq!(err.kind, TreasuryErrorKind::CollaboratorFailure);
    assert_eq!(
        h.facade.tap_record("dai").expect_err("no record").kind,
        TreasuryErrorKind::NotRegistered
    );
    assert!(h.curve.listing("dai").is_none());

    h.curve.fail_registrations(false);
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("retry should succeed");
}

#[test]
fn given_registered_asset_when_adding_again_then_already_registered() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");

    let err = h
        .facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 50, 0)
        .expect_err("duplicate must fail");
    assert_eq!(err.kind, TreasuryErrorKind::AlreadyRegistered);
    assert_eq!(h.facade.tap_record("dai").expect("record").tap_rate, 100);
}

#[test]
fn given_invalid_reserve_ratio_when_adding_asset_then_rejected_before_any_side_effect() {
    let h = harness();
    let mut params = curve_params();
    params.reserve_ratio = 0;

    let err = h
        .facade
        .add_collateral_asset(GOVERNOR, "dai", params, 100, 0)
        .expect_err("zero reserve ratio is invalid");
    assert_eq!(err.kind, TreasuryErrorKind::InvalidAssetParameters);
    assert!(h.curve.listing("dai").is_none());
}

#[test]
fn given_listed_asset_when_removing_then_tap_and_curve_forget_it() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");

    let removed = h
        .facade
        .remove_collateral_asset(GOVERNOR, "dai")
        .expect("remove should succeed");
    assert_eq!(removed.asset_id, "dai");
    assert!(h.curve.listing("dai").is_none());
    assert_eq!(
        h.facade.withdraw(FINANCE, "dai").expect_err("gone").kind,
        TreasuryErrorKind::NotRegistered
    );
}

#[test]
fn given_curve_refusing_delisting_when_removing_then_tap_record_survives() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");
    h.curve.fail_removals(true);

    let err = h
        .facade
        .remove_collateral_asset(GOVERNOR, "dai")
        .expect_err("curve refusal must abort");
    assert_eq!(err.kind, TreasuryErrorKind::CollaboratorFailure);
    assert!(h.curve.listing("dai").is_some());
    let record = h.facade.tap_record("dai").expect("record kept");
    assert_eq!(record.listing, Some(curve_params()));
}

#[test]
fn given_governor_when_updating_parameters_then_changes_are_applied() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");

    h.clock.advance(30 * DAY);
    h.facade.update_tap_rate(GOVERNOR, "dai", 110).expect("rate within cap");
    h.facade.update_tap_floor(GOVERNOR, "dai", 500).expect("floor");
    h.facade.update_reserve_ratio(GOVERNOR, "dai", 500_000).expect("ratio");
    h.facade.update_beneficiary(GOVERNOR, "new-vault").expect("beneficiary");

    let record = h.facade.tap_record("dai").expect("record");
    assert_eq!(record.tap_rate, 110);
    assert_eq!(record.floor, 500);
    assert_eq!(record.last_rate_update, 30 * DAY);
    assert_eq!(h.curve.listing("dai").expect("listing").reserve_ratio, 500_000);
    assert_eq!(h.facade.tap_snapshot().expect("snapshot").beneficiary, "new-vault");

    let err = h
        .facade
        .update_tap_rate(GOVERNOR, "dai", 1_100)
        .expect_err("tenfold jump right after a change");
    assert_eq!(err.kind, TreasuryErrorKind::RateChangeTooLarge);
}

#[test]
fn given_redemption_above_available_when_selling_then_curve_refuses() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");
    h.custody.deposit("dai", 10_000).expect("deposit");
    h.clock.advance(3 * DAY);

    let err = h
        .facade
        .open_sell_order(TRADER, "dai", 9_701)
        .expect_err("sell above available must fail");
    assert_eq!(err.kind, TreasuryErrorKind::InsufficientCustodyFunds);

    let receipt = h
        .facade
        .open_sell_order(TRADER, "dai", 9_700)
        .expect("sell at available should pass");
    assert!(receipt.order_id.starts_with("sell:"));
    assert_eq!(h.curve.orders().len(), 1);
}

#[test]
fn given_mixed_operations_when_checking_then_available_never_exceeds_raw() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 250, 1_000)
        .expect("asset should be added");
    h.custody.deposit("dai", 2_000).expect("deposit");

    for step in 0..12u64 {
        h.clock.advance(DAY / 2);
        match step % 4 {
            0 => {
                let _ = h.facade.withdraw(FINANCE, "dai");
            }
            1 => {
                h.custody.debit("dai", 150).ok();
            }
            2 => {
                h.custody.deposit("dai", 75).expect("deposit");
            }
            _ => {
                let _ = h.facade.open_buy_order(TRADER, "dai", 10, 10);
            }
        }

        let view = h.facade.balance_view("dai").expect("view");
        assert!(view.available_balance <= view.raw_balance);
        assert!(view.tap_allowance <= view.raw_balance.saturating_sub(view.floor));
        h.facade.check_invariants().expect("invariants hold");
    }
}
