use treasury_tap::{access::Operation, error::TreasuryErrorKind};

use crate::support::{FINANCE, GOVERNOR, TRADER, curve_params, harness};

#[test]
fn given_unauthorized_caller_when_selling_then_denied_and_curve_never_sees_order() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");

    let err = h
        .facade
        .open_sell_order("mallory", "dai", 1)
        .expect_err("unauthorized sell must fail");
    assert_eq!(err.kind, TreasuryErrorKind::PermissionDenied);
    assert!(h.curve.orders().is_empty());
}

#[test]
fn given_trader_when_calling_admin_operations_then_every_one_is_denied() {
    let h = harness();
    let checks = [
        h.facade
            .add_collateral_asset(TRADER, "dai", curve_params(), 100, 0)
            .map(|_| ()),
        h.facade.remove_collateral_asset(TRADER, "dai").map(|_| ()),
        h.facade.update_tap_rate(TRADER, "dai", 1),
        h.facade.update_tap_floor(TRADER, "dai", 1),
        h.facade.update_max_tap_increase(TRADER, 1),
        h.facade.update_beneficiary(TRADER, TRADER),
        h.facade.update_reserve_ratio(TRADER, "dai", 1),
        h.facade.withdraw(TRADER, "dai").map(|_| ()),
    ];

    for result in checks {
        assert_eq!(
            result.expect_err("trader lacks admin rights").kind,
            TreasuryErrorKind::PermissionDenied
        );
    }
    assert!(h.curve.listing("dai").is_none());
}

#[test]
fn given_revoked_permission_when_withdrawing_then_denied() {
    let h = harness();
    h.facade
        .add_collateral_asset(GOVERNOR, "dai", curve_params(), 100, 0)
        .expect("asset should be added");
    h.custody.deposit("dai", 1_000).expect("deposit");
    h.clock.advance(86_400);

    assert!(h.policy.revoke(Operation::Withdraw, FINANCE));
    let err = h.facade.withdraw(FINANCE, "dai").expect_err("revoked");
    assert_eq!(err.kind, TreasuryErrorKind::PermissionDenied);
    assert_eq!(h.facade.tap_record("dai").expect("record").last_tap_timestamp, 0);
}
