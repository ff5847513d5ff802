//! Amortization arithmetic for LendFlow
//!
//! Pure currency math: the amortizing-payment formula, the per-period
//! interest/principal split, and the pro-rata distribution of an
//! installment across a loan's investors. Everything operates on
//! `Decimal` and rounds to 2 decimal places, half away from zero.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Periods per year for monthly installments.
pub const PERIODS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Round to currency precision (2 dp, half away from zero).
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Interest/principal breakdown of a single installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentSplit {
    pub interest: Decimal,
    pub principal: Decimal,
}

/// Compute the fixed payment that amortizes `principal` over `periods`
/// payments at `periodic_rate` per period:
/// `p * r * (1 + r)^n / ((1 + r)^n - 1)`, rounded to currency precision.
///
/// A zero rate degenerates to straight-line repayment.
pub fn calculate_payment(
    principal: Decimal,
    periodic_rate: Decimal,
    periods: u32,
) -> ApiResult<Decimal> {
    if principal <= Decimal::ZERO {
        return Err(ApiError::InvalidArgument(
            "principal must be greater than zero".to_string(),
        ));
    }
    if periods == 0 {
        return Err(ApiError::InvalidArgument(
            "number of periods must be greater than zero".to_string(),
        ));
    }
    if periodic_rate < Decimal::ZERO {
        return Err(ApiError::InvalidArgument(
            "periodic rate must not be negative".to_string(),
        ));
    }

    if periodic_rate.is_zero() {
        return Ok(round_currency(principal / Decimal::from(periods)));
    }

    let factor = (Decimal::ONE + periodic_rate)
        .checked_powi(periods as i64)
        .ok_or_else(|| {
            ApiError::InvalidArgument("payment parameters out of range".to_string())
        })?;

    let payment = principal * periodic_rate * factor / (factor - Decimal::ONE);
    Ok(round_currency(payment))
}

/// Split one installment of a loan into its interest and principal
/// components. Interest accrues monthly on the remaining balance.
pub fn split_installment(
    remaining_balance: Decimal,
    annual_rate: Decimal,
    installment_amt: Decimal,
) -> InstallmentSplit {
    let interest = round_currency(remaining_balance * annual_rate / PERIODS_PER_YEAR);
    InstallmentSplit {
        interest,
        principal: installment_amt - interest,
    }
}

/// The payment retires the loan when its principal component covers the
/// whole remaining balance.
pub fn retires_balance(remaining_balance: Decimal, split: InstallmentSplit) -> bool {
    remaining_balance <= split.principal
}

/// Funding deadline: a fixed number of calendar days past approval.
pub fn funding_deadline(approved_at: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    approved_at + Duration::days(window_days)
}

/// Distribute one installment across investors in proportion to their
/// original share of the funded amount.
///
/// Shares are rounded to currency precision; the rounding residue (the
/// withdrawn installment minus the sum of rounded shares) is assigned to
/// the first investor, so the deposits always sum exactly to the
/// installment. `investments` must be ordered by investor id so the
/// residue assignment is deterministic.
pub fn allocate_installment(
    installment_amt: Decimal,
    amt_funded: Decimal,
    investments: &[(Uuid, Decimal)],
) -> ApiResult<Vec<(Uuid, Decimal)>> {
    if investments.is_empty() || amt_funded <= Decimal::ZERO {
        return Err(ApiError::InternalError(
            "loan has no recorded investors".to_string(),
        ));
    }

    let mut shares: Vec<(Uuid, Decimal)> = investments
        .iter()
        .map(|(investor_id, invested_amt)| {
            (
                *investor_id,
                round_currency(installment_amt * invested_amt / amt_funded),
            )
        })
        .collect();

    let distributed: Decimal = shares.iter().map(|(_, amt)| *amt).sum();
    let residue = installment_amt - distributed;
    if !residue.is_zero() {
        shares[0].1 += residue;
    }

    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_calculate_payment_reference_values() {
        // 10,000 over 48 months at 5% annual
        let payment = calculate_payment(dec!(10000), dec!(0.05) / dec!(12), 48).unwrap();
        assert_eq!(payment, dec!(230.29));

        // 9,000 over 24 months at 5% annual
        let payment = calculate_payment(dec!(9000), dec!(0.05) / dec!(12), 24).unwrap();
        assert_eq!(payment, dec!(394.84));

        // 5,000 over 12 months at 8% annual
        let payment = calculate_payment(dec!(5000), dec!(0.08) / dec!(12), 12).unwrap();
        assert_eq!(payment, dec!(434.94));
    }

    #[test]
    fn test_calculate_payment_zero_rate() {
        let payment = calculate_payment(dec!(1200), Decimal::ZERO, 12).unwrap();
        assert_eq!(payment, dec!(100.00));
    }

    #[test]
    fn test_calculate_payment_rejects_bad_domain() {
        assert!(calculate_payment(dec!(0), dec!(0.01), 12).is_err());
        assert!(calculate_payment(dec!(-500), dec!(0.01), 12).is_err());
        assert!(calculate_payment(dec!(1000), dec!(0.01), 0).is_err());
        assert!(calculate_payment(dec!(1000), dec!(-0.01), 12).is_err());
    }

    #[test]
    fn test_split_installment_reference_example() {
        // 9,000 remaining at 5% with a 375.20 installment:
        // interest 37.50, principal 337.70
        let split = split_installment(dec!(9000), dec!(0.05), dec!(375.20));
        assert_eq!(split.interest, dec!(37.50));
        assert_eq!(split.principal, dec!(337.70));
        assert!(!retires_balance(dec!(9000), split));
        assert_eq!(dec!(9000) - split.principal, dec!(8662.30));
    }

    #[test]
    fn test_full_schedule_amortizes_to_zero() {
        // Simulate the whole schedule: the rounded payment retires the
        // balance within one period past the nominal term, with a
        // sub-dollar final residual.
        let annual_rate = dec!(0.05);
        let payment = calculate_payment(dec!(10000), annual_rate / dec!(12), 48).unwrap();

        let mut balance = dec!(10000);
        let mut periods = 0;
        loop {
            let split = split_installment(balance, annual_rate, payment);
            periods += 1;
            if retires_balance(balance, split) {
                break;
            }
            balance -= split.principal;
            assert!(periods < 60, "schedule failed to converge");
        }

        assert_eq!(periods, 49);
        assert!(balance < dec!(1.00));
    }

    #[test]
    fn test_allocate_installment_conserves_money() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let investments = vec![(a, dec!(2000)), (b, dec!(3000)), (c, dec!(4000))];

        let shares = allocate_installment(dec!(375.20), dec!(9000), &investments).unwrap();

        let total: Decimal = shares.iter().map(|(_, amt)| *amt).sum();
        assert_eq!(total, dec!(375.20));

        // Raw shares are 83.38 / 125.07 / 166.76 which over-distributes
        // by one cent; the residue comes out of the first investor.
        assert_eq!(shares[0], (a, dec!(83.37)));
        assert_eq!(shares[1], (b, dec!(125.07)));
        assert_eq!(shares[2], (c, dec!(166.76)));
    }

    #[test]
    fn test_allocate_installment_single_investor() {
        let a = Uuid::new_v4();
        let shares =
            allocate_installment(dec!(230.29), dec!(10000), &[(a, dec!(10000))]).unwrap();
        assert_eq!(shares, vec![(a, dec!(230.29))]);
    }

    #[test]
    fn test_allocate_installment_rejects_empty() {
        assert!(allocate_installment(dec!(100), dec!(1000), &[]).is_err());
    }

    #[test]
    fn test_funding_deadline_adds_calendar_days() {
        let approved = DateTime::parse_from_rfc3339("2023-09-26T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let deadline = funding_deadline(approved, 30);
        assert_eq!(
            deadline,
            DateTime::parse_from_rfc3339("2023-10-26T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }
}
