use super::policy::Policy;
use super::types::Profile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetirementTarget {
    pub annual_income: f64,
    pub balance: f64,
}

/// Income the user needs in retirement: their stated spending when known,
/// otherwise a replacement share of current income.
pub fn retirement_target(profile: &Profile, policy: &Policy) -> RetirementTarget {
    let annual_income = match profile.monthly_expenses {
        Some(monthly) if monthly > 0.0 => monthly * 12.0,
        _ => profile.annual_income * policy.replacement_ratio,
    };
    RetirementTarget {
        annual_income,
        balance: annual_income / policy.safe_withdrawal_rate,
    }
}

/// Monthly payment that grows to `gap` after `years` of monthly compounding
/// at `annual_rate`, by inverting the future value of an ordinary annuity.
pub fn required_monthly_contribution(gap: f64, annual_rate: f64, years: u32) -> f64 {
    if gap <= 0.0 || years == 0 {
        return 0.0;
    }

    let months = f64::from(years) * 12.0;
    let monthly_rate = annual_rate / 12.0;
    if monthly_rate.abs() <= 1e-12 {
        return gap / months;
    }

    let growth = (1.0 + monthly_rate).powf(months) - 1.0;
    (gap * monthly_rate / growth).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{InvestmentExperience, RiskTolerance};
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn future_value_of_payments(payment: f64, annual_rate: f64, years: u32) -> f64 {
        let monthly_rate = annual_rate / 12.0;
        let mut balance = 0.0;
        for _ in 0..years * 12 {
            balance = balance * (1.0 + monthly_rate) + payment;
        }
        balance
    }

    fn profile(expenses: Option<f64>) -> Profile {
        Profile {
            age: 40,
            retirement_age_goal: 65,
            current_savings: 0.0,
            annual_income: 100_000.0,
            monthly_expenses: expenses,
            risk_tolerance: RiskTolerance::Medium,
            investment_experience: InvestmentExperience::Expert,
        }
    }

    #[test]
    fn target_uses_replacement_ratio_without_expenses() {
        let target = retirement_target(&profile(None), &Policy::default());
        assert_approx(target.annual_income, 80_000.0);
        assert_approx(target.balance, 2_000_000.0);
    }

    #[test]
    fn target_prefers_stated_expenses() {
        let target = retirement_target(&profile(Some(3_000.0)), &Policy::default());
        assert_approx(target.annual_income, 36_000.0);
        assert_approx(target.balance, 900_000.0);
    }

    #[test]
    fn zero_expenses_fall_back_to_replacement_ratio() {
        let target = retirement_target(&profile(Some(0.0)), &Policy::default());
        assert_approx(target.annual_income, 80_000.0);
    }

    #[test]
    fn contribution_is_zero_without_gap_or_time() {
        assert_eq!(required_monthly_contribution(0.0, 0.07, 20), 0.0);
        assert_eq!(required_monthly_contribution(-5_000.0, 0.07, 20), 0.0);
        assert_eq!(required_monthly_contribution(100_000.0, 0.07, 0), 0.0);
    }

    #[test]
    fn zero_rate_spreads_gap_evenly() {
        assert_approx(required_monthly_contribution(12_000.0, 0.0, 10), 100.0);
    }

    #[test]
    fn very_long_horizons_do_not_overflow_month_count() {
        let payment = required_monthly_contribution(1_000.0, 0.07, 400_000_000);
        assert!(payment.is_finite() && payment >= 0.0);

        let flat = required_monthly_contribution(4_800.0, 0.0, 400_000_000);
        assert_approx(flat * 4_800_000_000.0, 4_800.0);
    }

    #[test]
    fn payment_accumulates_back_to_gap() {
        let payment = required_monthly_contribution(250_000.0, 0.07, 25);
        let rebuilt = future_value_of_payments(payment, 0.07, 25);
        assert!((rebuilt - 250_000.0).abs() < 1e-3, "rebuilt {rebuilt}");
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_longer_horizon_needs_smaller_payment(
            gap in 1_000u32..5_000_000,
            rate_bp in 0u32..1200,
            years in 1u32..40,
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let shorter = required_monthly_contribution(gap as f64, rate, years);
            let longer = required_monthly_contribution(gap as f64, rate, years + 1);
            prop_assert!(shorter > 0.0);
            prop_assert!(longer <= shorter);
        }
    }
}
