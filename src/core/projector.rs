use tracing::debug;

use super::error::EngineError;
use super::policy::Policy;
use super::types::{Phase, Profile, ScenarioPoint, Trajectory};

const MIN_AGE: u32 = 18;
const MAX_AGE: u32 = 100;
pub const MAX_RETIREMENT_AGE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioRates {
    pub conservative: f64,
    pub expected: f64,
    pub optimistic: f64,
}

impl ScenarioRates {
    pub fn for_profile(profile: &Profile, policy: &Policy) -> Self {
        let expected = policy.expected_returns.rate_for(profile.risk_tolerance);
        Self {
            conservative: expected * policy.conservative_multiplier,
            expected,
            optimistic: expected * policy.optimistic_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Scenario {
    rate: f64,
    balance: f64,
    depleted: bool,
}

impl Scenario {
    fn new(rate: f64, balance: f64) -> Self {
        Self {
            rate,
            balance,
            depleted: false,
        }
    }

    fn advance(&mut self, phase: Phase, contribution: f64, drawdown_rate: f64) {
        if self.depleted {
            return;
        }
        self.balance = match phase {
            Phase::Accumulation => self.balance * (1.0 + self.rate) + contribution,
            Phase::Retirement => (self.balance * (1.0 + self.rate - drawdown_rate)).max(0.0),
        };
        if phase == Phase::Retirement && self.balance <= 0.0 {
            self.balance = 0.0;
            self.depleted = true;
        }
    }
}

pub(crate) fn validate_profile(profile: &Profile) -> Result<(), EngineError> {
    if !(MIN_AGE..=MAX_AGE).contains(&profile.age) {
        return Err(EngineError::invalid_profile(format!(
            "age must be between {MIN_AGE} and {MAX_AGE}, got {}",
            profile.age
        )));
    }

    if profile.retirement_age_goal > MAX_RETIREMENT_AGE {
        return Err(EngineError::invalid_profile(format!(
            "retirement age goal must be at most {MAX_RETIREMENT_AGE}, got {}",
            profile.retirement_age_goal
        )));
    }

    if profile.retirement_age_goal <= profile.age {
        return Err(EngineError::invalid_profile(format!(
            "retirement age goal {} must be greater than current age {}",
            profile.retirement_age_goal, profile.age
        )));
    }

    for (name, amount) in [
        ("current_savings", Some(profile.current_savings)),
        ("annual_income", Some(profile.annual_income)),
        ("monthly_expenses", profile.monthly_expenses),
    ] {
        if let Some(amount) = amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(EngineError::invalid_profile(format!(
                    "{name} must be a non-negative amount, got {amount}"
                )));
            }
        }
    }

    Ok(())
}

pub fn employer_contribution(profile: &Profile, policy: &Policy) -> f64 {
    profile.annual_income * policy.employer_contribution_rate
}

pub fn horizon_end_age(profile: &Profile, policy: &Policy) -> u32 {
    profile
        .retirement_age_goal
        .saturating_add(policy.years_after_retirement)
        .min(policy.horizon_age_cap)
        .max(profile.age)
}

/// Simulates the three scenarios year by year. Each point carries the
/// balances at the start of that year of age.
pub fn project(profile: &Profile, policy: &Policy) -> Result<Trajectory, EngineError> {
    validate_profile(profile)?;

    let rates = ScenarioRates::for_profile(profile, policy);
    let contribution = employer_contribution(profile, policy);
    let end_age = horizon_end_age(profile, policy);

    let mut conservative = Scenario::new(rates.conservative, profile.current_savings);
    let mut expected = Scenario::new(rates.expected, profile.current_savings);
    let mut optimistic = Scenario::new(rates.optimistic, profile.current_savings);

    let mut points = Vec::with_capacity((end_age - profile.age + 1) as usize);
    for (offset, age) in (profile.age..=end_age).enumerate() {
        let phase = Phase::at(age, profile.retirement_age_goal);
        let annual_income_equivalent = expected.balance * policy.safe_withdrawal_rate;
        points.push(ScenarioPoint {
            age,
            calendar_year: policy.start_year + offset as i32,
            phase,
            balance_expected: expected.balance,
            balance_conservative: conservative.balance,
            balance_optimistic: optimistic.balance,
            annual_income_equivalent,
            monthly_income_equivalent: annual_income_equivalent / 12.0,
        });

        for scenario in [&mut conservative, &mut expected, &mut optimistic] {
            scenario.advance(phase, contribution, policy.retirement_drawdown_rate);
        }
    }

    debug!(
        age = profile.age,
        retirement_age_goal = profile.retirement_age_goal,
        years = points.len(),
        expected_rate = rates.expected,
        "projected trajectory"
    );

    Ok(Trajectory { points })
}

/// Expected-scenario balance at the start of `target_age`, ignoring the
/// charting horizon cap.
pub fn expected_balance_at(
    profile: &Profile,
    policy: &Policy,
    target_age: u32,
) -> Result<f64, EngineError> {
    validate_profile(profile)?;
    if target_age > MAX_RETIREMENT_AGE {
        return Err(EngineError::invalid_profile(format!(
            "target age must be at most {MAX_RETIREMENT_AGE}, got {target_age}"
        )));
    }
    Ok(simulate_expected(profile, policy, target_age))
}

pub(crate) fn simulate_expected(profile: &Profile, policy: &Policy, target_age: u32) -> f64 {
    let rates = ScenarioRates::for_profile(profile, policy);
    let contribution = employer_contribution(profile, policy);
    let mut expected = Scenario::new(rates.expected, profile.current_savings);
    for age in profile.age..target_age {
        let phase = Phase::at(age, profile.retirement_age_goal);
        expected.advance(phase, contribution, policy.retirement_drawdown_rate);
    }
    expected.balance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{InvestmentExperience, RiskTolerance};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_profile() -> Profile {
        Profile {
            age: 35,
            retirement_age_goal: 65,
            current_savings: 50_000.0,
            annual_income: 70_000.0,
            monthly_expenses: None,
            risk_tolerance: RiskTolerance::Medium,
            investment_experience: InvestmentExperience::Intermediate,
        }
    }

    fn risk_from(index: u8) -> RiskTolerance {
        match index % 3 {
            0 => RiskTolerance::Low,
            1 => RiskTolerance::Medium,
            _ => RiskTolerance::High,
        }
    }

    #[test]
    fn worked_example_first_years_match_hand_calculation() {
        let profile = sample_profile();
        let policy = Policy::default();

        let rates = ScenarioRates::for_profile(&profile, &policy);
        assert_approx(rates.expected, 0.07);
        assert_approx(rates.conservative, 0.042);
        assert_approx(rates.optimistic, 0.098);
        assert_approx(employer_contribution(&profile, &policy), 7_700.0);

        let trajectory = project(&profile, &policy).expect("valid profile");
        let first = trajectory.first().expect("at least one point");
        assert_eq!(first.age, 35);
        assert_eq!(first.calendar_year, policy.start_year);
        assert_eq!(first.phase, Phase::Accumulation);
        assert_approx(first.balance_expected, 50_000.0);
        assert_approx(first.balance_conservative, 50_000.0);
        assert_approx(first.balance_optimistic, 50_000.0);
        assert_approx(first.annual_income_equivalent, 2_000.0);
        assert_approx(first.monthly_income_equivalent, 2_000.0 / 12.0);

        // 50000 * 1.07 + 7700, 50000 * 1.042 + 7700, 50000 * 1.098 + 7700
        let second = trajectory.point_at(36).expect("age 36 present");
        assert_eq!(second.calendar_year, policy.start_year + 1);
        assert_approx(second.balance_expected, 61_200.0);
        assert_approx(second.balance_conservative, 59_800.0);
        assert_approx(second.balance_optimistic, 62_600.0);
    }

    #[test]
    fn horizon_runs_five_years_past_retirement() {
        let trajectory = project(&sample_profile(), &Policy::default()).expect("valid");
        assert_eq!(trajectory.len(), 36);
        assert_eq!(trajectory.last().map(|p| p.age), Some(70));
        assert_eq!(trajectory.point_at(64).map(|p| p.phase), Some(Phase::Accumulation));
        assert_eq!(trajectory.point_at(65).map(|p| p.phase), Some(Phase::Retirement));
    }

    #[test]
    fn horizon_is_capped_at_age_85() {
        let mut profile = sample_profile();
        profile.age = 60;
        profile.retirement_age_goal = 83;
        let trajectory = project(&profile, &Policy::default()).expect("valid");
        assert_eq!(trajectory.last().map(|p| p.age), Some(85));
    }

    #[test]
    fn age_beyond_cap_yields_single_point() {
        let mut profile = sample_profile();
        profile.age = 90;
        profile.retirement_age_goal = 95;
        let trajectory = project(&profile, &Policy::default()).expect("valid");
        assert_eq!(trajectory.len(), 1);
        let only = &trajectory.points[0];
        assert_eq!(only.age, 90);
        assert_eq!(only.phase, Phase::Accumulation);
        assert_approx(only.balance_expected, 50_000.0);
    }

    #[test]
    fn retirement_years_apply_net_drawdown() {
        let profile = sample_profile();
        let policy = Policy::default();
        let trajectory = project(&profile, &policy).expect("valid");
        let at_goal = trajectory.point_at(65).expect("present").balance_expected;
        let after = trajectory.point_at(66).expect("present").balance_expected;
        assert_approx(after, at_goal * 1.03);
        assert_approx(
            expected_balance_at(&profile, &policy, 65).expect("valid"),
            at_goal,
        );
    }

    #[test]
    fn expected_balance_ignores_the_horizon_cap() {
        let mut profile = sample_profile();
        profile.age = 80;
        profile.retirement_age_goal = 90;
        profile.annual_income = 0.0;
        let policy = Policy::default();
        let balance = expected_balance_at(&profile, &policy, 90).expect("valid");
        assert_approx(balance, 50_000.0 * 1.07_f64.powi(10));
    }

    #[test]
    fn full_drawdown_empties_scenario_for_good() {
        let mut policy = Policy::default();
        policy.conservative_multiplier = 0.0;
        policy.retirement_drawdown_rate = 1.0;
        let trajectory = project(&sample_profile(), &policy).expect("valid");

        let retirement_points: Vec<_> = trajectory
            .points
            .iter()
            .filter(|p| p.age > 65)
            .collect();
        assert!(!retirement_points.is_empty());
        for point in retirement_points {
            assert_eq!(point.balance_conservative, 0.0);
            assert!(point.balance_expected > 0.0);
        }
    }

    #[test]
    fn rejects_goal_before_current_age() {
        let mut profile = sample_profile();
        profile.age = 70;
        profile.retirement_age_goal = 65;
        let err = project(&profile, &Policy::default()).expect_err("must reject");
        assert!(matches!(err, EngineError::InvalidProfile { .. }));
    }

    #[test]
    fn rejects_goal_equal_to_current_age() {
        let mut profile = sample_profile();
        profile.retirement_age_goal = profile.age;
        assert!(project(&profile, &Policy::default()).is_err());
    }

    #[test]
    fn rejects_negative_amounts() {
        let mut profile = sample_profile();
        profile.current_savings = -1.0;
        assert!(project(&profile, &Policy::default()).is_err());

        let mut profile = sample_profile();
        profile.monthly_expenses = Some(-10.0);
        let err = project(&profile, &Policy::default()).expect_err("must reject");
        assert!(err.to_string().contains("monthly_expenses"));

        let mut profile = sample_profile();
        profile.annual_income = f64::NAN;
        assert!(project(&profile, &Policy::default()).is_err());
    }

    #[test]
    fn rejects_out_of_range_age() {
        let mut profile = sample_profile();
        profile.age = 17;
        assert!(project(&profile, &Policy::default()).is_err());
        profile.age = 101;
        profile.retirement_age_goal = 110;
        assert!(project(&profile, &Policy::default()).is_err());
    }

    #[test]
    fn rejects_goal_beyond_maximum_retirement_age() {
        let mut profile = sample_profile();
        profile.retirement_age_goal = u32::MAX;
        let err = project(&profile, &Policy::default()).expect_err("must reject");
        assert!(err.to_string().contains("at most 120"));

        profile.retirement_age_goal = MAX_RETIREMENT_AGE + 1;
        assert!(project(&profile, &Policy::default()).is_err());
        assert!(expected_balance_at(&profile, &Policy::default(), 70).is_err());
    }

    #[test]
    fn goal_at_maximum_retirement_age_is_capped_horizon() {
        let mut profile = sample_profile();
        profile.retirement_age_goal = MAX_RETIREMENT_AGE;
        let trajectory = project(&profile, &Policy::default()).expect("valid");
        assert_eq!(trajectory.last().map(|p| p.age), Some(85));
        assert!(trajectory.points.iter().all(|p| p.phase == Phase::Accumulation));
    }

    #[test]
    fn horizon_end_saturates_instead_of_overflowing() {
        let mut profile = sample_profile();
        profile.retirement_age_goal = u32::MAX;
        let mut policy = Policy::default();
        policy.horizon_age_cap = u32::MAX;
        assert_eq!(horizon_end_age(&profile, &policy), u32::MAX);
    }

    #[test]
    fn expected_balance_rejects_unbounded_target_age() {
        let err = expected_balance_at(&sample_profile(), &Policy::default(), u32::MAX)
            .expect_err("must reject");
        assert!(matches!(err, EngineError::InvalidProfile { .. }));
    }

    #[test]
    fn identical_inputs_produce_identical_trajectories() {
        let profile = sample_profile();
        let policy = Policy::default();
        let a = project(&profile, &policy).expect("valid");
        let b = project(&profile, &policy).expect("valid");
        assert_eq!(a, b);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_scenarios_stay_ordered_and_non_negative(
            age in 18u32..90,
            years_to_goal in 1u32..40,
            savings in 0u32..2_000_000,
            income in 0u32..400_000,
            risk in 0u8..3,
        ) {
            let profile = Profile {
                age,
                retirement_age_goal: (age + years_to_goal).min(MAX_RETIREMENT_AGE),
                current_savings: savings as f64,
                annual_income: income as f64,
                monthly_expenses: None,
                risk_tolerance: risk_from(risk),
                investment_experience: InvestmentExperience::Intermediate,
            };
            let policy = Policy::default();
            let trajectory = project(&profile, &policy).expect("valid profile");

            prop_assert!(!trajectory.is_empty());
            prop_assert_eq!(trajectory.points[0].age, age);
            prop_assert_eq!(trajectory.points[0].balance_expected, savings as f64);

            let mut seen_retirement = false;
            for (idx, point) in trajectory.points.iter().enumerate() {
                prop_assert_eq!(point.age, age + idx as u32);
                prop_assert!(point.balance_conservative >= 0.0);
                prop_assert!(point.balance_conservative <= point.balance_expected + 1e-6);
                prop_assert!(point.balance_expected <= point.balance_optimistic + 1e-6);
                prop_assert!(
                    (point.annual_income_equivalent - point.balance_expected * 0.04).abs() <= 1e-6
                );
                if point.phase == Phase::Retirement {
                    seen_retirement = true;
                } else {
                    prop_assert!(!seen_retirement, "accumulation after retirement");
                }
            }
        }

        #[test]
        fn prop_zero_balance_is_absorbing(
            savings in 0u32..500_000,
            income in 0u32..200_000,
            multiplier_pct in 0u32..100,
            drawdown_pct in 90u32..101,
        ) {
            let mut policy = Policy::default();
            policy.conservative_multiplier = multiplier_pct as f64 / 100.0;
            policy.retirement_drawdown_rate = drawdown_pct as f64 / 100.0;
            let profile = Profile {
                age: 50,
                retirement_age_goal: 55,
                current_savings: savings as f64,
                annual_income: income as f64,
                monthly_expenses: None,
                risk_tolerance: RiskTolerance::Low,
                investment_experience: InvestmentExperience::Beginner,
            };
            let trajectory = project(&profile, &policy).expect("valid");

            let mut hit_zero = [false; 3];
            for point in trajectory.points.iter().filter(|p| p.phase == Phase::Retirement) {
                let balances = [
                    point.balance_conservative,
                    point.balance_expected,
                    point.balance_optimistic,
                ];
                for (flag, balance) in hit_zero.iter_mut().zip(balances) {
                    if *flag {
                        prop_assert_eq!(balance, 0.0);
                    }
                    if balance == 0.0 {
                        *flag = true;
                    }
                }
            }
        }
    }
}
