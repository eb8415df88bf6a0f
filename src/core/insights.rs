use super::policy::Policy;
use super::types::{Insight, InsightKind, Profile, RetirementOutcome, RiskTolerance, ScoredFund};

pub struct InsightContext<'a> {
    pub profile: &'a Profile,
    pub policy: &'a Policy,
    pub outcome: &'a RetirementOutcome,
    pub top_funds: &'a [ScoredFund],
    pub risk_capacity: RiskTolerance,
}

// (exclusive lower bound, points); first matching band wins.
const INCOME_BANDS: [(f64, u32); 4] = [
    (150_000.0, 30),
    (100_000.0, 25),
    (70_000.0, 20),
    (50_000.0, 15),
];
const SAVINGS_BANDS: [(f64, u32); 4] = [
    (500_000.0, 20),
    (200_000.0, 15),
    (100_000.0, 10),
    (50_000.0, 5),
];

fn band_points(value: f64, bands: &[(f64, u32)], fallback: u32) -> u32 {
    bands
        .iter()
        .find(|(floor, _)| value > *floor)
        .map(|(_, points)| *points)
        .unwrap_or(fallback)
}

/// Heuristic capacity to bear risk from age, income, savings and horizon,
/// scored out of 100.
pub fn assess_risk_capacity(profile: &Profile) -> RiskTolerance {
    let age_points = match profile.age {
        0..30 => 30,
        30..40 => 25,
        40..50 => 20,
        50..60 => 10,
        _ => 0,
    };
    let income_points = band_points(profile.annual_income, &INCOME_BANDS, 10);
    let savings_points = band_points(profile.current_savings, &SAVINGS_BANDS, 0);
    let horizon_points = match profile.years_to_retirement() {
        31.. => 20,
        21..=30 => 15,
        11..=20 => 10,
        _ => 5,
    };

    let score = (age_points + income_points + savings_points + horizon_points).min(100);
    if score > 70 {
        RiskTolerance::High
    } else if score > 40 {
        RiskTolerance::Medium
    } else {
        RiskTolerance::Low
    }
}

pub fn format_currency(amount: f64) -> String {
    if amount >= 1_000_000.0 {
        format!("${:.1}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("${:.0}K", amount / 1_000.0)
    } else {
        format!("${amount:.0}")
    }
}

fn insight(kind: InsightKind, message: String) -> Insight {
    Insight { kind, message }
}

fn horizon_insight(ctx: &InsightContext<'_>) -> Insight {
    let years = ctx.outcome.years_to_retirement;
    let thresholds = &ctx.policy.insights;
    if years >= thresholds.long_horizon_years {
        insight(
            InsightKind::LongHorizon,
            format!(
                "You have {years} years until retirement, so long-term compounding can do much of the work."
            ),
        )
    } else if years <= thresholds.short_horizon_years {
        insight(
            InsightKind::ShortHorizon,
            format!(
                "Retirement is {years} years away; protecting what you have built matters more than chasing returns."
            ),
        )
    } else {
        insight(
            InsightKind::MidHorizon,
            format!(
                "With {years} years to retirement, balance growth assets with steadier holdings."
            ),
        )
    }
}

fn savings_rate_insight(ctx: &InsightContext<'_>) -> Option<Insight> {
    let expenses = ctx.profile.monthly_expenses?;
    let income = ctx.profile.annual_income;
    if income <= 0.0 {
        return None;
    }
    let rate = (income - expenses * 12.0) / income;
    let thresholds = &ctx.policy.insights;
    let percent = (rate * 100.0).round();

    if rate < thresholds.low_savings_rate {
        Some(insight(
            InsightKind::LowSavingsRate,
            format!(
                "You are saving about {percent:.0}% of your income; lifting that towards {:.0}% would strengthen your retirement position.",
                thresholds.strong_savings_rate * 100.0
            ),
        ))
    } else if rate >= thresholds.strong_savings_rate {
        Some(insight(
            InsightKind::StrongSavingsRate,
            format!("Saving about {percent:.0}% of your income puts you well ahead of typical savers."),
        ))
    } else {
        None
    }
}

fn risk_horizon_insight(ctx: &InsightContext<'_>) -> Option<Insight> {
    let years = ctx.outcome.years_to_retirement;
    let thresholds = &ctx.policy.insights;
    match ctx.profile.risk_tolerance {
        RiskTolerance::High if years <= thresholds.short_horizon_years => Some(insight(
            InsightKind::AggressiveNearRetirement,
            "A high-risk portfolio this close to retirement leaves little time to recover from a downturn."
                .to_string(),
        )),
        RiskTolerance::Low if years >= thresholds.long_horizon_years => Some(insight(
            InsightKind::ConservativeLongHorizon,
            format!(
                "A low-risk setting over a {years}-year horizon may leave meaningful growth on the table."
            ),
        )),
        _ => None,
    }
}

fn risk_capacity_insight(ctx: &InsightContext<'_>) -> Option<Insight> {
    let declared = ctx.profile.risk_tolerance;
    if (declared.tier() - ctx.risk_capacity.tier()).abs() < 2 {
        return None;
    }
    Some(insight(
        InsightKind::RiskCapacityMismatch,
        format!(
            "Your declared {} risk tolerance differs from your assessed {} risk capacity; consider reviewing your investment option.",
            declared.label(),
            ctx.risk_capacity.label()
        ),
    ))
}

fn contribution_insight(ctx: &InsightContext<'_>) -> Insight {
    let outcome = ctx.outcome;
    if outcome.recommended_contribution > 0.0 {
        insight(
            InsightKind::ContributionGap,
            format!(
                "Adding about {} a month would close the gap to your {} retirement target.",
                format_currency(outcome.recommended_contribution),
                format_currency(outcome.target_balance)
            ),
        )
    } else {
        insight(
            InsightKind::OnTrack,
            format!(
                "Your projected balance of {} meets your retirement income target.",
                format_currency(outcome.projected_balance)
            ),
        )
    }
}

fn top_fund_insight(ctx: &InsightContext<'_>) -> Option<Insight> {
    let best = ctx.top_funds.first()?;
    Some(insight(
        InsightKind::TopFund,
        format!(
            "{} ranks first with a risk-adjusted score of {:.2} and a net return of {:.1}%.",
            best.fund.name, best.sharpe_ratio, best.net_return
        ),
    ))
}

fn fee_insight(ctx: &InsightContext<'_>) -> Option<Insight> {
    if ctx.top_funds.is_empty() {
        return None;
    }
    let average = ctx
        .top_funds
        .iter()
        .map(|s| s.fund.fees_percentage)
        .sum::<f64>()
        / ctx.top_funds.len() as f64;
    if average <= ctx.policy.insights.high_fee_percentage {
        return None;
    }
    Some(insight(
        InsightKind::HighFees,
        format!(
            "Your shortlisted funds average {average:.2}% in fees; lower-cost options keep more of your returns."
        ),
    ))
}

pub fn generate_insights(ctx: &InsightContext<'_>) -> Vec<Insight> {
    let mut insights = vec![horizon_insight(ctx)];
    insights.extend(savings_rate_insight(ctx));
    insights.extend(risk_horizon_insight(ctx));
    insights.extend(risk_capacity_insight(ctx));
    insights.push(contribution_insight(ctx));
    insights.extend(top_fund_insight(ctx));
    insights.extend(fee_insight(ctx));
    insights
}
