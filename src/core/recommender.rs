use std::cmp::Ordering;

use tracing::debug;

use super::catalog::{group_by_type, highest_return, mean_of};
use super::error::EngineError;
use super::insights::{InsightContext, assess_risk_capacity, generate_insights};
use super::policy::{HorizonTilt, Policy};
use super::projector::{ScenarioRates, employer_contribution, simulate_expected, validate_profile};
use super::solver::{required_monthly_contribution, retirement_target};
use super::types::{
    Allocation, AllocationShare, Fund, InvestmentExperience, InvestmentTypeSummary, Profile,
    Rating, RecommendationResult, RetirementOutcome, RiskTolerance, ScoredFund,
};

pub fn recommend(
    profile: &Profile,
    catalog: &[Fund],
    policy: &Policy,
) -> Result<RecommendationResult, EngineError> {
    validate_profile(profile)?;
    if catalog.is_empty() {
        return Err(EngineError::EmptyCatalog);
    }

    let mut top_funds = rank_funds(catalog, policy);
    top_funds.truncate(policy.top_fund_count);

    let investment_types = summarize_investment_types(profile, catalog, policy);
    let allocation = derive_allocation(profile, policy);
    let outcome = retirement_outcome(profile, policy);
    let assessed_risk_capacity = assess_risk_capacity(profile);
    let insights = generate_insights(&InsightContext {
        profile,
        policy,
        outcome: &outcome,
        top_funds: &top_funds,
        risk_capacity: assessed_risk_capacity,
    });

    debug!(
        catalog = catalog.len(),
        top_funds = top_funds.len(),
        projected_balance = outcome.projected_balance,
        recommended_contribution = outcome.recommended_contribution,
        insights = insights.len(),
        "built recommendation"
    );

    Ok(RecommendationResult {
        top_funds,
        investment_types,
        allocation,
        outcome,
        insights,
        assessed_risk_capacity,
    })
}

pub fn score_fund(fund: &Fund, policy: &Policy) -> ScoredFund {
    let net_return = fund.annual_return_rate - fund.fees_percentage;
    let sharpe_defined = fund.volatility > 0.0;
    let sharpe_ratio = if sharpe_defined {
        net_return / fund.volatility
    } else {
        debug!(fund = %fund.name, "zero volatility, ranking after risk-scored funds");
        0.0
    };

    let rating = if net_return >= policy.rating.good {
        Rating::Good
    } else if net_return >= policy.rating.fair {
        Rating::Fair
    } else {
        Rating::Poor
    };

    ScoredFund {
        fund: fund.clone(),
        net_return,
        sharpe_ratio,
        sharpe_defined,
        rating,
        risk_level: volatility_band(fund.volatility, policy),
        rank: 0,
    }
}

fn volatility_band(volatility: f64, policy: &Policy) -> RiskTolerance {
    if volatility < policy.fund_risk.low_below {
        RiskTolerance::Low
    } else if volatility < policy.fund_risk.medium_below {
        RiskTolerance::Medium
    } else {
        RiskTolerance::High
    }
}

/// Fit of an investment type to the member, rounded to hundredths and capped
/// at 1. Averages are in percent.
pub fn suitability_score(
    profile: &Profile,
    risk_level: RiskTolerance,
    average_return: f64,
    average_fees: f64,
    policy: &Policy,
) -> f64 {
    let weights = &policy.suitability;
    let mut score = match (profile.risk_tolerance.tier() - risk_level.tier()).abs() {
        0 => weights.risk_match,
        1 => weights.risk_adjacent,
        _ => 0.0,
    };
    score += weights
        .return_bands
        .iter()
        .find(|band| average_return > band.threshold)
        .map_or(0.0, |band| band.points);
    score += weights
        .fee_bands
        .iter()
        .find(|band| average_fees < band.threshold)
        .map_or(0.0, |band| band.points);
    if matches!(
        (profile.investment_experience, risk_level),
        (InvestmentExperience::Beginner, RiskTolerance::Low)
            | (InvestmentExperience::Expert, RiskTolerance::High)
    ) {
        score += weights.experience_bonus;
    }

    (score.min(1.0) * 100.0).round() / 100.0
}

fn type_explanation(investment_type: &str, profile: &Profile) -> String {
    let years = profile.years_to_retirement();
    match investment_type {
        "Stocks" => format!("Shares give the most growth potential over a {years}-year horizon."),
        "Bonds" => format!(
            "Bonds pay steadier returns that suit a {} risk tolerance.",
            profile.risk_tolerance.label()
        ),
        "ETF" => format!("ETFs spread your money widely at low cost over the next {years} years."),
        "Real Estate" => {
            "Property protects against inflation and grows steadily over the long term."
                .to_string()
        }
        other => format!("{other} investments fit your goals and risk profile."),
    }
}

/// Groups the catalog by investment type and keeps the best-suited types,
/// highest score first. Equal scores favour the type with more funds, then
/// the type name.
pub fn summarize_investment_types(
    profile: &Profile,
    catalog: &[Fund],
    policy: &Policy,
) -> Vec<InvestmentTypeSummary> {
    let weights = &policy.suitability;
    let mut summaries: Vec<InvestmentTypeSummary> = group_by_type(catalog)
        .into_iter()
        .map(|(investment_type, funds)| {
            let average_return = mean_of(&funds, |f| f.annual_return_rate);
            let average_fees = mean_of(&funds, |f| f.fees_percentage);
            let average_volatility = mean_of(&funds, |f| f.volatility);
            let risk_level = volatility_band(average_volatility, policy);
            InvestmentTypeSummary {
                investment_type: investment_type.to_string(),
                fund_count: funds.len(),
                average_return,
                average_fees,
                average_volatility,
                risk_level,
                suitability_score: suitability_score(
                    profile,
                    risk_level,
                    average_return,
                    average_fees,
                    policy,
                ),
                explanation: type_explanation(investment_type, profile),
                funds: highest_return(funds.iter().copied(), weights.funds_per_type),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.suitability_score
            .total_cmp(&a.suitability_score)
            .then_with(|| b.fund_count.cmp(&a.fund_count))
    });
    summaries.truncate(weights.type_count);
    summaries
}

fn compare_scored(a: &ScoredFund, b: &ScoredFund) -> Ordering {
    b.sharpe_defined
        .cmp(&a.sharpe_defined)
        .then_with(|| b.sharpe_ratio.total_cmp(&a.sharpe_ratio))
        .then_with(|| b.net_return.total_cmp(&a.net_return))
        .then_with(|| a.fund.fees_percentage.total_cmp(&b.fund.fees_percentage))
}

/// Scores every fund and returns them best first with 1-based ranks. Exact
/// ties keep catalog order.
pub fn rank_funds(catalog: &[Fund], policy: &Policy) -> Vec<ScoredFund> {
    let mut scored: Vec<ScoredFund> = catalog.iter().map(|f| score_fund(f, policy)).collect();
    // Stable sort, so catalog order breaks exact ties.
    scored.sort_by(compare_scored);
    for (idx, fund) in scored.iter_mut().enumerate() {
        fund.rank = idx + 1;
    }
    scored
}

fn apply_horizon_tilt(weights: &mut Vec<(String, f64)>, tilt: &HorizonTilt, years: u32) {
    let (from, to) = if years > tilt.long_horizon_years {
        (&tilt.defensive_class, &tilt.growth_class)
    } else if years < tilt.short_horizon_years {
        (&tilt.growth_class, &tilt.defensive_class)
    } else {
        return;
    };

    let Some(source) = weights.iter_mut().find(|(class, _)| class == from) else {
        return;
    };
    let moved = tilt.shift.min(source.1);
    source.1 -= moved;

    match weights.iter_mut().find(|(class, _)| class == to) {
        Some(target) => target.1 += moved,
        None => weights.push((to.clone(), moved)),
    }
}

fn normalize_to_percent(weights: Vec<(String, f64)>) -> Allocation {
    let total: f64 = weights.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return Allocation { shares: Vec::new() };
    }

    let mut shares: Vec<AllocationShare> = weights
        .into_iter()
        .map(|(asset_class, weight)| AllocationShare {
            asset_class,
            percent: (weight.max(0.0) / total * 100.0).round() as u32,
        })
        .collect();

    // Stable, so equal shares keep table order and the first largest absorbs rounding.
    shares.sort_by(|a, b| b.percent.cmp(&a.percent));
    let assigned: i64 = shares.iter().map(|s| i64::from(s.percent)).sum();
    let residue = 100 - assigned;
    if let Some(largest) = shares.first_mut() {
        largest.percent = (i64::from(largest.percent) + residue).max(0) as u32;
    }
    shares.retain(|s| s.percent > 0);
    shares.sort_by(|a, b| b.percent.cmp(&a.percent));

    Allocation { shares }
}

/// Risk-tier lookup, optionally tilted by the years left to retirement.
pub fn derive_allocation(profile: &Profile, policy: &Policy) -> Allocation {
    let mut weights: Vec<(String, f64)> = policy
        .allocation
        .table_for(profile.risk_tolerance)
        .iter()
        .map(|w| (w.asset_class.clone(), w.weight))
        .collect();

    if let Some(tilt) = &policy.horizon_tilt {
        apply_horizon_tilt(&mut weights, tilt, profile.years_to_retirement());
    }

    normalize_to_percent(weights)
}

pub fn retirement_outcome(profile: &Profile, policy: &Policy) -> RetirementOutcome {
    let years_to_retirement = profile.years_to_retirement();
    let projected_balance = simulate_expected(profile, policy, profile.retirement_age_goal);
    let monthly_income = projected_balance * policy.safe_withdrawal_rate / 12.0;

    let target = retirement_target(profile, policy);
    let shortfall = (target.balance - projected_balance).max(0.0);
    let rate = ScenarioRates::for_profile(profile, policy).expected;
    let recommended_contribution =
        required_monthly_contribution(shortfall, rate, years_to_retirement);

    let total_employer_contributions =
        employer_contribution(profile, policy) * f64::from(years_to_retirement);

    RetirementOutcome {
        years_to_retirement,
        projected_balance,
        monthly_income,
        target_annual_income: target.annual_income,
        target_balance: target.balance,
        shortfall,
        recommended_contribution,
        total_employer_contributions,
        growth_from_returns: projected_balance
            - profile.current_savings
            - total_employer_contributions,
    }
}
