use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    pub(crate) fn tier(self) -> i32 {
        match self {
            RiskTolerance::Low => 0,
            RiskTolerance::Medium => 1,
            RiskTolerance::High => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskTolerance::Low => "low",
            RiskTolerance::Medium => "medium",
            RiskTolerance::High => "high",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum InvestmentExperience {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

/// Normalized user profile handed over by the profile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub age: u32,
    pub retirement_age_goal: u32,
    pub current_savings: f64,
    pub annual_income: f64,
    pub monthly_expenses: Option<f64>,
    pub risk_tolerance: RiskTolerance,
    pub investment_experience: InvestmentExperience,
}

impl Profile {
    pub fn years_to_retirement(&self) -> u32 {
        self.retirement_age_goal.saturating_sub(self.age)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Phase {
    Accumulation,
    Retirement,
}

impl Phase {
    pub fn at(age: u32, retirement_age_goal: u32) -> Self {
        if age < retirement_age_goal {
            Phase::Accumulation
        } else {
            Phase::Retirement
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPoint {
    pub age: u32,
    pub calendar_year: i32,
    pub phase: Phase,
    pub balance_expected: f64,
    pub balance_conservative: f64,
    pub balance_optimistic: f64,
    pub annual_income_equivalent: f64,
    pub monthly_income_equivalent: f64,
}

/// Year-by-year projection ordered by age.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trajectory {
    pub points: Vec<ScenarioPoint>,
}

impl Trajectory {
    pub fn point_at(&self, age: u32) -> Option<&ScenarioPoint> {
        self.points.iter().find(|p| p.age == age)
    }

    pub fn first(&self) -> Option<&ScenarioPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&ScenarioPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub name: String,
    pub investment_type: String,
    pub annual_return_rate: f64,
    pub volatility: f64,
    pub fees_percentage: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Rating {
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFund {
    pub fund: Fund,
    pub net_return: f64,
    pub sharpe_ratio: f64,
    pub sharpe_defined: bool,
    pub rating: Rating,
    pub risk_level: RiskTolerance,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationShare {
    pub asset_class: String,
    pub percent: u32,
}

/// Target asset mix, largest share first. Shares always sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Allocation {
    pub shares: Vec<AllocationShare>,
}

impl Allocation {
    pub fn percent_of(&self, asset_class: &str) -> u32 {
        self.shares
            .iter()
            .find(|s| s.asset_class == asset_class)
            .map(|s| s.percent)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.shares.iter().map(|s| s.percent).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementOutcome {
    pub years_to_retirement: u32,
    pub projected_balance: f64,
    pub monthly_income: f64,
    pub target_annual_income: f64,
    pub target_balance: f64,
    pub shortfall: f64,
    pub recommended_contribution: f64,
    pub total_employer_contributions: f64,
    pub growth_from_returns: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum InsightKind {
    LongHorizon,
    MidHorizon,
    ShortHorizon,
    LowSavingsRate,
    StrongSavingsRate,
    AggressiveNearRetirement,
    ConservativeLongHorizon,
    RiskCapacityMismatch,
    ContributionGap,
    OnTrack,
    TopFund,
    HighFees,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

/// How well one investment type suits the member, with its best funds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentTypeSummary {
    pub investment_type: String,
    pub fund_count: usize,
    pub average_return: f64,
    pub average_fees: f64,
    pub average_volatility: f64,
    pub risk_level: RiskTolerance,
    pub suitability_score: f64,
    pub explanation: String,
    /// Highest annual return first.
    pub funds: Vec<Fund>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub top_funds: Vec<ScoredFund>,
    pub investment_types: Vec<InvestmentTypeSummary>,
    pub allocation: Allocation,
    pub outcome: RetirementOutcome,
    pub insights: Vec<Insight>,
    pub assessed_risk_capacity: RiskTolerance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub fund_count: usize,
    pub average_return: f64,
    pub average_volatility: f64,
    pub average_fees: f64,
    pub sharpe_ratio: f64,
}

/// Return statistics for one investment type. `return_std_dev` is the sample
/// deviation and is absent for a single fund.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorStats {
    pub investment_type: String,
    pub fund_count: usize,
    pub average_return: f64,
    pub return_std_dev: Option<f64>,
    pub average_fees: f64,
    pub average_volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTrends {
    pub top_performing: Vec<Fund>,
    /// Ordered by investment type name.
    pub sectors: Vec<SectorStats>,
    pub risk_metrics: CatalogSummary,
    pub insights: Vec<String>,
}
