pub mod catalog;
mod error;
mod insights;
mod policy;
mod projector;
mod recommender;
mod solver;
mod types;

pub use error::{CatalogError, EngineError, PolicyError};
pub use insights::{assess_risk_capacity, format_currency};
pub use policy::{
    AllocationTables, AssetWeight, HorizonTilt, InsightThresholds, MarketThresholds, Policy,
    RatingThresholds, ReturnTable, ScoreBand, SuitabilityWeights, VolatilityBands,
};
pub use projector::{
    MAX_RETIREMENT_AGE, ScenarioRates, employer_contribution, expected_balance_at, project,
};
pub use recommender::{
    derive_allocation, rank_funds, recommend, retirement_outcome, score_fund, suitability_score,
    summarize_investment_types,
};
pub use solver::{RetirementTarget, required_monthly_contribution, retirement_target};
pub use types::{
    Allocation, AllocationShare, CatalogSummary, Fund, Insight, InsightKind, InvestmentExperience,
    InvestmentTypeSummary, MarketTrends, Phase, Profile, Rating, RecommendationResult,
    RetirementOutcome, RiskTolerance, ScenarioPoint, ScoredFund, SectorStats, Trajectory,
};
