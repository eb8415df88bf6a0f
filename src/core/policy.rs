use std::path::Path;

use serde::Deserialize;

use super::error::PolicyError;
use super::types::RiskTolerance;

/// Annual growth rate per risk tier, as a fraction (0.07 = 7%).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReturnTable {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for ReturnTable {
    fn default() -> Self {
        Self {
            low: 0.05,
            medium: 0.07,
            high: 0.09,
        }
    }
}

impl ReturnTable {
    pub fn rate_for(&self, risk: RiskTolerance) -> f64 {
        match risk {
            RiskTolerance::Low => self.low,
            RiskTolerance::Medium => self.medium,
            RiskTolerance::High => self.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetWeight {
    pub asset_class: String,
    pub weight: f64,
}

fn weights(pairs: &[(&str, f64)]) -> Vec<AssetWeight> {
    pairs
        .iter()
        .map(|(asset_class, weight)| AssetWeight {
            asset_class: (*asset_class).to_string(),
            weight: *weight,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AllocationTables {
    pub low: Vec<AssetWeight>,
    pub medium: Vec<AssetWeight>,
    pub high: Vec<AssetWeight>,
}

impl Default for AllocationTables {
    fn default() -> Self {
        Self {
            low: weights(&[("Bonds", 60.0), ("Stocks", 25.0), ("Cash", 15.0)]),
            medium: weights(&[
                ("Stocks", 50.0),
                ("Bonds", 30.0),
                ("Real Estate", 10.0),
                ("Cash", 10.0),
            ]),
            high: weights(&[
                ("Stocks", 70.0),
                ("Real Estate", 15.0),
                ("Bonds", 10.0),
                ("Cash", 5.0),
            ]),
        }
    }
}

impl AllocationTables {
    pub fn table_for(&self, risk: RiskTolerance) -> &[AssetWeight] {
        match risk {
            RiskTolerance::Low => &self.low,
            RiskTolerance::Medium => &self.medium,
            RiskTolerance::High => &self.high,
        }
    }
}

/// Moves weight between a growth and a defensive asset class depending on
/// how many years remain until retirement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HorizonTilt {
    pub long_horizon_years: u32,
    pub short_horizon_years: u32,
    pub shift: f64,
    pub growth_class: String,
    pub defensive_class: String,
}

impl Default for HorizonTilt {
    fn default() -> Self {
        Self {
            long_horizon_years: 25,
            short_horizon_years: 10,
            shift: 5.0,
            growth_class: "Stocks".to_string(),
            defensive_class: "Bonds".to_string(),
        }
    }
}

/// Net-return thresholds in percent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RatingThresholds {
    pub good: f64,
    pub fair: f64,
}

impl Default for RatingThresholds {
    fn default() -> Self {
        Self {
            good: 8.0,
            fair: 6.0,
        }
    }
}

/// Volatility bands in percent used to label a fund's risk level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VolatilityBands {
    pub low_below: f64,
    pub medium_below: f64,
}

impl Default for VolatilityBands {
    fn default() -> Self {
        Self {
            low_below: 2.0,
            medium_below: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    pub long_horizon_years: u32,
    pub short_horizon_years: u32,
    pub low_savings_rate: f64,
    pub strong_savings_rate: f64,
    pub high_fee_percentage: f64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            long_horizon_years: 25,
            short_horizon_years: 10,
            low_savings_rate: 0.10,
            strong_savings_rate: 0.20,
            high_fee_percentage: 1.5,
        }
    }
}

/// Awards `points` once a value crosses `threshold`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreBand {
    pub threshold: f64,
    pub points: f64,
}

impl ScoreBand {
    fn new(threshold: f64, points: f64) -> Self {
        Self { threshold, points }
    }
}

/// Points for how well an investment type suits a member. The total is
/// capped at 1.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SuitabilityWeights {
    pub risk_match: f64,
    pub risk_adjacent: f64,
    /// Average return strictly above the threshold, highest band first.
    pub return_bands: Vec<ScoreBand>,
    /// Average fees strictly below the threshold, lowest band first.
    pub fee_bands: Vec<ScoreBand>,
    /// Beginners on low-risk types and experts on high-risk types.
    pub experience_bonus: f64,
    pub type_count: usize,
    pub funds_per_type: usize,
}

impl Default for SuitabilityWeights {
    fn default() -> Self {
        Self {
            risk_match: 0.4,
            risk_adjacent: 0.2,
            return_bands: vec![
                ScoreBand::new(7.0, 0.3),
                ScoreBand::new(5.0, 0.2),
                ScoreBand::new(3.0, 0.1),
            ],
            fee_bands: vec![ScoreBand::new(1.0, 0.2), ScoreBand::new(1.5, 0.1)],
            experience_bonus: 0.1,
            type_count: 3,
            funds_per_type: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarketThresholds {
    pub top_assets: usize,
    pub low_fee_percentage: f64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        Self {
            top_assets: 5,
            low_fee_percentage: 1.0,
        }
    }
}

/// Every assumption the engine relies on. `Policy::default()` carries the
/// production values; tests and deployments can override any field from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub expected_returns: ReturnTable,
    pub conservative_multiplier: f64,
    pub optimistic_multiplier: f64,
    pub employer_contribution_rate: f64,
    pub retirement_drawdown_rate: f64,
    pub safe_withdrawal_rate: f64,
    pub years_after_retirement: u32,
    pub horizon_age_cap: u32,
    pub start_year: i32,
    pub replacement_ratio: f64,
    pub top_fund_count: usize,
    pub allocation: AllocationTables,
    pub horizon_tilt: Option<HorizonTilt>,
    pub rating: RatingThresholds,
    pub fund_risk: VolatilityBands,
    pub insights: InsightThresholds,
    pub suitability: SuitabilityWeights,
    pub market: MarketThresholds,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            expected_returns: ReturnTable::default(),
            conservative_multiplier: 0.6,
            optimistic_multiplier: 1.4,
            employer_contribution_rate: 0.11,
            retirement_drawdown_rate: 0.04,
            safe_withdrawal_rate: 0.04,
            years_after_retirement: 5,
            horizon_age_cap: 85,
            start_year: 2025,
            replacement_ratio: 0.8,
            top_fund_count: 5,
            allocation: AllocationTables::default(),
            horizon_tilt: None,
            rating: RatingThresholds::default(),
            fund_risk: VolatilityBands::default(),
            insights: InsightThresholds::default(),
            suitability: SuitabilityWeights::default(),
            market: MarketThresholds::default(),
        }
    }
}

impl Policy {
    pub fn from_toml_str(content: &str) -> Result<Self, PolicyError> {
        let policy: Policy = toml::from_str(content)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let invalid = |msg: String| Err(PolicyError::Invalid(msg));

        for (name, rate) in [
            ("expected_returns.low", self.expected_returns.low),
            ("expected_returns.medium", self.expected_returns.medium),
            ("expected_returns.high", self.expected_returns.high),
            ("employer_contribution_rate", self.employer_contribution_rate),
        ] {
            if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
                return invalid(format!("{name} must be in [0, 1), got {rate}"));
            }
        }

        if !(0.0..=1.0).contains(&self.retirement_drawdown_rate) {
            return invalid(format!(
                "retirement_drawdown_rate must be in [0, 1], got {}",
                self.retirement_drawdown_rate
            ));
        }

        if !self.safe_withdrawal_rate.is_finite()
            || self.safe_withdrawal_rate <= 0.0
            || self.safe_withdrawal_rate >= 1.0
        {
            return invalid(format!(
                "safe_withdrawal_rate must be in (0, 1), got {}",
                self.safe_withdrawal_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.conservative_multiplier) {
            return invalid(format!(
                "conservative_multiplier must be in [0, 1], got {}",
                self.conservative_multiplier
            ));
        }

        if !self.optimistic_multiplier.is_finite() || self.optimistic_multiplier < 1.0 {
            return invalid(format!(
                "optimistic_multiplier must be >= 1, got {}",
                self.optimistic_multiplier
            ));
        }

        if self.optimistic_multiplier * self.expected_returns.high >= 1.0 {
            return invalid("optimistic high-tier rate must stay below 100%".to_string());
        }

        if !self.replacement_ratio.is_finite() || self.replacement_ratio <= 0.0 {
            return invalid("replacement_ratio must be > 0".to_string());
        }

        if self.top_fund_count == 0 {
            return invalid("top_fund_count must be > 0".to_string());
        }

        for (name, table) in [
            ("allocation.low", &self.allocation.low),
            ("allocation.medium", &self.allocation.medium),
            ("allocation.high", &self.allocation.high),
        ] {
            if table.is_empty() {
                return invalid(format!("{name} must contain at least one asset class"));
            }
            if table.len() > 10 {
                return invalid(format!("{name} supports at most 10 asset classes"));
            }
            if table.iter().any(|w| !w.weight.is_finite() || w.weight < 0.0) {
                return invalid(format!("{name} weights must be >= 0"));
            }
            if table.iter().map(|w| w.weight).sum::<f64>() <= 0.0 {
                return invalid(format!("{name} weights must sum to > 0"));
            }
        }

        if let Some(tilt) = &self.horizon_tilt {
            if !tilt.shift.is_finite() || tilt.shift < 0.0 {
                return invalid("horizon_tilt.shift must be >= 0".to_string());
            }
            if tilt.short_horizon_years > tilt.long_horizon_years {
                return invalid(
                    "horizon_tilt.short_horizon_years cannot exceed long_horizon_years"
                        .to_string(),
                );
            }
        }

        if self.rating.fair > self.rating.good {
            return invalid("rating.fair cannot exceed rating.good".to_string());
        }

        if self.fund_risk.low_below > self.fund_risk.medium_below {
            return invalid("fund_risk.low_below cannot exceed fund_risk.medium_below".to_string());
        }

        if self.insights.low_savings_rate > self.insights.strong_savings_rate {
            return invalid(
                "insights.low_savings_rate cannot exceed insights.strong_savings_rate".to_string(),
            );
        }

        let suitability = &self.suitability;
        let bands = suitability.return_bands.iter().chain(&suitability.fee_bands);
        for points in [
            suitability.risk_match,
            suitability.risk_adjacent,
            suitability.experience_bonus,
        ]
        .into_iter()
        .chain(bands.map(|b| b.points))
        {
            if !points.is_finite() || points < 0.0 {
                return invalid(format!("suitability points must be >= 0, got {points}"));
            }
        }
        if suitability
            .return_bands
            .windows(2)
            .any(|pair| pair[0].threshold < pair[1].threshold)
        {
            return invalid("suitability.return_bands must run from highest threshold".to_string());
        }
        if suitability
            .fee_bands
            .windows(2)
            .any(|pair| pair[0].threshold > pair[1].threshold)
        {
            return invalid("suitability.fee_bands must run from lowest threshold".to_string());
        }
        if suitability.type_count == 0 || suitability.funds_per_type == 0 {
            return invalid(
                "suitability.type_count and funds_per_type must be > 0".to_string(),
            );
        }

        if self.market.top_assets == 0 {
            return invalid("market.top_assets must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        Policy::default().validate().expect("defaults must validate");
    }

    #[test]
    fn default_allocation_tables_sum_to_one_hundred() {
        let tables = AllocationTables::default();
        for table in [&tables.low, &tables.medium, &tables.high] {
            let total: f64 = table.iter().map(|w| w.weight).sum();
            assert!((total - 100.0).abs() < 1e-9, "table sums to {total}");
        }
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let policy = Policy::from_toml_str(
            r#"
            employer_contribution_rate = 0.12
            top_fund_count = 3

            [expected_returns]
            medium = 0.06
            "#,
        )
        .expect("valid toml");

        assert_eq!(policy.employer_contribution_rate, 0.12);
        assert_eq!(policy.top_fund_count, 3);
        assert_eq!(policy.expected_returns.medium, 0.06);
        assert_eq!(policy.expected_returns.low, 0.05);
        assert_eq!(policy.safe_withdrawal_rate, 0.04);
        assert!(policy.horizon_tilt.is_none());
    }

    #[test]
    fn toml_can_enable_horizon_tilt_and_replace_tables() {
        let policy = Policy::from_toml_str(
            r#"
            [horizon_tilt]
            shift = 10.0

            [allocation]
            low = [
                { asset_class = "Bonds", weight = 3.0 },
                { asset_class = "Cash", weight = 1.0 },
            ]
            "#,
        )
        .expect("valid toml");

        let tilt = policy.horizon_tilt.expect("tilt enabled");
        assert_eq!(tilt.shift, 10.0);
        assert_eq!(tilt.growth_class, "Stocks");
        assert_eq!(policy.allocation.low.len(), 2);
        assert_eq!(policy.allocation.medium.len(), 4);
    }

    #[test]
    fn rejects_conservative_multiplier_above_one() {
        let mut policy = Policy::default();
        policy.conservative_multiplier = 1.2;
        let err = policy.validate().expect_err("must reject");
        assert!(err.to_string().contains("conservative_multiplier"));
    }

    #[test]
    fn rejects_negative_expected_return() {
        let err = Policy::from_toml_str("[expected_returns]\nlow = -0.01\n")
            .expect_err("must reject");
        assert!(err.to_string().contains("expected_returns.low"));
    }

    #[test]
    fn rejects_empty_allocation_table() {
        let mut policy = Policy::default();
        policy.allocation.high.clear();
        let err = policy.validate().expect_err("must reject");
        assert!(err.to_string().contains("allocation.high"));
    }

    #[test]
    fn rejects_unordered_rating_thresholds() {
        let mut policy = Policy::default();
        policy.rating.fair = 9.0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn toml_replaces_suitability_bands() {
        let policy = Policy::from_toml_str(
            r#"
            [suitability]
            experience_bonus = 0.05
            return_bands = [{ threshold = 6.0, points = 0.5 }]

            [market]
            low_fee_percentage = 0.8
            "#,
        )
        .expect("valid toml");

        assert_eq!(policy.suitability.experience_bonus, 0.05);
        assert_eq!(policy.suitability.return_bands, vec![ScoreBand::new(6.0, 0.5)]);
        assert_eq!(policy.suitability.fee_bands.len(), 2);
        assert_eq!(policy.market.low_fee_percentage, 0.8);
        assert_eq!(policy.market.top_assets, 5);
    }

    #[test]
    fn rejects_return_bands_out_of_order() {
        let mut policy = Policy::default();
        policy.suitability.return_bands.reverse();
        let err = policy.validate().expect_err("must reject");
        assert!(err.to_string().contains("return_bands"));
    }

    #[test]
    fn rejects_negative_suitability_points() {
        let mut policy = Policy::default();
        policy.suitability.fee_bands[1].points = -0.1;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn rejects_empty_market_listing() {
        let mut policy = Policy::default();
        policy.market.top_assets = 0;
        let err = policy.validate().expect_err("must reject");
        assert!(err.to_string().contains("market.top_assets"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Policy::from_toml_str("top_fund_count = \"five\"").expect_err("must reject");
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Policy::load("/definitely/not/here/policy.toml").expect_err("must reject");
        assert!(matches!(err, PolicyError::Read { .. }));
    }
}
