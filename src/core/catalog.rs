use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::error::CatalogError;
use super::policy::Policy;
use super::types::{CatalogSummary, Fund, MarketTrends, SectorStats};

/// One spreadsheet row. Only the fund columns are read; every other column
/// of the member dataset is ignored.
#[derive(Debug, Deserialize)]
struct FundRecord {
    #[serde(rename = "Fund_Name", alias = "name", alias = "fund_name")]
    name: String,
    #[serde(rename = "Investment_Type", alias = "investment_type")]
    investment_type: String,
    #[serde(rename = "Annual_Return_Rate", alias = "annual_return_rate")]
    annual_return_rate: f64,
    #[serde(rename = "Volatility", alias = "volatility")]
    volatility: f64,
    #[serde(rename = "Fees_Percentage", alias = "fees_percentage")]
    fees_percentage: f64,
}

impl FundRecord {
    fn into_fund(self, row: usize) -> Result<Fund, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidFund { row, reason };

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(invalid("fund name is empty".to_string()));
        }
        for (label, value) in [
            ("annual return rate", self.annual_return_rate),
            ("volatility", self.volatility),
            ("fees", self.fees_percentage),
        ] {
            if !value.is_finite() {
                return Err(invalid(format!("{label} is not a finite number")));
            }
        }
        if self.volatility < 0.0 {
            return Err(invalid(format!("volatility {} is negative", self.volatility)));
        }
        if self.fees_percentage < 0.0 {
            return Err(invalid(format!("fees {} are negative", self.fees_percentage)));
        }

        Ok(Fund {
            name,
            investment_type: self.investment_type.trim().to_string(),
            annual_return_rate: self.annual_return_rate,
            volatility: self.volatility,
            fees_percentage: self.fees_percentage,
        })
    }
}

/// Reads funds in file order. A fund that appears on several rows keeps its
/// first row.
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Vec<Fund>, CatalogError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut seen = HashSet::new();
    let mut funds = Vec::new();
    let mut duplicates = 0usize;
    for (idx, result) in rdr.deserialize::<FundRecord>().enumerate() {
        // Header is line 1.
        let fund = result?.into_fund(idx + 2)?;
        if seen.insert(fund.name.clone()) {
            funds.push(fund);
        } else {
            duplicates += 1;
        }
    }

    if funds.is_empty() {
        return Err(CatalogError::Empty);
    }
    debug!(funds = funds.len(), duplicates, "parsed fund catalog");
    Ok(funds)
}

pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Fund>, CatalogError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CatalogError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let funds = from_csv_reader(BufReader::new(file))?;
    info!(path = %path.display(), funds = funds.len(), "loaded fund catalog");
    Ok(funds)
}

fn fund(
    name: &str,
    investment_type: &str,
    annual_return_rate: f64,
    volatility: f64,
    fees: f64,
) -> Fund {
    Fund {
        name: name.to_string(),
        investment_type: investment_type.to_string(),
        annual_return_rate,
        volatility,
        fees_percentage: fees,
    }
}

/// Built-in catalog used when no spreadsheet is supplied.
pub fn default_catalog() -> Vec<Fund> {
    vec![
        fund("Diversified Growth ETF", "ETF", 8.2, 3.2, 0.7),
        fund("Balanced Index Fund", "ETF", 7.8, 2.9, 0.9),
        fund("Tech Stocks Fund", "Stocks", 8.2, 4.1, 1.2),
        fund("Australian Shares Fund", "Stocks", 8.5, 4.6, 1.0),
        fund("International Shares ETF", "ETF", 7.9, 3.8, 0.6),
        fund("Government Bond Fund", "Bonds", 4.8, 1.6, 1.1),
        fund("Corporate Bond ETF", "Bonds", 4.2, 1.9, 1.3),
        fund("Property Investment Trust", "Real Estate", 6.9, 3.5, 1.4),
        fund("Infrastructure Fund", "Real Estate", 6.4, 2.7, 1.2),
        fund("Cash Management Trust", "Cash", 3.1, 0.3, 0.4),
    ]
}

/// Market-wide averages across the catalog; `None` when it is empty.
pub fn summarize_catalog(catalog: &[Fund]) -> Option<CatalogSummary> {
    if catalog.is_empty() {
        return None;
    }
    let count = catalog.len() as f64;
    let average = |f: fn(&Fund) -> f64| catalog.iter().map(f).sum::<f64>() / count;

    let average_return = average(|f| f.annual_return_rate);
    let average_volatility = average(|f| f.volatility);
    let average_fees = average(|f| f.fees_percentage);
    let sharpe_ratio = if average_volatility > 0.0 {
        average_return / average_volatility
    } else {
        0.0
    };

    Some(CatalogSummary {
        fund_count: catalog.len(),
        average_return,
        average_volatility,
        average_fees,
        sharpe_ratio,
    })
}

/// Funds grouped by investment type, in type-name order. Each group keeps
/// catalog order.
pub(crate) fn group_by_type(catalog: &[Fund]) -> BTreeMap<&str, Vec<&Fund>> {
    let mut groups: BTreeMap<&str, Vec<&Fund>> = BTreeMap::new();
    for fund in catalog {
        groups.entry(fund.investment_type.as_str()).or_default().push(fund);
    }
    groups
}

pub(crate) fn mean_of(funds: &[&Fund], field: fn(&Fund) -> f64) -> f64 {
    if funds.is_empty() {
        return 0.0;
    }
    funds.iter().map(|f| field(f)).sum::<f64>() / funds.len() as f64
}

/// The `n` funds with the highest annual return; equal returns keep input order.
pub(crate) fn highest_return<'a>(funds: impl IntoIterator<Item = &'a Fund>, n: usize) -> Vec<Fund> {
    let mut ranked: Vec<&Fund> = funds.into_iter().collect();
    ranked.sort_by(|a, b| b.annual_return_rate.total_cmp(&a.annual_return_rate));
    ranked.into_iter().take(n).cloned().collect()
}

fn sector_stats(investment_type: &str, funds: &[&Fund]) -> SectorStats {
    let average_return = mean_of(funds, |f| f.annual_return_rate);
    let return_std_dev = (funds.len() > 1).then(|| {
        let squares: f64 = funds
            .iter()
            .map(|f| (f.annual_return_rate - average_return).powi(2))
            .sum();
        (squares / (funds.len() - 1) as f64).sqrt()
    });

    SectorStats {
        investment_type: investment_type.to_string(),
        fund_count: funds.len(),
        average_return,
        return_std_dev,
        average_fees: mean_of(funds, |f| f.fees_percentage),
        average_volatility: mean_of(funds, |f| f.volatility),
    }
}

/// Best performers, per-type statistics and headline observations across
/// the whole catalog; `None` when it is empty.
pub fn market_trends(catalog: &[Fund], policy: &Policy) -> Option<MarketTrends> {
    let risk_metrics = summarize_catalog(catalog)?;
    let sectors: Vec<SectorStats> = group_by_type(catalog)
        .iter()
        .map(|(investment_type, funds)| sector_stats(investment_type, funds))
        .collect();

    let mut insights = Vec::new();
    let low_fee_cut = policy.market.low_fee_percentage;
    let low_fee: Vec<&Fund> = catalog
        .iter()
        .filter(|f| f.fees_percentage < low_fee_cut)
        .collect();
    if !low_fee.is_empty() {
        insights.push(format!(
            "Funds charging under {low_fee_cut}% in fees return {:.1}% a year on average.",
            mean_of(&low_fee, |f| f.annual_return_rate)
        ));
    }
    let best = sectors.iter().reduce(|best, sector| {
        if sector.average_return > best.average_return {
            sector
        } else {
            best
        }
    });
    if let Some(best) = best {
        insights.push(format!(
            "{} leads the catalog, averaging {:.1}% a year.",
            best.investment_type, best.average_return
        ));
    }

    Some(MarketTrends {
        top_performing: highest_return(catalog, policy.market.top_assets),
        sectors,
        risk_metrics,
        insights,
    })
}
