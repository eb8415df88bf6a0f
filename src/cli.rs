use std::path::PathBuf;

use anyhow::Context;
use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use crate::api::{self, AppState};
use crate::core::catalog::{default_catalog, load_csv};
use crate::core::{Fund, InvestmentExperience, Policy, Profile, RiskTolerance, project, recommend};

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement projections and superannuation fund recommendations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Print the year-by-year projection for one profile
    Project {
        #[command(flatten)]
        profile: ProfileArgs,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Print ranked funds, allocation and insights for one profile
    Recommend {
        #[command(flatten)]
        profile: ProfileArgs,
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliRiskTolerance {
    Low,
    Medium,
    High,
}

impl From<CliRiskTolerance> for RiskTolerance {
    fn from(value: CliRiskTolerance) -> Self {
        match value {
            CliRiskTolerance::Low => RiskTolerance::Low,
            CliRiskTolerance::Medium => RiskTolerance::Medium,
            CliRiskTolerance::High => RiskTolerance::High,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum CliExperience {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl From<CliExperience> for InvestmentExperience {
    fn from(value: CliExperience) -> Self {
        match value {
            CliExperience::Beginner => InvestmentExperience::Beginner,
            CliExperience::Intermediate => InvestmentExperience::Intermediate,
            CliExperience::Expert => InvestmentExperience::Expert,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[arg(long)]
    age: u32,
    #[arg(long, default_value_t = api::DEFAULT_RETIREMENT_AGE)]
    retirement_age_goal: u32,
    #[arg(long, default_value_t = 0.0)]
    current_savings: f64,
    #[arg(long)]
    annual_income: f64,
    #[arg(long, help = "Current monthly spending; sets the retirement income target")]
    monthly_expenses: Option<f64>,
    #[arg(long, value_enum)]
    risk_tolerance: CliRiskTolerance,
    #[arg(long, value_enum, default_value_t = CliExperience::Intermediate)]
    investment_experience: CliExperience,
}

impl ProfileArgs {
    fn to_profile(&self) -> Profile {
        Profile {
            age: self.age,
            retirement_age_goal: self.retirement_age_goal,
            current_savings: self.current_savings,
            annual_income: self.annual_income,
            monthly_expenses: self.monthly_expenses,
            risk_tolerance: self.risk_tolerance.into(),
            investment_experience: self.investment_experience.into(),
        }
    }
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[arg(long, help = "Fund spreadsheet (CSV); the built-in catalog is used when omitted")]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[arg(long, help = "Policy overrides (TOML)")]
    policy: Option<PathBuf>,
    #[arg(long, help = "Calendar year of the first projection point; defaults to this year")]
    start_year: Option<i32>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve {
                port,
                catalog,
                policy,
            } => {
                let state = AppState::new(load_policy(&policy)?, load_catalog(&catalog)?);
                api::run_http_server(port, state)
                    .await
                    .context("HTTP server failed")?;
            }
            Command::Project { profile, policy } => {
                let policy = load_policy(&policy)?;
                let trajectory = project(&profile.to_profile(), &policy)?;
                print_json(&trajectory)?;
            }
            Command::Recommend {
                profile,
                catalog,
                policy,
            } => {
                let policy = load_policy(&policy)?;
                let catalog = load_catalog(&catalog)?;
                let result = recommend(&profile.to_profile(), &catalog, &policy)?;
                print_json(&result)?;
            }
        }
        Ok(())
    }
}

/// `--start-year` wins over the policy file; without it the current
/// calendar year is used.
fn load_policy(args: &PolicyArgs) -> anyhow::Result<Policy> {
    let mut policy = match &args.policy {
        Some(path) => Policy::load(path)
            .with_context(|| format!("loading policy from {}", path.display()))?,
        None => Policy::default(),
    };
    policy.start_year = args.start_year.unwrap_or_else(|| Local::now().year());
    Ok(policy)
}

fn load_catalog(args: &CatalogArgs) -> anyhow::Result<Vec<Fund>> {
    match &args.catalog {
        Some(path) => {
            load_csv(path).with_context(|| format!("loading catalog from {}", path.display()))
        }
        None => {
            let funds = default_catalog();
            info!(funds = funds.len(), "using built-in fund catalog");
            Ok(funds)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialising output")?;
    println!("{text}");
    Ok(())
}
