//! Clearn Protocol CLI
//!
//! Replays scenarios against the Clearn engine and prices deposits and
//! redemptions offline.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::{style, Term};

use clearn::core::config::ProtocolParams;
use clearn::core::treasury::{collateral_to_credit, credit_to_collateral};
use clearn::oracle::PriceData;
use clearn::protocol::operations::OperationResult;
use clearn::protocol::scenario::{Scenario, ScenarioReport};
use clearn::utils::constants::{CREDIT_SYMBOL, USDC_DECIMALS};
use clearn::utils::math::format_units;

/// Clearn Protocol CLI - collateral-backed credit and staking yield
#[derive(Parser)]
#[command(name = "clearn")]
#[command(author = "Clearn Team")]
#[command(version = clearn::VERSION)]
#[command(about = "Command-line interface for the Clearn protocol", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Protocol parameters file (JSON)
    #[arg(short, long, env = "CLEARN_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in three-staker reference scenario
    Demo {
        /// Also write the scenario as JSON to this path
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Replay a scenario file
    Run {
        /// Scenario JSON file
        scenario: PathBuf,
    },

    /// Price a deposit or redemption
    #[command(subcommand)]
    Quote(QuoteCommands),

    /// Show effective protocol parameters
    Params,
}

#[derive(Subcommand)]
enum QuoteCommands {
    /// CLEARN minted for a collateral deposit
    Deposit {
        /// Collateral amount in base units
        #[arg(short, long)]
        amount: u128,

        /// Collateral decimals
        #[arg(short, long, default_value_t = USDC_DECIMALS)]
        decimals: u8,

        /// Oracle answer
        #[arg(short, long, default_value_t = 100_000_000)]
        price: u128,

        /// Oracle answer decimals
        #[arg(long, default_value_t = 8)]
        price_decimals: u8,
    },

    /// Collateral returned for a CLEARN redemption
    Withdraw {
        /// CLEARN amount in base units
        #[arg(short, long)]
        amount: u128,

        /// Collateral decimals
        #[arg(short, long, default_value_t = USDC_DECIMALS)]
        decimals: u8,

        /// Oracle answer
        #[arg(short, long, default_value_t = 100_000_000)]
        price: u128,

        /// Oracle answer decimals
        #[arg(long, default_value_t = 8)]
        price_decimals: u8,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Demo { save } => cmd_demo(cli, save.as_deref(), term),
        Commands::Run { scenario } => cmd_run(cli, scenario, term),
        Commands::Quote(cmd) => cmd_quote(cli, cmd, term),
        Commands::Params => cmd_params(cli, term),
    }
}

fn load_params(cli: &Cli) -> anyhow::Result<ProtocolParams> {
    let params = match &cli.config {
        Some(path) => ProtocolParams::load(path)?.with_env_overrides()?,
        None => ProtocolParams::from_env()?,
    };
    Ok(params)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_demo(cli: &Cli, save: Option<&Path>, term: &Term) -> anyhow::Result<()> {
    let mut scenario = Scenario::reference();
    scenario.params = load_params(cli)?;

    if let Some(path) = save {
        scenario.save(path)?;
        term.write_line(&format!(
            "{} Scenario written to {}",
            style("✓").green(),
            path.display()
        ))?;
    }

    let report = scenario.run()?;
    print_report(cli, &report, term)
}

fn cmd_run(cli: &Cli, path: &Path, term: &Term) -> anyhow::Result<()> {
    let mut scenario = Scenario::load(path)?;
    if cli.config.is_some() {
        scenario.params = load_params(cli)?;
    }

    let report = scenario.run()?;
    print_report(cli, &report, term)
}

fn cmd_quote(cli: &Cli, cmd: &QuoteCommands, term: &Term) -> anyhow::Result<()> {
    let params = load_params(cli)?;

    let (label, input, output, in_decimals, out_decimals, out_symbol) = match *cmd {
        QuoteCommands::Deposit {
            amount,
            decimals,
            price,
            price_decimals,
        } => {
            let price = PriceData::new(price, price_decimals, 0);
            let credit = collateral_to_credit(amount, decimals, &price, params.credit_decimals)?;
            ("deposit", amount, credit, decimals, params.credit_decimals, CREDIT_SYMBOL)
        }
        QuoteCommands::Withdraw {
            amount,
            decimals,
            price,
            price_decimals,
        } => {
            let price = PriceData::new(price, price_decimals, 0);
            let collateral = credit_to_collateral(amount, decimals, &price, params.credit_decimals)?;
            ("withdraw", amount, collateral, params.credit_decimals, decimals, "collateral")
        }
    };

    if cli.json {
        let json = serde_json::json!({
            "quote": label,
            "input": input.to_string(),
            "output": output.to_string(),
        });
        term.write_line(&serde_json::to_string_pretty(&json)?)?;
        return Ok(());
    }

    term.write_line(&format!(
        "{} {} {} -> {} {}",
        style("→").cyan(),
        label,
        format_units(input, in_decimals),
        style(format_units(output, out_decimals)).green(),
        out_symbol
    ))?;
    Ok(())
}

fn cmd_params(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    let params = load_params(cli)?;

    if cli.json {
        term.write_line(&serde_json::to_string_pretty(&params)?)?;
        return Ok(());
    }

    term.write_line(&format!("{} Clearn parameters", style("→").cyan()))?;
    term.write_line(&format!("  Version:          {}", params.version))?;
    term.write_line(&format!("  Credit decimals:  {}", params.credit_decimals))?;
    term.write_line(&format!(
        "  Reward period:    {}s ({} days)",
        params.reward_period_secs,
        params.reward_period_secs / 86_400
    ))?;
    term.write_line(&format!(
        "  Max price age:    {}",
        params
            .max_price_age_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "unbounded".into())
    ))?;
    term.write_line(&format!("  Event history:    {}", params.max_events))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

fn print_report(cli: &Cli, report: &ScenarioReport, term: &Term) -> anyhow::Result<()> {
    if cli.json {
        term.write_line(&serde_json::to_string_pretty(report)?)?;
    } else {
        print_report_text(report, term)?;
    }

    if !report.passed() {
        anyhow::bail!(
            "{} step(s) did not behave as expected",
            report.unexpected().len()
        );
    }
    Ok(())
}

fn print_report_text(report: &ScenarioReport, term: &Term) -> anyhow::Result<()> {
    term.write_line(&format!(
        "{} Scenario {}",
        style("→").cyan(),
        style(&report.name).bold()
    ))?;

    for step in &report.steps {
        let mark = if step.as_expected {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let detail = match (&step.result, &step.error) {
            (Some(result), _) => describe_result(result),
            (None, Some(error)) => format!("rejected: {}", error),
            (None, None) => String::new(),
        };
        term.write_line(&format!(
            "  {} [{:>2}] {:<20} {:<32} {}",
            mark,
            step.index,
            step.operation,
            step.label,
            style(detail).dim()
        ))?;
    }

    let final_time = chrono::DateTime::from_timestamp(report.final_time as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| report.final_time.to_string());

    term.write_line("")?;
    term.write_line(&format!("  Final time:     {}", final_time))?;
    term.write_line(&format!(
        "  CLEARN supply:  {}",
        format_units(report.clearn_supply, 18)
    ))?;
    term.write_line(&format!(
        "  Total staked:   {}",
        format_units(report.total_staked, 18)
    ))?;
    term.write_line(&format!("  Reward rate:    {}/s", report.reward_rate))?;
    term.write_line(&format!("  Events:         {}", report.event_count))?;
    term.write_line(&format!("  State hash:     {}", style(&report.state_hash).yellow()))?;

    for account in &report.accounts {
        term.write_line(&format!(
            "  {} CLEARN {} | staked {} | earned {} | {}",
            style(account.account.short()).cyan(),
            format_units(account.clearn, 18),
            format_units(account.staked, 18),
            account.earned,
            account
                .assets
                .iter()
                .map(|(symbol, amount)| format!("{} {}", symbol, amount))
                .collect::<Vec<_>>()
                .join(", ")
        ))?;
    }
    Ok(())
}

fn describe_result(result: &OperationResult) -> String {
    match result {
        OperationResult::Done => "ok".into(),
        OperationResult::Deposited(r) => format!("minted {}", r.credit_amount),
        OperationResult::Withdrawn(r) => format!("returned {}", r.collateral_amount),
        OperationResult::Staked { new_balance, .. } => format!("stake now {}", new_balance),
        OperationResult::Unstaked(r) => format!("reward paid {}", r.reward_paid),
        OperationResult::RewardsFunded { reward_rate, period_finish, .. } => {
            format!("rate {}/s until {}", reward_rate, period_finish)
        }
    }
}
