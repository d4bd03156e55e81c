use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use signal_backtest::{
    generate_universe, load_dir, load_file, load_multi_symbol_csv, summarize_by_strategy,
    CsvReportWriter, Interval, PriceSeries, RunConfig, RunReport, Runner,
    SignalProvider, StrategyKind, StrategySummary,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "signal-backtest")]
#[command(version = "0.1.0")]
#[command(about = "Signal-driven backtests across strategies and instruments", long_about = None)]
struct Args {
    /// Single instrument file (CSV/JSON), symbol taken from the file name
    #[arg(short = 'f', long, conflicts_with_all = ["data_dir", "combined_file"])]
    data_file: Option<PathBuf>,

    /// Directory of instrument files, one instrument per file
    #[arg(long, conflicts_with = "combined_file")]
    data_dir: Option<PathBuf>,

    /// CSV with a `symbol` column holding several instruments
    #[arg(long)]
    combined_file: Option<PathBuf>,

    /// Bars per synthetic instrument (used when no data source is given)
    #[arg(long, default_value = "5000")]
    synthetic_bars: usize,

    /// Number of synthetic instruments
    #[arg(long, default_value = "3")]
    symbols: usize,

    /// Seed for synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Strategy to run; repeat for several (default: all)
    #[arg(short, long = "strategy", value_enum)]
    strategies: Vec<StrategyKind>,

    /// JSON run configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial cash per run
    #[arg(short, long)]
    capital: Option<f64>,

    /// Fee rate per fill (0.001 = 0.1%)
    #[arg(long)]
    fees: Option<f64>,

    /// Slippage rate per fill (0.001 = 0.1%)
    #[arg(long)]
    slippage: Option<f64>,

    /// Bar interval used to annualize the Sharpe ratio
    #[arg(long)]
    interval: Option<Interval>,

    /// Leave end-of-data closes out of win rate and expectancy
    #[arg(long)]
    exclude_forced_closes: bool,

    /// Where CSV reports are written
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Do not write CSV reports
    #[arg(long)]
    no_report: bool,

    /// Worker threads (default: available cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Run on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(capital) = self.capital {
            config.simulation.initial_cash = capital;
        }
        if let Some(fees) = self.fees {
            config.simulation.fee_rate = fees;
        }
        if let Some(slippage) = self.slippage {
            config.simulation.slippage_rate = slippage;
        }
        if let Some(interval) = self.interval {
            config.metrics.bars_per_year = interval.bars_per_year();
        }
        if self.exclude_forced_closes {
            config.metrics.include_forced_closes = false;
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if self.no_report {
            config.write_reports = false;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if self.sequential {
            config.parallel = false;
        }

        config.validate()?;
        Ok(config)
    }

    fn instruments(&self) -> Result<Vec<PriceSeries>> {
        let instruments = if let Some(path) = &self.data_file {
            info!(path = %path.display(), "loading instrument");
            vec![load_file(path)?]
        } else if let Some(dir) = &self.data_dir {
            info!(dir = %dir.display(), "loading instruments");
            load_dir(dir)?
        } else if let Some(path) = &self.combined_file {
            info!(path = %path.display(), "loading combined file");
            load_multi_symbol_csv(path)?
        } else {
            info!(
                symbols = self.symbols,
                bars = self.synthetic_bars,
                seed = self.seed,
                "generating synthetic instruments"
            );
            generate_universe(self.symbols, self.synthetic_bars, self.seed)
        };

        if instruments.is_empty() {
            bail!("no instruments to backtest");
        }
        Ok(instruments)
    }

    fn strategies(&self) -> Vec<Box<dyn SignalProvider>> {
        let kinds = if self.strategies.is_empty() {
            StrategyKind::all()
        } else {
            self.strategies.clone()
        };
        kinds.iter().map(|k| k.build()).collect()
    }
}

#[derive(Serialize)]
struct FailureOutput {
    symbol: String,
    strategy: String,
    error: String,
}

#[derive(Serialize)]
struct SessionOutput<'a> {
    records: &'a [signal_backtest::MetricsRecord],
    summary: Vec<StrategySummary>,
    failures: Vec<FailureOutput>,
    execution_time_ms: u64,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = args.run_config()?;
    let instruments = args.instruments()?;
    let strategies = args.strategies();

    let runner = Runner::new(config.clone());
    let report = if config.write_reports {
        let mut writer = CsvReportWriter::new(&config.results_dir)
            .with_context(|| format!("creating {}", config.results_dir.display()))?;
        runner.run_all_with_sink(&instruments, &strategies, &mut writer)?
    } else {
        runner.run_all(&instruments, &strategies)?
    };

    if report.records.is_empty() && !report.failures.is_empty() {
        bail!("all {} runs failed", report.failures.len());
    }

    match args.output {
        OutputFormat::Json => {
            let output = SessionOutput {
                records: &report.records,
                summary: summarize_by_strategy(&report.records),
                failures: report
                    .failures
                    .iter()
                    .map(|f| FailureOutput {
                        symbol: f.symbol.clone(),
                        strategy: f.strategy.clone(),
                        error: f.error.to_string(),
                    })
                    .collect(),
                execution_time_ms: report.execution_time_ms,
            };
            let json = if args.pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => print_text_report(&report, &config),
    }

    Ok(())
}

fn print_text_report(report: &RunReport, config: &RunConfig) {
    println!();
    println!("================================================================");
    println!("  BACKTEST REPORT - Signal Strategies");
    println!("================================================================");
    println!();
    println!("  Runs:             {:>12}", report.requested);
    println!("  Completed:        {:>12}", report.records.len());
    println!("  Skipped:          {:>12}", report.failures.len());
    println!("  Initial Cash:     ${:>11.2}", config.simulation.initial_cash);
    println!(
        "  Fees / Slippage:  {:>11.3}% / {:.3}%",
        config.simulation.fee_rate * 100.0,
        config.simulation.slippage_rate * 100.0
    );
    println!("  Execution Time:   {:>10}ms", report.execution_time_ms);

    for summary in summarize_by_strategy(&report.records) {
        println!();
        println!("----------------------------------------------------------------");
        println!("  {} ({} instruments)", summary.strategy, summary.runs);
        println!("----------------------------------------------------------------");
        println!(
            "  {:<12} {:>10} {:>8} {:>10} {:>8} {:>10} {:>9}",
            "Symbol", "Return %", "Sharpe", "MaxDD %", "Win %", "Expect.", "Expos. %"
        );
        for record in report.records.iter().filter(|r| r.strategy == summary.strategy) {
            println!(
                "  {:<12} {:>+10.2} {:>8.3} {:>10.2} {:>8.1} {:>10.4} {:>9.1}",
                record.symbol,
                record.total_return_pct,
                record.sharpe,
                record.max_drawdown_pct,
                record.win_rate_pct,
                record.expectancy,
                record.exposure_time_pct
            );
        }
        println!(
            "  {:<12} {:>+10.2} {:>8.3} {:>10.2} {:>8.1} {:>10.4} {:>9.1}",
            "Average",
            summary.avg_total_return_pct,
            summary.avg_sharpe,
            summary.avg_max_drawdown_pct,
            summary.avg_win_rate_pct,
            summary.avg_expectancy,
            summary.avg_exposure_time_pct
        );
        println!("  Best: {}", summary.best_symbol);
    }

    if !report.failures.is_empty() {
        println!();
        println!("  SKIPPED RUNS");
        println!("----------------------------------------------------------------");
        for failure in &report.failures {
            println!("  {}", failure);
        }
    }

    println!();
    println!("================================================================");
    if config.write_reports {
        println!("  Reports written to {}", config.results_dir.display());
        println!();
    }
}
