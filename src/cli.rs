//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation::{allocate_all, blend_returns, AllocationMethod, Weights};
use crate::domain::backtest::{align_signals, run_backtest_on_prices, BacktestResult};
use crate::domain::config::EngineConfig;
use crate::domain::ensemble::{next_bar_labels, train_and_score_with, EnsembleOutput};
use crate::domain::error::QuantError;
use crate::domain::features::{compute_features, FeatureVector};
use crate::domain::metrics::RiskReport;
use crate::domain::returns::{align_panel, bar_returns};
use crate::ports::data_port::DataPort;
use crate::ports::model_port::SignalModel;

#[derive(Parser, Debug)]
#[command(
    name = "quantfolio",
    about = "Feature extraction, risk analytics, allocation and signal backtesting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the feature matrix of one asset as CSV
    Features {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        asset: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Backtest a signal file against one asset
    Backtest {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        signals: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Allocate across assets and report the blended return series
    Allocate {
        #[arg(long)]
        data_dir: PathBuf,
        /// Comma-separated; defaults to every CSV in the data directory
        #[arg(long, value_delimiter = ',')]
        assets: Vec<String>,
        /// mean-variance, risk-parity, hrp or kelly; all when omitted
        #[arg(short, long)]
        method: Option<AllocationMethod>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Features {
            data_dir,
            asset,
            config,
        } => run_features(&data_dir, &asset, config.as_deref()),
        Command::Backtest {
            data_dir,
            asset,
            signals,
            config,
        } => run_backtest(&data_dir, &asset, &signals, config.as_deref()),
        Command::Allocate {
            data_dir,
            assets,
            method,
            config,
        } => run_allocate(&data_dir, assets, method, config.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Engine configuration from an optional INI file; defaults without one.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, QuantError> {
    match path {
        Some(p) => {
            info!(path = %p.display(), "loading config");
            let adapter = FileConfigAdapter::from_file(p)?;
            EngineConfig::from_config(&adapter)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn run_features(data_dir: &Path, asset: &str, config: Option<&Path>) -> Result<(), QuantError> {
    let engine = load_engine_config(config)?;
    let data = CsvAdapter::new(data_dir.to_path_buf());
    let rows = run_features_pipeline(&data, asset, &engine)?;
    write_features_csv(io::stdout().lock(), &engine.features.feature_names(), &rows)
}

pub fn run_features_pipeline(
    data: &dyn DataPort,
    asset: &str,
    engine: &EngineConfig,
) -> Result<Vec<FeatureVector>, QuantError> {
    let prices = data.load_prices(asset)?;
    info!(asset, bars = prices.len(), "computing features");
    compute_features(&prices, &engine.features)
}

/// One header row, then one row per bar; warm-up cells are left empty.
pub fn write_features_csv<W: Write>(
    out: W,
    names: &[String],
    rows: &[FeatureVector],
) -> Result<(), QuantError> {
    let csv_err = |e: csv::Error| QuantError::Data {
        reason: format!("failed to write CSV: {}", e),
    };
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["timestamp".to_string()];
    header.extend(names.iter().cloned());
    writer.write_record(&header).map_err(csv_err)?;

    for row in rows {
        let mut record = vec![row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(
            names
                .iter()
                .map(|name| row.get(name).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_backtest(
    data_dir: &Path,
    asset: &str,
    signals: &Path,
    config: Option<&Path>,
) -> Result<(), QuantError> {
    let engine = load_engine_config(config)?;
    let data = CsvAdapter::new(data_dir.to_path_buf());
    // Resolve against the working directory, not the data directory.
    let signals = std::path::absolute(signals)?;

    let result = run_backtest_pipeline(&data, asset, &signals.to_string_lossy(), &engine)?;

    let mut out = io::stdout().lock();
    writeln!(out, "=== Backtest: {} ===", asset)?;
    writeln!(out, "Bars:             {}", result.positions.len())?;
    writeln!(out, "Trades:           {}", result.trades)?;
    writeln!(out, "Total Cost:       {:.4}%", result.total_cost * 100.0)?;
    writeln!(out, "Final Equity:     {:.4}", result.final_equity())?;
    write_report(&mut out, &result.report)?;
    Ok(())
}

pub fn run_backtest_pipeline(
    data: &dyn DataPort,
    asset: &str,
    signals: &str,
    engine: &EngineConfig,
) -> Result<BacktestResult, QuantError> {
    let prices = data.load_prices(asset)?;
    let raw = data.load_signals(signals)?;
    let aligned = align_signals(&prices, &raw);
    info!(
        asset,
        bars = prices.len(),
        scored = aligned.iter().flatten().count(),
        "running backtest"
    );
    run_backtest_on_prices(&prices, &aligned, &engine.backtest)
}

/// Walk-forward ensemble scores for one asset and the backtest they drive.
#[derive(Debug, Clone)]
pub struct SignalOutcome {
    pub scores: EnsembleOutput,
    pub backtest: BacktestResult,
}

/// Features, next-bar labels, walk-forward scoring per `[walk_forward]`,
/// then a backtest of the ensemble scores.
pub fn run_signal_pipeline(
    data: &dyn DataPort,
    asset: &str,
    models: &[Box<dyn SignalModel>],
    engine: &EngineConfig,
) -> Result<SignalOutcome, QuantError> {
    let prices = data.load_prices(asset)?;
    let features = compute_features(&prices, &engine.features)?;
    let labels = next_bar_labels(&bar_returns(&prices)?);
    info!(
        asset,
        bars = prices.len(),
        models = models.len(),
        folds = engine.walk_forward.n_folds,
        "scoring signals"
    );

    let scores = train_and_score_with(&features, &labels, models, &engine.walk_forward)?;
    let backtest = run_backtest_on_prices(&prices, &scores.ensemble, &engine.backtest)?;
    Ok(SignalOutcome { scores, backtest })
}

/// Weights plus the risk report of the blended portfolio series.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub weights: Weights,
    pub report: RiskReport,
}

fn run_allocate(
    data_dir: &Path,
    assets: Vec<String>,
    method: Option<AllocationMethod>,
    config: Option<&Path>,
) -> Result<(), QuantError> {
    let engine = load_engine_config(config)?;
    let data = CsvAdapter::new(data_dir.to_path_buf());
    let assets = if assets.is_empty() {
        data.list_assets()?
    } else {
        assets
    };
    let methods = match method {
        Some(m) => vec![m],
        None => AllocationMethod::ALL.to_vec(),
    };

    let outcomes = run_allocate_pipeline(&data, &assets, &methods, &engine)?;

    let mut out = io::stdout().lock();
    let mut first_error = None;
    let mut succeeded = 0;
    for (method, outcome) in outcomes {
        writeln!(out, "=== {} ===", method)?;
        match outcome {
            Ok(o) => {
                for (asset, w) in o.weights.iter() {
                    writeln!(out, "  {:<16}{:>8.2}%", asset, w * 100.0)?;
                }
                write_report(&mut out, &o.report)?;
                succeeded += 1;
            }
            Err(e) => {
                writeln!(out, "  failed: {}", e)?;
                first_error.get_or_insert(e);
            }
        }
        writeln!(out)?;
    }

    // Fail only when every requested method failed.
    match first_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(()),
    }
}

pub fn run_allocate_pipeline(
    data: &dyn DataPort,
    assets: &[String],
    methods: &[AllocationMethod],
    engine: &EngineConfig,
) -> Result<Vec<(AllocationMethod, Result<AllocationOutcome, QuantError>)>, QuantError> {
    let mut histories = Vec::with_capacity(assets.len());
    for asset in assets {
        histories.push((asset.clone(), data.load_prices(asset)?));
    }
    let (stamps, panel) = align_panel(&histories)?;
    info!(
        assets = panel.n_assets(),
        periods = stamps.len(),
        methods = methods.len(),
        "allocating"
    );

    let results = allocate_all(&panel, methods, &engine.allocation)
        .into_iter()
        .map(|(method, weights)| {
            let outcome = weights.and_then(|weights| {
                let blended = blend_returns(&panel, &weights)?;
                let report = RiskReport::compute(&blended, &engine.risk)?;
                Ok(AllocationOutcome { weights, report })
            });
            (method, outcome)
        })
        .collect();
    Ok(results)
}

fn run_validate(config: &Path) -> Result<(), QuantError> {
    let engine = load_engine_config(Some(config))?;
    let mut out = io::stdout().lock();
    writeln!(out, "Config is valid: {}", config.display())?;
    writeln!(
        out,
        "  risk:        {} periods/year, rf {}, confidence {}",
        engine.risk.periods_per_year, engine.risk.risk_free_rate, engine.risk.confidence
    )?;
    writeln!(
        out,
        "  backtest:    {} bps, threshold {}, min {} bars",
        engine.backtest.cost_bps, engine.backtest.threshold, engine.backtest.min_bars
    )?;
    writeln!(
        out,
        "  allocation:  max weight {}, kelly safety {}",
        engine.allocation.max_weight, engine.allocation.kelly_safety
    )?;
    writeln!(
        out,
        "  features:    {} columns",
        engine.features.feature_names().len()
    )?;
    writeln!(
        out,
        "  walk-forward: {} folds, embargo {}",
        engine.walk_forward.n_folds, engine.walk_forward.embargo
    )?;
    Ok(())
}

fn format_metric(value: Option<f64>, percent: bool) -> String {
    match value {
        Some(v) if percent => format!("{:.2}%", v * 100.0),
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

pub fn write_report<W: Write>(out: &mut W, report: &RiskReport) -> io::Result<()> {
    writeln!(out, "Observations:     {}", report.observations)?;
    writeln!(out, "Sharpe Ratio:     {}", format_metric(report.sharpe, false))?;
    writeln!(out, "Sortino Ratio:    {}", format_metric(report.sortino, false))?;
    writeln!(out, "Calmar Ratio:     {}", format_metric(report.calmar, false))?;
    writeln!(out, "Max Drawdown:     {}", format_metric(report.max_drawdown, true))?;
    writeln!(out, "VaR:              {}", format_metric(report.var_95, true))?;
    writeln!(out, "CVaR:             {}", format_metric(report.cvar_95, true))?;
    writeln!(out, "Win Rate:         {}", format_metric(report.win_rate, true))?;
    Ok(())
}
