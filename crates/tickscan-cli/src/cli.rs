use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use tickscan_core::{AlgorithmSettings, Interval};

use crate::error::CliError;

/// Equity signal scanner.
#[derive(Debug, Parser)]
#[command(name = "tickscan", version, about = "Scan equities for layered-indicator trade signals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a scan over a symbol list.
    Scan(ScanArgs),
    /// Print the resolved algorithm settings and scan configuration.
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Symbols to scan, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Scan interval (1m, 5m, 15m, 30m, 1h).
    #[arg(long, default_value = "1m")]
    pub interval: String,

    /// Lookback window in days, e.g. 5d.
    #[arg(long, default_value = "5d")]
    pub lookback: String,

    /// Symbols dispatched per concurrent batch.
    #[arg(long, default_value_t = 20)]
    pub batch_size: usize,

    /// Global scan deadline in seconds.
    #[arg(long, default_value_t = 120)]
    pub deadline_secs: u64,

    /// Emit the outcome as a table instead of JSON.
    #[arg(long)]
    pub table: bool,

    #[command(flatten)]
    pub algorithm: AlgorithmArgs,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub algorithm: AlgorithmArgs,
}

#[derive(Debug, Args)]
pub struct AlgorithmArgs {
    /// ATR multiplier for the band lines (0.5-10).
    #[arg(long, default_value_t = 2.0)]
    pub atr_multiplier: f64,

    /// Maximum bar range as a multiple of ATR (0.5-5).
    #[arg(long, default_value_t = 1.5)]
    pub volatility_filter: f64,

    /// Maximum extension from EMA8, ATR-scaled (>= 0).
    #[arg(long, default_value_t = 1.0)]
    pub fomo_filter: f64,

    /// EMA5 rising-slope threshold (0-0.05).
    #[arg(long, default_value_t = 0.02)]
    pub ema5_rising_threshold: f64,

    /// EMA8 rising-slope threshold (0-0.05).
    #[arg(long, default_value_t = 0.01)]
    pub ema8_rising_threshold: f64,

    /// EMA21 rising-slope threshold (0-0.05).
    #[arg(long, default_value_t = 0.005)]
    pub ema21_rising_threshold: f64,

    /// Confirmation timeframe (5m, 15m, 30m, 1h).
    #[arg(long, default_value = "15m")]
    pub higher_timeframe: String,

    /// Exclude pre/post-market sessions.
    #[arg(long)]
    pub no_extended_hours: bool,
}

impl AlgorithmArgs {
    pub fn to_settings(&self) -> Result<AlgorithmSettings, CliError> {
        Ok(AlgorithmSettings {
            atr_multiplier: self.atr_multiplier,
            volatility_filter: self.volatility_filter,
            fomo_filter: self.fomo_filter,
            ema5_rising_threshold: self.ema5_rising_threshold,
            ema8_rising_threshold: self.ema8_rising_threshold,
            ema21_rising_threshold: self.ema21_rising_threshold,
            higher_timeframe: Interval::from_str(&self.higher_timeframe)?,
            include_extended_hours: !self.no_extended_hours,
        })
    }
}
