use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tickscan_core::{
    ChartApiProvider, CircuitTable, ExchangeCalendar, Fetcher, Interval, Lookback,
    ReqwestHttpClient, Scanner, ScannerConfig, Symbol,
};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output;

pub async fn run(args: &ScanArgs, pretty: bool) -> Result<(), CliError> {
    let settings = args.algorithm.to_settings()?;
    let interval = Interval::from_str(&args.interval)?;
    let lookback = Lookback::from_str(&args.lookback)?;

    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    if symbols.is_empty() {
        return Err(CliError::Command(String::from(
            "--symbols must name at least one symbol",
        )));
    }

    let http_client = Arc::new(ReqwestHttpClient::new());
    let provider = Arc::new(ChartApiProvider::new(http_client));
    let fetcher = Arc::new(Fetcher::new(provider, Arc::new(CircuitTable::default())));

    let config = ScannerConfig {
        interval,
        lookback,
        batch_size: args.batch_size,
        deadline: Duration::from_secs(args.deadline_secs),
        ..ScannerConfig::default()
    };

    let scanner = Scanner::new(fetcher, ExchangeCalendar::nyse(), settings, config);
    let outcome = scanner.scan(&symbols).await?;

    if args.table {
        output::render_table(&outcome);
        Ok(())
    } else {
        output::render_json(&outcome, pretty)
    }
}
