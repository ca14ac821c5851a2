use serde_json::json;

use tickscan_core::ScanOutcome;

use crate::error::CliError;

pub fn render_json(outcome: &ScanOutcome, pretty: bool) -> Result<(), CliError> {
    let value = json!({
        "status": outcome.status(),
        "outcome": outcome,
    });
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{rendered}");
    Ok(())
}

pub fn render_table(outcome: &ScanOutcome) {
    println!(
        "{:<10} {:<16} {:>6} {:>8}  {}",
        "SYMBOL", "STATE", "BARS", "QUALITY", "SIGNAL / REASON"
    );
    for report in &outcome.reports {
        let detail = match (&report.signal, &report.rejection, &report.error) {
            (Some(signal), _, _) => format!(
                "{:?} @ {:.2} (confidence {:.2})",
                signal.direction, signal.price, signal.confidence
            ),
            (None, Some(rejection), _) => rejection.clone(),
            (None, None, Some(error)) => error.clone(),
            (None, None, None) => String::new(),
        };
        println!(
            "{:<10} {:<16} {:>6} {:>8.2}  {}",
            report.symbol.as_str(),
            format!("{:?}", report.state),
            report.bars_count,
            report.quality_score,
            detail
        );
    }
    println!(
        "status={:?} signals={} fetch_ms={} algorithm_ms={} total_ms={}",
        outcome.status(),
        outcome.signals().len(),
        outcome.fetch_ms,
        outcome.algorithm_ms,
        outcome.total_ms
    );
}
