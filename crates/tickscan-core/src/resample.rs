use crate::{Bar, Interval, Series, ValidationError, ZonedDateTime};

/// Derive a coarser series with right-labeled, right-closed buckets.
///
/// A bucket boundary at time T aggregates every bar with timestamp in
/// `(T - bucket, T]` and the output bar is stamped T. Input already aligned
/// to the target grid passes through unchanged.
pub fn resample(series: &Series, target: Interval) -> Result<Series, ValidationError> {
    if target.bucket_seconds() < series.interval.bucket_seconds() {
        return Err(ValidationError::ResampleNotCoarser {
            source_interval: series.interval.as_str().to_owned(),
            target: target.as_str().to_owned(),
        });
    }

    let bucket = target.bucket_seconds();
    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<(i64, Bar)> = None;

    for bar in &series.bars {
        let label = right_label(bar.ts.unix_timestamp(), bucket);
        match current.as_mut() {
            Some((open_label, agg)) if *open_label == label => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
            }
            _ => {
                if let Some((label_done, agg)) = current.take() {
                    out.push(finish_bucket(label_done, agg));
                }
                current = Some((label, *bar));
            }
        }
    }
    if let Some((label_done, agg)) = current.take() {
        out.push(finish_bucket(label_done, agg));
    }

    Series::new(series.symbol.clone(), target, out)
}

fn finish_bucket(label: i64, agg: Bar) -> Bar {
    let ts = ZonedDateTime::from_unix_with_offset(label, agg.ts.offset())
        .expect("bucket label derived from a valid timestamp");
    Bar { ts, ..agg }
}

/// Smallest bucket-grid multiple >= ts.
fn right_label(ts: i64, bucket: i64) -> i64 {
    let rem = ts.rem_euclid(bucket);
    if rem == 0 {
        ts
    } else {
        ts - rem + bucket
    }
}
