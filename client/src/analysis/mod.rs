//! Aggregate statistics over measurements

use protocol::results::{Measurement, MetricStats};
use std::collections::BTreeMap;

/// One sample per metric key; `None` marks an unavailable value
pub type Samples = BTreeMap<String, Option<f64>>;

/// Reduce samples to mean/min/max per key
///
/// Unavailable samples are skipped, and a key without a single available
/// sample is left out of the result.
pub fn aggregate_samples(samples: &[Samples]) -> BTreeMap<String, MetricStats> {
    let mut values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        for (key, value) in sample {
            let entry = values.entry(key.as_str()).or_default();
            if let Some(v) = value.filter(|v| v.is_finite()) {
                entry.push(v);
            }
        }
    }

    values
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(key, v)| {
            let mean = v.iter().sum::<f64>() / v.len() as f64;
            let min = v.iter().copied().fold(f64::INFINITY, f64::min);
            let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (key.to_string(), MetricStats { mean, min, max })
        })
        .collect()
}

/// Metric samples of one measurement, keyed per file
pub fn measurement_samples(measurement: &Measurement) -> Samples {
    let mut sample = Samples::new();

    for (filename, transfer) in &measurement.file_transfers {
        let stats = transfer.transfer_stats();
        let available = |v: f64| transfer.transfer_success().then_some(v);
        sample.insert(format!("{}.totalMs", filename), available(stats.time_split().total));
        sample.insert(format!("{}.ttfbMs", filename), available(stats.ttfb()));
        sample.insert(format!("{}.speedDownload", filename), available(stats.speed_download));
        sample.insert(
            format!("{}.hashTimeMs", filename),
            available(transfer.hash_match_details().time_taken),
        );
    }

    for web in &measurement.web_tests {
        let available = |v: f64| web.error.is_none().then_some(v);
        sample.insert("webtest.totalMs".to_string(), available(web.stats.time_split().total));
        sample.insert("webtest.ttfbMs".to_string(), available(web.stats.ttfb()));
        sample.insert("webtest.speedDownload".to_string(), available(web.stats.speed_download));
    }

    sample
}

pub fn aggregate(measurements: &[Measurement]) -> BTreeMap<String, MetricStats> {
    let samples: Vec<Samples> = measurements.iter().map(measurement_samples).collect();
    aggregate_samples(&samples)
}
