use std::fmt::Display;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Durations of every timed run, in the order they were measured.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BenchSamples {
    pub durations: Vec<Duration>,
}

impl BenchSamples {
    pub fn push(&mut self, duration: Duration) {
        self.durations.push(duration);
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Every sample in seconds.
    pub fn seconds(&self) -> Vec<f64> {
        self.durations.iter().map(Duration::as_secs_f64).collect()
    }

    /// Summary statistics, or `None` when there are no samples.
    pub fn summary(&self) -> Option<BenchSummary> {
        if self.durations.is_empty() {
            return None;
        }
        let mut sorted = self.durations.clone();
        sorted.sort();
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let median = sorted[sorted.len() / 2];

        let count = self.durations.len() as u32;
        let mean = self.durations.iter().sum::<Duration>() / count;
        let variance = self
            .durations
            .iter()
            .map(|d| {
                let delta = d.as_secs_f64() - mean.as_secs_f64();
                delta * delta
            })
            .sum::<f64>()
            / f64::from(count);

        Some(BenchSummary {
            samples: self.durations.len(),
            mean: mean.as_secs_f64(),
            median: median.as_secs_f64(),
            variance,
            min: min.as_secs_f64(),
            max: max.as_secs_f64(),
        })
    }
}

/// Statistics over a set of samples, all in seconds (variance in s²).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSummary {
    pub samples: usize,
    pub mean: f64,
    pub median: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl Display for BenchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let BenchSummary {
            samples,
            mean,
            median,
            variance,
            min,
            max,
        } = self;
        write!(
            f,
            "
―――――――― Result ―――――――――
  Samples     {samples}
  Mean        {mean:.6} s
  Variance    {variance:.3e} s²
  Median      {median:.6} s
  Min         {min:.6} s
  Max         {max:.6} s
―――――――――――――――――――――――――"
        )
    }
}

/// One benchmark invocation: what was run and how long it took.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchReport {
    pub backend: String,
    pub repeat_factor: usize,
    pub tile: usize,
    pub matrix_dim: usize,
    pub boundary: String,
    pub raw_seconds: Vec<f64>,
    pub summary: BenchSummary,
}
