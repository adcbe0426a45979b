use std::time::{Duration, Instant};

use tmm_kernel::{tiled_matmul, Accelerator, CpuDevice, LaunchGeometry, Matrix};

use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::stats::{BenchReport, BenchSamples};

/// Times the transfer + compute + transfer cycle of the tiled kernel.
///
/// The runner owns its device. Device buffers live only for one run and are
/// dropped before the run returns, on success and on error alike.
#[derive(Debug)]
pub struct BenchmarkRunner<A: Accelerator> {
    device: A,
    config: BenchConfig,
}

impl<A: Accelerator> BenchmarkRunner<A> {
    pub fn new(device: A, config: BenchConfig) -> Self {
        Self { device, config }
    }

    pub fn device(&self) -> &A {
        &self.device
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// One timed run, in seconds.
    pub fn run(&self) -> Result<f64> {
        Ok(self.run_once()?.as_secs_f64())
    }

    /// One timed run.
    ///
    /// Host matrices are built and the kernel is compiled before the clock
    /// starts. The measured window covers upload of `A` and `B`, allocation
    /// of `C`, the launch and the download of `C`. The downloaded values are
    /// discarded.
    pub fn run_once(&self) -> Result<Duration> {
        let n = self.config.matrix_dim();
        let tile = self.config.tile_config();
        let kernel = self.device.compile(tile)?;

        let a = Matrix::try_square(n, self.config.fill_a())?;
        let b = Matrix::try_square(n, self.config.fill_b())?;

        let start = Instant::now();

        let a_dev = self.device.upload(a.data())?;
        let b_dev = self.device.upload(b.data())?;
        let mut c_dev = self.device.alloc(n * n)?;

        let geometry = LaunchGeometry::covering(n, tile.tile())?;
        self.device
            .launch(&kernel, &geometry, &a_dev, &b_dev, &mut c_dev, n)?;
        self.device.synchronize()?;

        let c = self.device.download(&c_dev)?;
        let elapsed = start.elapsed();

        log::debug!(
            "{}: n={n} ({geometry}) downloaded {} elements in {:.6} s",
            self.device.name(),
            c.len(),
            elapsed.as_secs_f64()
        );
        Ok(elapsed)
    }

    /// Run the configured number of timed runs.
    pub fn run_all(&self) -> Result<BenchSamples> {
        let mut samples = BenchSamples::default();
        for i in 0..self.config.runs() {
            let elapsed = self.run_once()?;
            log::info!(
                "run {}/{}: {:.6} s",
                i + 1,
                self.config.runs(),
                elapsed.as_secs_f64()
            );
            samples.push(elapsed);
        }
        Ok(samples)
    }

    /// Run all timed runs and package them with the configuration.
    pub fn report(&self) -> Result<BenchReport> {
        let samples = self.run_all()?;
        let summary = samples.summary().ok_or_else(|| {
            BenchError::InvalidArgument("no benchmark samples were collected".to_string())
        })?;
        let tile = self.config.tile_config();
        Ok(BenchReport {
            backend: self.device.name().to_string(),
            repeat_factor: self.config.repeat_factor(),
            tile: tile.tile(),
            matrix_dim: self.config.matrix_dim(),
            boundary: tile.boundary().to_string(),
            raw_seconds: samples.seconds(),
            summary,
        })
    }

    /// Untimed correctness check: every element of `C` must equal
    /// `fill_a * fill_b * N`.
    pub fn verify(&self) -> Result<()> {
        let n = self.config.matrix_dim();
        let a = Matrix::try_square(n, self.config.fill_a())?;
        let b = Matrix::try_square(n, self.config.fill_b())?;
        let c = tiled_matmul(&self.device, self.config.tile_config(), &a, &b)?;

        let expected = self.config.expected_value();
        let tolerance = expected.abs() * 1e-5 + f32::EPSILON;
        if let Some((idx, got)) = c
            .data()
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| (v - expected).abs() > tolerance)
        {
            return Err(BenchError::Verification(format!(
                "C[{}, {}] = {got}, expected {expected}",
                idx / n,
                idx % n
            )));
        }
        log::info!("verified {n}x{n} result: every element is {expected}");
        Ok(())
    }
}

/// Time one reference run on the simulated device.
///
/// `N = 32 * repeat_factor`, `A` is filled with 3.0 and `B` with 4.0.
///
/// # Errors
/// Returns `InvalidArgument` for a non-positive `repeat_factor`, before any
/// device work.
pub fn run(repeat_factor: i64) -> Result<f64> {
    let config = BenchConfig::new(repeat_factor)?;
    BenchmarkRunner::new(CpuDevice::new(), config).run()
}
