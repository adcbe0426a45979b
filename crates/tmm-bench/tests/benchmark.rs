use tmm_bench::{run, BenchConfig, BenchError, BenchmarkRunner};
use tmm_kernel::{tiled_matmul, CpuDevice, Matrix};

#[test]
fn test_elapsed_is_non_negative_for_positive_repeat_factors() {
    for repeat_factor in 1..=3 {
        let secs = run(repeat_factor).unwrap();
        assert!(secs.is_finite());
        assert!(secs >= 0.0);
    }
}

#[test]
fn test_non_positive_repeat_factor_fails_before_device_work() {
    for bad in [0, -1, i64::MIN] {
        let err = run(bad).unwrap_err();
        assert!(matches!(err, BenchError::InvalidArgument(_)));
    }
}

#[test]
fn test_oversized_repeat_factor_returns_an_error() {
    for huge in [1 << 26, i64::MAX] {
        let err = run(huge).unwrap_err();
        assert!(matches!(err, BenchError::InvalidArgument(_)), "{err}");
    }
}

#[test]
fn test_repeat_factor_two_scenario() {
    let config = BenchConfig::new(2).unwrap();
    assert_eq!(config.matrix_dim(), 64);

    let runner = BenchmarkRunner::new(CpuDevice::new(), config);
    let secs = runner.run().unwrap();
    assert!(secs.is_finite() && secs >= 0.0);

    let stats = runner.device().last_launch().unwrap();
    assert_eq!(stats.chunks_per_group, 2);
    assert_eq!(stats.writes, 64 * 64);

    // The timed path discards C; check the product separately.
    let c = tiled_matmul(
        runner.device(),
        runner.config().tile_config(),
        &Matrix::square(64, 3.0),
        &Matrix::square(64, 4.0),
    )
    .unwrap();
    assert!(c.data().iter().all(|&v| v == 768.0));
}

#[test]
fn test_repeated_runs_do_not_leak_state() {
    let runner = BenchmarkRunner::new(CpuDevice::new(), BenchConfig::new(1).unwrap());
    for _ in 0..3 {
        runner.run().unwrap();
        runner.verify().unwrap();
        assert_eq!(runner.device().allocated_bytes(), 0);
    }
}

#[test]
fn test_config_file_drives_runner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmm.toml");
    std::fs::write(&path, "repeat_factor = 2\ntile = 8\nruns = 3\n").unwrap();

    let config = BenchConfig::from_file(&path).unwrap();
    let runner = BenchmarkRunner::new(CpuDevice::new(), config);
    let report = runner.report().unwrap();
    assert_eq!(report.matrix_dim, 16);
    assert_eq!(report.raw_seconds.len(), 3);
    assert!(report.summary.min <= report.summary.max);
    runner.verify().unwrap();
}

#[test]
fn test_resource_failure_aborts_the_run() {
    let device = CpuDevice::new().with_memory_limit(1024);
    let runner = BenchmarkRunner::new(device, BenchConfig::new(1).unwrap());
    let err = runner.run().unwrap_err();
    assert!(matches!(err, BenchError::Accelerator(_)));
    assert!(!err.is_configuration());
}
