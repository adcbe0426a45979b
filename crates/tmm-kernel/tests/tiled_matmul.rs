use approx::assert_relative_eq;
use tmm_kernel::{
    tiled_matmul, Accelerator, AcceleratorError, BoundaryPolicy, CpuDevice, Dim2, LaunchGeometry,
    Matrix, TileConfig,
};

fn naive_matmul(a: &Matrix, b: &Matrix) -> Vec<f32> {
    let n = a.rows();
    let mut c = vec![0.0f32; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += a.data()[i * n + k] * b.data()[k * n + j];
            }
            c[i * n + j] = sum;
        }
    }
    c
}

fn ramp(n: usize, scale: f32) -> Matrix {
    let data = (0..n * n).map(|v| ((v % 7) as f32 - 3.0) * scale).collect();
    Matrix::from_vec(n, n, data).unwrap()
}

#[test]
fn test_constant_fill_tile_32_repeat_1() {
    let device = CpuDevice::new();
    let a = Matrix::square(32, 3.0);
    let b = Matrix::square(32, 4.0);
    let c = tiled_matmul(&device, &TileConfig::default(), &a, &b).unwrap();
    assert_eq!(c.dims(), [32, 32]);
    assert!(c.data().iter().all(|&v| v == 384.0));
}

#[test]
fn test_constant_fill_tile_32_repeat_2() {
    let device = CpuDevice::new();
    let a = Matrix::square(64, 3.0);
    let b = Matrix::square(64, 4.0);
    let c = tiled_matmul(&device, &TileConfig::default(), &a, &b).unwrap();
    assert!(c.data().iter().all(|&v| v == 3.0 * 4.0 * 64.0));

    let stats = device.last_launch().unwrap();
    assert_eq!(stats.chunks_per_group, 2);
    assert_eq!(stats.groups, 4);
    assert_eq!(stats.writes, 64 * 64);
}

#[test]
fn test_constant_fill_general() {
    let device = CpuDevice::new();
    for (tile, repeat, a_val, b_val) in [(4, 3, 1.5, -2.0), (8, 2, 0.5, 0.25), (1, 5, 2.0, 3.0)] {
        let n = tile * repeat;
        let cfg = TileConfig::new(tile).unwrap();
        let c = tiled_matmul(
            &device,
            &cfg,
            &Matrix::square(n, a_val),
            &Matrix::square(n, b_val),
        )
        .unwrap();
        for &v in c.data() {
            assert_relative_eq!(v, a_val * b_val * n as f32);
        }
    }
}

#[test]
fn test_matches_reference_on_varied_input() {
    let device = CpuDevice::new();
    let n = 48;
    let a = ramp(n, 0.5);
    let b = ramp(n, 0.25);
    let c = tiled_matmul(&device, &TileConfig::new(16).unwrap(), &a, &b).unwrap();
    let expected = naive_matmul(&a, &b);
    for (got, want) in c.data().iter().zip(expected.iter()) {
        assert_relative_eq!(*got, *want, epsilon = 1e-3);
    }
}

#[test]
fn test_either_axis_handles_non_divisible_extent() {
    let device = CpuDevice::new();
    let cfg = TileConfig::new(8)
        .unwrap()
        .with_boundary(BoundaryPolicy::EitherAxis);
    for n in [1usize, 5, 13, 17] {
        let a = ramp(n, 1.0);
        let b = ramp(n, 2.0);
        let c = tiled_matmul(&device, &cfg, &a, &b).unwrap();
        let expected = naive_matmul(&a, &b);
        for (got, want) in c.data().iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-3);
        }
    }
}

#[test]
fn test_both_axes_rejects_non_divisible_extent() {
    let device = CpuDevice::new();
    let a = Matrix::square(40, 1.0);
    let err = tiled_matmul(&device, &TileConfig::default(), &a, &a).unwrap_err();
    assert!(matches!(err, AcceleratorError::Configuration(_)));
    assert_eq!(device.allocated_bytes(), 0);
}

#[test]
fn test_result_is_deterministic_and_stateless() {
    let device = CpuDevice::new();
    let cfg = TileConfig::new(16).unwrap();
    let a = ramp(64, 0.1);
    let b = ramp(64, 0.3);
    let first = tiled_matmul(&device, &cfg, &a, &b).unwrap();
    for _ in 0..3 {
        let again = tiled_matmul(&device, &cfg, &a, &b).unwrap();
        assert_eq!(first, again);
    }
    assert_eq!(device.allocated_bytes(), 0);
}

#[test]
fn test_rejects_mismatched_operands() {
    let device = CpuDevice::new();
    let a = Matrix::square(32, 1.0);
    let b = Matrix::square(64, 1.0);
    let err = tiled_matmul(&device, &TileConfig::default(), &a, &b).unwrap_err();
    assert!(matches!(err, AcceleratorError::ShapeMismatch { .. }));

    let rect = Matrix::full(32, 64, 1.0);
    assert!(tiled_matmul(&device, &TileConfig::default(), &rect, &rect).is_err());
}

#[test]
fn test_resource_error_releases_staged_buffers() {
    // Room for A and B but not C.
    let n = 32;
    let device = CpuDevice::new().with_memory_limit(2 * n * n * 4);
    let a = Matrix::square(n, 3.0);
    let b = Matrix::square(n, 4.0);
    let err = tiled_matmul(&device, &TileConfig::default(), &a, &b).unwrap_err();
    assert!(matches!(err, AcceleratorError::Resource(_)));
    assert_eq!(device.allocated_bytes(), 0);
}

#[test]
fn test_manual_launch_with_explicit_geometry() {
    let device = CpuDevice::new();
    let cfg = TileConfig::new(4).unwrap();
    let kernel = device.compile(&cfg).unwrap();
    let n = 8;
    let a = device.upload(&vec![2.0; n * n]).unwrap();
    let b = device.upload(&vec![5.0; n * n]).unwrap();
    let mut c = device.alloc(n * n).unwrap();

    let geometry = LaunchGeometry::covering(n, cfg.tile()).unwrap();
    assert_eq!(geometry.grid(), Dim2::square(2));
    device.launch(&kernel, &geometry, &a, &b, &mut c, n).unwrap();
    device.synchronize().unwrap();

    let out = device.download(&c).unwrap();
    assert!(out.iter().all(|&v| v == 80.0));
}
