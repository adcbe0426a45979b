// Thread-group execution of the tiled kernel on the simulated device.
//
// Threads inside one group run in lockstep: every thread finishes a phase
// before any thread starts the next one, so each barrier of the kernel is a
// phase boundary here. Groups share nothing and are run independently.

use crate::error::{AcceleratorError, Result};
use crate::geometry::{Dim2, LaunchGeometry};
use crate::tile::TileConfig;

/// Read-only inputs shared by every group of one launch.
pub(crate) struct KernelArgs<'a> {
    pub a: &'a [f32],
    pub b: &'a [f32],
    pub n: usize,
    pub config: TileConfig,
    pub geometry: LaunchGeometry,
}

/// Output writes produced by one group, as `(flat index into C, value)`.
#[derive(Debug)]
pub(crate) struct GroupOutput {
    pub writes: Vec<(usize, f32)>,
    pub chunks: usize,
}

#[derive(Debug, Clone, Copy)]
struct Lane {
    local: Dim2,
    global: Dim2,
    skip: bool,
}

/// Run every thread of `group` to completion.
///
/// # Errors
/// Returns `Launch` if a thread touches global memory outside the `n x n`
/// buffers, which is how the simulated device reports a kernel fault.
pub(crate) fn run_group(args: &KernelArgs<'_>, group: Dim2) -> Result<GroupOutput> {
    let tile = args.config.tile();
    let n = args.n;
    let policy = args.config.boundary();
    let pad = policy.pads_loads();

    // Under padded loads every thread helps fill the tiles and only the write
    // is skipped; otherwise skipped threads exit before the first load.
    let lanes: Vec<Lane> = (0..tile)
        .flat_map(|tx| (0..tile).map(move |ty| Dim2::new(tx, ty)))
        .map(|local| {
            let global = args.geometry.global_index(group, local);
            Lane {
                local,
                global,
                skip: policy.skips(global.x, global.y, n),
            }
        })
        .filter(|lane| pad || !lane.skip)
        .collect();

    // Group-scoped scratch memory, dropped when the group retires.
    let mut shared_a = vec![0.0f32; args.config.tile_elems()];
    let mut shared_b = vec![0.0f32; args.config.tile_elems()];
    let mut acc = vec![0.0f32; args.config.tile_elems()];

    let chunks = args.geometry.chunks();
    for i in 0..chunks {
        let offset = i * tile;

        for lane in &lanes {
            let slot = lane.local.x * tile + lane.local.y;
            shared_a[slot] = load(args.a, n, lane.global.x, lane.local.y + offset, pad)
                .ok_or_else(|| fault(group, "read of A", lane.global.x, lane.local.y + offset))?;
            shared_b[slot] = load(args.b, n, lane.local.x + offset, lane.global.y, pad)
                .ok_or_else(|| fault(group, "read of B", lane.local.x + offset, lane.global.y))?;
        }

        // barrier: all loads of chunk i are visible

        for lane in &lanes {
            let row = lane.local.x * tile;
            let slot = row + lane.local.y;
            let mut sum = acc[slot];
            for j in 0..tile {
                sum += shared_a[row + j] * shared_b[j * tile + lane.local.y];
            }
            acc[slot] = sum;
        }

        // barrier: chunk i is consumed before the next loads overwrite it
    }

    let mut writes = Vec::with_capacity(lanes.len());
    for lane in lanes.iter().filter(|lane| !lane.skip) {
        let Dim2 { x, y } = lane.global;
        if x >= n || y >= n {
            return Err(fault(group, "write of C", x, y));
        }
        writes.push((x * n + y, acc[lane.local.x * tile + lane.local.y]));
    }

    Ok(GroupOutput { writes, chunks })
}

fn load(buf: &[f32], n: usize, row: usize, col: usize, pad: bool) -> Option<f32> {
    if row < n && col < n {
        buf.get(row * n + col).copied()
    } else if pad {
        Some(0.0)
    } else {
        None
    }
}

fn fault(group: Dim2, access: &str, row: usize, col: usize) -> AcceleratorError {
    AcceleratorError::Launch(format!(
        "kernel fault in group {group}: out-of-bounds {access} at [{row}, {col}]"
    ))
}
