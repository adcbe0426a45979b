// Metal Shading Language source for the tiled matmul kernel.
//
// The tile edge is baked in as a compile-time constant because threadgroup
// arrays need a static size. Each boundary policy gets its own body.

use crate::tile::{BoundaryPolicy, TileConfig};

/// Entry point name of the generated kernel.
pub const ENTRY_POINT: &str = "tiled_matmul";

/// Buffer slots: A, B, C, then the `n` parameter.
pub const BUFFER_SLOTS: usize = 4;

const HEADER: &str = r#"#include <metal_stdlib>
using namespace metal;
"#;

/// Generate MSL source for one tile configuration.
pub fn tiled_matmul_source(config: &TileConfig) -> String {
    let (early_exit, load_a, load_b, store) = match config.boundary() {
        BoundaryPolicy::BothAxes => (
            "    if (x >= n && y >= n) {\n        return;\n    }\n",
            "A[x * n + (ty + k0)]",
            "B[(tx + k0) * n + y]",
            "    C[x * n + y] = acc;\n",
        ),
        BoundaryPolicy::EitherAxis => (
            "",
            "(x < n && ty + k0 < n) ? A[x * n + (ty + k0)] : 0.0f",
            "(tx + k0 < n && y < n) ? B[(tx + k0) * n + y] : 0.0f",
            "    if (x < n && y < n) {\n        C[x * n + y] = acc;\n    }\n",
        ),
    };

    format!(
        r#"{HEADER}
constant uint TILE = {tile};

kernel void {ENTRY_POINT}(
    device const float* A [[buffer(0)]],
    device const float* B [[buffer(1)]],
    device float* C [[buffer(2)]],
    constant uint& n [[buffer(3)]],
    uint2 gid [[thread_position_in_grid]],
    uint2 tid [[thread_position_in_threadgroup]],
    uint2 groups [[threadgroups_per_grid]])
{{
    threadgroup float sA[TILE * TILE];
    threadgroup float sB[TILE * TILE];

    const uint x = gid.x;
    const uint y = gid.y;
    const uint tx = tid.x;
    const uint ty = tid.y;

{early_exit}
    float acc = 0.0f;
    for (uint i = 0; i < groups.x; i++) {{
        const uint k0 = i * TILE;
        sA[tx * TILE + ty] = {load_a};
        sB[tx * TILE + ty] = {load_b};

        threadgroup_barrier(mem_flags::mem_threadgroup);

        for (uint j = 0; j < TILE; j++) {{
            acc += sA[tx * TILE + j] * sB[j * TILE + ty];
        }}

        threadgroup_barrier(mem_flags::mem_threadgroup);
    }}

{store}}}
"#,
        tile = config.tile(),
    )
}
