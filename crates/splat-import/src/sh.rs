//! Spherical harmonics constants and the coefficient reorder pass.

use rayon::prelude::*;

use crate::PARALLEL_CHUNK;
use crate::layout::{SH_REST_SLOT, SH_REST_SLOTS, SplatCloud};

/// Degree-0 SH basis constant. Shared convention with the renderer; pinned by
/// tests, not re-derived.
pub const SH_C0: f32 = 0.2820947917738781;

/// Per-channel coefficient sets the canonical layout reserves beyond the DC
/// term (degree 3).
pub const SH_COEFFS_PER_CHANNEL: usize = SH_REST_SLOTS / 3;

pub const fn sh_coeffs_for_degree(degree: u32) -> u32 {
    (degree + 1).pow(2)
}

pub fn sh_degree_from_coeffs(coeffs_per_channel: u32) -> Option<u32> {
    match coeffs_per_channel {
        1 => Some(0),
        4 => Some(1),
        9 => Some(2),
        16 => Some(3),
        _ => None,
    }
}

/// Rewrite each record's `f_rest` range from the file's planar channel order
/// (all R coefficients, then all G, then all B) into the interleaved
/// `(R_j, G_j, B_j)` order the renderer consumes. Coefficient sets past
/// `coeffs_per_channel` stay zero; a lower-degree source simply has no
/// higher-order detail.
///
/// `coeffs_per_channel` is configuration, deliberately not sniffed from the
/// data: the transcoder has already erased the source schema, and a wrong
/// count reads across the true channel groups and scrambles them silently.
pub fn reorder_sh_coeffs(cloud: &mut SplatCloud, coeffs_per_channel: usize) {
    let n = coeffs_per_channel.min(SH_COEFFS_PER_CHANNEL);
    let slots = cloud.variant().slot_count();
    cloud
        .words_mut()
        .par_chunks_mut(slots * PARALLEL_CHUNK)
        .for_each(|chunk| {
            for record in chunk.chunks_mut(slots) {
                let sh = &mut record[SH_REST_SLOT..SH_REST_SLOT + SH_REST_SLOTS];
                let mut interleaved = [0u32; SH_REST_SLOTS];
                for j in 0..n {
                    interleaved[j * 3] = sh[j];
                    interleaved[j * 3 + 1] = sh[j + n];
                    interleaved[j * 3 + 2] = sh[j + 2 * n];
                }
                sh.copy_from_slice(&interleaved);
            }
        });
}
