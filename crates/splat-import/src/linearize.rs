//! Per-record value linearization: the numeric decode that turns raw
//! training-domain values into renderer-domain ones.
//!
//! Every transform here is per-record and pure, so records are processed in
//! parallel chunks. There is no error path: non-finite input flows through to
//! non-finite output, by contract.

use std::f32::consts::SQRT_2;

use glam::{Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;

use crate::PARALLEL_CHUNK;
use crate::layout::{DC_SLOT, OPACITY_SLOT, ROTATION_SLOT, SCALE_SLOT, SplatCloud};
use crate::sh::SH_C0;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn inverse_sigmoid(x: f32) -> f32 {
    (x / (1.0 - x)).ln()
}

/// Displayable color channel from a raw degree-0 SH coefficient.
pub fn sh0_to_color(coeff: f32) -> f32 {
    0.5 + SH_C0 * coeff
}

pub fn color_to_sh0(color: f32) -> f32 {
    (color - 0.5) / SH_C0
}

/// Normalize a file-order (scalar-first: w, x, y, z) quaternion and return it
/// in vector-first (x, y, z, w) order.
pub fn normalize_swizzle_rotation(wxyz: Vec4) -> Vec4 {
    wxyz.normalize().yzwx()
}

/// Smallest-three packing of a unit quaternion.
///
/// The largest-magnitude component is dropped (reconstructible from unit
/// length), with its sign folded into the kept three so that `q` and `-q`
/// collapse to one representative. The kept components move from
/// [-1/sqrt(2), 1/sqrt(2)] into [0, 1], and the dropped component's lane
/// index lands in w as `(index + 3) / 3`. A renderer-shared convention,
/// pinned by tests.
pub fn pack_smallest_three(q: Vec4) -> Vec4 {
    let abs_q = q.abs();
    let mut index = 0;
    let mut max_component = abs_q.x;
    if abs_q.y > max_component {
        index = 1;
        max_component = abs_q.y;
    }
    if abs_q.z > max_component {
        index = 2;
        max_component = abs_q.z;
    }
    if abs_q.w > max_component {
        index = 3;
    }

    // Rotate the dropped lane into w.
    let q = match index {
        0 => q.yzwx(),
        1 => q.xzwy(),
        2 => q.xywz(),
        _ => q,
    };

    let sign = if q.w >= 0.0 { 1.0 } else { -1.0 };
    let three = q.xyz() * sign * (SQRT_2 * 0.5) + Vec3::splat(0.5);
    three.extend((index as f32 + 3.0) / 3.0)
}

/// Inverse of [`pack_smallest_three`]. Returns a unit quaternion in
/// (x, y, z, w) order with a non-negative reconstructed component — the same
/// rotation, not necessarily the same sign, as the packing input.
pub fn unpack_smallest_three(packed: Vec4) -> Vec4 {
    let index = (packed.w * 3.0 - 3.0).round() as usize;
    let three = (packed.xyz() - Vec3::splat(0.5)) / (SQRT_2 * 0.5);
    let dropped = (1.0 - three.length_squared()).max(0.0).sqrt();
    let q = three.extend(dropped);
    match index {
        0 => q.wxyz(),
        1 => q.xwyz(),
        2 => q.xywz(),
        _ => q,
    }
}

fn slot(record: &[u32], slot: usize) -> f32 {
    f32::from_bits(record[slot])
}

fn set_slot(record: &mut [u32], slot: usize, value: f32) {
    record[slot] = value.to_bits();
}

fn linearize_record(record: &mut [u32]) {
    // Rotation: normalize, reorder scalar-last, pack. The id slot, when the
    // layout has one, is never touched.
    let q = Vec4::new(
        slot(record, ROTATION_SLOT),
        slot(record, ROTATION_SLOT + 1),
        slot(record, ROTATION_SLOT + 2),
        slot(record, ROTATION_SLOT + 3),
    );
    let packed = pack_smallest_three(normalize_swizzle_rotation(q));
    set_slot(record, ROTATION_SLOT, packed.x);
    set_slot(record, ROTATION_SLOT + 1, packed.y);
    set_slot(record, ROTATION_SLOT + 2, packed.z);
    set_slot(record, ROTATION_SLOT + 3, packed.w);

    // Scale: log-domain to linear.
    for lane in 0..3 {
        let v = slot(record, SCALE_SLOT + lane);
        set_slot(record, SCALE_SLOT + lane, v.exp());
    }

    // Opacity: logit to probability.
    set_slot(record, OPACITY_SLOT, sigmoid(slot(record, OPACITY_SLOT)));

    // Base color: degree-0 SH coefficient to displayable value.
    for lane in 0..3 {
        let v = slot(record, DC_SLOT + lane);
        set_slot(record, DC_SLOT + lane, sh0_to_color(v));
    }
}

/// Linearize every record in place, in parallel chunks.
pub fn linearize_records(cloud: &mut SplatCloud) {
    let slots = cloud.variant().slot_count();
    cloud
        .words_mut()
        .par_chunks_mut(slots * PARALLEL_CHUNK)
        .for_each(|chunk| {
            for record in chunk.chunks_mut(slots) {
                linearize_record(record);
            }
        });
}
