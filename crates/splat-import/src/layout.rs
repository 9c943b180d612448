//! The canonical splat record layout and the mapping of source fields onto
//! it.
//!
//! The layout is declared as data (an ordered slot-name table), not derived
//! from any struct's memory packing. Every slot is one 4-byte word; the
//! record byte width is therefore `4 * slot_count` by construction.

use glam::{Vec3, Vec4};

use crate::ImportError;
use crate::ply::{PlyHeader, PropertyType};

/// Names of every canonical slot, in destination order. [`LayoutVariant::Standard`]
/// uses the first 62 entries, [`LayoutVariant::WithPointIds`] all 63.
const SLOT_NAMES: [&str; 63] = [
    "x", "y", "z", // position
    "nx", "ny", "nz", // normal
    "f_dc_0", "f_dc_1", "f_dc_2", // SH DC / base color
    "f_rest_0", "f_rest_1", "f_rest_2", "f_rest_3", "f_rest_4", "f_rest_5", "f_rest_6",
    "f_rest_7", "f_rest_8", "f_rest_9", "f_rest_10", "f_rest_11", "f_rest_12", "f_rest_13",
    "f_rest_14", "f_rest_15", "f_rest_16", "f_rest_17", "f_rest_18", "f_rest_19", "f_rest_20",
    "f_rest_21", "f_rest_22", "f_rest_23", "f_rest_24", "f_rest_25", "f_rest_26", "f_rest_27",
    "f_rest_28", "f_rest_29", "f_rest_30", "f_rest_31", "f_rest_32", "f_rest_33", "f_rest_34",
    "f_rest_35", "f_rest_36", "f_rest_37", "f_rest_38", "f_rest_39", "f_rest_40", "f_rest_41",
    "f_rest_42", "f_rest_43", "f_rest_44", // 45 higher-order SH slots
    "opacity", //
    "scale_0", "scale_1", "scale_2", // log scale in, linear out
    "rot_0", "rot_1", "rot_2", "rot_3", // quaternion in, packed rotation out
    "vertex_id", // per-point id, variant only
];

/// Properties a file must declare (as floats) to count as a splat cloud.
const REQUIRED_ATTRIBUTES: [&str; 14] = [
    "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

pub const POSITION_SLOT: usize = 0;
pub const NORMAL_SLOT: usize = 3;
pub const DC_SLOT: usize = 6;
pub const SH_REST_SLOT: usize = 9;
pub const SH_REST_SLOTS: usize = 45;
pub const OPACITY_SLOT: usize = 54;
pub const SCALE_SLOT: usize = 55;
pub const ROTATION_SLOT: usize = 58;
pub const POINT_ID_SLOT: usize = 62;

/// Which canonical record shape to produce. One schema, two widths; never two
/// code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutVariant {
    /// 62 slots, no per-point id.
    #[default]
    Standard,
    /// 63 slots; the trailing slot carries an integer id untouched by
    /// linearization.
    WithPointIds,
}

impl LayoutVariant {
    pub fn slot_names(&self) -> &'static [&'static str] {
        match self {
            Self::Standard => &SLOT_NAMES[..POINT_ID_SLOT],
            Self::WithPointIds => &SLOT_NAMES,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_names().len()
    }

    pub fn record_bytes(&self) -> usize {
        self.slot_count() * 4
    }

    pub fn has_point_ids(&self) -> bool {
        matches!(self, Self::WithPointIds)
    }
}

/// Source byte offset per canonical slot, or -1 when the file does not carry
/// the attribute. Built once per file, read-only during transcoding.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    offsets: Vec<i32>,
}

impl OffsetTable {
    /// Resolve the canonical slot names against a header's field list.
    ///
    /// Fails with [`ImportError::MissingAttributes`] (naming every missing
    /// field, comma-joined) unless the required float attributes are all
    /// declared. Matching for individual slots is by name, so the int-typed
    /// id attribute resolves through the same path. A match whose word would
    /// read past the record end is treated as absent, which keeps all
    /// per-record access bounds-checked once, here.
    pub fn map(header: &PlyHeader, variant: LayoutVariant) -> Result<Self, ImportError> {
        let missing: Vec<&str> = REQUIRED_ATTRIBUTES
            .iter()
            .copied()
            .filter(|required| {
                !header
                    .fields
                    .iter()
                    .any(|(name, ty)| name == required && *ty == PropertyType::Float)
            })
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingAttributes(missing.join(",")));
        }

        let offsets = variant
            .slot_names()
            .iter()
            .map(|&name| match header.offset_of(name) {
                Some(offset) if offset + 4 <= header.stride => offset as i32,
                _ => -1,
            })
            .collect();
        Ok(Self { offsets })
    }

    pub fn get(&self, slot: usize) -> i32 {
        self.offsets[slot]
    }

    pub fn slot_count(&self) -> usize {
        self.offsets.len()
    }
}

/// A contiguous array of canonical splat records, one opaque 4-byte word per
/// slot.
///
/// The pipeline mutates the buffer in place (transcode, then harmonics
/// reorder, then linearization); afterwards the cloud is handed to the caller
/// by value and never touched again.
#[derive(Debug, Clone)]
pub struct SplatCloud {
    variant: LayoutVariant,
    count: usize,
    data: Vec<u32>,
}

impl SplatCloud {
    pub(crate) fn zeroed(variant: LayoutVariant, count: usize) -> Self {
        Self {
            variant,
            count,
            data: vec![0; count * variant.slot_count()],
        }
    }

    pub fn variant(&self) -> LayoutVariant {
        self.variant
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The raw slot words of the whole array.
    pub fn words(&self) -> &[u32] {
        &self.data
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }

    /// The whole array as little-endian bytes, e.g. for a GPU upload or a
    /// serializer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// The slot words of one record.
    pub fn record(&self, index: usize) -> &[u32] {
        let slots = self.variant.slot_count();
        &self.data[index * slots..(index + 1) * slots]
    }

    fn float(&self, index: usize, slot: usize) -> f32 {
        f32::from_bits(self.record(index)[slot])
    }

    fn vec3(&self, index: usize, slot: usize) -> Vec3 {
        Vec3::new(
            self.float(index, slot),
            self.float(index, slot + 1),
            self.float(index, slot + 2),
        )
    }

    pub fn position(&self, index: usize) -> Vec3 {
        self.vec3(index, POSITION_SLOT)
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        self.vec3(index, NORMAL_SLOT)
    }

    /// Displayable base color after linearization (raw DC coefficients
    /// before).
    pub fn dc_color(&self, index: usize) -> Vec3 {
        self.vec3(index, DC_SLOT)
    }

    /// The 45 higher-order SH slots, interleaved `(R_j, G_j, B_j)` after the
    /// harmonics reorder.
    pub fn sh_rest(&self, index: usize) -> [f32; SH_REST_SLOTS] {
        std::array::from_fn(|i| self.float(index, SH_REST_SLOT + i))
    }

    pub fn opacity(&self, index: usize) -> f32 {
        self.float(index, OPACITY_SLOT)
    }

    pub fn scale(&self, index: usize) -> Vec3 {
        self.vec3(index, SCALE_SLOT)
    }

    /// Rotation slots. After linearization this is the packed smallest-three
    /// encoding, not a quaternion.
    pub fn rotation(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.float(index, ROTATION_SLOT),
            self.float(index, ROTATION_SLOT + 1),
            self.float(index, ROTATION_SLOT + 2),
            self.float(index, ROTATION_SLOT + 3),
        )
    }

    pub fn point_id(&self, index: usize) -> Option<i32> {
        self.variant
            .has_point_ids()
            .then(|| self.record(index)[POINT_ID_SLOT] as i32)
    }
}
