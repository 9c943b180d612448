//! Serialize a canonical cloud back to a binary little-endian PLY.
//!
//! The exact inverse of the ingestion pipeline for one cloud: rotation is
//! unpacked to a scalar-first quaternion, scale returns to the log domain,
//! opacity to a logit, base color to a raw DC coefficient, and the SH range
//! is de-interleaved back to planar channel order.

use std::io::{self, Write};

use crate::layout::SplatCloud;
use crate::linearize::{color_to_sh0, inverse_sigmoid, unpack_smallest_three};
use crate::sh::{SH_COEFFS_PER_CHANNEL, sh_coeffs_for_degree};

/// Higher-order coefficient sets written per channel for a given export
/// degree, capped at the canonical capacity.
fn rest_sets_for_degree(sh_degree: u32) -> usize {
    (sh_coeffs_for_degree(sh_degree) as usize - 1).min(SH_COEFFS_PER_CHANNEL)
}

fn write_f32<W: Write>(out: &mut W, value: f32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

/// Write `cloud` as a complete binary PLY carrying SH up to `sh_degree`.
///
/// The output parses back through the ingestion pipeline; positions and ids
/// round-trip exactly, the linearized values up to float error.
pub fn write_ply<W: Write>(cloud: &SplatCloud, sh_degree: u32, out: &mut W) -> io::Result<()> {
    let rest_sets = rest_sets_for_degree(sh_degree);

    writeln!(out, "ply")?;
    writeln!(out, "format binary_little_endian 1.0")?;
    writeln!(out, "comment Exported by splat-import")?;
    writeln!(out, "element vertex {}", cloud.count())?;
    for name in ["x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2"] {
        writeln!(out, "property float {name}")?;
    }
    for i in 0..rest_sets * 3 {
        writeln!(out, "property float f_rest_{i}")?;
    }
    for name in ["opacity", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3"] {
        writeln!(out, "property float {name}")?;
    }
    if cloud.variant().has_point_ids() {
        writeln!(out, "property int vertex_id")?;
    }
    writeln!(out, "end_header")?;

    for i in 0..cloud.count() {
        let position = cloud.position(i);
        for v in position.to_array() {
            write_f32(out, v)?;
        }

        for v in cloud.dc_color(i).to_array() {
            write_f32(out, color_to_sh0(v))?;
        }

        // Interleaved (R_j, G_j, B_j) back to planar channels, truncated to
        // the export degree.
        let sh = cloud.sh_rest(i);
        for channel in 0..3 {
            for j in 0..rest_sets {
                write_f32(out, sh[j * 3 + channel])?;
            }
        }

        let opacity = cloud.opacity(i).clamp(1e-6, 1.0 - 1e-6);
        write_f32(out, inverse_sigmoid(opacity))?;

        for v in cloud.scale(i).to_array() {
            write_f32(out, v.ln())?;
        }

        // Back to the file's scalar-first quaternion order.
        let q = unpack_smallest_three(cloud.rotation(i));
        for v in [q.w, q.x, q.y, q.z] {
            write_f32(out, v)?;
        }

        if let Some(id) = cloud.point_id(i) {
            out.write_all(&id.to_le_bytes())?;
        }
    }

    Ok(())
}

/// [`write_ply`] into a fresh buffer.
pub fn export_ply(cloud: &SplatCloud, sh_degree: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(cloud.count() * cloud.variant().record_bytes());
    write_ply(cloud, sh_degree, &mut bytes).expect("writes to a Vec cannot fail");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::Vec4;
    use std::io::Cursor;

    use crate::layout::{
        DC_SLOT, LayoutVariant, OPACITY_SLOT, POINT_ID_SLOT, POSITION_SLOT, ROTATION_SLOT,
        SCALE_SLOT, SH_REST_SLOT,
    };
    use crate::linearize::pack_smallest_three;
    use crate::ply::parse_header;
    use crate::reader::{ReadOptions, ingest};

    /// Hand-build one linearized-domain record.
    fn sample_cloud(variant: LayoutVariant) -> SplatCloud {
        let mut cloud = SplatCloud::zeroed(variant, 1);
        let set = |cloud: &mut SplatCloud, slot: usize, v: f32| {
            cloud.words_mut()[slot] = v.to_bits();
        };

        set(&mut cloud, POSITION_SLOT, 1.5);
        set(&mut cloud, POSITION_SLOT + 1, -2.0);
        set(&mut cloud, POSITION_SLOT + 2, 0.25);
        for lane in 0..3 {
            set(&mut cloud, DC_SLOT + lane, 0.4 + 0.1 * lane as f32);
            set(&mut cloud, SCALE_SLOT + lane, 0.02 * (lane + 1) as f32);
        }
        for j in 0..24 {
            set(&mut cloud, SH_REST_SLOT + j, 0.01 * (j + 1) as f32);
        }
        set(&mut cloud, OPACITY_SLOT, 0.75);
        let packed = pack_smallest_three(Vec4::new(0.2, -0.3, 0.1, 0.9).normalize());
        set(&mut cloud, ROTATION_SLOT, packed.x);
        set(&mut cloud, ROTATION_SLOT + 1, packed.y);
        set(&mut cloud, ROTATION_SLOT + 2, packed.z);
        set(&mut cloud, ROTATION_SLOT + 3, packed.w);
        if variant.has_point_ids() {
            cloud.words_mut()[POINT_ID_SLOT] = 1234u32;
        }
        cloud
    }

    fn reingest(bytes: &[u8], options: &ReadOptions) -> SplatCloud {
        let mut cursor = Cursor::new(bytes);
        let header = parse_header(&mut cursor).unwrap();
        let body = crate::ply::read_body(&mut cursor, &header).unwrap();
        ingest(&header, &body, options).unwrap()
    }

    #[test]
    fn header_declares_the_canonical_field_set() {
        let cloud = sample_cloud(LayoutVariant::Standard);
        let bytes = export_ply(&cloud, 2);
        let header = parse_header(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(header.count, 1);
        // xyz + dc + 24 rest + opacity + scale + rot, all floats.
        assert_eq!(header.fields.len(), 3 + 3 + 24 + 1 + 3 + 4);
        assert_eq!(header.stride, header.fields.len() * 4);
        assert!(header.has_field("f_rest_23"));
        assert!(!header.has_field("f_rest_24"));
        assert!(!header.has_field("nx"));
    }

    #[test]
    fn export_then_ingest_round_trips() {
        let cloud = sample_cloud(LayoutVariant::Standard);
        let bytes = export_ply(&cloud, 2);
        let back = reingest(&bytes, &ReadOptions::default());

        assert_eq!(back.count(), 1);
        assert_eq!(back.position(0), cloud.position(0));
        for (a, b) in back.sh_rest(0).iter().zip(cloud.sh_rest(0)) {
            assert_approx_eq!(a, b, 1e-5);
        }
        assert_approx_eq!(back.opacity(0), cloud.opacity(0), 1e-5);
        for (a, b) in back.scale(0).to_array().iter().zip(cloud.scale(0).to_array()) {
            assert_approx_eq!(a, b, 1e-5);
        }
        for (a, b) in back.dc_color(0).to_array().iter().zip(cloud.dc_color(0).to_array()) {
            assert_approx_eq!(a, b, 1e-5);
        }
        for (a, b) in back.rotation(0).to_array().iter().zip(cloud.rotation(0).to_array()) {
            assert_approx_eq!(a, b, 1e-4);
        }
    }

    #[test]
    fn point_ids_round_trip_bit_exact() {
        let cloud = sample_cloud(LayoutVariant::WithPointIds);
        let bytes = export_ply(&cloud, 2);
        let options = ReadOptions {
            variant: LayoutVariant::WithPointIds,
            ..Default::default()
        };
        let back = reingest(&bytes, &options);
        assert_eq!(back.point_id(0), Some(1234));
    }

    #[test]
    fn degree_zero_export_has_no_rest_fields() {
        let cloud = sample_cloud(LayoutVariant::Standard);
        let bytes = export_ply(&cloud, 0);
        let header = parse_header(&mut Cursor::new(&bytes)).unwrap();
        assert!(!header.has_field("f_rest_0"));
    }
}
