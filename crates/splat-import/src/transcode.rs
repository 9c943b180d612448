//! Scatter-gather of source records into the canonical layout.
//!
//! Pure data movement: every field is an opaque little-endian 4-byte word,
//! whatever its declared type, so float and integer attributes share one copy
//! path. Slots the file does not carry are explicitly zeroed — downstream
//! code and callers may rely on that, not on the allocator.

use rayon::prelude::*;

use crate::PARALLEL_CHUNK;
use crate::layout::{LayoutVariant, OffsetTable, SplatCloud};

/// Copy `count` records of `src_stride` bytes into a fresh canonical array,
/// using one source byte offset (or -1 for absent) per canonical slot.
///
/// Records are independent, so the work is split into contiguous chunks
/// processed in parallel; rayon joins them all before this returns.
pub fn transcode_records(
    src: &[u8],
    count: usize,
    src_stride: usize,
    offsets: &OffsetTable,
    variant: LayoutVariant,
) -> SplatCloud {
    let slots = variant.slot_count();
    debug_assert_eq!(offsets.slot_count(), slots);

    let mut cloud = SplatCloud::zeroed(variant, count);
    cloud
        .words_mut()
        .par_chunks_mut(slots * PARALLEL_CHUNK)
        .zip(src.par_chunks(src_stride * PARALLEL_CHUNK))
        .for_each(|(dst_chunk, src_chunk)| {
            for (record, dst) in dst_chunk.chunks_mut(slots).enumerate() {
                let src_record = &src_chunk[record * src_stride..][..src_stride];
                for (slot, word) in dst.iter_mut().enumerate() {
                    let offset = offsets.get(slot);
                    *word = if offset >= 0 {
                        let at = offset as usize;
                        u32::from_le_bytes(
                            src_record[at..at + 4]
                                .try_into()
                                .expect("offsets are validated against the stride"),
                        )
                    } else {
                        0
                    };
                }
            }
        });
    cloud
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImportError;
    use crate::layout::{
        DC_SLOT, NORMAL_SLOT, OPACITY_SLOT, POINT_ID_SLOT, POSITION_SLOT, ROTATION_SLOT,
        SCALE_SLOT, SH_REST_SLOT, SH_REST_SLOTS,
    };
    use crate::ply::parse_header;
    use std::io::Cursor;

    /// Minimal splat header: the 14 required floats plus whatever `extra`
    /// declares, in that order.
    fn mapped(extra: &str, variant: LayoutVariant) -> (usize, OffsetTable) {
        let mut text = String::from("format binary_little_endian 1.0\nelement vertex 2\n");
        for name in [
            "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1",
            "scale_2", "rot_0", "rot_1", "rot_2", "rot_3",
        ] {
            text.push_str(&format!("property float {name}\n"));
        }
        text.push_str(extra);
        text.push_str("end_header\n");
        let header = parse_header(&mut Cursor::new(text.as_bytes())).unwrap();
        let table = OffsetTable::map(&header, variant).unwrap();
        (header.stride, table)
    }

    fn body_of_floats(records: &[Vec<f32>]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for record in records {
            for value in record {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn copies_present_fields_word_for_word() {
        let (stride, table) = mapped("", LayoutVariant::Standard);
        let records = vec![
            (0..14).map(|v| v as f32 * 0.5).collect::<Vec<_>>(),
            (0..14).map(|v| -(v as f32)).collect::<Vec<_>>(),
        ];
        let body = body_of_floats(&records);

        let cloud = transcode_records(&body, 2, stride, &table, LayoutVariant::Standard);

        for (i, record) in records.iter().enumerate() {
            assert_eq!(cloud.position(i).to_array(), record[0..3]);
            assert_eq!(cloud.dc_color(i).to_array(), record[3..6]);
            assert_eq!(cloud.opacity(i), record[6]);
            assert_eq!(cloud.scale(i).to_array(), record[7..10]);
            assert_eq!(cloud.rotation(i).to_array(), record[10..14]);
        }
    }

    #[test]
    fn absent_slots_are_zero_filled() {
        let (stride, table) = mapped("", LayoutVariant::Standard);
        // Poison every word so untouched memory would be visible.
        let records = vec![vec![99.0f32; 14], vec![99.0f32; 14]];
        let body = body_of_floats(&records);

        let cloud = transcode_records(&body, 2, stride, &table, LayoutVariant::Standard);

        for i in 0..2 {
            assert_eq!(cloud.normal(i).to_array(), [0.0; 3]);
            assert_eq!(cloud.sh_rest(i), [0.0; SH_REST_SLOTS]);
        }
    }

    #[test]
    fn integer_ids_pass_through_bit_exact() {
        let (stride, table) = mapped("property int vertex_id\n", LayoutVariant::WithPointIds);
        let mut body = Vec::new();
        for (i, id) in [(0, 7i32), (1, -3i32)] {
            for v in 0..14 {
                body.extend_from_slice(&((i * 14 + v) as f32).to_le_bytes());
            }
            body.extend_from_slice(&id.to_le_bytes());
        }

        let cloud = transcode_records(&body, 2, stride, &table, LayoutVariant::WithPointIds);
        assert_eq!(cloud.point_id(0), Some(7));
        assert_eq!(cloud.point_id(1), Some(-3));
    }

    #[test]
    fn source_field_order_does_not_matter() {
        // opacity first, position last: offsets must follow the file, slots
        // must not.
        let text = "format binary_little_endian 1.0\n\
             element vertex 1\n\
             property float opacity\n\
             property float f_dc_0\n\
             property float f_dc_1\n\
             property float f_dc_2\n\
             property float scale_0\n\
             property float scale_1\n\
             property float scale_2\n\
             property float rot_0\n\
             property float rot_1\n\
             property float rot_2\n\
             property float rot_3\n\
             property float x\n\
             property float y\n\
             property float z\n\
             end_header\n";
        let header = parse_header(&mut Cursor::new(text.as_bytes())).unwrap();
        let table = OffsetTable::map(&header, LayoutVariant::Standard).unwrap();

        let values: Vec<f32> = (1..=14).map(|v| v as f32).collect();
        let body = body_of_floats(&[values]);
        let cloud = transcode_records(&body, 1, header.stride, &table, LayoutVariant::Standard);

        assert_eq!(cloud.opacity(0), 1.0);
        assert_eq!(cloud.position(0).to_array(), [12.0, 13.0, 14.0]);
    }

    // Keep the canonical sub-range constants honest against each other.
    #[test]
    fn sub_ranges_do_not_overlap() {
        assert_eq!(POSITION_SLOT + 3, NORMAL_SLOT);
        assert_eq!(NORMAL_SLOT + 3, DC_SLOT);
        assert_eq!(DC_SLOT + 3, SH_REST_SLOT);
        assert_eq!(SH_REST_SLOT + SH_REST_SLOTS, OPACITY_SLOT);
        assert_eq!(OPACITY_SLOT + 1, SCALE_SLOT);
        assert_eq!(SCALE_SLOT + 3, ROTATION_SLOT);
        assert_eq!(ROTATION_SLOT + 4, POINT_ID_SLOT);
    }

    #[test]
    fn short_body_is_rejected_before_transcode() {
        // The reader-level guard; transcode itself assumes full bodies.
        let text = "format binary_little_endian 1.0\n\
             element vertex 4\n\
             property float x\n\
             end_header\n";
        let header = parse_header(&mut Cursor::new(text.as_bytes())).unwrap();
        let body = [0u8; 9];
        let result = crate::ply::read_body(&mut Cursor::new(&body[..]), &header);
        assert!(matches!(result, Err(ImportError::TruncatedBody { .. })));
    }
}
