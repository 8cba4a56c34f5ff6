//! Flat record buffer handed to the traversal kernel.
//!
//! In memory each record is a tagged [`Record`]. The int32-as-float bit
//! reinterpretation the GPU expects only happens at the output boundary
//! ([`GpuRecord`], [`RecordBuffer::to_bytes`], [`RecordBuffer::write_to`]).
//!
//! Layout, three records per tree node:
//! ```text
//! [k + 0]  header  { primitive_id: i32, hit: i32, miss: i32 }
//! [k + 1]  bbox.min  vec3<f32>
//! [k + 2]  bbox.max  vec3<f32>
//! ```

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::aabb::BoundingBox;
use crate::util::{Error, Result};

/// Records emitted per tree node.
pub const RECORDS_PER_NODE: usize = 3;

/// Link value meaning "stop traversal".
pub const TERMINATE: i32 = -1;

/// Jump table entry for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Primitive id on leaves, `-1` on internal nodes.
    pub primitive_id: i32,
    /// Record index to continue at when the node's box is hit.
    pub hit: i32,
    /// Record index to continue at when the node's box is missed.
    pub miss: i32,
}

impl RecordHeader {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.primitive_id >= 0
    }
}

/// One slot of the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record {
    Header(RecordHeader),
    Vector(Vec3),
}

/// Byte layout used when the buffer leaves the crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLayout {
    /// 16 bytes per record (vec4, fourth lane zero). Storage-buffer friendly.
    #[default]
    Padded,
    /// 12 bytes per record, no padding.
    Packed,
}

impl RecordLayout {
    /// Bytes per record.
    pub const fn stride(self) -> usize {
        match self {
            Self::Padded => 16,
            Self::Packed => 12,
        }
    }
}

/// GPU-side record (16 bytes, matches a `vec4<u32>` / `vec4<f32>` slot).
///
/// Header lanes hold the int32 bit patterns; vector lanes hold `f32` bits.
/// Lane 3 is padding and always zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuRecord {
    pub lanes: [u32; 4],
}

impl From<Record> for GpuRecord {
    fn from(record: Record) -> Self {
        let lanes = match record {
            Record::Header(h) => [h.primitive_id as u32, h.hit as u32, h.miss as u32, 0],
            Record::Vector(v) => [v.x.to_bits(), v.y.to_bits(), v.z.to_bits(), 0],
        };
        Self { lanes }
    }
}

impl GpuRecord {
    fn as_header(&self) -> RecordHeader {
        RecordHeader {
            primitive_id: self.lanes[0] as i32,
            hit: self.lanes[1] as i32,
            miss: self.lanes[2] as i32,
        }
    }

    fn as_vector(&self) -> Vec3 {
        Vec3::new(
            f32::from_bits(self.lanes[0]),
            f32::from_bits(self.lanes[1]),
            f32::from_bits(self.lanes[2]),
        )
    }
}

/// Append-only record buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBuffer {
    records: Vec<Record>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            records: Vec::with_capacity(nodes * RECORDS_PER_NODE),
        }
    }

    /// Number of records (not nodes).
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.records.len() / RECORDS_PER_NODE
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn push_node(&mut self, header: RecordHeader, bbox: &BoundingBox) {
        self.records.push(Record::Header(header));
        self.records.push(Record::Vector(bbox.min));
        self.records.push(Record::Vector(bbox.max));
    }

    /// Header at a record index (a multiple of 3).
    pub fn header(&self, record_index: usize) -> Option<RecordHeader> {
        if record_index % RECORDS_PER_NODE != 0 {
            return None;
        }
        match self.records.get(record_index)? {
            Record::Header(h) => Some(*h),
            Record::Vector(_) => None,
        }
    }

    /// Box stored after the header at `record_index`.
    pub fn bounds(&self, record_index: usize) -> Option<BoundingBox> {
        self.header(record_index)?;
        match (
            self.records.get(record_index + 1)?,
            self.records.get(record_index + 2)?,
        ) {
            (Record::Vector(min), Record::Vector(max)) => Some(BoundingBox {
                min: *min,
                max: *max,
            }),
            _ => None,
        }
    }

    /// `(record_index, header, bbox)` for every node, in buffer order.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, RecordHeader, BoundingBox)> + '_ {
        self.records
            .chunks_exact(RECORDS_PER_NODE)
            .enumerate()
            .filter_map(|(i, chunk)| match chunk {
                [Record::Header(h), Record::Vector(min), Record::Vector(max)] => {
                    let bbox = BoundingBox {
                        min: *min,
                        max: *max,
                    };
                    Some((i * RECORDS_PER_NODE, *h, bbox))
                }
                _ => None,
            })
    }

    /// All headers in buffer order.
    pub fn headers(&self) -> impl Iterator<Item = RecordHeader> + '_ {
        self.nodes().map(|(_, h, _)| h)
    }

    /// Convert to the 16-byte GPU form.
    pub fn to_gpu_records(&self) -> Vec<GpuRecord> {
        self.records.iter().copied().map(GpuRecord::from).collect()
    }

    /// Raw bytes in the requested layout (native byte order, as uploaded).
    pub fn to_bytes(&self, layout: RecordLayout) -> Vec<u8> {
        let gpu = self.to_gpu_records();
        match layout {
            RecordLayout::Padded => bytemuck::cast_slice(&gpu).to_vec(),
            RecordLayout::Packed => {
                let mut out = Vec::with_capacity(gpu.len() * layout.stride());
                for r in &gpu {
                    out.extend_from_slice(bytemuck::cast_slice(&r.lanes[..3]));
                }
                out
            }
        }
    }

    /// Write the buffer little-endian in the requested layout.
    pub fn write_to<W: Write>(&self, mut writer: W, layout: RecordLayout) -> Result<()> {
        let lanes = layout.stride() / 4;
        for r in self.to_gpu_records() {
            for &lane in &r.lanes[..lanes] {
                writer.write_u32::<LittleEndian>(lane)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Rebuild a buffer from GPU records, checking the node stride.
    ///
    /// Record `3k` is read as a header and `3k + 1`, `3k + 2` as vectors.
    pub fn from_gpu_records(gpu: &[GpuRecord]) -> Result<Self> {
        if gpu.len() % RECORDS_PER_NODE != 0 {
            return Err(Error::malformed(format!(
                "{} records is not a multiple of {RECORDS_PER_NODE}",
                gpu.len()
            )));
        }
        let limit = gpu.len() as i64;
        let mut records = Vec::with_capacity(gpu.len());
        for (k, chunk) in gpu.chunks_exact(RECORDS_PER_NODE).enumerate() {
            let header = chunk[0].as_header();
            for link in [header.hit, header.miss] {
                let ok = link == TERMINATE
                    || (link >= 0
                        && (link as usize) % RECORDS_PER_NODE == 0
                        && (link as i64) < limit);
                if !ok {
                    return Err(Error::malformed(format!(
                        "node at record {} links to invalid index {link}",
                        k * RECORDS_PER_NODE
                    )));
                }
            }
            records.push(Record::Header(header));
            records.push(Record::Vector(chunk[1].as_vector()));
            records.push(Record::Vector(chunk[2].as_vector()));
        }
        Ok(Self { records })
    }

    /// Parse bytes produced by [`to_bytes`](Self::to_bytes) with `layout`.
    pub fn from_bytes(bytes: &[u8], layout: RecordLayout) -> Result<Self> {
        let stride = layout.stride();
        if bytes.len() % stride != 0 {
            return Err(Error::malformed(format!(
                "{} bytes is not a multiple of the {stride}-byte stride",
                bytes.len()
            )));
        }
        let gpu: Vec<GpuRecord> = bytes
            .chunks_exact(stride)
            .map(|chunk| {
                let mut lanes = [0u32; 4];
                for (lane, word) in lanes.iter_mut().zip(chunk.chunks_exact(4)) {
                    *lane = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
                }
                GpuRecord { lanes }
            })
            .collect();
        Self::from_gpu_records(&gpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordBuffer {
        let mut buf = RecordBuffer::new();
        buf.push_node(
            RecordHeader {
                primitive_id: 4,
                hit: TERMINATE,
                miss: TERMINATE,
            },
            &BoundingBox::new(Vec3::new(-1.0, 0.0, 0.5), Vec3::new(1.0, 2.0, 0.5)),
        );
        buf
    }

    #[test]
    fn test_gpu_record_size() {
        assert_eq!(std::mem::size_of::<GpuRecord>(), 16);
        assert_eq!(RecordLayout::Padded.stride(), 16);
        assert_eq!(RecordLayout::Packed.stride(), 12);
    }

    #[test]
    fn test_header_bits_reinterpret() {
        let gpu = GpuRecord::from(Record::Header(RecordHeader {
            primitive_id: -1,
            hit: 3,
            miss: -1,
        }));
        assert_eq!(gpu.lanes, [0xFFFF_FFFF, 3, 0xFFFF_FFFF, 0]);
    }

    #[test]
    fn test_vector_bits() {
        let gpu = GpuRecord::from(Record::Vector(Vec3::new(1.0, -2.0, 0.5)));
        assert_eq!(gpu.lanes, [1.0f32.to_bits(), (-2.0f32).to_bits(), 0.5f32.to_bits(), 0]);
    }

    #[test]
    fn test_accessors() {
        let buf = sample();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.node_count(), 1);
        assert_eq!(buf.header(0).unwrap().primitive_id, 4);
        assert!(buf.header(1).is_none());
        assert!(buf.header(3).is_none());
        assert_eq!(buf.bounds(0).unwrap().max, Vec3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_byte_lengths() {
        let buf = sample();
        assert_eq!(buf.to_bytes(RecordLayout::Padded).len(), 48);
        assert_eq!(buf.to_bytes(RecordLayout::Packed).len(), 36);
        let mut out = Vec::new();
        buf.write_to(&mut out, RecordLayout::Packed).unwrap();
        assert_eq!(out.len(), 36);
        assert_eq!(&out[0..4], &4u32.to_le_bytes());
    }

    #[test]
    fn test_from_bytes_restores_buffer() {
        let buf = sample();
        for layout in [RecordLayout::Padded, RecordLayout::Packed] {
            let back = RecordBuffer::from_bytes(&buf.to_bytes(layout), layout).unwrap();
            assert_eq!(back, buf);
        }
    }

    #[test]
    fn test_from_gpu_rejects_bad_stride() {
        let gpu = sample().to_gpu_records();
        assert!(RecordBuffer::from_gpu_records(&gpu[..2]).is_err());
    }

    #[test]
    fn test_from_gpu_rejects_bad_link() {
        let mut gpu = sample().to_gpu_records();
        gpu[0].lanes[1] = 4; // not a header index
        assert!(matches!(
            RecordBuffer::from_gpu_records(&gpu),
            Err(Error::MalformedBuffer(_))
        ));
        gpu[0].lanes[1] = 3; // past the end
        assert!(RecordBuffer::from_gpu_records(&gpu).is_err());
    }
}
