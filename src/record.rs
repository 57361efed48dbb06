//! Fixed width telemetry records, as emitted by the fast acquisition
//! hardware. One record carries one Ethernet frame worth of packed
//! spectral samples along with its stream bookkeeping fields.
use crate::{
    constants::{AMPLITUDE_MASK, AVERAGING_EXPONENT_MASK, KURTOSIS_SHIFT},
    error::ParsingError,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use itertools::Itertools;

/// One 64-bit payload word: amplitude in the low 55 bits,
/// hardware kurtosis estimate above.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PackedSample(pub u64);

impl PackedSample {
    /// Spectral amplitude (ADC counts, averaged on board).
    pub fn amplitude(&self) -> u64 {
        self.0 & AMPLITUDE_MASK
    }
    /// Statistical quality estimate for this bin.
    pub fn kurtosis(&self) -> u64 {
        self.0 >> KURTOSIS_SHIFT
    }
    /// Packs both fields back into a payload word.
    /// Amplitude is truncated to its 55 bit range.
    pub fn pack(amplitude: u64, kurtosis: u64) -> Self {
        Self((kurtosis << KURTOSIS_SHIFT) | (amplitude & AMPLITUDE_MASK))
    }
}

/// Width of a single schema field element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    U32,
    U64,
}

impl FieldKind {
    pub fn size(&self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

impl std::str::FromStr for FieldKind {
    type Err = ParsingError;
    /// Accepts both rust style ("u32") and numpy style ("u4") widths,
    /// with an optional byte order prefix that is ignored here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_start_matches(['<', '>', '=']);
        match trimmed {
            "u32" | "u4" => Ok(Self::U32),
            "u64" | "u8" => Ok(Self::U64),
            _ => Err(ParsingError::UnknownFieldKind(s.to_string())),
        }
    }
}

/// Byte order of the record stream.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// One field of the record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name: the decoder resolves the well known fields
    /// ("cnt", "avg_kurt", "state", "channel", "data") by name.
    pub name: String,
    pub kind: FieldKind,
    /// Number of elements (1 for scalars, payload length for "data").
    pub count: usize,
}

impl FieldSpec {
    pub fn size(&self) -> usize {
        self.kind.size() * self.count
    }
}

/// Configuration driven record layout. The field list describes the
/// hardware telemetry unit byte per byte; unknown extra fields are
/// skipped over, so firmware revisions that append diagnostics still
/// decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub byte_order: Endianness,
    pub fields: Vec<FieldSpec>,
}

impl Default for RecordSchema {
    /// The 1-3 GHz receiver layout: four u32 scalars followed by
    /// 128 packed u64 samples, little endian.
    fn default() -> Self {
        let scalar = |name: &str| FieldSpec {
            name: name.to_string(),
            kind: FieldKind::U32,
            count: 1,
        };
        Self {
            byte_order: Endianness::Little,
            fields: vec![
                scalar("cnt"),
                scalar("avg_kurt"),
                scalar("state"),
                scalar("channel"),
                FieldSpec {
                    name: "data".to_string(),
                    kind: FieldKind::U64,
                    count: 0x80,
                },
            ],
        }
    }
}

impl RecordSchema {
    /// Total serialized record size, in bytes.
    pub fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.size()).sum()
    }

    /// Payload length in 64-bit words.
    pub fn payload_len(&self) -> usize {
        self.fields
            .iter()
            .find(|f| f.name == "data")
            .map(|f| f.count)
            .unwrap_or(0)
    }

    fn offset_of(&self, name: &str) -> Result<usize, ParsingError> {
        let mut offset = 0;
        for field in self.fields.iter() {
            if field.name == name {
                return Ok(offset);
            }
            offset += field.size();
        }
        Err(ParsingError::IncompleteSchema(name.to_string()))
    }

    /// Verifies all well known fields are declared.
    pub fn validate(&self) -> Result<(), ParsingError> {
        for name in ["cnt", "avg_kurt", "state", "channel", "data"] {
            self.offset_of(name)?;
        }
        Ok(())
    }
}

/// One decoded hardware telemetry unit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Monotonic frame counter, per (channel, polarization) stream.
    /// Gaps denote frames lost on the wire.
    pub frame_index: u32,
    /// Low 6 bits: log2 of the on board averaging factor,
    /// shared by the entire acquisition.
    pub avg_kurtosis: u32,
    /// State bitfield: polarization selector and calibration
    /// generator bits, positions are configuration driven.
    pub state: u32,
    /// Sub-band id, 0 (1-2 GHz) or 1 (2-3 GHz).
    pub channel: u32,
    /// Packed samples, one per frequency bin of this frame.
    pub payload: Vec<u64>,
}

impl RawRecord {
    /// A zero filled gap frame of `payload_len` words, standing in
    /// for a frame index that was never observed.
    pub fn gap(payload_len: usize) -> Self {
        Self {
            payload: vec![0; payload_len],
            ..Default::default()
        }
    }

    /// Log2 averaging exponent carried by this record.
    pub fn averaging_exponent(&self) -> u32 {
        self.avg_kurtosis & AVERAGING_EXPONENT_MASK
    }
}

/// Decodes a raw byte buffer as a flat sequence of fixed size records.
/// The buffer must hold a whole number of records.
pub fn decode_records(buf: &[u8], schema: &RecordSchema) -> Result<Vec<RawRecord>, ParsingError> {
    schema.validate()?;

    let size = schema.record_size();
    if buf.len() % size != 0 {
        return Err(ParsingError::TruncatedRecordStream);
    }

    let cnt_offset = schema.offset_of("cnt")?;
    let avg_offset = schema.offset_of("avg_kurt")?;
    let state_offset = schema.offset_of("state")?;
    let channel_offset = schema.offset_of("channel")?;
    let data_offset = schema.offset_of("data")?;
    let payload_len = schema.payload_len();

    let read_u32 = |bytes: &[u8]| match schema.byte_order {
        Endianness::Little => LittleEndian::read_u32(bytes),
        Endianness::Big => BigEndian::read_u32(bytes),
    };

    let mut records = Vec::with_capacity(buf.len() / size);
    for chunk in buf.chunks_exact(size) {
        let channel = read_u32(&chunk[channel_offset..]);
        if channel > 1 {
            return Err(ParsingError::UnknownChannel(channel));
        }

        let mut payload = vec![0_u64; payload_len];
        match schema.byte_order {
            Endianness::Little => {
                LittleEndian::read_u64_into(
                    &chunk[data_offset..data_offset + payload_len * 8],
                    &mut payload,
                );
            },
            Endianness::Big => {
                BigEndian::read_u64_into(
                    &chunk[data_offset..data_offset + payload_len * 8],
                    &mut payload,
                );
            },
        }

        records.push(RawRecord {
            frame_index: read_u32(&chunk[cnt_offset..]),
            avg_kurtosis: read_u32(&chunk[avg_offset..]),
            state: read_u32(&chunk[state_offset..]),
            channel,
            payload,
        });
    }
    Ok(records)
}

/// Spectrum length shared by the entire capture, derived from the
/// averaging exponent of the record stream. The exponent must be
/// uniform: a capture mixing averaging factors is rejected.
pub fn spectrum_length(records: &[RawRecord], fft_size: u32) -> Result<usize, ParsingError> {
    if !records
        .iter()
        .map(|rec| rec.averaging_exponent())
        .all_equal()
    {
        return Err(ParsingError::NonUniformAveraging);
    }
    match records.first() {
        Some(first) => Ok((fft_size >> first.averaging_exponent()) as usize),
        None => Ok(fft_size as usize),
    }
}

/// Serializes records back to their wire representation.
/// The inverse of [decode_records], used to build test captures.
pub fn encode_records(records: &[RawRecord], schema: &RecordSchema) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * schema.record_size());
    for rec in records.iter() {
        for field in schema.fields.iter() {
            let scalar = match field.name.as_str() {
                "cnt" => Some(rec.frame_index),
                "avg_kurt" => Some(rec.avg_kurtosis),
                "state" => Some(rec.state),
                "channel" => Some(rec.channel),
                _ => None,
            };
            match (field.name.as_str(), scalar) {
                ("data", _) => {
                    for i in 0..field.count {
                        let word = rec.payload.get(i).copied().unwrap_or(0);
                        let mut bytes = [0_u8; 8];
                        match schema.byte_order {
                            Endianness::Little => LittleEndian::write_u64(&mut bytes, word),
                            Endianness::Big => BigEndian::write_u64(&mut bytes, word),
                        }
                        out.extend_from_slice(&bytes);
                    }
                },
                (_, Some(value)) => {
                    let mut bytes = [0_u8; 4];
                    match schema.byte_order {
                        Endianness::Little => LittleEndian::write_u32(&mut bytes, value),
                        Endianness::Big => BigEndian::write_u32(&mut bytes, value),
                    }
                    out.extend_from_slice(&bytes);
                },
                (_, None) => {
                    // unknown extra field: zero filled
                    out.extend(std::iter::repeat(0_u8).take(field.size()));
                },
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn packed_sample_bitfields() {
        for (amplitude, kurtosis) in [(0, 0), (1, 0), (0, 1), (12345678, 257), (AMPLITUDE_MASK, 511)]
        {
            let packed = PackedSample::pack(amplitude, kurtosis);
            assert_eq!(packed.amplitude(), amplitude);
            assert_eq!(packed.kurtosis(), kurtosis);
        }
        // bit ranges are disjoint
        let v = PackedSample(u64::MAX);
        assert_eq!(v.amplitude(), AMPLITUDE_MASK);
        assert_eq!(v.kurtosis(), u64::MAX >> KURTOSIS_SHIFT);
    }

    #[test]
    fn field_kind_parsing() {
        assert_eq!(FieldKind::from_str("<u4").unwrap(), FieldKind::U32);
        assert_eq!(FieldKind::from_str("u32").unwrap(), FieldKind::U32);
        assert_eq!(FieldKind::from_str("<u8").unwrap(), FieldKind::U64);
        assert_eq!(FieldKind::from_str("u64").unwrap(), FieldKind::U64);
        assert!(FieldKind::from_str("f32").is_err());
    }

    #[test]
    fn default_schema_layout() {
        let schema = RecordSchema::default();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.record_size(), 16 + 0x80 * 8);
        assert_eq!(schema.payload_len(), 0x80);
    }

    #[test]
    fn record_roundtrip() {
        let schema = RecordSchema::default();
        let records = vec![
            RawRecord {
                frame_index: 0,
                avg_kurtosis: 4,
                state: 0x0008_0000,
                channel: 0,
                payload: (0..0x80).map(|i| PackedSample::pack(i, 100).0).collect(),
            },
            RawRecord {
                frame_index: 1,
                avg_kurtosis: 4,
                state: 0,
                channel: 1,
                payload: vec![0; 0x80],
            },
        ];
        let buf = encode_records(&records, &schema);
        assert_eq!(buf.len(), 2 * schema.record_size());

        let decoded = decode_records(&buf, &schema).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn rejects_bad_channel() {
        let schema = RecordSchema::default();
        let mut rec = RawRecord::gap(0x80);
        rec.channel = 3;
        let buf = encode_records(&[rec], &schema);
        assert!(matches!(
            decode_records(&buf, &schema),
            Err(ParsingError::UnknownChannel(3))
        ));
    }

    #[test]
    fn rejects_truncated_stream() {
        let schema = RecordSchema::default();
        let buf = vec![0_u8; schema.record_size() - 1];
        assert!(matches!(
            decode_records(&buf, &schema),
            Err(ParsingError::TruncatedRecordStream)
        ));
    }

    #[test]
    fn spectrum_length_from_exponent() {
        let mut rec = RawRecord::gap(0x80);
        rec.avg_kurtosis = 4; // 8192 / 16
        assert_eq!(spectrum_length(&[rec.clone()], 8192).unwrap(), 512);

        let mut other = rec.clone();
        other.avg_kurtosis = 5;
        assert!(matches!(
            spectrum_length(&[rec, other], 8192),
            Err(ParsingError::NonUniformAveraging)
        ));

        // empty capture: no averaging information
        assert_eq!(spectrum_length(&[], 8192).unwrap(), 8192);
    }
}
