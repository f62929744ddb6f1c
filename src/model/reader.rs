use std::io;

use bstr::ByteSlice;
use cqdb::CQDB;
use serde::Deserialize;

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::features::FeatureSetup;
use crate::transition::Transition;
use crate::vocabulary::{EnumSet, Vocabulary};

use super::matrix::{AveragedMatrix, HistoryValue};
use super::{HEADER_SIZE, MAGIC, MODEL_TYPE, NUM_SETS, VERSION};

const CELL_SIZE: usize = 32;
/// Smallest CQDB record: id, key length and the key's terminating nul
const MIN_RECORD_SIZE: usize = 9;

#[inline]
fn unpack_u32(buf: &[u8], at: usize) -> io::Result<u32> {
    match buf.get(at..at + 4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking u32",
        )),
    }
}

#[inline]
fn unpack_u64(buf: &[u8], at: usize) -> io::Result<u64> {
    match buf.get(at..at + 8) {
        Some(b) => Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking u64",
        )),
    }
}

#[inline]
fn unpack_f64(buf: &[u8], at: usize) -> io::Result<f64> {
    unpack_u64(buf, at).map(f64::from_bits)
}

#[derive(Deserialize)]
struct ConfChunk {
    config: ParserConfig,
    features: FeatureSetup,
}

/// Everything stored in a model blob
#[derive(Debug, Clone)]
pub struct ModelData {
    pub config: ParserConfig,
    pub features: FeatureSetup,
    pub vocab: Vocabulary,
    pub weights: AveragedMatrix,
}

/// Read a blob written by [`ModelWriter`](super::ModelWriter)
pub struct ModelReader;

impl ModelReader {
    pub fn read(buf: &[u8]) -> Result<ModelData> {
        let size = buf.len();
        if size < HEADER_SIZE {
            return Err(Error::InvalidModel("blob is shorter than its header".into()));
        }
        if &buf[0..4] != MAGIC {
            return Err(Error::InvalidModel("magic mismatch".into()));
        }
        let declared = unpack_u32(buf, 4)? as usize;
        if declared > size {
            return Err(Error::InvalidModel(format!(
                "blob declares {} bytes but holds {}",
                declared, size
            )));
        }
        if &buf[8..12] != MODEL_TYPE {
            return Err(Error::InvalidModel("not a parser model".into()));
        }
        let version = unpack_u32(buf, 12)?;
        if version != VERSION {
            return Err(Error::InvalidModel(format!("unsupported version {}", version)));
        }
        let buf = &buf[..declared];
        let off_conf = unpack_u32(buf, 16)? as usize;
        let off_weights = unpack_u32(buf, 20)? as usize;

        let conf = Self::read_conf(buf, off_conf)?;

        let names = Vocabulary::empty().sets().map(EnumSet::name);
        let mut sets = Vec::with_capacity(NUM_SETS);
        for (i, name) in names.iter().enumerate() {
            let offset = unpack_u32(buf, 24 + 8 * i)? as usize;
            let count = unpack_u32(buf, 28 + 8 * i)?;
            sets.push(Self::read_set(buf, offset, count, name)?);
        }
        let vocab = Vocabulary::from_sets(sets)?;
        let weights = Self::read_weights(buf, off_weights)?;

        Ok(ModelData {
            config: conf.config,
            features: conf.features,
            vocab,
            weights,
        })
    }

    fn read_conf(buf: &[u8], offset: usize) -> Result<ConfChunk> {
        if buf.get(offset..offset + 4) != Some(b"CONF".as_slice()) {
            return Err(Error::InvalidModel("missing CONF chunk".into()));
        }
        let len = unpack_u32(buf, offset + 4)? as usize;
        let json = (offset + 8)
            .checked_add(len)
            .and_then(|end| buf.get(offset + 8..end))
            .ok_or_else(|| Error::InvalidModel("truncated CONF chunk".into()))?;
        Ok(serde_json::from_slice(json)?)
    }

    fn read_set(buf: &[u8], offset: usize, count: u32, name: &'static str) -> Result<EnumSet> {
        if offset >= buf.len() {
            return Err(Error::InvalidModel(format!("{} dictionary out of bounds", name)));
        }
        let remaining = buf.len() - offset;
        if count as usize > remaining / MIN_RECORD_SIZE {
            return Err(Error::InvalidModel(format!(
                "{} declares {} entries in {} bytes",
                name, count, remaining
            )));
        }
        let db = CQDB::new(&buf[offset..])?;
        let values = (0..count)
            .map(|id| {
                db.to_str(id)
                    .and_then(|s| s.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidModel(format!("{} has no entry {}", name, id)))
            })
            .collect::<Result<Vec<_>>>()?;
        EnumSet::from_values(name, values)
    }

    fn read_weights(buf: &[u8], offset: usize) -> Result<AveragedMatrix> {
        if buf.get(offset..offset + 4) != Some(b"WGHT".as_slice()) {
            return Err(Error::InvalidModel("missing WGHT chunk".into()));
        }
        let generation = unpack_u64(buf, offset + 4)?;
        let finalized = unpack_u32(buf, offset + 12)? != 0;
        let count = unpack_u32(buf, offset + 16)? as usize;
        let mut at = offset + 20;
        let fits = count
            .checked_mul(CELL_SIZE)
            .and_then(|len| at.checked_add(len))
            .map_or(false, |end| end <= buf.len());
        if !fits {
            return Err(Error::InvalidModel(format!(
                "WGHT declares {} cells in {} bytes",
                count,
                buf.len().saturating_sub(at)
            )));
        }
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let feature = unpack_u32(buf, at)?;
            let transition = Transition(unpack_u32(buf, at + 4)?);
            let cell = HistoryValue {
                value: unpack_f64(buf, at + 8)?,
                total: unpack_f64(buf, at + 16)?,
                stamp: unpack_u64(buf, at + 24)?,
            };
            cells.push((feature, transition, cell));
            at += CELL_SIZE;
        }
        Ok(AveragedMatrix::from_cells(generation, finalized, cells))
    }
}
