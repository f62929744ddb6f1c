use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use cqdb::CQDBWriter;
use serde::Serialize;

use crate::config::ParserConfig;
use crate::error::Result;
use crate::features::FeatureSetup;
use crate::vocabulary::{EnumSet, Vocabulary};

use super::matrix::AveragedMatrix;
use super::{MAGIC, MODEL_TYPE, NUM_SETS, VERSION};

#[derive(Serialize)]
struct ConfChunk<'a> {
    config: &'a ParserConfig,
    features: &'a FeatureSetup,
}

/// Write a parser model as one binary blob
pub struct ModelWriter;

impl ModelWriter {
    pub fn write_file(
        path: &Path,
        config: &ParserConfig,
        features: &FeatureSetup,
        vocab: &Vocabulary,
        weights: &AveragedMatrix,
    ) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        Self::write(&mut file, config, features, vocab, weights)?;
        file.flush()?;
        Ok(())
    }

    pub fn to_bytes(
        config: &ParserConfig,
        features: &FeatureSetup,
        vocab: &Vocabulary,
        weights: &AveragedMatrix,
    ) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        Self::write(&mut cursor, config, features, vocab, weights)?;
        Ok(cursor.into_inner())
    }

    pub fn write<W: Write + Seek>(
        w: &mut W,
        config: &ParserConfig,
        features: &FeatureSetup,
        vocab: &Vocabulary,
        weights: &AveragedMatrix,
    ) -> Result<()> {
        let start = w.stream_position()?;

        let sets = vocab.sets();
        let mut set_offsets = [0u32; NUM_SETS];

        // Placeholder header, rewritten once the offsets are known
        Self::write_header(w, 0, 0, 0, &set_offsets, &sets)?;

        let off_conf = Self::offset(w, start)?;
        let conf = serde_json::to_vec(&ConfChunk { config, features })?;
        w.write_all(b"CONF")?;
        w.write_all(&(conf.len() as u32).to_le_bytes())?;
        w.write_all(&conf)?;

        for (offset, set) in set_offsets.iter_mut().zip(sets.iter()) {
            Self::align_to_u32(w, start)?;
            *offset = Self::offset(w, start)?;
            Self::write_cqdb(w, set)?;
        }

        Self::align_to_u32(w, start)?;
        let off_weights = Self::offset(w, start)?;
        Self::write_weights(w, weights)?;

        let size = Self::offset(w, start)?;
        w.seek(SeekFrom::Start(start))?;
        Self::write_header(w, size, off_conf, off_weights, &set_offsets, &sets)?;
        w.seek(SeekFrom::Start(start + u64::from(size)))?;
        Ok(())
    }

    /// Position relative to the start of the blob
    fn offset<W: Seek>(w: &mut W, start: u64) -> io::Result<u32> {
        let pos = w.stream_position()? - start;
        u32::try_from(pos).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "model exceeds u32::MAX bytes")
        })
    }

    fn write_header<W: Write>(
        w: &mut W,
        size: u32,
        off_conf: u32,
        off_weights: u32,
        set_offsets: &[u32; NUM_SETS],
        sets: &[&EnumSet; NUM_SETS],
    ) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&size.to_le_bytes())?;
        w.write_all(MODEL_TYPE)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&off_conf.to_le_bytes())?;
        w.write_all(&off_weights.to_le_bytes())?;
        for (offset, set) in set_offsets.iter().zip(sets.iter()) {
            w.write_all(&offset.to_le_bytes())?;
            w.write_all(&(set.len() as u32).to_le_bytes())?;
        }
        Ok(())
    }

    fn align_to_u32<W: Write + Seek>(w: &mut W, start: u64) -> io::Result<()> {
        let mut pos = w.stream_position()? - start;
        while pos % 4 != 0 {
            w.write_all(&[0])?;
            pos += 1;
        }
        Ok(())
    }

    /// The CQDB writer flushes its tables when dropped at the end of scope
    fn write_cqdb<W: Write + Seek>(w: &mut W, set: &EnumSet) -> io::Result<()> {
        let mut writer = CQDBWriter::new(w)?;
        for (id, value) in set.values().iter().enumerate() {
            writer.put(value, id as u32)?;
        }
        Ok(())
    }

    fn write_weights<W: Write>(w: &mut W, weights: &AveragedMatrix) -> io::Result<()> {
        let cells: Vec<_> = weights.iter_cells().collect();
        w.write_all(b"WGHT")?;
        w.write_all(&weights.generation().to_le_bytes())?;
        w.write_all(&u32::from(weights.is_finalized()).to_le_bytes())?;
        w.write_all(&(cells.len() as u32).to_le_bytes())?;
        for (feature, transition, cell) in cells {
            w.write_all(&feature.to_le_bytes())?;
            w.write_all(&transition.0.to_le_bytes())?;
            w.write_all(&cell.value.to_le_bytes())?;
            w.write_all(&cell.total.to_le_bytes())?;
            w.write_all(&cell.stamp.to_le_bytes())?;
        }
        Ok(())
    }
}
