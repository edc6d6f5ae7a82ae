//! Binary snapshots of the owned particles of one partition.
//!
//! Big-endian layout:
//! magic, dim, number of scalar attributes, their names (length prefixed),
//! particle count, then per particle gid, subset, position, normal, scalars.

use crate::{ParticleRecord, ParticleSet, ScalarAttr, Subset};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::{
  fs::File,
  io::{BufReader, BufWriter, Read, Write},
  path::{Path, PathBuf},
};

const SNAPSHOT_MAGIC: u32 = 0x5053_4e31;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("not a particle snapshot (magic {0:#x})")]
  BadMagic(u32),
  #[error("unexpected snapshot layout: {0}")]
  Layout(String),
}

fn subset_code(subset: Subset) -> u8 {
  match subset {
    Subset::Bulk => 0,
    Subset::Boundary => 1,
  }
}
fn subset_from_code(code: u8) -> Result<Subset, SnapshotError> {
  match code {
    0 => Ok(Subset::Bulk),
    1 => Ok(Subset::Boundary),
    _ => Err(SnapshotError::Layout(format!("unknown subset code {code}"))),
  }
}

pub fn write_particles<W: Write>(
  mut writer: W,
  particles: &ParticleSet,
) -> Result<(), SnapshotError> {
  let dim = particles.dim();
  writer.write_u32::<BigEndian>(SNAPSHOT_MAGIC)?;
  writer.write_u32::<BigEndian>(dim as u32)?;

  writer.write_u32::<BigEndian>(ScalarAttr::COUNT as u32)?;
  for attr in ScalarAttr::ALL {
    let name = attr.name().as_bytes();
    writer.write_u32::<BigEndian>(name.len() as u32)?;
    writer.write_all(name)?;
  }

  writer.write_u64::<BigEndian>(particles.size_local() as u64)?;
  for i in particles.owned() {
    let record = particles.record(i);
    writer.write_u64::<BigEndian>(record.gid as u64)?;
    writer.write_u8(subset_code(record.subset))?;
    for &v in record.pos.iter().chain(&record.normal).chain(&record.scalars) {
      writer.write_f64::<BigEndian>(v)?;
    }
  }
  writer.flush()?;
  Ok(())
}

fn read_vec<R: Read>(reader: &mut R, len: usize) -> std::io::Result<Vec<f64>> {
  (0..len).map(|_| reader.read_f64::<BigEndian>()).collect()
}

pub fn read_particles<R: Read>(mut reader: R) -> Result<ParticleSet, SnapshotError> {
  let magic = reader.read_u32::<BigEndian>()?;
  if magic != SNAPSHOT_MAGIC {
    return Err(SnapshotError::BadMagic(magic));
  }
  let dim = reader.read_u32::<BigEndian>()? as usize;

  let nscalars = reader.read_u32::<BigEndian>()? as usize;
  if nscalars != ScalarAttr::COUNT {
    return Err(SnapshotError::Layout(format!(
      "{nscalars} scalar attributes, expected {}",
      ScalarAttr::COUNT
    )));
  }
  for attr in ScalarAttr::ALL {
    let len = reader.read_u32::<BigEndian>()? as usize;
    let mut name = vec![0; len];
    reader.read_exact(&mut name)?;
    if name != attr.name().as_bytes() {
      return Err(SnapshotError::Layout(format!(
        "attribute `{}` where `{}` was expected",
        String::from_utf8_lossy(&name),
        attr.name()
      )));
    }
  }

  let count = reader.read_u64::<BigEndian>()? as usize;
  let mut particles = ParticleSet::new(dim);
  for _ in 0..count {
    let gid = reader.read_u64::<BigEndian>()? as usize;
    let subset = subset_from_code(reader.read_u8()?)?;
    let pos = read_vec(&mut reader, dim)?;
    let normal = read_vec(&mut reader, dim)?;
    let mut scalars = [0.0; ScalarAttr::COUNT];
    reader.read_f64_into::<BigEndian>(&mut scalars)?;
    particles.push_owned(ParticleRecord {
      gid,
      pos,
      normal,
      scalars,
      subset,
    });
  }
  Ok(particles)
}

pub fn write_snapshot(particles: &ParticleSet, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
  let file = File::create(path)?;
  write_particles(BufWriter::new(file), particles)
}

pub fn read_snapshot(path: impl AsRef<Path>) -> Result<ParticleSet, SnapshotError> {
  let file = File::open(path)?;
  read_particles(BufReader::new(file))
}

/// `{dir}/{stem}_{rank}_{frame}.bin`
pub fn frame_path(dir: impl AsRef<Path>, stem: &str, rank: usize, frame: usize) -> PathBuf {
  dir.as_ref().join(format!("{stem}_{rank}_{frame}.bin"))
}
/// `{dir}/{stem}_{rank}.bin`
pub fn final_path(dir: impl AsRef<Path>, stem: &str, rank: usize) -> PathBuf {
  dir.as_ref().join(format!("{stem}_{rank}.bin"))
}

pub fn write_frame(
  particles: &ParticleSet,
  dir: impl AsRef<Path>,
  stem: &str,
  rank: usize,
  frame: usize,
) -> Result<PathBuf, SnapshotError> {
  let path = frame_path(dir, stem, rank, frame);
  write_snapshot(particles, &path)?;
  tracing::debug!("wrote snapshot {}", path.display());
  Ok(path)
}

pub fn write_final(
  particles: &ParticleSet,
  dir: impl AsRef<Path>,
  stem: &str,
  rank: usize,
) -> Result<PathBuf, SnapshotError> {
  let path = final_path(dir, stem, rank);
  write_snapshot(particles, &path)?;
  tracing::debug!("wrote snapshot {}", path.display());
  Ok(path)
}
