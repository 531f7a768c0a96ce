//! On-disk cell store.
//!
//! Each evicted cell is one binary `.cell` file under a base directory:
//!
//! - Header (22 bytes):
//!   - Magic: "GCEL" (4 bytes)
//!   - Version: u8 (1 byte)
//!   - Descriptor flags: u8 (bit 0 normals, bit 1 probabilities, bit 2 depths)
//!   - Row, column, aisle, depth: i32 (4 bytes each, little-endian)
//! - Point count: u32 (little-endian)
//! - Coordinate columns: xs, ys, zs (count f32 each)
//! - Descriptor columns in flag order
//!
//! Cell identities (coordinate + depth) are mirrored in an in-memory index so
//! enumeration never rescans the directory; the index is rebuilt from file
//! headers when the store is opened on an existing directory.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::CellStore;
use crate::core::{CellInfo, GridCoord, PointCloud};
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"GCEL";
const VERSION: u8 = 1;

const FLAG_NORMALS: u8 = 1;
const FLAG_PROBABILITIES: u8 = 1 << 1;
const FLAG_DEPTHS: u8 = 1 << 2;

/// Cell store writing one binary file per cell.
pub struct DiskCellStore {
    base_path: PathBuf,
    /// Depth of every stored cell, keyed by coordinate.
    index: HashMap<GridCoord, i32>,
}

impl DiskCellStore {
    /// Open a store rooted at `base_path`, creating the directory if needed
    /// and indexing any cells a previous session left behind.
    pub fn open(base_path: &Path) -> Result<Self> {
        fs::create_dir_all(base_path)?;

        let mut index = HashMap::new();
        for entry in fs::read_dir(base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "cell") {
                let info = read_cell_header(&path)?;
                index.insert(info.coord(), info.depth);
            }
        }
        if !index.is_empty() {
            log::debug!(
                "Indexed {} stored cells under {}",
                index.len(),
                base_path.display()
            );
        }

        Ok(Self {
            base_path: base_path.to_path_buf(),
            index,
        })
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the store holds no cells.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn cell_path(&self, coord: &GridCoord) -> PathBuf {
        self.base_path.join(format!(
            "{}_{}_{}.cell",
            coord.row, coord.column, coord.aisle
        ))
    }
}

impl CellStore for DiskCellStore {
    fn retrieve_cell(
        &mut self,
        row: i32,
        column: i32,
        aisle: i32,
        _requested_depth: i32,
    ) -> Result<(CellInfo, PointCloud)> {
        let coord = GridCoord::new(row, column, aisle);
        if !self.index.contains_key(&coord) {
            return Ok((
                CellInfo::new(row, column, aisle, CellInfo::INVALID_DEPTH),
                PointCloud::new(),
            ));
        }

        let path = self.cell_path(&coord);
        let (info, points) = read_cell(&path)?;
        fs::remove_file(&path)?;
        self.index.remove(&coord);
        Ok((info, points))
    }

    fn save_cell(&mut self, info: CellInfo, points: &PointCloud) -> Result<()> {
        let path = self.cell_path(&info.coord());
        write_cell(&path, &info, points)?;
        self.index.insert(info.coord(), info.depth);
        Ok(())
    }

    fn clear_all_cells(&mut self) -> Result<()> {
        for coord in self.index.keys() {
            let path = self.cell_path(coord);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        self.index.clear();
        Ok(())
    }

    fn all_cell_infos(&self) -> Result<HashSet<CellInfo>> {
        Ok(self
            .index
            .iter()
            .map(|(coord, depth)| CellInfo::new(coord.row, coord.column, coord.aisle, *depth))
            .collect())
    }
}

fn write_cell(path: &Path, info: &CellInfo, points: &PointCloud) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let mut flags = 0u8;
    if points.normals().is_some() {
        flags |= FLAG_NORMALS;
    }
    if points.probability_dynamic().is_some() {
        flags |= FLAG_PROBABILITIES;
    }
    if points.depths().is_some() {
        flags |= FLAG_DEPTHS;
    }

    writer.write_all(MAGIC)?;
    writer.write_all(&[VERSION, flags])?;
    writer.write_all(&info.row.to_le_bytes())?;
    writer.write_all(&info.column.to_le_bytes())?;
    writer.write_all(&info.aisle.to_le_bytes())?;
    writer.write_all(&info.depth.to_le_bytes())?;
    writer.write_all(&(points.len() as u32).to_le_bytes())?;

    for column in [&points.xs, &points.ys, &points.zs] {
        for value in column {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    if let Some(normals) = points.normals() {
        for normal in normals {
            for component in normal {
                writer.write_all(&component.to_le_bytes())?;
            }
        }
    }
    if let Some(probabilities) = points.probability_dynamic() {
        for value in probabilities {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    if let Some(depths) = points.depths() {
        for value in depths {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<(CellInfo, u8)> {
    let mut header = [0u8; 22];
    reader.read_exact(&mut header)?;
    if &header[0..4] != MAGIC {
        return Err(Error::CellFormat(format!(
            "bad magic in {}",
            path.display()
        )));
    }
    if header[4] != VERSION {
        return Err(Error::CellFormat(format!(
            "unsupported version {} in {}",
            header[4],
            path.display()
        )));
    }
    let flags = header[5];
    let read_i32 = |offset: usize| i32::from_le_bytes(header[offset..offset + 4].try_into().unwrap());
    let info = CellInfo::new(read_i32(6), read_i32(10), read_i32(14), read_i32(18));
    Ok((info, flags))
}

fn read_cell_header(path: &Path) -> Result<CellInfo> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let (info, _) = read_header(&mut reader, path)?;
    Ok(info)
}

fn read_cell(path: &Path) -> Result<(CellInfo, PointCloud)> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let (info, flags) = read_header(&mut reader, path)?;

    let mut count_bytes = [0u8; 4];
    reader.read_exact(&mut count_bytes)?;
    let count = u32::from_le_bytes(count_bytes) as usize;

    let mut points = PointCloud::with_capacity(count);
    points.xs = read_f32_column(&mut reader, count)?;
    points.ys = read_f32_column(&mut reader, count)?;
    points.zs = read_f32_column(&mut reader, count)?;

    if flags & FLAG_NORMALS != 0 {
        let flat = read_f32_column(&mut reader, count * 3)?;
        let normals = flat.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect();
        points.set_normals(normals);
    }
    if flags & FLAG_PROBABILITIES != 0 {
        points.set_probability_dynamic(read_f32_column(&mut reader, count)?);
    }
    if flags & FLAG_DEPTHS != 0 {
        let mut depths = Vec::with_capacity(count);
        let mut bytes = [0u8; 4];
        for _ in 0..count {
            reader.read_exact(&mut bytes)?;
            depths.push(i32::from_le_bytes(bytes));
        }
        points.set_depths(depths);
    }

    Ok((info, points))
}

fn read_f32_column<R: Read>(reader: &mut R, count: usize) -> Result<Vec<f32>> {
    let mut column = Vec::with_capacity(count);
    let mut bytes = [0u8; 4];
    for _ in 0..count {
        reader.read_exact(&mut bytes)?;
        column.push(f32::from_le_bytes(bytes));
    }
    Ok(column)
}
