//! PVS store - grid files (text) and visibility files (binary).
//!
//! # Grid file
//!
//! ```text
//! <type tag>            regular | octree | octree_hierarchical
//! <params>              N|max_depth  cell_size|root_size  cx cy cz
//! <split bits>          octree variants only, one '0'/'1' per node, BFS
//! <model count>
//! <node counts>         space separated, empty when there are no models
//! ```
//!
//! # Visibility file
//!
//! Headerless. For each storage cell, for each model, `ceil(n / 8)` bytes
//! where bit `k` of byte `b` is node `8 * b + k`. Lengths come from the grid
//! file's node counts, so the two files are only interpretable together.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use glam::DVec3;
use tracing::{debug, info};

use crate::error::{PvsError, Result};
use crate::grid::GridType;
use crate::types::{packed_len, ModelId, NodeCount};
use crate::view_cell::ViewCell;

/// Parsed grid file.
///
/// `resolution` is the cell count per axis for regular grids and the
/// maximum depth for octrees; `cell_size` is the cell edge or root size.
#[derive(Clone, Debug, PartialEq)]
pub struct GridFile {
  pub grid_type: GridType,
  pub resolution: u32,
  pub cell_size: f64,
  pub center: DVec3,
  /// Breadth-first split bits. Empty for regular grids.
  pub splits: Vec<bool>,
  pub ids: Vec<NodeCount>,
}

impl GridFile {
  /// Render the text form.
  pub fn to_text(&self) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", self.grid_type.tag());
    let _ = writeln!(
      out,
      "{} {} {} {} {}",
      self.resolution, self.cell_size, self.center.x, self.center.y, self.center.z
    );
    if self.grid_type.is_octree() {
      let bits: String = self
        .splits
        .iter()
        .map(|&split| if split { '1' } else { '0' })
        .collect();
      let _ = writeln!(out, "{bits}");
    }
    let _ = writeln!(out, "{}", self.ids.len());
    let counts: Vec<String> = self.ids.iter().map(ToString::to_string).collect();
    let _ = writeln!(out, "{}", counts.join(" "));
    out
  }

  /// Parse the text form.
  pub fn parse(text: &str) -> Result<Self> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line.trim()));
    let mut last_line = 0;
    let mut next_line = |what: &str| match lines.next() {
      Some((line, text)) => {
        last_line = line;
        Ok((line, text))
      }
      None => Err(PvsError::parse(
        last_line + 1,
        format!("unexpected end of file, expected {what}"),
      )),
    };

    let (_, tag) = next_line("grid type tag")?;
    let grid_type =
      GridType::from_tag(tag).ok_or_else(|| PvsError::UnknownGridType(tag.to_string()))?;

    let (line, params) = next_line("grid parameters")?;
    let fields: Vec<&str> = params.split_whitespace().collect();
    if fields.len() != 5 {
      return Err(PvsError::parse(
        line,
        format!("expected 5 grid parameters, found {}", fields.len()),
      ));
    }
    let resolution: u32 = parse_field(line, fields[0])?;
    let cell_size: f64 = parse_field(line, fields[1])?;
    let center = DVec3::new(
      parse_field(line, fields[2])?,
      parse_field(line, fields[3])?,
      parse_field(line, fields[4])?,
    );

    let mut splits = Vec::new();
    if grid_type.is_octree() {
      let (line, bits) = next_line("split bits")?;
      splits.reserve(bits.len());
      for bit in bits.chars() {
        match bit {
          '0' => splits.push(false),
          '1' => splits.push(true),
          other => {
            return Err(PvsError::parse(line, format!("invalid split bit `{other}`")));
          }
        }
      }
    }

    let (line, count) = next_line("model count")?;
    let model_count: ModelId = parse_field(line, count)?;

    // The node count line may be missing entirely when there are no models.
    let (line, counts) = if model_count == 0 {
      next_line("node counts").unwrap_or((line + 1, ""))
    } else {
      next_line("node counts")?
    };
    let ids = counts
      .split_whitespace()
      .map(|field| parse_field(line, field))
      .collect::<Result<Vec<NodeCount>>>()?;
    if ids.len() != model_count as usize {
      return Err(PvsError::parse(
        line,
        format!("expected {model_count} node counts, found {}", ids.len()),
      ));
    }

    Ok(Self {
      grid_type,
      resolution,
      cell_size,
      center,
      splits,
      ids,
    })
  }

  /// Bytes one storage cell occupies in the visibility file.
  pub fn bytes_per_cell(&self) -> usize {
    bytes_per_cell(&self.ids)
  }

  /// Number of cells the visibility file stores for this layout.
  ///
  /// Computed from the header alone, without building the grid. For octrees
  /// this assumes a well-formed split bitstream.
  pub fn storage_cell_count(&self) -> Result<usize> {
    match self.grid_type {
      GridType::Regular => (self.resolution as usize).checked_pow(3).ok_or_else(|| {
        PvsError::parse(
          2,
          format!("{} cells per axis overflows the cell count", self.resolution),
        )
      }),
      GridType::Octree => Ok(self.splits.iter().filter(|&&split| !split).count()),
      GridType::HierarchicalOctree => Ok(self.splits.len()),
    }
  }
}

fn parse_field<T: FromStr>(line: usize, field: &str) -> Result<T> {
  field
    .parse()
    .map_err(|_| PvsError::parse(line, format!("invalid value `{field}`")))
}

fn bytes_per_cell(ids: &[NodeCount]) -> usize {
  ids.iter().map(|&count| packed_len(count)).sum()
}

/// Read and parse a grid file.
pub fn read_grid_file(path: &Path) -> Result<GridFile> {
  let text = fs::read_to_string(path).map_err(|err| PvsError::io(path, err))?;
  let file = GridFile::parse(&text)?;
  debug!(
    path = %path.display(),
    grid_type = %file.grid_type,
    models = file.ids.len(),
    "read grid file"
  );
  Ok(file)
}

/// Write a grid file.
pub fn write_grid_file(path: &Path, file: &GridFile) -> Result<()> {
  fs::write(path, file.to_text()).map_err(|err| PvsError::io(path, err))?;
  debug!(path = %path.display(), grid_type = %file.grid_type, "wrote grid file");
  Ok(())
}

/// Write the packed visibility of `cells` in order.
#[tracing::instrument(skip_all, name = "store::write_visibility")]
pub fn write_visibility_file(path: &Path, cells: &[&ViewCell], ids: &[NodeCount]) -> Result<()> {
  let io = |err| PvsError::io(path, err);
  let mut writer = BufWriter::new(File::create(path).map_err(io)?);
  for cell in cells {
    for (model, &node_count) in ids.iter().enumerate() {
      writer
        .write_all(&cell.visibility_bytes(model as ModelId, node_count))
        .map_err(io)?;
    }
  }
  writer.flush().map_err(io)?;

  info!(
    path = %path.display(),
    cells = cells.len(),
    bytes = cells.len() * bytes_per_cell(ids),
    "wrote visibility file"
  );
  Ok(())
}

/// Check that the visibility file at `path` holds `cell_count` cells.
///
/// Only the file metadata is read, so an implausible layout is rejected
/// before any cell is allocated.
pub fn check_visibility_len(path: &Path, cell_count: usize, ids: &[NodeCount]) -> Result<()> {
  let found = fs::metadata(path).map_err(|err| PvsError::io(path, err))?.len();
  let found = usize::try_from(found).unwrap_or(usize::MAX);
  let expected = cell_count.saturating_mul(bytes_per_cell(ids));
  if found != expected {
    return Err(PvsError::VisibilitySize { expected, found });
  }
  Ok(())
}

/// Load packed visibility into `cells`, replacing their bits.
///
/// The file length must equal `cells.len()` times the per-cell size implied
/// by `ids`; otherwise nothing is modified.
#[tracing::instrument(skip_all, name = "store::read_visibility")]
pub fn read_visibility_file(
  path: &Path,
  cells: Vec<&mut ViewCell>,
  ids: &[NodeCount],
) -> Result<()> {
  let data = fs::read(path).map_err(|err| PvsError::io(path, err))?;
  let per_cell = bytes_per_cell(ids);
  let expected = cells.len() * per_cell;
  if data.len() != expected {
    return Err(PvsError::VisibilitySize {
      expected,
      found: data.len(),
    });
  }

  let cell_count = cells.len();
  for (index, cell) in cells.into_iter().enumerate() {
    let mut offset = index * per_cell;
    for (model, &node_count) in ids.iter().enumerate() {
      let len = packed_len(node_count);
      cell.load_visibility_bytes(model as ModelId, node_count, &data[offset..offset + len]);
      offset += len;
    }
  }

  info!(
    path = %path.display(),
    cells = cell_count,
    bytes = data.len(),
    "read visibility file"
  );
  Ok(())
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
