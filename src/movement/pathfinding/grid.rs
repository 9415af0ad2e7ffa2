use bevy::math::Vec2;
use fixedbitset::FixedBitSet;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};

/// Binary occupancy grid consumed by pathfinding and obstacle generation.
///
/// Cells are square with edge `step`, indexed row-major from the origin
/// `(0, 0)`; cell `(x, y)` covers `[x*step, (x+1)*step) × [y*step, (y+1)*step)`.
/// A set bit means the cell is blocked.
///
/// Grids are shared as `Arc<PathGrid>` and never mutated once shared: terrain
/// changes produce a new grid, and consumers detect the change by pointer
/// inequality.
#[derive(Clone, Debug, PartialEq)]
pub struct PathGrid {
    width: usize,
    height: usize,
    step: f32,
    blocked: FixedBitSet,
}

impl PathGrid {
    /// Fully walkable grid.
    pub fn new(width: usize, height: usize, step: f32) -> Self {
        Self {
            width,
            height,
            step,
            blocked: FixedBitSet::with_capacity(width * height),
        }
    }

    pub fn from_blocked(
        width: usize,
        height: usize,
        step: f32,
        blocked: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let mut grid = Self::new(width, height, step);
        for (x, y) in blocked {
            grid.set_blocked(x, y, true);
        }
        grid
    }

    /// Parse an ASCII map: `#` blocked, `.` open. The first line is row `y = 0`.
    pub fn parse(step: f32, text: &str) -> Result<Self, GridError> {
        if !(step > 0.0) {
            return Err(GridError::InvalidStep(step));
        }
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(first) = rows.first() else {
            return Err(GridError::Empty);
        };
        let width = first.chars().count();
        let mut grid = Self::new(width, rows.len(), step);

        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(GridError::RaggedRow { row: y, expected: width, found });
            }
            for (x, ch) in row.chars().enumerate() {
                match ch {
                    '#' => grid.set_blocked(x, y, true),
                    '.' => {}
                    other => return Err(GridError::UnexpectedChar { row: y, column: x, found: other }),
                }
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// World-space area of one cell.
    pub fn cell_area(&self) -> f32 {
        self.step * self.step
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    pub fn set_blocked(&mut self, x: usize, y: usize, blocked: bool) {
        if x < self.width && y < self.height {
            let index = self.cell_index(x, y);
            self.blocked.set(index, blocked);
        }
    }

    /// Out-of-range coordinates count as blocked.
    pub fn is_blocked(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return true;
        }
        self.blocked.contains(self.cell_index(x as usize, y as usize))
    }

    pub fn is_blocked_index(&self, index: usize) -> bool {
        self.blocked.contains(index)
    }

    /// Indices of all blocked cells in ascending order.
    pub fn blocked_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocked.ones()
    }

    pub fn cell_index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn cell_coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    pub fn cell_center(&self, index: usize) -> Vec2 {
        let (x, y) = self.cell_coords(index);
        Vec2::new((x as f32 + 0.5) * self.step, (y as f32 + 0.5) * self.step)
    }

    /// Whether a world position lies on the grid.
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.width as f32 * self.step
            && position.y < self.height as f32 * self.step
    }

    /// Cell under `position`, clamped onto the grid. `None` only for an empty grid.
    pub fn nearest_cell(&self, position: Vec2) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let x = ((position.x / self.step).floor().max(0.0) as usize).min(self.width - 1);
        let y = ((position.y / self.step).floor().max(0.0) as usize).min(self.height - 1);
        Some(self.cell_index(x, y))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    Empty,
    InvalidStep(f32),
    RaggedRow { row: usize, expected: usize, found: usize },
    UnexpectedChar { row: usize, column: usize, found: char },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::Empty => write!(f, "grid has no rows"),
            GridError::InvalidStep(step) => write!(f, "grid step must be positive, got {}", step),
            GridError::RaggedRow { row, expected, found } => {
                write!(f, "row {} has {} cells, expected {}", row, found, expected)
            }
            GridError::UnexpectedChar { row, column, found } => {
                write!(f, "unexpected '{}' at row {}, column {}", found, row, column)
            }
        }
    }
}

impl std::error::Error for GridError {}

// ============================================================================
// Snapshots
// ============================================================================

pub const GRID_VERSION: u32 = 1;

/// On-disk form of a [`PathGrid`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GridData {
    pub version: u32,
    pub width: usize,
    pub height: usize,
    pub step: f32,
    pub blocked: Vec<u32>,
}

impl From<&PathGrid> for GridData {
    fn from(grid: &PathGrid) -> Self {
        Self {
            version: GRID_VERSION,
            width: grid.width,
            height: grid.height,
            step: grid.step,
            blocked: grid.blocked_cells().map(|index| index as u32).collect(),
        }
    }
}

impl GridData {
    pub fn into_grid(self) -> Result<PathGrid, Box<dyn std::error::Error>> {
        if self.version != GRID_VERSION {
            return Err(format!("unsupported grid version {} (expected {})", self.version, GRID_VERSION).into());
        }
        if !(self.step > 0.0) {
            return Err(Box::new(GridError::InvalidStep(self.step)));
        }
        let mut grid = PathGrid::new(self.width, self.height, self.step);
        for index in self.blocked {
            let index = index as usize;
            if index >= grid.cell_count() {
                return Err(format!("blocked cell {} outside {}x{} grid", index, self.width, self.height).into());
            }
            grid.blocked.insert(index);
        }
        Ok(grid)
    }
}

/// Write a zlib-compressed bincode snapshot of `grid`.
pub fn save_grid(path: &str, grid: &PathGrid) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, &GridData::from(grid))?;
    encoder.finish()?;
    Ok(())
}

pub fn load_grid(path: &str) -> Result<PathGrid, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut decoder = ZlibDecoder::new(reader);
    let data: GridData = bincode::deserialize_from(&mut decoder)?;
    data.into_grid()
}
