use crate::config::ConfigError;
use macroquad::math::Vec3;
use std::collections::HashMap;

/// Integer coordinates of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellCoord {
    #[inline(always)]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }
}

/// An item stored in the index together with the position it was hashed at.
#[derive(Debug, Clone, Copy)]
pub struct Entry<T> {
    pub position: Vec3,
    pub item: T,
}

/// Grid hash over points in 3D.
///
/// Rebuilt once per tick from the current item set and only read afterwards.
/// Queries sweep every cell the search sphere can touch, then filter by exact
/// distance, so the result always equals a brute-force scan.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    cell_size: f32,
    cells: HashMap<CellCoord, Vec<Entry<T>>>,
    len: usize,
}

impl<T> SpatialIndex<T> {
    pub fn new(cell_size: f32) -> Result<Self, ConfigError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "grid.cell_size",
                value: cell_size as f64,
            });
        }
        Ok(Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        })
    }

    /// Builds a fresh index over `items`.
    pub fn build<I>(cell_size: f32, items: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (Vec3, T)>,
    {
        let mut index = Self::new(cell_size)?;
        index.rebuild(items);
        Ok(index)
    }

    /// Drops every entry and inserts `items`. Nothing from the previous build survives.
    pub fn rebuild<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (Vec3, T)>,
    {
        self.cells.clear();
        self.len = 0;
        for (position, item) in items {
            let cell = self.cell_of(position);
            self.cells
                .entry(cell)
                .or_default()
                .push(Entry { position, item });
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell containing `position` (`floor(pos / cell_size)` per axis).
    #[inline(always)]
    pub fn cell_of(&self, position: Vec3) -> CellCoord {
        let q = (position / self.cell_size).floor();
        // `as` saturates for out-of-range floats and maps NaN to 0
        CellCoord {
            x: q.x as i32,
            y: q.y as i32,
            z: q.z as i32,
        }
    }

    /// Entries hashed into exactly this cell.
    pub fn cell(&self, cell: CellCoord) -> &[Entry<T>] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of cells the sweep extends from the centre cell along each axis.
    fn sweep_extent(&self, radius: f32) -> i32 {
        if !(radius.is_finite() && radius >= 0.0) {
            return -1;
        }
        (radius / self.cell_size).ceil() as i32
    }

    /// Every entry in the cells a sphere of `radius` around `center` can overlap.
    /// A superset of the exact result.
    pub fn candidates(&self, center: Vec3, radius: f32) -> impl Iterator<Item = &Entry<T>> + '_ {
        let k = self.sweep_extent(radius);
        let origin = self.cell_of(center);
        (-k..=k)
            .flat_map(move |dx| (-k..=k).flat_map(move |dy| (-k..=k).map(move |dz| (dx, dy, dz))))
            .filter_map(move |(dx, dy, dz)| self.cells.get(&origin.offset(dx, dy, dz)))
            .flatten()
    }

    /// Every entry within `radius` of `center` (inclusive).
    pub fn query(&self, center: Vec3, radius: f32) -> impl Iterator<Item = &Entry<T>> + '_ {
        let radius_sq = radius * radius;
        self.candidates(center, radius)
            .filter(move |entry| entry.position.distance_squared(center) <= radius_sq)
    }
}
