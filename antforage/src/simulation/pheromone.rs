use super::spatial::{CellCoord, SpatialIndex};
use crate::config::{GridConfig, PheromoneConfig};
use macroquad::math::Vec3;
use rayon::prelude::*;
use shared::{MarkerKind, MarkerView};
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;

new_key_type! {
    /// Key for marker slotmap.
    pub struct MarkerKey;
}

/// A pheromone deposit.
#[derive(Debug, Clone)]
pub struct Marker {
    pub position: Vec3,
    pub kind: MarkerKind,
    pub intensity: f32,
    /// Path quality this marker was laid with, 0 unless it came from path reinforcement.
    pub quality: f32,
    pub spawned_at: f64,
}

impl Marker {
    #[inline(always)]
    pub fn decay(&mut self, amount: f32) {
        self.intensity -= amount;
    }

    pub fn is_expired(&self, now: f64, max_lifetime: f32) -> bool {
        self.intensity <= 0.0 || now - self.spawned_at >= max_lifetime as f64
    }

    /// Intensity relative to the maximum, for drawing.
    pub fn scale(&self, max_intensity: f32) -> f32 {
        (self.intensity / max_intensity).clamp(0.0, 1.0)
    }
}

/// A marker as captured by the index for one tick.
#[derive(Debug, Clone, Copy)]
pub struct IndexedMarker {
    pub key: MarkerKey,
    pub kind: MarkerKind,
    pub intensity: f32,
}

pub type MarkerIndex = SpatialIndex<IndexedMarker>;

/// Sum of intensities of `kind` markers hashed into `cell`.
pub fn cell_intensity(index: &MarkerIndex, cell: CellCoord, kind: MarkerKind) -> f32 {
    index
        .cell(cell)
        .iter()
        .filter(|entry| entry.item.kind == kind)
        .map(|entry| entry.item.intensity)
        .sum()
}

/// Request to create one marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSpawn {
    pub position: Vec3,
    pub kind: MarkerKind,
    pub intensity: f32,
    pub quality: f32,
}

/// Intensity of a marker laid `elapsed` seconds after leaving the colony or the food.
/// Fresh trails start at the maximum and fall linearly to zero at `max_lifetime`.
pub fn trail_intensity(elapsed: f64, config: &PheromoneConfig) -> f32 {
    let remaining = 1.0 - (elapsed.max(0.0) / config.max_lifetime as f64);
    config.max_intensity() * remaining.clamp(0.0, 1.0) as f32
}

/// Per-cell intensity totals while a batch of spawns is being accepted.
///
/// Starts from the tick's index snapshot and adds every accepted spawn, so
/// several spawns into one cell in the same tick cannot overshoot the cap.
pub struct CellTally<'a> {
    index: &'a MarkerIndex,
    totals: HashMap<(CellCoord, MarkerKind), f32>,
}

impl<'a> CellTally<'a> {
    pub fn new(index: &'a MarkerIndex) -> Self {
        Self {
            index,
            totals: HashMap::new(),
        }
    }

    pub fn cell_of(&self, position: Vec3) -> CellCoord {
        self.index.cell_of(position)
    }

    fn total_mut(&mut self, cell: CellCoord, kind: MarkerKind) -> &mut f32 {
        let index = self.index;
        self.totals
            .entry((cell, kind))
            .or_insert_with(|| cell_intensity(index, cell, kind))
    }

    pub fn total(&mut self, cell: CellCoord, kind: MarkerKind) -> f32 {
        *self.total_mut(cell, kind)
    }

    /// Adds `intensity` to the cell if that keeps it within `cap`. Returns whether it fit.
    pub fn try_add(&mut self, cell: CellCoord, kind: MarkerKind, intensity: f32, cap: f32) -> bool {
        let total = self.total_mut(cell, kind);
        if *total + intensity > cap {
            return false;
        }
        *total += intensity;
        true
    }
}

/// Cap on the summed intensity of one marker kind within one cell.
pub fn cell_cap(grid: &GridConfig, kind: MarkerKind) -> f32 {
    match kind {
        MarkerKind::ToColony => grid.max_colony_pheromone_per_cell,
        MarkerKind::ToFood => grid.max_food_pheromone_per_cell,
    }
}

/// Sole owner of markers.
#[derive(Default)]
pub struct PheromoneStore {
    markers: SlotMap<MarkerKey, Marker>,
}

impl PheromoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, key: MarkerKey) -> Option<&Marker> {
        self.markers.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MarkerKey, &Marker)> {
        self.markers.iter()
    }

    pub fn count_of(&self, kind: MarkerKind) -> usize {
        self.markers.values().filter(|m| m.kind == kind).count()
    }

    /// Accepts `spawn` if its cell has room for it under the cap for its kind.
    pub fn try_spawn(
        &mut self,
        spawn: MarkerSpawn,
        now: f64,
        tally: &mut CellTally<'_>,
        grid: &GridConfig,
    ) -> Option<MarkerKey> {
        if !(spawn.intensity > 0.0) || !spawn.position.is_finite() {
            return None;
        }
        let cell = tally.cell_of(spawn.position);
        if !tally.try_add(cell, spawn.kind, spawn.intensity, cell_cap(grid, spawn.kind)) {
            return None;
        }
        Some(self.markers.insert(Marker {
            position: spawn.position,
            kind: spawn.kind,
            intensity: spawn.intensity,
            quality: spawn.quality,
            spawned_at: now,
        }))
    }

    /// Lowers every intensity by `decay_rate * dt`, then destroys markers that ran out
    /// or outlived `max_lifetime`. Returns how many were destroyed.
    pub fn decay(&mut self, dt: f32, now: f64, config: &PheromoneConfig) -> usize {
        let amount = config.decay_rate * dt;
        self.markers
            .values_mut()
            .par_bridge()
            .for_each(|marker| marker.decay(amount));

        let expired: Vec<MarkerKey> = self
            .markers
            .iter()
            .filter(|(_, marker)| marker.is_expired(now, config.max_lifetime))
            .map(|(key, _)| key)
            .collect();
        for key in &expired {
            self.markers.remove(*key);
        }
        expired.len()
    }

    /// Replaces the contents of `index` with the current marker set.
    pub fn rebuild_index(&self, index: &mut MarkerIndex) {
        index.rebuild(self.markers.iter().map(|(key, marker)| {
            (
                marker.position,
                IndexedMarker {
                    key,
                    kind: marker.kind,
                    intensity: marker.intensity,
                },
            )
        }));
    }

    pub fn views(&self, config: &PheromoneConfig) -> Vec<MarkerView> {
        let max_intensity = config.max_intensity();
        self.markers
            .values()
            .map(|marker| MarkerView {
                position: marker.position,
                intensity: marker.intensity,
                kind: marker.kind,
                scale: marker.scale(max_intensity),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}
