use super::ant::{Ant, AntKey};
use super::colony::Colony;
use super::food::{Food, FoodKey};
use super::pheromone::{CellTally, MarkerIndex, MarkerSpawn, PheromoneStore};
use crate::config::{GridConfig, PheromoneConfig};
use macroquad::math::Vec3;
use shared::MarkerKind;
use slotmap::SlotMap;
use tracing::debug;

/// Structural change requested by an ant during a parallel stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Take one unit from a food source the ant has reached.
    TakeFood { food: FoodKey },
    /// Hand the carried food to the colony.
    Deposit,
    SpawnMarker(MarkerSpawn),
}

/// A returned path waiting to be scored.
#[derive(Debug, Clone)]
struct Reinforcement {
    ant: AntKey,
    quality: f32,
    waypoints: Vec<Vec3>,
}

/// Everything the barrier is allowed to mutate.
pub struct Barrier<'a> {
    pub ants: &'a mut SlotMap<AntKey, Ant>,
    pub foods: &'a mut SlotMap<FoodKey, Food>,
    pub colony: &'a mut Colony,
    pub pheromones: &'a mut PheromoneStore,
    pub marker_index: &'a MarkerIndex,
    pub pheromone: &'a PheromoneConfig,
    pub grid: &'a GridConfig,
    pub now: f64,
}

/// What one drain did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub food_taken: u32,
    pub food_exhausted: u32,
    pub deposits: u32,
    pub markers_spawned: u32,
    pub markers_rejected: u32,
    pub paths_reinforced: u32,
}

/// Commands collected during a tick, applied in one place at the end of it.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<(AntKey, Command)>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ant: AntKey, command: Command) {
        self.commands.push((ant, command));
    }

    pub fn extend<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = (AntKey, Command)>,
    {
        self.commands.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops every pending command. Returns how many were dropped.
    pub fn flush(&mut self) -> usize {
        let count = self.commands.len();
        self.commands.clear();
        count
    }

    /// Applies every pending command in ant-key order, then scores returned paths
    /// from best to worst.
    pub fn drain(&mut self, world: Barrier<'_>) -> DrainReport {
        let Barrier {
            ants,
            foods,
            colony,
            pheromones,
            marker_index,
            pheromone,
            grid,
            now,
        } = world;

        // Stable, so commands from one ant keep their order
        self.commands.sort_by_key(|(ant, _)| *ant);

        let mut report = DrainReport::default();
        let mut tally = CellTally::new(marker_index);
        let mut reinforcements = Vec::new();

        for (ant_key, command) in self.commands.drain(..) {
            let Some(ant) = ants.get_mut(ant_key) else {
                continue;
            };
            match command {
                Command::TakeFood { food: food_key } => {
                    let Some(food) = foods.get_mut(food_key) else {
                        ant.target = None;
                        continue;
                    };
                    if !food.take_unit(ant_key) {
                        continue;
                    }
                    ant.pick_up(food_key, now);
                    report.food_taken += 1;
                    if food.is_exhausted() {
                        foods.remove(food_key);
                        report.food_exhausted += 1;
                        debug!(food = ?food_key, "Food source exhausted");
                    }
                }
                Command::Deposit => {
                    let source = ant.carried_food.map(|carried| carried.source);
                    let Some(waypoints) = ant.deposit(now) else {
                        continue;
                    };
                    colony.food_collected += 1;
                    report.deposits += 1;
                    debug!(ant = ?ant_key, ?source, "Food deposited");
                    if !waypoints.is_empty() {
                        reinforcements.push(Reinforcement {
                            ant: ant_key,
                            quality: 1.0 / waypoints.len() as f32,
                            waypoints,
                        });
                    }
                }
                Command::SpawnMarker(spawn) => {
                    match pheromones.try_spawn(spawn, now, &mut tally, grid) {
                        Some(_) => report.markers_spawned += 1,
                        None => report.markers_rejected += 1,
                    }
                }
            }
        }

        reinforcements.sort_by(|a, b| b.quality.total_cmp(&a.quality).then(a.ant.cmp(&b.ant)));
        let max_intensity = pheromone.max_intensity();
        for Reinforcement {
            ant,
            quality,
            waypoints,
        } in reinforcements
        {
            if let Some(ant) = ants.get_mut(ant) {
                ant.best_path_quality_seen = ant.best_path_quality_seen.max(quality);
            }
            if !colony.offer_path_quality(quality) {
                debug!(quality, best = colony.best_path_quality(), "Path not better than best");
                continue;
            }
            debug!(quality, waypoints = waypoints.len(), "Reinforcing path");
            report.paths_reinforced += 1;
            for position in waypoints {
                let spawn = MarkerSpawn {
                    position,
                    kind: MarkerKind::ToFood,
                    intensity: max_intensity,
                    quality,
                };
                match pheromones.try_spawn(spawn, now, &mut tally, grid) {
                    Some(_) => report.markers_spawned += 1,
                    None => report.markers_rejected += 1,
                }
            }
        }
        report
    }
}
