use super::ant::{Ant, AntKey, StateExt};
use super::colony::Colony;
use super::commands::{Barrier, CommandBuffer, DrainReport};
use super::food::{Food, FoodKey};
use super::interaction::{InteractionContext, interact};
use super::pheromone::{MarkerIndex, PheromoneStore};
use super::spatial::SpatialIndex;
use super::steering::{SteerOutcome, SteeringContext, steer};
use super::targeting::{TargetProposal, TargetingContext, apply_proposal};
use super::terrain::FlatGround;
use crate::config::{ConfigError, FoodConfig, SimulationConfig};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use shared::{AntView, ForagingState, GroundProbe, MarkerKind, MarkerView, TickTime, VisibilityProbe};
use slotmap::SlotMap;
use std::f32::consts::TAU;
use tracing::{info, trace, warn};

/// Snapshot of the simulation for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationStats {
    pub tick: u64,
    pub elapsed: f64,
    pub ants: usize,
    pub searching: usize,
    pub turning: usize,
    pub going_home: usize,
    pub to_colony_markers: usize,
    pub to_food_markers: usize,
    pub food_sources: usize,
    pub food_left: u32,
    pub food_collected: u32,
    pub best_path_quality: f32,
}

fn build_foods(configs: &[FoodConfig]) -> SlotMap<FoodKey, Food> {
    let mut foods = SlotMap::with_capacity_and_key(configs.len());
    for config in configs.iter().filter(|c| c.amount > 0) {
        foods.insert(Food::from_config(config));
    }
    foods
}

pub struct Simulation {
    config: SimulationConfig,
    ants: SlotMap<AntKey, Ant>,
    foods: SlotMap<FoodKey, Food>,
    colony: Colony,
    pheromones: PheromoneStore,
    marker_index: MarkerIndex,
    food_index: SpatialIndex<FoodKey>,
    commands: CommandBuffer,
    ground: Box<dyn GroundProbe>,
    visibility: Option<Box<dyn VisibilityProbe>>,
    rng: StdRng,
    tick: u64,
    now: f64,
    last_drain: DrainReport,
}

impl Simulation {
    /// Flat floor, no sight blockers.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_probes(config, Box::new(FlatGround), None)
    }

    pub fn with_probes(
        config: SimulationConfig,
        ground: Box<dyn GroundProbe>,
        visibility: Option<Box<dyn VisibilityProbe>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let marker_index = MarkerIndex::new(config.grid.cell_size)?;
        // Few food sources and a wide search radius, so one cell per view radius
        let food_index = SpatialIndex::new(config.ant.view_radius.max(config.grid.cell_size))?;

        info!(
            seed = config.seed,
            food_sources = config.food.len(),
            cell_size = config.grid.cell_size,
            "Simulation created"
        );

        Ok(Self {
            ants: SlotMap::with_capacity_and_key(config.colony.spawn_count as usize),
            foods: build_foods(&config.food),
            colony: Colony::new(&config.colony),
            pheromones: PheromoneStore::new(),
            marker_index,
            food_index,
            commands: CommandBuffer::new(),
            ground,
            visibility,
            rng: StdRng::seed_from_u64(config.seed),
            tick: 0,
            now: 0.0,
            last_drain: DrainReport::default(),
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn colony(&self) -> &Colony {
        &self.colony
    }

    pub fn ants(&self) -> impl Iterator<Item = (AntKey, &Ant)> {
        self.ants.iter()
    }

    pub fn ant(&self, key: AntKey) -> Option<&Ant> {
        self.ants.get(key)
    }

    pub fn foods(&self) -> impl Iterator<Item = (FoodKey, &Food)> {
        self.foods.iter()
    }

    pub fn pheromones(&self) -> &PheromoneStore {
        &self.pheromones
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn elapsed(&self) -> f64 {
        self.now
    }

    pub fn last_drain(&self) -> DrainReport {
        self.last_drain
    }

    /// Spawns `count` ants at the colony, facing random directions.
    pub fn spawn_ants(&mut self, count: u32) {
        let position = self.colony.position;
        for _ in 0..count {
            let angle = self.rng.random_range(0.0..TAU);
            let rng = StdRng::seed_from_u64(self.rng.random());
            self.ants
                .insert(Ant::new(position, angle, self.now, &self.config.sensor, rng));
        }
        info!(count, total = self.ants.len(), "Spawned ants");
    }

    /// Spawns the colony's configured number of ants.
    pub fn populate(&mut self) {
        self.spawn_ants(self.colony.spawn_count);
    }

    /// Destroys every ant and marker and restores food sources to full.
    pub fn reset(&mut self) {
        let flushed = self.commands.flush();
        let ants = self.ants.len();
        let markers = self.pheromones.len();

        self.ants.clear();
        self.pheromones.clear();
        self.marker_index.clear();
        self.food_index.clear();
        self.foods = build_foods(&self.config.food);
        self.colony.reset();
        self.last_drain = DrainReport::default();

        info!(ants, markers, flushed, "Simulation reset");
    }

    /// Runs one tick: decay, index rebuild, sensing, targeting, steering, interaction,
    /// then the command barrier.
    pub fn tick(&mut self, time: TickTime) {
        if !(time.delta.is_finite() && time.delta >= 0.0 && time.elapsed.is_finite()) {
            warn!(?time, "Ignoring tick with invalid time");
            return;
        }
        self.tick += 1;
        self.now = time.elapsed;
        let now = self.now;

        // Decay
        let expired = self.pheromones.decay(time.delta, now, &self.config.pheromone);

        // Rebuild indices over what survived
        self.pheromones.rebuild_index(&mut self.marker_index);
        self.food_index
            .rebuild(self.foods.iter().map(|(key, food)| (food.position, key)));

        // Sense
        let index = &self.marker_index;
        let sensor_config = &self.config.sensor;
        self.ants.values_mut().par_bridge().for_each(|ant| {
            let need = ant.state.sensor_need();
            ant.sensors
                .sense(ant.position, ant.heading, need, index, sensor_config);
        });

        // Target
        let proposals = {
            let ctx = TargetingContext {
                config: &self.config.ant,
                foods: &self.foods,
                food_index: &self.food_index,
                colony: &self.colony,
                visibility: self.visibility.as_deref(),
            };
            let mut proposals: Vec<(AntKey, TargetProposal)> = self
                .ants
                .iter()
                .par_bridge()
                .map(|(key, ant)| (key, ctx.propose(key, ant)))
                .filter(|(_, proposal)| *proposal != TargetProposal::Keep)
                .collect();
            proposals.sort_unstable_by_key(|(key, _)| *key);
            proposals
        };
        for (key, proposal) in proposals {
            if let Some(ant) = self.ants.get_mut(key) {
                apply_proposal(key, ant, proposal, &mut self.foods);
            }
        }

        // Steer
        let skipped = {
            let ctx = SteeringContext {
                config: &self.config.ant,
                foods: &self.foods,
                colony: &self.colony,
                time,
            };
            let ground = self.ground.as_ref();
            self.ants
                .values_mut()
                .par_bridge()
                .map(|ant| {
                    let contact = ground.probe(ant.position, ant.velocity);
                    steer(ant, contact, &ctx)
                })
                .filter(|outcome| *outcome == SteerOutcome::Skipped)
                .count()
        };

        // Interact
        let mut batches = {
            let ctx = InteractionContext {
                pheromone: &self.config.pheromone,
                grid: &self.config.grid,
                foods: &self.foods,
                colony: &self.colony,
                marker_index: &self.marker_index,
                now,
            };
            self.ants
                .iter_mut()
                .par_bridge()
                .map(|(key, ant)| (key, interact(key, ant, &ctx)))
                .filter(|(_, commands)| !commands.is_empty())
                .collect::<Vec<_>>()
        };
        batches.sort_unstable_by_key(|(key, _)| *key);
        self.commands.extend(
            batches
                .into_iter()
                .flat_map(|(key, commands)| commands.into_iter().map(move |c| (key, c))),
        );

        // Barrier
        self.last_drain = self.commands.drain(Barrier {
            ants: &mut self.ants,
            foods: &mut self.foods,
            colony: &mut self.colony,
            pheromones: &mut self.pheromones,
            marker_index: &self.marker_index,
            pheromone: &self.config.pheromone,
            grid: &self.config.grid,
            now,
        });

        trace!(
            tick = self.tick,
            expired,
            indexed = self.marker_index.len(),
            skipped,
            drain = ?self.last_drain,
            "Tick done"
        );
    }

    pub fn ant_views(&self) -> Vec<AntView> {
        self.ants.values().map(Ant::view).collect()
    }

    pub fn marker_views(&self) -> Vec<MarkerView> {
        self.pheromones.views(&self.config.pheromone)
    }

    pub fn stats(&self) -> SimulationStats {
        let count_state =
            |state: ForagingState| self.ants.values().filter(|a| a.state == state).count();
        SimulationStats {
            tick: self.tick,
            elapsed: self.now,
            ants: self.ants.len(),
            searching: count_state(ForagingState::SearchingFood),
            turning: count_state(ForagingState::TurningAround),
            going_home: count_state(ForagingState::GoingHome),
            to_colony_markers: self.pheromones.count_of(MarkerKind::ToColony),
            to_food_markers: self.pheromones.count_of(MarkerKind::ToFood),
            food_sources: self.foods.len(),
            food_left: self.foods.values().map(|f| f.amount).sum(),
            food_collected: self.colony.food_collected,
            best_path_quality: self.colony.best_path_quality(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ant::{Target, is_legal_transition};
    use crate::simulation::clock::FixedStepClock;
    use crate::simulation::pheromone::cell_cap;
    use crate::simulation::terrain::ObstacleGrid;
    use macroquad::math::Vec3;
    use shared::Clock;
    use std::collections::HashMap;

    fn config_with_food(foods: Vec<FoodConfig>) -> SimulationConfig {
        SimulationConfig {
            food: foods,
            ..SimulationConfig::default()
        }
    }

    fn food(position: [f32; 3], amount: u32) -> FoodConfig {
        FoodConfig {
            position,
            amount,
            pickup_radius: 0.5,
        }
    }

    /// Inserts an ant that is already on its way home with `waypoints` recorded.
    fn homebound_ant(sim: &mut Simulation, position: Vec3, waypoints: &[Vec3]) -> AntKey {
        let mut sources: SlotMap<FoodKey, ()> = SlotMap::with_key();
        let mut ant = Ant::new(
            position,
            0.0,
            0.0,
            &sim.config.sensor,
            StdRng::seed_from_u64(11),
        );
        ant.pick_up(sources.insert(()), 0.0);
        ant.finish_turn(0.0);
        ant.waypoints = waypoints.to_vec();
        sim.ants.insert(ant)
    }

    fn path(len: usize, z: f32) -> Vec<Vec3> {
        (0..len).map(|i| Vec3::new(3.0 + i as f32 * 2.0, 0.0, z)).collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = SimulationConfig::default();
        config.grid.cell_size = 0.0;
        assert!(Simulation::new(config).is_err());

        let mut config = SimulationConfig::default();
        config.sensor.radius = -1.0;
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn test_ant_reaches_food_and_takes_one_unit() {
        let mut config = config_with_food(vec![food([5.0, 0.0, 0.0], 3)]);
        config.ant.view_radius = 6.0;
        let mut sim = Simulation::new(config).unwrap();
        let food_key = sim.foods.keys().next().unwrap();
        let ant = sim.ants.insert(Ant::new(
            Vec3::ZERO,
            0.0,
            0.0,
            &sim.config.sensor,
            StdRng::seed_from_u64(1),
        ));

        let mut clock = FixedStepClock::new(0.05);
        sim.tick(clock.tick());
        assert_eq!(sim.ants[ant].target, Some(Target::Food(food_key)));
        assert!(sim.foods[food_key].is_claimed_by(ant));

        let mut ticks = 1;
        while sim.ants[ant].state == ForagingState::SearchingFood {
            sim.tick(clock.tick());
            ticks += 1;
            assert!(ticks < 400, "Ant never reached the food");
        }
        assert_eq!(sim.ants[ant].state, ForagingState::TurningAround);
        assert_eq!(sim.foods[food_key].amount, 2);
        assert!(sim.ants[ant].is_carrying_food());
        assert_eq!(sim.ants[ant].target, None);
        assert!(sim.foods[food_key].claimants().is_empty());
    }

    #[test]
    fn test_exhausted_food_is_removed() {
        let mut config = config_with_food(vec![food([2.0, 0.0, 0.0], 1)]);
        config.ant.view_radius = 6.0;
        let mut sim = Simulation::new(config).unwrap();
        let ant = sim.ants.insert(Ant::new(
            Vec3::ZERO,
            0.0,
            0.0,
            &sim.config.sensor,
            StdRng::seed_from_u64(1),
        ));
        let mut clock = FixedStepClock::new(0.05);
        for _ in 0..200 {
            sim.tick(clock.tick());
            if sim.ants[ant].is_carrying_food() {
                break;
            }
        }
        assert!(sim.ants[ant].is_carrying_food());
        assert_eq!(sim.foods.len(), 0);
        assert_eq!(sim.stats().food_left, 0);
    }

    #[test]
    fn test_same_tick_reinforcement_prefers_shorter_path() {
        for short_first in [true, false] {
            let mut sim = Simulation::new(config_with_food(Vec::new())).unwrap();
            let near_colony = Vec3::new(0.3, 0.0, 0.0);
            let (short, long) = if short_first {
                let short = homebound_ant(&mut sim, near_colony, &path(4, 5.0));
                let long = homebound_ant(&mut sim, near_colony, &path(9, -5.0));
                (short, long)
            } else {
                let long = homebound_ant(&mut sim, near_colony, &path(9, -5.0));
                let short = homebound_ant(&mut sim, near_colony, &path(4, 5.0));
                (short, long)
            };

            sim.tick(TickTime {
                delta: 0.05,
                elapsed: 1.0,
            });

            assert_eq!(sim.colony.food_collected, 2);
            assert!((sim.colony.best_path_quality() - 0.25).abs() < 1e-6);
            let reinforced: Vec<f32> = sim
                .pheromones
                .iter()
                .map(|(_, m)| m.quality)
                .filter(|&q| q > 0.0)
                .collect();
            assert_eq!(reinforced.len(), 4, "short_first = {}", short_first);
            assert!(reinforced.iter().all(|&q| (q - 0.25).abs() < 1e-6));

            assert!((sim.ants[short].best_path_quality_seen - 0.25).abs() < 1e-6);
            assert!((sim.ants[long].best_path_quality_seen - 1.0 / 9.0).abs() < 1e-6);
            assert_eq!(sim.ants[short].state, ForagingState::SearchingFood);
        }
    }

    #[test]
    fn test_later_worse_path_is_not_reinforced() {
        let mut sim = Simulation::new(config_with_food(Vec::new())).unwrap();
        let near_colony = Vec3::new(0.3, 0.0, 0.0);
        homebound_ant(&mut sim, near_colony, &path(4, 5.0));
        sim.tick(TickTime {
            delta: 0.05,
            elapsed: 1.0,
        });
        assert_eq!(sim.last_drain().paths_reinforced, 1);

        homebound_ant(&mut sim, near_colony, &path(9, -5.0));
        sim.tick(TickTime {
            delta: 0.05,
            elapsed: 1.05,
        });
        assert_eq!(sim.last_drain().deposits, 1);
        assert_eq!(sim.last_drain().paths_reinforced, 0);
        assert!((sim.colony.best_path_quality() - 0.25).abs() < 1e-6);
        let worse = sim
            .pheromones
            .iter()
            .filter(|(_, m)| (m.quality - 1.0 / 9.0).abs() < 1e-6)
            .count();
        assert_eq!(worse, 0);
    }

    #[test]
    fn test_reset_restores_initial_world() {
        let mut config = config_with_food(vec![food([4.0, 0.0, 0.0], 5)]);
        config.colony.spawn_count = 30;
        let mut sim = Simulation::new(config).unwrap();
        sim.populate();
        let mut clock = FixedStepClock::new(0.05);
        for _ in 0..300 {
            sim.tick(clock.tick());
        }
        assert!(!sim.pheromones.is_empty());

        sim.reset();
        let stats = sim.stats();
        assert_eq!(stats.ants, 0);
        assert_eq!(stats.to_colony_markers + stats.to_food_markers, 0);
        assert_eq!(stats.food_sources, 1);
        assert_eq!(stats.food_left, 5);
        assert_eq!(stats.food_collected, 0);
        assert_eq!(stats.best_path_quality, 0.0);
        assert!(sim.foods.values().all(|f| f.claimants().is_empty()));

        sim.spawn_ants(3);
        assert_eq!(sim.ant_views().len(), 3);
        assert!(sim.ant_views().iter().all(|v| v.position == sim.colony.position));
    }

    #[test]
    fn test_invalid_time_is_ignored() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        sim.populate();
        sim.tick(TickTime {
            delta: f32::NAN,
            elapsed: 1.0,
        });
        assert_eq!(sim.tick_count(), 0);
    }

    /// Runs a colony for a while and checks every per-tick rule after each tick.
    fn run_and_check(mut sim: Simulation, ticks: usize, dt: f32) -> Simulation {
        let cell_size = sim.config.grid.cell_size;
        let mut clock = FixedStepClock::new(dt);
        let mut states: HashMap<AntKey, ForagingState> =
            sim.ants.iter().map(|(k, a)| (k, a.state)).collect();
        let mut intensities = HashMap::new();
        let mut best = sim.colony.best_path_quality();

        for tick in 0..ticks {
            sim.tick(clock.tick());

            for (key, ant) in sim.ants.iter() {
                let previous = states.insert(key, ant.state).unwrap_or(ant.state);
                assert!(
                    is_legal_transition(previous, ant.state),
                    "Tick {}: illegal transition {:?} -> {:?}",
                    tick,
                    previous,
                    ant.state
                );
                assert_eq!(ant.invariant_violation(), None, "Tick {}", tick);
                assert!(ant.position.is_finite() && ant.velocity.is_finite());
            }

            let mut holders: HashMap<AntKey, FoodKey> = HashMap::new();
            for (food_key, food) in sim.foods.iter() {
                assert!(food.claimants().len() as u32 <= food.amount);
                for &ant in food.claimants() {
                    assert!(
                        holders.insert(ant, food_key).is_none(),
                        "Tick {}: ant holds two claims",
                        tick
                    );
                }
            }
            for (key, ant) in sim.ants.iter() {
                if let Some(Target::Food(food_key)) = ant.target {
                    assert_eq!(holders.get(&key), Some(&food_key), "Tick {}: unclaimed target", tick);
                }
            }

            let quality = sim.colony.best_path_quality();
            assert!(quality >= best, "Tick {}: best quality fell", tick);
            best = quality;

            let mut cells: HashMap<_, f32> = HashMap::new();
            for (key, marker) in sim.pheromones.iter() {
                if let Some(previous) = intensities.insert(key, marker.intensity) {
                    assert!(marker.intensity <= previous, "Tick {}: intensity rose", tick);
                }
                let cell = (marker.position / cell_size).floor().as_ivec3();
                *cells.entry((cell.to_array(), marker.kind)).or_default() += marker.intensity;
            }
            intensities.retain(|key, _| sim.pheromones.get(*key).is_some());
            for ((_, kind), total) in cells {
                let cap = cell_cap(&sim.config.grid, kind);
                assert!(total <= cap + 1e-3, "Tick {}: cell holds {} over cap {}", tick, total, cap);
            }
        }
        sim
    }

    #[test]
    fn test_colony_run_keeps_invariants() {
        let mut config = config_with_food(vec![food([4.0, 0.0, 0.0], 40), food([-3.0, 0.0, 4.0], 40)]);
        config.seed = 42;
        config.colony.spawn_count = 60;
        config.ant.view_radius = 5.0;
        let mut sim = Simulation::new(config).unwrap();
        sim.populate();

        let sim = run_and_check(sim, 1200, 0.05);
        let stats = sim.stats();
        assert_eq!(stats.ants, 60);
        assert!(stats.food_collected > 0, "No food came home: {:?}", stats);
        assert!(stats.best_path_quality > 0.0);
    }

    #[test]
    fn test_tight_caps_and_walls_keep_invariants() {
        let mut config = config_with_food(vec![food([0.0, 0.0, 6.0], 1), food([0.5, 0.0, 6.0], 2)]);
        config.seed = 7;
        config.colony.spawn_count = 40;
        config.grid.max_colony_pheromone_per_cell = 40.0;
        config.grid.max_food_pheromone_per_cell = 40.0;
        config.pheromone.max_path_length = 8;
        let mut grid = ObstacleGrid::new(1.0, 0.0, config.ant.max_slope_radians());
        grid.fill_walls((-3, 3), (2, 3));
        let grid_visibility = grid.clone();
        let mut sim =
            Simulation::with_probes(config, Box::new(grid), Some(Box::new(grid_visibility))).unwrap();
        sim.populate();
        run_and_check(sim, 600, 0.05);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let run = || {
            let mut config = config_with_food(vec![food([5.0, 0.0, 0.0], 10)]);
            config.colony.spawn_count = 20;
            let mut sim = Simulation::new(config).unwrap();
            sim.populate();
            let mut clock = FixedStepClock::new(0.05);
            for _ in 0..200 {
                sim.tick(clock.tick());
            }
            let mut positions: Vec<(AntKey, [f32; 3])> =
                sim.ants.iter().map(|(k, a)| (k, a.position.to_array())).collect();
            positions.sort_by_key(|(k, _)| *k);
            (sim.stats(), positions)
        };
        assert_eq!(run(), run());
    }
}
