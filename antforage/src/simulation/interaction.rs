use super::ant::{Ant, AntKey, StateExt};
use super::colony::Colony;
use super::commands::Command;
use super::food::{Food, FoodKey};
use super::pheromone::{MarkerIndex, MarkerSpawn, cell_cap, cell_intensity, trail_intensity};
use crate::config::{GridConfig, PheromoneConfig};
use shared::ForagingState;
use slotmap::SlotMap;
use tracing::debug;

/// Read-only world state for the interaction stage.
pub struct InteractionContext<'a> {
    pub pheromone: &'a PheromoneConfig,
    pub grid: &'a GridConfig,
    pub foods: &'a SlotMap<FoodKey, Food>,
    pub colony: &'a Colony,
    pub marker_index: &'a MarkerIndex,
    pub now: f64,
}

/// Decides what `ant` does to the world this tick.
///
/// Only the ant itself is mutated (marker throttle and waypoints). Everything that
/// touches shared state comes back as commands for the end-of-tick barrier.
pub fn interact(key: AntKey, ant: &mut Ant, ctx: &InteractionContext<'_>) -> Vec<Command> {
    let mut commands = Vec::new();

    match ant.state {
        ForagingState::SearchingFood => {
            if let Some(food_key) = ant.food_target() {
                let in_reach = ctx.foods.get(food_key).is_some_and(|food| {
                    food.position.distance_squared(ant.position)
                        <= food.pickup_radius * food.pickup_radius
                });
                if in_reach {
                    commands.push(Command::TakeFood { food: food_key });
                }
            }
        }
        ForagingState::GoingHome => {
            // An ant that finished turning this tick waits for the next one
            let settled = ant.turned_at < ctx.now;
            if settled && ant.is_carrying_food() && ctx.colony.is_within_deposit(ant.position) {
                commands.push(Command::Deposit);
                return commands;
            }
        }
        ForagingState::TurningAround => {}
    }

    if let Some(spawn) = lay_marker(key, ant, ctx) {
        commands.push(Command::SpawnMarker(spawn));
    }
    commands
}

/// Throttles marker laying by distance, records a waypoint when carrying food and
/// pre-checks the cell cap against the tick's index snapshot.
fn lay_marker(key: AntKey, ant: &mut Ant, ctx: &InteractionContext<'_>) -> Option<MarkerSpawn> {
    let config = ctx.pheromone;
    let position = ant.position;
    let due = ant
        .last_marker_position
        .is_none_or(|last| last.distance(position) >= config.distance_between_markers);
    if !due {
        return None;
    }
    ant.last_marker_position = Some(position);

    if ant.is_carrying_food() && !ant.record_waypoint(position, config.max_path_length) {
        debug!(ant = ?key, max = config.max_path_length, "Path too long, abandoned for reinforcement");
    }

    let kind = ant.state.marker_kind();
    let intensity = trail_intensity(ctx.now - ant.anchor_time(), config);
    if intensity <= 0.0 {
        return None;
    }

    let cell = ctx.marker_index.cell_of(position);
    if cell_intensity(ctx.marker_index, cell, kind) + intensity > cell_cap(ctx.grid, kind) {
        return None;
    }

    Some(MarkerSpawn {
        position,
        kind,
        intensity,
        quality: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColonyConfig, SensorConfig};
    use crate::simulation::ant::Target;
    use macroquad::math::Vec3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use shared::MarkerKind;

    struct World {
        pheromone: PheromoneConfig,
        grid: GridConfig,
        foods: SlotMap<FoodKey, Food>,
        colony: Colony,
        index: MarkerIndex,
        ants: SlotMap<AntKey, Ant>,
    }

    impl World {
        fn new() -> Self {
            Self {
                pheromone: PheromoneConfig::default(),
                grid: GridConfig::default(),
                foods: SlotMap::with_key(),
                colony: Colony::new(&ColonyConfig::default()),
                index: MarkerIndex::new(1.0).unwrap(),
                ants: SlotMap::with_key(),
            }
        }

        fn add_ant(&mut self, position: Vec3) -> AntKey {
            self.ants.insert(Ant::new(
                position,
                0.0,
                0.0,
                &SensorConfig::default(),
                StdRng::seed_from_u64(9),
            ))
        }

        fn run(&mut self, key: AntKey, now: f64) -> Vec<Command> {
            let ctx = InteractionContext {
                pheromone: &self.pheromone,
                grid: &self.grid,
                foods: &self.foods,
                colony: &self.colony,
                marker_index: &self.index,
                now,
            };
            interact(key, &mut self.ants[key], &ctx)
        }
    }

    #[test]
    fn test_first_marker_is_exempt_then_throttled() {
        let mut world = World::new();
        let ant = world.add_ant(Vec3::new(5.0, 0.0, 0.0));

        let first = world.run(ant, 1.0);
        match first.as_slice() {
            [Command::SpawnMarker(spawn)] => {
                assert_eq!(spawn.kind, MarkerKind::ToColony);
                let expected = world.pheromone.max_intensity() * (1.0 - 1.0 / 30.0);
                assert!((spawn.intensity - expected).abs() < 1e-3);
            }
            other => panic!("Expected one spawn, got {:?}", other),
        }

        world.ants[ant].position.x += 0.2;
        assert!(world.run(ant, 1.1).is_empty(), "Spawned before the throttle distance");
        world.ants[ant].position.x += 0.4;
        assert_eq!(world.run(ant, 1.2).len(), 1);
    }

    #[test]
    fn test_no_marker_after_trail_faded() {
        let mut world = World::new();
        let ant = world.add_ant(Vec3::new(5.0, 0.0, 0.0));
        assert!(world.run(ant, 31.0).is_empty());
    }

    #[test]
    fn test_pickup_requested_inside_radius() {
        let mut world = World::new();
        let food = world.foods.insert(Food::new(Vec3::new(5.0, 0.0, 0.0), 2, 0.5));
        let ant = world.add_ant(Vec3::new(4.6, 0.0, 0.0));
        world.foods[food].try_claim(ant);
        world.ants[ant].target = Some(Target::Food(food));
        world.ants[ant].last_marker_position = Some(Vec3::new(4.6, 0.0, 0.0));

        assert_eq!(world.run(ant, 1.0), vec![Command::TakeFood { food }]);
        world.ants[ant].position.x = 4.3;
        assert!(world.run(ant, 1.0).is_empty());
    }

    #[test]
    fn test_deposit_requested_at_colony() {
        let mut world = World::new();
        let mut sources: SlotMap<FoodKey, ()> = SlotMap::with_key();
        let ant = world.add_ant(Vec3::new(0.5, 0.0, 0.0));
        world.ants[ant].pick_up(sources.insert(()), 0.0);
        world.ants[ant].finish_turn(0.0);
        assert_eq!(world.run(ant, 1.0), vec![Command::Deposit]);
    }

    #[test]
    fn test_carrying_ant_lays_food_trail_and_records_waypoints() {
        let mut world = World::new();
        let mut sources: SlotMap<FoodKey, ()> = SlotMap::with_key();
        let ant = world.add_ant(Vec3::new(10.0, 0.0, 0.0));
        world.ants[ant].pick_up(sources.insert(()), 2.0);

        let commands = world.run(ant, 2.0);
        assert!(matches!(
            commands.as_slice(),
            [Command::SpawnMarker(MarkerSpawn { kind: MarkerKind::ToFood, .. })]
        ));
        assert_eq!(world.ants[ant].waypoints.len(), 1);
    }

    #[test]
    fn test_cell_cap_precheck_uses_index_snapshot() {
        let mut world = World::new();
        world.grid.max_colony_pheromone_per_cell = 5.0;
        world.index.rebuild([(
            Vec3::new(5.5, 0.5, 0.5),
            crate::simulation::pheromone::IndexedMarker {
                key: Default::default(),
                kind: MarkerKind::ToColony,
                intensity: 4.0,
            },
        )]);
        let ant = world.add_ant(Vec3::new(5.2, 0.2, 0.2));
        assert!(world.run(ant, 0.0).is_empty(), "Cap should reject the spawn");
        assert!(world.ants[ant].last_marker_position.is_some());
    }
}
