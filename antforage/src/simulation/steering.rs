use super::ant::{Ant, Target};
use super::colony::Colony;
use super::food::{Food, FoodKey};
use crate::config::AntConfig;
use macroquad::math::Vec3;
use rand::Rng;
use rand::rngs::StdRng;
use shared::util::{angle_delta, direction_from_angle, heading_angle, horizontal, lerp_angle, rotate_about_up};
use shared::{ForagingState, GroundContact, TickTime};
use slotmap::SlotMap;
use std::f32::consts::TAU;
use tracing::{trace, warn};

/// Remaining angle under which a turning ant counts as facing home.
pub const TURN_EPSILON: f32 = 0.02;

/// Squared speed under which the heading is left as it was.
const MIN_SPEED_SQ: f32 = 1e-6;

/// Read-only world state the steering stage needs.
pub struct SteeringContext<'a> {
    pub config: &'a AntConfig,
    pub foods: &'a SlotMap<FoodKey, Food>,
    pub colony: &'a Colony,
    pub time: TickTime,
}

impl SteeringContext<'_> {
    fn target_position(&self, target: Target) -> Option<Vec3> {
        match target {
            Target::Food(key) => self.foods.get(key).map(|food| food.position),
            Target::Colony => Some(self.colony.position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerOutcome {
    Moved,
    Fell,
    /// Direction was not finite, nothing was integrated.
    Skipped,
}

/// Removes the component of `v` along `normal`.
#[inline(always)]
fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Decisions for one tick, written back to the ant only once motion is integrated.
struct Plan {
    desired: Vec3,
    wander_force: Vec3,
    next_wander_at: f64,
    clear_target: bool,
    turn_finished: bool,
    rng: Option<StdRng>,
}

/// Moves one ant for one tick. `contact` comes from probing the ground before steering.
pub fn steer(ant: &mut Ant, contact: GroundContact, ctx: &SteeringContext<'_>) -> SteerOutcome {
    let config = ctx.config;
    let dt = ctx.time.delta;

    if !contact.grounded {
        ant.velocity.y -= config.gravity * dt;
        ant.position += ant.velocity * dt;
        return SteerOutcome::Fell;
    }

    let (velocity, facing, wander_force) = match contact.wall_reflection {
        Some(reflected) => {
            let away = horizontal(reflected).normalize_or_zero();
            let facing = if away != Vec3::ZERO { away } else { ant.desired_direction };
            (reflected, facing, Vec3::ZERO)
        }
        None => (ant.velocity, ant.desired_direction, ant.wander_force),
    };

    let plan = match ant.state {
        ForagingState::TurningAround => turn_around(ant, facing, config),
        ForagingState::SearchingFood | ForagingState::GoingHome => {
            choose_direction(ant, facing, wander_force, ctx)
        }
    };

    let direction = project_on_plane(plan.wander_force + plan.desired, contact.ground_normal).normalize();
    if !direction.is_finite() {
        warn!(
            position = ?ant.position,
            state = ?ant.state,
            "Skipping motion update for non-finite direction"
        );
        return SteerOutcome::Skipped;
    }

    if plan.clear_target {
        ant.target = None;
    }
    if let Some(rng) = plan.rng {
        ant.rng = rng;
    }
    if plan.turn_finished {
        ant.finish_turn(ctx.time.elapsed);
    }
    ant.wander_force = plan.wander_force;
    ant.next_wander_at = plan.next_wander_at;
    ant.desired_direction = direction;

    let desired_velocity = direction * config.max_speed;
    let acceleration = (desired_velocity - velocity).clamp_length_max(config.max_acceleration)
        * config.steer_strength;
    let velocity = (velocity + acceleration * dt).clamp_length_max(config.max_speed);
    ant.velocity = project_on_plane(velocity, contact.ground_normal);
    ant.position += ant.velocity * dt;

    let flat = horizontal(ant.velocity);
    if flat.length_squared() > MIN_SPEED_SQ {
        ant.heading = flat.normalize();
    }
    SteerOutcome::Moved
}

/// Rotates `facing` towards the turn target along the shorter arc.
fn turn_around(ant: &Ant, facing: Vec3, config: &AntConfig) -> Plan {
    let current = heading_angle(facing);
    let next = lerp_angle(current, ant.turn_target, config.turn_around_strength);
    Plan {
        desired: direction_from_angle(next),
        wander_force: Vec3::ZERO,
        next_wander_at: ant.next_wander_at,
        clear_target: false,
        turn_finished: angle_delta(next, ant.turn_target).abs() < TURN_EPSILON,
        rng: None,
    }
}

/// Target first, then the strongest sensor, then wandering.
fn choose_direction(
    ant: &Ant,
    facing: Vec3,
    wander_force: Vec3,
    ctx: &SteeringContext<'_>,
) -> Plan {
    let config = ctx.config;
    let mut plan = Plan {
        desired: facing,
        wander_force,
        next_wander_at: ant.next_wander_at,
        clear_target: false,
        turn_finished: false,
        rng: None,
    };

    if let Some(target) = ant.target {
        match ctx.target_position(target) {
            Some(position) => {
                plan.desired = (position - ant.position).normalize();
                plan.wander_force = Vec3::ZERO;
                return plan;
            }
            None => {
                trace!(?target, "Target vanished before steering");
                plan.clear_target = true;
            }
        }
    }

    if let Some(probe) = ant.sensors.strongest() {
        let toward = (probe.position - ant.position).normalize_or_zero();
        let mut rng = ant.rng.clone();
        let jitter = direction_from_angle(rng.random_range(0.0..TAU)) * config.wander_strength;
        plan.desired = toward + jitter;
        plan.wander_force = Vec3::ZERO;
        plan.rng = Some(rng);
        return plan;
    }

    let now = ctx.time.elapsed;
    if now >= ant.next_wander_at {
        let mut rng = ant.rng.clone();
        let spread = config.random_direction_radians().abs() * 0.5;
        let deviation = rng.random_range(-spread..=spread);
        let mut base = horizontal(facing).normalize_or_zero();
        if base == Vec3::ZERO {
            base = ant.heading;
        }
        plan.wander_force = rotate_about_up(base, deviation) * config.random_steer_strength;

        let duration = config.random_steer_duration as f64;
        plan.next_wander_at = now + rng.random_range(duration * 0.5..=duration);
        plan.rng = Some(rng);
    }
    plan
}
