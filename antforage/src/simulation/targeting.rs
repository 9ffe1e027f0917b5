use super::ant::{Ant, AntKey, Target};
use super::colony::Colony;
use super::food::{Food, FoodKey};
use super::spatial::SpatialIndex;
use crate::config::AntConfig;
use macroquad::math::Vec3;
use shared::util::{angle_between, horizontal};
use shared::{ForagingState, VisibilityProbe};
use slotmap::SlotMap;
use std::cmp::Ordering;

/// What the read-only pass decided for one ant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetProposal {
    Keep,
    Clear,
    Acquire(Target),
}

/// Read-only world state for target resolution.
pub struct TargetingContext<'a> {
    pub config: &'a AntConfig,
    pub foods: &'a SlotMap<FoodKey, Food>,
    pub food_index: &'a SpatialIndex<FoodKey>,
    pub colony: &'a Colony,
    pub visibility: Option<&'a dyn VisibilityProbe>,
}

impl TargetingContext<'_> {
    /// True if `point` is within view radius, inside the view cone and not hidden.
    fn can_see(&self, ant: &Ant, point: Vec3) -> bool {
        let offset = point - ant.position;
        if offset.length_squared() > self.config.view_radius * self.config.view_radius {
            return false;
        }
        // Standing on it counts as seeing it
        if let Some(angle) = angle_between(ant.heading, horizontal(offset)) {
            if angle > self.config.view_angle_radians() * 0.5 {
                return false;
            }
        }
        match self.visibility {
            Some(probe) => !probe.is_blocked(ant.position, point),
            None => true,
        }
    }

    fn target_is_valid(&self, key: AntKey, ant: &Ant, target: Target) -> bool {
        match (ant.state, target) {
            (ForagingState::SearchingFood, Target::Food(food)) => self
                .foods
                .get(food)
                .is_some_and(|food| food.is_claimed_by(key)),
            (ForagingState::GoingHome, Target::Colony) => true,
            _ => false,
        }
    }

    /// Nearest visible food with an unclaimed unit. Equal distances go to the lowest key.
    fn nearest_food(&self, ant: &Ant) -> Option<FoodKey> {
        self.food_index
            .query(ant.position, self.config.view_radius)
            .filter(|entry| {
                self.foods
                    .get(entry.item)
                    .is_some_and(|food| food.has_unclaimed())
            })
            .filter(|entry| self.can_see(ant, entry.position))
            .map(|entry| (entry.position.distance_squared(ant.position), entry.item))
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)))
            .map(|(_, key)| key)
    }

    /// Decides whether `ant` keeps, drops, or acquires a target. Never mutates anything.
    pub fn propose(&self, key: AntKey, ant: &Ant) -> TargetProposal {
        let stale = match ant.target {
            Some(target) if self.target_is_valid(key, ant, target) => return TargetProposal::Keep,
            Some(_) => true,
            None => false,
        };

        let found = match ant.state {
            ForagingState::SearchingFood => self.nearest_food(ant).map(Target::Food),
            ForagingState::GoingHome => self
                .can_see(ant, self.colony.position)
                .then_some(Target::Colony),
            ForagingState::TurningAround => None,
        };

        match (found, stale) {
            (Some(target), _) => TargetProposal::Acquire(target),
            (None, true) => TargetProposal::Clear,
            (None, false) => TargetProposal::Keep,
        }
    }
}

/// Applies one proposal. Food claims are granted here, so proposals must be applied
/// one at a time. Returns true if the ant ends up with a new target.
pub fn apply_proposal(
    key: AntKey,
    ant: &mut Ant,
    proposal: TargetProposal,
    foods: &mut SlotMap<FoodKey, Food>,
) -> bool {
    let release_old = |ant: &Ant, foods: &mut SlotMap<FoodKey, Food>| {
        if let Some(old) = ant.food_target().and_then(|k| foods.get_mut(k)) {
            old.release(key);
        }
    };

    match proposal {
        TargetProposal::Keep => false,
        TargetProposal::Clear => {
            release_old(ant, foods);
            ant.target = None;
            false
        }
        TargetProposal::Acquire(Target::Colony) => {
            release_old(ant, foods);
            ant.target = Some(Target::Colony);
            true
        }
        TargetProposal::Acquire(Target::Food(food_key)) => {
            release_old(ant, foods);
            ant.target = None;
            if !foods.get_mut(food_key).is_some_and(|food| food.try_claim(key)) {
                return false;
            }
            ant.target = Some(Target::Food(food_key));
            true
        }
    }
}
