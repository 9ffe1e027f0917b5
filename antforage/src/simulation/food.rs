use super::ant::AntKey;
use crate::config::FoodConfig;
use macroquad::math::Vec3;
use slotmap::new_key_type;

new_key_type! {
    /// Key for food slotmap.
    pub struct FoodKey;
}

/// A food source holding a number of units.
///
/// Each claim reserves one unit, so there are never more claimants than units
/// left and no two ants can end up carrying the same unit.
#[derive(Debug, Clone)]
pub struct Food {
    pub position: Vec3,
    pub amount: u32,
    pub pickup_radius: f32,
    claimants: Vec<AntKey>,
}

impl Food {
    pub fn new(position: Vec3, amount: u32, pickup_radius: f32) -> Self {
        Self {
            position,
            amount,
            pickup_radius,
            claimants: Vec::new(),
        }
    }

    pub fn from_config(config: &FoodConfig) -> Self {
        Self::new(config.position(), config.amount, config.pickup_radius)
    }

    pub fn is_exhausted(&self) -> bool {
        self.amount == 0
    }

    pub fn claimants(&self) -> &[AntKey] {
        &self.claimants
    }

    pub fn is_claimed_by(&self, ant: AntKey) -> bool {
        self.claimants.contains(&ant)
    }

    /// True if another ant could still claim a unit.
    pub fn has_unclaimed(&self) -> bool {
        (self.claimants.len() as u32) < self.amount
    }

    /// Reserves a unit for `ant`. Claiming again with the same ant is a no-op that succeeds.
    pub fn try_claim(&mut self, ant: AntKey) -> bool {
        if self.is_claimed_by(ant) {
            return true;
        }
        if !self.has_unclaimed() {
            return false;
        }
        self.claimants.push(ant);
        true
    }

    pub fn release(&mut self, ant: AntKey) {
        self.claimants.retain(|&k| k != ant);
    }

    /// Hands one unit to `ant`, consuming its claim if it had one.
    /// Fails if every remaining unit is reserved by other ants.
    pub fn take_unit(&mut self, ant: AntKey) -> bool {
        if self.amount == 0 {
            return false;
        }
        let claimed = self.is_claimed_by(ant);
        if !claimed && !self.has_unclaimed() {
            return false;
        }
        self.release(ant);
        self.amount -= 1;
        true
    }
}
