use crate::config::ColonyConfig;
use macroquad::math::Vec3;

/// The nest ants leave from and return food to.
#[derive(Debug, Clone)]
pub struct Colony {
    pub position: Vec3,
    pub deposit_radius: f32,
    pub spawn_count: u32,
    /// Best path quality that has been reinforced so far. Never decreases.
    best_path_quality: f32,
    pub food_collected: u32,
}

impl Colony {
    pub fn new(config: &ColonyConfig) -> Self {
        Self {
            position: config.position(),
            deposit_radius: config.deposit_radius,
            spawn_count: config.spawn_count,
            best_path_quality: 0.0,
            food_collected: 0,
        }
    }

    pub fn best_path_quality(&self) -> f32 {
        self.best_path_quality
    }

    /// Records `quality` if it beats the best so far. Returns whether it did.
    pub fn offer_path_quality(&mut self, quality: f32) -> bool {
        if quality.is_finite() && quality > self.best_path_quality {
            self.best_path_quality = quality;
            true
        } else {
            false
        }
    }

    pub fn is_within_deposit(&self, position: Vec3) -> bool {
        position.distance_squared(self.position) <= self.deposit_radius * self.deposit_radius
    }

    pub fn reset(&mut self) {
        self.best_path_quality = 0.0;
        self.food_collected = 0;
    }
}
