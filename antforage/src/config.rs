use macroquad::math::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected configuration. Fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },

    #[error("sensor.count must be between 1 and 3 (got {0})")]
    SensorCount(usize),

    #[error("ant.turn_around_strength must be in (0, 1] (got {0})")]
    TurnStrength(f32),

    #[error("pheromone.max_path_length must be at least 1")]
    ZeroPathLength,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub cell_size: f32,
    pub max_colony_pheromone_per_cell: f32,
    pub max_food_pheromone_per_cell: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            max_colony_pheromone_per_cell: 500.0,
            max_food_pheromone_per_cell: 500.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PheromoneConfig {
    pub distance_between_markers: f32,
    /// Seconds a marker of maximum intensity survives.
    pub max_lifetime: f32,
    /// Intensity lost per second.
    pub decay_rate: f32,
    /// Waypoints recorded on one trip home before the trip is abandoned for reinforcement.
    pub max_path_length: usize,
}

impl PheromoneConfig {
    pub fn max_intensity(&self) -> f32 {
        self.decay_rate * self.max_lifetime
    }
}

impl Default for PheromoneConfig {
    fn default() -> Self {
        Self {
            distance_between_markers: 0.5,
            max_lifetime: 30.0,
            decay_rate: 1.0,
            max_path_length: 200,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AntConfig {
    pub max_speed: f32,
    pub max_acceleration: f32,
    pub steer_strength: f32,
    pub wander_strength: f32,
    pub random_direction_angle: f32,
    pub random_steer_duration: f32,
    pub random_steer_strength: f32,
    pub turn_around_strength: f32,
    pub view_angle: f32,
    pub view_radius: f32,
    pub max_slope_angle: f32,
    pub gravity: f32,
}

impl AntConfig {
    pub fn view_angle_radians(&self) -> f32 {
        self.view_angle.to_radians()
    }

    pub fn random_direction_radians(&self) -> f32 {
        self.random_direction_angle.to_radians()
    }

    pub fn max_slope_radians(&self) -> f32 {
        self.max_slope_angle.to_radians()
    }
}

impl Default for AntConfig {
    fn default() -> Self {
        Self {
            max_speed: 2.0,
            max_acceleration: 4.0,
            steer_strength: 2.0,
            wander_strength: 0.2,
            random_direction_angle: 90.0,
            random_steer_duration: 1.0,
            random_steer_strength: 0.8,
            turn_around_strength: 0.2,
            view_angle: 90.0,
            view_radius: 4.0,
            max_slope_angle: 60.0,
            gravity: 9.81,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub count: usize,
    /// Angle between the forward probe and each side probe, in degrees.
    pub offset_angle: f32,
    /// Distance from the ant to each probe.
    pub distance: f32,
    pub radius: f32,
}

impl SensorConfig {
    pub fn offset_radians(&self) -> f32 {
        self.offset_angle.to_radians()
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            count: 3,
            offset_angle: 35.0,
            distance: 1.0,
            radius: 0.6,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ColonyConfig {
    pub position: [f32; 3],
    pub deposit_radius: f32,
    pub spawn_count: u32,
}

impl ColonyConfig {
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            deposit_radius: 1.0,
            spawn_count: 200,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FoodConfig {
    pub position: [f32; 3],
    pub amount: u32,
    pub pickup_radius: f32,
}

impl FoodConfig {
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            position: [15.0, 0.0, 0.0],
            amount: 50,
            pickup_radius: 0.5,
        }
    }
}

/// Everything the simulation reads. Loaded once; threaded explicitly through every stage.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub grid: GridConfig,
    pub pheromone: PheromoneConfig,
    pub ant: AntConfig,
    pub sensor: SensorConfig,
    pub colony: ColonyConfig,
    pub food: Vec<FoodConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            grid: GridConfig::default(),
            pheromone: PheromoneConfig::default(),
            ant: AntConfig::default(),
            sensor: SensorConfig::default(),
            colony: ColonyConfig::default(),
            food: vec![
                FoodConfig::default(),
                FoodConfig {
                    position: [-10.0, 0.0, 12.0],
                    ..FoodConfig::default()
                },
            ],
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive {
            field,
            value: value as f64,
        })
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite {
            field,
            value: value as f64,
        })
    }
}

impl SimulationConfig {
    /// Checks every value the pipeline divides by, takes a root of, or uses as a radius.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("grid.cell_size", self.grid.cell_size)?;
        positive(
            "grid.max_colony_pheromone_per_cell",
            self.grid.max_colony_pheromone_per_cell,
        )?;
        positive(
            "grid.max_food_pheromone_per_cell",
            self.grid.max_food_pheromone_per_cell,
        )?;

        positive(
            "pheromone.distance_between_markers",
            self.pheromone.distance_between_markers,
        )?;
        positive("pheromone.max_lifetime", self.pheromone.max_lifetime)?;
        positive("pheromone.decay_rate", self.pheromone.decay_rate)?;
        if self.pheromone.max_path_length == 0 {
            return Err(ConfigError::ZeroPathLength);
        }

        let ant = &self.ant;
        positive("ant.max_speed", ant.max_speed)?;
        positive("ant.max_acceleration", ant.max_acceleration)?;
        positive("ant.steer_strength", ant.steer_strength)?;
        finite("ant.wander_strength", ant.wander_strength)?;
        finite("ant.random_direction_angle", ant.random_direction_angle)?;
        positive("ant.random_steer_duration", ant.random_steer_duration)?;
        finite("ant.random_steer_strength", ant.random_steer_strength)?;
        if !(ant.turn_around_strength > 0.0 && ant.turn_around_strength <= 1.0) {
            return Err(ConfigError::TurnStrength(ant.turn_around_strength));
        }
        positive("ant.view_angle", ant.view_angle)?;
        positive("ant.view_radius", ant.view_radius)?;
        positive("ant.max_slope_angle", ant.max_slope_angle)?;
        finite("ant.gravity", ant.gravity)?;

        if !(1..=3).contains(&self.sensor.count) {
            return Err(ConfigError::SensorCount(self.sensor.count));
        }
        finite("sensor.offset_angle", self.sensor.offset_angle)?;
        positive("sensor.distance", self.sensor.distance)?;
        positive("sensor.radius", self.sensor.radius)?;

        for coord in self.colony.position {
            finite("colony.position", coord)?;
        }
        positive("colony.deposit_radius", self.colony.deposit_radius)?;

        for food in &self.food {
            for coord in food.position {
                finite("food.position", coord)?;
            }
            positive("food.pickup_radius", food.pickup_radius)?;
        }
        Ok(())
    }

    /// Parses a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
