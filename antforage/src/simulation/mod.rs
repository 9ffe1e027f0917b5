pub mod ant;
pub mod clock;
mod colony;
pub mod commands;
mod food;
pub mod interaction;
pub mod pheromone;
pub mod sensor;
pub mod spatial;
pub mod steering;
pub mod targeting;
pub mod terrain;
mod sim;

// Re-export key types for easier imports
pub use ant::{Ant, AntKey, CarriedFood, Target};
pub use clock::{FixedStepClock, Interval};
pub use colony::Colony;
pub use commands::{Command, CommandBuffer, DrainReport};
pub use food::{Food, FoodKey};
pub use pheromone::{Marker, MarkerKey, PheromoneStore};
pub use sensor::{Sensor, SensorArray};
pub use sim::{Simulation, SimulationStats};
pub use spatial::SpatialIndex;
pub use terrain::{FlatGround, ObstacleGrid, OpenSky};
