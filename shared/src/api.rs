use macroquad::math::Vec3;

/// Time supplied to the simulation for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTime {
    /// Seconds since the previous tick.
    pub delta: f32,
    /// Seconds since the clock started.
    pub elapsed: f64,
}

/// Source of tick timing. Implemented by whatever drives the simulation.
pub trait Clock {
    fn tick(&mut self) -> TickTime;
}

/// Result of probing the ground under an ant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContact {
    pub grounded: bool,
    pub ground_normal: Vec3,
    /// Velocity to adopt when the ant runs into a surface it cannot climb.
    pub wall_reflection: Option<Vec3>,
}

impl GroundContact {
    /// Standing on a flat floor.
    pub const FLAT: Self = Self {
        grounded: true,
        ground_normal: Vec3::Y,
        wall_reflection: None,
    };

    /// Not touching anything.
    pub const AIRBORNE: Self = Self {
        grounded: false,
        ground_normal: Vec3::Y,
        wall_reflection: None,
    };
}

/// Collision collaborator queried once per ant per tick before steering.
pub trait GroundProbe: Send + Sync {
    fn probe(&self, position: Vec3, velocity: Vec3) -> GroundContact;
}

/// Optional line-of-sight collaborator used when targeting.
pub trait VisibilityProbe: Send + Sync {
    /// Returns true if something blocks the segment between `from` and `to`.
    fn is_blocked(&self, from: Vec3, to: Vec3) -> bool;
}

/// Foraging state of an ant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForagingState {
    SearchingFood,
    TurningAround,
    GoingHome,
}

/// Kind of a pheromone marker, named after where following it leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    ToColony,
    ToFood,
}

/// What a renderer needs to draw an ant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntView {
    pub position: Vec3,
    pub heading: Vec3,
    pub state: ForagingState,
    pub carrying_food: bool,
}

/// What a renderer needs to draw a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerView {
    pub position: Vec3,
    pub intensity: f32,
    pub kind: MarkerKind,
    /// Intensity relative to the maximum, in `[0, 1]`.
    pub scale: f32,
}
