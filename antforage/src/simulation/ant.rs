use super::food::FoodKey;
use super::sensor::SensorArray;
use crate::config::SensorConfig;
use macroquad::math::Vec3;
use rand::rngs::StdRng;
use shared::util::{direction_from_angle, heading_angle};
use shared::{AntView, ForagingState, MarkerKind};
use slotmap::new_key_type;

new_key_type! {
    /// Key for ant slotmap.
    pub struct AntKey;
}

/// What an ant is heading for. Never owns the entity it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Food(FoodKey),
    Colony,
}

/// The unit of food an ant is carrying home.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarriedFood {
    pub source: FoodKey,
}

/// Marker kind an ant lays, and the kind it follows, in each state.
pub trait StateExt {
    fn sensor_need(self) -> MarkerKind;
    fn marker_kind(self) -> MarkerKind;
    fn next(self) -> ForagingState;
}

impl StateExt for ForagingState {
    /// Searching ants follow food trails, ants carrying food follow trails home.
    fn sensor_need(self) -> MarkerKind {
        match self {
            ForagingState::SearchingFood => MarkerKind::ToFood,
            ForagingState::TurningAround | ForagingState::GoingHome => MarkerKind::ToColony,
        }
    }

    /// Searching ants leave a trail home, ants carrying food leave a trail to it.
    fn marker_kind(self) -> MarkerKind {
        match self {
            ForagingState::SearchingFood => MarkerKind::ToColony,
            ForagingState::TurningAround | ForagingState::GoingHome => MarkerKind::ToFood,
        }
    }

    fn next(self) -> ForagingState {
        match self {
            ForagingState::SearchingFood => ForagingState::TurningAround,
            ForagingState::TurningAround => ForagingState::GoingHome,
            ForagingState::GoingHome => ForagingState::SearchingFood,
        }
    }
}

/// True if an ant may go from `from` to `to` within one tick.
pub fn is_legal_transition(from: ForagingState, to: ForagingState) -> bool {
    from == to || from.next() == to
}

/// State of an ant.
pub struct Ant {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Unit facing in the horizontal plane.
    pub heading: Vec3,
    pub desired_direction: Vec3,
    pub wander_force: Vec3,
    pub next_wander_at: f64,

    pub state: ForagingState,
    pub target: Option<Target>,
    pub carried_food: Option<CarriedFood>,
    /// Heading angle the ant turns towards while `TurningAround`.
    pub turn_target: f32,

    pub sensors: SensorArray,

    pub last_marker_position: Option<Vec3>,
    pub left_colony_at: f64,
    pub left_food_at: f64,
    /// When the ant last finished turning around.
    pub turned_at: f64,
    pub best_path_quality_seen: f32,
    /// Positions recorded on the way home, used to reinforce the path on deposit.
    pub waypoints: Vec<Vec3>,
    pub recording_path: bool,

    pub rng: StdRng,
}

impl Ant {
    /// Create a new ant leaving the colony at `position`, facing `angle`.
    pub fn new(position: Vec3, angle: f32, now: f64, sensors: &SensorConfig, rng: StdRng) -> Self {
        let heading = direction_from_angle(angle);
        Self {
            position,
            velocity: Vec3::ZERO,
            heading,
            desired_direction: heading,
            wander_force: Vec3::ZERO,
            next_wander_at: now,
            state: ForagingState::SearchingFood,
            target: None,
            carried_food: None,
            turn_target: angle,
            sensors: SensorArray::new(sensors),
            last_marker_position: None,
            left_colony_at: now,
            left_food_at: now,
            turned_at: now,
            best_path_quality_seen: 0.0,
            waypoints: Vec::new(),
            recording_path: false,
            rng,
        }
    }

    pub fn is_carrying_food(&self) -> bool {
        self.carried_food.is_some()
    }

    /// Time the current trail started, used to fade freshly laid markers.
    pub fn anchor_time(&self) -> f64 {
        match self.state {
            ForagingState::SearchingFood => self.left_colony_at,
            ForagingState::TurningAround | ForagingState::GoingHome => self.left_food_at,
        }
    }

    pub fn food_target(&self) -> Option<FoodKey> {
        match self.target {
            Some(Target::Food(key)) => Some(key),
            _ => None,
        }
    }

    /// Grabs a unit from `source` and starts turning back. Only valid while searching.
    pub fn pick_up(&mut self, source: FoodKey, now: f64) -> bool {
        if self.state != ForagingState::SearchingFood {
            return false;
        }
        self.carried_food = Some(CarriedFood { source });
        self.target = None;
        self.state = ForagingState::TurningAround;
        self.left_food_at = now;
        self.turn_target = heading_angle(-self.desired_direction);
        self.wander_force = Vec3::ZERO;
        self.last_marker_position = None;
        self.waypoints.clear();
        self.recording_path = true;
        true
    }

    pub fn finish_turn(&mut self, now: f64) {
        if self.state == ForagingState::TurningAround {
            self.state = ForagingState::GoingHome;
            self.turned_at = now;
        }
    }

    /// Drops the carried food at the colony and heads back out.
    /// Returns the waypoints recorded on the way home, if the ant was carrying food.
    pub fn deposit(&mut self, now: f64) -> Option<Vec<Vec3>> {
        if self.state != ForagingState::GoingHome || self.carried_food.is_none() {
            return None;
        }
        self.carried_food = None;
        self.target = None;
        self.state = ForagingState::SearchingFood;
        self.left_colony_at = now;
        self.last_marker_position = None;
        self.recording_path = false;

        // Reverse instantly
        self.velocity = -self.velocity;
        self.heading = -self.heading;
        self.desired_direction = -self.desired_direction;
        self.wander_force = Vec3::ZERO;

        Some(std::mem::take(&mut self.waypoints))
    }

    /// Appends a waypoint, abandoning the recording if the path grows past `max_len`.
    /// Returns false if the path was abandoned.
    pub fn record_waypoint(&mut self, position: Vec3, max_len: usize) -> bool {
        if !self.recording_path || !self.is_carrying_food() {
            return true;
        }
        self.waypoints.push(position);
        if self.waypoints.len() > max_len {
            self.waypoints.clear();
            self.recording_path = false;
            return false;
        }
        true
    }

    pub fn view(&self) -> AntView {
        AntView {
            position: self.position,
            heading: self.heading,
            state: self.state,
            carrying_food: self.is_carrying_food(),
        }
    }

    /// First broken consistency rule between state, target, carried food and waypoints.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        let carrying = self.is_carrying_food();
        match self.state {
            ForagingState::SearchingFood => {
                if carrying {
                    return Some("searching ant carries food");
                }
                if matches!(self.target, Some(Target::Colony)) {
                    return Some("searching ant targets the colony");
                }
            }
            ForagingState::TurningAround => {
                if !carrying {
                    return Some("turning ant carries nothing");
                }
                if self.target.is_some() {
                    return Some("turning ant has a target");
                }
            }
            ForagingState::GoingHome => {
                if !carrying {
                    return Some("homebound ant carries nothing");
                }
                if matches!(self.target, Some(Target::Food(_))) {
                    return Some("homebound ant targets food");
                }
            }
        }
        if !self.waypoints.is_empty() && !carrying {
            return Some("waypoints recorded without food");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use slotmap::SlotMap;

    fn ant() -> Ant {
        Ant::new(
            Vec3::ZERO,
            0.0,
            0.0,
            &SensorConfig::default(),
            StdRng::seed_from_u64(1),
        )
    }

    fn food_key() -> FoodKey {
        let mut map: SlotMap<FoodKey, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn test_transition_table() {
        use ForagingState::*;
        assert!(is_legal_transition(SearchingFood, TurningAround));
        assert!(is_legal_transition(TurningAround, GoingHome));
        assert!(is_legal_transition(GoingHome, SearchingFood));
        assert!(!is_legal_transition(TurningAround, SearchingFood));
        assert!(!is_legal_transition(SearchingFood, GoingHome));
        assert!(!is_legal_transition(GoingHome, TurningAround));
    }

    #[test]
    fn test_full_trip_keeps_invariants() {
        let mut ant = ant();
        ant.desired_direction = Vec3::X;
        assert_eq!(ant.invariant_violation(), None);

        assert!(ant.pick_up(food_key(), 3.0));
        assert_eq!(ant.state, ForagingState::TurningAround);
        assert_eq!(ant.left_food_at, 3.0);
        assert!((ant.turn_target.abs() - std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(ant.invariant_violation(), None);
        assert!(!ant.pick_up(food_key(), 3.0), "Second pickup while turning");

        assert!(ant.deposit(4.0).is_none(), "Deposit before turning finished");
        ant.finish_turn(3.5);
        assert_eq!(ant.state, ForagingState::GoingHome);
        ant.record_waypoint(Vec3::ONE, 10);
        ant.record_waypoint(Vec3::ZERO, 10);
        assert_eq!(ant.invariant_violation(), None);

        ant.velocity = Vec3::new(1.0, 0.0, 0.0);
        let waypoints = ant.deposit(5.0).unwrap();
        assert_eq!(waypoints.len(), 2);
        assert_eq!(ant.state, ForagingState::SearchingFood);
        assert_eq!(ant.velocity, Vec3::new(-1.0, 0.0, 0.0));
        assert!(ant.waypoints.is_empty());
        assert_eq!(ant.left_colony_at, 5.0);
        assert_eq!(ant.invariant_violation(), None);
    }

    #[test]
    fn test_waypoints_abandoned_past_max_length() {
        let mut ant = ant();
        ant.pick_up(food_key(), 0.0);
        for i in 0..3 {
            assert!(ant.record_waypoint(Vec3::splat(i as f32), 3));
        }
        assert!(!ant.record_waypoint(Vec3::splat(9.0), 3));
        assert!(ant.waypoints.is_empty());
        assert!(!ant.recording_path);
        ant.record_waypoint(Vec3::ZERO, 3);
        assert!(ant.waypoints.is_empty(), "Recording resumed on the same trip");
    }

    #[test]
    fn test_marker_kind_follows_state() {
        assert_eq!(ForagingState::SearchingFood.marker_kind(), MarkerKind::ToColony);
        assert_eq!(ForagingState::GoingHome.marker_kind(), MarkerKind::ToFood);
        assert_eq!(ForagingState::SearchingFood.sensor_need(), MarkerKind::ToFood);
        assert_eq!(ForagingState::GoingHome.sensor_need(), MarkerKind::ToColony);
    }
}
