use macroquad::math::Vec3;
use shared::util::{angle_between, horizontal};
use shared::{GroundContact, GroundProbe, VisibilityProbe};
use std::collections::HashSet;

/// Height tolerance under which an ant counts as standing on the floor.
const GROUND_TOLERANCE: f32 = 0.05;

/// Endless flat floor at `y = 0` with nothing on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatGround;

impl GroundProbe for FlatGround {
    fn probe(&self, position: Vec3, _velocity: Vec3) -> GroundContact {
        if position.y <= GROUND_TOLERANCE {
            GroundContact::FLAT
        } else {
            GroundContact::AIRBORNE
        }
    }
}

/// Sight lines are never blocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSky;

impl VisibilityProbe for OpenSky {
    fn is_blocked(&self, _from: Vec3, _to: Vec3) -> bool {
        false
    }
}

/// Flat floor with wall columns on a square grid in the XZ plane.
///
/// Walls extend infinitely upwards, so they count as vertical surfaces for
/// slope checks and block every sight line that crosses them.
#[derive(Debug, Clone)]
pub struct ObstacleGrid {
    cell_size: f32,
    floor_height: f32,
    max_slope: f32,
    walls: HashSet<(i32, i32)>,
}

impl ObstacleGrid {
    /// `max_slope` is in radians. Surfaces steeper than that deflect ants.
    pub fn new(cell_size: f32, floor_height: f32, max_slope: f32) -> Self {
        Self {
            cell_size,
            floor_height,
            max_slope,
            walls: HashSet::new(),
        }
    }

    pub fn cell_of(&self, position: Vec3) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.z / self.cell_size).floor() as i32,
        )
    }

    pub fn set_wall(&mut self, x: i32, z: i32, wall: bool) {
        if wall {
            self.walls.insert((x, z));
        } else {
            self.walls.remove(&(x, z));
        }
    }

    /// Places walls on every cell of the inclusive rectangle.
    pub fn fill_walls(&mut self, min: (i32, i32), max: (i32, i32)) {
        for x in min.0..=max.0 {
            for z in min.1..=max.1 {
                self.walls.insert((x, z));
            }
        }
    }

    #[inline]
    pub fn is_wall(&self, x: i32, z: i32) -> bool {
        self.walls.contains(&(x, z))
    }

    /// Walks the grid cells crossed by the segment with a DDA and reports the first wall.
    /// The starting cell is never reported.
    fn first_wall_on_segment(&self, from: Vec3, to: Vec3) -> Option<(i32, i32)> {
        let (ox, oz) = (from.x / self.cell_size, from.z / self.cell_size);
        let (dx, dz) = (to.x / self.cell_size - ox, to.z / self.cell_size - oz);
        let length = (dx * dx + dz * dz).sqrt();
        if !length.is_finite() || length < 1e-6 {
            return None;
        }
        let (cos_a, sin_a) = (dx / length, dz / length);

        let mut map_x = ox.floor() as i32;
        let mut map_z = oz.floor() as i32;

        let step_x = if cos_a > 0.0 { 1 } else { -1 };
        let step_z = if sin_a > 0.0 { 1 } else { -1 };

        let t_delta_x = if cos_a.abs() < 1e-6 {
            f32::INFINITY
        } else {
            (1.0 / cos_a).abs()
        };
        let t_delta_z = if sin_a.abs() < 1e-6 {
            f32::INFINITY
        } else {
            (1.0 / sin_a).abs()
        };

        let mut t_max_x = if cos_a.abs() < 1e-6 {
            f32::INFINITY
        } else if cos_a > 0.0 {
            (map_x as f32 + 1.0 - ox) / cos_a
        } else {
            (map_x as f32 - ox) / cos_a
        };
        let mut t_max_z = if sin_a.abs() < 1e-6 {
            f32::INFINITY
        } else if sin_a > 0.0 {
            (map_z as f32 + 1.0 - oz) / sin_a
        } else {
            (map_z as f32 - oz) / sin_a
        };

        loop {
            if t_max_x < t_max_z {
                if t_max_x > length {
                    return None;
                }
                map_x += step_x;
                t_max_x += t_delta_x;
            } else {
                if t_max_z > length {
                    return None;
                }
                map_z += step_z;
                t_max_z += t_delta_z;
            }

            if self.is_wall(map_x, map_z) {
                return Some((map_x, map_z));
            }
        }
    }
}

impl GroundProbe for ObstacleGrid {
    fn probe(&self, position: Vec3, velocity: Vec3) -> GroundContact {
        let grounded = position.y <= self.floor_height + GROUND_TOLERANCE;
        let mut contact = GroundContact {
            grounded,
            ground_normal: Vec3::Y,
            wall_reflection: None,
        };

        let flat_velocity = horizontal(velocity);
        if flat_velocity.length_squared() < 1e-8 {
            return contact;
        }
        let ahead = position + flat_velocity.normalize() * (self.cell_size * 0.5);
        let Some((wx, wz)) = self.first_wall_on_segment(position, ahead) else {
            return contact;
        };

        // Face normal points from the wall back into the cell the ant is in
        let (cx, cz) = self.cell_of(position);
        let normal = Vec3::new((cx - wx).signum() as f32, 0.0, (cz - wz).signum() as f32)
            .normalize_or_zero();
        if normal == Vec3::ZERO {
            return contact;
        }

        let slope = angle_between(normal, Vec3::Y).unwrap_or(0.0);
        let moving_into = velocity.dot(normal) < 0.0;
        if slope > self.max_slope && (moving_into || velocity.y > 0.0) {
            contact.wall_reflection = Some(velocity - 2.0 * velocity.dot(normal) * normal);
        }
        contact
    }
}

impl VisibilityProbe for ObstacleGrid {
    fn is_blocked(&self, from: Vec3, to: Vec3) -> bool {
        self.first_wall_on_segment(from, to).is_some()
    }
}
