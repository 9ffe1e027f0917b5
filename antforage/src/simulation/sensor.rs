use super::pheromone::MarkerIndex;
use crate::config::SensorConfig;
use macroquad::math::Vec3;
use shared::MarkerKind;
use shared::util::{direction_from_angle, heading_angle};

/// One directional probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensor {
    /// Offset from the ant's heading, in radians.
    pub angle_offset: f32,
    /// Where the probe sampled on the last sense pass.
    pub position: Vec3,
    pub intensity: f32,
}

/// The 1 to 3 probes an ant samples pheromones with.
#[derive(Debug, Clone)]
pub struct SensorArray {
    sensors: Vec<Sensor>,
}

impl SensorArray {
    pub fn new(config: &SensorConfig) -> Self {
        let offset = config.offset_radians();
        let offsets: &[f32] = match config.count {
            1 => &[0.0],
            2 => &[-offset, offset],
            _ => &[-offset, 0.0, offset],
        };
        Self {
            sensors: offsets
                .iter()
                .map(|&angle_offset| Sensor {
                    angle_offset,
                    position: Vec3::ZERO,
                    intensity: 0.0,
                })
                .collect(),
        }
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Samples every probe around `position`, summing intensities of `need` markers.
    pub fn sense(
        &mut self,
        position: Vec3,
        heading: Vec3,
        need: MarkerKind,
        index: &MarkerIndex,
        config: &SensorConfig,
    ) {
        let base_angle = heading_angle(heading);
        for sensor in &mut self.sensors {
            sensor.position =
                position + direction_from_angle(base_angle + sensor.angle_offset) * config.distance;
            sensor.intensity = index
                .query(sensor.position, config.radius)
                .filter(|entry| entry.item.kind == need)
                .map(|entry| entry.item.intensity)
                .sum();
        }
    }

    pub fn total(&self) -> f32 {
        self.sensors.iter().map(|s| s.intensity).sum()
    }

    /// Probe with the highest intensity, or `None` if nothing was sensed.
    /// Ties go to the probe closest to straight ahead.
    pub fn strongest(&self) -> Option<&Sensor> {
        if !(self.total() > 0.0) {
            return None;
        }
        self.sensors.iter().fold(None, |best: Option<&Sensor>, sensor| match best {
            Some(b)
                if b.intensity > sensor.intensity
                    || (b.intensity == sensor.intensity
                        && b.angle_offset.abs() <= sensor.angle_offset.abs()) =>
            {
                Some(b)
            }
            _ => Some(sensor),
        })
    }
}
