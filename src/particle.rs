//! The CPU-side particle record.
//!
//! A [`Particle`] is a plain value owned by exactly one
//! [`ParticleEmitter`](crate::emitter::ParticleEmitter). Pools reuse particles
//! in place through [`Particle::reset`]; nothing here allocates.

use glam::Vec3;

/// A single simulated point.
///
/// | Field | Meaning |
/// |-------|---------|
/// | `position` | World-space position |
/// | `velocity` | Units per second |
/// | `acceleration` | Units per second², caller-managed, zero by default |
/// | `color` | RGB in `0.0..=1.0` |
/// | `size` | Point size, `>= 0` |
/// | `life` | Seconds remaining |
/// | `max_life` | Lifespan restored by [`reset`](Particle::reset) |
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub color: Vec3,
    pub size: f32,
    pub life: f32,
    pub max_life: f32,
}

impl Particle {
    /// Create a particle at `position` moving with `velocity`.
    ///
    /// Starts white, size 1, with one second of life.
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            ..Self::default()
        }
    }

    /// Semi-implicit Euler step.
    ///
    /// Velocity picks up `acceleration * dt`, position picks up the new
    /// velocity, and `dt` is subtracted from `life`. No bounds are enforced.
    #[inline]
    pub fn update(&mut self, dt: f32) {
        self.velocity += self.acceleration * dt;
        self.position += self.velocity * dt;
        self.life -= dt;
    }

    /// `true` once the particle has used up its lifespan.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.life <= 0.0
    }

    /// Reuse this slot for a fresh particle.
    #[inline]
    pub fn reset(&mut self, position: Vec3, velocity: Vec3) {
        self.position = position;
        self.velocity = velocity;
        self.life = self.max_life;
    }

    /// Remaining life as a fraction of `max_life`, clamped to `0.0..=1.0`.
    #[inline]
    pub fn life_fraction(&self) -> f32 {
        if self.max_life <= 0.0 {
            0.0
        } else {
            (self.life / self.max_life).clamp(0.0, 1.0)
        }
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            color: Vec3::ONE,
            size: 1.0,
            life: 1.0,
            max_life: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_is_deterministic() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::X);
        p.update(1.0);
        assert_eq!(p.position, Vec3::new(1.0, 0.0, 0.0));
        p.update(1.0);
        assert_eq!(p.position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_dies_after_lifespan() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::X);
        assert!(!p.is_dead());
        p.update(1.0);
        assert!(p.is_dead());
    }

    #[test]
    fn test_acceleration_feeds_velocity() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::ZERO);
        p.acceleration = Vec3::new(0.0, -2.0, 0.0);
        p.update(0.5);
        assert_eq!(p.velocity, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(p.position, Vec3::new(0.0, -0.5, 0.0));
    }

    #[test]
    fn test_reset_restores_life() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::X);
        p.max_life = 3.0;
        p.life = -0.25;
        p.reset(Vec3::Y, Vec3::Z);
        assert_eq!(p.position, Vec3::Y);
        assert_eq!(p.velocity, Vec3::Z);
        assert_eq!(p.life, 3.0);
        assert!(!p.is_dead());
    }

    #[test]
    fn test_life_fraction() {
        let mut p = Particle::default();
        p.max_life = 4.0;
        p.life = 1.0;
        assert_eq!(p.life_fraction(), 0.25);
        p.max_life = 0.0;
        assert_eq!(p.life_fraction(), 0.0);
    }
}
