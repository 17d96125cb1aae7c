//! The shared scene camera.
//!
//! One [`Camera`] is owned by the controller and lent to whichever scene is
//! current. It is put back into its [default pose](Camera::reset) before every
//! activation, so scenes never inherit each other's framing.

use glam::{Mat4, Vec3};

/// Position of the camera after [`Camera::reset`].
pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.0, 30.0);

/// Perspective camera looking from `position` towards `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: DEFAULT_POSITION,
            target: Vec3::ZERO,
            fov_y: 75.0,
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Return to the default pose. Projection settings are kept.
    pub fn reset(&mut self) {
        self.position = DEFAULT_POSITION;
        self.target = Vec3::ZERO;
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Place the camera on a horizontal circle around `target`.
    ///
    /// `angle` is measured in radians from the +Z axis towards +X.
    pub fn orbit(&mut self, angle: f32, radius: f32, height: f32) {
        self.position = self.target + Vec3::new(angle.sin() * radius, height, angle.cos() * radius);
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Distance from the camera to its target.
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_restores_default_pose() {
        let mut camera = Camera::new(1.0);
        camera.look_at(Vec3::ONE);
        camera.orbit(1.2, 150.0, 20.0);
        camera.reset();
        assert_eq!(camera.position, DEFAULT_POSITION);
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.aspect, 1.0);
    }

    #[test]
    fn test_orbit_radius() {
        let mut camera = Camera::default();
        camera.orbit(0.7, 150.0, 0.0);
        assert!((camera.distance() - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_target_projects_to_center() {
        let camera = Camera::default();
        let clip = camera.view_projection() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }

    #[test]
    fn test_zero_height_keeps_aspect() {
        let mut camera = Camera::new(2.0);
        camera.set_aspect(800, 0);
        assert_eq!(camera.aspect, 2.0);
        camera.set_aspect(800, 400);
        assert_eq!(camera.aspect, 2.0);
    }
}
