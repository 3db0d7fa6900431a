use glam::{Mat4, Vec2, Vec3};

/// Input gathered by the windowing layer for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    /// Requested motion as (forward, right, up), each in -1..=1.
    pub movement: Vec3,
    /// Pointer motion in pixels since the last frame.
    pub look: Vec2,
    pub boost: bool,
}

/// Source of the view and projection matrices a scene renders with.
pub trait CameraController {
    fn view(&self) -> Mat4;
    fn projection(&self) -> Mat4;

    fn on_input(&mut self, _input: &CameraInput) {}
    fn on_update(&mut self, _dt: f32) {}
    fn on_resize(&mut self, _width: u32, _height: u32) {}

    fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Fly camera with position, yaw, pitch, and projection parameters.
///
/// Movement requested through [`FlyCamera::set_movement`] is applied on
/// every `on_update`, scaled by `speed`.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
    /// Speed multiplier applied while boosting.
    pub boost: f32,
    movement: Vec3,
    boosting: bool,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 15.0),
            yaw: -90.0_f32.to_radians(),
            pitch: -30.0_f32.to_radians(),
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            speed: 10.0,
            sensitivity: 0.003,
            boost: 3.0,
            movement: Vec3::ZERO,
            boosting: false,
        }
    }
}

impl FlyCamera {
    /// Camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let dir = (target - position).try_normalize().unwrap_or(Vec3::NEG_Z);
        Self {
            position,
            yaw: dir.z.atan2(dir.x),
            pitch: dir.y.clamp(-1.0, 1.0).asin(),
            ..Self::default()
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn set_movement(&mut self, forward: f32, right: f32, up: f32) {
        self.movement = Vec3::new(forward, right, up).clamp(Vec3::NEG_ONE, Vec3::ONE);
    }

    pub fn movement(&self) -> Vec3 {
        self.movement
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self
            .pitch
            .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }
}

impl CameraController for FlyCamera {
    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    fn on_input(&mut self, input: &CameraInput) {
        self.set_movement(input.movement.x, input.movement.y, input.movement.z);
        self.boosting = input.boost;
        if input.look != Vec2::ZERO {
            self.rotate(input.look.x, input.look.y);
        }
    }

    fn on_update(&mut self, dt: f32) {
        if self.movement == Vec3::ZERO {
            return;
        }
        let step = if self.boosting {
            self.speed * self.boost * dt
        } else {
            self.speed * dt
        };
        self.position += self.forward() * self.movement.x * step
            + self.right() * self.movement.y * step
            + Vec3::Y * self.movement.z * step;
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = FlyCamera::default();
        assert!(cam.position.y > 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn movement_applies_on_update() {
        let mut cam = FlyCamera::default();
        let start = cam.position;
        cam.on_update(1.0);
        assert_eq!(cam.position, start);

        cam.set_movement(1.0, 0.0, 0.0);
        cam.on_update(0.5);
        let expected = start + cam.forward() * cam.speed * 0.5;
        assert!(cam.position.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn input_drives_motion_and_look() {
        let mut cam = FlyCamera::default();
        let yaw = cam.yaw;
        cam.on_input(&CameraInput {
            movement: Vec3::new(0.0, 0.0, 1.0),
            look: Vec2::new(100.0, 0.0),
            boost: true,
        });
        assert!((cam.yaw - (yaw + 100.0 * cam.sensitivity)).abs() < 1e-6);

        let y = cam.position.y;
        cam.on_update(1.0);
        assert!((cam.position.y - (y + cam.speed * cam.boost)).abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.rotate(0.0, -1.0e6);
        assert!(cam.pitch <= 89.0_f32.to_radians() + 1e-6);
    }

    #[test]
    fn resize_updates_aspect() {
        let mut cam = FlyCamera::default();
        cam.on_resize(800, 400);
        assert_eq!(cam.aspect, 2.0);
        cam.on_resize(0, 400);
        assert_eq!(cam.aspect, 2.0);
    }

    #[test]
    fn looking_at_faces_target() {
        let cam = FlyCamera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(cam.forward().abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }
}
