//! Scene camera.
//!
//! The chain engine needs only a narrow view of the camera: clip planes, the
//! combined view-projection matrix, and two picking helpers for projecting
//! world points to pixels. Those live on the [`CameraView`] trait so the
//! targeting code can be driven by any camera implementation.
//!
//! The concrete [`Camera`] supports two orientation modes:
//! - **Euler mode**: position + rotation (pitch, yaw, roll)
//! - **LookAt mode**: position + target (orientation derived)
//!
//! Mode is determined automatically: if `target` is set, LookAt is used.

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};
use serde::{Deserialize, Serialize};

/// Output size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// Size as floats, for normalising pixel coordinates.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// What the post-processing chain asks of a camera.
pub trait CameraView {
    fn near_clip(&self) -> f32;

    fn far_clip(&self) -> f32;

    fn view_projection_matrix(&self, viewport: Viewport) -> Mat4;

    /// Project a world point to pixel coordinates (origin top-left, y down).
    /// The z component carries the point's distance in front of the camera
    /// along the view axis; it is negative for points behind the camera.
    fn pixel_from_world(&self, point: Vec3, viewport: Viewport) -> Vec3;

    /// World-space extent covered by one pixel at `distance` from the camera.
    fn pixel_size_in_world_space(&self, distance: f32, viewport: Viewport) -> Vec2;
}

/// Perspective camera.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,

    /// Rotation in radians (pitch, yaw, roll). Used when `target` is None.
    /// Positive pitch looks down; zero yaw looks along +Z.
    pub rotation: Vec3,

    /// Look-at target. Enables LookAt mode when set.
    pub target: Option<Vec3>,

    pub up: Vec3,

    /// Vertical field of view in degrees.
    pub fov: f32,

    pub near: f32,

    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(25.0, 18.0, -45.0),
            rotation: Vec3::new(10f32.to_radians(), 7f32.to_radians(), 0.0),
            target: None,
            up: Vec3::Y,
            fov: 60.0,
            near: 1.0,
            far: 10000.0,
        }
    }
}

impl Camera {
    pub fn is_look_at(&self) -> bool {
        self.target.is_some()
    }

    /// Direction the camera looks along.
    pub fn forward(&self) -> Vec3 {
        match self.target {
            Some(target) => (target - self.position).normalize_or_zero(),
            None => {
                let pitch = self.rotation.x;
                let yaw = self.rotation.y;
                Vec3::new(yaw.sin() * pitch.cos(), -pitch.sin(), yaw.cos() * pitch.cos())
            }
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        match self.target {
            Some(target) => Mat4::look_at_rh(self.position, target, self.up),
            None => {
                let look = Mat4::look_to_rh(self.position, self.forward(), self.up);
                // roll spins the image around the view axis
                Mat4::from_rotation_z(-self.rotation.z) * look
            }
        }
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect, self.near, self.far)
    }
}

impl CameraView for Camera {
    fn near_clip(&self) -> f32 {
        self.near
    }

    fn far_clip(&self) -> f32 {
        self.far
    }

    fn view_projection_matrix(&self, viewport: Viewport) -> Mat4 {
        self.projection_matrix(viewport.aspect()) * self.view_matrix()
    }

    fn pixel_from_world(&self, point: Vec3, viewport: Viewport) -> Vec3 {
        let depth = -self.view_matrix().transform_point3(point).z;
        let clip = self.view_projection_matrix(viewport) * point.extend(1.0);
        if clip.w.abs() <= f32::EPSILON {
            return Vec3::new(0.0, 0.0, depth);
        }
        let ndc = clip.xy() / clip.w;
        let size = viewport.size();
        Vec3::new(
            (ndc.x + 1.0) * 0.5 * size.x,
            (1.0 - ndc.y) * 0.5 * size.y,
            depth,
        )
    }

    fn pixel_size_in_world_space(&self, distance: f32, viewport: Viewport) -> Vec2 {
        let world_height = 2.0 * distance * (self.fov.to_radians() * 0.5).tan();
        let world_width = world_height * viewport.aspect();
        Vec2::new(world_width, world_height) / viewport.size()
    }
}
