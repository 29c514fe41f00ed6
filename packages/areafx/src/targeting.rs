//! Targeting geometry: where on screen a pass draws.
//!
//! Each step resolves to either a screen rectangle (normalised 0..1 from the
//! top-left, with a depth value for the quad), four clip-space corners, or a
//! reason to skip the pass this frame.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::camera::{CameraView, Viewport};
use crate::chain::EffectStep;
use crate::effect::TargetingMode;
use crate::scene::SceneObjects;

/// Normalised screen rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScreenRect {
    pub top_left: Vec2,
    pub size: Vec2,
    pub depth: f32,
}

impl ScreenRect {
    pub const FULLSCREEN: ScreenRect = ScreenRect {
        top_left: Vec2::ZERO,
        size: Vec2::ONE,
        depth: 0.0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The area's target sits closer than the near clip plane.
    BehindNearClip,
    /// The step needs a target object it does not have.
    MissingTarget,
}

/// Resolved region of one pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum PassRegion {
    Rect(ScreenRect),
    /// Clip-space corners in triangle-strip order.
    Quad([Vec4; 4]),
    Skip(SkipReason),
}

impl PassRegion {
    pub fn is_skip(&self) -> bool {
        matches!(self, PassRegion::Skip(_))
    }
}

/// World-space quad with its own transform.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonShape {
    pub corners: [Vec3; 4],
    pub transform: Mat4,
}

impl Default for PolygonShape {
    fn default() -> Self {
        Self {
            corners: [
                Vec3::new(-5.0, 5.0, 0.0),
                Vec3::new(-5.0, -5.0, 0.0),
                Vec3::new(5.0, 5.0, 0.0),
                Vec3::new(5.0, -5.0, 0.0),
            ],
            transform: Mat4::from_translation(Vec3::new(20.0, 15.0, 0.0)),
        }
    }
}

impl PolygonShape {
    /// Turn the quad about its local Y axis.
    pub fn spin(&mut self, radians: f32) {
        self.transform *= Mat4::from_rotation_y(radians);
    }
}

/// Tunables for region resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetingConfig {
    /// World-space size of an Area effect.
    pub area_size: Vec2,
    /// The projected view depth of an Area target is divided by this before
    /// the near-clip test and pixel-size lookup. 1.0 uses the raw depth.
    pub area_depth_divisor: f32,
    /// Half side length of a ModelPolygon square.
    pub model_half_extent: f32,
    pub polygon: PolygonShape,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            area_size: Vec2::new(10.0, 10.0),
            area_depth_divisor: 3.2,
            model_half_extent: 7.0,
            polygon: PolygonShape::default(),
        }
    }
}

/// Resolve the region `step` draws into this frame.
pub fn resolve_region(
    step: &EffectStep,
    camera: &dyn CameraView,
    viewport: Viewport,
    objects: &SceneObjects,
    config: &TargetingConfig,
) -> PassRegion {
    let target = step.target().and_then(|id| objects.position(id));
    if step.mode().needs_target() && target.is_none() {
        return PassRegion::Skip(SkipReason::MissingTarget);
    }

    match (step.mode(), target) {
        (TargetingMode::Fullscreen, _) => PassRegion::Rect(ScreenRect::FULLSCREEN),
        (TargetingMode::Area, Some(position)) => area_region(position, camera, viewport, config),
        (TargetingMode::Polygon, _) => {
            let matrix = camera.view_projection_matrix(viewport) * config.polygon.transform;
            PassRegion::Quad(project_corners(&config.polygon.corners, matrix))
        }
        (TargetingMode::ModelPolygon, Some(position)) => {
            let e = config.model_half_extent;
            let corners = [
                position + Vec3::new(-e, e, 0.0),
                position + Vec3::new(-e, -e, 0.0),
                position + Vec3::new(e, e, 0.0),
                position + Vec3::new(e, -e, 0.0),
            ];
            PassRegion::Quad(project_corners(&corners, camera.view_projection_matrix(viewport)))
        }
        (TargetingMode::Area | TargetingMode::ModelPolygon, None) => {
            PassRegion::Skip(SkipReason::MissingTarget)
        }
    }
}

fn area_region(
    position: Vec3,
    camera: &dyn CameraView,
    viewport: Viewport,
    config: &TargetingConfig,
) -> PassRegion {
    let pixel = camera.pixel_from_world(position, viewport);
    let distance = pixel.z / config.area_depth_divisor;
    let near = camera.near_clip();
    if distance < near {
        return PassRegion::Skip(SkipReason::BehindNearClip);
    }

    let screen = viewport.size();
    let pixel_size = camera.pixel_size_in_world_space(distance, viewport);
    let centre = Vec2::new(pixel.x, pixel.y) / screen;
    let size = config.area_size / pixel_size / screen;

    let far = camera.far_clip();
    let depth = far * (distance - near) / (far - near) / distance;

    PassRegion::Rect(ScreenRect {
        top_left: centre - size * 0.5,
        size,
        depth,
    })
}

fn project_corners(corners: &[Vec3; 4], matrix: Mat4) -> [Vec4; 4] {
    corners.map(|c| matrix * c.extend(1.0))
}
