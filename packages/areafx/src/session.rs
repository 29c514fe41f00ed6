//! Render session: the chain plus everything it needs to run a frame.
//!
//! A session owns the effect chain, the world objects steps are aimed at, the
//! camera, targeting settings and the animated frame constants. It can be
//! built from the window demo or from a JSON session description.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{Camera, Viewport};
use crate::chain::{Chain, ChainError};
use crate::compositor::{render_chain, FrameContext, FrameReport, PassBackend};
use crate::effect::{EffectKind, EffectParameters, TargetingMode};
use crate::scene::{ObjectId, SceneObject, SceneObjects};
use crate::targeting::TargetingConfig;
use crate::uniforms::FrameTimers;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown object '{0}'")]
    UnknownObject(String),

    #[error("unknown effect '{0}'")]
    UnknownEffect(String),

    #[error("unknown targeting mode '{0}'")]
    UnknownMode(String),

    #[error("parameters given for {effect} do not belong to that effect")]
    ParamsMismatch { effect: String },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("invalid session file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Degrees the Polygon quad turns about its Y axis each frame.
const POLYGON_SPIN_DEGREES: f32 = 1.0;

pub struct Session {
    pub chain: Chain,
    pub objects: SceneObjects,
    pub camera: Camera,
    pub targeting: TargetingConfig,
    pub timers: FrameTimers,
    pub viewport: Viewport,
    /// Per-frame spin of the Polygon quad, in degrees.
    pub polygon_spin: f32,
}

impl Session {
    /// Empty chain, empty scene, default camera.
    pub fn new(viewport: Viewport) -> Self {
        Self {
            chain: Chain::new(),
            objects: SceneObjects::new(),
            camera: Camera::default(),
            targeting: TargetingConfig::default(),
            timers: FrameTimers::default(),
            viewport,
            polygon_spin: POLYGON_SPIN_DEGREES,
        }
    }

    /// The window demo: five windows, each with its own effect.
    pub fn window_demo(viewport: Viewport) -> Result<Self, SessionError> {
        let mut session = Self::new(viewport);
        session.objects = SceneObjects::window_demo();

        let setup = [
            (EffectKind::BlackAndWhite, "LargeWindow"),
            (EffectKind::Inverse, "SmallWindow1"),
            (EffectKind::NightVision, "SmallWindow2"),
            (EffectKind::Scanlines, "SmallWindow3"),
            (EffectKind::SeeingWorlds, "SmallWindow4"),
        ];
        for (kind, window) in setup {
            let target = session.object_id(window)?;
            session.add_effect(kind, TargetingMode::ModelPolygon, Some(target), window)?;
        }

        log::info!(
            "Window demo ready: {} effects over {} passes",
            session.chain.group_count(),
            session.chain.len()
        );
        Ok(session)
    }

    /// Build a session from a parsed description.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let viewport = Viewport::new(config.width, config.height);
        let mut session = if config.window_demo {
            Self::window_demo(viewport)?
        } else {
            Self::new(viewport)
        };

        if let Some(camera) = &config.camera {
            session.camera = camera.to_camera();
        }
        if let Some(targeting) = &config.targeting {
            targeting.apply(&mut session.targeting);
        }
        session.timers = FrameTimers::with_seed(config.seed);
        session.polygon_spin = config.polygon_spin_degrees;

        for object in &config.objects {
            let mut scene_object = SceneObject::new(object.name.clone(), Vec3::from(object.position));
            scene_object.forces_model_polygon = object.model_polygon;
            session.objects.add(scene_object);
        }

        if let Some(steps) = &config.chain {
            session.chain.clear();
            for step in steps {
                session.add_step(step)?;
            }
        }

        log::info!(
            "Session loaded: {} objects, {} effects, {}x{}",
            session.objects.len(),
            session.chain.group_count(),
            viewport.width,
            viewport.height
        );
        Ok(session)
    }

    /// Append an effect. Non-fullscreen effects aimed at an object that
    /// insists on its model quad are switched to ModelPolygon.
    pub fn add_effect(
        &mut self,
        kind: EffectKind,
        mode: TargetingMode,
        target: Option<ObjectId>,
        label: &str,
    ) -> Result<usize, ChainError> {
        let forced = target
            .and_then(|id| self.objects.get(id))
            .is_some_and(|o| o.forces_model_polygon);
        let mode = if forced && mode != TargetingMode::Fullscreen {
            TargetingMode::ModelPolygon
        } else {
            mode
        };
        self.chain.append(kind, mode, target, label)
    }

    fn add_step(&mut self, step: &StepConfig) -> Result<usize, SessionError> {
        let kind = EffectKind::from_name(&step.effect)
            .ok_or_else(|| SessionError::UnknownEffect(step.effect.clone()))?;
        let mode = match &step.mode {
            Some(name) => TargetingMode::from_name(name)
                .ok_or_else(|| SessionError::UnknownMode(name.clone()))?,
            None => TargetingMode::Fullscreen,
        };
        let target = match &step.target {
            Some(name) => Some(self.object_id(name)?),
            None => None,
        };
        let label = step
            .label
            .clone()
            .or_else(|| step.target.clone())
            .unwrap_or_else(|| kind.name().to_string());

        if let Some(params) = &step.params {
            if !params.matches_kind(kind) {
                return Err(SessionError::ParamsMismatch {
                    effect: kind.name().to_string(),
                });
            }
        }

        let lead = self.add_effect(kind, mode, target, &label)?;

        if let Some(mut params) = step.params {
            params.clamp_to_ranges();
            if let Some(slot) = self.chain.params_mut(lead) {
                *slot = params;
            }
        }
        Ok(lead)
    }

    fn object_id(&self, name: &str) -> Result<ObjectId, SessionError> {
        self.objects
            .find(name)
            .ok_or_else(|| SessionError::UnknownObject(name.to_string()))
    }

    /// Step animation by `dt` seconds: timers, orbiting objects, polygon spin.
    pub fn advance(&mut self, dt: f32) {
        self.timers.advance(dt, &self.chain);
        self.objects.advance(dt);
        self.targeting.polygon.spin(self.polygon_spin.to_radians());
    }

    /// Run the chain for the current frame.
    pub fn render<B: PassBackend + ?Sized>(&self, backend: &mut B) -> FrameReport {
        let ctx = FrameContext {
            camera: &self.camera,
            viewport: self.viewport,
            objects: &self.objects,
            targeting: &self.targeting,
            timers: &self.timers,
        };
        render_chain(backend, &self.chain, &ctx)
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_polygon_spin() -> f32 {
    POLYGON_SPIN_DEGREES
}

/// JSON description of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Start from the window demo scene (and its chain unless `chain` is given).
    #[serde(default)]
    pub window_demo: bool,

    #[serde(default)]
    pub camera: Option<CameraConfig>,

    #[serde(default)]
    pub targeting: Option<TargetingOverrides>,

    /// Objects added after any demo objects.
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,

    /// Replaces the starting chain when present.
    #[serde(default)]
    pub chain: Option<Vec<StepConfig>>,

    /// Seed for the per-frame noise offset.
    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_polygon_spin")]
    pub polygon_spin_degrees: f32,
}

impl SessionConfig {
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    pub position: [f32; 3],

    /// Pitch, yaw, roll in degrees.
    #[serde(default)]
    pub rotation: [f32; 3],

    #[serde(default)]
    pub target: Option<[f32; 3]>,

    #[serde(default = "default_fov")]
    pub fov: f32,

    #[serde(default = "default_near")]
    pub near: f32,

    #[serde(default = "default_far")]
    pub far: f32,
}

fn default_fov() -> f32 {
    60.0
}

fn default_near() -> f32 {
    1.0
}

fn default_far() -> f32 {
    10000.0
}

impl CameraConfig {
    fn to_camera(&self) -> Camera {
        let [pitch, yaw, roll] = self.rotation;
        Camera {
            position: Vec3::from(self.position),
            rotation: Vec3::new(pitch.to_radians(), yaw.to_radians(), roll.to_radians()),
            target: self.target.map(Vec3::from),
            up: Vec3::Y,
            fov: self.fov,
            near: self.near,
            far: self.far,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingOverrides {
    #[serde(default)]
    pub area_size: Option<[f32; 2]>,
    #[serde(default)]
    pub area_depth_divisor: Option<f32>,
    #[serde(default)]
    pub model_half_extent: Option<f32>,
}

impl TargetingOverrides {
    fn apply(&self, config: &mut TargetingConfig) {
        if let Some(size) = self.area_size {
            config.area_size = Vec2::from(size);
        }
        if let Some(divisor) = self.area_depth_divisor {
            config.area_depth_divisor = divisor;
        }
        if let Some(extent) = self.model_half_extent {
            config.model_half_extent = extent;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectConfig {
    pub name: String,
    pub position: [f32; 3],
    #[serde(default)]
    pub model_polygon: bool,
}

/// One user-facing effect in a session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub effect: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Object name.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Overrides the lead pass's defaults.
    #[serde(default)]
    pub params: Option<EffectParameters>,
}
