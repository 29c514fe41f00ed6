//! Ping-pong compositor.
//!
//! Runs a chain pass by pass between two same-sized colour targets. The pass
//! counter decides direction: even passes read A and write B, odd passes read
//! B and write A. A holds the freshly rendered scene, so the first pass always
//! reads the scene. Whatever was written last is presented.
//!
//! Drawing is delegated to a [`PassBackend`]; the compositor itself touches
//! no GPU state, which keeps frame plans inspectable and testable.

use serde::Serialize;

use crate::camera::{CameraView, Viewport};
use crate::chain::Chain;
use crate::effect::{AuxTexture, EffectKind, EffectParameters, TargetingMode};
use crate::scene::SceneObjects;
use crate::targeting::{resolve_region, PassRegion, ScreenRect, SkipReason, TargetingConfig};
use crate::uniforms::{FrameTimers, PostFxUniforms};

/// One of the two intermediate colour targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BufferId {
    /// Scene target.
    A,
    B,
}

/// Source/destination selection from the executed-pass count.
#[derive(Clone, Copy, Debug, Default)]
pub struct PingPong {
    counter: u32,
}

impl PingPong {
    pub fn source(&self) -> BufferId {
        if self.counter % 2 == 0 {
            BufferId::A
        } else {
            BufferId::B
        }
    }

    pub fn destination(&self) -> BufferId {
        match self.source() {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    pub fn advance(&mut self) {
        self.counter += 1;
    }

    pub fn count(&self) -> u32 {
        self.counter
    }

    /// The buffer holding the finished image.
    pub fn last_written(&self) -> BufferId {
        // after an even number of passes the image is back in A
        self.source()
    }
}

/// Shape of one draw.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Geometry {
    Rect(ScreenRect),
    Quad([glam::Vec4; 4]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Blend {
    Replace,
    Alpha,
}

/// Everything a backend needs to issue one quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub kind: EffectKind,
    pub source: BufferId,
    pub destination: BufferId,
    pub geometry: Geometry,
    pub blend: Blend,
    /// Bind the merge target as the second input.
    pub merge_input: bool,
}

/// The render-target and shader-selection services the compositor drives.
pub trait PassBackend {
    /// Clear intermediate targets for a new frame.
    fn begin_frame(&mut self);

    /// Select the program and auxiliary textures for the next draws.
    fn bind_effect(&mut self, kind: EffectKind, params: &EffectParameters);

    fn draw(&mut self, call: &DrawCall, uniforms: &PostFxUniforms);

    /// Show `buffer` as the frame's output.
    fn present(&mut self, buffer: BufferId);
}

/// Read-only inputs of one frame.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub camera: &'a dyn CameraView,
    pub viewport: Viewport,
    pub objects: &'a SceneObjects,
    pub targeting: &'a TargetingConfig,
    pub timers: &'a FrameTimers,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutedPass {
    pub index: usize,
    pub kind: EffectKind,
    pub label: String,
    pub source: BufferId,
    pub destination: BufferId,
    pub region: PassRegion,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedPass {
    pub index: usize,
    pub kind: EffectKind,
    pub reason: SkipReason,
}

/// What a frame did, in execution order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub passes: Vec<ExecutedPass>,
    pub skipped: Vec<SkippedPass>,
    pub presented: BufferId,
}

/// Run every pass of `chain` through `backend` and present the result.
pub fn render_chain<B: PassBackend + ?Sized>(
    backend: &mut B,
    chain: &Chain,
    ctx: &FrameContext<'_>,
) -> FrameReport {
    backend.begin_frame();

    let mut uniforms = PostFxUniforms::new();
    ctx.timers.write_to(&mut uniforms);

    let mut ping_pong = PingPong::default();
    let mut passes = Vec::new();
    let mut skipped = Vec::new();

    for (index, (step, params)) in chain.passes().enumerate() {
        let kind = step.kind();
        if kind.fragment_entry().is_none() {
            continue;
        }

        let region = resolve_region(step, ctx.camera, ctx.viewport, ctx.objects, ctx.targeting);
        let geometry = match region {
            PassRegion::Rect(rect) => Geometry::Rect(rect),
            PassRegion::Quad(corners) => Geometry::Quad(corners),
            PassRegion::Skip(reason) => {
                if reason == SkipReason::MissingTarget {
                    log::warn!("Pass {} ({}) has no target object; skipped", index, kind.name());
                }
                skipped.push(SkippedPass { index, kind, reason });
                continue;
            }
        };

        let source = ping_pong.source();
        let destination = ping_pong.destination();

        uniforms.set_region(&region);
        uniforms.apply_params(kind, params, ctx.viewport);

        let blend = match step.mode() {
            TargetingMode::Fullscreen => Blend::Replace,
            TargetingMode::Area => Blend::Alpha,
            TargetingMode::Polygon | TargetingMode::ModelPolygon => Blend::Replace,
        };

        if step.mode() != TargetingMode::Fullscreen {
            // carry the untouched surroundings over before drawing the region
            let mut underlay = uniforms;
            underlay.set_region(&PassRegion::Rect(ScreenRect::FULLSCREEN));
            backend.bind_effect(EffectKind::Copy, &EffectParameters::None);
            backend.draw(
                &DrawCall {
                    kind: EffectKind::Copy,
                    source,
                    destination,
                    geometry: Geometry::Rect(ScreenRect::FULLSCREEN),
                    blend: Blend::Replace,
                    merge_input: false,
                },
                &underlay,
            );
        }

        backend.bind_effect(kind, params);
        backend.draw(
            &DrawCall {
                kind,
                source,
                destination,
                geometry,
                blend,
                merge_input: kind.auxiliary_texture() == Some(AuxTexture::Merge),
            },
            &uniforms,
        );

        passes.push(ExecutedPass {
            index,
            kind,
            label: step.label().to_string(),
            source,
            destination,
            region,
        });
        ping_pong.advance();
    }

    let presented = ping_pong.last_written();
    backend.present(presented);

    log::debug!(
        "Frame: {} passes drawn, {} skipped, presenting {:?}",
        passes.len(),
        skipped.len(),
        presented
    );

    FrameReport {
        passes,
        skipped,
        presented,
    }
}

/// Backend event captured by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    BeginFrame,
    Bind(EffectKind),
    Draw(DrawCall),
    Present(BufferId),
}

/// Backend that only records what it was asked to do.
#[derive(Clone, Debug, Default)]
pub struct RecordingBackend {
    pub events: Vec<BackendEvent>,
    /// Uniform block as seen by each draw.
    pub uniforms: Vec<PostFxUniforms>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.events.iter().filter_map(|e| match e {
            BackendEvent::Draw(call) => Some(call),
            _ => None,
        })
    }
}

impl PassBackend for RecordingBackend {
    fn begin_frame(&mut self) {
        self.events.push(BackendEvent::BeginFrame);
    }

    fn bind_effect(&mut self, kind: EffectKind, _params: &EffectParameters) {
        self.events.push(BackendEvent::Bind(kind));
    }

    fn draw(&mut self, call: &DrawCall, uniforms: &PostFxUniforms) {
        self.events.push(BackendEvent::Draw(*call));
        self.uniforms.push(*uniforms);
    }

    fn present(&mut self, buffer: BufferId) {
        self.events.push(BackendEvent::Present(buffer));
    }
}
