//! Per-pass constant block shared by the post-processing shaders.
//!
//! One [`PostFxUniforms`] lives for the whole frame. Each pass writes only the
//! fields its effect consumes (plus its region), so values persist between
//! passes: the SecondBlur pass samples with the weights its Blur pass wrote.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::camera::Viewport;
use crate::chain::Chain;
use crate::effect::{EffectKind, EffectParameters};
use crate::kernel::{GaussianKernel, MAX_KERNEL_WEIGHTS};
use crate::targeting::PassRegion;

/// GPU layout of the post-processing constants (matches `PostFx` in
/// `shader_post_fx.wgsl`). Every vec4 member starts on a 16-byte boundary.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PostFxUniforms {
    /// Top-left of the affected area, 0..1 from the top-left of the screen.
    pub area_top_left: [f32; 2],
    /// Size of the affected area, 0..1.
    pub area_size: [f32; 2],
    /// Depth-buffer value the area quad is drawn at.
    pub area_depth: f32,
    /// Taps the blur shaders sample along one axis (odd).
    pub blur_samples: i32,
    pub burn_height: f32,
    pub distort_level: f32,

    /// Clip-space corners of a polygon pass.
    pub polygon_points: [[f32; 4]; 4],

    /// Tint gradient (rgb, w unused); TintHue reuses the pair.
    pub tint_colour1: [f32; 4],
    pub tint_colour2: [f32; 4],

    pub noise_scale: [f32; 2],
    pub noise_offset: [f32; 2],

    pub spiral_level: f32,
    pub heat_haze_timer: f32,
    pub hue_level: f32,
    pub water_level: f32,

    pub gamma: f32,
    pub seeing_worlds_offset: f32,
    pub seeing_worlds_time: f32,
    pub _padding: f32,

    /// Half-kernel blur weights, one per element in `x`.
    pub weights: [[f32; 4]; MAX_KERNEL_WEIGHTS],
}

impl Default for PostFxUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl PostFxUniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where the next pass draws.
    pub fn set_region(&mut self, region: &PassRegion) {
        match region {
            PassRegion::Rect(rect) => {
                self.area_top_left = rect.top_left.to_array();
                self.area_size = rect.size.to_array();
                self.area_depth = rect.depth;
            }
            PassRegion::Quad(corners) => {
                for (slot, corner) in self.polygon_points.iter_mut().zip(corners) {
                    *slot = corner.to_array();
                }
            }
            PassRegion::Skip(_) => {}
        }
    }

    /// Write the fields consumed by a pass of `kind`.
    pub fn apply_params(&mut self, kind: EffectKind, params: &EffectParameters, viewport: Viewport) {
        match *params {
            EffectParameters::Tint { top, mid } => {
                self.tint_colour1 = rgb4(top);
                self.tint_colour2 = rgb4(mid);
            }
            EffectParameters::TintHue { hue1, hue2 } => {
                self.tint_colour1 = rgb4(hue1);
                self.tint_colour2 = rgb4(hue2);
            }
            EffectParameters::GreyNoise { grain_size } => {
                let grain = grain_size.max(1.0);
                self.noise_scale = (viewport.size() / grain).to_array();
            }
            EffectParameters::Blur { radius } => self.set_blur(radius),
            EffectParameters::Sigmoid { gamma } => self.gamma = gamma,
            EffectParameters::SeeingWorlds { offset } => self.seeing_worlds_offset = offset,
            EffectParameters::Burn { .. } | EffectParameters::Underwater { .. } => {
                // speeds feed the frame timers
            }
            EffectParameters::None => {
                if kind == EffectKind::Blur {
                    log::warn!("Blur pass without a radius; keeping previous weights");
                }
            }
        }
    }

    /// Upload a freshly generated kernel for `samples` taps.
    pub fn set_blur(&mut self, samples: i32) {
        let kernel = GaussianKernel::new(samples);
        self.blur_samples = kernel.effective_samples();
        for (slot, weight) in self.weights.iter_mut().zip(
            kernel
                .weights()
                .iter()
                .copied()
                .chain(std::iter::repeat(0.0)),
        ) {
            *slot = [weight, 0.0, 0.0, 0.0];
        }
    }
}

fn rgb4(c: [f32; 3]) -> [f32; 4] {
    [c[0], c[1], c[2], 0.0]
}

/// xorshift64 generator for frame-to-frame noise.
#[derive(Clone, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        // zero is a fixed point of xorshift
        let state = if seed == 0 { 0x5DEECE66D } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in 0..=1.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / ((1u64 << 24) - 1) as f32
    }
}

impl Default for XorShift64 {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Animated inputs shared by every pass of a frame.
#[derive(Clone, Debug)]
pub struct FrameTimers {
    pub burn_height: f32,
    pub noise_offset: Vec2,
    pub hue_level: f32,
    pub water_level: f32,
    pub distort_level: f32,
    pub spiral_level: f32,
    pub heat_haze_timer: f32,
    pub seeing_worlds_time: f32,
    wiggle: f32,
    rng: XorShift64,
}

/// Radians per second of the spiral wobble.
const WIGGLE_SPEED: f32 = 1.0;

/// Distortion strength of the Distort effect.
const DISTORT_LEVEL: f32 = 0.03;

impl Default for FrameTimers {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl FrameTimers {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            burn_height: 0.0,
            noise_offset: Vec2::ZERO,
            hue_level: 0.0,
            water_level: 0.0,
            distort_level: DISTORT_LEVEL,
            spiral_level: 0.0,
            heat_haze_timer: 0.0,
            seeing_worlds_time: 0.0,
            wiggle: 0.0,
            rng: XorShift64::new(seed),
        }
    }

    /// Step every timer by `dt` seconds. Burn and water speeds come from the
    /// last Burn / Underwater pass in `chain` (1.0 when absent).
    pub fn advance(&mut self, dt: f32, chain: &Chain) {
        let mut burn_speed = 1.0;
        let mut water_speed = 1.0;
        for params in chain.parameters() {
            match *params {
                EffectParameters::Burn { speed } => burn_speed = speed,
                EffectParameters::Underwater { speed } => water_speed = speed,
                _ => {}
            }
        }

        self.noise_offset = Vec2::new(self.rng.next_f32(), self.rng.next_f32());
        self.burn_height = (self.burn_height + burn_speed * dt).rem_euclid(1.0);
        self.hue_level += dt;
        self.water_level += water_speed * dt;
        self.distort_level = DISTORT_LEVEL;
        self.spiral_level = (1.0 - self.wiggle.cos()) * 4.0;
        self.wiggle += WIGGLE_SPEED * dt;
        self.heat_haze_timer += dt;
        self.seeing_worlds_time += dt;
    }

    pub fn write_to(&self, uniforms: &mut PostFxUniforms) {
        uniforms.burn_height = self.burn_height;
        uniforms.noise_offset = self.noise_offset.to_array();
        uniforms.hue_level = self.hue_level;
        uniforms.water_level = self.water_level;
        uniforms.distort_level = self.distort_level;
        uniforms.spiral_level = self.spiral_level;
        uniforms.heat_haze_timer = self.heat_haze_timer;
        uniforms.seeing_worlds_time = self.seeing_worlds_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::TargetingMode;
    use crate::targeting::ScreenRect;

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<PostFxUniforms>(), 1392);
        assert_eq!(std::mem::offset_of!(PostFxUniforms, polygon_points), 32);
        assert_eq!(std::mem::offset_of!(PostFxUniforms, weights), 176);
    }

    #[test]
    fn test_blur_weights_are_padded_with_zeros() {
        let mut uniforms = PostFxUniforms::new();
        uniforms.set_blur(151);
        uniforms.set_blur(5);
        assert_eq!(uniforms.blur_samples, 5);
        assert!(uniforms.weights[2][0] > 0.0);
        assert_eq!(uniforms.weights[3][0], 0.0);
        assert_eq!(uniforms.weights[75][0], 0.0);
    }

    #[test]
    fn test_second_blur_keeps_previous_weights() {
        let mut uniforms = PostFxUniforms::new();
        let viewport = Viewport::default();
        uniforms.apply_params(EffectKind::Blur, &EffectParameters::Blur { radius: 9 }, viewport);
        let weights = uniforms.weights;
        uniforms.apply_params(EffectKind::SecondBlur, &EffectParameters::None, viewport);
        assert_eq!(uniforms.weights, weights);
        assert_eq!(uniforms.blur_samples, 9);
    }

    #[test]
    fn test_grey_noise_scale_follows_viewport() {
        let mut uniforms = PostFxUniforms::new();
        let params = EffectParameters::GreyNoise { grain_size: 140.0 };
        uniforms.apply_params(EffectKind::GreyNoise, &params, Viewport::new(1400, 700));
        assert_eq!(uniforms.noise_scale, [10.0, 5.0]);
    }

    #[test]
    fn test_region_write() {
        let mut uniforms = PostFxUniforms::new();
        uniforms.set_region(&PassRegion::Rect(ScreenRect::FULLSCREEN));
        assert_eq!(uniforms.area_size, [1.0, 1.0]);
        assert_eq!(uniforms.area_top_left, [0.0, 0.0]);
    }

    #[test]
    fn test_timers_follow_chain_speeds() {
        let mut chain = Chain::new();
        chain.append(EffectKind::Burn, TargetingMode::Fullscreen, None, "").unwrap();
        if let Some(EffectParameters::Burn { speed }) = chain.params_mut(0) {
            *speed = 2.0;
        }

        let mut timers = FrameTimers::default();
        timers.advance(0.3, &chain);
        assert!((timers.burn_height - 0.6).abs() < 1e-6);
        timers.advance(0.3, &chain);
        // wrapped past 1.0
        assert!((timers.burn_height - 0.2).abs() < 1e-5);
        assert!((timers.water_level - 0.6).abs() < 1e-6);
        assert!((timers.hue_level - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_spiral_starts_flat() {
        let mut timers = FrameTimers::default();
        timers.advance(0.5, &Chain::new());
        assert_eq!(timers.spiral_level, 0.0);
        timers.advance(0.5, &Chain::new());
        assert!(timers.spiral_level > 0.0);
        assert_eq!(timers.distort_level, 0.03);
    }

    #[test]
    fn test_noise_offset_is_seeded() {
        let mut a = FrameTimers::with_seed(42);
        let mut b = FrameTimers::with_seed(42);
        a.advance(0.016, &Chain::new());
        b.advance(0.016, &Chain::new());
        assert_eq!(a.noise_offset, b.noise_offset);
        assert!(a.noise_offset.x >= 0.0 && a.noise_offset.x <= 1.0);
    }

    #[test]
    fn test_xorshift_zero_seed_is_not_stuck() {
        let mut rng = XorShift64::new(0);
        assert_ne!(rng.next_u64(), 0);
    }
}
