//! Effect catalog.
//!
//! Identifiers for every post-process the chain can run, their grouping into
//! multi-pass effects, and the tunable parameters each one carries.

use serde::{Deserialize, Serialize};

use crate::kernel;

/// Identifier of a single post-processing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    #[default]
    None,
    Copy,
    Tint,
    TintHue,
    GreyNoise,
    Burn,
    Distort,
    Spiral,
    Blur,
    SecondBlur,
    Underwater,
    HeatHaze,
    NightVision,
    Pixelation,
    Scanlines,
    Inverse,
    BlackAndWhite,
    SeeingWorlds,
    SecondSeeingWorlds,
    Bloom,
    Merge,
    Sigmoid,
}

impl EffectKind {
    pub const ALL: [EffectKind; 22] = [
        EffectKind::None,
        EffectKind::Copy,
        EffectKind::Tint,
        EffectKind::TintHue,
        EffectKind::GreyNoise,
        EffectKind::Burn,
        EffectKind::Distort,
        EffectKind::Spiral,
        EffectKind::Blur,
        EffectKind::SecondBlur,
        EffectKind::Underwater,
        EffectKind::HeatHaze,
        EffectKind::NightVision,
        EffectKind::Pixelation,
        EffectKind::Scanlines,
        EffectKind::Inverse,
        EffectKind::BlackAndWhite,
        EffectKind::SeeingWorlds,
        EffectKind::SecondSeeingWorlds,
        EffectKind::Bloom,
        EffectKind::Merge,
        EffectKind::Sigmoid,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::None => "None",
            EffectKind::Copy => "Copy",
            EffectKind::Tint => "Tint",
            EffectKind::TintHue => "TintHue",
            EffectKind::GreyNoise => "GreyNoise",
            EffectKind::Burn => "Burn",
            EffectKind::Distort => "Distort",
            EffectKind::Spiral => "Spiral",
            EffectKind::Blur => "Blur",
            EffectKind::SecondBlur => "SecondBlur",
            EffectKind::Underwater => "Underwater",
            EffectKind::HeatHaze => "HeatHaze",
            EffectKind::NightVision => "NightVision",
            EffectKind::Pixelation => "Pixelation",
            EffectKind::Scanlines => "Scanlines",
            EffectKind::Inverse => "Inverse",
            EffectKind::BlackAndWhite => "BlackAndWhite",
            EffectKind::SeeingWorlds => "SeeingWorlds",
            EffectKind::SecondSeeingWorlds => "SecondSeeingWorlds",
            EffectKind::Bloom => "Bloom",
            EffectKind::Merge => "Merge",
            EffectKind::Sigmoid => "Sigmoid",
        }
    }

    /// Parse a display name. Case, `_`, `-` and spaces are ignored and `&`
    /// reads as "and", so "black&white" finds BlackAndWhite.
    pub fn from_name(s: &str) -> Option<Self> {
        let wanted: String = s
            .replace('&', "and")
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().to_lowercase() == wanted)
    }

    /// Kinds that only exist as non-lead members of a multi-pass group.
    pub fn is_continuation(self) -> bool {
        matches!(
            self,
            EffectKind::SecondBlur | EffectKind::SecondSeeingWorlds | EffectKind::Merge
        )
    }

    /// Whether a user action may append this kind to a chain.
    pub fn is_insertable(self) -> bool {
        self != EffectKind::None && !self.is_continuation()
    }

    /// Number of consecutive passes one user-facing instance of this kind
    /// occupies in a chain.
    pub fn group_size(self) -> usize {
        self.group_kinds().len()
    }

    /// The passes one instance of this kind expands to, lead first.
    pub fn group_kinds(self) -> &'static [EffectKind] {
        match self {
            EffectKind::Blur => &[EffectKind::Blur, EffectKind::SecondBlur],
            EffectKind::SeeingWorlds => &[EffectKind::SeeingWorlds, EffectKind::SecondSeeingWorlds],
            EffectKind::Bloom => &[
                EffectKind::Bloom,
                EffectKind::Blur,
                EffectKind::SecondBlur,
                EffectKind::Merge,
            ],
            EffectKind::None => &[EffectKind::None],
            EffectKind::Copy => &[EffectKind::Copy],
            EffectKind::Tint => &[EffectKind::Tint],
            EffectKind::TintHue => &[EffectKind::TintHue],
            EffectKind::GreyNoise => &[EffectKind::GreyNoise],
            EffectKind::Burn => &[EffectKind::Burn],
            EffectKind::Distort => &[EffectKind::Distort],
            EffectKind::Spiral => &[EffectKind::Spiral],
            EffectKind::SecondBlur => &[EffectKind::SecondBlur],
            EffectKind::Underwater => &[EffectKind::Underwater],
            EffectKind::HeatHaze => &[EffectKind::HeatHaze],
            EffectKind::NightVision => &[EffectKind::NightVision],
            EffectKind::Pixelation => &[EffectKind::Pixelation],
            EffectKind::Scanlines => &[EffectKind::Scanlines],
            EffectKind::Inverse => &[EffectKind::Inverse],
            EffectKind::BlackAndWhite => &[EffectKind::BlackAndWhite],
            EffectKind::SecondSeeingWorlds => &[EffectKind::SecondSeeingWorlds],
            EffectKind::Merge => &[EffectKind::Merge],
            EffectKind::Sigmoid => &[EffectKind::Sigmoid],
        }
    }

    /// Extra texture the shader for this pass samples besides its source.
    pub fn auxiliary_texture(self) -> Option<AuxTexture> {
        match self {
            EffectKind::GreyNoise => Some(AuxTexture::Noise),
            EffectKind::Burn => Some(AuxTexture::BurnHeight),
            EffectKind::Distort => Some(AuxTexture::Distortion),
            EffectKind::Merge => Some(AuxTexture::Merge),
            _ => None,
        }
    }

    /// Fragment entry point in the post-processing shader, if the kind draws.
    pub fn fragment_entry(self) -> Option<&'static str> {
        let entry = match self {
            EffectKind::None => return None,
            EffectKind::Copy => "fs_copy",
            EffectKind::Tint => "fs_tint",
            EffectKind::TintHue => "fs_tint_hue",
            EffectKind::GreyNoise => "fs_grey_noise",
            EffectKind::Burn => "fs_burn",
            EffectKind::Distort => "fs_distort",
            EffectKind::Spiral => "fs_spiral",
            EffectKind::Blur => "fs_blur",
            EffectKind::SecondBlur => "fs_second_blur",
            EffectKind::Underwater => "fs_underwater",
            EffectKind::HeatHaze => "fs_heat_haze",
            EffectKind::NightVision => "fs_night_vision",
            EffectKind::Pixelation => "fs_pixelation",
            EffectKind::Scanlines => "fs_scanlines",
            EffectKind::Inverse => "fs_inverse",
            EffectKind::BlackAndWhite => "fs_black_and_white",
            EffectKind::SeeingWorlds => "fs_seeing_worlds",
            EffectKind::SecondSeeingWorlds => "fs_second_seeing_worlds",
            EffectKind::Bloom => "fs_bloom",
            EffectKind::Merge => "fs_merge",
            EffectKind::Sigmoid => "fs_sigmoid",
        };
        Some(entry)
    }
}

/// Textures bound in the auxiliary slot for specific effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuxTexture {
    Noise,
    BurnHeight,
    Distortion,
    /// The separately rendered scene copy a Merge pass blends back in.
    Merge,
}

/// Spatial scope of a pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetingMode {
    #[default]
    Fullscreen,
    /// Rectangle around a target object's world position.
    Area,
    /// Explicit world-space quad with its own transform.
    Polygon,
    /// Camera-facing square tracking a target object.
    ModelPolygon,
}

impl TargetingMode {
    pub fn name(self) -> &'static str {
        match self {
            TargetingMode::Fullscreen => "FullScreen",
            TargetingMode::Area => "Area",
            TargetingMode::Polygon => "Polygon",
            TargetingMode::ModelPolygon => "ModelPolygon",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fullscreen" | "full_screen" => Some(TargetingMode::Fullscreen),
            "area" => Some(TargetingMode::Area),
            "polygon" => Some(TargetingMode::Polygon),
            "modelpolygon" | "model_polygon" => Some(TargetingMode::ModelPolygon),
            _ => None,
        }
    }

    /// Whether resolving this mode needs a referenced world object.
    pub fn needs_target(self) -> bool {
        matches!(self, TargetingMode::Area | TargetingMode::ModelPolygon)
    }
}

/// RGB colour triple in 0..1.
pub type Rgb = [f32; 3];

/// Tunable values of one pass, keyed by effect kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectParameters {
    /// Effects without tunables.
    #[default]
    None,
    Tint { top: Rgb, mid: Rgb },
    TintHue { hue1: Rgb, hue2: Rgb },
    GreyNoise { grain_size: f32 },
    Burn { speed: f32 },
    /// Sample count of the separable blur.
    Blur { radius: i32 },
    Sigmoid { gamma: f32 },
    Underwater { speed: f32 },
    SeeingWorlds { offset: f32 },
}

/// Default blur sample count for a standalone Blur.
pub const DEFAULT_BLUR_RADIUS: i32 = 5;

/// Default blur sample count for the blur inside a Bloom group.
pub const DEFAULT_BLOOM_BLUR_RADIUS: i32 = 30;

/// Default parameters for a newly inserted pass of `kind`.
pub fn create_default(kind: EffectKind) -> EffectParameters {
    match kind {
        EffectKind::Tint => EffectParameters::Tint {
            top: [0.3, 0.8, 0.0],
            mid: [0.1, 0.5, 1.0],
        },
        EffectKind::TintHue => EffectParameters::TintHue {
            hue1: [0.3, 0.8, 0.0],
            hue2: [0.1, 0.5, 1.0],
        },
        EffectKind::GreyNoise => EffectParameters::GreyNoise { grain_size: 140.0 },
        EffectKind::Burn => EffectParameters::Burn { speed: 1.0 },
        EffectKind::Blur => EffectParameters::Blur {
            radius: kernel::settle_samples(DEFAULT_BLUR_RADIUS),
        },
        EffectKind::Sigmoid => EffectParameters::Sigmoid { gamma: 0.25 },
        EffectKind::Underwater => EffectParameters::Underwater { speed: 1.0 },
        EffectKind::SeeingWorlds | EffectKind::SecondSeeingWorlds => {
            EffectParameters::SeeingWorlds { offset: 0.05 }
        }
        _ => EffectParameters::None,
    }
}

/// Passes and default parameters one instance of `kind` expands to.
pub fn group_defaults(kind: EffectKind) -> Vec<(EffectKind, EffectParameters)> {
    kind.group_kinds()
        .iter()
        .map(|&member| {
            let params = if kind == EffectKind::Bloom && member == EffectKind::Blur {
                EffectParameters::Blur {
                    radius: kernel::settle_samples(DEFAULT_BLOOM_BLUR_RADIUS),
                }
            } else {
                create_default(member)
            };
            (member, params)
        })
        .collect()
}

/// Runtime value of one parameter field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectParamValue {
    Float(f32),
    Int(i32),
    Color(Rgb),
}

/// Shape of a parameter field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectParamType {
    Float,
    Int,
    Color,
}

/// Declared name and range of one parameter field, for building editors.
#[derive(Clone, Copy, Debug)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub param_type: EffectParamType,
    pub min: f32,
    pub max: f32,
}

impl ParamDescriptor {
    const fn float(name: &'static str, display_name: &'static str, min: f32, max: f32) -> Self {
        Self { name, display_name, param_type: EffectParamType::Float, min, max }
    }

    const fn int(name: &'static str, display_name: &'static str, min: f32, max: f32) -> Self {
        Self { name, display_name, param_type: EffectParamType::Int, min, max }
    }

    const fn color(name: &'static str, display_name: &'static str) -> Self {
        Self { name, display_name, param_type: EffectParamType::Color, min: 0.0, max: 1.0 }
    }
}

const TINT_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::color("top", "Tint Editor - Gradient 1"),
    ParamDescriptor::color("mid", "Tint Editor - Gradient 2"),
];
const TINT_HUE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::color("hue1", "Hue 1"),
    ParamDescriptor::color("hue2", "Hue 2"),
];
const GREY_NOISE_PARAMS: &[ParamDescriptor] =
    &[ParamDescriptor::float("grain_size", "GrainSize", 0.0, 380.0)];
const BURN_PARAMS: &[ParamDescriptor] = &[ParamDescriptor::float("speed", "BurnSpeed", 0.0, 2.0)];
const BLUR_PARAMS: &[ParamDescriptor] =
    &[ParamDescriptor::int("radius", "BlurStrength", 1.0, kernel::MAX_BLUR_SAMPLES as f32)];
const SIGMOID_PARAMS: &[ParamDescriptor] = &[ParamDescriptor::float("gamma", "Gamma", 0.01, 0.4)];
const UNDERWATER_PARAMS: &[ParamDescriptor] =
    &[ParamDescriptor::float("speed", "WaterSpeed", 0.0, 2.0)];
const SEEING_WORLDS_PARAMS: &[ParamDescriptor] =
    &[ParamDescriptor::float("offset", "Offset", 0.01, 0.09)];

/// Editable fields for the lead pass of `kind`.
pub fn param_descriptors(kind: EffectKind) -> &'static [ParamDescriptor] {
    match kind {
        EffectKind::Tint => TINT_PARAMS,
        EffectKind::TintHue => TINT_HUE_PARAMS,
        EffectKind::GreyNoise => GREY_NOISE_PARAMS,
        EffectKind::Burn => BURN_PARAMS,
        EffectKind::Blur => BLUR_PARAMS,
        EffectKind::Sigmoid => SIGMOID_PARAMS,
        EffectKind::Underwater => UNDERWATER_PARAMS,
        EffectKind::SeeingWorlds => SEEING_WORLDS_PARAMS,
        _ => &[],
    }
}

fn clamp_rgb(c: &mut Rgb) {
    for v in c.iter_mut() {
        *v = v.clamp(0.0, 1.0);
    }
}

impl EffectParameters {
    /// Whether this payload is the one `kind` stores.
    pub fn matches_kind(&self, kind: EffectKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&create_default(kind))
    }

    pub fn blur_radius(&self) -> Option<i32> {
        match self {
            EffectParameters::Blur { radius } => Some(*radius),
            _ => None,
        }
    }

    /// Store a new blur sample count, clamped to the weight table and
    /// settled on an odd value. Returns false for non-blur payloads.
    pub fn set_blur_radius(&mut self, value: i32) -> bool {
        match self {
            EffectParameters::Blur { radius } => {
                *radius = kernel::settle_samples(value);
                true
            }
            _ => false,
        }
    }

    /// Read a field by name.
    pub fn get_param(&self, name: &str) -> Option<EffectParamValue> {
        use EffectParamValue::*;
        match (self, name) {
            (EffectParameters::Tint { top, .. }, "top") => Some(Color(*top)),
            (EffectParameters::Tint { mid, .. }, "mid") => Some(Color(*mid)),
            (EffectParameters::TintHue { hue1, .. }, "hue1") => Some(Color(*hue1)),
            (EffectParameters::TintHue { hue2, .. }, "hue2") => Some(Color(*hue2)),
            (EffectParameters::GreyNoise { grain_size }, "grain_size") => Some(Float(*grain_size)),
            (EffectParameters::Burn { speed }, "speed") => Some(Float(*speed)),
            (EffectParameters::Blur { radius }, "radius") => Some(Int(*radius)),
            (EffectParameters::Sigmoid { gamma }, "gamma") => Some(Float(*gamma)),
            (EffectParameters::Underwater { speed }, "speed") => Some(Float(*speed)),
            (EffectParameters::SeeingWorlds { offset }, "offset") => Some(Float(*offset)),
            _ => None,
        }
    }

    /// Write a field by name. Returns false if the field does not exist or
    /// the value has the wrong shape. Ranges are the caller's business,
    /// except for the blur sample count which must fit the weight table.
    pub fn set_param(&mut self, name: &str, value: EffectParamValue) -> bool {
        use EffectParamValue::*;
        match (self, name, value) {
            (EffectParameters::Tint { top, .. }, "top", Color(c)) => *top = c,
            (EffectParameters::Tint { mid, .. }, "mid", Color(c)) => *mid = c,
            (EffectParameters::TintHue { hue1, .. }, "hue1", Color(c)) => *hue1 = c,
            (EffectParameters::TintHue { hue2, .. }, "hue2", Color(c)) => *hue2 = c,
            (EffectParameters::GreyNoise { grain_size }, "grain_size", Float(v)) => *grain_size = v,
            (EffectParameters::Burn { speed }, "speed", Float(v)) => *speed = v,
            (EffectParameters::Blur { radius }, "radius", Int(v)) => {
                *radius = kernel::settle_samples(v)
            }
            (EffectParameters::Sigmoid { gamma }, "gamma", Float(v)) => *gamma = v,
            (EffectParameters::Underwater { speed }, "speed", Float(v)) => *speed = v,
            (EffectParameters::SeeingWorlds { offset }, "offset", Float(v)) => *offset = v,
            _ => return false,
        }
        true
    }

    /// Clamp every field to its declared range.
    pub fn clamp_to_ranges(&mut self) {
        match self {
            EffectParameters::None => {}
            EffectParameters::Tint { top, mid } => {
                clamp_rgb(top);
                clamp_rgb(mid);
            }
            EffectParameters::TintHue { hue1, hue2 } => {
                clamp_rgb(hue1);
                clamp_rgb(hue2);
            }
            EffectParameters::GreyNoise { grain_size } => *grain_size = grain_size.clamp(0.0, 380.0),
            EffectParameters::Burn { speed } => *speed = speed.clamp(0.0, 2.0),
            EffectParameters::Blur { radius } => *radius = kernel::settle_samples(*radius),
            EffectParameters::Sigmoid { gamma } => *gamma = gamma.clamp(0.01, 0.4),
            EffectParameters::Underwater { speed } => *speed = speed.clamp(0.0, 2.0),
            EffectParameters::SeeingWorlds { offset } => *offset = offset.clamp(0.01, 0.09),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_sizes() {
        assert_eq!(EffectKind::Blur.group_size(), 2);
        assert_eq!(EffectKind::SeeingWorlds.group_size(), 2);
        assert_eq!(EffectKind::Bloom.group_size(), 4);
        assert_eq!(EffectKind::Tint.group_size(), 1);
        assert_eq!(
            EffectKind::Bloom.group_kinds(),
            &[EffectKind::Bloom, EffectKind::Blur, EffectKind::SecondBlur, EffectKind::Merge]
        );
    }

    #[test]
    fn test_continuations_are_not_insertable() {
        for kind in [EffectKind::SecondBlur, EffectKind::SecondSeeingWorlds, EffectKind::Merge] {
            assert!(kind.is_continuation());
            assert!(!kind.is_insertable());
        }
        assert!(!EffectKind::None.is_insertable());
        assert!(EffectKind::Bloom.is_insertable());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(create_default(EffectKind::Blur), EffectParameters::Blur { radius: 5 });
        assert_eq!(create_default(EffectKind::Sigmoid), EffectParameters::Sigmoid { gamma: 0.25 });
        assert_eq!(create_default(EffectKind::Burn), EffectParameters::Burn { speed: 1.0 });
        assert_eq!(
            create_default(EffectKind::GreyNoise),
            EffectParameters::GreyNoise { grain_size: 140.0 }
        );
        assert_eq!(create_default(EffectKind::Inverse), EffectParameters::None);
    }

    #[test]
    fn test_bloom_blur_uses_wider_radius() {
        let group = group_defaults(EffectKind::Bloom);
        assert_eq!(group.len(), 4);
        // 30 settles to 29 taps
        assert_eq!(group[1], (EffectKind::Blur, EffectParameters::Blur { radius: 29 }));
        assert_eq!(group[3], (EffectKind::Merge, EffectParameters::None));
    }

    #[test]
    fn test_names_parse_back() {
        for kind in EffectKind::ALL {
            assert_eq!(EffectKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EffectKind::from_name("black&white"), Some(EffectKind::BlackAndWhite));
        assert_eq!(EffectKind::from_name("grey_noise"), Some(EffectKind::GreyNoise));
        assert_eq!(EffectKind::from_name("sparkle"), None);
        assert_eq!(TargetingMode::from_name("FullScreen"), Some(TargetingMode::Fullscreen));
    }

    #[test]
    fn test_set_param_checks_field_and_shape() {
        let mut params = create_default(EffectKind::Sigmoid);
        assert!(params.set_param("gamma", EffectParamValue::Float(0.3)));
        assert_eq!(params.get_param("gamma"), Some(EffectParamValue::Float(0.3)));
        assert!(!params.set_param("gamma", EffectParamValue::Int(1)));
        assert!(!params.set_param("speed", EffectParamValue::Float(1.0)));
    }

    #[test]
    fn test_blur_radius_is_clamped_on_acceptance() {
        let mut params = create_default(EffectKind::Blur);
        assert!(params.set_blur_radius(500));
        assert_eq!(params.blur_radius(), Some(kernel::MAX_BLUR_SAMPLES));
        assert!(params.set_param("radius", EffectParamValue::Int(8)));
        assert_eq!(params.blur_radius(), Some(7));
        assert!(!EffectParameters::None.set_blur_radius(3));
    }

    #[test]
    fn test_clamp_to_ranges() {
        let mut params = EffectParameters::Tint { top: [2.0, -1.0, 0.5], mid: [0.0; 3] };
        params.clamp_to_ranges();
        assert_eq!(params, EffectParameters::Tint { top: [1.0, 0.0, 0.5], mid: [0.0; 3] });

        let mut gamma = EffectParameters::Sigmoid { gamma: 9.0 };
        gamma.clamp_to_ranges();
        assert_eq!(gamma, EffectParameters::Sigmoid { gamma: 0.4 });
    }

    #[test]
    fn test_descriptors_cover_editable_kinds() {
        assert_eq!(param_descriptors(EffectKind::Blur)[0].max, 151.0);
        assert_eq!(param_descriptors(EffectKind::Tint).len(), 2);
        assert!(param_descriptors(EffectKind::Merge).is_empty());
        assert!(create_default(EffectKind::Burn).matches_kind(EffectKind::Burn));
        assert!(!create_default(EffectKind::Burn).matches_kind(EffectKind::Sigmoid));
    }
}
