//! Color representation and blending arithmetic.
//!
//! Colors are stored as straight (non-premultiplied) `f32` channels. The blend
//! operators scale by alpha internally, so accumulation happens in
//! premultiplied space and the result is divided back out. Channels may leave
//! `[0, 1]` while compositing; they are only clamped when a color is
//! quantized for output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Threshold below which an alpha value is treated as zero.
pub const COLOR_EPSILON: f32 = 1e-6;

/// RGBA color with floating point components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create color from 8-bit components.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Parse color from hex string (e.g., "#ff0000", "#f00", "#ff000080").
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();

        match hex.len() {
            3 => Some(Self::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
            4 => Some(Self::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
            6 => Some(Self::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Self::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Replace the alpha channel.
    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Multiply the color channels by alpha.
    #[inline]
    pub fn premultiplied(self) -> Self {
        Self::rgba(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    /// Divide the color channels by alpha. Fully transparent colors collapse
    /// to [`Color::TRANSPARENT`].
    pub fn demultiplied(self) -> Self {
        if self.a.abs() < COLOR_EPSILON {
            return Self::TRANSPARENT;
        }
        Self::rgba(self.r / self.a, self.g / self.a, self.b / self.a, self.a)
    }

    /// Invert the color channels, keeping alpha.
    #[inline]
    pub fn inverse(self) -> Self {
        Self::rgba(1.0 - self.r, 1.0 - self.g, 1.0 - self.b, self.a)
    }

    /// Clamp every channel into `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self::rgba(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Linear interpolation between two colors in premultiplied space.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let a = self.premultiplied();
        let b = other.premultiplied();
        Color::rgba(
            a.r + (b.r - a.r) * t,
            a.g + (b.g - a.g) * t,
            a.b + (b.b - a.b) * t,
            a.a + (b.a - a.a) * t,
        )
        .demultiplied()
    }

    /// Quantize to 8-bit RGBA after gamma encoding.
    pub fn to_rgba8(&self, gamma: &Gamma) -> [u8; 4] {
        let c = gamma.encode(self.clamped());
        [
            (c.r * 255.0).round() as u8,
            (c.g * 255.0).round() as u8,
            (c.b * 255.0).round() as u8,
            (c.a * 255.0).round() as u8,
        ]
    }

    /// Blend `src` onto `dest` with the given amount and method.
    pub fn blend(src: Color, dest: Color, amount: f32, method: BlendMethod) -> Color {
        match method {
            BlendMethod::Composite => blend_composite(src, dest, amount),
            BlendMethod::Straight => blend_straight(src, dest, amount),
            BlendMethod::Onto => blend_onto(src, dest, amount),
            BlendMethod::StraightOnto => {
                blend_straight(src.with_alpha(src.a * dest.a), dest, amount)
            }
            BlendMethod::Behind => {
                let a = if src.a == 0.0 { COLOR_EPSILON * amount } else { src.a * amount };
                blend_composite(dest, src.with_alpha(a), 1.0)
            }
            BlendMethod::Screen => {
                let (src, amount) = signed_amount(src, amount);
                let screened = Color::rgba(
                    1.0 - (1.0 - src.r) * (1.0 - dest.r),
                    1.0 - (1.0 - src.g) * (1.0 - dest.g),
                    1.0 - (1.0 - src.b) * (1.0 - dest.b),
                    src.a,
                );
                blend_onto(screened, dest, amount)
            }
            BlendMethod::Multiply => {
                let (src, amount) = signed_amount(src, amount);
                let mul = |s: f32, d: f32| (d * s - d) * src.a + d;
                let multiplied = Color::rgba(
                    mul(src.r, dest.r),
                    mul(src.g, dest.g),
                    mul(src.b, dest.b),
                    src.a,
                );
                blend_onto(multiplied, dest, amount)
            }
            BlendMethod::Divide => {
                let amount = amount * src.a;
                let div = |s: f32, d: f32| (d / (s + COLOR_EPSILON) - d) * amount + d;
                Color::rgba(div(src.r, dest.r), div(src.g, dest.g), div(src.b, dest.b), dest.a)
            }
            BlendMethod::Add => blend_additive(src, dest, amount, |d, s| d + s),
            BlendMethod::Subtract => blend_additive(src, dest, amount, |d, s| d - s),
            BlendMethod::Difference => blend_additive(src, dest, amount, |d, s| (d - s).abs()),
            BlendMethod::Brighten => {
                let amount = src.a * amount;
                let up = |s: f32, d: f32| if d < s * amount { s * amount } else { d };
                Color::rgba(up(src.r, dest.r), up(src.g, dest.g), up(src.b, dest.b), dest.a)
            }
            BlendMethod::Darken => {
                let amount = src.a * amount;
                let down = |s: f32, d: f32| {
                    let limit = (s - 1.0) * amount + 1.0;
                    if d > limit { limit } else { d }
                };
                Color::rgba(down(src.r, dest.r), down(src.g, dest.g), down(src.b, dest.b), dest.a)
            }
            BlendMethod::AlphaOver => {
                let cut = dest.with_alpha((1.0 - src.a) * dest.a);
                blend_straight(cut, dest, amount)
            }
        }
    }
}

fn signed_amount(src: Color, amount: f32) -> (Color, f32) {
    if amount < 0.0 {
        (src.inverse(), -amount)
    } else {
        (src, amount)
    }
}

fn blend_composite(src: Color, dest: Color, amount: f32) -> Color {
    let a_src = src.a * amount;
    let a_dest = dest.a;

    if a_src.abs() < COLOR_EPSILON {
        return dest;
    }

    let a_out = a_src + a_dest * (1.0 - a_src);
    if a_out.abs() <= COLOR_EPSILON {
        return Color::TRANSPARENT;
    }

    let over = |s: f32, d: f32| (s * a_src + d * a_dest * (1.0 - a_src)) / a_out;
    Color::rgba(over(src.r, dest.r), over(src.g, dest.g), over(src.b, dest.b), a_out)
}

fn blend_straight(src: Color, dest: Color, amount: f32) -> Color {
    let a_out = (src.a - dest.a) * amount + dest.a;
    if a_out.abs() <= COLOR_EPSILON {
        return Color::TRANSPARENT.with_alpha(a_out);
    }

    let mix = |s: f32, d: f32| ((s * src.a - d * dest.a) * amount + d * dest.a) / a_out;
    Color::rgba(mix(src.r, dest.r), mix(src.g, dest.g), mix(src.b, dest.b), a_out)
}

fn blend_onto(src: Color, dest: Color, amount: f32) -> Color {
    blend_composite(src, dest.with_alpha(1.0), amount).with_alpha(dest.a)
}

fn blend_additive(src: Color, dest: Color, amount: f32, op: impl Fn(f32, f32) -> f32) -> Color {
    let ba = dest.a;
    let aa = src.a * amount;
    let alpha = (ba + aa).clamp(0.0, 1.0);
    let k = if alpha.abs() > 1e-8 { 1.0 / alpha } else { 0.0 };

    Color::rgba(
        op(dest.r * ba, src.r * aa) * k,
        op(dest.g * ba, src.g * aa) * k,
        op(dest.b * ba, src.b * aa) * k,
        alpha,
    )
}

/// How a layer's color is combined with the color beneath it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMethod {
    #[default]
    Composite,
    Straight,
    Onto,
    StraightOnto,
    Behind,
    Screen,
    Multiply,
    Divide,
    Add,
    Subtract,
    Difference,
    Brighten,
    Darken,
    AlphaOver,
}

impl BlendMethod {
    pub const ALL: [BlendMethod; 14] = [
        BlendMethod::Composite,
        BlendMethod::Straight,
        BlendMethod::Onto,
        BlendMethod::StraightOnto,
        BlendMethod::Behind,
        BlendMethod::Screen,
        BlendMethod::Multiply,
        BlendMethod::Divide,
        BlendMethod::Add,
        BlendMethod::Subtract,
        BlendMethod::Difference,
        BlendMethod::Brighten,
        BlendMethod::Darken,
        BlendMethod::AlphaOver,
    ];

    /// Whether blending `color` with `amount` yields a result independent of
    /// the destination, so nothing beneath needs to be evaluated.
    #[inline]
    pub fn replaces(self, color: Color, amount: f32) -> bool {
        matches!(self, BlendMethod::Composite) && color.a * amount == 1.0
    }

    /// Stable lowercase name used in scene files.
    pub fn name(self) -> &'static str {
        match self {
            BlendMethod::Composite => "composite",
            BlendMethod::Straight => "straight",
            BlendMethod::Onto => "onto",
            BlendMethod::StraightOnto => "straight_onto",
            BlendMethod::Behind => "behind",
            BlendMethod::Screen => "screen",
            BlendMethod::Multiply => "multiply",
            BlendMethod::Divide => "divide",
            BlendMethod::Add => "add",
            BlendMethod::Subtract => "subtract",
            BlendMethod::Difference => "difference",
            BlendMethod::Brighten => "brighten",
            BlendMethod::Darken => "darken",
            BlendMethod::AlphaOver => "alpha_over",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name.to_lowercase())
    }
}

/// Per-channel gamma used to encode linear colors for output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gamma {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Gamma {
    pub const IDENTITY: Gamma = Gamma { r: 1.0, g: 1.0, b: 1.0 };

    pub const fn new(gamma: f32) -> Self {
        Self { r: gamma, g: gamma, b: gamma }
    }

    pub fn is_identity(&self) -> bool {
        self.r == 1.0 && self.g == 1.0 && self.b == 1.0
    }

    /// Linear to output space.
    pub fn encode(&self, color: Color) -> Color {
        if self.is_identity() {
            return color;
        }
        Color::rgba(
            color.r.powf(1.0 / self.r),
            color.g.powf(1.0 / self.g),
            color.b.powf(1.0 / self.b),
            color.a,
        )
    }

    /// Output space to linear.
    pub fn decode(&self, color: Color) -> Color {
        if self.is_identity() {
            return color;
        }
        Color::rgba(
            color.r.powf(self.r),
            color.g.powf(self.g),
            color.b.powf(self.b),
            color.a,
        )
    }
}

impl Default for Gamma {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({:.4}, {:.4}, {:.4}, {:.4})", self.r, self.g, self.b, self.a)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-5
            && (a.g - b.g).abs() < 1e-5
            && (a.b - b.b).abs() < 1e-5
            && (a.a - b.a).abs() < 1e-5
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("#f00"), Some(Color::RED));
        assert_eq!(Color::from_hex("00ff00"), Some(Color::GREEN));
        assert_eq!(Color::from_hex("#zzz"), None);
        let half = Color::from_hex("#ffffff80").unwrap();
        assert!((half.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_composite_opaque_replaces() {
        let out = Color::blend(Color::RED, Color::BLUE, 1.0, BlendMethod::Composite);
        assert_eq!(out, Color::RED);
        assert!(BlendMethod::Composite.replaces(Color::RED, 1.0));
        assert!(!BlendMethod::Composite.replaces(Color::RED, 0.5));
    }

    #[test]
    fn test_composite_half_alpha() {
        let src = Color::RED.with_alpha(0.5);
        let out = Color::blend(src, Color::BLUE, 1.0, BlendMethod::Composite);
        assert!(approx(out, Color::rgba(0.5, 0.0, 0.5, 1.0)));

        let over_nothing = Color::blend(src, Color::TRANSPARENT, 1.0, BlendMethod::Composite);
        assert!(approx(over_nothing, src));
    }

    #[test]
    fn test_zero_amount_is_noop() {
        for method in [BlendMethod::Composite, BlendMethod::Straight, BlendMethod::Onto] {
            let out = Color::blend(Color::RED, Color::BLUE, 0.0, method);
            assert!(approx(out, Color::BLUE), "{method:?}");
        }
    }

    #[test]
    fn test_straight_replaces_alpha() {
        let src = Color::RED.with_alpha(0.25);
        let out = Color::blend(src, Color::BLUE, 1.0, BlendMethod::Straight);
        assert!(approx(out, src));
    }

    #[test]
    fn test_onto_keeps_dest_alpha() {
        let dest = Color::BLUE.with_alpha(0.5);
        let out = Color::blend(Color::RED, dest, 1.0, BlendMethod::Onto);
        assert!(approx(out, Color::RED.with_alpha(0.5)));

        let nothing = Color::blend(Color::RED, Color::TRANSPARENT, 1.0, BlendMethod::Onto);
        assert!(nothing.a.abs() < 1e-6);
    }

    #[test]
    fn test_behind_puts_src_under() {
        let out = Color::blend(Color::RED, Color::BLUE, 1.0, BlendMethod::Behind);
        assert!(approx(out, Color::BLUE));
        let out = Color::blend(Color::RED, Color::TRANSPARENT, 1.0, BlendMethod::Behind);
        assert!(approx(out, Color::RED));
    }

    #[test]
    fn test_multiply_and_screen() {
        let grey = Color::rgb(0.5, 0.5, 0.5);
        let out = Color::blend(grey, Color::WHITE, 1.0, BlendMethod::Multiply);
        assert!(approx(out, grey));
        let out = Color::blend(grey, Color::BLACK, 1.0, BlendMethod::Screen);
        assert!(approx(out, grey));
    }

    #[test]
    fn test_add_saturates_alpha() {
        let out = Color::blend(Color::rgb(0.25, 0.0, 0.0), Color::rgb(0.5, 0.0, 0.0), 1.0, BlendMethod::Add);
        assert!(approx(out, Color::rgb(0.75, 0.0, 0.0)));
    }

    #[test]
    fn test_brighten_darken() {
        let grey = Color::rgb(0.5, 0.5, 0.5);
        let out = Color::blend(Color::WHITE, grey, 1.0, BlendMethod::Brighten);
        assert!(approx(out, Color::WHITE));
        let out = Color::blend(Color::BLACK, grey, 1.0, BlendMethod::Darken);
        assert!(approx(out, Color::BLACK));
    }

    #[test]
    fn test_alpha_over_cuts_hole() {
        let out = Color::blend(Color::WHITE, Color::RED, 1.0, BlendMethod::AlphaOver);
        assert!(out.a.abs() < 1e-6);
    }

    #[test]
    fn test_gamma_round_trip() {
        let gamma = Gamma::new(2.2);
        let c = Color::rgba(0.2, 0.5, 0.8, 0.6);
        assert!(approx(gamma.decode(gamma.encode(c)), c));
        assert_eq!(Color::WHITE.to_rgba8(&gamma), [255, 255, 255, 255]);
        assert_eq!(Color::rgba(2.0, -1.0, 0.0, 1.5).to_rgba8(&Gamma::IDENTITY), [255, 0, 0, 255]);
    }

    #[test]
    fn test_blend_method_names() {
        for method in BlendMethod::ALL {
            assert_eq!(BlendMethod::from_name(method.name()), Some(method));
        }
        assert_eq!(BlendMethod::from_name("nope"), None);
    }
}
