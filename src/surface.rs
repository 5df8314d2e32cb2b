//! Shader-driven animated surfaces (water, lava, meadow).
//!
//! Structural parameters are fixed at creation; only `time` changes while the
//! owning environment is active. The wave and color functions mirror the
//! surface shader so the CPU side can sample elevations for tests and for
//! placing props on the surface.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::scene_graph::Color;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Emission {
    pub color: Color,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceParams {
    pub wave_elevation: f32,
    pub wave_frequency: [f32; 2],
    pub wave_speed: f32,
    pub depth_color: Color,
    pub surface_color: Color,
    pub color_multiplier: f32,
    pub emission: Option<Emission>,
}

impl SurfaceParams {
    pub fn water() -> Self {
        Self {
            wave_elevation: 0.07,
            wave_frequency: [0.2, 0.2],
            wave_speed: 0.4,
            depth_color: Color::from_rgb_u32(0x1c597c),
            surface_color: Color::from_rgb_u32(0x7a9db7),
            color_multiplier: 5.0,
            emission: None,
        }
    }

    pub fn lava() -> Self {
        Self {
            wave_elevation: 0.5,
            wave_frequency: [0.08, 0.08],
            wave_speed: 0.4,
            depth_color: Color::from_rgb_u32(0xff8c00),
            surface_color: Color::from_rgb_u32(0x800000),
            color_multiplier: 7.0,
            emission: Some(Emission {
                color: Color::from_rgb_u32(0xff8c00),
                strength: 1.5,
            }),
        }
    }

    pub fn meadow() -> Self {
        Self {
            wave_elevation: 0.15,
            wave_frequency: [0.3, 0.25],
            wave_speed: 0.15,
            depth_color: Color::from_rgb_u32(0x1f4d1a),
            surface_color: Color::from_rgb_u32(0x7fb069),
            color_multiplier: 4.0,
            emission: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShaderSurface {
    pub params: SurfaceParams,
    /// The only uniform updated per frame.
    pub time: f32,
}

impl ShaderSurface {
    pub fn new(params: SurfaceParams) -> Self {
        Self { params, time: 0.0 }
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Wave elevation at a world-space (x, z) point for the current time.
    pub fn elevation_at(&self, x: f32, z: f32) -> f32 {
        let p = &self.params;
        let phase = self.time * p.wave_speed;
        let x_elevation = (-x * p.wave_frequency[0] + phase + hash_noise(z)).sin();
        let z_elevation = (-z * p.wave_frequency[1] + phase).sin();
        x_elevation * z_elevation * p.wave_elevation
    }

    /// Color ramp between depth and surface color for a given elevation.
    /// Like GLSL `mix`, the factor is not clamped.
    pub fn color_at(&self, elevation: f32) -> Color {
        let p = &self.params;
        p.depth_color.lerp(p.surface_color, elevation * p.color_multiplier)
    }

    pub fn uniforms(&self) -> SurfaceUniforms {
        let p = &self.params;
        let (emission_color, emission_strength) = match p.emission {
            Some(e) => (e.color.to_array(), e.strength),
            None => ([0.0; 3], 0.0),
        };
        SurfaceUniforms {
            time: self.time,
            wave_elevation: p.wave_elevation,
            wave_frequency: p.wave_frequency,
            depth_color: extend(p.depth_color.to_array(), p.color_multiplier),
            surface_color: extend(p.surface_color.to_array(), p.wave_speed),
            emission: extend(emission_color, emission_strength),
        }
    }
}

/// `fract(sin(x) * 100000)`, matching the shader's cheap hash.
fn hash_noise(x: f32) -> f32 {
    (x.sin() * 100000.0).fract()
}

fn extend(rgb: [f32; 3], w: f32) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], w]
}

/// GPU-ready surface uniforms.
///
/// Laid out for direct upload to a uniform buffer. Total size: 64 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SurfaceUniforms {
    pub time: f32,
    pub wave_elevation: f32,
    pub wave_frequency: [f32; 2],
    /// rgb + color multiplier in w.
    pub depth_color: [f32; 4],
    /// rgb + wave speed in w.
    pub surface_color: [f32; 4],
    /// rgb + emission strength in w.
    pub emission: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_is_bounded() {
        let mut surface = ShaderSurface::new(SurfaceParams::water());
        for step in 0..50 {
            surface.set_time(step as f32 * 0.37);
            let e = surface.elevation_at(step as f32 * 1.3, -(step as f32));
            assert!(e.abs() <= 0.07 + 1e-6);
        }
    }

    #[test]
    fn test_time_changes_elevation() {
        let mut surface = ShaderSurface::new(SurfaceParams::lava());
        surface.set_time(0.0);
        let a = surface.elevation_at(1.0, 2.0);
        surface.set_time(3.0);
        let b = surface.elevation_at(1.0, 2.0);
        assert!((a - b).abs() > 1e-4);
    }

    #[test]
    fn test_color_ramp_endpoints() {
        let surface = ShaderSurface::new(SurfaceParams::water());
        let flat = surface.color_at(0.0);
        assert_eq!(flat, surface.params.depth_color);
        let top = surface.color_at(1.0 / surface.params.color_multiplier);
        assert!((top.r - surface.params.surface_color.r).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<SurfaceUniforms>(), 64);
        let u = ShaderSurface::new(SurfaceParams::lava()).uniforms();
        assert_eq!(u.emission[3], 1.5);
        let w = ShaderSurface::new(SurfaceParams::water()).uniforms();
        assert_eq!(w.emission, [0.0; 4]);
    }
}
