//! GPU-ready vertex data for the procedural effects.
//!
//! The renderer uploads these slices as-is; nothing here touches a device.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::galaxy::ParticleField;
use crate::trail::{TrailBuffer, WarpTunnel};

/// One galaxy star, drawn as a point sprite.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

impl PointVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // position: vec3<f32>
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // size: f32
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
                // color: vec4<f32>
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Endpoint of a line segment (trail or warp streak). Drawn as a line list.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub alpha: f32,
}

impl LineVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Serializable copy of a [`wgpu::VertexBufferLayout`], handed to hosts that
/// build their pipelines outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexLayoutInfo {
    pub array_stride: u64,
    pub step_mode: String,
    pub attributes: Vec<VertexAttributeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexAttributeInfo {
    pub shader_location: u32,
    pub offset: u64,
    /// wgpu format name in snake case, e.g. `float32x3`.
    pub format: String,
}

impl VertexLayoutInfo {
    pub fn from_layout(layout: &wgpu::VertexBufferLayout<'_>) -> Self {
        Self {
            array_stride: layout.array_stride,
            step_mode: format!("{:?}", layout.step_mode).to_lowercase(),
            attributes: layout
                .attributes
                .iter()
                .map(|a| VertexAttributeInfo {
                    shader_location: a.shader_location,
                    offset: a.offset,
                    format: format!("{:?}", a.format).to_lowercase(),
                })
                .collect(),
        }
    }
}

/// Layouts of every vertex stream this crate produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexLayouts {
    pub points: VertexLayoutInfo,
    pub lines: VertexLayoutInfo,
}

pub fn vertex_layouts() -> VertexLayouts {
    VertexLayouts {
        points: VertexLayoutInfo::from_layout(&PointVertex::desc()),
        lines: VertexLayoutInfo::from_layout(&LineVertex::desc()),
    }
}

/// Star vertices in the field's local space; the field transform is applied
/// as a model matrix.
pub fn galaxy_vertices(field: &ParticleField) -> Vec<PointVertex> {
    field
        .positions
        .iter()
        .zip(&field.colors)
        .map(|(&position, &[r, g, b])| PointVertex {
            position,
            size: field.size,
            color: [r, g, b, 1.0],
        })
        .collect()
}

/// Line-list vertices for the valid segments of a trail.
pub fn trail_vertices(trail: &TrailBuffer, opacity: f32) -> Vec<LineVertex> {
    trail
        .segments()
        .into_iter()
        .flat_map(|(a, b)| {
            [
                LineVertex {
                    position: a.to_array(),
                    alpha: opacity,
                },
                LineVertex {
                    position: b.to_array(),
                    alpha: opacity,
                },
            ]
        })
        .collect()
}

/// Two vertices per streak: a transparent tail and an opaque head.
pub fn warp_vertices(tunnel: &WarpTunnel) -> Vec<LineVertex> {
    let mut vertices = Vec::with_capacity(tunnel.streaks.len() * 2);
    for streak in &tunnel.streaks {
        vertices.push(LineVertex {
            position: streak.tail.to_array(),
            alpha: 0.0,
        });
        vertices.push(LineVertex {
            position: streak.head.to_array(),
            alpha: 1.0,
        });
    }
    vertices
}
