use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;

/// Attribute name shaders use for the vertex position.
pub const POSITION_ATTRIBUTE: &str = "vert";
/// Attribute name shaders use for the texture coordinate.
pub const TEXCOORD_ATTRIBUTE: &str = "vertTexCoord";

/// One float attribute inside an interleaved vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    pub components: u8,
    pub offset: u64,
}

/// Describes how vertex shader inputs map onto an interleaved buffer.
///
/// Shader inputs are bound by name, so one buffer can feed every program
/// that declares a subset of these attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Layout of [`VertexBuffer::quad`]: `vec3 vert` followed by `vec2 vertTexCoord`.
    pub fn quad() -> Self {
        Self {
            stride: std::mem::size_of::<QuadVertex>() as u64,
            attributes: vec![
                VertexAttribute {
                    name: POSITION_ATTRIBUTE.into(),
                    components: 3,
                    offset: 0,
                },
                VertexAttribute {
                    name: TEXCOORD_ATTRIBUTE.into(),
                    components: 2,
                    offset: 12,
                },
            ],
        }
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.name == name)
    }

    pub(crate) fn wgpu_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| wgpu::VertexAttribute {
                format: match attribute.components {
                    1 => wgpu::VertexFormat::Float32,
                    2 => wgpu::VertexFormat::Float32x2,
                    3 => wgpu::VertexFormat::Float32x3,
                    _ => wgpu::VertexFormat::Float32x4,
                },
                offset: attribute.offset,
                shader_location: location as u32,
            })
            .collect()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 3],
    tex_coord: [f32; 2],
}

/// Two triangles covering clip space. Texture coordinates follow the
/// texture's top-left origin, so `v = 0` is the top row.
const QUAD: [QuadVertex; 6] = [
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coord: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coord: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        tex_coord: [0.0, 0.0],
    },
];

/// Vertex data (optionally indexed) shared by the programs that draw it.
pub struct VertexBuffer {
    vertices: wgpu::Buffer,
    vertex_count: u32,
    indices: Option<(wgpu::Buffer, u32)>,
    layout: VertexLayout,
}

impl VertexBuffer {
    /// Full-screen quad used by every compute pass.
    pub fn quad(ctx: &GpuContext) -> Self {
        Self::from_vertices(
            ctx,
            "quad",
            bytemuck::cast_slice(&QUAD),
            QUAD.len() as u32,
            VertexLayout::quad(),
        )
    }

    pub fn from_vertices(
        ctx: &GpuContext,
        label: &str,
        bytes: &[u8],
        vertex_count: u32,
        layout: VertexLayout,
    ) -> Self {
        let vertices = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX,
            });
        Self {
            vertices,
            vertex_count,
            indices: None,
            layout,
        }
    }

    pub fn with_indices(mut self, ctx: &GpuContext, indices: &[u32]) -> Self {
        let buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vertex indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.indices = Some((buffer, indices.len() as u32));
        self
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub(crate) fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        match &self.indices {
            Some((buffer, count)) => {
                pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..*count, 0, 0..1);
            }
            None => pass.draw(0..self.vertex_count, 0..1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_layout_matches_vertex_struct() {
        let layout = VertexLayout::quad();
        assert_eq!(layout.stride, 20);
        assert_eq!(layout.attribute_index("vertTexCoord"), Some(1));
        let attributes = layout.wgpu_attributes();
        assert_eq!(attributes[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attributes[1].offset, 12);
    }

    #[test]
    fn quad_texcoords_put_row_zero_at_the_top() {
        let top_left = QUAD
            .iter()
            .find(|v| v.position[0] < 0.0 && v.position[1] > 0.0)
            .unwrap();
        assert_eq!(top_left.tex_coord, [0.0, 0.0]);
    }
}
