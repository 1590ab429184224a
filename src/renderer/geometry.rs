// renderer/geometry.rs

/// Primitive topology of a geometry. The discriminants index the fixed
/// lookup tables used by the pipeline cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleFan = 5,
    TriangleStrip = 6,
}

impl Topology {
    pub const ALL: [Topology; 7] = [
        Topology::Points,
        Topology::Lines,
        Topology::LineLoop,
        Topology::LineStrip,
        Topology::Triangles,
        Topology::TriangleFan,
        Topology::TriangleStrip,
    ];
}

/// Type of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    /// Attribute types with no GPU vertex format (e.g. booleans).
    Undefined,
}

impl VertexFormat {
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float | VertexFormat::Int => 4,
            VertexFormat::Vec2 => 8,
            VertexFormat::Vec3 => 12,
            VertexFormat::Vec4 => 16,
            VertexFormat::Undefined => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttributeFormat {
    pub name: String,
    pub format: VertexFormat,
    pub offset: u32,
}

impl VertexAttributeFormat {
    /// Offset is assigned by [`VertexBufferFormat::new`].
    pub fn new(name: impl Into<String>, format: VertexFormat) -> Self {
        Self {
            name: name.into(),
            format,
            offset: 0,
        }
    }
}

/// Interleaved layout of one vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferFormat {
    pub stride: u32,
    pub attributes: Vec<VertexAttributeFormat>,
}

impl VertexBufferFormat {
    /// Packs attributes tightly in declaration order.
    pub fn new(mut attributes: Vec<VertexAttributeFormat>) -> Self {
        let mut offset = 0;
        for attribute in &mut attributes {
            attribute.offset = offset;
            offset += attribute.format.size();
        }
        Self {
            stride: offset,
            attributes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub topology: Topology,
    pub vertex_buffers: Vec<VertexBufferFormat>,
}

impl Geometry {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            vertex_buffers: Vec::new(),
        }
    }

    pub fn with_vertex_buffer(mut self, buffer: VertexBufferFormat) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    /// Position + texture coordinate quad layout used by most UI renderers.
    pub fn quad() -> Self {
        Self::new(Topology::TriangleStrip).with_vertex_buffer(VertexBufferFormat::new(vec![
            VertexAttributeFormat::new("aPosition", VertexFormat::Vec2),
            VertexAttributeFormat::new("aTexCoord", VertexFormat::Vec2),
        ]))
    }
}
