//! Vertex layout and GPU mesh entries.
//!
//! A [`MeshEntry`] owns the vertex buffer and optional index buffer of one
//! registered mesh. Buffers are built when the entry is created and never
//! rebuilt; registering the same key again replaces the whole entry.

use wgpu::util::DeviceExt;

/// Interleaved vertex: position, uv, normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];

    pub fn new(position: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            uv,
            normal,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Key of the mesh an entity draws with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshReference(pub String);

impl MeshReference {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

/// Narrowest index format able to address every index in `indices`.
pub fn index_format_for(indices: &[u32]) -> wgpu::IndexFormat {
    match indices.iter().max() {
        Some(max) if *max > u16::MAX as u32 => wgpu::IndexFormat::Uint32,
        _ => wgpu::IndexFormat::Uint16,
    }
}

/// Index data narrowed to the format chosen by [`index_format_for`].
#[derive(Debug, Clone, PartialEq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    pub fn from_u32(indices: &[u32]) -> Self {
        match index_format_for(indices) {
            wgpu::IndexFormat::Uint16 => Indices::U16(indices.iter().map(|i| *i as u16).collect()),
            wgpu::IndexFormat::Uint32 => Indices::U32(indices.to_vec()),
        }
    }

    pub fn format(&self) -> wgpu::IndexFormat {
        match self {
            Indices::U16(_) => wgpu::IndexFormat::Uint16,
            Indices::U32(_) => wgpu::IndexFormat::Uint32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Indices::U16(indices) => indices.len(),
            Indices::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Indices::U16(indices) => bytemuck::cast_slice(indices),
            Indices::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

#[derive(Debug)]
pub struct IndexStream {
    pub buffer: wgpu::Buffer,
    pub format: wgpu::IndexFormat,
    pub count: u32,
}

/// GPU buffers of one registered mesh.
#[derive(Debug)]
pub struct MeshEntry {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub vertex_count: u32,
    pub index: Option<IndexStream>,
}

impl MeshEntry {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Vertex Buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index = indices.filter(|indices| !indices.is_empty()).map(|indices| {
            let indices = Indices::from_u32(indices);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{name} Index Buffer")),
                contents: indices.bytes(),
                usage: wgpu::BufferUsages::INDEX,
            });
            IndexStream {
                buffer,
                format: indices.format(),
                count: indices.len() as u32,
            }
        });

        Self {
            name: name.to_string(),
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            index,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub(crate) fn destroy(&self) {
        self.vertex_buffer.destroy();
        if let Some(index) = &self.index {
            index.buffer.destroy();
        }
    }
}

pub trait DrawMesh {
    /// Binds the mesh buffers and issues an indexed or plain draw.
    fn draw_mesh(&mut self, mesh: &MeshEntry);
}

impl DrawMesh for wgpu::RenderPass<'_> {
    fn draw_mesh(&mut self, mesh: &MeshEntry) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        match &mesh.index {
            Some(index) => {
                self.set_index_buffer(index.buffer.slice(..), index.format);
                self.draw_indexed(0..index.count, 0, 0..1);
            }
            None => self.draw(0..mesh.vertex_count, 0..1),
        }
    }
}

/// Axis-aligned cube centred on the origin, 36 unindexed vertices with
/// per-face normals.
pub fn cube(side: f32) -> Vec<Vertex> {
    let h = side / 2.0;
    let (p, n) = (h, -h);

    // (normal, [upper-left, bottom-left, upper-right, bottom-right])
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[n, p, p], [n, n, p], [p, p, p], [p, n, p]]),
        ([0.0, 0.0, -1.0], [[p, p, n], [p, n, n], [n, p, n], [n, n, n]]),
        ([-1.0, 0.0, 0.0], [[n, p, n], [n, n, n], [n, p, p], [n, n, p]]),
        ([1.0, 0.0, 0.0], [[p, p, p], [p, n, p], [p, p, n], [p, n, n]]),
        ([0.0, 1.0, 0.0], [[n, p, n], [n, p, p], [p, p, n], [p, p, p]]),
        ([0.0, -1.0, 0.0], [[n, n, p], [n, n, n], [p, n, p], [p, n, n]]),
    ];
    let uvs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

    faces
        .iter()
        .flat_map(|(normal, corners)| {
            [0, 1, 2, 2, 1, 3]
                .into_iter()
                .map(move |corner| Vertex::new(corners[corner], uvs[corner], *normal))
        })
        .collect()
}
