//! glTF and GLB models: one part per triangle primitive, textured with the
//! material's base colour texture or, failing that, its base colour factor.
//!
//! Node transforms and animations are not read; every part is spawned at the
//! model root.

use anyhow::{Context as _, bail};
use futures::future::join_all;

use crate::{
    data_structures::{
        mesh::Vertex,
        model::{ModelPart, ModelTemplate},
    },
    resources::loader::{self, MeshData, ModelData, sibling_path, sub_keys},
};

pub async fn load(path: &str, key: &str, default_texture_key: &str) -> anyhow::Result<ModelData> {
    let bytes = loader::load_binary(path).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("Could not parse glTF {path}"))?;

    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().context("GLB binary chunk is missing")?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!(
                    "Embedded data URIs are not supported, found one in buffer {}",
                    buffer.index()
                );
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(loader::load_binary(&sibling_path(path, uri)).await?);
            }
        }
    }

    let materials: Vec<_> = gltf.materials().collect();
    let images = join_all(
        materials
            .iter()
            .map(|material| material_image(material, &buffer_data, path)),
    )
    .await;

    let mut textures = Vec::with_capacity(materials.len());
    let mut material_keys = Vec::with_capacity(materials.len());
    let texture_keys = sub_keys(key, materials.iter().map(|m| m.name()));
    for (texture_key, image) in texture_keys.into_iter().zip(images) {
        match image {
            Ok(img) => {
                textures.push((texture_key.clone(), img));
                material_keys.push(Some(texture_key));
            }
            Err(e) => {
                log::error!("Material {texture_key} could not be loaded: {e:#}");
                material_keys.push(None);
            }
        }
    }

    let mut meshes = Vec::new();
    let mut parts = Vec::new();
    let mesh_keys = sub_keys(key, gltf.meshes().map(|m| m.name()));
    for (mesh, mesh_key) in gltf.meshes().zip(mesh_keys) {
        let primitive_count = mesh.primitives().len();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive {} of {mesh_key}", primitive.index());
                continue;
            }
            let key = if primitive_count > 1 {
                format!("{mesh_key}/{}", primitive.index())
            } else {
                mesh_key.clone()
            };
            let Some(data) = primitive_mesh(&primitive, &buffer_data, key) else {
                log::warn!("Primitive {} of {mesh_key} has no positions", primitive.index());
                continue;
            };

            let texture_key = primitive
                .material()
                .index()
                .and_then(|idx| material_keys.get(idx).cloned().flatten())
                .unwrap_or_else(|| default_texture_key.to_string());
            parts.push(ModelPart::new(data.key.clone(), texture_key));
            meshes.push(data);
        }
    }

    Ok(ModelData {
        meshes,
        textures,
        template: ModelTemplate::new(parts),
    })
}

fn primitive_mesh(
    primitive: &gltf::Primitive,
    buffer_data: &[Vec<u8>],
    key: String,
) -> Option<MeshData> {
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Vec<[f32; 3]> = reader.read_normals().map(|n| n.collect()).unwrap_or_default();
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|uv| uv.into_f32().collect())
        .unwrap_or_default();

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vertex {
            position: *position,
            uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
            normal: normals.get(i).copied().unwrap_or([0.0; 3]),
        })
        .collect();
    let indices = reader.read_indices().map(|indices| indices.into_u32().collect());

    Some(MeshData {
        key,
        vertices,
        indices,
    })
}

async fn material_image(
    material: &gltf::Material<'_>,
    buffer_data: &[Vec<u8>],
    path: &str,
) -> anyhow::Result<image::DynamicImage> {
    let pbr = material.pbr_metallic_roughness();
    let Some(info) = pbr.base_color_texture() else {
        return Ok(loader::solid_image(pbr.base_color_factor()));
    };

    match info.texture().source().source() {
        gltf::image::Source::View { view, .. } => {
            let buffer = buffer_data
                .get(view.buffer().index())
                .context("Image references a missing buffer")?;
            let bytes = buffer
                .get(view.offset()..view.offset() + view.length())
                .context("Image buffer view is out of range")?;
            Ok(image::load_from_memory(bytes)?)
        }
        gltf::image::Source::Uri { uri, .. } => loader::load_image(&sibling_path(path, uri)).await,
    }
}
