//! Wavefront OBJ models with MTL diffuse textures.

use std::io::{BufReader, Cursor};

use futures::future::join_all;

use crate::{
    data_structures::{mesh::Vertex, model::{ModelPart, ModelTemplate}},
    resources::loader::{self, MeshData, ModelData, sibling_path, sub_keys},
};

enum DiffuseSource {
    File(String),
    Colour([f32; 3]),
}

pub async fn load(path: &str, key: &str, default_texture_key: &str) -> anyhow::Result<ModelData> {
    let obj_text = loader::load_string(path).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_path = sibling_path(path, &p);
            async move {
                match loader::load_string(&mtl_path).await {
                    Ok(mtl_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_text))),
                    Err(e) => {
                        log::warn!("Material library {mtl_path} could not be loaded: {e:#}");
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await?;

    let materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Model {path} is loaded without materials: {e}");
        Vec::new()
    });

    let sources: Vec<Option<DiffuseSource>> = materials
        .iter()
        .map(|m| match (&m.diffuse_texture, m.diffuse) {
            (Some(texture), _) => Some(DiffuseSource::File(sibling_path(path, texture))),
            (None, Some(colour)) => Some(DiffuseSource::Colour(colour)),
            (None, None) => {
                log::warn!(
                    "Material {} in {path} has neither a texture nor a diffuse colour",
                    m.name
                );
                None
            }
        })
        .collect();

    let images = join_all(sources.iter().map(|source| async move {
        match source {
            Some(DiffuseSource::File(file)) => match loader::load_image(file).await {
                Ok(img) => Some(img),
                Err(e) => {
                    log::error!("Diffuse texture {file} could not be loaded: {e:#}");
                    None
                }
            },
            Some(DiffuseSource::Colour([r, g, b])) => Some(loader::solid_image([*r, *g, *b, 1.0])),
            None => None,
        }
    }))
    .await;

    let names = sub_keys(key, materials.iter().map(|m| Some(m.name.as_str())));
    let mut textures = Vec::new();
    let mut material_keys = Vec::with_capacity(materials.len());
    for (texture_key, image) in names.into_iter().zip(images) {
        material_keys.push(image.map(|img| {
            textures.push((texture_key.clone(), img));
            texture_key
        }));
    }

    Ok(ModelData {
        meshes: meshes_from_obj(&models, key),
        textures,
        template: ModelTemplate::new(parts_from_obj(
            &models,
            key,
            &material_keys,
            default_texture_key,
        )),
    })
}

fn mesh_keys(models: &[tobj::Model], key: &str) -> Vec<String> {
    sub_keys(key, models.iter().map(|m| Some(m.name.as_str())))
}

pub fn meshes_from_obj(models: &[tobj::Model], key: &str) -> Vec<MeshData> {
    models
        .iter()
        .zip(mesh_keys(models, key))
        .map(|(m, mesh_key)| {
            let vertices = (0..m.mesh.positions.len() / 3)
                .map(|i| Vertex {
                    position: [
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ],
                    uv: [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                    normal: [
                        m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                })
                .collect::<Vec<_>>();

            MeshData {
                key: mesh_key,
                vertices,
                indices: (!m.mesh.indices.is_empty()).then(|| m.mesh.indices.clone()),
            }
        })
        .collect()
}

/// One part per OBJ object; objects whose material produced no texture use
/// `default_texture_key`.
pub fn parts_from_obj(
    models: &[tobj::Model],
    key: &str,
    material_keys: &[Option<String>],
    default_texture_key: &str,
) -> Vec<ModelPart> {
    models
        .iter()
        .zip(mesh_keys(models, key))
        .map(|(m, mesh_key)| {
            let texture_key = m
                .mesh
                .material_id
                .and_then(|id| material_keys.get(id).cloned().flatten())
                .unwrap_or_else(|| default_texture_key.to_string());
            ModelPart::new(mesh_key, texture_key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJ: &str = "\
o tri
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
o quad
v 0 0 1
v 1 0 1
v 1 1 1
v 0 1 1
f 4 5 6 7
";

    const TWIN_OBJ: &str = "\
o part
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o part
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";

    fn parse() -> Vec<tobj::Model> {
        parse_text(OBJ)
    }

    fn parse_text(text: &str) -> Vec<tobj::Model> {
        let (models, _) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(text)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Err(tobj::LoadError::OpenFileFailed),
        )
        .unwrap();
        models
    }

    #[test]
    fn objects_become_keyed_meshes() {
        let meshes = meshes_from_obj(&parse(), "shapes");
        let keys: Vec<_> = meshes.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["shapes/tri", "shapes/quad"]);

        assert_eq!(meshes[0].vertices.len(), 3);
        assert_eq!(meshes[0].vertices[0].uv, [0.0, 1.0]);
        assert_eq!(meshes[0].vertices[0].normal, [0.0, 0.0, 1.0]);

        assert_eq!(meshes[1].indices.as_ref().map(Vec::len), Some(6));
        assert_eq!(meshes[1].vertices[0].normal, [0.0; 3]);
    }

    #[test]
    fn objects_sharing_a_name_keep_separate_meshes() {
        let models = parse_text(TWIN_OBJ);
        let meshes = meshes_from_obj(&models, "m");
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].key, "m/part/0");
        assert_eq!(meshes[1].key, "m/part/1");
        assert_eq!(meshes[1].vertices[0].position, [0.0, 0.0, 1.0]);

        let parts = parts_from_obj(&models, "m", &[], "default");
        let part_keys: Vec<_> = parts.iter().map(|p| p.mesh_key.clone()).collect();
        let mesh_keys: Vec<_> = meshes.iter().map(|m| m.key.clone()).collect();
        assert_eq!(part_keys, mesh_keys);
    }

    #[test]
    fn untextured_objects_use_default_texture() {
        let models = parse();
        let parts = parts_from_obj(&models, "shapes", &[], "default");
        assert_eq!(
            parts,
            vec![
                ModelPart::new("shapes/tri", "default"),
                ModelPart::new("shapes/quad", "default"),
            ]
        );
    }
}
