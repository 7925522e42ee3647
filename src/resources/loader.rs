//! Byte and text loading for asset files.
//!
//! Natively, paths are read from the file system as given. On wasm32 they are
//! fetched relative to the page origin.

use std::collections::{HashMap, HashSet};

use crate::data_structures::{mesh::Vertex, model::ModelTemplate};

/// CPU-side mesh produced by a model loader.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub key: String,
    pub vertices: Vec<Vertex>,
    pub indices: Option<Vec<u32>>,
}

/// Everything a model file contributes to the registries: meshes, decoded
/// textures and the template tying them together.
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub textures: Vec<(String, image::DynamicImage)>,
    pub template: ModelTemplate,
}

/// `"{key}/{name}"`, falling back to the index for unnamed entries.
pub fn sub_key(key: &str, name: Option<&str>, index: usize) -> String {
    match name.filter(|name| !name.is_empty()) {
        Some(name) => format!("{key}/{name}"),
        None => format!("{key}/{index}"),
    }
}

/// [`sub_key`] for a whole list of entries. A name shared by several
/// entries, or one that clashes with an earlier key, gets its index
/// appended so every entry keeps a key of its own.
pub fn sub_keys<'a>(key: &str, names: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    let names: Vec<Option<&str>> = names.into_iter().collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names.iter().flatten().filter(|name| !name.is_empty()) {
        *counts.entry(*name).or_default() += 1;
    }

    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let repeated = name.is_some_and(|name| counts.get(name).copied().unwrap_or(0) > 1);
            let mut sub = sub_key(key, *name, idx);
            if repeated || seen.contains(&sub) {
                sub = format!("{sub}/{idx}");
            }
            seen.insert(sub.clone());
            sub
        })
        .collect()
}

/// Resolves `name` next to the file at `base`.
pub fn sibling_path(base: &str, name: &str) -> String {
    match base.rfind('/') {
        Some(idx) if !name.starts_with('/') => format!("{}/{name}", &base[..idx]),
        _ => name.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    use anyhow::Context as _;

    let window = web_sys::window().context("No window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("Could not read page origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        use anyhow::Context as _;
        std::fs::read_to_string(file_name).with_context(|| format!("Could not read {file_name}"))?
    };

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        use anyhow::Context as _;
        std::fs::read(file_name).with_context(|| format!("Could not read {file_name}"))?
    };

    Ok(data)
}

/// Fetches and decodes an image file.
pub async fn load_image(file_name: &str) -> anyhow::Result<image::DynamicImage> {
    let bytes = load_binary(file_name).await?;
    Ok(image::load_from_memory(&bytes)?)
}

/// 1×1 image of a linear RGBA colour in `0..=1`.
pub fn solid_image(rgba: [f32; 4]) -> image::DynamicImage {
    let pixel = rgba.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8);
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(1, 1, image::Rgba(pixel)))
}
