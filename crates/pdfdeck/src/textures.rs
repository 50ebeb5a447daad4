use std::collections::HashMap;

use eframe::egui;
use tracing::warn;

use crate::slides::Slide;

/// Decoded slide images, uploaded to the GPU once per slide.
#[derive(Default)]
pub struct SlideTextures {
    entries: HashMap<usize, Option<egui::TextureHandle>>,
}

impl SlideTextures {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Texture for slide `index`, decoding it on first use. A slide whose
    /// image cannot be decoded yields `None` every time without retrying.
    pub fn get(
        &mut self,
        ctx: &egui::Context,
        index: usize,
        slide: &Slide,
    ) -> Option<&egui::TextureHandle> {
        self.entries
            .entry(index)
            .or_insert_with(|| match decode_slide_image(slide) {
                Ok(image) => Some(ctx.load_texture(
                    format!("slide-{}", slide.page),
                    image,
                    egui::TextureOptions::LINEAR,
                )),
                Err(e) => {
                    warn!(page = slide.page, "could not decode slide image: {e}");
                    None
                }
            })
            .as_ref()
    }
}

pub fn decode_slide_image(slide: &Slide) -> Result<egui::ColorImage, String> {
    let bytes = slide
        .image_bytes()
        .map_err(|e| format!("invalid base64: {e}"))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| e.to_string())?
        .into_rgba8();
    let (w, h) = image.dimensions();
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        [w as usize, h as usize],
        image.as_raw(),
    ))
}
