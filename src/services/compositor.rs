// src/services/compositor.rs
use crate::models::{CanvasLayout, TileRect};
use crate::services::image_processor::ImageProcessor;
use image::{DynamicImage, Rgba, RgbaImage, imageops};

/// Lays out up to `columns * rows` images on a transparent canvas, row-major,
/// each shrunk to fit its tile and pasted at the tile's top-left corner.
/// `None` entries become solid placeholder tiles.
pub struct Compositor {
    processor: ImageProcessor,
    placeholder: Rgba<u8>,
}

impl Compositor {
    pub fn new(placeholder_color: [u8; 4]) -> Self {
        Self {
            processor: ImageProcessor::new(),
            placeholder: Rgba(placeholder_color),
        }
    }

    pub fn composite(&self, images: &[Option<DynamicImage>], layout: &CanvasLayout) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(
            layout.canvas_width,
            layout.canvas_height,
            Rgba([255, 255, 255, 0]),
        );

        for (index, entry) in images.iter().take(layout.capacity()).enumerate() {
            let rect = layout.tile_rect(index);
            match entry {
                Some(img) => {
                    let tile = self.processor.fit_within(img, rect.width, rect.height);
                    imageops::overlay(&mut canvas, &tile.to_rgba8(), rect.x as i64, rect.y as i64);
                }
                None => self.fill(&mut canvas, rect),
            }
        }

        canvas
    }

    fn fill(&self, canvas: &mut RgbaImage, rect: TileRect) {
        let x_end = (rect.x + rect.width).min(canvas.width());
        let y_end = (rect.y + rect.height).min(canvas.height());
        for py in rect.y..y_end {
            for px in rect.x..x_end {
                canvas.put_pixel(px, py, self.placeholder);
            }
        }
    }
}
