// src/services/image_processor.rs
use crate::errors::ContactSheetError;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Landscape gate. Square and portrait images only pass when the gate is off.
    pub fn admit(&self, img: &DynamicImage, require_landscape: bool) -> bool {
        let (width, height) = img.dimensions();
        !require_landscape || is_landscape(width, height)
    }

    /// Shrink `img` to fit inside `max_width` x `max_height`, keeping its aspect
    /// ratio. Images that already fit are returned untouched.
    pub fn fit_within(&self, img: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
        let (width, height) = img.dimensions();

        if width <= max_width && height <= max_height {
            return img.clone();
        }

        let (new_width, new_height) = fitted_size(width, height, max_width, max_height);
        img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
    }

    pub fn encode_png(&self, img: &DynamicImage) -> Result<Vec<u8>, ContactSheetError> {
        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                ContactSheetError::ImageProcessing(format!("Failed to encode PNG: {}", e))
            })?;

        Ok(output)
    }

    /// Square-bounded review thumbnail, PNG encoded.
    pub fn preview_png(&self, img: &DynamicImage, size: u32) -> Result<Vec<u8>, ContactSheetError> {
        let thumb = self.fit_within(img, size, size);
        self.encode_png(&thumb)
    }
}

pub fn is_landscape(width: u32, height: u32) -> bool {
    width > height
}

fn fitted_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max_width.max(1));
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max_height.max(1));
    (new_width, new_height)
}
