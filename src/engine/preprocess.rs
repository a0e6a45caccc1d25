//! Image preprocessing for the learned back-ends

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use ndarray::Array4;

/// Input size of the YOLO face detector
pub const DETECTOR_INPUT_SIZE: (u32, u32) = (640, 640);

/// Letterbox padding value used by YOLO exports
const PAD_VALUE: u8 = 114;

/// Resize image with padding to maintain aspect ratio
pub fn letterbox(image: &DynamicImage, target_w: u32, target_h: u32) -> DynamicImage {
    let info = ResizeInfo::new(image.dimensions(), (target_w, target_h));
    let new_w = ((info.original_width as f32 * info.scale) as u32).clamp(1, target_w);
    let new_h = ((info.original_height as f32 * info.scale) as u32).clamp(1, target_h);

    let resized = image
        .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut padded = ImageBuffer::from_pixel(target_w, target_h, Rgb([PAD_VALUE; 3]));
    image::imageops::replace(&mut padded, &resized, info.offset_x as i64, info.offset_y as i64);

    DynamicImage::ImageRgb8(padded)
}

/// RGB image to a `[1, 3, H, W]` tensor scaled to [0, 1]
pub fn image_to_nchw(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

/// Image to a `[1, H, W, C]` tensor scaled to [0, 1].
///
/// `channels` is 1 (grayscale) or 3 (RGB), matching Keras-style exports.
pub fn image_to_nhwc(image: &DynamicImage, channels: usize) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, channels));

    if channels == 1 {
        let gray = image.to_luma8();
        for (x, y, pixel) in gray.enumerate_pixels() {
            tensor[[0, y as usize, x as usize, 0]] = pixel[0] as f32 / 255.0;
        }
    } else {
        let rgb = image.to_rgb8();
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Letterbox geometry, used to map detections back to the source image
#[derive(Debug, Clone, Copy)]
pub struct ResizeInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl ResizeInfo {
    pub fn new(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        let scale = f32::min(
            target_w as f32 / orig_w.max(1) as f32,
            target_h as f32 / orig_h.max(1) as f32,
        );

        let new_w = ((orig_w as f32 * scale) as u32).min(target_w);
        let new_h = ((orig_h as f32 * scale) as u32).min(target_h);

        Self {
            scale,
            offset_x: (target_w - new_w) / 2,
            offset_y: (target_h - new_h) / 2,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Convert detection coordinates back to original image space
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.offset_x as f32) / self.scale;
        let y = (y - self.offset_y as f32) / self.scale;
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_info_wide_image() {
        let info = ResizeInfo::new((1280, 640), (640, 640));
        assert!((info.scale - 0.5).abs() < 1e-6);
        assert_eq!(info.offset_x, 0);
        assert_eq!(info.offset_y, 160);

        let (x, y) = info.to_original(320.0, 320.0);
        assert!((x - 640.0).abs() < 1e-3);
        assert!((y - 320.0).abs() < 1e-3);
    }

    #[test]
    fn test_letterbox_dimensions() {
        let image = DynamicImage::new_rgb8(300, 100);
        let boxed = letterbox(&image, 640, 640);
        assert_eq!(boxed.dimensions(), (640, 640));
        // Padding rows keep the pad colour
        assert_eq!(boxed.to_rgb8().get_pixel(0, 0).0, [PAD_VALUE; 3]);
    }

    #[test]
    fn test_nhwc_shape_and_scale() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 2, Rgb([255u8, 0, 51])));
        let tensor = image_to_nhwc(&image, 3);
        assert_eq!(tensor.shape(), &[1, 2, 4, 3]);
        assert!((tensor[[0, 1, 3, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 3, 2]] - 0.2).abs() < 1e-6);

        let gray = image_to_nhwc(&image, 1);
        assert_eq!(gray.shape(), &[1, 2, 4, 1]);
    }

    #[test]
    fn test_nchw_shape() {
        let tensor = image_to_nchw(&DynamicImage::new_rgb8(5, 3));
        assert_eq!(tensor.shape(), &[1, 3, 3, 5]);
    }
}
