use image::{DynamicImage, GenericImageView};

/// Smallest width and height, in pixels, of an image worth keeping.
pub const MIN_PHOTO_DIMENSION: u32 = 100;

/// Outcome of inspecting one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoVerdict {
    Accept,
    /// Narrower or shorter than the configured minimum.
    TooSmall,
    /// Every sample of every channel is zero.
    AllBlack,
}

/// Size and color heuristics separating photos from icons, logos and blank
/// placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoFilter {
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for PhotoFilter {
    fn default() -> Self {
        Self {
            min_width: MIN_PHOTO_DIMENSION,
            min_height: MIN_PHOTO_DIMENSION,
        }
    }
}

impl PhotoFilter {
    pub fn new(min_width: u32, min_height: u32) -> Self {
        Self {
            min_width,
            min_height,
        }
    }

    pub fn inspect(&self, image: &DynamicImage) -> PhotoVerdict {
        let (width, height) = image.dimensions();
        if width < self.min_width || height < self.min_height {
            return PhotoVerdict::TooSmall;
        }
        if is_all_black(image) {
            return PhotoVerdict::AllBlack;
        }
        PhotoVerdict::Accept
    }

    pub fn accepts(&self, image: &DynamicImage) -> bool {
        self.inspect(image) == PhotoVerdict::Accept
    }
}

/// Whether `image` passes the default 100×100, not-all-black check.
pub fn is_real_photo(image: &DynamicImage) -> bool {
    PhotoFilter::default().accepts(image)
}

/// True when every channel's extrema are (0, 0). A zero sample is all-zero
/// bytes in every pixel layout the image crate offers, floats included.
fn is_all_black(image: &DynamicImage) -> bool {
    image.as_bytes().iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn rejects_narrow_image() {
        assert!(!is_real_photo(&gradient(50, 200)));
        assert!(!is_real_photo(&gradient(200, 99)));
        assert_eq!(
            PhotoFilter::default().inspect(&gradient(50, 200)),
            PhotoVerdict::TooSmall
        );
    }

    #[test]
    fn boundary_size_is_accepted() {
        assert!(is_real_photo(&gradient(100, 100)));
    }

    #[test]
    fn rejects_all_black_at_any_size() {
        let black = DynamicImage::ImageRgb8(RgbImage::new(1024, 768));
        assert!(!is_real_photo(&black));
        assert_eq!(
            PhotoFilter::default().inspect(&black),
            PhotoVerdict::AllBlack
        );

        let black_gray = DynamicImage::ImageLuma8(GrayImage::new(300, 300));
        assert!(!is_real_photo(&black_gray));
    }

    #[test]
    fn single_lit_pixel_is_not_black() {
        let mut img = GrayImage::new(300, 300);
        img.put_pixel(150, 150, Luma([1]));
        assert!(is_real_photo(&DynamicImage::ImageLuma8(img)));
    }

    #[test]
    fn transparent_black_counts_as_black_only_if_alpha_is_zero() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::new(200, 200));
        assert!(!is_real_photo(&transparent));

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            200,
            image::Rgba([0, 0, 0, 255]),
        ));
        assert!(is_real_photo(&opaque));
    }

    #[test]
    fn accepts_normal_photo() {
        assert!(is_real_photo(&gradient(640, 480)));
    }

    #[test]
    fn custom_thresholds() {
        let filter = PhotoFilter::new(10, 10);
        assert!(filter.accepts(&gradient(50, 50)));
        assert!(!PhotoFilter::new(700, 10).accepts(&gradient(640, 480)));
    }
}
