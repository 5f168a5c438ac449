//! 종횡비 보존 리사이즈.
//!
//! 목표 크기 계산 + fast_image_resize 기반 고품질 리샘플.

use fast_image_resize::{images::Image as FirImage, FilterType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbaImage;
use sightline_core::error::CoreError;
use tracing::debug;

/// 한도 (max_width, max_height) 안에 들어가는 종횡비 보존 크기.
///
/// 이미 한도 안이면 원본 크기 그대로. 가로형은 너비 기준으로 맞춘 뒤 높이를,
/// 세로형/정사각형은 높이 기준으로 맞춘 뒤 너비를 재확인한다.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);
    let aspect = width as f64 / height as f64;

    let (mut w, mut h);
    if aspect > 1.0 {
        w = width.min(max_width);
        h = (w as f64 / aspect).round() as u32;
        if h > max_height {
            h = max_height;
            w = (h as f64 * aspect).round() as u32;
        }
    } else {
        h = height.min(max_height);
        w = (h as f64 * aspect).round() as u32;
        if w > max_width {
            w = max_width;
            h = (w as f64 / aspect).round() as u32;
        }
    }

    (w.clamp(1, max_width), h.clamp(1, max_height))
}

/// 고품질 리샘플
///
/// `preserve_lines`면 Lanczos3, 아니면 CatmullRom.
pub fn resample(
    image: &RgbaImage,
    width: u32,
    height: u32,
    preserve_lines: bool,
) -> Result<RgbaImage, CoreError> {
    let (src_w, src_h) = image.dimensions();

    if src_w == width && src_h == height {
        return Ok(image.clone());
    }
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Internal("소스 이미지 크기 0".to_string()));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Internal("목표 이미지 크기 0".to_string()));
    }

    let src_image = FirImage::from_vec_u8(
        src_w,
        src_h,
        image.as_raw().clone(),
        fast_image_resize::PixelType::U8x4,
    )
    .map_err(|e| CoreError::Internal(format!("소스 이미지 생성 실패: {e}")))?;

    let mut dst_image = FirImage::new(width, height, fast_image_resize::PixelType::U8x4);

    let filter = if preserve_lines {
        FilterType::Lanczos3
    } else {
        FilterType::CatmullRom
    };
    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(filter));

    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Internal(format!("리사이즈 실패: {e}")))?;

    debug!("리샘플: {}x{} → {}x{} ({:?})", src_w, src_h, width, height, filter);

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CoreError::Internal("결과 이미지 생성 실패".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn assert_aspect(w: u32, h: u32, out: (u32, u32)) {
        let expected_h = out.0 as f64 * h as f64 / w as f64;
        assert!(
            (out.1 as f64 - expected_h).abs() <= 1.0,
            "{w}x{h} → {out:?} 종횡비 불일치"
        );
    }

    #[test]
    fn within_bounds_is_untouched() {
        assert_eq!(fit_within(800, 600, 1024, 1024), (800, 600));
        assert_eq!(fit_within(1024, 1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn landscape_4000x3000() {
        assert_eq!(fit_within(4000, 3000, 1024, 1024), (1024, 768));
    }

    #[test]
    fn portrait_fits_height() {
        let out = fit_within(3000, 4000, 1024, 1024);
        assert_eq!(out, (768, 1024));
    }

    #[test]
    fn wide_landscape_rechecks_height() {
        // 가로 한도가 넉넉하고 세로 한도가 빡빡한 경우
        let out = fit_within(4000, 3000, 2000, 500);
        assert_eq!(out.1, 500);
        assert_aspect(4000, 3000, out);
    }

    #[test]
    fn tall_portrait_rechecks_width() {
        let out = fit_within(1000, 1200, 300, 1000);
        assert_eq!(out.0, 300);
        assert_aspect(1000, 1200, out);
    }

    #[test]
    fn aspect_and_bounds_hold_across_shapes() {
        let shapes = [
            (4000, 3000),
            (3000, 4000),
            (5000, 5000),
            (1921, 1079),
            (7, 3000),
            (3000, 7),
            (1025, 1),
        ];
        for (w, h) in shapes {
            let out = fit_within(w, h, 1024, 1024);
            assert!(out.0 <= 1024 && out.1 <= 1024, "{w}x{h} → {out:?}");
            assert!(out.0 >= 1 && out.1 >= 1);
            if out.0 > 10 && out.1 > 10 {
                assert_aspect(w, h, out);
            }
        }
    }

    #[test]
    fn resample_basic() {
        let img = RgbaImage::from_pixel(400, 300, Rgba([100, 100, 100, 255]));
        let out = resample(&img, 200, 150, true).unwrap();
        assert_eq!(out.dimensions(), (200, 150));
        assert_eq!(out.get_pixel(10, 10).0, [100, 100, 100, 255]);
    }

    #[test]
    fn same_size_noop() {
        let img = RgbaImage::from_pixel(48, 27, Rgba([1, 2, 3, 255]));
        let out = resample(&img, 48, 27, false).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn zero_size_target_error() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        assert!(resample(&img, 0, 10, true).is_err());
    }
}
