//! 선/텍스트 가독성 향상 필터.
//!
//! 대비 강화(128 기준 선형 확장)와 3x3 샤프닝 커널. RGB 채널만 변경하고
//! 알파는 유지한다.

use image::RgbaImage;

/// 샤프닝 커널 (언샤프 마스크 근사)
const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// 대비 강화: `v' = (v - 128) * factor + 128`
pub fn enhance_contrast(image: &mut RgbaImage, factor: f32) {
    for px in image.pixels_mut() {
        for c in 0..3 {
            let v = (px.0[c] as f32 - 128.0) * factor + 128.0;
            px.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// 3x3 샤프닝. 가장자리 1픽셀은 원본 유지.
pub fn sharpen(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return;
    }
    let src = image.clone();
    let (w, h) = (w as usize, h as usize);
    let raw = src.as_raw();
    let out: &mut [u8] = image;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            for c in 0..3 {
                let mut sum = 0i32;
                for ky in 0..3 {
                    for kx in 0..3 {
                        let idx = ((y + ky - 1) * w + (x + kx - 1)) * 4 + c;
                        sum += raw[idx] as i32 * SHARPEN_KERNEL[ky * 3 + kx];
                    }
                }
                out[(y * w + x) * 4 + c] = sum.clamp(0, 255) as u8;
            }
        }
    }
}
