// Animation module
// Decodes GIFs (and still images) into BGRA frames ready for the shm buffer

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Fallback delay for frames that declare none (the common 0-delay GIF)
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Lower bound on frame delay so a malformed file cannot spin the loop
const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum AnimationError {
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image contains no frames")]
    NoFrames,
}

/// A single decoded frame
#[derive(Debug, Clone)]
pub struct AnimFrame {
    /// BGRA pixel data (little-endian ARGB8888 memory layout)
    pub bgra: Vec<u8>,
    /// How long this frame stays on screen
    pub delay: Duration,
}

/// A decoded animation: one or more frames sharing the natural size
#[derive(Debug, Clone)]
pub struct Animation {
    /// Natural width in pixels (first frame)
    pub width: u32,
    /// Natural height in pixels (first frame)
    pub height: u32,
    pub frames: Vec<AnimFrame>,
}

impl Animation {
    /// Load an animation from a file path.
    ///
    /// GIFs decode into their full frame list with per-frame delays; any
    /// other supported format loads as a single still frame.
    pub fn load(path: &Path) -> Result<Self, AnimationError> {
        let data = fs::read(path)?;
        let format = image::guess_format(&data)?;

        if format == ImageFormat::Gif {
            Self::from_gif_bytes(&data)
        } else {
            Self::from_still_bytes(&data, format)
        }
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    fn from_gif_bytes(data: &[u8]) -> Result<Self, AnimationError> {
        let decoder = GifDecoder::new(Cursor::new(data))?;
        let frames = decoder.into_frames().collect_frames()?;

        if frames.is_empty() {
            return Err(AnimationError::NoFrames);
        }

        let first = frames[0].buffer();
        let (width, height) = first.dimensions();

        let frames = frames
            .into_iter()
            .map(|frame| {
                let delay = normalize_delay(frame.delay());
                let bgra = rgba_to_bgra(frame.into_buffer().into_raw());
                AnimFrame { bgra, delay }
            })
            .collect();

        Ok(Self {
            width,
            height,
            frames,
        })
    }

    fn from_still_bytes(data: &[u8], format: ImageFormat) -> Result<Self, AnimationError> {
        let img = image::load(Cursor::new(data), format)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(Self {
            width,
            height,
            frames: vec![AnimFrame {
                bgra: rgba_to_bgra(rgba.into_raw()),
                delay: DEFAULT_FRAME_DELAY,
            }],
        })
    }
}

fn normalize_delay(delay: image::Delay) -> Duration {
    let (numer, denom) = delay.numer_denom_ms();
    if numer == 0 || denom == 0 {
        return DEFAULT_FRAME_DELAY;
    }
    Duration::from_millis((numer / denom) as u64).max(MIN_FRAME_DELAY)
}

/// Convert RGBA bytes to BGRA in place (Wayland expects ARGB/BGRA in
/// little-endian).
fn rgba_to_bgra(mut data: Vec<u8>) -> Vec<u8> {
    for pixel in data.chunks_exact_mut(4) {
        pixel.swap(0, 2); // Swap R and B
    }
    data
}

/// Scale a BGRA frame to the target size with bilinear interpolation.
///
/// Free scale: the frame fills the target exactly, distorting aspect ratio
/// when the target differs from the natural proportions.
pub fn scale_bilinear(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let mut dst = vec![0u8; (dst_w * dst_h * 4) as usize];
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return dst;
    }

    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;

    for y in 0..dst_h {
        for x in 0..dst_w {
            let src_x = x as f32 * scale_x;
            let src_y = y as f32 * scale_y;

            let x0 = src_x.floor() as u32;
            let y0 = src_y.floor() as u32;
            let x1 = (x0 + 1).min(src_w - 1);
            let y1 = (y0 + 1).min(src_h - 1);

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let get_pixel = |px: u32, py: u32| -> [u8; 4] {
                let idx = ((py * src_w + px) * 4) as usize;
                if idx + 3 < src.len() {
                    [src[idx], src[idx + 1], src[idx + 2], src[idx + 3]]
                } else {
                    [0, 0, 0, 0]
                }
            };

            let p00 = get_pixel(x0, y0);
            let p10 = get_pixel(x1, y0);
            let p01 = get_pixel(x0, y1);
            let p11 = get_pixel(x1, y1);

            let interpolate = |c: usize| -> u8 {
                let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                let v = v0 * (1.0 - fy) + v1 * fy;
                v.round().clamp(0.0, 255.0) as u8
            };

            let dst_idx = ((y * dst_w + x) * 4) as usize;
            dst[dst_idx] = interpolate(0);
            dst[dst_idx + 1] = interpolate(1);
            dst[dst_idx + 2] = interpolate(2);
            dst[dst_idx + 3] = interpolate(3);
        }
    }

    dst
}

/// Fast nearest-neighbor scale for responsive live resizing.
pub fn scale_nearest(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let mut dst = vec![0u8; (dst_w * dst_h * 4) as usize];
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return dst;
    }

    // Fixed-point scale factors for integer-only row math
    let scale_x_fp = ((src_w as u64) << 16) / dst_w as u64;
    let scale_y_fp = ((src_h as u64) << 16) / dst_h as u64;
    let src_stride = (src_w * 4) as usize;

    let x_lut: Vec<usize> = (0..dst_w)
        .map(|x| {
            let src_x = ((x as u64 * scale_x_fp) >> 16) as u32;
            (src_x.min(src_w - 1) * 4) as usize
        })
        .collect();

    for y in 0..dst_h {
        let src_y = (((y as u64) * scale_y_fp) >> 16) as u32;
        let src_row = src_y.min(src_h - 1) as usize * src_stride;
        let dst_row = (y * dst_w * 4) as usize;

        for (x, &src_off) in x_lut.iter().enumerate() {
            let src_idx = src_row + src_off;
            let dst_idx = dst_row + x * 4;
            if src_idx + 3 < src.len() {
                dst[dst_idx..dst_idx + 4].copy_from_slice(&src[src_idx..src_idx + 4]);
            }
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};

    fn write_test_gif(path: &Path, frames: u32, width: u32, height: u32) {
        let file = std::fs::File::create(path).unwrap();
        let mut encoder = GifEncoder::new(file);
        let frames = (0..frames).map(|i| {
            let shade = (i * 40) as u8;
            let img = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255, 255]));
            Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(120, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }

    #[test]
    fn gif_decodes_all_frames_with_natural_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        write_test_gif(&path, 3, 8, 5);

        let anim = Animation::load(&path).unwrap();
        assert_eq!(anim.frames.len(), 3);
        assert_eq!((anim.width, anim.height), (8, 5));
        assert!(anim.is_animated());
        for frame in &anim.frames {
            assert_eq!(frame.bgra.len(), 8 * 5 * 4);
            assert_eq!(frame.delay, Duration::from_millis(120));
        }
    }

    #[test]
    fn still_image_loads_as_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbaImage::from_pixel(6, 4, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let anim = Animation::load(&path).unwrap();
        assert_eq!(anim.frames.len(), 1);
        assert_eq!((anim.width, anim.height), (6, 4));
        assert!(!anim.is_animated());

        // PNG stores RGBA; the frame must come out BGRA
        assert_eq!(&anim.frames[0].bgra[0..4], &[30, 20, 10, 255]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Animation::load(Path::new("/nonexistent/nope.gif")).unwrap_err();
        assert!(matches!(err, AnimationError::Io(_)));
    }

    #[test]
    fn undecodable_bytes_are_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.gif");
        std::fs::write(&path, b"not a gif at all").unwrap();

        let err = Animation::load(&path).unwrap_err();
        assert!(matches!(err, AnimationError::Decode(_)));
    }

    #[test]
    fn scalers_fill_target_exactly() {
        let src = vec![255u8; 4 * 4 * 4];
        let out = scale_bilinear(&src, 4, 4, 10, 3);
        assert_eq!(out.len(), 10 * 3 * 4);
        assert!(out.iter().all(|&b| b == 255));

        let out = scale_nearest(&src, 4, 4, 7, 9);
        assert_eq!(out.len(), 7 * 9 * 4);
        assert!(out.iter().all(|&b| b == 255));
    }

    #[test]
    fn nearest_preserves_solid_color() {
        let mut src = Vec::new();
        for _ in 0..4 {
            src.extend_from_slice(&[1, 2, 3, 4]);
        }
        let out = scale_nearest(&src, 2, 2, 5, 5);
        for pixel in out.chunks_exact(4) {
            assert_eq!(pixel, &[1, 2, 3, 4]);
        }
    }
}
