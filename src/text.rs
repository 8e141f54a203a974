// Text rendering module
// Rasters labels into the shm canvas via cosmic-text

use cosmic_text::{Attrs, Buffer, Color, FontSystem, Metrics, Shaping, SwashCache};

pub struct TextPainter {
    font_system: FontSystem,
    cache: SwashCache,
}

impl TextPainter {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            cache: SwashCache::new(),
        }
    }

    /// Draw a single line of text at (x, y) on a BGRA canvas.
    ///
    /// `color` is BGRA to match the canvas layout.
    pub fn draw(
        &mut self,
        canvas: &mut [u8],
        canvas_width: u32,
        canvas_height: u32,
        x: i32,
        y: i32,
        font_size: f32,
        text: &str,
        color: [u8; 4],
    ) {
        let metrics = Metrics::new(font_size, font_size * 1.3);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);

        let avail = (canvas_width as i32 - x).max(0) as f32;
        buffer.set_size(&mut self.font_system, Some(avail), Some(font_size * 2.0));
        buffer.set_text(&mut self.font_system, text, Attrs::new(), Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let text_color = Color::rgba(color[2], color[1], color[0], color[3]);
        buffer.draw(
            &mut self.font_system,
            &mut self.cache,
            text_color,
            |gx, gy, gw, gh, c| {
                let alpha = c.a() as u32;
                if alpha == 0 {
                    return;
                }
                for dy in 0..gh as i32 {
                    for dx in 0..gw as i32 {
                        let px = x + gx + dx;
                        let py = y + gy + dy;
                        if px < 0 || py < 0 {
                            continue;
                        }
                        let (px, py) = (px as u32, py as u32);
                        if px >= canvas_width || py >= canvas_height {
                            continue;
                        }
                        let idx = ((py * canvas_width + px) * 4) as usize;
                        if idx + 3 >= canvas.len() {
                            continue;
                        }
                        // BGRA alpha-over blend
                        let inv = 255 - alpha;
                        canvas[idx] = ((c.b() as u32 * alpha + canvas[idx] as u32 * inv) / 255) as u8;
                        canvas[idx + 1] =
                            ((c.g() as u32 * alpha + canvas[idx + 1] as u32 * inv) / 255) as u8;
                        canvas[idx + 2] =
                            ((c.r() as u32 * alpha + canvas[idx + 2] as u32 * inv) / 255) as u8;
                        canvas[idx + 3] = canvas[idx + 3].max(alpha as u8);
                    }
                }
            },
        );
    }
}
