// Wayland integration module
// Layer-shell overlay surface, pointer handling, in-surface menu and the
// resize/opacity editor, all driven by a single calloop event loop

use crate::animation::{self, Animation};
use crate::config::ConfigPaths;
use crate::dialogs;
use crate::library;
use crate::state::{
    DragState, MenuEntry, OverlayState, MAX_DIM, MAX_OPACITY, MIN_DIM, MIN_OPACITY,
};
use crate::text::TextPainter;
use crate::tray::{self, TrayCommand};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::calloop::channel::{self, Event},
    reexports::calloop::EventLoop,
    reexports::calloop_wayland_source::WaylandSource,
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_output, wl_pointer, wl_seat, wl_surface},
    Connection, QueueHandle,
};
use wayland_client::protocol::wl_shm;

/// Mouse button constants
const BTN_LEFT: u32 = 272;
const BTN_RIGHT: u32 = 273;

/// Maximum window size to prevent buffer allocation failures
const MAX_SIZE: u32 = 4096;

/// Maximum buffer size (64MB to avoid Wayland buffer issues)
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Opacity adjustment step for scroll wheel
const OPACITY_STEP: f32 = 0.05;

/// Event loop dispatch timeout; doubles as the animation clock granularity
const DISPATCH_TIMEOUT: Duration = Duration::from_millis(16);

/// Menu metrics
const MENU_ITEM_HEIGHT: u32 = 25;
const MENU_WIDTH: u32 = 200;
const MENU_FONT_SIZE: f32 = 13.0;

/// Resize & opacity editor metrics
const PANEL_WIDTH: u32 = 250;
const PANEL_ROW_HEIGHT: u32 = 36;
const PANEL_PADDING: u32 = 8;
const TRACK_LEFT: u32 = 84;
const TRACK_RIGHT_MARGIN: u32 = 16;
const HANDLE_WIDTH: u32 = 8;

/// Context menu state
#[derive(Debug, Clone, Copy, PartialEq)]
enum MenuState {
    Hidden,
    Visible,
}

/// Which editor slider is being manipulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliderKind {
    Width,
    Height,
    Opacity,
}

/// What a click inside the editor panel landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelHit {
    Slider(SliderKind),
    Done,
    Inside,
    Outside,
}

/// Rectangle of the editor panel within the window
#[derive(Debug, Clone, Copy)]
struct PanelRect {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

fn panel_rect(window_width: u32, window_height: u32) -> PanelRect {
    let width = PANEL_WIDTH.min(window_width);
    let height = 4 * PANEL_ROW_HEIGHT + 2 * PANEL_PADDING;
    PanelRect {
        x: ((window_width.saturating_sub(width)) / 2) as i32,
        y: ((window_height.saturating_sub(height)) / 2) as i32,
        width,
        height,
    }
}

/// Map a slider fraction in [0, 1] to a value in [min, max].
fn fraction_to_value(frac: f32, min: f32, max: f32) -> f32 {
    min + frac.clamp(0.0, 1.0) * (max - min)
}

/// Map a value to its slider fraction, clamped to [0, 1].
fn value_to_fraction(value: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Main overlay application state
struct OverlayApp {
    // Registry state
    registry_state: RegistryState,
    seat_state: SeatState,
    output_state: OutputState,
    shm: Shm,
    layer_shell: LayerShell,
    compositor_state: CompositorState,
    qh: QueueHandle<Self>,

    // Configuration and interaction state
    paths: ConfigPaths,
    state: OverlayState,

    // Decoded animation and the per-size frame cache
    animation: Option<Animation>,
    scaled_frames: Vec<Vec<u8>>,
    scaled_size: (u32, u32),
    frame_index: usize,
    next_frame_at: Option<Instant>,

    // Surface and buffer management
    layer_surface: Option<LayerSurface>,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    configured: bool,
    visible: bool,
    shown_once: bool,

    // Window position (margins from top-left)
    margin_left: i32,
    margin_top: i32,
    drag_start_margin: (i32, i32),

    // Pointer state
    pointer_pos: (f64, f64),

    // Context menu
    menu_state: MenuState,
    menu_pos: (i32, i32),
    menu_hover_item: Option<usize>,

    // Resize & opacity editor
    editor_visible: bool,
    editor_drag: Option<SliderKind>,

    painter: TextPainter,
    needs_redraw: bool,
    should_exit: bool,
}

impl OverlayApp {
    /// Load an image and apply the geometry contract.
    ///
    /// A failed load is a logged no-op; the current image keeps playing.
    fn load_image(&mut self, path: &Path, reset: bool) {
        let anim = match Animation::load(path) {
            Ok(anim) => anim,
            Err(e) => {
                warn!("Ignoring image load for {}: {}", path.display(), e);
                return;
            }
        };

        info!(
            "Loaded {} ({} frames, {}x{})",
            path.display(),
            anim.frames.len(),
            anim.width,
            anim.height
        );

        let saved = if reset { None } else { self.paths.load_settings() };
        let natural = (anim.width, anim.height);
        let persist = self
            .state
            .apply_load(path.to_path_buf(), natural, reset, saved);
        if persist {
            self.paths.save_settings(self.state.settings());
        }
        self.paths.save_last_path(path);

        self.animation = Some(anim);
        self.scaled_frames.clear();
        self.scaled_size = (0, 0);
        self.frame_index = 0;
        self.next_frame_at = None;
        self.arm_frame_clock();

        self.menu_state = MenuState::Hidden;
        self.update_size();
    }

    /// Schedule the next animation frame when playback is active.
    fn arm_frame_clock(&mut self) {
        let Some(anim) = &self.animation else {
            self.next_frame_at = None;
            return;
        };
        if !anim.is_animated() || self.state.paused || !self.visible {
            self.next_frame_at = None;
            return;
        }
        let delay = anim.frames[self.frame_index].delay;
        self.next_frame_at = Some(Instant::now() + delay);
    }

    /// Advance the animation clock. Called every loop iteration.
    fn tick(&mut self) {
        let Some(due) = self.next_frame_at else { return };
        if Instant::now() < due {
            return;
        }
        let Some(anim) = &self.animation else { return };
        self.frame_index = (self.frame_index + 1) % anim.frames.len();
        self.next_frame_at = Some(Instant::now() + anim.frames[self.frame_index].delay);
        self.needs_redraw = true;
    }

    fn toggle_pause(&mut self) {
        self.state.toggle_pause();
        if self.state.paused {
            self.next_frame_at = None;
        } else {
            self.arm_frame_clock();
        }
    }

    /// Nudge opacity by delta within the slider range and persist the triple.
    fn adjust_opacity(&mut self, delta: f32) {
        let new_opacity = (self.state.opacity + delta).clamp(MIN_OPACITY, MAX_OPACITY);
        if (new_opacity - self.state.opacity).abs() > f32::EPSILON {
            self.state.opacity = new_opacity;
            debug!("Opacity adjusted to: {:.2}", self.state.opacity);
            self.paths.save_settings(self.state.settings());
            self.needs_redraw = true;
        }
    }

    /// Update window position using layer shell margins
    fn update_position(&mut self) {
        if let Some(ref layer_surface) = self.layer_surface {
            layer_surface.set_anchor(Anchor::TOP | Anchor::LEFT);
            layer_surface.set_margin(self.margin_top, 0, 0, self.margin_left);
            layer_surface.commit();
        }
    }

    /// Push the current geometry to the layer surface. The shm pool is kept;
    /// the draw path grows it in place when the new size needs more room.
    fn update_size(&mut self) {
        if let Some(ref layer_surface) = self.layer_surface {
            layer_surface.set_size(self.state.width.min(MAX_SIZE), self.state.height.min(MAX_SIZE));
            layer_surface.commit();
        }
        self.needs_redraw = true;
    }

    fn create_overlay_surface(&mut self) {
        if self.layer_surface.is_some() {
            return;
        }
        let surface = self.compositor_state.create_surface(&self.qh);
        let layer_surface = self.layer_shell.create_layer_surface(
            &self.qh,
            surface,
            Layer::Overlay,
            Some("gifpin"),
            None,
        );

        layer_surface.set_anchor(Anchor::TOP | Anchor::LEFT);
        layer_surface.set_margin(self.margin_top, 0, 0, self.margin_left);
        layer_surface.set_size(self.state.width.min(MAX_SIZE), self.state.height.min(MAX_SIZE));
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer_surface.commit();

        self.layer_surface = Some(layer_surface);
        self.visible = true;
        self.configured = false;
    }

    /// Hide to tray: tear the surface down, keep every bit of state.
    fn hide_window(&mut self) {
        info!("Hiding overlay to tray");
        self.layer_surface = None;
        self.pool = None;
        self.buffer = None;
        self.configured = false;
        self.visible = false;
        self.next_frame_at = None;
        self.menu_state = MenuState::Hidden;
        self.editor_visible = false;
        self.editor_drag = None;
        self.state.end_drag();
    }

    fn show_window(&mut self) {
        if self.visible {
            return;
        }
        info!("Restoring overlay from tray");
        self.create_overlay_surface();
        self.arm_frame_clock();
    }

    fn handle_tray(&mut self, command: TrayCommand) {
        match command {
            TrayCommand::ToggleVisible => {
                if self.visible {
                    self.hide_window();
                } else {
                    self.show_window();
                }
            }
            TrayCommand::ShowWindow => self.show_window(),
            TrayCommand::Quit => self.should_exit = true,
        }
    }

    /// Dispatch one selected menu entry.
    fn handle_menu_entry(&mut self, entry: MenuEntry) {
        self.menu_state = MenuState::Hidden;
        self.needs_redraw = true;

        match entry {
            MenuEntry::OpenFile => {
                if let Some(path) = dialogs::pick_gif(None) {
                    self.load_image(&path, true);
                }
            }
            MenuEntry::OpenSaved => {
                if !library::collection_exists(&self.paths.save_dir) {
                    dialogs::show_info("Saved GIFs", "No saved GIFs yet.");
                    return;
                }
                let save_dir = self.paths.save_dir.clone();
                if let Some(path) = dialogs::pick_gif(Some(&save_dir)) {
                    self.load_image(&path, true);
                }
            }
            MenuEntry::ResizeOpacity => {
                self.editor_visible = true;
            }
            MenuEntry::TogglePause => self.toggle_pause(),
            MenuEntry::SaveToCollection => self.save_to_collection(),
            MenuEntry::Minimize => self.hide_window(),
            MenuEntry::Quit => {
                info!("Menu: Quit selected");
                self.should_exit = true;
            }
            MenuEntry::Lock => {
                info!("Position locked");
                self.state.lock();
            }
            MenuEntry::Unlock => {
                info!("Position unlocked");
                self.state.unlock();
            }
        }
    }

    fn save_to_collection(&mut self) {
        let Some(source) = self.state.current_path.clone() else {
            return;
        };
        if !source.exists() {
            warn!("Save skipped, source vanished: {}", source.display());
            return;
        }

        let default_name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(name) = dialogs::prompt_text("Save GIF", "Filename:", &default_name) else {
            return;
        };

        match library::save_to_collection(&self.paths.save_dir, &source, &name) {
            Ok(dest) => {
                info!("Saved copy to {}", dest.display());
                dialogs::show_info("Save GIF", &format!("GIF saved to {}", dest.display()));
            }
            Err(e) => warn!("Save to collection failed: {}", e),
        }
    }

    // ---- context menu geometry ----

    fn menu_labels(&self) -> Vec<(MenuEntry, &'static str)> {
        self.state
            .menu_entries()
            .into_iter()
            .map(|entry| (entry, self.state.entry_label(entry)))
            .collect()
    }

    fn menu_entry_at(&self, x: f64, y: f64) -> Option<(usize, MenuEntry)> {
        if self.menu_state != MenuState::Visible {
            return None;
        }
        let entries = self.state.menu_entries();
        let menu_x = self.menu_pos.0 as f64;
        let menu_y = self.menu_pos.1 as f64;
        let menu_h = (entries.len() * MENU_ITEM_HEIGHT as usize) as f64;

        if x >= menu_x && x < menu_x + MENU_WIDTH as f64 && y >= menu_y && y < menu_y + menu_h {
            let idx = ((y - menu_y) / MENU_ITEM_HEIGHT as f64) as usize;
            if idx < entries.len() {
                return Some((idx, entries[idx]));
            }
        }
        None
    }

    /// Open the context menu near the given surface position, nudged to stay
    /// within the window.
    fn open_menu_at(&mut self, x: i32, y: i32) {
        let entries = self.state.menu_entries();
        let menu_height = entries.len() as i32 * MENU_ITEM_HEIGHT as i32;

        let mut pos = (x, y);
        if pos.0 + MENU_WIDTH as i32 > self.state.width as i32 {
            pos.0 = self.state.width as i32 - MENU_WIDTH as i32;
        }
        if pos.1 + menu_height > self.state.height as i32 {
            pos.1 = self.state.height as i32 - menu_height;
        }
        self.menu_pos = (pos.0.max(0), pos.1.max(0));
        self.menu_state = MenuState::Visible;
        self.menu_hover_item = None;
        self.needs_redraw = true;
    }

    // ---- editor panel geometry ----

    fn slider_track_x_range(&self, panel: PanelRect) -> (f64, f64) {
        let left = panel.x as f64 + TRACK_LEFT as f64;
        let right = (panel.x as u32 + panel.width - TRACK_RIGHT_MARGIN) as f64;
        (left, right)
    }

    fn panel_hit(&self, x: f64, y: f64) -> PanelHit {
        let panel = panel_rect(self.state.width, self.state.height);
        let px = panel.x as f64;
        let py = panel.y as f64;
        if x < px || x >= px + panel.width as f64 || y < py || y >= py + panel.height as f64 {
            return PanelHit::Outside;
        }

        let row = ((y - py - PANEL_PADDING as f64) / PANEL_ROW_HEIGHT as f64).floor();
        match row as i64 {
            0 => PanelHit::Slider(SliderKind::Width),
            1 => PanelHit::Slider(SliderKind::Height),
            2 => PanelHit::Slider(SliderKind::Opacity),
            3 => PanelHit::Done,
            _ => PanelHit::Inside,
        }
    }

    fn slider_fraction(&self, kind: SliderKind) -> f32 {
        match kind {
            SliderKind::Width => {
                value_to_fraction(self.state.width as f32, MIN_DIM as f32, MAX_DIM as f32)
            }
            SliderKind::Height => {
                value_to_fraction(self.state.height as f32, MIN_DIM as f32, MAX_DIM as f32)
            }
            SliderKind::Opacity => value_to_fraction(self.state.opacity, MIN_OPACITY, MAX_OPACITY),
        }
    }

    /// Apply a pointer x position to the dragged slider; live effect only,
    /// persistence happens on release.
    fn drag_slider_to(&mut self, kind: SliderKind, x: f64) {
        let panel = panel_rect(self.state.width, self.state.height);
        let (left, right) = self.slider_track_x_range(panel);
        let frac = if right > left {
            ((x - left) / (right - left)) as f32
        } else {
            0.0
        };

        match kind {
            SliderKind::Width => {
                let w = fraction_to_value(frac, MIN_DIM as f32, MAX_DIM as f32).round() as u32;
                if w != self.state.width {
                    self.state.width = w;
                    self.update_size();
                }
            }
            SliderKind::Height => {
                let h = fraction_to_value(frac, MIN_DIM as f32, MAX_DIM as f32).round() as u32;
                if h != self.state.height {
                    self.state.height = h;
                    self.update_size();
                }
            }
            SliderKind::Opacity => {
                self.state.opacity = fraction_to_value(frac, MIN_OPACITY, MAX_OPACITY);
                self.needs_redraw = true;
            }
        }
    }

    // ---- drawing ----

    /// Rebuild the per-size frame cache with the high-quality scaler.
    fn rebuild_frame_cache(&mut self) {
        let Some(anim) = &self.animation else { return };
        let (w, h) = (self.state.width.min(MAX_SIZE), self.state.height.min(MAX_SIZE));
        self.scaled_frames = anim
            .frames
            .iter()
            .map(|frame| animation::scale_bilinear(&frame.bgra, anim.width, anim.height, w, h))
            .collect();
        self.scaled_size = (w, h);
    }

    fn draw(&mut self) {
        if !self.configured || self.layer_surface.is_none() {
            return;
        }

        let width = self.state.width.min(MAX_SIZE).max(1);
        let height = self.state.height.min(MAX_SIZE).max(1);

        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;
        if buffer_size > MAX_BUFFER_SIZE {
            error!(
                "Buffer size too large: {} bytes, max: {} bytes",
                buffer_size, MAX_BUFFER_SIZE
            );
            return;
        }

        // Refresh the frame cache outside the editor drag; during a drag the
        // fast path below scales on the fly instead.
        let cache_valid = self.scaled_size == (width, height) && !self.scaled_frames.is_empty();
        if !cache_valid && self.editor_drag.is_none() && self.animation.is_some() {
            self.rebuild_frame_cache();
        }

        // Gather state needed for rendering before the pool borrow
        let opacity = self.state.opacity;
        let frame_index = self.frame_index;
        let menu_visible = self.menu_state == MenuState::Visible;
        let menu_pos = self.menu_pos;
        let menu_hover = self.menu_hover_item;
        let menu_labels: Vec<&'static str> = if menu_visible {
            self.menu_labels().into_iter().map(|(_, l)| l).collect()
        } else {
            Vec::new()
        };
        let editor_rows = if self.editor_visible {
            Some([
                ("Width", self.slider_fraction(SliderKind::Width), format!("{}", self.state.width)),
                ("Height", self.slider_fraction(SliderKind::Height), format!("{}", self.state.height)),
                (
                    "Opacity",
                    self.slider_fraction(SliderKind::Opacity),
                    format!("{}%", (self.state.opacity * 100.0).round() as u32),
                ),
            ])
        } else {
            None
        };

        // Fast-path frame pixels when the cache is stale mid-drag
        let fast_frame: Option<Vec<u8>> = if !cache_valid && self.editor_drag.is_some() {
            self.animation.as_ref().map(|anim| {
                let frame = &anim.frames[frame_index.min(anim.frames.len() - 1)];
                animation::scale_nearest(&frame.bgra, anim.width, anim.height, width, height)
            })
        } else {
            None
        };

        if self.pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}", e);
                    return;
                }
            }
        }
        let pool = self.pool.as_mut().unwrap();
        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.pool = None;
                return;
            }
        }

        let (buffer, canvas) =
            match pool.create_buffer(width as i32, height as i32, stride, wl_shm::Format::Argb8888)
            {
                Ok(buf) => buf,
                Err(e) => {
                    error!("Failed to create buffer {}x{}: {}", width, height, e);
                    return;
                }
            };

        // Transparent background
        canvas.fill(0);

        // Frame pixels with opacity applied at blit time
        let frame_pixels: Option<&[u8]> = if let Some(ref fast) = fast_frame {
            Some(fast)
        } else if self.scaled_size == (width, height) {
            self.scaled_frames
                .get(frame_index.min(self.scaled_frames.len().saturating_sub(1)))
                .map(|f| f.as_slice())
        } else {
            None
        };
        if let Some(pixels) = frame_pixels {
            blit_with_opacity(pixels, canvas, opacity);
        }

        if let Some(rows) = editor_rows {
            let panel = panel_rect(width, height);
            render_editor(canvas, width, height, &mut self.painter, panel, &rows);
        }

        if menu_visible {
            render_menu(
                canvas,
                width,
                height,
                &mut self.painter,
                menu_pos,
                menu_hover,
                &menu_labels,
            );
        }

        let layer_surface = self.layer_surface.as_ref().unwrap();
        let surface = layer_surface.wl_surface();
        if buffer.attach_to(surface).is_err() {
            error!("Failed to attach buffer");
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
        self.needs_redraw = false;
    }
}

/// Copy a pre-scaled BGRA frame onto the canvas, multiplying alpha by the
/// window opacity.
fn blit_with_opacity(frame: &[u8], canvas: &mut [u8], opacity: f32) {
    let opacity_i = (opacity.clamp(0.0, 1.0) * 255.0) as u32;
    for (dst, src) in canvas.chunks_exact_mut(4).zip(frame.chunks_exact(4)) {
        dst[0] = src[0];
        dst[1] = src[1];
        dst[2] = src[2];
        dst[3] = ((src[3] as u32 * opacity_i) >> 8) as u8;
    }
}

/// Fill an axis-aligned rectangle, clipped to the canvas.
fn fill_rect(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    color: [u8; 4],
) {
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x + w as i32).max(0) as u32).min(canvas_width);
    let y1 = ((y + h as i32).max(0) as u32).min(canvas_height);

    for py in y0..y1 {
        for px in x0..x1 {
            let idx = ((py * canvas_width + px) * 4) as usize;
            if idx + 3 < canvas.len() {
                canvas[idx..idx + 4].copy_from_slice(&color);
            }
        }
    }
}

fn render_menu(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    painter: &mut TextPainter,
    menu_pos: (i32, i32),
    hover: Option<usize>,
    labels: &[&str],
) {
    let (menu_x, menu_y) = (menu_pos.0.max(0), menu_pos.1.max(0));

    for (i, label) in labels.iter().enumerate() {
        let item_y = menu_y + (i as u32 * MENU_ITEM_HEIGHT) as i32;
        let bg: [u8; 4] = if hover == Some(i) {
            [180, 180, 80, 230] // Highlighted: BGRA
        } else {
            [60, 60, 60, 230] // Normal: BGRA dark gray
        };
        fill_rect(canvas, canvas_width, canvas_height, menu_x, item_y, MENU_WIDTH, MENU_ITEM_HEIGHT, bg);
        painter.draw(
            canvas,
            canvas_width,
            canvas_height,
            menu_x + 10,
            item_y + 5,
            MENU_FONT_SIZE,
            label,
            [255, 255, 255, 255],
        );
    }

    // Border
    let border: [u8; 4] = [100, 100, 100, 255];
    let menu_h = labels.len() as u32 * MENU_ITEM_HEIGHT;
    fill_rect(canvas, canvas_width, canvas_height, menu_x, menu_y, MENU_WIDTH, 1, border);
    fill_rect(canvas, canvas_width, canvas_height, menu_x, menu_y + menu_h as i32 - 1, MENU_WIDTH, 1, border);
    fill_rect(canvas, canvas_width, canvas_height, menu_x, menu_y, 1, menu_h, border);
    fill_rect(canvas, canvas_width, canvas_height, menu_x + MENU_WIDTH as i32 - 1, menu_y, 1, menu_h, border);
}

fn render_editor(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    painter: &mut TextPainter,
    panel: PanelRect,
    rows: &[(&str, f32, String); 3],
) {
    fill_rect(
        canvas,
        canvas_width,
        canvas_height,
        panel.x,
        panel.y,
        panel.width,
        panel.height,
        [45, 45, 45, 235],
    );

    let track_left = panel.x + TRACK_LEFT as i32;
    let track_width = panel.width.saturating_sub(TRACK_LEFT + TRACK_RIGHT_MARGIN);

    for (i, (label, frac, value_text)) in rows.iter().enumerate() {
        let row_y = panel.y + PANEL_PADDING as i32 + (i as u32 * PANEL_ROW_HEIGHT) as i32;

        painter.draw(
            canvas,
            canvas_width,
            canvas_height,
            panel.x + 10,
            row_y + 8,
            MENU_FONT_SIZE,
            label,
            [220, 220, 220, 255],
        );

        // Track
        fill_rect(
            canvas,
            canvas_width,
            canvas_height,
            track_left,
            row_y + (PANEL_ROW_HEIGHT / 2) as i32 - 2,
            track_width,
            4,
            [110, 110, 110, 255],
        );

        // Handle
        let handle_x = track_left
            + ((track_width.saturating_sub(HANDLE_WIDTH)) as f32 * frac) as i32;
        fill_rect(
            canvas,
            canvas_width,
            canvas_height,
            handle_x,
            row_y + 6,
            HANDLE_WIDTH,
            PANEL_ROW_HEIGHT - 12,
            [230, 230, 230, 255],
        );

        // Current value next to the handle row
        painter.draw(
            canvas,
            canvas_width,
            canvas_height,
            track_left + track_width as i32 + 4,
            row_y + 8,
            11.0,
            value_text,
            [200, 200, 200, 255],
        );
    }

    // Done row
    let done_y = panel.y + PANEL_PADDING as i32 + (3 * PANEL_ROW_HEIGHT) as i32;
    fill_rect(
        canvas,
        canvas_width,
        canvas_height,
        panel.x + 10,
        done_y + 4,
        panel.width - 20,
        PANEL_ROW_HEIGHT - 8,
        [70, 70, 70, 255],
    );
    painter.draw(
        canvas,
        canvas_width,
        canvas_height,
        panel.x + (panel.width / 2) as i32 - 16,
        done_y + 10,
        MENU_FONT_SIZE,
        "Done",
        [255, 255, 255, 255],
    );
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for OverlayApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        if self.needs_redraw {
            self.draw();
        }
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for OverlayApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }
}

impl LayerShellHandler for OverlayApp {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        info!("Layer surface closed by compositor");
        self.hide_window();
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        debug!("Layer surface configured: {:?}", configure);

        // Accept the compositor's size only while the window is not being
        // manipulated, so drags can push it past screen edges.
        let manipulating =
            self.state.drag != DragState::Idle || self.editor_drag.is_some();
        if !manipulating {
            if configure.new_size.0 > 0 {
                self.state.width = configure.new_size.0;
            }
            if configure.new_size.1 > 0 {
                self.state.height = configure.new_size.1;
            }
        } else if let Some(ref layer_surface) = self.layer_surface {
            layer_surface.set_size(self.state.width, self.state.height);
            layer_surface.commit();
        }

        self.configured = true;
        self.needs_redraw = true;

        // First appearance with nothing loaded: open the menu so the user
        // can pick a file right away.
        if !self.shown_once {
            self.shown_once = true;
            if self.state.current_path.is_none() {
                self.open_menu_at(
                    self.state.width as i32 / 2,
                    self.state.height as i32 / 2,
                );
            }
        }

        self.draw();
    }
}

impl SeatHandler for OverlayApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

/// Latest pointer position after one event in a frame. Enter and Motion
/// carry a fresh position; button and axis events reuse the last known one,
/// so an Enter must refresh the cache before any press lands.
fn refreshed_pointer_pos(
    cached: (f64, f64),
    kind: &PointerEventKind,
    position: (f64, f64),
) -> (f64, f64) {
    match kind {
        PointerEventKind::Enter { .. } | PointerEventKind::Motion { .. } => position,
        _ => cached,
    }
}

impl PointerHandler for OverlayApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            self.pointer_pos =
                refreshed_pointer_pos(self.pointer_pos, &event.kind, event.position);
            match event.kind {
                PointerEventKind::Enter { .. } => {
                    debug!("Pointer entered");
                }
                PointerEventKind::Leave { .. } => {
                    debug!("Pointer left");
                    self.state.end_drag();
                    if self.editor_drag.take().is_some() {
                        self.paths.save_settings(self.state.settings());
                        self.needs_redraw = true;
                    }
                }
                PointerEventKind::Motion { .. } => {
                    let (x, y) = event.position;

                    if self.menu_state == MenuState::Visible {
                        let prev = self.menu_hover_item;
                        self.menu_hover_item = self.menu_entry_at(x, y).map(|(i, _)| i);
                        if prev != self.menu_hover_item {
                            self.needs_redraw = true;
                            self.draw();
                        }
                    }

                    if let Some(kind) = self.editor_drag {
                        self.drag_slider_to(kind, x);
                        self.draw();
                    }

                    if let DragState::Dragging { anchor } = self.state.drag {
                        let dx = x - anchor.0;
                        let dy = y - anchor.1;
                        self.margin_left = self.drag_start_margin.0 + dx as i32;
                        self.margin_top = self.drag_start_margin.1 + dy as i32;
                        self.update_position();
                    }
                }
                PointerEventKind::Press { button, .. } => {
                    let (x, y) = self.pointer_pos;

                    if button == BTN_LEFT {
                        self.on_left_press(x, y);
                    } else if button == BTN_RIGHT {
                        self.open_menu_at(x as i32, y as i32);
                        self.draw();
                    }
                }
                PointerEventKind::Release { button, .. } => {
                    if button == BTN_LEFT {
                        self.state.end_drag();
                        if self.editor_drag.take().is_some() {
                            // Slider release is the persistence point
                            self.paths.save_settings(self.state.settings());
                            self.needs_redraw = true;
                            self.draw();
                        }
                    }
                }
                PointerEventKind::Axis { vertical, .. } => {
                    if vertical.absolute != 0.0 {
                        let delta = if vertical.absolute > 0.0 {
                            -OPACITY_STEP
                        } else {
                            OPACITY_STEP
                        };
                        self.adjust_opacity(delta);
                        self.draw();
                    }
                }
            }
        }
    }
}

impl OverlayApp {
    fn on_left_press(&mut self, x: f64, y: f64) {
        // Menu gets first claim on clicks
        if self.menu_state == MenuState::Visible {
            if let Some((_, entry)) = self.menu_entry_at(x, y) {
                self.handle_menu_entry(entry);
            } else {
                self.menu_state = MenuState::Hidden;
                self.needs_redraw = true;
            }
            self.draw();
            return;
        }

        // Then the editor panel
        if self.editor_visible {
            match self.panel_hit(x, y) {
                PanelHit::Slider(kind) => {
                    self.editor_drag = Some(kind);
                    self.drag_slider_to(kind, x);
                    self.draw();
                    return;
                }
                PanelHit::Done | PanelHit::Outside => {
                    // Values are already applied live, closing has no
                    // further effect
                    self.editor_visible = false;
                    self.needs_redraw = true;
                    self.draw();
                    return;
                }
                PanelHit::Inside => return,
            }
        }

        // Plain body press: start a window drag when unlocked
        if self.state.begin_drag((x, y)) {
            self.drag_start_margin = (self.margin_left, self.margin_top);
        }
    }
}

impl ShmHandler for OverlayApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for OverlayApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(OverlayApp);
delegate_output!(OverlayApp);
delegate_layer!(OverlayApp);
delegate_seat!(OverlayApp);
delegate_pointer!(OverlayApp);
delegate_shm!(OverlayApp);
delegate_registry!(OverlayApp);

/// Run the overlay application.
///
/// `initial` carries the image to load at startup (from the CLI or the
/// persisted last path) and whether to reset geometry to defaults.
pub fn run(paths: ConfigPaths, initial: Option<(PathBuf, bool)>) -> Result<()> {
    info!("Connecting to Wayland display");

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
    let (globals, event_queue) =
        registry_queue_init::<OverlayApp>(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let mut event_loop: EventLoop<OverlayApp> =
        EventLoop::try_new().context("Failed to create event loop")?;
    WaylandSource::new(conn.clone(), event_queue)
        .insert(event_loop.handle())
        .context("Failed to insert Wayland source")?;

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let layer_shell = LayerShell::bind(&globals, &qh).context("Failed to bind layer shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    // Tray commands flow into the loop through a calloop channel
    let (tray_tx, tray_rx) = channel::channel();
    tray::spawn(tray_tx);
    event_loop
        .handle()
        .insert_source(tray_rx, |event, _, app: &mut OverlayApp| {
            if let Event::Msg(command) = event {
                app.handle_tray(command);
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to insert tray channel: {}", e))?;

    let mut app = OverlayApp {
        registry_state: RegistryState::new(&globals),
        seat_state: SeatState::new(&globals, &qh),
        output_state: OutputState::new(&globals, &qh),
        shm,
        layer_shell,
        compositor_state,
        qh: qh.clone(),
        paths,
        state: OverlayState::new(),
        animation: None,
        scaled_frames: Vec::new(),
        scaled_size: (0, 0),
        frame_index: 0,
        next_frame_at: None,
        layer_surface: None,
        pool: None,
        buffer: None,
        configured: false,
        visible: false,
        shown_once: false,
        margin_left: 100,
        margin_top: 100,
        drag_start_margin: (0, 0),
        pointer_pos: (0.0, 0.0),
        menu_state: MenuState::Hidden,
        menu_pos: (0, 0),
        menu_hover_item: None,
        editor_visible: false,
        editor_drag: None,
        painter: TextPainter::new(),
        needs_redraw: false,
        should_exit: false,
    };

    if let Some((path, reset)) = initial {
        app.load_image(&path, reset);
    }
    app.create_overlay_surface();
    app.arm_frame_clock();

    info!("Starting event loop");
    info!("Controls: Drag to move, Right-click for menu, Scroll to adjust opacity");

    loop {
        event_loop
            .dispatch(DISPATCH_TIMEOUT, &mut app)
            .context("Event loop dispatch failed")?;

        app.tick();
        if app.needs_redraw {
            app.draw();
        }

        if app.should_exit {
            info!("Exiting application");
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slider_fraction_round_trips() {
        let frac = value_to_fraction(640.0, MIN_DIM as f32, MAX_DIM as f32);
        let back = fraction_to_value(frac, MIN_DIM as f32, MAX_DIM as f32);
        assert!((back - 640.0).abs() < 0.01);
    }

    #[test]
    fn slider_fraction_clamps_to_range() {
        assert_eq!(value_to_fraction(10.0, MIN_DIM as f32, MAX_DIM as f32), 0.0);
        assert_eq!(
            value_to_fraction(5000.0, MIN_DIM as f32, MAX_DIM as f32),
            1.0
        );
        assert_eq!(fraction_to_value(-0.5, 0.1, 1.0), 0.1);
        assert_eq!(fraction_to_value(1.5, 0.1, 1.0), 1.0);
    }

    #[test]
    fn panel_centers_within_window() {
        let panel = panel_rect(800, 600);
        assert_eq!(panel.width, PANEL_WIDTH);
        assert_eq!(panel.x, ((800 - PANEL_WIDTH) / 2) as i32);
        assert!(panel.y > 0);
    }

    #[test]
    fn panel_fits_tiny_window() {
        let panel = panel_rect(100, 50);
        assert_eq!(panel.width, 100);
        assert_eq!(panel.x, 0);
    }

    #[test]
    fn enter_position_feeds_the_next_press() {
        // A press can arrive straight after an enter with no motion between;
        // the press must see the entered position, not a stale one.
        let entered = refreshed_pointer_pos(
            (0.0, 0.0),
            &PointerEventKind::Enter { serial: 1 },
            (400.0, 300.0),
        );
        assert_eq!(entered, (400.0, 300.0));

        let pressed = refreshed_pointer_pos(
            entered,
            &PointerEventKind::Press {
                time: 10,
                button: BTN_LEFT,
                serial: 2,
            },
            (0.0, 0.0),
        );
        assert_eq!(pressed, (400.0, 300.0));
    }

    #[test]
    fn motion_refreshes_pointer_position() {
        let pos = refreshed_pointer_pos(
            (400.0, 300.0),
            &PointerEventKind::Motion { time: 20 },
            (410.0, 290.0),
        );
        assert_eq!(pos, (410.0, 290.0));
    }

    #[test]
    fn blit_applies_opacity_to_alpha_only() {
        let frame = vec![10, 20, 30, 200, 1, 2, 3, 100];
        let mut canvas = vec![0u8; 8];
        blit_with_opacity(&frame, &mut canvas, 0.5);

        assert_eq!(&canvas[0..3], &[10, 20, 30]);
        assert_eq!(canvas[3], ((200u32 * 127) >> 8) as u8);
        assert_eq!(canvas[7], ((100u32 * 127) >> 8) as u8);
    }
}
