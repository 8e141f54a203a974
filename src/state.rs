// Overlay interaction state
// Pure state machine: lock mode, playback, dragging, geometry and the menu
// contents derived from them. No Wayland types so the whole thing is testable
// without a compositor.

use crate::config::Settings;
use std::path::PathBuf;

/// Default window edge when the natural size is unknown or degenerate
pub const FALLBACK_SIZE: u32 = 300;

/// Slider range for width and height
pub const MIN_DIM: u32 = 50;
pub const MAX_DIM: u32 = 2000;

/// Slider range for opacity
pub const MIN_OPACITY: f32 = 0.10;
pub const MAX_OPACITY: f32 = 1.00;

/// Window drag state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        /// Pointer position at press time, in surface coordinates
        anchor: (f64, f64),
    },
}

/// Everything the context menu can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    OpenFile,
    OpenSaved,
    ResizeOpacity,
    TogglePause,
    SaveToCollection,
    Minimize,
    Quit,
    Lock,
    Unlock,
}

#[derive(Debug)]
pub struct OverlayState {
    pub locked: bool,
    pub paused: bool,
    pub drag: DragState,
    /// Path of the currently displayed image, if any
    pub current_path: Option<PathBuf>,
    /// Natural pixel size of the current image's first frame
    pub natural_size: Option<(u32, u32)>,
    pub width: u32,
    pub height: u32,
    pub opacity: f32,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            locked: false,
            paused: false,
            drag: DragState::Idle,
            current_path: None,
            natural_size: None,
            width: FALLBACK_SIZE,
            height: FALLBACK_SIZE,
            opacity: 1.0,
        }
    }
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Menu contents for the current interaction mode. Locked mode exposes
    /// exactly one way out.
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        if self.locked {
            return vec![MenuEntry::Unlock];
        }
        vec![
            MenuEntry::OpenFile,
            MenuEntry::OpenSaved,
            MenuEntry::ResizeOpacity,
            MenuEntry::TogglePause,
            MenuEntry::SaveToCollection,
            MenuEntry::Minimize,
            MenuEntry::Quit,
            MenuEntry::Lock,
        ]
    }

    pub fn entry_label(&self, entry: MenuEntry) -> &'static str {
        match entry {
            MenuEntry::OpenFile => "Open GIF...",
            MenuEntry::OpenSaved => "Open From Collection",
            MenuEntry::ResizeOpacity => "Resize & Opacity",
            MenuEntry::TogglePause => {
                if self.paused {
                    "Play"
                } else {
                    "Pause"
                }
            }
            MenuEntry::SaveToCollection => "Save to Collection",
            MenuEntry::Minimize => "Minimize to Tray",
            MenuEntry::Quit => "Quit",
            MenuEntry::Lock => "Lock Position",
            MenuEntry::Unlock => "Unlock Position",
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
        // Locking while mid-drag drops the drag
        self.drag = DragState::Idle;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Start a window drag. Refused while locked.
    pub fn begin_drag(&mut self, anchor: (f64, f64)) -> bool {
        if self.locked {
            return false;
        }
        self.drag = DragState::Dragging { anchor };
        true
    }

    pub fn end_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Toggle playback. Nothing happens while no image is loaded.
    pub fn toggle_pause(&mut self) {
        if self.current_path.is_some() {
            self.paused = !self.paused;
        }
    }

    /// Apply the geometry contract for a freshly loaded image.
    ///
    /// Reset loads always take the natural size (300x300 when degenerate) at
    /// full opacity; non-reset loads take the persisted triple verbatim when
    /// one exists. Returns true when the resulting geometry should be
    /// persisted (reset loads establish the new default).
    pub fn apply_load(
        &mut self,
        path: PathBuf,
        natural: (u32, u32),
        reset: bool,
        saved: Option<Settings>,
    ) -> bool {
        self.current_path = Some(path);
        self.natural_size = Some(natural);
        self.paused = false;

        let (nat_w, nat_h) = if natural.0 == 0 || natural.1 == 0 {
            (FALLBACK_SIZE, FALLBACK_SIZE)
        } else {
            natural
        };

        if reset {
            self.width = nat_w;
            self.height = nat_h;
            self.opacity = 1.0;
            return true;
        }

        match saved {
            Some(settings) => {
                // Persisted values apply exactly as stored
                self.width = settings.width;
                self.height = settings.height;
                self.opacity = settings.opacity;
            }
            None => {
                self.width = nat_w;
                self.height = nat_h;
            }
        }
        false
    }

    /// Current geometry as a persistable triple.
    pub fn settings(&self) -> Settings {
        Settings {
            width: self.width,
            height: self.height,
            opacity: self.opacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_state() -> OverlayState {
        let mut state = OverlayState::new();
        state.apply_load(PathBuf::from("/tmp/a.gif"), (120, 80), true, None);
        state
    }

    #[test]
    fn locked_menu_is_unlock_only() {
        let mut state = OverlayState::new();
        state.lock();
        assert_eq!(state.menu_entries(), vec![MenuEntry::Unlock]);
    }

    #[test]
    fn unlocking_restores_full_menu_and_drag() {
        let mut state = OverlayState::new();
        state.lock();
        assert!(!state.begin_drag((5.0, 5.0)));

        state.unlock();
        let entries = state.menu_entries();
        assert!(entries.contains(&MenuEntry::OpenFile));
        assert!(entries.contains(&MenuEntry::Lock));
        assert_eq!(entries.len(), 8);
        assert!(state.begin_drag((5.0, 5.0)));
        assert_eq!(state.drag, DragState::Dragging { anchor: (5.0, 5.0) });
    }

    #[test]
    fn locking_cancels_active_drag() {
        let mut state = OverlayState::new();
        assert!(state.begin_drag((1.0, 2.0)));
        state.lock();
        assert_eq!(state.drag, DragState::Idle);
    }

    #[test]
    fn drag_returns_to_idle_on_release() {
        let mut state = OverlayState::new();
        state.begin_drag((1.0, 2.0));
        state.end_drag();
        assert_eq!(state.drag, DragState::Idle);
    }

    #[test]
    fn pause_toggle_twice_is_identity() {
        let mut state = loaded_state();
        assert!(!state.paused);
        state.toggle_pause();
        assert!(state.paused);
        state.toggle_pause();
        assert!(!state.paused);
    }

    #[test]
    fn pause_is_noop_without_image() {
        let mut state = OverlayState::new();
        state.toggle_pause();
        assert!(!state.paused);
    }

    #[test]
    fn pause_label_follows_playback() {
        let mut state = loaded_state();
        assert_eq!(state.entry_label(MenuEntry::TogglePause), "Pause");
        state.toggle_pause();
        assert_eq!(state.entry_label(MenuEntry::TogglePause), "Play");
    }

    #[test]
    fn reset_load_uses_natural_size_and_full_opacity() {
        let mut state = OverlayState::new();
        state.opacity = 0.5;

        let saved = Some(Settings {
            width: 640,
            height: 480,
            opacity: 0.75,
        });
        let persist = state.apply_load(PathBuf::from("/tmp/a.gif"), (120, 80), true, saved);

        assert!(persist);
        assert_eq!((state.width, state.height), (120, 80));
        assert_eq!(state.opacity, 1.0);
    }

    #[test]
    fn reset_load_falls_back_for_degenerate_size() {
        let mut state = OverlayState::new();
        let persist = state.apply_load(PathBuf::from("/tmp/a.gif"), (0, 0), true, None);

        assert!(persist);
        assert_eq!((state.width, state.height), (FALLBACK_SIZE, FALLBACK_SIZE));
    }

    #[test]
    fn non_reset_load_applies_saved_triple_exactly() {
        let mut state = OverlayState::new();
        let saved = Some(Settings {
            width: 640,
            height: 480,
            opacity: 0.75,
        });
        let persist = state.apply_load(PathBuf::from("/tmp/a.gif"), (120, 80), false, saved);

        assert!(!persist);
        assert_eq!((state.width, state.height), (640, 480));
        assert_eq!(state.opacity, 0.75);
    }

    #[test]
    fn non_reset_load_without_settings_uses_natural_size() {
        let mut state = OverlayState::new();
        let persist = state.apply_load(PathBuf::from("/tmp/a.gif"), (120, 80), false, None);

        assert!(!persist);
        assert_eq!((state.width, state.height), (120, 80));
        assert_eq!(state.opacity, 1.0);
    }

    #[test]
    fn load_restarts_playback() {
        let mut state = loaded_state();
        state.toggle_pause();
        assert!(state.paused);

        state.apply_load(PathBuf::from("/tmp/b.gif"), (50, 50), false, None);
        assert!(!state.paused);
    }
}
