// Configuration module
// Computes the per-user data paths and persists the plain-text records

use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted window geometry and opacity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Window opacity (0.10 - 1.00 when produced interactively)
    pub opacity: f32,
}

/// Filesystem locations used by the application.
///
/// Computed once at startup and passed down explicitly so everything below
/// can be pointed at a temporary directory in tests.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Directory holding the persisted records
    pub config_dir: PathBuf,
    /// Single-line record with the last loaded GIF path
    pub last_path_file: PathBuf,
    /// Three-line record: width, height, opacity
    pub settings_file: PathBuf,
    /// Destination for "Save to Collection" copies
    pub save_dir: PathBuf,
}

impl ConfigPaths {
    /// Resolve the platform-specific locations.
    ///
    /// Windows keeps the records under %APPDATA%, everything else uses a dot
    /// folder in the home directory. Falls back to the current directory when
    /// neither can be resolved.
    pub fn resolve() -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);

        let config_dir = if cfg!(target_os = "windows") {
            std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .or_else(|| home.clone())
                .map(|p| p.join("GIF Overlay"))
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            home.clone()
                .map(|p| p.join(".gif_overlay"))
                .unwrap_or_else(|| PathBuf::from("."))
        };

        let save_dir = home
            .map(|p| p.join("Documents").join("GIF-save"))
            .unwrap_or_else(|| PathBuf::from("GIF-save"));

        Self::rooted(config_dir, save_dir)
    }

    /// Build paths from explicit roots.
    pub fn rooted(config_dir: PathBuf, save_dir: PathBuf) -> Self {
        Self {
            last_path_file: config_dir.join("last_gif_path.txt"),
            settings_file: config_dir.join("settings.txt"),
            config_dir,
            save_dir,
        }
    }

    /// Persist the last loaded path. Best-effort: failures are logged and
    /// swallowed, the UI never blocks on this.
    pub fn save_last_path(&self, path: &Path) {
        if let Err(e) = self.write_record(&self.last_path_file, &format!("{}\n", path.display())) {
            warn!("Failed to persist last path: {}", e);
        }
    }

    /// Read back the last loaded path. Returns None when the record is
    /// missing or the recorded file no longer exists on disk.
    pub fn load_last_path(&self) -> Option<PathBuf> {
        let content = fs::read_to_string(&self.last_path_file).ok()?;
        let path = PathBuf::from(content.trim());
        if path.as_os_str().is_empty() || !path.exists() {
            return None;
        }
        Some(path)
    }

    /// Persist the geometry/opacity triple. Values are written exactly as
    /// given; the slider ranges are the only clamp in the system.
    pub fn save_settings(&self, settings: Settings) {
        let record = format!(
            "{}\n{}\n{}\n",
            settings.width, settings.height, settings.opacity
        );
        if let Err(e) = self.write_record(&self.settings_file, &record) {
            warn!("Failed to persist settings: {}", e);
        }
    }

    /// Read back the persisted triple. Missing file, short file, or
    /// non-numeric content all mean "no settings", never an error.
    pub fn load_settings(&self) -> Option<Settings> {
        let content = fs::read_to_string(&self.settings_file).ok()?;
        let mut lines = content.lines();

        let width: u32 = lines.next()?.trim().parse().ok()?;
        let height: u32 = lines.next()?.trim().parse().ok()?;
        let opacity: f32 = lines.next()?.trim().parse().ok()?;

        Some(Settings {
            width,
            height,
            opacity,
        })
    }

    fn write_record(&self, file: &Path, content: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        fs::write(file, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &Path) -> ConfigPaths {
        ConfigPaths::rooted(dir.join("conf"), dir.join("save"))
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        let written = Settings {
            width: 640,
            height: 480,
            opacity: 0.75,
        };
        paths.save_settings(written);

        assert_eq!(paths.load_settings(), Some(written));
    }

    #[test]
    fn settings_keep_full_opacity_precision() {
        // Scroll steps and slider drags produce opacities with more than two
        // decimals; the record must hand back exactly what was stored.
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        let written = Settings {
            width: 640,
            height: 480,
            opacity: 0.755,
        };
        paths.save_settings(written);

        assert_eq!(paths.load_settings(), Some(written));
    }

    #[test]
    fn missing_settings_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        assert_eq!(paths.load_settings(), None);
    }

    #[test]
    fn short_settings_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(&paths.settings_file, "640\n480\n").unwrap();

        assert_eq!(paths.load_settings(), None);
    }

    #[test]
    fn non_numeric_settings_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(&paths.settings_file, "wide\ntall\nclear\n").unwrap();

        assert_eq!(paths.load_settings(), None);
    }

    #[test]
    fn settings_file_parses_exact_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(&paths.settings_file, "640\n480\n0.75\n").unwrap();

        assert_eq!(
            paths.load_settings(),
            Some(Settings {
                width: 640,
                height: 480,
                opacity: 0.75,
            })
        );
    }

    #[test]
    fn out_of_range_values_persist_unclamped() {
        // Only the slider ranges constrain values; the persistence layer
        // stores whatever it is given.
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        paths.save_settings(Settings {
            width: 9999,
            height: 9999,
            opacity: 2.0,
        });

        assert_eq!(
            paths.load_settings(),
            Some(Settings {
                width: 9999,
                height: 9999,
                opacity: 2.0,
            })
        );
    }

    #[test]
    fn last_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        let gif = dir.path().join("pinned.gif");
        fs::write(&gif, b"GIF89a").unwrap();

        paths.save_last_path(&gif);
        assert_eq!(paths.load_last_path(), Some(gif));
    }

    #[test]
    fn last_path_ignores_vanished_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        let gif = dir.path().join("gone.gif");
        fs::write(&gif, b"GIF89a").unwrap();
        paths.save_last_path(&gif);
        fs::remove_file(&gif).unwrap();

        assert_eq!(paths.load_last_path(), None);
    }

    #[test]
    fn last_path_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        assert_eq!(paths.load_last_path(), None);
    }
}
