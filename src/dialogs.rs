// Dialog module
// Native prompts via zenity with kdialog as fallback, in the same spirit as
// clipboard tools: spawn what the desktop provides, log and move on when
// nothing is installed.

use log::{error, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

enum Outcome {
    /// Tool ran and produced a value
    Value(String),
    /// Tool ran and the user cancelled
    Cancelled,
    /// Tool is not installed, try the next one
    Unavailable,
}

fn run_tool(program: &str, args: &[String]) -> Outcome {
    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(e) => {
            warn!("{} not available: {}", program, e);
            return Outcome::Unavailable;
        }
    };

    if output.status.success() {
        Outcome::Value(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        // Non-zero exit from a dialog tool means the user dismissed it
        Outcome::Cancelled
    }
}

fn run_chain(chain: &[(&str, Vec<String>)]) -> Option<String> {
    for (program, args) in chain {
        match run_tool(program, args) {
            Outcome::Value(v) => return Some(v),
            Outcome::Cancelled => return None,
            Outcome::Unavailable => continue,
        }
    }
    error!("No dialog tool found. Install zenity or kdialog.");
    None
}

/// Open-file picker filtered to GIFs. Returns None on cancel or when no
/// dialog tool exists.
pub fn pick_gif(start_dir: Option<&Path>) -> Option<PathBuf> {
    let mut zenity_args = vec![
        "--file-selection".to_string(),
        "--title=Select GIF".to_string(),
        "--file-filter=GIF files | *.gif *.GIF".to_string(),
    ];
    if let Some(dir) = start_dir {
        zenity_args.push(format!("--filename={}/", dir.display()));
    }

    let kdialog_start = start_dir
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    let kdialog_args = vec![
        "--getopenfilename".to_string(),
        kdialog_start,
        "*.gif|GIF files".to_string(),
    ];

    let picked = run_chain(&[("zenity", zenity_args), ("kdialog", kdialog_args)])?;
    if picked.is_empty() {
        return None;
    }
    Some(PathBuf::from(picked))
}

/// Single-line text prompt with a prefilled default.
pub fn prompt_text(title: &str, label: &str, default: &str) -> Option<String> {
    let zenity_args = vec![
        "--entry".to_string(),
        format!("--title={}", title),
        format!("--text={}", label),
        format!("--entry-text={}", default),
    ];
    let kdialog_args = vec![
        "--title".to_string(),
        title.to_string(),
        "--inputbox".to_string(),
        label.to_string(),
        default.to_string(),
    ];

    let text = run_chain(&[("zenity", zenity_args), ("kdialog", kdialog_args)])?;
    if text.is_empty() {
        return None;
    }
    Some(text)
}

/// Informational message box. Fire-and-forget.
pub fn show_info(title: &str, text: &str) {
    let zenity_args = vec![
        "--info".to_string(),
        format!("--title={}", title),
        format!("--text={}", text),
    ];
    let kdialog_args = vec![
        "--title".to_string(),
        title.to_string(),
        "--msgbox".to_string(),
        text.to_string(),
    ];

    run_chain(&[("zenity", zenity_args), ("kdialog", kdialog_args)]);
}
