use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use which::which;

/// Launch settings for [`crate::ChromiumDriver`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Chrome/Chromium binary. Empty means "let chromiumoxide decide".
    pub executable: PathBuf,
    /// Parent directory for per-run browser profiles.
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout_ms: u64,
    pub no_sandbox: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            window_width: 1440,
            window_height: 900,
            request_timeout_ms: 30_000,
            no_sandbox: env_flag("SCREENING_DISABLE_SANDBOX"),
        }
    }
}

fn resolve_headless_default() -> bool {
    // The screening form is watched by an operator, so headful unless asked.
    match env::var("SCREENING_HEADLESS") {
        Ok(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("SCREENING_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.screening-profile").into()
}

pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("SCREENING_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
