//! Locating a Chrome or Chromium binary.
//!
//! Order: `PROMPTRELAY_CHROME`, then well-known binary names on `PATH`, then the usual install
//! locations for the platform (skipped when `PROMPTRELAY_SKIP_OS_PATHS` is set).

use std::path::PathBuf;

use which::which;

use crate::config::env_value;

#[cfg(target_os = "windows")]
const BINARY_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
const BINARY_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];
#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "linux",
    target_os = "freebsd"
)))]
const BINARY_NAMES: &[&str] = &["chrome"];

pub fn find_chrome() -> Option<PathBuf> {
    let explicit = env_value("PROMPTRELAY_CHROME")
        .map(PathBuf::from)
        .filter(|path| path.exists());
    explicit
        .or_else(|| BINARY_NAMES.iter().find_map(|name| which(name).ok()))
        .or_else(|| {
            if env_value("PROMPTRELAY_SKIP_OS_PATHS").is_some() {
                return None;
            }
            install_locations().into_iter().find(|path| path.exists())
        })
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    const SUFFIXES: [&str; 3] = [
        "Google/Chrome/Application/chrome.exe",
        "Chromium/Application/chrome.exe",
        "Microsoft/Edge/Application/msedge.exe",
    ];
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .into_iter()
        .filter_map(env_value)
        .flat_map(|root| SUFFIXES.iter().map(move |suffix| PathBuf::from(&root).join(suffix)))
        .collect()
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
fn install_locations() -> Vec<PathBuf> {
    ["google-chrome-stable", "google-chrome", "chromium-browser", "chromium"]
        .into_iter()
        .map(|name| PathBuf::from("/usr/bin").join(name))
        .collect()
}

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "linux",
    target_os = "freebsd"
)))]
fn install_locations() -> Vec<PathBuf> {
    Vec::new()
}
