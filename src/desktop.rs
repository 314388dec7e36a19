// Thin wrappers around the desktop programs the capture tool shells out to:
// ImageMagick's `import` for screen capture, `xclip` for the clipboard and
// `notify-send` for notifications.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A screen capture written to a temporary PNG. The file is removed on drop.
#[derive(Debug)]
pub struct ScreenCapture {
    path: PathBuf,
}

impl ScreenCapture {
    pub fn new() -> Self {
        Self::in_dir(&std::env::temp_dir())
    }

    pub fn in_dir(dir: &Path) -> Self {
        ScreenCapture {
            path: dir.join(format!("{}.png", Utc::now().timestamp())),
        }
    }

    /// Let the user select a screen region and save it. Blocks until done.
    pub fn capture(&self) -> Result<()> {
        let output = Command::new("import")
            .arg(&self.path)
            .output()
            .context("running import")?;
        if !output.status.success() {
            bail!(
                "import exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScreenCapture {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "capture file not removed");
        }
    }
}

/// Look `tool` up on `PATH`.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

/// The subset of `tools` that cannot be found on `PATH`.
pub fn missing_tools<'a>(tools: &[&'a str]) -> Vec<&'a str> {
    tools
        .iter()
        .copied()
        .filter(|tool| find_in_path(tool).is_none())
        .collect()
}

pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut child = Command::new("xclip")
        .args(["-selection", "clipboard"])
        .stdin(Stdio::piped())
        .spawn()
        .context("error running xclip command")?;
    {
        let mut pipe = child.stdin.take().context("error creating pipe to xclip")?;
        pipe.write_all(text.as_bytes())
            .context("error writing to xclip pipe")?;
    }
    let status = child.wait().context("waiting for xclip")?;
    if !status.success() {
        bail!("xclip exited with {status}");
    }
    Ok(())
}

/// Best effort desktop notification; failures are only logged.
pub fn notify(msg: &str) {
    if let Err(e) = Command::new("notify-send").arg(msg).output() {
        debug!(error = %e, "notify-send unavailable");
    }
}
