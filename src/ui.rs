// UI layer: the few terminal interactions the tools need. Progress is shown
// with an `indicatif` spinner and a missing password is asked for with
// `dialoguer` when a person is at the keyboard.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::io::IsTerminal;
use std::time::Duration;

/// Start a spinner on stderr. It stays hidden when stderr is not a terminal.
pub fn spinner(msg: impl Into<Cow<'static, str>>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Return the configured password, or prompt for one on an interactive
/// terminal.
pub fn resolve_password(config: &Config) -> Result<String> {
    if let Some(password) = &config.password {
        return Ok(password.clone());
    }
    if !std::io::stdin().is_terminal() {
        bail!("no password configured; pass --password or set SEAFILE_PASSWORD");
    }
    Password::new()
        .with_prompt(format!("Seafile password for {}", config.username))
        .interact()
        .context("reading password")
}
