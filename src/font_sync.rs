//! Points the subtitle renderer at the fonts directory next to the playing file.
//!
//! Delivery is either a fontconfig include file (`~~/.fonts.conf`, needs
//! `sub-font-provider=fontconfig` and an `<include>` of that file in fonts.conf) or
//! the native `sub-fonts-dir` property. Compatibility mode copies the fonts into a
//! script-managed directory first and points the renderer there instead.

use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::{FontsMethod, FontsOptions};
use crate::constants::constants;
use crate::fonts;
use crate::fs_ops::DirOps;
use crate::host::Host;
use crate::util::{self, Os};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontState {
  Unset,
  DirectSet,
  CompatibleSet,
}

pub struct FontLoader<D: DirOps> {
  /// Options as read, before path expansion. Used to detect real reloads.
  raw_options: FontsOptions,
  options: FontsOptions,
  ops: D,
  os: Option<Os>,
  fonts_conf: PathBuf,
  compatible_fonts_dir: String,
  last_compatible_dir: Option<String>,
  /// Source directory of the last delivery attempt, set even when the copy failed.
  last_fonts_dir: Option<String>,
  ready: bool,
  state: FontState,
}

impl<D: DirOps> FontLoader<D> {
  pub async fn new<H: Host>(host: &H, ops: D, os: Option<Os>, options: FontsOptions) -> Result<Self> {
    let fonts_conf = PathBuf::from(host.expand_path(&constants().fonts_conf_path).await?);
    let mut loader = Self {
      raw_options: options.clone(),
      options,
      ops,
      os,
      fonts_conf,
      compatible_fonts_dir: String::new(),
      last_compatible_dir: None,
      last_fonts_dir: None,
      ready: false,
      state: FontState::Unset,
    };
    loader.update_options(host).await;
    Ok(loader)
  }

  pub fn state(&self) -> FontState {
    self.state
  }

  #[cfg(test)]
  pub fn options(&self) -> &FontsOptions {
    &self.options
  }

  fn is_windows(&self) -> bool {
    self.os.is_some_and(Os::is_windows)
  }

  fn format_path(&self, path: &str) -> String {
    if self.is_windows() { util::format_windows_path(path) } else { path.to_string() }
  }

  // --- Host readiness ---

  async fn check_ready<H: Host>(&self, host: &H) -> bool {
    if self.options.method == FontsMethod::Native {
      return true;
    }
    matches!(host.get_string("sub-font-provider").await, Ok(Some(provider)) if provider == "fontconfig")
  }

  /// `sub-font-provider` changed.
  pub async fn refresh_ready<H: Host>(&mut self, host: &H) {
    self.ready = self.check_ready(host).await;
    debug!(ready = self.ready, "fonts: readiness updated");
  }

  // --- Options ---

  async fn update_options<H: Host>(&mut self, host: &H) {
    if self.options.compatible_mode && self.os.is_none() {
      self.options.compatible_mode = false;
      warn!("fonts: unknown OS detected, compatibility mode disabled");
    }
    let expanded = match host.expand_path(&self.options.compatible_dir).await {
      Ok(path) => path,
      Err(e) => {
        warn!(dir = %self.options.compatible_dir, err = %e, "fonts: cannot expand compatible_dir");
        self.options.compatible_dir.clone()
      }
    };
    self.options.compatible_dir = self.format_path(&expanded);
    if self.last_compatible_dir.as_deref() != Some(self.options.compatible_dir.as_str()) {
      self.clear_fonts().await;
    }
    self.last_compatible_dir = Some(self.options.compatible_dir.clone());
    self.last_fonts_dir = None;
    self.ready = self.check_ready(host).await;
  }

  /// Apply freshly read options. Unchanged options are ignored.
  pub async fn reload<H: Host>(&mut self, host: &H, options: FontsOptions) {
    if options == self.raw_options {
      return;
    }
    info!(?options, "fonts: options reloaded");
    self.raw_options = options.clone();
    self.options = options;
    if !self.options.enable {
      self.state = FontState::Unset;
      if let Err(e) = host.set_property("sub-fonts-dir", Value::String(String::new())).await {
        warn!(err = %e, "fonts: failed to reset sub-fonts-dir");
      }
      self.write_fonts_conf("", true);
      self.clear_fonts().await;
    }
    self.update_options(host).await;
  }

  // --- Delivery ---

  fn write_fonts_conf(&self, fonts_dir: &str, require_exist: bool) {
    if let Err(e) = fonts::write_fonts_conf(&self.fonts_conf, fonts_dir, require_exist) {
      error!(err = %e, "fonts: failed to write fontconfig file");
    }
  }

  async fn set_fonts_dir<H: Host>(&self, host: &H, dir: Option<&str>) {
    let dir = dir.unwrap_or_default();
    match self.options.method {
      FontsMethod::Fontconfig => self.write_fonts_conf(dir, dir.is_empty()),
      FontsMethod::Native => {
        if let Err(e) = host.set_property("sub-fonts-dir", Value::String(dir.to_string())).await {
          error!(err = %e, "fonts: failed to set sub-fonts-dir");
        }
      }
    }
  }

  /// Remove the current compatibility directory, if any.
  async fn clear_fonts(&self) {
    if !self.ops.exists(&self.compatible_fonts_dir) {
      return;
    }
    if let Err(e) = self.ops.remove_recursive(&self.compatible_fonts_dir).await {
      error!(dir = %self.compatible_fonts_dir, err = %e, "fonts: failed to remove compatibility directory");
    }
  }

  /// First free `<compatible_dir>/<script>$<n>`, starting at 1.
  fn next_compatible_fonts_dir(&self) -> String {
    let base = util::join_path(&self.options.compatible_dir, &format!("{}$", constants().fonts_script_name));
    let base = self.format_path(&base);
    (1u32..).map(|i| format!("{}{}", base, i)).find(|path| !self.ops.exists(path)).unwrap_or(base)
  }

  async fn copy_fonts(&self, source: &str) -> Result<()> {
    if !self.ops.exists(&self.options.compatible_dir) {
      self.ops.create(&self.options.compatible_dir).await?;
    }
    self.ops.copy_recursive(source, &self.compatible_fonts_dir).await
  }

  // --- Events ---

  /// A file is about to load.
  pub async fn on_load<H: Host>(&mut self, host: &H) -> Result<()> {
    if host.get_bool("playback-abort").await.unwrap_or(false) {
      return Ok(());
    }
    let Some(path) = host.get_string("path").await? else {
      return Ok(());
    };

    let fonts_dir = if util::is_remote(&path) {
      None
    } else {
      let (mut media_dir, _) = util::split_path(&path);
      if !std::path::Path::new(&media_dir).is_absolute()
        && let Ok(Some(cwd)) = host.get_string("working-directory").await
      {
        media_dir = util::join_path(&cwd, &media_dir);
      }
      let sub_paths = host.get_string_list("sub-file-paths").await.unwrap_or_default();
      fonts::resolve_fonts_dir(&media_dir, &sub_paths, self.is_windows())
    };

    let Some(source) = fonts_dir else {
      if self.state != FontState::Unset {
        self.set_fonts_dir(host, None).await;
        self.state = FontState::Unset;
        debug!("fonts: no fonts directory, cleared");
      }
      return Ok(());
    };
    if !self.options.enable || !self.ready {
      warn!(dir = %source, "fonts: the fonts directory exists, but the script is not enabled");
      return Ok(());
    }
    if self.last_fonts_dir.as_deref() == Some(source.as_str()) {
      return Ok(());
    }

    let mut target = Some(source.clone());
    let mut state = FontState::DirectSet;
    if self.options.compatible_mode {
      self.clear_fonts().await;
      self.compatible_fonts_dir = self.next_compatible_fonts_dir();
      match self.copy_fonts(&source).await {
        Ok(()) => {
          target = Some(self.compatible_fonts_dir.clone());
          state = FontState::CompatibleSet;
        }
        Err(e) => {
          error!(
            src = %source, dst = %self.compatible_fonts_dir, err = %e,
            "fonts: copy fonts directory failed"
          );
          target = None;
          state = FontState::Unset;
        }
      }
    }

    // Keyed on the source directory even if the copy failed: the same directory is not retried.
    self.last_fonts_dir = Some(source.clone());
    self.set_fonts_dir(host, target.as_deref()).await;
    self.state = state;

    let method = self.options.method.label();
    match (state, target) {
      (FontState::DirectSet, Some(dir)) => info!(method, dir = %dir, "fonts: font directory set"),
      (FontState::CompatibleSet, Some(dir)) => {
        info!(method, dir = %dir, src = %source, "fonts: font directory set (compatible_mode)")
      }
      _ => {}
    }
    Ok(())
  }

  /// The player is shutting down.
  pub async fn on_shutdown<H: Host>(&mut self, host: &H) {
    self.set_fonts_dir(host, None).await;
    self.clear_fonts().await;
    self.state = FontState::Unset;
  }
}
