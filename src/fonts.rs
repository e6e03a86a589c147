//! Fonts directory discovery and the fontconfig include file.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::constants::constants;
use crate::util;

// --- Resolver ---

/// Directories searched for fonts, in order: the media directory itself, then each
/// subtitle search path relative to it.
fn search_dirs(media_dir: &str, sub_paths: &[String]) -> Vec<String> {
  std::iter::once("").chain(sub_paths.iter().map(String::as_str)).map(|sub| util::join_path(media_dir, sub)).collect()
}

/// First existing fonts subdirectory of `dir`, formatted for the host OS.
fn available_fonts_dir(dir: &str, windows: bool) -> Option<String> {
  constants().fonts_sub_dirs.iter().find_map(|name| {
    let candidate = util::absolute_path(&util::join_path(dir, name));
    util::dir_exists(&candidate).then(|| if windows { util::format_windows_path(&candidate) } else { candidate })
  })
}

/// Find the fonts directory for media living in `media_dir`.
///
/// Sub-directory names are tried as `fonts`, `Fonts`, `FONTS`, `字体` inside each
/// search directory; the first hit across both loops wins.
pub fn resolve_fonts_dir(media_dir: &str, sub_paths: &[String], windows: bool) -> Option<String> {
  let found = search_dirs(media_dir, sub_paths).iter().find_map(|dir| available_fonts_dir(dir, windows));
  debug!(media_dir, found = ?found, "fonts: resolved");
  found
}

// --- Fontconfig file ---

/// The fontconfig document pointing at `fonts_dir`, or an empty root when `fonts_dir` is empty.
pub fn fontconfig_xml(fonts_dir: &str) -> String {
  let c = constants();
  let inner = if fonts_dir.is_empty() {
    String::new()
  } else {
    util::string_format(&c.fontconfig_dir_xml_template, &util::escape_xml(fonts_dir))
  };
  util::string_format(&c.fontconfig_xml_template, &inner)
}

/// Write the fontconfig include file unless it would be redundant.
///
/// With `require_exist`, a missing file is left missing. Identical content is never
/// rewritten. Returns whether the file was written.
pub fn write_fonts_conf(path: &Path, fonts_dir: &str, require_exist: bool) -> Result<bool> {
  let exists = util::file_exists(path);
  if require_exist && !exists {
    return Ok(false);
  }
  let data = fontconfig_xml(fonts_dir);
  if exists && std::fs::read(path).is_ok_and(|current| current == data.as_bytes()) {
    return Ok(false);
  }
  std::fs::write(path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
  debug!(path = %path.display(), fonts_dir, "fonts: wrote fontconfig file");
  Ok(true)
}
