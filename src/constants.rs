//! Script constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

#[derive(Debug, Deserialize)]
pub struct Constants {
  pub fonts_script_name: String,
  pub profiles_script_name: String,

  // Fonts
  pub fonts_sub_dirs: Vec<String>,
  pub fonts_conf_path: String,
  pub fontconfig_xml_template: String,
  pub fontconfig_dir_xml_template: String,
  pub fonts_load_priority: i32,

  // Profiles
  pub profile_list_files: Vec<String>,
  pub profile_loaded_suffix: String,
  pub profile_restored_suffix: String,

  // Options / OSD
  pub script_opts_dir: String,
  pub osd_duration_ms: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; a malformed file fails every test run.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fonts_sub_dirs_keep_priority_order() {
    assert_eq!(constants().fonts_sub_dirs, ["fonts", "Fonts", "FONTS", "字体"]);
  }

  #[test]
  fn local_profile_list_is_searched_first() {
    assert_eq!(constants().profile_list_files[0], "~~/profiles.local");
    assert_eq!(constants().profile_list_files[1], "~~/profiles");
  }
}
