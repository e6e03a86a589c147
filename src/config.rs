use anyhow::{Result, anyhow};
use directories::ProjectDirs;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::constants::constants;
use crate::host::Host;
use crate::util;

// --- App preferences ---

/// Companion-process preferences from `prefs.toml`. CLI flags take precedence.
#[derive(Deserialize, Default, Debug)]
pub struct Prefs {
  pub socket: Option<String>,
  pub log_level: Option<String>,
  pub log_file: Option<bool>,
}

impl Prefs {
  pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mpv-autoscripts")
  }

  pub fn load() -> Self {
    if let Some(proj_dirs) = Self::project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(prefs) = toml::from_str(&content)
      {
        return prefs;
      }
    }
    Self::default()
  }
}

/// The IPC endpoint mpv is conventionally started with.
pub fn default_socket_path() -> String {
  if cfg!(windows) { r"\\.\pipe\mpvsocket".to_string() } else { "/tmp/mpvsocket".to_string() }
}

// --- auto_load_fonts options ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontsMethod {
  Fontconfig,
  Native,
}

impl FontsMethod {
  pub fn label(self) -> &'static str {
    match self {
      FontsMethod::Fontconfig => "fontconfig",
      FontsMethod::Native => "native",
    }
  }

  pub fn from_option(s: &str) -> Option<Self> {
    match s {
      "fontconfig" => Some(FontsMethod::Fontconfig),
      "native" => Some(FontsMethod::Native),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontsOptions {
  pub enable: bool,
  pub compatible_mode: bool,
  pub compatible_dir: String,
  pub method: FontsMethod,
}

impl Default for FontsOptions {
  fn default() -> Self {
    Self { enable: true, compatible_mode: false, compatible_dir: "~~/.fonts".to_string(), method: FontsMethod::Fontconfig }
  }
}

fn parse_bool(value: &str) -> Option<bool> {
  match value {
    "yes" | "true" => Some(true),
    "no" | "false" => Some(false),
    _ => None,
  }
}

impl FontsOptions {
  /// Set one option from its string form.
  pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
    let invalid = || anyhow!("invalid value '{}' for option '{}'", value, key);
    match key {
      "enable" => self.enable = parse_bool(value).ok_or_else(invalid)?,
      "compatible_mode" => self.compatible_mode = parse_bool(value).ok_or_else(invalid)?,
      "compatible_dir" => self.compatible_dir = value.to_string(),
      "method" => self.method = FontsMethod::from_option(value).ok_or_else(invalid)?,
      _ => return Err(anyhow!("unknown option '{}'", key)),
    }
    Ok(())
  }

  /// Defaults overlaid with `pairs`, in order. Bad entries are logged and skipped.
  pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    let mut options = Self::default();
    for (key, value) in pairs {
      if let Err(e) = options.set(key, value) {
        warn!(err = %e, "config: ignoring option");
      }
    }
    options
  }
}

/// `key=value` pairs from an mpv `script-opts/<name>.conf` file.
fn parse_conf_lines(lines: &[String]) -> Vec<(&str, &str)> {
  lines
    .iter()
    .filter_map(|line| {
      let pair = line.split_once('=');
      if pair.is_none() {
        warn!(line = %line, "config: malformed option line");
      }
      pair
    })
    .collect()
}

/// Entries of the `script-opts` map addressed to `script` (`<script>-<key>=<value>`).
fn script_opts_pairs(script_opts: &Value, script: &str) -> Vec<(String, String)> {
  let prefix = format!("{}-", script);
  let Some(map) = script_opts.as_object() else {
    return Vec::new();
  };
  map
    .iter()
    .filter_map(|(key, value)| {
      let key = key.strip_prefix(&prefix)?;
      let value = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      Some((key.to_string(), value))
    })
    .collect()
}

/// Read `auto_load_fonts` options: defaults, then the script-opts file, then the
/// `script-opts` property. `script_opts` is the already known property value, if any.
pub async fn load_fonts_options<H: Host>(host: &H, script_opts: Option<&Value>) -> FontsOptions {
  let script = &constants().fonts_script_name;
  let conf = util::join_path(&constants().script_opts_dir, &format!("{}.conf", script));
  let file_lines = match host.expand_path(&conf).await {
    Ok(path) => util::read_file_lines(path, true).unwrap_or_default(),
    Err(e) => {
      warn!(err = %e, "config: cannot locate script-opts file");
      Vec::new()
    }
  };

  let fetched;
  let script_opts = match script_opts {
    Some(v) => v,
    None => {
      fetched = host.get_property("script-opts").await.unwrap_or(Value::Null);
      &fetched
    }
  };
  let overrides = script_opts_pairs(script_opts, script);

  let file_pairs = parse_conf_lines(&file_lines);
  FontsOptions::from_pairs(file_pairs.into_iter().chain(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::fake::FakeHost;
  use serde_json::json;

  // --- Prefs ---

  #[test]
  fn prefs_read_partial_toml() {
    let prefs: Prefs = toml::from_str("socket = \"/run/mpv.sock\"\nlog_file = true\n").unwrap();
    assert_eq!(prefs.socket.as_deref(), Some("/run/mpv.sock"));
    assert_eq!(prefs.log_file, Some(true));
    assert!(prefs.log_level.is_none());
  }

  // --- FontsOptions ---

  #[test]
  fn defaults_match_script() {
    let o = FontsOptions::default();
    assert!(o.enable);
    assert!(!o.compatible_mode);
    assert_eq!(o.compatible_dir, "~~/.fonts");
    assert_eq!(o.method, FontsMethod::Fontconfig);
  }

  #[test]
  fn set_parses_mpv_booleans() {
    let mut o = FontsOptions::default();
    o.set("enable", "no").unwrap();
    o.set("compatible_mode", "yes").unwrap();
    assert!(!o.enable);
    assert!(o.compatible_mode);
  }

  #[test]
  fn set_rejects_bad_values_and_keys() {
    let mut o = FontsOptions::default();
    assert!(o.set("method", "freetype").is_err());
    assert!(o.set("enable", "maybe").is_err());
    assert!(o.set("colour", "red").is_err());
    assert_eq!(o, FontsOptions::default());
  }

  #[test]
  fn from_pairs_later_entries_win() {
    let o = FontsOptions::from_pairs([("method", "native"), ("method", "fontconfig"), ("bogus", "1")]);
    assert_eq!(o.method, FontsMethod::Fontconfig);
  }

  // --- sources ---

  #[test]
  fn script_opts_pairs_filters_prefix() {
    let opts = json!({"auto_load_fonts-method": "native", "other-method": "x", "auto_load_fonts-enable": "no"});
    let mut pairs = script_opts_pairs(&opts, "auto_load_fonts");
    pairs.sort();
    assert_eq!(
      pairs,
      vec![("enable".to_string(), "no".to_string()), ("method".to_string(), "native".to_string())]
    );
  }

  #[tokio::test]
  async fn property_overrides_conf_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("script-opts")).unwrap();
    std::fs::write(
      tmp.path().join("script-opts/auto_load_fonts.conf"),
      "# fonts\ncompatible_mode=yes\nmethod=fontconfig\ncompatible_dir=~~/cache/fonts\n",
    )
    .unwrap();
    let host = FakeHost::new(tmp.path().to_string_lossy());
    host.set("script-opts", json!({"auto_load_fonts-method": "native"}));

    let o = load_fonts_options(&host, None).await;
    assert!(o.compatible_mode);
    assert_eq!(o.compatible_dir, "~~/cache/fonts");
    assert_eq!(o.method, FontsMethod::Native);
  }

  #[tokio::test]
  async fn missing_sources_yield_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let host = FakeHost::new(tmp.path().to_string_lossy());
    assert_eq!(load_fonts_options(&host, None).await, FontsOptions::default());
  }
}
