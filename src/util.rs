//! Small path, OS and text helpers shared by both scripts.

use std::path::{Component, Path, PathBuf};

// --- OS detection ---

/// Operating system family, as far as the scripts care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
  Windows,
  Linux,
  MacOs,
  Bsd,
}

impl Os {
  pub fn from_name(name: &str) -> Option<Self> {
    match name.to_lowercase().as_str() {
      "windows" => Some(Os::Windows),
      "linux" | "android" => Some(Os::Linux),
      "macos" | "darwin" => Some(Os::MacOs),
      "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Some(Os::Bsd),
      _ => None,
    }
  }

  pub fn is_windows(self) -> bool {
    self == Os::Windows
  }
}

/// Detect the OS this process runs on. `None` for families without a known shell adapter.
pub fn detect_os() -> Option<Os> {
  Os::from_name(std::env::consts::OS)
}

// --- Paths ---

fn is_separator(c: char) -> bool {
  c == '/' || (cfg!(windows) && c == '\\')
}

fn is_absolute(path: &str) -> bool {
  if path.starts_with('/') {
    return true;
  }
  if cfg!(windows) {
    let bytes = path.as_bytes();
    return path.starts_with('\\') || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':');
  }
  false
}

/// Join two path strings the way mpv does: an absolute `tail` wins, an empty `base` yields `tail`.
pub fn join_path(base: &str, tail: &str) -> String {
  if base.is_empty() || is_absolute(tail) {
    return tail.to_string();
  }
  if base.ends_with(is_separator) {
    format!("{}{}", base, tail)
  } else {
    format!("{}/{}", base, tail)
  }
}

/// Split a path into `(directory, file name)`. A bare file name lives in `.`.
pub fn split_path(path: &str) -> (String, String) {
  match path.rfind(is_separator) {
    Some(i) => (path[..=i].to_string(), path[i + 1..].to_string()),
    None => (".".to_string(), path.to_string()),
  }
}

/// Resolve `path` against the current directory and fold `.`/`..` lexically.
pub fn absolute_path(path: &str) -> String {
  let raw = Path::new(path);
  let joined = if raw.is_absolute() {
    raw.to_path_buf()
  } else {
    std::env::current_dir().unwrap_or_default().join(raw)
  };

  let mut out = PathBuf::new();
  for component in joined.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out.to_string_lossy().into_owned()
}

/// Convert forward slashes to back-slashes.
pub fn format_windows_path(path: &str) -> String {
  path.replace('/', "\\")
}

/// Whether `path` is a URL-ish stream (`scheme://...`) rather than a local file.
pub fn is_remote(path: &str) -> bool {
  match path.find("://") {
    Some(i) if i > 1 => path[..i].chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
    _ => false,
  }
}

pub fn file_exists(path: impl AsRef<Path>) -> bool {
  path.as_ref().is_file()
}

pub fn dir_exists(path: impl AsRef<Path>) -> bool {
  let path = path.as_ref();
  !path.as_os_str().is_empty() && path.is_dir()
}

// --- Text ---

/// Read a text file as trimmed, non-blank lines.
///
/// Returns `None` if `path` is not a regular file or cannot be read as UTF-8.
/// With `ignore_comments`, lines starting with `#` are dropped.
pub fn read_file_lines(path: impl AsRef<Path>, ignore_comments: bool) -> Option<Vec<String>> {
  let path = path.as_ref();
  if !file_exists(path) {
    return None;
  }
  let data = std::fs::read_to_string(path).ok()?;
  let lines = data
    .split('\n')
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .filter(|line| !(ignore_comments && line.starts_with('#')))
    .map(str::to_string)
    .collect();
  Some(lines)
}

/// Escape the five XML special characters.
pub fn escape_xml(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '\'' => out.push_str("&apos;"),
      '"' => out.push_str("&quot;"),
      _ => out.push(c),
    }
  }
  out
}

/// Replace the first `%s` in `template` with `value`.
pub fn string_format(template: &str, value: &str) -> String {
  template.replacen("%s", value, 1)
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- join_path / split_path ---

  #[test]
  fn join_path_inserts_single_separator() {
    assert_eq!(join_path("/media/show", "fonts"), "/media/show/fonts");
    assert_eq!(join_path("/media/show/", "fonts"), "/media/show/fonts");
    assert_eq!(join_path("/media/show/", ""), "/media/show/");
  }

  #[test]
  fn join_path_absolute_tail_wins() {
    assert_eq!(join_path("/media/show", "/srv/subs"), "/srv/subs");
    assert_eq!(join_path("", "subs"), "subs");
  }

  #[test]
  fn split_path_keeps_trailing_separator() {
    assert_eq!(split_path("/media/show/ep01.mkv"), ("/media/show/".to_string(), "ep01.mkv".to_string()));
    assert_eq!(split_path("ep01.mkv"), (".".to_string(), "ep01.mkv".to_string()));
  }

  #[test]
  fn absolute_path_folds_dot_segments() {
    assert_eq!(absolute_path("/media/show/./subs/../fonts"), "/media/show/fonts");
  }

  #[test]
  fn absolute_path_resolves_relative_against_cwd() {
    let cwd = std::env::current_dir().unwrap();
    assert_eq!(absolute_path("fonts"), cwd.join("fonts").to_string_lossy());
  }

  #[test]
  fn format_windows_path_flips_slashes() {
    assert_eq!(format_windows_path("C:/Videos/fonts"), "C:\\Videos\\fonts");
  }

  #[test]
  fn is_remote_detects_scheme() {
    assert!(is_remote("https://example.com/a.mkv"));
    assert!(is_remote("ytdl://abc"));
    assert!(!is_remote("/media/show/ep01.mkv"));
    assert!(!is_remote("C://weird"));
  }

  // --- OS ---

  #[test]
  fn os_from_name_known_and_unknown() {
    assert_eq!(Os::from_name("windows"), Some(Os::Windows));
    assert_eq!(Os::from_name("Darwin"), Some(Os::MacOs));
    assert_eq!(Os::from_name("linux"), Some(Os::Linux));
    assert_eq!(Os::from_name("haiku"), None);
  }

  // --- read_file_lines ---

  #[test]
  fn read_file_lines_skips_comments_and_blanks() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("profiles");
    std::fs::write(&file, "movie\n# comment\n\nanime").unwrap();
    assert_eq!(read_file_lines(&file, true), Some(vec!["movie".to_string(), "anime".to_string()]));
  }

  #[test]
  fn read_file_lines_strips_carriage_returns() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("profiles");
    std::fs::write(&file, "movie\r\n  anime  \r\n").unwrap();
    assert_eq!(read_file_lines(&file, true), Some(vec!["movie".to_string(), "anime".to_string()]));
  }

  #[test]
  fn read_file_lines_keeps_comments_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("list");
    std::fs::write(&file, "#keep\nline").unwrap();
    assert_eq!(read_file_lines(&file, false), Some(vec!["#keep".to_string(), "line".to_string()]));
  }

  #[test]
  fn read_file_lines_missing_or_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(read_file_lines(dir.path().join("nope"), true), None);
    assert_eq!(read_file_lines(dir.path(), true), None);
  }

  // --- text ---

  #[test]
  fn escape_xml_escapes_ampersand_once() {
    assert_eq!(escape_xml("a&b<c>'d\""), "a&amp;b&lt;c&gt;&apos;d&quot;");
  }

  #[test]
  fn string_format_replaces_first_placeholder() {
    assert_eq!(string_format("<dir>%s</dir>", "/a"), "<dir>/a</dir>");
  }
}
