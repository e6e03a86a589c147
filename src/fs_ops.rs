//! Directory operations behind a narrow trait, backed by the platform's shell tools.
//!
//! Each call launches at most one external process and waits for it to exit.

use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::util::{self, Os};

#[allow(async_fn_in_trait)]
pub trait DirOps {
  fn exists(&self, dir: &str) -> bool;

  /// Create `dir` and any missing parents.
  async fn create(&self, dir: &str) -> Result<()>;

  /// Copy the contents of `src` into `dst` recursively, creating `dst`.
  async fn copy_recursive(&self, src: &str, dst: &str) -> Result<()>;

  async fn remove_recursive(&self, dir: &str) -> Result<()>;
}

/// Shell-backed `DirOps` for one OS family.
#[derive(Debug, Clone, Copy)]
pub struct ShellDirOps {
  os: Os,
}

impl ShellDirOps {
  pub fn new(os: Os) -> Self {
    Self { os }
  }

  fn mkdir_args(&self, dir: &str) -> Vec<String> {
    if self.os.is_windows() {
      vec!["cmd.exe".into(), "/c".into(), "mkdir".into(), dir.into()]
    } else {
      vec!["mkdir".into(), "-p".into(), dir.into()]
    }
  }

  fn copy_args(&self, src: &str, dst: &str) -> Vec<String> {
    if self.os.is_windows() {
      vec!["Robocopy.exe".into(), src.into(), dst.into(), "/S".into(), "/R:1".into()]
    } else {
      vec!["cp".into(), "-p".into(), "-r".into(), src.into(), dst.into()]
    }
  }

  fn remove_args(&self, dir: &str) -> Vec<String> {
    if self.os.is_windows() {
      vec!["cmd.exe".into(), "/c".into(), "rmdir".into(), "/S".into(), "/Q".into(), dir.into()]
    } else {
      vec!["rm".into(), "-r".into(), dir.into()]
    }
  }

  /// Robocopy reports success with any exit code below 8.
  fn copy_succeeded(&self, status: i32) -> bool {
    if self.os.is_windows() { (0..8).contains(&status) } else { status == 0 }
  }
}

/// Run a command to completion and return its exit code (`-1` when killed by a signal).
async fn run(args: &[String]) -> Result<i32> {
  let (program, rest) = args.split_first().context("empty command line")?;
  let output = Command::new(program)
    .args(rest)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .output()
    .await
    .with_context(|| format!("Failed to run {}", program))?;

  let status = output.status.code().unwrap_or(-1);
  debug!(cmd = ?args, status, "fs: subprocess finished");
  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
      warn!(cmd = %program, stderr = %stderr.trim(), "fs: subprocess reported an error");
    }
  }
  Ok(status)
}

impl DirOps for ShellDirOps {
  fn exists(&self, dir: &str) -> bool {
    util::dir_exists(dir)
  }

  async fn create(&self, dir: &str) -> Result<()> {
    let status = run(&self.mkdir_args(dir)).await?;
    if status != 0 {
      return Err(anyhow!("mkdir '{}' exited with status {}", dir, status));
    }
    Ok(())
  }

  async fn copy_recursive(&self, src: &str, dst: &str) -> Result<()> {
    let status = run(&self.copy_args(src, dst)).await?;
    if !self.copy_succeeded(status) {
      return Err(anyhow!("copy '{}' -> '{}' exited with status {}", src, dst, status));
    }
    Ok(())
  }

  async fn remove_recursive(&self, dir: &str) -> Result<()> {
    let status = run(&self.remove_args(dir)).await?;
    if status != 0 {
      return Err(anyhow!("remove '{}' exited with status {}", dir, status));
    }
    Ok(())
  }
}

#[cfg(test)]
pub mod fake {
  use super::*;
  use std::cell::{Cell, RefCell};
  use std::collections::BTreeSet;

  /// In-memory directory set that records every mutating call.
  #[derive(Default)]
  pub struct FakeDirOps {
    pub dirs: RefCell<BTreeSet<String>>,
    pub log: RefCell<Vec<String>>,
    pub fail_copy: Cell<bool>,
  }

  impl FakeDirOps {
    pub fn with_dirs(dirs: &[&str]) -> Self {
      let fake = Self::default();
      fake.dirs.borrow_mut().extend(dirs.iter().map(|d| d.to_string()));
      fake
    }

    pub fn log(&self) -> Vec<String> {
      self.log.borrow().clone()
    }
  }

  impl DirOps for FakeDirOps {
    fn exists(&self, dir: &str) -> bool {
      self.dirs.borrow().contains(dir)
    }

    async fn create(&self, dir: &str) -> Result<()> {
      self.log.borrow_mut().push(format!("mkdir {}", dir));
      self.dirs.borrow_mut().insert(dir.to_string());
      Ok(())
    }

    async fn copy_recursive(&self, src: &str, dst: &str) -> Result<()> {
      self.log.borrow_mut().push(format!("copy {} {}", src, dst));
      if self.fail_copy.get() {
        return Err(anyhow!("copy failed"));
      }
      self.dirs.borrow_mut().insert(dst.to_string());
      Ok(())
    }

    async fn remove_recursive(&self, dir: &str) -> Result<()> {
      self.log.borrow_mut().push(format!("rm {}", dir));
      self.dirs.borrow_mut().remove(dir);
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unix_commands() {
    let ops = ShellDirOps::new(Os::Linux);
    assert_eq!(ops.mkdir_args("/a"), ["mkdir", "-p", "/a"]);
    assert_eq!(ops.copy_args("/src", "/dst"), ["cp", "-p", "-r", "/src", "/dst"]);
    assert_eq!(ops.remove_args("/a"), ["rm", "-r", "/a"]);
  }

  #[test]
  fn windows_commands() {
    let ops = ShellDirOps::new(Os::Windows);
    assert_eq!(ops.mkdir_args("C:\\a"), ["cmd.exe", "/c", "mkdir", "C:\\a"]);
    assert_eq!(ops.copy_args("C:\\s", "C:\\d"), ["Robocopy.exe", "C:\\s", "C:\\d", "/S", "/R:1"]);
    assert_eq!(ops.remove_args("C:\\a"), ["cmd.exe", "/c", "rmdir", "/S", "/Q", "C:\\a"]);
  }

  #[test]
  fn robocopy_success_range() {
    let ops = ShellDirOps::new(Os::Windows);
    assert!(ops.copy_succeeded(0));
    assert!(ops.copy_succeeded(7));
    assert!(!ops.copy_succeeded(8));
    assert!(!ops.copy_succeeded(-1));
    assert!(!ShellDirOps::new(Os::Linux).copy_succeeded(1));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn shell_ops_copy_and_remove_on_unix() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("fonts");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(src.join("a.ttf"), b"font").unwrap();

    let ops = ShellDirOps::new(Os::Linux);
    let base = tmp.path().join("compat").to_string_lossy().into_owned();
    ops.create(&base).await.unwrap();
    assert!(ops.exists(&base));

    let dst = format!("{}/auto_load_fonts$1", base);
    ops.copy_recursive(&src.to_string_lossy(), &dst).await.unwrap();
    assert!(std::path::Path::new(&dst).join("a.ttf").is_file());

    ops.remove_recursive(&dst).await.unwrap();
    assert!(!ops.exists(&dst));
  }
}
