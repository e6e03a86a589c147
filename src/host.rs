//! The player-side surface the scripts depend on.
//!
//! `Host` is implemented over mpv's JSON IPC by [`crate::ipc::MpvIpc`] and by an
//! in-memory fake in tests.

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::constants::constants;

#[allow(async_fn_in_trait)]
pub trait Host {
  async fn get_property(&self, name: &str) -> Result<Value>;

  async fn set_property(&self, name: &str, value: Value) -> Result<()>;

  /// Run an input command given as an argument list.
  async fn command(&self, args: &[&str]) -> Result<Value>;

  async fn get_string(&self, name: &str) -> Result<Option<String>> {
    Ok(self.get_property(name).await?.as_str().map(str::to_string))
  }

  async fn get_bool(&self, name: &str) -> Result<bool> {
    Ok(self.get_property(name).await?.as_bool().unwrap_or(false))
  }

  async fn get_string_list(&self, name: &str) -> Result<Vec<String>> {
    let value = self.get_property(name).await?;
    Ok(
      value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default(),
    )
  }

  /// Expand mpv path prefixes such as `~~/`.
  async fn expand_path(&self, path: &str) -> Result<String> {
    self
      .command(&["expand-path", path])
      .await?
      .as_str()
      .map(str::to_string)
      .ok_or_else(|| anyhow!("expand-path returned no string for '{}'", path))
  }

  async fn apply_profile(&self, profile: &str) -> Result<()> {
    self.command(&["apply-profile", profile]).await.map(drop)
  }

  async fn restore_profile(&self, profile: &str) -> Result<()> {
    self.command(&["apply-profile", profile, "restore"]).await.map(drop)
  }

  /// Let the player continue past a hook it is blocked on.
  async fn hook_ack(&self, hook_id: u64) -> Result<()> {
    self.command(&["hook-ack", &hook_id.to_string()]).await.map(drop)
  }

  async fn osd_message(&self, text: &str) -> Result<()> {
    let duration = constants().osd_duration_ms.to_string();
    self.command(&["show-text", text, &duration]).await.map(drop)
  }
}


#[cfg(test)]
mod tests {
  use super::fake::FakeHost;
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn restore_profile_uses_restore_flag() {
    let host = FakeHost::new("/cfg");
    host.apply_profile("night").await.unwrap();
    host.restore_profile("night").await.unwrap();
    assert_eq!(host.calls("apply-profile"), vec![vec!["night".to_string()], vec!["night".to_string(), "restore".to_string()]]);
  }

  #[tokio::test]
  async fn string_list_ignores_non_strings() {
    let host = FakeHost::new("/cfg");
    host.set("sub-file-paths", json!(["subs", 3, "ass"]));
    assert_eq!(host.get_string_list("sub-file-paths").await.unwrap(), vec!["subs", "ass"]);
  }

  #[tokio::test]
  async fn expand_path_maps_config_prefix() {
    let host = FakeHost::new("/home/u/.config/mpv");
    assert_eq!(host.expand_path("~~/profiles").await.unwrap(), "/home/u/.config/mpv/profiles");
  }
}
