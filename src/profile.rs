//! Applies and restores named mpv profiles, remembering which ones this process applied.
//!
//! - `apply-profile <name>` applies unless already applied.
//! - `restore-profile <name>` restores only if applied here.
//! - `smart-profile <name> [display] [restored]` flips the state and shows an OSD message.
//!
//! At startup the first readable toggle-list file (`~~/profiles.local`, then
//! `~~/profiles`) is applied line by line.
//!
//! Only broadcast `script-message` reaches these handlers. mpv names this IPC client
//! `ipc_N`, so `script-message-to smart_profile ...` (or `auto_load_fonts`) is not
//! delivered here.

use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::constants::constants;
use crate::host::Host;
use crate::util;

#[derive(Debug, Default)]
pub struct ProfileToggle {
  state: HashMap<String, bool>,
}

impl ProfileToggle {
  pub fn new() -> Self {
    Self::default()
  }

  /// `true` iff `profile` is currently applied. Unseen profiles are not.
  pub fn get_state(&self, profile: &str) -> bool {
    self.state.get(profile).copied().unwrap_or(false)
  }

  /// Flip `profile` through the host and return the new state.
  ///
  /// A failing host command is logged; the recorded state flips anyway.
  pub async fn toggle<H: Host>(&mut self, host: &H, profile: &str) -> bool {
    let applied = self.get_state(profile);
    let result = if applied { host.restore_profile(profile).await } else { host.apply_profile(profile).await };
    if let Err(e) = result {
      warn!(profile, err = %e, "profile: host command failed");
    }
    let state = !applied;
    self.state.insert(profile.to_string(), state);
    debug!(profile, applied = state, "profile: toggled");
    state
  }

  pub async fn apply_if_needed<H: Host>(&mut self, host: &H, profile: &str) {
    if profile.is_empty() || self.get_state(profile) {
      return;
    }
    self.toggle(host, profile).await;
  }

  pub async fn restore_if_needed<H: Host>(&mut self, host: &H, profile: &str) {
    if profile.is_empty() || !self.get_state(profile) {
      return;
    }
    self.toggle(host, profile).await;
  }

  /// Toggle `profile` and show the matching loaded/restored message.
  pub async fn smart_toggle<H: Host>(
    &mut self,
    host: &H,
    profile: &str,
    display_name: Option<&str>,
    restored_message: Option<&str>,
  ) {
    if profile.is_empty() {
      error!("profile: empty profile");
      return;
    }
    let (loaded, restored) = smart_messages(profile, display_name, restored_message);
    let message = if self.toggle(host, profile).await { loaded } else { restored };
    if !message.trim().is_empty()
      && let Err(e) = host.osd_message(&message).await
    {
      warn!(err = %e, "profile: failed to show OSD message");
    }
  }

  /// Apply every profile listed in the first readable toggle-list file.
  pub async fn load_toggle_list<H: Host>(&mut self, host: &H) {
    for file in &constants().profile_list_files {
      let path = match host.expand_path(file).await {
        Ok(path) => path,
        Err(e) => {
          warn!(file = %file, err = %e, "profile: cannot expand path");
          continue;
        }
      };
      let Some(profiles) = util::read_file_lines(&path, true) else {
        continue;
      };
      info!(file = %path, count = profiles.len(), "profile: applying toggle list");
      for profile in &profiles {
        self.apply_if_needed(host, profile).await;
      }
      break;
    }
  }
}

/// The `(loaded, restored)` message pair for `smart-profile`.
///
/// Without a restored message both default to `"<name> <suffix>"`. With one,
/// the loaded message is the display name verbatim and the restored message is used as given.
fn smart_messages(profile: &str, display_name: Option<&str>, restored_message: Option<&str>) -> (String, String) {
  let c = constants();
  match restored_message {
    None => {
      let name = display_name.unwrap_or(profile);
      (format!("{}{}", name, c.profile_loaded_suffix), format!("{}{}", name, c.profile_restored_suffix))
    }
    Some(restored) => (display_name.unwrap_or_default().to_string(), restored.to_string()),
  }
}
