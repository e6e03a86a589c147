//! Routes player events to script handlers through a registration table.
//!
//! Each event key maps to a priority-ordered list of handlers. Events are handled one
//! at a time; a failing handler is logged and the remaining handlers still run. A load
//! that arrived as a player hook is acknowledged only after every handler has finished.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::config;
use crate::constants::constants;
use crate::font_sync::FontLoader;
use crate::fs_ops::DirOps;
use crate::host::Host;
use crate::profile::ProfileToggle;

/// Something the player told us.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  /// A file starts loading. `hook_id` is set when the player waits for our ack.
  Load { hook_id: Option<u64> },
  Shutdown,
  PropertyChange { name: String, data: Value },
  /// `script-message <name> <args...>`.
  Message { name: String, args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
  Load,
  Shutdown,
  Property(String),
  Message(String),
}

impl Event {
  pub fn key(&self) -> EventKey {
    match self {
      Event::Load { .. } => EventKey::Load,
      Event::Shutdown => EventKey::Shutdown,
      Event::PropertyChange { name, .. } => EventKey::Property(name.clone()),
      Event::Message { name, .. } => EventKey::Message(name.clone()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
  FontsLoad,
  FontsShutdown,
  FontsOptions,
  FontsProvider,
  ApplyProfile,
  RestoreProfile,
  SmartProfile,
}

#[derive(Debug, Clone, Copy)]
struct Registration {
  priority: i32,
  handler: Handler,
}

pub struct Dispatcher<D: DirOps> {
  fonts: Option<FontLoader<D>>,
  profiles: Option<ProfileToggle>,
  table: HashMap<EventKey, Vec<Registration>>,
}

impl<D: DirOps> Default for Dispatcher<D> {
  fn default() -> Self {
    Self { fonts: None, profiles: None, table: HashMap::new() }
  }
}

impl<D: DirOps> Dispatcher<D> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Lower priorities run first; equal priorities keep registration order.
  fn register(&mut self, key: EventKey, priority: i32, handler: Handler) {
    let list = self.table.entry(key).or_default();
    list.push(Registration { priority, handler });
    list.sort_by_key(|r| r.priority);
  }

  pub fn add_fonts(&mut self, loader: FontLoader<D>) {
    self.fonts = Some(loader);
    self.register(EventKey::Load, constants().fonts_load_priority, Handler::FontsLoad);
    self.register(EventKey::Shutdown, 0, Handler::FontsShutdown);
    self.register(EventKey::Property("script-opts".into()), 0, Handler::FontsOptions);
    self.register(EventKey::Property("sub-font-provider".into()), 0, Handler::FontsProvider);
  }

  pub fn add_profiles(&mut self, toggle: ProfileToggle) {
    self.profiles = Some(toggle);
    self.register(EventKey::Message("apply-profile".into()), 0, Handler::ApplyProfile);
    self.register(EventKey::Message("restore-profile".into()), 0, Handler::RestoreProfile);
    self.register(EventKey::Message("smart-profile".into()), 0, Handler::SmartProfile);
  }

  /// Priority of the first load handler, if any script wants the load hook.
  pub fn load_hook_priority(&self) -> Option<i32> {
    self.table.get(&EventKey::Load).and_then(|list| list.first()).map(|r| r.priority)
  }

  /// Property names some handler wants to observe.
  pub fn observed_properties(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .table
      .keys()
      .filter_map(|key| match key {
        EventKey::Property(name) => Some(name.clone()),
        _ => None,
      })
      .collect();
    names.sort();
    names
  }

  pub async fn dispatch<H: Host>(&mut self, host: &H, event: &Event) {
    let registrations = self.table.get(&event.key()).cloned().unwrap_or_default();
    if !registrations.is_empty() {
      debug!(?event, handlers = registrations.len(), "dispatch: event");
    }
    for registration in registrations {
      if let Err(e) = self.run(host, registration.handler, event).await {
        error!(handler = ?registration.handler, err = %e, "dispatch: handler failed");
      }
    }
    if let Event::Load { hook_id: Some(id) } = event
      && let Err(e) = host.hook_ack(*id).await
    {
      warn!(hook_id = id, err = %e, "dispatch: hook-ack failed");
    }
  }

  async fn run<H: Host>(&mut self, host: &H, handler: Handler, event: &Event) -> anyhow::Result<()> {
    let args = match event {
      Event::Message { args, .. } => args.as_slice(),
      _ => &[],
    };
    let arg = |i: usize| args.get(i).map(String::as_str);

    match handler {
      Handler::FontsLoad => {
        if let Some(fonts) = self.fonts.as_mut() {
          fonts.on_load(host).await?;
          debug!(state = ?fonts.state(), "dispatch: fonts loaded");
        }
      }
      Handler::FontsShutdown => {
        if let Some(fonts) = self.fonts.as_mut() {
          fonts.on_shutdown(host).await;
        }
      }
      Handler::FontsOptions => {
        if let Some(fonts) = self.fonts.as_mut() {
          let data = match event {
            Event::PropertyChange { data, .. } => Some(data),
            _ => None,
          };
          let options = config::load_fonts_options(host, data).await;
          fonts.reload(host, options).await;
        }
      }
      Handler::FontsProvider => {
        if let Some(fonts) = self.fonts.as_mut() {
          fonts.refresh_ready(host).await;
        }
      }
      Handler::ApplyProfile => {
        if let Some(profiles) = self.profiles.as_mut() {
          profiles.apply_if_needed(host, arg(0).unwrap_or_default()).await;
        }
      }
      Handler::RestoreProfile => {
        if let Some(profiles) = self.profiles.as_mut() {
          profiles.restore_if_needed(host, arg(0).unwrap_or_default()).await;
        }
      }
      Handler::SmartProfile => {
        if let Some(profiles) = self.profiles.as_mut() {
          profiles.smart_toggle(host, arg(0).unwrap_or_default(), arg(1), arg(2)).await;
        }
      }
    }
    Ok(())
  }

  #[cfg(test)]
  fn profiles(&self) -> Option<&ProfileToggle> {
    self.profiles.as_ref()
  }

  #[cfg(test)]
  fn fonts(&self) -> Option<&FontLoader<D>> {
    self.fonts.as_ref()
  }
}
