mod config;
mod constants;
mod dispatch;
mod font_sync;
mod fonts;
mod fs_ops;
mod host;
mod ipc;
mod logging;
mod profile;
mod util;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::time::Duration;
use tracing::{info, warn};

use constants::constants;
use dispatch::{Dispatcher, Event};
use font_sync::FontLoader;
use fs_ops::ShellDirOps;
use host::Host;
use ipc::{LOAD_HOOK_ID, MpvIpc};
use profile::ProfileToggle;
use util::Os;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// mpv IPC socket or pipe, as given to mpv's --input-ipc-server
  #[arg(short, long)]
  socket: Option<String>,

  /// Do not load fonts from the media directory
  #[arg(long)]
  no_fonts: bool,

  /// Do not manage profiles
  #[arg(long)]
  no_profiles: bool,

  /// Log level for this program: error, warn, info, debug or trace
  #[arg(long)]
  log_level: Option<String>,

  /// Also write a daily log file to the data directory
  #[arg(long)]
  log_file: bool,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<clap_complete::Shell>,
}

const CONNECT_ATTEMPTS: u32 = 25;
const CONNECT_INTERVAL: Duration = Duration::from_millis(200);

/// mpv may still be creating its socket when we start.
async fn connect(socket: &str) -> Result<(MpvIpc, tokio::sync::mpsc::UnboundedReceiver<Event>)> {
  let mut attempt = 1;
  loop {
    match MpvIpc::connect(socket).await {
      Ok(conn) => return Ok(conn),
      Err(e) if attempt >= CONNECT_ATTEMPTS => {
        return Err(e).with_context(|| format!("mpv not reachable at {}", socket));
      }
      Err(_) => {
        attempt += 1;
        tokio::time::sleep(CONNECT_INTERVAL).await;
      }
    }
  }
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    return Ok(());
  }

  let prefs = config::Prefs::load();
  let log_level = args.log_level.as_deref().or(prefs.log_level.as_deref());
  let _guard = logging::init(log_level, args.log_file || prefs.log_file.unwrap_or(false))?;

  let socket = args.socket.clone().or(prefs.socket.clone()).unwrap_or_else(config::default_socket_path);
  run(&args, &socket).await
}

async fn run(args: &Args, socket: &str) -> Result<()> {
  let (ipc, mut events) = connect(socket).await?;
  info!(socket, "main: connected to mpv");

  let os = util::detect_os();
  if os.is_none() {
    warn!(os = std::env::consts::OS, "main: unknown OS");
  }

  let mut dispatcher = Dispatcher::new();

  if !args.no_fonts {
    let options = config::load_fonts_options(&ipc, None).await;
    let ops = ShellDirOps::new(os.unwrap_or(Os::Linux));
    let loader = FontLoader::new(&ipc, ops, os, options).await.context("Failed to start auto_load_fonts")?;
    dispatcher.add_fonts(loader);
    info!(script = %constants().fonts_script_name, "main: script enabled");
  }

  if !args.no_profiles {
    let mut toggle = ProfileToggle::new();
    toggle.load_toggle_list(&ipc).await;
    dispatcher.add_profiles(toggle);
    info!(script = %constants().profiles_script_name, "main: script enabled");
  }

  for (id, name) in (1u64..).zip(dispatcher.observed_properties()) {
    ipc.observe_property(id, &name).await.with_context(|| format!("Failed to observe {}", name))?;
  }

  if let Some(priority) = dispatcher.load_hook_priority() {
    ipc.add_hook("on_load", LOAD_HOOK_ID, priority).await.context("Failed to register the on_load hook")?;
  }

  // A file may already be playing; its on_load hook ran before we attached.
  if matches!(ipc.get_string("path").await, Ok(Some(_))) {
    dispatcher.dispatch(&ipc, &Event::Load { hook_id: None }).await;
  }

  // Load hooks are acknowledged inside `dispatch`, after their handlers finish.
  while let Some(event) = events.recv().await {
    let shutdown = event == Event::Shutdown;
    dispatcher.dispatch(&ipc, &event).await;
    if shutdown {
      info!("main: mpv is shutting down");
      return Ok(());
    }
  }

  // Socket closed without a shutdown event (mpv crashed or was killed).
  warn!("main: mpv connection lost");
  dispatcher.dispatch(&ipc, &Event::Shutdown).await;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_is_well_formed() {
    Args::command().debug_assert();
  }

  #[test]
  fn cli_parses_flags() {
    let args = Args::parse_from(["mpv-autoscripts", "--socket", "/tmp/mpv.sock", "--no-profiles"]);
    assert_eq!(args.socket.as_deref(), Some("/tmp/mpv.sock"));
    assert!(args.no_profiles);
    assert!(!args.no_fonts);
  }
}
