//! Network interface link driver
//!
//! Reads the interface state from sysfs and starts association by running
//! an external command (NetworkManager, wpa_cli, ...).

use crate::config::InterfaceLinkConfig;
use crate::transport::traits::LinkDriver;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Link driver for a named network interface
pub struct InterfaceLink {
    interface: String,
    operstate_path: PathBuf,
    /// Association command with placeholders already substituted
    command: Vec<String>,
    /// Child of the latest attempt; at most one runs at a time
    child: Mutex<Option<Child>>,
}

impl InterfaceLink {
    pub fn new(config: &InterfaceLinkConfig) -> Self {
        let command = config
            .associate_command
            .iter()
            .map(|arg| {
                arg.replace("{interface}", &config.interface)
                    .replace("{ssid}", &config.ssid)
                    .replace("{password}", &config.password)
            })
            .collect();

        Self {
            interface: config.interface.clone(),
            operstate_path: config.sysfs_root.join(&config.interface).join("operstate"),
            command,
            child: Mutex::new(None),
        }
    }

    /// Reap or stop the child left over from the previous attempt
    async fn stop_previous(&self, previous: &mut Option<Child>, program: &str) {
        let Some(mut child) = previous.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => debug!("[LINK] Previous {} exited: {}", program, status),
            Ok(None) => {
                warn!("[LINK] Previous {} still running, stopping it", program);
                if let Err(e) = child.start_kill() {
                    warn!("[LINK] Cannot stop previous {}: {}", program, e);
                }
                if let Err(e) = child.wait().await {
                    debug!("[LINK] Waiting on previous {}: {}", program, e);
                }
            }
            Err(e) => debug!("[LINK] Cannot query previous {}: {}", program, e),
        }
    }
}

#[async_trait]
impl LinkDriver for InterfaceLink {
    async fn is_associated(&self) -> bool {
        match tokio::fs::read_to_string(&self.operstate_path).await {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!(
                    "[LINK] Cannot read {}: {}",
                    self.operstate_path.display(),
                    e
                );
                false
            }
        }
    }

    async fn begin_association(&self) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("empty association command"))?;

        let mut running = self.child.lock().await;
        self.stop_previous(&mut running, program).await;

        // Credentials are in the arguments; only the program is logged
        info!("[LINK] Associating {} via {}", self.interface, program);

        // Completion is observed through operstate, not the exit status
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", program))?;

        *running = Some(child);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "interface"
    }
}
