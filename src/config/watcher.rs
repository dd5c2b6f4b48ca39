//! Configuration file watcher for rule hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::InjectorConfig;

/// Watches the configuration file and forwards every valid reload.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<InjectorConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for reloaded configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<InjectorConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(new_config) => {
                            tracing::info!(
                                rules = new_config.rules.len(),
                                "Config file changed, reloading rules"
                            );
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Failed to reload config, keeping current rules"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reload_delivers_new_rules() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(file.path());
        let _guard = watcher.run().unwrap();

        std::fs::write(
            file.path(),
            r#"
            [rules.r1]
            type = "http_error"
            service = "svc"
            endpoint = "/a"
            rate = 1.0
            "#,
        )
        .unwrap();

        let config = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await {
                    Some(config) if !config.rules.is_empty() => break config,
                    Some(_) => continue,
                    None => panic!("watcher channel closed"),
                }
            }
        })
        .await
        .expect("no reload observed");
        assert!(config.rules.contains_key("r1"));
    }
}
