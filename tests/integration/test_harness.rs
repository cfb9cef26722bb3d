// Test harness for integration tests
// Provides utilities to start/stop the server binary for testing

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

/// Server instance that is killed when dropped
pub struct ServerTestHarness {
    process: Option<Child>,
    pub port: u16,
    pub base_url: String,
}

impl ServerTestHarness {
    /// Start the binary on `port`, serving static files from `static_dir`.
    ///
    /// The port is passed through the `PORT` environment variable.
    pub fn start(port: u16, static_dir: &Path) -> Result<Self, String> {
        let binary_path = PathBuf::from(env!("CARGO_BIN_EXE_convert-image"));

        let mut child = Command::new(&binary_path)
            .env("PORT", port.to_string())
            .env("RUST_LOG", "warn")
            .arg("--static-dir")
            .arg(static_dir)
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to start server: {}", e))?;

        let base_url = format!("http://127.0.0.1:{}", port);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        // Try a few times to connect
        for _attempt in 1..=20 {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(format!("Server exited immediately with status: {}", status));
            }

            if let Ok(response) = client.get(format!("{}/health", base_url)).send() {
                if response.status().is_success() {
                    return Ok(ServerTestHarness {
                        process: Some(child),
                        port,
                        base_url,
                    });
                }
            }

            thread::sleep(Duration::from_millis(250));
        }

        let _ = child.kill();
        Err(format!("Server did not respond on port {}", port))
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Stop the server (called automatically on drop)
    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ServerTestHarness {
    fn drop(&mut self) {
        self.stop();
    }
}
