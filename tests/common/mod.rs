#![allow(dead_code)]

use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

/// A postgres URL on a port nothing listens on, so every query fails fast.
fn unreachable_database_url() -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    Ok(format!("postgres://nearn@127.0.0.1:{}/nearnnext_test", port))
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_nearnnext-api"));
        cmd.env("NEARN_API_PORT", port.to_string())
            .env("HOST", "127.0.0.1")
            .env("APP_ENV", "development")
            .env("JWT_SECRET", "integration-secret")
            .env("DATABASE_URL", unreachable_database_url()?)
            .env("DATABASE_CONNECTION_TIMEOUT", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

/// Starts the server with `env` applied and returns its exit status, or `None`
/// if it is still running after `timeout`.
pub fn server_exit_status(
    env: &[(&str, &str)],
    remove: &[&str],
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nearnnext-api"));
    cmd.env("NEARN_API_PORT", port.to_string())
        .env("HOST", "127.0.0.1")
        .env("DATABASE_URL", unreachable_database_url()?)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    for key in remove {
        cmd.env_remove(key);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().context("failed to spawn server binary")?;
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child.kill()?;
    child.wait()?;
    Ok(None)
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// Runs the `nearn` CLI against `migrations_dir` with no reachable database.
pub fn nearn(migrations_dir: &Path, env: &[(&str, &str)], args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nearn"));
    cmd.arg("--migrations-dir")
        .arg(migrations_dir)
        .args(args)
        .env("DATABASE_URL", unreachable_database_url()?)
        .env("DATABASE_CONNECTION_TIMEOUT", "1")
        .env_remove("APP_ENV");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().context("failed to run nearn binary")
}
