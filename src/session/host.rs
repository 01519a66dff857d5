use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, TcpListener};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use super::{HarnessHost, HostHandle};
use crate::config::ServerConfig;
use crate::error::{CiError, Result};

const READY_POLL: Duration = Duration::from_millis(100);

/// Guard that kills the server process (and its entire process group) on drop.
struct ChildGuard {
    child: Option<Child>,
    /// Process group ID saved at spawn time so we can kill the whole group.
    #[cfg(unix)]
    pgid: Option<u32>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        #[cfg(unix)]
        let pgid = child.id();
        Self {
            child: Some(child),
            #[cfg(unix)]
            pgid,
        }
    }

    fn kill(&mut self) {
        // Kill the entire process group so servers that fork workers don't leave orphans.
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
        }
        if let Some(ref mut child) = self.child {
            let _ = child.start_kill();
        }
    }

    /// Returns the exit status if the process has already exited.
    fn exited(&mut self) -> Result<Option<std::process::ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?),
            None => Ok(None),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.kill();
        if let Some(mut child) = self.child.take() {
            child
                .wait()
                .await
                .map_err(|e| CiError::HostClose(format!("failed to reap server process: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Hosts the harness by spawning a server command on an ephemeral port.
///
/// `{port}` in the command line is replaced with the chosen port, which is
/// also exported as `PORT`.
#[derive(Debug)]
pub struct CommandHost {
    program: String,
    args: Vec<String>,
    startup_timeout: Duration,
}

impl CommandHost {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut words = shell_words::split(&config.command)
            .map_err(|e| CiError::Config(format!("invalid server command: {e}")))?;
        if words.is_empty() {
            return Err(CiError::Config("server command is empty".into()));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
        })
    }

    fn command_for(&self, port: u16) -> Command {
        let port = port.to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|arg| arg.replace("{port}", &port)))
            .env("PORT", &port)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group so the guard can take out any workers the server forks.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.as_std_mut().process_group(0);
        }
        cmd
    }
}

#[async_trait]
impl HarnessHost for CommandHost {
    async fn start(&self) -> Result<Box<dyn HostHandle>> {
        let port = reserve_port()?;
        let mut cmd = self.command_for(port);
        info!(program = %self.program, port, "starting harness server");
        debug!("[cmd] {:?}", cmd.as_std());

        let mut child = cmd
            .spawn()
            .map_err(|e| CiError::HostStart(format!("failed to spawn `{}`: {e}", self.program)))?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, "stderr");
        }

        // Dropping the guard on any early return below kills the server.
        let mut guard = ChildGuard::new(child);
        wait_until_listening(&mut guard, port, self.startup_timeout).await?;
        info!(port, "harness server is listening");

        Ok(Box::new(ServerProcess { port, guard }))
    }
}

struct ServerProcess {
    port: u16,
    guard: ChildGuard,
}

#[async_trait]
impl HostHandle for ServerProcess {
    fn port(&self) -> u16 {
        self.port
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut server = self;
        debug!(port = server.port, "stopping harness server");
        server.guard.shutdown().await
    }
}

/// Ask the OS for a free port. The listener is released before the server binds it.
fn reserve_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|e| CiError::HostStart(format!("no ephemeral port available: {e}")))?;
    Ok(listener.local_addr()?.port())
}

async fn wait_until_listening(guard: &mut ChildGuard, port: u16, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if accepts_connections(port).await {
            return Ok(());
        }
        if let Some(status) = guard.exited()? {
            return Err(CiError::HostStart(format!(
                "server exited with {status} before listening on port {port}"
            )));
        }
        if Instant::now() >= deadline {
            return Err(CiError::HostStart(format!(
                "server did not listen on port {port} within {}s",
                timeout.as_secs()
            )));
        }
        sleep(READY_POLL).await;
    }
}

/// The harness is addressed as `localhost`, which may resolve to either loopback.
async fn accepts_connections(port: u16) -> bool {
    for ip in [IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)] {
        if TcpStream::connect((ip, port)).await.is_ok() {
            return true;
        }
    }
    false
}

fn forward_lines<R>(stream: R, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "browser_ci::harness", "[{name}] {line}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_config(command: &str) -> ServerConfig {
        ServerConfig {
            command: command.into(),
            startup_timeout_secs: 5,
        }
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let err = CommandHost::new(&server_config("   ")).unwrap_err();
        assert!(matches!(err, CiError::Config(_)));
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let err = CommandHost::new(&server_config("serve 'oops")).unwrap_err();
        assert!(matches!(err, CiError::Config(_)));
    }

    #[test]
    fn test_port_placeholder_is_substituted_in_every_argument() {
        let host =
            CommandHost::new(&server_config("npx runner serve --port={port} --label 'p {port}'"))
                .unwrap();
        let cmd = host.command_for(4321);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(cmd.as_std().get_program(), "npx");
        assert_eq!(args, vec!["runner", "serve", "--port=4321", "--label", "p 4321"]);
    }

    #[test]
    fn test_reserved_port_is_nonzero() {
        assert_ne!(reserve_port().unwrap(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_exiting_before_listening_fails_start() {
        let host = CommandHost::new(&server_config("sh -c 'exit 3'")).unwrap();
        let err = host.start().await.err().unwrap();
        assert!(matches!(err, CiError::HostStart(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_ipv6_only_listener_counts_as_ready() {
        let Ok(listener) = tokio::net::TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).await else {
            return; // no IPv6 loopback on this machine
        };
        let port = listener.local_addr().unwrap().port();
        assert!(accepts_connections(port).await);
    }

    #[tokio::test]
    async fn test_closed_port_is_not_ready() {
        let port = reserve_port().unwrap();
        assert!(!accepts_connections(port).await);
    }

    fn has_python() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    async fn serve_and_close(bind: &str) {
        let command = format!("python3 -m http.server {{port}} --bind {bind}");
        let host = CommandHost::new(&server_config(&command)).unwrap();

        let handle = host.start().await.unwrap();
        let port = handle.port();
        assert_ne!(port, 0);
        assert_eq!(handle.base_url(), format!("http://localhost:{port}"));
        assert!(accepts_connections(port).await);

        handle.close().await.unwrap();
        assert!(!accepts_connections(port).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_starts_on_reserved_port_and_stops_on_close() {
        if !has_python() {
            return;
        }
        serve_and_close("127.0.0.1").await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_bound_to_ipv6_loopback_is_detected() {
        if !has_python() || TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).is_err() {
            return;
        }
        serve_and_close("::1").await;
    }

    #[tokio::test]
    async fn test_missing_program_fails_start() {
        let host = CommandHost::new(&server_config("definitely-not-a-real-binary-1f2e")).unwrap();
        let err = host.start().await.err().unwrap();
        assert!(matches!(err, CiError::HostStart(_)), "got {err:?}");
    }
}
