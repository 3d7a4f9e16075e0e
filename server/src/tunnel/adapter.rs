//! Generic tunnel launch routine
//!
//! One adapter drives any row of the tool table. Starting a tool races three
//! events: a line on stdout or stderr matching the tool's URL pattern, the
//! child exiting, and the start timeout. Exactly one of them decides the
//! outcome; lines after the first match are drained and ignored.

use super::TunnelError;
use protocol::exec::run_sequence;
use protocol::tools::{LaunchStrategy, ProcessSpec, ToolSpec, UrlPattern};
use protocol::{CommandRunner, SystemCommandRunner};
use regex::Regex;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI escape pattern is a valid literal")
});

/// How long to keep reading buffered output after the child exits
const EXIT_DRAIN: Duration = Duration::from_millis(500);

pub struct TunnelAdapter<R = SystemCommandRunner> {
    spec: ToolSpec,
    runner: R,
    port: u16,
    children: Vec<Child>,
    started: bool,
}

impl<R: CommandRunner + Sync> TunnelAdapter<R> {
    pub fn new(spec: ToolSpec, runner: R, port: u16) -> Self {
        Self {
            spec,
            runner,
            port,
            children: Vec::new(),
            started: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Launch the tool and return its public URL
    ///
    /// Processes spawned before a failure are left running; call
    /// [`stop`](Self::stop) to reap them.
    pub async fn start(&mut self) -> Result<String, TunnelError> {
        self.started = true;
        run_sequence(&self.runner, &self.spec.pre_setup(self.port)).await?;
        run_sequence(&self.runner, &self.spec.pre_start(self.port)).await?;

        info!("Starting {} tunnel on port {}", self.spec.name, self.port);
        let launch = self.spec.launch;
        let url = match launch {
            LaunchStrategy::Stream { process, pattern } => {
                self.spawn(&process)?;
                self.watch_output(&pattern).await?
            }
            LaunchStrategy::FixedUrl { process, url } => {
                self.spawn(&process)?;
                self.discard_output();
                url.to_string()
            }
            LaunchStrategy::LocalApi {
                process,
                api_url,
                settle,
                pattern,
            } => {
                self.spawn(&process)?;
                self.discard_output();
                self.settle(settle).await?;
                query_status_api(api_url, &self.compile(&pattern)?, &pattern).await?
            }
            LaunchStrategy::ClientServer {
                server,
                warmup,
                client,
                pattern,
            } => {
                self.spawn(&server)?;
                self.discard_output();
                self.settle(warmup).await?;
                self.spawn(&client)?;
                self.watch_output(&pattern).await?
            }
        };

        info!("{} tunnel ready at {}", self.spec.name, url);
        Ok(url)
    }

    /// Kill every process this adapter spawned and run the tool's teardown
    ///
    /// A no-op when nothing was started; safe to call repeatedly.
    pub async fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;

        for mut child in self.children.drain(..) {
            if let Err(e) = child.start_kill() {
                debug!("{} process already gone: {}", self.spec.name, e);
            }
            if let Err(e) = child.wait().await {
                warn!("Failed to reap {} process: {}", self.spec.name, e);
            }
        }

        if let Err(e) = run_sequence(&self.runner, &self.spec.teardown(self.port)).await {
            warn!("Teardown of {} failed: {}", self.spec.name, e);
        }
        info!("{} tunnel stopped", self.spec.name);
    }

    fn spawn(&mut self, process: &ProcessSpec) -> Result<(), TunnelError> {
        let args = process.render_args(self.port);
        debug!("Spawning {} {}", process.program, args.join(" "));

        let child = Command::new(process.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: process.program.to_string(),
                source,
            })?;

        self.children.push(child);
        Ok(())
    }

    /// Keep draining the last spawned process's output without watching it
    fn discard_output(&mut self) {
        let tool = self.spec.name;
        let Some(child) = self.children.last_mut() else {
            return;
        };
        let (tx, _) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(tool, "stdout", stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(tool, "stderr", stderr, tx);
        }
    }

    fn compile(&self, pattern: &UrlPattern) -> Result<Regex, TunnelError> {
        Regex::new(pattern.regex).map_err(|source| TunnelError::Pattern {
            tool: self.spec.name.to_string(),
            source,
        })
    }

    /// Wait out `window`, failing early if the last spawned process exits
    async fn settle(&mut self, window: Duration) -> Result<(), TunnelError> {
        let tool = self.spec.name;
        let Some(child) = self.children.last_mut() else {
            return Ok(());
        };
        tokio::select! {
            status = child.wait() => Err(process_exit(tool, status)),
            _ = tokio::time::sleep(window) => Ok(()),
        }
    }

    /// Race the last spawned process's output against its exit and the timeout
    async fn watch_output(&mut self, pattern: &UrlPattern) -> Result<String, TunnelError> {
        let regex = self.compile(pattern)?;
        let tool = self.spec.name;
        let timeout = self.spec.start_timeout;
        let Some(child) = self.children.last_mut() else {
            return Err(TunnelError::ProcessExit {
                tool: tool.to_string(),
                status: "not started".to_string(),
            });
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(tool, "stdout", stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(tool, "stderr", stderr, tx);
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut streams_open = true;

        loop {
            tokio::select! {
                line = rx.recv(), if streams_open => match line {
                    Some(line) => {
                        if let Some(url) = extract_url(&regex, pattern, &line) {
                            return Ok(url);
                        }
                    }
                    None => streams_open = false,
                },
                status = child.wait() => {
                    // Some tools print the URL and exit (wg-quick); check what is still buffered
                    let buffered = tokio::time::timeout(EXIT_DRAIN, async {
                        while let Some(line) = rx.recv().await {
                            if let Some(url) = extract_url(&regex, pattern, &line) {
                                return Some(url);
                            }
                        }
                        None
                    })
                    .await;
                    return match buffered {
                        Ok(Some(url)) => Ok(url),
                        _ => Err(process_exit(tool, status)),
                    };
                }
                _ = &mut deadline => {
                    return Err(TunnelError::StartTimeout {
                        tool: tool.to_string(),
                        timeout,
                    });
                }
            }
        }
    }
}

fn process_exit(tool: &str, status: std::io::Result<std::process::ExitStatus>) -> TunnelError {
    TunnelError::ProcessExit {
        tool: tool.to_string(),
        status: match status {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        },
    }
}

/// Forward every line of `stream` into `tx` until EOF
///
/// Keeps reading after the receiver is gone so the child never blocks on a
/// full pipe.
fn forward_lines<S>(tool: &'static str, name: &'static str, stream: S, tx: mpsc::UnboundedSender<String>)
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(tool, stream = name, "{}", line);
            let _ = tx.send(line);
        }
    });
}

/// URL in `line`, if it matches; capture group 1 wins over the whole match
fn extract_url(regex: &Regex, pattern: &UrlPattern, line: &str) -> Option<String> {
    let line = ANSI_ESCAPE.replace_all(line, "");
    let caps = regex.captures(&line)?;
    let matched = caps.get(1).or_else(|| caps.get(0))?;
    Some(pattern.to_url(matched.as_str()))
}

/// Read the public URL from a tool's local JSON status API
async fn query_status_api(api_url: &str, regex: &Regex, pattern: &UrlPattern) -> Result<String, TunnelError> {
    let api_error = |message: String| TunnelError::UrlApi {
        url: api_url.to_string(),
        message,
    };

    let body: serde_json::Value = reqwest::get(api_url)
        .await
        .map_err(|e| api_error(e.to_string()))?
        .json()
        .await
        .map_err(|e| api_error(e.to_string()))?;

    public_url_from_status(&body, regex, pattern)
        .ok_or_else(|| api_error("no public URL in status response".to_string()))
}

fn public_url_from_status(body: &serde_json::Value, regex: &Regex, pattern: &UrlPattern) -> Option<String> {
    body.get("tunnels")?
        .as_array()?
        .iter()
        .filter_map(|t| t.get("public_url")?.as_str())
        .find_map(|url| extract_url(regex, pattern, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(name: &'static str, script: &'static str, pattern: &'static str) -> ToolSpec {
        let args: &'static [&'static str] = Box::leak(Box::new(["-c", script]));
        ToolSpec::stream(name, "sh", args, UrlPattern::plain(pattern)).timeout(Duration::from_secs(5))
    }

    fn adapter(spec: ToolSpec) -> TunnelAdapter {
        TunnelAdapter::new(spec, SystemCommandRunner, 3000)
    }

    #[tokio::test]
    async fn test_url_on_stdout() {
        let mut a = adapter(sh(
            "Lt",
            "echo starting; echo 'your url is: https://abc.loca.lt'; sleep 30",
            r"your url is: (https://[^\s]+)",
        ));
        assert_eq!(a.start().await.unwrap(), "https://abc.loca.lt");
        a.stop().await;
        assert!(a.children.is_empty());
    }

    #[tokio::test]
    async fn test_url_on_stderr() {
        let mut a = adapter(sh(
            "Cf",
            "echo 'INF |  https://red-sky-42.trycloudflare.com  |' >&2; sleep 30",
            r"https://[a-z0-9-]+\.trycloudflare\.com",
        ));
        assert_eq!(a.start().await.unwrap(), "https://red-sky-42.trycloudflare.com");
        a.stop().await;
    }

    #[tokio::test]
    async fn test_bare_host_gets_prefix() {
        let spec = ToolSpec::stream(
            "Bore",
            "sh",
            &["-c", "echo 'listening at bore.pub:4123'; sleep 30"],
            UrlPattern::host(r"bore\.pub:\d+", "http://"),
        );
        let mut a = adapter(spec);
        assert_eq!(a.start().await.unwrap(), "http://bore.pub:4123");
        a.stop().await;
    }

    #[tokio::test]
    async fn test_url_printed_before_exit() {
        let mut a = adapter(sh(
            "Pyjamas",
            "echo 'You can now access http://localhost:3000 on https://x.tunnel.pyjam.as/ ✨'",
            r"on (https://[^\s]+) ✨",
        ));
        assert_eq!(a.start().await.unwrap(), "https://x.tunnel.pyjam.as/");
        a.stop().await;
    }

    #[tokio::test]
    async fn test_exit_without_url() {
        let mut a = adapter(sh("Dies", "echo 'auth failed'; exit 3", r"https://\S+"));
        let err = a.start().await.unwrap_err();
        assert!(matches!(err, TunnelError::ProcessExit { .. }), "{:?}", err);
        a.stop().await;
    }

    #[tokio::test]
    async fn test_timeout_while_running() {
        let spec = sh("Slow", "echo waiting; sleep 30", r"https://\S+").timeout(Duration::from_millis(200));
        let mut a = adapter(spec);
        let started = std::time::Instant::now();
        let err = a.start().await.unwrap_err();
        assert!(matches!(err, TunnelError::StartTimeout { .. }), "{:?}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
        a.stop().await;
    }

    #[tokio::test]
    async fn test_ansi_codes_are_ignored() {
        let mut a = adapter(sh(
            "Zrok",
            r"printf '\033[1mhttps://abc.share.zrok.io\033[0m\n'; sleep 30",
            r"https://[^\s│]+",
        ));
        assert_eq!(a.start().await.unwrap(), "https://abc.share.zrok.io");
        a.stop().await;
    }

    #[tokio::test]
    async fn test_failing_pre_command_prevents_spawn() {
        let spec = ToolSpec {
            pre_setup_commands: &[&["sh", "-c", "exit 4"]],
            ..sh("Pre", "echo https://never.example; sleep 30", r"https://\S+")
        };
        let mut a = adapter(spec);
        let err = a.start().await.unwrap_err();
        assert!(matches!(err, TunnelError::PreCommand(_)));
        assert!(a.children.is_empty());
        a.stop().await;
    }

    #[tokio::test]
    async fn test_fixed_url_returns_immediately() {
        let spec = sh("Fixed", "", "").with_launch(LaunchStrategy::FixedUrl {
            process: ProcessSpec {
                program: "sleep",
                args: &["30"],
            },
            url: "https://fixed.example",
        });
        assert!(!spec.readiness_verified());
        let mut a = adapter(spec);
        assert_eq!(a.start().await.unwrap(), "https://fixed.example");
        assert_eq!(a.children.len(), 1);
        a.stop().await;
    }

    #[tokio::test]
    async fn test_spawn_error() {
        let spec = ToolSpec::stream("Missing", "definitely-not-a-tunnel-tool", &[], UrlPattern::plain("x"));
        let mut a = adapter(spec);
        assert!(matches!(a.start().await.unwrap_err(), TunnelError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut a = adapter(sh("Idle", "sleep 30", "x"));
        a.stop().await;
        a.stop().await;
        assert!(a.children.is_empty());
    }

    #[test]
    fn test_status_api_body() {
        let body = serde_json::json!({
            "tunnels": [
                {"public_url": "tcp://0.tcp.ngrok.io:1234"},
                {"public_url": "https://ab12.ngrok-free.app"}
            ]
        });
        let pattern = UrlPattern::plain(r"https://[^\s]+");
        let regex = Regex::new(pattern.regex).unwrap();
        assert_eq!(
            public_url_from_status(&body, &regex, &pattern).as_deref(),
            Some("https://ab12.ngrok-free.app")
        );
        assert!(public_url_from_status(&serde_json::json!({}), &regex, &pattern).is_none());
    }
}
