//! Tunnel tool table
//!
//! Every supported tunnel tool is one row: how to launch it, how to find its
//! public URL, and the shell commands that surround it. Tools differ only in
//! data except where their control flow genuinely diverges, which is captured
//! by [`LaunchStrategy`].

use crate::constants::DEFAULT_START_TIMEOUT_SECS;
use std::time::Duration;

/// Placeholder replaced by the local port in arguments and commands
pub const PORT_PLACEHOLDER: &str = "{port}";

/// A program and its argument template
#[derive(Debug, Clone, Copy)]
pub struct ProcessSpec {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl ProcessSpec {
    pub fn render_args(&self, port: u16) -> Vec<String> {
        render(self.args, port)
    }
}

/// Pattern that extracts the public URL from a tool's output
#[derive(Debug, Clone, Copy)]
pub struct UrlPattern {
    /// Regex; capture group 1 is the URL when present, else the whole match
    pub regex: &'static str,
    /// Prepended when the match is a bare host (e.g. `bore.pub:4123`)
    pub prefix: Option<&'static str>,
}

impl UrlPattern {
    pub const fn plain(regex: &'static str) -> Self {
        Self { regex, prefix: None }
    }

    pub const fn host(regex: &'static str, prefix: &'static str) -> Self {
        Self {
            regex,
            prefix: Some(prefix),
        }
    }

    /// Turn a matched fragment into a URL
    pub fn to_url(&self, matched: &str) -> String {
        let matched = matched.trim();
        match self.prefix {
            Some(prefix) if !matched.starts_with("http://") && !matched.starts_with("https://") => {
                format!("{}{}", prefix, matched)
            }
            _ => matched.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LaunchStrategy {
    /// Spawn and wait for the URL to appear on stdout or stderr
    Stream {
        process: ProcessSpec,
        pattern: UrlPattern,
    },
    /// Spawn and return a preconfigured URL without waiting for readiness
    FixedUrl {
        process: ProcessSpec,
        url: &'static str,
    },
    /// Spawn, let it settle, then read the URL from the tool's local status API
    LocalApi {
        process: ProcessSpec,
        api_url: &'static str,
        settle: Duration,
        pattern: UrlPattern,
    },
    /// Spawn a local relay server, then a client that prints the URL
    ClientServer {
        server: ProcessSpec,
        warmup: Duration,
        client: ProcessSpec,
        pattern: UrlPattern,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub launch: LaunchStrategy,
    pub pre_setup_commands: &'static [&'static [&'static str]],
    pub pre_start_commands: &'static [&'static [&'static str]],
    /// Run by the benchmark client once the tunnel is up
    pub post_setup_commands: &'static [&'static [&'static str]],
    /// Run by the tool server after the processes are killed
    pub teardown_commands: &'static [&'static [&'static str]],
    pub start_timeout: Duration,
    /// Included when benchmarking every tool
    pub batch: bool,
}

impl ToolSpec {
    pub const fn stream(name: &'static str, program: &'static str, args: &'static [&'static str], pattern: UrlPattern) -> Self {
        Self {
            name,
            launch: LaunchStrategy::Stream {
                process: ProcessSpec { program, args },
                pattern,
            },
            pre_setup_commands: &[],
            pre_start_commands: &[],
            post_setup_commands: &[],
            teardown_commands: &[],
            start_timeout: Duration::from_secs(DEFAULT_START_TIMEOUT_SECS),
            batch: true,
        }
    }

    pub const fn with_launch(mut self, launch: LaunchStrategy) -> Self {
        self.launch = launch;
        self
    }

    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    const fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    const fn excluded_from_batch(mut self) -> Self {
        self.batch = false;
        self
    }

    /// Whether `start` waits for evidence that the tunnel is up
    pub fn readiness_verified(&self) -> bool {
        !matches!(self.launch, LaunchStrategy::FixedUrl { .. })
    }

    pub fn pre_setup(&self, port: u16) -> Vec<Vec<String>> {
        render_commands(self.pre_setup_commands, port)
    }

    pub fn pre_start(&self, port: u16) -> Vec<Vec<String>> {
        render_commands(self.pre_start_commands, port)
    }

    pub fn post_setup(&self, port: u16) -> Vec<Vec<String>> {
        render_commands(self.post_setup_commands, port)
    }

    pub fn teardown(&self, port: u16) -> Vec<Vec<String>> {
        render_commands(self.teardown_commands, port)
    }
}

fn render(args: &[&str], port: u16) -> Vec<String> {
    let port = port.to_string();
    args.iter()
        .map(|arg| arg.replace(PORT_PLACEHOLDER, &port))
        .collect()
}

fn render_commands(commands: &[&[&str]], port: u16) -> Vec<Vec<String>> {
    commands.iter().map(|c| render(c, port)).collect()
}

const fn process(program: &'static str, args: &'static [&'static str]) -> ProcessSpec {
    ProcessSpec { program, args }
}

/// Every known tool, in benchmark order
pub const TOOLS: &[ToolSpec] = &[
    // Named tunnel: the hostname is bound in the cloudflared config, not printed
    ToolSpec {
        post_setup_commands: &[&["cloudflared", "tunnel", "info", "tunnelbench"]],
        ..ToolSpec::stream("Cloudflared", "cloudflared", &[], UrlPattern::plain(""))
    }
    .with_launch(LaunchStrategy::FixedUrl {
        process: process("cloudflared", &["tunnel", "run", "tunnelbench"]),
        url: "https://tunnelbench.remedium.world",
    }),
    ToolSpec::stream(
        "CloudflaredQuick",
        "cloudflared",
        &["tunnel", "--url", "http://localhost:{port}"],
        UrlPattern::plain(r"https://[a-z0-9-]+\.trycloudflare\.com"),
    )
    .timeout_secs(20),
    ToolSpec {
        pre_setup_commands: &[&["ngrok", "config", "check"]],
        ..ToolSpec::stream("Ngrok", "ngrok", &[], UrlPattern::plain(""))
    }
    .with_launch(LaunchStrategy::LocalApi {
        process: process("ngrok", &["http", "{port}"]),
        api_url: "http://127.0.0.1:4040/api/tunnels",
        settle: Duration::from_secs(10),
        pattern: UrlPattern::plain(r"https://[^\s]+"),
    })
    .timeout_secs(20),
    ToolSpec::stream(
        "LocalTunnel",
        "lt",
        &["--port", "{port}"],
        UrlPattern::plain(r"your url is: (https://[^\s]+)"),
    ),
    ToolSpec::stream("Pagekite", "python3", &[], UrlPattern::plain("")).with_launch(
        LaunchStrategy::FixedUrl {
            process: process("python3", &["pagekite.py", "{port}", "sun4.pagekite.me"]),
            url: "http://sun4.pagekite.me",
        },
    ),
    ToolSpec::stream(
        "Serveo",
        "ssh",
        &["-o", "StrictHostKeyChecking=accept-new", "-R", "80:localhost:{port}", "serveo.net"],
        UrlPattern::plain(r"Forwarding HTTP traffic from (https://[^\s]+)"),
    ),
    ToolSpec::stream(
        "Telebit",
        "telebit",
        &["http", "{port}"],
        UrlPattern::plain(r"Forwarding (https://[^\s]+) =>"),
    ),
    ToolSpec::stream(
        "Bore",
        "bore",
        &["local", "{port}", "--to", "bore.pub"],
        UrlPattern::host(r"bore\.pub:\d+", "http://"),
    )
    .timeout_secs(5),
    ToolSpec::stream(
        "Localxpose",
        "loclx",
        &["tunnel", "http", "--to", "localhost:{port}"],
        UrlPattern::host(r"[a-z0-9]+\.loclx\.io", "http://"),
    ),
    ToolSpec::stream(
        "Expose",
        "expose",
        &["share", "http://localhost:{port}"],
        UrlPattern::plain(r"Public HTTPS:\s+(https://[^\s]+)"),
    ),
    ToolSpec::stream(
        "Loophole",
        "loophole",
        &["http", "{port}"],
        UrlPattern::plain(r"(https://[^\s]+) ->"),
    ),
    ToolSpec::stream(
        "Pinggy",
        "ssh",
        &[
            "-p",
            "443",
            "-o",
            "StrictHostKeyChecking=accept-new",
            "-R0:localhost:{port}",
            "qr@a.pinggy.io",
        ],
        UrlPattern::plain(r"https://[^\s]+\.free\.pinggy\.link"),
    ),
    ToolSpec::stream(
        "Tailscale",
        "sudo",
        &["tailscale", "funnel", "{port}"],
        UrlPattern::plain(r"https://[^\s]+\.ts\.net/?"),
    ),
    ToolSpec {
        pre_setup_commands: &[&["sh", "-c", "curl -sf https://tunnel.pyjam.as/{port} > tunnel.conf"]],
        teardown_commands: &[&["wg-quick", "down", "./tunnel.conf"]],
        ..ToolSpec::stream(
            "TunnelPyjamas",
            "wg-quick",
            &["up", "./tunnel.conf"],
            UrlPattern::plain(r"on (https://[^\s]+) ✨"),
        )
    }
    .excluded_from_batch(),
    ToolSpec::stream(
        "Zrok",
        "zrok",
        &["share", "public", "--headless", "http://localhost:{port}"],
        UrlPattern::plain(r"https://[^\s│]+"),
    ),
    ToolSpec::stream(
        "Tunwg",
        "tunwg",
        &["-p", "{port}"],
        UrlPattern::plain(r"https://[^\s]+\.l\.tunwg\.com"),
    ),
    ToolSpec::stream(
        "Packetriot",
        "pktriot",
        &["http", "{port}"],
        UrlPattern::host(r"\w+-\w+-\d+\.pktriot\.net", "http://"),
    ),
    ToolSpec::stream("BoreDigital", "bore_linux_amd64", &[], UrlPattern::plain(""))
        .with_launch(LaunchStrategy::ClientServer {
            server: process("bore-server_linux_amd64", &[]),
            warmup: Duration::from_secs(2),
            client: process(
                "bore_linux_amd64",
                &["-s", "bore.digital", "-p", "2200", "-ls", "localhost", "-lp", "{port}"],
            ),
            pattern: UrlPattern::plain(r"https://[^\s]+bore\.digital[^\s]*"),
        })
        .timeout_secs(12)
        .excluded_from_batch(),
    ToolSpec::stream(
        "LocalhostRun",
        "ssh",
        &["-o", "StrictHostKeyChecking=accept-new", "-R", "80:localhost:{port}", "nokey@localhost.run"],
        UrlPattern::plain(r"https://[^\s]+\.lhr\.life[^\s]*"),
    ),
    ToolSpec::stream(
        "DevTunnel",
        "devtunnel",
        &["host", "-p", "{port}", "--allow-anonymous"],
        UrlPattern::plain(r"Connect via browser: (https://[^\s,]+)"),
    ),
    ToolSpec::stream(
        "Beeceptor",
        "beeceptor-cli",
        &["-p", "{port}"],
        UrlPattern::plain(r"https://\S+\.free\.beeceptor\.com"),
    ),
    ToolSpec::stream(
        "SocketXP",
        "socketxp",
        &["connect", "http://localhost:{port}"],
        UrlPattern::plain(r"https://\S+\.socketxp\.com"),
    ),
    ToolSpec::stream(
        "Openport",
        "openport",
        &["{port}"],
        UrlPattern::plain(r"https://spr\.openport\.io/l/\d+/\w+"),
    ),
    ToolSpec::stream(
        "Onionpipe",
        "onionpipe",
        &["{port}"],
        UrlPattern::host(r"[a-z2-7]{56}\.onion(:\d+)?", "http://"),
    )
    .timeout_secs(60),
    ToolSpec::stream(
        "Ngtor",
        "java",
        &["-jar", "ngtor-0.1.0-boot.jar", "http", "--port={port}"],
        UrlPattern::plain(r"http://\S+\.onion"),
    )
    .timeout_secs(60),
];

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    find_in(TOOLS, name)
}

/// Case-insensitive lookup in an arbitrary tool table
pub fn find_in<'a>(table: &'a [ToolSpec], name: &str) -> Option<&'a ToolSpec> {
    table.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

/// Tools benchmarked in a full batch run
pub fn batch() -> impl Iterator<Item = &'static ToolSpec> {
    TOOLS.iter().filter(|t| t.batch)
}
