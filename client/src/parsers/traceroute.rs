use super::OutputParser;
use protocol::results::{TcpTracerouteHop, TcpTracerouteResult};
use regex::Regex;
use std::sync::LazyLock;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tracing the path to (\S+) \(([^)]+)\) on TCP port (\d+)")
        .expect("traceroute header pattern is a valid literal")
});

/// Parser for `tcptraceroute` hop listings
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTraceroute;

impl OutputParser for TcpTraceroute {
    type Output = TcpTracerouteResult;

    fn parse(&self, raw: &str) -> TcpTracerouteResult {
        let mut result = TcpTracerouteResult {
            hops: Vec::new(),
            destination: String::new(),
            port: 0,
        };

        for line in raw.lines() {
            if let Some(caps) = HEADER.captures(line) {
                result.destination = caps[2].to_string();
                result.port = caps[3].parse().unwrap_or(0);
            } else if let Some(hop) = parse_hop(line) {
                result.hops.push(hop);
            }
        }

        result
    }
}

//  3  10.0.0.1 (10.0.0.1)  1.234 ms  *  2.001 ms
fn parse_hop(line: &str) -> Option<TcpTracerouteHop> {
    let mut tokens = line.split_whitespace().peekable();
    let hop_number: u32 = tokens.next()?.parse().ok()?;

    let mut ip = String::new();
    let mut rtt_ms = [None; 3];
    let mut probe = 0;

    while let Some(token) = tokens.next() {
        if token == "*" {
            probe += 1;
        } else if let Ok(value) = token.parse::<f64>() {
            if tokens.peek() == Some(&"ms") {
                tokens.next();
                if probe < rtt_ms.len() {
                    rtt_ms[probe] = Some(value);
                }
                probe += 1;
            }
        } else if let Some(addr) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            ip = addr.to_string();
        } else if ip.is_empty() && !token.starts_with('[') {
            ip = token.to_string();
        }
    }

    Some(TcpTracerouteHop { hop_number, ip, rtt_ms })
}
