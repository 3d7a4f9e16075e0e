//! Output parsers for external tools
//!
//! Every parser is tolerant: a line that is missing or garbled leaves its
//! field at the zero value instead of failing. Callers treat an all-zero
//! record as "unavailable".

mod curl;
mod dig;
mod ping;
mod traceroute;

pub use curl::{Curl, CURL_WRITE_OUT};
pub use dig::Dig;
pub use ping::Ping;
pub use traceroute::TcpTraceroute;

use protocol::results::DiagnosticOutput;

/// Converts raw tool output into a structured record
pub trait OutputParser {
    type Output;

    fn parse(&self, raw: &str) -> Self::Output;
}

/// Parse diagnostic output according to the tool that produced it
pub fn parse_diagnostic(tool: &str, raw: &str) -> DiagnosticOutput {
    match tool {
        "ping" => DiagnosticOutput::Ping(Ping.parse(raw)),
        "dig" => DiagnosticOutput::Dig(Dig.parse(raw)),
        "tcptraceroute" => DiagnosticOutput::TcpTraceroute(TcpTraceroute.parse(raw)),
        _ => DiagnosticOutput::Raw(raw.to_string()),
    }
}

/// Leading numeric token of `value`, e.g. `"0.0123s"` -> `0.0123`
fn leading_number(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// Value after the first `:` on `line`, trimmed
fn after_colon(line: &str) -> &str {
    line.split_once(':').map(|(_, v)| v.trim()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("0.0123s"), Some(0.0123));
        assert_eq!(leading_number(" 2048 bytes/sec"), Some(2048.0));
        assert_eq!(leading_number("200"), Some(200.0));
        assert_eq!(leading_number("abc"), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn test_unknown_tool_is_raw() {
        assert_eq!(
            parse_diagnostic("mtr", "hop 1"),
            DiagnosticOutput::Raw("hop 1".to_string())
        );
    }
}
