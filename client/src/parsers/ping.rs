use super::{after_colon, leading_number, OutputParser};
use protocol::results::PingResult;

/// Parser for the summary block of iputils/BSD `ping`
#[derive(Debug, Clone, Copy, Default)]
pub struct Ping;

impl OutputParser for Ping {
    type Output = PingResult;

    fn parse(&self, raw: &str) -> PingResult {
        let mut result = PingResult {
            packets_transmitted: 0,
            packets_received: 0,
            icmp_packet_loss_pct: 0.0,
            min_ms: 0.0,
            latency_ms: 0.0,
            max_ms: 0.0,
            jitter_ms: 0.0,
        };

        for line in raw.lines() {
            if line.contains("packets transmitted") {
                parse_counts(line, &mut result);
            } else if line.starts_with("rtt ") || line.starts_with("round-trip ") {
                // rtt min/avg/max/mdev = 10.1/12.3/15.0/1.2 ms
                let values: Vec<f64> = after_equals(line)
                    .split('/')
                    .filter_map(leading_number)
                    .collect();
                if let &[min, avg, max, dev, ..] = values.as_slice() {
                    result.min_ms = min;
                    result.latency_ms = avg;
                    result.max_ms = max;
                    result.jitter_ms = dev;
                }
            }
        }

        result
    }
}

// 5 packets transmitted, 4 received, 20% packet loss, time 4005ms
fn parse_counts(line: &str, result: &mut PingResult) {
    for part in line.split(',') {
        let part = part.trim();
        if part.ends_with("packets transmitted") {
            result.packets_transmitted = leading_number(part).unwrap_or(0.0) as u32;
        } else if part.ends_with("received") || part.ends_with("packets received") {
            result.packets_received = leading_number(part).unwrap_or(0.0) as u32;
        } else if part.contains("packet loss") {
            result.icmp_packet_loss_pct = leading_number(part).unwrap_or(0.0);
        }
    }
}

fn after_equals(line: &str) -> &str {
    line.split_once('=').map(|(_, v)| v.trim()).unwrap_or_else(|| after_colon(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX: &str = "PING example.com (93.184.216.34) 56(84) bytes of data.
64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=11.2 ms

--- example.com ping statistics ---
5 packets transmitted, 4 received, 20% packet loss, time 4005ms
rtt min/avg/max/mdev = 10.912/11.604/12.876/0.741 ms
";

    const BSD: &str = "--- example.com ping statistics ---
3 packets transmitted, 3 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 9.001/9.500/10.250/0.500 ms
";

    #[test]
    fn test_parse_linux_summary() {
        let r = Ping.parse(LINUX);
        assert_eq!(r.packets_transmitted, 5);
        assert_eq!(r.packets_received, 4);
        assert_eq!(r.icmp_packet_loss_pct, 20.0);
        assert_eq!(r.min_ms, 10.912);
        assert_eq!(r.latency_ms, 11.604);
        assert_eq!(r.max_ms, 12.876);
        assert_eq!(r.jitter_ms, 0.741);
    }

    #[test]
    fn test_parse_bsd_summary() {
        let r = Ping.parse(BSD);
        assert_eq!(r.packets_received, 3);
        assert_eq!(r.icmp_packet_loss_pct, 0.0);
        assert_eq!(r.latency_ms, 9.5);
    }

    #[test]
    fn test_total_loss_has_no_rtt_line() {
        let r = Ping.parse("3 packets transmitted, 0 received, 100% packet loss, time 2031ms\n");
        assert_eq!(r.icmp_packet_loss_pct, 100.0);
        assert_eq!(r.latency_ms, 0.0);
    }
}
