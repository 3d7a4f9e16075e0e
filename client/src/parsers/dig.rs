use super::{after_colon, leading_number, OutputParser};
use protocol::results::{DigAnswer, DigResult};

/// Parser for `dig +stats` reports
#[derive(Debug, Clone, Copy, Default)]
pub struct Dig;

impl OutputParser for Dig {
    type Output = DigResult;

    fn parse(&self, raw: &str) -> DigResult {
        let mut result = DigResult {
            answers: Vec::new(),
            query_time: 0,
            server: String::new(),
            when: String::new(),
            rcvd_size: 0,
        };
        let mut in_answers = false;

        for line in raw.lines() {
            if in_answers {
                if line.trim().is_empty() {
                    in_answers = false;
                } else if let Some(answer) = parse_answer(line) {
                    result.answers.push(answer);
                }
                continue;
            }

            if line.contains("ANSWER SECTION") {
                in_answers = true;
            } else if line.contains("Query time:") {
                result.query_time = leading_number(after_colon(line)).unwrap_or(0.0) as u32;
            } else if line.contains("SERVER:") {
                result.server = after_colon(line).to_string();
            } else if line.contains("WHEN:") {
                result.when = after_colon(line).to_string();
            } else if line.contains("MSG SIZE") {
                result.rcvd_size = leading_number(after_colon(line)).unwrap_or(0.0) as u32;
            }
        }

        result
    }
}

// name TTL class type data...
fn parse_answer(line: &str) -> Option<DigAnswer> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 || parts[0].starts_with(';') {
        return None;
    }
    Some(DigAnswer {
        name: parts[0].to_string(),
        record_type: parts[3].to_string(),
        ttl: parts[1].parse().unwrap_or(0),
        data: parts[4..].join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
; <<>> DiG 9.18.18 <<>> +stats abc.trycloudflare.com
;; global options: +cmd
;; Got answer:
;; ->>HEADER<<- opcode: QUERY, status: NOERROR, id: 1234
;; flags: qr rd ra; QUERY: 1, ANSWER: 2, AUTHORITY: 0, ADDITIONAL: 1

;; QUESTION SECTION:
;abc.trycloudflare.com.		IN	A

;; ANSWER SECTION:
abc.trycloudflare.com.	300	IN	A	104.16.230.132
abc.trycloudflare.com.	300	IN	A	104.16.231.132

;; Query time: 23 msec
;; SERVER: 127.0.0.53#53(127.0.0.53) (UDP)
;; WHEN: Mon Oct 19 12:30:01 UTC 2026
;; MSG SIZE  rcvd: 82
";

    #[test]
    fn test_parse_full_report() {
        let r = Dig.parse(SAMPLE);
        assert_eq!(r.answers.len(), 2);
        assert_eq!(r.answers[0].name, "abc.trycloudflare.com.");
        assert_eq!(r.answers[0].record_type, "A");
        assert_eq!(r.answers[0].ttl, 300);
        assert_eq!(r.answers[1].data, "104.16.231.132");
        assert_eq!(r.query_time, 23);
        assert_eq!(r.server, "127.0.0.53#53(127.0.0.53) (UDP)");
        assert_eq!(r.when, "Mon Oct 19 12:30:01 UTC 2026");
        assert_eq!(r.rcvd_size, 82);
    }

    #[test]
    fn test_no_answer_section() {
        let r = Dig.parse(";; connection timed out; no servers could be reached\n");
        assert!(r.answers.is_empty());
        assert_eq!(r.query_time, 0);
        assert!(r.server.is_empty());
    }

    #[test]
    fn test_truncated_answers() {
        let r = Dig.parse(";; ANSWER SECTION:\nhost.\t60\tIN\tCNAME\ttarget.\nbroken");
        assert_eq!(r.answers.len(), 1);
        assert_eq!(r.answers[0].record_type, "CNAME");
    }
}
