use super::{leading_number, OutputParser};
use protocol::results::{CurlResult, TimeSplit};

/// `curl -w` format the parser reads; keys and their order must not change
pub const CURL_WRITE_OUT: &str = "DNS Lookup: %{time_namelookup}s\n\
TCP Connection: %{time_connect}s\n\
TLS Handshake: %{time_appconnect}s\n\
Start Transfer: %{time_starttransfer}s\n\
Total Time: %{time_total}s\n\
Download Speed: %{speed_download} bytes/sec\n\
Upload Speed: %{speed_upload} bytes/sec\n\
HTTP Code: %{http_code}\n\
Size of Download: %{size_download} bytes\n";

/// Parser for the [`CURL_WRITE_OUT`] report
///
/// curl reports times in seconds; they are stored in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Curl;

impl OutputParser for Curl {
    type Output = CurlResult;

    fn parse(&self, raw: &str) -> CurlResult {
        let mut split = TimeSplit::default();
        let mut status_code = 0u16;
        let mut size_download = 0u64;
        let mut speed_download = 0.0;
        let mut speed_upload = 0.0;

        for line in raw.lines() {
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            let Some(number) = leading_number(value) else {
                continue;
            };
            match key.trim() {
                "DNS Lookup" => split.dns_lookup = number * 1000.0,
                "TCP Connection" => split.tcp_connection = number * 1000.0,
                "TLS Handshake" => split.tls_handshake = number * 1000.0,
                "Start Transfer" => split.first_byte = number * 1000.0,
                "Total Time" => split.total = number * 1000.0,
                "Download Speed" => speed_download = number,
                "Upload Speed" => speed_upload = number,
                "HTTP Code" => status_code = number as u16,
                "Size of Download" => size_download = number as u64,
                _ => {}
            }
        }

        CurlResult::new(status_code, split, size_download, speed_download, speed_upload)
    }
}
