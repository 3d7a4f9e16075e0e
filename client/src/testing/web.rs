//! Page-load test against the synthetic heavy page

use crate::parsers::{Curl, OutputParser, CURL_WRITE_OUT};
use protocol::results::{CurlResult, WebTestResult};
use protocol::{CommandRunner, WEBTEST_PATH};

pub async fn run_web_test<R: CommandRunner>(runner: &R, base_url: &str, max_time_sec: u64) -> WebTestResult {
    let url = format!("{}{}", base_url.trim_end_matches('/'), WEBTEST_PATH);
    let args = vec![
        "-s".to_string(),
        "--max-time".to_string(),
        max_time_sec.to_string(),
        "-o".to_string(),
        "/dev/null".to_string(),
        "-w".to_string(),
        CURL_WRITE_OUT.to_string(),
        url.clone(),
    ];

    match runner.run("curl", &args).await {
        Ok(output) => {
            let stats = Curl.parse(&output);
            let error = (!stats.is_http_success()).then(|| format!("HTTP status {}", stats.status_code));
            WebTestResult { url, stats, error }
        }
        Err(e) => WebTestResult {
            url,
            stats: CurlResult::failed(e.to_string()),
            error: Some(e.to_string()),
        },
    }
}
