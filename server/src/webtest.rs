//! Synthetic heavy page used for page-load timing

use crate::config::WebtestConfig;
use protocol::DOWNLOAD_PATH;
use protocol::results::FileMetadata;
use rand::Rng;
use std::fmt::Write;

/// Render the page once; it is served verbatim for every request
pub fn render(config: &WebtestConfig, files: &[FileMetadata]) -> String {
    let mut html = String::with_capacity(config.script_kb * 1024 + 4096);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Tunnelbench web test</title>\n");

    // Inline script payload: a large array literal that has to be parsed
    html.push_str("<script>\nconst payload = [");
    let mut rng = rand::thread_rng();
    let target = config.script_kb * 1024;
    let start = html.len();
    while html.len() - start < target {
        let _ = write!(html, "{},", rng.gen_range(0..1_000_000u32));
    }
    html.push_str("];\nconsole.log(payload.length);\n</script>\n</head>\n<body>\n");
    html.push_str("<h1>Tunnelbench web test</h1>\n");

    // Smallest files first so the page stays loadable through slow tunnels
    let mut images: Vec<&FileMetadata> = files.iter().collect();
    images.sort_by_key(|f| f.size);
    for (i, file) in images.iter().cycle().take(config.image_count).enumerate() {
        let _ = writeln!(
            html,
            "<img src=\"{}/{}?n={}\" alt=\"{}\" width=\"64\" height=\"64\">",
            DOWNLOAD_PATH, file.filename, i, file.filename
        );
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_and_images() {
        let config = WebtestConfig {
            script_kb: 4,
            image_count: 3,
        };
        let files = vec![FileMetadata::empty("file_1MB"), FileMetadata::empty("file_100KB")];
        let html = render(&config, &files);

        assert!(html.len() > 4 * 1024);
        assert_eq!(html.matches("<img ").count(), 3);
        assert!(html.contains("/download/file_1MB?n="));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn test_page_without_files() {
        let config = WebtestConfig {
            script_kb: 1,
            image_count: 5,
        };
        let html = render(&config, &[]);
        assert_eq!(html.matches("<img ").count(), 0);
    }
}
