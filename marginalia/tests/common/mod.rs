#![allow(dead_code)]

use std::io::Write;
use std::sync::Once;

use tempfile::NamedTempFile;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Paragraph of roughly `words` words, tagged with `label` so it can be found again.
pub fn paragraph(label: &str, words: usize) -> String {
    let filler = std::iter::repeat("lorem")
        .take(words)
        .collect::<Vec<_>>()
        .join(" ");
    format!("<p>{label} {filler}</p>")
}

/// Article page with `sections` identified sections of `paragraphs` paragraphs each.
pub fn sectioned_page(sections: usize, paragraphs: usize, words: usize) -> String {
    let body: String = (0..sections)
        .map(|section| {
            let paragraphs: String = (0..paragraphs)
                .map(|p| paragraph(&format!("marker-{section}-{p}"), words))
                .collect();
            format!("<section id=\"s{section}\" class=\"chapter\">{paragraphs}</section>")
        })
        .collect();

    format!(
        "<!DOCTYPE html><html><head><title>Long read</title></head>\
         <body class=\"article wide\" id=\"page\"><main>{body}</main></body></html>"
    )
}

/// Write `html` to a temporary file that lives as long as the returned handle.
pub fn html_file(html: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(html.as_bytes())
        .expect("Failed to write HTML fixture");
    file
}
