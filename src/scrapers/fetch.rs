//! HTTP fetching and article text extraction.

use crate::config::ScrapeSettings;
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

static ARTICLE_PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article p").expect("valid selector"));
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static OG_DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:description"], meta[name="description"]"#)
        .expect("valid selector")
});

/// Client with the scraper's user agent and timeout.
pub fn build_client(settings: &ScrapeSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.timeout_seconds))
        .build()
}

/// GET a page; non-2xx responses are errors.
#[instrument(level = "debug", skip_all, fields(%url))]
pub async fn fetch_html(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;
    debug!(bytes = body.len(), "Fetched page");
    Ok(body)
}

fn paragraphs(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|p| collapse_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Main text of an article page.
///
/// `<article> p` paragraphs when present, otherwise every `<p>`, otherwise the
/// page description meta tag.
pub fn extract_article_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let mut found = paragraphs(&document, &ARTICLE_PARAGRAPHS);
    if found.is_empty() {
        found = paragraphs(&document, &PARAGRAPHS);
    }
    if found.is_empty() {
        found = document
            .select(&OG_DESCRIPTION)
            .filter_map(|meta| meta.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|d| !d.is_empty())
            .take(1)
            .collect();
    }
    (!found.is_empty()).then(|| found.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_article_paragraphs() {
        let html = r#"<html><body>
            <p>เมนู</p>
            <article><h1>หัวข้อ</h1><p>ย่อหน้า  แรก</p><p></p><p>ย่อหน้าสอง</p></article>
        </body></html>"#;
        assert_eq!(
            extract_article_text(html).as_deref(),
            Some("ย่อหน้า แรก\nย่อหน้าสอง")
        );
    }

    #[test]
    fn test_falls_back_to_paragraphs_then_meta() {
        let html = "<html><body><div><p>one</p><p>two</p></div></body></html>";
        assert_eq!(extract_article_text(html).as_deref(), Some("one\ntwo"));

        let meta = r#"<html><head><meta property="og:description" content="สรุป ข่าว"></head><body></body></html>"#;
        assert_eq!(extract_article_text(meta).as_deref(), Some("สรุป ข่าว"));

        assert_eq!(extract_article_text("<html><body></body></html>"), None);
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(&ScrapeSettings::default()).is_ok());
    }
}
