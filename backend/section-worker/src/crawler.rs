use async_trait::async_trait;
use lol_html::{element, text, HtmlRewriter, Settings};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::CrawlConfig;
use crate::error::{Result, WorkerError};

/// Structured metadata extracted from a live article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub image_url: Option<String>,
    pub published_time: Option<String>,
}

/// Fetches a page and extracts its Open Graph metadata. A page without a
/// usable title is an error; the caller drops that article and moves on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataCrawler: Send + Sync {
    async fn page_metadata(&self, url: &str) -> Result<PageMetadata>;
}

/// reqwest + lol_html implementation. The whole body is buffered before the
/// rewriter runs so the crawl future stays `Send`.
pub struct HttpCrawler {
    http: reqwest::Client,
}

impl HttpCrawler {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl MetadataCrawler for HttpCrawler {
    async fn page_metadata(&self, url: &str) -> Result<PageMetadata> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(WorkerError::Crawl(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        let body = response.bytes().await?;
        extract_metadata(&body)
            .ok_or_else(|| WorkerError::Crawl(format!("{url}: missing required title")))
    }
}

#[derive(Debug, Default)]
struct MetaCapture {
    og_title: Option<String>,
    twitter_title: Option<String>,
    doc_title: String,
    og_image: Option<String>,
    twitter_image: Option<String>,
    published_time: Option<String>,
}

impl MetaCapture {
    /// First occurrence of each tag wins.
    fn record(&mut self, key: &str, content: String) {
        let slot = match key {
            "og:title" => &mut self.og_title,
            "twitter:title" => &mut self.twitter_title,
            "og:image" => &mut self.og_image,
            "twitter:image" => &mut self.twitter_image,
            "article:published_time" => &mut self.published_time,
            _ => return,
        };
        if slot.is_none() && !content.is_empty() {
            *slot = Some(content);
        }
    }

    fn into_metadata(self) -> Option<PageMetadata> {
        let doc_title = self.doc_title.trim().to_string();
        let title = self
            .og_title
            .or(self.twitter_title)
            .or((!doc_title.is_empty()).then_some(doc_title))?;
        Some(PageMetadata {
            title,
            image_url: self.og_image.or(self.twitter_image),
            published_time: self.published_time,
        })
    }
}

fn lock(capture: &Arc<Mutex<MetaCapture>>) -> MutexGuard<'_, MetaCapture> {
    match capture.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Runs the streaming HTML handlers over a buffered page body and returns
/// the extracted metadata, or `None` when no title was found.
pub fn extract_metadata(html: &[u8]) -> Option<PageMetadata> {
    let capture = Arc::new(Mutex::new(MetaCapture::default()));
    let meta_capture = Arc::clone(&capture);
    let title_capture = Arc::clone(&capture);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("meta", move |el| {
                    let key = el
                        .get_attribute("property")
                        .or_else(|| el.get_attribute("name"));
                    if let (Some(key), Some(content)) = (key, el.get_attribute("content")) {
                        lock(&meta_capture).record(&key, content);
                    }
                    Ok(())
                }),
                text!("title", move |chunk| {
                    lock(&title_capture).doc_title.push_str(chunk.as_str());
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    // Malformed markup past the interesting tags should not discard what
    // was already captured.
    let _ = rewriter.write(html);
    let _ = rewriter.end();

    let capture = std::mem::take(&mut *lock(&capture));
    capture.into_metadata()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_open_graph_metadata() {
        let html = br#"<html><head>
            <title>Doc title</title>
            <meta property="og:title" content="Game 7 recap" />
            <meta property="og:image" content="https://img/game7.jpg" />
            <meta property="article:published_time" content="2024-05-19T08:00:00Z" />
        </head><body></body></html>"#;

        let meta = extract_metadata(html).unwrap();
        assert_eq!(meta.title, "Game 7 recap");
        assert_eq!(meta.image_url.as_deref(), Some("https://img/game7.jpg"));
        assert_eq!(
            meta.published_time.as_deref(),
            Some("2024-05-19T08:00:00Z")
        );
    }

    #[test]
    fn test_twitter_tags_fill_missing_open_graph() {
        let html = br#"<head>
            <meta name="twitter:title" content="Series preview" />
            <meta name="twitter:image" content="https://img/preview.jpg" />
        </head>"#;

        let meta = extract_metadata(html).unwrap();
        assert_eq!(meta.title, "Series preview");
        assert_eq!(meta.image_url.as_deref(), Some("https://img/preview.jpg"));
        assert!(meta.published_time.is_none());
    }

    #[test]
    fn test_document_title_is_last_resort() {
        let meta = extract_metadata(b"<html><head><title> Plain title </title></head></html>")
            .unwrap();
        assert_eq!(meta.title, "Plain title");
    }

    #[test]
    fn test_page_without_title_yields_none() {
        let html = br#"<head><meta property="og:image" content="https://img/x.jpg" /></head>"#;
        assert!(extract_metadata(html).is_none());
    }

    #[test]
    fn test_first_tag_occurrence_wins() {
        let html = br#"<head>
            <meta property="og:title" content="First" />
            <meta property="og:title" content="Second" />
        </head>"#;
        assert_eq!(extract_metadata(html).unwrap().title, "First");
    }

    #[test]
    fn test_unrelated_meta_tags_are_ignored() {
        let html = br#"<head>
            <title>T</title>
            <meta name="viewport" content="width=device-width" />
            <meta charset="utf-8" />
        </head>"#;
        let meta = extract_metadata(html).unwrap();
        assert_eq!(meta.title, "T");
        assert!(meta.image_url.is_none());
    }
}
