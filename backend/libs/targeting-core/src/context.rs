use url::Url;

/// Everything the rule engine can see about the page being resolved.
///
/// Built once per page view from the embed script's report of its location,
/// structured data and meta keywords.
#[derive(Debug, Clone)]
pub struct PageContext {
    url: Url,
    structured_data_section: Option<String>,
    keywords: Vec<String>,
}

impl PageContext {
    pub fn new(url: Url, structured_data_section: Option<String>, keywords: Vec<String>) -> Self {
        Self {
            url,
            structured_data_section,
            keywords,
        }
    }

    /// Full URL string, as tested by `url_pattern` rules.
    pub fn full_url(&self) -> &str {
        self.url.as_str()
    }

    /// Pathname only, query string excluded.
    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    /// Host with a single leading `www.` label stripped, used as the key for
    /// per-domain artifacts (fallback feeds, manifests).
    pub fn apex_host(&self) -> Option<&str> {
        let host = self.url.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host))
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn structured_data_section(&self) -> Option<&str> {
        self.structured_data_section.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
