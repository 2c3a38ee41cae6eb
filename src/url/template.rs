use crate::crawler::MAX_PAGES;
use crate::url::resolve;
use crate::{UrlError, UrlResult};

/// A result page URL with its page number replaced by a placeholder
///
/// Built from the last-page URL advertised by the first result page, so
/// every other query parameter keeps its original encoding and order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrlTemplate {
    head: String,
    tail: String,
}

impl PageUrlTemplate {
    /// Builds a template from an absolute URL
    ///
    /// # Errors
    ///
    /// Returns `UrlError::MissingPageParam` if the query has no `page_param=` segment.
    pub fn from_url(url: &str, page_param: &str) -> UrlResult<Self> {
        let missing = || UrlError::MissingPageParam(page_param.to_string());

        let query_start = url.find('?').ok_or_else(missing)? + 1;
        let query_end = url[query_start..]
            .find('#')
            .map(|i| query_start + i)
            .unwrap_or(url.len());

        let mut offset = query_start;
        for segment in url[query_start..query_end].split('&') {
            let value = segment
                .strip_prefix(page_param)
                .and_then(|rest| rest.strip_prefix('='));

            if let Some(value) = value {
                let value_start = offset + page_param.len() + 1;
                let value_end = value_start + value.len();
                return Ok(Self {
                    head: url[..value_start].to_string(),
                    tail: url[value_end..].to_string(),
                });
            }

            offset += segment.len() + 1;
        }

        Err(missing())
    }

    /// Builds a template from a possibly relative last-page URL
    pub fn from_last_page(site_base: &str, last_page: &str, page_param: &str) -> UrlResult<Self> {
        let absolute = resolve(site_base, last_page)?;
        Self::from_url(absolute.as_str(), page_param)
    }

    /// Formats the URL of one page
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}{}", self.head, page, self.tail)
    }

    /// URLs of pages `2..=min(pages_count, MAX_PAGES)`
    ///
    /// The first page is the seed itself and is never part of the result.
    pub fn follow_up_urls(&self, pages_count: u32) -> Vec<String> {
        if pages_count <= 1 {
            return Vec::new();
        }

        (2..=pages_count.min(MAX_PAGES))
            .map(|page| self.page_url(page))
            .collect()
    }

    /// The template with a `{}` placeholder, for logging
    pub fn pattern(&self) -> String {
        format!("{}{{}}{}", self.head, self.tail)
    }
}
