//! URL handling module for Listing-Harvest
//!
//! This module builds the seed search URL of a crawl target and derives
//! follow-up result page URLs from the last-page link a result page advertises.

mod template;

use crate::config::SiteConfig;
use crate::storage::CrawlTarget;
use crate::{UrlError, UrlResult};
use url::{form_urlencoded, Url};

pub use template::PageUrlTemplate;

/// Builds the first result page URL for a crawl target
///
/// `{area}` in the search path is replaced by the target's area id and
/// `{query}` by the form-encoded vacancy name.
///
/// # Examples
///
/// ```
/// use listing_harvest::config::SiteConfig;
/// use listing_harvest::storage::CrawlTarget;
/// use listing_harvest::url::search_url;
///
/// let target = CrawlTarget::new("moskva", "cook");
/// assert_eq!(
///     search_url(&SiteConfig::default(), &target),
///     "https://www.avito.ru/moskva/vakansii?cd=1&q=cook&s=104"
/// );
/// ```
pub fn search_url(site: &SiteConfig, target: &CrawlTarget) -> String {
    let query: String = form_urlencoded::byte_serialize(target.vacancy_name.as_bytes()).collect();
    let path = site
        .search_path
        .replace("{area}", target.area_id.trim())
        .replace("{query}", &query);

    format!("{}{}", site.base_url.trim_end_matches('/'), path)
}

/// Resolves a possibly relative link against the site base URL
pub fn resolve(site_base: &str, href: &str) -> UrlResult<Url> {
    let base = Url::parse(site_base).map_err(|e| UrlError::Parse(format!("{}: {}", site_base, e)))?;
    let resolved = base
        .join(href.trim())
        .map_err(|e| UrlError::Malformed(format!("{}: {}", href, e)))?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return Err(UrlError::Malformed(format!("unsupported scheme in {}", href)));
    }

    Ok(resolved)
}
