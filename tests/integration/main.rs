//! Integration tests for Listing-Harvest
//!
//! These tests use wiremock to stand in for the rendering proxy and drive the
//! dispatcher and the orchestrator end-to-end.

mod orchestrator_tests;

use listing_harvest::config::{DispatcherConfig, ProxyConfig};
use listing_harvest::crawler::RequestDispatcher;
use serde_json::{json, Value};
use wiremock::ResponseTemplate;

/// Dispatcher limits with millisecond backoff
pub fn fast_dispatcher_config(max_concurrent: u32, transport_retries: u32) -> DispatcherConfig {
    DispatcherConfig {
        max_concurrent,
        transport_retries,
        validation_retries: 1,
        backoff_base_ms: 10,
        backoff_max_ms: 20,
    }
}

/// A dispatcher pointed at the mock proxy
pub fn dispatcher(proxy_url: &str, config: &DispatcherConfig) -> RequestDispatcher {
    RequestDispatcher::new(&ProxyConfig::new(proxy_url), config)
        .expect("Failed to build dispatcher")
}

/// Renders a result page carrying an embedded state block
///
/// `items` are the real listings; the reserved leading slot is added here.
pub fn result_page(total_count: u64, items: &[(i64, &str)], last_page: Option<&str>) -> String {
    let mut raw_items: Vec<Value> = vec![json!({"type": "banner"})];
    raw_items.extend(items.iter().map(|(id, title)| {
        json!({
            "id": id,
            "title": title,
            "urlPath": format!("/moskva/vakansii/{}", id),
        })
    }));

    let mut catalog = json!({ "items": raw_items });
    if let Some(last) = last_page {
        catalog["pager"] = json!({ "last": last });
    }

    let state = json!({
        "data": {
            "mainCount": total_count,
            "catalog": catalog,
        }
    });
    let encoded = state
        .to_string()
        .replace('&', "&amp;")
        .replace('"', "&quot;");

    format!(
        r#"<html><head><title>Results</title></head><body>
        <div id="app"></div>
        <script type="mime/invalid" data-mfe-state="true">{}</script>
        </body></html>"#,
        encoded
    )
}

/// A page without any embedded state, as served when the proxy is blocked
pub fn blocked_page() -> String {
    r#"<html><head><title>Access restricted</title></head><body>captcha</body></html>"#
        .to_string()
}

/// A proxy response carrying `html` under its `text` field
pub fn proxy_response(html: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "text": html }))
}
