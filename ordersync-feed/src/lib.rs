//! # ordersync-feed
//!
//! HTTP source feed for the commerce platform's Admin REST API.
//!
//! One snapshot is `GET {store}/admin/api/{version}/orders.json?status=…&limit=…`
//! followed by every `Link: <…>; rel="next"` page until none remains.

use serde::Deserialize;
use serde_json::Value;

use ordersync_core::config::FeedSettings;
use ordersync_core::{FeedError, SourceFeed, StatusFilter};

pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Deserialize)]
struct OrdersPage {
    orders: Option<Vec<Value>>,
}

/// Blocking feed over `ureq`.
pub struct ShopifyFeed {
    agent: ureq::Agent,
    settings: FeedSettings,
}

impl ShopifyFeed {
    pub fn new(settings: FeedSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout)
            .user_agent(concat!("ordersync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, settings }
    }

    /// URL of the first page for `status`.
    pub fn first_page_url(&self, status: StatusFilter) -> String {
        format!(
            "{}/admin/api/{}/orders.json?status={}&limit={}",
            self.settings.store_url, self.settings.api_version, status, self.settings.page_size
        )
    }

    fn fetch_page(&self, url: &str) -> Result<(Vec<Value>, Option<String>), FeedError> {
        tracing::debug!("fetching page: {url}");
        let response = self
            .agent
            .get(url)
            .set(ACCESS_TOKEN_HEADER, &self.settings.access_token)
            .set("Accept", "application/json")
            .call()
            .map_err(into_feed_error)?;

        let next = response.header("Link").and_then(next_link);
        let page: OrdersPage = response
            .into_json()
            .map_err(|e| FeedError::Decode(e.to_string()))?;
        let orders = page.orders.ok_or(FeedError::MissingOrders)?;
        Ok((orders, next))
    }
}

impl SourceFeed for ShopifyFeed {
    fn fetch_snapshot(&self, status: StatusFilter) -> Result<Vec<Value>, FeedError> {
        let mut url = self.first_page_url(status);
        let mut snapshot = Vec::new();
        let mut pages = 0usize;

        loop {
            let (orders, next) = self.fetch_page(&url)?;
            pages += 1;
            snapshot.extend(orders);
            match next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        tracing::info!("fetched {} orders in {pages} page(s)", snapshot.len());
        Ok(snapshot)
    }
}

fn into_feed_error(err: ureq::Error) -> FeedError {
    match err {
        ureq::Error::Status(status, response) => FeedError::Http {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => FeedError::Transport(transport.to_string()),
    }
}

/// Target of the `rel="next"` entry of an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> FeedSettings {
        FeedSettings {
            store_url: "https://shop.example".into(),
            api_version: "2024-07".into(),
            access_token: "shpat_test".into(),
            page_size: 50,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn first_page_url_carries_status_and_limit() {
        let feed = ShopifyFeed::new(settings());
        assert_eq!(
            feed.first_page_url(StatusFilter::Any),
            "https://shop.example/admin/api/2024-07/orders.json?status=any&limit=50"
        );
    }

    #[test]
    fn next_link_picks_next_among_several() {
        let header = r#"<https://shop.example/a?page_info=p>; rel="previous", <https://shop.example/a?page_info=n>; rel="next""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://shop.example/a?page_info=n")
        );
    }

    #[test]
    fn next_link_absent_on_last_page() {
        assert_eq!(next_link(r#"<https://shop.example/a>; rel="previous""#), None);
        assert_eq!(next_link(""), None);
    }
}
