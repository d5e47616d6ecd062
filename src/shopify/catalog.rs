use std::collections::BTreeMap;

use html_escape::decode_html_entities;
use reqwest::Client;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ShopifyConfig;
use crate::http::{RetryPolicy, build_client, send_with_retry};
use crate::models::{ProductRecord, Variant};

/// Hard cap the Admin API puts on the `limit` query parameter.
pub const MAX_PAGE_LIMIT: u32 = 250;

const TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const PRODUCT_FIELDS: &str = "id,title,body_html,product_type,tags,variants,metafields,images";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    config: ShopifyConfig,
    retry: RetryPolicy,
}

impl CatalogClient {
    pub fn new(config: &ShopifyConfig) -> Self {
        Self {
            http: build_client(),
            config: config.clone(),
            retry: RetryPolicy::default(),
        }
    }

    /// Fetches the catalog with a restricted field set, following
    /// `rel="next"` page links. Soft-fails: any unrecoverable error is logged
    /// and an empty Vec comes back, which callers treat as "nothing to do".
    pub async fn fetch_products(&self, limit: u32) -> Vec<ProductRecord> {
        match self.fetch_all_pages(limit).await {
            Ok(products) => {
                crate::metrics::products_fetched(products.len());
                products
            }
            Err(err) => {
                error!(target = "calliope.catalog", error = %err, "catalog fetch failed");
                Vec::new()
            }
        }
    }

    /// Like [`fetch_products`], then one metafields GET per record. A record
    /// whose metafields fetch fails is excluded with a warning rather than
    /// aborting the run.
    ///
    /// [`fetch_products`]: CatalogClient::fetch_products
    pub async fn fetch_products_detailed(&self, limit: u32) -> Vec<ProductRecord> {
        let products = self.fetch_products(limit).await;
        let mut detailed = Vec::with_capacity(products.len());
        for mut record in products {
            match self.fetch_metafields(record.id).await {
                Ok(metafields) => {
                    record.metafields.extend(metafields);
                    detailed.push(record);
                }
                Err(err) => {
                    warn!(
                        target = "calliope.catalog",
                        product_id = record.id,
                        error = %err,
                        "metafields fetch failed, skipping product",
                    );
                }
            }
        }
        detailed
    }

    async fn fetch_all_pages(&self, limit: u32) -> Result<Vec<ProductRecord>, CatalogError> {
        let limit_param = limit.clamp(1, MAX_PAGE_LIMIT).to_string();
        let mut products = Vec::new();
        let mut page_info: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(self.products_url())
                .header(TOKEN_HEADER, &self.config.access_token)
                .query(&[("fields", PRODUCT_FIELDS), ("limit", limit_param.as_str())]);
            if let Some(cursor) = &page_info {
                request = request.query(&[("page_info", cursor.as_str())]);
            }

            let response = send_with_retry(request, &self.retry)
                .await
                .map_err(|err| CatalogError::Request(err.to_string()))?;
            if !response.status().is_success() {
                return Err(CatalogError::Request(format!(
                    "HTTP {}",
                    response.status()
                )));
            }

            let next = next_page_cursor(response.headers());
            let envelope: ProductsEnvelope = response
                .json()
                .await
                .map_err(|err| CatalogError::Deserialize(err.to_string()))?;
            let page_count = envelope.products.len();
            products.extend(envelope.products.into_iter().map(normalize_product));
            debug!(
                target = "calliope.catalog",
                page_count,
                total = products.len(),
                "catalog page fetched",
            );

            match next {
                Some(cursor) if page_count > 0 => page_info = Some(cursor),
                _ => break,
            }
        }
        Ok(products)
    }

    /// Sub-resource fetch; deliberately not routed through the retry layer.
    async fn fetch_metafields(
        &self,
        product_id: i64,
    ) -> Result<BTreeMap<String, String>, CatalogError> {
        let response = self
            .http
            .get(self.metafields_url(product_id))
            .header(TOKEN_HEADER, &self.config.access_token)
            .send()
            .await
            .map_err(|err| CatalogError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let envelope: MetafieldsEnvelope = response
            .json()
            .await
            .map_err(|err| CatalogError::Deserialize(err.to_string()))?;
        Ok(envelope
            .metafields
            .into_iter()
            .filter_map(metafield_entry)
            .collect())
    }

    fn products_url(&self) -> String {
        format!(
            "https://{}/admin/api/{}/products.json",
            self.config.store_host, self.config.api_version
        )
    }

    fn metafields_url(&self, product_id: i64) -> String {
        format!(
            "https://{}/admin/api/{}/products/{}/metafields.json",
            self.config.store_host, self.config.api_version, product_id
        )
    }
}

/// Lifts the `page_info` cursor out of the `Link: <…>; rel="next"` header.
fn next_page_cursor(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    for part in link.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let url = part
            .split(';')
            .next()?
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        let query = url.split_once('?')?.1;
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("page_info=") {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct ProductsEnvelope {
    #[serde(default)]
    products: Vec<ApiProduct>,
}

#[derive(Debug, Deserialize)]
struct MetafieldsEnvelope {
    #[serde(default)]
    metafields: Vec<ApiMetafield>,
}

#[derive(Debug, Deserialize)]
struct ApiProduct {
    id: i64,
    title: Option<String>,
    body_html: Option<String>,
    product_type: Option<String>,
    tags: Option<String>,
    #[serde(default)]
    variants: Vec<ApiVariant>,
    #[serde(default)]
    metafields: Vec<ApiMetafield>,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiVariant {
    title: Option<String>,
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMetafield {
    key: Option<String>,
    value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    src: Option<String>,
}

fn normalize_product(raw: ApiProduct) -> ProductRecord {
    ProductRecord {
        id: raw.id,
        title: raw.title.unwrap_or_else(|| "No title".to_string()),
        description: match raw.body_html {
            Some(html) => decode_html_entities(&html).into_owned(),
            None => "No description".to_string(),
        },
        product_type: raw.product_type.filter(|value| !value.trim().is_empty()),
        tags: raw.tags.filter(|value| !value.trim().is_empty()),
        variants: raw
            .variants
            .into_iter()
            .map(|variant| Variant {
                title: variant.title.unwrap_or_default(),
                price: variant.price.unwrap_or_default(),
            })
            .collect(),
        metafields: raw
            .metafields
            .into_iter()
            .filter_map(metafield_entry)
            .collect(),
        images: raw.images.into_iter().filter_map(|image| image.src).collect(),
    }
}

fn metafield_entry(raw: ApiMetafield) -> Option<(String, String)> {
    let key = raw.key?;
    let value = match raw.value? {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    };
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn normalization_unescapes_html_entities() {
        let raw: ApiProduct = serde_json::from_str(
            r#"{
                "id": 42,
                "title": "Locks &amp; Keys",
                "body_html": "Strong &amp; durable &lt;b&gt;hardware&lt;/b&gt;",
                "product_type": "Security",
                "variants": [{"title": "Default", "price": "9.99"}]
            }"#,
        )
        .unwrap();
        let record = normalize_product(raw);
        assert_eq!(record.description, "Strong & durable <b>hardware</b>");
        assert_eq!(record.variants.len(), 1);
        assert_eq!(record.variants[0].price, "9.99");
    }

    #[test]
    fn normalization_fills_missing_fields_with_defaults() {
        let raw: ApiProduct = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        let record = normalize_product(raw);
        assert_eq!(record.title, "No title");
        assert_eq!(record.description, "No description");
        assert!(record.product_type.is_none());
        assert!(record.variants.is_empty());
        assert!(record.metafields.is_empty());
    }

    #[test]
    fn blank_product_type_is_treated_as_absent() {
        let raw: ApiProduct =
            serde_json::from_str(r#"{"id": 7, "product_type": "   "}"#).unwrap();
        assert!(normalize_product(raw).product_type.is_none());
    }

    #[test]
    fn metafield_values_keep_strings_and_render_other_json() {
        let entry = metafield_entry(ApiMetafield {
            key: Some("material".to_string()),
            value: Some(serde_json::Value::String("steel".to_string())),
        });
        assert_eq!(entry, Some(("material".to_string(), "steel".to_string())));

        let entry = metafield_entry(ApiMetafield {
            key: Some("weight_grams".to_string()),
            value: Some(serde_json::json!(1250)),
        });
        assert_eq!(
            entry,
            Some(("weight_grams".to_string(), "1250".to_string()))
        );

        assert!(metafield_entry(ApiMetafield {
            key: None,
            value: Some(serde_json::json!("orphan")),
        })
        .is_none());
    }

    #[test]
    fn next_page_cursor_reads_the_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://x.myshopify.com/admin/api/2023-04/products.json?limit=10&page_info=prevtoken>; rel=\"previous\", \
                 <https://x.myshopify.com/admin/api/2023-04/products.json?limit=10&page_info=nexttoken>; rel=\"next\"",
            ),
        );
        assert_eq!(next_page_cursor(&headers), Some("nexttoken".to_string()));
    }

    #[test]
    fn no_next_link_means_no_cursor() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://x.myshopify.com/admin/api/2023-04/products.json?page_info=prevtoken>; rel=\"previous\"",
            ),
        );
        assert_eq!(next_page_cursor(&headers), None);
        assert_eq!(next_page_cursor(&HeaderMap::new()), None);
    }
}
