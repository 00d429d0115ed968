//! STAC Item Search wire models.
//!
//! Only the fields the scene pipeline reads are modelled; everything else in
//! the upstream documents is ignored.

use crate::geo::{BBox, DateRange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// STAC property used for server-side sorting.
const DATETIME_PROPERTY: &str = "properties.datetime";
/// EO extension cloud cover property.
pub const CLOUD_COVER_PROPERTY: &str = "eo:cloud_cover";

/// Body of a `POST /search` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchBody {
    pub bbox: [f64; 4],
    /// RFC 3339 interval, e.g. `2024-05-01T00:00:00Z/2024-05-31T23:59:59Z`
    pub datetime: String,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    pub sortby: Vec<SortBy>,
    /// Query extension filter; servers without it ignore the field
    pub query: HashMap<String, Value>,
}

impl SearchBody {
    pub fn new(bbox: &BBox, date_range: &DateRange, page_size: u32, max_cloud_cover_pct: f64) -> Self {
        let mut query = HashMap::new();
        query.insert(
            CLOUD_COVER_PROPERTY.to_string(),
            serde_json::json!({ "lte": max_cloud_cover_pct }),
        );
        Self {
            bbox: bbox.to_array(),
            datetime: date_range.to_rfc3339_interval(),
            limit: page_size.max(1),
            collections: None,
            sortby: vec![SortBy::descending(DATETIME_PROPERTY)],
            query,
        }
    }

    pub fn with_collections(mut self, collections: Option<Vec<String>>) -> Self {
        self.collections = collections.filter(|c| !c.is_empty());
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortBy {
    pub field: String,
    pub direction: String,
}

impl SortBy {
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: "desc".to_string(),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,
    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl ItemCollection {
    /// The `rel="next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub properties: ItemProperties,
    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemProperties {
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(rename = "eo:cloud_cover", default)]
    pub cloud_cover: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacAsset {
    pub href: String,
    /// Alternate locations keyed by access scheme (`s3`, `https`, ...)
    #[serde(default)]
    pub alternate: HashMap<String, AlternateHref>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlternateHref {
    pub href: String,
}

impl StacAsset {
    /// Picks an `https://` location, preferring the primary href.
    pub fn preferred_href(&self) -> &str {
        if is_https(&self.href) {
            return &self.href;
        }
        let mut alternates: Vec<&AlternateHref> = self.alternate.values().collect();
        alternates.sort_by(|a, b| a.href.cmp(&b.href));
        alternates
            .into_iter()
            .map(|a| a.href.as_str())
            .find(|href| is_https(href))
            .unwrap_or(&self.href)
    }
}

fn is_https(href: &str) -> bool {
    href.get(..8)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
}

/// A link object; `next` links may carry POST method, body and merge flag.
#[derive(Debug, Clone, Deserialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub merge: Option<bool>,
}

/// How to request a result page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    Post { url: String, body: Value },
    Get { url: String },
}

impl PageRequest {
    pub fn url(&self) -> &str {
        match self {
            Self::Post { url, .. } | Self::Get { url } => url,
        }
    }

    /// Builds the request for a `next` link.
    ///
    /// POST links reuse the previous body when they carry none, replace it
    /// when they carry one, and overlay it key by key when `merge` is set.
    pub fn follow(link: &StacLink, previous: &PageRequest) -> Self {
        let is_post = link
            .method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("POST"));
        if !is_post {
            return Self::Get {
                url: link.href.clone(),
            };
        }

        let previous_body = match previous {
            Self::Post { body, .. } => body.clone(),
            Self::Get { .. } => Value::Object(Default::default()),
        };
        let body = match (&link.body, link.merge.unwrap_or(false)) {
            (Some(link_body), true) => {
                let mut merged = previous_body;
                if let (Some(base), Some(overlay)) = (merged.as_object_mut(), link_body.as_object()) {
                    for (k, v) in overlay {
                        base.insert(k.clone(), v.clone());
                    }
                }
                merged
            }
            (Some(link_body), false) => link_body.clone(),
            (None, _) => previous_body,
        };
        Self::Post {
            url: link.href.clone(),
            body,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Builds an item collection document with one item per `(id, datetime, cloud)`.
    pub(crate) fn page_json(items: &[(&str, &str, Option<f64>)], next: Option<Value>) -> String {
        let features: Vec<Value> = items
            .iter()
            .map(|(id, datetime, cloud)| {
                let mut properties = serde_json::json!({ "datetime": datetime });
                if let Some(c) = cloud {
                    properties["eo:cloud_cover"] = serde_json::json!(c);
                }
                serde_json::json!({
                    "type": "Feature",
                    "id": id,
                    "collection": "HLSL30_2.0",
                    "bbox": [10.0, 20.0, 11.0, 21.0],
                    "properties": properties,
                    "assets": {
                        "B04": {
                            "href": format!("https://data.test/{}/B04.tif", id),
                            "alternate": { "s3": { "href": format!("s3://bucket/{}/B04.tif", id) } }
                        },
                        "browse": {
                            "href": format!("s3://bucket/{}/browse.jpg", id),
                            "alternate": { "https": { "href": format!("https://data.test/{}/browse.jpg", id) } }
                        }
                    }
                })
            })
            .collect();
        let links: Vec<Value> = next.into_iter().collect();
        serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
            "links": links
        })
        .to_string()
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_search_body_shape() {
        let bbox = BBox::new(10.0, 20.0, 11.0, 21.0).unwrap();
        let body = SearchBody::new(&bbox, &range(), 10, 50.0)
            .with_collections(Some(vec!["HLSL30.v2.0".into()]))
            .to_value();

        assert_eq!(body["bbox"], serde_json::json!([10.0, 20.0, 11.0, 21.0]));
        assert_eq!(body["datetime"], "2024-05-01T00:00:00Z/2024-05-31T23:59:59Z");
        assert_eq!(body["limit"], 10);
        assert_eq!(body["collections"][0], "HLSL30.v2.0");
        assert_eq!(body["sortby"][0]["field"], "properties.datetime");
        assert_eq!(body["sortby"][0]["direction"], "desc");
        assert_eq!(body["query"]["eo:cloud_cover"]["lte"], 50.0);
    }

    #[test]
    fn test_empty_collections_omitted() {
        let bbox = BBox::new(10.0, 20.0, 11.0, 21.0).unwrap();
        let body = SearchBody::new(&bbox, &range(), 10, 50.0)
            .with_collections(Some(vec![]))
            .to_value();
        assert!(body.get("collections").is_none());
    }

    #[test]
    fn test_parse_page_and_next_link() {
        let json = page_json(
            &[("a", "2024-05-02T10:00:00Z", Some(12.0))],
            Some(serde_json::json!({ "rel": "next", "href": "https://stac.test/search?page=2" })),
        );
        let page: ItemCollection = serde_json::from_str(&json).unwrap();

        assert_eq!(page.features.len(), 1);
        assert_eq!(page.features[0].properties.cloud_cover, Some(12.0));
        assert_eq!(
            page.next_link().unwrap().href,
            "https://stac.test/search?page=2"
        );
    }

    #[test]
    fn test_preferred_href() {
        let page: ItemCollection =
            serde_json::from_str(&page_json(&[("a", "2024-05-02T10:00:00Z", None)], None)).unwrap();
        let assets = &page.features[0].assets;

        assert_eq!(assets["B04"].preferred_href(), "https://data.test/a/B04.tif");
        assert_eq!(assets["browse"].preferred_href(), "https://data.test/a/browse.jpg");
    }

    #[test]
    fn test_preferred_href_with_non_ascii_host() {
        let asset: StacAsset = serde_json::from_value(serde_json::json!({
            "href": "http://é.example/B04.tif",
            "alternate": { "s3": { "href": "s3://bucket/é/B04.tif" } }
        }))
        .unwrap();
        assert_eq!(asset.preferred_href(), "http://é.example/B04.tif");

        let asset: StacAsset =
            serde_json::from_value(serde_json::json!({ "href": "ftp://ü" })).unwrap();
        assert_eq!(asset.preferred_href(), "ftp://ü");
    }

    #[test]
    fn test_follow_get_link() {
        let link = StacLink {
            rel: "next".into(),
            href: "https://stac.test/search?token=x".into(),
            method: None,
            body: None,
            merge: None,
        };
        let prev = PageRequest::Post {
            url: "https://stac.test/search".into(),
            body: serde_json::json!({ "limit": 10 }),
        };
        assert_eq!(
            PageRequest::follow(&link, &prev),
            PageRequest::Get {
                url: "https://stac.test/search?token=x".into()
            }
        );
    }

    #[test]
    fn test_follow_post_link_merges_body() {
        let link = StacLink {
            rel: "next".into(),
            href: "https://stac.test/search".into(),
            method: Some("POST".into()),
            body: Some(serde_json::json!({ "token": "next:abc" })),
            merge: Some(true),
        };
        let prev = PageRequest::Post {
            url: "https://stac.test/search".into(),
            body: serde_json::json!({ "limit": 10, "token": "old" }),
        };

        match PageRequest::follow(&link, &prev) {
            PageRequest::Post { body, .. } => {
                assert_eq!(body["limit"], 10);
                assert_eq!(body["token"], "next:abc");
            }
            other => panic!("expected POST, got {:?}", other),
        }
    }

    #[test]
    fn test_follow_post_link_replaces_body_without_merge() {
        let link = StacLink {
            rel: "next".into(),
            href: "https://stac.test/search".into(),
            method: Some("post".into()),
            body: Some(serde_json::json!({ "token": "t2" })),
            merge: None,
        };
        let prev = PageRequest::Post {
            url: "https://stac.test/search".into(),
            body: serde_json::json!({ "limit": 10 }),
        };

        match PageRequest::follow(&link, &prev) {
            PageRequest::Post { body, .. } => {
                assert_eq!(body, serde_json::json!({ "token": "t2" }));
            }
            other => panic!("expected POST, got {:?}", other),
        }
    }
}
