//! Nominatim address search client.

use crate::geo::{MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
use crate::upstream::{AsyncHttpClient, HttpError, RetryPolicy, UpstreamError};
use serde::Deserialize;
use tracing::{debug, info};

/// Public OpenStreetMap Nominatim search endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Nominatim's usage policy requires an identifying User-Agent.
const GEOCODER_USER_AGENT: &str = concat!("bloomwatch/", env!("CARGO_PKG_VERSION"));

/// One search hit. Nominatim sends coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: Coordinate,
    lon: Coordinate,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    fn value(&self) -> Option<f64> {
        let value = match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|v| v.is_finite())
    }
}

/// Parses a search response into the first hit's `(lat, lon)`.
///
/// An empty result list is `Ok(None)`; a hit whose coordinates are missing
/// or out of range is a malformed response.
pub fn parse_search_response(body: &[u8], url: &str) -> Result<Option<(f64, f64)>, UpstreamError> {
    let places: Vec<Place> = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::malformed(url, format!("invalid search results: {}", e)))?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    let lat = place
        .lat
        .value()
        .filter(|lat| (MIN_LAT..=MAX_LAT).contains(lat))
        .ok_or_else(|| UpstreamError::malformed(url, "latitude missing or out of range"))?;
    let lon = place
        .lon
        .value()
        .filter(|lon| (MIN_LON..=MAX_LON).contains(lon))
        .ok_or_else(|| UpstreamError::malformed(url, "longitude missing or out of range"))?;

    debug!(
        lat = lat,
        lon = lon,
        place = place.display_name.as_deref().unwrap_or(""),
        "Geocoder hit"
    );
    Ok(Some((lat, lon)))
}

/// Resolves free-text addresses to coordinates.
pub struct GeocodingClient<C: AsyncHttpClient> {
    http_client: C,
    search_url: String,
    retry: RetryPolicy,
}

impl<C: AsyncHttpClient> GeocodingClient<C> {
    /// Creates a client for the public Nominatim endpoint.
    pub fn new(http_client: C) -> Self {
        Self::with_url(http_client, DEFAULT_GEOCODER_URL)
    }

    pub fn with_url(http_client: C, search_url: impl Into<String>) -> Self {
        Self {
            http_client,
            search_url: search_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Looks up `address`, returning the best match as `(lat, lon)`.
    ///
    /// A blank address resolves to `None` without a request.
    pub async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>, UpstreamError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        let url = self.request_url(address)?;
        let url = url.as_str();
        let headers = [
            ("User-Agent", GEOCODER_USER_AGENT),
            ("Accept", "application/json"),
        ];

        let hit = self
            .retry
            .run("geocode", |attempt| {
                let headers = &headers;
                async move {
                    debug!(address = address, attempt = attempt, "Geocoding address");
                    let body = self.http_client.get_with_headers(url, headers).await?;
                    parse_search_response(&body, url)
                }
            })
            .await?;

        match hit {
            Some((lat, lon)) => info!(address = address, lat = lat, lon = lon, "Address resolved"),
            None => info!(address = address, "No match for address"),
        }
        Ok(hit)
    }

    fn request_url(&self, address: &str) -> Result<String, UpstreamError> {
        reqwest::Url::parse_with_params(
            &self.search_url,
            &[
                ("q", address),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ],
        )
        .map(String::from)
        .map_err(|e| {
            UpstreamError::Http(HttpError::Request {
                url: self.search_url.clone(),
                message: format!("invalid geocoder URL: {}", e),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::http::tests::ScriptedHttpClient;
    use std::time::Duration;

    const HIT: &str = r#"[{"place_id": 1, "lat": "36.7378", "lon": "-119.7871",
        "display_name": "Fresno, Fresno County, California, United States"}]"#;

    fn client(http: ScriptedHttpClient) -> GeocodingClient<ScriptedHttpClient> {
        GeocodingClient::with_url(http, "https://geo.test/search").with_retry_policy(
            RetryPolicy::none()
                .with_max_retries(1)
                .with_base_delay(Duration::ZERO)
                .with_jitter(false),
        )
    }

    #[tokio::test]
    async fn test_geocode_first_hit() {
        let http = ScriptedHttpClient::new();
        http.push_ok(HIT);

        let client = client(http);

        let hit = client.geocode("Fresno County, CA").await.unwrap();
        assert_eq!(hit, Some((36.7378, -119.7871)));

        let requests = client.http_client.requests();
        assert_eq!(requests.len(), 1);
        let url = &requests[0].url;
        assert!(url.starts_with("https://geo.test/search?"));
        assert!(url.contains("q=Fresno+County%2C+CA"), "{}", url);
        assert!(url.contains("format=json"));
        assert!(url.contains("limit=1"));
        assert!(requests[0]
            .headers
            .iter()
            .any(|(k, v)| k == "User-Agent" && v.starts_with("bloomwatch/")));
    }

    #[tokio::test]
    async fn test_no_match_is_none() {
        let http = ScriptedHttpClient::new();
        http.push_ok("[]");

        assert_eq!(client(http).geocode("nowhere at all").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_address_skips_request() {
        let client = client(ScriptedHttpClient::new());

        assert_eq!(client.geocode("   ").await.unwrap(), None);
        assert_eq!(client.http_client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let http = ScriptedHttpClient::new();
        http.push(Err(HttpError::Status {
            status: 503,
            url: "https://geo.test/search".into(),
        }))
        .push_ok(HIT);

        let client = client(http);

        let hit = client.geocode("Fresno").await.unwrap();
        assert!(hit.is_some());
        assert_eq!(client.http_client.request_count(), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let http = ScriptedHttpClient::new();
        http.push(Err(HttpError::Status {
            status: 403,
            url: "https://geo.test/search".into(),
        }));

        let client = client(http);

        let err = client.geocode("Fresno").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(client.http_client.request_count(), 1);
    }

    #[test]
    fn test_numeric_coordinates_accepted() {
        let hit = parse_search_response(br#"[{"lat": 10.5, "lon": 20.25}]"#, "u").unwrap();
        assert_eq!(hit, Some((10.5, 20.25)));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let err = parse_search_response(br#"[{"lat": "91.0", "lon": "0"}]"#, "u").unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed { .. }));
        assert!(parse_search_response(br#"[{"lat": "north", "lon": "0"}]"#, "u").is_err());
        assert!(parse_search_response(b"<html>", "u").is_err());
    }
}
