use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::gazetteer::Coordinate;

/// One place returned by a geocoding provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub coordinate: Coordinate,
    pub formatted_address: Option<String>,
}

/// Anything that went wrong between asking the provider and getting usable data.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("geocoding request timed out")]
    Timeout,
    #[error("geocoding request failed")]
    Transport(#[source] reqwest::Error),
    #[error("geocoding service returned HTTP {0}")]
    HttpStatus(StatusCode),
    #[error("failed to parse geocoding response")]
    Malformed(#[source] serde_json::Error),
    #[error("geocoding service returned status {status}")]
    Status {
        status: String,
        message: Option<String>,
    },
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the API key, keep it out of logs.
        let e = e.without_url();
        if e.is_timeout() {
            GeocodeError::Timeout
        } else {
            GeocodeError::Transport(e)
        }
    }
}

pub type GeocodeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Candidate>, GeocodeError>> + Send + 'a>>;

/// A forward geocoding provider: free text in, ranked candidates out.
///
/// An empty list means the provider looked and found nothing.
pub trait Geocoder: Send + Sync + 'static {
    fn geocode(&self, query: String) -> GeocodeFuture<'_>;
}

/// Google Geocoding API (`/maps/api/geocode/json`).
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    geometry: Geometry,
    formatted_address: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Geometry {
    location: Location,
}

#[derive(Deserialize, Debug)]
struct Location {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    pub fn new(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GeocodeError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    #[instrument(skip(self))]
    async fn forward(&self, query: &str) -> Result<Vec<Candidate>, GeocodeError> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("address", query), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Geocoding API request failed");
            return Err(GeocodeError::HttpStatus(status));
        }

        let body = response.text().await?;
        let parsed: GeocodeResponse =
            serde_json::from_str(&body).map_err(GeocodeError::Malformed)?;

        debug!(status = %parsed.status, results = parsed.results.len(), "Received geocoding response");

        match parsed.status.as_str() {
            "OK" => Ok(parsed
                .results
                .into_iter()
                .map(|r| Candidate {
                    coordinate: Coordinate::new(r.geometry.location.lat, r.geometry.location.lng),
                    formatted_address: r.formatted_address,
                })
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(GeocodeError::Status {
                status: parsed.status,
                message: parsed.error_message,
            }),
        }
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&self, query: String) -> GeocodeFuture<'_> {
        Box::pin(async move { self.forward(&query).await })
    }
}
