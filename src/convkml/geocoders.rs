// The HTTP geocoding backends.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::convkml::*;

pub const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const ARCGIS_ENDPOINT: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";

pub fn make_geocoder(settings: &GeocoderSettings) -> ConvResult<Box<dyn Geocoder>> {
    let client = Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.timeout)
        .build()
        .context(HttpClientSnafu {})?;
    info!(
        "make_geocoder: {:?} endpoint: {:?} user agent: {:?}",
        settings.provider, settings.endpoint, settings.user_agent
    );
    let res: Box<dyn Geocoder> = match settings.provider {
        Provider::Nominatim => Box::new(Nominatim {
            client,
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| NOMINATIM_ENDPOINT.to_string()),
        }),
        Provider::ArcGis => Box::new(ArcGis {
            client,
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| ARCGIS_ENDPOINT.to_string()),
            token: settings.api_key.clone(),
        }),
    };
    Ok(res)
}

// Throttling and server errors are worth a retry, other refusals are not.
fn check_status(status: StatusCode) -> Result<(), LookupError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        Err(LookupError::Transient(format!("HTTP {}", status)))
    } else {
        Err(LookupError::Rejected(format!("HTTP {}", status)))
    }
}

fn fetch(req: reqwest::blocking::RequestBuilder) -> Result<String, LookupError> {
    let response = req
        .send()
        .map_err(|e| LookupError::Transient(e.to_string()))?;
    check_status(response.status())?;
    response
        .text()
        .map_err(|e| LookupError::Transient(e.to_string()))
}

/// OpenStreetMap Nominatim.
pub struct Nominatim {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

pub fn parse_nominatim(body: &str) -> Result<Option<GeocodeResult>, LookupError> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| LookupError::Transient(format!("invalid response: {}", e)))?;
    let place = match places.into_iter().next() {
        Some(p) => p,
        None => return Ok(None),
    };
    match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
        (Ok(latitude), Ok(longitude)) => Ok(Some(GeocodeResult {
            latitude,
            longitude,
            display_address: place.display_name,
        })),
        _ => Err(LookupError::Transient(format!(
            "invalid coordinates: {} {}",
            place.lat, place.lon
        ))),
    }
}

impl Geocoder for Nominatim {
    fn name(&self) -> &str {
        "nominatim"
    }

    fn lookup(&self, query: &str) -> Result<Option<GeocodeResult>, LookupError> {
        let req = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("format", "json"),
            ("limit", "1"),
            ("countrycodes", "br"),
        ]);
        let body = fetch(req)?;
        debug!("nominatim: {:?} -> {}", query, body);
        parse_nominatim(&body)
    }
}

/// ArcGIS World Geocoding (findAddressCandidates).
pub struct ArcGis {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArcGisLocation {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ArcGisCandidate {
    address: Option<String>,
    location: ArcGisLocation,
}

#[derive(Debug, Deserialize)]
struct ArcGisError {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArcGisResponse {
    candidates: Option<Vec<ArcGisCandidate>>,
    error: Option<ArcGisError>,
}

pub fn parse_arcgis(body: &str) -> Result<Option<GeocodeResult>, LookupError> {
    let response: ArcGisResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Transient(format!("invalid response: {}", e)))?;
    // Errors come back with a 200 status.
    if let Some(err) = response.error {
        let msg = format!(
            "ArcGIS error {}: {}",
            err.code.unwrap_or(0),
            err.message.unwrap_or_default()
        );
        return match err.code {
            Some(c) if c >= 500 => Err(LookupError::Transient(msg)),
            _ => Err(LookupError::Rejected(msg)),
        };
    }
    Ok(response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|c| GeocodeResult {
            latitude: c.location.y,
            longitude: c.location.x,
            display_address: c.address,
        }))
}

impl Geocoder for ArcGis {
    fn name(&self) -> &str {
        "arcgis"
    }

    fn lookup(&self, query: &str) -> Result<Option<GeocodeResult>, LookupError> {
        let mut params = vec![
            ("SingleLine", query),
            ("f", "json"),
            ("maxLocations", "1"),
            ("countryCode", "BRA"),
            ("outFields", "Match_addr"),
        ];
        if let Some(token) = &self.token {
            params.push(("token", token.as_str()));
        }
        let body = fetch(self.client.get(&self.endpoint).query(&params))?;
        debug!("arcgis: {:?} -> {}", query, body);
        parse_arcgis(&body)
    }
}
