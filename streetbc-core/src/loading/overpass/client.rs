use std::time::Duration;

use log::{debug, info, warn};

use super::cache::ResponseCache;
use super::query::{PERIPHERY_BUFFER_M, bbox_from_point, build_query};
use crate::loading::osm::OverpassResponse;
use crate::{Error, NetworkConfig, OverpassSettings};

/// Runs an Overpass query and returns the raw response body.
///
/// A cached body is returned without touching the network. Only successful
/// responses are written to the cache.
///
/// # Errors
///
/// Returns [`Error::NetworkError`] on connection failures and non-success
/// HTTP statuses.
pub fn fetch_query(
    settings: &OverpassSettings,
    cache: Option<&ResponseCache>,
    query: &str,
) -> Result<String, Error> {
    let key = ResponseCache::key(&settings.endpoint, query);
    if let Some(body) = cache.and_then(|cache| cache.get(&key)) {
        info!("Using cached Overpass response {key}");
        return Ok(body);
    }

    debug!("Overpass query: {query}");
    info!("Downloading street network from {}", settings.endpoint);

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(settings.timeout_secs + 30))
        .user_agent(settings.user_agent.as_str())
        .build()?;

    let response = client
        .post(&settings.endpoint)
        .form(&[("data", query)])
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::NetworkError(format!(
            "Overpass API returned status {status}"
        )));
    }

    let body = response.text()?;
    info!("Received {} bytes from Overpass API", body.len());

    if let Some(cache) = cache {
        cache.put(&key, &body)?;
    }
    Ok(body)
}

/// Downloads the OSM ways and nodes of the configured network type within
/// the bounding box around the configured point, widened by
/// [`PERIPHERY_BUFFER_M`].
///
/// # Errors
///
/// Fails on network errors or if the response is not valid Overpass JSON.
pub fn download_osm(config: &NetworkConfig) -> Result<OverpassResponse, Error> {
    let bbox = bbox_from_point(config.center, config.dist + PERIPHERY_BUFFER_M);
    let query = build_query(&bbox, config.network_type, config.overpass.timeout_secs);
    let cache = ResponseCache::from_settings(&config.cache);

    let body = fetch_query(&config.overpass, cache.as_ref(), &query)?;
    let response: OverpassResponse = serde_json::from_str(&body)?;

    if let Some(remark) = &response.remark {
        warn!("Overpass remark: {remark}");
    }
    info!("Downloaded {} OSM elements", response.elements.len());
    Ok(response)
}
