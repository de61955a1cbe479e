// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::{
    header::{HeaderName, HeaderValue, CONTENT_TYPE},
    HeaderMap, Request, Response, StatusCode,
};
use serde::Serialize;
use tracing::{debug, error};

use crate::resolver::{TimezoneResolver, NOT_PROVIDED};

const ZONE_QUERY_PARAM: &str = "zone";

static HEADER_TIMEZONE: HeaderName = HeaderName::from_static("x-timezone");
static HEADER_CONNECTING_IP: HeaderName = HeaderName::from_static("cf-connecting-ip");
static HEADER_RAY: HeaderName = HeaderName::from_static("cf-ray");
static HEADER_COUNTRY: HeaderName = HeaderName::from_static("cf-ipcountry");
static HEADER_CITY: HeaderName = HeaderName::from_static("cf-ipcity");
static HEADER_CONTINENT: HeaderName = HeaderName::from_static("cf-ipcontinent");
static HEADER_LATITUDE: HeaderName = HeaderName::from_static("cf-iplatitude");
static HEADER_LONGITUDE: HeaderName = HeaderName::from_static("cf-iplongitude");
static HEADER_POSTAL_CODE: HeaderName = HeaderName::from_static("cf-postal-code");
static HEADER_METRO_CODE: HeaderName = HeaderName::from_static("cf-metro-code");
static HEADER_REGION: HeaderName = HeaderName::from_static("cf-region");
static HEADER_REGION_CODE: HeaderName = HeaderName::from_static("cf-region-code");
static HEADER_GEO_TIMEZONE: HeaderName = HeaderName::from_static("cf-timezone");

/// Client details taken from the request: the zone to resolve plus geolocation headers.
#[derive(Debug, Default, PartialEq)]
pub struct ClientInfo {
    pub ip: String,
    pub colo: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub continent: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub postal_code: Option<String>,
    pub metro_code: Option<String>,
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub timezone: String,
}

impl ClientInfo {
    /// The zone comes from the `zone` query parameter, then the `X-Timezone` header, then the
    /// `CF-Timezone` geolocation header, and is [`NOT_PROVIDED`] otherwise.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let headers = req.headers();
        let query_zone = req.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, value)| key == ZONE_QUERY_PARAM && !value.trim().is_empty())
                .map(|(_, value)| value.trim().to_string())
        });

        let timezone = query_zone
            .or_else(|| get_header_value(headers, &HEADER_TIMEZONE))
            .or_else(|| get_header_value(headers, &HEADER_GEO_TIMEZONE))
            .unwrap_or_else(|| NOT_PROVIDED.to_string());

        Self {
            ip: get_header_value(headers, &HEADER_CONNECTING_IP)
                .unwrap_or_else(|| "not available".to_string()),
            colo: get_header_value(headers, &HEADER_RAY)
                .and_then(|ray| ray.rsplit_once('-').map(|(_, colo)| colo.to_string())),
            country: get_header_value(headers, &HEADER_COUNTRY),
            city: get_header_value(headers, &HEADER_CITY),
            continent: get_header_value(headers, &HEADER_CONTINENT),
            latitude: get_header_value(headers, &HEADER_LATITUDE),
            longitude: get_header_value(headers, &HEADER_LONGITUDE),
            postal_code: get_header_value(headers, &HEADER_POSTAL_CODE),
            metro_code: get_header_value(headers, &HEADER_METRO_CODE),
            region: get_header_value(headers, &HEADER_REGION),
            region_code: get_header_value(headers, &HEADER_REGION_CODE),
            timezone,
        }
    }
}

#[derive(Serialize)]
struct ResolveBody<'a> {
    ip: &'a str,
    #[serde(rename = "Colo", skip_serializing_if = "Option::is_none")]
    colo: Option<&'a str>,
    #[serde(rename = "Country", skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
    #[serde(rename = "City", skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(rename = "Continent", skip_serializing_if = "Option::is_none")]
    continent: Option<&'a str>,
    #[serde(rename = "Latitude", skip_serializing_if = "Option::is_none")]
    latitude: Option<&'a str>,
    #[serde(rename = "Longitude", skip_serializing_if = "Option::is_none")]
    longitude: Option<&'a str>,
    #[serde(rename = "PostalCode", skip_serializing_if = "Option::is_none")]
    postal_code: Option<&'a str>,
    #[serde(rename = "MetroCode", skip_serializing_if = "Option::is_none")]
    metro_code: Option<&'a str>,
    #[serde(rename = "Region", skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
    #[serde(rename = "RegionCode", skip_serializing_if = "Option::is_none")]
    region_code: Option<&'a str>,
    #[serde(rename = "Timezone")]
    timezone: &'a str,
    #[serde(rename = "LinuxTZ")]
    linux_tz: &'a str,
    #[serde(rename = "currentEpochTime")]
    current_epoch_time: i64,
    #[serde(rename = "TZdata_Version")]
    tzdata_version: Option<&'a str>,
    #[serde(rename = "TZdata_Build")]
    tzdata_build: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

/// Resolve the zone a request asks for and render the JSON response.
///
/// Any method and path is accepted. Only a failure to load any mapping table produces an error
/// response (500).
pub async fn handle<B>(resolver: &TimezoneResolver, req: Request<B>) -> Response<Full<Bytes>> {
    let info = ClientInfo::from_request(&req);

    let response = match resolver.resolve(&info.timezone).await {
        Ok(resolution) => {
            let body = ResolveBody {
                ip: &info.ip,
                colo: info.colo.as_deref(),
                country: info.country.as_deref(),
                city: info.city.as_deref(),
                continent: info.continent.as_deref(),
                latitude: info.latitude.as_deref(),
                longitude: info.longitude.as_deref(),
                postal_code: info.postal_code.as_deref(),
                metro_code: info.metro_code.as_deref(),
                region: info.region.as_deref(),
                region_code: info.region_code.as_deref(),
                timezone: &info.timezone,
                linux_tz: resolution.linux_tz(),
                current_epoch_time: Utc::now().timestamp(),
                tzdata_version: resolution.metadata.version(),
                tzdata_build: resolution.metadata.build(),
            };
            json_response(StatusCode::OK, &body)
        },
        Err(err) => {
            error!("Unable to fetch timezone data: {}", err);
            let body = ErrorBody {
                error: "Unable to fetch timezone data",
                message: err.to_string(),
            };
            json_response(StatusCode::INTERNAL_SERVER_ERROR, &body)
        },
    };

    debug!(
        "{} {} ({}) -> {}",
        req.method(),
        req.uri(),
        info.timezone,
        response.status()
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, json) = match simd_json::to_string_pretty(body) {
        Ok(json) => (status, json),
        Err(err) => {
            error!("Failed to serialize response: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"Internal error","message":"Failed to serialize response"}"#.to_string(),
            )
        },
    };

    let mut response = Response::new(Full::from(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn get_header_value(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .map(|h| String::from_utf8_lossy(h.as_bytes()).trim().to_string())
        .filter(|v| !v.is_empty())
}
