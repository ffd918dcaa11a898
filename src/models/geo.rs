//! Geographic location data as returned by the ip-api.com oracle.

use serde::{Deserialize, Serialize};

/// A geolocation lookup result. Field names follow the oracle's JSON shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    /// `success` or `fail`.
    #[serde(default)]
    pub status: String,
    /// Error detail when `status` is `fail`.
    #[serde(default)]
    pub message: String,
    /// Country name.
    #[serde(default)]
    pub country: String,
    /// ISO 3166-1 alpha-2 country code.
    #[serde(default, rename = "countryCode")]
    pub country_code: String,
    /// Region code.
    #[serde(default)]
    pub region: String,
    /// Region name.
    #[serde(default, rename = "regionName")]
    pub region_name: String,
    /// City name.
    #[serde(default)]
    pub city: String,
    /// Postal code.
    #[serde(default)]
    pub zip: String,
    /// Latitude.
    #[serde(default, rename = "lat")]
    pub latitude: f64,
    /// Longitude.
    #[serde(default, rename = "lon")]
    pub longitude: f64,
    /// IANA timezone.
    #[serde(default)]
    pub timezone: String,
    /// Internet service provider.
    #[serde(default)]
    pub isp: String,
    /// Organization name.
    #[serde(default)]
    pub org: String,
    /// Autonomous system number and name.
    #[serde(default, rename = "as")]
    pub asn: String,
    /// The IP the lookup resolved.
    #[serde(default)]
    pub query: String,
}

impl GeoLocation {
    /// Whether the lookup produced usable data.
    pub fn is_valid(&self) -> bool {
        self.status == "success" && !self.country.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_oracle_payload() {
        let payload = r#"{
            "status": "success",
            "country": "Germany",
            "countryCode": "DE",
            "city": "Falkenstein",
            "lat": 50.4777,
            "lon": 12.3649,
            "timezone": "Europe/Berlin",
            "as": "AS24940 Hetzner Online GmbH",
            "query": "65.108.211.187"
        }"#;
        let geo: GeoLocation = serde_json::from_str(payload).unwrap();
        assert!(geo.is_valid());
        assert_eq!(geo.country_code, "DE");
        assert_eq!(geo.asn, "AS24940 Hetzner Online GmbH");
    }

    #[test]
    fn failed_lookup_is_not_valid() {
        let geo: GeoLocation =
            serde_json::from_str(r#"{"status":"fail","message":"private range"}"#).unwrap();
        assert!(!geo.is_valid());
    }
}
