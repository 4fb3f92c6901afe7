use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An acquisition instant exactly as the catalog reported it.
pub type DiscoveredTimestamp = String;

/// Axis-aligned lon/lat rectangle in degrees.
///
/// The wire representation is always `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = ConfigError;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        Self::new(raw.min_lon, raw.min_lat, raw.max_lon, raw.max_lat)
    }
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, ConfigError> {
        if ![min_lon, min_lat, max_lon, max_lat]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigError::NonFinite);
        }
        if min_lon > max_lon {
            return Err(ConfigError::Inverted {
                axis: "lon",
                min: min_lon,
                max: max_lon,
            });
        }
        if min_lat > max_lat {
            return Err(ConfigError::Inverted {
                axis: "lat",
                min: min_lat,
                max: max_lat,
            });
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Longitude before latitude, min corner before max corner.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// One row of the metadata store.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub collection_id: String,
    pub location_name: String,
    pub acquisition_timestamp: DateTime<Utc>,
    pub bbox: BoundingBox,
    pub storage_key: String,
}
