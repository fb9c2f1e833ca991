use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_MI: f64 = 3963.2;
pub const EARTH_RADIUS_KM: f64 = 6378.1;
pub const EARTH_RADIUS_M: f64 = EARTH_RADIUS_KM * 1000.0;

const METERS_TO_MILES: f64 = 0.000621371;
const METERS_TO_KILOMETERS: f64 = 0.001;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Please provide latitude and longitude in the format lat,lng.")]
    InvalidCoordinates,
    #[error("Unknown distance unit '{0}', expected 'mi' or 'km'")]
    UnknownUnit(String),
    #[error("Invalid distance '{0}'")]
    InvalidDistance(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => EARTH_RADIUS_MI,
            DistanceUnit::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Factor turning a distance in metres into this unit.
    pub fn meters_multiplier(self) -> f64 {
        match self {
            DistanceUnit::Miles => METERS_TO_MILES,
            DistanceUnit::Kilometers => METERS_TO_KILOMETERS,
        }
    }

    /// Angular radius on the sphere covering `distance` expressed in this unit.
    pub fn radius_in_radians(self, distance: f64) -> f64 {
        distance / self.earth_radius()
    }
}

impl FromStr for DistanceUnit {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Kilometers),
            other => Err(GeoError::UnknownUnit(other.to_string())),
        }
    }
}

pub fn parse_distance(raw: &str) -> Result<f64, GeoError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| GeoError::InvalidDistance(raw.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return Err(GeoError::InvalidCoordinates);
        }
        Ok(Self { lat, lng })
    }
}

/// Parses the `lat,lng` form used in report URLs.
impl FromStr for LatLng {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s.split_once(',').ok_or(GeoError::InvalidCoordinates)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| GeoError::InvalidCoordinates)?;
        let lng = lng.trim().parse::<f64>().map_err(|_| GeoError::InvalidCoordinates)?;
        LatLng::new(lat, lng)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoType {
    #[default]
    Point,
}

/// GeoJSON point with the descriptive extras tours attach to their stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: GeoType,
    /// `[longitude, latitude]`, GeoJSON order.
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

impl GeoPoint {
    pub fn lat_lng(&self) -> Result<LatLng, GeoError> {
        LatLng::new(self.coordinates[1], self.coordinates[0])
    }
}
