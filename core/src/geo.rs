//! Great-circle distance filtering.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::Result;
use crate::predicate::{Condition, Direction};
use crate::query::{Query, QueryScope};
use crate::value::{Attributes, Value};

/// Name of the computed distance column.
pub const DISTANCE_COLUMN: &str = "distance";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "km", alias = "kilometers")]
    Kilometers,
    #[serde(rename = "mi", alias = "miles")]
    Miles,
}

impl DistanceUnit {
    /// Mean Earth radius in this unit.
    pub const fn earth_radius(self) -> f64 {
        match self {
            Self::Kilometers => 6371.0,
            Self::Miles => 3959.0,
        }
    }
}

/// Upper bound on distance. `Unlimited` keeps every row that has coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Radius {
    #[default]
    Unlimited,
    Within(f64),
}

impl Radius {
    pub const fn max(self) -> Option<f64> {
        match self {
            Self::Unlimited => None,
            Self::Within(r) => Some(r),
        }
    }
}

impl From<Option<f64>> for Radius {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Unlimited, Self::Within)
    }
}

/// Haversine distance between two points on a sphere of `earth_radius`.
pub fn haversine(a: GeoPoint, b: GeoPoint, earth_radius: f64) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * earth_radius * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Distance from a fixed origin to the coordinates stored on each row.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceExpr {
    pub origin: GeoPoint,
    pub earth_radius: f64,
    pub latitude_column: String,
    pub longitude_column: String,
}

impl DistanceExpr {
    pub fn new(origin: GeoPoint, unit: DistanceUnit) -> Self {
        Self {
            origin,
            earth_radius: unit.earth_radius(),
            latitude_column: "latitude".to_string(),
            longitude_column: "longitude".to_string(),
        }
    }

    /// `None` when the row lacks either coordinate.
    pub fn evaluate(&self, row: &Attributes) -> Option<f64> {
        let lat = row.get(&self.latitude_column).and_then(Value::as_f64)?;
        let lng = row.get(&self.longitude_column).and_then(Value::as_f64)?;
        Some(haversine(self.origin, GeoPoint::new(lat, lng), self.earth_radius))
    }
}

/// Adds a computed `distance` column, a radius condition and optionally a
/// distance sort. Inactive until an origin is set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoDistanceFilter {
    origin: Option<GeoPoint>,
    radius: Radius,
    unit: DistanceUnit,
    sort_by_distance: bool,
    columns: Option<(String, String)>,
}

impl GeoDistanceFilter {
    pub fn new(unit: DistanceUnit) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Builds the filter from loose request values. Only activates when both
    /// coordinates are present; `sort == "distance"` turns on the sort. A
    /// negative or non-finite distance counts as no distance.
    pub fn from_params(
        latitude: Option<f64>,
        longitude: Option<f64>,
        distance: Option<f64>,
        sort: Option<&str>,
        settings: &Settings,
    ) -> Self {
        let mut filter = Self::new(settings.distance_unit)
            .radius(
                distance
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .or(settings.default_distance)
                    .into(),
            )
            .sort_by_distance(sort == Some(DISTANCE_COLUMN));
        if let (Some(lat), Some(lng)) = (latitude, longitude) {
            filter = filter.origin(GeoPoint::new(lat, lng));
        }
        filter
    }

    pub fn origin(mut self, origin: GeoPoint) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn radius(mut self, radius: Radius) -> Self {
        self.radius = radius;
        self
    }

    pub fn sort_by_distance(mut self, sort: bool) -> Self {
        self.sort_by_distance = sort;
        self
    }

    /// Reads coordinates from columns other than `latitude`/`longitude`.
    pub fn coordinate_columns(
        mut self,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        self.columns = Some((latitude.into(), longitude.into()));
        self
    }

    #[inline]
    pub const fn is_active(&self) -> bool {
        self.origin.is_some()
    }

    pub fn apply(&self, query: &mut Query) {
        let Some(origin) = self.origin else {
            return;
        };
        let mut expr = DistanceExpr::new(origin, self.unit);
        if let Some((lat, lng)) = &self.columns {
            expr.latitude_column = lat.clone();
            expr.longitude_column = lng.clone();
        }
        query.select_distance(DISTANCE_COLUMN, expr.clone());
        query.and_where(Condition::Distance {
            expr,
            max: self.radius.max(),
        });
        if self.sort_by_distance {
            query.order_by(DISTANCE_COLUMN, Direction::Asc);
        }
    }
}

impl QueryScope for GeoDistanceFilter {
    fn apply(&self, query: &mut Query) -> Result<()> {
        GeoDistanceFilter::apply(self, query);
        Ok(())
    }
}
