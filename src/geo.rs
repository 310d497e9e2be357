pub type StationId = u64;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A charging station reduced to what clustering needs: its id and position in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub lat: f64,
    pub lon: f64,
}

impl Station {
    pub fn new(id: StationId, lat: f64, lon: f64) -> Self {
        Self { id, lat, lon }
    }

    /// True when latitude is in [-90, 90] and longitude in [-180, 180].
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn distance_km(&self, other: &Station) -> f64 {
        great_circle_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Great-circle distance using the spherical law of cosines.
/// Input lat/lon in degrees. Output in kilometers.
///
/// Coordinates outside their valid ranges give an unspecified result.
pub fn great_circle_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlon = (lon1 - lon2).abs();
    let cos_angle = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
    // Rounding can push identical points just past 1.0, where acos is NaN.
    let angle = cos_angle.clamp(-1.0, 1.0).acos();
    EARTH_RADIUS_KM * angle
}
