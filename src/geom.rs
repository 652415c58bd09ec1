//! Geographic coordinate math.
//!
//! The loader places assets in a geocentric orthogonal coordinate system
//! (GOCS). Positions arrive as cartographic triples (longitude, latitude,
//! height) in the spherical coordinate system (ISCS) and are converted to a
//! local-to-geocentric frame by [`iscs_to_gocs`].

use glam::{DMat4, DVec3, DVec4};

/// Earth radius of the spherical model, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// A geographic position: longitude and latitude in degrees, height in
/// meters above the sphere.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    #[must_use]
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    /// The geocentric position of this point.
    #[must_use]
    pub fn to_gocs(&self) -> DVec3 {
        let lambda = self.longitude.to_radians();
        let phi = self.latitude.to_radians();
        let r = EARTH_RADIUS + self.height;
        DVec3::new(
            r * phi.cos() * lambda.cos(),
            r * phi.cos() * lambda.sin(),
            r * phi.sin(),
        )
    }
}

/// Builds the local-frame-to-geocentric matrix for a cartographic origin.
///
/// The returned matrix maps a local east/north/up frame at the given point
/// into geocentric coordinates: column 0 is east, column 1 is north,
/// column 2 is up, column 3 is the geocentric position of the origin.
#[must_use]
pub fn iscs_to_gocs(longitude: f64, latitude: f64, height: f64) -> DMat4 {
    let lambda = longitude.to_radians();
    let phi = latitude.to_radians();

    let sin_lambda = lambda.sin();
    let cos_lambda = lambda.cos();
    let sin_phi = phi.sin();
    let cos_phi = phi.cos();

    let east = DVec3::new(-sin_lambda, cos_lambda, 0.0);
    let north = DVec3::new(-sin_phi * cos_lambda, -sin_phi * sin_lambda, cos_phi);
    let up = DVec3::new(cos_phi * cos_lambda, cos_phi * sin_lambda, sin_phi);
    let position = (EARTH_RADIUS + height) * up;

    DMat4::from_cols(
        DVec4::from((east, 0.0)),
        DVec4::from((north, 0.0)),
        DVec4::from((up, 0.0)),
        DVec4::from((position, 1.0)),
    )
}
