//! Spherical ("web") Mercator on the WGS 84 semi-major axis.

use super::{CoordinateTransform, Point3};
use crate::error::{Result, StoreError};
use shapestore_types::crs::Ellipsoid;
use std::f64::consts::FRAC_PI_4;

/// Latitude at which the projected square ends, `atan(sinh(π))` in degrees.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Geographic degrees to web Mercator meters and back.
///
/// Latitudes beyond [`MAX_LATITUDE`] are clamped to the edge of the
/// projected square. Heights pass through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WebMercator;

impl WebMercator {
    fn radius() -> f64 {
        Ellipsoid::WEB_SPHERE.semi_major_axis()
    }

    pub fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(StoreError::Transform(format!(
                "non-finite geographic coordinate ({lon}, {lat})"
            )));
        }
        let r = Self::radius();
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        Ok((r * lon.to_radians(), r * (FRAC_PI_4 + lat / 2.0).tan().ln()))
    }

    pub fn unproject(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(StoreError::Transform(format!(
                "non-finite projected coordinate ({x}, {y})"
            )));
        }
        let r = Self::radius();
        let lon = (x / r).to_degrees();
        let lat = (2.0 * (y / r).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
        Ok((lon, lat))
    }
}

impl CoordinateTransform for WebMercator {
    fn forward(&self, points: &mut [Point3]) -> Result<()> {
        for p in points.iter_mut() {
            let (x, y) = self.project(p[0], p[1])?;
            p[0] = x;
            p[1] = y;
        }
        Ok(())
    }

    fn inverse(&self, points: &mut [Point3]) -> Result<()> {
        for p in points.iter_mut() {
            let (lon, lat) = self.unproject(p[0], p[1])?;
            p[0] = lon;
            p[1] = lat;
        }
        Ok(())
    }
}
