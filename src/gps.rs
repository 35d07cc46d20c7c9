//! Synthetic GPS tracks for indoor runs.
//!
//! Treadmill runs have no real position, but export targets want a track.
//! Cumulative belt distance is mapped onto one of several closed patterns
//! around a configured start coordinate.

use serde::{Deserialize, Serialize};

/// Approximate meters per degree of latitude.
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

impl GpsCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GpsCoordinate {
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Great-circle destination point at `distance` meters along `bearing` degrees.
    pub fn destination(&self, distance: f64, bearing: f64) -> GpsCoordinate {
        let bearing_rad = bearing.to_radians();
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let angular = distance / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing_rad.cos())
            .asin();
        let lon2 = lon1
            + (bearing_rad.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        GpsCoordinate {
            latitude: lat2.to_degrees(),
            longitude: lon2.to_degrees(),
            altitude: self.altitude,
        }
    }

    /// Offset by planar meters east (x) and north (y). Good enough at
    /// track scale, matching the pattern math below.
    fn offset_meters(&self, x: f64, y: f64) -> GpsCoordinate {
        let lat_offset = y / METERS_PER_DEGREE_LAT;
        let lon_offset = x / (METERS_PER_DEGREE_LAT * self.latitude.to_radians().cos());
        GpsCoordinate {
            latitude: self.latitude + lat_offset,
            longitude: self.longitude + lon_offset,
            altitude: self.altitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPattern {
    StraightLine,
    Loop,
    Figure8,
    Oval,
    Zigzag,
    Swirl,
}

impl TrackPattern {
    pub fn display_name(self) -> &'static str {
        match self {
            TrackPattern::StraightLine => "Straight Line",
            TrackPattern::Loop => "Loop",
            TrackPattern::Figure8 => "Figure 8",
            TrackPattern::Oval => "Oval",
            TrackPattern::Zigzag => "Zigzag",
            TrackPattern::Swirl => "Swirl",
        }
    }
}

/// Maps cumulative run distance onto pattern coordinates.
pub struct TrackGenerator {
    start: GpsCoordinate,
    pattern: TrackPattern,
    scale: f64,
}

impl TrackGenerator {
    pub fn new(start: GpsCoordinate, pattern: TrackPattern, scale: f64) -> Self {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        TrackGenerator {
            start,
            pattern,
            scale,
        }
    }

    /// Coordinate after `distance_km` of belt travel.
    pub fn coordinate_at(&self, distance_km: f64) -> GpsCoordinate {
        let meters = distance_km.max(0.0) * 1000.0;
        match self.pattern {
            TrackPattern::StraightLine => self.straight_line(meters),
            TrackPattern::Loop => self.loop_track(meters),
            TrackPattern::Figure8 => self.figure8(meters),
            TrackPattern::Oval => self.oval(meters),
            TrackPattern::Zigzag => self.zigzag(meters),
            TrackPattern::Swirl => self.swirl(meters),
        }
    }

    /// 200 m out and back, heading north.
    fn straight_line(&self, meters: f64) -> GpsCoordinate {
        let leg = 200.0 * self.scale;
        let progress = meters % (leg * 2.0);
        let distance = if progress <= leg {
            progress
        } else {
            leg - (progress - leg)
        };
        self.start.destination(distance, 0.0)
    }

    fn loop_track(&self, meters: f64) -> GpsCoordinate {
        let radius = 50.0 * self.scale;
        let circumference = 2.0 * std::f64::consts::PI * radius;
        let angle = (meters % circumference) / radius;
        self.start
            .offset_meters(radius * angle.cos(), radius * angle.sin())
    }

    /// Two stacked loops traced alternately.
    fn figure8(&self, meters: f64) -> GpsCoordinate {
        let radius = 100.0 * self.scale;
        let circumference = 2.0 * std::f64::consts::PI * radius;
        let progress = meters % (circumference * 2.0);

        let (angle, center_offset) = if progress <= circumference {
            (progress / radius, -radius / 2.0)
        } else {
            ((progress - circumference) / radius, radius / 2.0)
        };

        self.start
            .offset_meters(radius * angle.cos(), radius * angle.sin() + center_offset)
    }

    fn oval(&self, meters: f64) -> GpsCoordinate {
        let major = 100.0 * self.scale;
        let minor = 60.0 * self.scale;
        // Ramanujan's ellipse perimeter approximation
        let circumference = std::f64::consts::PI
            * (3.0 * (major + minor) - ((3.0 * major + minor) * (major + 3.0 * minor)).sqrt());
        let angle = (meters % circumference) / circumference * 2.0 * std::f64::consts::PI;
        self.start
            .offset_meters((major / 2.0) * angle.cos(), (minor / 2.0) * angle.sin())
    }

    fn zigzag(&self, meters: f64) -> GpsCoordinate {
        let segment = 50.0 * self.scale;
        let amplitude = 30.0 * self.scale;
        let pattern_len = segment * 6.0;

        let progress = meters % pattern_len;
        let index = (progress / segment) as usize;
        let y = progress % segment;

        let x = match index % 4 {
            1 => amplitude,
            3 => -amplitude,
            _ => 0.0,
        };
        self.start.offset_meters(x, y)
    }

    /// Spiral outward, restarting once the pattern distance is exhausted.
    fn swirl(&self, meters: f64) -> GpsCoordinate {
        let max_radius = 75.0 * self.scale;
        let spiral_len = 500.0 * self.scale;

        let progress = meters % spiral_len;
        let radius = max_radius * (progress / spiral_len);
        let angle = progress / 10.0;

        self.start
            .offset_meters(radius * angle.cos(), radius * angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> GpsCoordinate {
        GpsCoordinate::new(37.7749, -122.4194)
    }

    fn distance_m(a: &GpsCoordinate, b: &GpsCoordinate) -> f64 {
        let dy = (b.latitude - a.latitude) * METERS_PER_DEGREE_LAT;
        let dx = (b.longitude - a.longitude)
            * METERS_PER_DEGREE_LAT
            * a.latitude.to_radians().cos();
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_destination_north_moves_latitude_only() {
        let dest = start().destination(1000.0, 0.0);
        assert!(dest.latitude > start().latitude);
        assert!((dest.longitude - start().longitude).abs() < 1e-9);
        assert!((distance_m(&start(), &dest) - 1000.0).abs() < 2.0);
    }

    #[test]
    fn test_straight_line_comes_back() {
        let gen = TrackGenerator::new(start(), TrackPattern::StraightLine, 1.0);
        let out = gen.coordinate_at(0.2); // 200 m: far end
        let back = gen.coordinate_at(0.4); // 400 m: back at start
        assert!(distance_m(&start(), &out) > 190.0);
        assert!(distance_m(&start(), &back) < 2.0);
    }

    #[test]
    fn test_loop_stays_on_circle() {
        let gen = TrackGenerator::new(start(), TrackPattern::Loop, 1.0);
        let center = start();
        for km in [0.0, 0.05, 0.1, 0.25, 0.31] {
            let p = gen.coordinate_at(km);
            let r = distance_m(&center, &p);
            assert!((r - 50.0).abs() < 1.0, "radius {r} at {km} km");
        }
    }

    #[test]
    fn test_zigzag_amplitude_bounded() {
        let gen = TrackGenerator::new(start(), TrackPattern::Zigzag, 1.0);
        for i in 0..100 {
            let p = gen.coordinate_at(i as f64 * 0.01);
            let dx = (p.longitude - start().longitude).abs()
                * METERS_PER_DEGREE_LAT
                * start().latitude.to_radians().cos();
            assert!(dx <= 31.0);
        }
    }

    #[test]
    fn test_scale_shrinks_pattern() {
        let full = TrackGenerator::new(start(), TrackPattern::Loop, 1.0);
        let half = TrackGenerator::new(start(), TrackPattern::Loop, 0.5);
        let r_full = distance_m(&start(), &full.coordinate_at(0.0));
        let r_half = distance_m(&start(), &half.coordinate_at(0.0));
        assert!((r_full - 2.0 * r_half).abs() < 0.5);
    }

    #[test]
    fn test_zero_scale_falls_back_to_one() {
        let gen = TrackGenerator::new(start(), TrackPattern::Loop, 0.0);
        let r = distance_m(&start(), &gen.coordinate_at(0.0));
        assert!((r - 50.0).abs() < 1.0);
    }
}
