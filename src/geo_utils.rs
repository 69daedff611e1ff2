//! Geographic utilities: distances, lengths, bounds and elevation statistics.
//!
//! All distances are in meters unless the function name says otherwise.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::{Bounds, TrailPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (spherical approximation).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in meters.
pub fn haversine_distance(p1: &TrailPoint, p2: &TrailPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Distance between two points including the elevation difference.
///
/// Points without elevation are treated as level with each other.
pub fn distance_3d(p1: &TrailPoint, p2: &TrailPoint) -> f64 {
    let horizontal = haversine_distance(p1, p2);
    let vertical = match (p1.elevation, p2.elevation) {
        (Some(e1), Some(e2)) => (e2 - e1).abs(),
        _ => 0.0,
    };
    (horizontal * horizontal + vertical * vertical).sqrt()
}

/// Total horizontal length of a polyline in meters.
pub fn polyline_length(points: &[TrailPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Total length of a polyline in meters, accounting for elevation change.
pub fn polyline_length_3d(points: &[TrailPoint]) -> f64 {
    points.windows(2).map(|w| distance_3d(&w[0], &w[1])).sum()
}

/// Convert a distance in meters to (latitude, longitude) degree spans at `ref_lat`.
pub fn meters_to_degrees(meters: f64, ref_lat: f64) -> (f64, f64) {
    let lat_deg = meters / METERS_PER_DEGREE;
    let cos_lat = ref_lat.to_radians().cos().abs().max(0.01);
    let lng_deg = meters / (METERS_PER_DEGREE * cos_lat);
    (lat_deg, lng_deg)
}

/// Compute the bounding box of a track. Empty input yields a zero box.
pub fn compute_bounds(points: &[TrailPoint]) -> Bounds {
    Bounds::from_points(points).unwrap_or(Bounds {
        min_lat: 0.0,
        max_lat: 0.0,
        min_lng: 0.0,
        max_lng: 0.0,
    })
}

/// Elevation statistics along a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElevationStats {
    /// Sum of positive elevation deltas (m)
    pub gain: f64,
    /// Sum of negative elevation deltas as a positive number (m)
    pub loss: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

/// Compute gain/loss and min/max/avg from the points that carry elevation.
///
/// Deltas are only taken between consecutive points that both have elevation.
pub fn elevation_stats(points: &[TrailPoint]) -> ElevationStats {
    let mut stats = ElevationStats::default();

    for w in points.windows(2) {
        if let (Some(a), Some(b)) = (w[0].elevation, w[1].elevation) {
            let delta = b - a;
            if delta > 0.0 {
                stats.gain += delta;
            } else {
                stats.loss -= delta;
            }
        }
    }

    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
    if !elevations.is_empty() {
        stats.min = Some(elevations.iter().cloned().fold(f64::INFINITY, f64::min));
        stats.max = Some(elevations.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
        stats.avg = Some(elevations.iter().sum::<f64>() / elevations.len() as f64);
    }

    stats
}

/// Equirectangular projection around a reference point, in meters.
///
/// Accurate enough for segment-level geometry (projection, interpolation)
/// over the extent of a single trail network.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    ref_lat: f64,
    ref_lng: f64,
    m_per_deg_lng: f64,
}

impl LocalProjection {
    pub fn new(ref_lat: f64, ref_lng: f64) -> Self {
        let cos_lat = ref_lat.to_radians().cos().abs().max(0.01);
        Self {
            ref_lat,
            ref_lng,
            m_per_deg_lng: METERS_PER_DEGREE * cos_lat,
        }
    }

    /// Projection centred on a point.
    pub fn around(point: &TrailPoint) -> Self {
        Self::new(point.latitude, point.longitude)
    }

    /// Project a point to local (x east, y north) meters.
    pub fn to_xy(&self, point: &TrailPoint) -> (f64, f64) {
        (
            (point.longitude - self.ref_lng) * self.m_per_deg_lng,
            (point.latitude - self.ref_lat) * METERS_PER_DEGREE,
        )
    }
}

/// Earth-centred cartesian coordinates of a point on the mean sphere, in meters.
///
/// Straight-line distance in this frame is the chord, which never exceeds
/// the great-circle distance, so radius queries stay valid at any latitude.
pub fn to_ecef(point: &TrailPoint) -> [f64; 3] {
    let lat = point.latitude.to_radians();
    let lng = point.longitude.to_radians();
    [
        EARTH_RADIUS_M * lat.cos() * lng.cos(),
        EARTH_RADIUS_M * lat.cos() * lng.sin(),
        EARTH_RADIUS_M * lat.sin(),
    ]
}

/// A point in earth-centred meters with its index, for R-tree radius queries.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    pos: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.pos[0] - point[0];
        let dy = self.pos[1] - point[1];
        let dz = self.pos[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// R-tree over a fixed set of points supporting radius queries in meters.
///
/// Candidates come from a chord-distance query in earth-centred coordinates
/// and are confirmed with haversine distance.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
    points: Vec<TrailPoint>,
}

impl PointIndex {
    pub fn new(points: Vec<TrailPoint>) -> Self {
        let indexed: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint {
                idx,
                pos: to_ecef(p),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices and distances of points within `radius_m`, nearest first.
    pub fn within(&self, point: &TrailPoint, radius_m: f64) -> Vec<(usize, f64)> {
        // chord <= arc, the margin only absorbs rounding
        let search = radius_m + 0.01;
        let mut hits: Vec<(usize, f64)> = self
            .tree
            .locate_within_distance(to_ecef(point), search * search)
            .map(|p| (p.idx, haversine_distance(point, &self.points[p.idx])))
            .filter(|(_, d)| *d <= radius_m)
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }

    /// Closest point within `radius_m`.
    pub fn nearest_within(&self, point: &TrailPoint, radius_m: f64) -> Option<(usize, f64)> {
        self.within(point, radius_m).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_same_point() {
        let p = TrailPoint::new(39.99, -105.29);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_known_value() {
        // One degree of latitude is ~111.2 km
        let a = TrailPoint::new(40.0, -105.0);
        let b = TrailPoint::new(41.0, -105.0);
        assert!(approx_eq(haversine_distance(&a, &b), 111_195.0, 200.0));
    }

    #[test]
    fn test_distance_3d_adds_vertical() {
        let a = TrailPoint::with_elevation(40.0, -105.0, 1000.0);
        let b = TrailPoint::with_elevation(40.0, -105.0, 1030.0);
        assert!(approx_eq(distance_3d(&a, &b), 30.0, 1e-9));

        let flat = TrailPoint::new(40.0, -105.0);
        assert_eq!(distance_3d(&a, &flat), 0.0);
    }

    #[test]
    fn test_polyline_length_3d_not_shorter() {
        let line = vec![
            TrailPoint::with_elevation(39.9975, -105.2920, 1776.0),
            TrailPoint::with_elevation(39.9974, -105.2922, 1775.0),
            TrailPoint::with_elevation(39.9973, -105.2924, 1769.0),
        ];
        assert!(polyline_length_3d(&line) >= polyline_length(&line));
    }

    #[test]
    fn test_elevation_stats() {
        let line = vec![
            TrailPoint::with_elevation(40.0, -105.0, 100.0),
            TrailPoint::with_elevation(40.001, -105.0, 150.0),
            TrailPoint::new(40.002, -105.0),
            TrailPoint::with_elevation(40.003, -105.0, 120.0),
            TrailPoint::with_elevation(40.004, -105.0, 90.0),
        ];
        let stats = elevation_stats(&line);
        assert_eq!(stats.gain, 50.0);
        assert_eq!(stats.loss, 30.0);
        assert_eq!(stats.min, Some(90.0));
        assert_eq!(stats.max, Some(150.0));
    }

    #[test]
    fn test_elevation_stats_without_elevation() {
        let line = vec![TrailPoint::new(40.0, -105.0), TrailPoint::new(40.1, -105.0)];
        let stats = elevation_stats(&line);
        assert_eq!(stats.gain, 0.0);
        assert!(stats.min.is_none());
    }

    #[test]
    fn test_local_projection_scale() {
        let proj = LocalProjection::new(0.0, 0.0);
        let (x, y) = proj.to_xy(&TrailPoint::new(0.001, 0.001));
        assert!(approx_eq(x, 111.32, 0.01));
        assert!(approx_eq(y, 111.32, 0.01));
    }

    #[test]
    fn test_point_index_radius_query() {
        let points = vec![
            TrailPoint::new(40.0, -105.0),
            TrailPoint::new(40.00001, -105.0),
            TrailPoint::new(40.001, -105.0),
        ];
        let index = PointIndex::new(points);
        assert_eq!(index.len(), 3);

        let hits = index.within(&TrailPoint::new(40.0, -105.0), 2.0);
        let ids: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![0, 1]);

        let (nearest, dist) = index
            .nearest_within(&TrailPoint::new(40.0009, -105.0), 20.0)
            .unwrap();
        assert_eq!(nearest, 2);
        assert!(dist > 11.0 && dist < 11.2);
        assert!(index
            .nearest_within(&TrailPoint::new(40.1, -105.0), 20.0)
            .is_none());
    }

    #[test]
    fn test_point_index_wide_latitude_extent() {
        // Neighbours ~1.9 m apart east-west at 71N, indexed alongside 58N points
        let lng_step = 1.9 / (METERS_PER_DEGREE * 71.0_f64.to_radians().cos());
        let points = vec![
            TrailPoint::new(58.0, 10.0),
            TrailPoint::new(58.01, 10.0),
            TrailPoint::new(71.0, 10.0),
            TrailPoint::new(71.0, 10.0 + lng_step),
        ];
        let gap = haversine_distance(&points[2], &points[3]);
        assert!(gap > 1.8 && gap < 2.0, "gap {}", gap);

        let index = PointIndex::new(points);
        let hits = index.within(&TrailPoint::new(71.0, 10.0), 2.0);
        let ids: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(index
            .nearest_within(&TrailPoint::new(58.0, 10.0 + lng_step * 3.0), 2.0)
            .is_none());
    }

    #[test]
    fn test_ecef_chord_matches_short_arcs() {
        let a = TrailPoint::new(64.0, -20.0);
        let b = TrailPoint::new(64.0002, -20.0003);
        let (pa, pb) = (to_ecef(&a), to_ecef(&b));
        let chord = pa
            .iter()
            .zip(pb.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt();
        let arc = haversine_distance(&a, &b);
        assert!(chord <= arc + 1e-6);
        assert!(approx_eq(chord, arc, 1e-3));
    }
}
