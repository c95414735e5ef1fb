//! derive.rs — pure derivations over scenario state
//!
//! Everything here is a deterministic function of its inputs:
//! - `buffer_collection`: the 500 m planar buffer applied to every
//!   environmental layer when its base collection is replaced
//! - `partition_climate`: splits the combined climate response into the
//!   waterlevels / bathymetry / velocities layers by property key
//! - `expand_fleet`: materializes one map feature per ship unit
//!
//! Buffering works in a local equirectangular metric frame around each
//! feature: project to meters, union circle/capsule pieces with the given
//! radius, project back to WGS84 lon/lat. Geometries that cannot be
//! buffered (missing or malformed) are passed through untouched.

use geo::{BooleanOps, Centroid, Coord, CoordsIter, LineString, MapCoords, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::Value;
use tracing::debug;

use dtw_types::ShipSpec;

/// Buffer radius applied to all environmental layers.
pub const BUFFER_RADIUS_M: f64 = 500.0;

/// Property keys distinguishing the combined climate response features.
pub const WATERLEVEL_KEY: &str = "waterlevel";
pub const BATHYMETRY_KEY: &str = "nap_p50";
pub const VELOCITY_KEY: &str = "velocity";

const M_PER_DEG_LAT: f64 = 110_574.0;
const M_PER_DEG_LON_EQUATOR: f64 = 111_320.0;
const CIRCLE_SEGMENTS: usize = 32;

// ── Layer buffering ───────────────────────────────────────────────────────────

pub fn buffer_collection(fc: &FeatureCollection, radius_m: f64) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: fc
            .features
            .iter()
            .map(|f| buffer_feature(f, radius_m))
            .collect(),
        foreign_members: None,
    }
}

pub fn buffer_feature(feature: &Feature, radius_m: f64) -> Feature {
    match feature.geometry.as_ref().and_then(|g| buffer_geometry(g, radius_m)) {
        Some(geometry) => Feature {
            bbox: None,
            geometry: Some(geometry),
            id: feature.id.clone(),
            properties: feature.properties.clone(),
            foreign_members: feature.foreign_members.clone(),
        },
        None => feature.clone(),
    }
}

fn buffer_geometry(geometry: &Geometry, radius_m: f64) -> Option<Geometry> {
    let geom = match geo::Geometry::<f64>::try_from(geometry.value.clone()) {
        Ok(g) => g,
        Err(e) => {
            debug!("skipping unbufferable geometry: {e}");
            return None;
        }
    };
    let frame = LocalFrame::around(&geom);
    let local = geom.map_coords(|c| frame.to_local(c));

    let mut pieces = Vec::new();
    collect_pieces(&local, radius_m, &mut pieces);
    let unioned = union_all(pieces)?;

    let wgs84 = unioned.map_coords(|c| frame.to_wgs84(c));
    Some(Geometry::new(geojson::Value::from(&wgs84)))
}

/// Equirectangular projection anchored at a geometry's centroid. Good to
/// well under a meter of distortion at the 500 m scales used here.
struct LocalFrame {
    lon0: f64,
    lat0: f64,
    m_per_deg_lon: f64,
}

impl LocalFrame {
    fn around(geom: &geo::Geometry<f64>) -> Self {
        let anchor = geom
            .centroid()
            .map(|p| p.0)
            .or_else(|| geom.coords_iter().next())
            .unwrap_or(Coord { x: 0.0, y: 0.0 });
        let m_per_deg_lon =
            M_PER_DEG_LON_EQUATOR * anchor.y.to_radians().cos().abs().max(0.01);
        Self {
            lon0: anchor.x,
            lat0: anchor.y,
            m_per_deg_lon,
        }
    }

    fn to_local(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x - self.lon0) * self.m_per_deg_lon,
            y: (c.y - self.lat0) * M_PER_DEG_LAT,
        }
    }

    fn to_wgs84(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.lon0 + c.x / self.m_per_deg_lon,
            y: self.lat0 + c.y / M_PER_DEG_LAT,
        }
    }
}

fn collect_pieces(geom: &geo::Geometry<f64>, r: f64, out: &mut Vec<Polygon<f64>>) {
    match geom {
        geo::Geometry::Point(p) => out.push(circle(p.0, r)),
        geo::Geometry::MultiPoint(mp) => {
            for p in &mp.0 {
                out.push(circle(p.0, r));
            }
        }
        geo::Geometry::Line(line) => {
            out.push(circle(line.start, r));
            out.push(circle(line.end, r));
            if let Some(rect) = segment_rect(line.start, line.end, r) {
                out.push(rect);
            }
        }
        geo::Geometry::LineString(ls) => line_pieces(ls, r, out),
        geo::Geometry::MultiLineString(mls) => {
            for ls in &mls.0 {
                line_pieces(ls, r, out);
            }
        }
        geo::Geometry::Polygon(poly) => polygon_pieces(poly, r, out),
        geo::Geometry::MultiPolygon(mp) => {
            for poly in &mp.0 {
                polygon_pieces(poly, r, out);
            }
        }
        geo::Geometry::Rect(rect) => polygon_pieces(&rect.to_polygon(), r, out),
        geo::Geometry::Triangle(tri) => polygon_pieces(&tri.to_polygon(), r, out),
        geo::Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                collect_pieces(g, r, out);
            }
        }
    }
}

fn line_pieces(ls: &LineString<f64>, r: f64, out: &mut Vec<Polygon<f64>>) {
    for c in &ls.0 {
        out.push(circle(*c, r));
    }
    for seg in ls.lines() {
        if let Some(rect) = segment_rect(seg.start, seg.end, r) {
            out.push(rect);
        }
    }
}

fn polygon_pieces(poly: &Polygon<f64>, r: f64, out: &mut Vec<Polygon<f64>>) {
    out.push(poly.clone());
    line_pieces(poly.exterior(), r, out);
    for ring in poly.interiors() {
        line_pieces(ring, r, out);
    }
}

fn circle(center: Coord<f64>, r: f64) -> Polygon<f64> {
    let ring: Vec<Coord<f64>> = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            Coord {
                x: center.x + r * angle.cos(),
                y: center.y + r * angle.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

fn segment_rect(a: Coord<f64>, b: Coord<f64>, r: f64) -> Option<Polygon<f64>> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return None;
    }
    let nx = -dy / len * r;
    let ny = dx / len * r;
    Some(Polygon::new(
        LineString::from(vec![
            Coord { x: a.x + nx, y: a.y + ny },
            Coord { x: b.x + nx, y: b.y + ny },
            Coord { x: b.x - nx, y: b.y - ny },
            Coord { x: a.x - nx, y: a.y - ny },
        ]),
        vec![],
    ))
}

fn union_all(pieces: Vec<Polygon<f64>>) -> Option<MultiPolygon<f64>> {
    let mut iter = pieces.into_iter();
    let first = iter.next()?;
    let mut acc = MultiPolygon::new(vec![first]);
    for piece in iter {
        acc = acc.union(&MultiPolygon::new(vec![piece]));
    }
    Some(acc)
}

// ── Climate partition ─────────────────────────────────────────────────────────

/// The combined climate response split into the three environmental base
/// layers. A feature carrying several distinguishing keys lands in several
/// layers; one carrying none is dropped.
pub struct ClimatePartition {
    pub waterlevels: FeatureCollection,
    pub bathymetry: FeatureCollection,
    pub velocities: FeatureCollection,
}

pub fn partition_climate(fc: &FeatureCollection) -> ClimatePartition {
    ClimatePartition {
        waterlevels: features_with_key(fc, WATERLEVEL_KEY),
        bathymetry: features_with_key(fc, BATHYMETRY_KEY),
        velocities: features_with_key(fc, VELOCITY_KEY),
    }
}

fn features_with_key(fc: &FeatureCollection, key: &str) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: fc
            .features
            .iter()
            .filter(|f| f.property(key).is_some())
            .cloned()
            .collect(),
        foreign_members: None,
    }
}

// ── Fleet expansion ───────────────────────────────────────────────────────────

/// Materialize the fleet as individual map features: `count` copies per
/// ship class, attached to the first route feature's geometry (or left
/// without geometry while no route is known).
pub fn expand_fleet(fleet: &[ShipSpec], route: &FeatureCollection) -> Vec<Feature> {
    let geometry = route.features.first().and_then(|f| f.geometry.clone());

    let mut ships = Vec::new();
    for spec in fleet {
        let base_props = match serde_json::to_value(&spec.properties) {
            Ok(Value::Object(obj)) => obj,
            _ => JsonObject::new(),
        };
        for i in 0..spec.count {
            let mut properties = base_props.clone();
            properties.insert("name".to_string(), Value::String(spec.name.clone()));
            ships.push(Feature {
                bbox: None,
                geometry: geometry.clone(),
                id: Some(geojson::feature::Id::String(format!(
                    "{}-{}",
                    spec.name,
                    i + 1
                ))),
                properties: Some(properties),
                foreign_members: None,
            });
        }
    }
    ships
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtw_types::ShipProperties;
    use geo::Contains;
    use serde_json::json;

    fn point_feature(lon: f64, lat: f64, props: Value) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(vec![lon, lat]))),
            id: None,
            properties: match props {
                Value::Object(obj) => Some(obj),
                _ => None,
            },
            foreign_members: None,
        }
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    #[test]
    fn buffered_point_becomes_polygon_containing_the_point() {
        let fc = collection(vec![point_feature(5.12, 51.9, json!({ "waterlevel": 8.1 }))]);
        let buffered = buffer_collection(&fc, BUFFER_RADIUS_M);
        assert_eq!(buffered.features.len(), 1);

        let geom = buffered.features[0].geometry.as_ref().unwrap();
        let shape = geo::Geometry::<f64>::try_from(geom.value.clone()).unwrap();
        let mp = match shape {
            geo::Geometry::MultiPolygon(mp) => mp,
            other => panic!("expected MultiPolygon, got {other:?}"),
        };
        assert!(mp.contains(&geo::Point::new(5.12, 51.9)));
        // properties ride along untouched
        assert_eq!(
            buffered.features[0].property("waterlevel"),
            Some(&json!(8.1))
        );
    }

    #[test]
    fn buffering_is_deterministic_for_identical_input() {
        let fc = collection(vec![point_feature(4.5, 51.95, json!({ "n": "a" }))]);
        let a = buffer_collection(&fc, BUFFER_RADIUS_M);
        let b = buffer_collection(&fc, BUFFER_RADIUS_M);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn linestring_buffer_covers_both_ends() {
        let line = Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::LineString(vec![
                vec![4.0, 52.0],
                vec![4.01, 52.0],
            ]))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        let buffered = buffer_feature(&line, BUFFER_RADIUS_M);
        let shape =
            geo::Geometry::<f64>::try_from(buffered.geometry.unwrap().value).unwrap();
        let mp = match shape {
            geo::Geometry::MultiPolygon(mp) => mp,
            other => panic!("expected MultiPolygon, got {other:?}"),
        };
        assert!(mp.contains(&geo::Point::new(4.0, 52.0)));
        assert!(mp.contains(&geo::Point::new(4.01, 52.0)));
        assert!(mp.contains(&geo::Point::new(4.005, 52.0)));
    }

    #[test]
    fn feature_without_geometry_passes_through() {
        let bare = Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: Some(json!({ "velocity": 0.4 }).as_object().unwrap().clone()),
            foreign_members: None,
        };
        let out = buffer_feature(&bare, BUFFER_RADIUS_M);
        assert_eq!(out, bare);
    }

    #[test]
    fn partition_routes_features_by_key_presence() {
        let fc = collection(vec![
            point_feature(4.0, 52.0, json!({ "waterlevel": 8.0 })),
            point_feature(4.1, 52.0, json!({ "nap_p50": -2.5 })),
            point_feature(4.2, 52.0, json!({ "velocity": 0.9 })),
            point_feature(4.3, 52.0, json!({ "waterlevel": 7.5, "velocity": 1.1 })),
            point_feature(4.4, 52.0, json!({ "unrelated": true })),
        ]);
        let parts = partition_climate(&fc);
        assert_eq!(parts.waterlevels.features.len(), 2);
        assert_eq!(parts.bathymetry.features.len(), 1);
        assert_eq!(parts.velocities.features.len(), 2);
        // the feature with neither key is in no layer
        for layer in [&parts.waterlevels, &parts.bathymetry, &parts.velocities] {
            assert!(layer
                .features
                .iter()
                .all(|f| f.property("unrelated").is_none()));
        }
    }

    #[test]
    fn expand_fleet_counts_and_geometry() {
        let fleet = vec![
            ShipSpec {
                name: "M8".into(),
                count: 3,
                properties: ShipProperties {
                    capacity: Some(2158.0),
                    ..Default::default()
                },
            },
            ShipSpec {
                name: "M6".into(),
                count: 0,
                properties: ShipProperties::default(),
            },
        ];
        let route = collection(vec![point_feature(4.0, 52.0, json!({}))]);

        let ships = expand_fleet(&fleet, &route);
        assert_eq!(ships.len(), 3);
        for ship in &ships {
            assert_eq!(ship.geometry, route.features[0].geometry);
            assert_eq!(ship.property("name"), Some(&json!("M8")));
            assert_eq!(ship.property("capacity"), Some(&json!(2158.0)));
        }

        // no route yet: ships exist but carry no geometry
        let adrift = expand_fleet(&fleet, &collection(vec![]));
        assert_eq!(adrift.len(), 3);
        assert!(adrift.iter().all(|s| s.geometry.is_none()));
    }
}
