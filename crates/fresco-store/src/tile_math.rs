//! Footprint computation: which tiles does a stroke's inked area touch.

use crate::constants::{MAX_BRUSH_SIZE, MIN_BRUSH_SIZE, TILE_SIZE};
use crate::models::{StrokePoint, TileCoord};

/// Compute the inclusive set of tiles covered by a stroke's bounding box,
/// inflated by twice the brush width to account for brush radius and
/// line-join overshoot.
///
/// Points are expected to be finite (the codec drops non-finite ones before
/// they get here); any stragglers are ignored. An empty point list yields an
/// empty footprint.
pub fn stroke_footprint(points: &[StrokePoint], size: f64) -> Vec<TileCoord> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for pt in points {
        if !pt.x.is_finite() || !pt.y.is_finite() {
            continue;
        }
        min_x = min_x.min(pt.x);
        min_y = min_y.min(pt.y);
        max_x = max_x.max(pt.x);
        max_y = max_y.max(pt.y);
    }

    if !min_x.is_finite() {
        return Vec::new();
    }

    let pad = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE) * 2.0;
    let s = TILE_SIZE as f64;

    // The -1 on the max side excludes tiles the inflated box only touches
    // on its exclusive edge.
    let tx0 = ((min_x - pad) / s).floor() as i64;
    let tx1 = ((max_x + pad - 1.0) / s).floor() as i64;
    let ty0 = ((min_y - pad) / s).floor() as i64;
    let ty1 = ((max_y + pad - 1.0) / s).floor() as i64;

    let mut tiles = Vec::with_capacity(((tx1 - tx0 + 1) * (ty1 - ty0 + 1)) as usize);
    for ty in ty0..=ty1 {
        for tx in tx0..=tx1 {
            tiles.push(TileCoord { tx, ty });
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> StrokePoint {
        StrokePoint { x, y, p: 0.0 }
    }

    #[test]
    fn empty_points_empty_footprint() {
        assert!(stroke_footprint(&[], 12.0).is_empty());
    }

    #[test]
    fn non_finite_points_ignored() {
        let pts = [pt(f64::NAN, 5.0), pt(5.0, f64::INFINITY)];
        assert!(stroke_footprint(&pts, 12.0).is_empty());
    }

    #[test]
    fn single_point_center_of_tile() {
        let tiles = stroke_footprint(&[pt(512.0, 512.0)], 6.0);
        assert_eq!(tiles, vec![TileCoord { tx: 0, ty: 0 }]);
    }

    #[test]
    fn single_point_near_edge_spills_over() {
        // pad = 2 * 12 = 24; 1020 + 24 reaches into tile 1
        let tiles = stroke_footprint(&[pt(1020.0, 512.0)], 12.0);
        assert_eq!(
            tiles,
            vec![TileCoord { tx: 0, ty: 0 }, TileCoord { tx: 1, ty: 0 }]
        );
    }

    #[test]
    fn cross_tile_horizontal_stroke() {
        // size 6 -> pad 12; bbox [1020, 1030] inflated to [1008, 1042]
        let tiles = stroke_footprint(&[pt(1020.0, 50.0), pt(1030.0, 50.0)], 6.0);
        assert_eq!(
            tiles,
            vec![TileCoord { tx: 0, ty: 0 }, TileCoord { tx: 1, ty: 0 }]
        );
    }

    #[test]
    fn negative_coordinates() {
        let tiles = stroke_footprint(&[pt(-10.0, -10.0)], 1.0);
        assert_eq!(tiles, vec![TileCoord { tx: -1, ty: -1 }]);
    }

    #[test]
    fn exclusive_edge_not_included() {
        // Inflated box max lands exactly on a tile boundary: with the -1 the
        // boundary tile itself is excluded.
        // point at x = 1000, pad = 24 -> max edge 1024, tile 1 starts at 1024
        let tiles = stroke_footprint(&[pt(1000.0, 512.0)], 12.0);
        assert_eq!(tiles, vec![TileCoord { tx: 0, ty: 0 }]);
    }

    #[test]
    fn oversized_brush_clamped() {
        // size 10_000 clamps to 128 -> pad 256
        let tiles = stroke_footprint(&[pt(512.0, 512.0)], 10_000.0);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0], TileCoord { tx: 0, ty: 0 });
    }

    #[test]
    fn large_stroke_rectangular_footprint() {
        let tiles = stroke_footprint(&[pt(0.0, 0.0), pt(2500.0, 1100.0)], 1.0);
        // x spans tiles -1..=2, y spans -1..=1
        assert_eq!(tiles.len(), 4 * 3);
        assert!(tiles.contains(&TileCoord { tx: -1, ty: -1 }));
        assert!(tiles.contains(&TileCoord { tx: 2, ty: 1 }));
    }
}
