// ==========================================
// 物料盘点导入系统 - 几何工具
// ==========================================
// 职责: 点在多边形内判定（射线法 + 边界检测）、多面质心
// 坐标: [x, y] = [lng, lat]
// ==========================================

use crate::domain::geo::{BBox, Geometry, Position, Ring};

// ==========================================
// PipOptions - 点在面内判定选项
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct PipOptions {
    /// 外包框 [west, south, east, north],点在框外时直接返回 false
    pub bbox: Option<BBox>,
    /// 恰在边上的点视为面外
    pub ignore_boundary: bool,
}

/// 点是否位于 Polygon / MultiPolygon 内
///
/// 外环命中后再检查洞；洞检测时边界规则取反（洞边上的点仍算在面内）。
/// Point 几何恒为 false。
pub fn point_in_polygon(point: Position, geometry: &Geometry, options: PipOptions) -> bool {
    if let Some(bbox) = options.bbox {
        if !in_bbox(point, &bbox) {
            return false;
        }
    }

    let polygons = match geometry {
        Geometry::Point(_) => return false,
        Geometry::Polygon(rings) => std::slice::from_ref(rings),
        Geometry::MultiPolygon(polygons) => polygons.as_slice(),
    };

    polygons.iter().any(|rings| {
        let Some((outer, holes)) = rings.split_first() else {
            return false;
        };
        in_ring(point, outer, options.ignore_boundary)
            && !holes
                .iter()
                .any(|hole| in_ring(point, hole, !options.ignore_boundary))
    })
}

fn in_bbox(pt: Position, bbox: &BBox) -> bool {
    bbox[0] <= pt.x && bbox[1] <= pt.y && bbox[2] >= pt.x && bbox[3] >= pt.y
}

fn in_ring(pt: Position, ring: &Ring, ignore_boundary: bool) -> bool {
    let mut ring: &[Position] = ring;
    if ring.len() > 1 && ring.first() == ring.last() {
        ring = &ring[..ring.len() - 1];
    }
    if ring.is_empty() {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].x, ring[i].y);
        let (xj, yj) = (ring[j].x, ring[j].y);

        let on_boundary = pt.y * (xi - xj) + yi * (xj - pt.x) + yj * (pt.x - xi) == 0.0
            && (xi - pt.x) * (xj - pt.x) <= 0.0
            && (yi - pt.y) * (yj - pt.y) <= 0.0;
        if on_boundary {
            return !ignore_boundary;
        }

        let intersect =
            (yi > pt.y) != (yj > pt.y) && pt.x < (xj - xi) * (pt.y - yi) / (yj - yi) + xi;
        if intersect {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// ==========================================
// 质心
// ==========================================

/// 环的边序列; 未闭合的环补上末点 → 首点的闭合边
fn ring_edges(ring: &[Position]) -> impl Iterator<Item = (Position, Position)> + '_ {
    let closing = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if first != last => Some((*last, *first)),
        _ => None,
    };
    ring.windows(2).map(|w| (w[0], w[1])).chain(closing)
}

/// 鞋带公式的有向面积（逆时针为正）
fn signed_area(ring: &[Position]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    ring_edges(ring)
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f64>()
        / 2.0
}

/// 环面积（绝对值）
pub fn ring_area(ring: &[Position]) -> f64 {
    signed_area(ring).abs()
}

/// 单环质心；退化环返回 None
pub fn ring_centroid(ring: &[Position]) -> Option<Position> {
    let area = signed_area(ring);
    if area == 0.0 {
        return None;
    }

    let (mut cx, mut cy) = (0.0, 0.0);
    for (a, b) in ring_edges(ring) {
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }

    let factor = 1.0 / (6.0 * area);
    Some(Position::new(cx * factor, cy * factor))
}

/// 多面质心: 各外环质心按面积加权平均
///
/// # 返回
/// - Some(Position): [lng, lat]
/// - None: 无有效外环（Point 几何或全部退化）
pub fn multipolygon_centroid(geometry: &Geometry) -> Option<Position> {
    let mut total_area = 0.0;
    let (mut wx, mut wy) = (0.0, 0.0);

    for polygon in geometry.to_multi_polygon() {
        let Some(exterior) = polygon.first() else {
            continue;
        };
        let area = ring_area(exterior);
        if let (true, Some(c)) = (area > 0.0, ring_centroid(exterior)) {
            total_area += area;
            wx += c.x * area;
            wy += c.y * area;
        }
    }

    (total_area > 0.0).then(|| Position::new(wx / total_area, wy / total_area))
}
