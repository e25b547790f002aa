// ==========================================
// 物料盘点导入系统 - 地理数据模型
// ==========================================
// 职责: 几何工具与地理定位所需的 GeoJSON 子集
// 坐标顺序: [lng, lat]（GeoJSON 约定）
// ==========================================

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ==========================================
// Position - 坐标点
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64, // 经度
    pub y: f64, // 纬度
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 交换坐标顺序（[lng, lat] ↔ [lat, lng]）
    pub fn swapped(&self) -> Self {
        Self { x: self.y, y: self.x }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y].serialize(serializer)
    }
}

// 允许带高程的第三维,忽略之
impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        if values.len() < 2 {
            return Err(D::Error::custom("坐标至少需要两个分量"));
        }
        Ok(Position::new(values[0], values[1]))
    }
}

pub type Ring = Vec<Position>;

// ==========================================
// Geometry - 几何
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// 统一为多面坐标（Point 返回空）
    pub fn to_multi_polygon(&self) -> Vec<Vec<Ring>> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::Polygon(rings) => vec![rings.clone()],
            Geometry::MultiPolygon(polygons) => polygons.clone(),
        }
    }

    /// 所有坐标交换为 [lat, lng]
    pub fn swapped(&self) -> Geometry {
        let swap_ring = |ring: &Ring| ring.iter().map(Position::swapped).collect::<Ring>();
        match self {
            Geometry::Point(p) => Geometry::Point(p.swapped()),
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(swap_ring).collect()),
            Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| rings.iter().map(swap_ring).collect())
                    .collect(),
            ),
        }
    }
}

/// 外包框 [west, south, east, north]
pub type BBox = [f64; 4];

// ==========================================
// Feature / FeatureCollection
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
}

impl Feature {
    /// 读取文本属性（数字属性转为文本）
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_roundtrip_shape() {
        let json = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0,12.5],[1,1],[0,0]]]}"#;
        let g: Geometry = serde_json::from_str(json).unwrap();
        match &g {
            Geometry::Polygon(rings) => assert_eq!(rings[0].len(), 4),
            other => panic!("期望 Polygon, 实际 {:?}", other),
        }
        let back = serde_json::to_value(&g).unwrap();
        assert_eq!(back["type"], "Polygon");
        assert_eq!(back["coordinates"][0][1], serde_json::json!([1.0, 0.0]));
    }

    #[test]
    fn test_swapped() {
        let g = Geometry::Point(Position::new(2.35, 48.86));
        assert_eq!(g.swapped(), Geometry::Point(Position::new(48.86, 2.35)));
    }

    #[test]
    fn test_feature_property_text() {
        let f: Feature = serde_json::from_str(
            r#"{"type":"Feature","properties":{"NOM_COM":"Lyon","CODE_IRIS":693810101},"geometry":null}"#,
        )
        .unwrap();
        assert_eq!(f.property_text("NOM_COM").as_deref(), Some("Lyon"));
        assert_eq!(f.property_text("CODE_IRIS").as_deref(), Some("693810101"));
    }
}
