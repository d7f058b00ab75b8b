//! 布局类型：节点、包围盒、已解析的连线与分组

use serde::Serialize;
use serde_json::Value;

/// 画布坐标点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 节点种类，决定固定尺寸与物化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Card,
    Table,
    Slide,
    /// 解析失败时承载整段纯文本的便签
    Note,
}

/// 一个可放置的画布元素
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub name: String,
    pub kind: NodeKind,
    pub width: f64,
    pub height: f64,
    /// 分层模式下的层号；网格模式下为行号
    pub layer_index: usize,
    /// 左上角坐标
    pub position: Point,
    pub parameters: Value,
}

impl LayoutNode {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min_x: self.position.x,
            min_y: self.position.y,
            max_x: self.position.x + self.width,
            max_y: self.position.y + self.height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.position.x + self.width / 2.0,
            self.position.y + self.height / 2.0,
        )
    }
}

/// 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// 一组节点的包围盒；空集合返回 None
    pub fn around<'a>(nodes: impl IntoIterator<Item = &'a LayoutNode>) -> Option<Self> {
        nodes
            .into_iter()
            .map(LayoutNode::bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// 四边各向外扩展 padding
    pub fn expand(&self, padding: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - padding,
            min_y: self.min_y - padding,
            max_x: self.max_x + padding,
            max_y: self.max_y + padding,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// 两端都已解析到节点的连线
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConnection {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    /// 起点节点中心
    pub start: Point,
    /// 终点节点中心
    pub end: Point,
}

/// 分组容器：成员包围盒并集 + 固定内边距
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedGroup {
    pub name: String,
    pub label: Option<String>,
    /// 实际解析到的成员名
    pub members: Vec<String>,
    pub bounds: BoundingBox,
}

/// 布局模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    Grid,
    Layered,
}

/// 一次批次的完整布局结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub mode: LayoutMode,
    pub nodes: Vec<LayoutNode>,
    pub bounds: Option<BoundingBox>,
    pub connections: Vec<ResolvedConnection>,
    pub groups: Vec<ResolvedGroup>,
}

impl LayoutPlan {
    pub fn node(&self, name: &str) -> Option<&LayoutNode> {
        self.nodes.iter().rev().find(|n| n.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, x: f64, y: f64, w: f64, h: f64) -> LayoutNode {
        LayoutNode {
            name: name.into(),
            kind: NodeKind::Card,
            width: w,
            height: h,
            layer_index: 0,
            position: Point::new(x, y),
            parameters: Value::Null,
        }
    }

    #[test]
    fn test_bounding_box_around() {
        let nodes = vec![node("a", 0.0, 0.0, 10.0, 10.0), node("b", 20.0, -5.0, 5.0, 5.0)];
        let bbox = BoundingBox::around(&nodes).unwrap();
        assert_eq!(bbox.min_x, 0.0);
        assert_eq!(bbox.min_y, -5.0);
        assert_eq!(bbox.max_x, 25.0);
        assert_eq!(bbox.max_y, 10.0);
        assert_eq!(bbox.width(), 25.0);
    }

    #[test]
    fn test_bounding_box_empty() {
        assert!(BoundingBox::around(&Vec::<LayoutNode>::new()).is_none());
    }

    #[test]
    fn test_expand() {
        let bbox = node("a", 0.0, 0.0, 10.0, 10.0).bounds().expand(2.0);
        assert_eq!(bbox.min_x, -2.0);
        assert_eq!(bbox.max_y, 12.0);
    }
}
