//! 连线依赖图
//!
//! 使用邻接表和入度表实现 Kahn 分层；节点以卡片在批次中的下标表示，保证结果确定。

use std::collections::HashMap;

/// 由 connection 操作构建的有向图
pub struct LayerGraph {
    /// 邻接表：节点 -> 依赖它的节点
    pub adjacency: Vec<Vec<usize>>,
    /// 入度表：节点 -> 未放置的前驱数
    pub in_degree: Vec<usize>,
}

/// 分层结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layering {
    /// 每层的节点下标（层内按原始顺序）
    pub layers: Vec<Vec<usize>>,
    /// 最后一层是否为环路兜底层
    pub cyclic: bool,
}

impl Layering {
    /// 节点下标 -> 层号
    pub fn layer_of(&self, node_count: usize) -> Vec<usize> {
        let mut layer_of = vec![0; node_count];
        for (layer, nodes) in self.layers.iter().enumerate() {
            for &node in nodes {
                layer_of[node] = layer;
            }
        }
        layer_of
    }
}

impl LayerGraph {
    /// 创建依赖图；端点名不存在的边直接忽略，重名节点以最后一个为准
    pub fn new<S: AsRef<str>>(names: &[S], edges: &[(String, String)]) -> Self {
        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref(), i))
            .collect();

        let mut adjacency = vec![Vec::new(); names.len()];
        let mut in_degree = vec![0; names.len()];

        for (from, to) in edges {
            match (index.get(from.as_str()), index.get(to.as_str())) {
                (Some(&f), Some(&t)) => {
                    adjacency[f].push(t);
                    in_degree[t] += 1;
                }
                _ => tracing::debug!(from = %from, to = %to, "Edge with unknown endpoint ignored"),
            }
        }

        Self {
            adjacency,
            in_degree,
        }
    }

    /// Kahn 分层：每轮取出全部入度为 0 的节点作为一层；
    /// 若剩余节点均无入度为 0 者（存在环），把剩余节点整体放入最后一层
    pub fn layers(&self) -> Layering {
        let n = self.in_degree.len();
        let mut in_degree = self.in_degree.clone();
        let mut placed = vec![false; n];
        let mut layers = Vec::new();
        let mut cyclic = false;

        loop {
            let ready: Vec<usize> = (0..n)
                .filter(|&i| !placed[i] && in_degree[i] == 0)
                .collect();

            if ready.is_empty() {
                let remaining: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
                if !remaining.is_empty() {
                    tracing::debug!(count = remaining.len(), "Cycle detected, placing remaining nodes in one layer");
                    cyclic = true;
                    layers.push(remaining);
                }
                break;
            }

            for &node in &ready {
                placed[node] = true;
            }
            for &node in &ready {
                for &next in &self.adjacency[node] {
                    in_degree[next] = in_degree[next].saturating_sub(1);
                }
            }
            layers.push(ready);
        }

        Layering { layers, cyclic }
    }
}
