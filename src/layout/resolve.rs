//! 连线与分组解析：按名称把 connection / group 绑定到已放置节点
//!
//! 名称找不到的引用直接跳过，不影响批次中其余部分。

use std::collections::HashMap;

use crate::layout::types::{BoundingBox, LayoutNode, ResolvedConnection, ResolvedGroup};
use crate::toolcall::{ConnectionParams, GroupParams, ToolCall};

/// 名称 -> 节点；重名时后创建的节点覆盖先前的
pub fn name_index(nodes: &[LayoutNode]) -> HashMap<&str, &LayoutNode> {
    nodes.iter().map(|n| (n.name.as_str(), n)).collect()
}

pub fn resolve_connections(nodes: &[LayoutNode], connections: &[ToolCall]) -> Vec<ResolvedConnection> {
    let index = name_index(nodes);
    connections
        .iter()
        .filter_map(|call| {
            let params: ConnectionParams = call.params();
            match (index.get(params.from.as_str()), index.get(params.to.as_str())) {
                (Some(from), Some(to)) => Some(ResolvedConnection {
                    start: from.center(),
                    end: to.center(),
                    from: params.from,
                    to: params.to,
                    label: params.label,
                }),
                _ => {
                    tracing::debug!(from = %params.from, to = %params.to, "Unresolved connection skipped");
                    None
                }
            }
        })
        .collect()
}

/// 每个节点只归属一个容器：出现在多个分组中时以最后一个为准
pub fn resolve_groups(nodes: &[LayoutNode], groups: &[ToolCall], padding: f64) -> Vec<ResolvedGroup> {
    let index = name_index(nodes);
    let params: Vec<GroupParams> = groups.iter().map(|call| call.params()).collect();

    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (i, group) in params.iter().enumerate() {
        for member in &group.members {
            if index.contains_key(member.as_str()) {
                owner.insert(member.as_str(), i);
            }
        }
    }

    params
        .iter()
        .enumerate()
        .filter_map(|(i, group)| {
            let name = group.name.clone().unwrap_or_else(|| format!("group-{}", i + 1));

            let mut members: Vec<String> = Vec::new();
            for member in &group.members {
                if owner.get(member.as_str()) == Some(&i) && !members.contains(member) {
                    members.push(member.clone());
                }
            }
            let bounds = BoundingBox::around(members.iter().filter_map(|m| index.get(m.as_str()).copied()));
            match bounds {
                Some(bounds) => Some(ResolvedGroup {
                    name,
                    label: group.label.clone(),
                    members,
                    bounds: bounds.expand(padding),
                }),
                None => {
                    tracing::debug!(group = %name, "Group without resolvable members skipped");
                    None
                }
            }
        })
        .collect()
}
