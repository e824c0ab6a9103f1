//! フロー図のレベル計算
//!
//! テンプレート間の `relations` を有向グラフとして扱い、入次数0のノードから
//! BFS でレベルを割り当てる。循環の中にしかないノードは残りから順に BFS する。
//! 存在しない参照先やオカレンスへの参照は描画しない。

use crate::model::ProcessRecord;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// フロー図のノード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNode {
    pub id: String,
    pub title: String,
    pub level: usize,
}

/// フロー図の辺 (from の後に to が続く)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    /// レベルごとのノード一覧
    pub fn levels(&self) -> BTreeMap<usize, Vec<&FlowNode>> {
        let mut levels: BTreeMap<usize, Vec<&FlowNode>> = BTreeMap::new();
        for node in &self.nodes {
            levels.entry(node.level).or_default().push(node);
        }
        levels
    }

    pub fn level_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().find(|n| n.id == id).map(|n| n.level)
    }

    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }
}

/// テンプレートの relations からフロー図を構築
///
/// `relations.start` は先行 (start → self)、`relations.end` は後続 (self → end)。
pub fn build_flow(records: &[ProcessRecord]) -> FlowGraph {
    let templates: Vec<&ProcessRecord> = records.iter().filter(|r| r.is_template()).collect();
    let known: HashSet<&str> = templates.iter().map(|r| r.id.as_str()).collect();

    let mut edge_set: HashSet<FlowEdge> = HashSet::new();
    for record in &templates {
        if let Some(start) = record.relations.start.as_deref() {
            if known.contains(start) && start != record.id {
                edge_set.insert(FlowEdge {
                    from: start.to_string(),
                    to: record.id.clone(),
                });
            }
        }
        if let Some(end) = record.relations.end.as_deref() {
            if known.contains(end) && end != record.id {
                edge_set.insert(FlowEdge {
                    from: record.id.clone(),
                    to: end.to_string(),
                });
            }
        }
    }
    let mut edges: Vec<FlowEdge> = edge_set.into_iter().collect();
    edges.sort();

    let mut in_degree: HashMap<&str, usize> = known.iter().map(|id| (*id, 0)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &edges {
        *in_degree.entry(edge.to.as_str()).or_default() += 1;
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    let mut levels: HashMap<&str, usize> = HashMap::new();
    let roots: Vec<&str> = templates
        .iter()
        .map(|r| r.id.as_str())
        .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
        .collect();
    bfs(&roots, &adjacency, &mut levels);

    // 循環内のノードは、まだレベルのないものを起点に改めて BFS
    for record in &templates {
        let id = record.id.as_str();
        if !levels.contains_key(id) {
            bfs(&[id], &adjacency, &mut levels);
        }
    }

    let nodes = templates
        .iter()
        .map(|r| FlowNode {
            id: r.id.clone(),
            title: r.title.clone(),
            level: levels.get(r.id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    FlowGraph { nodes, edges }
}

fn bfs<'a>(
    starts: &[&'a str],
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    levels: &mut HashMap<&'a str, usize>,
) {
    let mut queue: VecDeque<(&'a str, usize)> = VecDeque::new();
    for &start in starts {
        if !levels.contains_key(start) {
            levels.insert(start, 0);
            queue.push_back((start, 0));
        }
    }
    while let Some((id, level)) = queue.pop_front() {
        for &next in adjacency.get(id).into_iter().flatten() {
            if !levels.contains_key(next) {
                levels.insert(next, level + 1);
                queue.push_back((next, level + 1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Relations;
    use chrono::Utc;

    fn template(id: &str, start: Option<&str>, end: Option<&str>) -> ProcessRecord {
        let mut record = ProcessRecord::new_template(id.to_uppercase(), Utc::now());
        record.id = id.to_string();
        record.relations = Relations {
            start: start.map(String::from),
            end: end.map(String::from),
        };
        record
    }

    #[test]
    fn test_chain_levels() {
        let records = vec![
            template("a", None, Some("b")),
            template("b", None, None),
            template("c", Some("b"), None),
        ];
        let graph = build_flow(&records);
        assert_eq!(graph.level_of("a"), Some(0));
        assert_eq!(graph.level_of("b"), Some(1));
        assert_eq!(graph.level_of("c"), Some(2));
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_both_sides_of_same_edge_are_merged() {
        let records = vec![
            template("a", None, Some("b")),
            template("b", Some("a"), None),
        ];
        let graph = build_flow(&records);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.successors("a").collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_cycle_nodes_get_levels() {
        let records = vec![
            template("x", None, Some("y")),
            template("y", None, Some("x")),
            template("solo", None, None),
        ];
        let graph = build_flow(&records);
        assert_eq!(graph.level_of("solo"), Some(0));
        assert_eq!(graph.level_of("x"), Some(0));
        assert_eq!(graph.level_of("y"), Some(1));
    }

    #[test]
    fn test_dangling_and_occurrence_targets_are_hidden() {
        let mut occurrence = template("occ", None, None);
        occurrence.is_occurrence = true;
        let records = vec![
            template("a", Some("gone"), Some("occ")),
            occurrence,
        ];
        let graph = build_flow(&records);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.levels().get(&0).map(|n| n.len()), Some(1));
    }
}
