use newsrank_core::config::EdgeBudgets;
use newsrank_core::model::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dense slot assigned to a node when the graph is built.
pub type NodeIndex = u32;

/// Edge groups. Each carries its own outbound weight budget per source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    CategoryToArticle,
    UserToUser,
    UserToCategory,
    UserToArticle,
    /// Article -> category and article -> liker, counted as one fan-out.
    ArticleOutbound,
    CategoryToUser,
}

impl Relation {
    pub const ALL: [Relation; 6] = [
        Relation::CategoryToArticle,
        Relation::UserToUser,
        Relation::UserToCategory,
        Relation::UserToArticle,
        Relation::ArticleOutbound,
        Relation::CategoryToUser,
    ];

    pub fn budget(&self, budgets: &EdgeBudgets) -> f64 {
        match self {
            Relation::CategoryToArticle => budgets.category_to_article,
            Relation::UserToUser => budgets.user_to_user,
            Relation::UserToCategory => budgets.user_to_category,
            Relation::UserToArticle => budgets.user_to_article,
            Relation::ArticleOutbound => budgets.article_outbound,
            Relation::CategoryToUser => budgets.category_to_user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub target: NodeIndex,
    pub relation: Relation,
    pub weight: f64,
}

/// Immutable weighted multi-relation graph, adjacency keyed by source node.
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    ids: Vec<NodeId>,
    slots: HashMap<NodeId, NodeIndex>,
    outgoing: Vec<Vec<Edge>>,
    seeds: Vec<NodeIndex>,
}

impl WeightedGraph {
    /// Assemble a graph from explicit parts. Edges naming unknown nodes are skipped.
    pub fn from_parts(
        nodes: Vec<NodeId>,
        edges: impl IntoIterator<Item = (NodeId, NodeId, Relation, f64)>,
        seeds: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        let mut graph = Self::default();
        for node in nodes {
            graph.intern(node);
        }
        for (source, target, relation, weight) in edges {
            let (Some(s), Some(t)) = (graph.index_of(&source), graph.index_of(&target)) else {
                continue;
            };
            graph.push_edge(s, t, relation, weight);
        }
        let seeds: Vec<NodeIndex> = seeds
            .into_iter()
            .filter_map(|seed| graph.index_of(&seed))
            .collect();
        graph.set_seeds(seeds);
        graph
    }

    pub(crate) fn intern(&mut self, id: NodeId) -> NodeIndex {
        if let Some(&slot) = self.slots.get(&id) {
            return slot;
        }
        let slot = self.ids.len() as NodeIndex;
        self.ids.push(id.clone());
        self.slots.insert(id, slot);
        self.outgoing.push(Vec::new());
        slot
    }

    pub(crate) fn push_edge(&mut self, source: NodeIndex, target: NodeIndex, relation: Relation, weight: f64) {
        self.outgoing[source as usize].push(Edge {
            target,
            relation,
            weight,
        });
    }

    pub(crate) fn set_seeds(&mut self, mut seeds: Vec<NodeIndex>) {
        seeds.sort_unstable();
        seeds.dedup();
        self.seeds = seeds;
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(|edges| edges.len()).sum()
    }

    pub fn node_id(&self, index: NodeIndex) -> &NodeId {
        &self.ids[index as usize]
    }

    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.slots.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn out_edges(&self, index: NodeIndex) -> &[Edge] {
        self.outgoing
            .get(index as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Outbound edges of one node resolved to node ids.
    pub fn neighbors(&self, id: &NodeId) -> Vec<(&NodeId, Relation, f64)> {
        self.index_of(id)
            .map(|slot| {
                self.out_edges(slot)
                    .iter()
                    .map(|edge| (self.node_id(edge.target), edge.relation, edge.weight))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn seeds(&self) -> &[NodeIndex] {
        &self.seeds
    }

    pub fn is_seed(&self, index: NodeIndex) -> bool {
        self.seeds.binary_search(&index).is_ok()
    }

    /// All edges as `(source, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, &Edge)> + '_ {
        self.outgoing
            .iter()
            .enumerate()
            .flat_map(|(source, edges)| edges.iter().map(move |edge| (source as NodeIndex, edge)))
    }

    /// Transposed view: for each target, its `(source, weight)` inbound edges.
    pub fn incoming(&self) -> Vec<Vec<(NodeIndex, f64)>> {
        let mut incoming = vec![Vec::new(); self.node_count()];
        for (source, edge) in self.edges() {
            incoming[edge.target as usize].push((source, edge.weight));
        }
        incoming
    }

    /// Sum of outbound weights of `source` within one relation.
    pub fn relation_out_weight(&self, source: NodeIndex, relation: Relation) -> f64 {
        self.out_edges(source)
            .iter()
            .filter(|edge| edge.relation == relation)
            .map(|edge| edge.weight)
            .sum()
    }
}
