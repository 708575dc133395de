use crate::graph::{NodeIndex, Relation, WeightedGraph};
use newsrank_core::config::EdgeBudgets;
use newsrank_core::metrics::RunMetricsCollector;
use newsrank_core::model::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use storage::loader::EntitySnapshot;
use tracing::{info, warn};

/// Turns relation rows into the weighted propagation graph.
///
/// For every relation each source node spends exactly that relation's budget,
/// split evenly over its distinct targets. Sources with no targets in a
/// relation simply emit nothing for it.
pub struct GraphBuilder {
    budgets: EdgeBudgets,
    metrics: Option<RunMetricsCollector>,
}

impl GraphBuilder {
    pub fn new(budgets: EdgeBudgets) -> Self {
        Self {
            budgets,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RunMetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(&self, snapshot: &EntitySnapshot) -> WeightedGraph {
        let mut graph = WeightedGraph::default();

        for user in &snapshot.users {
            graph.intern(NodeId::user(&user.username));
        }
        for article in &snapshot.articles {
            graph.intern(NodeId::article(&article.article_uuid));
        }

        // Categories exist only through the rows that mention them.
        let mut article_categories = BTreeSet::new();
        for article in &snapshot.articles {
            let a = graph.intern(NodeId::article(&article.article_uuid));
            let c = graph.intern(NodeId::category(&article.category));
            article_categories.insert((a, c));
        }

        let mut interests = BTreeSet::new();
        for user in &snapshot.users {
            let u = graph.intern(NodeId::user(&user.username));
            for interest in &user.interests {
                let c = graph.intern(NodeId::category(interest));
                interests.insert((u, c));
            }
        }

        let mut likes = BTreeSet::new();
        for like in &snapshot.likes {
            let user = NodeId::user(&like.username);
            let article = NodeId::article(&like.article_uuid);
            match (graph.index_of(&user), graph.index_of(&article)) {
                (Some(u), Some(a)) => {
                    likes.insert((u, a));
                }
                _ => self.drop_reference("like", &user, &article, &graph),
            }
        }

        let mut friendships = BTreeSet::new();
        for friendship in snapshot.friendships.iter().filter(|f| f.confirmed) {
            let user = NodeId::user(&friendship.username);
            let friend = NodeId::user(&friendship.friend_username);
            match (graph.index_of(&user), graph.index_of(&friend)) {
                (Some(u), Some(f)) => {
                    friendships.insert((u, f));
                }
                _ => self.drop_reference("friendship", &user, &friend, &graph),
            }
        }

        let swap = |&(a, b): &(NodeIndex, NodeIndex)| (b, a);

        self.emit(
            &mut graph,
            Relation::CategoryToArticle,
            article_categories.iter().map(swap),
        );
        self.emit(&mut graph, Relation::UserToUser, friendships.iter().copied());
        self.emit(&mut graph, Relation::UserToCategory, interests.iter().copied());
        self.emit(&mut graph, Relation::UserToArticle, likes.iter().copied());
        self.emit(
            &mut graph,
            Relation::ArticleOutbound,
            article_categories
                .iter()
                .copied()
                .chain(likes.iter().map(swap)),
        );
        self.emit(&mut graph, Relation::CategoryToUser, interests.iter().map(swap));

        graph.set_seeds(interests.iter().map(|&(u, _)| u).collect());

        info!(
            "Built graph: {} nodes, {} edges, {} seeds",
            graph.node_count(),
            graph.edge_count(),
            graph.seeds().len()
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_graph(graph.node_count(), graph.edge_count(), graph.seeds().len());
        }

        graph
    }

    fn emit(
        &self,
        graph: &mut WeightedGraph,
        relation: Relation,
        pairs: impl Iterator<Item = (NodeIndex, NodeIndex)>,
    ) {
        let mut by_source: BTreeMap<NodeIndex, BTreeSet<NodeIndex>> = BTreeMap::new();
        for (source, target) in pairs {
            by_source.entry(source).or_default().insert(target);
        }

        let budget = relation.budget(&self.budgets);
        for (source, targets) in by_source {
            let weight = budget / targets.len() as f64;
            for target in targets {
                graph.push_edge(source, target, relation, weight);
            }
        }
    }

    fn drop_reference(&self, relation: &str, from: &NodeId, to: &NodeId, graph: &WeightedGraph) {
        let missing = if graph.contains(from) { to } else { from };
        warn!(
            "Dropping {} {} -> {}: {} is not a loaded entity",
            relation, from, to, missing
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped_reference();
        }
    }
}
