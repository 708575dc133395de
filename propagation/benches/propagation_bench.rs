use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use newsrank_core::config::{EdgeBudgets, PropagationConfig};
use newsrank_core::model::{ArticleLikeRecord, ArticleRecord, FriendshipRecord, UserRecord};
use propagation::{GraphBuilder, LabelPropagationEngine};
use storage::loader::EntitySnapshot;

fn synthetic_snapshot(users: usize, articles: usize, categories: usize) -> EntitySnapshot {
    let date = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
    let mut snapshot = EntitySnapshot::default();

    for i in 0..articles {
        snapshot.articles.push(ArticleRecord {
            article_uuid: format!("a{}", i),
            category: format!("c{}", i % categories),
            date,
        });
    }
    for u in 0..users {
        snapshot.users.push(UserRecord {
            username: format!("u{}", u),
            interests: vec![format!("c{}", u % categories), format!("c{}", (u * 7) % categories)],
        });
        for k in 0..5 {
            snapshot.likes.push(ArticleLikeRecord {
                article_uuid: format!("a{}", (u * 31 + k * 17) % articles),
                username: format!("u{}", u),
            });
        }
        snapshot.friendships.push(FriendshipRecord {
            username: format!("u{}", u),
            friend_username: format!("u{}", (u + 1) % users),
            confirmed: true,
        });
    }
    snapshot
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let snapshot = synthetic_snapshot(500, 2_000, 20);
    let graph = GraphBuilder::new(EdgeBudgets::default()).build(&snapshot);
    let engine = LabelPropagationEngine::new(PropagationConfig::default()).unwrap();

    c.bench_function("build graph 500 users", |b| {
        b.iter(|| GraphBuilder::new(EdgeBudgets::default()).build(&snapshot))
    });
    c.bench_function("propagate 500 seeds", |b| b.iter(|| engine.run(&graph)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
