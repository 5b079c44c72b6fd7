use std::sync::Arc;

use claim_core::{Cell, ClaimEngine, ClaimRecord, ClaimRulesConfig, GroupId, WorldId};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

const WORLD: WorldId = WorldId(0);
const GROUP: GroupId = GroupId(1);

fn square_territory(side: i32) -> ClaimEngine {
    let config = ClaimRulesConfig {
        max_claims_per_group: usize::MAX,
        ..ClaimRulesConfig::default()
    };
    let engine = ClaimEngine::new(Arc::new(config));
    engine.import_claims((0..side).flat_map(|z| {
        (0..side).map(move |x| ClaimRecord {
            world: WORLD,
            x,
            z,
            group: GROUP,
        })
    }));
    engine
}

fn bench_connectivity(c: &mut Criterion) {
    let mut group = c.benchmark_group("connectivity");

    for side in [8i32, 16, 32, 64] {
        let engine = square_territory(side);
        group.bench_with_input(BenchmarkId::new("analyze", side), &side, |b, _| {
            b.iter(|| engine.analyze_connectivity(GROUP, WORLD))
        });
        group.bench_with_input(
            BenchmarkId::new("validate_unclaim_center", side),
            &side,
            |b, &side| {
                let center = Cell::new(WORLD, side / 2, side / 2);
                b.iter(|| engine.validate_unclaim(GROUP, center))
            },
        );
    }

    group.finish();
}

fn bench_claim_rect(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_rect");

    for side in [8i32, 16, 32] {
        group.bench_with_input(BenchmarkId::new("fill", side), &side, |b, &side| {
            b.iter_batched(
                || {
                    let engine = square_territory(1);
                    engine.register_group(GROUP);
                    engine
                },
                |engine| engine.claim_rect(GROUP, WORLD, 0, 0, side - 1, side - 1),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(connectivity_benches, bench_connectivity, bench_claim_rect);
criterion_main!(connectivity_benches);
