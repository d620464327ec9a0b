//! # Ubqhash Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | Difficulty | U256 calculators vs arbitrary-precision reference |
//! | Retarget | DigishieldV3 / Flux over a steady chain |
//! | Hashimoto | light (cache) vs full (dataset) evaluation, test sizes |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use primitive_types::U256;
use qc_ubqhash::algorithm::{
    cache_words, hashimoto_full, hashimoto_light, seed_hash, TEST_CACHE_SIZE, TEST_DATASET_SIZE,
};
use qc_ubqhash::difficulty::{self, reference, RetargetParams};
use qc_ubqhash::{ChainHeaderReader, EpochDataset, EpochItem, GenerateOptions, ParentHeader};
use rand::Rng;
use std::time::Duration;

struct SteadyChain;

impl ChainHeaderReader for SteadyChain {
    fn calc_past_median_time(&self, number: u64, _parent: &ParentHeader) -> u64 {
        number * difficulty::TARGET_BLOCK_TIME
    }
}

fn random_parents(count: usize) -> Vec<(u64, ParentHeader)> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let parent = ParentHeader {
                number: rng.gen_range(1..10_000_000),
                time: rng.gen_range(0..1_500_000_000),
                difficulty: U256::from(rng.gen::<u64>()),
                has_uncles: rng.gen(),
            };
            (parent.time + rng.gen_range(1..200), parent)
        })
        .collect()
}

fn bench_difficulty_calculators(c: &mut Criterion) {
    let mut group = c.benchmark_group("difficulty");
    group.measurement_time(Duration::from_secs(5));

    let inputs = random_parents(1_000);
    group.throughput(Throughput::Elements(inputs.len() as u64));

    group.bench_function("homestead_u256", |b| {
        b.iter(|| {
            for (time, parent) in &inputs {
                black_box(difficulty::homestead(*time, parent));
            }
        })
    });
    group.bench_function("homestead_reference", |b| {
        b.iter(|| {
            for (time, parent) in &inputs {
                black_box(reference::homestead(*time, parent));
            }
        })
    });

    let bomb = difficulty::BombDelayCalculator::new(Some(3_000_000));
    group.bench_function("bomb_delay_u256", |b| {
        b.iter(|| {
            for (time, parent) in &inputs {
                black_box(bomb.calculate(*time, parent));
            }
        })
    });
    group.bench_function("bomb_delay_reference", |b| {
        b.iter(|| {
            for (time, parent) in &inputs {
                black_box(reference::bomb_delay(Some(3_000_000), *time, parent));
            }
        })
    });
    group.finish();
}

fn bench_retargets(c: &mut Criterion) {
    let mut group = c.benchmark_group("retarget");
    let parent = ParentHeader {
        number: 100_000,
        time: 100_000 * difficulty::TARGET_BLOCK_TIME,
        difficulty: U256::from(1_000_000_000u64),
        has_uncles: false,
    };
    let time = parent.time + 30;

    for (name, params) in [
        ("digishield_v3", RetargetParams::DIGISHIELD_V3),
        ("digishield_v3_mod", RetargetParams::DIGISHIELD_V3_MOD),
    ] {
        group.bench_with_input(BenchmarkId::new(name, params.averaging_window), &params, |b, p| {
            b.iter(|| black_box(difficulty::digishield_v3(&SteadyChain, &parent, p)))
        });
    }
    group.bench_function("flux", |b| {
        b.iter(|| black_box(difficulty::flux(&SteadyChain, time, &parent, &RetargetParams::FLUX)))
    });
    group.finish();
}

fn bench_hashimoto(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashimoto");
    let cache = cache_words(TEST_CACHE_SIZE, 0, 22, &seed_hash(0));
    let options = GenerateOptions {
        test: true,
        ..GenerateOptions::default()
    };
    let dataset = EpochDataset::new(0, 22);
    let Some(data) = dataset.generate(&options) else {
        return;
    };
    let hash = [0x42u8; 32];

    group.bench_function("light", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            black_box(hashimoto_light(TEST_DATASET_SIZE, cache.as_slice(), &hash, nonce))
        })
    });
    group.bench_function("full", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            black_box(hashimoto_full(&*data, &hash, nonce))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_difficulty_calculators, bench_retargets, bench_hashimoto);
criterion_main!(benches);
