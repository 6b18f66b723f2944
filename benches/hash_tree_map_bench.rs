use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;
use treebin_map::{Handle, HashTreeMap, NaturalOrder};

#[path = "../src/testing.rs"]
mod testing;
use testing::{ConstBuildHasher, HighBitsBuildHasher};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("tree_map::insert_fresh_100k", |b| {
        b.iter_batched(
            HashTreeMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_presized_100k(c: &mut Criterion) {
    c.bench_function("tree_map::insert_presized_100k", |b| {
        b.iter_batched(
            || HashTreeMap::<String, u64>::with_capacity(140_000),
            |mut m| {
                for (i, x) in lcg(3).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove_random_10k(c: &mut Criterion) {
    c.bench_function("tree_map::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let mut m = HashTreeMap::new();
                let keys: Vec<String> = lcg(5).take(110_000).map(key).collect();
                for (i, k) in keys.iter().enumerate() {
                    m.insert(k.clone(), i as u64);
                }
                // Precompute 10k unique indices via LCG
                let n = keys.len();
                let mut sel = std::collections::HashSet::with_capacity(10_000);
                let mut s = 0x9e3779b97f4a7c15u64;
                while sel.len() < 10_000 {
                    s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                    sel.insert((s as usize) % n);
                }
                let to_remove: Vec<String> = sel.into_iter().map(|i| keys[i].clone()).collect();
                (m, to_remove)
            },
            |(mut m, to_remove)| {
                for k in &to_remove {
                    black_box(m.remove(k.as_str()));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit_and_miss_10k(c: &mut Criterion) {
    let mut m = HashTreeMap::new();
    let keys: Vec<_> = lcg(7).take(100_000).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64);
    }
    let n = keys.len();
    let mut s = 0x9e3779b97f4a7c15u64;
    let queries: Vec<String> = (0..10_000)
        .map(|_| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            keys[(s as usize) % n].clone()
        })
        .collect();
    let misses: Vec<String> = lcg(0xdead_beef).take(10_000).map(key).collect();

    c.bench_function("tree_map::get_hit_10k_on_100k", |b| {
        b.iter(|| {
            for k in &queries {
                black_box(m.get(k.as_str()));
            }
        })
    });
    c.bench_function("tree_map::get_miss_10k_on_100k", |b| {
        b.iter(|| {
            for k in &misses {
                black_box(m.get(k.as_str()));
            }
        })
    });
}

fn bench_handle_access_increment(c: &mut Criterion) {
    c.bench_function("tree_map::handle_access_increment_10k", |b| {
        b.iter_batched(
            || {
                let mut m = HashTreeMap::new();
                let mut handles: Vec<Handle> = Vec::with_capacity(100_000);
                for (i, x) in lcg(123).take(100_000).enumerate() {
                    let k = key(x);
                    m.insert(k.clone(), i as u64);
                    handles.extend(m.find(k.as_str()));
                }
                let n = handles.len();
                let mut s = 0x9e3779b97f4a7c15u64;
                let targets: Vec<Handle> = (0..10_000)
                    .map(|_| {
                        s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                        handles[(s as usize) % n]
                    })
                    .collect();
                (m, targets)
            },
            |(mut m, targets)| {
                for h in targets {
                    if let Some(v) = h.value_mut(&mut m) {
                        *v = v.wrapping_add(1);
                    }
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_single_tree_bin(c: &mut Criterion) {
    let mut m = HashTreeMap::with_hasher(HighBitsBuildHasher);
    for k in 0..4_096u64 {
        m.insert(k, k);
    }
    c.bench_function("tree_map::get_4k_in_one_tree_bin", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for k in 0..4_096u64 {
                sum = sum.wrapping_add(*m.get(&k).unwrap_or(&0));
            }
            black_box(sum)
        })
    });
    c.bench_function("tree_map::build_4k_in_one_tree_bin", |b| {
        b.iter_batched(
            || HashTreeMap::with_hasher(HighBitsBuildHasher),
            |mut m| {
                for k in 0..4_096u64 {
                    m.insert(k, k);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_equal_hash_miss(c: &mut Criterion) {
    let mut unordered = HashTreeMap::with_hasher(ConstBuildHasher);
    let mut natural = HashTreeMap::with_tie_break(ConstBuildHasher, NaturalOrder);
    for k in 0..1_024u64 {
        unordered.insert(k, k);
        natural.insert(k, k);
    }
    c.bench_function("tree_map::miss_among_1k_equal_hashes_unordered", |b| {
        b.iter(|| black_box(unordered.get(&black_box(5_000u64))))
    });
    c.bench_function("tree_map::miss_among_1k_equal_hashes_natural_order", |b| {
        b.iter(|| black_box(natural.get(&black_box(5_000u64))))
    });
}

fn bench_iter_and_cursor(c: &mut Criterion) {
    let mut m = HashTreeMap::new();
    for (i, x) in lcg(999).take(100_000).enumerate() {
        m.insert(key(x), i as u64);
    }
    c.bench_function("tree_map::iter_all_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in m.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });
    c.bench_function("tree_map::cursor_all_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            let mut cur = m.cursor();
            while let Ok(Some((_k, v))) = cur.advance(&m) {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_insert_presized_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_remove_random_10k,
              bench_get_hit_and_miss_10k,
              bench_handle_access_increment,
              bench_single_tree_bin,
              bench_equal_hash_miss,
              bench_iter_and_cursor
}
criterion_main!(benches_insert, benches_ops);
