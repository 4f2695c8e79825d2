use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

fn iterate_benchmark(c: &mut Criterion) {
    init_logging();

    let mut group = c.benchmark_group("iterate");

    group.bench_function("move_100k", |b| {
        b.iter_batched(
            || {
                let mut world = make_world();
                populate(&mut world, AGENTS_MED);
                world
            },
            |mut world| {
                let q = world.q_move;
                world.ctx.run_query(q, |(p, v): (&mut Position, &mut Velocity)| {
                    p.x += v.dx;
                    p.y += v.dy;
                });
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("sum_wealth_100k", |b| {
        b.iter_batched(
            || {
                let mut world = make_world();
                populate(&mut world, AGENTS_MED);
                world
            },
            |mut world| {
                let mut total = 0.0f32;
                let q = world.q_wealth;
                world.ctx.run_query(q, |(w,): (&mut Wealth,)| {
                    total += w.value;
                });
                black_box(total);
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("chunked_sum_wealth_100k", |b| {
        b.iter_batched(
            || {
                let mut world = make_world();
                populate(&mut world, AGENTS_MED);
                world
            },
            |mut world| {
                let mut total = 0.0f32;
                let q = world.q_wealth.id();
                world.ctx.run_query_chunks(q, |chunk| {
                    for row in 0..chunk.len as usize {
                        let wealth = unsafe {
                            *(chunk.bases[0].add(row * std::mem::size_of::<Wealth>())
                                as *const Wealth)
                        };
                        total += wealth.value;
                    }
                });
                black_box(total);
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
