//! Exercises the range slide protocol: multiple entity types sharing one
//! component buffer, with enough churn to force interior slides and tail
//! growth past the initial capacity.

use std::mem::size_of;

use dense_ecs::{Context, Entity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Mass(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tag(u32);

/// Reads back every row of a chunk as `Mass` values.
fn chunk_masses(chunk: &dense_ecs::QueryChunk<'_>) -> Vec<Mass> {
    assert_eq!(chunk.instance_sizes[0] as usize, size_of::<Mass>());
    (0..chunk.len as usize)
        .map(|row| unsafe { *(chunk.bases[0].add(row * size_of::<Mass>()) as *const Mass) })
        .collect()
}

#[test]
fn shared_component_survives_growth_and_slides() {
    let mut ctx = Context::new();
    let plain = ctx.define_entity_type::<(Mass,)>().unwrap();
    let tagged = ctx.define_entity_type::<(Mass, Tag)>().unwrap();
    let q_mass = ctx.define_query::<(Mass,)>().unwrap();
    ctx.setup().unwrap();

    // 17 of the first type, then 17 of the second: the shared Mass buffer
    // starts at capacity 16, so both phases grow it, and every create of
    // the first type slides the second type's range.
    let mut entities: Vec<(Entity, Mass)> = Vec::new();
    for i in 0..17u64 {
        let e = ctx.create(plain);
        *ctx.get_mut::<Mass>(e) = Mass(1_000 + i);
        entities.push((e, Mass(1_000 + i)));
    }
    for i in 0..17u64 {
        let e = ctx.create(tagged);
        *ctx.get_mut::<Mass>(e) = Mass(2_000 + i);
        *ctx.get_mut::<Tag>(e) = Tag(i as u32);
        entities.push((e, Mass(2_000 + i)));
    }

    for &(e, expected) in &entities {
        assert!(ctx.is_alive(e));
        assert_eq!(*ctx.get::<Mass>(e), expected, "payload moved incorrectly for {e:?}");
    }

    // Density: live instances occupy exactly the first `len` rows of each
    // range, one contiguous run per entity type.
    let mut chunks = Vec::new();
    ctx.run_query_chunks(q_mass.id(), |chunk| {
        chunks.push((chunk.entity_type, chunk_masses(&chunk)));
    });
    assert_eq!(chunks.len(), 2);

    let (first_type, first_masses) = &chunks[0];
    let (second_type, second_masses) = &chunks[1];
    assert_eq!(*first_type, plain);
    assert_eq!(*second_type, tagged);

    let mut sorted_first = first_masses.clone();
    sorted_first.sort();
    assert_eq!(sorted_first, (0..17).map(|i| Mass(1_000 + i)).collect::<Vec<_>>());

    let mut sorted_second = second_masses.clone();
    sorted_second.sort();
    assert_eq!(sorted_second, (0..17).map(|i| Mass(2_000 + i)).collect::<Vec<_>>());
}

#[test]
fn interleaved_creation_across_shared_ranges() {
    let mut ctx = Context::new();
    let plain = ctx.define_entity_type::<(Mass,)>().unwrap();
    let tagged = ctx.define_entity_type::<(Mass, Tag)>().unwrap();
    ctx.setup().unwrap();

    // Alternate types so every plain create has to slide a non-empty
    // tagged range.
    let mut entities = Vec::new();
    for i in 0..40u64 {
        let (entity_type, mass) = if i % 2 == 0 {
            (plain, Mass(i))
        } else {
            (tagged, Mass(100_000 + i))
        };
        let e = ctx.create(entity_type);
        *ctx.get_mut::<Mass>(e) = mass;
        entities.push((e, mass));
    }

    for &(e, expected) in &entities {
        assert_eq!(*ctx.get::<Mass>(e), expected);
    }
}

#[test]
fn churn_preserves_density_and_payloads() {
    let mut ctx = Context::new();
    let plain = ctx.define_entity_type::<(Mass,)>().unwrap();
    let tagged = ctx.define_entity_type::<(Mass, Tag)>().unwrap();
    let q_mass = ctx.define_query::<(Mass,)>().unwrap();
    ctx.setup().unwrap();

    let mut live: Vec<(Entity, Mass)> = Vec::new();
    let mut next = 0u64;

    // A deterministic create/destroy mix that keeps both ranges moving.
    for round in 0..200 {
        let entity_type = if round % 2 == 0 { plain } else { tagged };
        let e = ctx.create(entity_type);
        *ctx.get_mut::<Mass>(e) = Mass(next);
        live.push((e, Mass(next)));
        next += 1;

        if round % 3 == 0 && live.len() > 4 {
            let (victim, _) = live.remove(round % live.len());
            ctx.destroy(victim);
        }
    }

    for &(e, expected) in &live {
        assert!(ctx.is_alive(e));
        assert_eq!(*ctx.get::<Mass>(e), expected);
    }

    // Every live payload appears exactly once across the query's rows.
    let mut seen = Vec::new();
    ctx.run_query(q_mass, |(m,): (&mut Mass,)| seen.push(*m));
    assert_eq!(seen.len(), live.len());

    let mut expected: Vec<Mass> = live.iter().map(|&(_, m)| m).collect();
    expected.sort();
    seen.sort();
    assert_eq!(seen, expected);
}
