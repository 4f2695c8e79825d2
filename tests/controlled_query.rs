use dense_ecs::{Context, Entity, EntityTypeId, Query};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

fn world_with(n: usize) -> (Context, EntityTypeId, Query<(Position,)>, Vec<Entity>) {
    let mut ctx = Context::new();
    let p_type = ctx.define_entity_type::<(Position,)>().unwrap();
    let q_p = ctx.define_query::<(Position,)>().unwrap();
    ctx.setup().unwrap();

    let mut entities = Vec::new();
    for i in 0..n {
        let e = ctx.create(p_type);
        *ctx.get_mut::<Position>(e) = Position { x: i as f32, y: 0.0 };
        entities.push(e);
    }
    (ctx, p_type, q_p, entities)
}

#[test]
fn destroying_current_visits_everyone_once() {
    let (mut ctx, p_type, q_p, entities) = world_with(10);

    let mut destroyed = Vec::new();
    ctx.run_query_controlled(q_p, |ctl, (_p,): (&mut Position,)| {
        let current = ctl.current();
        ctl.destroy(current);
        destroyed.push(current);
    });

    assert_eq!(destroyed.len(), 10, "the swap-in instance must not be skipped");
    for e in &entities {
        assert!(!ctx.is_alive(*e));
    }
    assert_eq!(ctx.alive_count(p_type), 0);

    // Every original entity was seen exactly once.
    destroyed.sort_by_key(|e| e.index);
    let mut originals = entities.clone();
    originals.sort_by_key(|e| e.index);
    assert_eq!(destroyed, originals);
}

#[test]
fn current_identity_matches_visited_payload() {
    let (mut ctx, _p_type, q_p, _entities) = world_with(8);

    ctx.run_query_controlled(q_p, |ctl, (p,): (&mut Position,)| {
        let current = ctl.current();
        assert!(ctl.is_alive(current));
        // The handle resolves to the same instance the visitor received.
        assert_eq!(current.index as f32, p.x);
    });
}

#[test]
fn entities_created_mid_iteration_are_visited() {
    let (mut ctx, p_type, q_p, _entities) = world_with(10);

    let mut visits = 0;
    let mut created = 0;
    ctx.run_query_controlled(q_p, |ctl, (_p,): (&mut Position,)| {
        visits += 1;
        if created < 3 {
            let e = ctl.create(p_type);
            assert!(ctl.is_alive(e));
            created += 1;
        }
    });

    assert_eq!(visits, 13, "appended entities extend the current statement");
    assert_eq!(ctx.alive_count(p_type), 13);
}

#[test]
fn destroying_the_tail_shrinks_the_scan() {
    let (mut ctx, p_type, q_p, entities) = world_with(5);

    // Destroying the tail is the swap-free sibling case: no instance
    // relocates, the scan just ends one row earlier.
    let tail = *entities.last().unwrap();
    let mut visits = 0;
    ctx.run_query_controlled(q_p, |ctl, (_p,): (&mut Position,)| {
        visits += 1;
        if ctl.is_alive(tail) && ctl.current() != tail {
            ctl.destroy(tail);
        }
    });

    assert_eq!(visits, 4, "the destroyed tail entity is never visited");
    assert_eq!(ctx.alive_count(p_type), 4);
}

#[test]
fn destroying_a_visited_sibling_leaves_the_swapped_row_unvisited() {
    let (mut ctx, p_type, q_p, entities) = world_with(5);

    let first = entities[0];
    let tail = *entities.last().unwrap();
    let mut visited = Vec::new();
    ctx.run_query_controlled(q_p, |ctl, (p,): (&mut Position,)| {
        visited.push(p.x);
        // On the second row, destroy the already-visited first entity. The
        // swap-remove moves the tail instance into row 0, behind the
        // cursor; per the QueryControl::destroy contract that instance is
        // not visited again this run.
        if ctl.current() == entities[1] {
            ctl.destroy(first);
        }
    });

    assert_eq!(visited, vec![0.0, 1.0, 2.0, 3.0], "the relocated tail row is skipped");
    assert!(!visited.contains(&(tail.index as f32)));

    // The skipped entity was never destroyed; only the targeted one was.
    assert!(!ctx.is_alive(first));
    assert!(ctx.is_alive(tail));
    assert_eq!(*ctx.get::<Position>(tail), Position { x: 4.0, y: 0.0 });
    assert_eq!(ctx.alive_count(p_type), 4);
}

#[test]
fn nested_resume_consumes_the_remainder() {
    let (mut ctx, _p_type, q_p, _entities) = world_with(5);

    let mut outer = Vec::new();
    let mut nested = Vec::new();
    ctx.run_query_controlled(q_p, |ctl, (p,): (&mut Position,)| {
        outer.push(p.x);
        if outer.len() == 1 {
            ctl.resume(|_ctl, (p,): (&mut Position,)| {
                nested.push(p.x);
            });
        }
    });

    assert_eq!(outer.len(), 1, "the nested run advanced the shared cursor past the end");
    assert_eq!(nested.len(), 4, "resume starts at the row after the current one");

    let mut all: Vec<f32> = outer.iter().chain(&nested).copied().collect();
    all.sort_by(f32::total_cmp);
    assert_eq!(all, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn controlled_queries_span_multiple_entity_types() {
    let mut ctx = Context::new();
    let a_type = ctx.define_entity_type::<(Position,)>().unwrap();

    #[derive(Clone, Copy)]
    struct Marker(u8);
    let b_type = ctx.define_entity_type::<(Position, Marker)>().unwrap();
    let q_p = ctx.define_query::<(Position,)>().unwrap();
    ctx.setup().unwrap();

    for _ in 0..4 {
        ctx.create(a_type);
    }
    for _ in 0..3 {
        ctx.create(b_type);
    }

    // Destroy every entity of both types from inside the query.
    let mut visits = 0;
    ctx.run_query_controlled(q_p, |ctl, (_p,): (&mut Position,)| {
        visits += 1;
        let current = ctl.current();
        ctl.destroy(current);
    });

    assert_eq!(visits, 7);
    assert_eq!(ctx.alive_count(a_type), 0);
    assert_eq!(ctx.alive_count(b_type), 0);
}
