#![allow(dead_code)]

use dense_ecs::{Context, EntityTypeId, Query};

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy)]
pub struct Wealth {
    pub value: f32,
}

pub struct World {
    pub ctx: Context,
    pub agent: EntityTypeId,
    pub scenery: EntityTypeId,
    pub q_move: Query<(Position, Velocity)>,
    pub q_wealth: Query<(Wealth,)>,
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

pub fn make_world() -> World {
    let mut ctx = Context::new();
    let agent = ctx.define_entity_type::<(Position, Velocity, Wealth)>().unwrap();
    let scenery = ctx.define_entity_type::<(Position,)>().unwrap();
    let q_move = ctx.define_query::<(Position, Velocity)>().unwrap();
    let q_wealth = ctx.define_query::<(Wealth,)>().unwrap();
    ctx.setup().unwrap();
    World { ctx, agent, scenery, q_move, q_wealth }
}

pub fn populate(world: &mut World, agent_count: usize) {
    for i in 0..agent_count {
        let e = world.ctx.create(world.agent);
        *world.ctx.get_mut::<Position>(e) = Position { x: i as f32, y: 0.0 };
        *world.ctx.get_mut::<Velocity>(e) = Velocity { dx: 1.0, dy: 0.5 };
        *world.ctx.get_mut::<Wealth>(e) = Wealth { value: 100.0 };
    }
}
