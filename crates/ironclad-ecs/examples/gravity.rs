//! Falling bodies with a ground plane.
//!
//! A gravity system accelerates every body, a ground system destroys bodies
//! that fall below zero, and a listener logs each lifecycle event. Run with
//! `RUST_LOG=debug cargo run --example gravity` to see the world's own
//! tracing output as well.

use std::cell::Cell;
use std::rc::Rc;

use ironclad_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dy: f32,
}

/// Emitted by the ground system when a body lands.
#[derive(Debug)]
struct Landed {
    entity: EntityId,
    speed: f32,
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

struct Gravity {
    acceleration: f32,
}

impl EntitySystem for Gravity {
    fn tick(&self, world: &mut World, dt: f32) {
        world.each_with::<(Position, Velocity)>(false, |_entity, (position, velocity)| {
            let dy = velocity
                .with_mut(|v| {
                    v.dy += self.acceleration * dt;
                    v.dy
                })
                .unwrap_or_default();
            position.with_mut(|p| p.y += dy * dt);
        });
    }

    fn name(&self) -> &str {
        "gravity"
    }
}

#[derive(Default)]
struct Ground {
    landed: Cell<u32>,
}

impl EntitySystem for Ground {
    fn configure(self: Rc<Self>, world: &mut World) {
        world.subscribe::<Landed, _>(&self);
    }

    fn unconfigure(&self, world: &mut World) {
        world.unsubscribe_all(self);
    }

    fn tick(&self, world: &mut World, _dt: f32) {
        let mut landed = Vec::new();
        world.each_with::<(Position, Velocity)>(false, |entity, (position, velocity)| {
            let below = position.with(|p| p.y < 0.0).unwrap_or(false);
            if below {
                let speed = velocity.with(|v| v.dy.abs()).unwrap_or_default();
                landed.push(Landed {
                    entity: entity.id(),
                    speed,
                });
            }
        });
        for event in landed {
            let entity = event.entity;
            world.emit(event);
            world.destroy(entity);
        }
    }

    fn name(&self) -> &str {
        "ground"
    }
}

impl EventListener<Landed> for Ground {
    fn receive(&self, _world: &mut World, event: &Landed) {
        self.landed.set(self.landed.get() + 1);
        tracing::info!(entity = %event.entity, speed = event.speed, "landed");
    }
}

// ---------------------------------------------------------------------------
// Lifecycle logger
// ---------------------------------------------------------------------------

struct Logger;

impl EventListener<EntityCreated> for Logger {
    fn receive(&self, _world: &mut World, event: &EntityCreated) {
        tracing::info!(entity = %event.entity, "created");
    }
}

impl EventListener<EntityDestroyed> for Logger {
    fn receive(&self, world: &mut World, event: &EntityDestroyed) {
        let x = world
            .get_by_id(event.entity)
            .and_then(|e| e.get::<Position>().with(|p| p.x));
        tracing::info!(entity = %event.entity, ?x, "destroyed");
    }
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WorldConfig::from_json(r#"{ "entity_capacity": 16 }"#)?;
    let mut world = World::with_config(config);

    let logger = Rc::new(Logger);
    world.subscribe::<EntityCreated, _>(&logger);
    world.subscribe::<EntityDestroyed, _>(&logger);

    world.register_system(Rc::new(Gravity { acceleration: -9.8 }))?;
    let ground = world.register_system(Rc::new(Ground::default()))?;

    for i in 0..8 {
        let mut body = world.create()?;
        body.assign(Position {
            x: i as f32,
            y: 1.0 + i as f32 * 2.0,
        })?;
        body.assign(Velocity { dy: 0.0 })?;
    }

    let dt = 1.0 / 60.0;
    let mut steps = 0;
    while !world.is_empty() && steps < 600 {
        world.tick(dt);
        steps += 1;
    }
    // The last landings are still pending destroy.
    world.cleanup();

    tracing::info!(
        steps,
        landed = ground.landed.get(),
        remaining = world.entity_count(),
        "simulation finished"
    );
    Ok(())
}
