//! Basic demonstration of the Burrow simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set RUST_LOG=burrow_sim=debug to watch assignments and digs.

use burrow_sim::render_bridge::{parse_gnome_count, snapshot_to_flatbuffer};
use burrow_sim::{logging, Command, SimResult, SimWorld, TaskPriority, TileCoord, WorldBuilder};

fn main() {
    logging::init(false);
    if let Err(err) = run() {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> SimResult<()> {
    println!("=== Burrow - Simulation Demo ===\n");

    let mut sim = WorldBuilder::flat(24, 12)
        .gnome(TileCoord::new(4, 5))
        .gnome(TileCoord::new(12, 5))
        .gnome(TileCoord::new(19, 5))
        .build()?;

    // Dig a trench along the surface and a shaft down from its middle.
    let mut tiles: Vec<TileCoord> = (3..21).map(|x| TileCoord::new(x, 6)).collect();
    tiles.extend((7..10).map(|y| TileCoord::new(11, y)));
    let created = sim.apply(Command::Dig {
        tiles,
        priority: TaskPriority::Normal,
    });
    sim.apply(Command::Dig {
        tiles: vec![TileCoord::new(12, 6)],
        priority: TaskPriority::Urgent,
    });
    println!("Designated {created} tiles for digging\n");

    print_terrain(&sim);

    // 20 seconds of frames at 60 FPS
    let frame = 1.0 / 60.0;
    for second in 1..=20 {
        for _ in 0..60 {
            sim.step(frame);
        }
        if second % 5 == 0 {
            println!("--- Tick {} ---", sim.current_tick());
            print_gnomes(&mut sim);
        }
    }

    // Pick up everything lying in the trench.
    let trench: Vec<TileCoord> = (1..23)
        .flat_map(|x| (6..10).map(move |y| TileCoord::new(x, y)))
        .collect();
    let pickups = sim.apply(Command::Collect {
        tiles: trench,
        priority: TaskPriority::High,
    });
    println!("\nOrdered {pickups} pickups\n");
    for _ in 0..1200 {
        sim.step(frame);
    }

    print_terrain(&sim);
    print_gnomes(&mut sim);

    let buffer = snapshot_to_flatbuffer(&sim.snapshot());
    println!(
        "\nRender buffer: {} floats for {:?} gnomes",
        buffer.len(),
        parse_gnome_count(&buffer)
    );

    let save = sim.save_json()?;
    let restored = SimWorld::load_json(&save)?;
    println!("Save is {} bytes; restored at tick {}", save.len(), restored.current_tick());

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty()?);
    Ok(())
}

fn print_terrain(sim: &SimWorld) {
    if let Some(terrain) = sim.terrain_snapshot() {
        for row in terrain.rows() {
            println!("  {row}");
        }
        println!();
    }
}

fn print_gnomes(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    for gnome in &snapshot.gnomes {
        println!(
            "  Gnome {}: pos=({:.1}, {:.1}) [{}] task={:?} carrying={}",
            gnome.id, gnome.x, gnome.y, gnome.state, gnome.task, gnome.carrying
        );
    }
    println!(
        "  {} tasks queued, {} items on the ground",
        snapshot.tasks.len(),
        snapshot.items.len()
    );
}
