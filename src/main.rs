use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use ghost_maze::level::resolve_level_config;
use ghost_maze::plugin::{Autopilot, GhostMazePlugin, RunLimit};

const TICK_HZ: f64 = 60.0;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn main() -> AppExit {
    let args: Vec<String> = std::env::args().collect();
    let autopilot = args.iter().any(|a| a == "--autopilot");
    let max_ticks = match arg_value(&args, "--frames") {
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                eprintln!("[GhostMaze] Ignoring invalid --frames value: {}", raw);
                None
            }
        },
        None => None,
    };

    let level = resolve_level_config();
    println!(
        "[GhostMaze] Starting level '{}' in HEADLESS mode{}",
        level.level_id,
        if autopilot { " (autopilot)" } else { "" }
    );

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_secs_f64(1.0 / TICK_HZ),
        )))
        .add_plugins(bevy::log::LogPlugin::default())
        .insert_resource(Time::<Fixed>::from_hz(TICK_HZ))
        .insert_resource(level)
        .insert_resource(Autopilot(autopilot))
        .insert_resource(RunLimit {
            max_ticks,
            ..default()
        })
        .add_plugins(GhostMazePlugin)
        .run()
}
