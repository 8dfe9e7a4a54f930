use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

const DEFAULT_LEVEL: &str = "levels/default.json";

/// Reject level files the game could never start. Field types are checked
/// again when the level is deserialized at runtime.
fn check_level(path: &str, raw: &str) -> Result<(), String> {
    let level: Value = serde_json::from_str(raw).map_err(|e| format!("{path}: {e}"))?;
    let Some(level) = level.as_object() else {
        return Err(format!("{path}: level must be a JSON object"));
    };
    if let Some(cell_size) = level.get("cell_size").and_then(Value::as_f64) {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(format!("{path}: cell_size must be positive, got {cell_size}"));
        }
    }
    if let Some(maze) = level.get("maze").and_then(Value::as_object) {
        for (key, min) in [("width", 2), ("height", 2), ("layers", 1)] {
            if let Some(value) = maze.get(key).and_then(Value::as_u64) {
                if value < min {
                    return Err(format!("{path}: maze.{key} must be at least {min}, got {value}"));
                }
            }
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-env-changed=GHOST_MAZE_EMBED_LEVEL_PATH");

    let path = env::var("GHOST_MAZE_EMBED_LEVEL_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    println!("cargo:rerun-if-changed={path}");

    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read embedded level {path}: {e}"));
    if let Err(reason) = check_level(&path, &content) {
        panic!("invalid embedded level {reason}");
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let out_path = Path::new(&out_dir).join("ghost_maze_embedded_level.json");
    fs::write(out_path, content).expect("failed to write embedded level data");
}
