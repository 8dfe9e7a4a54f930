use bevy::math::Vec2;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::abilities::AbilityConfig;
use crate::collision::DEFAULT_CELL_SIZE;
use crate::error::{MazeError, Result};
use crate::generation::{MazeConfig, MAX_GENERATION_ATTEMPTS};
use crate::puzzles::Puzzle;

const EMBEDDED_LEVEL: &str =
    include_str!(concat!(env!("OUT_DIR"), "/ghost_maze_embedded_level.json"));

/// Everything needed to start one playable level. `{}` is a valid level.
#[derive(Resource, Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct LevelConfig {
    pub level_id: String,
    pub cell_size: f32,
    /// Screen-space position of the grid's top-left corner.
    pub maze_offset: [f32; 2],
    /// Ghost speed in pixels per second before boosts.
    pub base_speed: f32,
    pub maze: MazeConfig,
    pub puzzles: Vec<Puzzle>,
    pub abilities: Vec<AbilityConfig>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            level_id: "level_1".to_string(),
            cell_size: DEFAULT_CELL_SIZE,
            maze_offset: [0.0, 0.0],
            base_speed: 96.0,
            maze: MazeConfig::default(),
            puzzles: Vec::new(),
            abilities: Vec::new(),
        }
    }
}

impl LevelConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::from(self.maze_offset)
    }

    /// Settings for a second try after generation gave up: no obstacles,
    /// maximum loops, a fresh seed range and a grid of at least 2x2.
    pub fn relaxed(&self) -> Self {
        let mut relaxed = self.clone();
        relaxed.maze.width = relaxed.maze.width.max(2);
        relaxed.maze.height = relaxed.maze.height.max(2);
        relaxed.maze.layers = relaxed.maze.layers.max(1);
        relaxed.maze.obstacle_count = 0;
        relaxed.maze.difficulty = 0.0;
        relaxed.maze.seed = relaxed
            .maze
            .seed
            .wrapping_add(u64::from(MAX_GENERATION_ATTEMPTS));
        relaxed
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            self.maze.seed = seed;
        }
        self
    }
}

pub fn load_level_config(path: &str) -> Result<LevelConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| MazeError::ConfigIo {
        path: path.to_string(),
        source,
    })?;
    LevelConfig::from_json(&contents)
}

/// The level baked in at build time (`levels/default.json` unless
/// `GHOST_MAZE_EMBED_LEVEL_PATH` names another), or the default level if it
/// does not deserialize.
pub fn embedded_level_config() -> LevelConfig {
    match LevelConfig::from_json(EMBEDDED_LEVEL) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[GhostMaze level] Embedded level is invalid: {}", e);
            LevelConfig::default()
        }
    }
}

fn seed_override() -> Option<u64> {
    std::env::var("GHOST_MAZE_SEED")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Level file named by `GHOST_MAZE_LEVEL` (default `level.json`), falling
/// back to the embedded level. Runs before the logger exists.
pub fn resolve_level_config() -> LevelConfig {
    let path = std::env::var("GHOST_MAZE_LEVEL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "level.json".to_string());
    let cfg = match load_level_config(&path) {
        Ok(cfg) => {
            println!("[GhostMaze level] Loaded level config from {}", path);
            cfg
        }
        Err(MazeError::ConfigIo { .. }) => embedded_level_config(),
        Err(e) => {
            eprintln!("[GhostMaze level] Failed to parse {}: {}", path, e);
            embedded_level_config()
        }
    };
    cfg.with_seed(seed_override())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzles::PuzzleKind;

    #[test]
    fn empty_object_is_the_default_level() {
        let cfg = LevelConfig::from_json("{}").unwrap();
        assert_eq!(cfg.level_id, "level_1");
        assert_eq!(cfg.cell_size, DEFAULT_CELL_SIZE);
        assert_eq!((cfg.maze.width, cfg.maze.height), (10, 8));
        assert_eq!(cfg.maze.seed, 42);
        assert!(cfg.puzzles.is_empty());
    }

    #[test]
    fn parses_puzzles_and_abilities() {
        let cfg = LevelConfig::from_json(
            r#"{
                "level_id": "crypt",
                "maze_offset": [64.0, 32.0],
                "maze": { "type": "puzzle", "width": 12, "height": 9, "seed": 7 },
                "puzzles": [
                    { "id": "bell", "position": { "x": 2, "y": 3 },
                      "type": "sequence", "required_sequence": ["ring", "ring", "knock"] },
                    { "id": "gate", "position": { "x": 5, "y": 5 },
                      "type": "timing", "window_start_ms": 1000, "window_end_ms": 2000,
                      "unlocks_path": [{ "x": 6, "y": 5 }] }
                ],
                "abilities": [{ "ability": "sense", "reveal_radius": 5.0 }]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.level_id, "crypt");
        assert_eq!(cfg.offset(), Vec2::new(64.0, 32.0));
        assert_eq!(cfg.maze.seed, 7);
        assert_eq!(cfg.puzzles.len(), 2);
        assert!(matches!(cfg.puzzles[0].kind, PuzzleKind::Sequence { .. }));
        assert_eq!(cfg.puzzles[1].unlocks_path.len(), 1);
        assert_eq!(cfg.abilities[0].reveal_radius, Some(5.0));
    }

    #[test]
    fn bundled_level_starts_a_session() {
        let cfg = LevelConfig::from_json(include_str!("../levels/default.json")).unwrap();
        assert_eq!(cfg.level_id, "haunted_hall");
        assert_eq!((cfg.maze.width, cfg.maze.height), (12, 9));
        assert_eq!(cfg.abilities.len(), 2);
        let session = crate::session::GameSession::from_level(&cfg).unwrap();
        assert!((1..=4).contains(&session.maze().collectibles.len()));
    }

    #[test]
    fn embedded_level_is_well_formed() {
        assert!(LevelConfig::from_json(EMBEDDED_LEVEL).is_ok());
        assert!(embedded_level_config().cell_size > 0.0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_level_config("/definitely/not/here/level.json").unwrap_err();
        assert!(matches!(err, MazeError::ConfigIo { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = LevelConfig::from_json("{ \"cell_size\": \"big\" }").unwrap_err();
        assert!(matches!(err, MazeError::ConfigParse(_)));
    }

    #[test]
    fn relaxed_drops_obstacles_and_reseeds() {
        let mut cfg = LevelConfig::default();
        cfg.maze.obstacle_count = 9;
        cfg.maze.difficulty = 1.0;
        cfg.maze.width = 1;
        let relaxed = cfg.relaxed();
        assert_eq!(relaxed.maze.obstacle_count, 0);
        assert_eq!(relaxed.maze.difficulty, 0.0);
        assert_eq!(relaxed.maze.width, 2);
        assert_ne!(relaxed.maze.seed, cfg.maze.seed);
    }

    #[test]
    fn seed_override_replaces_seed() {
        let cfg = LevelConfig::default().with_seed(Some(99));
        assert_eq!(cfg.maze.seed, 99);
        assert_eq!(LevelConfig::default().with_seed(None).maze.seed, 42);
    }
}
