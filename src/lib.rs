pub mod abilities;
pub mod collision;
pub mod components;
pub mod error;
pub mod events;
pub mod generation;
pub mod layers;
pub mod level;
pub mod maze;
pub mod pathfinding;
pub mod plugin;
pub mod puzzles;
pub mod session;
pub mod validation;

pub use abilities::{Ability, AbilityConfig, AbilityEffect, AbilitySystem, AbilityType};
pub use collision::CollisionDetector;
pub use components::{
    Cell, CellType, Collectible, Direction, GridPos, LayerTransition, MazeType, Obstacle, Walls,
};
pub use error::{MazeError, Result};
pub use generation::{generate, MazeConfig};
pub use layers::LayerNavigator;
pub use level::LevelConfig;
pub use maze::Maze;
pub use plugin::GhostMazePlugin;
pub use puzzles::{Puzzle, PuzzleKind, PuzzleManager, PuzzleSolveContext};
pub use session::{GameSession, SessionInput, TickReport};
pub use validation::{validate_structure, MazeStats, ValidationReport};
