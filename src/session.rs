use bevy::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::abilities::{AbilitySystem, AbilityType};
use crate::collision::{CollisionDetector, WALL_THICKNESS};
use crate::components::{Direction, GridPos};
use crate::error::Result;
use crate::events::SessionEventBus;
use crate::generation::generate;
use crate::layers::LayerNavigator;
use crate::level::LevelConfig;
use crate::maze::Maze;
use crate::pathfinding;
use crate::puzzles::{PuzzleManager, PuzzleSolveContext};

/// Longest single collision-checked move. Anything larger could skip over a
/// wall band.
const MAX_SUBSTEP: f32 = WALL_THICKNESS;
/// Autopilot treats the ghost as centered within this distance.
const CENTER_EPSILON: f32 = 0.5;

/// One tick's worth of player intent.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionInput {
    /// Stick-style direction. Lengths above 1 are clamped; shorter vectors
    /// move proportionally slower.
    pub direction: Vec2,
    pub activate: Option<AbilityType>,
    pub use_transition: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TickReport {
    pub moved: bool,
    pub blocked: bool,
    pub activated: Option<AbilityType>,
    pub expired: Vec<AbilityType>,
    pub revealed: usize,
    pub collected: Vec<String>,
    pub layer_changed: Option<usize>,
    pub at_exit: bool,
    pub level_complete: bool,
}

/// All mutable state of one level in play.
#[derive(Resource)]
pub struct GameSession {
    pub level_id: String,
    maze: Maze,
    navigator: LayerNavigator,
    puzzles: PuzzleManager,
    abilities: AbilitySystem,
    inventory: Vec<String>,
    position: Vec2,
    last_safe_cell: GridPos,
    cell_size: f32,
    offset: Vec2,
    base_speed: f32,
    last_tick_ms: Option<u64>,
    completed: bool,
    pub events: SessionEventBus,
}

impl GameSession {
    pub fn from_level(level: &LevelConfig) -> Result<Self> {
        let maze = generate(&level.maze)?;
        Ok(Self::from_maze(maze, level))
    }

    /// Start a level on an existing maze. The ghost spawns at the center of
    /// the entrance cell on layer 0.
    pub fn from_maze(maze: Maze, level: &LevelConfig) -> Self {
        let navigator = LayerNavigator::new(&maze);
        let entrance = maze.entrance;
        let mut session = Self {
            level_id: level.level_id.clone(),
            maze,
            navigator,
            puzzles: PuzzleManager::new(level.puzzles.iter().cloned()),
            abilities: AbilitySystem::new(&level.abilities),
            inventory: Vec::new(),
            position: Vec2::ZERO,
            last_safe_cell: entrance,
            cell_size: level.cell_size,
            offset: level.offset(),
            base_speed: level.base_speed,
            last_tick_ms: None,
            completed: false,
            events: SessionEventBus::default(),
        };
        session.position = session.collision().cell_center(entrance);
        session
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn navigator(&self) -> &LayerNavigator {
        &self.navigator
    }

    pub fn puzzles(&self) -> &PuzzleManager {
        &self.puzzles
    }

    pub fn abilities(&self) -> &AbilitySystem {
        &self.abilities
    }

    pub fn inventory(&self) -> &[String] {
        &self.inventory
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn current_layer(&self) -> usize {
        self.navigator.current_layer()
    }

    pub fn grid_position(&self) -> GridPos {
        self.collision().to_grid(self.position)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Pixels per second with any active boost applied.
    pub fn speed(&self) -> f32 {
        self.base_speed * self.abilities.speed_multiplier()
    }

    /// Detector bound to the layer the ghost is on.
    pub fn collision(&self) -> CollisionDetector<'_> {
        CollisionDetector::new(&self.maze, self.cell_size)
            .with_offset(self.offset)
            .on_layer(self.navigator.current_layer())
    }

    /// Advance the level to `now` (milliseconds on the session clock).
    pub fn tick(&mut self, now: u64, input: &SessionInput) -> TickReport {
        let mut report = TickReport::default();
        let dt_ms = self
            .last_tick_ms
            .map_or(0, |last| now.saturating_sub(last));
        self.last_tick_ms = Some(now);
        self.events.advance_tick();

        report.expired = self.abilities.update(now);
        for ability in &report.expired {
            self.events
                .emit("ability_expired", json!({ "ability": ability.name() }), now);
        }
        if report.expired.contains(&AbilityType::Phase) {
            self.settle_after_phase();
        }

        if let Some(ability) = input.activate {
            if self.abilities.try_activate(ability, now) {
                report.activated = Some(ability);
                self.events
                    .emit("ability_activated", json!({ "ability": ability.name() }), now);
            }
        }

        let distance = self.speed() * dt_ms as f32 / 1000.0;
        let delta = input.direction.clamp_length_max(1.0) * distance;
        if delta != Vec2::ZERO {
            let travelled = self.move_ghost(delta);
            report.moved = travelled > 0.0;
            report.blocked = travelled + 1e-3 < delta.length();
        }

        report.revealed = self.sense_reveal();
        report.collected = self.pick_up_collectibles(now);

        if input.use_transition {
            let cell = self.grid_position();
            if self.navigator.use_transition(cell) {
                let layer = self.navigator.current_layer();
                report.layer_changed = Some(layer);
                if !self.collision().can_move_to(self.position) {
                    self.position = self.collision().cell_center(cell);
                }
                self.events.emit(
                    "layer_changed",
                    json!({ "layer": layer, "x": cell.x, "y": cell.y }),
                    now,
                );
            }
        }

        report.at_exit = self.collision().check_exit_collision(self.position);
        if report.at_exit && !self.completed && self.puzzles.are_all_puzzles_solved() {
            self.completed = true;
            self.events.emit(
                "level_complete",
                json!({
                    "level_id": self.level_id,
                    "collected": self.inventory.len(),
                    "puzzles_solved": self.puzzles.solved_count(),
                }),
                now,
            );
        }
        report.level_complete = self.completed;
        report
    }

    /// Returns the distance actually covered. Blocked substeps try each axis
    /// alone so the ghost slides along walls.
    fn move_ghost(&mut self, delta: Vec2) -> f32 {
        let phasing = self.abilities.can_phase();
        let detector = self.collision();
        let allowed = |p: Vec2| {
            if phasing {
                self.maze.in_bounds(detector.to_grid(p))
            } else {
                detector.can_move_to(p)
            }
        };

        let steps = (delta.length() / MAX_SUBSTEP).ceil().max(1.0) as u32;
        let sub = delta / steps as f32;
        let mut pos = self.position;
        let mut travelled = 0.0;
        for _ in 0..steps {
            let next = [sub, Vec2::new(sub.x, 0.0), Vec2::new(0.0, sub.y)]
                .into_iter()
                .filter(|d| *d != Vec2::ZERO)
                .map(|d| pos + d)
                .find(|p| allowed(*p));
            let Some(next) = next else {
                break;
            };
            travelled += pos.distance(next);
            pos = next;
        }

        let cell = detector.to_grid(pos);
        let safe = !phasing || detector.can_move_to(pos);
        self.position = pos;
        if safe {
            self.last_safe_cell = cell;
        }
        travelled
    }

    /// Phase ended with the ghost overlapping a wall: pull it back to the
    /// center of its cell, or of the last cell it stood in legally.
    fn settle_after_phase(&mut self) {
        let detector = self.collision();
        if detector.can_move_to(self.position) {
            return;
        }
        let cell = detector.to_grid(self.position);
        let layer = self.navigator.current_layer();
        let target = if self.maze.is_walkable_on(layer, cell) {
            cell
        } else {
            self.last_safe_cell
        };
        self.position = detector.cell_center(target);
    }

    fn sense_reveal(&mut self) -> usize {
        let center = self.grid_position();
        let layer = self.navigator.current_layer();
        let Some(sense) = self.abilities.get_mut(AbilityType::Sense) else {
            return 0;
        };
        let fresh = sense.reveal_around(center, self.maze.width, self.maze.height);
        for pos in &fresh {
            if let Some(cell) = self.maze.cell_mut(layer, *pos) {
                cell.is_revealed = true;
            }
        }
        fresh.len()
    }

    fn pick_up_collectibles(&mut self, now: u64) -> Vec<String> {
        let hits = self.collision().check_collectible_collision(self.position);
        let mut collected = Vec::new();
        for index in hits {
            if !self.maze.mark_collected(index) {
                continue;
            }
            let item = &self.maze.collectibles[index];
            self.events.emit(
                "collectible_collected",
                json!({ "id": item.id, "kind": item.kind, "layer": item.layer }),
                now,
            );
            self.inventory.push(item.id.clone());
            collected.push(item.id.clone());
        }
        collected
    }

    pub fn solve_context(&self, now: u64) -> PuzzleSolveContext {
        PuzzleSolveContext {
            player_position: self.grid_position(),
            inventory: self.inventory.clone(),
            possessed_object_id: self
                .abilities
                .get(AbilityType::Possess)
                .and_then(|a| a.possessed_object_id())
                .map(str::to_string),
            timestamp: Some(now),
        }
    }

    pub fn attempt_puzzle(&mut self, id: &str, now: u64) -> bool {
        let ctx = self.solve_context(now);
        let was_solved = self.puzzles.is_solved(id);
        let solved = self.puzzles.attempt_solve_puzzle(id, &ctx, &mut self.maze);
        if solved && !was_solved {
            self.events.emit(
                "puzzle_solved",
                json!({ "id": id, "solved": self.puzzles.solved_count(), "total": self.puzzles.len() }),
                now,
            );
        }
        solved
    }

    pub fn perform_action(&mut self, id: &str, action: &str) -> bool {
        self.puzzles.add_action(id, action)
    }

    pub fn activate_timing_puzzle(&mut self, id: &str, now: u64) -> bool {
        self.puzzles.activate_timing(id, now)
    }

    /// Needs a running Possess ability and an obstacle with this id on the
    /// ghost's layer.
    pub fn possess(&mut self, object_id: &str) -> bool {
        let layer = self.navigator.current_layer();
        let exists = self
            .maze
            .obstacle(object_id)
            .is_some_and(|o| o.layer == layer);
        exists
            && self
                .abilities
                .get_mut(AbilityType::Possess)
                .is_some_and(|a| a.possess_object(object_id))
    }

    /// First move toward the exit from the ghost's cell on its layer.
    pub fn hint(&self) -> Option<Direction> {
        pathfinding::next_step(
            &self.maze,
            self.navigator.current_layer(),
            self.grid_position(),
            self.maze.exit,
        )
    }

    /// Input direction that walks cell center to cell center toward the exit.
    /// Drift across the hinted axis is corrected first; along the axis the
    /// ghost keeps going, arriving at each target exactly.
    pub fn autopilot_direction(&self, dt_ms: u64) -> Vec2 {
        let detector = self.collision();
        let cell = detector.to_grid(self.position);
        let to_center = detector.cell_center(cell) - self.position;
        let target = match self.hint() {
            Some(dir) => {
                let (dx, dy) = dir.delta();
                let axis = Vec2::new(dx as f32, dy as f32);
                let across = to_center - axis * to_center.dot(axis);
                if across.length() > CENTER_EPSILON {
                    self.position + across
                } else {
                    detector.cell_center(cell.step(dir))
                }
            }
            None if to_center.length() > CENTER_EPSILON => self.position + to_center,
            None => return Vec2::ZERO,
        };
        let step = self.speed() * dt_ms as f32 / 1000.0;
        if step <= 0.0 {
            return Vec2::ZERO;
        }
        ((target - self.position) / step).clamp_length_max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::PICKUP_RADIUS;
    use crate::components::{Collectible, LayerTransition, MazeType, Obstacle};
    use crate::puzzles::Puzzle;

    const EAST: Vec2 = Vec2::new(1.0, 0.0);

    fn level(base_speed: f32) -> LevelConfig {
        LevelConfig {
            base_speed,
            ..LevelConfig::default()
        }
    }

    fn walk(direction: Vec2) -> SessionInput {
        SessionInput {
            direction,
            ..SessionInput::default()
        }
    }

    /// 3x1 corridor, entrance west, exit east.
    fn corridor() -> Maze {
        let mut maze = Maze::new(
            MazeType::Standard,
            3,
            1,
            1,
            GridPos::new(0, 0),
            GridPos::new(2, 0),
        );
        maze.open_wall(0, GridPos::new(0, 0), Direction::East);
        maze.open_wall(0, GridPos::new(1, 0), Direction::East);
        maze
    }

    fn soul(id: &str, x: i32) -> Collectible {
        Collectible {
            id: id.to_string(),
            kind: "soul_fragment".to_string(),
            position: GridPos::new(x, 0),
            layer: 0,
            is_collected: false,
        }
    }

    #[test]
    fn spawns_at_entrance_center() {
        let session = GameSession::from_maze(corridor(), &level(100.0));
        assert_eq!(session.position(), Vec2::new(16.0, 16.0));
        assert_eq!(session.grid_position(), GridPos::new(0, 0));
        assert_eq!(session.current_layer(), 0);
    }

    #[test]
    fn walking_to_exit_completes_level_once() {
        let mut session = GameSession::from_maze(corridor(), &level(1000.0));
        session.tick(0, &walk(EAST));
        let report = session.tick(100, &walk(EAST));
        assert!(report.moved);
        assert!(report.blocked);
        assert!(report.at_exit);
        assert!(report.level_complete);
        // Stopped by the east boundary's wall band.
        assert!(session.position().x <= 3.0 * 32.0 - WALL_THICKNESS - 12.0);
        session.tick(200, &walk(EAST));
        assert_eq!(session.events.count("level_complete"), 1);
    }

    #[test]
    fn walls_block_movement() {
        let maze = Maze::new(
            MazeType::Standard,
            2,
            1,
            1,
            GridPos::new(0, 0),
            GridPos::new(1, 0),
        );
        let mut session = GameSession::from_maze(maze, &level(1000.0));
        session.tick(0, &walk(EAST));
        let report = session.tick(500, &walk(EAST));
        assert!(report.blocked);
        assert_eq!(session.grid_position(), GridPos::new(0, 0));
        assert!(!report.at_exit);
    }

    #[test]
    fn phase_passes_walls_and_settles_on_expiry() {
        let maze = Maze::new(
            MazeType::Standard,
            2,
            1,
            1,
            GridPos::new(0, 0),
            GridPos::new(1, 0),
        );
        let mut session = GameSession::from_maze(maze, &level(400.0));
        let report = session.tick(
            0,
            &SessionInput {
                activate: Some(AbilityType::Phase),
                ..SessionInput::default()
            },
        );
        assert_eq!(report.activated, Some(AbilityType::Phase));
        session.tick(100, &walk(EAST));
        assert_eq!(session.position(), Vec2::new(56.0, 16.0));
        assert_eq!(session.grid_position(), GridPos::new(1, 0));

        // Bounds still hold while phasing.
        session.tick(1000, &walk(EAST));
        assert!(session.position().x < 64.0);

        let report = session.tick(3100, &SessionInput::default());
        assert_eq!(report.expired, vec![AbilityType::Phase]);
        assert_eq!(session.position(), Vec2::new(48.0, 16.0));
        assert_eq!(session.events.count("ability_expired"), 1);
    }

    #[test]
    fn activation_is_refused_while_cooling_down() {
        let mut session = GameSession::from_maze(corridor(), &level(100.0));
        let phase = SessionInput {
            activate: Some(AbilityType::Phase),
            ..SessionInput::default()
        };
        assert!(session.tick(0, &phase).activated.is_some());
        assert!(session.tick(3500, &phase).activated.is_none());
        assert!(session.tick(5000, &phase).activated.is_some());
        assert_eq!(session.events.count("ability_activated"), 2);
    }

    #[test]
    fn speed_boost_scales_distance() {
        let mut plain = GameSession::from_maze(corridor(), &level(100.0));
        plain.tick(0, &walk(EAST));
        plain.tick(100, &walk(EAST));
        assert!((plain.position().x - 26.0).abs() < 1e-3);

        let mut boosted = GameSession::from_maze(corridor(), &level(100.0));
        boosted.tick(
            0,
            &SessionInput {
                direction: EAST,
                activate: Some(AbilityType::SpeedBoost),
                use_transition: false,
            },
        );
        boosted.tick(100, &walk(EAST));
        assert!((boosted.position().x - 31.0).abs() < 1e-3);
    }

    #[test]
    fn collectibles_go_into_inventory() {
        let mut maze = corridor();
        maze.collectibles.push(soul("soul_a", 1));
        maze.collectibles.push(soul("soul_b", 1));
        let mut session = GameSession::from_maze(maze, &level(320.0));
        session.tick(0, &walk(EAST));
        let report = session.tick(100, &walk(EAST));
        assert_eq!(report.collected, vec!["soul_a".to_string(), "soul_b".to_string()]);
        assert_eq!(session.inventory(), ["soul_a".to_string(), "soul_b".to_string()]);
        assert!(session.maze().collectibles.iter().all(|c| c.is_collected));
        assert!(session.tick(150, &SessionInput::default()).collected.is_empty());
        assert_eq!(session.events.count("collectible_collected"), 2);
    }

    #[test]
    fn exit_waits_for_puzzles() {
        let mut maze = corridor();
        maze.collectibles.push(soul("key", 1));
        let mut cfg = level(320.0);
        cfg.puzzles
            .push(Puzzle::collection("vault", GridPos::new(2, 0), &["key"]));
        let mut session = GameSession::from_maze(maze, &cfg);

        assert!(!session.attempt_puzzle("vault", 0));
        session.tick(0, &walk(EAST));
        assert_eq!(session.tick(100, &walk(EAST)).collected, vec!["key".to_string()]);
        let report = session.tick(200, &walk(EAST));
        assert!(report.at_exit);
        assert!(!report.level_complete);

        assert!(session.attempt_puzzle("vault", 250));
        assert!(session.tick(300, &SessionInput::default()).level_complete);
        assert_eq!(session.events.count("puzzle_solved"), 1);
    }

    #[test]
    fn possession_feeds_puzzle_context() {
        let mut maze = corridor();
        maze.obstacles.push(Obstacle {
            id: "urn".to_string(),
            position: GridPos::new(2, 0),
            layer: 0,
        });
        let mut cfg = level(100.0);
        cfg.puzzles
            .push(Puzzle::possession("altar", GridPos::new(1, 0), "urn"));
        let mut session = GameSession::from_maze(maze, &cfg);

        assert!(!session.possess("urn"));
        session.tick(
            0,
            &SessionInput {
                activate: Some(AbilityType::Possess),
                ..SessionInput::default()
            },
        );
        assert!(!session.possess("ghost_chair"));
        assert!(session.possess("urn"));
        assert!(session.attempt_puzzle("altar", 10));
    }

    #[test]
    fn sequence_actions_route_through_session() {
        let mut cfg = level(100.0);
        cfg.puzzles
            .push(Puzzle::sequence("bells", GridPos::new(1, 0), &["low", "high"]));
        let mut session = GameSession::from_maze(corridor(), &cfg);
        assert!(session.perform_action("bells", "low"));
        assert!(session.perform_action("bells", "high"));
        assert!(!session.perform_action("missing", "low"));
        assert!(session.attempt_puzzle("bells", 0));
    }

    #[test]
    fn transition_moves_between_layers() {
        let mut maze = Maze::new(
            MazeType::MultiLayer,
            2,
            1,
            2,
            GridPos::new(0, 0),
            GridPos::new(1, 0),
        );
        let up = LayerTransition {
            position: GridPos::new(0, 0),
            from_layer: 0,
            to_layer: 1,
        };
        maze.transitions.push(up);
        maze.transitions.push(up.reversed());
        let mut session = GameSession::from_maze(maze, &level(100.0));
        let jump = SessionInput {
            use_transition: true,
            ..SessionInput::default()
        };
        assert_eq!(session.tick(0, &jump).layer_changed, Some(1));
        assert_eq!(session.current_layer(), 1);
        assert_eq!(session.tick(10, &jump).layer_changed, Some(0));
        assert_eq!(session.events.count("layer_changed"), 2);
    }

    #[test]
    fn sense_reveals_cells_around_ghost() {
        let mut session = GameSession::from_maze(corridor(), &level(100.0));
        let report = session.tick(
            0,
            &SessionInput {
                activate: Some(AbilityType::Sense),
                ..SessionInput::default()
            },
        );
        // Radius 3 around (0,0) covers the whole corridor and nothing past it.
        assert_eq!(report.revealed, 3);
        assert!(session.maze().grid()[0].iter().all(|c| c.is_revealed));
    }

    #[test]
    fn hint_points_down_the_corridor() {
        let session = GameSession::from_maze(corridor(), &level(100.0));
        assert_eq!(session.hint(), Some(Direction::East));
    }

    #[test]
    fn autopilot_keeps_heading_and_turns_corners() {
        let mut maze = Maze::new(
            MazeType::Standard,
            2,
            2,
            1,
            GridPos::new(0, 0),
            GridPos::new(1, 1),
        );
        maze.open_wall(0, GridPos::new(0, 0), Direction::East);
        maze.open_wall(0, GridPos::new(1, 0), Direction::South);
        let mut session = GameSession::from_maze(maze, &level(96.0));
        let dt = 50;
        let mut now = 0;
        session.tick(now, &SessionInput::default());

        let mut last_x = session.position().x;
        for _ in 0..200 {
            let direction = session.autopilot_direction(dt);
            now += dt;
            let report = session.tick(now, &walk(direction));
            assert!(!report.blocked, "stuck at {:?}", session.position());
            assert!(session.position().x >= last_x - 1e-3);
            last_x = session.position().x;
            if report.level_complete {
                break;
            }
        }
        assert!(session.is_complete());
        assert!((session.position().x - 48.0).abs() < 1e-3);
    }

    #[test]
    fn autopilot_reaches_exit_of_generated_level() {
        let mut session = GameSession::from_level(&LevelConfig::default()).unwrap();
        let dt = 50;
        let mut now = 0;
        session.tick(now, &SessionInput::default());
        for _ in 0..4000 {
            let direction = session.autopilot_direction(dt);
            now += dt;
            if session.tick(now, &walk(direction)).level_complete {
                break;
            }
        }
        assert!(session.is_complete());
        let exit = session.collision().cell_center(session.maze().exit);
        assert!(session.position().distance(exit) <= PICKUP_RADIUS);
    }
}
