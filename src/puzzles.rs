use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::GridPos;
use crate::maze::Maze;

/// Snapshot of player state a puzzle attempt is judged against.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PuzzleSolveContext {
    pub player_position: GridPos,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub possessed_object_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PuzzleKind {
    /// Solved while the player possesses a specific object.
    Possession { target_object_id: String },
    /// Solved once the performed actions equal `required_sequence`, in order.
    Sequence {
        required_sequence: Vec<String>,
        #[serde(default)]
        current_sequence: Vec<String>,
    },
    /// Solvable only inside `[window_start_ms, window_end_ms]` after activation.
    Timing {
        window_start_ms: u64,
        window_end_ms: u64,
        #[serde(default)]
        activated_at: Option<u64>,
    },
    /// Solved when the inventory holds every required item.
    Collection { required_items: Vec<String> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub position: GridPos,
    #[serde(default)]
    pub layer: usize,
    /// Cells opened on all four sides when the puzzle is first solved.
    #[serde(default)]
    pub unlocks_path: Vec<GridPos>,
    #[serde(default)]
    pub is_solved: bool,
    #[serde(flatten)]
    pub kind: PuzzleKind,
}

impl Puzzle {
    pub fn new(id: impl Into<String>, position: GridPos, kind: PuzzleKind) -> Self {
        Self {
            id: id.into(),
            position,
            layer: 0,
            unlocks_path: Vec::new(),
            is_solved: false,
            kind,
        }
    }

    pub fn possession(id: impl Into<String>, position: GridPos, target: impl Into<String>) -> Self {
        Self::new(
            id,
            position,
            PuzzleKind::Possession {
                target_object_id: target.into(),
            },
        )
    }

    pub fn sequence(id: impl Into<String>, position: GridPos, required: &[&str]) -> Self {
        Self::new(
            id,
            position,
            PuzzleKind::Sequence {
                required_sequence: required.iter().map(|s| s.to_string()).collect(),
                current_sequence: Vec::new(),
            },
        )
    }

    pub fn timing(id: impl Into<String>, position: GridPos, window_start_ms: u64, window_end_ms: u64) -> Self {
        Self::new(
            id,
            position,
            PuzzleKind::Timing {
                window_start_ms,
                window_end_ms,
                activated_at: None,
            },
        )
    }

    pub fn collection(id: impl Into<String>, position: GridPos, required: &[&str]) -> Self {
        Self::new(
            id,
            position,
            PuzzleKind::Collection {
                required_items: required.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    pub fn with_unlocks(mut self, cells: impl IntoIterator<Item = GridPos>) -> Self {
        self.unlocks_path = cells.into_iter().collect();
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PuzzleKind::Possession { .. } => "possession",
            PuzzleKind::Sequence { .. } => "sequence",
            PuzzleKind::Timing { .. } => "timing",
            PuzzleKind::Collection { .. } => "collection",
        }
    }

    /// The ids, actions or items this puzzle asks for.
    pub fn required_assets(&self) -> Vec<String> {
        match &self.kind {
            PuzzleKind::Possession { target_object_id } => vec![target_object_id.clone()],
            PuzzleKind::Sequence {
                required_sequence, ..
            } => required_sequence.clone(),
            PuzzleKind::Timing { .. } => Vec::new(),
            PuzzleKind::Collection { required_items } => required_items.clone(),
        }
    }

    /// Unsolved -> Solved. Once solved, every attempt returns true without
    /// looking at the context again.
    pub fn attempt_solve(&mut self, ctx: &PuzzleSolveContext) -> bool {
        if self.is_solved {
            return true;
        }
        let solved = match &self.kind {
            PuzzleKind::Possession { target_object_id } => {
                ctx.possessed_object_id.as_deref() == Some(target_object_id.as_str())
            }
            PuzzleKind::Sequence {
                required_sequence,
                current_sequence,
            } => current_sequence == required_sequence,
            PuzzleKind::Timing {
                window_start_ms,
                window_end_ms,
                activated_at,
            } => match (activated_at, ctx.timestamp) {
                (Some(start), Some(now)) if now >= *start => {
                    let elapsed = now - start;
                    elapsed >= *window_start_ms && elapsed <= *window_end_ms
                }
                _ => false,
            },
            PuzzleKind::Collection { required_items } => {
                let held: HashSet<&str> = ctx.inventory.iter().map(String::as_str).collect();
                required_items.iter().all(|item| held.contains(item.as_str()))
            }
        };
        if solved {
            self.is_solved = true;
        }
        solved
    }

    /// Record one action on a sequence puzzle. Returns false when the action
    /// broke the sequence: the accumulated actions are discarded, and the
    /// wrong action itself starts a new attempt if it is the first required
    /// one. Non-sequence puzzles reject actions.
    pub fn add_action(&mut self, action: &str) -> bool {
        if self.is_solved {
            return matches!(self.kind, PuzzleKind::Sequence { .. });
        }
        let PuzzleKind::Sequence {
            required_sequence,
            current_sequence,
        } = &mut self.kind
        else {
            return false;
        };
        current_sequence.push(action.to_string());
        if required_sequence.starts_with(current_sequence.as_slice()) {
            return true;
        }
        current_sequence.clear();
        if required_sequence.first().map(String::as_str) == Some(action) {
            current_sequence.push(action.to_string());
        }
        false
    }

    /// Start a timing puzzle's clock. Re-activating restarts it.
    pub fn activate(&mut self, timestamp: u64) -> bool {
        match &mut self.kind {
            PuzzleKind::Timing { activated_at, .. } if !self.is_solved => {
                *activated_at = Some(timestamp);
                true
            }
            _ => false,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        match &self.kind {
            PuzzleKind::Timing {
                window_end_ms,
                activated_at: Some(start),
                ..
            } => now.saturating_sub(*start) > *window_end_ms,
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.is_solved = false;
        match &mut self.kind {
            PuzzleKind::Sequence {
                current_sequence, ..
            } => current_sequence.clear(),
            PuzzleKind::Timing { activated_at, .. } => *activated_at = None,
            PuzzleKind::Possession { .. } | PuzzleKind::Collection { .. } => {}
        }
    }
}

/// Owns every puzzle of a level and applies their unlocks to the maze.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PuzzleManager {
    puzzles: HashMap<String, Puzzle>,
}

impl PuzzleManager {
    pub fn new(puzzles: impl IntoIterator<Item = Puzzle>) -> Self {
        let mut manager = Self::default();
        for puzzle in puzzles {
            manager.add_puzzle(puzzle);
        }
        manager
    }

    /// Replaces (and returns) any puzzle already registered under the id.
    pub fn add_puzzle(&mut self, puzzle: Puzzle) -> Option<Puzzle> {
        self.puzzles.insert(puzzle.id.clone(), puzzle)
    }

    pub fn get(&self, id: &str) -> Option<&Puzzle> {
        self.puzzles.get(id)
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    /// Puzzle ids in a stable order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.puzzles.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_solved(&self, id: &str) -> bool {
        self.puzzles.get(id).is_some_and(|p| p.is_solved)
    }

    /// Unknown ids fail. On the first transition to solved, every cell in
    /// `unlocks_path` is opened on the puzzle's layer; later attempts leave
    /// the maze alone.
    pub fn attempt_solve_puzzle(&mut self, id: &str, ctx: &PuzzleSolveContext, maze: &mut Maze) -> bool {
        let Some(puzzle) = self.puzzles.get_mut(id) else {
            return false;
        };
        let was_solved = puzzle.is_solved;
        let solved = puzzle.attempt_solve(ctx);
        if solved && !was_solved {
            for pos in &puzzle.unlocks_path {
                maze.unlock_cell(puzzle.layer, *pos);
            }
        }
        solved
    }

    pub fn add_action(&mut self, id: &str, action: &str) -> bool {
        self.puzzles
            .get_mut(id)
            .is_some_and(|p| p.add_action(action))
    }

    pub fn activate_timing(&mut self, id: &str, timestamp: u64) -> bool {
        self.puzzles
            .get_mut(id)
            .is_some_and(|p| p.activate(timestamp))
    }

    pub fn expired_puzzles(&self, now: u64) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .puzzles
            .values()
            .filter(|p| !p.is_solved && p.is_expired(now))
            .map(|p| p.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Walls opened by an earlier solve stay open.
    pub fn reset_puzzle(&mut self, id: &str) -> bool {
        match self.puzzles.get_mut(id) {
            Some(puzzle) => {
                puzzle.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&mut self) {
        for puzzle in self.puzzles.values_mut() {
            puzzle.reset();
        }
    }

    pub fn solved_count(&self) -> usize {
        self.puzzles.values().filter(|p| p.is_solved).count()
    }

    /// Vacuously true for a level without puzzles.
    pub fn are_all_puzzles_solved(&self) -> bool {
        self.puzzles.values().all(|p| p.is_solved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Direction, MazeType};

    fn ctx_at(timestamp: u64) -> PuzzleSolveContext {
        PuzzleSolveContext {
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    fn closed_maze() -> Maze {
        Maze::new(
            MazeType::Puzzle,
            4,
            4,
            1,
            GridPos::new(0, 0),
            GridPos::new(3, 3),
        )
    }

    #[test]
    fn timing_window_is_inclusive_and_relative_to_activation() {
        let attempt = |t: u64| {
            let mut puzzle = Puzzle::timing("clock", GridPos::new(1, 1), 1000, 2000);
            assert!(puzzle.activate(0));
            puzzle.attempt_solve(&ctx_at(t))
        };
        assert!(attempt(1500));
        assert!(attempt(1000));
        assert!(attempt(2000));
        assert!(!attempt(500));
        assert!(!attempt(2500));
    }

    #[test]
    fn timing_requires_activation_and_expires() {
        let mut puzzle = Puzzle::timing("clock", GridPos::new(1, 1), 1000, 2000);
        assert!(!puzzle.attempt_solve(&ctx_at(1500)));
        assert!(!puzzle.is_expired(99_999));
        puzzle.activate(500);
        assert!(!puzzle.is_expired(2500));
        assert!(puzzle.is_expired(2501));
        assert!(!puzzle.attempt_solve(&PuzzleSolveContext::default()));
    }

    #[test]
    fn possession_matches_target_id() {
        let mut puzzle = Puzzle::possession("statue", GridPos::new(2, 2), "obstacle_0");
        let mut ctx = PuzzleSolveContext::default();
        assert!(!puzzle.attempt_solve(&ctx));
        ctx.possessed_object_id = Some("obstacle_1".to_string());
        assert!(!puzzle.attempt_solve(&ctx));
        ctx.possessed_object_id = Some("obstacle_0".to_string());
        assert!(puzzle.attempt_solve(&ctx));
        assert_eq!(puzzle.required_assets(), vec!["obstacle_0".to_string()]);
    }

    #[test]
    fn collection_uses_set_semantics() {
        let mut puzzle = Puzzle::collection("altar", GridPos::new(0, 1), &["a", "b", "a"]);
        let mut ctx = PuzzleSolveContext {
            inventory: vec!["b".to_string()],
            ..Default::default()
        };
        assert!(!puzzle.attempt_solve(&ctx));
        ctx.inventory = vec!["c".into(), "b".into(), "b".into(), "a".into()];
        assert!(puzzle.attempt_solve(&ctx));
    }

    #[test]
    fn sequence_solves_in_order_only() {
        let mut puzzle = Puzzle::sequence("bells", GridPos::new(1, 2), &["low", "high", "mid"]);
        assert!(puzzle.add_action("low"));
        assert!(puzzle.add_action("high"));
        assert!(!puzzle.attempt_solve(&PuzzleSolveContext::default()));
        assert!(puzzle.add_action("mid"));
        assert!(puzzle.attempt_solve(&PuzzleSolveContext::default()));
    }

    #[test]
    fn sequence_mismatch_discards_progress() {
        let mut puzzle = Puzzle::sequence("bells", GridPos::new(1, 2), &["low", "high", "mid"]);
        assert!(puzzle.add_action("low"));
        assert!(!puzzle.add_action("mid"));
        match &puzzle.kind {
            PuzzleKind::Sequence {
                current_sequence, ..
            } => assert!(current_sequence.is_empty()),
            _ => unreachable!(),
        }
        // A wrong action that is the opening move restarts the attempt.
        assert!(puzzle.add_action("low"));
        assert!(!puzzle.add_action("low"));
        assert!(puzzle.add_action("high"));
        assert!(puzzle.add_action("mid"));
        assert!(puzzle.attempt_solve(&PuzzleSolveContext::default()));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut seq = Puzzle::sequence("bells", GridPos::new(1, 2), &["low"]);
        seq.add_action("low");
        assert!(seq.attempt_solve(&PuzzleSolveContext::default()));
        seq.reset();
        assert!(!seq.is_solved);
        assert!(!seq.attempt_solve(&PuzzleSolveContext::default()));

        let mut timing = Puzzle::timing("clock", GridPos::new(1, 1), 0, 10);
        timing.activate(5);
        timing.reset();
        assert_eq!(
            timing.kind,
            PuzzleKind::Timing {
                window_start_ms: 0,
                window_end_ms: 10,
                activated_at: None
            }
        );
    }

    #[test]
    fn non_sequence_puzzles_reject_actions_and_activation() {
        let mut puzzle = Puzzle::collection("altar", GridPos::new(0, 1), &["a"]);
        assert!(!puzzle.add_action("low"));
        assert!(!puzzle.activate(0));
        assert!(!puzzle.is_expired(1_000_000));
    }

    #[test]
    fn manager_unlocks_path_on_first_solve_only() {
        let mut maze = closed_maze();
        let target = GridPos::new(1, 1);
        let mut manager = PuzzleManager::new([
            Puzzle::collection("altar", GridPos::new(0, 0), &["key"]).with_unlocks([target])
        ]);
        let ctx = PuzzleSolveContext {
            inventory: vec!["key".to_string()],
            ..Default::default()
        };

        assert!(manager.attempt_solve_puzzle("altar", &ctx, &mut maze));
        let cell = maze.get_cell(target).unwrap();
        assert_eq!(cell.walls.open_count(), 4);
        for dir in Direction::ALL {
            assert!(maze.can_step(0, target.step(dir), dir.opposite()));
        }

        // Re-close one side; a repeat attempt must not reopen it.
        maze.layers[0][1][1].walls.north = true;
        assert!(manager.attempt_solve_puzzle("altar", &PuzzleSolveContext::default(), &mut maze));
        assert!(maze.get_cell(target).unwrap().walls.north);
    }

    #[test]
    fn manager_tracks_global_completion() {
        let mut maze = closed_maze();
        let mut manager = PuzzleManager::default();
        assert!(manager.are_all_puzzles_solved());
        manager.add_puzzle(Puzzle::sequence("bells", GridPos::new(1, 2), &["low"]));
        manager.add_puzzle(Puzzle::timing("clock", GridPos::new(2, 1), 0, 100));
        assert!(!manager.are_all_puzzles_solved());
        assert_eq!(manager.ids(), vec!["bells", "clock"]);

        assert!(!manager.attempt_solve_puzzle("missing", &ctx_at(0), &mut maze));
        assert!(manager.add_action("bells", "low"));
        assert!(manager.attempt_solve_puzzle("bells", &ctx_at(0), &mut maze));
        assert_eq!(manager.solved_count(), 1);

        assert!(manager.activate_timing("clock", 1000));
        assert_eq!(manager.expired_puzzles(1200), vec!["clock"]);
        assert!(manager.attempt_solve_puzzle("clock", &ctx_at(1050), &mut maze));
        assert!(manager.are_all_puzzles_solved());

        manager.reset_all();
        assert_eq!(manager.solved_count(), 0);
        assert!(!manager.reset_puzzle("missing"));
    }

    #[test]
    fn puzzles_deserialize_from_level_json() {
        let json = r#"[
            { "id": "statue", "type": "possession", "position": { "x": 2, "y": 3 },
              "target_object_id": "obstacle_0", "unlocks_path": [{ "x": 4, "y": 4 }] },
            { "id": "bells", "type": "sequence", "position": { "x": 1, "y": 1 },
              "required_sequence": ["low", "high"] },
            { "id": "clock", "type": "timing", "position": { "x": 0, "y": 1 },
              "window_start_ms": 1000, "window_end_ms": 2000 },
            { "id": "altar", "type": "collection", "position": { "x": 5, "y": 1 }, "layer": 1,
              "required_items": ["collectible_0"] }
        ]"#;
        let puzzles: Vec<Puzzle> = serde_json::from_str(json).unwrap();
        let kinds: Vec<&str> = puzzles.iter().map(Puzzle::kind_name).collect();
        assert_eq!(kinds, vec!["possession", "sequence", "timing", "collection"]);
        assert_eq!(puzzles[0].unlocks_path, vec![GridPos::new(4, 4)]);
        assert_eq!(puzzles[3].layer, 1);
        assert!(puzzles.iter().all(|p| !p.is_solved));
    }
}
