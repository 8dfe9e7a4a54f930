use std::collections::HashSet;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng as _, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::{MazeError, Result};
use crate::maze::Maze;
use crate::pathfinding;
use crate::validation;

/// Whole-maze attempts before giving up with `GenerationFailure`.
pub const MAX_GENERATION_ATTEMPTS: u32 = 10;
/// Random draws per obstacle or collectible before that item is skipped.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 50;
/// Share of cells that get an extra opening at difficulty 0.
const LOOP_DENSITY: f32 = 0.15;

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct MazeConfig {
    #[serde(rename = "type")]
    pub maze_type: MazeType,
    pub difficulty: f32,
    pub width: usize,
    pub height: usize,
    pub layers: usize,
    pub obstacle_count: usize,
    pub collectible_count: usize,
    pub seed: u64,
    pub template: Option<String>,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            maze_type: MazeType::Standard,
            difficulty: 0.5,
            width: 10,
            height: 8,
            layers: 1,
            obstacle_count: 0,
            collectible_count: 3,
            seed: 42,
            template: None,
        }
    }
}

struct Rng(SmallRng);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.0.gen_range(0..len)
    }

    fn cell(&mut self, width: usize, height: usize) -> GridPos {
        GridPos::new(self.index(width) as i32, self.index(height) as i32)
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.0);
    }
}

/// Build a maze whose exit is reachable from its entrance. Attempt `k`
/// reseeds with `seed + k`; identical configs give identical mazes.
pub fn generate(config: &MazeConfig) -> Result<Maze> {
    if config.width < 2 || config.height < 2 || config.layers < 1 {
        return Err(MazeError::GenerationFailure {
            attempts: 0,
            reason: format!(
                "{}x{} with {} layer(s) cannot hold a distinct entrance and exit",
                config.width, config.height, config.layers
            ),
        });
    }

    let mut last_reason = String::new();
    for attempt in 0..MAX_GENERATION_ATTEMPTS {
        let mut rng = Rng::new(config.seed.wrapping_add(attempt as u64));
        let maze = build_maze(config, &mut rng);
        match check_playable(&maze) {
            Ok(()) => return Ok(maze),
            Err(reason) => last_reason = reason,
        }
    }

    Err(MazeError::GenerationFailure {
        attempts: MAX_GENERATION_ATTEMPTS,
        reason: last_reason,
    })
}

fn check_playable(maze: &Maze) -> std::result::Result<(), String> {
    let report = validation::validate_structure(maze);
    if let Some(err) = report.errors.first() {
        return Err(err.message.clone());
    }
    for layer in 1..maze.layer_count() {
        if pathfinding::find_path_on_layer(maze, layer, maze.entrance, maze.exit).is_none() {
            return Err(format!("Layer {layer} has no entrance-to-exit path"));
        }
    }
    let unlinked = validation::unlinked_layers(maze);
    if !unlinked.is_empty() {
        return Err(format!("Layers {unlinked:?} are not linked to the entrance layer"));
    }
    Ok(())
}

fn normalized_difficulty(difficulty: f32) -> f32 {
    if difficulty.is_finite() {
        difficulty.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

fn build_maze(config: &MazeConfig, rng: &mut Rng) -> Maze {
    let layers = config.layers.max(1);
    let maze_type = if layers > 1 && config.maze_type == MazeType::Standard {
        MazeType::MultiLayer
    } else {
        config.maze_type
    };
    let mut maze = Maze::new(
        maze_type,
        config.width,
        config.height,
        layers,
        GridPos::new(0, 0),
        GridPos::new(config.width as i32 - 1, config.height as i32 - 1),
    );
    let difficulty = normalized_difficulty(config.difficulty);

    for layer in 0..layers {
        match config.template.as_deref() {
            Some("prim") => carve_prim(&mut maze, layer, rng),
            _ => carve_backtracker(&mut maze, layer, rng),
        }
        add_loops(&mut maze, layer, difficulty, rng);
    }

    if layers > 1 {
        place_transitions(&mut maze, difficulty, rng);
    }
    place_obstacles(&mut maze, config.obstacle_count, rng);
    place_collectibles(&mut maze, config.collectible_count, rng);
    maze
}

fn cell_index(maze: &Maze, pos: GridPos) -> usize {
    pos.y as usize * maze.width + pos.x as usize
}

/// Randomized depth-first carve from the entrance: a spanning tree with long
/// corridors and many dead ends.
fn carve_backtracker(maze: &mut Maze, layer: usize, rng: &mut Rng) {
    let mut visited = vec![false; maze.width * maze.height];
    let start = maze.entrance;
    visited[cell_index(maze, start)] = true;
    let mut stack = vec![start];

    while let Some(&current) = stack.last() {
        let options: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|dir| {
                let next = current.step(*dir);
                maze.in_bounds(next) && !visited[cell_index(maze, next)]
            })
            .collect();
        if options.is_empty() {
            stack.pop();
            continue;
        }
        let dir = options[rng.index(options.len())];
        let next = current.step(dir);
        maze.open_wall(layer, current, dir);
        visited[cell_index(maze, next)] = true;
        stack.push(next);
    }
}

/// Randomized Prim: grow the tree from a random frontier edge each step,
/// giving shorter, bushier branches than the backtracker.
fn carve_prim(maze: &mut Maze, layer: usize, rng: &mut Rng) {
    let mut in_maze = vec![false; maze.width * maze.height];
    let mut frontier: Vec<(GridPos, Direction)> = Vec::new();

    absorb_cell(maze, maze.entrance, &mut in_maze, &mut frontier);
    while !frontier.is_empty() {
        let pick = rng.index(frontier.len());
        let (from, dir) = frontier.swap_remove(pick);
        let to = from.step(dir);
        if in_maze[cell_index(maze, to)] {
            continue;
        }
        maze.open_wall(layer, from, dir);
        absorb_cell(maze, to, &mut in_maze, &mut frontier);
    }
}

fn absorb_cell(
    maze: &Maze,
    pos: GridPos,
    in_maze: &mut [bool],
    frontier: &mut Vec<(GridPos, Direction)>,
) {
    in_maze[cell_index(maze, pos)] = true;
    for dir in Direction::ALL {
        let next = pos.step(dir);
        if maze.in_bounds(next) && !in_maze[cell_index(maze, next)] {
            frontier.push((pos, dir));
        }
    }
}

/// Knock out extra walls to create shortcuts. The candidate order is always
/// shuffled in full, so for one seed a lower difficulty opens a superset of
/// the walls a higher difficulty opens.
fn add_loops(maze: &mut Maze, layer: usize, difficulty: f32, rng: &mut Rng) {
    let cells = maze.width * maze.height;
    let target = ((1.0 - difficulty) * LOOP_DENSITY * cells as f32).round() as usize;

    let mut candidates = Vec::new();
    for y in 0..maze.height as i32 {
        for x in 0..maze.width as i32 {
            let pos = GridPos::new(x, y);
            for dir in [Direction::East, Direction::South] {
                let walled = maze.cell(layer, pos).is_some_and(|c| c.walls.get(dir));
                if walled && maze.in_bounds(pos.step(dir)) {
                    candidates.push((pos, dir));
                }
            }
        }
    }
    rng.shuffle(&mut candidates);

    for (pos, dir) in candidates.into_iter().take(target) {
        maze.open_wall(layer, pos, dir);
    }
}

/// Link each pair of adjacent layers with reciprocal transitions. Every pair
/// gets one before any pair gets extras; easier mazes get up to two extras.
/// When a small grid runs out of free cells, a pair reuses the cell of the
/// pair below it, so one cell can chain several layers.
fn place_transitions(maze: &mut Maze, difficulty: f32, rng: &mut Rng) {
    let mut free: Vec<GridPos> = (0..maze.height as i32)
        .flat_map(|y| (0..maze.width as i32).map(move |x| GridPos::new(x, y)))
        .filter(|pos| *pos != maze.entrance && *pos != maze.exit)
        .collect();
    rng.shuffle(&mut free);

    let pairs = maze.layer_count() - 1;
    let extras = ((1.0 - difficulty) * 2.0).round() as usize;
    let mut last_used: Option<GridPos> = None;
    for round in 0..=extras {
        for lower in 0..pairs {
            if round > 0 && free.len() < pairs {
                return;
            }
            let Some(position) = free.pop().or(last_used) else {
                return;
            };
            last_used = Some(position);
            let up = LayerTransition {
                position,
                from_layer: lower,
                to_layer: lower + 1,
            };
            maze.transitions.push(up);
            maze.transitions.push(up.reversed());
        }
    }
}

fn occupied(maze: &Maze, layer: usize, pos: GridPos) -> bool {
    pos == maze.entrance
        || pos == maze.exit
        || maze.transitions.iter().any(|t| t.position == pos)
        || maze
            .obstacles
            .iter()
            .any(|o| o.layer == layer && o.position == pos)
        || maze
            .collectibles
            .iter()
            .any(|c| c.layer == layer && c.position == pos)
}

/// Obstacles go on the entrance layer. A draw that would cut the exit or a
/// transition point off from the entrance is rolled back.
fn place_obstacles(maze: &mut Maze, count: usize, rng: &mut Rng) {
    for _ in 0..count {
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let pos = rng.cell(maze.width, maze.height);
            if occupied(maze, 0, pos) {
                continue;
            }
            maze.set_cell_type(0, pos, CellType::Obstacle);
            if entrance_layer_connected(maze) {
                maze.obstacles.push(Obstacle {
                    id: format!("obstacle_{}", maze.obstacles.len()),
                    position: pos,
                    layer: 0,
                });
                break;
            }
            maze.set_cell_type(0, pos, CellType::Empty);
        }
    }
}

fn entrance_layer_connected(maze: &Maze) -> bool {
    let reachable = pathfinding::reachable_cells(maze, 0, maze.entrance);
    reachable.contains(&maze.exit)
        && maze
            .transitions_from(0)
            .all(|t| reachable.contains(&t.position))
}

/// Collectibles cycle through the layers and only land on cells the player
/// can walk to on that layer.
fn place_collectibles(maze: &mut Maze, count: usize, rng: &mut Rng) {
    let reachable: Vec<HashSet<GridPos>> = (0..maze.layer_count())
        .map(|layer| {
            let start = if layer == 0 {
                Some(maze.entrance)
            } else {
                maze.transitions
                    .iter()
                    .find(|t| t.to_layer == layer)
                    .map(|t| t.position)
            };
            start
                .map(|pos| pathfinding::reachable_cells(maze, layer, pos))
                .unwrap_or_default()
        })
        .collect();

    for i in 0..count {
        let layer = i % maze.layer_count();
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let pos = rng.cell(maze.width, maze.height);
            if occupied(maze, layer, pos) || !reachable[layer].contains(&pos) {
                continue;
            }
            maze.collectibles.push(Collectible {
                id: format!("collectible_{}", maze.collectibles.len()),
                kind: "soul_fragment".to_string(),
                position: pos,
                layer,
                is_collected: false,
            });
            break;
        }
    }
}
