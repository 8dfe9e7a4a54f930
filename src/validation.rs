use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::components::{Direction, GridPos};
use crate::maze::Maze;
use crate::pathfinding;

/// Fraction of walkable cells that should be reachable from the entrance
/// before a warning is raised.
pub const REACHABILITY_WARNING_THRESHOLD: f32 = 0.8;

#[derive(Serialize, Clone, Debug, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

#[derive(Serialize, Clone, Debug)]
pub struct ValidationIssue {
    pub check: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl ValidationIssue {
    fn new(check: &str, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            check: check.to_string(),
            message: message.into(),
            details,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MazeStats {
    pub walkable_cells: usize,
    pub reachable_cells: usize,
    pub reachable_ratio: f32,
    pub dead_ends: usize,
    /// Independent cycles in the entrance's component.
    pub loops: usize,
    /// Steps on the shortest entrance-to-exit path.
    pub solution_length: Option<usize>,
}

/// True iff a BFS from the entrance reaches the exit on the entrance layer.
pub fn is_solvable(maze: &Maze) -> bool {
    pathfinding::find_path(maze.entrance, maze.exit, maze).is_some()
}

pub fn validate_structure(maze: &Maze) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if maze.width == 0 || maze.height == 0 {
        errors.push(ValidationIssue::new(
            "dimensions",
            "Maze dimensions must be positive",
            serde_json::json!({ "width": maze.width, "height": maze.height }),
        ));
    }

    if maze.layers.is_empty() {
        errors.push(ValidationIssue::new(
            "layers",
            "Maze has no layers",
            serde_json::json!({}),
        ));
    }

    for (layer, grid) in maze.layers.iter().enumerate() {
        if grid.len() != maze.height {
            errors.push(ValidationIssue::new(
                "grid_rows",
                format!("Layer {layer} has {} rows, expected {}", grid.len(), maze.height),
                serde_json::json!({ "layer": layer, "expected": maze.height, "actual": grid.len() }),
            ));
        }
        if let Some((row, len)) = grid
            .iter()
            .enumerate()
            .map(|(row, cells)| (row, cells.len()))
            .find(|(_, len)| *len != maze.width)
        {
            errors.push(ValidationIssue::new(
                "grid_columns",
                format!("Layer {layer} row {row} has {len} cells, expected {}", maze.width),
                serde_json::json!({ "layer": layer, "row": row, "expected": maze.width, "actual": len }),
            ));
        }
    }

    if maze.entrance == maze.exit {
        errors.push(ValidationIssue::new(
            "entrance_exit",
            "Entrance and exit share a cell",
            serde_json::json!({ "position": maze.entrance }),
        ));
    }

    for (name, pos) in [("entrance", maze.entrance), ("exit", maze.exit)] {
        if !maze.in_bounds(pos) {
            errors.push(ValidationIssue::new(
                "endpoints",
                format!("The {name} at ({},{}) is outside the maze", pos.x, pos.y),
                serde_json::json!({ "position": pos }),
            ));
        } else if !maze.is_walkable(pos) {
            errors.push(ValidationIssue::new(
                "endpoints",
                format!("The {name} at ({},{}) is not walkable", pos.x, pos.y),
                serde_json::json!({ "position": pos }),
            ));
        }
    }

    if errors.is_empty() && !is_solvable(maze) {
        errors.push(ValidationIssue::new(
            "solvable",
            format!(
                "Exit at ({},{}) not reachable from entrance",
                maze.exit.x, maze.exit.y
            ),
            serde_json::json!({ "entrance": maze.entrance, "exit": maze.exit }),
        ));
    }

    check_transitions(maze, &mut errors, &mut warnings);

    let asymmetric = count_asymmetric_edges(maze);
    if asymmetric > 0 {
        warnings.push(ValidationIssue::new(
            "wall_symmetry",
            format!("{asymmetric} shared edge(s) are walled on one side only"),
            serde_json::json!({ "count": asymmetric }),
        ));
    }

    let stats = maze_stats(maze);
    if stats.walkable_cells > 0 && stats.reachable_ratio < REACHABILITY_WARNING_THRESHOLD {
        warnings.push(ValidationIssue::new(
            "reachability",
            format!(
                "Only {:.0}% of walkable cells are reachable from the entrance",
                stats.reachable_ratio * 100.0
            ),
            serde_json::json!({
                "reachable": stats.reachable_cells,
                "walkable": stats.walkable_cells,
            }),
        ));
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_transitions(
    maze: &Maze,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let layer_count = maze.layer_count();
    for t in &maze.transitions {
        if t.from_layer >= layer_count || t.to_layer >= layer_count || t.from_layer == t.to_layer {
            errors.push(ValidationIssue::new(
                "transitions",
                format!("Transition {} -> {} references an invalid layer", t.from_layer, t.to_layer),
                serde_json::json!({ "transition": t }),
            ));
            continue;
        }
        if !maze.is_walkable_on(t.from_layer, t.position) || !maze.is_walkable_on(t.to_layer, t.position) {
            errors.push(ValidationIssue::new(
                "transitions",
                format!(
                    "Transition at ({},{}) does not land on walkable cells",
                    t.position.x, t.position.y
                ),
                serde_json::json!({ "transition": t }),
            ));
        }
        if !maze.transitions.contains(&t.reversed()) {
            errors.push(ValidationIssue::new(
                "transitions",
                format!(
                    "Transition at ({},{}) from layer {} to {} has no way back",
                    t.position.x, t.position.y, t.from_layer, t.to_layer
                ),
                serde_json::json!({ "transition": t }),
            ));
        }
    }

    let unreachable = unlinked_layers(maze);
    if !unreachable.is_empty() {
        warnings.push(ValidationIssue::new(
            "layer_links",
            format!("{} layer(s) cannot be reached through transitions", unreachable.len()),
            serde_json::json!({ "layers": unreachable }),
        ));
    }
}

/// Layers that no chain of transitions connects to the entrance layer.
pub fn unlinked_layers(maze: &Maze) -> Vec<usize> {
    let linked = layers_linked_to_entrance(maze);
    (0..maze.layer_count())
        .filter(|l| !linked.contains(l))
        .collect()
}

fn layers_linked_to_entrance(maze: &Maze) -> HashSet<usize> {
    let mut seen = HashSet::new();
    if maze.layers.is_empty() {
        return seen;
    }
    let mut queue = VecDeque::from([0usize]);
    seen.insert(0);
    while let Some(layer) = queue.pop_front() {
        for t in maze.transitions_from(layer) {
            if t.to_layer < maze.layer_count() && seen.insert(t.to_layer) {
                queue.push_back(t.to_layer);
            }
        }
    }
    seen
}

fn count_asymmetric_edges(maze: &Maze) -> usize {
    let mut count = 0;
    for layer in 0..maze.layer_count() {
        for y in 0..maze.height as i32 {
            for x in 0..maze.width as i32 {
                let pos = GridPos::new(x, y);
                let Some(cell) = maze.cell(layer, pos) else {
                    continue;
                };
                for dir in [Direction::East, Direction::South] {
                    if let Some(next) = maze.cell(layer, pos.step(dir)) {
                        if cell.walls.get(dir) != next.walls.get(dir.opposite()) {
                            count += 1;
                        }
                    }
                }
            }
        }
    }
    count
}

/// Structural metrics of the entrance layer.
pub fn maze_stats(maze: &Maze) -> MazeStats {
    let walkable_cells = maze
        .layers
        .first()
        .map(|grid| grid.iter().flatten().filter(|c| c.is_walkable()).count())
        .unwrap_or(0);
    let reachable = pathfinding::reachable_cells(maze, 0, maze.entrance);

    let mut dead_ends = 0;
    let mut edges = 0;
    for pos in &reachable {
        let exits = Direction::ALL
            .iter()
            .filter(|dir| maze.can_step(0, *pos, **dir))
            .count();
        if exits == 1 {
            dead_ends += 1;
        }
        edges += exits;
    }
    // Each edge was counted from both ends.
    let edges = edges / 2;
    let loops = if reachable.is_empty() {
        0
    } else {
        (edges + 1).saturating_sub(reachable.len())
    };

    MazeStats {
        walkable_cells,
        reachable_cells: reachable.len(),
        reachable_ratio: if walkable_cells == 0 {
            0.0
        } else {
            reachable.len() as f32 / walkable_cells as f32
        },
        dead_ends,
        loops,
        solution_length: pathfinding::find_path(maze.entrance, maze.exit, maze)
            .map(|p| p.len() - 1),
    }
}
