use std::collections::{hash_map::Entry, HashMap, HashSet, VecDeque};

use crate::components::{Direction, GridPos};
use crate::maze::Maze;

/// Shortest path (in steps) on the entrance layer, inclusive of both ends.
pub fn find_path(start: GridPos, end: GridPos, maze: &Maze) -> Option<Vec<GridPos>> {
    find_path_on_layer(maze, 0, start, end)
}

/// BFS over the implicit walkable graph of one layer. Neighbors are explored
/// in `Direction::ALL` order, so equal-length paths resolve the same way for
/// identical inputs. Disconnected or out-of-bounds endpoints yield `None`.
pub fn find_path_on_layer(
    maze: &Maze,
    layer: usize,
    start: GridPos,
    end: GridPos,
) -> Option<Vec<GridPos>> {
    if !maze.is_walkable_on(layer, start) || !maze.is_walkable_on(layer, end) {
        return None;
    }

    let mut visited: HashMap<GridPos, Option<GridPos>> = HashMap::new();
    let mut queue = VecDeque::new();
    visited.insert(start, None);
    queue.push_back(start);

    while let Some(pos) = queue.pop_front() {
        if pos == end {
            return Some(reconstruct_path(&visited, end));
        }
        for dir in Direction::ALL {
            if maze.can_step(layer, pos, dir) {
                enqueue_if_new(&mut visited, &mut queue, pos.step(dir), pos);
            }
        }
    }

    None
}

/// Every cell reachable from `from` on `layer`, including `from` itself.
pub fn reachable_cells(maze: &Maze, layer: usize, from: GridPos) -> HashSet<GridPos> {
    let mut seen = HashSet::new();
    if !maze.is_walkable_on(layer, from) {
        return seen;
    }
    let mut queue = VecDeque::new();
    seen.insert(from);
    queue.push_back(from);
    while let Some(pos) = queue.pop_front() {
        for dir in Direction::ALL {
            if maze.can_step(layer, pos, dir) {
                let next = pos.step(dir);
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    seen
}

/// First move along the shortest path, for hint collaborators.
pub fn next_step(maze: &Maze, layer: usize, from: GridPos, to: GridPos) -> Option<Direction> {
    let path = find_path_on_layer(maze, layer, from, to)?;
    let next = *path.get(1)?;
    Direction::ALL
        .into_iter()
        .find(|dir| from.step(*dir) == next)
}

fn insert_parent_if_new(
    visited: &mut HashMap<GridPos, Option<GridPos>>,
    node: GridPos,
    parent: GridPos,
) -> bool {
    match visited.entry(node) {
        Entry::Vacant(entry) => {
            entry.insert(Some(parent));
            true
        }
        Entry::Occupied(_) => false,
    }
}

fn enqueue_if_new(
    visited: &mut HashMap<GridPos, Option<GridPos>>,
    queue: &mut VecDeque<GridPos>,
    node: GridPos,
    parent: GridPos,
) -> bool {
    if insert_parent_if_new(visited, node, parent) {
        queue.push_back(node);
        return true;
    }
    false
}

fn reconstruct_path(visited: &HashMap<GridPos, Option<GridPos>>, goal: GridPos) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(Some(parent)) = visited.get(&current) {
        path.push(*parent);
        current = *parent;
    }
    path.reverse();
    path
}
