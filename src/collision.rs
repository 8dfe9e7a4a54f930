use bevy::math::Vec2;

use crate::components::GridPos;
use crate::maze::Maze;

/// Collidable border drawn inside each blocked cell edge, in pixels.
pub const WALL_THICKNESS: f32 = 2.0;
/// Half-extent of the moving entity's sampled bounding box.
pub const ENTITY_RADIUS: f32 = 12.0;
/// Pickup distance for collectibles and the exit.
pub const PICKUP_RADIUS: f32 = 20.0;
pub const DEFAULT_CELL_SIZE: f32 = 32.0;

/// Pixel-space queries against one layer of a maze. Positions include the
/// maze's screen offset; grid coordinates never do.
///
/// The detector knows nothing about abilities. Callers that let the ghost
/// phase through walls simply skip the wall checks.
#[derive(Clone, Copy)]
pub struct CollisionDetector<'m> {
    maze: &'m Maze,
    layer: usize,
    cell_size: f32,
    offset: Vec2,
}

impl<'m> CollisionDetector<'m> {
    pub fn new(maze: &'m Maze, cell_size: f32) -> Self {
        Self {
            maze,
            layer: 0,
            cell_size,
            offset: Vec2::ZERO,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn on_layer(mut self, layer: usize) -> Self {
        self.layer = layer;
        self
    }

    /// Point the detector at a different maze, e.g. after a level load.
    pub fn set_maze(&mut self, maze: &'m Maze) {
        self.maze = maze;
    }

    pub fn maze(&self) -> &'m Maze {
        self.maze
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn to_grid(&self, position: Vec2) -> GridPos {
        let local = position - self.offset;
        GridPos::new(
            (local.x / self.cell_size).floor() as i32,
            (local.y / self.cell_size).floor() as i32,
        )
    }

    pub fn cell_center(&self, pos: GridPos) -> Vec2 {
        Vec2::new(
            (pos.x as f32 + 0.5) * self.cell_size,
            (pos.y as f32 + 0.5) * self.cell_size,
        ) + self.offset
    }

    /// Off-grid, non-finite and non-walkable positions always collide.
    /// Inside a walkable cell, a point within `WALL_THICKNESS` of a blocked
    /// edge collides.
    pub fn check_wall_collision(&self, position: Vec2) -> bool {
        if !position.is_finite() {
            return true;
        }
        let grid = self.to_grid(position);
        let Some(cell) = self.maze.cell(self.layer, grid) else {
            return true;
        };
        if !cell.is_walkable() {
            return true;
        }

        let local = position - self.offset;
        let sub_x = local.x - grid.x as f32 * self.cell_size;
        let sub_y = local.y - grid.y as f32 * self.cell_size;
        let far_edge = self.cell_size - WALL_THICKNESS;

        (cell.walls.west && sub_x < WALL_THICKNESS)
            || (cell.walls.east && sub_x > far_edge)
            || (cell.walls.north && sub_y < WALL_THICKNESS)
            || (cell.walls.south && sub_y > far_edge)
    }

    /// Samples the center and the four corners of the entity's box at the
    /// candidate position; any collision blocks the move.
    pub fn can_move_to(&self, position: Vec2) -> bool {
        let r = ENTITY_RADIUS;
        [
            position,
            position + Vec2::new(-r, -r),
            position + Vec2::new(r, -r),
            position + Vec2::new(-r, r),
            position + Vec2::new(r, r),
        ]
        .into_iter()
        .all(|p| !self.check_wall_collision(p))
    }

    /// Indices (into `maze.collectibles`) of uncollected collectibles on this
    /// layer within pickup range. Coincident collectibles are all reported.
    pub fn check_collectible_collision(&self, position: Vec2) -> Vec<usize> {
        self.maze
            .collectibles
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_collected && c.layer == self.layer)
            .filter(|(_, c)| position.distance(self.cell_center(c.position)) <= PICKUP_RADIUS)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn check_exit_collision(&self, position: Vec2) -> bool {
        position.distance(self.cell_center(self.maze.exit)) <= PICKUP_RADIUS
    }
}
