use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::validation;

/// One layer of cells, indexed `[row][col]`.
pub type Grid = Vec<Vec<Cell>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Maze {
    #[serde(default)]
    pub maze_type: MazeType,
    pub width: usize,
    pub height: usize,
    /// Layer 0 is the entrance's layer.
    pub layers: Vec<Grid>,
    pub entrance: GridPos,
    pub exit: GridPos,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub collectibles: Vec<Collectible>,
    #[serde(default)]
    pub transitions: Vec<LayerTransition>,
}

pub fn closed_grid(width: usize, height: usize) -> Grid {
    (0..height)
        .map(|y| {
            (0..width)
                .map(|x| Cell::new(GridPos::new(x as i32, y as i32)))
                .collect()
        })
        .collect()
}

impl Maze {
    /// A maze with every wall standing on every layer.
    pub fn new(
        maze_type: MazeType,
        width: usize,
        height: usize,
        layer_count: usize,
        entrance: GridPos,
        exit: GridPos,
    ) -> Self {
        Self {
            maze_type,
            width,
            height,
            layers: (0..layer_count.max(1))
                .map(|_| closed_grid(width, height))
                .collect(),
            entrance,
            exit,
            obstacles: Vec::new(),
            collectibles: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The entrance layer's grid.
    pub fn grid(&self) -> &Grid {
        &self.layers[0]
    }

    pub fn layer_grid(&self, layer: usize) -> Option<&Grid> {
        self.layers.get(layer)
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    pub fn cell(&self, layer: usize, pos: GridPos) -> Option<&Cell> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        self.layers
            .get(layer)?
            .get(pos.y as usize)?
            .get(pos.x as usize)
    }

    pub fn cell_mut(&mut self, layer: usize, pos: GridPos) -> Option<&mut Cell> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        self.layers
            .get_mut(layer)?
            .get_mut(pos.y as usize)?
            .get_mut(pos.x as usize)
    }

    pub fn get_cell(&self, pos: GridPos) -> Option<&Cell> {
        self.cell(0, pos)
    }

    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.is_walkable_on(0, pos)
    }

    pub fn is_walkable_on(&self, layer: usize, pos: GridPos) -> bool {
        self.cell(layer, pos).is_some_and(Cell::is_walkable)
    }

    /// A step is legal when neither side of the shared edge is walled and
    /// the target cell is walkable.
    pub fn can_step(&self, layer: usize, from: GridPos, dir: Direction) -> bool {
        let Some(cell) = self.cell(layer, from) else {
            return false;
        };
        if cell.walls.get(dir) {
            return false;
        }
        let to = from.step(dir);
        match self.cell(layer, to) {
            Some(next) => next.is_walkable() && !next.walls.get(dir.opposite()),
            None => false,
        }
    }

    /// Clear the wall between `pos` and its neighbor in `dir`, on both sides.
    pub fn open_wall(&mut self, layer: usize, pos: GridPos, dir: Direction) -> bool {
        let next = pos.step(dir);
        if !self.in_bounds(pos) || !self.in_bounds(next) {
            return false;
        }
        if let Some(cell) = self.cell_mut(layer, pos) {
            cell.walls.set(dir, false);
        }
        if let Some(cell) = self.cell_mut(layer, next) {
            cell.walls.set(dir.opposite(), false);
        }
        true
    }

    pub fn set_cell_type(&mut self, layer: usize, pos: GridPos, cell_type: CellType) {
        if let Some(cell) = self.cell_mut(layer, pos) {
            cell.cell_type = cell_type;
        }
    }

    /// Open all four edges of a cell (and the mirrored neighbor edges) and
    /// make it walkable. Returns false when `pos` is off the grid.
    pub fn unlock_cell(&mut self, layer: usize, pos: GridPos) -> bool {
        let Some(cell) = self.cell_mut(layer, pos) else {
            return false;
        };
        cell.walls = Walls::OPEN;
        cell.cell_type = CellType::Empty;
        for dir in Direction::ALL {
            if let Some(neighbor) = self.cell_mut(layer, pos.step(dir)) {
                neighbor.walls.set(dir.opposite(), false);
            }
        }
        true
    }

    /// Collectibles are flagged, never removed, so indices stay stable.
    pub fn mark_collected(&mut self, index: usize) -> bool {
        match self.collectibles.get_mut(index) {
            Some(c) if !c.is_collected => {
                c.is_collected = true;
                true
            }
            _ => false,
        }
    }

    pub fn obstacle(&self, id: &str) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.id == id)
    }

    pub fn transitions_from(&self, layer: usize) -> impl Iterator<Item = &LayerTransition> {
        self.transitions.iter().filter(move |t| t.from_layer == layer)
    }

    pub fn is_solvable(&self) -> bool {
        validation::is_solvable(self)
    }
}
