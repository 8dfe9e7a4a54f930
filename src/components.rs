use serde::{Deserialize, Serialize};

/// Grid position (integer cell coordinates, `y` is the row index)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for GridPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CellType {
    #[default]
    Empty = 0,
    Wall = 1,
    Obstacle = 2,
}

impl CellType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => CellType::Wall,
            2 => CellType::Obstacle,
            _ => CellType::Empty,
        }
    }

    pub fn is_walkable(self) -> bool {
        self == CellType::Empty
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed exploration order. Breadth-first searches break ties with it.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

/// Which edges of a cell block movement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Walls {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl Walls {
    pub const CLOSED: Walls = Walls {
        north: true,
        south: true,
        east: true,
        west: true,
    };

    pub const OPEN: Walls = Walls {
        north: false,
        south: false,
        east: false,
        west: false,
    };

    pub fn get(&self, dir: Direction) -> bool {
        match dir {
            Direction::North => self.north,
            Direction::East => self.east,
            Direction::South => self.south,
            Direction::West => self.west,
        }
    }

    pub fn set(&mut self, dir: Direction, blocked: bool) {
        match dir {
            Direction::North => self.north = blocked,
            Direction::East => self.east = blocked,
            Direction::South => self.south = blocked,
            Direction::West => self.west = blocked,
        }
    }

    pub fn open_count(&self) -> usize {
        Direction::ALL.iter().filter(|d| !self.get(**d)).count()
    }
}

impl Default for Walls {
    fn default() -> Self {
        Walls::CLOSED
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell {
    pub position: GridPos,
    #[serde(default)]
    pub cell_type: CellType,
    #[serde(default)]
    pub walls: Walls,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub is_revealed: bool,
}

impl Cell {
    pub fn new(position: GridPos) -> Self {
        Self {
            position,
            cell_type: CellType::Empty,
            walls: Walls::CLOSED,
            is_visible: false,
            is_revealed: false,
        }
    }

    pub fn is_walkable(&self) -> bool {
        self.cell_type.is_walkable()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collectible {
    pub id: String,
    #[serde(default = "default_collectible_kind")]
    pub kind: String,
    pub position: GridPos,
    #[serde(default)]
    pub layer: usize,
    #[serde(default)]
    pub is_collected: bool,
}

fn default_collectible_kind() -> String {
    "soul_fragment".to_string()
}

/// Impassable object occupying one cell. Obstacles double as possession
/// targets, addressed by `id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    pub position: GridPos,
    #[serde(default)]
    pub layer: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LayerTransition {
    pub position: GridPos,
    pub from_layer: usize,
    pub to_layer: usize,
}

impl LayerTransition {
    pub fn reversed(self) -> Self {
        Self {
            position: self.position,
            from_layer: self.to_layer,
            to_layer: self.from_layer,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MazeType {
    #[default]
    Standard,
    MultiLayer,
    Puzzle,
    Timed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_round_trip_through_opposite() {
        let origin = GridPos::new(3, 3);
        for dir in Direction::ALL {
            assert_eq!(origin.step(dir).step(dir.opposite()), origin);
        }
    }

    #[test]
    fn walls_track_open_edges() {
        let mut walls = Walls::CLOSED;
        assert_eq!(walls.open_count(), 0);
        walls.set(Direction::East, false);
        walls.set(Direction::South, false);
        assert!(!walls.get(Direction::East));
        assert!(walls.get(Direction::West));
        assert_eq!(walls.open_count(), 2);
    }

    #[test]
    fn only_empty_cells_are_walkable() {
        assert!(CellType::from_u8(0).is_walkable());
        assert!(!CellType::from_u8(1).is_walkable());
        assert!(!CellType::from_u8(2).is_walkable());
    }
}
