use serde::Serialize;

use crate::components::{GridPos, LayerTransition};
use crate::maze::{Grid, Maze};

/// Tracks which layer of a maze the player is on. Starts on layer 0.
#[derive(Clone, Debug, Serialize)]
pub struct LayerNavigator {
    current_layer: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_layer: Option<usize>,
    layer_count: usize,
    transitions: Vec<LayerTransition>,
}

impl LayerNavigator {
    pub fn new(maze: &Maze) -> Self {
        Self {
            current_layer: 0,
            previous_layer: None,
            layer_count: maze.layer_count(),
            transitions: maze.transitions.clone(),
        }
    }

    pub fn current_layer(&self) -> usize {
        self.current_layer
    }

    pub fn previous_layer(&self) -> Option<usize> {
        self.previous_layer
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Out-of-range layers are ignored and the current layer is kept.
    pub fn set_current_layer(&mut self, layer: usize) -> bool {
        if layer >= self.layer_count {
            return false;
        }
        if layer != self.current_layer {
            self.previous_layer = Some(self.current_layer);
            self.current_layer = layer;
        }
        true
    }

    pub fn current_layer_cells<'m>(&self, maze: &'m Maze) -> Option<&'m Grid> {
        maze.layer_grid(self.current_layer)
    }

    pub fn transitions(&self) -> &[LayerTransition] {
        &self.transitions
    }

    /// The transition leaving the current layer at `position`, if any. A cell
    /// can lead both up and down; then the one that does not return to the
    /// previous layer wins, and with no previous layer the lower target wins.
    pub fn transition_at(&self, position: GridPos) -> Option<&LayerTransition> {
        self.transitions
            .iter()
            .filter(|t| t.from_layer == self.current_layer && t.position == position)
            .min_by_key(|t| (Some(t.to_layer) == self.previous_layer, t.to_layer))
    }

    pub fn use_transition(&mut self, position: GridPos) -> bool {
        let Some(to_layer) = self.transition_at(position).map(|t| t.to_layer) else {
            return false;
        };
        self.set_current_layer(to_layer)
    }

    /// Take the transition at `position` that leads to `to_layer`.
    pub fn use_transition_to(&mut self, position: GridPos, to_layer: usize) -> bool {
        let exists = self.transitions.iter().any(|t| {
            t.from_layer == self.current_layer && t.position == position && t.to_layer == to_layer
        });
        exists && self.set_current_layer(to_layer)
    }

    /// Re-read transitions after the maze has been replaced.
    pub fn reset(&mut self, maze: &Maze) {
        *self = Self::new(maze);
    }
}
