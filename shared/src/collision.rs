//! Collision probing against static obstacles, other movers and actors.

use crate::orientation::TilePos;
use crate::MoverId;
use std::collections::{HashMap, HashSet};

/// Answers passability questions for movement and rotation gating.
pub trait CollisionProbe {
    /// Whether a footprint tile may move from `from` to `to`. Tiles held by
    /// movers listed in `exclude` never block. Actors only block when
    /// `include_actors` is set.
    fn is_passable(
        &self,
        from: TilePos,
        to: TilePos,
        exclude: &[MoverId],
        include_actors: bool,
    ) -> bool;
}

/// Nothing ever blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSpace;

impl CollisionProbe for OpenSpace {
    fn is_passable(&self, _: TilePos, _: TilePos, _: &[MoverId], _: bool) -> bool {
        true
    }
}

/// Tile grid of walls, mover footprints and dynamic actors.
#[derive(Debug, Default, Clone)]
pub struct TileGrid {
    walls: HashSet<TilePos>,
    actors: HashSet<TilePos>,
    movers: HashMap<TilePos, MoverId>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_walls(walls: impl IntoIterator<Item = TilePos>) -> Self {
        Self {
            walls: walls.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn add_wall(&mut self, tile: TilePos) {
        self.walls.insert(tile);
    }

    pub fn remove_wall(&mut self, tile: TilePos) -> bool {
        self.walls.remove(&tile)
    }

    pub fn add_actor(&mut self, tile: TilePos) {
        self.actors.insert(tile);
    }

    pub fn clear_actors(&mut self) {
        self.actors.clear();
    }

    pub fn occupy(&mut self, tile: TilePos, mover: MoverId) {
        self.movers.insert(tile, mover);
    }

    pub fn clear_movers(&mut self) {
        self.movers.clear();
    }

    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }
}

impl CollisionProbe for TileGrid {
    fn is_passable(
        &self,
        _from: TilePos,
        to: TilePos,
        exclude: &[MoverId],
        include_actors: bool,
    ) -> bool {
        if self.walls.contains(&to) {
            return false;
        }
        if include_actors && self.actors.contains(&to) {
            return false;
        }
        match self.movers.get(&to) {
            Some(owner) => exclude.contains(owner),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walls_block() {
        let grid = TileGrid::with_walls([TilePos::new(1, 0)]);
        assert!(!grid.is_passable(TilePos::ZERO, TilePos::new(1, 0), &[], false));
        assert!(grid.is_passable(TilePos::ZERO, TilePos::new(0, 1), &[], false));
    }

    #[test]
    fn test_own_footprint_is_excluded() {
        let mut grid = TileGrid::new();
        grid.occupy(TilePos::new(0, 1), 7);
        assert!(grid.is_passable(TilePos::ZERO, TilePos::new(0, 1), &[7], false));
        assert!(!grid.is_passable(TilePos::ZERO, TilePos::new(0, 1), &[8], false));
    }

    #[test]
    fn test_actors_only_block_when_included() {
        let mut grid = TileGrid::new();
        grid.add_actor(TilePos::new(2, 2));
        assert!(grid.is_passable(TilePos::ZERO, TilePos::new(2, 2), &[], false));
        assert!(!grid.is_passable(TilePos::ZERO, TilePos::new(2, 2), &[], true));
    }
}
