//! Discrete tile stepping: the queue of upcoming targets and the history of
//! recent arrivals.

use crate::orientation::{Orientation, TilePos};
use crate::state::HistoryNode;
use crate::{HISTORY_CAPACITY, MOVE_NODE_LOOKAHEAD};
use std::collections::VecDeque;

/// Bounded ring of the most recent tile arrivals, newest last.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    capacity: usize,
    nodes: VecDeque<HistoryNode>,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            nodes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, node: HistoryNode) {
        if self.nodes.len() == self.capacity {
            self.nodes.pop_front();
        }
        self.nodes.push_back(node);
    }

    pub fn latest(&self) -> Option<&HistoryNode> {
        self.nodes.back()
    }

    /// Most recent arrival at `position`.
    pub fn find_at(&self, position: TilePos) -> Option<&HistoryNode> {
        self.nodes.iter().rev().find(|node| node.position == position)
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryNode> {
        self.nodes.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Observed travel rate between the two newest arrivals.
    pub fn tiles_per_second(&self) -> Option<f32> {
        let mut newest = self.nodes.iter().rev();
        let last = newest.next()?;
        let previous = newest.next()?;

        let elapsed = last.timestamp - previous.timestamp;
        if elapsed <= 0.0 {
            return None;
        }
        Some((last.position.manhattan(previous.position) as f64 / elapsed) as f32)
    }
}

/// Generator of the straight-line sequence of tiles a mover will visit.
///
/// `current` is the tile most recently handed out (the tile the mover rests
/// on, or is travelling to). The head of the queue is always one orthogonal
/// step from it.
#[derive(Debug, Clone)]
pub struct MoveNodes {
    queue: VecDeque<TilePos>,
    current: TilePos,
    direction: TilePos,
    history: HistoryRing,
}

impl MoveNodes {
    pub fn new(origin: TilePos, direction: Orientation) -> Self {
        let mut nodes = Self {
            queue: VecDeque::with_capacity(MOVE_NODE_LOOKAHEAD),
            current: origin,
            direction: direction.vector(),
            history: HistoryRing::new(HISTORY_CAPACITY),
        };
        nodes.generate_move_nodes(origin, direction.vector());
        nodes
    }

    /// Resets the queue to a straight line leaving `origin` along `direction`.
    pub fn generate_move_nodes(&mut self, origin: TilePos, direction: TilePos) {
        debug_assert!(direction.is_unit(), "non-unit move direction {direction}");

        self.queue.clear();
        self.current = origin;
        self.direction = direction;
        for i in 1..=MOVE_NODE_LOOKAHEAD as i32 {
            self.queue.push_back(origin + direction * i);
        }
    }

    /// Pops the next tile to travel to.
    ///
    /// Regenerates from the current tile when the queue is empty or was
    /// built for another direction.
    pub fn get_target_node(&mut self, direction: TilePos) -> TilePos {
        debug_assert!(direction.is_unit(), "non-unit move direction {direction}");

        if direction != self.direction || self.queue.is_empty() {
            self.generate_move_nodes(self.current, direction);
        }

        match self.queue.pop_front() {
            Some(node) => {
                self.current = node;
                node
            }
            None => self.current,
        }
    }

    /// Shifts every tile not yet reached by `offset`, including the one in
    /// flight, and returns the shifted in-flight tile.
    pub fn adjust_future_nodes(&mut self, offset: TilePos) -> TilePos {
        debug_assert!(offset.is_unit(), "non-unit strafe offset {offset}");

        self.current = self.current + offset;
        for node in self.queue.iter_mut() {
            *node = *node + offset;
        }
        self.current
    }

    pub fn add_history_node(
        &mut self,
        position: TilePos,
        timestamp: f64,
        direction: Orientation,
    ) -> HistoryNode {
        let node = HistoryNode {
            position,
            timestamp,
            direction,
        };
        self.history.push(node);
        node
    }

    pub fn peek(&self) -> Option<TilePos> {
        self.queue.front().copied()
    }

    pub fn current(&self) -> TilePos {
        self.current
    }

    pub fn direction(&self) -> TilePos {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_straight_line() {
        let nodes = MoveNodes::new(TilePos::new(2, 3), Orientation::Right);
        assert_eq!(nodes.len(), MOVE_NODE_LOOKAHEAD);
        assert_eq!(nodes.peek(), Some(TilePos::new(3, 3)));
        assert_eq!(nodes.current(), TilePos::new(2, 3));
    }

    #[test]
    fn test_get_target_node_advances() {
        let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Up);
        let up = Orientation::Up.vector();
        assert_eq!(nodes.get_target_node(up), TilePos::new(0, 1));
        assert_eq!(nodes.get_target_node(up), TilePos::new(0, 2));
        assert_eq!(nodes.current(), TilePos::new(0, 2));
    }

    #[test]
    fn test_get_target_node_regenerates_when_exhausted() {
        let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Down);
        let down = Orientation::Down.vector();
        for _ in 0..MOVE_NODE_LOOKAHEAD {
            nodes.get_target_node(down);
        }
        assert!(nodes.is_empty());

        let next = nodes.get_target_node(down);
        assert_eq!(next, TilePos::new(0, -(MOVE_NODE_LOOKAHEAD as i32) - 1));
    }

    #[test]
    fn test_direction_change_regenerates_from_current() {
        let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Up);
        nodes.get_target_node(Orientation::Up.vector());
        let next = nodes.get_target_node(Orientation::Left.vector());
        assert_eq!(next, TilePos::new(-1, 1));
    }

    #[test]
    fn test_adjusted_nodes_stay_one_step_apart() {
        let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Right);
        let right = Orientation::Right.vector();
        nodes.get_target_node(right);

        for strafe in [Orientation::Up, Orientation::Up, Orientation::Down] {
            let resting = nodes.adjust_future_nodes(strafe.vector());
            let next = nodes.get_target_node(right);
            assert!((next - resting).is_unit());
        }
    }

    #[test]
    fn test_adjust_keeps_history() {
        let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Right);
        nodes.add_history_node(TilePos::new(1, 0), 1.0, Orientation::Right);
        let shifted = nodes.adjust_future_nodes(Orientation::Up.vector());
        assert_eq!(shifted, TilePos::new(0, 1));
        assert_eq!(nodes.history().len(), 1);
        assert_eq!(nodes.peek(), Some(TilePos::new(1, 1)));
    }

    #[test]
    fn test_history_ring_evicts_oldest() {
        let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Right);
        for i in 0..(HISTORY_CAPACITY as i32 + 3) {
            nodes.add_history_node(TilePos::new(i, 0), i as f64, Orientation::Right);
        }

        let history = nodes.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(history.find_at(TilePos::new(0, 0)).is_none());
        assert_eq!(
            history.latest().map(|n| n.position),
            Some(TilePos::new(HISTORY_CAPACITY as i32 + 2, 0))
        );
    }

    #[test]
    fn test_tiles_per_second() {
        let mut ring = HistoryRing::new(4);
        assert_eq!(ring.tiles_per_second(), None);
        ring.push(HistoryNode {
            position: TilePos::new(0, 0),
            timestamp: 1.0,
            direction: Orientation::Right,
        });
        ring.push(HistoryNode {
            position: TilePos::new(1, 0),
            timestamp: 1.25,
            direction: Orientation::Right,
        });
        assert_eq!(ring.tiles_per_second(), Some(4.0));
    }
}
