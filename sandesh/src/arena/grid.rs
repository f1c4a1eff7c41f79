//! Obstacle grid
//!
//! The grid owns obstacle identity: ids come from a counter that only ever
//! increases, including across [`Grid::clear`]. One-obstacle-per-cell is the
//! caller's job (check [`Grid::has_obstacle_at`] before placing or moving).

use super::target::Target;
use crate::protocol::{Facing, ObstacleEdit};

/// A placed obstacle
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    id: u32,
    pub x: i32,
    pub y: i32,
    pub facing: Facing,
    pub target: Option<Target>,
    /// Set while the operator is dragging this obstacle
    pub selected: bool,
}

impl Obstacle {
    /// New unplaced obstacle; the id is assigned by [`Grid::add_obstacle`]
    pub fn new(x: i32, y: i32, facing: Facing) -> Self {
        Self {
            id: 0,
            x,
            y,
            facing,
            target: None,
            selected: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Edit record describing this obstacle's current placement
    pub fn edit(&self) -> ObstacleEdit {
        ObstacleEdit::Upsert {
            id: self.id,
            x: self.x,
            y: self.y,
            facing: self.facing,
        }
    }
}

/// Square grid of obstacles
#[derive(Debug, Clone)]
pub struct Grid {
    size: i32,
    obstacles: Vec<Obstacle>,
    next_id: u32,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl Grid {
    pub const DEFAULT_SIZE: i32 = 20;

    pub fn new(size: i32) -> Self {
        Self {
            size,
            obstacles: Vec::new(),
            next_id: 1,
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// Insert and assign the next id, which is returned
    pub fn add_obstacle(&mut self, mut obstacle: Obstacle) -> u32 {
        obstacle.id = self.next_id;
        self.next_id += 1;
        log::debug!(
            "Added obstacle {} at ({}, {})",
            obstacle.id,
            obstacle.x,
            obstacle.y
        );
        let id = obstacle.id;
        self.obstacles.push(obstacle);
        id
    }

    /// Remove the obstacle at a cell
    pub fn remove_obstacle(&mut self, x: i32, y: i32) -> Option<Obstacle> {
        let index = self.obstacles.iter().position(|o| o.x == x && o.y == y)?;
        let removed = self.obstacles.remove(index);
        log::debug!("Removed obstacle {} at ({}, {})", removed.id, x, y);
        Some(removed)
    }

    pub fn remove_by_id(&mut self, id: u32) -> Option<Obstacle> {
        let index = self.obstacles.iter().position(|o| o.id == id)?;
        Some(self.obstacles.remove(index))
    }

    pub fn find_by_position(&self, x: i32, y: i32) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.x == x && o.y == y)
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: u32) -> Option<&mut Obstacle> {
        self.obstacles.iter_mut().find(|o| o.id == id)
    }

    /// Nearest obstacle strictly within `radius` of `(x, y)`.
    ///
    /// Ties keep the first obstacle in iteration order.
    pub fn find_near(&self, x: i32, y: i32, radius: f64) -> Option<&Obstacle> {
        let mut nearest = None;
        let mut min_distance = radius;
        for obstacle in &self.obstacles {
            let dx = f64::from(x - obstacle.x);
            let dy = f64::from(y - obstacle.y);
            let distance = dx.hypot(dy);
            if distance < min_distance {
                min_distance = distance;
                nearest = Some(obstacle);
            }
        }
        nearest
    }

    pub fn has_obstacle_at(&self, x: i32, y: i32) -> bool {
        self.find_by_position(x, y).is_some()
    }

    pub fn is_inside(&self, x: i32, y: i32) -> bool {
        (0..self.size).contains(&x) && (0..self.size).contains(&y)
    }

    /// Attach a recognized target to an obstacle; false if the id is unknown
    pub fn update_target(&mut self, obstacle_id: u32, target_id: i32) -> bool {
        match self.find_by_id_mut(obstacle_id) {
            Some(obstacle) => {
                obstacle.target = Some(Target::of(target_id));
                true
            }
            None => {
                log::debug!("Target for unknown obstacle {}", obstacle_id);
                false
            }
        }
    }

    /// Relocate an obstacle, returning the edit to send
    pub fn move_obstacle(&mut self, id: u32, x: i32, y: i32) -> Option<ObstacleEdit> {
        let obstacle = self.find_by_id_mut(id)?;
        obstacle.x = x;
        obstacle.y = y;
        Some(obstacle.edit())
    }

    /// Turn an obstacle's face clockwise, returning the edit to send
    pub fn rotate_obstacle(&mut self, id: u32) -> Option<ObstacleEdit> {
        let obstacle = self.find_by_id_mut(id)?;
        obstacle.facing = obstacle.facing.clockwise();
        Some(obstacle.edit())
    }

    /// Obstacles in insertion order
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Remove every obstacle. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.obstacles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase_across_removal_and_clear() {
        let mut grid = Grid::default();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(grid.add_obstacle(Obstacle::new(i, i, Facing::North)));
            if i % 2 == 0 {
                grid.remove_obstacle(i, i);
            }
        }
        grid.clear();
        ids.push(grid.add_obstacle(Obstacle::new(3, 3, Facing::North)));

        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids {:?}", ids);
        assert_eq!(ids.first(), Some(&1));
    }

    #[test]
    fn test_find_near_strict_radius() {
        let mut grid = Grid::default();
        grid.add_obstacle(Obstacle::new(5, 5, Facing::North));

        assert!(grid.find_near(5, 7, 2.0).is_none());
        assert!(grid.find_near(5, 6, 2.0).is_some());
        assert!(grid.find_near(0, 0, 2.0).is_none());
    }

    #[test]
    fn test_find_near_picks_closest_then_first() {
        let mut grid = Grid::default();
        let far = grid.add_obstacle(Obstacle::new(2, 0, Facing::North));
        let left = grid.add_obstacle(Obstacle::new(-1, 0, Facing::North));
        let right = grid.add_obstacle(Obstacle::new(1, 0, Facing::North));

        let found = grid.find_near(0, 0, 3.0).map(Obstacle::id);
        assert_eq!(found, Some(left));
        assert_ne!(found, Some(right));
        assert_ne!(found, Some(far));
    }

    #[test]
    fn test_update_target_and_edits() {
        let mut grid = Grid::default();
        let id = grid.add_obstacle(Obstacle::new(4, 4, Facing::North));

        assert!(grid.update_target(id, 12));
        assert_eq!(grid.find_by_id(id).unwrap().target.unwrap().label(), "2");
        assert!(!grid.update_target(99, 12));

        assert_eq!(
            grid.rotate_obstacle(id),
            Some(ObstacleEdit::Upsert {
                id,
                x: 4,
                y: 4,
                facing: Facing::East
            })
        );
        grid.move_obstacle(id, 8, 9);
        assert!(grid.has_obstacle_at(8, 9));
        assert!(!grid.has_obstacle_at(4, 4));
        assert!(grid.remove_by_id(id).is_some());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_is_inside() {
        let grid = Grid::new(20);
        assert!(grid.is_inside(0, 0));
        assert!(grid.is_inside(19, 19));
        assert!(!grid.is_inside(20, 5));
        assert!(!grid.is_inside(-1, 5));
    }
}
