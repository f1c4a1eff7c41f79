//! Robot pose model
//!
//! Positions are real-valued so arc turns can land between cells. Under
//! [`BoundsPolicy::Reject`] any motion whose destination leaves the interior
//! `[1, size - 1]` on either axis is dropped and the pose is left untouched.

use crate::config::BoundsPolicy;
use crate::protocol::{Facing, MoveCommand};

/// Robot pose plus motion limits
#[derive(Debug, Clone, PartialEq)]
pub struct Robot {
    x: f64,
    y: f64,
    facing: Facing,
    grid_size: i32,
    turning_radius: f64,
    bounds: BoundsPolicy,
}

impl Default for Robot {
    fn default() -> Self {
        Self::new(1, 1, Facing::North)
    }
}

impl Robot {
    pub const DEFAULT_TURNING_RADIUS: f64 = 4.5;

    /// Robot on a default 20x20 grid with bounds checking
    pub fn new(x: i32, y: i32, facing: Facing) -> Self {
        Self {
            x: f64::from(x),
            y: f64::from(y),
            facing,
            grid_size: 20,
            turning_radius: Self::DEFAULT_TURNING_RADIUS,
            bounds: BoundsPolicy::Reject,
        }
    }

    pub fn with_grid_size(mut self, grid_size: i32) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_turning_radius(mut self, turning_radius: f64) -> Self {
        self.turning_radius = turning_radius;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Position truncated to the containing cell
    pub fn cell(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Set the position unconditionally (robot-reported pose)
    pub fn update_position(&mut self, x: i32, y: i32) -> &mut Self {
        self.x = f64::from(x);
        self.y = f64::from(y);
        self
    }

    /// Set the heading; SKIP keeps the current one
    pub fn update_facing(&mut self, facing: Facing) -> &mut Self {
        if facing != Facing::Skip {
            self.facing = facing;
        }
        self
    }

    fn within_bounds(&self, x: f64, y: f64) -> bool {
        let max = f64::from(self.grid_size - 1);
        (1.0..=max).contains(&x) && (1.0..=max).contains(&y)
    }

    /// Commit a pose if the bounds policy allows it
    fn try_commit(&mut self, x: f64, y: f64, facing: Facing) -> bool {
        if self.bounds == BoundsPolicy::Reject && !self.within_bounds(x, y) {
            log::debug!("Robot motion to ({:.1}, {:.1}) rejected", x, y);
            return false;
        }
        self.x = x;
        self.y = y;
        self.facing = facing;
        true
    }

    fn straight(&mut self, sign: i32) -> bool {
        let (dx, dy) = self.facing.step();
        let (cx, cy) = self.cell();
        let x = f64::from(cx + sign * dx);
        let y = f64::from(cy + sign * dy);
        self.try_commit(x, y, self.facing)
    }

    /// One cell ahead. Returns false if the move was rejected.
    pub fn move_forward(&mut self) -> bool {
        self.straight(1)
    }

    /// One cell back. Returns false if the move was rejected.
    pub fn move_backward(&mut self) -> bool {
        self.straight(-1)
    }

    /// Spot turn; never moves the robot
    pub fn rotate_left(&mut self) {
        self.facing = self.facing.counter_clockwise();
    }

    /// Spot turn; never moves the robot
    pub fn rotate_right(&mut self) {
        self.facing = self.facing.clockwise();
    }

    /// Arc turn: one cell ahead, `turning_radius` sideways, heading rotated
    fn arc(&mut self, new_facing: Facing) -> bool {
        if self.facing == Facing::Skip {
            return false;
        }
        let (fx, fy) = self.facing.step();
        let (sx, sy) = new_facing.step();
        let (cx, cy) = self.cell();
        let x = f64::from(cx + fx) + f64::from(sx) * self.turning_radius;
        let y = f64::from(cy + fy) + f64::from(sy) * self.turning_radius;
        self.try_commit(x, y, new_facing)
    }

    /// Forward arc to the left. Returns false if the move was rejected.
    pub fn turn_left(&mut self) -> bool {
        self.arc(self.facing.counter_clockwise())
    }

    /// Forward arc to the right. Returns false if the move was rejected.
    pub fn turn_right(&mut self) -> bool {
        self.arc(self.facing.clockwise())
    }

    /// Apply a manual drive step locally. Returns false if rejected.
    pub fn apply_move(&mut self, command: MoveCommand) -> bool {
        match command {
            MoveCommand::Forward => self.move_forward(),
            MoveCommand::Backward => self.move_backward(),
            MoveCommand::RotateLeft => {
                self.rotate_left();
                true
            }
            MoveCommand::RotateRight => {
                self.rotate_right();
                true
            }
            MoveCommand::TurnLeft => self.turn_left(),
            MoveCommand::TurnRight => self.turn_right(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_walk_stops_at_interior_edge() {
        let mut robot = Robot::new(1, 1, Facing::North);
        assert!(robot.move_forward());
        assert_eq!(robot.cell(), (1, 2));
        assert_eq!(robot.facing(), Facing::North);

        while robot.cell().1 < 19 {
            assert!(robot.move_forward());
        }
        assert!(!robot.move_forward());
        assert_eq!(robot.cell(), (1, 19));
    }

    #[test]
    fn test_unchecked_allows_leaving_grid() {
        let mut robot = Robot::new(1, 1, Facing::South).with_bounds(BoundsPolicy::Unchecked);
        assert!(robot.move_forward());
        assert!(robot.move_forward());
        assert_eq!(robot.cell(), (1, -1));
    }

    #[test]
    fn test_backward_respects_facing() {
        let mut robot = Robot::new(5, 5, Facing::East);
        robot.move_backward();
        assert_eq!(robot.cell(), (4, 5));
        assert_eq!(robot.facing(), Facing::East);
    }

    #[test]
    fn test_arc_turns() {
        let mut robot = Robot::new(5, 5, Facing::North);
        assert!(robot.turn_right());
        let (x, y) = robot.position();
        assert_relative_eq!(x, 9.5);
        assert_relative_eq!(y, 6.0);
        assert_eq!(robot.facing(), Facing::East);

        let mut robot = Robot::new(10, 10, Facing::East);
        assert!(robot.turn_left());
        let (x, y) = robot.position();
        assert_relative_eq!(x, 11.0);
        assert_relative_eq!(y, 14.5);
        assert_eq!(robot.facing(), Facing::North);
    }

    #[test]
    fn test_arc_rejected_near_edge() {
        let mut robot = Robot::new(2, 2, Facing::North);
        assert!(!robot.turn_left());
        assert_eq!(robot.cell(), (2, 2));
        assert_eq!(robot.facing(), Facing::North);
    }

    #[test]
    fn test_skip_facing_is_noop() {
        let mut robot = Robot::new(3, 3, Facing::West);
        robot.update_position(7, 8).update_facing(Facing::Skip);
        assert_eq!(robot.cell(), (7, 8));
        assert_eq!(robot.facing(), Facing::West);
    }

    #[test]
    fn test_spot_rotation() {
        let mut robot = Robot::default();
        robot.apply_move(MoveCommand::RotateLeft);
        assert_eq!(robot.facing(), Facing::West);
        robot.apply_move(MoveCommand::RotateRight);
        robot.apply_move(MoveCommand::RotateRight);
        assert_eq!(robot.facing(), Facing::East);
        assert_eq!(robot.cell(), (1, 1));
    }
}
