//! In-memory arena state: obstacle grid and robot pose.
//!
//! [`Arena::apply`] folds decoded robot messages into the state, and
//! [`Arena::snapshot_command`] builds the pre-run obstacle snapshot.

pub mod grid;
pub mod robot;
pub mod target;

pub use grid::{Grid, Obstacle};
pub use robot::Robot;
pub use target::Target;

use crate::config::ArenaConfig;
use crate::protocol::{Command, Message, ObstacleSnapshot};

/// Grid and robot together
#[derive(Debug, Clone, Default)]
pub struct Arena {
    pub grid: Grid,
    pub robot: Robot,
}

impl Arena {
    pub fn from_config(config: &ArenaConfig) -> Self {
        let (x, y) = config.robot_start;
        Self {
            grid: Grid::new(config.grid_size),
            robot: Robot::new(x, y, Default::default())
                .with_grid_size(config.grid_size)
                .with_turning_radius(config.turning_radius)
                .with_bounds(config.bounds),
        }
    }

    /// Apply a robot report. Returns true if any state changed.
    pub fn apply(&mut self, message: &Message) -> bool {
        match message {
            Message::Position {
                x, y, heading, ..
            } => {
                self.robot.update_position(*x, *y).update_facing(*heading);
                true
            }
            Message::TargetFound {
                obstacle_id,
                target_id,
                heading,
                ..
            } => {
                let Ok(id) = u32::try_from(*obstacle_id) else {
                    log::warn!("Ignoring target for obstacle id {}", obstacle_id);
                    return false;
                };
                if !self.grid.update_target(id, *target_id) {
                    return false;
                }
                if let Some(facing) = heading
                    && let Some(obstacle) = self.grid.find_by_id_mut(id)
                {
                    obstacle.facing = *facing;
                }
                true
            }
            Message::PlainText { .. } | Message::Status { .. } => false,
        }
    }

    /// Snapshot of the robot pose and every obstacle
    pub fn snapshot(&self) -> ObstacleSnapshot {
        let mut snapshot = ObstacleSnapshot::new(self.robot.position(), self.robot.facing());
        for obstacle in self.grid.obstacles() {
            snapshot.push(obstacle.id(), obstacle.x, obstacle.y, obstacle.facing);
        }
        snapshot
    }

    pub fn snapshot_command(&self) -> Command {
        Command::ObstacleSnapshot(self.snapshot())
    }
}
