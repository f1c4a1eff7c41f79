//! Codec and arena scenarios as seen by a controller application

use approx::assert_relative_eq;
use sandesh::arena::{Arena, Obstacle, Target};
use sandesh::config::{ArenaConfig, BoundsPolicy, Config};
use sandesh::protocol::{
    Command, Facing, Message, MoveCommand, ObstacleEdit, decode, decode_snapshot,
};

#[test]
fn test_status_scenario() {
    assert_eq!(
        decode("STATUS,finished"),
        Message::Status {
            raw: "STATUS,finished".to_string(),
            status: "finished".to_string(),
        }
    );
}

#[test]
fn test_target_scenario() {
    let message = decode("TARGET,3,12");
    assert_eq!(
        message,
        Message::TargetFound {
            raw: "TARGET,3,12".to_string(),
            obstacle_id: 3,
            target_id: 12,
            heading: None,
        }
    );
    assert_eq!(Target::of(12).label(), "2");
}

#[test]
fn test_semicolon_and_aliases() {
    assert!(matches!(
        decode("LOCATION;4;5;2"),
        Message::Position {
            x: 4,
            y: 5,
            heading: Facing::East,
            ..
        }
    ));
    assert!(matches!(
        decode("IMAGE-REC,2,20,s"),
        Message::TargetFound {
            obstacle_id: 2,
            target_id: 20,
            heading: Some(Facing::South),
            ..
        }
    ));
    assert_eq!(decode("MODE,manual").raw(), "[mode] manual");
    assert_eq!(decode("hello robot").raw(), "hello robot");
}

#[test]
fn test_forward_walk_bounded() {
    let mut arena = Arena::from_config(&ArenaConfig::default());
    arena.robot.update_position(1, 1).update_facing(Facing::North);

    let mut steps = 0;
    while arena.robot.apply_move(MoveCommand::Forward) {
        steps += 1;
        assert!(steps < 100, "walk never stopped");
    }
    assert_eq!(steps, 18);
    assert_eq!(arena.robot.cell(), (1, 19));
    assert_eq!(arena.robot.facing(), Facing::North);
}

#[test]
fn test_unchecked_bounds_from_config() {
    let config = Config::from_toml(
        r#"
        [arena]
        bounds = "unchecked"
        robot_start = [1, 1]
        "#,
    )
    .unwrap();
    assert_eq!(config.arena.bounds, BoundsPolicy::Unchecked);

    let mut arena = Arena::from_config(&config.arena);
    arena.robot.update_facing(Facing::West);
    assert!(arena.robot.move_forward());
    assert!(arena.robot.move_forward());
    let (x, y) = arena.robot.position();
    assert_relative_eq!(x, -1.0);
    assert_relative_eq!(y, 1.0);
}

#[test]
fn test_controller_round() {
    let mut arena = Arena::default();
    let a = arena.grid.add_obstacle(Obstacle::new(5, 10, Facing::North));
    let b = arena.grid.add_obstacle(Obstacle::new(12, 3, Facing::West));
    arena.grid.add_obstacle(Obstacle::new(7, 7, Facing::Skip));

    // Pre-run snapshot survives the wire, every (x, y, id, d) included
    let encoded = arena.snapshot_command().encode().unwrap();
    let snapshot = decode_snapshot(&encoded).unwrap();
    assert_eq!(snapshot, arena.snapshot());
    assert_eq!(snapshot.obstacles.len(), 3);
    assert_eq!(snapshot.obstacles[0].id, a);
    assert_eq!(snapshot.obstacles[2].d, 0);

    // Robot reports flow back into the arena
    let target = format!("TARGET,{},36,N", b);
    for line in ["ROBOT,6,9,E", target.as_str(), "STATUS,finished"] {
        arena.apply(&decode(line));
    }
    assert_eq!(arena.robot.cell(), (6, 9));
    assert_eq!(arena.robot.facing(), Facing::East);
    let obstacle = arena.grid.find_by_id(b).unwrap();
    assert_eq!(obstacle.target.map(|t| t.label()), Some("up"));
    assert_eq!(obstacle.facing, Facing::North);

    // Live edits
    let edit = arena.grid.rotate_obstacle(a).unwrap();
    assert_eq!(
        Command::ObstacleEdit(edit).encode().unwrap(),
        format!("OBSTACLE,{},5,10,2", a)
    );
    assert_eq!(
        Command::ObstacleEdit(ObstacleEdit::Remove { id: a })
            .encode()
            .unwrap(),
        format!("OBSTACLE,{},REMOVE", a)
    );
}
