use bevy::math::Vec2;
use locomotion::movement::{MoveConfig, MoveFlags, Movable, Mover, PathGrid, RigidBodyWorld, Unit, UnitState};
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

const DT: f32 = 1.0 / 60.0;

/// 10x10 open grid with 10-unit cells: a 100x100 arena.
fn open_arena() -> Arc<PathGrid> {
    Arc::new(PathGrid::new(10, 10, 10.0))
}

fn run(mover: &mut Mover, movables: &mut [Movable], units: &mut [Unit], grid: &Arc<PathGrid>, ticks: usize) {
    for _ in 0..ticks {
        mover.update(DT, movables, units, grid);
    }
}

// ============================================================================
// Steering
// ============================================================================

#[test]
fn test_single_unit_arrives_and_stops() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(5.0, Vec2::new(5.0, 5.0))];
    let mut units = vec![Unit::new(25.0, 100.0).with_target(Vec2::new(95.0, 5.0))];

    // Four seconds at 60 Hz
    run(&mut mover, &mut movables, &mut units, &grid, 240);

    let body = &movables[0];
    println!("position {:?}, velocity {:?}", body.position, body.velocity);
    assert!(body.position.x >= 90.0, "unit should reach its target within four seconds");
    assert!(body.velocity.length() <= units[0].speed * DT * 2.0, "unit should have come to rest");
    assert!((body.position.y - 5.0).abs() < 1.0, "unit should not drift sideways on an open grid");
    assert_eq!(units[0].state, UnitState::Arriving);

    run(&mut mover, &mut movables, &mut units, &grid, 120);
    assert!(movables[0].position.x >= 90.0 && movables[0].position.x <= 100.0, "unit should stay in the target cell");
    assert_eq!(units[0].desired_velocity, Vec2::ZERO);
}

#[test]
fn test_state_follows_progress() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(5.0, Vec2::new(5.0, 5.0))];
    let mut units = vec![Unit::new(25.0, 100.0)];

    run(&mut mover, &mut movables, &mut units, &grid, 1);
    assert_eq!(units[0].state, UnitState::Idle);

    units[0].target = Some(Vec2::new(95.0, 5.0));
    run(&mut mover, &mut movables, &mut units, &grid, 1);
    assert_eq!(units[0].state, UnitState::Seeking);
    assert!(units[0].flow_field.is_some());

    run(&mut mover, &mut movables, &mut units, &grid, 360);
    assert_eq!(units[0].state, UnitState::Arriving);

    units[0].target = None;
    run(&mut mover, &mut movables, &mut units, &grid, 1);
    assert_eq!(units[0].state, UnitState::Idle);
    assert_eq!(units[0].desired_velocity, Vec2::ZERO);
}

#[test]
fn test_unit_walks_around_wall() {
    // Wall across x = 3 with a gap at the top row
    let mut grid = PathGrid::new(7, 7, 10.0);
    for y in 0..6 {
        grid.set_blocked(3, y, true);
    }
    let grid = Arc::new(grid);

    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(4.0, Vec2::new(5.0, 5.0))];
    let mut units = vec![Unit::new(20.0, 80.0).with_target(Vec2::new(65.0, 5.0))];

    let mut highest = 0.0f32;
    for _ in 0..900 {
        mover.update(DT, &mut movables, &mut units, &grid);
        highest = highest.max(movables[0].position.y);
    }

    println!("highest y {}, final {:?}", highest, movables[0].position);
    assert!(highest > 55.0, "unit should climb to the gap");
    assert!(movables[0].position.distance(Vec2::new(65.0, 5.0)) < 10.0, "unit should end near its target");
}

#[test]
fn test_facing_turns_at_rotation_speed() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(5.0, Vec2::new(5.0, 5.0))];
    let mut units = vec![Unit::new(25.0, 100.0)
        .with_rotation_speed(1.0)
        .with_target(Vec2::new(5.0, 95.0))];

    run(&mut mover, &mut movables, &mut units, &grid, 30);
    let facing = units[0].facing;
    assert!(facing > 0.3 && facing < 0.55, "facing {} should lag behind heading", facing);

    run(&mut mover, &mut movables, &mut units, &grid, 120);
    assert!((units[0].facing - FRAC_PI_2).abs() < 1e-4, "facing should snap onto heading");
}

#[test]
fn test_moving_unit_turns_at_low_speed() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(5.0, Vec2::new(50.0, 20.0))];
    movables[0].velocity = Vec2::new(0.0, 1.8);
    movables[0].flags.insert(MoveFlags::AWAKE);
    // Slow enough that a few times speed * dt is still a crawl.
    let mut units = vec![Unit::new(25.0, 2.0)
        .with_deceleration(2.0)
        .with_target(Vec2::new(50.0, 90.0))];

    run(&mut mover, &mut movables, &mut units, &grid, 1);

    assert!(movables[0].velocity.length() < 25.0 * DT * 5.0);
    assert!(units[0].facing > 0.0, "a unit that is clearly moving should start turning");
}

#[test]
fn test_slow_unit_keeps_facing() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(5.0, Vec2::new(50.0, 50.0))];
    movables[0].velocity = Vec2::new(0.0, 1.0);
    let mut units = vec![Unit::new(25.0, 100.0).with_facing(1.0)];

    run(&mut mover, &mut movables, &mut units, &grid, 5);
    assert_eq!(units[0].facing, 1.0);
}

// ============================================================================
// Avoidance
// ============================================================================

fn head_on_pair() -> (Vec<Movable>, Vec<Unit>) {
    let (left, right) = (Vec2::new(35.0, 55.0), Vec2::new(65.0, 55.0));
    let movables = vec![Movable::new(5.0, left), Movable::new(5.0, right)];
    let units = vec![
        Unit::new(30.0, 120.0).with_target(right),
        Unit::new(30.0, 120.0).with_target(left),
    ];
    (movables, units)
}

#[test]
fn test_head_on_units_split_within_one_second() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let (mut movables, mut units) = head_on_pair();

    run(&mut mover, &mut movables, &mut units, &grid, 60);

    let split = movables[0].position.y - movables[1].position.y;
    println!("split after one second {}, {:?} {:?}", split, movables[0].position, movables[1].position);
    assert!(split > 1.0, "units should sidestep to opposite sides, split {}", split);
}

#[test]
fn test_head_on_units_pass_each_other() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let (mut movables, mut units) = head_on_pair();

    let mut narrowest_gap = f32::MAX;
    for _ in 0..600 {
        mover.update(DT, &mut movables, &mut units, &grid);
        let split = movables[0].position.y - movables[1].position.y;
        if movables[0].position.x < movables[1].position.x {
            narrowest_gap = narrowest_gap.min(split);
        }
    }

    println!("final {:?} {:?}", movables[0].position, movables[1].position);
    assert!(narrowest_gap >= 0.0, "the split should never collapse while the units are side by side");
    assert!(movables[0].position.x > 60.0, "left unit should reach the right side");
    assert!(movables[1].position.x < 40.0, "right unit should reach the left side");
}

#[test]
fn test_idle_unit_yields_to_busy_unit() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![
        Movable::new(5.0, Vec2::new(15.0, 55.0)),
        Movable::new(5.0, Vec2::new(50.0, 57.0)),
    ];
    let mut units = vec![
        Unit::new(25.0, 100.0).with_target(Vec2::new(85.0, 55.0)),
        Unit::new(25.0, 100.0),
    ];

    run(&mut mover, &mut movables, &mut units, &grid, 360);

    println!("busy {:?}, idle {:?}", movables[0].position, movables[1].position);
    assert!(movables[1].position.y > 58.0, "idle unit should move off the line of travel");
    assert!(movables[0].position.x > 70.0, "busy unit should get through");
}

#[test]
fn test_contacts_are_ordered_pairs() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![
        Movable::new(5.0, Vec2::new(50.0, 50.0)),
        Movable::new(5.0, Vec2::new(42.0, 50.0)),
        Movable::new(5.0, Vec2::new(58.0, 50.0)),
    ];
    let mut units = vec![Unit::new(10.0, 50.0), Unit::new(10.0, 50.0), Unit::new(10.0, 50.0)];

    run(&mut mover, &mut movables, &mut units, &grid, 1);

    let contacts: Vec<_> = mover.world().contacts().collect();
    assert!(!contacts.is_empty());
    for contact in &contacts {
        assert!(contact.a < contact.b);
    }
    for movable in &movables {
        assert!(movable.flags.contains(MoveFlags::HAS_CONTACT));
    }
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_obstacles_rebuilt_only_for_new_grid() {
    let grid = Arc::new(PathGrid::parse(10.0, "....\n.#..\n....\n....").unwrap());
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(3.0, Vec2::new(5.0, 5.0))];
    let mut units = vec![Unit::new(10.0, 50.0)];

    run(&mut mover, &mut movables, &mut units, &grid, 5);
    assert_eq!(mover.obstacle_rebuilds(), 1);
    assert_eq!(mover.obstacles().len(), 1);

    // Same content behind a new Arc counts as a new grid
    let copy = Arc::new((*grid).clone());
    run(&mut mover, &mut movables, &mut units, &copy, 1);
    assert_eq!(mover.obstacle_rebuilds(), 2);
}

#[test]
fn test_units_share_flow_fields_by_target_and_width() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let target = Vec2::new(95.0, 95.0);
    let mut movables = vec![
        Movable::new(4.0, Vec2::new(5.0, 5.0)),
        Movable::new(4.0, Vec2::new(35.0, 5.0)),
        Movable::new(8.0, Vec2::new(5.0, 45.0)),
    ];
    let mut units = vec![
        Unit::new(20.0, 80.0).with_target(target),
        Unit::new(20.0, 80.0).with_target(target),
        Unit::new(20.0, 80.0).with_target(target),
    ];

    run(&mut mover, &mut movables, &mut units, &grid, 1);

    let (Some(a), Some(b), Some(c)) = (&units[0].flow_field, &units[1].flow_field, &units[2].flow_field) else {
        panic!("every unit with a target should hold a flow field");
    };
    assert!(Arc::ptr_eq(a, b));
    assert!(!Arc::ptr_eq(a, c), "wider units need their own field");
    assert_eq!(mover.path_finder().built(), 2);

    run(&mut mover, &mut movables, &mut units, &grid, 10);
    assert_eq!(mover.path_finder().built(), 2, "fields are reused across ticks");
}

#[test]
fn test_crowd_heats_destination() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let target = Vec2::new(55.0, 55.0);
    let mut movables = Vec::new();
    let mut units = Vec::new();
    for i in 0..6 {
        movables.push(Movable::new(4.0, Vec2::new(5.0 + 15.0 * i as f32, 5.0)));
        units.push(Unit::new(20.0, 80.0).with_target(target));
    }

    run(&mut mover, &mut movables, &mut units, &grid, 600);

    let Some(field) = &units[0].flow_field else {
        panic!("unit should hold its field");
    };
    assert!(field.hot_cell_count() >= 1, "crowd at the destination should heat it");
    for movable in &movables {
        assert!(movable.position.distance(target) < 40.0, "{:?} should gather near the target", movable.position);
    }
}

// ============================================================================
// Contract
// ============================================================================

#[test]
#[should_panic(expected = "index-aligned")]
fn test_mismatched_slices_panic() {
    let grid = open_arena();
    let mut mover = Mover::new(MoveConfig::default());
    let mut movables = vec![Movable::new(5.0, Vec2::ZERO), Movable::new(5.0, Vec2::ONE)];
    let mut units = vec![Unit::new(10.0, 50.0)];
    mover.update(DT, &mut movables, &mut units, &grid);
}

#[test]
fn test_runs_are_deterministic() {
    fn simulate() -> Vec<Movable> {
        let mut rng = fastrand::Rng::with_seed(7);
        let grid = open_arena();
        let mut mover = Mover::new(MoveConfig::default());
        let mut movables = Vec::new();
        let mut units = Vec::new();
        for _ in 0..20 {
            let position = Vec2::new(rng.f32() * 90.0 + 5.0, rng.f32() * 90.0 + 5.0);
            let target = Vec2::new(rng.f32() * 90.0 + 5.0, rng.f32() * 90.0 + 5.0);
            movables.push(Movable::new(2.0 + rng.f32() * 2.0, position));
            units.push(Unit::new(15.0, 60.0).with_target(target));
        }
        run(&mut mover, &mut movables, &mut units, &grid, 240);
        movables
    }

    assert_eq!(simulate(), simulate());
}
