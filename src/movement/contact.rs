//! Local avoidance: turning touching contacts into sideways nudges.
//!
//! Nudges land in [`Unit::contact_velocity`] and are added to the desired
//! velocity on the following tick.

use bevy::math::Vec2;

use super::components::{Movable, Unit};
use super::math::side_of;
use super::physics::Contact;

/// Direction a unit is trying to travel this tick.
fn travel(movable: &Movable, unit: &Unit) -> Vec2 {
    if unit.desired_velocity != Vec2::ZERO {
        unit.desired_velocity
    } else {
        movable.velocity
    }
}

/// Apply the avoidance rule for one touching pair.
///
/// Two busy units meeting head-on both step aside, toward opposite sides.
/// Otherwise only the faster one steps aside, and only while it is still
/// closing in. An idle unit touched by a busy one is pushed off the busy
/// unit's line of travel, unless it stands at that unit's destination.
/// Two idle units are left to the physics.
pub fn apply_contact(movables: &[Movable], units: &mut [Unit], contact: Contact) {
    let (a, b) = (contact.a, contact.b);
    match (units[a].is_busy(), units[b].is_busy()) {
        (true, true) => nudge_busy_pair(movables, units, a, b),
        (true, false) => nudge_idle(movables, units, a, b),
        (false, true) => nudge_idle(movables, units, b, a),
        (false, false) => {}
    }
}

fn nudge_busy_pair(movables: &[Movable], units: &mut [Unit], a: usize, b: usize) {
    let Some(normal) = (movables[b].position - movables[a].position).try_normalize() else {
        return;
    };
    let travel_a = travel(&movables[a], &units[a]);
    let travel_b = travel(&movables[b], &units[b]);

    // Sidestep away from the current offset so the split widens tick over tick.
    let side = side_of(normal.perp_dot(travel_a - travel_b));
    let perp = normal.perp() * side;

    if travel_a.dot(travel_b) < 0.0 {
        let (speed_a, speed_b) = (units[a].speed, units[b].speed);
        units[a].contact_velocity += perp * speed_a;
        units[b].contact_velocity -= perp * speed_b;
        return;
    }

    if travel_a.length_squared() >= travel_b.length_squared() {
        if travel_a.dot(normal) > 0.0 {
            let speed = units[a].speed;
            units[a].contact_velocity += perp * speed;
        }
    } else if travel_b.dot(normal) < 0.0 {
        let speed = units[b].speed;
        units[b].contact_velocity -= perp * speed;
    }
}

fn nudge_idle(movables: &[Movable], units: &mut [Unit], busy: usize, idle: usize) {
    let Some(direction) = travel(&movables[busy], &units[busy]).try_normalize() else {
        return;
    };
    let busy_position = movables[busy].position;
    let idle_position = movables[idle].position;

    if let Some(target) = units[busy].target {
        let reach = movables[busy].radius + movables[idle].radius;
        if idle_position.distance(target) <= reach {
            return;
        }
    }

    let side = side_of(direction.perp_dot(idle_position - busy_position));
    let speed = units[idle].speed;
    units[idle].contact_velocity += direction.perp() * side * speed;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(pa: Vec2, pb: Vec2) -> Vec<Movable> {
        vec![Movable::new(5.0, pa), Movable::new(5.0, pb)]
    }

    fn busy(target: Vec2, desired: Vec2) -> Unit {
        let mut unit = Unit::new(30.0, 100.0).with_target(target);
        unit.desired_velocity = desired;
        unit
    }

    #[test]
    fn head_on_units_sidestep_opposite_ways() {
        let movables = pair(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        let mut units = vec![
            busy(Vec2::new(100.0, 0.0), Vec2::new(30.0, 0.0)),
            busy(Vec2::new(-100.0, 0.0), Vec2::new(-30.0, 0.0)),
        ];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert_eq!(units[0].contact_velocity, Vec2::new(0.0, 30.0));
        assert_eq!(units[1].contact_velocity, Vec2::new(0.0, -30.0));
    }

    #[test]
    fn only_faster_closing_unit_yields() {
        let movables = pair(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        let mut units = vec![
            busy(Vec2::new(100.0, 0.0), Vec2::new(30.0, 0.0)),
            busy(Vec2::new(100.0, 0.0), Vec2::new(10.0, 0.0)),
        ];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert_ne!(units[0].contact_velocity, Vec2::ZERO);
        assert_eq!(units[1].contact_velocity, Vec2::ZERO);
    }

    #[test]
    fn head_on_sidestep_widens_existing_offset() {
        // a sits slightly above b: a keeps going up, b keeps going down.
        let movables = pair(Vec2::new(0.0, 0.5), Vec2::new(10.0, 0.0));
        let mut units = vec![
            busy(Vec2::new(100.0, 0.0), Vec2::new(30.0, 0.0)),
            busy(Vec2::new(-100.0, 0.0), Vec2::new(-30.0, 0.0)),
        ];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });
        assert!(units[0].contact_velocity.y > 0.0);
        assert!(units[1].contact_velocity.y < 0.0);

        // Mirrored offset flips both nudges.
        let movables = pair(Vec2::new(0.0, -0.5), Vec2::new(10.0, 0.0));
        for unit in units.iter_mut() {
            unit.contact_velocity = Vec2::ZERO;
        }
        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });
        assert!(units[0].contact_velocity.y < 0.0);
        assert!(units[1].contact_velocity.y > 0.0);
    }

    #[test]
    fn overtaking_unit_passes_on_the_far_side() {
        let movables = pair(Vec2::new(0.0, -0.5), Vec2::new(10.0, 0.0));
        let mut units = vec![
            busy(Vec2::new(100.0, 0.0), Vec2::new(30.0, 0.0)),
            busy(Vec2::new(100.0, 0.0), Vec2::new(10.0, 0.0)),
        ];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert!(units[0].contact_velocity.y < 0.0, "a is below b and should keep dropping");
        assert_eq!(units[1].contact_velocity, Vec2::ZERO);
    }

    #[test]
    fn faster_unit_moving_away_does_not_yield() {
        let movables = pair(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        let mut units = vec![
            busy(Vec2::new(-100.0, 0.0), Vec2::new(-30.0, 0.0)),
            busy(Vec2::new(-100.0, 0.0), Vec2::new(-10.0, 0.0)),
        ];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert_eq!(units[0].contact_velocity, Vec2::ZERO);
        assert_eq!(units[1].contact_velocity, Vec2::ZERO);
    }

    #[test]
    fn idle_unit_is_pushed_off_the_path() {
        let movables = pair(Vec2::new(0.0, 0.0), Vec2::new(8.0, 2.0));
        let mut units = vec![busy(Vec2::new(100.0, 0.0), Vec2::new(30.0, 0.0)), Unit::new(20.0, 100.0)];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert_eq!(units[0].contact_velocity, Vec2::ZERO);
        assert_eq!(units[1].contact_velocity, Vec2::new(0.0, 20.0));
    }

    #[test]
    fn idle_unit_at_destination_stays() {
        let movables = pair(Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0));
        let mut units = vec![busy(Vec2::new(10.0, 0.0), Vec2::new(30.0, 0.0)), Unit::new(20.0, 100.0)];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert_eq!(units[1].contact_velocity, Vec2::ZERO);
    }

    #[test]
    fn coincident_busy_units_are_left_alone() {
        let movables = pair(Vec2::new(3.0, 3.0), Vec2::new(3.0, 3.0));
        let mut units = vec![
            busy(Vec2::new(100.0, 0.0), Vec2::new(30.0, 0.0)),
            busy(Vec2::new(-100.0, 0.0), Vec2::new(-30.0, 0.0)),
        ];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert_eq!(units[0].contact_velocity, Vec2::ZERO);
        assert_eq!(units[1].contact_velocity, Vec2::ZERO);
    }

    #[test]
    fn idle_pair_is_ignored() {
        let movables = pair(Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0));
        let mut units = vec![Unit::new(20.0, 100.0), Unit::new(20.0, 100.0)];

        apply_contact(&movables, &mut units, Contact { a: 0, b: 1 });

        assert!(units.iter().all(|u| u.contact_velocity == Vec2::ZERO));
    }
}
