//! Small angle and vector helpers shared by steering and contact resolution.

use bevy::math::Vec2;
use std::f32::consts::{PI, TAU};

/// Wrap an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f32) -> f32 {
    let mut wrapped = angle % TAU;
    if wrapped <= -PI {
        wrapped += TAU;
    } else if wrapped > PI {
        wrapped -= TAU;
    }
    wrapped
}

/// Rotate `current` toward `target` by at most `max_step` radians.
///
/// Turns along the shortest signed difference and lands exactly on `target`
/// once it is within one step, so repeated calls never oscillate around it.
pub fn rotate_towards(current: f32, target: f32, max_step: f32) -> f32 {
    let offset = normalize_angle(target - current);
    if offset.abs() <= max_step {
        return normalize_angle(target);
    }
    normalize_angle(current + max_step.copysign(offset))
}

/// Bearing of a direction vector, `atan2(y, x)`.
pub fn heading(direction: Vec2) -> f32 {
    direction.y.atan2(direction.x)
}

/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Sign used to pick a side from a 2D cross product; zero resolves to `1.0`.
pub fn side_of(cross: f32) -> f32 {
    if cross < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_half_open_range() {
        assert_eq!(normalize_angle(PI), PI);
        assert_eq!(normalize_angle(-PI), PI);
        assert!((normalize_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-5);
        assert!((normalize_angle(0.5 - TAU) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn rotation_snaps_within_one_step() {
        let facing = rotate_towards(0.0, 0.3, 0.5);
        assert_eq!(facing, 0.3);
    }

    #[test]
    fn rotation_takes_shortest_direction() {
        // From just below +PI to just above -PI the short way crosses PI.
        let facing = rotate_towards(PI - 0.1, -PI + 0.1, 0.05);
        assert!((facing - (PI - 0.05)).abs() < 1e-5);

        let facing = rotate_towards(0.0, -1.0, 0.25);
        assert!((facing + 0.25).abs() < 1e-6);
    }

    #[test]
    fn side_of_zero_is_positive() {
        assert_eq!(side_of(0.0), 1.0);
        assert_eq!(side_of(-0.1), -1.0);
    }
}
