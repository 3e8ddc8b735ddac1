// Bearing math in field coordinates (x right, y down).

use glam::Vec2;

/// Wraps an angle in degrees into the half-open range (-180, 180].
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Signed turn in degrees that brings `reference_heading` onto the bearing from `origin` to
/// `target`.
///
/// The bearing is measured counter-clockwise from +x with y pointing up, so a target below the
/// origin on screen has a negative bearing. The result lies in (-180, 180]: positive means a
/// counter-clockwise turn, and its magnitude is the shortest way round.
///
/// `origin == target` has no bearing; callers must short-circuit before asking.
pub fn turn_angle(origin: Vec2, target: Vec2, reference_heading: f32) -> f32 {
    let dx = target.x - origin.x;
    // Flip y so the angle is geometric. `origin.y - target.y` keeps +0.0 for level targets,
    // which atan2 needs to put a target straight behind at +180 rather than -180.
    let dy_up = origin.y - target.y;
    let bearing = dy_up.atan2(dx).to_degrees();
    normalize_degrees(bearing - reference_heading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn normalize_keeps_values_in_half_open_range() {
        assert!(close(normalize_degrees(0.0), 0.0));
        assert!(close(normalize_degrees(180.0), 180.0));
        assert!(close(normalize_degrees(-180.0), 180.0));
        assert!(close(normalize_degrees(190.0), -170.0));
        assert!(close(normalize_degrees(-190.0), 170.0));
        assert!(close(normalize_degrees(720.0 + 45.0), 45.0));
        assert!(close(normalize_degrees(-1080.0 - 30.0), -30.0));
    }

    #[test]
    fn quadrants_follow_screen_coordinates() {
        let origin = Vec2::new(100.0, 100.0);
        // Right, up, left and down on screen.
        assert!(close(turn_angle(origin, Vec2::new(200.0, 100.0), 0.0), 0.0));
        assert!(close(turn_angle(origin, Vec2::new(100.0, 0.0), 0.0), 90.0));
        assert!(close(turn_angle(origin, Vec2::new(0.0, 100.0), 0.0), 180.0));
        assert!(close(turn_angle(origin, Vec2::new(100.0, 300.0), 0.0), -90.0));
        // Diagonals.
        assert!(close(turn_angle(origin, Vec2::new(200.0, 0.0), 0.0), 45.0));
        assert!(close(turn_angle(origin, Vec2::new(0.0, 0.0), 0.0), 135.0));
        assert!(close(turn_angle(origin, Vec2::new(0.0, 200.0), 0.0), -135.0));
        assert!(close(turn_angle(origin, Vec2::new(200.0, 200.0), 0.0), -45.0));
    }

    #[test]
    fn reference_heading_is_subtracted_and_wrapped() {
        let origin = Vec2::new(0.0, 0.0);
        let up = Vec2::new(0.0, -10.0);
        assert!(close(turn_angle(origin, up, 90.0), 0.0));
        assert!(close(turn_angle(origin, up, -90.0), 180.0));
        // 90 - (-120) = 210, shortest turn is -150.
        assert!(close(turn_angle(origin, up, -120.0), -150.0));
        // 90 - 300 = -210, shortest turn is 150.
        assert!(close(turn_angle(origin, up, 300.0), 150.0));
    }

    #[test]
    fn result_is_always_within_half_open_range() {
        let origin = Vec2::new(400.0, 400.0);
        for step in 0..72 {
            let theta = (step as f32 * 5.0).to_radians();
            let target = origin + Vec2::new(theta.cos(), theta.sin()) * 150.0;
            for heading in [-725.0, -360.0, -180.0, -0.5, 0.0, 33.3, 180.0, 359.9, 1000.0] {
                let turn = turn_angle(origin, target, heading);
                assert!(turn > -180.0 && turn <= 180.0, "turn {turn} out of range");
            }
        }
    }
}
