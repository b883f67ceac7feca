//! Continuous collision prediction between a moving piece and resting
//! pieces, and the elastic response of two equal-mass discs.
//!
//! Prediction solves for the first time the moving centre comes within two
//! radii of an obstacle centre along the straight path `start -> end`.

use crate::board::{Piece, PieceId};
use crate::vec2::{add, distance, dot, length_sq, normalize, perp, scale, sub, Vec2};

/// Coefficient of restitution; 1.0 is perfectly elastic.
const RESTITUTION: f64 = 1.0;

/// Squared-distance slack (px^2) under which two discs count as touching.
const CONTACT_EPSILON: f64 = 1e-6;

/// First obstacle hit along a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    /// Centre of the moving piece at the moment of contact
    pub point: Vec2,
    /// Path parameter of the contact, strictly inside (0, 1)
    pub t: f64,
    pub obstacle: PieceId,
}

impl Collision {
    /// Fraction of the intended path not yet travelled at impact.
    pub fn remaining(&self) -> f64 {
        1.0 - self.t
    }
}

/// Velocities of both pieces right after an impact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticOutcome {
    pub striker: Vec2,
    pub target: Vec2,
}

/// Predict where a piece moving from `start` to `end` first touches a
/// stationary piece at `obstacle`.
///
/// Returns the contact centre and its path parameter. Contacts at exactly
/// `t = 0` or `t = 1`, a zero-length path and a negative discriminant are all
/// "no collision". So is an obstacle already touching the piece at `start`:
/// after an oblique hit the striker leaves along the tangent of the piece it
/// just struck.
pub fn predict_collision(start: Vec2, end: Vec2, obstacle: Vec2, radius: f64) -> Option<(Vec2, f64)> {
    let d = sub(end, start);
    let a = length_sq(d);
    if a == 0.0 {
        return None;
    }
    let b = 2.0 * dot(d, sub(start, obstacle));
    let min_dist = 2.0 * radius;
    let c = length_sq(sub(obstacle, start)) - min_dist * min_dist;
    if c <= CONTACT_EPSILON {
        return None;
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || !disc.is_finite() {
        return None;
    }
    let root = disc.sqrt();
    let t1 = (-b + root) / (2.0 * a);
    let t2 = (-b - root) / (2.0 * a);
    let t = t1.min(t2);

    if t > 0.0 && t < 1.0 {
        Some((add(start, scale(d, t)), t))
    } else {
        None
    }
}

/// Nearest collision of a piece moving `start -> end` against `obstacles`.
///
/// The moving piece itself is recognised by position: any obstacle sitting
/// exactly at `start` is skipped. Among accepted contacts the one closest to
/// `start` wins; equidistant contacts resolve to the first obstacle in slice
/// order.
pub fn nearest_collision(start: Vec2, end: Vec2, obstacles: &[Piece], radius: f64) -> Option<Collision> {
    let mut best: Option<(f64, Collision)> = None;

    for other in obstacles {
        if other.pos == start {
            continue;
        }
        let Some((point, t)) = predict_collision(start, end, other.pos, radius) else {
            continue;
        };
        let dist = distance(point, start);
        if best.as_ref().map_or(true, |(d, _)| dist < *d) {
            best = Some((
                dist,
                Collision {
                    point,
                    t,
                    obstacle: other.id.clone(),
                },
            ));
        }
    }

    best.map(|(_, c)| c)
}

/// Resolve an impact between a moving striker and a resting target of equal
/// mass.
///
/// The velocity is split along the contact normal (target -> striker) and its
/// tangent. Normal components are exchanged, tangential components are kept,
/// and both results are scaled by `friction`, the share of the intended path
/// that was still ahead of the striker.
///
/// Coincident centres have no normal; the striker then keeps its velocity.
pub fn resolve_elastic_collision(
    striker_velocity: Vec2,
    striker_at_impact: Vec2,
    target: Vec2,
    friction: f64,
) -> ElasticOutcome {
    let Some(un) = normalize(sub(striker_at_impact, target)) else {
        return ElasticOutcome {
            striker: scale(striker_velocity, friction),
            target: Vec2::ZERO,
        };
    };
    let ut = perp(un);

    let v1 = striker_velocity;
    let v2 = Vec2::ZERO;

    let v1n = dot(un, v1);
    let v1t = dot(ut, v1);
    let v2n = dot(un, v2);
    let v2t = dot(ut, v2);

    let v1n_new = (RESTITUTION * (v2n - v1n) + v1n + v2n) / 2.0;
    let v2n_new = (RESTITUTION * (v1n - v2n) + v1n + v2n) / 2.0;

    let striker = add(scale(un, v1n_new), scale(ut, v1t));
    let target = add(scale(un, v2n_new), scale(ut, v2t));

    ElasticOutcome {
        striker: scale(striker, friction),
        target: scale(target, friction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Team;
    use crate::vec2::vec2;

    const R: f64 = 20.0;

    fn piece(id: &str, x: f64, y: f64) -> Piece {
        Piece {
            id: id.to_string(),
            team: Team::Red,
            pos: vec2(x, y),
            vel: Vec2::ZERO,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "Expected {} to be close to {}",
            actual,
            expected
        );
    }

    #[test]
    fn head_on_contact_is_two_radii_short_of_obstacle() {
        let (point, t) =
            predict_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), vec2(200.0, 100.0), R).unwrap();
        assert_close(point.x, 160.0);
        assert_close(point.y, 100.0);
        assert_close(t, 0.3);
    }

    #[test]
    fn path_passing_wide_misses() {
        assert!(predict_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), vec2(200.0, 150.0), R).is_none());
    }

    #[test]
    fn obstacle_behind_start_is_ignored() {
        assert!(predict_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), vec2(40.0, 100.0), R).is_none());
    }

    #[test]
    fn obstacle_beyond_stop_point_is_ignored() {
        assert!(predict_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), vec2(400.0, 100.0), R).is_none());
    }

    #[test]
    fn touching_at_start_does_not_retrigger() {
        // Already in contact, moving straight into the obstacle: root t = 0.
        assert!(predict_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), vec2(140.0, 100.0), R).is_none());
    }

    #[test]
    fn tangent_departure_from_contact_is_not_a_collision() {
        let s = 40.0 / 2f64.sqrt();
        let start = vec2(120.0, 200.0);
        let obstacle = vec2(120.0 - s, 200.0 - s);
        // Moving along the tangent, away and to the side
        assert!(predict_collision(start, vec2(20.0, 300.0), obstacle, R).is_none());
    }

    #[test]
    fn zero_length_path_never_collides() {
        let p = vec2(100.0, 100.0);
        assert!(predict_collision(p, p, vec2(130.0, 100.0), R).is_none());
    }

    #[test]
    fn predicted_parameter_is_strictly_inside_path() {
        let start = vec2(100.0, 100.0);
        for i in 0..50 {
            let end = vec2(100.0 + 10.0 * i as f64, 100.0 + 3.0 * i as f64);
            for j in 0..20 {
                let q = vec2(80.0 + 20.0 * j as f64, 90.0 + 9.0 * j as f64);
                if let Some((point, t)) = predict_collision(start, end, q, R) {
                    assert!(t > 0.0 && t < 1.0, "t = {} out of range", t);
                    assert!((distance(point, q) - 2.0 * R).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn nearest_picks_closest_obstacle() {
        let obstacles = vec![piece("far", 260.0, 100.0), piece("near", 200.0, 100.0)];
        let c = nearest_collision(vec2(100.0, 100.0), vec2(400.0, 100.0), &obstacles, R).unwrap();
        assert_eq!(c.obstacle, "near");
        assert_close(c.point.x, 160.0);
    }

    #[test]
    fn nearest_skips_piece_at_start_position() {
        let obstacles = vec![piece("me", 100.0, 100.0), piece("other", 200.0, 100.0)];
        let c = nearest_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), &obstacles, R).unwrap();
        assert_eq!(c.obstacle, "other");
    }

    #[test]
    fn equidistant_obstacles_resolve_to_first_found() {
        let obstacles = vec![piece("upper", 200.0, 70.0), piece("lower", 200.0, 130.0)];
        let c = nearest_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), &obstacles, R).unwrap();
        assert_eq!(c.obstacle, "upper");
    }

    #[test]
    fn nearest_none_when_path_is_clear() {
        let obstacles = vec![piece("a", 200.0, 300.0)];
        assert!(nearest_collision(vec2(100.0, 100.0), vec2(300.0, 100.0), &obstacles, R).is_none());
    }

    #[test]
    fn head_on_impact_transfers_all_velocity() {
        let out = resolve_elastic_collision(vec2(10.0, 0.0), vec2(160.0, 100.0), vec2(200.0, 100.0), 1.0);
        assert_close(out.striker.x, 0.0);
        assert_close(out.striker.y, 0.0);
        assert_close(out.target.x, 10.0);
        assert_close(out.target.y, 0.0);
    }

    #[test]
    fn oblique_impact_conserves_normal_momentum_up_to_friction() {
        let v = vec2(7.0, 3.0);
        let pc = vec2(160.0, 112.0);
        let q = vec2(195.0, 100.0);
        let friction = 0.6;
        let un = normalize(sub(pc, q)).unwrap();
        let ut = perp(un);

        let out = resolve_elastic_collision(v, pc, q, friction);

        let before = dot(un, v) + dot(un, Vec2::ZERO);
        let after = dot(un, out.striker) + dot(un, out.target);
        assert_close(after, friction * before);

        // Tangential components are carried through unchanged (then scaled).
        assert_close(dot(ut, out.striker), friction * dot(ut, v));
        assert_close(dot(ut, out.target), 0.0);
        // Striker keeps no normal component.
        assert_close(dot(un, out.striker), 0.0);
    }

    #[test]
    fn coincident_centres_pass_velocity_through() {
        let p = vec2(100.0, 100.0);
        let out = resolve_elastic_collision(vec2(4.0, -2.0), p, p, 0.5);
        assert_eq!(out.striker, vec2(2.0, -1.0));
        assert_eq!(out.target, Vec2::ZERO);
    }

    #[test]
    fn remaining_is_complement_of_t() {
        let c = Collision {
            point: Vec2::ZERO,
            t: 0.25,
            obstacle: "x".into(),
        };
        assert_close(c.remaining(), 0.75);
    }
}
