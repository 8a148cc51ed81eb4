//! Per-tick ball motion

use super::body::Body;
use super::collision::{clamp_to_walls, in_hole, resolve_obstacles};
use super::course::Course;

/// Fraction of velocity kept each tick (rolling friction)
pub const DAMPING: f32 = 0.97;

/// Physics system for advancing balls one fixed step
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one ball by a single tick. Sunk balls are left untouched.
    ///
    /// Order matters: move, damp, clamp to walls, bounce off obstacles, then
    /// test the hole.
    pub fn step_body(body: &mut Body, course: &Course) {
        if body.finished {
            return;
        }

        body.x += body.vx;
        body.y += body.vy;

        body.vx *= DAMPING;
        body.vy *= DAMPING;

        clamp_to_walls(body, course);
        resolve_obstacles(body, &course.obstacles);

        if in_hole(body, &course.hole) {
            body.sink();
        }
    }

    /// Set a ball's velocity from a putt
    pub fn apply_impulse(body: &mut Body, angle: f32, power: f32) {
        body.vx = angle.cos() * power;
        body.vy = angle.sin() * power;
    }
}
