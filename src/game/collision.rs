//! Ball vs. static geometry

use super::body::Body;
use super::course::{Course, Hole, Obstacle};

/// Velocity kept (and reversed) after bouncing off a wall or obstacle
pub const RESTITUTION: f32 = 0.8;

/// Overlap test between a ball and one obstacle.
///
/// Rectangles use the rect grown by the ball radius on every side rather than
/// an exact circle/rect distance, so corners are slightly generous.
pub fn collides(body: &Body, obstacle: &Obstacle) -> bool {
    match *obstacle {
        Obstacle::Rect {
            x,
            y,
            width,
            height,
        } => {
            body.x + body.radius > x
                && body.x - body.radius < x + width
                && body.y + body.radius > y
                && body.y - body.radius < y + height
        }
        Obstacle::Circle { x, y, radius } => distance(body.x, body.y, x, y) < body.radius + radius,
    }
}

/// Whether the ball has dropped into the hole
pub fn in_hole(body: &Body, hole: &Hole) -> bool {
    distance(body.x, body.y, hole.x, hole.y) < body.radius + hole.radius
}

/// Reverse both velocity components, losing energy
pub fn bounce(body: &mut Body) {
    body.vx = -body.vx * RESTITUTION;
    body.vy = -body.vy * RESTITUTION;
}

/// Clamp the ball inside the course, reflecting the velocity on each wall hit.
/// Each edge is checked on its own, so a corner bounces both axes.
pub fn clamp_to_walls(body: &mut Body, course: &Course) {
    let r = body.radius;

    if body.x < r {
        body.x = r;
        body.vx = -body.vx * RESTITUTION;
    }
    if body.x > course.width - r {
        body.x = course.width - r;
        body.vx = -body.vx * RESTITUTION;
    }
    if body.y < r {
        body.y = r;
        body.vy = -body.vy * RESTITUTION;
    }
    if body.y > course.height - r {
        body.y = course.height - r;
        body.vy = -body.vy * RESTITUTION;
    }
}

/// Bounce off every obstacle the ball overlaps. Overlapping two obstacles
/// reflects twice, which cancels the reversal.
pub fn resolve_obstacles(body: &mut Body, obstacles: &[Obstacle]) -> usize {
    let mut hits = 0;
    for obstacle in obstacles {
        if collides(body, obstacle) {
            bounce(body);
            hits += 1;
        }
    }
    hits
}

fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x1 - x2;
    let dy = y1 - y2;
    (dx * dx + dy * dy).sqrt()
}
