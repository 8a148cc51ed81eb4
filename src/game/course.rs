//! Random course generation

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const COURSE_WIDTH: f32 = 800.0;
pub const COURSE_HEIGHT: f32 = 600.0;
pub const HOLE_RADIUS: f32 = 15.0;

/// Margin kept between the hole / circle centers and the walls
const CENTER_MARGIN: i32 = 100;
/// Smallest offset of a rect's top-left corner from the walls
const RECT_MARGIN: i32 = 50;
const MIN_OBSTACLES: usize = 10;
const MAX_OBSTACLES: usize = 15;

/// Target the balls are putting towards
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Static geometry a ball bounces off
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Obstacle {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Circle {
        x: f32,
        y: f32,
        radius: f32,
    },
}

/// One round's playfield. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub width: f32,
    pub height: f32,
    pub hole: Hole,
    pub obstacles: Vec<Obstacle>,
}

impl Course {
    /// Bounds and a hole with no obstacles
    pub fn empty(width: f32, height: f32, hole: Hole) -> Self {
        Self {
            width,
            height,
            hole,
            obstacles: Vec::new(),
        }
    }
}

/// Generate a course of the default size
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Course {
    generate_sized(rng, COURSE_WIDTH, COURSE_HEIGHT)
}

/// Generate a course. Obstacles may overlap each other and the hole.
pub fn generate_sized<R: Rng + ?Sized>(rng: &mut R, width: f32, height: f32) -> Course {
    let w = width as i32;
    let h = height as i32;

    let hole = Hole {
        x: random_int(rng, CENTER_MARGIN, w - CENTER_MARGIN),
        y: random_int(rng, CENTER_MARGIN, h - CENTER_MARGIN),
        radius: HOLE_RADIUS,
    };

    let count = rng.gen_range(MIN_OBSTACLES..MAX_OBSTACLES);
    let obstacles = (0..count)
        .map(|_| {
            if rng.gen_bool(0.5) {
                Obstacle::Rect {
                    x: random_int(rng, RECT_MARGIN, w - 100),
                    y: random_int(rng, RECT_MARGIN, h - 100),
                    width: random_int(rng, 30, 100),
                    height: random_int(rng, 30, 100),
                }
            } else {
                Obstacle::Circle {
                    x: random_int(rng, CENTER_MARGIN, w - CENTER_MARGIN),
                    y: random_int(rng, CENTER_MARGIN, h - CENTER_MARGIN),
                    radius: random_int(rng, 20, 50),
                }
            }
        })
        .collect();

    Course {
        width,
        height,
        hole,
        obstacles,
    }
}

/// Uniform integer in `[min, max)`, collapsing to `min` on an empty range
fn random_int<R: Rng + ?Sized>(rng: &mut R, min: i32, max: i32) -> f32 {
    if max <= min {
        return min as f32;
    }
    rng.gen_range(min..max) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn generated_courses_stay_inside_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let course = generate(&mut rng);
            assert_eq!((course.width, course.height), (COURSE_WIDTH, COURSE_HEIGHT));

            let hole = course.hole;
            assert_eq!(hole.radius, HOLE_RADIUS);
            assert!(hole.x >= 100.0 && hole.x < course.width - 100.0);
            assert!(hole.y >= 100.0 && hole.y < course.height - 100.0);
            assert!(hole.x - hole.radius >= 0.0 && hole.x + hole.radius <= course.width);
            assert!(hole.y - hole.radius >= 0.0 && hole.y + hole.radius <= course.height);

            assert!((10..15).contains(&course.obstacles.len()));
            for obstacle in &course.obstacles {
                match *obstacle {
                    Obstacle::Rect { x, y, width, height } => {
                        assert!((30.0..100.0).contains(&width));
                        assert!((30.0..100.0).contains(&height));
                        assert!(x >= 50.0 && x < course.width - 100.0);
                        assert!(y >= 50.0 && y < course.height - 100.0);
                        assert!(x + width <= course.width);
                        assert!(y + height <= course.height);
                    }
                    Obstacle::Circle { x, y, radius } => {
                        assert!((20.0..50.0).contains(&radius));
                        assert!(x - radius >= 0.0 && x + radius <= course.width);
                        assert!(y - radius >= 0.0 && y + radius <= course.height);
                    }
                }
            }
        }
    }

    #[test]
    fn same_seed_same_course() {
        let a = generate(&mut ChaCha8Rng::seed_from_u64(42));
        let b = generate(&mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn both_obstacle_shapes_appear() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let obstacles: Vec<Obstacle> = (0..20).flat_map(|_| generate(&mut rng).obstacles).collect();
        assert!(obstacles.iter().any(|o| matches!(o, Obstacle::Rect { .. })));
        assert!(obstacles.iter().any(|o| matches!(o, Obstacle::Circle { .. })));
    }

    #[test]
    fn obstacle_wire_tag() {
        let json = serde_json::to_value(Obstacle::Circle {
            x: 1.0,
            y: 2.0,
            radius: 3.0,
        })
        .unwrap();
        assert_eq!(json["type"], "circle");
    }
}
