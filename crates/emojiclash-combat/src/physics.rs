use serde::{Deserialize, Serialize};

/// 2D vector on the arena plane. Positive y points down (screen coordinates),
/// so positive gravity pulls projectiles toward the bottom boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, or zero for degenerate input.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len < 1e-6 {
            return Vec2::ZERO;
        }
        Vec2::new(self.x / len, self.y / len)
    }

    pub fn scale(&self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Reflection axis for boundary and obstacle bounces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Integrate a position by velocity over `dt` seconds.
pub fn advance_position(pos: Vec2, vel: Vec2, dt: f32) -> Vec2 {
    pos + vel.scale(dt)
}

/// Reflect a velocity off an axis-aligned surface, scaling the reflected
/// component by `bounce_multiplier` (1.0 = perfectly elastic).
pub fn reflect(vel: Vec2, axis: Axis, bounce_multiplier: f32) -> Vec2 {
    let m = bounce_multiplier.clamp(0.0, 1.0);
    match axis {
        Axis::X => Vec2::new(-vel.x * m, vel.y),
        Axis::Y => Vec2::new(vel.x, -vel.y * m),
    }
}

/// Sample future positions of a straight shot from `start` toward `target`,
/// with gravity applied. For trail previews and telemetry only; authoritative
/// movement is always integrated per tick.
pub fn compute_trajectory_sample(
    start: Vec2,
    target: Vec2,
    speed: f32,
    gravity: f32,
    max_samples: usize,
) -> Vec<Vec2> {
    let dir = (target - start).normalized();
    let mut vel = dir.scale(speed);
    let mut pos = start;
    let dt = 1.0 / 30.0;
    let mut samples = Vec::with_capacity(max_samples);
    for _ in 0..max_samples {
        vel.y += gravity * dt;
        pos = advance_position(pos, vel, dt);
        samples.push(pos);
    }
    samples
}

/// Ray-circle intersection (2D). Returns the nearest positive `t` along the
/// unit direction, if any.
pub fn ray_circle_intersection(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let f = origin - center;
    let a = dir.dot(dir);
    let b = 2.0 * f.dot(dir);
    let c = f.dot(f) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;

    if discriminant < 0.0 || a < 1e-12 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) / (2.0 * a);
    let t2 = (-b + sqrt_d) / (2.0 * a);

    if t1 > 0.0 {
        Some(t1)
    } else if t2 > 0.0 {
        Some(t2)
    } else {
        None
    }
}

/// Ray-AABB intersection via the slab method. Returns the entry `t` and the
/// axis of the face that was struck, for rays starting outside the box.
pub fn ray_aabb_intersection(
    origin: Vec2,
    dir: Vec2,
    min: Vec2,
    max: Vec2,
) -> Option<(f32, Axis)> {
    let inv_x = if dir.x.abs() < 1e-12 { f32::INFINITY } else { 1.0 / dir.x };
    let inv_y = if dir.y.abs() < 1e-12 { f32::INFINITY } else { 1.0 / dir.y };

    let mut tx1 = (min.x - origin.x) * inv_x;
    let mut tx2 = (max.x - origin.x) * inv_x;
    if tx1 > tx2 {
        std::mem::swap(&mut tx1, &mut tx2);
    }

    let mut ty1 = (min.y - origin.y) * inv_y;
    let mut ty2 = (max.y - origin.y) * inv_y;
    if ty1 > ty2 {
        std::mem::swap(&mut ty1, &mut ty2);
    }

    let t_enter = tx1.max(ty1);
    let t_exit = tx2.min(ty2);

    if t_enter > t_exit || t_exit < 0.0 || t_enter < 0.0 {
        return None;
    }

    let axis = if tx1 > ty1 { Axis::X } else { Axis::Y };
    Some((t_enter, axis))
}
