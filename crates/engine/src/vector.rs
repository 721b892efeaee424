use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pool::Poolable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn set(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn zero(&mut self) -> &mut Self {
        self.set(0.0, 0.0)
    }

    /// Multiplies both components in place.
    pub fn scale(&mut self, factor: f32) -> &mut Self {
        self.x *= factor;
        self.y *= factor;
        self
    }

    /// Divides both components in place. Division by zero leaves the vector untouched.
    pub fn divide(&mut self, divisor: f32) -> &mut Self {
        if divisor != 0.0 {
            self.x /= divisor;
            self.y /= divisor;
        }
        self
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalize(&mut self) -> &mut Self {
        let len = self.length();
        if len > 0.0 {
            self.x /= len;
            self.y /= len;
        }
        self
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Clamps the magnitude to `max`, keeping direction.
    pub fn limit(&mut self, max: f32) -> &mut Self {
        let len_sq = self.length_sq();
        if len_sq > max * max && len_sq > 0.0 {
            let factor = max / len_sq.sqrt();
            self.x *= factor;
            self.y *= factor;
        }
        self
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Writes `a - b` into `res` without touching either operand.
    pub fn sub_into(res: &mut Vec2, a: Vec2, b: Vec2) {
        res.x = a.x - b.x;
        res.y = a.y - b.y;
    }

    /// Unit vector pointing in a uniformly random direction.
    pub fn random_dir<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        Vec2::new(angle.cos(), angle.sin())
    }
}

impl Poolable for Vec2 {
    fn reset(&mut self) {
        *self = Vec2::ZERO;
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}
