/// Circle centred on the owning entity's world position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingCircle {
    pub radius: f32,
}

/// Category bits (`collision_type`) and interest bits (`mask`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collidable {
    pub collision_type: u32,
    pub mask: u32,
    pub enabled: bool,
    pub bounds: BoundingCircle,
}

impl Collidable {
    pub fn new(collision_type: u32, mask: u32, radius: f32) -> Self {
        Self {
            collision_type,
            mask,
            enabled: true,
            bounds: BoundingCircle { radius },
        }
    }

    /// Both sides must be interested in the other's category.
    pub fn accepts(&self, other: &Collidable) -> bool {
        (self.collision_type & other.mask) != 0 && (other.collision_type & self.mask) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_test_is_symmetric_for_all_nibbles() {
        for type_a in 0..16u32 {
            for mask_a in 0..16u32 {
                for type_b in 0..16u32 {
                    for mask_b in 0..16u32 {
                        let a = Collidable::new(type_a, mask_a, 1.0);
                        let b = Collidable::new(type_b, mask_b, 1.0);
                        let expected = (type_a & mask_b) != 0 && (type_b & mask_a) != 0;
                        assert_eq!(a.accepts(&b), expected);
                        assert_eq!(a.accepts(&b), b.accepts(&a));
                    }
                }
            }
        }
    }

    #[test]
    fn one_sided_interest_is_rejected() {
        let player = Collidable::new(2, 1, 15.0);
        let deaf_food = Collidable::new(1, 0, 16.0);
        assert!(!player.accepts(&deaf_food));
    }
}
