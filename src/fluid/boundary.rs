use glam::Vec2;

use crate::messages::Tunables;

/// The user-controlled solid disk. A zero radius disables it.
#[derive(Clone, Copy, Debug)]
pub struct Mover {
    pub center: Vec2,
    pub radius: f32,
}

impl Mover {
    pub fn from_tunables(tunables: &Tunables) -> Self {
        Self {
            center: Vec2::new(tunables.mover_x, tunables.mover_y),
            radius: tunables.mover_radius,
        }
    }

    /// Push a predicted position that has penetrated the disk back onto
    /// its surface, along the outward normal. A particle exactly at the
    /// center has no normal; it is ejected in +x.
    pub fn resolve(&self, pos: Vec2) -> Vec2 {
        let to_center = self.center - pos;
        let d2 = to_center.length_squared();
        if d2 > self.radius * self.radius {
            return pos;
        }
        if d2 == 0.0 {
            return pos + Vec2::new(self.radius, 0.0);
        }
        let d = d2.sqrt();
        let normal = to_center / d;
        pos - (self.radius - d) * normal
    }
}
