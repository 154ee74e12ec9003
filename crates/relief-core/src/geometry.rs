use crate::glam::Vec3A;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: Vec3A,
    velocity: Vec3A,
    inverse_velocity: Vec3A,
}

impl Ray {
    pub fn new(start: Vec3A, velocity: Vec3A) -> Self {
        Self {
            start,
            velocity,
            inverse_velocity: 1.0 / velocity,
        }
    }

    pub fn velocity(&self) -> Vec3A {
        self.velocity
    }

    pub fn position_at(&self, t: f32) -> Vec3A {
        self.start + t * self.velocity
    }

    /// If the ray intersects box `aabb`, returns `(tmin, tmax)`, the entrance and exit times of the ray.
    ///
    /// Implemented as branchless, vectorized "slab method". Does not attempt to handle NaNs properly.
    ///
    /// Refer to [this reference](https://tavianator.com/2015/ray_box_nan.html).
    pub fn cast_at_aabb(&self, aabb: &Aabb) -> Option<[f32; 2]> {
        let t1 = (aabb.min - self.start) * self.inverse_velocity;
        let t2 = (aabb.max - self.start) * self.inverse_velocity;

        let tmin = t1.min(t2).max_element();
        let tmax = t1.max(t2).min_element();

        (tmax >= tmin.max(0.0)).then(|| [tmin, tmax])
    }

    /// Möller–Trumbore intersection with the triangle `[a, b, c]`. Returns the hit time if it's not behind the ray start.
    /// Both windings are accepted.
    pub fn cast_at_triangle(&self, [a, b, c]: [Vec3A; 3]) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.velocity.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.start - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.velocity.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then(|| t)
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Aabb {
    pub fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    /// The smallest box containing all `points`, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = Vec3A>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;

        Some(points.fold(Self::new(first, first), |aabb, p| {
            Self::new(aabb.min.min(p), aabb.max.max(p))
        }))
    }

    pub fn translated(&self, offset: Vec3A) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
