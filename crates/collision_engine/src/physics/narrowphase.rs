//! Exact volume-pair overlap tests
//!
//! Narrowphase tests run on broadphase candidates and produce at most a
//! single contact normal/point per pair; there are no contact manifolds.
//! Box pairs use a 15-axis separating-axis test with projected radii
//! (Real-Time Rendering 4th ed., 22.13); sphere/box uses the closest-point
//! form; capsules reduce to segment-distance queries.
//!
//! All tests are total: degenerate volumes resolve deterministically and no
//! function here panics.

use crate::foundation::math::Vec3;
use crate::geometry::Obb;
use super::shapes::Volume;

const EPSILON: f32 = 1e-6;

/// Single contact produced by an overlap test
///
/// The normal is oriented from the first shape toward the second.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Contact normal, unit length for non-degenerate overlaps
    pub normal: Vec3,
    /// Representative contact point in world space
    pub point: Vec3,
}

impl Contact {
    /// Contact carrying no geometric information
    ///
    /// Used for end-overlap notifications, where no meaningful geometry
    /// exists for a pair that just stopped touching.
    pub fn empty() -> Self {
        Self {
            normal: Vec3::zeros(),
            point: Vec3::zeros(),
        }
    }

    /// The same contact seen from the other shape
    pub fn reversed(&self) -> Self {
        Self {
            normal: -self.normal,
            point: self.point,
        }
    }
}

/// Exact overlap test between two world-space volumes
///
/// Returns a contact with the normal oriented from `a` toward `b`, or `None`
/// when the volumes do not overlap.
pub fn intersect_volumes(a: &Volume, b: &Volume) -> Option<Contact> {
    match (a, b) {
        (Volume::Sphere { center: ca, radius: ra }, Volume::Sphere { center: cb, radius: rb }) => {
            sphere_vs_sphere(*ca, *ra, *cb, *rb)
        }

        (Volume::Sphere { center, radius }, Volume::Obb(obb)) => {
            sphere_vs_obb(*center, *radius, obb)
        }
        (Volume::Obb(obb), Volume::Sphere { center, radius }) => {
            sphere_vs_obb(*center, *radius, obb).map(|contact| contact.reversed())
        }

        (Volume::Obb(a), Volume::Obb(b)) => obb_vs_obb(a, b),

        (Volume::Capsule { start, end, radius }, Volume::Sphere { center, radius: rb }) => {
            capsule_vs_sphere(*start, *end, *radius, *center, *rb)
        }
        (Volume::Sphere { center, radius }, Volume::Capsule { start, end, radius: rb }) => {
            capsule_vs_sphere(*start, *end, *rb, *center, *radius).map(|contact| contact.reversed())
        }

        (
            Volume::Capsule { start: a0, end: a1, radius: ra },
            Volume::Capsule { start: b0, end: b1, radius: rb },
        ) => {
            let (on_a, on_b) = closest_points_on_segments(*a0, *a1, *b0, *b1);
            sphere_vs_sphere(on_a, *ra, on_b, *rb)
        }

        (Volume::Capsule { start, end, radius }, Volume::Obb(obb)) => {
            capsule_vs_obb(*start, *end, *radius, obb)
        }
        (Volume::Obb(obb), Volume::Capsule { start, end, radius }) => {
            capsule_vs_obb(*start, *end, *radius, obb).map(|contact| contact.reversed())
        }
    }
}

/// Normalize `primary`, falling back to `fallback` and finally +X so a valid
/// unit normal always comes back
fn direction_or(primary: Vec3, fallback: Vec3) -> Vec3 {
    if primary.magnitude_squared() > EPSILON {
        return primary.normalize();
    }
    if fallback.magnitude_squared() > EPSILON {
        return fallback.normalize();
    }
    Vec3::x()
}

fn sphere_vs_sphere(ca: Vec3, ra: f32, cb: Vec3, rb: f32) -> Option<Contact> {
    let delta = cb - ca;
    let reach = ra + rb;
    if delta.magnitude_squared() > reach * reach {
        return None;
    }

    let normal = direction_or(delta, Vec3::x());
    Some(Contact {
        normal,
        point: ca + normal * ra,
    })
}

/// Closest point on the OBB surface or interior to `point`
fn closest_point_on_obb(point: Vec3, obb: &Obb) -> Vec3 {
    let delta = point - obb.center;
    let mut closest = obb.center;
    for axis_index in 0..3 {
        let axis = obb.axes[axis_index];
        let extent = obb.extents[axis_index];
        let offset = delta.dot(&axis).clamp(-extent, extent);
        closest += axis * offset;
    }
    closest
}

fn sphere_vs_obb(center: Vec3, radius: f32, obb: &Obb) -> Option<Contact> {
    let closest = closest_point_on_obb(center, obb);
    let delta = closest - center;
    if delta.magnitude_squared() > radius * radius {
        return None;
    }

    // A center inside the box gives a zero delta; aim at the box center then
    let normal = direction_or(delta, obb.center - center);
    Some(Contact {
        normal,
        point: closest,
    })
}

/// Half-length of the OBB's projection onto a unit axis
fn project_radius(obb: &Obb, axis: &Vec3) -> f32 {
    obb.extents.x * obb.axes[0].dot(axis).abs()
        + obb.extents.y * obb.axes[1].dot(axis).abs()
        + obb.extents.z * obb.axes[2].dot(axis).abs()
}

/// 15-axis SAT between two oriented boxes, tracking the minimum-penetration
/// axis for the contact normal
fn obb_vs_obb(a: &Obb, b: &Obb) -> Option<Contact> {
    let delta = b.center - a.center;

    let mut best_penetration = f32::MAX;
    let mut best_axis: Option<Vec3> = None;

    let mut separated_on = |axis: Vec3| -> bool {
        let length_sq = axis.magnitude_squared();
        if length_sq < EPSILON {
            // Near-parallel edge pairs produce degenerate cross products
            return false;
        }

        let unit = axis / length_sq.sqrt();
        let distance = delta.dot(&unit).abs();
        let reach = project_radius(a, &unit) + project_radius(b, &unit);
        if distance > reach {
            return true;
        }

        let penetration = reach - distance;
        if penetration < best_penetration {
            best_penetration = penetration;
            best_axis = Some(unit);
        }
        false
    };

    for axis in a.axes {
        if separated_on(axis) {
            return None;
        }
    }
    for axis in b.axes {
        if separated_on(axis) {
            return None;
        }
    }
    for a_axis in a.axes {
        for b_axis in b.axes {
            if separated_on(a_axis.cross(&b_axis)) {
                return None;
            }
        }
    }

    let mut normal = best_axis.unwrap_or_else(Vec3::x);
    if normal.dot(&delta) < 0.0 {
        normal = -normal;
    }

    Some(Contact {
        normal,
        point: (a.center + b.center) * 0.5,
    })
}

/// Closest point on segment `[a, b]` to `point`
fn closest_point_on_segment(point: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let length_sq = ab.magnitude_squared();
    if length_sq <= EPSILON {
        return a;
    }
    let t = ((point - a).dot(&ab) / length_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `[p0, p1]` and `[q0, q1]`
fn closest_points_on_segments(p0: Vec3, p1: Vec3, q0: Vec3, q1: Vec3) -> (Vec3, Vec3) {
    let u = p1 - p0;
    let v = q1 - q0;
    let w = p0 - q0;
    let a = u.dot(&u);
    let b = u.dot(&v);
    let c = v.dot(&v);
    let d = u.dot(&w);
    let e = v.dot(&w);
    let denom = a * c - b * b;

    let mut sn;
    let mut sd = denom;
    let mut tn;
    let mut td = denom;

    if denom < EPSILON {
        // Near-parallel segments: pin s to the start of the first segment
        sn = 0.0;
        sd = 1.0;
        tn = e;
        td = c;
    } else {
        sn = b * e - c * d;
        tn = a * e - b * d;
        if sn < 0.0 {
            sn = 0.0;
            tn = e;
            td = c;
        } else if sn > sd {
            sn = sd;
            tn = e + b;
            td = c;
        }
    }

    if tn < 0.0 {
        tn = 0.0;
        if -d < 0.0 {
            sn = 0.0;
        } else if -d > a {
            sn = sd;
        } else {
            sn = -d;
            sd = a;
        }
    } else if tn > td {
        tn = td;
        if (-d + b) < 0.0 {
            sn = 0.0;
        } else if (-d + b) > a {
            sn = sd;
        } else {
            sn = -d + b;
            sd = a;
        }
    }

    let s = if sn.abs() < EPSILON || sd.abs() < EPSILON { 0.0 } else { sn / sd };
    let t = if tn.abs() < EPSILON || td.abs() < EPSILON { 0.0 } else { tn / td };

    (p0 + u * s, q0 + v * t)
}

fn capsule_vs_sphere(start: Vec3, end: Vec3, capsule_radius: f32, center: Vec3, radius: f32) -> Option<Contact> {
    let on_segment = closest_point_on_segment(center, start, end);
    sphere_vs_sphere(on_segment, capsule_radius, center, radius)
}

fn capsule_vs_obb(start: Vec3, end: Vec3, radius: f32, obb: &Obb) -> Option<Contact> {
    // Anchor the capsule at the segment point nearest the box center and run
    // the sphere/box test there. Conservative for long capsules grazing a
    // box corner.
    let anchor = closest_point_on_segment(obb.center, start, end);
    sphere_vs_obb(anchor, radius, obb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Transform};
    use crate::geometry::Aabb;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn obb_at(center: Vec3, extents: Vec3, yaw: f32) -> Obb {
        let rotation: Quat = UnitQuaternion::from_axis_angle(&Vec3::z_axis(), yaw);
        Obb::from_aabb_transform(
            &Aabb::from_center_extents(Vec3::zeros(), extents),
            &Transform {
                position: center,
                rotation,
                scale: Vec3::new(1.0, 1.0, 1.0),
            },
        )
    }

    #[test]
    fn test_sphere_sphere_contact() {
        let a = Volume::Sphere { center: Vec3::zeros(), radius: 1.0 };
        let b = Volume::Sphere { center: Vec3::new(1.5, 0.0, 0.0), radius: 1.0 };

        let contact = intersect_volumes(&a, &b).expect("overlapping spheres");
        assert_relative_eq!(contact.normal, Vec3::x());
        assert_relative_eq!(contact.point, Vec3::new(1.0, 0.0, 0.0));

        let apart = Volume::Sphere { center: Vec3::new(3.0, 0.0, 0.0), radius: 1.0 };
        assert!(intersect_volumes(&a, &apart).is_none());
    }

    #[test]
    fn test_sphere_sphere_coincident_centers() {
        let a = Volume::Sphere { center: Vec3::zeros(), radius: 1.0 };
        let b = Volume::Sphere { center: Vec3::zeros(), radius: 0.5 };

        let contact = intersect_volumes(&a, &b).expect("contained sphere overlaps");
        // Degenerate direction falls back to a valid unit normal
        assert_relative_eq!(contact.normal.magnitude(), 1.0);
    }

    #[test]
    fn test_sphere_obb_outside_and_inside() {
        let obb = obb_at(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 0.0);

        let outside = Volume::Sphere { center: Vec3::new(1.8, 0.0, 0.0), radius: 1.0 };
        let contact = intersect_volumes(&outside, &Volume::Obb(obb)).expect("touching");
        // Normal points from the sphere toward the box face
        assert_relative_eq!(contact.normal, -Vec3::x(), epsilon = 1e-5);
        assert_relative_eq!(contact.point, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);

        let inside = Volume::Sphere { center: Vec3::new(0.2, 0.0, 0.0), radius: 0.1 };
        assert!(intersect_volumes(&inside, &Volume::Obb(obb)).is_some());

        let far = Volume::Sphere { center: Vec3::new(5.0, 0.0, 0.0), radius: 1.0 };
        assert!(intersect_volumes(&far, &Volume::Obb(obb)).is_none());
    }

    #[test]
    fn test_obb_obb_rotated_pair() {
        let a = obb_at(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 0.0);

        let touching = obb_at(
            Vec3::new(2.3, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            std::f32::consts::FRAC_PI_4,
        );
        let contact = intersect_volumes(&Volume::Obb(a), &Volume::Obb(touching))
            .expect("rotated box reaches sqrt(2)");
        assert!(contact.normal.dot(&Vec3::x()) > 0.0, "normal oriented a -> b");

        let separated = obb_at(
            Vec3::new(2.5, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            std::f32::consts::FRAC_PI_4,
        );
        assert!(intersect_volumes(&Volume::Obb(a), &Volume::Obb(separated)).is_none());
    }

    #[test]
    fn test_capsule_sphere() {
        let capsule = Volume::Capsule {
            start: Vec3::new(0.0, 0.0, -2.0),
            end: Vec3::new(0.0, 0.0, 2.0),
            radius: 0.5,
        };

        // Beside the shaft, within combined radii
        let near = Volume::Sphere { center: Vec3::new(1.2, 0.0, 1.0), radius: 1.0 };
        let contact = intersect_volumes(&capsule, &near).expect("sphere reaches the shaft");
        assert_relative_eq!(contact.normal, Vec3::x(), epsilon = 1e-5);

        // Beyond the cap along the axis
        let past_cap = Volume::Sphere { center: Vec3::new(0.0, 0.0, 4.0), radius: 1.0 };
        assert!(intersect_volumes(&capsule, &past_cap).is_none());
    }

    #[test]
    fn test_capsule_capsule_parallel_shafts() {
        let a = Volume::Capsule {
            start: Vec3::new(0.0, 0.0, -1.0),
            end: Vec3::new(0.0, 0.0, 1.0),
            radius: 0.5,
        };
        let near = Volume::Capsule {
            start: Vec3::new(0.9, 0.0, -1.0),
            end: Vec3::new(0.9, 0.0, 1.0),
            radius: 0.5,
        };
        let far = Volume::Capsule {
            start: Vec3::new(1.1, 0.0, -1.0),
            end: Vec3::new(1.1, 0.0, 1.0),
            radius: 0.5,
        };

        assert!(intersect_volumes(&a, &near).is_some());
        assert!(intersect_volumes(&a, &far).is_none());
    }

    #[test]
    fn test_capsule_obb() {
        let obb = obb_at(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 0.0);

        let resting = Volume::Capsule {
            start: Vec3::new(-1.0, 0.0, 1.4),
            end: Vec3::new(1.0, 0.0, 1.4),
            radius: 0.5,
        };
        assert!(intersect_volumes(&resting, &Volume::Obb(obb)).is_some());

        let hovering = Volume::Capsule {
            start: Vec3::new(-1.0, 0.0, 1.6),
            end: Vec3::new(1.0, 0.0, 1.6),
            radius: 0.5,
        };
        assert!(intersect_volumes(&hovering, &Volume::Obb(obb)).is_none());
    }

    #[test]
    fn test_degenerate_zero_length_capsule_acts_as_sphere() {
        let point_capsule = Volume::Capsule {
            start: Vec3::zeros(),
            end: Vec3::zeros(),
            radius: 1.0,
        };
        let sphere = Volume::Sphere { center: Vec3::new(1.5, 0.0, 0.0), radius: 1.0 };

        let contact = intersect_volumes(&point_capsule, &sphere).expect("still overlaps");
        assert_relative_eq!(contact.normal, Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_reversed_contact_negates_normal_only() {
        let contact = Contact {
            normal: Vec3::new(0.0, 1.0, 0.0),
            point: Vec3::new(1.0, 2.0, 3.0),
        };
        let reversed = contact.reversed();
        assert_relative_eq!(reversed.normal, Vec3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(reversed.point, contact.point);
    }
}
