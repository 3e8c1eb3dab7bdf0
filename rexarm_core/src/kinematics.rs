//! Forward kinematics over a Denavit–Hartenberg chain.
//!
//! Link parameters come from configuration (`[[kinematics.links]]`). Poses are
//! recomputed on every call; nothing here caches.

use nalgebra::{Matrix3, Matrix4, Rotation3};

/// Standard DH parameters of one link. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhLink {
    pub a: f64,
    pub alpha: f64,
    pub d: f64,
    pub theta_offset: f64,
}

impl DhLink {
    /// Homogeneous transform from this link's base frame to its tip for joint angle `theta`.
    pub fn transform(&self, theta: f64) -> Matrix4<f64> {
        let (st, ct) = (theta + self.theta_offset).sin_cos();
        let (sa, ca) = self.alpha.sin_cos();
        Matrix4::new(
            ct,
            -st * ca,
            st * sa,
            self.a * ct,
            st,
            ct * ca,
            -ct * sa,
            self.a * st,
            0.0,
            sa,
            ca,
            self.d,
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DhChain {
    links: Vec<DhLink>,
}

impl DhChain {
    pub fn new(links: Vec<DhLink>) -> Self {
        Self { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn links(&self) -> &[DhLink] {
        &self.links
    }

    /// Base-to-tip transform for the first `min(angles.len(), links)` joints.
    pub fn transform(&self, angles: &[f64]) -> Matrix4<f64> {
        self.links
            .iter()
            .zip(angles)
            .fold(Matrix4::identity(), |acc, (link, &theta)| {
                acc * link.transform(theta)
            })
    }

    pub fn forward(&self, angles: &[f64]) -> Pose {
        Pose::from_matrix(&self.transform(angles))
    }
}

/// End-effector position plus ZYX Euler orientation (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let r: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let (roll, pitch, yaw) = Rotation3::from_matrix_unchecked(r).euler_angles();
        Self {
            x: m[(0, 3)],
            y: m[(1, 3)],
            z: m[(2, 3)],
            roll,
            pitch,
            yaw,
        }
    }

    /// `[x, y, z, roll, pitch, yaw]`
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z, self.roll, self.pitch, self.yaw]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn planar(a1: f64, a2: f64) -> DhChain {
        DhChain::new(vec![
            DhLink {
                a: a1,
                alpha: 0.0,
                d: 0.0,
                theta_offset: 0.0,
            },
            DhLink {
                a: a2,
                alpha: 0.0,
                d: 0.0,
                theta_offset: 0.0,
            },
        ])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn planar_arm_straight_out() {
        let p = planar(10.0, 5.0).forward(&[0.0, 0.0]);
        assert!(close(p.x, 15.0) && close(p.y, 0.0) && close(p.z, 0.0));
        assert!(close(p.yaw, 0.0));
    }

    #[test]
    fn planar_arm_elbow_up() {
        let p = planar(10.0, 5.0).forward(&[0.0, FRAC_PI_2]);
        assert!(close(p.x, 10.0), "x = {}", p.x);
        assert!(close(p.y, 5.0), "y = {}", p.y);
        assert!(close(p.yaw, FRAC_PI_2));
    }

    #[test]
    fn base_height_and_offset() {
        let chain = DhChain::new(vec![DhLink {
            a: 2.0,
            alpha: 0.0,
            d: 7.0,
            theta_offset: FRAC_PI_2,
        }]);
        let p = chain.forward(&[0.0]);
        assert!(close(p.x, 0.0) && close(p.y, 2.0) && close(p.z, 7.0));
    }

    #[test]
    fn pose_flattens_in_order() {
        let p = Pose {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            roll: 0.1,
            pitch: 0.2,
            yaw: 0.3,
        };
        assert_eq!(p.to_vec(), vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
    }
}
