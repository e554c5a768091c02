//! Conversion from the runtime's right-handed poses to a left-handed engine
//! frame, and writing the result onto scene objects.
//!
//! The runtime uses +Z backward, the engine +Z forward. Mirroring Z turns the
//! runtime matrix `M` into `S·M·S` with `S = diag(1, 1, -1)`: the third row
//! and third column flip sign, element `[2][2]` keeps it.

use crate::types::{DeviceIndex, RawPose, INVALID_DEVICE_INDEX};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Position and rotation decomposed from a runtime 3x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl RigidTransform {
    /// Decompose a row-major 3x4 runtime matrix into engine-space position and
    /// rotation.
    pub fn from_hmd_matrix(m: &[[f32; 4]; 3]) -> Self {
        let r = [
            [m[0][0], m[0][1], -m[0][2]],
            [m[1][0], m[1][1], -m[1][2]],
            [-m[2][0], -m[2][1], m[2][2]],
        ];
        let position = Vector3::new(m[0][3], m[1][3], -m[2][3]);

        Self {
            position,
            rotation: rotation_from_matrix(&r),
        }
    }
}

// Adapted from http://www.euclideanspace.com/maths/geometry/rotations/conversions/matrixToQuaternion/index.htm
fn rotation_from_matrix(r: &[[f32; 3]; 3]) -> UnitQuaternion<f32> {
    let w = f32::max(0.0, 1.0 + r[0][0] + r[1][1] + r[2][2]).sqrt() * 0.5;
    let x = f32::max(0.0, 1.0 + r[0][0] - r[1][1] - r[2][2]).sqrt() * 0.5;
    let y = f32::max(0.0, 1.0 - r[0][0] + r[1][1] - r[2][2]).sqrt() * 0.5;
    let z = f32::max(0.0, 1.0 - r[0][0] - r[1][1] + r[2][2]).sqrt() * 0.5;

    let x = x.copysign(r[2][1] - r[1][2]);
    let y = y.copysign(r[0][2] - r[2][0]);
    let z = z.copysign(r[1][0] - r[0][1]);

    UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
}

/// A device's pose and motion in engine space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceTransform {
    pub device: DeviceIndex,
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
}

impl Default for DeviceTransform {
    fn default() -> Self {
        Self {
            device: INVALID_DEVICE_INDEX,
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl DeviceTransform {
    /// Convert one snapshot entry. Validity is the caller's concern.
    pub fn from_raw_pose(device: DeviceIndex, pose: &RawPose) -> Self {
        let rigid = RigidTransform::from_hmd_matrix(&pose.device_to_absolute);
        let [vx, vy, vz] = pose.velocity;
        let [wx, wy, wz] = pose.angular_velocity;

        Self {
            device,
            position: rigid.position,
            rotation: rigid.rotation,
            velocity: Vector3::new(vx, vy, -vz),
            // Angular velocity is a pseudovector, so mirroring Z flips X and Y.
            angular_velocity: Vector3::new(-wx, -wy, wz),
        }
    }
}

/// A scene object the tracker can drive.
pub trait SceneNode {
    fn set_position(&mut self, position: Vector3<f32>);
    fn set_rotation(&mut self, rotation: UnitQuaternion<f32>);
    fn set_local_position(&mut self, position: Vector3<f32>);
    fn set_local_rotation(&mut self, rotation: UnitQuaternion<f32>);
}

/// Write a device pose as the node's world pose. Does nothing without a pose.
pub fn apply_world<N: SceneNode + ?Sized>(node: &mut N, transform: Option<&DeviceTransform>) {
    if let Some(t) = transform {
        node.set_position(t.position);
        node.set_rotation(t.rotation);
    }
}

/// Write a device pose as the node's local pose. Does nothing without a pose.
pub fn apply_local<N: SceneNode + ?Sized>(node: &mut N, transform: Option<&DeviceTransform>) {
    if let Some(t) = transform {
        node.set_local_position(t.position);
        node.set_local_rotation(t.rotation);
    }
}

/// Write `transform` relative to `offset` as the node's world pose. A missing
/// offset is the identity.
pub fn apply_world_with_offset<N: SceneNode + ?Sized>(
    node: &mut N,
    transform: Option<&DeviceTransform>,
    offset: Option<&DeviceTransform>,
) {
    if let Some(t) = transform {
        let (position, rotation) = relative_to(t, offset);
        node.set_position(position);
        node.set_rotation(rotation);
    }
}

/// Write `transform` relative to `offset` as the node's local pose. A missing
/// offset is the identity.
pub fn apply_local_with_offset<N: SceneNode + ?Sized>(
    node: &mut N,
    transform: Option<&DeviceTransform>,
    offset: Option<&DeviceTransform>,
) {
    if let Some(t) = transform {
        let (position, rotation) = relative_to(t, offset);
        node.set_local_position(position);
        node.set_local_rotation(rotation);
    }
}

fn relative_to(
    t: &DeviceTransform,
    offset: Option<&DeviceTransform>,
) -> (Vector3<f32>, UnitQuaternion<f32>) {
    let offset = offset.copied().unwrap_or_default();
    (
        t.position - offset.position,
        t.rotation * offset.rotation.inverse(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const IDENTITY: [[f32; 4]; 3] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];

    #[derive(Default)]
    struct Node {
        position: Option<Vector3<f32>>,
        rotation: Option<UnitQuaternion<f32>>,
        local_position: Option<Vector3<f32>>,
        local_rotation: Option<UnitQuaternion<f32>>,
    }

    impl SceneNode for Node {
        fn set_position(&mut self, position: Vector3<f32>) {
            self.position = Some(position);
        }
        fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
            self.rotation = Some(rotation);
        }
        fn set_local_position(&mut self, position: Vector3<f32>) {
            self.local_position = Some(position);
        }
        fn set_local_rotation(&mut self, rotation: UnitQuaternion<f32>) {
            self.local_rotation = Some(rotation);
        }
    }

    #[test]
    fn test_identity_matrix() {
        let t = RigidTransform::from_hmd_matrix(&IDENTITY);
        assert_eq!(t.position, Vector3::zeros());
        assert!(t.rotation.angle() < 1e-6);
    }

    #[test]
    fn test_position_z_is_mirrored() {
        let mut m = IDENTITY;
        m[0][3] = 0.5;
        m[1][3] = 1.6;
        m[2][3] = -0.25;
        let t = RigidTransform::from_hmd_matrix(&m);
        assert_eq!(t.position, Vector3::new(0.5, 1.6, 0.25));
    }

    #[test]
    fn test_yaw_is_mirrored() {
        // +90 degrees about Y in the runtime frame.
        let m = [
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0, 0.0],
        ];
        let t = RigidTransform::from_hmd_matrix(&m);
        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -FRAC_PI_2);
        assert!(t.rotation.angle_to(&expected) < 1e-5);
    }

    #[test]
    fn test_velocity_flip() {
        let pose = RawPose {
            device_to_absolute: IDENTITY,
            velocity: [1.0, 2.0, 3.0],
            angular_velocity: [0.1, 0.2, 0.3],
            pose_valid: true,
            connected: true,
            ..Default::default()
        };
        let t = DeviceTransform::from_raw_pose(4, &pose);
        assert_eq!(t.device, 4);
        assert_eq!(t.velocity, Vector3::new(1.0, 2.0, -3.0));
        assert_eq!(t.angular_velocity, Vector3::new(-0.1, -0.2, 0.3));
    }

    #[test]
    fn test_apply_without_transform_is_noop() {
        let mut node = Node::default();
        apply_world(&mut node, None);
        apply_local_with_offset(&mut node, None, None);
        assert!(node.position.is_none());
        assert!(node.local_position.is_none());
    }

    #[test]
    fn test_apply_with_offset() {
        let t = DeviceTransform {
            device: 1,
            position: Vector3::new(1.0, 2.0, 3.0),
            rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
            ..Default::default()
        };
        let offset = DeviceTransform {
            device: 2,
            position: Vector3::new(0.5, 0.5, 0.5),
            rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
            ..Default::default()
        };

        let mut node = Node::default();
        apply_world_with_offset(&mut node, Some(&t), Some(&offset));
        assert_eq!(node.position, Some(Vector3::new(0.5, 1.5, 2.5)));
        assert!(node.rotation.unwrap().angle() < 1e-6);

        apply_local_with_offset(&mut node, Some(&t), None);
        assert_eq!(node.local_position, Some(t.position));
        assert!(node.local_rotation.unwrap().angle_to(&t.rotation) < 1e-6);
    }
}
