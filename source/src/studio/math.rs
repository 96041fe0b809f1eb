//! Decoders for the packed animation types and the bone matrix helpers.
//!
//! Matrices are glam column vector matrices: `parent * local`, `matrix * point`.

use glam::{Mat4, Quat, Vec3, Vec4};

use super::{
    mdl_headers::{Quaternion48, Quaternion64, Vector48},
    StudioError,
};

/// Applied to root bones, swaps X and Y to go from the studio axis to world axis.
pub const ROOT_AXIS_TRANSFORM: Mat4 = Mat4::from_cols(
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);

/// Reconstruct w from the other three components. Clamped so bad data can't produce NaN.
fn with_w(x: f32, y: f32, z: f32, w_negative: bool) -> Quat {
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    Quat::from_xyzw(x, y, z, if w_negative { -w } else { w })
}

pub fn decode_quaternion48(q: Quaternion48) -> Quat {
    let (qx, qy, qzw) = (q.x, q.y, q.zw);
    let x = (qx as f32 - 32768.0) / 32768.0;
    let y = (qy as f32 - 32768.0) / 32768.0;
    let z = ((qzw & 0x7FFF) as f32 - 16384.0) / 16384.0;
    with_w(x, y, z, qzw & 0x8000 != 0)
}

pub fn decode_quaternion64(q: Quaternion64) -> Quat {
    const MASK: u64 = (1 << 21) - 1;
    let bits = q.bits;
    let component = |shift: u32| ((bits >> shift) & MASK) as f64 - 1048576.0;
    let scale = 1.0 / 1048576.5;
    let x = (component(0) * scale) as f32;
    let y = (component(21) * scale) as f32;
    let z = (component(42) * scale) as f32;
    with_w(x, y, z, bits >> 63 != 0)
}

/// IEEE half float, except the all-ones exponent: infinities saturate to ±65504 and NaNs become 0.
pub fn decode_float16(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1F) as i32;
    let mantissa = (bits & 0x3FF) as u32;

    match exponent {
        31 if mantissa == 0 => sign * 65504.0,
        31 => 0.0,
        0 if mantissa == 0 => 0.0 * sign,
        // denormal
        0 => sign * (mantissa as f32 / 1024.0) * 2f32.powi(-14),
        _ => {
            let single =
                ((bits as u32 & 0x8000) << 16) | (((exponent - 15 + 127) as u32) << 23) | (mantissa << 13);
            f32::from_bits(single)
        }
    }
}

pub fn decode_vector48(v: Vector48) -> Vec3 {
    let xyz = v.xyz;
    Vec3::new(
        decode_float16(xyz[0]),
        decode_float16(xyz[1]),
        decode_float16(xyz[2]),
    )
}

/// Radian euler angles (x roll, y pitch, z yaw) to a quaternion, yaw applied last.
pub fn euler_to_quaternion(angles: Vec3) -> Quat {
    let (sr, cr) = (angles.x * 0.5).sin_cos();
    let (sp, cp) = (angles.y * 0.5).sin_cos();
    let (sy, cy) = (angles.z * 0.5).sin_cos();

    Quat::from_xyzw(
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    )
}

/// Pick the sign of `q` closest to `align`, both signs describe the same rotation.
pub fn align_quaternion(q: Quat, align: Quat) -> Quat {
    let a = (q - align).length_squared();
    let b = (q + align).length_squared();
    if a > b {
        -q
    } else {
        q
    }
}

/// Rotate, then translate.
pub fn matrix_from_rot_and_pos(rot: Quat, pos: Vec3) -> Mat4 {
    Mat4::from_rotation_translation(rot, pos)
}

/// Expand a 3x4 row major matrix with the translation in the last column.
pub fn pose_to_bone_matrix(m: &[f32; 12]) -> Mat4 {
    Mat4::from_cols_array(&[
        m[0], m[4], m[8], 0.0, //
        m[1], m[5], m[9], 0.0, //
        m[2], m[6], m[10], 0.0, //
        m[3], m[7], m[11], 1.0,
    ])
}

/// Unit axis and angle in degrees within (-180, 180].
pub fn quaternion_to_axis_angle(q: Quat) -> (Vec3, f32) {
    let mut angle = (2.0 * q.w.clamp(-1.0, 1.0).acos()).to_degrees();
    if angle > 180.0 {
        angle -= 360.0;
    }
    (q.xyz().normalize_or_zero(), angle)
}

/// (pitch, yaw, roll) in degrees of the rotation part of `m`.
pub fn matrix_to_euler_angles(m: Mat4) -> Vec3 {
    let forward = m.x_axis.truncate();
    let left = m.y_axis.truncate();
    let up_z = m.z_axis.z;

    let xy_dist = (forward.x * forward.x + forward.y * forward.y).sqrt();

    if xy_dist > 0.001 {
        Vec3::new(
            (-forward.z).atan2(xy_dist).to_degrees(),
            forward.y.atan2(forward.x).to_degrees(),
            left.z.atan2(up_z).to_degrees(),
        )
    } else {
        // gimbal lock, forward is straight up or down
        Vec3::new(
            (-forward.z).atan2(xy_dist).to_degrees(),
            (-left.x).atan2(left.y).to_degrees(),
            0.0,
        )
    }
}

fn parent_of(parents: &[i32], bone: usize) -> Result<Option<usize>, StudioError> {
    let parent = parents[bone];
    if parent < 0 {
        Ok(None)
    } else if (parent as usize) < parents.len() {
        Ok(Some(parent as usize))
    } else {
        Err(StudioError::Structure(format!(
            "bone {bone} has parent {parent} outside {} bones",
            parents.len()
        )))
    }
}

/// Concatenate bone to parent matrices into bone to world matrices.
/// Parents may appear after their children; chains must end at a root.
pub fn concatenate_bone_chain(local: &[Mat4], parents: &[i32]) -> Result<Vec<Mat4>, StudioError> {
    let count = local.len();
    if parents.len() != count {
        return Err(StudioError::Structure(format!(
            "{} parents for {count} bone matrices",
            parents.len()
        )));
    }

    let mut world: Vec<Option<Mat4>> = vec![None; count];
    let mut chain = Vec::new();

    for bone in 0..count {
        chain.clear();
        let mut current = Some(bone);
        while let Some(b) = current {
            if world[b].is_some() {
                break;
            }
            if chain.len() >= count {
                return Err(StudioError::Structure(format!(
                    "bone {bone} parent chain is cyclic"
                )));
            }
            chain.push(b);
            current = parent_of(parents, b)?;
        }

        // root most first, so every parent is resolved before its child
        for &b in chain.iter().rev() {
            let to_world = match parent_of(parents, b)? {
                Some(p) => world[p].ok_or_else(|| {
                    StudioError::Structure(format!("bone {p} unresolved before child {b}"))
                })? * local[b],
                None => ROOT_AXIS_TRANSFORM * local[b],
            };
            world[b] = Some(to_world);
        }
    }

    world
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| StudioError::Structure("unresolved bone matrix".to_owned()))
}

pub fn invert_matrices(matrices: &mut [Mat4]) -> Result<(), StudioError> {
    for (bone, m) in matrices.iter_mut().enumerate() {
        let det = m.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(StudioError::SingularMatrix(bone));
        }
        *m = m.inverse();
    }
    Ok(())
}

#[cfg(test)]
mod math_tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn assert_quat_near(a: Quat, b: Quat) {
        assert!(a.abs_diff_eq(b, 1e-5) || a.abs_diff_eq(-b, 1e-5), "{a} != {b}");
    }

    #[test]
    fn test_quaternion48_norm() {
        for (x, y, zw) in [
            (32768, 32768, 16384),
            (40000, 30000, 20000),
            (32768, 45000, 0x8000 | 10000),
            (20000, 32768, 16384 | 0x8000),
        ] {
            let q = decode_quaternion48(Quaternion48 { x, y, zw });
            assert!((q.length() - 1.0).abs() < 1e-4, "{q}");
        }
        let identity = decode_quaternion48(Quaternion48 {
            x: 32768,
            y: 32768,
            zw: 16384,
        });
        assert_quat_near(identity, Quat::IDENTITY);
        let negative = decode_quaternion48(Quaternion48 {
            x: 32768,
            y: 32768,
            zw: 16384 | 0x8000,
        });
        assert_eq!(negative.w, -1.0);
    }

    #[test]
    fn test_quaternion64_norm() {
        let mid = 1u64 << 20;
        let q = decode_quaternion64(Quaternion64 {
            bits: mid | (mid << 21) | (mid << 42),
        });
        assert_quat_near(q, Quat::IDENTITY);

        let x = mid + (1 << 19);
        let q = decode_quaternion64(Quaternion64 {
            bits: x | (mid << 21) | (mid << 42) | (1 << 63),
        });
        assert!((q.length() - 1.0).abs() < 1e-4);
        assert!(q.w < 0.0);
        assert!((q.x - 0.5).abs() < 1e-5);
    }

    fn assert_unit(q: Quat) {
        assert!((q.length() - 1.0).abs() < 1e-4, "{q} has length {}", q.length());
    }

    #[test]
    fn test_quaternion48_sweep_is_unit() {
        let mut checked = 0;
        for x in (0..=u16::MAX).step_by(2048) {
            for y in (0..=u16::MAX).step_by(2048) {
                for z in (0..0x8000u16).step_by(1024) {
                    for sign in [0, 0x8000] {
                        let q = Quaternion48 { x, y, zw: z | sign };
                        let (fx, fy, fz) = (
                            (x as f32 - 32768.0) / 32768.0,
                            (y as f32 - 32768.0) / 32768.0,
                            (z as f32 - 16384.0) / 16384.0,
                        );
                        if fx * fx + fy * fy + fz * fz > 1.0 {
                            continue;
                        }
                        assert_unit(decode_quaternion48(q));
                        checked += 1;
                    }
                }
            }
        }
        assert!(checked > 1000, "{checked}");
    }

    #[test]
    fn test_quaternion64_sweep_is_unit() {
        let scale = 1.0 / 1048576.5;
        let mut checked = 0;
        for x in (0..1u64 << 21).step_by(1 << 16) {
            for y in (0..1u64 << 21).step_by(1 << 16) {
                for z in (0..1u64 << 21).step_by(1 << 16) {
                    let [fx, fy, fz] = [x, y, z].map(|c| (c as f64 - 1048576.0) * scale);
                    if fx * fx + fy * fy + fz * fz > 1.0 {
                        continue;
                    }
                    for sign in [0, 1u64 << 63] {
                        let bits = x | (y << 21) | (z << 42) | sign;
                        assert_unit(decode_quaternion64(Quaternion64 { bits }));
                        checked += 1;
                    }
                }
            }
        }
        assert!(checked > 1000, "{checked}");
    }

    #[test]
    fn test_float16() {
        assert_eq!(decode_float16(0x3C00), 1.0);
        assert_eq!(decode_float16(0xC000), -2.0);
        assert_eq!(decode_float16(0x3800), 0.5);
        assert_eq!(decode_float16(0x0000), 0.0);
        assert_eq!(decode_float16(0x7C00), 65504.0);
        assert_eq!(decode_float16(0xFC00), -65504.0);
        assert_eq!(decode_float16(0x7E00), 0.0);
        assert_eq!(decode_float16(0x0001), 2f32.powi(-24));
        assert_eq!(decode_float16(0x7BFF), 65504.0);
    }

    #[test]
    fn test_euler_matches_yaw_pitch_roll() {
        let angles = Vec3::new(0.3, -0.7, 1.1);
        let expected = Quat::from_rotation_z(angles.z)
            * Quat::from_rotation_y(angles.y)
            * Quat::from_rotation_x(angles.x);
        assert_quat_near(euler_to_quaternion(angles), expected);
        assert_quat_near(
            euler_to_quaternion(Vec3::new(0.0, 0.0, FRAC_PI_2)),
            Quat::from_rotation_z(FRAC_PI_2),
        );
    }

    #[test]
    fn test_align_quaternion() {
        let q = Quat::from_rotation_x(0.5);
        assert_eq!(align_quaternion(q, q), q);
        assert_eq!(align_quaternion(-q, q), q);
    }

    #[test]
    fn test_root_axis_swaps_x_and_y() {
        let p = ROOT_AXIS_TRANSFORM.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p, Vec3::new(2.0, 1.0, 3.0));
    }

    #[test]
    fn test_child_before_parent() {
        let local = [
            Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)),
            Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
        ];
        // bone 0 is the child of bone 1
        let world = concatenate_bone_chain(&local, &[1, -1]).unwrap();
        let origin = world[0].transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-6));
    }

    #[test]
    fn test_bad_parents() {
        let local = [Mat4::IDENTITY; 2];
        assert!(matches!(
            concatenate_bone_chain(&local, &[1, 0]),
            Err(StudioError::Structure(_))
        ));
        assert!(matches!(
            concatenate_bone_chain(&local, &[-1, 7]),
            Err(StudioError::Structure(_))
        ));
    }

    #[test]
    fn test_invert_singular() {
        let mut m = [Mat4::IDENTITY, Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0))];
        assert!(matches!(
            invert_matrices(&mut m),
            Err(StudioError::SingularMatrix(1))
        ));
    }

    #[test]
    fn test_pose_to_bone() {
        let m = pose_to_bone_matrix(&[
            1.0, 0.0, 0.0, 5.0, //
            0.0, 1.0, 0.0, 6.0, //
            0.0, 0.0, 1.0, 7.0,
        ]);
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_axis_angle_and_euler() {
        let (axis, angle) = quaternion_to_axis_angle(Quat::from_rotation_z(FRAC_PI_2));
        assert!(axis.abs_diff_eq(Vec3::Z, 1e-5));
        assert!((angle - 90.0).abs() < 1e-3);

        let angles = matrix_to_euler_angles(Mat4::from_rotation_z(FRAC_PI_2));
        assert!(angles.abs_diff_eq(Vec3::new(0.0, 90.0, 0.0), 1e-3));
    }
}
