// Scene objects
//
// A game object pairs a shared model with a color and a transform. Ids come
// from a `GameObjectIds` allocator owned by the application, so they are
// unique within a run and never reused.

use glam::{EulerRot, Mat2, Mat4, Quat, Vec2, Vec3};
use std::f32::consts::TAU;
use std::fmt;
use std::sync::Arc;

use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameObjectId(u32);

impl GameObjectId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GameObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out increasing object ids, starting at 0.
#[derive(Debug, Default)]
pub struct GameObjectIds {
    next: u32,
}

impl GameObjectIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> GameObjectId {
        let id = GameObjectId(self.next);
        self.next += 1;
        id
    }

    pub fn create_game_object(&mut self) -> GameObject {
        GameObject {
            id: self.next_id(),
            model: None,
            color: Vec3::ZERO,
            transform2d: Transform2dComponent::default(),
        }
    }
}

/// Translation, scale and rotation (radians) in the plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2dComponent {
    pub translation: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for Transform2dComponent {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2dComponent {
    /// Scale times rotation. Translation is pushed separately as an offset.
    pub fn mat2(&self) -> Mat2 {
        Mat2::from_diagonal(self.scale) * Mat2::from_angle(self.rotation)
    }

    /// Rotate by `step` radians, keeping the angle in [0, 2π).
    pub fn advance_rotation(&mut self, step: f32) {
        self.rotation = (self.rotation + step).rem_euclid(TAU);
    }
}

/// 3D transform with Tait-Bryan rotation angles applied as Y, then X, then Z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl TransformComponent {
    /// Translate * Ry * Rx * Rz * Scale
    pub fn mat4(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

pub struct GameObject {
    id: GameObjectId,
    pub model: Option<Arc<Model>>,
    pub color: Vec3,
    pub transform2d: Transform2dComponent,
}

impl GameObject {
    pub fn id(&self) -> GameObjectId {
        self.id
    }
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("has_model", &self.model.is_some())
            .field("color", &self.color)
            .field("transform2d", &self.transform2d)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut ids = GameObjectIds::new();
        let a = ids.create_game_object();
        let b = ids.create_game_object();
        let c = ids.next_id();
        assert_eq!(a.id().get(), 0);
        assert_eq!(b.id().get(), 1);
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn new_objects_have_identity_transform_and_no_model() {
        let mut ids = GameObjectIds::new();
        let object = ids.create_game_object();
        assert!(object.model.is_none());
        assert_eq!(object.transform2d.mat2(), Mat2::IDENTITY);
    }

    #[test]
    fn mat2_scales_after_rotating() {
        let transform = Transform2dComponent {
            translation: Vec2::ZERO,
            scale: Vec2::new(2.0, 0.5),
            rotation: FRAC_PI_2,
        };
        // Quarter turn maps x to y, which is then halved
        let mapped = transform.mat2() * Vec2::X;
        assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mapped.y, 0.5, epsilon = 1e-6);

        let mapped = transform.mat2() * Vec2::Y;
        assert_relative_eq!(mapped.x, -2.0, epsilon = 1e-6);
        assert_relative_eq!(mapped.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rotation_wraps_into_one_turn() {
        let mut transform = Transform2dComponent {
            rotation: TAU - 0.005,
            ..Default::default()
        };
        transform.advance_rotation(0.01);
        assert!(transform.rotation >= 0.0 && transform.rotation < TAU);
        assert_relative_eq!(transform.rotation, 0.005, epsilon = 1e-5);

        transform.advance_rotation(-0.01);
        assert_relative_eq!(transform.rotation, TAU - 0.005, epsilon = 1e-5);
    }

    #[test]
    fn mat4_matches_tait_bryan_yxz() {
        let transform = TransformComponent {
            translation: Vec3::new(1.0, -2.0, 3.0),
            scale: Vec3::new(1.5, 2.0, 0.5),
            rotation: Vec3::new(0.3, -1.1, 2.4),
        };

        let (s1, c1) = transform.rotation.y.sin_cos();
        let (s2, c2) = transform.rotation.x.sin_cos();
        let (s3, c3) = transform.rotation.z.sin_cos();
        let scale = transform.scale;
        let expected = Mat4::from_cols_array_2d(&[
            [
                scale.x * (c1 * c3 + s1 * s2 * s3),
                scale.x * (c2 * s3),
                scale.x * (c1 * s2 * s3 - c3 * s1),
                0.0,
            ],
            [
                scale.y * (c3 * s1 * s2 - c1 * s3),
                scale.y * (c2 * c3),
                scale.y * (c1 * c3 * s2 + s1 * s3),
                0.0,
            ],
            [scale.z * (c2 * s1), scale.z * (-s2), scale.z * (c1 * c2), 0.0],
            [1.0, -2.0, 3.0, 1.0],
        ]);

        assert!(transform.mat4().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn half_turn_about_y_flips_x_and_z() {
        let transform = TransformComponent {
            rotation: Vec3::new(0.0, PI, 0.0),
            ..Default::default()
        };
        let mapped = transform.mat4().transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!(mapped.abs_diff_eq(Vec3::new(-1.0, 2.0, -3.0), 1e-5));
    }
}
