use bevy_math::Mat4;
use bevy_math::Vec3;
use bytemuck::Pod;
use bytemuck::Zeroable;

pub const EYE: Vec3 = Vec3::new(0.0, 3.0, -5.0);
pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;
pub const DEGREES_PER_FRAME: f32 = 1.0;

/// Contents of the `b0` constant buffer. Matrices are column major, which is
/// how HLSL packs `float4x4` by default.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderParameters {
    pub world: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl ShaderParameters {
    pub fn new(world: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        }
    }

    /// The cube spins about Y by a fixed step per frame, seen from above and in front.
    pub fn for_frame(frame_number: u64, aspect_ratio: f32) -> Self {
        let degrees = (frame_number % 360) as f32 * DEGREES_PER_FRAME;
        let world = Mat4::from_rotation_y(degrees.to_radians());
        let view = Mat4::look_at_lh(EYE, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_lh(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            aspect_ratio,
            NEAR_PLANE,
            FAR_PLANE,
        );
        Self::new(world, view, proj)
    }

    pub fn world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }

    pub fn view_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.proj) * Mat4::from_cols_array_2d(&self.view)
    }
}

#[cfg(test)]
mod tests {
    use bevy_math::Vec4;
    use d3d12_app_base::upload::constant_buffer_size;

    use super::*;

    #[test]
    fn fits_one_constant_buffer_slot() {
        assert_eq!(std::mem::size_of::<ShaderParameters>(), 192);
        assert_eq!(
            constant_buffer_size(std::mem::size_of::<ShaderParameters>() as u64),
            256
        );
    }

    #[test]
    fn first_frame_is_unrotated() {
        let parameters = ShaderParameters::for_frame(0, 16.0 / 9.0);
        assert_eq!(parameters.world(), Mat4::IDENTITY);
    }

    #[test]
    fn rotation_wraps_after_a_full_turn() {
        let a = ShaderParameters::for_frame(10, 1.0);
        let b = ShaderParameters::for_frame(370, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn origin_projects_inside_the_depth_range() {
        let parameters = ShaderParameters::for_frame(0, 16.0 / 9.0);
        let clip = parameters.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..1.0).contains(&ndc.z));
    }

    #[test]
    fn near_corner_is_closer_than_far_corner() {
        let parameters = ShaderParameters::for_frame(0, 1.0);
        let view_projection = parameters.view_projection();
        let near = view_projection * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = view_projection * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert!(near.z / near.w < far.z / far.w);
    }
}
