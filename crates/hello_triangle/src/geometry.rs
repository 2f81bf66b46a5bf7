use bytemuck::Pod;
use bytemuck::Zeroable;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Clip space triangle, clockwise as seen by the rasterizer.
pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex {
        position: [0.0, 0.25, 0.5],
        color: [1.0, 0.0, 0.0, 1.0],
    },
    Vertex {
        position: [0.25, -0.25, 0.5],
        color: [0.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.25, -0.25, 0.5],
        color: [0.0, 0.0, 1.0, 1.0],
    },
];

pub const TRIANGLE_INDICES: [u32; 3] = [0, 1, 2];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 28);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE_VERTICES).len(), 84);
    }

    #[test]
    fn indices_stay_in_bounds() {
        assert!(TRIANGLE_INDICES
            .iter()
            .all(|&i| (i as usize) < TRIANGLE_VERTICES.len()));
    }

    #[test]
    fn triangle_sits_inside_the_depth_range() {
        for vertex in TRIANGLE_VERTICES {
            let [x, y, z] = vertex.position;
            assert!((-1.0..=1.0).contains(&x));
            assert!((-1.0..=1.0).contains(&y));
            assert!((0.0..1.0).contains(&z));
        }
    }

    #[test]
    fn winding_is_clockwise() {
        let [a, b, c] = TRIANGLE_VERTICES.map(|v| v.position);
        let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
        assert!(cross < 0.0);
    }
}
