use bytemuck::Pod;
use bytemuck::Zeroable;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

const K: f32 = 1.0;

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const YELLOW: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
const MAGENTA: [f32; 4] = [1.0, 0.0, 1.0, 1.0];
const CYAN: [f32; 4] = [0.0, 1.0, 1.0, 1.0];

const fn vertex(position: [f32; 3], color: [f32; 4], uv: [f32; 2]) -> Vertex {
    Vertex {
        position,
        color,
        uv,
    }
}

/// Four vertices per face so each face gets its own texture coordinates.
pub const CUBE_VERTICES: [Vertex; 24] = [
    // Front
    vertex([-K, -K, -K], RED, [0.0, 1.0]),
    vertex([-K, K, -K], YELLOW, [0.0, 0.0]),
    vertex([K, K, -K], WHITE, [1.0, 0.0]),
    vertex([K, -K, -K], MAGENTA, [1.0, 1.0]),
    // Right
    vertex([K, -K, -K], MAGENTA, [0.0, 1.0]),
    vertex([K, K, -K], WHITE, [0.0, 0.0]),
    vertex([K, K, K], CYAN, [1.0, 0.0]),
    vertex([K, -K, K], BLUE, [1.0, 1.0]),
    // Left
    vertex([-K, -K, K], BLACK, [0.0, 1.0]),
    vertex([-K, K, K], GREEN, [0.0, 0.0]),
    vertex([-K, K, -K], YELLOW, [1.0, 0.0]),
    vertex([-K, -K, -K], RED, [1.0, 1.0]),
    // Back
    vertex([K, -K, K], BLUE, [0.0, 1.0]),
    vertex([K, K, K], CYAN, [0.0, 0.0]),
    vertex([-K, K, K], GREEN, [1.0, 0.0]),
    vertex([-K, -K, K], BLACK, [1.0, 1.0]),
    // Top
    vertex([-K, K, -K], YELLOW, [0.0, 1.0]),
    vertex([-K, K, K], GREEN, [0.0, 0.0]),
    vertex([K, K, K], CYAN, [1.0, 0.0]),
    vertex([K, K, -K], WHITE, [1.0, 1.0]),
    // Bottom
    vertex([-K, -K, K], RED, [0.0, 1.0]),
    vertex([-K, -K, -K], RED, [0.0, 0.0]),
    vertex([K, -K, -K], MAGENTA, [1.0, 0.0]),
    vertex([K, -K, K], BLUE, [1.0, 1.0]),
];

#[rustfmt::skip]
pub const CUBE_INDICES: [u32; 36] = [
    0, 1, 2, 2, 3, 0,
    4, 5, 6, 6, 7, 4,
    8, 9, 10, 10, 11, 8,
    12, 13, 14, 14, 15, 12,
    16, 17, 18, 18, 19, 16,
    20, 21, 22, 22, 23, 20,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    #[test]
    fn vertex_layout_matches_the_input_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(std::mem::offset_of!(Vertex, uv), 28);
    }

    #[test]
    fn every_index_names_a_vertex() {
        assert!(CUBE_INDICES
            .iter()
            .all(|&i| (i as usize) < CUBE_VERTICES.len()));
    }

    #[test]
    fn every_vertex_is_used() {
        for i in 0..CUBE_VERTICES.len() as u32 {
            assert!(CUBE_INDICES.contains(&i), "vertex {i} unused");
        }
    }

    #[test]
    fn texture_coordinates_cover_each_face() {
        for face in CUBE_VERTICES.chunks_exact(4) {
            for v in face {
                assert!(v.uv.iter().all(|c| (0.0..=1.0).contains(c)));
            }
            let uvs: Vec<[f32; 2]> = face.iter().map(|v| v.uv).collect();
            for corner in [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]] {
                assert!(uvs.contains(&corner));
            }
        }
    }

    #[test]
    fn triangles_are_clockwise_from_outside() {
        // With back face culling, clockwise front faces are the ones whose
        // edge cross product points away from the cube's centre.
        for triangle in CUBE_INDICES.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| CUBE_VERTICES[triangle[i] as usize].position);
            let normal = cross(sub(b, a), sub(c, a));
            let centroid = [
                (a[0] + b[0] + c[0]) / 3.0,
                (a[1] + b[1] + c[1]) / 3.0,
                (a[2] + b[2] + c[2]) / 3.0,
            ];
            assert!(dot(normal, centroid) > 0.0, "triangle {triangle:?} faces inward");
        }
    }
}
