//! Grid traversal (Amanatides & Woo) ray-block intersection.

use super::block::BlockType;
use super::position::BlockPos;
use super::World;

/// Hard cap on cells visited, whatever `max_distance` says.
pub const MAX_RAY_STEPS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub pos: BlockPos,
    pub block: BlockType,
    /// Normal of the face the ray entered through. Zero when the ray
    /// started inside the block.
    pub normal: [i32; 3],
    /// Distance from the origin to the entry point.
    pub distance: f32,
}

impl RayHit {
    /// The cell in front of the hit face, where a placed block would go.
    pub fn adjacent(&self) -> BlockPos {
        let [nx, ny, nz] = self.normal;
        self.pos.offset(nx, ny, nz)
    }
}

/// Walk the grid from `origin` along `direction` until `lookup` reports a
/// block that stops rays (anything but air or liquid).
///
/// Non-finite input or a zero direction is a miss, not an error.
pub fn cast(
    origin: [f32; 3],
    direction: [f32; 3],
    max_distance: f32,
    lookup: impl Fn(BlockPos) -> BlockType,
) -> Option<RayHit> {
    let finite = origin.iter().chain(&direction).all(|v| v.is_finite());
    if !finite || !max_distance.is_finite() || max_distance < 0.0 {
        return None;
    }
    let len = direction.iter().map(|v| v * v).sum::<f32>().sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    let dir = direction.map(|v| v / len);

    let mut cell = origin.map(|v| v.floor() as i32);
    let mut step = [0i32; 3];
    let mut t_delta = [f32::INFINITY; 3];
    let mut t_max = [f32::INFINITY; 3];
    for axis in 0..3 {
        if dir[axis] > 0.0 {
            step[axis] = 1;
            t_delta[axis] = 1.0 / dir[axis];
            t_max[axis] = (cell[axis] as f32 + 1.0 - origin[axis]) * t_delta[axis];
        } else if dir[axis] < 0.0 {
            step[axis] = -1;
            t_delta[axis] = -1.0 / dir[axis];
            t_max[axis] = (origin[axis] - cell[axis] as f32) * t_delta[axis];
        }
    }

    let mut normal = [0i32; 3];
    let mut distance = 0.0f32;
    for _ in 0..MAX_RAY_STEPS {
        let pos = BlockPos::new(cell[0], cell[1], cell[2]);
        let block = lookup(pos);
        if block.is_targetable() {
            return Some(RayHit {
                pos,
                block,
                normal,
                distance,
            });
        }

        let axis = if t_max[0] < t_max[1] {
            if t_max[0] < t_max[2] { 0 } else { 2 }
        } else if t_max[1] < t_max[2] {
            1
        } else {
            2
        };

        distance = t_max[axis];
        if distance > max_distance {
            return None;
        }
        cell[axis] += step[axis];
        t_max[axis] += t_delta[axis];
        normal = [0; 3];
        normal[axis] = -step[axis];
    }

    None
}

impl World {
    /// First solid, non-liquid block along the ray within `max_distance`.
    pub fn raycast(&self, origin: [f32; 3], direction: [f32; 3], max_distance: f32) -> Option<RayHit> {
        cast(origin, direction, max_distance, |p| self.get_block(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_at(height: i32) -> impl Fn(BlockPos) -> BlockType {
        move |p: BlockPos| {
            if p.y <= height {
                BlockType::Stone
            } else {
                BlockType::Air
            }
        }
    }

    #[test]
    fn straight_down_hits_top_face() {
        let hit = cast([0.0, 60.0, 0.0], [0.0, -1.0, 0.0], 100.0, floor_at(50)).unwrap();
        assert_eq!(hit.pos, BlockPos::new(0, 50, 0));
        assert_eq!(hit.normal, [0, 1, 0]);
        assert_eq!(hit.block, BlockType::Stone);
        assert_eq!(hit.adjacent(), BlockPos::new(0, 51, 0));
        assert!((hit.distance - 9.0).abs() < 1e-4);
    }

    #[test]
    fn out_of_range_is_a_miss() {
        assert!(cast([0.0, 60.0, 0.0], [0.0, -1.0, 0.0], 5.0, floor_at(50)).is_none());
    }

    #[test]
    fn sideways_hit_reports_x_normal() {
        let wall = |p: BlockPos| {
            if p.x >= 10 { BlockType::Dirt } else { BlockType::Air }
        };
        let hit = cast([0.5, 5.5, 0.5], [1.0, 0.0, 0.0], 50.0, wall).unwrap();
        assert_eq!(hit.pos, BlockPos::new(10, 5, 0));
        assert_eq!(hit.normal, [-1, 0, 0]);
    }

    #[test]
    fn diagonal_ray_is_not_normalised_by_caller() {
        let hit = cast([0.5, 60.5, 0.5], [3.0, -3.0, 0.0], 100.0, floor_at(50)).unwrap();
        assert_eq!(hit.pos.y, 50);
        assert_eq!(hit.normal, [0, 1, 0]);
    }

    #[test]
    fn water_does_not_stop_rays() {
        let lake = |p: BlockPos| match p.y {
            y if y <= 40 => BlockType::Sand,
            y if y <= 45 => BlockType::Water,
            _ => BlockType::Air,
        };
        let hit = cast([0.5, 50.0, 0.5], [0.0, -1.0, 0.0], 100.0, lake).unwrap();
        assert_eq!(hit.pos.y, 40);
        assert_eq!(hit.block, BlockType::Sand);
    }

    #[test]
    fn degenerate_input_is_a_miss() {
        let solid = |_: BlockPos| BlockType::Stone;
        assert!(cast([f32::NAN, 0.0, 0.0], [0.0, -1.0, 0.0], 10.0, solid).is_none());
        assert!(cast([0.0, 0.0, 0.0], [0.0, f32::NAN, 0.0], 10.0, solid).is_none());
        assert!(cast([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 10.0, solid).is_none());
        assert!(cast([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], f32::INFINITY, solid).is_none());
    }

    #[test]
    fn empty_space_gives_up() {
        let nothing = |_: BlockPos| BlockType::Air;
        assert!(cast([0.0, 0.0, 0.0], [1.0, 0.3, 0.2], 1.0e6, nothing).is_none());
    }

    #[test]
    fn start_inside_block_hits_with_zero_normal() {
        let hit = cast([0.5, 10.5, 0.5], [0.0, -1.0, 0.0], 10.0, floor_at(50)).unwrap();
        assert_eq!(hit.pos, BlockPos::new(0, 10, 0));
        assert_eq!(hit.normal, [0, 0, 0]);
    }
}
