//! Tile map collision data loaded from a CSV export.

use std::path::Path;

use valewood_shared::TILE_SIZE;

/// Grid of walkable flags. Row 0 is the bottom of the world, so the CSV
/// (which stores the top row first) is flipped on load.
pub struct GameMap {
    width: usize,
    height: usize,
    tiles: Vec<bool>,
}

impl GameMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Out-of-bounds tiles count as walls.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.tiles[y as usize * self.width + x as usize]
    }

    fn set_walkable(&mut self, x: usize, y: usize, walkable: bool) {
        if x < self.width && y < self.height {
            self.tiles[y * self.width + x] = walkable;
        }
    }

    /// World coordinate to tile index. Floored, so negative coordinates land
    /// on negative (out-of-bounds) tiles instead of tile 0.
    pub fn world_to_tile(&self, world: f32) -> i32 {
        (world / TILE_SIZE).floor() as i32
    }

    /// Center of a tile in world coordinates.
    pub fn tile_center(tile_x: i32, tile_y: i32) -> (f32, f32) {
        (
            tile_x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
            tile_y as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        )
    }

    /// Is the world position on a walkable tile?
    pub fn is_position_walkable(&self, x: f32, y: f32) -> bool {
        self.is_walkable(self.world_to_tile(x), self.world_to_tile(y))
    }

    /// Parse a CSV map: one row per line, `0` cells are walkable, anything
    /// else is a wall. The file stores the top row first, so rows are
    /// written with the Y axis inverted.
    pub fn from_csv(csv: &str) -> Result<Self, String> {
        let lines: Vec<&str> = csv.trim().lines().collect();
        if lines.is_empty() {
            return Err("map CSV is empty".to_string());
        }

        let height = lines.len();
        let width = lines[0].split(',').count();
        let mut map = Self::new(width, height);

        for (y, line) in lines.iter().enumerate() {
            let flipped_y = height - 1 - y;
            for (x, cell) in line.split(',').enumerate() {
                if x >= width {
                    return Err(format!("map row {} wider than row 0 ({})", y, width));
                }
                map.set_walkable(x, flipped_y, cell.trim() == "0");
            }
        }

        Ok(map)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let csv = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read map {}: {}", path.display(), e))?;
        Self::from_csv(&csv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walkable_iff_zero() {
        let map = GameMap::from_csv("1,0\n0,1").unwrap();
        // CSV top row lands at the highest y index
        assert!(!map.is_walkable(0, 1));
        assert!(map.is_walkable(1, 1));
        assert!(map.is_walkable(0, 0));
        assert!(!map.is_walkable(1, 0));
    }

    #[test]
    fn out_of_bounds_is_wall() {
        let map = GameMap::from_csv("0,0\n0,0").unwrap();
        assert!(!map.is_walkable(-1, 0));
        assert!(!map.is_walkable(0, -1));
        assert!(!map.is_walkable(2, 0));
        assert!(!map.is_walkable(0, 2));
    }

    #[test]
    fn world_to_tile_floors() {
        let map = GameMap::new(4, 4);
        assert_eq!(map.world_to_tile(0.0), 0);
        assert_eq!(map.world_to_tile(15.9), 0);
        assert_eq!(map.world_to_tile(16.0), 1);
        assert_eq!(map.world_to_tile(47.5), 2);
        // Negative coordinates floor off the map rather than truncating to 0
        assert_eq!(map.world_to_tile(-0.1), -1);
        assert_eq!(map.world_to_tile(-16.0), -1);
        assert!(!map.is_position_walkable(-0.1, 8.0));
    }

    #[test]
    fn tile_center_is_offset_by_half_a_tile() {
        assert_eq!(GameMap::tile_center(0, 0), (8.0, 8.0));
        assert_eq!(GameMap::tile_center(2, 3), (40.0, 56.0));
    }

    #[test]
    fn empty_csv_is_an_error() {
        assert!(GameMap::from_csv("").is_err());
        assert!(GameMap::from_csv("   \n  ").is_err());
    }
}
