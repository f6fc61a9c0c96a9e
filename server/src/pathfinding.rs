//! Uniform-cost search over the tile grid.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::map::GameMap;

/// Cheapest 4-connected tile path from start to end, start tile included.
/// Returns an empty vector when no path exists (including an unwalkable end
/// tile). Neighbours expand in a fixed order so equal-cost paths resolve the
/// same way every run.
pub fn find_path(
    map: &GameMap,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> Vec<(i32, i32)> {
    let mut open: BinaryHeap<Reverse<(u32, u64, i32, i32)>> = BinaryHeap::new();
    let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
    let mut visited: HashSet<(i32, i32)> = HashSet::new();

    // Insertion sequence breaks cost ties first-in-first-out
    let mut seq: u64 = 0;
    open.push(Reverse((0, seq, start_x, start_y)));

    while let Some(Reverse((cost, _, x, y))) = open.pop() {
        if !visited.insert((x, y)) {
            continue;
        }

        if x == end_x && y == end_y {
            let mut path = vec![(x, y)];
            let mut current = (x, y);
            while let Some(&prev) = came_from.get(&current) {
                path.push(prev);
                current = prev;
            }
            path.reverse();
            return path;
        }

        for (dx, dy) in [(0, 1), (1, 0), (0, -1), (-1, 0)] {
            let nx = x + dx;
            let ny = y + dy;
            if map.is_walkable(nx, ny) && !visited.contains(&(nx, ny)) {
                seq += 1;
                came_from.entry((nx, ny)).or_insert((x, y));
                open.push(Reverse((cost + 1, seq, nx, ny)));
            }
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(size: usize) -> GameMap {
        let row = vec!["0"; size].join(",");
        let csv = vec![row; size].join("\n");
        GameMap::from_csv(&csv).unwrap()
    }

    #[test]
    fn straight_line_on_open_ground() {
        let map = open_map(5);
        let path = find_path(&map, 0, 0, 3, 0);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(3, 0)));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn start_equals_end() {
        let map = open_map(3);
        assert_eq!(find_path(&map, 1, 1, 1, 1), vec![(1, 1)]);
    }

    #[test]
    fn routes_around_a_wall() {
        // Wall column at x=1 with a gap at the bottom row
        let csv = "0,1,0\n0,1,0\n0,0,0";
        let map = GameMap::from_csv(csv).unwrap();
        let path = find_path(&map, 0, 2, 2, 2);
        assert_eq!(path.first(), Some(&(0, 2)));
        assert_eq!(path.last(), Some(&(2, 2)));
        // Must detour through y=0, never through the wall
        assert!(path.iter().all(|&(x, y)| map.is_walkable(x, y) || (x, y) == (0, 2)));
        assert!(path.contains(&(1, 0)));
        assert_eq!(path.len(), 7);
    }

    #[test]
    fn unreachable_target_yields_empty_path() {
        // End tile fenced off entirely
        let csv = "0,1,0\n0,1,1\n0,1,0";
        let map = GameMap::from_csv(csv).unwrap();
        assert!(find_path(&map, 0, 0, 2, 2).is_empty());
    }

    #[test]
    fn unwalkable_end_tile_yields_empty_path() {
        let csv = "0,0\n0,1";
        let map = GameMap::from_csv(csv).unwrap();
        assert!(find_path(&map, 0, 1, 1, 0).is_empty());
    }
}
