// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::hash::Hash;

use anyhow::bail;
use float_ord::FloatOrd;
use glam::Vec3;

use crate::prelude::Result;
use std::collections::HashMap;

/// A uniform spatial hash over points. Items are identified by value (ids
/// work well); re-inserting an item moves it. The grid is invalidated by any
/// mutation of the positions it indexes, so callers rebuild or `update`
/// after topological changes.
#[derive(Debug, Clone)]
pub struct HashGrid<T> {
    cell_size: f32,
    cells: HashMap<(i32, i32, i32), Vec<T>>,
    items: HashMap<T, Vec3>,
}

impl<T: Copy + Eq + Hash> HashGrid<T> {
    pub fn new(cell_size: f32) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            bail!("hash grid cell size must be positive, got {cell_size}");
        }
        Ok(Self {
            cell_size,
            cells: HashMap::new(),
            items: HashMap::new(),
        })
    }

    fn cell_of(&self, p: Vec3) -> (i32, i32, i32) {
        (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
            (p.z / self.cell_size).floor() as i32,
        )
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: T, pos: Vec3) {
        self.remove(item);
        let key = self.cell_of(pos);
        self.cells.entry(key).or_default().push(item);
        self.items.insert(item, pos);
    }

    pub fn remove(&mut self, item: T) -> bool {
        if let Some(pos) = self.items.remove(&item) {
            let key = self.cell_of(pos);
            if let Some(bucket) = self.cells.get_mut(&key) {
                bucket.retain(|&x| x != item);
                if bucket.is_empty() {
                    self.cells.remove(&key);
                }
            }
            true
        } else {
            false
        }
    }

    pub fn update(&mut self, item: T, pos: Vec3) {
        self.insert(item, pos);
    }

    /// All items within `radius` of `center`, unordered.
    pub fn query_radius(&self, center: Vec3, radius: f32) -> Vec<T> {
        let mut result = Vec::new();
        if !(radius >= 0.0) {
            return result;
        }
        let min = self.cell_of(center - Vec3::splat(radius));
        let max = self.cell_of(center + Vec3::splat(radius));
        let radius_sq = radius * radius;

        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    if let Some(bucket) = self.cells.get(&(x, y, z)) {
                        for &item in bucket {
                            if self.items[&item].distance_squared(center) <= radius_sq {
                                result.push(item);
                            }
                        }
                    }
                }
            }
        }
        result
    }

    /// Up to `k` items sorted by distance to `center`, optionally bounded by
    /// `max_radius`. Without a bound the search ring doubles until enough
    /// candidates are in range.
    pub fn query_k_nearest(&self, center: Vec3, k: usize, max_radius: Option<f32>) -> Vec<T> {
        if k == 0 || self.items.is_empty() {
            return Vec::new();
        }

        let mut candidates = match max_radius {
            Some(r) => self.query_radius(center, r),
            None => {
                let wanted = k.min(self.items.len());
                let mut radius = self.cell_size;
                let mut found = self.query_radius(center, radius);
                // Doubling covers any finite configuration quickly
                for _ in 0..64 {
                    if found.len() >= wanted {
                        break;
                    }
                    radius *= 2.0;
                    found = self.query_radius(center, radius);
                }
                if found.len() < wanted {
                    found = self.items.keys().copied().collect();
                }
                found
            }
        };

        candidates.sort_by_key(|item| FloatOrd(self.items[item].distance_squared(center)));
        candidates.truncate(k);
        candidates
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn radius_query_filters_by_distance() {
        let mut grid = HashGrid::new(1.0).unwrap();
        grid.insert(1u32, Vec3::ZERO);
        grid.insert(2u32, Vec3::new(0.5, 0.0, 0.0));
        grid.insert(3u32, Vec3::new(3.0, 0.0, 0.0));

        let mut hits = grid.query_radius(Vec3::ZERO, 1.0);
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);

        assert!(grid.query_radius(Vec3::new(10.0, 0.0, 0.0), 0.5).is_empty());
    }

    #[test]
    fn k_nearest_is_sorted_by_distance() {
        let mut grid = HashGrid::new(0.5).unwrap();
        grid.insert(10u32, Vec3::new(5.0, 0.0, 0.0));
        grid.insert(20u32, Vec3::new(1.0, 0.0, 0.0));
        grid.insert(30u32, Vec3::new(2.0, 0.0, 0.0));

        assert_eq!(grid.query_k_nearest(Vec3::ZERO, 2, None), vec![20, 30]);
        // With a tight bound, distant items never show up
        assert_eq!(
            grid.query_k_nearest(Vec3::ZERO, 5, Some(2.5)),
            vec![20, 30]
        );
    }

    #[test]
    fn update_moves_an_item() {
        let mut grid = HashGrid::new(1.0).unwrap();
        grid.insert(7u32, Vec3::ZERO);
        grid.update(7u32, Vec3::new(4.0, 0.0, 0.0));

        assert!(grid.query_radius(Vec3::ZERO, 1.0).is_empty());
        assert_eq!(grid.query_radius(Vec3::new(4.0, 0.0, 0.0), 0.1), vec![7]);
        assert_eq!(grid.len(), 1);

        assert!(grid.remove(7u32));
        assert!(!grid.remove(7u32));
        assert!(grid.is_empty());
    }

    #[test]
    fn non_positive_cell_size_is_rejected() {
        assert!(HashGrid::<u32>::new(0.0).is_err());
        assert!(HashGrid::<u32>::new(-1.0).is_err());
        assert!(HashGrid::<u32>::new(f32::NAN).is_err());
    }
}
