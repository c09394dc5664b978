// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// A uniform hash grid over 3D points for radius and k-nearest queries
pub mod hash_grid;
pub use hash_grid::HashGrid;

/// A bounding volume hierarchy over triangles for closest-point queries
pub mod bvh;
pub use bvh::{Bvh, ClosestPoint, Triangle};
