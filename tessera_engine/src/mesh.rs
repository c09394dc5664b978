// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// The halfedge graph data structure and local edit operations
pub mod halfedge;

/// The adaptive remeshing loop driving split / collapse / flip / smooth
pub mod remesh;

/// Detection and repair of common mesh defects
pub mod repair;

/// Spatial acceleration structures: uniform hash grid and triangle BVH
pub mod spatial;
