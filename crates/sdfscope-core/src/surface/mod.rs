// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The closed signed-distance-surface contract.
//!
//! Every evaluatable node in a surface expression graph implements [`Sdf2`]
//! or [`Sdf3`] and reports a [`NodeKind`] from a closed enumeration plus its
//! child handles. Introspection is therefore a typed recursive walk over
//! [`SurfaceRef`] handles rather than runtime reflection over an arbitrary
//! object graph.
//!
//! The full primitive/boolean/transform algebra of a CAD kernel is an
//! external collaborator; the nodes shipped here (see [`nodes`]) are the
//! wrappers the renderers need plus enough primitives to build demo scenes.

pub mod nodes;

use crate::math::{Aabb, Aabb2, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Thickness given to 2D bounding boxes promoted into mixed 3D trees.
pub const FLAT_BOX_THICKNESS: f64 = 1e-3;

/// The closed set of surface-graph node kinds.
///
/// Adding a kind is a deliberate API change; the introspection walk and the
/// overlay flattening match exhaustively on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A leaf shape (circle, sphere, box, ...).
    Primitive,
    /// A boolean combination of child surfaces (union, intersection, ...).
    BooleanOp,
    /// A pure affine coordinate transform of one child.
    Transform,
    /// A pure uniform scale of one child.
    UniformScale,
    /// A 2D profile extruded into 3D.
    Extrude,
    /// A 2D profile revolved around an axis into 3D.
    Revolve,
    /// A coordinate-swap wrapper (e.g. exchanging the Y and Z axes).
    SwapAxes,
    /// An axis-inversion wrapper (mirroring one axis).
    InvertAxis,
}

impl NodeKind {
    /// Whether flattening elides this node's own bounding box.
    ///
    /// Pass-through wrappers re-express their single child without adding
    /// geometry, so their own box only clutters the overlay; the child's
    /// box is still included.
    #[inline]
    pub fn is_pass_through(self) -> bool {
        matches!(
            self,
            NodeKind::Transform
                | NodeKind::UniformScale
                | NodeKind::SwapAxes
                | NodeKind::InvertAxis
        )
    }
}

/// A 2D signed-distance surface.
///
/// Negative inside, positive outside, zero on the boundary.
pub trait Sdf2: Send + Sync {
    /// Evaluates the signed distance at a point.
    fn evaluate(&self, p: Vec2) -> f64;

    /// Returns the bounding rectangle of the surface.
    fn bounding_box(&self) -> Aabb2;

    /// Returns the node's kind for introspection.
    fn kind(&self) -> NodeKind;

    /// Returns the node's evaluatable children, if any.
    fn children(&self) -> Vec<SurfaceRef> {
        Vec::new()
    }
}

/// A 3D signed-distance surface.
///
/// Negative inside, positive outside, zero on the boundary.
pub trait Sdf3: Send + Sync {
    /// Evaluates the signed distance at a point.
    fn evaluate(&self, p: Vec3) -> f64;

    /// Returns the axis-aligned bounding box of the surface.
    fn bounding_box(&self) -> Aabb;

    /// Returns the node's kind for introspection.
    fn kind(&self) -> NodeKind;

    /// Returns the node's evaluatable children, if any.
    fn children(&self) -> Vec<SurfaceRef> {
        Vec::new()
    }
}

/// A dimension-erased handle to a surface node.
///
/// Mixed trees are common (a 3D model usually extrudes or revolves 2D
/// profiles), so the introspection walk operates on this handle and promotes
/// 2D boxes to thin 3D slabs where needed.
#[derive(Clone)]
pub enum SurfaceRef {
    /// A 2D surface node.
    Two(Arc<dyn Sdf2>),
    /// A 3D surface node.
    Three(Arc<dyn Sdf3>),
}

impl SurfaceRef {
    /// Returns the node's kind.
    pub fn kind(&self) -> NodeKind {
        match self {
            SurfaceRef::Two(s) => s.kind(),
            SurfaceRef::Three(s) => s.kind(),
        }
    }

    /// Returns the node's children.
    pub fn children(&self) -> Vec<SurfaceRef> {
        match self {
            SurfaceRef::Two(s) => s.children(),
            SurfaceRef::Three(s) => s.children(),
        }
    }

    /// Returns the node's 3D bounding box, promoting 2D nodes to a thin slab.
    pub fn aabb(&self) -> Aabb {
        match self {
            SurfaceRef::Two(s) => s.bounding_box().to_aabb(FLAT_BOX_THICKNESS),
            SurfaceRef::Three(s) => s.bounding_box(),
        }
    }

    /// Returns a stable identity for cycle detection.
    ///
    /// Two handles share an id exactly when they point at the same node
    /// allocation.
    pub fn node_id(&self) -> usize {
        match self {
            SurfaceRef::Two(s) => Arc::as_ptr(s) as *const () as usize,
            SurfaceRef::Three(s) => Arc::as_ptr(s) as *const () as usize,
        }
    }
}

impl std::fmt::Debug for SurfaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceRef::Two(s) => write!(f, "SurfaceRef::Two({:?})", s.kind()),
            SurfaceRef::Three(s) => write!(f, "SurfaceRef::Three({:?})", s.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_kinds() {
        assert!(NodeKind::Transform.is_pass_through());
        assert!(NodeKind::UniformScale.is_pass_through());
        assert!(NodeKind::SwapAxes.is_pass_through());
        assert!(NodeKind::InvertAxis.is_pass_through());
        assert!(!NodeKind::Primitive.is_pass_through());
        assert!(!NodeKind::BooleanOp.is_pass_through());
        assert!(!NodeKind::Extrude.is_pass_through());
        assert!(!NodeKind::Revolve.is_pass_through());
    }

    #[test]
    fn node_id_tracks_allocation() {
        let a: Arc<dyn Sdf3> = Arc::new(nodes::Sphere::new(1.0));
        let r1 = SurfaceRef::Three(a.clone());
        let r2 = SurfaceRef::Three(a);
        assert_eq!(r1.node_id(), r2.node_id());

        let b = SurfaceRef::Three(Arc::new(nodes::Sphere::new(1.0)));
        assert_ne!(r1.node_id(), b.node_id());
    }
}
