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

//! Bounding-box introspection of surface expression graphs.
//!
//! A [`SurfaceTree`] is built once per structural change to the surface (not
//! per frame) and cached; rendering only reads the flattened box lists for
//! the debug overlay. The walk is a typed recursion over the closed
//! [`NodeKind`](crate::surface::NodeKind) set, and self-referential graphs
//! are rejected as a hard error instead of looping.

use crate::error::SurfaceTreeError;
use crate::math::{Aabb, Aabb2};
use crate::surface::SurfaceRef;
use serde::{Deserialize, Serialize};

/// The cached metadata of one evaluatable node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceTreeNode {
    /// A unique id within the tree, assigned in depth-first visit order.
    pub id: u32,
    /// The depth-first nesting level. Not canonical across branches; only
    /// useful for display indentation.
    pub level: u32,
    /// The node's kind, retained so flattening can elide pass-through
    /// wrappers.
    pub kind: crate::surface::NodeKind,
    /// The node's cached 3D bounding box (2D nodes hold a thin slab).
    pub aabb: Aabb,
}

/// One entry of the tree: a node plus its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceTreeEntry {
    /// The node metadata.
    pub info: SurfaceTreeNode,
    /// The node's child entries in source order.
    pub children: Vec<SurfaceTreeEntry>,
}

/// A cached bounding-box hierarchy extracted from a surface expression graph.
///
/// Value-only: ids, levels and boxes, safely cloneable and shippable across
/// the remote boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceTree {
    root: SurfaceTreeEntry,
}

impl SurfaceTree {
    /// Walks the expression graph rooted at `root` and caches every node's
    /// id, nesting level, and bounding box.
    ///
    /// Fails with [`SurfaceTreeError::CycleDetected`] when the graph
    /// references itself.
    pub fn build(root: &SurfaceRef) -> Result<Self, SurfaceTreeError> {
        let mut next_id = 0u32;
        let mut path = Vec::new();
        let root = Self::walk(root, 0, &mut next_id, &mut path)?;
        Ok(Self { root })
    }

    fn walk(
        node: &SurfaceRef,
        level: u32,
        next_id: &mut u32,
        path: &mut Vec<usize>,
    ) -> Result<SurfaceTreeEntry, SurfaceTreeError> {
        let identity = node.node_id();
        if path.contains(&identity) {
            return Err(SurfaceTreeError::CycleDetected);
        }
        let info = SurfaceTreeNode {
            id: *next_id,
            level,
            kind: node.kind(),
            aabb: node.aabb(),
        };
        *next_id += 1;

        path.push(identity);
        let mut children = Vec::new();
        for child in node.children() {
            children.push(Self::walk(&child, level + 1, next_id, path)?);
        }
        path.pop();

        Ok(SurfaceTreeEntry { info, children })
    }

    /// Returns the root entry.
    pub fn root(&self) -> &SurfaceTreeEntry {
        &self.root
    }

    /// Returns the number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        fn count(e: &SurfaceTreeEntry) -> usize {
            1 + e.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    /// Flattens the tree to the 3D boxes the overlay draws, in depth-first
    /// order.
    ///
    /// Pass-through wrapper nodes contribute no box of their own but their
    /// children are still included.
    pub fn flatten_boxes(&self) -> Vec<Aabb> {
        fn rec(e: &SurfaceTreeEntry, out: &mut Vec<Aabb>) {
            if !e.info.kind.is_pass_through() {
                out.push(e.info.aabb);
            }
            for child in &e.children {
                rec(child, out);
            }
        }
        let mut out = Vec::new();
        rec(&self.root, &mut out);
        out
    }

    /// Flattens the tree to 2D rectangles (the XY footprint of each retained
    /// box), in depth-first order.
    pub fn flatten_boxes_2d(&self) -> Vec<Aabb2> {
        self.flatten_boxes().iter().map(Aabb::to_aabb2).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Vec3};
    use crate::surface::nodes::{Circle, Sphere, Translate3, Union2, Union3};
    use crate::surface::{NodeKind, Sdf3, SurfaceRef};
    use std::sync::{Arc, RwLock};

    fn two_sphere_union() -> SurfaceRef {
        let a: Arc<dyn Sdf3> = Arc::new(Sphere::new(1.0));
        let b: Arc<dyn Sdf3> = Arc::new(Sphere::new(2.0));
        SurfaceRef::Three(Arc::new(Union3::new(a, b)))
    }

    #[test]
    fn binary_union_yields_three_boxes_depth_first() {
        let tree = SurfaceTree::build(&two_sphere_union()).unwrap();
        assert_eq!(tree.node_count(), 3);
        let boxes = tree.flatten_boxes();
        assert_eq!(boxes.len(), 3);
        // Parent box first (the merged bounds), then the children in order.
        assert!(approx_eq(boxes[0].size().x, 4.0));
        assert!(approx_eq(boxes[1].size().x, 2.0));
        assert!(approx_eq(boxes[2].size().x, 4.0));
    }

    #[test]
    fn ids_are_monotonic_and_levels_nest() {
        let tree = SurfaceTree::build(&two_sphere_union()).unwrap();
        let root = tree.root();
        assert_eq!(root.info.id, 0);
        assert_eq!(root.info.level, 0);
        assert_eq!(root.children[0].info.id, 1);
        assert_eq!(root.children[1].info.id, 2);
        assert!(root.children.iter().all(|c| c.info.level == 1));
    }

    #[test]
    fn pure_transform_wrapper_is_elided_but_child_kept() {
        let wrapped: Arc<dyn Sdf3> = Arc::new(Translate3::new(
            Arc::new(Sphere::new(1.0)),
            Vec3::new(5.0, 0.0, 0.0),
        ));
        let plain: Arc<dyn Sdf3> = Arc::new(Sphere::new(2.0));
        let root = SurfaceRef::Three(Arc::new(Union3::new(wrapped, plain)));

        let tree = SurfaceTree::build(&root).unwrap();
        // Four nodes, but the Translate wrapper contributes no box.
        assert_eq!(tree.node_count(), 4);
        let boxes = tree.flatten_boxes();
        assert_eq!(boxes.len(), 3);
        // The translated child's box is present, at its transformed position.
        assert!(boxes.iter().any(|b| approx_eq(b.center().x, 5.0)));
    }

    #[test]
    fn mixed_tree_promotes_2d_boxes() {
        let a: Arc<dyn crate::surface::Sdf2> = Arc::new(Circle::new(1.0));
        let b: Arc<dyn crate::surface::Sdf2> = Arc::new(Circle::new(2.0));
        let root = SurfaceRef::Two(Arc::new(Union2::new(a, b)));
        let tree = SurfaceTree::build(&root).unwrap();
        for bb in tree.flatten_boxes() {
            assert!(bb.size().z > 0.0 && bb.size().z < 0.01);
        }
        let rects = tree.flatten_boxes_2d();
        assert_eq!(rects.len(), 3);
        assert!(approx_eq(rects[0].size().x, 4.0));
    }

    /// A test-only node whose child is set after construction, allowing a
    /// self-referential graph to be built.
    struct LateBound {
        child: RwLock<Option<Arc<dyn Sdf3>>>,
    }

    impl Sdf3 for LateBound {
        fn evaluate(&self, _p: Vec3) -> f64 {
            0.0
        }
        fn bounding_box(&self) -> crate::math::Aabb {
            crate::math::Aabb::from_center_size(Vec3::ZERO, Vec3::ONE)
        }
        fn kind(&self) -> NodeKind {
            NodeKind::BooleanOp
        }
        fn children(&self) -> Vec<SurfaceRef> {
            self.child
                .read()
                .unwrap()
                .iter()
                .map(|c| SurfaceRef::Three(c.clone()))
                .collect()
        }
    }

    #[test]
    fn self_referential_graph_is_a_hard_error() {
        let node = Arc::new(LateBound {
            child: RwLock::new(None),
        });
        *node.child.write().unwrap() = Some(node.clone() as Arc<dyn Sdf3>);
        let root = SurfaceRef::Three(node.clone() as Arc<dyn Sdf3>);
        assert_eq!(
            SurfaceTree::build(&root),
            Err(SurfaceTreeError::CycleDetected)
        );
        // Break the cycle so the Arc can actually be freed.
        *node.child.write().unwrap() = None;
    }

    #[test]
    fn shared_subexpression_is_not_a_cycle() {
        // The same node appearing twice under different parents is a DAG,
        // not a cycle, and must be accepted (each occurrence gets an id).
        let shared: Arc<dyn Sdf3> = Arc::new(Sphere::new(1.0));
        let root = SurfaceRef::Three(Arc::new(Union3::new(shared.clone(), shared)));
        let tree = SurfaceTree::build(&root).unwrap();
        assert_eq!(tree.node_count(), 3);
    }
}
