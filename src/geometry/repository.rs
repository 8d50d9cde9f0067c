//! Shared shape repository
//!
//! Polygons stored in a layout are normalized to their lower-left bbox corner
//! and interned, so identical shapes placed at different positions share one
//! allocation. Insertion takes a write lock and may run from worker threads.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::types::{Polygon, Rect, Vector};

/// Interning store for shape objects
#[derive(Debug, Default)]
pub struct ShapeRepository<T: Eq + Hash> {
    items: RwLock<HashSet<Arc<T>>>,
}

impl<T: Eq + Hash> ShapeRepository<T> {
    pub fn new() -> Self {
        Self { items: RwLock::new(HashSet::new()) }
    }

    /// Return the shared copy of `obj`, inserting it if new
    pub fn intern(&self, obj: T) -> Arc<T> {
        if let Some(existing) = self.items.read().get(&obj) {
            return existing.clone();
        }
        let mut items = self.items.write();
        if let Some(existing) = items.get(&obj) {
            return existing.clone();
        }
        let shared = Arc::new(obj);
        items.insert(shared.clone());
        shared
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to an interned polygon plus its displacement
#[derive(Debug, Clone)]
pub struct PolygonRef {
    obj: Arc<Polygon>,
    disp: Vector,
}

impl PolygonRef {
    pub fn new(poly: &Polygon, repo: &ShapeRepository<Polygon>) -> Self {
        let bbox = poly.bbox();
        let disp = if bbox.is_empty() {
            Vector::default()
        } else {
            Vector::new(bbox.left, bbox.bottom)
        };
        let obj = repo.intern(poly.moved(-disp));
        Self { obj, disp }
    }

    pub fn instantiate(&self) -> Polygon {
        self.obj.moved(self.disp)
    }

    pub fn bbox(&self) -> Rect {
        self.obj.bbox().moved(self.disp)
    }

    pub fn disp(&self) -> Vector {
        self.disp
    }

    /// True if both handles point to the same repository entry
    pub fn shares_object(&self, other: &PolygonRef) -> bool {
        Arc::ptr_eq(&self.obj, &other.obj)
    }
}

impl PartialEq for PolygonRef {
    fn eq(&self, other: &Self) -> bool {
        self.disp == other.disp && (self.shares_object(other) || *self.obj == *other.obj)
    }
}

impl Eq for PolygonRef {}

impl Hash for PolygonRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.disp.hash(state);
        self.obj.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::types::Rect;

    #[test]
    fn test_interning_shares_objects() {
        let repo = ShapeRepository::new();
        let a = PolygonRef::new(&Rect::new(0, 0, 10, 10).to_polygon(), &repo);
        let b = PolygonRef::new(&Rect::new(100, 50, 110, 60).to_polygon(), &repo);
        assert!(a.shares_object(&b));
        assert_eq!(repo.len(), 1);
        assert_eq!(b.instantiate(), Rect::new(100, 50, 110, 60).to_polygon());
        assert_eq!(b.bbox(), Rect::new(100, 50, 110, 60));
        assert_ne!(a, b);
    }
}
