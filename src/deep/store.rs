//! The shared layout behind deep collections
//!
//! A `DeepShapeStore` owns one hierarchical layout. Every deep collection is
//! a layer in it; operations create new layers and never modify the layers
//! of their inputs. Layers live as long as the store.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::edge_pairs::DeepEdgePairs;
use super::edges::DeepEdges;
use super::region::DeepRegion;
use crate::config::EngineConfig;
use crate::error::{GeoError, GeoResult};
use crate::geometry::{Edge, Polygon};
use crate::hier::{IntruderLayer, LocalOperation, LocalProcessor};
use crate::layout::{CellIndex, LayerIndex, Layout, LayoutShape, ShapeBuffer};

pub struct StoreInner {
    pub layout: Layout,
    pub top: CellIndex,
}

/// Handle to a shared hierarchical layout. Clones refer to the same store.
#[derive(Clone)]
pub struct DeepShapeStore {
    inner: Arc<RwLock<StoreInner>>,
    config: Arc<EngineConfig>,
}

impl std::fmt::Debug for DeepShapeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("DeepShapeStore")
            .field("top", &inner.layout.cell_name(inner.top))
            .field("layers", &inner.layout.num_layers())
            .field("cells", &inner.layout.num_cells())
            .finish()
    }
}

/// One layer of a store
#[derive(Debug, Clone)]
pub struct DeepLayer {
    pub(crate) store: DeepShapeStore,
    pub(crate) layer: LayerIndex,
}

impl DeepLayer {
    pub fn store(&self) -> &DeepShapeStore {
        &self.store
    }

    pub fn layer(&self) -> LayerIndex {
        self.layer
    }

    pub fn name(&self) -> String {
        self.store.read().layout.layer_name(self.layer).to_string()
    }

    /// The same store's layer with another index
    pub(crate) fn derived(&self, layer: LayerIndex) -> DeepLayer {
        DeepLayer { store: self.store.clone(), layer }
    }

    pub fn flat_shapes<T: LayoutShape>(&self) -> Vec<T> {
        let inner = self.store.read();
        inner.layout.flat_shapes::<T>(inner.top, self.layer).into_iter().map(|(s, _)| s).collect()
    }

    /// Shapes counted once per cell
    pub fn hier_count(&self) -> usize {
        let inner = self.store.read();
        inner.layout.hier_shape_count(inner.top, self.layer)
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.store.read();
        inner.layout.bbox_on_layer(inner.top, self.layer).is_empty()
    }
}

/// Where the intruders of a store operation come from
pub(crate) enum Intruders<'a> {
    None,
    /// The subject layer itself
    Subject,
    Layer(&'a DeepLayer),
}

impl DeepShapeStore {
    /// An empty store with a single top cell
    pub fn new(dbu: f64, config: EngineConfig) -> Self {
        let mut layout = Layout::new(dbu);
        let top = layout.add_cell("TOP");
        Self::wrap(layout, top, config)
    }

    /// Take over a layout; it is updated here
    pub fn from_layout(mut layout: Layout, top: CellIndex, config: EngineConfig) -> GeoResult<Self> {
        if !layout.is_valid_cell_index(top) {
            return Err(GeoError::InvalidCellIndex(top));
        }
        layout.update()?;
        Ok(Self::wrap(layout, top, config))
    }

    fn wrap(layout: Layout, top: CellIndex, config: EngineConfig) -> Self {
        Self { inner: Arc::new(RwLock::new(StoreInner { layout, top })), config: Arc::new(config) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write()
    }

    pub fn is_same(&self, other: &DeepShapeStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fails unless `other` is this store
    pub fn require_same(&self, other: &DeepShapeStore, operation: &str) -> GeoResult<()> {
        if self.is_same(other) {
            Ok(())
        } else {
            Err(GeoError::LayoutMismatch(operation.to_string()))
        }
    }

    pub fn dbu(&self) -> f64 {
        self.read().layout.dbu()
    }

    pub fn top(&self) -> CellIndex {
        self.read().top
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.read()
            .layout
            .layers()
            .filter(|(_, n)| !n.starts_with('$'))
            .map(|(_, n)| n.to_string())
            .collect()
    }

    fn layer(&self, name: &str) -> GeoResult<DeepLayer> {
        let li = self.read().layout.layer_index(name).ok_or_else(|| GeoError::UnknownLayer(name.to_string()))?;
        Ok(DeepLayer { store: self.clone(), layer: li })
    }

    pub fn region(&self, name: &str) -> GeoResult<DeepRegion> {
        Ok(DeepRegion::new(self.layer(name)?))
    }

    pub fn edges(&self, name: &str) -> GeoResult<DeepEdges> {
        Ok(DeepEdges::new(self.layer(name)?))
    }

    pub fn edge_pairs(&self, name: &str) -> GeoResult<DeepEdgePairs> {
        Ok(DeepEdgePairs::new(self.layer(name)?))
    }

    /// A fresh anonymous layer
    pub fn new_layer(&self, prefix: &str) -> DeepLayer {
        let li = self.write().layout.new_layer(prefix);
        DeepLayer { store: self.clone(), layer: li }
    }

    /// Put flat shapes into the top cell of a fresh layer
    pub(crate) fn insert_flat(&self, prefix: &str, buf: &ShapeBuffer) -> GeoResult<DeepLayer> {
        let mut inner = self.write();
        let li = inner.layout.new_layer(prefix);
        let top = inner.top;
        inner.layout.insert_buffer(top, li, buf);
        inner.layout.update()?;
        Ok(DeepLayer { store: self.clone(), layer: li })
    }

    pub fn insert_polygons(&self, prefix: &str, polygons: Vec<Polygon>) -> GeoResult<DeepRegion> {
        let buf = ShapeBuffer { polygons: polygons.into_iter().map(|p| (p, 0)).collect(), ..ShapeBuffer::new() };
        Ok(DeepRegion::new(self.insert_flat(prefix, &buf)?))
    }

    pub fn insert_edges(&self, prefix: &str, edges: Vec<Edge>) -> GeoResult<DeepEdges> {
        let buf = ShapeBuffer { edges: edges.into_iter().map(|e| (e, 0)).collect(), ..ShapeBuffer::new() };
        Ok(DeepEdges::new(self.insert_flat(prefix, &buf)?))
    }

    fn processor<'a>(&self, foreign: Option<(&'a Layout, CellIndex)>) -> LocalProcessor<'a> {
        let mut proc = match foreign {
            Some((layout, top)) => LocalProcessor::with_foreign_intruders(layout, top),
            None => LocalProcessor::new(),
        };
        proc.apply_config(&self.config);
        proc
    }

    /// Run a local operation on `subject` and store each output in a new layer
    pub(crate) fn run_local<TS, TI, TR>(
        &self,
        subject: LayerIndex,
        intruders: Intruders<'_>,
        op: &dyn LocalOperation<TS, TI, TR>,
        prefix: &str,
    ) -> GeoResult<Vec<DeepLayer>>
    where
        TS: LayoutShape,
        TI: LayoutShape,
        TR: LayoutShape,
    {
        let start = Instant::now();
        let results = match intruders {
            Intruders::Layer(other) if !other.store.is_same(self) => {
                let (own_dbu, other_dbu) = (self.dbu(), other.store.dbu());
                if (own_dbu - other_dbu).abs() > 1e-12 {
                    return Err(GeoError::DbuMismatch(own_dbu, other_dbu));
                }
                let foreign = other.store.read();
                let inner = self.read();
                let proc = self.processor(Some((&foreign.layout, foreign.top)));
                proc.compute(&inner.layout, inner.top, subject, &[IntruderLayer::Layer(other.layer)], op)
            }
            intruders => {
                let slots = match intruders {
                    Intruders::None => Vec::new(),
                    Intruders::Subject => vec![IntruderLayer::Subject],
                    Intruders::Layer(other) => vec![IntruderLayer::Layer(other.layer)],
                };
                let inner = self.read();
                self.processor(None).compute(&inner.layout, inner.top, subject, &slots, op)
            }
        };

        let mut inner = self.write();
        let layers: Vec<LayerIndex> = (0..op.num_outputs()).map(|_| inner.layout.new_layer(prefix)).collect();
        results.insert_into(&mut inner.layout, &layers)?;
        log::debug!("[DeepStore] {} -> {:?} ({:.2?})", op.description(), layers, start.elapsed());
        Ok(layers.into_iter().map(|layer| DeepLayer { store: self.clone(), layer }).collect())
    }

    /// Like `run_local` for operations that need separated variants; may add cells
    pub(crate) fn run_separated<TS, TR>(
        &self,
        subject: LayerIndex,
        op: &dyn LocalOperation<TS, TS, TR>,
        prefix: &str,
    ) -> GeoResult<DeepLayer>
    where
        TS: LayoutShape,
        TR: LayoutShape,
    {
        let mut inner = self.write();
        let out = inner.layout.new_layer(prefix);
        let top = inner.top;
        self.processor(None).run(&mut inner.layout, top, subject, &[], op, &[out])?;
        Ok(DeepLayer { store: self.clone(), layer: out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_layers_by_name() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let l = layout.insert_layer("M1");
        layout.insert_polygon(top, l, &Rect::new(0, 0, 10, 10).to_polygon(), 0);
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        assert_eq!(store.region("M1").unwrap().count(), 1);
        assert!(matches!(store.region("M2"), Err(GeoError::UnknownLayer(_))));
        // anonymous layers stay hidden
        store.new_layer("tmp");
        assert_eq!(store.layer_names(), vec!["M1".to_string()]);
    }

    #[test]
    fn test_clone_shares_store() {
        let a = DeepShapeStore::new(0.001, EngineConfig::default());
        let b = a.clone();
        let c = DeepShapeStore::new(0.001, EngineConfig::default());
        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
    }
}
