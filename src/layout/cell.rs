//! Cells: named containers of per-layer shapes and child instances

use std::collections::BTreeMap;

use super::instance::CellInstArray;
use super::shapes::Shapes;

pub type CellIndex = usize;
pub type LayerIndex = usize;

#[derive(Debug, Clone)]
pub struct Cell {
    index: CellIndex,
    name: String,
    layers: BTreeMap<LayerIndex, Shapes>,
    instances: Vec<CellInstArray>,
}

impl Cell {
    pub(crate) fn new(index: CellIndex, name: String) -> Self {
        Self { index, name, layers: BTreeMap::new(), instances: Vec::new() }
    }

    pub fn index(&self) -> CellIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shapes(&self, layer: LayerIndex) -> Option<&Shapes> {
        self.layers.get(&layer)
    }

    pub(crate) fn shapes_mut(&mut self, layer: LayerIndex) -> &mut Shapes {
        self.layers.entry(layer).or_default()
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerIndex, &Shapes)> {
        self.layers.iter().map(|(li, s)| (*li, s))
    }

    pub fn has_shapes_on(&self, layer: LayerIndex) -> bool {
        self.layers.get(&layer).is_some_and(|s| !s.is_empty())
    }

    pub fn instances(&self) -> &[CellInstArray] {
        &self.instances
    }

    pub(crate) fn instances_mut(&mut self) -> &mut Vec<CellInstArray> {
        &mut self.instances
    }

    pub fn is_leaf(&self) -> bool {
        self.instances.is_empty()
    }

    /// Copy of this cell under a new index and name
    pub(crate) fn duplicate(&self, index: CellIndex, name: String) -> Cell {
        Cell {
            index,
            name,
            layers: self.layers.clone(),
            instances: self.instances.clone(),
        }
    }

    pub(crate) fn clear_layer(&mut self, layer: LayerIndex) {
        self.layers.remove(&layer);
    }
}
