//! JSON layout documents
//!
//! ```json
//! {
//!   "dbu": 0.001,
//!   "top": "TOP",
//!   "cells": [
//!     { "name": "A", "shapes": { "M1": [ { "box": [0, 0, 10, 10] } ] } },
//!     { "name": "TOP", "instances": [ { "cell": "A", "rot": "R90", "disp": [100, 0] } ] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::cell::CellIndex;
use super::database::Layout;
use super::instance::{CellInstArray, RegularArray};
use super::properties::PropertySet;
use crate::error::{GeoError, GeoResult};
use crate::geometry::{ComplexTrans, Coord, Edge, EdgePair, Orientation, Point, Polygon, Rect, Vector};

fn default_dbu() -> f64 {
    0.001
}

fn default_mag() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default = "default_dbu")]
    pub dbu: f64,
    #[serde(default)]
    pub top: Option<String>,
    pub cells: Vec<CellDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellDocument {
    pub name: String,
    #[serde(default)]
    pub shapes: BTreeMap<String, Vec<ShapeEntry>>,
    #[serde(default)]
    pub instances: Vec<InstanceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeDocument {
    Box([Coord; 4]),
    Polygon {
        hull: Vec<[Coord; 2]>,
        #[serde(default)]
        holes: Vec<Vec<[Coord; 2]>>,
    },
    Edge([Coord; 4]),
    EdgePair {
        first: [Coord; 4],
        second: [Coord; 4],
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeEntry {
    #[serde(flatten)]
    pub shape: ShapeDocument,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: PropertySet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayDocument {
    pub a: [Coord; 2],
    pub b: [Coord; 2],
    pub na: u32,
    pub nb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDocument {
    pub cell: String,
    #[serde(default)]
    pub rot: Orientation,
    #[serde(default = "default_mag")]
    pub mag: f64,
    #[serde(default)]
    pub disp: [f64; 2],
    #[serde(default)]
    pub array: Option<ArrayDocument>,
}

fn points(pts: &[[Coord; 2]]) -> Vec<Point> {
    pts.iter().map(|p| Point::new(p[0], p[1])).collect()
}

fn edge(c: &[Coord; 4]) -> Edge {
    Edge::from_coords(c[0], c[1], c[2], c[3])
}

fn coords(e: &Edge) -> [Coord; 4] {
    [e.p1.x, e.p1.y, e.p2.x, e.p2.y]
}

impl LayoutDocument {
    pub fn from_json_str(s: &str) -> GeoResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> GeoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Build a layout; returns it together with the top cell
    pub fn to_layout(&self) -> GeoResult<(Layout, CellIndex)> {
        let mut layout = Layout::new(self.dbu);
        for c in &self.cells {
            layout.add_cell(&c.name);
        }
        for c in &self.cells {
            let ci = layout
                .cell_by_name(&c.name)
                .ok_or_else(|| GeoError::UnknownCell(c.name.clone()))?;
            for (layer, entries) in &c.shapes {
                let li = layout.insert_layer(layer);
                for entry in entries {
                    let prop = layout.properties_mut().prop_id(entry.props.clone());
                    match &entry.shape {
                        ShapeDocument::Box(b) => {
                            let poly = Rect::new(b[0], b[1], b[2], b[3]).to_polygon();
                            layout.insert_polygon(ci, li, &poly, prop);
                        }
                        ShapeDocument::Polygon { hull, holes } => {
                            let poly = Polygon::with_holes(points(hull), holes.iter().map(|h| points(h)).collect());
                            layout.insert_polygon(ci, li, &poly, prop);
                        }
                        ShapeDocument::Edge(e) => layout.insert_edge(ci, li, edge(e), prop),
                        ShapeDocument::EdgePair { first, second } => {
                            layout.insert_edge_pair(ci, li, EdgePair::new(edge(first), edge(second)), prop)
                        }
                    }
                }
            }
            for inst in &c.instances {
                let child = layout
                    .cell_by_name(&inst.cell)
                    .ok_or_else(|| GeoError::UnknownCell(inst.cell.clone()))?;
                let trans = ComplexTrans::new(inst.rot, inst.mag, inst.disp[0], inst.disp[1]);
                let cia = match &inst.array {
                    Some(a) => CellInstArray::new_array(
                        child,
                        trans,
                        Vector::new(a.a[0], a.a[1]),
                        Vector::new(a.b[0], a.b[1]),
                        a.na,
                        a.nb,
                    ),
                    None => CellInstArray::new(child, trans),
                };
                layout.add_instance(ci, cia);
            }
        }
        layout.update()?;

        let top = match &self.top {
            Some(name) => layout
                .cell_by_name(name)
                .ok_or_else(|| GeoError::UnknownCell(name.clone()))?,
            None => *layout
                .top_cells()
                .first()
                .ok_or_else(|| GeoError::UnknownCell("<top>".to_string()))?,
        };
        Ok((layout, top))
    }

    /// Serialize a layout (used for dumping results)
    pub fn from_layout(layout: &Layout, top: CellIndex) -> Self {
        let mut cells = Vec::new();
        for ci in 0..layout.num_cells() {
            let cell = layout.cell(ci);
            let mut shapes: BTreeMap<String, Vec<ShapeEntry>> = BTreeMap::new();
            for (li, s) in cell.layers() {
                let entries = shapes.entry(layout.layer_name(li).to_string()).or_default();
                let props = |id| layout.properties().properties(id).cloned().unwrap_or_default();
                for (p, id) in s.polygons() {
                    let shape = if p.is_box() {
                        let b = p.bbox();
                        ShapeDocument::Box([b.left, b.bottom, b.right, b.top])
                    } else {
                        ShapeDocument::Polygon {
                            hull: p.hull().iter().map(|q| [q.x, q.y]).collect(),
                            holes: p.holes().iter().map(|h| h.iter().map(|q| [q.x, q.y]).collect()).collect(),
                        }
                    };
                    entries.push(ShapeEntry { shape, props: props(id) });
                }
                for (e, id) in s.edges() {
                    entries.push(ShapeEntry { shape: ShapeDocument::Edge(coords(e)), props: props(*id) });
                }
                for (ep, id) in s.edge_pairs() {
                    entries.push(ShapeEntry {
                        shape: ShapeDocument::EdgePair { first: coords(&ep.first), second: coords(&ep.second) },
                        props: props(*id),
                    });
                }
            }
            let instances = cell
                .instances()
                .iter()
                .map(|inst| InstanceDocument {
                    cell: layout.cell_name(inst.cell).to_string(),
                    rot: inst.trans.rot,
                    mag: inst.trans.mag,
                    disp: [inst.trans.dx, inst.trans.dy],
                    array: inst.array.map(|RegularArray { a, b, na, nb }| ArrayDocument {
                        a: [a.x, a.y],
                        b: [b.x, b.y],
                        na,
                        nb,
                    }),
                })
                .collect();
            cells.push(CellDocument { name: cell.name().to_string(), shapes, instances });
        }
        Self { dbu: layout.dbu(), top: Some(layout.cell_name(top).to_string()), cells }
    }
}

/// Load a layout file
pub fn load_layout<P: AsRef<Path>>(path: P) -> GeoResult<(Layout, CellIndex)> {
    LayoutDocument::from_file(path)?.to_layout()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "dbu": 0.001,
        "cells": [
            { "name": "A", "shapes": { "M1": [ { "box": [0, 0, 10, 10], "props": { "net": "VDD" } } ] } },
            { "name": "TOP", "instances": [
                { "cell": "A", "disp": [100, 0] },
                { "cell": "A", "rot": "R90", "array": { "a": [0, 50], "b": [0, 0], "na": 2, "nb": 1 } }
            ] }
        ]
    }"#;

    #[test]
    fn test_document_to_layout() {
        let (layout, top) = LayoutDocument::from_json_str(DOC).unwrap().to_layout().unwrap();
        assert_eq!(layout.cell_name(top), "TOP");
        let li = layout.layer_index("M1").unwrap();
        let flat = layout.flat_shapes::<Polygon>(top, li);
        assert_eq!(flat.len(), 3);
        assert!(flat.iter().all(|(_, id)| *id == 1));
    }

    #[test]
    fn test_unknown_cell_reference() {
        let doc = r#"{ "cells": [ { "name": "TOP", "instances": [ { "cell": "X" } ] } ] }"#;
        let err = LayoutDocument::from_json_str(doc).unwrap().to_layout().unwrap_err();
        assert!(matches!(err, GeoError::UnknownCell(ref n) if n == "X"));
    }

    #[test]
    fn test_round_trip_through_document() {
        let (layout, top) = LayoutDocument::from_json_str(DOC).unwrap().to_layout().unwrap();
        let doc = LayoutDocument::from_layout(&layout, top);
        let (again, top2) = doc.to_layout().unwrap();
        let li = again.layer_index("M1").unwrap();
        assert_eq!(again.flat_shapes::<Polygon>(top2, li).len(), 3);
    }
}
