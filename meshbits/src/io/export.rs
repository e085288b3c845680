use itertools::Itertools;
use serde::Serialize;

use crate::entities::{Bit, Bit3D, BitAssignment, Layer, Pavement, Slice};
use crate::geometry::Region;
use crate::geometry::Winding;
use crate::geometry::cut_path::PathSegment;
use crate::geometry::primitives::Point;
use crate::io::ext_repr::{
    ExtBit, ExtLayer, ExtMesh, ExtPavement, ExtRegion, ExtRing, ExtSlice, ExtSubBit,
    FORMAT_VERSION,
};
use crate::pipeline::OptimizationReport;

pub fn export_region(region: &Region) -> ExtRegion {
    ExtRegion {
        winding: Winding::EvenOdd,
        rings: region.rings().iter().map(|r| export_ring(r)).collect_vec(),
    }
}

pub fn export_ring(ring: &[Point]) -> ExtRing {
    ExtRing(ring.iter().map(|p| (*p).into()).collect_vec())
}

pub fn export_bit(bit: &Bit) -> ExtBit {
    ExtBit {
        origin: bit.origin().into(),
        orientation: bit.orientation().into(),
        length: bit.length(),
        width: bit.width(),
        sub_bits: bit
            .sub_bits()
            .iter()
            .map(|sb| ExtSubBit {
                region: export_region(sb.region()),
                removed: sb.is_removed(),
            })
            .collect_vec(),
    }
}

pub fn export_pavement(pavement: &Pavement) -> ExtPavement {
    ExtPavement {
        bits: pavement.bits().map(|(_, bit)| export_bit(bit)).collect_vec(),
    }
}

pub fn export_slice(slice: &Slice) -> ExtSlice {
    ExtSlice {
        altitude: slice.altitude,
        polygons: slice.polygons.iter().map(|p| export_ring(p)).collect_vec(),
    }
}

pub fn export_layer(layer: &Layer) -> ExtLayer {
    ExtLayer {
        version: FORMAT_VERSION,
        index: layer.index(),
        slice: export_slice(layer.slice()),
        paved: layer.is_paved(),
        pavement: layer.pavement().map(export_pavement).unwrap_or_default(),
        irregular_keys: layer
            .irregular_keys()
            .iter()
            .map(|k| (*k).into())
            .collect_vec(),
    }
}

pub fn export_mesh<'a>(layers: impl IntoIterator<Item = &'a Layer>, skirt_radius: f64) -> ExtMesh {
    ExtMesh {
        version: FORMAT_VERSION,
        skirt_radius,
        layers: layers.into_iter().map(export_layer).collect_vec(),
    }
}

/// Read-only view of a [`Bit3D`], everything an exporter needs to produce manufacturing instructions.
#[derive(Serialize, Clone, Debug)]
pub struct BitExportView {
    pub layer: usize,
    pub key: (f64, f64),
    pub origin: Point,
    pub orientation: Point,
    pub length: f64,
    pub width: f64,
    pub lower_altitude: f64,
    pub assignment: Option<BitAssignment>,
    /// One entry per retained piece, in piece order
    pub pieces: Vec<PieceView>,
}

/// Read-only view of one retained piece of a bit.
/// Local coordinates are in the frame of the bit, world coordinates in the frame of the layer.
#[derive(Serialize, Clone, Debug)]
pub struct PieceView {
    pub cut_paths: Vec<Vec<PathSegment>>,
    pub cut_paths_world: Vec<Vec<PathSegment>>,
    pub grip_local: Option<Point>,
    pub grip_world: Option<Point>,
    pub distant_local: Option<[Point; 2]>,
    pub distant_world: Option<[Point; 2]>,
}

impl BitExportView {
    pub fn new(layer: usize, bit3d: &Bit3D) -> Self {
        let bit = bit3d.bit();
        BitExportView {
            layer,
            key: bit3d.key().into(),
            origin: bit.origin(),
            orientation: bit.orientation(),
            length: bit.length(),
            width: bit.width(),
            lower_altitude: bit3d.lower_altitude(),
            assignment: bit3d.assignment(),
            pieces: bit
                .sub_bits()
                .iter()
                .filter(|sb| !sb.is_removed())
                .map(|sb| PieceView {
                    cut_paths: sb.cut_paths().iter().map(|cp| cp.segments()).collect_vec(),
                    cut_paths_world: sb
                        .cut_paths_world()
                        .iter()
                        .map(|cp| cp.segments())
                        .collect_vec(),
                    grip_local: sb.grip_point(),
                    grip_world: sb.grip_point_world(),
                    distant_local: sb.distant_points(),
                    distant_world: sb.distant_points_world(),
                })
                .collect_vec(),
        }
    }
}

/// Views of all bits of a layer, ordered by [`Layer::sorted_bit_keys`]
pub fn layer_bit_views(layer: &Layer) -> Vec<BitExportView> {
    layer
        .sorted_bit_keys()
        .iter()
        .filter_map(|key| layer.bit3d(key))
        .map(|b| BitExportView::new(layer.index(), b))
        .collect_vec()
}

/// Everything handed to an [`Exporter`](crate::pipeline::Exporter)
#[derive(Serialize, Clone, Debug)]
pub struct MeshExport {
    pub mesh: ExtMesh,
    pub bits: Vec<BitExportView>,
    pub optimization: Option<OptimizationReport>,
}
