use std::collections::BTreeSet;

use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::warn;

use crate::entities::{Bit, BitKey, Layer, Pavement, Slice};
use crate::geometry::Region;
use crate::geometry::primitives::Point;
use crate::io::ext_repr::{ExtBit, ExtLayer, ExtMesh, ExtPavement, ExtRegion, ExtRing, ExtSlice, FORMAT_VERSION};
use crate::util::CraftConfig;

pub fn import_region(ext_region: &ExtRegion) -> Region {
    let rings = ext_region.rings.iter().map(import_ring).collect_vec();
    Region::from_rings(&rings, ext_region.winding)
}

pub fn import_ring(ext_ring: &ExtRing) -> Vec<Point> {
    ext_ring.0.iter().map(|&p| Point::from(p)).collect_vec()
}

/// Recreates a bit from its stored pieces. Pieces are resolved again but not reclipped.
pub fn import_bit(ext_bit: &ExtBit, config: CraftConfig) -> Result<Bit> {
    let pieces = ext_bit
        .sub_bits
        .iter()
        .map(|sb| (import_region(&sb.region), sb.removed))
        .collect_vec();
    Bit::from_local_pieces(
        ext_bit.origin.into(),
        ext_bit.orientation.into(),
        ext_bit.length,
        ext_bit.width,
        config,
        pieces,
    )
    .with_context(|| format!("invalid bit at {:?}", ext_bit.origin))
}

pub fn import_pavement(ext_pavement: &ExtPavement, config: CraftConfig) -> Result<Pavement> {
    let mut pavement = Pavement::new(config);
    for ext_bit in &ext_pavement.bits {
        pavement.add_bit(import_bit(ext_bit, config)?);
    }
    Ok(pavement)
}

pub fn import_slice(ext_slice: &ExtSlice) -> Slice {
    Slice::new(
        ext_slice.altitude,
        ext_slice.polygons.iter().map(import_ring).collect_vec(),
    )
}

pub fn import_layer(ext_layer: &ExtLayer, config: CraftConfig) -> Result<Layer> {
    ensure!(
        ext_layer.version == FORMAT_VERSION,
        "unsupported layer format version {}, expected {FORMAT_VERSION}",
        ext_layer.version
    );
    let pavement = match ext_layer.paved {
        true => Some(
            import_pavement(&ext_layer.pavement, config)
                .with_context(|| format!("invalid pavement in layer {}", ext_layer.index))?,
        ),
        false => None,
    };
    let layer = Layer::from_parts(
        ext_layer.index,
        import_slice(&ext_layer.slice),
        pavement,
        config,
    );

    let stored: BTreeSet<BitKey> = ext_layer
        .irregular_keys
        .iter()
        .map(|&p| BitKey::from_point(p.into(), &config))
        .collect();
    if &stored != layer.irregular_keys() {
        warn!(
            "[IMPORT] layer {}: {} irregular bits stored, {} found",
            layer.index(),
            stored.len(),
            layer.count_irregularities()
        );
    }
    Ok(layer)
}

/// Imports all layers of a mesh, together with its skirt radius
pub fn import_mesh(ext_mesh: &ExtMesh, config: CraftConfig) -> Result<(Vec<Layer>, f64)> {
    ensure!(
        ext_mesh.version == FORMAT_VERSION,
        "unsupported mesh format version {}, expected {FORMAT_VERSION}",
        ext_mesh.version
    );
    let layers = ext_mesh
        .layers
        .iter()
        .map(|l| import_layer(l, config))
        .collect::<Result<Vec<_>>>()?;
    Ok((layers, ext_mesh.skirt_radius))
}
