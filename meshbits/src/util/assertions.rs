use std::collections::BTreeSet;

use itertools::Itertools;
use log::error;

use crate::entities::{BitKey, Layer, Pavement};
use crate::util::EPSILON;

//Various checks to verify correctness of the state of the system
//Used in debug_assertion!() blocks

pub fn pavement_keys_are_distinct(pavement: &Pavement) -> bool {
    let eps = pavement.config().epsilon();
    let keys = pavement.keys().collect_vec();
    // keys are sorted by x, so only neighbors within eps in x have to be compared
    for (i, k1) in keys.iter().enumerate() {
        for k2 in keys[i + 1..]
            .iter()
            .take_while(|k2| (k2.point().0 - k1.point().0).abs() < eps)
        {
            if k1.almost_eq(k2, eps) {
                error!("[ASSERT] colliding keys in pavement: {k1} and {k2}");
                return false;
            }
        }
    }
    true
}

pub fn layer_is_consistent(layer: &Layer) -> bool {
    let pavement_keys: BTreeSet<BitKey> = layer
        .pavement()
        .map(|p| p.keys().collect())
        .unwrap_or_default();
    let extruded_keys: BTreeSet<BitKey> = layer.bits3d().map(|b| b.key()).collect();
    if pavement_keys != extruded_keys {
        error!(
            "[ASSERT] layer {}: pavement and extruded bits differ",
            layer.index()
        );
        return false;
    }
    let irregular: BTreeSet<BitKey> = layer
        .bits3d()
        .filter(|b| b.is_irregular())
        .map(|b| b.key())
        .collect();
    if &irregular != layer.irregular_keys() {
        error!(
            "[ASSERT] layer {}: irregular keys out of date",
            layer.index()
        );
        return false;
    }
    true
}

pub fn bits_inside_region(layer: &Layer) -> bool {
    for bit3d in layer.bits3d() {
        if !bit3d.bit().area().is_subset_of(layer.region(), EPSILON) {
            error!(
                "[ASSERT] layer {}: bit at {} exceeds the layer region",
                layer.index(),
                bit3d.key()
            );
            return false;
        }
    }
    true
}
