//! Damage tracking between canvas snapshots.
//!
//! Damage is expressed in the root canvas's coordinates. It is always a
//! superset of the area whose pixels may differ, never a subset.

use crate::canvas::Canvas;
use crate::context::Context;
use crate::layer::{Layer, LayerId, LayerRef};
use common::geometry::Bounds;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A damaged area, optionally attributed to a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct DamageRegion {
    pub bounds: Bounds,
    pub layer: Option<LayerId>,
}

/// Accumulates damage over the current and previous frame.
#[derive(Clone, Debug, Default)]
pub struct DamageTracker {
    current: Vec<DamageRegion>,
    previous: Vec<DamageRegion>,
}

impl DamageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_damage(&mut self, bounds: Bounds, layer: Option<LayerId>) {
        if !bounds.is_empty() {
            self.current.push(DamageRegion { bounds, layer });
        }
    }

    /// Record everything that differs between two snapshots.
    pub fn add_canvas_changes(&mut self, old: &Canvas, new: &Canvas) {
        self.add_damage(canvas_damage(old, new), None);
    }

    pub fn regions(&self) -> impl Iterator<Item = &DamageRegion> {
        self.current.iter().chain(&self.previous)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.previous.is_empty()
    }

    /// Union of the current and previous frame's damage.
    pub fn combined_damage(&self) -> Bounds {
        self.regions()
            .fold(Bounds::Empty, |acc, region| acc.union(&region.bounds))
    }

    /// Advance to the next frame.
    pub fn next_frame(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }
}

/// Area that may render differently between `old` and `new`.
///
/// Layers shared between the snapshots are unchanged. Layers that were
/// added, removed, reordered, edited or are animated count with their full
/// effect, seen through the layers above them.
pub fn canvas_damage(old: &Canvas, new: &Canvas) -> Bounds {
    let old_index: HashMap<LayerId, usize> =
        old.iter().enumerate().map(|(i, layer)| (layer.id(), i)).collect();
    let new_index: HashMap<LayerId, usize> =
        new.iter().enumerate().map(|(i, layer)| (layer.id(), i)).collect();
    let moved = reordered(old, new, &new_index);

    let mut damage = Bounds::Empty;
    for (i, layer) in old.iter().enumerate() {
        if !new_index.contains_key(&layer.id()) || moved.contains(&layer.id()) {
            damage = damage.union(&damage_at(old, i));
        }
    }
    for (i, layer) in new.iter().enumerate() {
        let id = layer.id();
        let Some(&j) = old_index.get(&id) else {
            damage = damage.union(&damage_at(new, i));
            continue;
        };
        if moved.contains(&id) {
            damage = damage.union(&damage_at(new, i));
            continue;
        }
        let previous = &old.layers()[j];
        if Arc::ptr_eq(previous, layer) {
            continue;
        }
        let changed = previous.base().revision() != layer.base().revision()
            || layer.base().has_dynamic_params();
        if changed {
            damage = damage.union(&damage_at(old, j)).union(&damage_at(new, i));
        } else if let (Some(a), Some(b)) = (previous.inline_canvas(), layer.inline_canvas()) {
            let inner = canvas_damage(a, b);
            let inner = match layer.get_transform() {
                Some(transform) => transform.transform_bounds(&inner),
                None => inner,
            };
            damage = damage.union(&lift(inner, &new.layers()[..i]));
        }
    }
    trace!("damage between {} and {}: {:?}", old.id(), new.id(), damage);
    damage
}

/// Ids of layers present in both canvases whose relative order changed.
fn reordered(old: &Canvas, new: &Canvas, new_index: &HashMap<LayerId, usize>) -> Vec<LayerId> {
    let common_old: Vec<LayerId> = old
        .iter()
        .map(|layer| layer.id())
        .filter(|id| new_index.contains_key(id))
        .collect();
    let old_ids: std::collections::HashSet<LayerId> = common_old.iter().copied().collect();
    let common_new: Vec<LayerId> = new
        .iter()
        .map(|layer| layer.id())
        .filter(|id| old_ids.contains(id))
        .collect();
    common_old
        .iter()
        .zip(&common_new)
        .filter(|(a, b)| a != b)
        .flat_map(|(a, b)| [*a, *b])
        .collect()
}

/// Damage from the layer at `index` of `canvas`, in `canvas` coordinates.
fn damage_at(canvas: &Canvas, index: usize) -> Bounds {
    let layers = canvas.layers();
    let effect = effect_bounds(&layers[index], Context::new(&layers[index + 1..]));
    lift(effect, &layers[..index])
}

/// Everything `layer` can change when composited over `beneath`.
fn effect_bounds(layer: &LayerRef, beneath: Context<'_>) -> Bounds {
    if !layer.is_active() {
        Bounds::Empty
    } else if layer.is_overlay() {
        layer.bounding_rect()
    } else {
        let below = beneath.get_full_bounding_rect();
        layer.combine_bounds(below).union(&below)
    }
}

/// Map damage beneath `above` to the coordinates at the top of the canvas.
fn lift(damage: Bounds, above: &[LayerRef]) -> Bounds {
    above
        .iter()
        .rev()
        .filter(|layer| layer.is_active())
        .fold(damage, |damage, layer| {
            if damage.is_empty() || layer.is_overlay() || layer.inline_canvas().is_some() {
                damage
            } else if let Some(transform) = layer.get_transform() {
                transform.transform_bounds(&damage)
            } else {
                layer.combine_bounds(damage)
            }
        })
}
