/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tree-wide policy knobs, supplied by the embedder at startup.

use serde::{Deserialize, Serialize};

use crate::units::LayerIntSize;

/// Settings shared by every layer of a tree.
///
/// The raster-scale caps are tuning values, not invariants: the defaults
/// reproduce well-tested production behavior, but embedders may trade memory
/// against fidelity by adjusting them.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct CompositorSettings {
    /// The tile size raster coverage is measured in.
    pub default_tile_size: LayerIntSize,
    pub can_use_lcd_text: bool,
    pub layers_always_allowed_lcd_text: bool,
    /// Cap on the ideal raster scale of perspective-transformed layers:
    /// rastering the layer must need at most this many default tiles per
    /// dimension.
    pub max_tiles_to_cover_layer_dimension: i32,
    /// Cap on the ratio between the two axes of an anisotropic raster scale.
    pub max_raster_scale_ratio: f32,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        CompositorSettings {
            default_tile_size: LayerIntSize::new(256, 256),
            can_use_lcd_text: true,
            layers_always_allowed_lcd_text: false,
            max_tiles_to_cover_layer_dimension: 5,
            max_raster_scale_ratio: 5.0,
        }
    }
}
