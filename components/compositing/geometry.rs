/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Transform helpers shared by the draw-property resolver and the
//! raster-scale policy.
//!
//! Degenerate inputs (non-invertible transforms, unprojectable rects) never
//! fail; they produce empty rects or fall back to a caller-supplied value,
//! since they occur routinely mid-animation.

use euclid::default::Vector2D as UntypedVector2D;
use euclid::{Point2D, Rect, Size2D, Transform3D};

use crate::units::{DeviceIntRect, DevicePixel, ScreenTransform};

/// Tolerance for [`approximately_equal`]. Screen-space transforms of layers
/// that have not moved still accumulate float noise across commits.
const TRANSFORM_EPSILON: f32 = 1e-4;

/// Whether the transform carries a perspective component. With row-vector
/// convention, perspective lives in the fourth column.
pub fn has_perspective<Src, Dst>(transform: &Transform3D<f32, Src, Dst>) -> bool {
    transform.m14 != 0.0 || transform.m24 != 0.0 || transform.m34 != 0.0 || transform.m44 != 1.0
}

/// An approximate upper bound for the scale a transform applies, derived from
/// the image of the unit square. Perspective transforms have no single scale,
/// so an approximation is the best available answer.
pub fn approximate_max_scale<Src, Dst>(transform: &Transform3D<f32, Src, Dst>) -> f32 {
    let unit = Rect::new(Point2D::origin(), Size2D::new(1.0, 1.0));
    match transform.outer_transformed_rect(&unit) {
        Some(mapped) => mapped.size.width.max(mapped.size.height),
        None => 1.0,
    }
}

/// The per-axis scale components of a 2D-compatible transform, or
/// `(fallback, fallback)` when perspective makes per-axis scales meaningless.
pub fn transform_2d_scale_components<Src, Dst>(
    transform: &Transform3D<f32, Src, Dst>,
    fallback: f32,
) -> UntypedVector2D<f32> {
    if has_perspective(transform) {
        return UntypedVector2D::new(fallback, fallback);
    }
    let x_scale = (transform.m11 * transform.m11 + transform.m12 * transform.m12).sqrt();
    let y_scale = (transform.m21 * transform.m21 + transform.m22 * transform.m22).sqrt();
    UntypedVector2D::new(x_scale, y_scale)
}

/// Maps `rect` through `transform` and returns the enclosing integer rect in
/// the destination space. Unprojectable input maps to the empty rect.
pub fn map_enclosing_clipped_rect<Src>(
    transform: &Transform3D<f32, Src, DevicePixel>,
    rect: Rect<f32, Src>,
) -> DeviceIntRect {
    match transform.outer_transformed_rect(&rect) {
        Some(mapped) => mapped.round_out().cast::<i32>(),
        None => DeviceIntRect::zero(),
    }
}

/// The 2D translation component of a transform.
pub fn to_2d_translation(transform: &ScreenTransform) -> UntypedVector2D<f32> {
    UntypedVector2D::new(transform.m41, transform.m42)
}

/// Componentwise comparison with a small tolerance.
pub fn approximately_equal(a: &ScreenTransform, b: &ScreenTransform) -> bool {
    let a = a.to_array();
    let b = b.to_array();
    a.iter()
        .zip(b.iter())
        .all(|(a, b)| (a - b).abs() <= TRANSFORM_EPSILON)
}

/// Whether a node-to-parent transform is a pure 2D translation with integral
/// components. Feeds LCD-text eligibility.
pub fn is_2d_integer_translation<Src, Dst>(transform: &Transform3D<f32, Src, Dst>) -> bool {
    let identity_rotation_and_scale = transform.m11 == 1.0 &&
        transform.m12 == 0.0 &&
        transform.m13 == 0.0 &&
        transform.m14 == 0.0 &&
        transform.m21 == 0.0 &&
        transform.m22 == 1.0 &&
        transform.m23 == 0.0 &&
        transform.m24 == 0.0 &&
        transform.m31 == 0.0 &&
        transform.m32 == 0.0 &&
        transform.m33 == 1.0 &&
        transform.m34 == 0.0 &&
        transform.m43 == 0.0 &&
        transform.m44 == 1.0;
    identity_rotation_and_scale &&
        transform.m41.fract() == 0.0 &&
        transform.m42.fract() == 0.0
}

#[cfg(test)]
mod tests {
    use euclid::default::Transform3D as UntypedTransform3D;

    use super::*;

    #[test]
    fn scale_components_of_plain_scale() {
        let transform = UntypedTransform3D::scale(2.0, 3.0, 1.0);
        let components = transform_2d_scale_components(&transform, 1.0);
        assert_eq!(components, UntypedVector2D::new(2.0, 3.0));
    }

    #[test]
    fn scale_components_fall_back_under_perspective() {
        let mut transform = UntypedTransform3D::identity();
        transform.m34 = -0.01;
        let components = transform_2d_scale_components(&transform, 7.0);
        assert_eq!(components, UntypedVector2D::new(7.0, 7.0));
    }

    #[test]
    fn integer_translation_detection() {
        assert!(is_2d_integer_translation(
            &UntypedTransform3D::translation(3.0, -4.0, 0.0)
        ));
        assert!(!is_2d_integer_translation(
            &UntypedTransform3D::translation(0.5, 0.0, 0.0)
        ));
        assert!(!is_2d_integer_translation(&UntypedTransform3D::scale(
            2.0, 2.0, 1.0
        )));
    }

    #[test]
    fn approximate_max_scale_of_rotation_stays_bounded() {
        let transform = UntypedTransform3D::scale(4.0, 2.0, 1.0);
        assert_eq!(approximate_max_scale(&transform), 4.0);
    }
}
