use crate::geometry::alias::Vector2d;
use cgmath::{InnerSpace, Matrix2, Matrix4, Rad, SquareMatrix};

pub type Affine = Matrix4<f32>;

/// Row-major 3x4 words, the layout of `Float3x4` parameters.
pub type AffineRows = [f32; 12];

/// Row-major 2x3 words, the block layout of `Srt2d` parameters.
pub type Affine2dRows = [f32; 6];

#[must_use]
pub fn affine_from_rows(rows: &AffineRows) -> Affine {
    Affine::new(
        rows[0], rows[4], rows[8], 0.0,
        rows[1], rows[5], rows[9], 0.0,
        rows[2], rows[6], rows[10], 0.0,
        rows[3], rows[7], rows[11], 1.0,
    )
}

/// Drops the projective row.
#[must_use]
pub fn affine_to_rows(matrix: &Affine) -> AffineRows {
    [
        matrix.x.x, matrix.y.x, matrix.z.x, matrix.w.x,
        matrix.x.y, matrix.y.y, matrix.z.y, matrix.w.y,
        matrix.x.z, matrix.y.z, matrix.z.z, matrix.w.z,
    ]
}

/// Largest stretch the linear part applies along any basis axis.
#[must_use]
pub(crate) fn max_axis_scale(matrix: &Affine) -> f32 {
    [matrix.x, matrix.y, matrix.z]
        .iter()
        .map(|column| column.truncate().magnitude())
        .fold(0.0, f32::max)
}

/// Scale first, then rotation, then translation.
#[must_use]
pub(crate) fn srt2d_to_rows(scale: Vector2d, rotation: Rad<f32>, translation: Vector2d) -> Affine2dRows {
    let linear = Matrix2::from_angle(rotation) * Matrix2::from_diagonal(scale);
    [
        linear.x.x, linear.y.x, translation.x,
        linear.x.y, linear.y.y, translation.y,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::alias::{Point, Vector};
    use cgmath::Transform;
    use float_cmp::assert_approx_eq;

    const SHUFFLED_ROWS: AffineRows = [
        1.0, 2.0, 3.0, 4.0,
        5.0, 6.0, 7.0, 8.0,
        9.0, 10.0, 11.0, 12.0,
    ];

    #[test]
    fn test_rows_survive_conversion() {
        let system_under_test = affine_from_rows(&SHUFFLED_ROWS);

        assert_eq!(affine_to_rows(&system_under_test), SHUFFLED_ROWS);
    }

    #[test]
    fn test_rows_are_translation_last() {
        let translation = Affine::from_translation(Vector::new(4.0, 8.0, 12.0));

        let rows = affine_to_rows(&translation);

        assert_eq!([rows[3], rows[7], rows[11]], [4.0, 8.0, 12.0]);
        assert_eq!(affine_from_rows(&rows).transform_point(Point::new(1.0, 1.0, 1.0)), Point::new(5.0, 9.0, 13.0));
    }

    #[test]
    fn test_max_axis_scale() {
        let system_under_test = Affine::from_nonuniform_scale(2.0, -5.0, 3.0);

        assert_approx_eq!(f32, max_axis_scale(&system_under_test), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_srt2d_quarter_turn() {
        let rows = srt2d_to_rows(Vector2d::new(2.0, 3.0), Rad(std::f32::consts::FRAC_PI_2), Vector2d::new(5.0, 7.0));

        let expected = [0.0, -3.0, 5.0, 2.0, 0.0, 7.0];
        for (actual, expected) in rows.iter().zip(expected.iter()) {
            assert_approx_eq!(f32, *actual, *expected, epsilon = 1e-6);
        }
    }
}
