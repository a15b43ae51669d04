use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{CorrTrackError, Result};
use crate::filter::Filter;
use crate::pixel_buffer::PixelBuffer;

/// A `window_w x window_h` grid of unnormalised cross-correlation values,
/// scoped to a single (frame, anchor) pair. Row-major, same layout as
/// [`PixelBuffer`].
#[derive(Clone, Debug)]
pub struct CorrelationMap {
    data: Array2<f64>,
}

impl CorrelationMap {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Value at window position `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[[j, i]]
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }
}

/// Computes the unnormalised 2-D cross-correlation of a [`Filter`] against a
/// search window anchored at an integer-pixel point.
///
/// No edge replication, no wrap-around: if the outer rectangle consumed by
/// the computation escapes the image, the call fails with
/// [`CorrTrackError::WindowOutOfBounds`].
pub fn correlate(
    image: &PixelBuffer,
    anchor_x: i64,
    anchor_y: i64,
    window_w: u32,
    window_h: u32,
    filter: &Filter,
) -> Result<CorrelationMap> {
    let ww = window_w as i64;
    let wh = window_h as i64;
    let fw = filter.width() as i64;
    let fh = filter.height() as i64;

    let i_min = anchor_x - ww / 2 - fw / 2;
    let j_min = anchor_y - wh / 2 - fh / 2;
    let i_max = i_min + (ww - 1) + (fw - 1);
    let j_max = j_min + (wh - 1) + (fh - 1);

    if i_min < 0
        || j_min < 0
        || i_max >= image.width() as i64
        || j_max >= image.height() as i64
    {
        return Err(CorrTrackError::WindowOutOfBounds);
    }

    let base_x = anchor_x - ww / 2 - fw / 2;
    let base_y = anchor_y - wh / 2 - fh / 2;

    let mut data = Array2::<f64>::zeros((window_h as usize, window_w as usize));

    let area = (window_w as usize) * (window_h as usize);
    if area >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f64>> = (0..window_h as usize)
            .into_par_iter()
            .map(|j| correlate_row(image, filter, base_x, base_y, j, window_w as usize))
            .collect();
        for (j, row) in rows.into_iter().enumerate() {
            for (i, v) in row.into_iter().enumerate() {
                data[[j, i]] = v;
            }
        }
    } else {
        for j in 0..window_h as usize {
            let row = correlate_row(image, filter, base_x, base_y, j, window_w as usize);
            for (i, v) in row.into_iter().enumerate() {
                data[[j, i]] = v;
            }
        }
    }

    Ok(CorrelationMap { data })
}

fn correlate_row(
    image: &PixelBuffer,
    filter: &Filter,
    base_x: i64,
    base_y: i64,
    j: usize,
    window_w: usize,
) -> Vec<f64> {
    let fw = filter.width();
    let fh = filter.height();
    (0..window_w)
        .map(|i| {
            let mut sum = 0.0;
            for fy in 0..fh {
                let img_y = (base_y + j as i64 + fy as i64) as u32;
                for fx in 0..fw {
                    let img_x = (base_x + i as i64 + fx as i64) as u32;
                    sum += image.as_f64(img_x, img_y) * filter.value(fx, fy);
                }
            }
            sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn identity_filter() -> Filter {
        crate::filter::Filter::load_from_rows(&[vec![1.0]])
    }

    #[test]
    fn single_pixel_peak_matches_identity_filter() {
        let mut img = PixelBuffer::new(5, 5, 8);
        img.set_sample(2, 2, 255).unwrap();
        let filter = identity_filter();
        let map = correlate(&img, 2, 2, 3, 3, &filter).unwrap();
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 3);
        assert_abs_diff_eq!(map.get(1, 1), 255.0);
        assert_abs_diff_eq!(map.get(0, 0), 0.0);
    }

    #[test]
    fn window_out_of_bounds_at_image_edge() {
        let img = PixelBuffer::new(5, 5, 8);
        let filter = identity_filter();
        let result = correlate(&img, 0, 0, 5, 5, &filter);
        assert!(matches!(result, Err(CorrTrackError::WindowOutOfBounds)));
    }

    #[test]
    fn shifted_peak_is_offset_in_map() {
        let mut img = PixelBuffer::new(5, 5, 8);
        img.set_sample(3, 2, 255).unwrap();
        let filter = identity_filter();
        let map = correlate(&img, 2, 2, 3, 3, &filter).unwrap();
        assert_abs_diff_eq!(map.get(2, 1), 255.0);
    }
}
