use crate::frame::FrameError;

/// Leading columns of every detector row: cx, cy, w, h, objectness.
pub const BOX_COLUMNS: usize = 5;

/// Raw detector tensor for one frame, flattened to `rows x row_width`.
///
/// Each row is `[cx, cy, w, h, objectness, class_0 .. class_K-1]` in model
/// input space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOutput {
    data: Vec<f32>,
    row_width: usize,
}

impl RawOutput {
    /// Build from an explicit row width.
    pub fn new(data: Vec<f32>, row_width: usize) -> Result<Self, FrameError> {
        if row_width == 0 {
            return Err(FrameError::OutputShape("row width must be > 0".to_string()));
        }
        if data.len() % row_width != 0 {
            return Err(FrameError::OutputShape(format!(
                "{} values do not divide into rows of {}",
                data.len(),
                row_width
            )));
        }
        Ok(Self { data, row_width })
    }

    /// Build from a backend tensor shape: `[N, W]` or `[1, N, W]`.
    pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self, FrameError> {
        let (rows, row_width) = match shape {
            [rows, width] => (*rows, *width),
            [1, rows, width] => (*rows, *width),
            other => {
                return Err(FrameError::OutputShape(format!(
                    "unsupported output shape {:?}",
                    other
                )))
            }
        };
        let expected = rows.checked_mul(row_width).ok_or_else(|| {
            FrameError::OutputShape(format!("output shape {:?} overflows", shape))
        })?;
        if expected != data.len() {
            return Err(FrameError::OutputShape(format!(
                "shape {:?} expects {} values, received {}",
                shape,
                expected,
                data.len()
            )));
        }
        Self::new(data, row_width)
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, FrameError> {
        let Some(first) = rows.first() else {
            return Ok(Self::default());
        };
        let row_width = first.len();
        if rows.iter().any(|row| row.len() != row_width) {
            return Err(FrameError::OutputShape("ragged detector rows".to_string()));
        }
        Self::new(rows.concat(), row_width)
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Number of class-score columns per row.
    pub fn class_count(&self) -> usize {
        self.row_width.saturating_sub(BOX_COLUMNS)
    }

    pub fn len(&self) -> usize {
        if self.row_width == 0 {
            0
        } else {
            self.data.len() / self.row_width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.chunks_exact(self.row_width.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_batched_and_flat_shapes() {
        let raw = RawOutput::from_shape(&[1, 2, 7], vec![0.0; 14]).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.class_count(), 2);

        let raw = RawOutput::from_shape(&[3, 6], vec![0.0; 18]).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.rows().count(), 3);
    }

    #[test]
    fn rejects_inconsistent_shapes() {
        assert!(RawOutput::from_shape(&[1, 2, 7], vec![0.0; 13]).is_err());
        assert!(RawOutput::from_shape(&[2, 1, 7], vec![0.0; 14]).is_err());
        assert!(RawOutput::from_shape(&[7], vec![0.0; 7]).is_err());
        assert!(RawOutput::new(vec![0.0; 10], 3).is_err());
        assert!(RawOutput::from_rows(&[vec![0.0; 6], vec![0.0; 7]]).is_err());
    }

    #[test]
    fn empty_rows_make_empty_output() {
        let raw = RawOutput::from_rows(&[]).unwrap();
        assert!(raw.is_empty());
        assert_eq!(raw.rows().count(), 0);
    }
}
