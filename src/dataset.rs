use crate::util::scale_range;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis bound: fixed, or derived from the data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    Auto,
    Fixed(f64),
}

/// A value series normalized into the unit square for charting. The y range
/// can be pinned so several series share an axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub values: Vec<f64>,
    pub y_min: f64,
    pub y_max: f64,
    pub points: Vec<Point>,
}

impl Dataset {
    pub fn new(values: Vec<f64>, y_min: Bound, y_max: Bound) -> Self {
        let y_min = match y_min {
            Bound::Fixed(v) => v,
            Bound::Auto => values.iter().copied().fold(f64::INFINITY, f64::min),
        };

        let y_max = match y_max {
            Bound::Fixed(v) => v,
            Bound::Auto => values.iter().copied().fold(0.0, f64::max),
        };

        let x_count = values.len();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let x = if x_count > 1 {
                    scale_range(0.0, (x_count - 1) as f64, 0.0, 1.0, i as f64)
                } else {
                    0.0
                };
                let y = scale_range(y_min, y_max, 0.0, 1.0, value);

                Point { x, y }
            })
            .collect();

        Self {
            values,
            y_min,
            y_max,
            points,
        }
    }
}
