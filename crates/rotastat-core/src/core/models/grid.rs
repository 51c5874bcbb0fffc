/// Tolerance, in degrees, for deciding a parsed angle sits on a grid node.
pub const ON_GRID_TOLERANCE: f64 = 1e-3;

/// Canonical backbone torsion grid spacing, in degrees.
pub const BACKBONE_STEP: f64 = 10.0;
/// Coarser spacing used by reduced-resolution libraries.
pub const BACKBONE_STEP_REDUCED: f64 = 30.0;

/// A periodic angular axis: `bins` nodes spaced `step` degrees apart,
/// starting at `start` and wrapping after `step * bins` degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridAxis {
    pub start: f64,
    pub step: f64,
    pub bins: usize,
}

impl GridAxis {
    /// A full 360-degree axis starting at -180.
    pub fn full_circle(bins: usize) -> Self {
        Self {
            start: -180.0,
            step: 360.0 / bins as f64,
            bins,
        }
    }

    pub fn period(&self) -> f64 {
        self.step * self.bins as f64
    }

    /// Wraps an angle into `[start, start + period)`.
    pub fn wrap(&self, angle: f64) -> f64 {
        let period = self.period();
        let wrapped = self.start + (angle - self.start).rem_euclid(period);
        if wrapped >= self.start + period {
            self.start
        } else {
            wrapped
        }
    }

    pub fn node(&self, index: usize) -> f64 {
        self.start + self.step * index as f64
    }

    /// The node index of an on-grid angle, or `None` if the angle does not
    /// sit on a node within [`ON_GRID_TOLERANCE`].
    pub fn nearest_bin(&self, angle: f64) -> Option<usize> {
        let offset = (self.wrap(angle) - self.start) / self.step;
        let nearest = offset.round();
        if (offset - nearest).abs() * self.step > ON_GRID_TOLERANCE {
            return None;
        }
        Some(nearest as usize % self.bins)
    }

    /// The cell containing an angle: the lower node index and the fractional
    /// position within the cell, in `[0, 1)`.
    pub fn locate(&self, angle: f64) -> (usize, f64) {
        let offset = (self.wrap(angle) - self.start) / self.step;
        let mut lower = offset.floor() as usize;
        let mut fraction = offset - lower as f64;
        if lower >= self.bins {
            lower = 0;
            fraction = 0.0;
        }
        (lower, fraction)
    }
}

/// The backbone torsion axes for an `n`-dimensional table.
pub fn backbone_axes(n: usize, reduced_resolution: bool) -> Vec<GridAxis> {
    let step = if reduced_resolution {
        BACKBONE_STEP_REDUCED
    } else {
        BACKBONE_STEP
    };
    let bins = (360.0 / step) as usize;
    vec![
        GridAxis {
            start: -180.0,
            step,
            bins,
        };
        n
    ]
}

/// Row-major storage of one value per node of an n-dimensional periodic grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicGrid {
    axes: Vec<GridAxis>,
    data: Vec<f64>,
}

impl PeriodicGrid {
    pub fn zeros(axes: Vec<GridAxis>) -> Self {
        let len = axes.iter().map(|a| a.bins).product();
        Self {
            axes,
            data: vec![0.0; len],
        }
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    pub fn node_count(&self) -> usize {
        self.data.len()
    }

    /// Distance between consecutive indices of one dimension, with the last
    /// dimension varying fastest.
    pub fn stride(&self, dim: usize) -> usize {
        self.axes[dim + 1..].iter().map(|a| a.bins).product()
    }

    pub fn offset(&self, indices: &[usize]) -> usize {
        debug_assert_eq!(indices.len(), self.axes.len());
        let mut offset = 0;
        for (axis, &index) in self.axes.iter().zip(indices) {
            debug_assert!(index < axis.bins);
            offset = offset * axis.bins + index;
        }
        offset
    }

    pub fn get(&self, indices: &[usize]) -> f64 {
        self.data[self.offset(indices)]
    }

    pub fn set(&mut self, indices: &[usize], value: f64) {
        let offset = self.offset(indices);
        self.data[offset] = value;
    }

    pub fn get_flat(&self, offset: usize) -> f64 {
        self.data[offset]
    }

    pub fn set_flat(&mut self, offset: usize, value: f64) {
        self.data[offset] = value;
    }

    /// A grid of the same shape with every value transformed.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            axes: self.axes.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Iterates every multi-index of the given dimension sizes in row-major
/// order, last dimension fastest.
pub fn each_index(dims: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let total: usize = dims.iter().product();
    (0..total).map(move |mut flat| {
        let mut indices = vec![0; dims.len()];
        for (slot, &size) in indices.iter_mut().zip(dims).rev() {
            *slot = flat % size;
            flat /= size;
        }
        indices
    })
}
