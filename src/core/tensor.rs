//! Tensor aliases used at the boundary between image processing and inference.

/// 2D f32 tensor, e.g. `[batch, features]`.
pub type Tensor2D = ndarray::Array2<f32>;
/// 3D f32 tensor, e.g. `[batch, channels, anchors]`.
pub type Tensor3D = ndarray::Array3<f32>;
/// 4D f32 tensor in NCHW or NHWC layout.
pub type Tensor4D = ndarray::Array4<f32>;

/// A named model output with its shape and flattened row-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedOutput {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NamedOutput {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }

    /// Size of the last dimension, or 0 for scalars.
    pub fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(0)
    }

    /// Number of elements implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Finds the output whose last dimension equals `dim`.
pub fn find_by_last_dim(outputs: &[NamedOutput], dim: usize) -> Option<&NamedOutput> {
    outputs.iter().find(|o| o.last_dim() == dim)
}

/// Finds the output with exactly `count` elements.
pub fn find_by_element_count(outputs: &[NamedOutput], count: usize) -> Option<&NamedOutput> {
    outputs.iter().find(|o| o.element_count() == count)
}
