//! Level identity inside a [`CoordinateMapManager`](crate::CoordinateMapManager).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one coordinate level: a tensor stride plus a free-form tag.
///
/// Two levels may share a stride (two independently pruned levels, for
/// instance); the tag keeps them apart. Equality and ordering are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrideKey {
    tensor_stride: Vec<u32>,
    tag: String,
}

impl StrideKey {
    pub fn new(tensor_stride: Vec<u32>, tag: impl Into<String>) -> Self {
        Self {
            tensor_stride,
            tag: tag.into(),
        }
    }

    /// Key of an input level: all-ones stride and an empty tag.
    pub fn unit(dimension: usize) -> Self {
        Self::new(vec![1; dimension], "")
    }

    pub fn tensor_stride(&self) -> &[u32] {
        &self.tensor_stride
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Spatial dimension the key describes.
    pub fn dimension(&self) -> usize {
        self.tensor_stride.len()
    }

    pub(crate) fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self::new(self.tensor_stride.clone(), tag)
    }
}

impl fmt::Display for StrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stride={:?}", self.tensor_stride)?;
        if !self.tag.is_empty() {
            write!(f, "#{}", self.tag)?;
        }
        Ok(())
    }
}

/// How a level came to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Created from raw coordinates.
    Inserted,
    /// Spatial components floor-divided by `stride`.
    Strided { source: StrideKey, stride: Vec<u32> },
    /// Subset selected by a boolean mask.
    Pruned { source: StrideKey },
    /// Deduplicated union of several levels of equal stride.
    Unioned { sources: Vec<StrideKey> },
    /// One row per batch index.
    Origin { source: StrideKey },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Inserted => write!(f, "inserted"),
            Provenance::Strided { source, stride } => {
                write!(f, "strided {stride:?} from {source}")
            }
            Provenance::Pruned { source } => write!(f, "pruned from {source}"),
            Provenance::Unioned { sources } => {
                write!(f, "union of [")?;
                for (i, source) in sources.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{source}")?;
                }
                write!(f, "]")
            }
            Provenance::Origin { source } => write!(f, "origin of {source}"),
        }
    }
}
