//! Structural diff between two reconstructed methods.
//!
//! Handles are issued in call order by the reference builder, so two replays
//! that made the same calls carry the same handles and can be compared
//! section by section. The first difference is reported.

use crate::state::{Op, ReconstructedMethod};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Part of the method a divergence was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Name, file, line, return type, parameters, locals or functions
    Shape,
    /// Type dictionary
    Types,
    /// Builder tree
    Builders,
    /// Operation sequence
    Ops,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Shape => "shape",
            Self::Types => "types",
            Self::Builders => "builders",
            Self::Ops => "ops",
        };
        f.write_str(s)
    }
}

/// First point at which two methods differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    /// Section
    pub section: Section,
    /// Index within the section
    pub index: usize,
    /// Rendering of the left side, `None` if it ran out
    pub left: Option<String>,
    /// Rendering of the right side, `None` if it ran out
    pub right: Option<String>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |s: &Option<String>| s.clone().unwrap_or_else(|| "<missing>".to_string());
        write!(
            f,
            "{} #{}: {} vs {}",
            self.section,
            self.index,
            side(&self.left),
            side(&self.right)
        )
    }
}

/// Result of comparing two methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Whether the methods are structurally equivalent
    pub equivalent: bool,
    /// Where they first differ
    pub divergence: Option<Divergence>,
}

/// Counts on both sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Ops on the left
    pub left_ops: usize,
    /// Ops on the right
    pub right_ops: usize,
    /// Builders on the left
    pub left_builders: usize,
    /// Builders on the right
    pub right_builders: usize,
    /// Leading ops the two sides agree on
    pub common_prefix: usize,
}

/// Diff report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Overall result
    pub result: DiffResult,
    /// Summary statistics
    pub summary: DiffSummary,
}

/// Engine for comparing two replays
pub struct DiffEngine;

impl DiffEngine {
    /// Create a new diff engine (unit struct)
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compare two methods
    #[must_use]
    pub fn diff(&self, left: &ReconstructedMethod, right: &ReconstructedMethod) -> DiffReport {
        let divergence = Self::shape(left, right)
            .or_else(|| first_difference(Section::Types, &left.types, &right.types, |t| format!("{:?}", t)))
            .or_else(|| {
                first_difference(Section::Builders, &left.builders, &right.builders, |b| {
                    format!("{:?}", b)
                })
            })
            .or_else(|| first_difference(Section::Ops, &left.ops, &right.ops, Op::to_string));

        let summary = DiffSummary {
            left_ops: left.ops.len(),
            right_ops: right.ops.len(),
            left_builders: left.builders.len(),
            right_builders: right.builders.len(),
            common_prefix: left
                .ops
                .iter()
                .zip(&right.ops)
                .take_while(|(l, r)| l == r)
                .count(),
        };

        DiffReport {
            result: DiffResult {
                equivalent: divergence.is_none(),
                divergence,
            },
            summary,
        }
    }

    /// Check whether two methods are structurally equivalent
    #[must_use]
    pub fn is_equivalent(&self, left: &ReconstructedMethod, right: &ReconstructedMethod) -> bool {
        self.diff(left, right).result.equivalent
    }

    fn shape(left: &ReconstructedMethod, right: &ReconstructedMethod) -> Option<Divergence> {
        let fields = [
            ("name", format!("{:?}", left.name), format!("{:?}", right.name)),
            ("file", format!("{:?}", left.file), format!("{:?}", right.file)),
            ("line", format!("{:?}", left.line), format!("{:?}", right.line)),
            (
                "return type",
                format!("{:?}", left.return_type),
                format!("{:?}", right.return_type),
            ),
            (
                "parameters",
                format!("{:?}", left.parameters),
                format!("{:?}", right.parameters),
            ),
            ("locals", format!("{:?}", left.locals), format!("{:?}", right.locals)),
            (
                "functions",
                format!("{:?}", left.functions),
                format!("{:?}", right.functions),
            ),
            (
                "locals complete",
                left.locals_complete.to_string(),
                right.locals_complete.to_string(),
            ),
        ];

        fields
            .into_iter()
            .enumerate()
            .find(|(_, (_, l, r))| l != r)
            .map(|(index, (field, l, r))| Divergence {
                section: Section::Shape,
                index,
                left: Some(format!("{} {}", field, l)),
                right: Some(format!("{} {}", field, r)),
            })
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn first_difference<T: PartialEq>(
    section: Section,
    left: &[T],
    right: &[T],
    render: impl Fn(&T) -> String,
) -> Option<Divergence> {
    let len = left.len().max(right.len());
    (0..len)
        .find(|&i| left.get(i) != right.get(i))
        .map(|index| Divergence {
            section,
            index,
            left: left.get(index).map(&render),
            right: right.get(index).map(&render),
        })
}
