//! Graph pass contract.

use graphtag_core::Graph;

use crate::error::AvoidResult;

/// A unit of work run over a graph snapshot.
///
/// Returns whether the graph was rewritten. Tagging passes only touch group
/// metadata and always report `false`.
pub trait GraphPass {
    fn name(&self) -> &str;

    fn run_on_graph(&self, graph: &Graph) -> AvoidResult<bool>;
}
