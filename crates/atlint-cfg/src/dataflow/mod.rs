//! Block-level dataflow passes.
//!
//! The backward pass computes per-register access and save state at block
//! entry and flags dead stores. The forward pass propagates the set of
//! possible condition codes and classifies conditional branches.

use tracing::{trace, trace_span};

use atlint_isa::BlockId;

use crate::Code;

mod backward;
mod forward;

/// Run both passes from every subroutine root.
pub(crate) fn run(code: &mut Code) {
    let roots: Vec<BlockId> = code.subroutines.iter().filter_map(|s| s.block).collect();
    {
        let _span = trace_span!("backward").entered();
        for &root in &roots {
            backward::analyze(code, root);
        }
    }
    let mut changed = 0usize;
    {
        let _span = trace_span!("forward").entered();
        for &root in &roots {
            changed += forward::analyze(code, root);
        }
    }
    trace!(roots = roots.len(), changed, "dataflow complete");
}
