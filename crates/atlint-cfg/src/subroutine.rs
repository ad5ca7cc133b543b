//! Traversal roots: the main routine and annotated subroutines.

use atlint_isa::{BlockId, InstrId};

/// A routine traced from its own entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subroutine {
    /// Address of the entry instruction.
    pub id: u32,
    pub entry: InstrId,
    /// Label naming the entry, if any.
    pub name: Option<String>,
    /// The program entry rather than an annotated subroutine.
    pub is_main: bool,
    /// Entry block, once blocks are built.
    pub block: Option<BlockId>,
    /// Other routines that reach code owned by this one, or whose code
    /// this one reaches. Sorted, without duplicates.
    pub overlaps: Vec<u32>,
}

impl Subroutine {
    pub(crate) fn new(id: u32, entry: InstrId, name: Option<String>, is_main: bool) -> Self {
        Self {
            id,
            entry,
            name,
            is_main,
            block: None,
            overlaps: Vec::new(),
        }
    }

    /// Display name: the entry label or the entry address.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:#x}", self.id))
    }
}
