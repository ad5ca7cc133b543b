//! Program model: statements, labels, sections and the analysis rounds.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, trace};

use atlint_isa::{
    BlockId, InstFlags, InstrId, Instruction, OpKind, ParsedLine, lexer::logical_lines,
    parse_line,
};

use crate::{AnalysisConfig, BasicBlock, ConfigError, Subroutine, block, dataflow, graph, reachability};

/// A named address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    /// Zero-based source line.
    pub line: u32,
    pub address: u32,
    /// Statement the label names, once linked.
    pub instruction: Option<InstrId>,
}

/// Where a `.data`, `.text` or `.end` marker sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionMark {
    pub line: u32,
    pub address: u32,
}

/// Program region a source line falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    /// Before the first section marker.
    BeforeData,
    Data,
    Text,
    AfterEnd,
}

/// Per-instruction analysis state compared between rounds.
type Fingerprint = Vec<(InstFlags, Option<u32>, Option<u32>)>;

/// A parsed and analyzed program.
#[derive(Clone, Debug)]
pub struct Code {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) labels: Vec<Label>,
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) subroutines: Vec<Subroutine>,
    /// First definition of each label name.
    label_index: FxHashMap<String, usize>,
    /// First storage-occupying statement at each address.
    address_index: FxHashMap<u32, InstrId>,
    /// Lines carrying the subroutine marker.
    pub(crate) marker_lines: Vec<u32>,
    data: Option<SectionMark>,
    text: Option<SectionMark>,
    end: Option<SectionMark>,
    pub(crate) entry: Option<InstrId>,
    rounds: usize,
    config: AnalysisConfig,
}

impl Code {
    /// Parse and analyze with the default configuration.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut code = Self::assemble(source, AnalysisConfig::default());
        code.analyze();
        code
    }

    /// Parse and analyze with a caller-supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error if `config` is unusable.
    pub fn with_config(source: &str, config: &AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut code = Self::assemble(source, config.clone());
        code.analyze();
        Ok(code)
    }

    fn assemble(source: &str, config: AnalysisConfig) -> Self {
        let _span = debug_span!("assemble").entered();
        let lines = logical_lines(source);
        let parsed: Vec<ParsedLine> = lines.par_iter().map(parse_line).collect();

        let mut code = Self {
            instructions: Vec::with_capacity(parsed.len()),
            labels: Vec::new(),
            blocks: Vec::new(),
            subroutines: Vec::new(),
            label_index: FxHashMap::default(),
            address_index: FxHashMap::default(),
            marker_lines: Vec::new(),
            data: None,
            text: None,
            end: None,
            entry: None,
            rounds: 0,
            config,
        };

        let mut cursor = 0u32;
        for (logical, line) in lines.iter().zip(parsed) {
            if let Some(name) = line.label {
                code.add_label(name, logical.line, cursor);
            }
            if let Some(instr) = line.instruction {
                cursor = code.add_instruction(instr, cursor);
            }
        }

        let marker = code.config.subroutine_marker.as_str();
        code.marker_lines = source
            .lines()
            .enumerate()
            .filter(|(_, text)| text.contains(marker))
            .filter_map(|(i, _)| u32::try_from(i).ok())
            .collect();

        code.link_labels();
        code.entry = code.find_entry();
        debug!(
            instructions = code.instructions.len(),
            labels = code.labels.len(),
            "assembled"
        );
        code
    }

    fn add_label(&mut self, name: String, line: u32, address: u32) {
        if !self.label_index.contains_key(&name) {
            self.label_index.insert(name.clone(), self.labels.len());
        }
        self.labels.push(Label { name, line, address, instruction: None });
    }

    /// Assign an address and latch section markers; returns the new cursor.
    fn add_instruction(&mut self, mut instr: Instruction, cursor: u32) -> u32 {
        let mark = SectionMark { line: instr.line, address: cursor };
        match instr.kind {
            OpKind::DirectiveData => {
                self.data.get_or_insert(mark);
            }
            OpKind::DirectiveText => {
                self.text.get_or_insert(mark);
            }
            OpKind::DirectiveEnd => {
                self.end.get_or_insert(mark);
            }
            OpKind::DirectiveAlign => {
                instr.size = instr.align.map_or(0, |n| (n - cursor % n) % n);
            }
            _ => {}
        }
        instr.address = cursor;
        if let Some(offset) = instr.target_offset() {
            instr.dest_addr =
                u32::try_from(i64::from(cursor).saturating_add(1).saturating_add(offset)).ok();
        }
        let next = cursor.saturating_add(instr.size);
        self.instructions.push(instr);
        next
    }

    /// Point each label at the storage-occupying statement at its address.
    ///
    /// Statements before `.data` never receive labels.
    fn link_labels(&mut self) {
        let floor = self.data.map(|d| d.line);
        for (i, instr) in self.instructions.iter().enumerate() {
            if instr.size == 0 || floor.is_some_and(|f| instr.line < f) {
                continue;
            }
            self.address_index.entry(instr.address).or_insert(InstrId(i));
        }
        for label in &mut self.labels {
            label.instruction = self.address_index.get(&label.address).copied();
        }
    }

    /// First executable statement after `.text`, or the first overall.
    fn find_entry(&self) -> Option<InstrId> {
        let start = self.text.map_or(0, |t| t.line);
        let stop = self.end.map_or(u32::MAX, |e| e.line);
        self.instructions
            .iter()
            .position(|i| i.is_code() && i.line >= start && i.line < stop)
            .map(InstrId)
    }

    // ============= Analysis rounds =============

    fn analyze(&mut self) {
        let _span = debug_span!("analyze").entered();
        let mut previous = self.fingerprint();
        for round in 1..=self.config.max_rounds {
            self.round();
            self.rounds = round;
            let current = self.fingerprint();
            if current == previous {
                break;
            }
            previous = current;
        }
        debug!(
            rounds = self.rounds,
            blocks = self.blocks.len(),
            subroutines = self.subroutines.len(),
            "analysis complete"
        );
    }

    /// Run one more round; returns true if any instruction's flags,
    /// subroutine or overlap changed.
    pub fn reanalyze(&mut self) -> bool {
        let before = self.fingerprint();
        self.round();
        self.rounds += 1;
        before != self.fingerprint()
    }

    fn round(&mut self) {
        self.reset_round();
        graph::link(self);
        if self.config.subroutine_checking {
            graph::mark_subroutines(self);
        }
        reachability::trace_all(self);
        block::build(self);
        dataflow::run(self);
        self.collect_overlaps();
        trace!(
            found = self
                .instructions
                .iter()
                .filter(|i| i.flags.contains(InstFlags::FOUND))
                .count(),
            "round complete"
        );
    }

    /// Clear per-round state; branch outcome flags persist into the next
    /// round's graph.
    fn reset_round(&mut self) {
        for instr in &mut self.instructions {
            instr.flags.remove(InstFlags::ROUND_LOCAL);
            instr.next = None;
            instr.jump_target = None;
            instr.block = None;
            instr.subroutine = None;
            instr.overlap = None;
        }
        self.blocks.clear();
        self.subroutines.clear();
    }

    fn fingerprint(&self) -> Fingerprint {
        self.instructions
            .iter()
            .map(|i| (i.flags, i.subroutine, i.overlap))
            .collect()
    }

    /// Record overlap on both routines involved.
    fn collect_overlaps(&mut self) {
        let index: FxHashMap<u32, usize> = self
            .subroutines
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        let mut pairs = Vec::new();
        for instr in &self.instructions {
            if let (Some(owner), Some(other)) = (instr.subroutine, instr.overlap) {
                if owner != other {
                    pairs.push((owner, other));
                }
            }
        }
        for (a, b) in pairs {
            if let Some(&i) = index.get(&a) {
                self.subroutines[i].overlaps.push(b);
            }
            if let Some(&i) = index.get(&b) {
                self.subroutines[i].overlaps.push(a);
            }
        }
        for sub in &mut self.subroutines {
            sub.overlaps.sort_unstable();
            sub.overlaps.dedup();
        }
    }

    // ============= Accessors =============

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[must_use]
    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0]
    }

    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    #[must_use]
    pub fn subroutines(&self) -> &[Subroutine] {
        &self.subroutines
    }

    /// Blocks from which `sub` can return.
    #[must_use]
    pub fn exits(&self, sub: &Subroutine) -> &[BlockId] {
        sub.block.map_or(&[][..], |b| self.blocks[b.0].exits.as_slice())
    }

    /// The routine traced from the program entry.
    #[must_use]
    pub fn main(&self) -> Option<&Subroutine> {
        self.subroutines.iter().find(|s| s.is_main)
    }

    #[must_use]
    pub const fn entry(&self) -> Option<InstrId> {
        self.entry
    }

    /// Rounds run so far.
    #[must_use]
    pub const fn rounds(&self) -> usize {
        self.rounds
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[must_use]
    pub const fn data_section(&self) -> Option<SectionMark> {
        self.data
    }

    #[must_use]
    pub const fn text_section(&self) -> Option<SectionMark> {
        self.text
    }

    #[must_use]
    pub const fn end_marker(&self) -> Option<SectionMark> {
        self.end
    }

    /// Statements parsed from `line`.
    pub fn instructions_on_line(&self, line: u32) -> impl Iterator<Item = (InstrId, &Instruction)> {
        self.instructions
            .iter()
            .enumerate()
            .filter(move |(_, i)| i.line == line)
            .map(|(i, instr)| (InstrId(i), instr))
    }

    /// Storage-occupying statement at `address`.
    #[must_use]
    pub fn instruction_at(&self, address: u32) -> Option<InstrId> {
        self.address_index.get(&address).copied()
    }

    // ============= Lookups =============

    /// Last label defined at `address`.
    #[must_use]
    pub fn find_label_by_address(&self, address: u32) -> Option<&Label> {
        self.labels.iter().rev().find(|l| l.address == address)
    }

    /// First label defined on `line`.
    #[must_use]
    pub fn find_label_by_line(&self, line: u32) -> Option<&Label> {
        self.labels.iter().find(|l| l.line == line)
    }

    /// First definition of `name`.
    #[must_use]
    pub fn find_label_by_name(&self, name: &str) -> Option<&Label> {
        self.label_index.get(name).map(|&i| &self.labels[i])
    }

    /// Region of the program a source line belongs to.
    ///
    /// Without any section marker the whole document counts as text.
    #[must_use]
    pub fn section_of_line(&self, line: u32) -> Section {
        if self.end.is_some_and(|e| line > e.line) {
            return Section::AfterEnd;
        }
        let latest = [(self.data, Section::Data), (self.text, Section::Text)]
            .into_iter()
            .filter_map(|(mark, section)| mark.map(|m| (m.line, section)))
            .filter(|(start, _)| *start <= line)
            .max_by_key(|(start, _)| *start);
        match latest {
            Some((_, section)) => section,
            None if self.data.is_none() && self.text.is_none() => Section::Text,
            None => Section::BeforeData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "\
.data
count: .long 3
msg:   .asciz \"hi\"
.text
main:
    movl count, %ecx
    ret
.end
";

    #[test]
    fn test_addresses_and_sections() {
        let code = Code::parse(PROGRAM);
        let count = code.find_label_by_name("count").unwrap();
        let msg = code.find_label_by_name("msg").unwrap();
        let main = code.find_label_by_name("main").unwrap();
        assert_eq!(count.address, 0);
        assert_eq!(msg.address, 4);
        assert_eq!(main.address, 7);
        assert_eq!(code.instruction(main.instruction.unwrap()).mnemonic, "movl");
        assert_eq!(code.section_of_line(0), Section::Data);
        assert_eq!(code.section_of_line(1), Section::Data);
        assert_eq!(code.section_of_line(5), Section::Text);
        assert_eq!(code.section_of_line(8), Section::AfterEnd);
        assert_eq!(code.data_section().map(|d| d.address), Some(0));
        assert_eq!(code.text_section().map(|t| t.address), Some(7));
    }

    #[test]
    fn test_entry_is_first_code_after_text() {
        let code = Code::parse(PROGRAM);
        let entry = code.entry().unwrap();
        assert_eq!(code.instruction(entry).line, 5);
        assert_eq!(code.main().unwrap().name.as_deref(), Some("main"));
    }

    #[test]
    fn test_label_lookups() {
        let code = Code::parse("a:\nb: nop\nc: nop\n");
        assert_eq!(code.find_label_by_address(0).unwrap().name, "b");
        assert_eq!(code.find_label_by_line(2).unwrap().name, "c");
        assert!(code.find_label_by_name("zzz").is_none());
        assert_eq!(code.section_of_line(0), Section::Text);
    }

    #[test]
    fn test_labels_before_data_stay_unlinked() {
        let code = Code::parse("early: nop\n.data\nx: .byte 1\n");
        assert_eq!(code.find_label_by_name("early").unwrap().instruction, None);
        assert!(code.find_label_by_name("x").unwrap().instruction.is_some());
        assert_eq!(code.section_of_line(0), Section::BeforeData);
    }

    #[test]
    fn test_align_pads_to_boundary() {
        let code = Code::parse(".data\na: .byte 1\n.align 4\nb: .long 2\n");
        assert_eq!(code.find_label_by_name("b").unwrap().address, 4);
    }

    #[test]
    fn test_numeric_branch_destination() {
        let code = Code::parse("nop\njmp 1\nnop\nnop\n");
        let jmp = &code.instructions()[1];
        assert_eq!(jmp.dest_addr, Some(3));
        assert_eq!(jmp.jump_target, code.instruction_at(3));
    }

    #[test]
    fn test_config_validation() {
        let config = AnalysisConfig::default().with_max_rounds(0);
        assert!(Code::with_config("nop", &config).is_err());
    }
}
