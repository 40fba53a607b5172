use bitflags::bitflags;

bitflags! {
    /// Static attributes of an [`crate::instruction::Operation`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstructionFlags: u16 {
        /// Produces the same outputs given the same inputs, with no
        /// observable side effect; may be freely reordered/deduplicated
        /// by the lifter's inliner.
        const IS_PURE = 0b0000_0000_0001;
        /// Operation parameters (operator kind, property name, ...) may
        /// be randomly altered in place by [`crate::instruction::Operation`]
        /// mutation without touching the instruction's variables.
        const IS_MUTABLE = 0b0000_0000_0010;
        /// Has a variadic input suffix starting at
        /// [`crate::instruction::OperationDescriptor::first_variadic_input`].
        const IS_VARIADIC = 0b0000_0000_0100;
        /// Invokes a function or method (may run arbitrary user code).
        const IS_CALL = 0b0000_0000_1000;
        /// Unconditional transfer of control; code after it within the
        /// same block is dead until the next block boundary.
        const IS_JUMP = 0b0000_0001_0000;
        /// Opens a new block (pushes contexts/scopes).
        const IS_BLOCK_START = 0b0000_0010_0000;
        /// Closes the most recently opened block.
        const IS_BLOCK_END = 0b0000_0100_0000;
        /// A block-start instruction that does not introduce a new
        /// context of its own but re-exposes the surrounding one (e.g.
        /// `BeginElse` stays in whatever context `BeginIf` opened).
        const PROPAGATES_SURROUNDING_CONTEXT = 0b0000_1000_0000;
        /// Excluded from the corpus proper (bookkeeping-only, e.g. a
        /// block's matching end instruction is never itself a splice root).
        const IS_INTERNAL = 0b0001_0000_0000;
    }
}
