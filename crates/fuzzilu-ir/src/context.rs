use bitflags::bitflags;

bitflags! {
    /// Bitset describing where an instruction may legally appear.
    /// Block-opening instructions declare which contexts they *open*
    /// ([`crate::instruction::OperationDescriptor::opens_context`]);
    /// consuming instructions declare which they *require*
    /// ([`crate::instruction::OperationDescriptor::requires_context`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Context: u8 {
        const SCRIPT         = 0b0000_0001;
        const SUBROUTINE     = 0b0000_0010;
        const LOOP           = 0b0000_0100;
        const OBJECT_LITERAL = 0b0000_1000;
        const METHOD         = 0b0001_0000;
    }
}

impl Context {
    /// The context every top-level program starts in.
    pub fn script() -> Self {
        Context::SCRIPT
    }
}
