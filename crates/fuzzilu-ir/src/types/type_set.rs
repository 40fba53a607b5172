use bitflags::bitflags;

bitflags! {
    /// Base Lua value kinds. Lua 5.4+ splits numbers into integer and
    /// float subtypes, which this bitset keeps distinct so arithmetic
    /// and `math.type` can be modelled precisely.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeSet: u16 {
        const UNDEFINED = 0b0000_0000_0001;
        const NIL       = 0b0000_0000_0010;
        const BOOLEAN   = 0b0000_0000_0100;
        const INTEGER   = 0b0000_0000_1000;
        const FLOAT     = 0b0000_0001_0000;
        const STRING    = 0b0000_0010_0000;
        const OBJECT    = 0b0000_0100_0000;
        const FUNCTION  = 0b0000_1000_0000;
        const ITERABLE  = 0b0001_0000_0000;

        const NUMBER = Self::INTEGER.bits() | Self::FLOAT.bits();
        const NOTHING = 0;
        const ANYTHING = Self::UNDEFINED.bits()
            | Self::NIL.bits()
            | Self::BOOLEAN.bits()
            | Self::INTEGER.bits()
            | Self::FLOAT.bits()
            | Self::STRING.bits()
            | Self::OBJECT.bits()
            | Self::FUNCTION.bits()
            | Self::ITERABLE.bits();
    }
}
