use super::flags::InstructionFlags;
use super::operation::Operation;
use crate::context::Context;

/// Static shape of an [`Operation`]: how many inputs/outputs/inner-
/// outputs it declares, where its variadic suffix (if any) begins, its
/// [`InstructionFlags`], and the contexts it requires/opens. Computed
/// once per instruction by [`Operation::descriptor`] and consulted by
/// the validator, the analyzers, the builder, and the splicer.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    pub inputs: usize,
    pub outputs: usize,
    pub inner_outputs: usize,
    pub first_variadic_input: Option<usize>,
    pub flags: InstructionFlags,
    pub requires: Context,
    pub opens: Context,
}

impl OperationDescriptor {
    fn simple(inputs: usize, outputs: usize) -> Self {
        OperationDescriptor {
            inputs,
            outputs,
            inner_outputs: 0,
            first_variadic_input: None,
            flags: InstructionFlags::empty(),
            requires: Context::empty(),
            opens: Context::empty(),
        }
    }

    fn pure(inputs: usize, outputs: usize) -> Self {
        OperationDescriptor {
            flags: InstructionFlags::IS_PURE,
            ..Self::simple(inputs, outputs)
        }
    }

    fn mutable(mut self) -> Self {
        self.flags |= InstructionFlags::IS_MUTABLE;
        self
    }

    fn variadic(mut self, first_variadic_input: usize) -> Self {
        self.flags |= InstructionFlags::IS_VARIADIC;
        self.first_variadic_input = Some(first_variadic_input);
        self
    }

    fn requiring(mut self, ctx: Context) -> Self {
        self.requires = ctx;
        self
    }

    fn opening(mut self, ctx: Context) -> Self {
        self.opens = ctx;
        self
    }

    fn block_start(mut self) -> Self {
        self.flags |= InstructionFlags::IS_BLOCK_START;
        self
    }

    fn block_end(mut self) -> Self {
        self.flags |= InstructionFlags::IS_BLOCK_END;
        self
    }

    fn propagating(mut self) -> Self {
        self.flags |= InstructionFlags::PROPAGATES_SURROUNDING_CONTEXT;
        self
    }

    fn jump(mut self) -> Self {
        self.flags |= InstructionFlags::IS_JUMP;
        self
    }

    fn call(mut self) -> Self {
        self.flags |= InstructionFlags::IS_CALL;
        self
    }

    fn inner_outputs(mut self, n: usize) -> Self {
        self.inner_outputs = n;
        self
    }
}

impl Operation {
    pub fn descriptor(&self) -> OperationDescriptor {
        use Operation::*;
        match self {
            LoadInteger(_) | LoadFloat(_) | LoadString(_) | LoadBoolean(_) | LoadNil
            | LoadUndefined | LoadBuiltin(_) | LoadPair => OperationDescriptor::pure(0, 1),

            Unary(_) => OperationDescriptor::pure(1, 1).mutable(),
            Binary(_) | Compare(_) => OperationDescriptor::pure(2, 1).mutable(),
            Update(_) | Reassign => OperationDescriptor::simple(2, 1).mutable(),

            BeginTable => OperationDescriptor::simple(0, 0)
                .inner_outputs(1)
                .block_start()
                .opening(Context::OBJECT_LITERAL),
            EndTable => OperationDescriptor::simple(1, 1).block_end(),
            TableAddProperty { .. } => {
                OperationDescriptor::simple(2, 0).requiring(Context::OBJECT_LITERAL)
            }
            TableAddElement => OperationDescriptor::simple(2, 0).requiring(Context::OBJECT_LITERAL),
            BeginTableMethod { signature, .. } => OperationDescriptor::simple(0, 0)
                .inner_outputs(1 + signature.parameters().len())
                .block_start()
                .requiring(Context::OBJECT_LITERAL)
                .opening(Context::METHOD | Context::SUBROUTINE),
            EndTableMethod => OperationDescriptor::simple(0, 0).block_end(),
            CreateArray {
                first_variadic_input,
            } => OperationDescriptor::simple(0, 1).variadic(*first_variadic_input),

            GetProperty { .. } => OperationDescriptor::simple(1, 1),
            SetProperty { .. } => OperationDescriptor::simple(2, 0),
            UpdateProperty { .. } => OperationDescriptor::simple(2, 0),
            DeleteProperty { .. } => OperationDescriptor::simple(1, 0),
            GetElement => OperationDescriptor::simple(2, 1),
            SetElement => OperationDescriptor::simple(3, 0),
            UpdateElement { .. } => OperationDescriptor::simple(3, 0),
            DeleteElement => OperationDescriptor::simple(2, 0),

            BeginIf { .. } => OperationDescriptor::simple(1, 0).block_start().propagating(),
            BeginElse => OperationDescriptor::simple(0, 0)
                .block_start()
                .block_end()
                .propagating(),
            EndIf => OperationDescriptor::simple(0, 0).block_end(),

            BeginWhileHeader => OperationDescriptor::simple(0, 0)
                .block_start()
                .opening(Context::LOOP),
            BeginWhileBody => OperationDescriptor::simple(1, 0)
                .block_start()
                .block_end()
                .requiring(Context::LOOP),
            EndWhile => OperationDescriptor::simple(0, 0).block_end(),

            BeginForInitializer => OperationDescriptor::simple(0, 0)
                .inner_outputs(1)
                .block_start()
                .opening(Context::LOOP),
            BeginForCondition => OperationDescriptor::simple(0, 0)
                .inner_outputs(1)
                .block_start()
                .block_end()
                .requiring(Context::LOOP),
            BeginForAfterthought => OperationDescriptor::simple(0, 0)
                .inner_outputs(1)
                .block_start()
                .block_end()
                .requiring(Context::LOOP),
            BeginForBody => OperationDescriptor::simple(0, 0)
                .inner_outputs(1)
                .block_start()
                .block_end()
                .requiring(Context::LOOP),
            EndFor => OperationDescriptor::simple(0, 0).block_end(),

            BeginForIn { num_loop_variables } => OperationDescriptor::simple(1, 0)
                .inner_outputs(*num_loop_variables)
                .block_start()
                .opening(Context::LOOP),
            EndForIn => OperationDescriptor::simple(0, 0).block_end(),

            BeginRepeat { has_counter } => OperationDescriptor::simple(0, 0)
                .inner_outputs(if *has_counter { 1 } else { 0 })
                .block_start()
                .opening(Context::LOOP),
            EndRepeat => OperationDescriptor::simple(1, 0).block_end(),

            LoopBreak => OperationDescriptor::simple(0, 0).jump().requiring(Context::LOOP),
            Label => OperationDescriptor::simple(0, 1),
            Goto => OperationDescriptor::simple(1, 0).jump(),

            BeginFunction { signature, is_method } => OperationDescriptor::simple(0, 0)
                .inner_outputs(signature.parameters().len())
                .block_start()
                .opening(if *is_method {
                    Context::SUBROUTINE | Context::METHOD
                } else {
                    Context::SUBROUTINE
                }),
            EndFunction => OperationDescriptor::simple(0, 1).block_end(),
            Return => OperationDescriptor::simple(0, 0)
                .variadic(0)
                .jump()
                .requiring(Context::SUBROUTINE),
            CallFunction {
                first_variadic_input,
            } => OperationDescriptor::simple(1, 1).variadic(*first_variadic_input).call(),
            CallMethod {
                first_variadic_input,
                ..
            } => OperationDescriptor::simple(1, 1).variadic(*first_variadic_input).call(),

            Nop => OperationDescriptor::simple(0, 0),
        }
    }
}
