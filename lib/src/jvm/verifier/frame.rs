use super::{Interpreter, MethodContext, ReturnCheck, Value};
use crate::jvm::code::{Instruction, InvokeType};
use crate::jvm::{BinaryName, Error, FieldType, StateErrorKind};
use crate::util::{total_width, Width};

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Locals hold one value per slot: a wide value is followed by a [`Value::top`] filler. The stack
/// holds one entry per value, and its size in slots is bounded by `max_stack` (if there is one).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<V> {
    locals: Vec<V>,
    stack: Vec<V>,
    max_stack: Option<usize>,

    /// Do stores past the end of the locals extend them?
    growable: bool,
}

impl<V: Value> Frame<V> {
    /// Frame with a fixed number of locals
    pub fn new(locals: Vec<V>, max_stack: Option<usize>) -> Frame<V> {
        Frame {
            locals,
            stack: vec![],
            max_stack,
            growable: false,
        }
    }

    /// Frame whose locals are extended on demand when stored to
    pub fn growable(locals: Vec<V>, max_stack: Option<usize>) -> Frame<V> {
        Frame {
            locals,
            stack: vec![],
            max_stack,
            growable: true,
        }
    }

    /// Frame with the given locals and stack (as found in an explicit frame marker)
    ///
    /// Unlike [`Frame::new`], wide locals should not be followed by a filler: it gets added here.
    pub fn expand(locals: &[V], stack: Vec<V>, max_stack: Option<usize>) -> Frame<V> {
        let mut expanded = Vec::with_capacity(locals.len());
        for local in locals {
            expanded.push(local.clone());
            for _ in 1..local.width() {
                expanded.push(V::top());
            }
        }
        Frame {
            locals: expanded,
            stack,
            max_stack,
            growable: true,
        }
    }

    pub fn locals(&self) -> &[V] {
        &self.locals
    }

    /// Stack entries, from the bottom up
    pub fn stack(&self) -> &[V] {
        &self.stack
    }

    /// Size of the stack in slots
    pub fn stack_slots(&self) -> usize {
        total_width(&self.stack)
    }

    /// Number of local slots up to and including the last one that isn't `top`
    pub fn locals_used(&self) -> usize {
        self.locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| !local.is_top())
            .map_or(0, |(idx, local)| idx + local.width())
    }

    /// Locals with fillers removed and trailing `top` values trimmed
    ///
    /// This is the form used in frame markers, where a wide value implicitly covers two slots.
    pub fn compressed_locals(&self) -> Vec<V> {
        let mut compressed = vec![];
        let mut idx = 0;
        while idx < self.locals.len() {
            let local = &self.locals[idx];
            compressed.push(local.clone());
            idx += local.width();
        }
        while compressed.last().map_or(false, Value::is_top) {
            compressed.pop();
        }
        compressed
    }

    pub fn push(&mut self, value: V) -> Result<(), Error> {
        if let Some(max_stack) = self.max_stack {
            if self.stack_slots() + value.width() > max_stack {
                return Err(Error::invalid_state(StateErrorKind::StackOverflow {
                    max_stack,
                }));
            }
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<V, Error> {
        self.stack
            .pop()
            .ok_or_else(|| Error::invalid_state(StateErrorKind::EmptyStack))
    }

    fn pop_expecting_width(&mut self, expected_width: usize) -> Result<V, Error> {
        let value = self.pop()?;
        let found_width = value.width();
        if found_width == expected_width {
            Ok(value)
        } else {
            Err(Error::invalid_state(StateErrorKind::InvalidWidth(
                found_width,
            )))
        }
    }

    /// Pop the top `count` entries, returning them bottom first
    fn pop_many(&mut self, count: usize) -> Result<Vec<V>, Error> {
        if count > self.stack.len() {
            return Err(Error::invalid_state(StateErrorKind::EmptyStack));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    pub fn get_local(&self, index: usize) -> Result<&V, Error> {
        self.locals
            .get(index)
            .ok_or_else(|| Error::invalid_state(StateErrorKind::InvalidLocalIndex(index)))
    }

    /// Store a value in a local
    ///
    /// A wide value also overwrites the next slot with a filler. Overwriting either half of an
    /// existing wide value invalidates the other half.
    pub fn set_local(&mut self, index: usize, value: V) -> Result<(), Error> {
        let end = index + value.width();
        if end > self.locals.len() {
            if self.growable {
                self.locals.resize(end, V::top());
            } else {
                return Err(Error::invalid_state(StateErrorKind::InvalidLocalIndex(
                    end - 1,
                )));
            }
        }

        if index > 0 && self.locals[index - 1].width() == 2 {
            self.locals[index - 1] = V::top();
        }
        if end < self.locals.len() && self.locals[end - 1].width() == 2 {
            self.locals[end] = V::top();
        }

        self.locals[index] = value;
        for filler in &mut self.locals[index + 1..end] {
            *filler = V::top();
        }
        Ok(())
    }

    /// Replace every occurrence of a value in the locals and on the stack
    pub fn replace_all(&mut self, original: &V, updated: &V) {
        for value in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if value == original {
                *value = updated.clone();
            }
        }
    }

    /// Merge another frame into this one, returning whether anything changed
    pub fn merge<I>(&mut self, other: &Frame<V>, interpreter: &I) -> Result<bool, Error>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        if self.stack.len() != other.stack.len() {
            return Err(Error::invalid_state(
                StateErrorKind::IncompatibleStackHeights(self.stack.len(), other.stack.len()),
            ));
        }
        if self.locals.len() != other.locals.len() {
            return Err(Error::invalid_state(StateErrorKind::IncompatibleLocals(
                self.locals.len(),
                other.locals.len(),
            )));
        }

        let mut changed = false;
        let ours = self.locals.iter_mut().chain(self.stack.iter_mut());
        let theirs = other.locals.iter().chain(other.stack.iter());
        for (value, other_value) in ours.zip(theirs) {
            let merged = interpreter.merge(value, other_value)?;
            if merged != *value {
                *value = merged;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Update the frame to reflect the effects of the given instruction
    ///
    /// Control flow is not followed here: branches just consume their operands, and the frame
    /// after `athrow` or a return is whatever is left over. `returns` decides whether return
    /// instructions must agree with the method descriptor.
    pub fn execute<I>(
        &mut self,
        position: usize,
        insn: &Instruction,
        method: &MethodContext,
        interpreter: &I,
        returns: ReturnCheck,
    ) -> Result<(), Error>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        if !interpreter.accepts(insn.opcode()) {
            return Err(Error::invalid_opcode(insn.opcode()));
        }

        use Instruction::*;
        match insn {
            Nop | Goto(_) => (),

            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | LConst0 | LConst1 | FConst0 | FConst1 | FConst2 | DConst0 | DConst1 | BiPush(_)
            | SiPush(_) | Ldc(_) | GetStatic(_) | New(_) | Jsr(_) => {
                let value = interpreter.new_operation(position, insn)?;
                self.push(value)?;
            }

            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) => {
                let local = self.get_local(*idx as usize)?;
                let value = interpreter.copy_operation(insn, local)?;
                self.push(value)?;
            }

            IStore(idx) | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) => {
                let value = self.pop()?;
                let value = interpreter.copy_operation(insn, &value)?;
                self.set_local(*idx as usize, value)?;
            }

            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad | IAdd
            | LAdd | FAdd | DAdd | ISub | LSub | FSub | DSub | IMul | LMul | FMul | DMul
            | IDiv | LDiv | FDiv | DDiv | IRem | LRem | FRem | DRem | ISh(_) | LSh(_) | IAnd
            | LAnd | IOr | LOr | IXor | LXor | LCmp | FCmp(_) | DCmp(_) | IfICmp(_, _)
            | IfACmp(_, _) | PutField(_) => {
                let value2 = self.pop()?;
                let value1 = self.pop()?;
                if let Some(result) = interpreter.binary_operation(insn, &value1, &value2)? {
                    self.push(result)?;
                }
            }

            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                let value3 = self.pop()?;
                let value2 = self.pop()?;
                let value1 = self.pop()?;
                interpreter.ternary_operation(insn, &value1, &value2, &value3)?;
            }

            Pop => {
                self.pop_expecting_width(1)?;
            }

            Pop2 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    // Form 1
                    1 => {
                        self.pop_expecting_width(1)?;
                    }

                    // Form 2
                    2 => (),

                    other => return Err(Error::invalid_state(StateErrorKind::InvalidWidth(other))),
                }
            }

            Dup => {
                let arg1 = self.pop_expecting_width(1)?;
                self.push(arg1.clone())?;
                self.push(arg1)?;
            }

            DupX1 => {
                let arg1 = self.pop_expecting_width(1)?;
                let arg2 = self.pop_expecting_width(1)?;
                self.push(arg1.clone())?;
                self.push(arg2)?;
                self.push(arg1)?;
            }

            DupX2 => {
                let arg1 = self.pop_expecting_width(1)?;
                let arg2 = self.pop()?;
                match arg2.width() {
                    // Form 1
                    1 => {
                        let arg3 = self.pop_expecting_width(1)?;
                        self.push(arg1.clone())?;
                        self.push(arg3)?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    // Form 2
                    2 => {
                        self.push(arg1.clone())?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    other => return Err(Error::invalid_state(StateErrorKind::InvalidWidth(other))),
                }
            }

            Dup2 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    // Form 1
                    1 => {
                        let arg2 = self.pop_expecting_width(1)?;
                        self.push(arg2.clone())?;
                        self.push(arg1.clone())?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    // Form 2
                    2 => {
                        self.push(arg1.clone())?;
                        self.push(arg1)?;
                    }

                    other => return Err(Error::invalid_state(StateErrorKind::InvalidWidth(other))),
                }
            }

            Dup2X1 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    // Form 1
                    1 => {
                        let arg2 = self.pop_expecting_width(1)?;
                        let arg3 = self.pop_expecting_width(1)?;
                        self.push(arg2.clone())?;
                        self.push(arg1.clone())?;
                        self.push(arg3)?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    // Form 2
                    2 => {
                        let arg2 = self.pop_expecting_width(1)?;
                        self.push(arg1.clone())?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    other => return Err(Error::invalid_state(StateErrorKind::InvalidWidth(other))),
                }
            }

            Dup2X2 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    1 => {
                        let arg2 = self.pop_expecting_width(1)?;
                        let arg3 = self.pop()?;
                        match arg3.width() {
                            // Form 1
                            1 => {
                                let arg4 = self.pop_expecting_width(1)?;
                                self.push(arg2.clone())?;
                                self.push(arg1.clone())?;
                                self.push(arg4)?;
                                self.push(arg3)?;
                                self.push(arg2)?;
                                self.push(arg1)?;
                            }

                            // Form 3
                            2 => {
                                self.push(arg2.clone())?;
                                self.push(arg1.clone())?;
                                self.push(arg3)?;
                                self.push(arg2)?;
                                self.push(arg1)?;
                            }

                            other => {
                                return Err(Error::invalid_state(StateErrorKind::InvalidWidth(
                                    other,
                                )))
                            }
                        }
                    }

                    2 => {
                        let arg2 = self.pop()?;
                        match arg2.width() {
                            // Form 2
                            1 => {
                                let arg3 = self.pop_expecting_width(1)?;
                                self.push(arg1.clone())?;
                                self.push(arg3)?;
                                self.push(arg2)?;
                                self.push(arg1)?;
                            }

                            // Form 4
                            2 => {
                                self.push(arg1.clone())?;
                                self.push(arg2)?;
                                self.push(arg1)?;
                            }

                            other => {
                                return Err(Error::invalid_state(StateErrorKind::InvalidWidth(
                                    other,
                                )))
                            }
                        }
                    }

                    other => return Err(Error::invalid_state(StateErrorKind::InvalidWidth(other))),
                }
            }

            Swap => {
                let arg1 = self.pop_expecting_width(1)?;
                let arg2 = self.pop_expecting_width(1)?;
                self.push(arg1)?;
                self.push(arg2)?;
            }

            IInc(idx, _) => {
                let local = self.get_local(*idx as usize)?;
                if let Some(result) = interpreter.unary_operation(insn, local)? {
                    self.set_local(*idx as usize, result)?;
                }
            }

            INeg | LNeg | FNeg | DNeg | I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D
            | D2I | D2L | D2F | I2B | I2C | I2S | If(_, _) | IfNull(_, _) | TableSwitch { .. }
            | LookupSwitch { .. } | PutStatic(_) | GetField(_) | NewArray(_) | ANewArray(_)
            | ArrayLength | AThrow | CheckCast(_) | InstanceOf(_) | MonitorEnter
            | MonitorExit => {
                let value = self.pop()?;
                if let Some(result) = interpreter.unary_operation(insn, &value)? {
                    self.push(result)?;
                }
            }

            Ret(idx) => {
                let local = self.get_local(*idx as usize)?;
                if local.return_address().is_none() {
                    return Err(Error::invalid_state(StateErrorKind::NotAReturnAddress(
                        *idx as usize,
                    )));
                }
            }

            IReturn | LReturn | FReturn | DReturn | AReturn => {
                let value = self.pop()?;
                match (returns, method.return_type()) {
                    (ReturnCheck::Descriptor, Some(expected)) => {
                        interpreter.return_operation(insn, &value, expected)?
                    }
                    (ReturnCheck::Descriptor, None) => {
                        return Err(Error::invalid_state(StateErrorKind::InvalidType {
                            expected: "return",
                            found: insn.mnemonic().to_owned(),
                        }))
                    }
                    (ReturnCheck::Category, _) => {
                        let expected = match insn {
                            IReturn => FieldType::int(),
                            LReturn => FieldType::long(),
                            FReturn => FieldType::float(),
                            DReturn => FieldType::double(),
                            _ => FieldType::object(BinaryName::OBJECT),
                        };
                        interpreter.return_operation(insn, &value, &expected)?
                    }
                }
            }

            Return => {
                if returns == ReturnCheck::Descriptor && method.return_type().is_some() {
                    return Err(Error::invalid_state(StateErrorKind::InvalidType {
                        expected: "value return",
                        found: insn.mnemonic().to_owned(),
                    }));
                }
            }

            Invoke(invoke_type, method_ref) => {
                let has_receiver = *invoke_type != InvokeType::Static;
                let arg_count = method_ref.descriptor.parameters.len() + has_receiver as usize;
                let args = self.pop_many(arg_count)?;
                let result = interpreter.nary_operation(insn, &args)?;

                // Constructor calls initialize every copy of the receiver
                if *invoke_type == InvokeType::Special && method_ref.is_init() {
                    if let Some(receiver) = args.first() {
                        let initialized = interpreter.initialize(receiver, method)?;
                        self.replace_all(receiver, &initialized);
                    }
                }

                if let Some(result) = result {
                    self.push(result)?;
                }
            }

            InvokeDynamic(call_site) => {
                let args = self.pop_many(call_site.descriptor.parameters.len())?;
                if let Some(result) = interpreter.nary_operation(insn, &args)? {
                    self.push(result)?;
                }
            }

            MultiANewArray(_, dimensions) => {
                let args = self.pop_many(*dimensions as usize)?;
                if let Some(result) = interpreter.nary_operation(insn, &args)? {
                    self.push(result)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::names::Name;
    use crate::jvm::class_graph::ClassHierarchy;
    use crate::jvm::code::{FieldRef, MethodRef};
    use crate::jvm::verifier::{BasicVerifier, VerificationType};
    use crate::jvm::{
        BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, RefType, UnqualifiedName,
    };
    use Instruction::*;
    use VerificationType::*;

    fn method() -> MethodContext {
        MethodContext::parse("MyClass", MethodAccessFlags::STATIC, "test", "()V").unwrap()
    }

    fn new_frame<const N: usize, const M: usize>(
        locals: [VerificationType; N],
        stack: [VerificationType; M],
    ) -> Frame<VerificationType> {
        Frame {
            locals: Vec::from(locals),
            stack: Vec::from(stack),
            max_stack: None,
            growable: false,
        }
    }

    fn run(frame: &mut Frame<VerificationType>, insn: Instruction) -> Result<(), Error> {
        let hierarchy = ClassHierarchy::with_java_library_types();
        let verifier = BasicVerifier::new(&hierarchy);
        frame.execute(0, &insn, &method(), &verifier, ReturnCheck::Descriptor)
    }

    #[test]
    fn arithmetic() {
        let binops = [
            (Integer, vec![IAdd, ISub, IDiv, IMul, IRem, IAnd, IOr, IXor]),
            (Long, vec![LAdd, LSub, LDiv, LMul, LRem, LAnd, LOr, LXor]),
            (Float, vec![FAdd, FSub, FDiv, FMul, FRem]),
            (Double, vec![DAdd, DSub, DDiv, DMul, DRem]),
        ];

        for (good_typ, instructions) in binops {
            for instruction in instructions {
                // Try a bunch of different types
                for typ in [Integer, Long, Float, Double, Null, UninitializedThis] {
                    let mut frame_in = new_frame([], [typ.clone(), typ.clone()]);
                    let result = run(&mut frame_in, instruction.clone());
                    if typ == good_typ {
                        assert!(result.is_ok(), "Verification of {:?}", instruction);
                        assert_eq!(frame_in, new_frame([], [typ]), "Output of {:?}", instruction);
                    } else {
                        assert!(
                            matches!(
                                result.as_ref().map_err(Error::state_kind),
                                Err(Some(StateErrorKind::InvalidType { .. }))
                            ),
                            "Verification of {:?}: {:?}",
                            instruction,
                            result
                        );
                    }
                }

                // Try with a stack that is too small
                let mut frame_in = new_frame([], [good_typ.clone()]);
                assert_eq!(
                    run(&mut frame_in, instruction.clone())
                        .unwrap_err()
                        .state_kind(),
                    Some(&StateErrorKind::EmptyStack),
                    "Verification of {:?}",
                    instruction
                );
            }
        }
    }

    #[test]
    fn dup_forms() {
        let obj = Object(RefType::OBJECT);

        let mut frame = new_frame([], [Integer, Float]);
        run(&mut frame, Dup2).unwrap();
        assert_eq!(frame.stack(), &[Integer, Float, Integer, Float]);

        let mut frame = new_frame([], [Long]);
        run(&mut frame, Dup2).unwrap();
        assert_eq!(frame.stack(), &[Long, Long]);
        assert_eq!(frame.stack_slots(), 4);

        let mut frame = new_frame([], [Long, obj.clone()]);
        run(&mut frame, DupX2).unwrap();
        assert_eq!(frame.stack(), &[obj.clone(), Long, obj.clone()]);

        let mut frame = new_frame([], [Integer, Double]);
        run(&mut frame, Dup2X1).unwrap();
        assert_eq!(frame.stack(), &[Double, Integer, Double]);

        let mut frame = new_frame([], [Double, Long]);
        run(&mut frame, Dup2X2).unwrap();
        assert_eq!(frame.stack(), &[Long, Double, Long]);

        let mut frame = new_frame([], [Integer, Null]);
        run(&mut frame, Swap).unwrap();
        assert_eq!(frame.stack(), &[Null, Integer]);

        let mut frame = new_frame([], [Long]);
        assert_eq!(
            run(&mut frame, Pop).unwrap_err().state_kind(),
            Some(&StateErrorKind::InvalidWidth(2))
        );

        let mut frame = new_frame([], [Long]);
        assert_eq!(
            run(&mut frame, Dup).unwrap_err().state_kind(),
            Some(&StateErrorKind::InvalidWidth(2))
        );

        let mut frame = new_frame([], [Integer, Integer]);
        run(&mut frame, Pop2).unwrap();
        assert!(frame.stack().is_empty());
    }

    #[test]
    fn stack_bounds() {
        let mut frame = Frame::new(vec![], Some(3));
        frame.push(Integer).unwrap();
        frame.push(Long).unwrap();
        assert_eq!(
            frame.push(Integer).unwrap_err().state_kind(),
            Some(&StateErrorKind::StackOverflow { max_stack: 3 })
        );

        let mut frame = new_frame([], []);
        assert_eq!(
            run(&mut frame, Pop).unwrap_err().state_kind(),
            Some(&StateErrorKind::EmptyStack)
        );
    }

    #[test]
    fn wide_locals() {
        let mut frame = new_frame([Top, Top, Top, Top], []);
        frame.set_local(1, Long).unwrap();
        assert_eq!(frame.locals(), &[Top, Long, Top, Top]);

        // Overwriting the filler invalidates the long
        frame.set_local(2, Integer).unwrap();
        assert_eq!(frame.locals(), &[Top, Top, Integer, Top]);

        frame.set_local(0, Double).unwrap();
        assert_eq!(frame.locals(), &[Double, Top, Integer, Top]);

        // Overwriting the first half also invalidates the filler
        frame.set_local(0, Float).unwrap();
        assert_eq!(frame.locals(), &[Float, Top, Integer, Top]);

        assert_eq!(
            frame.set_local(3, Long).unwrap_err().state_kind(),
            Some(&StateErrorKind::InvalidLocalIndex(4))
        );

        let mut growable = Frame::growable(vec![], None);
        growable.set_local(3, Integer).unwrap();
        assert_eq!(growable.locals(), &[Top, Top, Top, Integer]);
        assert_eq!(growable.locals_used(), 4);
    }

    #[test]
    fn loads_and_stores() {
        let mut frame = new_frame([Integer, Top, Top], []);
        run(&mut frame, ILoad(0)).unwrap();
        run(&mut frame, I2L).unwrap();
        run(&mut frame, LStore(1)).unwrap();
        assert_eq!(frame.locals(), &[Integer, Long, Top]);
        assert!(frame.stack().is_empty());

        run(&mut frame, LLoad(1)).unwrap();
        assert_eq!(frame.stack(), &[Long]);

        let mut frame = new_frame([Integer, Top], []);
        assert_eq!(
            run(&mut frame, ILoad(1)).unwrap_err().state_kind(),
            Some(&StateErrorKind::UninitializedLocal(1))
        );
        assert_eq!(
            run(&mut frame, ILoad(2)).unwrap_err().state_kind(),
            Some(&StateErrorKind::InvalidLocalIndex(2))
        );

        let mut frame = new_frame([Integer], []);
        run(&mut frame, IInc(0, 1)).unwrap();
        assert_eq!(frame.locals(), &[Integer]);
    }

    #[test]
    fn compressed_locals() {
        let frame = new_frame([Integer, Long, Top, Top, Double, Top, Top, Top], []);
        assert_eq!(frame.compressed_locals(), vec![Integer, Long, Top, Double]);
        assert_eq!(frame.locals_used(), 6);

        let expanded = Frame::expand(&[Integer, Long, Top, Double], vec![], None);
        assert_eq!(expanded.locals(), &[Integer, Long, Top, Top, Double, Top]);
    }

    #[test]
    fn constructor_call() {
        let string_builder = Object(RefType::Object(BinaryName::STRINGBUILDER));
        let uninit = Uninitialized {
            offset: 0,
            class: BinaryName::STRINGBUILDER,
        };

        let mut frame = new_frame([], []);
        run(&mut frame, New(BinaryName::STRINGBUILDER)).unwrap();
        run(&mut frame, Dup).unwrap();
        assert_eq!(frame.stack(), &[uninit.clone(), uninit]);

        let init = MethodRef {
            class: RefType::Object(BinaryName::STRINGBUILDER),
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            is_interface: false,
        };
        run(&mut frame, Invoke(InvokeType::Special, init)).unwrap();
        assert_eq!(frame.stack(), &[string_builder]);
    }

    #[test]
    fn fields() {
        let field = FieldRef {
            class: BinaryName::from_string(String::from("MyClass")).unwrap(),
            name: UnqualifiedName::from_string(String::from("count")).unwrap(),
            descriptor: FieldType::long(),
        };

        let mut frame = new_frame([], []);
        run(&mut frame, GetStatic(field.clone())).unwrap();
        assert_eq!(frame.stack(), &[Long]);
        run(&mut frame, PutStatic(field.clone())).unwrap();
        assert!(frame.stack().is_empty());

        let mut frame = new_frame([], [Integer]);
        assert!(run(&mut frame, PutStatic(field)).is_err());
    }

    #[test]
    fn returns() {
        let mut frame = new_frame([], [Integer]);
        assert_eq!(
            run(&mut frame, IReturn).unwrap_err().state_kind(),
            Some(&StateErrorKind::InvalidType {
                expected: "return",
                found: String::from("ireturn"),
            })
        );

        let mut frame = new_frame([], []);
        run(&mut frame, Return).unwrap();

        // Checking only the category, a void method can still run value returns
        let hierarchy = ClassHierarchy::with_java_library_types();
        let verifier = BasicVerifier::new(&hierarchy);
        let returns = [
            (IReturn, Integer),
            (LReturn, Long),
            (FReturn, Float),
            (DReturn, Double),
            (AReturn, Object(RefType::STRING)),
            (AReturn, Null),
        ];
        for (insn, value) in returns {
            let mut frame = new_frame([], [value]);
            frame
                .execute(0, &insn, &method(), &verifier, ReturnCheck::Category)
                .unwrap();
            assert!(frame.stack().is_empty());
        }
        let mut frame = new_frame([], [Float]);
        assert!(frame
            .execute(0, &IReturn, &method(), &verifier, ReturnCheck::Category)
            .is_err());
    }

    #[test]
    fn merging() {
        let hierarchy = ClassHierarchy::with_java_library_types();
        let verifier = BasicVerifier::new(&hierarchy);
        let string = Object(RefType::STRING);

        let mut frame1 = new_frame([Integer, Null], [string.clone()]);
        let frame2 = new_frame([Float, string.clone()], [Null]);
        assert!(frame1.merge(&frame2, &verifier).unwrap());
        assert_eq!(frame1.locals(), &[Top, string.clone()]);
        assert_eq!(frame1.stack(), &[string.clone()]);

        // Merging again is a no-op
        assert!(!frame1.merge(&frame2, &verifier).unwrap());

        let frame3 = new_frame([Integer, Null], []);
        assert_eq!(
            frame1.merge(&frame3, &verifier).unwrap_err().state_kind(),
            Some(&StateErrorKind::IncompatibleStackHeights(1, 0))
        );
    }
}
