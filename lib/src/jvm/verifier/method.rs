use super::{Frame, Interpreter, Value};
use crate::jvm::{
    parse_name, BinaryName, Error, FieldType, MethodAccessFlags, MethodDescriptor,
    ParseDescriptor, RenderDescriptor, StateErrorKind, UnqualifiedName,
};
use crate::util::Width;
use std::fmt;

/// Method whose body is being analyzed
///
/// This is everything needed to compute the frame on entry to the method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodContext {
    /// Class declaring the method
    pub this_class: BinaryName,

    pub access_flags: MethodAccessFlags,

    pub name: UnqualifiedName,

    pub descriptor: MethodDescriptor,
}

impl MethodContext {
    pub fn new(
        this_class: BinaryName,
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodContext {
        MethodContext {
            this_class,
            access_flags,
            name,
            descriptor,
        }
    }

    /// Construct a method context from the textual names (eg. `java/lang/String`, `length` and
    /// `()I`)
    pub fn parse(
        this_class: &str,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> Result<MethodContext, Error> {
        Ok(MethodContext {
            this_class: parse_name(this_class)?,
            access_flags,
            name: parse_name(name)?,
            descriptor: MethodDescriptor::parse(descriptor)?,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Is this an instance initialization method?
    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn return_type(&self) -> Option<&FieldType> {
        self.descriptor.return_type.as_ref()
    }

    /// Number of local variable slots taken up by the parameters (including `this`)
    pub fn parameter_slots(&self) -> usize {
        self.descriptor.parameter_length(!self.is_static())
    }

    /// Frame on entry to the method
    ///
    /// The receiver (if any) goes in local 0, followed by the parameters. Wide parameters are
    /// followed by a filler slot. Locals are padded with [`Value::top`] up to `max_locals` when
    /// provided, and otherwise are just as long as the parameters and may grow later on.
    pub fn entry_frame<I: Interpreter + ?Sized>(
        &self,
        interpreter: &I,
        max_locals: Option<usize>,
        max_stack: Option<usize>,
    ) -> Result<Frame<I::Value>, Error> {
        let mut locals = Vec::with_capacity(max_locals.unwrap_or_else(|| self.parameter_slots()));
        if !self.is_static() {
            locals.push(interpreter.new_this(self));
        }
        for parameter in &self.descriptor.parameters {
            let value = interpreter.new_value(parameter);
            let width = value.width();
            locals.push(value);
            for _ in 1..width {
                locals.push(I::Value::top());
            }
        }

        match max_locals {
            Some(max_locals) if locals.len() > max_locals => Err(Error::invalid_state(
                StateErrorKind::InvalidLocalIndex(locals.len() - 1),
            )),
            Some(max_locals) => {
                locals.resize(max_locals, I::Value::top());
                Ok(Frame::new(locals, max_stack))
            }
            None => Ok(Frame::growable(locals, max_stack)),
        }
    }
}

impl fmt::Display for MethodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}",
            self.this_class,
            self.name,
            self.descriptor.render()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassHierarchy;
    use crate::jvm::verifier::{BasicVerifier, VerificationType};
    use crate::jvm::RefType;
    use VerificationType::*;

    #[test]
    fn static_entry() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let method = MethodContext::parse("Foo", MethodAccessFlags::STATIC, "foo", "(IJZ)V")
            .unwrap();

        let frame = method.entry_frame(&verifier, None, None).unwrap();
        assert_eq!(frame.locals(), &[Integer, Long, Top, Integer]);
        assert!(frame.stack().is_empty());

        let frame = method.entry_frame(&verifier, Some(6), Some(2)).unwrap();
        assert_eq!(frame.locals(), &[Integer, Long, Top, Integer, Top, Top]);
    }

    #[test]
    fn instance_entry() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let method = MethodContext::parse(
            "Foo",
            MethodAccessFlags::PUBLIC,
            "bar",
            "(Ljava/lang/String;[D)I",
        )
        .unwrap();

        let frame = method.entry_frame(&verifier, None, None).unwrap();
        assert_eq!(
            frame.locals(),
            &[
                VerificationType::reference("Foo").unwrap(),
                Object(RefType::STRING),
                VerificationType::reference("[D").unwrap(),
            ]
        );
    }

    #[test]
    fn constructor_entry() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let method =
            MethodContext::parse("Foo", MethodAccessFlags::PUBLIC, "<init>", "(D)V").unwrap();
        assert!(method.is_constructor());

        let frame = method.entry_frame(&verifier, None, None).unwrap();
        assert_eq!(frame.locals(), &[UninitializedThis, Double, Top]);
    }

    #[test]
    fn too_few_locals() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let method = MethodContext::parse("Foo", MethodAccessFlags::STATIC, "foo", "(IJ)V")
            .unwrap();

        let err = method.entry_frame(&verifier, Some(2), None).unwrap_err();
        assert_eq!(
            err.state_kind(),
            Some(&StateErrorKind::InvalidLocalIndex(2))
        );
    }
}
