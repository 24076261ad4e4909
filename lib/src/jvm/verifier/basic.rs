use super::{Interpreter, MethodContext, OpcodeSet, Value, VerificationType};
use crate::jvm::class_graph::TypeHierarchy;
use crate::jvm::code::{Constant, Instruction, InvokeType};
use crate::jvm::{BaseType, BinaryName, Error, FieldType, RefType, StateErrorKind};

/// Interpreter over [`VerificationType`]
///
/// Operands are checked by category: an `iadd` needs two `int`s, an `iaload` needs an `int[]` (or
/// `null`) and an `int`, a `getfield` needs an initialized reference, etc. Reference operands are
/// not checked against the exact class expected (so passing a `String` where an `Integer` is
/// expected is accepted). The type hierarchy is only needed to merge references.
pub struct BasicVerifier<'h, H: ?Sized> {
    hierarchy: &'h H,
    accepted: OpcodeSet,
}

impl<'h, H: TypeHierarchy + ?Sized> BasicVerifier<'h, H> {
    pub fn new(hierarchy: &'h H) -> Self {
        BasicVerifier {
            hierarchy,
            accepted: OpcodeSet::all(),
        }
    }

    /// Restrict the instructions this interpreter will accept
    pub fn with_accepted_opcodes(mut self, accepted: OpcodeSet) -> Self {
        self.accepted = accepted;
        self
    }

    /// Merge two reference types
    ///
    /// Arrays of references are merged element-wise. Any other mix of arrays ends up as `Object`.
    fn merge_ref_types(&self, type1: &RefType, type2: &RefType) -> Result<RefType, Error> {
        if type1 == type2 {
            return Ok(type1.clone());
        }
        match (type1, type2) {
            (RefType::Object(class1), RefType::Object(class2)) => Ok(RefType::Object(
                self.hierarchy.common_superclass(class1, class2)?,
            )),
            _ => match (type1.component(), type2.component()) {
                (Some(FieldType::Ref(elem1)), Some(FieldType::Ref(elem2))) => {
                    let merged = self.merge_ref_types(&elem1, &elem2)?;
                    Ok(RefType::array(FieldType::Ref(merged)))
                }
                _ => Ok(RefType::OBJECT),
            },
        }
    }
}

fn invalid_type(expected: &'static str, found: &VerificationType) -> Error {
    Error::invalid_state(StateErrorKind::InvalidType {
        expected,
        found: found.to_string(),
    })
}

fn expect(value: &VerificationType, expected: VerificationType) -> Result<(), Error> {
    if *value == expected {
        return Ok(());
    }
    let expected_name = match expected {
        VerificationType::Integer => "int",
        VerificationType::Float => "float",
        VerificationType::Long => "long",
        VerificationType::Double => "double",
        _ => "reference",
    };
    Err(invalid_type(expected_name, value))
}

/// Reference to an object whose constructor has already run (or `null`)
fn expect_initialized(value: &VerificationType) -> Result<(), Error> {
    match value {
        VerificationType::Null | VerificationType::Object(_) => Ok(()),
        _ => Err(invalid_type("initialized reference", value)),
    }
}

fn expect_reference(value: &VerificationType) -> Result<(), Error> {
    if value.is_reference() {
        Ok(())
    } else {
        Err(invalid_type("reference", value))
    }
}

/// Check a value can be stored where a value of the given type is expected
fn expect_field_type(value: &VerificationType, field_type: &FieldType) -> Result<(), Error> {
    match VerificationType::from(field_type.clone()) {
        VerificationType::Object(_) => expect_initialized(value),
        primitive => expect(value, primitive),
    }
}

/// Check the value is an array matching `accepts` (or `null`) and return its element type
fn expect_array(
    value: &VerificationType,
    expected: &'static str,
    accepts: impl Fn(&FieldType) -> bool,
) -> Result<Option<FieldType>, Error> {
    match value {
        VerificationType::Null => Ok(None),
        VerificationType::Object(ref_type) => match ref_type.component() {
            Some(element) if accepts(&element) => Ok(Some(element)),
            _ => Err(invalid_type(expected, value)),
        },
        _ => Err(invalid_type(expected, value)),
    }
}

/// Description of the array expected by a typed array load or store
fn array_description(insn: &Instruction) -> &'static str {
    use Instruction::*;
    match insn {
        IALoad | IAStore => "int[]",
        LALoad | LAStore => "long[]",
        FALoad | FAStore => "float[]",
        DALoad | DAStore => "double[]",
        BALoad | BAStore => "byte[] or boolean[]",
        CALoad | CAStore => "char[]",
        SALoad | SAStore => "short[]",
        _ => "reference array",
    }
}

/// Can a typed array load or store operate on arrays of this element type?
fn accepts_element(insn: &Instruction, element: &FieldType) -> bool {
    use Instruction::*;
    match (insn, element) {
        (IALoad | IAStore, FieldType::Base(BaseType::Int)) => true,
        (LALoad | LAStore, FieldType::Base(BaseType::Long)) => true,
        (FALoad | FAStore, FieldType::Base(BaseType::Float)) => true,
        (DALoad | DAStore, FieldType::Base(BaseType::Double)) => true,
        (BALoad | BAStore, FieldType::Base(BaseType::Byte | BaseType::Boolean)) => true,
        (CALoad | CAStore, FieldType::Base(BaseType::Char)) => true,
        (SALoad | SAStore, FieldType::Base(BaseType::Short)) => true,
        (AALoad | AAStore, FieldType::Ref(_)) => true,
        _ => false,
    }
}

/// Check a value read from a local (`loaded_from` is its index) or about to be stored in one
fn local_check(
    loaded_from: Option<u16>,
    value: &VerificationType,
    expected: VerificationType,
) -> Result<VerificationType, Error> {
    if let (Some(index), VerificationType::Top) = (loaded_from, value) {
        return Err(Error::invalid_state(StateErrorKind::UninitializedLocal(
            index as usize,
        )));
    }
    expect(value, expected.clone())?;
    Ok(expected)
}

impl<'h, H: TypeHierarchy + ?Sized> Interpreter for BasicVerifier<'h, H> {
    type Value = VerificationType;

    fn accepts(&self, opcode: u8) -> bool {
        self.accepted.contains(opcode)
    }

    fn new_value(&self, field_type: &FieldType) -> VerificationType {
        VerificationType::from(field_type.clone())
    }

    fn new_this(&self, method: &MethodContext) -> VerificationType {
        if method.is_constructor() {
            VerificationType::UninitializedThis
        } else {
            VerificationType::Object(RefType::Object(method.this_class.clone()))
        }
    }

    fn new_exception(&self, catch_type: Option<&BinaryName>) -> VerificationType {
        let class = catch_type.cloned().unwrap_or(BinaryName::THROWABLE);
        VerificationType::Object(RefType::Object(class))
    }

    fn new_operation(
        &self,
        position: usize,
        insn: &Instruction,
    ) -> Result<VerificationType, Error> {
        use Instruction::*;
        Ok(match insn {
            AConstNull => VerificationType::Null,
            IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | BiPush(_)
            | SiPush(_) => VerificationType::Integer,
            LConst0 | LConst1 => VerificationType::Long,
            FConst0 | FConst1 | FConst2 => VerificationType::Float,
            DConst0 | DConst1 => VerificationType::Double,
            Ldc(constant) => match constant {
                Constant::Integer(_) => VerificationType::Integer,
                Constant::Float(_) => VerificationType::Float,
                Constant::Long(_) => VerificationType::Long,
                Constant::Double(_) => VerificationType::Double,
                Constant::String(_) => VerificationType::Object(RefType::STRING),
                Constant::Class(_) => VerificationType::Object(RefType::CLASS),
                Constant::MethodType(_) => {
                    VerificationType::Object(RefType::Object(BinaryName::METHODTYPE))
                }
                Constant::MethodHandle => {
                    VerificationType::Object(RefType::Object(BinaryName::METHODHANDLE))
                }
                Constant::Dynamic(field_type) => VerificationType::from(field_type.clone()),
            },
            Jsr(_) => VerificationType::ReturnAddress(position + 1),
            GetStatic(field) => VerificationType::from(field.descriptor.clone()),
            New(class) => VerificationType::Uninitialized {
                offset: position,
                class: class.clone(),
            },
            _ => return Err(Error::invalid_opcode(insn.opcode())),
        })
    }

    fn copy_operation(
        &self,
        insn: &Instruction,
        value: &VerificationType,
    ) -> Result<VerificationType, Error> {
        use Instruction::*;
        match insn {
            ILoad(idx) => local_check(Some(*idx), value, VerificationType::Integer),
            LLoad(idx) => local_check(Some(*idx), value, VerificationType::Long),
            FLoad(idx) => local_check(Some(*idx), value, VerificationType::Float),
            DLoad(idx) => local_check(Some(*idx), value, VerificationType::Double),
            IStore(_) => local_check(None, value, VerificationType::Integer),
            LStore(_) => local_check(None, value, VerificationType::Long),
            FStore(_) => local_check(None, value, VerificationType::Float),
            DStore(_) => local_check(None, value, VerificationType::Double),
            ALoad(idx) => {
                if *value == VerificationType::Top {
                    return Err(Error::invalid_state(StateErrorKind::UninitializedLocal(
                        *idx as usize,
                    )));
                }
                expect_reference(value)?;
                Ok(value.clone())
            }
            AStore(_) => {
                if value.return_address().is_none() {
                    expect_reference(value)?;
                }
                Ok(value.clone())
            }
            _ => Err(Error::invalid_opcode(insn.opcode())),
        }
    }

    fn unary_operation(
        &self,
        insn: &Instruction,
        value: &VerificationType,
    ) -> Result<Option<VerificationType>, Error> {
        use Instruction::*;
        use VerificationType::{Double, Float, Integer, Long};

        let result = match insn {
            IInc(idx, _) => Some(local_check(Some(*idx), value, Integer)?),
            INeg | I2B | I2C | I2S => {
                expect(value, Integer)?;
                Some(Integer)
            }
            I2L => {
                expect(value, Integer)?;
                Some(Long)
            }
            I2F => {
                expect(value, Integer)?;
                Some(Float)
            }
            I2D => {
                expect(value, Integer)?;
                Some(Double)
            }
            LNeg => {
                expect(value, Long)?;
                Some(Long)
            }
            L2I => {
                expect(value, Long)?;
                Some(Integer)
            }
            L2F => {
                expect(value, Long)?;
                Some(Float)
            }
            L2D => {
                expect(value, Long)?;
                Some(Double)
            }
            FNeg => {
                expect(value, Float)?;
                Some(Float)
            }
            F2I => {
                expect(value, Float)?;
                Some(Integer)
            }
            F2L => {
                expect(value, Float)?;
                Some(Long)
            }
            F2D => {
                expect(value, Float)?;
                Some(Double)
            }
            DNeg => {
                expect(value, Double)?;
                Some(Double)
            }
            D2I => {
                expect(value, Double)?;
                Some(Integer)
            }
            D2L => {
                expect(value, Double)?;
                Some(Long)
            }
            D2F => {
                expect(value, Double)?;
                Some(Float)
            }
            If(_, _) | TableSwitch { .. } | LookupSwitch { .. } => {
                expect(value, Integer)?;
                None
            }
            IfNull(_, _) => {
                expect_reference(value)?;
                None
            }
            PutStatic(field) => {
                expect_field_type(value, &field.descriptor)?;
                None
            }
            GetField(field) => {
                expect_initialized(value)?;
                Some(VerificationType::from(field.descriptor.clone()))
            }
            NewArray(element_type) => {
                expect(value, Integer)?;
                let array_type = RefType::array(FieldType::Base(*element_type));
                Some(VerificationType::Object(array_type))
            }
            ANewArray(element_type) => {
                expect(value, Integer)?;
                let array_type = RefType::array(FieldType::Ref(element_type.clone()));
                Some(VerificationType::Object(array_type))
            }
            ArrayLength => {
                expect_array(value, "array", |_| true)?;
                Some(Integer)
            }
            AThrow | MonitorEnter | MonitorExit => {
                expect_initialized(value)?;
                None
            }
            CheckCast(ref_type) => {
                expect_initialized(value)?;
                Some(VerificationType::Object(ref_type.clone()))
            }
            InstanceOf(_) => {
                expect_initialized(value)?;
                Some(Integer)
            }
            _ => return Err(Error::invalid_opcode(insn.opcode())),
        };
        Ok(result)
    }

    fn binary_operation(
        &self,
        insn: &Instruction,
        value1: &VerificationType,
        value2: &VerificationType,
    ) -> Result<Option<VerificationType>, Error> {
        use Instruction::*;
        use VerificationType::{Double, Float, Integer, Long};

        let result = match insn {
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
                let element = expect_array(value1, array_description(insn), |element| {
                    accepts_element(insn, element)
                })?;
                expect(value2, Integer)?;
                Some(match (insn, element) {
                    (AALoad, Some(element)) => VerificationType::from(element),
                    (AALoad, None) => VerificationType::Null,
                    (LALoad, _) => Long,
                    (FALoad, _) => Float,
                    (DALoad, _) => Double,
                    _ => Integer,
                })
            }
            IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor | ISh(_) => {
                expect(value1, Integer)?;
                expect(value2, Integer)?;
                Some(Integer)
            }
            LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => {
                expect(value1, Long)?;
                expect(value2, Long)?;
                Some(Long)
            }
            LSh(_) => {
                expect(value1, Long)?;
                expect(value2, Integer)?;
                Some(Long)
            }
            FAdd | FSub | FMul | FDiv | FRem => {
                expect(value1, Float)?;
                expect(value2, Float)?;
                Some(Float)
            }
            DAdd | DSub | DMul | DDiv | DRem => {
                expect(value1, Double)?;
                expect(value2, Double)?;
                Some(Double)
            }
            LCmp => {
                expect(value1, Long)?;
                expect(value2, Long)?;
                Some(Integer)
            }
            FCmp(_) => {
                expect(value1, Float)?;
                expect(value2, Float)?;
                Some(Integer)
            }
            DCmp(_) => {
                expect(value1, Double)?;
                expect(value2, Double)?;
                Some(Integer)
            }
            IfICmp(_, _) => {
                expect(value1, Integer)?;
                expect(value2, Integer)?;
                None
            }
            IfACmp(_, _) => {
                expect_reference(value1)?;
                expect_reference(value2)?;
                None
            }
            PutField(field) => {
                // Constructors may set fields on `this` before calling the super constructor
                if *value1 != VerificationType::UninitializedThis {
                    expect_initialized(value1)?;
                }
                expect_field_type(value2, &field.descriptor)?;
                None
            }
            _ => return Err(Error::invalid_opcode(insn.opcode())),
        };
        Ok(result)
    }

    fn ternary_operation(
        &self,
        insn: &Instruction,
        value1: &VerificationType,
        value2: &VerificationType,
        value3: &VerificationType,
    ) -> Result<(), Error> {
        use Instruction::*;

        let element_value = match insn {
            IAStore | BAStore | CAStore | SAStore => VerificationType::Integer,
            LAStore => VerificationType::Long,
            FAStore => VerificationType::Float,
            DAStore => VerificationType::Double,
            AAStore => VerificationType::Null,
            _ => return Err(Error::invalid_opcode(insn.opcode())),
        };

        expect_array(value1, array_description(insn), |element| {
            accepts_element(insn, element)
        })?;
        expect(value2, VerificationType::Integer)?;
        if *insn == AAStore {
            expect_initialized(value3)
        } else {
            expect(value3, element_value)
        }
    }

    fn nary_operation(
        &self,
        insn: &Instruction,
        values: &[VerificationType],
    ) -> Result<Option<VerificationType>, Error> {
        match insn {
            Instruction::Invoke(invoke_type, method) => {
                let mut args = values;
                if *invoke_type != InvokeType::Static {
                    let (receiver, rest) = values
                        .split_first()
                        .ok_or_else(|| Error::invalid_state(StateErrorKind::EmptyStack))?;
                    if *invoke_type == InvokeType::Special && method.is_init() {
                        if !receiver.is_uninitialized() {
                            return Err(Error::invalid_state(StateErrorKind::NotUninitialized(
                                receiver.to_string(),
                            )));
                        }
                    } else {
                        expect_initialized(receiver)?;
                    }
                    args = rest;
                }
                for (arg, parameter) in args.iter().zip(&method.descriptor.parameters) {
                    expect_field_type(arg, parameter)?;
                }
                Ok(method.descriptor.return_type.clone().map(VerificationType::from))
            }
            Instruction::InvokeDynamic(call_site) => {
                for (arg, parameter) in values.iter().zip(&call_site.descriptor.parameters) {
                    expect_field_type(arg, parameter)?;
                }
                Ok(call_site
                    .descriptor
                    .return_type
                    .clone()
                    .map(VerificationType::from))
            }
            Instruction::MultiANewArray(array_type, dimensions) => {
                if *dimensions == 0 || *dimensions as usize > array_type.dimensions() {
                    return Err(Error::invalid_state(StateErrorKind::InvalidType {
                        expected: "array with enough dimensions",
                        found: array_type.internal_name(),
                    }));
                }
                for value in values {
                    expect(value, VerificationType::Integer)?;
                }
                Ok(Some(VerificationType::Object(array_type.clone())))
            }
            _ => Err(Error::invalid_opcode(insn.opcode())),
        }
    }

    fn return_operation(
        &self,
        insn: &Instruction,
        value: &VerificationType,
        expected: &FieldType,
    ) -> Result<(), Error> {
        let expected_value = VerificationType::from(expected.clone());
        let matches_opcode = match insn {
            Instruction::IReturn => expected_value == VerificationType::Integer,
            Instruction::LReturn => expected_value == VerificationType::Long,
            Instruction::FReturn => expected_value == VerificationType::Float,
            Instruction::DReturn => expected_value == VerificationType::Double,
            Instruction::AReturn => expected_value.is_reference(),
            _ => return Err(Error::invalid_opcode(insn.opcode())),
        };
        if !matches_opcode {
            return Err(Error::invalid_state(StateErrorKind::InvalidType {
                expected: insn.mnemonic(),
                found: expected_value.to_string(),
            }));
        }
        expect_field_type(value, expected)
    }

    fn initialize(
        &self,
        value: &VerificationType,
        method: &MethodContext,
    ) -> Result<VerificationType, Error> {
        match value {
            VerificationType::UninitializedThis => Ok(VerificationType::Object(RefType::Object(
                method.this_class.clone(),
            ))),
            VerificationType::Uninitialized { class, .. } => {
                Ok(VerificationType::Object(RefType::Object(class.clone())))
            }
            _ => Err(Error::invalid_state(StateErrorKind::NotUninitialized(
                value.to_string(),
            ))),
        }
    }

    fn merge(
        &self,
        value1: &VerificationType,
        value2: &VerificationType,
    ) -> Result<VerificationType, Error> {
        use VerificationType::{Null, Object, Top};
        Ok(match (value1, value2) {
            _ if value1 == value2 => value1.clone(),
            (Null, Object(_)) => value2.clone(),
            (Object(_), Null) => value1.clone(),
            (Object(type1), Object(type2)) => Object(self.merge_ref_types(type1, type2)?),
            _ => Top,
        })
    }
}
