//! This module contains the AST of JVM bytecode. The representation is slightly different from
//! the usual presentation, to make it more convenient to analyze. For instance:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Instructions that differ only in an implicit operand (`iload_0`, `ldc_w`, `goto_w`, etc.)
//!     are collapsed into one variant with an explicit operand
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches.
//!
//! Instructions can also be built from a raw opcode number and operands of a particular
//! category (see [`Instruction::simple`], [`Instruction::var`], etc.). Those constructors reject
//! opcodes that don't belong to the category with [`Error::InvalidOpcode`].

use super::opcodes::{self, *};
use super::Label;
use crate::jvm::{
    parse_name, BaseType, BinaryName, Error, FieldType, MethodDescriptor, ParseDescriptor, RefType,
    StateErrorKind, UnqualifiedName,
};

/// JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers `ldc`, `ldc_w`, and `ldc2_w`
    ILoad(u16),    // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, Label),
    IfICmp(OrdComparison, Label),
    IfACmp(EqComparison, Label),
    Goto(Label), // covers `goto` and `goto_w`
    Jsr(Label),  // covers `jsr` and `jsr_w`
    Ret(u16),
    TableSwitch {
        low: i32,
        default: Label,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        targets: Vec<(i32, Label)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    InvokeDynamic(InvokeDynamicRef),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType),
    ArrayLength,
    AThrow,
    CheckCast(RefType),
    InstanceOf(RefType),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(RefType, u8),
    IfNull(EqComparison, Label), // covers `ifnull` and `ifnonnull`
}

/// Loadable constant
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType),
    MethodType(MethodDescriptor),
    MethodHandle,

    /// Dynamically computed constant, with its field descriptor
    Dynamic(FieldType),
}

impl Constant {
    /// Is this a category 2 constant (loaded with `ldc2_w`)?
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// Field referenced by a field instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

/// Method referenced by an invoke instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Owner of the method (this can be an array type, eg. for `clone`)
    pub class: RefType,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub is_interface: bool,
}

impl MethodRef {
    /// Is this an instance initialization method?
    pub fn is_init(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }
}

/// Call site of an `invokedynamic`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvokeDynamicRef {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

/// Shift operations
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

impl Instruction {
    /// Opcode of the instruction
    ///
    /// For instructions that cover several opcodes, this is the most general one (`iload` instead
    /// of `iload_0`, `goto` instead of `goto_w`, etc.).
    pub fn opcode(&self) -> u8 {
        use Instruction::*;
        match self {
            Nop => NOP,
            AConstNull => ACONST_NULL,
            IConstM1 => ICONST_M1,
            IConst0 => ICONST_0,
            IConst1 => ICONST_1,
            IConst2 => ICONST_2,
            IConst3 => ICONST_3,
            IConst4 => ICONST_4,
            IConst5 => ICONST_5,
            LConst0 => LCONST_0,
            LConst1 => LCONST_1,
            FConst0 => FCONST_0,
            FConst1 => FCONST_1,
            FConst2 => FCONST_2,
            DConst0 => DCONST_0,
            DConst1 => DCONST_1,
            BiPush(_) => BIPUSH,
            SiPush(_) => SIPUSH,
            Ldc(constant) if constant.is_wide() => LDC2_W,
            Ldc(_) => LDC,
            ILoad(_) => ILOAD,
            LLoad(_) => LLOAD,
            FLoad(_) => FLOAD,
            DLoad(_) => DLOAD,
            ALoad(_) => ALOAD,
            IALoad => IALOAD,
            LALoad => LALOAD,
            FALoad => FALOAD,
            DALoad => DALOAD,
            AALoad => AALOAD,
            BALoad => BALOAD,
            CALoad => CALOAD,
            SALoad => SALOAD,
            IStore(_) => ISTORE,
            LStore(_) => LSTORE,
            FStore(_) => FSTORE,
            DStore(_) => DSTORE,
            AStore(_) => ASTORE,
            IAStore => IASTORE,
            LAStore => LASTORE,
            FAStore => FASTORE,
            DAStore => DASTORE,
            AAStore => AASTORE,
            BAStore => BASTORE,
            CAStore => CASTORE,
            SAStore => SASTORE,
            Pop => POP,
            Pop2 => POP2,
            Dup => DUP,
            DupX1 => DUP_X1,
            DupX2 => DUP_X2,
            Dup2 => DUP2,
            Dup2X1 => DUP2_X1,
            Dup2X2 => DUP2_X2,
            Swap => SWAP,
            IAdd => IADD,
            LAdd => LADD,
            FAdd => FADD,
            DAdd => DADD,
            ISub => ISUB,
            LSub => LSUB,
            FSub => FSUB,
            DSub => DSUB,
            IMul => IMUL,
            LMul => LMUL,
            FMul => FMUL,
            DMul => DMUL,
            IDiv => IDIV,
            LDiv => LDIV,
            FDiv => FDIV,
            DDiv => DDIV,
            IRem => IREM,
            LRem => LREM,
            FRem => FREM,
            DRem => DREM,
            INeg => INEG,
            LNeg => LNEG,
            FNeg => FNEG,
            DNeg => DNEG,
            ISh(ShiftType::Left) => ISHL,
            ISh(ShiftType::ArithmeticRight) => ISHR,
            ISh(ShiftType::LogicalRight) => IUSHR,
            LSh(ShiftType::Left) => LSHL,
            LSh(ShiftType::ArithmeticRight) => LSHR,
            LSh(ShiftType::LogicalRight) => LUSHR,
            IAnd => IAND,
            LAnd => LAND,
            IOr => IOR,
            LOr => LOR,
            IXor => IXOR,
            LXor => LXOR,
            IInc(_, _) => IINC,
            Instruction::I2L => opcodes::I2L,
            Instruction::I2F => opcodes::I2F,
            Instruction::I2D => opcodes::I2D,
            Instruction::L2I => opcodes::L2I,
            Instruction::L2F => opcodes::L2F,
            Instruction::L2D => opcodes::L2D,
            Instruction::F2I => opcodes::F2I,
            Instruction::F2L => opcodes::F2L,
            Instruction::F2D => opcodes::F2D,
            Instruction::D2I => opcodes::D2I,
            Instruction::D2L => opcodes::D2L,
            Instruction::D2F => opcodes::D2F,
            Instruction::I2B => opcodes::I2B,
            Instruction::I2C => opcodes::I2C,
            Instruction::I2S => opcodes::I2S,
            LCmp => LCMP,
            FCmp(CompareMode::L) => FCMPL,
            FCmp(CompareMode::G) => FCMPG,
            DCmp(CompareMode::L) => DCMPL,
            DCmp(CompareMode::G) => DCMPG,
            If(OrdComparison::EQ, _) => IFEQ,
            If(OrdComparison::NE, _) => IFNE,
            If(OrdComparison::LT, _) => IFLT,
            If(OrdComparison::GE, _) => IFGE,
            If(OrdComparison::GT, _) => IFGT,
            If(OrdComparison::LE, _) => IFLE,
            IfICmp(OrdComparison::EQ, _) => IF_ICMPEQ,
            IfICmp(OrdComparison::NE, _) => IF_ICMPNE,
            IfICmp(OrdComparison::LT, _) => IF_ICMPLT,
            IfICmp(OrdComparison::GE, _) => IF_ICMPGE,
            IfICmp(OrdComparison::GT, _) => IF_ICMPGT,
            IfICmp(OrdComparison::LE, _) => IF_ICMPLE,
            IfACmp(EqComparison::EQ, _) => IF_ACMPEQ,
            IfACmp(EqComparison::NE, _) => IF_ACMPNE,
            Goto(_) => GOTO,
            Jsr(_) => JSR,
            Ret(_) => RET,
            TableSwitch { .. } => TABLESWITCH,
            LookupSwitch { .. } => LOOKUPSWITCH,
            IReturn => IRETURN,
            LReturn => LRETURN,
            FReturn => FRETURN,
            DReturn => DRETURN,
            AReturn => ARETURN,
            Return => RETURN,
            GetStatic(_) => GETSTATIC,
            PutStatic(_) => PUTSTATIC,
            GetField(_) => GETFIELD,
            PutField(_) => PUTFIELD,
            Invoke(InvokeType::Virtual, _) => INVOKEVIRTUAL,
            Invoke(InvokeType::Special, _) => INVOKESPECIAL,
            Invoke(InvokeType::Static, _) => INVOKESTATIC,
            Invoke(InvokeType::Interface, _) => INVOKEINTERFACE,
            InvokeDynamic(_) => INVOKEDYNAMIC,
            New(_) => NEW,
            NewArray(_) => NEWARRAY,
            ANewArray(_) => ANEWARRAY,
            ArrayLength => ARRAYLENGTH,
            AThrow => ATHROW,
            CheckCast(_) => CHECKCAST,
            InstanceOf(_) => INSTANCEOF,
            MonitorEnter => MONITORENTER,
            MonitorExit => MONITOREXIT,
            MultiANewArray(_, _) => MULTIANEWARRAY,
            IfNull(EqComparison::EQ, _) => IFNULL,
            IfNull(EqComparison::NE, _) => IFNONNULL,
        }
    }

    /// Mnemonic of the instruction's opcode
    pub fn mnemonic(&self) -> &'static str {
        opcodes::mnemonic(self.opcode()).unwrap_or("<unknown>")
    }

    /// Can execution continue to the next instruction?
    ///
    /// Note that this is `false` for `jsr`: control only comes back to the next instruction
    /// through a `ret`.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::Jsr(_)
                | Instruction::Ret(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
                | Instruction::AThrow
        )
    }

    /// Labels this instruction may explicitly jump to (in order, possibly with repeats)
    pub fn jump_targets(&self) -> Vec<Label> {
        match self {
            Instruction::If(_, target)
            | Instruction::IfICmp(_, target)
            | Instruction::IfACmp(_, target)
            | Instruction::IfNull(_, target)
            | Instruction::Goto(target)
            | Instruction::Jsr(target) => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut labels = vec![*default];
                labels.extend(targets.iter().copied());
                labels
            }
            Instruction::LookupSwitch { default, targets } => {
                let mut labels = vec![*default];
                labels.extend(targets.iter().map(|(_, target)| *target));
                labels
            }
            _ => vec![],
        }
    }

    /// Is this one of the two switch instructions?
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. }
        )
    }

    /// Instruction with no operands
    pub fn simple(opcode: u8) -> Result<Instruction, Error> {
        use Instruction::*;
        let insn = match opcode {
            NOP => Nop,
            ACONST_NULL => AConstNull,
            ICONST_M1 => IConstM1,
            ICONST_0 => IConst0,
            ICONST_1 => IConst1,
            ICONST_2 => IConst2,
            ICONST_3 => IConst3,
            ICONST_4 => IConst4,
            ICONST_5 => IConst5,
            LCONST_0 => LConst0,
            LCONST_1 => LConst1,
            FCONST_0 => FConst0,
            FCONST_1 => FConst1,
            FCONST_2 => FConst2,
            DCONST_0 => DConst0,
            DCONST_1 => DConst1,
            ILOAD_0..=ILOAD_3 => ILoad((opcode - ILOAD_0) as u16),
            LLOAD_0..=LLOAD_3 => LLoad((opcode - LLOAD_0) as u16),
            FLOAD_0..=FLOAD_3 => FLoad((opcode - FLOAD_0) as u16),
            DLOAD_0..=DLOAD_3 => DLoad((opcode - DLOAD_0) as u16),
            ALOAD_0..=ALOAD_3 => ALoad((opcode - ALOAD_0) as u16),
            IALOAD => IALoad,
            LALOAD => LALoad,
            FALOAD => FALoad,
            DALOAD => DALoad,
            AALOAD => AALoad,
            BALOAD => BALoad,
            CALOAD => CALoad,
            SALOAD => SALoad,
            ISTORE_0..=ISTORE_3 => IStore((opcode - ISTORE_0) as u16),
            LSTORE_0..=LSTORE_3 => LStore((opcode - LSTORE_0) as u16),
            FSTORE_0..=FSTORE_3 => FStore((opcode - FSTORE_0) as u16),
            DSTORE_0..=DSTORE_3 => DStore((opcode - DSTORE_0) as u16),
            ASTORE_0..=ASTORE_3 => AStore((opcode - ASTORE_0) as u16),
            IASTORE => IAStore,
            LASTORE => LAStore,
            FASTORE => FAStore,
            DASTORE => DAStore,
            AASTORE => AAStore,
            BASTORE => BAStore,
            CASTORE => CAStore,
            SASTORE => SAStore,
            POP => Pop,
            POP2 => Pop2,
            DUP => Dup,
            DUP_X1 => DupX1,
            DUP_X2 => DupX2,
            DUP2 => Dup2,
            DUP2_X1 => Dup2X1,
            DUP2_X2 => Dup2X2,
            SWAP => Swap,
            IADD => IAdd,
            LADD => LAdd,
            FADD => FAdd,
            DADD => DAdd,
            ISUB => ISub,
            LSUB => LSub,
            FSUB => FSub,
            DSUB => DSub,
            IMUL => IMul,
            LMUL => LMul,
            FMUL => FMul,
            DMUL => DMul,
            IDIV => IDiv,
            LDIV => LDiv,
            FDIV => FDiv,
            DDIV => DDiv,
            IREM => IRem,
            LREM => LRem,
            FREM => FRem,
            DREM => DRem,
            INEG => INeg,
            LNEG => LNeg,
            FNEG => FNeg,
            DNEG => DNeg,
            ISHL => ISh(ShiftType::Left),
            ISHR => ISh(ShiftType::ArithmeticRight),
            IUSHR => ISh(ShiftType::LogicalRight),
            LSHL => LSh(ShiftType::Left),
            LSHR => LSh(ShiftType::ArithmeticRight),
            LUSHR => LSh(ShiftType::LogicalRight),
            IAND => IAnd,
            LAND => LAnd,
            IOR => IOr,
            LOR => LOr,
            IXOR => IXor,
            LXOR => LXor,
            opcodes::I2L => Instruction::I2L,
            opcodes::I2F => Instruction::I2F,
            opcodes::I2D => Instruction::I2D,
            opcodes::L2I => Instruction::L2I,
            opcodes::L2F => Instruction::L2F,
            opcodes::L2D => Instruction::L2D,
            opcodes::F2I => Instruction::F2I,
            opcodes::F2L => Instruction::F2L,
            opcodes::F2D => Instruction::F2D,
            opcodes::D2I => Instruction::D2I,
            opcodes::D2L => Instruction::D2L,
            opcodes::D2F => Instruction::D2F,
            opcodes::I2B => Instruction::I2B,
            opcodes::I2C => Instruction::I2C,
            opcodes::I2S => Instruction::I2S,
            LCMP => LCmp,
            FCMPL => FCmp(CompareMode::L),
            FCMPG => FCmp(CompareMode::G),
            DCMPL => DCmp(CompareMode::L),
            DCMPG => DCmp(CompareMode::G),
            IRETURN => IReturn,
            LRETURN => LReturn,
            FRETURN => FReturn,
            DRETURN => DReturn,
            ARETURN => AReturn,
            RETURN => Return,
            ARRAYLENGTH => ArrayLength,
            ATHROW => AThrow,
            MONITORENTER => MonitorEnter,
            MONITOREXIT => MonitorExit,
            _ => return Err(Error::invalid_opcode(opcode)),
        };
        Ok(insn)
    }

    /// Instruction with a single integer operand (`bipush`, `sipush`, `newarray`)
    pub fn int(opcode: u8, operand: i32) -> Result<Instruction, Error> {
        let bad_operand = || Error::invalid_opcode(opcode);
        match opcode {
            BIPUSH => i8::try_from(operand)
                .map(Instruction::BiPush)
                .map_err(|_| bad_operand()),
            SIPUSH => i16::try_from(operand)
                .map(Instruction::SiPush)
                .map_err(|_| bad_operand()),
            NEWARRAY => u8::try_from(operand)
                .ok()
                .and_then(BaseType::from_array_type_code)
                .map(Instruction::NewArray)
                .ok_or_else(bad_operand),
            _ => Err(Error::invalid_opcode(opcode)),
        }
    }

    /// Instruction with a local variable operand (loads, stores, `ret`)
    pub fn var(opcode: u8, var: u16) -> Result<Instruction, Error> {
        let insn = match opcode {
            ILOAD => Instruction::ILoad(var),
            LLOAD => Instruction::LLoad(var),
            FLOAD => Instruction::FLoad(var),
            DLOAD => Instruction::DLoad(var),
            ALOAD => Instruction::ALoad(var),
            ISTORE => Instruction::IStore(var),
            LSTORE => Instruction::LStore(var),
            FSTORE => Instruction::FStore(var),
            DSTORE => Instruction::DStore(var),
            ASTORE => Instruction::AStore(var),
            RET => Instruction::Ret(var),
            _ => return Err(Error::invalid_opcode(opcode)),
        };
        Ok(insn)
    }

    /// Instruction with a type operand, given in internal form (`java/lang/String` or `[I`)
    pub fn type_insn(opcode: u8, internal_name: &str) -> Result<Instruction, Error> {
        if !matches!(opcode, NEW | ANEWARRAY | CHECKCAST | INSTANCEOF) {
            return Err(Error::invalid_opcode(opcode));
        }
        let ref_type = RefType::from_internal_name(internal_name)?;
        let insn = match (opcode, ref_type) {
            (NEW, RefType::Object(class)) => Instruction::New(class),
            (NEW, array) => {
                return Err(Error::invalid_state(StateErrorKind::InvalidType {
                    expected: "class type",
                    found: array.internal_name(),
                }))
            }
            (ANEWARRAY, ref_type) => Instruction::ANewArray(ref_type),
            (CHECKCAST, ref_type) => Instruction::CheckCast(ref_type),
            (_, ref_type) => Instruction::InstanceOf(ref_type),
        };
        Ok(insn)
    }

    /// Field instruction
    pub fn field(
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Instruction, Error> {
        if !matches!(opcode, GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD) {
            return Err(Error::invalid_opcode(opcode));
        }
        let field = FieldRef {
            class: parse_name(owner)?,
            name: parse_name(name)?,
            descriptor: FieldType::parse(descriptor)?,
        };
        let insn = match opcode {
            GETSTATIC => Instruction::GetStatic(field),
            PUTSTATIC => Instruction::PutStatic(field),
            GETFIELD => Instruction::GetField(field),
            _ => Instruction::PutField(field),
        };
        Ok(insn)
    }

    /// Method invocation instruction (other than `invokedynamic`)
    pub fn method(
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<Instruction, Error> {
        let invoke_type = match opcode {
            INVOKEVIRTUAL => InvokeType::Virtual,
            INVOKESPECIAL => InvokeType::Special,
            INVOKESTATIC => InvokeType::Static,
            INVOKEINTERFACE => InvokeType::Interface,
            _ => return Err(Error::invalid_opcode(opcode)),
        };
        let method = MethodRef {
            class: RefType::from_internal_name(owner)?,
            name: parse_name(name)?,
            descriptor: MethodDescriptor::parse(descriptor)?,
            is_interface,
        };
        Ok(Instruction::Invoke(invoke_type, method))
    }

    /// `invokedynamic` call site
    pub fn invoke_dynamic(name: &str, descriptor: &str) -> Result<Instruction, Error> {
        Ok(Instruction::InvokeDynamic(InvokeDynamicRef {
            name: parse_name(name)?,
            descriptor: MethodDescriptor::parse(descriptor)?,
        }))
    }

    /// Jump instruction with a single target
    pub fn jump(opcode: u8, target: Label) -> Result<Instruction, Error> {
        let insn = match opcode {
            IFEQ => Instruction::If(OrdComparison::EQ, target),
            IFNE => Instruction::If(OrdComparison::NE, target),
            IFLT => Instruction::If(OrdComparison::LT, target),
            IFGE => Instruction::If(OrdComparison::GE, target),
            IFGT => Instruction::If(OrdComparison::GT, target),
            IFLE => Instruction::If(OrdComparison::LE, target),
            IF_ICMPEQ => Instruction::IfICmp(OrdComparison::EQ, target),
            IF_ICMPNE => Instruction::IfICmp(OrdComparison::NE, target),
            IF_ICMPLT => Instruction::IfICmp(OrdComparison::LT, target),
            IF_ICMPGE => Instruction::IfICmp(OrdComparison::GE, target),
            IF_ICMPGT => Instruction::IfICmp(OrdComparison::GT, target),
            IF_ICMPLE => Instruction::IfICmp(OrdComparison::LE, target),
            IF_ACMPEQ => Instruction::IfACmp(EqComparison::EQ, target),
            IF_ACMPNE => Instruction::IfACmp(EqComparison::NE, target),
            GOTO | GOTO_W => Instruction::Goto(target),
            JSR | JSR_W => Instruction::Jsr(target),
            IFNULL => Instruction::IfNull(EqComparison::EQ, target),
            IFNONNULL => Instruction::IfNull(EqComparison::NE, target),
            _ => return Err(Error::invalid_opcode(opcode)),
        };
        Ok(insn)
    }
}
