use super::{BinaryName, Error, Name, StateErrorKind};
use crate::util::Width;
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self, Error> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => Err(bad_descriptor(format!(
                "Unexpected leftover input '{}' in '{}'",
                c, source
            ))),
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error>;
}

fn bad_descriptor(msg: impl Into<String>) -> Error {
    Error::invalid_state(StateErrorKind::BadDescriptor(msg.into()))
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    /// Element type code used by the `newarray` instruction
    pub const fn array_type_code(self) -> u8 {
        match self {
            BaseType::Boolean => 4,
            BaseType::Char => 5,
            BaseType::Float => 6,
            BaseType::Double => 7,
            BaseType::Byte => 8,
            BaseType::Short => 9,
            BaseType::Int => 10,
            BaseType::Long => 11,
        }
    }

    /// Inverse of `array_type_code`
    pub const fn from_array_type_code(code: u8) -> Option<BaseType> {
        match code {
            4 => Some(BaseType::Boolean),
            5 => Some(BaseType::Char),
            6 => Some(BaseType::Float),
            7 => Some(BaseType::Double),
            8 => Some(BaseType::Byte),
            9 => Some(BaseType::Short),
            10 => Some(BaseType::Int),
            11 => Some(BaseType::Long),
            _ => None,
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Byte
            | BaseType::Char
            | BaseType::Float
            | BaseType::Int
            | BaseType::Short
            | BaseType::Boolean => 1,
            BaseType::Double | BaseType::Long => 2,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => return Err(bad_descriptor(format!("Invalid base type character '{}'", c))),
            None => return Err(bad_descriptor("Missing base type character")),
        };
        Ok(typ)
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),
    ObjectArray(ArrayType<BinaryName>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T> ArrayType<T> {
    /// Total number of dimensions in the array type
    ///
    /// This is always just `additional_dimensions + 1`
    pub const fn dimensions(&self) -> usize {
        self.additional_dimensions + 1
    }
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        if let Some('L') = source.next() {
            let mut class_name = String::new();
            loop {
                let c: char = source.next().ok_or_else(|| {
                    bad_descriptor(format!("Missing terminator for 'L{}'", class_name))
                })?;
                if c == ';' {
                    return BinaryName::from_string(class_name)
                        .map_err(|msg| Error::invalid_state(StateErrorKind::BadName(msg)));
                } else {
                    class_name.push(c)
                }
            }
        } else {
            Err(bad_descriptor("Expected object type to start with `L`"))
        }
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
        }
    }
}

impl ParseDescriptor for RefType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        Ok(match source.peek().copied() {
            Some('L') => RefType::Object(BinaryName::parse_from(source)?),
            Some('[') => {
                source.next();
                let mut additional_dimensions = 0;
                while source.next_if_eq(&'[').is_some() {
                    additional_dimensions += 1;
                }
                if let Some('L') = source.peek().copied() {
                    RefType::ObjectArray(ArrayType {
                        additional_dimensions,
                        element_type: BinaryName::parse_from(source)?,
                    })
                } else {
                    RefType::PrimitiveArray(ArrayType {
                        additional_dimensions,
                        element_type: BaseType::parse_from(source)?,
                    })
                }
            }
            Some(c) => {
                return Err(bad_descriptor(format!(
                    "Invalid reference type character '{}'",
                    c
                )))
            }
            None => return Err(bad_descriptor("Missing field type")),
        })
    }
}

impl RefType {
    pub const OBJECT: RefType = RefType::Object(BinaryName::OBJECT);
    pub const STRING: RefType = RefType::Object(BinaryName::STRING);
    pub const CLASS: RefType = RefType::Object(BinaryName::CLASS);
    pub const THROWABLE: RefType = RefType::Object(BinaryName::THROWABLE);

    /// Parse the "internal" form used by type instructions and class constants: a plain binary
    /// name for classes (`java/lang/String`) or a descriptor for arrays (`[Ljava/lang/String;`)
    pub fn from_internal_name(name: &str) -> Result<RefType, Error> {
        if name.starts_with('[') {
            RefType::parse(name)
        } else {
            BinaryName::from_string(name.to_owned())
                .map(RefType::Object)
                .map_err(|msg| Error::invalid_state(StateErrorKind::BadName(msg)))
        }
    }

    /// Inverse of `from_internal_name`
    pub fn internal_name(&self) -> String {
        match self {
            RefType::Object(cls) => cls.as_str().to_owned(),
            _ => self.render(),
        }
    }

    /// Array whose elements have the given type
    pub fn array(field_type: FieldType) -> RefType {
        match field_type {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::PrimitiveArray(arr)) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
            FieldType::Ref(RefType::ObjectArray(arr)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
        }
    }

    /// Element type of an array type (`None` if this is not an array)
    pub fn component(&self) -> Option<FieldType> {
        match self {
            RefType::Object(_) => None,
            RefType::PrimitiveArray(arr) if arr.additional_dimensions == 0 => {
                Some(FieldType::Base(arr.element_type))
            }
            RefType::PrimitiveArray(arr) => {
                Some(FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                    additional_dimensions: arr.additional_dimensions - 1,
                    element_type: arr.element_type,
                })))
            }
            RefType::ObjectArray(arr) if arr.additional_dimensions == 0 => {
                Some(FieldType::object(arr.element_type.clone()))
            }
            RefType::ObjectArray(arr) => Some(FieldType::Ref(RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions - 1,
                element_type: arr.element_type.clone(),
            }))),
        }
    }

    /// Number of array dimensions (0 for non-array types)
    pub fn dimensions(&self) -> usize {
        match self {
            RefType::Object(_) => 0,
            RefType::PrimitiveArray(arr) => arr.dimensions(),
            RefType::ObjectArray(arr) => arr.dimensions(),
        }
    }
}

/// Type of a class, instance, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl FieldType {
    pub fn array(field_type: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(field_type))
    }

    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    pub const fn boolean() -> FieldType {
        FieldType::Base(BaseType::Boolean)
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.peek().copied() {
            None => Err(bad_descriptor("Missing field type")),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L' | '[') => RefType::parse_from(source).map(FieldType::Ref),
            Some(c) => Err(bad_descriptor(format!(
                "Invalid field type character '{}'",
                c
            ))),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>, // `None` is for `void` (ie. no return)
}

impl MethodDescriptor {
    /// Total length of parameters (not the same as the length of the vector),
    /// which must be 255 or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        // Assert open paren
        if source.next_if_eq(&'(').is_none() {
            return Err(bad_descriptor("Expected '(' for method"));
        }

        // Parse parameters
        let mut parameters = vec![];
        while source.peek().map_or(false, |c| *c != ')') {
            parameters.push(FieldType::parse_from(source)?);
        }

        // Assert close paren
        if source.next_if_eq(&')').is_none() {
            return Err(bad_descriptor("Expected ')' for method"));
        }

        // Parse return
        let return_type = if source.next_if_eq(&'V').is_some() {
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}
