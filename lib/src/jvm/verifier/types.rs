use super::Value;
use crate::jvm::{BaseType, BinaryName, Error, FieldType, RefType, RenderDescriptor};
use crate::util::Width;
use std::fmt;

/// These types are from [this hierarchy][0], extended with a `Top` element (for unusable slots
/// and the second half of `long`/`double` locals) and with return addresses (for subroutines)
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType {
    /// Nothing usable: an unset local, the filler slot after a `long` or `double` local, or the
    /// result of merging incompatible types
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object or array type
    Object(RefType),

    /// State of an object after `new` has been called but `<init>` has not been called
    Uninitialized {
        /// Position of the `new` instruction that created the object
        offset: usize,

        /// Class the object will have once it is initialized
        class: BinaryName,
    },

    /// Return address pushed by `jsr` (the position execution returns to)
    ReturnAddress(usize),
}

impl VerificationType {
    /// Construct an object or array type from its internal name (eg. `java/lang/String` or `[I`)
    pub fn reference(internal_name: &str) -> Result<VerificationType, Error> {
        RefType::from_internal_name(internal_name).map(VerificationType::Object)
    }

    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long
            | VerificationType::ReturnAddress(_) => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized { .. } => true,
        }
    }

    /// Is this a reference to an object that has not had its constructor run?
    pub fn is_uninitialized(&self) -> bool {
        matches!(
            self,
            VerificationType::UninitializedThis | VerificationType::Uninitialized { .. }
        )
    }
}

impl From<FieldType> for VerificationType {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(ref_type) => VerificationType::Object(ref_type),
        }
    }
}

impl Width for VerificationType {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl Value for VerificationType {
    fn top() -> Self {
        VerificationType::Top
    }

    fn return_address(&self) -> Option<usize> {
        match self {
            VerificationType::ReturnAddress(target) => Some(*target),
            _ => None,
        }
    }
}

/// Compact rendering used in diagnostics: primitives as their descriptor character, classes by
/// internal name, arrays as descriptors
impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("I"),
            VerificationType::Float => f.write_str("F"),
            VerificationType::Double => f.write_str("D"),
            VerificationType::Long => f.write_str("J"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis => f.write_str("uninitialized_this"),
            VerificationType::Object(RefType::Object(class)) => f.write_str(class.as_ref()),
            VerificationType::Object(ref_type) => f.write_str(&ref_type.render()),
            VerificationType::Uninitialized { offset, class } => {
                write!(f, "uninitialized({}@{})", class, offset)
            }
            VerificationType::ReturnAddress(target) => write!(f, "ret({})", target),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn field_types_are_lowered() {
        assert_eq!(
            VerificationType::from(FieldType::boolean()),
            VerificationType::Integer
        );
        assert_eq!(
            VerificationType::from(FieldType::Base(BaseType::Char)),
            VerificationType::Integer
        );
        assert_eq!(
            VerificationType::from(FieldType::long()),
            VerificationType::Long
        );
        assert_eq!(
            VerificationType::from(FieldType::object(BinaryName::STRING)),
            VerificationType::Object(RefType::STRING)
        );
    }

    #[test]
    fn widths_and_categories() {
        assert_eq!(VerificationType::Long.width(), 2);
        assert_eq!(VerificationType::Double.width(), 2);
        assert_eq!(VerificationType::Top.width(), 1);
        assert!(VerificationType::Null.is_reference());
        assert!(VerificationType::UninitializedThis.is_uninitialized());
        assert!(!VerificationType::ReturnAddress(3).is_reference());
        assert!(!VerificationType::Top.is_reference());
    }

    #[test]
    fn display() {
        let strings = VerificationType::reference("[Ljava/lang/String;").unwrap();
        assert_eq!(strings.to_string(), "[Ljava/lang/String;");
        let string = VerificationType::reference("java/lang/String").unwrap();
        assert_eq!(string.to_string(), "java/lang/String");
        assert_eq!(VerificationType::Long.to_string(), "J");
        let uninit = VerificationType::Uninitialized {
            offset: 4,
            class: BinaryName::STRINGBUILDER,
        };
        assert_eq!(uninit.to_string(), "uninitialized(java/lang/StringBuilder@4)");
    }
}
