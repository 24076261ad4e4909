use super::{Error, StateErrorKind};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, written with `/` separators (eg. `java/lang/String`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

/// Parse a name, reporting invalid names as [`StateErrorKind::BadName`]
pub fn parse_name<N: Name>(name: &str) -> Result<N, Error> {
    N::from_string(name.to_owned())
        .map_err(|msg| Error::invalid_state(StateErrorKind::BadName(msg)))
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Is this one of the two special names, `<init>` and `<clinit>`?
    pub fn is_special(&self) -> bool {
        *self == Self::INIT || *self == Self::CLINIT
    }

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const ARITHMETICEXCEPTION: Self = Self::name("java/lang/ArithmeticException");
    pub const ARRAYINDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/ArrayIndexOutOfBoundsException");
    pub const ARRAYLIST: Self = Self::name("java/util/ArrayList");
    pub const ASSERTIONERROR: Self = Self::name("java/lang/AssertionError");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLASSCASTEXCEPTION: Self = Self::name("java/lang/ClassCastException");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const COLLECTION: Self = Self::name("java/util/Collection");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const ILLEGALSTATEEXCEPTION: Self = Self::name("java/lang/IllegalStateException");
    pub const INDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/IndexOutOfBoundsException");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const IOEXCEPTION: Self = Self::name("java/io/IOException");
    pub const ITERABLE: Self = Self::name("java/lang/Iterable");
    pub const LIST: Self = Self::name("java/util/List");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const NULLPOINTEREXCEPTION: Self = Self::name("java/lang/NullPointerException");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const STRINGBUILDER: Self = Self::name("java/lang/StringBuilder");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(BinaryName::from_string(String::from("java/lang/String")).is_ok());
        assert!(BinaryName::from_string(String::from("Test")).is_ok());
        assert!(BinaryName::from_string(String::from("java//String")).is_err());
        assert!(BinaryName::from_string(String::from("[I")).is_err());
        assert!(UnqualifiedName::from_string(String::from("foo")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("a/b")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
    }

    #[test]
    fn special_names() {
        assert!(UnqualifiedName::INIT.is_special());
        assert!(UnqualifiedName::CLINIT.is_special());
        let name = UnqualifiedName::from_string(String::from("run")).unwrap();
        assert!(!name.is_special());
        assert_eq!(UnqualifiedName::INIT.as_str(), "<init>");
    }
}
