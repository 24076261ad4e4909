//! Type hierarchy oracle
//!
//! Merging two reference types during frame computation needs one piece of information about
//! the class hierarchy: the most specific common superclass of two classes. That question is
//! captured by [`TypeHierarchy`], which embedders can implement however they like (by consulting
//! a class path, a class loader, etc.).
//!
//! [`ClassHierarchy`] is a ready-made implementation backed by a table of classes. It can be
//! shared across threads and extended with new classes while it is being queried.

use super::{BinaryName, Error, StateErrorKind};
use elsa::sync::FrozenMap;
use std::fmt;

mod assignable;
mod java_lib_types;

pub use assignable::*;

/// Source of information about superclasses
///
/// Implementations must be safe to query concurrently, since independent method analyses may
/// share one hierarchy. A failure is propagated as the failure of the analysis that asked.
pub trait TypeHierarchy: Sync {
    /// Most specific type that both types can be assigned to
    ///
    /// When one type is assignable to the other, that type is the answer, even if it is an
    /// interface (`String` and `CharSequence` give `CharSequence`). Otherwise, if either type is an
    /// interface, the answer is `java/lang/Object`, and for two classes it is their closest common
    /// superclass.
    fn common_superclass(
        &self,
        type1: &BinaryName,
        type2: &BinaryName,
    ) -> Result<BinaryName, Error>;
}

impl<F> TypeHierarchy for F
where
    F: Fn(&BinaryName, &BinaryName) -> Result<BinaryName, Error> + Sync,
{
    fn common_superclass(
        &self,
        type1: &BinaryName,
        type2: &BinaryName,
    ) -> Result<BinaryName, Error> {
        self(type1, type2)
    }
}

/// Table of known classes and interfaces
pub struct ClassHierarchy {
    classes: FrozenMap<BinaryName, Box<ClassData>>,
}

impl ClassHierarchy {
    /// New hierarchy containing only `java/lang/Object`
    pub fn new() -> Self {
        let hierarchy = ClassHierarchy {
            classes: FrozenMap::new(),
        };
        hierarchy.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: vec![],
            is_interface: false,
        });
        hierarchy
    }

    /// New hierarchy with common classes from the Java standard library
    pub fn with_java_library_types() -> Self {
        let hierarchy = ClassHierarchy::new();
        hierarchy.insert_java_library_types();
        hierarchy
    }

    /// Add a class to the hierarchy
    ///
    /// If a class with the same name is already present, the existing entry is kept and returned.
    pub fn add_class(&self, data: ClassData) -> &ClassData {
        self.classes.insert(data.name.clone(), Box::new(data))
    }

    /// Shorthand for adding a class with no interfaces
    pub fn add_simple_class(&self, name: BinaryName, superclass: BinaryName) -> &ClassData {
        self.add_class(ClassData {
            name,
            superclass: Some(superclass),
            interfaces: vec![],
            is_interface: false,
        })
    }

    pub fn lookup_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.classes.get(name)
    }

    /// Look up a class, failing if it is not in the hierarchy
    pub fn class(&self, name: &BinaryName) -> Result<&ClassData, Error> {
        self.lookup_class(name).ok_or_else(|| {
            Error::invalid_state(StateErrorKind::MissingClass(name.as_ref().to_owned()))
        })
    }
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        ClassHierarchy::new()
    }
}

impl TypeHierarchy for ClassHierarchy {
    fn common_superclass(
        &self,
        type1: &BinaryName,
        type2: &BinaryName,
    ) -> Result<BinaryName, Error> {
        if type1 == type2 {
            return Ok(type1.clone());
        }
        let class1 = self.class(type1)?;
        let class2 = self.class(type2)?;

        if self.is_assignable(class2, class1)? {
            return Ok(type1.clone());
        }
        if self.is_assignable(class1, class2)? {
            return Ok(type2.clone());
        }
        if class1.is_interface || class2.is_interface {
            return Ok(BinaryName::OBJECT);
        }

        // Walk up from the first class until we hit a superclass of the second
        let mut candidate = class1;
        while let Some(superclass) = &candidate.superclass {
            candidate = self.class(superclass)?;
            if self.is_assignable(class2, candidate)? {
                return Ok(candidate.name.clone());
            }
        }
        Ok(BinaryName::OBJECT)
    }
}

pub struct ClassData {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    ///
    /// Interfaces have `java/lang/Object` as their superclass.
    pub superclass: Option<BinaryName>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: Vec<BinaryName>,

    /// Is this an interface?
    pub is_interface: bool,
}

impl PartialEq for ClassData {
    fn eq(&self, other: &ClassData) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassData {}

impl fmt::Debug for ClassData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_ref())
    }
}
