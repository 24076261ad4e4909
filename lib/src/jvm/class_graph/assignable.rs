use super::{ClassData, ClassHierarchy};
use crate::jvm::{BinaryName, Error};
use std::collections::HashSet;

impl ClassHierarchy {
    /// Is the first class assignable to the second?
    ///
    /// This does a search up the superclasses and superinterfaces looking for the super type. Every
    /// class visited along the way must be in the hierarchy.
    pub fn is_assignable(
        &self,
        sub_type: &ClassData,
        super_type: &ClassData,
    ) -> Result<bool, Error> {
        if super_type.name == BinaryName::OBJECT {
            return Ok(true);
        }

        let mut supertypes_to_visit: Vec<&ClassData> = vec![sub_type];
        let mut dont_revisit: HashSet<&BinaryName> = HashSet::new();
        dont_revisit.insert(&sub_type.name);

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !super_type.is_interface;

        while let Some(class_data) = supertypes_to_visit.pop() {
            if class_data.name == super_type.name {
                return Ok(true);
            }

            // Enqueue next types to visit
            if let Some(superclass) = &class_data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(self.class(superclass)?);
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    if dont_revisit.insert(interface) {
                        supertypes_to_visit.push(self.class(interface)?);
                    }
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod test {
    use crate::jvm::class_graph::ClassHierarchy;
    use crate::jvm::BinaryName;

    fn assignable(hierarchy: &ClassHierarchy, sub: &BinaryName, sup: &BinaryName) -> bool {
        let sub = hierarchy.class(sub).unwrap();
        let sup = hierarchy.class(sup).unwrap();
        hierarchy.is_assignable(sub, sup).unwrap()
    }

    #[test]
    fn simple_classes() {
        let hierarchy = ClassHierarchy::with_java_library_types();
        let object = &BinaryName::OBJECT;
        let string = &BinaryName::STRING;

        assert!(
            assignable(&hierarchy, object, object),
            "java.lang.Object <: java.lang.Object"
        );
        assert!(
            assignable(&hierarchy, string, string),
            "java.lang.String <: java.lang.String"
        );
        assert!(
            assignable(&hierarchy, string, object),
            "java.lang.String <: java.lang.Object"
        );
        assert!(
            !assignable(&hierarchy, object, string),
            "java.lang.Object </: java.lang.String"
        );
    }

    #[test]
    fn transitive_classes() {
        let hierarchy = ClassHierarchy::with_java_library_types();
        let object = &BinaryName::OBJECT;
        let number = &BinaryName::NUMBER;
        let integer = &BinaryName::INTEGER;

        assert!(
            assignable(&hierarchy, integer, number),
            "java.lang.Integer <: java.lang.Number"
        );
        assert!(
            assignable(&hierarchy, integer, object),
            "java.lang.Integer <: java.lang.Object"
        );
        assert!(
            !assignable(&hierarchy, number, integer),
            "java.lang.Number </: java.lang.Integer"
        );
    }

    #[test]
    fn simple_interfaces() {
        let hierarchy = ClassHierarchy::with_java_library_types();
        let object = &BinaryName::OBJECT;
        let string = &BinaryName::STRING;
        let char_sequence = &BinaryName::CHARSEQUENCE;

        assert!(
            assignable(&hierarchy, string, char_sequence),
            "java.lang.String <: java.lang.CharSequence"
        );
        assert!(
            assignable(&hierarchy, char_sequence, object),
            "java.lang.CharSequence <: java.lang.Object"
        );
        assert!(
            !assignable(&hierarchy, char_sequence, string),
            "java.lang.CharSequence </: java.lang.String"
        );
        assert!(
            assignable(&hierarchy, &BinaryName::ARRAYLIST, &BinaryName::ITERABLE),
            "java.util.ArrayList <: java.lang.Iterable"
        );
    }
}
