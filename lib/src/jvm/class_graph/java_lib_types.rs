use super::{ClassData, ClassHierarchy};
use crate::jvm::BinaryName;

impl ClassHierarchy {
    /// Add common classes and interfaces from the Java standard library
    pub fn insert_java_library_types(&self) {
        let interface = |name: BinaryName, interfaces: Vec<BinaryName>| ClassData {
            name,
            superclass: Some(BinaryName::OBJECT),
            interfaces,
            is_interface: true,
        };
        let class = |name: BinaryName, superclass: BinaryName, interfaces: Vec<BinaryName>| {
            ClassData {
                name,
                superclass: Some(superclass),
                interfaces,
                is_interface: false,
            }
        };

        // Interfaces
        self.add_class(interface(BinaryName::SERIALIZABLE, vec![]));
        self.add_class(interface(BinaryName::CLONEABLE, vec![]));
        self.add_class(interface(BinaryName::COMPARABLE, vec![]));
        self.add_class(interface(BinaryName::CHARSEQUENCE, vec![]));
        self.add_class(interface(BinaryName::ITERABLE, vec![]));
        self.add_class(interface(BinaryName::COLLECTION, vec![BinaryName::ITERABLE]));
        self.add_class(interface(BinaryName::LIST, vec![BinaryName::COLLECTION]));

        // `java.lang`
        self.add_class(class(
            BinaryName::STRING,
            BinaryName::OBJECT,
            vec![
                BinaryName::SERIALIZABLE,
                BinaryName::COMPARABLE,
                BinaryName::CHARSEQUENCE,
            ],
        ));
        self.add_class(class(
            BinaryName::STRINGBUILDER,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE, BinaryName::CHARSEQUENCE],
        ));
        self.add_class(class(
            BinaryName::CLASS,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));
        self.add_class(class(
            BinaryName::NUMBER,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));
        for boxed in [
            BinaryName::INTEGER,
            BinaryName::LONG,
            BinaryName::FLOAT,
            BinaryName::DOUBLE,
        ] {
            self.add_class(class(
                boxed,
                BinaryName::NUMBER,
                vec![BinaryName::COMPARABLE],
            ));
        }

        // `java.lang.invoke`
        self.add_simple_class(BinaryName::METHODHANDLE, BinaryName::OBJECT);
        self.add_class(class(
            BinaryName::METHODTYPE,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));

        // Throwables
        self.add_class(class(
            BinaryName::THROWABLE,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));
        let throwables = [
            (BinaryName::ERROR, BinaryName::THROWABLE),
            (BinaryName::ASSERTIONERROR, BinaryName::ERROR),
            (BinaryName::EXCEPTION, BinaryName::THROWABLE),
            (BinaryName::IOEXCEPTION, BinaryName::EXCEPTION),
            (BinaryName::RUNTIMEEXCEPTION, BinaryName::EXCEPTION),
            (BinaryName::ARITHMETICEXCEPTION, BinaryName::RUNTIMEEXCEPTION),
            (BinaryName::CLASSCASTEXCEPTION, BinaryName::RUNTIMEEXCEPTION),
            (BinaryName::NULLPOINTEREXCEPTION, BinaryName::RUNTIMEEXCEPTION),
            (
                BinaryName::ILLEGALARGUMENTEXCEPTION,
                BinaryName::RUNTIMEEXCEPTION,
            ),
            (
                BinaryName::ILLEGALSTATEEXCEPTION,
                BinaryName::RUNTIMEEXCEPTION,
            ),
            (
                BinaryName::INDEXOUTOFBOUNDSEXCEPTION,
                BinaryName::RUNTIMEEXCEPTION,
            ),
            (
                BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION,
                BinaryName::INDEXOUTOFBOUNDSEXCEPTION,
            ),
        ];
        for (name, superclass) in throwables {
            self.add_simple_class(name, superclass);
        }

        // `java.util`
        self.add_class(class(
            BinaryName::ARRAYLIST,
            BinaryName::OBJECT,
            vec![
                BinaryName::LIST,
                BinaryName::CLONEABLE,
                BinaryName::SERIALIZABLE,
            ],
        ));
    }
}
