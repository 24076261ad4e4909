//! Model of JVM method bodies, and the machinery for computing their stack map frames
//!
//! ### Simple example
//!
//! Consider the following Java method:
//!
//! ```java,ignore,no_run
//! static int abs(int x) {
//!     return x < 0 ? -x : x;
//! }
//! ```
//!
//! Computing the frame at every instruction can be done as follows:
//!
//! ```
//! use jvm_frames::jvm::class_graph::ClassHierarchy;
//! use jvm_frames::jvm::code::{Code, Instruction::*, LabelGenerator, Labels, OrdComparison};
//! use jvm_frames::jvm::verifier::{Analyzer, BasicVerifier, MethodContext, VerificationType};
//! use jvm_frames::jvm::*;
//!
//! # fn analyze() -> Result<(), Error> {
//! // Describe the method being analyzed
//! let method = MethodContext::parse("me/alec/Util", MethodAccessFlags::STATIC, "abs", "(I)I")?;
//!
//! // Build up the method body
//! let mut labels = Labels::new();
//! let (negative, join) = (labels.fresh_label(), labels.fresh_label());
//! let mut code = Code::new(2, 1);
//! code.push(ILoad(0))
//!     .push(If(OrdComparison::LT, negative))
//!     .push(ILoad(0))
//!     .push(Goto(join))
//!     .place_label(negative)
//!     .push(ILoad(0))
//!     .push(INeg)
//!     .place_label(join)
//!     .push(IReturn);
//!
//! // Run the analysis
//! let hierarchy = ClassHierarchy::with_java_library_types();
//! let interpreter = BasicVerifier::new(&hierarchy);
//! let analysis = Analyzer::new(&interpreter).analyze(&method, &code)?;
//!
//! // Both paths reach the return with an `int` on the stack
//! let frame = analysis.frame(8).expect("return is reachable");
//! assert_eq!(frame.stack(), &[VerificationType::Integer]);
//! # Ok(())
//! # }
//! # analyze().unwrap();
//! ```

mod access_flags;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod verifier;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
