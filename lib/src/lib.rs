//! Computes the types of the operand stack and local variables at every point in a JVM method
//! body, either with a whole-method fixed point analysis (which handles arbitrary control flow,
//! exception handlers, and `jsr`/`ret` subroutines) or with an incremental tracker that follows a
//! straight-line instruction stream.

pub mod jvm;
pub mod util;
