use super::{Frame, VerificationType};
use crate::jvm::RefType;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Error as IoError, ErrorKind, Result};

/// Explicit frame marker, in one of the forms of the [`StackMapTable` attribute][0]
///
/// Locals are listed one entry per value (a `long` or `double` implicitly covers two slots) with
/// trailing `top` values trimmed. Every form except `Full` is relative to the previous frame in
/// the method.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    Same,

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocals1StackItem(VerificationType),

    /// Frame is like the previous frame, but without the last `k` locals and an empty stack
    ///
    /// Note: `k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    Chop(u8),

    /// Frame is like the previous frame, but with 1 to 3 extra locals and an empty stack
    /// Tags: 252-254
    Append(Vec<VerificationType>),

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

impl StackMapFrame {
    /// Full frame describing the given frame
    pub fn full(frame: &Frame<VerificationType>) -> StackMapFrame {
        StackMapFrame::Full {
            locals: frame.compressed_locals(),
            stack: frame.stack().to_vec(),
        }
    }

    /// Compute the most compact frame for a transition from frame with locals `previous_locals`
    /// to `frame`
    ///
    /// This will fall back to `Full` only if none of the other frame forms are enough to encode
    /// the transition. Both sets of locals are expected in compressed form.
    pub fn between(
        previous_locals: &[VerificationType],
        locals: &[VerificationType],
        stack: &[VerificationType],
    ) -> StackMapFrame {
        match stack {
            [] => {
                if locals.len() <= previous_locals.len() {
                    let len_difference = previous_locals.len() - locals.len();
                    let is_prefix = previous_locals.starts_with(locals);
                    if is_prefix && len_difference == 0 {
                        return StackMapFrame::Same;
                    } else if is_prefix && len_difference < 4 {
                        return StackMapFrame::Chop(len_difference as u8);
                    }
                } else if locals.len() - previous_locals.len() < 4
                    && locals.starts_with(previous_locals)
                {
                    return StackMapFrame::Append(locals[previous_locals.len()..].to_vec());
                }
            }
            [single] if locals == previous_locals => {
                return StackMapFrame::SameLocals1StackItem(single.clone());
            }
            _ => (),
        }

        StackMapFrame::Full {
            locals: locals.to_vec(),
            stack: stack.to_vec(),
        }
    }

    /// Resolve the frame relative to the locals of the previous frame, returning the locals and
    /// stack it describes
    ///
    /// Returns `None` if the frame does not make sense after the previous one (eg. chopping more
    /// locals than there are).
    pub fn resolve(
        &self,
        previous_locals: &[VerificationType],
    ) -> Option<(Vec<VerificationType>, Vec<VerificationType>)> {
        match self {
            StackMapFrame::Same => Some((previous_locals.to_vec(), vec![])),
            StackMapFrame::SameLocals1StackItem(item) => {
                Some((previous_locals.to_vec(), vec![item.clone()]))
            }
            StackMapFrame::Chop(k) => {
                let kept = previous_locals.len().checked_sub(*k as usize)?;
                Some((previous_locals[..kept].to_vec(), vec![]))
            }
            StackMapFrame::Append(extra) => {
                let mut locals = previous_locals.to_vec();
                locals.extend(extra.iter().cloned());
                Some((locals, vec![]))
            }
            StackMapFrame::Full { locals, stack } => Some((locals.clone(), stack.clone())),
        }
    }

    /// Name of the frame form, as used in the class file format
    pub fn kind(&self) -> &'static str {
        match self {
            StackMapFrame::Same => "same",
            StackMapFrame::SameLocals1StackItem(_) => "same_locals_1_stack_item",
            StackMapFrame::Chop(_) => "chop",
            StackMapFrame::Append(_) => "append",
            StackMapFrame::Full { .. } => "full",
        }
    }

    /// Write out the frame in class file format
    pub fn encode<W: WriteBytesExt, E: FrameEncoder + ?Sized>(
        &self,
        offset_delta: u16,
        encoder: &mut E,
        writer: &mut W,
    ) -> Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::Same => {
                if offset_delta <= 63 {
                    writer.write_u8(offset_delta as u8)?;
                } else {
                    writer.write_u8(251)?;
                    writer.write_u16::<BigEndian>(offset_delta)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocals1StackItem(stack) => {
                if offset_delta <= 63 {
                    writer.write_u8(offset_delta as u8 + 64)?;
                } else {
                    writer.write_u8(247)?;
                    writer.write_u16::<BigEndian>(offset_delta)?;
                }
                encode_type(stack, encoder, writer)?;
            }

            // `chop_frame`
            StackMapFrame::Chop(chopped_k) => {
                if !(1..4).contains(chopped_k) {
                    return Err(invalid_frame("chop frames remove 1-3 locals"));
                }
                writer.write_u8(251 - chopped_k)?;
                writer.write_u16::<BigEndian>(offset_delta)?;
            }

            // `append_frame`
            StackMapFrame::Append(locals) => {
                let added_k = locals.len();
                if !(1..4).contains(&added_k) {
                    return Err(invalid_frame("append frames add 1-3 locals"));
                }
                writer.write_u8(251 + added_k as u8)?;
                writer.write_u16::<BigEndian>(offset_delta)?;
                for local in locals {
                    encode_type(local, encoder, writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full { locals, stack } => {
                writer.write_u8(255)?;
                writer.write_u16::<BigEndian>(offset_delta)?;
                encode_types(locals, encoder, writer)?;
                encode_types(stack, encoder, writer)?;
            }
        };
        Ok(())
    }
}

/// Resolves the parts of verification types that live outside of the frame itself
pub trait FrameEncoder {
    /// Constant pool index of the `CONSTANT_Class` entry for a reference type
    fn class_index(&mut self, ref_type: &RefType) -> Result<u16>;

    /// Bytecode offset of the instruction at the given position in the method body
    ///
    /// This is needed to encode uninitialized types, which refer to their `new` instruction.
    fn bytecode_offset(&mut self, position: usize) -> Result<u16>;
}

/// Write out a `StackMapTable` attribute body (without the attribute name and length)
///
/// The entries are the bytecode offsets of frames (in increasing order) with the frame at each.
pub fn encode_stack_map_table<W: WriteBytesExt, E: FrameEncoder + ?Sized>(
    entries: &[(u16, StackMapFrame)],
    encoder: &mut E,
    writer: &mut W,
) -> Result<()> {
    let count = u16::try_from(entries.len())
        .map_err(|_| invalid_frame("too many stack map frames"))?;
    writer.write_u16::<BigEndian>(count)?;

    let mut previous_offset: Option<u16> = None;
    for (offset, frame) in entries {
        let offset_delta = match previous_offset {
            None => *offset,
            Some(previous) if *offset > previous => *offset - previous - 1,
            Some(_) => return Err(invalid_frame("stack map frames must be in increasing order")),
        };
        frame.encode(offset_delta, encoder, writer)?;
        previous_offset = Some(*offset);
    }
    Ok(())
}

fn invalid_frame(message: &'static str) -> IoError {
    IoError::new(ErrorKind::InvalidInput, message)
}

fn encode_types<W: WriteBytesExt, E: FrameEncoder + ?Sized>(
    types: &[VerificationType],
    encoder: &mut E,
    writer: &mut W,
) -> Result<()> {
    let count =
        u16::try_from(types.len()).map_err(|_| invalid_frame("too many verification types"))?;
    writer.write_u16::<BigEndian>(count)?;
    for verification_type in types {
        encode_type(verification_type, encoder, writer)?;
    }
    Ok(())
}

fn encode_type<W: WriteBytesExt, E: FrameEncoder + ?Sized>(
    verification_type: &VerificationType,
    encoder: &mut E,
    writer: &mut W,
) -> Result<()> {
    match verification_type {
        VerificationType::Top => writer.write_u8(0)?,
        VerificationType::Integer => writer.write_u8(1)?,
        VerificationType::Float => writer.write_u8(2)?,
        VerificationType::Double => writer.write_u8(3)?,
        VerificationType::Long => writer.write_u8(4)?,
        VerificationType::Null => writer.write_u8(5)?,
        VerificationType::UninitializedThis => writer.write_u8(6)?,
        VerificationType::Object(ref_type) => {
            let index = encoder.class_index(ref_type)?;
            writer.write_u8(7)?;
            writer.write_u16::<BigEndian>(index)?;
        }
        VerificationType::Uninitialized { offset, .. } => {
            let offset = encoder.bytecode_offset(*offset)?;
            writer.write_u8(8)?;
            writer.write_u16::<BigEndian>(offset)?;
        }
        VerificationType::ReturnAddress(_) => {
            return Err(invalid_frame(
                "return addresses cannot appear in stack map frames",
            ))
        }
    };
    Ok(())
}
