//! Textual method listings
//!
//! The format is a small subset of Jasmin: one directive, label, or instruction per line, and
//! `;` starting a comment (when it starts a token, so descriptors are safe).
//!
//! ```text
//! .class me/alec/Util
//!
//! .method public static abs(I)I
//! .limit stack 1
//! .limit locals 1
//!     iload 0
//!     ifge positive
//!     iload 0
//!     ineg
//!     ireturn
//! positive:
//!     iload 0
//!     ireturn
//! .end method
//! ```
//!
//! Besides `.class`, `.method`, `.limit`, and `.end method`, there is `.catch` (as in Jasmin, with
//! `all` for catch-all handlers) and `.frame` for explicit frame markers (`.frame same`,
//! `.frame chop 2`, `.frame full I J | java/lang/String`, etc.).

use crate::error::DumpError;
use jvm_frames::jvm::code::opcodes::*;
use jvm_frames::jvm::code::{
    Code, Constant, Instruction, Label, LabelGenerator, Labels, Node,
};
use jvm_frames::jvm::verifier::{Frame, MethodContext, StackMapFrame, VerificationType};
use jvm_frames::jvm::{
    parse_name, BaseType, BinaryName, MethodAccessFlags, MethodDescriptor, ParseDescriptor,
    RefType, RenderDescriptor,
};
use std::collections::{HashMap, HashSet};

/// Method parsed out of a listing
pub struct Method {
    pub context: MethodContext,
    pub code: Code,

    /// Names of labels, as written in the listing
    pub label_names: HashMap<Label, String>,
}

impl Method {
    /// Labels entered other than by falling through (jump targets and handler entries)
    pub fn branch_targets(&self) -> HashSet<Label> {
        let mut targets: HashSet<Label> = self
            .code
            .instructions()
            .flat_map(|(_, insn)| insn.jump_targets())
            .collect();
        targets.extend(self.code.handlers.iter().map(|handler| handler.handler));
        targets
    }

    pub fn label_name(&self, label: Label) -> String {
        self.label_names
            .get(&label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }
}

const ACCESS_FLAGS: [(&str, MethodAccessFlags); 12] = [
    ("public", MethodAccessFlags::PUBLIC),
    ("private", MethodAccessFlags::PRIVATE),
    ("protected", MethodAccessFlags::PROTECTED),
    ("static", MethodAccessFlags::STATIC),
    ("final", MethodAccessFlags::FINAL),
    ("synchronized", MethodAccessFlags::SYNCHRONIZED),
    ("bridge", MethodAccessFlags::BRIDGE),
    ("varargs", MethodAccessFlags::VARARGS),
    ("native", MethodAccessFlags::NATIVE),
    ("abstract", MethodAccessFlags::ABSTRACT),
    ("strict", MethodAccessFlags::STRICT),
    ("synthetic", MethodAccessFlags::SYNTHETIC),
];

const ARRAY_TYPES: [(&str, BaseType); 8] = [
    ("boolean", BaseType::Boolean),
    ("char", BaseType::Char),
    ("float", BaseType::Float),
    ("double", BaseType::Double),
    ("byte", BaseType::Byte),
    ("short", BaseType::Short),
    ("int", BaseType::Int),
    ("long", BaseType::Long),
];

/// Class used for methods appearing before any `.class` directive
const DEFAULT_CLASS: &str = "Main";

/// Method whose `.end method` hasn't been seen yet
struct PartialMethod {
    context: MethodContext,
    code: Code,
    labels: Labels,
    by_name: HashMap<String, Label>,
}

impl PartialMethod {
    /// Look up a label by name, making a fresh one the first time a name is seen
    fn label(&mut self, name: &str) -> Label {
        if let Some(label) = self.by_name.get(name) {
            return *label;
        }
        let label = self.labels.fresh_label();
        self.by_name.insert(name.to_owned(), label);
        label
    }

    fn finish(self) -> Method {
        let label_names = self
            .by_name
            .into_iter()
            .map(|(name, label)| (label, name))
            .collect();
        Method {
            context: self.context,
            code: self.code,
            label_names,
        }
    }
}

/// Parse all of the methods in a listing
pub fn parse(source: &str) -> Result<Vec<Method>, DumpError> {
    let mut class = String::from(DEFAULT_CLASS);
    let mut methods = vec![];
    let mut current: Option<PartialMethod> = None;

    for (line_idx, line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        let tokens = tokenize(line).map_err(|msg| DumpError::syntax(line_no, msg))?;
        let (first, rest) = match tokens.split_first() {
            None => continue,
            Some((first, rest)) => (first.as_str(), rest),
        };

        let in_method = current.is_some();
        match first {
            ".class" if !in_method => match rest {
                [name] => class = name.clone(),
                _ => return Err(DumpError::syntax(line_no, "expected `.class <name>`")),
            },
            ".method" if !in_method => {
                let context = parse_method_header(&class, rest)
                    .map_err(|msg| DumpError::syntax(line_no, msg))?;
                log::debug!("Parsed method header {}", context);
                current = Some(PartialMethod {
                    context,
                    code: Code::new(0, 0),
                    labels: Labels::new(),
                    by_name: HashMap::new(),
                });
            }
            ".end" if in_method => {
                if rest != ["method"] {
                    return Err(DumpError::syntax(line_no, "expected `.end method`"));
                }
                if let Some(method) = current.take() {
                    methods.push(method.finish());
                }
            }
            ".class" | ".method" | ".end" => {
                let msg = format!("`{}` is not allowed here", first);
                return Err(DumpError::syntax(line_no, msg));
            }
            _ => match current.as_mut() {
                None => {
                    return Err(DumpError::syntax(line_no, "expected `.method` or `.class`"));
                }
                Some(method) => parse_body_line(method, first, rest)
                    .map_err(|msg| DumpError::syntax(line_no, msg))?,
            },
        }
    }

    if current.is_some() {
        let last_line = source.lines().count();
        return Err(DumpError::syntax(last_line, "missing `.end method`"));
    }
    Ok(methods)
}

/// Split a line into tokens, dropping comments
///
/// Quoted strings come back as a single token that still starts with `"` (but with the closing
/// quote removed and escapes resolved).
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = vec![];
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            None | Some(';') => break,
            Some('"') => {
                chars.next();
                let mut token = String::from("\"");
                loop {
                    match chars.next() {
                        None => return Err(String::from("unterminated string")),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => token.push('\n'),
                            Some('t') => token.push('\t'),
                            Some(c) => token.push(c),
                            None => return Err(String::from("unterminated string")),
                        },
                        Some(c) => token.push(c),
                    }
                }
                tokens.push(token);
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    token.push(*c);
                    chars.next();
                }
                tokens.push(token);
            }
        }
    }
    Ok(tokens)
}

fn parse_method_header(class: &str, tokens: &[String]) -> Result<MethodContext, String> {
    let (signature, flags) = tokens
        .split_last()
        .ok_or_else(|| String::from("expected `.method <flags> <name><descriptor>`"))?;

    let mut access_flags = MethodAccessFlags::empty();
    for flag in flags {
        let (_, parsed) = ACCESS_FLAGS
            .iter()
            .find(|(name, _)| name == flag)
            .ok_or_else(|| format!("unknown access flag `{}`", flag))?;
        access_flags |= *parsed;
    }

    let paren = signature
        .find('(')
        .ok_or_else(|| format!("expected a method descriptor in `{}`", signature))?;
    let (name, descriptor) = signature.split_at(paren);
    MethodContext::parse(class, access_flags, name, descriptor).map_err(|err| format!("{:?}", err))
}

/// Parse a line inside a method body
fn parse_body_line(method: &mut PartialMethod, first: &str, rest: &[String]) -> Result<(), String> {
    match first {
        ".limit" => {
            let (which, value) = match rest {
                [which, value] => (which.as_str(), parse_int::<u16>(value)?),
                _ => return Err(String::from("expected `.limit stack|locals <n>`")),
            };
            match which {
                "stack" => method.code.max_stack = value,
                "locals" => method.code.max_locals = value,
                other => return Err(format!("unknown limit `{}`", other)),
            }
        }
        ".catch" => match rest {
            [catch_type, from, start, to, end, using, handler]
                if from == "from" && to == "to" && using == "using" =>
            {
                let catch_type = if catch_type == "all" {
                    None
                } else {
                    Some(parse_name::<BinaryName>(catch_type).map_err(|err| format!("{:?}", err))?)
                };
                let (start, end, handler) =
                    (method.label(start), method.label(end), method.label(handler));
                method.code.add_handler(start, end, handler, catch_type);
            }
            _ => return Err(String::from("expected `.catch <type> from <l> to <l> using <l>`")),
        },
        ".frame" => {
            let frame = parse_frame(rest)?;
            method.code.nodes.push(Node::Frame(frame));
        }
        label if label.ends_with(':') && rest.is_empty() => {
            let label = method.label(&label[..label.len() - 1]);
            method.code.place_label(label);
        }
        mnemonic => {
            let insn = parse_instruction(method, mnemonic, rest)?;
            method.code.push(insn);
        }
    }
    Ok(())
}

fn parse_int<T: std::str::FromStr>(token: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("invalid number `{}`", token))
}

fn parse_frame(tokens: &[String]) -> Result<StackMapFrame, String> {
    let (kind, rest) = tokens
        .split_first()
        .ok_or_else(|| String::from("expected a frame kind"))?;
    let types = |tokens: &[String]| -> Result<Vec<VerificationType>, String> {
        tokens.iter().map(|token| parse_verification_type(token)).collect()
    };

    let frame = match (kind.as_str(), rest) {
        ("same", []) => StackMapFrame::Same,
        ("same_locals_1_stack_item", [item]) => {
            StackMapFrame::SameLocals1StackItem(parse_verification_type(item)?)
        }
        ("chop", [count]) => StackMapFrame::Chop(parse_int(count)?),
        ("append", items) => StackMapFrame::Append(types(items)?),
        ("full", items) => {
            let split = items.iter().position(|item| item == "|");
            let (locals, stack) = match split {
                Some(split) => (&items[..split], &items[split + 1..]),
                None => (items, &[][..]),
            };
            StackMapFrame::Full {
                locals: types(locals)?,
                stack: types(stack)?,
            }
        }
        (other, _) => return Err(format!("malformed `{}` frame", other)),
    };
    Ok(frame)
}

/// Parse a verification type, in the form it is displayed in
fn parse_verification_type(token: &str) -> Result<VerificationType, String> {
    let parsed = match token {
        "top" => VerificationType::Top,
        "I" => VerificationType::Integer,
        "F" => VerificationType::Float,
        "D" => VerificationType::Double,
        "J" => VerificationType::Long,
        "null" => VerificationType::Null,
        "uninitialized_this" => VerificationType::UninitializedThis,
        _ => {
            if let Some(inner) = token
                .strip_prefix("uninitialized(")
                .and_then(|inner| inner.strip_suffix(')'))
            {
                let (class, offset) = inner.rsplit_once('@').ok_or_else(|| {
                    format!("expected `uninitialized(<class>@<n>)`, not {}", token)
                })?;
                VerificationType::Uninitialized {
                    offset: parse_int(offset)?,
                    class: parse_name(class).map_err(|err| format!("{:?}", err))?,
                }
            } else {
                VerificationType::reference(token).map_err(|err| format!("{:?}", err))?
            }
        }
    };
    Ok(parsed)
}

fn parse_instruction(
    method: &mut PartialMethod,
    mnemonic: &str,
    operands: &[String],
) -> Result<Instruction, String> {
    let opcode =
        from_mnemonic(mnemonic).ok_or_else(|| format!("unknown instruction `{}`", mnemonic))?;
    let malformed = || format!("malformed operands for `{}`", mnemonic);
    let operand_strs: Vec<&str> = operands.iter().map(String::as_str).collect();

    let insn = match (opcode, operand_strs.as_slice()) {
        (BIPUSH | SIPUSH, [value]) => Instruction::int(opcode, parse_int(value)?),
        (NEWARRAY, [element]) => {
            let (_, base_type) = ARRAY_TYPES
                .iter()
                .find(|(name, _)| name == element)
                .ok_or_else(|| format!("unknown array element type `{}`", element))?;
            Instruction::int(opcode, base_type.array_type_code() as i32)
        }
        (ILOAD..=ALOAD | ISTORE..=ASTORE | RET, [var]) => Instruction::var(opcode, parse_int(var)?),
        (IINC, [var, delta]) => Ok(Instruction::IInc(parse_int(var)?, parse_int(delta)?)),
        (LDC | LDC_W | LDC2_W, constant) => Ok(Instruction::Ldc(parse_constant(constant)?)),
        (NEW | ANEWARRAY | CHECKCAST | INSTANCEOF, [ref_type]) => {
            Instruction::type_insn(opcode, ref_type)
        }
        (GETSTATIC..=PUTFIELD, [member, descriptor]) => {
            let (owner, name) = member.rsplit_once('/').ok_or_else(malformed)?;
            Instruction::field(opcode, owner, name, descriptor)
        }
        (INVOKEVIRTUAL..=INVOKEINTERFACE, [member] | [member, _]) => {
            let paren = member.find('(').ok_or_else(malformed)?;
            let (owner_and_name, descriptor) = member.split_at(paren);
            let (owner, name) = owner_and_name.rsplit_once('/').ok_or_else(malformed)?;
            Instruction::method(opcode, owner, name, descriptor, opcode == INVOKEINTERFACE)
        }
        (INVOKEDYNAMIC, [call_site]) => {
            let paren = call_site.find('(').ok_or_else(malformed)?;
            let (name, descriptor) = call_site.split_at(paren);
            Instruction::invoke_dynamic(name, descriptor)
        }
        (IFEQ..=JSR | IFNULL | IFNONNULL | GOTO_W | JSR_W, [target]) => {
            Instruction::jump(opcode, method.label(target))
        }
        (TABLESWITCH, [low, rest @ ..]) => {
            let (targets, default) = split_default(rest).ok_or_else(malformed)?;
            Ok(Instruction::TableSwitch {
                low: parse_int(low)?,
                default: method.label(default),
                targets: targets.iter().map(|target| method.label(target)).collect(),
            })
        }
        (LOOKUPSWITCH, rest) => {
            let (cases, default) = split_default(rest).ok_or_else(malformed)?;
            let mut targets = vec![];
            for case in cases {
                let (key, target) = case.split_once(':').ok_or_else(malformed)?;
                targets.push((parse_int(key)?, method.label(target)));
            }
            Ok(Instruction::LookupSwitch {
                default: method.label(default),
                targets,
            })
        }
        (MULTIANEWARRAY, [ref_type, dimensions]) => {
            let ref_type =
                RefType::from_internal_name(ref_type).map_err(|err| format!("{:?}", err))?;
            Ok(Instruction::MultiANewArray(ref_type, parse_int(dimensions)?))
        }
        (_, []) => Instruction::simple(opcode),
        _ => return Err(malformed()),
    };
    insn.map_err(|err| format!("`{}`: {:?}", mnemonic, err))
}

/// Split `<targets...> default <label>`
fn split_default<'a>(operands: &[&'a str]) -> Option<(Vec<&'a str>, &'a str)> {
    match operands {
        [targets @ .., "default", default] => Some((targets.to_vec(), default)),
        _ => None,
    }
}

fn parse_constant(operands: &[&str]) -> Result<Constant, String> {
    let constant = match operands {
        [string] if string.starts_with('"') => Constant::String(string[1..].to_owned()),
        ["class", class] => Constant::Class(
            RefType::from_internal_name(class).map_err(|err| format!("{:?}", err))?,
        ),
        ["methodtype", descriptor] => Constant::MethodType(
            MethodDescriptor::parse(descriptor).map_err(|err| format!("{:?}", err))?,
        ),
        [number] => {
            if let Some(long) = number.strip_suffix('L') {
                Constant::Long(parse_int(long)?)
            } else if let Some(float) = number.strip_suffix('f') {
                Constant::Float(parse_int(float)?)
            } else if let Some(double) = number.strip_suffix('d') {
                Constant::Double(parse_int(double)?)
            } else if number.contains('.') {
                Constant::Double(parse_int(number)?)
            } else {
                Constant::Integer(parse_int(number)?)
            }
        }
        _ => return Err(String::from("malformed constant")),
    };
    Ok(constant)
}

/// Render the `.method` line for a method
pub fn render_method_header(context: &MethodContext) -> String {
    let mut header = String::from(".method");
    for (name, flag) in ACCESS_FLAGS {
        if context.access_flags.contains(flag) {
            header.push(' ');
            header.push_str(name);
        }
    }
    header.push(' ');
    header.push_str(context.name.as_ref());
    context.descriptor.render_to(&mut header);
    header
}

/// Render the `.catch` lines for a method
pub fn render_handlers(method: &Method) -> Vec<String> {
    method
        .code
        .handlers
        .iter()
        .map(|handler| {
            let catch_type = handler
                .catch_type
                .as_ref()
                .map_or_else(|| String::from("all"), ToString::to_string);
            format!(
                ".catch {} from {} to {} using {}",
                catch_type,
                method.label_name(handler.start),
                method.label_name(handler.end),
                method.label_name(handler.handler)
            )
        })
        .collect()
}

/// Render a node as a listing line
pub fn render_node(method: &Method, node: &Node) -> String {
    match node {
        Node::Label(label) => format!("{}:", method.label_name(*label)),
        Node::Instruction(insn) => format!("    {}", render_instruction(method, insn)),
        Node::Frame(frame) => render_frame(frame),
    }
}

fn render_types(types: &[VerificationType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_frame(frame: &StackMapFrame) -> String {
    match frame {
        StackMapFrame::Same => String::from(".frame same"),
        StackMapFrame::SameLocals1StackItem(item) => {
            format!(".frame same_locals_1_stack_item {}", item)
        }
        StackMapFrame::Chop(count) => format!(".frame chop {}", count),
        StackMapFrame::Append(items) => format!(".frame append {}", render_types(items)),
        StackMapFrame::Full { locals, stack } if stack.is_empty() => {
            format!(".frame full {}", render_types(locals))
        }
        StackMapFrame::Full { locals, stack } => format!(
            ".frame full {} | {}",
            render_types(locals),
            render_types(stack)
        ),
    }
}

/// Render the locals and stack of a frame
pub fn render_state(frame: &Frame<VerificationType>) -> String {
    format!(
        "[{}] [{}]",
        render_types(frame.locals()),
        render_types(frame.stack())
    )
}

fn render_instruction(method: &Method, insn: &Instruction) -> String {
    use Instruction::*;

    let mnemonic = insn.mnemonic();
    let operands = match insn {
        BiPush(value) => value.to_string(),
        SiPush(value) => value.to_string(),
        NewArray(element) => ARRAY_TYPES
            .iter()
            .find(|(_, base_type)| base_type == element)
            .map_or("?", |(name, _)| *name)
            .to_owned(),
        ILoad(var) | LLoad(var) | FLoad(var) | DLoad(var) | ALoad(var) | IStore(var)
        | LStore(var) | FStore(var) | DStore(var) | AStore(var) | Ret(var) => var.to_string(),
        IInc(var, delta) => format!("{} {}", var, delta),
        Ldc(constant) => match constant {
            Constant::Integer(value) => value.to_string(),
            Constant::Float(value) => format!("{:?}f", value),
            Constant::Long(value) => format!("{}L", value),
            Constant::Double(value) => format!("{:?}d", value),
            Constant::String(value) => format!("{:?}", value),
            Constant::Class(class) => format!("class {}", class.internal_name()),
            Constant::MethodType(descriptor) => format!("methodtype {}", descriptor.render()),
            Constant::MethodHandle => String::from("methodhandle"),
            Constant::Dynamic(field_type) => format!("dynamic {}", field_type.render()),
        },
        New(class) => class.to_string(),
        ANewArray(ref_type) | CheckCast(ref_type) | InstanceOf(ref_type) => {
            ref_type.internal_name()
        }
        MultiANewArray(ref_type, dimensions) => {
            format!("{} {}", ref_type.internal_name(), dimensions)
        }
        GetStatic(field) | PutStatic(field) | GetField(field) | PutField(field) => format!(
            "{}/{} {}",
            field.class,
            field.name,
            field.descriptor.render()
        ),
        Invoke(_, method_ref) => format!(
            "{}/{}{}",
            method_ref.class.internal_name(),
            method_ref.name,
            method_ref.descriptor.render()
        ),
        InvokeDynamic(call_site) => {
            format!("{}{}", call_site.name, call_site.descriptor.render())
        }
        TableSwitch {
            low,
            default,
            targets,
        } => {
            let mut operands = low.to_string();
            for target in targets {
                operands.push(' ');
                operands.push_str(&method.label_name(*target));
            }
            format!("{} default {}", operands, method.label_name(*default))
        }
        LookupSwitch { default, targets } => {
            let mut operands = String::new();
            for (key, target) in targets {
                operands.push_str(&format!("{}:{} ", key, method.label_name(*target)));
            }
            format!("{}default {}", operands, method.label_name(*default))
        }
        _ => match insn.jump_targets().as_slice() {
            [target] => method.label_name(*target),
            _ => String::new(),
        },
    };

    if operands.is_empty() {
        mnemonic.to_owned()
    } else {
        format!("{} {}", mnemonic, operands)
    }
}
