use jvm_frames::jvm::class_graph::ClassHierarchy;
use jvm_frames::jvm::code::{
    opcodes, Code, EqComparison, Instruction, Instruction::*, InvokeType, LabelGenerator, Labels,
    Node, OrdComparison,
};
use jvm_frames::jvm::verifier::{
    Analysis, Analyzer, AnalyzerSettings, BasicVerifier, EdgeKind, Frame, MethodContext,
    OpcodeSet, ReturnCheck, StackMapFrame, VerificationType, VerificationType::*,
};
use jvm_frames::jvm::{BinaryName, Error, MethodAccessFlags, RefType, StateErrorKind};

fn object(class: BinaryName) -> VerificationType {
    Object(RefType::Object(class))
}

fn init_object() -> Instruction {
    Instruction::method(
        opcodes::INVOKESPECIAL,
        "java/lang/Object",
        "<init>",
        "()V",
        false,
    )
    .unwrap()
}

fn static_method(descriptor: &str) -> MethodContext {
    MethodContext::parse("me/alec/Test", MethodAccessFlags::STATIC, "test", descriptor).unwrap()
}

/// Check that running every reachable node once more does not change any frame
fn assert_fixed_point(
    analysis: &Analysis<VerificationType>,
    method: &MethodContext,
    code: &Code,
    verifier: &BasicVerifier<ClassHierarchy>,
) {
    for (position, node) in code.nodes.iter().enumerate() {
        let input = match analysis.frame(position) {
            Some(frame) => frame,
            None => continue,
        };
        let mut output: Frame<VerificationType> = input.clone();
        if let Node::Instruction(insn) = node {
            output
                .execute(position, insn, method, verifier, ReturnCheck::Descriptor)
                .unwrap();
        }
        for edge in analysis.cfg().successors(position) {
            if let EdgeKind::FallThrough | EdgeKind::Jump | EdgeKind::SwitchCase = edge.kind {
                let mut successor = analysis.frame(edge.to).unwrap().clone();
                assert!(
                    !successor.merge(&output, verifier).unwrap(),
                    "frame at {} changed when merged from {}",
                    edge.to,
                    position
                );
            }
        }
    }
}

#[test]
fn loop_converges() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(I)J");

    // long total = 0; for (int i = 0; i < n; i++) { total += i; } return total;
    let mut labels = Labels::new();
    let (header, exit) = (labels.fresh_label(), labels.fresh_label());
    let mut code = Code::new(4, 4);
    code.push(LConst0) // 0
        .push(LStore(1)) // 1
        .push(IConst0) // 2
        .push(IStore(3)) // 3
        .place_label(header) // 4
        .push(ILoad(3)) // 5
        .push(ILoad(0)) // 6
        .push(IfICmp(OrdComparison::GE, exit)) // 7
        .push(LLoad(1)) // 8
        .push(ILoad(3)) // 9
        .push(I2L) // 10
        .push(LAdd) // 11
        .push(LStore(1)) // 12
        .push(IInc(3, 1)) // 13
        .push(Goto(header)) // 14
        .place_label(exit) // 15
        .push(LLoad(1)) // 16
        .push(LReturn); // 17

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();

    let header_frame = analysis.frame(4).unwrap();
    assert_eq!(header_frame.locals(), &[Integer, Long, Top, Integer]);
    assert!(header_frame.stack().is_empty());
    assert_eq!(analysis.frame(11).unwrap().stack(), &[Long, Long]);
    assert_eq!(analysis.max_stack(), 4);
    assert_eq!(analysis.max_locals(), 4);
    assert!(analysis.frames().iter().all(Option::is_some));

    // The back edge brings nothing new to the header, so every node runs once
    assert_eq!(analysis.iterations(), code.nodes.len());
    assert_fixed_point(&analysis, &method, &code, &verifier);

    // Analyzing again gives the same answer
    let again = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
    assert_eq!(again.frames(), analysis.frames());
}

#[test]
fn loop_generalizes_references() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(I)Ljava/lang/Exception;");

    // Exception e = null; while (n-- > 0) { e = (n % 2 == 0) ? ioException : arithException; }
    let mut labels = Labels::new();
    let (header, exit, arith, stored) = (
        labels.fresh_label(),
        labels.fresh_label(),
        labels.fresh_label(),
        labels.fresh_label(),
    );
    let mut code = Code::new(2, 2);
    code.push(AConstNull) // 0
        .push(AStore(1)) // 1
        .place_label(header) // 2
        .push(IInc(0, -1)) // 3
        .push(ILoad(0)) // 4
        .push(If(OrdComparison::LE, exit)) // 5
        .push(ILoad(0)) // 6
        .push(If(OrdComparison::NE, arith)) // 7
        .push(AConstNull) // 8
        .push(CheckCast(RefType::Object(BinaryName::IOEXCEPTION))) // 9
        .push(Goto(stored)) // 10
        .place_label(arith) // 11
        .push(AConstNull) // 12
        .push(CheckCast(RefType::Object(BinaryName::ARITHMETICEXCEPTION))) // 13
        .place_label(stored) // 14
        .push(AStore(1)) // 15
        .push(Goto(header)) // 16
        .place_label(exit) // 17
        .push(ALoad(1)) // 18
        .push(AReturn); // 19

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
    assert_eq!(
        analysis.frame(14).unwrap().stack(),
        &[object(BinaryName::EXCEPTION)]
    );
    assert_eq!(
        analysis.frame(2).unwrap().locals(),
        &[Integer, object(BinaryName::EXCEPTION)]
    );
    assert_eq!(
        analysis.frame(19).unwrap().stack(),
        &[object(BinaryName::EXCEPTION)]
    );

    // The header changed after the first trip around the loop
    assert!(analysis.iterations() > code.nodes.len());
    assert_fixed_point(&analysis, &method, &code, &verifier);
}

#[test]
fn exception_handler_entry() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(II)I");

    let mut labels = Labels::new();
    let (start, end, handler) = (
        labels.fresh_label(),
        labels.fresh_label(),
        labels.fresh_label(),
    );
    let mut code = Code::new(3, 3);
    code.place_label(start) // 0
        .push(IConst0) // 1
        .push(IStore(2)) // 2
        .push(IConst1) // 3
        .push(ILoad(0)) // 4
        .push(ILoad(1)) // 5
        .push(IDiv) // 6
        .push(IAdd) // 7
        .push(IStore(2)) // 8
        .place_label(end) // 9
        .push(ILoad(2)) // 10
        .push(IReturn) // 11
        .place_label(handler) // 12
        .push(Pop) // 13
        .push(IConst0) // 14
        .push(IReturn) // 15
        .add_handler(
            start,
            end,
            handler,
            Some(BinaryName::ARITHMETICEXCEPTION),
        );

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();

    // Three values are on the stack at the `idiv`, but the handler only sees the exception
    assert_eq!(analysis.frame(6).unwrap().stack(), &[Integer, Integer, Integer]);
    let handler_frame = analysis.frame(12).unwrap();
    assert_eq!(
        handler_frame.stack(),
        &[object(BinaryName::ARITHMETICEXCEPTION)]
    );

    // Local 2 is unset at the start of the range and set partway through
    assert_eq!(handler_frame.locals(), &[Integer, Integer, Top]);
    assert_eq!(analysis.max_stack(), 3);
    assert_fixed_point(&analysis, &method, &code, &verifier);
}

#[test]
fn catch_all_handler() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("([I)I");

    let mut labels = Labels::new();
    let (start, end, handler) = (
        labels.fresh_label(),
        labels.fresh_label(),
        labels.fresh_label(),
    );
    let mut code = Code::new(2, 1);
    code.place_label(start)
        .push(ALoad(0))
        .push(IConst0)
        .push(IALoad)
        .push(IReturn)
        .place_label(end)
        .place_label(handler)
        .push(AThrow)
        .add_handler(start, end, handler, None);

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
    assert_eq!(
        analysis.frame(6).unwrap().stack(),
        &[object(BinaryName::THROWABLE)]
    );
    assert_eq!(
        analysis.frame(6).unwrap().locals(),
        &[Object(RefType::array(jvm_frames::jvm::FieldType::int()))]
    );

    // The end label is never reached, but that is fine
    assert!(!analysis.is_reachable(5));
}

#[test]
fn unreachable_code() {
    let hierarchy = ClassHierarchy::new();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("()V");

    let mut labels = Labels::new();
    let dead = labels.fresh_label();
    let mut code = Code::new(1, 0);
    code.push(Return) // 0
        .place_label(dead) // 1
        .push(IConst0) // 2
        .push(IReturn) // 3
        .push(Goto(dead)); // 4

    // The dead `ireturn` would be invalid in a `void` method, but it never runs
    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
    assert!(analysis.frame(0).is_some());
    assert!(analysis.frames()[1..].iter().all(Option::is_none));
    assert!(analysis.frame_positions().is_empty());

    // The dead label is a jump target, but it gets no frame
    let nodes = analysis.insert_frames(&code);
    assert_eq!(nodes, code.nodes);
}

#[test]
fn subroutines() {
    let hierarchy = ClassHierarchy::new();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(I)I");

    let mut labels = Labels::new();
    let subroutine = labels.fresh_label();
    let mut code = Code::new(1, 3);
    code.push(Jsr(subroutine)) // 0
        .push(IConst1) // 1
        .push(IStore(1)) // 2
        .push(Jsr(subroutine)) // 3
        .push(ILoad(1)) // 4
        .push(IReturn) // 5
        .place_label(subroutine) // 6
        .push(AStore(2)) // 7
        .push(Ret(2)); // 8

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();

    // Each call site gets its own frames through the subroutine
    let entries: Vec<_> = analysis.parallel_frames(6).collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, &[1]);
    assert_eq!(entries[0].1.stack(), &[ReturnAddress(1)]);
    assert_eq!(entries[1].0, &[1, 4]);
    assert_eq!(entries[1].1.stack(), &[ReturnAddress(4)]);
    assert_eq!(entries[1].1.locals(), &[Integer, Integer, ReturnAddress(1)]);
    assert_eq!(analysis.parallel_frames(8).count(), 2);

    // Returns go to the right place
    assert_eq!(
        analysis.frame(1).unwrap().locals(),
        &[Integer, Top, ReturnAddress(1)]
    );
    assert_eq!(
        analysis.frame(4).unwrap().locals(),
        &[Integer, Integer, ReturnAddress(4)]
    );

    // The summary loses the return addresses
    let summary = analysis.frame(6).unwrap();
    assert_eq!(summary.locals(), &[Integer, Top, Top]);
    assert_eq!(summary.stack(), &[Top]);

    assert_eq!(analysis.max_locals(), 3);
    assert_eq!(analysis.max_stack(), 1);

    let err = Analyzer::new(&verifier)
        .with_settings(AnalyzerSettings::without_subroutines())
        .analyze(&method, &code)
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidOpcode {
            opcode: opcodes::JSR,
            index: Some(0)
        }
    );
}

#[test]
fn ret_needs_return_address() {
    let hierarchy = ClassHierarchy::new();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(I)V");

    let mut code = Code::new(0, 1);
    code.push(Ret(0));
    let err = Analyzer::new(&verifier)
        .analyze(&method, &code)
        .unwrap_err();
    assert_eq!(err.state_kind(), Some(&StateErrorKind::NotAReturnAddress(0)));
    assert_eq!(err.index(), Some(0));
}

#[test]
fn malformed_code() {
    let hierarchy = ClassHierarchy::new();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(I)V");

    // Popping an empty stack
    let mut code = Code::new(1, 1);
    code.push(Pop).push(Return);
    let err = Analyzer::new(&verifier).analyze(&method, &code).unwrap_err();
    assert_eq!(err.state_kind(), Some(&StateErrorKind::EmptyStack));
    assert_eq!(err.index(), Some(0));

    // Exceeding the declared stack size
    let mut code = Code::new(1, 1);
    code.push(IConst0).push(IConst0).push(Pop2).push(Return);
    let err = Analyzer::new(&verifier).analyze(&method, &code).unwrap_err();
    assert_eq!(
        err.state_kind(),
        Some(&StateErrorKind::StackOverflow { max_stack: 1 })
    );
    assert_eq!(err.index(), Some(1));

    // Stacks of different heights meeting
    let mut labels = Labels::new();
    let join = labels.fresh_label();
    let mut code = Code::new(1, 1);
    code.push(ILoad(0))
        .push(If(OrdComparison::EQ, join))
        .push(IConst0)
        .place_label(join)
        .push(Return);
    let err = Analyzer::new(&verifier).analyze(&method, &code).unwrap_err();
    assert!(matches!(
        err.state_kind(),
        Some(StateErrorKind::IncompatibleStackHeights(..))
    ));
    assert_eq!(err.index(), Some(3));

    // Reading a local that was never written
    let mut code = Code::new(1, 2);
    code.push(ILoad(1)).push(Pop).push(Return);
    let err = Analyzer::new(&verifier).analyze(&method, &code).unwrap_err();
    assert_eq!(err.state_kind(), Some(&StateErrorKind::UninitializedLocal(1)));

    // Running off the end
    let mut code = Code::new(1, 1);
    code.push(ILoad(0)).push(Pop);
    let err = Analyzer::new(&verifier).analyze(&method, &code).unwrap_err();
    assert_eq!(err.state_kind(), Some(&StateErrorKind::FallsOffEnd));
}

#[test]
fn rejected_opcodes() {
    let hierarchy = ClassHierarchy::new();
    let method = static_method("(II)I");
    let mut code = Code::new(2, 2);
    code.push(ILoad(0)).push(ILoad(1)).push(IDiv).push(IReturn);

    // Rejected by the analysis settings
    let verifier = BasicVerifier::new(&hierarchy);
    let settings = AnalyzerSettings {
        subroutines: false,
        accepted_opcodes: OpcodeSet::linear().without(opcodes::IDIV),
    };
    let err = Analyzer::new(&verifier)
        .with_settings(settings)
        .analyze(&method, &code)
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidOpcode {
            opcode: opcodes::IDIV,
            index: Some(2)
        }
    );

    // Rejected by the interpreter
    let verifier = BasicVerifier::new(&hierarchy)
        .with_accepted_opcodes(OpcodeSet::all().without(opcodes::IRETURN));
    let err = Analyzer::new(&verifier).analyze(&method, &code).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidOpcode {
            opcode: opcodes::IRETURN,
            index: Some(3)
        }
    );
}

#[test]
fn constructor() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);
    let method =
        MethodContext::parse("me/alec/Point", MethodAccessFlags::PUBLIC, "<init>", "(I)V")
            .unwrap();

    let mut code = Code::new(2, 2);
    code.push(ALoad(0)) // 0
        .push(ILoad(1)) // 1
        .push(Instruction::field(opcodes::PUTFIELD, "me/alec/Point", "x", "I").unwrap()) // 2
        .push(ALoad(0)) // 3
        .push(init_object()) // 4
        .push(Return); // 5

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
    assert_eq!(analysis.frame(0).unwrap().locals(), &[UninitializedThis, Integer]);
    assert_eq!(analysis.frame(4).unwrap().stack(), &[UninitializedThis]);
    assert_eq!(
        analysis.frame(5).unwrap().locals(),
        &[VerificationType::reference("me/alec/Point").unwrap(), Integer]
    );
    assert!(matches!(
        &code.nodes[4],
        Node::Instruction(Invoke(InvokeType::Special, _))
    ));
}

#[test]
fn frame_insertion() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(Ljava/lang/String;)I");

    let mut labels = Labels::new();
    let (is_null, join) = (labels.fresh_label(), labels.fresh_label());
    let mut code = Code::new(1, 1);
    code.push(ALoad(0)) // 0
        .push(IfNull(EqComparison::EQ, is_null)) // 1
        .push(IConst1) // 2
        .push(Goto(join)) // 3
        .place_label(is_null) // 4
        .push(IConst0) // 5
        .place_label(join) // 6
        .push(IReturn); // 7

    // A stale frame marker gets replaced
    let mut with_stale_marker = code.clone();
    with_stale_marker.nodes.insert(7, Node::Frame(StackMapFrame::Same));

    let analysis = Analyzer::new(&verifier)
        .analyze(&method, &with_stale_marker)
        .unwrap();
    let nodes = analysis.insert_frames(&with_stale_marker);

    let string = object(BinaryName::STRING);
    let mut expected = code.nodes.clone();
    expected.insert(
        7,
        Node::Frame(StackMapFrame::Full {
            locals: vec![string.clone()],
            stack: vec![Integer],
        }),
    );
    expected.insert(
        5,
        Node::Frame(StackMapFrame::Full {
            locals: vec![string],
            stack: vec![],
        }),
    );
    assert_eq!(nodes, expected);

    // Re-analyzing the rewritten code gives the same frames (markers are transparent)
    let mut rewritten = code.clone();
    rewritten.nodes = nodes;
    let reanalysis = Analyzer::new(&verifier).analyze(&method, &rewritten).unwrap();
    assert_eq!(reanalysis.frame(9).unwrap().stack(), &[Integer]);

    assert_eq!(
        analysis.stack_map_frames(),
        vec![
            (4, StackMapFrame::Same),
            (6, StackMapFrame::SameLocals1StackItem(Integer))
        ]
    );
}

#[test]
fn adjacent_targets_share_a_frame() {
    let hierarchy = ClassHierarchy::new();
    let verifier = BasicVerifier::new(&hierarchy);
    let method = static_method("(I)V");

    let mut labels = Labels::new();
    let (zero, negative) = (labels.fresh_label(), labels.fresh_label());
    let mut code = Code::new(1, 1);
    code.push(ILoad(0)) // 0
        .push(If(OrdComparison::EQ, zero)) // 1
        .push(ILoad(0)) // 2
        .push(If(OrdComparison::LT, negative)) // 3
        .place_label(zero) // 4
        .place_label(negative) // 5
        .push(Return); // 6

    let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
    assert_eq!(analysis.frame_positions(), &[5]);
    assert_eq!(analysis.stack_map_frames(), vec![(5, StackMapFrame::Same)]);

    // Both labels are at the same bytecode offset, so only one marker follows them
    let mut expected = code.nodes.clone();
    expected.insert(
        6,
        Node::Frame(StackMapFrame::Full {
            locals: vec![Integer],
            stack: vec![],
        }),
    );
    assert_eq!(analysis.insert_frames(&code), expected);

    // An existing marker in the middle of the run is dropped, and the run still gets one
    let mut with_marker = code.clone();
    with_marker.nodes.insert(5, Node::Frame(StackMapFrame::Same));
    let analysis = Analyzer::new(&verifier).analyze(&method, &with_marker).unwrap();
    assert_eq!(analysis.frame_positions(), &[6]);
    assert_eq!(analysis.insert_frames(&with_marker), expected);
}

#[test]
fn shared_hierarchy_across_threads() {
    let hierarchy = ClassHierarchy::with_java_library_types();
    let verifier = BasicVerifier::new(&hierarchy);

    std::thread::scope(|scope| {
        let handles: Vec<_> = ["(I)I", "(J)J", "(F)F", "(D)D"]
            .into_iter()
            .map(|descriptor| {
                let verifier = &verifier;
                scope.spawn(move || {
                    let method = static_method(descriptor);
                    let (load, ret) = match descriptor {
                        "(I)I" => (ILoad(0), IReturn),
                        "(J)J" => (LLoad(0), LReturn),
                        "(F)F" => (FLoad(0), FReturn),
                        _ => (DLoad(0), DReturn),
                    };
                    let mut code = Code::new(2, 2);
                    code.push(load).push(ret);
                    Analyzer::new(verifier)
                        .analyze(&method, &code)
                        .map(|analysis| analysis.max_stack())
                })
            })
            .collect();

        let max_stacks: Vec<usize> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect();
        assert_eq!(max_stacks, vec![1, 2, 1, 2]);
    });
}
