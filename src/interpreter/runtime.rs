use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ir::{Instruction, ProgramIr};
use super::value::{Callable, MAX_SEQUENCE_LEN, ModuleRef, NativeFn, Value};
use super::{GuestError, GuestErrorKind, compile};

/// How a host builtin completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinKind {
    /// Returns its result immediately.
    Sync,
    /// Parks the interpreter until the host resumes it.
    Suspending,
}

/// Result of invoking a host builtin.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinOutcome {
    /// The call finished with a value.
    Return(Value),
    /// The call must wait for an external event before producing a value.
    Suspend(SuspendReason),
}

/// Why the interpreter is parked.
#[derive(Debug, Clone, PartialEq)]
pub enum SuspendReason {
    /// Resume with `None` once the delay has elapsed.
    Timer(Duration),
    /// Resume with the line the user typed.
    Input {
        /// Prompt already written to the terminal by the builtin.
        prompt: String,
    },
}

/// A pending suspension. `ticket` must be handed back to [`InterpreterRuntime::resume`].
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
    /// Identifier of this suspension; each is resumable exactly once.
    pub ticket: u64,
    /// Event the interpreter is waiting for.
    pub reason: SuspendReason,
}

/// Host contract the interpreter executes against.
pub trait InterpreterHost {
    /// Sink for every unit of text the guest prints, in production order.
    fn output(&mut self, text: &str);
    /// Resolve a virtual file (library source), or fail with a not-found condition.
    fn read(&mut self, resource: &str) -> Result<String, GuestError>;
    /// Kind of the host builtin registered under `name`, if any.
    fn builtin_kind(&self, name: &str) -> Option<BuiltinKind>;
    /// Whether `name` is a host-provided module (its members live in the builtin table).
    fn has_module(&self, name: &str) -> bool;
    /// Invoke the host builtin registered under `name`.
    fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError>;
}

/// Outcome of a `tick` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// One instruction executed.
    Progress,
    /// The interpreter is parked on the supplied suspension.
    Suspended(Suspension),
    /// Program execution completed.
    Completed,
}

/// Errors surfaced while driving the runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Uncaught guest exception; the runtime is finished afterwards.
    #[error("{0}")]
    Guest(GuestError),
    /// `resume` was called with a ticket that is not the currently parked one.
    #[error("resume ticket {ticket} does not match a parked suspension")]
    StaleResume {
        /// Ticket supplied by the caller.
        ticket: u64,
    },
}

/// Path of the virtual file backing `import name`.
pub fn library_path(module: &str) -> String {
    format!("lib/{}.py", module)
}

/// Stateful interpreter that executes compiled programs against a host.
pub struct InterpreterRuntime<H> {
    host: H,
    frames: Vec<Frame>,
    namespaces: Vec<HashMap<String, Value>>,
    modules: HashMap<String, Value>,
    parked: Option<Suspension>,
    next_ticket: u64,
    completed: bool,
    steps: u64,
}

impl<H: InterpreterHost> InterpreterRuntime<H> {
    /// Create a runtime that will execute `program` as the main module.
    pub fn new(host: H, program: ProgramIr) -> Self {
        Self {
            host,
            frames: vec![Frame::new(Arc::new(program), 0, None)],
            namespaces: vec![HashMap::new()],
            modules: HashMap::new(),
            parked: None,
            next_ticket: 1,
            completed: false,
            steps: 0,
        }
    }

    /// Execute one instruction, or report the pending suspension / completion.
    ///
    /// Ticking a parked runtime is harmless: it reports the same suspension again
    /// without making progress.
    pub fn tick(&mut self) -> Result<RuntimeEvent, RuntimeError> {
        if let Some(parked) = &self.parked {
            return Ok(RuntimeEvent::Suspended(parked.clone()));
        }
        if self.completed {
            return Ok(RuntimeEvent::Completed);
        }
        match self.step() {
            Ok(event) => Ok(event),
            Err(err) => {
                self.completed = true;
                self.frames.clear();
                Err(RuntimeError::Guest(err))
            }
        }
    }

    /// Resume a parked runtime, delivering `value` as the result of the suspending call.
    pub fn resume(&mut self, ticket: u64, value: Value) -> Result<(), RuntimeError> {
        match &self.parked {
            Some(parked) if parked.ticket == ticket => {
                self.parked = None;
                self.push(value);
                Ok(())
            }
            _ => Err(RuntimeError::StaleResume { ticket }),
        }
    }

    /// Access the host (useful for inspection in tests).
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consume the runtime, returning its host.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Current suspension, if parked.
    pub fn parked(&self) -> Option<&Suspension> {
        self.parked.as_ref()
    }

    /// Whether execution has finished (normally or by an uncaught exception).
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Depth of the frame stack (main module plus in-progress imports).
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Read a variable from the main module's namespace.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.namespaces.first().and_then(|ns| ns.get(name))
    }

    fn step(&mut self) -> Result<RuntimeEvent, GuestError> {
        let Some(frame) = self.frames.last_mut() else {
            self.completed = true;
            return Ok(RuntimeEvent::Completed);
        };

        if frame.pc >= frame.program.code.len() {
            self.finish_frame();
            if self.frames.is_empty() {
                self.completed = true;
                return Ok(RuntimeEvent::Completed);
            }
            return Ok(RuntimeEvent::Progress);
        }

        let pc = frame.pc;
        let instruction = frame.program.code[pc].clone();
        let line = frame.program.line_at(pc);
        frame.pc += 1;
        self.steps += 1;

        self.execute(instruction).map_err(|err| match line {
            Some(line) => err.at_line(line),
            None => err,
        })
    }

    fn finish_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Some(name) = frame.import {
            let module = Value::Module(ModuleRef::Library {
                name: name.clone(),
                namespace: frame.namespace,
            });
            self.bind(name, module);
        }
    }

    fn execute(&mut self, instruction: Instruction) -> Result<RuntimeEvent, GuestError> {
        match instruction {
            Instruction::Const(value) => self.push(value),
            Instruction::Load(name) => {
                let value = self.load(&name)?;
                self.push(value);
            }
            Instruction::Store(name) => {
                let value = self.pop()?;
                self.bind(name, value);
            }
            Instruction::LoadAttr(name) => {
                let value = self.pop()?;
                let member = self.load_attr(&value, &name)?;
                self.push(member);
            }
            Instruction::Index => {
                let index = self.pop()?;
                let value = self.pop()?;
                self.push(value.index(&index)?);
            }
            Instruction::BuildList(count) => {
                let items = self.pop_n(count)?;
                self.push(Value::List(items));
            }
            Instruction::Unary(op) => {
                let operand = self.pop()?;
                self.push(Value::unary(op, &operand)?);
            }
            Instruction::Binary(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.push(Value::binary(op, &left, &right)?);
            }
            Instruction::Compare(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.push(Value::compare(op, &left, &right)?);
            }
            Instruction::Call(argc) => return self.call(argc),
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::Jump(target) => self.jump(target)?,
            Instruction::JumpIfFalse(target) => {
                if !self.pop()?.is_truthy() {
                    self.jump(target)?;
                }
            }
            Instruction::JumpIfFalseOrPop(target) => {
                if self.peek()?.is_truthy() {
                    self.pop()?;
                } else {
                    self.jump(target)?;
                }
            }
            Instruction::JumpIfTrueOrPop(target) => {
                if self.peek()?.is_truthy() {
                    self.jump(target)?;
                } else {
                    self.pop()?;
                }
            }
            Instruction::Import(name) => self.import(name)?,
            Instruction::GetIter => {
                let value = self.pop()?;
                let items = value.sequence_items().ok_or_else(|| {
                    GuestError::new(
                        GuestErrorKind::TypeError,
                        format!("'{}' object is not iterable", value.type_name()),
                    )
                })?;
                self.top()?.iterators.push(items.into_iter());
            }
            Instruction::ForIter(target) => {
                let frame = self.top()?;
                match frame.iterators.last_mut().and_then(Iterator::next) {
                    Some(item) => frame.stack.push(item),
                    None => {
                        frame.iterators.pop();
                        frame.pc = target;
                    }
                }
            }
            Instruction::PopIter => {
                self.top()?.iterators.pop();
            }
        }
        Ok(RuntimeEvent::Progress)
    }

    fn call(&mut self, argc: usize) -> Result<RuntimeEvent, GuestError> {
        let args = self.pop_n(argc)?;
        let callee = self.pop()?;
        match callee {
            Value::Function(Callable::Native(native)) => {
                let result = self.call_native(native, args)?;
                self.push(result);
                Ok(RuntimeEvent::Progress)
            }
            Value::Function(Callable::Host(name)) => match self.host.call_builtin(&name, args)? {
                BuiltinOutcome::Return(value) => {
                    self.push(value);
                    Ok(RuntimeEvent::Progress)
                }
                BuiltinOutcome::Suspend(reason) => {
                    let suspension = Suspension {
                        ticket: self.next_ticket,
                        reason,
                    };
                    self.next_ticket += 1;
                    self.parked = Some(suspension.clone());
                    Ok(RuntimeEvent::Suspended(suspension))
                }
            },
            other => Err(GuestError::new(
                GuestErrorKind::TypeError,
                format!("'{}' object is not callable", other.type_name()),
            )),
        }
    }

    fn call_native(&mut self, native: NativeFn, args: Vec<Value>) -> Result<Value, GuestError> {
        match native {
            NativeFn::Print => {
                let parts: Vec<String> = args.iter().map(Value::to_string).collect();
                let mut text = parts.join(" ");
                text.push('\n');
                self.host.output(&text);
                Ok(Value::None)
            }
            NativeFn::Len => {
                expect_arity(native, &args, 1, 1)?;
                match &args[0] {
                    Value::String(text) => Ok(Value::Integer(text.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Integer(items.len() as i64)),
                    other => Err(GuestError::new(
                        GuestErrorKind::TypeError,
                        format!("object of type '{}' has no len()", other.type_name()),
                    )),
                }
            }
            NativeFn::Str => {
                expect_arity(native, &args, 0, 1)?;
                Ok(Value::String(
                    args.first().map(Value::to_string).unwrap_or_default(),
                ))
            }
            NativeFn::Int => {
                expect_arity(native, &args, 0, 1)?;
                match args.first() {
                    None => Ok(Value::Integer(0)),
                    Some(Value::Integer(num)) => Ok(Value::Integer(*num)),
                    Some(Value::Boolean(flag)) => Ok(Value::Integer(*flag as i64)),
                    Some(Value::Float(num)) if num.is_finite() => Ok(Value::Integer(num.trunc() as i64)),
                    Some(Value::String(text)) => text.trim().parse::<i64>().map(Value::Integer).map_err(|_| {
                        GuestError::new(
                            GuestErrorKind::ValueError,
                            format!("invalid literal for int() with base 10: '{}'", text),
                        )
                    }),
                    Some(other) => Err(GuestError::new(
                        GuestErrorKind::TypeError,
                        format!("int() argument must be a string or a number, not '{}'", other.type_name()),
                    )),
                }
            }
            NativeFn::Float => {
                expect_arity(native, &args, 0, 1)?;
                match args.first() {
                    None => Ok(Value::Float(0.0)),
                    Some(Value::String(text)) => text.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                        GuestError::new(
                            GuestErrorKind::ValueError,
                            format!("could not convert string to float: '{}'", text),
                        )
                    }),
                    Some(other) => other.as_number().map(Value::Float).ok_or_else(|| {
                        GuestError::new(
                            GuestErrorKind::TypeError,
                            format!("float() argument must be a string or a number, not '{}'", other.type_name()),
                        )
                    }),
                }
            }
            NativeFn::Range => {
                expect_arity(native, &args, 1, 3)?;
                let mut bounds = Vec::with_capacity(args.len());
                for arg in &args {
                    match arg {
                        Value::Integer(num) => bounds.push(*num),
                        Value::Boolean(flag) => bounds.push(*flag as i64),
                        other => {
                            return Err(GuestError::new(
                                GuestErrorKind::TypeError,
                                format!("'{}' object cannot be interpreted as an integer", other.type_name()),
                            ));
                        }
                    }
                }
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => (0, 0, 1),
                };
                if step == 0 {
                    return Err(GuestError::new(GuestErrorKind::ValueError, "range() arg 3 must not be zero"));
                }
                let span = if step > 0 { stop.saturating_sub(start) } else { start.saturating_sub(stop) };
                let len = if span <= 0 { 0 } else { (span - 1) / step.saturating_abs() + 1 };
                if len > MAX_SEQUENCE_LEN as i64 {
                    return Err(GuestError::new(GuestErrorKind::ValueError, "range() result is too large"));
                }
                Ok(Value::List(
                    (0..len).map(|i| Value::Integer(start + i * step)).collect(),
                ))
            }
        }
    }

    fn import(&mut self, name: String) -> Result<(), GuestError> {
        if let Some(module) = self.modules.get(&name).cloned() {
            self.bind(name, module);
            return Ok(());
        }

        if self.host.has_module(&name) {
            let module = Value::Module(ModuleRef::Host(name.clone()));
            self.modules.insert(name.clone(), module.clone());
            self.bind(name, module);
            return Ok(());
        }

        let source = self.host.read(&library_path(&name))?;
        let program = compile(&name, &source)
            .map_err(|err| GuestError::new(GuestErrorKind::SyntaxError, format!("in module '{}': {}", name, err)))?;

        let namespace = self.namespaces.len();
        self.namespaces.push(HashMap::new());
        // Registered before execution so circular imports see the partial module.
        self.modules.insert(
            name.clone(),
            Value::Module(ModuleRef::Library {
                name: name.clone(),
                namespace,
            }),
        );
        self.frames
            .push(Frame::new(Arc::new(program), namespace, Some(name)));
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Value, GuestError> {
        let namespace = self.frames.last().map(|frame| frame.namespace).unwrap_or(0);
        if let Some(value) = self.namespaces.get(namespace).and_then(|ns| ns.get(name)) {
            return Ok(value.clone());
        }
        if self.host.builtin_kind(name).is_some() {
            return Ok(Value::Function(Callable::Host(name.to_string())));
        }
        if let Some(native) = NativeFn::from_name(name) {
            return Ok(Value::Function(Callable::Native(native)));
        }
        Err(GuestError::new(
            GuestErrorKind::NameError,
            format!("name '{}' is not defined", name),
        ))
    }

    fn load_attr(&self, value: &Value, name: &str) -> Result<Value, GuestError> {
        match value {
            Value::Module(ModuleRef::Host(module)) => {
                let qualified = format!("{}.{}", module, name);
                if self.host.builtin_kind(&qualified).is_some() {
                    Ok(Value::Function(Callable::Host(qualified)))
                } else {
                    Err(no_module_attribute(module, name))
                }
            }
            Value::Module(ModuleRef::Library { name: module, namespace }) => self
                .namespaces
                .get(*namespace)
                .and_then(|ns| ns.get(name))
                .cloned()
                .ok_or_else(|| no_module_attribute(module, name)),
            other => Err(GuestError::new(
                GuestErrorKind::AttributeError,
                format!("'{}' object has no attribute '{}'", other.type_name(), name),
            )),
        }
    }

    fn bind(&mut self, name: String, value: Value) {
        let namespace = self.frames.last().map(|frame| frame.namespace).unwrap_or(0);
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            ns.insert(name, value);
        }
    }

    fn top(&mut self) -> Result<&mut Frame, GuestError> {
        self.frames
            .last_mut()
            .ok_or_else(|| GuestError::new(GuestErrorKind::SystemError, "no active frame"))
    }

    fn push(&mut self, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.stack.push(value);
        }
    }

    fn pop(&mut self) -> Result<Value, GuestError> {
        self.top()?
            .stack
            .pop()
            .ok_or_else(|| GuestError::new(GuestErrorKind::SystemError, "value stack underflow"))
    }

    fn peek(&mut self) -> Result<Value, GuestError> {
        self.top()?
            .stack
            .last()
            .cloned()
            .ok_or_else(|| GuestError::new(GuestErrorKind::SystemError, "value stack underflow"))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, GuestError> {
        let frame = self.top()?;
        if frame.stack.len() < count {
            return Err(GuestError::new(GuestErrorKind::SystemError, "value stack underflow"));
        }
        let split = frame.stack.len() - count;
        Ok(frame.stack.split_off(split))
    }

    fn jump(&mut self, target: usize) -> Result<(), GuestError> {
        self.top()?.pc = target;
        Ok(())
    }
}

struct Frame {
    program: Arc<ProgramIr>,
    pc: usize,
    stack: Vec<Value>,
    iterators: Vec<std::vec::IntoIter<Value>>,
    namespace: usize,
    // Module name when this frame is executing an import.
    import: Option<String>,
}

impl Frame {
    fn new(program: Arc<ProgramIr>, namespace: usize, import: Option<String>) -> Self {
        Self {
            program,
            pc: 0,
            stack: Vec::new(),
            iterators: Vec::new(),
            namespace,
            import,
        }
    }
}

fn expect_arity(native: NativeFn, args: &[Value], min: usize, max: usize) -> Result<(), GuestError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(GuestError::new(
            GuestErrorKind::TypeError,
            format!(
                "{}() takes {} argument(s) ({} given)",
                native.name(),
                expected,
                args.len()
            ),
        ));
    }
    Ok(())
}

fn no_module_attribute(module: &str, name: &str) -> GuestError {
    GuestError::new(
        GuestErrorKind::AttributeError,
        format!("module '{}' has no attribute '{}'", module, name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MockHost {
        output: String,
        files: BTreeMap<String, String>,
        calls: Vec<(String, Vec<Value>)>,
    }

    impl InterpreterHost for MockHost {
        fn output(&mut self, text: &str) {
            self.output.push_str(text);
        }

        fn read(&mut self, resource: &str) -> Result<String, GuestError> {
            self.files
                .get(resource)
                .cloned()
                .ok_or_else(|| GuestError::resource_not_found(resource))
        }

        fn builtin_kind(&self, name: &str) -> Option<BuiltinKind> {
            match name {
                "sleep" | "input" | "clock.wait" => Some(BuiltinKind::Suspending),
                "twice" => Some(BuiltinKind::Sync),
                _ => None,
            }
        }

        fn has_module(&self, name: &str) -> bool {
            name == "clock"
        }

        fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
            self.calls.push((name.to_string(), args.clone()));
            match name {
                "sleep" | "clock.wait" => Ok(BuiltinOutcome::Suspend(SuspendReason::Timer(
                    Duration::from_secs_f64(args[0].as_number().unwrap_or(0.0)),
                ))),
                "input" => Ok(BuiltinOutcome::Suspend(SuspendReason::Input {
                    prompt: args.first().map(Value::to_string).unwrap_or_default(),
                })),
                "twice" => Value::binary(super::super::ast::BinaryOp::Mul, &args[0], &Value::Integer(2))
                    .map(BuiltinOutcome::Return),
                _ => unreachable!(),
            }
        }
    }

    fn runtime(src: &str) -> InterpreterRuntime<MockHost> {
        InterpreterRuntime::new(MockHost::default(), compile("<stdin>", src).expect("compile"))
    }

    fn run_until_event(runtime: &mut InterpreterRuntime<MockHost>) -> Result<RuntimeEvent, RuntimeError> {
        loop {
            match runtime.tick()? {
                RuntimeEvent::Progress => continue,
                other => return Ok(other),
            }
        }
    }

    #[test]
    fn runs_program_to_completion() {
        let mut rt = runtime("x = 2 + 3\nprint('x is', x, [x, 'y'])\n");
        assert_eq!(run_until_event(&mut rt).unwrap(), RuntimeEvent::Completed);
        assert_eq!(rt.host().output, "x is 5 [5, 'y']\n");
        assert_eq!(rt.global("x"), Some(&Value::Integer(5)));
        assert!(rt.is_completed());
    }

    #[test]
    fn suspends_and_resumes_exactly_once() {
        let mut rt = runtime("print('a'); sleep(1); print('b')");
        let suspension = match run_until_event(&mut rt).unwrap() {
            RuntimeEvent::Suspended(suspension) => suspension,
            other => panic!("expected suspension, got {:?}", other),
        };
        assert_eq!(suspension.reason, SuspendReason::Timer(Duration::from_secs(1)));
        assert_eq!(rt.host().output, "a\n");

        // Parked runtimes report the same suspension without progressing.
        assert_eq!(rt.tick().unwrap(), RuntimeEvent::Suspended(suspension.clone()));
        assert_eq!(rt.host().output, "a\n");

        assert_eq!(
            rt.resume(suspension.ticket + 1, Value::None),
            Err(RuntimeError::StaleResume { ticket: suspension.ticket + 1 })
        );
        rt.resume(suspension.ticket, Value::None).unwrap();
        assert_eq!(
            rt.resume(suspension.ticket, Value::None),
            Err(RuntimeError::StaleResume { ticket: suspension.ticket })
        );

        assert_eq!(run_until_event(&mut rt).unwrap(), RuntimeEvent::Completed);
        assert_eq!(rt.host().output, "a\nb\n");
    }

    #[test]
    fn resume_value_becomes_call_result() {
        let mut rt = runtime("name = input('who? ')\nprint('hi ' + name)\n");
        let suspension = match run_until_event(&mut rt).unwrap() {
            RuntimeEvent::Suspended(suspension) => suspension,
            other => panic!("expected suspension, got {:?}", other),
        };
        assert_eq!(
            suspension.reason,
            SuspendReason::Input {
                prompt: "who? ".into()
            }
        );
        rt.resume(suspension.ticket, Value::String("ada".into())).unwrap();
        assert_eq!(run_until_event(&mut rt).unwrap(), RuntimeEvent::Completed);
        assert_eq!(rt.host().output, "hi ada\n");
    }

    #[test]
    fn missing_library_is_resource_not_found_with_line() {
        let mut rt = runtime("print('start')\nimport helpers\n");
        let err = run_until_event(&mut rt).unwrap_err();
        match err {
            RuntimeError::Guest(guest) => {
                assert_eq!(guest.kind, GuestErrorKind::ResourceNotFound);
                assert_eq!(guest.message, "lib/helpers.py");
                assert_eq!(guest.line, Some(2));
            }
            other => panic!("expected guest error, got {:?}", other),
        }
        assert!(rt.is_completed());
        assert_eq!(rt.tick().unwrap(), RuntimeEvent::Completed);
    }

    #[test]
    fn library_modules_run_in_their_own_namespace() {
        let mut host = MockHost::default();
        host.files.insert(
            "lib/shapes.py".into(),
            "sides = 4\nprint('loading shapes')\n".into(),
        );
        let program = compile("<stdin>", "import shapes\nimport shapes\nprint(shapes.sides)\n").unwrap();
        let mut rt = InterpreterRuntime::new(host, program);
        assert_eq!(run_until_event(&mut rt).unwrap(), RuntimeEvent::Completed);
        assert_eq!(rt.host().output, "loading shapes\n4\n");
        assert_eq!(rt.global("sides"), None);
    }

    #[test]
    fn host_module_members_route_to_builtins() {
        let mut rt = runtime("import clock\nclock.wait(0.5)\nprint(twice(21))\n");
        let suspension = match run_until_event(&mut rt).unwrap() {
            RuntimeEvent::Suspended(suspension) => suspension,
            other => panic!("expected suspension, got {:?}", other),
        };
        assert_eq!(suspension.reason, SuspendReason::Timer(Duration::from_millis(500)));
        rt.resume(suspension.ticket, Value::None).unwrap();
        assert_eq!(run_until_event(&mut rt).unwrap(), RuntimeEvent::Completed);
        assert_eq!(rt.host().output, "42\n");
        assert_eq!(rt.host().calls[0].0, "clock.wait");
    }

    #[test]
    fn loops_and_branches() {
        let src = "total = 0\nfor i in range(10):\n    if i % 2 == 0:\n        continue\n    if i > 7:\n        break\n    total += i\nn = 0\nwhile n < 3 and total > 0:\n    n += 1\nprint(total, n)\n";
        let mut rt = runtime(src);
        assert_eq!(run_until_event(&mut rt).unwrap(), RuntimeEvent::Completed);
        assert_eq!(rt.host().output, "16 3\n");
    }

    #[test]
    fn guest_errors_carry_their_line() {
        let mut rt = runtime("x = 1\ny = [1, 2][x + 5]\n");
        let err = run_until_event(&mut rt).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: list index out of range on line 2");
    }

    #[test]
    fn unknown_names_raise_name_error() {
        let mut rt = runtime("print(missing)");
        let err = run_until_event(&mut rt).unwrap_err();
        assert_eq!(err.to_string(), "NameError: name 'missing' is not defined on line 1");
    }
}
