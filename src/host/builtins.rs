//! Host functions installed into each run.
//!
//! A fresh [`BuiltinRegistry`] is built for every run and handed to the
//! interpreter through the bridge. Names containing a dot (`time.sleep`) are
//! members of a host module; registering one makes the module importable.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;

use crate::interpreter::{BuiltinKind, BuiltinOutcome, GuestError, GuestErrorKind, SuspendReason, Value};
use crate::terminal::{ColorTag, TerminalHandle};

/// What a handler may touch while it runs.
pub struct BuiltinContext<'a> {
    /// Terminal of the current run.
    pub terminal: &'a TerminalHandle,
    /// Per-run random source.
    pub rng: &'a mut StdRng,
}

/// Host function implementation.
pub type BuiltinHandler = fn(&mut BuiltinContext<'_>, Vec<Value>) -> Result<BuiltinOutcome, GuestError>;

/// One registry entry.
#[derive(Clone)]
pub struct BuiltinRegistration {
    /// Guest-visible name (`sleep`, `random.randint`).
    pub name: String,
    /// Whether the call can suspend.
    pub kind: BuiltinKind,
    /// Implementation.
    pub handler: BuiltinHandler,
}

impl BuiltinRegistration {
    /// Build a registration.
    pub fn new(name: impl Into<String>, kind: BuiltinKind, handler: BuiltinHandler) -> Self {
        Self {
            name: name.into(),
            kind,
            handler,
        }
    }

    fn module(&self) -> Option<&str> {
        self.name.split_once('.').map(|(module, _)| module)
    }
}

/// Name-to-handler table.
#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    entries: HashMap<String, BuiltinRegistration>,
    modules: BTreeSet<String>,
}

impl BuiltinRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `sleep`, `choice`, `clear`, `input` and the `time`/`random` modules.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(BuiltinRegistration::new("sleep", BuiltinKind::Suspending, sleep));
        registry.register(BuiltinRegistration::new("choice", BuiltinKind::Sync, choice));
        registry.register(BuiltinRegistration::new("clear", BuiltinKind::Sync, clear));
        registry.register(BuiltinRegistration::new("input", BuiltinKind::Suspending, input));
        registry.register(BuiltinRegistration::new("time.sleep", BuiltinKind::Suspending, sleep));
        registry.register(BuiltinRegistration::new("random.choice", BuiltinKind::Sync, choice));
        registry.register(BuiltinRegistration::new("random.randint", BuiltinKind::Sync, randint));
        registry.register(BuiltinRegistration::new("random.random", BuiltinKind::Sync, random));
        registry
    }

    /// Add or replace an entry.
    pub fn register(&mut self, registration: BuiltinRegistration) {
        if let Some(module) = registration.module() {
            self.modules.insert(module.to_string());
        }
        self.entries.insert(registration.name.clone(), registration);
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Option<&BuiltinRegistration> {
        self.entries.get(name)
    }

    /// Kind of the entry under `name`.
    pub fn kind(&self, name: &str) -> Option<BuiltinKind> {
        self.get(name).map(|entry| entry.kind)
    }

    /// Whether `name` is a host module.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke the entry under `name`.
    pub fn call(
        &self,
        name: &str,
        ctx: &mut BuiltinContext<'_>,
        args: Vec<Value>,
    ) -> Result<BuiltinOutcome, GuestError> {
        let entry = self.get(name).ok_or_else(|| {
            GuestError::new(
                GuestErrorKind::NameError,
                format!("name '{}' is not defined", name),
            )
        })?;
        (entry.handler)(ctx, args)
    }
}

fn sleep(_ctx: &mut BuiltinContext<'_>, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
    arity("sleep", &args, 1, 1)?;
    let seconds = match &args[0] {
        Value::Integer(num) => *num as f64,
        Value::Float(num) => *num,
        other => {
            return Err(type_error(format!(
                "'{}' object cannot be interpreted as a number",
                other.type_name()
            )));
        }
    };
    if seconds < 0.0 {
        return Err(GuestError::new(
            GuestErrorKind::ValueError,
            "sleep length must be non-negative",
        ));
    }
    let delay = Duration::try_from_secs_f64(seconds).map_err(|_| {
        GuestError::new(GuestErrorKind::OverflowError, "sleep length is too large")
    })?;
    Ok(BuiltinOutcome::Suspend(SuspendReason::Timer(delay)))
}

fn choice(ctx: &mut BuiltinContext<'_>, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
    arity("choice", &args, 1, 1)?;
    let items = args[0].sequence_items().ok_or_else(|| {
        type_error(format!(
            "'{}' object is not a sequence",
            args[0].type_name()
        ))
    })?;
    if items.is_empty() {
        return Err(GuestError::new(
            GuestErrorKind::IndexError,
            "Cannot choose from an empty sequence",
        ));
    }
    let pick = ctx.rng.gen_range(0..items.len());
    Ok(BuiltinOutcome::Return(items[pick].clone()))
}

fn clear(ctx: &mut BuiltinContext<'_>, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
    arity("clear", &args, 0, 0)?;
    ctx.terminal.clear();
    Ok(BuiltinOutcome::Return(Value::None))
}

fn input(ctx: &mut BuiltinContext<'_>, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
    arity("input", &args, 0, 1)?;
    let prompt = args.first().map(Value::to_string).unwrap_or_default();
    ctx.terminal.write(&prompt, ColorTag::Normal);
    Ok(BuiltinOutcome::Suspend(SuspendReason::Input { prompt }))
}

fn randint(ctx: &mut BuiltinContext<'_>, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
    arity("randint", &args, 2, 2)?;
    let (low, high) = match (&args[0], &args[1]) {
        (Value::Integer(low), Value::Integer(high)) => (*low, *high),
        (low, high) => {
            return Err(type_error(format!(
                "randint() arguments must be int, not '{}' and '{}'",
                low.type_name(),
                high.type_name()
            )));
        }
    };
    if low > high {
        return Err(GuestError::new(
            GuestErrorKind::ValueError,
            format!("empty range for randint({}, {})", low, high),
        ));
    }
    Ok(BuiltinOutcome::Return(Value::Integer(ctx.rng.gen_range(low..=high))))
}

fn random(ctx: &mut BuiltinContext<'_>, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
    arity("random", &args, 0, 0)?;
    Ok(BuiltinOutcome::Return(Value::Float(ctx.rng.gen_range(0.0..1.0))))
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), GuestError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = match (min, max) {
        (0, 0) => "no arguments".to_string(),
        (min, max) if min == max => format!("exactly {} argument(s)", min),
        (min, max) => format!("from {} to {} arguments", min, max),
    };
    Err(type_error(format!(
        "{}() takes {} ({} given)",
        name,
        expected,
        args.len()
    )))
}

fn type_error(message: String) -> GuestError {
    GuestError::new(GuestErrorKind::TypeError, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::MemorySink;
    use rand::SeedableRng;

    fn call(registry: &BuiltinRegistry, name: &str, args: Vec<Value>) -> (Result<BuiltinOutcome, GuestError>, TerminalHandle) {
        let terminal = TerminalHandle::new(MemorySink::new());
        let mut rng = StdRng::seed_from_u64(42);
        let mut ctx = BuiltinContext {
            terminal: &terminal,
            rng: &mut rng,
        };
        let result = registry.call(name, &mut ctx, args);
        (result, terminal)
    }

    #[test]
    fn standard_registry_contents() {
        let registry = BuiltinRegistry::standard();
        assert_eq!(
            registry.names(),
            vec![
                "choice",
                "clear",
                "input",
                "random.choice",
                "random.randint",
                "random.random",
                "sleep",
                "time.sleep"
            ]
        );
        assert_eq!(registry.kind("sleep"), Some(BuiltinKind::Suspending));
        assert_eq!(registry.kind("choice"), Some(BuiltinKind::Sync));
        assert!(registry.has_module("time"));
        assert!(registry.has_module("random"));
        assert!(!registry.has_module("os"));
    }

    #[test]
    fn sleep_validates_its_argument() {
        let registry = BuiltinRegistry::standard();
        let (ok, _) = call(&registry, "sleep", vec![Value::Float(0.25)]);
        assert_eq!(
            ok.unwrap(),
            BuiltinOutcome::Suspend(SuspendReason::Timer(Duration::from_millis(250)))
        );
        let (negative, _) = call(&registry, "sleep", vec![Value::Integer(-1)]);
        assert_eq!(negative.unwrap_err().kind, GuestErrorKind::ValueError);
        let (text, _) = call(&registry, "sleep", vec![Value::String("1".into())]);
        assert_eq!(text.unwrap_err().kind, GuestErrorKind::TypeError);
        let (none, _) = call(&registry, "sleep", vec![]);
        assert_eq!(none.unwrap_err().kind, GuestErrorKind::TypeError);
    }

    #[test]
    fn choice_picks_a_member_or_fails_on_empty() {
        let registry = BuiltinRegistry::standard();
        let items = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
        let (picked, _) = call(&registry, "choice", vec![Value::List(items.clone())]);
        match picked.unwrap() {
            BuiltinOutcome::Return(value) => assert!(items.contains(&value)),
            other => panic!("unexpected {:?}", other),
        }
        let (empty, _) = call(&registry, "random.choice", vec![Value::List(vec![])]);
        let err = empty.unwrap_err();
        assert_eq!(err.kind, GuestErrorKind::IndexError);
        assert_eq!(err.message, "Cannot choose from an empty sequence");
    }

    #[test]
    fn input_writes_prompt_before_suspending() {
        let registry = BuiltinRegistry::standard();
        let (outcome, terminal) = call(&registry, "input", vec![Value::String("name? ".into())]);
        assert_eq!(
            outcome.unwrap(),
            BuiltinOutcome::Suspend(SuspendReason::Input {
                prompt: "name? ".into()
            })
        );
        assert_eq!(terminal.contents(), "name? ");
    }

    #[test]
    fn clear_resets_the_terminal() {
        let registry = BuiltinRegistry::standard();
        let terminal = TerminalHandle::new(MemorySink::new());
        terminal.write("junk", ColorTag::Normal);
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = BuiltinContext {
            terminal: &terminal,
            rng: &mut rng,
        };
        assert_eq!(
            registry.call("clear", &mut ctx, vec![]).unwrap(),
            BuiltinOutcome::Return(Value::None)
        );
        assert_eq!(terminal.contents(), "");
    }

    #[test]
    fn randint_is_inclusive_and_ordered() {
        let registry = BuiltinRegistry::standard();
        let (same, _) = call(&registry, "random.randint", vec![Value::Integer(4), Value::Integer(4)]);
        assert_eq!(same.unwrap(), BuiltinOutcome::Return(Value::Integer(4)));
        let (reversed, _) = call(&registry, "random.randint", vec![Value::Integer(5), Value::Integer(1)]);
        assert_eq!(reversed.unwrap_err().kind, GuestErrorKind::ValueError);
        let (unit, _) = call(&registry, "random.random", vec![]);
        match unit.unwrap() {
            BuiltinOutcome::Return(Value::Float(num)) => assert!((0.0..1.0).contains(&num)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
