use std::sync::Arc;

use rand::rngs::StdRng;

use super::builtins::{BuiltinContext, BuiltinRegistry};
use super::library::VirtualLibrary;
use crate::interpreter::{BuiltinKind, BuiltinOutcome, GuestError, InterpreterHost, Value};
use crate::terminal::{ColorTag, TerminalHandle};

/// The interpreter's view of the host for one run.
///
/// Output goes straight to the terminal, `read` resolves against the virtual
/// library, and builtin calls dispatch through the run's registry.
pub struct GuestBridge {
    terminal: TerminalHandle,
    registry: BuiltinRegistry,
    library: Arc<VirtualLibrary>,
    rng: StdRng,
}

impl GuestBridge {
    /// Wire a bridge for a single run.
    pub fn new(
        terminal: TerminalHandle,
        registry: BuiltinRegistry,
        library: Arc<VirtualLibrary>,
        rng: StdRng,
    ) -> Self {
        Self {
            terminal,
            registry,
            library,
            rng,
        }
    }

    /// Registry installed for this run.
    pub fn registry(&self) -> &BuiltinRegistry {
        &self.registry
    }
}

impl InterpreterHost for GuestBridge {
    fn output(&mut self, text: &str) {
        self.terminal.write(text, ColorTag::Normal);
    }

    fn read(&mut self, resource: &str) -> Result<String, GuestError> {
        let result = self.library.read(resource).map(str::to_string);
        if result.is_err() {
            tracing::debug!(resource, "virtual file not found");
        }
        result
    }

    fn builtin_kind(&self, name: &str) -> Option<BuiltinKind> {
        self.registry.kind(name)
    }

    fn has_module(&self, name: &str) -> bool {
        self.registry.has_module(name)
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<BuiltinOutcome, GuestError> {
        let mut ctx = BuiltinContext {
            terminal: &self.terminal,
            rng: &mut self.rng,
        };
        self.registry.call(name, &mut ctx, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{InterpreterRuntime, RuntimeEvent, compile};
    use crate::terminal::MemorySink;
    use rand::SeedableRng;

    #[test]
    fn routes_output_and_library_reads() {
        let terminal = TerminalHandle::new(MemorySink::new());
        let mut library = VirtualLibrary::new();
        library.insert_module("greeting", "text = 'hello'\n");
        let bridge = GuestBridge::new(
            terminal.clone(),
            BuiltinRegistry::standard(),
            Arc::new(library),
            StdRng::seed_from_u64(0),
        );
        let program = compile("<stdin>", "import greeting\nprint(greeting.text)\nclear()\nprint('again')\n").unwrap();
        let mut runtime = InterpreterRuntime::new(bridge, program);
        while runtime.tick().unwrap() != RuntimeEvent::Completed {}
        assert_eq!(terminal.contents(), "again\n");
    }

    #[test]
    fn exposes_the_run_registry() {
        let bridge = GuestBridge::new(
            TerminalHandle::new(MemorySink::new()),
            BuiltinRegistry::standard(),
            Arc::new(VirtualLibrary::new()),
            StdRng::seed_from_u64(0),
        );
        assert_eq!(bridge.builtin_kind("input"), Some(BuiltinKind::Suspending));
        assert_eq!(bridge.builtin_kind("print"), None);
        assert!(bridge.has_module("random"));
        assert_eq!(bridge.registry().names().len(), 8);
    }
}
