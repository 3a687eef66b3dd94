//! Property tests for output ordering
//!
//! Whatever mix of writes, suspensions and tags is produced, the display buffer
//! and the rendered sink must equal the writes concatenated in call order.

use std::time::Duration;

use playhost::host::{HostConfig, Outcome, ScriptHost};
use playhost::terminal::{ColorTag, MemorySink, TerminalHandle};
use proptest::prelude::*;
use tokio::sync::mpsc;

fn tag(error: bool) -> ColorTag {
    if error { ColorTag::Error } else { ColorTag::Normal }
}

proptest! {
    #[test]
    fn buffer_is_concatenation_of_writes(writes in prop::collection::vec(("[a-z \\n]{0,8}", any::<bool>()), 0..40)) {
        let sink = MemorySink::new();
        let terminal = TerminalHandle::new(sink.clone());
        let mut expected = String::new();
        for (text, error) in &writes {
            terminal.write(text, tag(*error));
            expected.push_str(text);
        }

        prop_assert_eq!(terminal.contents(), expected.clone());
        prop_assert_eq!(sink.rendered(), expected);

        let chunks = terminal.chunks();
        prop_assert!(chunks.iter().all(|chunk| !chunk.text.is_empty()));
        prop_assert!(chunks.windows(2).all(|pair| pair[0].tag != pair[1].tag));
    }

    #[test]
    fn guest_output_survives_suspensions(steps in prop::collection::vec((0u8..100, 0u16..300), 1..12)) {
        let mut script = String::new();
        let mut expected = String::new();
        for (value, delay_ms) in &steps {
            script.push_str(&format!("print({})\nsleep({})\n", value, *delay_ms as f64 / 1000.0));
            expected.push_str(&format!("{}\n", value));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let sink = MemorySink::new();
        let terminal = TerminalHandle::new(sink.clone());
        let outcome = runtime.block_on(async {
            let (_keys, rx) = mpsc::channel(1);
            let config = HostConfig { yield_limit_ms: 0, ..HostConfig::default() };
            let mut host = ScriptHost::new(config, terminal.clone(), rx).unwrap();
            let started = tokio::time::Instant::now();
            let outcome = host.run(&script).await.unwrap();
            let total: u64 = steps.iter().map(|(_, ms)| *ms as u64).sum();
            assert!(started.elapsed() >= Duration::from_millis(total.saturating_sub(steps.len() as u64)));
            outcome
        });

        prop_assert_eq!(outcome, Outcome::Success);
        prop_assert_eq!(terminal.contents(), expected.clone());
        prop_assert_eq!(sink.rendered(), expected);
    }
}
