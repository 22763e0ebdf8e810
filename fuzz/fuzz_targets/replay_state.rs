#![no_main]

use cairn_core::event::decode;
use cairn_core::{derive_stage, graph, replay};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let events: Vec<_> = text.lines().filter_map(|l| decode(l).ok()).collect();
    let state = replay(&events);

    let _ = derive_stage(&state);
    if let Some(next) = graph::next_task(&state) {
        assert!(next.is_pending());
        assert!(next.deps.iter().all(|d| state.is_accepted(d)));
    }
    for task in state.tasks() {
        assert!(!state.is_accepted(&task.id));
    }
});
