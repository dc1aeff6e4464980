//! Runtime start/stop, handshakes, and render coalescing.

use std::cell::RefCell;
use std::rc::Rc;

use loom_tui::{Component, Terminal, TuiRuntime};

#[derive(Default)]
struct TestTerminal {
    output: String,
    columns: u16,
    rows: u16,
}

impl TestTerminal {
    fn new(columns: u16, rows: u16) -> Self {
        Self {
            output: String::new(),
            columns,
            rows,
        }
    }
}

impl Terminal for TestTerminal {
    fn start(
        &mut self,
        _on_input: Box<dyn FnMut(String) + Send>,
        _on_resize: Box<dyn FnMut() + Send>,
    ) -> std::io::Result<()> {
        Ok(())
    }
    fn stop(&mut self) -> std::io::Result<()> {
        Ok(())
    }
    fn drain_input(&mut self, _max_ms: u64, _idle_ms: u64) {}
    fn write(&mut self, data: &str) {
        self.output.push_str(data);
    }
    fn columns(&self) -> u16 {
        self.columns
    }
    fn rows(&self) -> u16 {
        self.rows
    }
}

struct CountingRoot {
    renders: Rc<RefCell<usize>>,
}

impl Component for CountingRoot {
    fn render(&mut self, _width: usize) -> Vec<String> {
        *self.renders.borrow_mut() += 1;
        vec!["frame".to_string()]
    }
}

fn counting_runtime(
    columns: u16,
    rows: u16,
) -> (TuiRuntime<TestTerminal>, Rc<RefCell<usize>>) {
    let renders = Rc::new(RefCell::new(0));
    let root: Rc<RefCell<Box<dyn Component>>> = Rc::new(RefCell::new(Box::new(CountingRoot {
        renders: Rc::clone(&renders),
    })));
    (TuiRuntime::new(TestTerminal::new(columns, rows), root), renders)
}

#[test]
fn start_enables_protocols_and_stop_restores_them() {
    let (mut runtime, _) = counting_runtime(80, 24);
    runtime.start().expect("start");

    let startup = runtime.terminal().output.clone();
    assert!(startup.contains("\x1b[?2004h"), "bracketed paste on");
    assert!(startup.contains("\x1b[?u"), "kitty query");
    assert!(startup.contains("\x1b[?25l"), "cursor hidden");

    runtime.handle_input("\x1b[?1u");
    runtime.flush_pending_output();
    assert!(runtime.kitty_protocol_active());

    runtime.stop().expect("stop");
    let output = runtime.terminal().output.as_str();
    assert!(output.contains("\x1b[?25h"), "cursor restored");
    assert!(output.contains("\x1b[?2004l"), "bracketed paste off");
    assert!(output.contains("\x1b[<u"), "kitty protocol off");
}

#[test]
fn repeated_invalidations_coalesce_into_one_pass() {
    let (mut runtime, renders) = counting_runtime(80, 24);
    runtime.start().expect("start");

    for _ in 0..16 {
        runtime.request_render();
    }
    runtime.run_once();
    assert_eq!(*renders.borrow(), 1);

    runtime.run_once();
    assert_eq!(*renders.borrow(), 1, "no pending request, no render");
}

#[test]
fn render_requests_after_stop_are_skipped() {
    let (mut runtime, renders) = counting_runtime(80, 24);
    runtime.start().expect("start");
    runtime.run_once();
    assert_eq!(*renders.borrow(), 1);

    runtime.stop().expect("stop");
    runtime.request_render();
    runtime.run_once();
    runtime.render_if_needed();
    assert_eq!(*renders.borrow(), 1);
}

#[test]
fn unchanged_second_render_writes_no_new_bytes() {
    let (mut runtime, _) = counting_runtime(80, 24);
    runtime.start().expect("start");
    runtime.render_now();

    runtime.terminal_mut().output.clear();
    runtime.request_render();
    runtime.run_once();
    let second = runtime.terminal().output.as_str();
    assert!(
        !second.contains("frame"),
        "unchanged content must not re-emit: {second:?}"
    );
}

#[test]
fn paste_is_delivered_whole_to_the_focused_component() {
    struct PasteSink {
        pastes: Rc<RefCell<Vec<String>>>,
    }

    impl Component for PasteSink {
        fn render(&mut self, _width: usize) -> Vec<String> {
            Vec::new()
        }

        fn handle_event(&mut self, event: &loom_tui::InputEvent) {
            if let loom_tui::InputEvent::Paste { text, .. } = event {
                self.pastes.borrow_mut().push(text.clone());
            }
        }
    }

    let (mut runtime, _) = counting_runtime(80, 24);
    runtime.start().expect("start");

    let pastes = Rc::new(RefCell::new(Vec::new()));
    let sink: Rc<RefCell<Box<dyn Component>>> = Rc::new(RefCell::new(Box::new(PasteSink {
        pastes: Rc::clone(&pastes),
    })));
    runtime.set_focus(sink);

    runtime.handle_input("\x1b[200~two\nlines\x1b[201~");
    assert_eq!(pastes.borrow().as_slice(), ["two\nlines"]);
}

#[test]
fn resize_forces_a_full_redraw() {
    let (mut runtime, _) = counting_runtime(80, 24);
    runtime.start().expect("start");
    runtime.render_now();

    runtime.terminal_mut().columns = 100;
    runtime.terminal_mut().output.clear();
    runtime.render_now();
    let output = runtime.terminal().output.as_str();
    assert!(
        output.contains("\x1b[3J\x1b[2J\x1b[H"),
        "width change must clear and rewrite: {output:?}"
    );
}
