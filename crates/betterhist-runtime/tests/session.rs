use std::time::Duration;

use betterhist_engine::{Segmenter, SegmenterConfig};
use betterhist_index::Database;
use betterhist_runtime::{
    Error, ProxyConfig, Recorder, Session, SessionIo, SessionOutcome, TerminalSize,
};
use betterhist_testing::fakes::{
    FailingReader, FailingWriter, FakeResizer, FakeShell, FakeTerminal, KILLED_EXIT_CODE,
    ScriptedInput, SharedOutput,
};
use tempfile::TempDir;

const SIZE: TerminalSize = TerminalSize {
    columns: 100,
    lines: 30,
};

fn config() -> ProxyConfig {
    ProxyConfig {
        tap_capacity: 64,
        drain_grace_ms: 200,
        poll_interval_ms: 10,
    }
}

fn io(pty_output: ScriptedInput, terminal_out: SharedOutput, pty_in: SharedOutput) -> SessionIo {
    SessionIo {
        input: Box::new(ScriptedInput::empty()),
        output: Box::new(terminal_out),
        pty_reader: Box::new(pty_output),
        pty_writer: Box::new(pty_in),
    }
}

#[test]
fn test_normal_exit_passes_output_through_and_restores_terminal() {
    let terminal = FakeTerminal::new(SIZE);
    let term = terminal.handle();
    let screen = SharedOutput::new();
    let resizer = FakeResizer::default();

    let session = Session::new(
        io(
            ScriptedInput::new(["$ ", "echo hi\r\nhi\r\n", "$ "]),
            screen.clone(),
            SharedOutput::new(),
        ),
        Box::new(FakeShell::exiting_after(Duration::from_millis(100), 3)),
        Box::new(resizer.clone()),
        Box::new(terminal),
        config(),
    );

    let outcome = session.run().unwrap();

    assert!(matches!(outcome, SessionOutcome::Exited(3)));
    assert_eq!(screen.text(), "$ echo hi\r\nhi\r\n$ ");
    assert_eq!(term.raw_entered(), 1);
    assert!(!term.is_raw());
    assert_eq!(resizer.sizes(), vec![SIZE]);
}

#[test]
fn test_keystrokes_reach_the_pty() {
    let pty_in = SharedOutput::new();
    let session = Session::new(
        SessionIo {
            input: Box::new(ScriptedInput::new(["l", "s", "\r"])),
            output: Box::new(SharedOutput::new()),
            pty_reader: Box::new(ScriptedInput::empty()),
            pty_writer: Box::new(pty_in.clone()),
        },
        Box::new(FakeShell::exiting_after(Duration::from_millis(100), 0)),
        Box::new(FakeResizer::default()),
        Box::new(FakeTerminal::new(SIZE)),
        config(),
    );

    session.run().unwrap();

    assert_eq!(pty_in.contents(), b"ls\r");
}

#[test]
fn test_interrupt_kills_shell_and_restores_terminal() {
    let terminal = FakeTerminal::new(SIZE);
    let term = terminal.handle();
    let shell = FakeShell::running();
    let shell_handle = shell.handle();

    let session = Session::new(
        io(ScriptedInput::empty(), SharedOutput::new(), SharedOutput::new()),
        Box::new(shell),
        Box::new(FakeResizer::default()),
        Box::new(terminal),
        config(),
    );

    let control = session.control();
    let interrupter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        control.interrupt();
    });

    let outcome = session.run().unwrap();
    interrupter.join().unwrap();

    assert!(matches!(outcome, SessionOutcome::Interrupted));
    assert!(shell_handle.was_killed());
    assert_eq!(term.restored(), 1);
    assert!(!term.is_raw());
}

#[test]
fn test_fatal_pty_read_error_restores_terminal() {
    let terminal = FakeTerminal::new(SIZE);
    let term = terminal.handle();
    let shell = FakeShell::running();
    let shell_handle = shell.handle();

    let session = Session::new(
        SessionIo {
            input: Box::new(ScriptedInput::empty()),
            output: Box::new(SharedOutput::new()),
            pty_reader: Box::new(FailingReader),
            pty_writer: Box::new(SharedOutput::new()),
        },
        Box::new(shell),
        Box::new(FakeResizer::default()),
        Box::new(terminal),
        config(),
    );

    let outcome = session.run().unwrap();

    match outcome {
        SessionOutcome::Failed(e) => assert!(e.to_string().contains("pty read failed")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(shell_handle.was_killed());
    assert!(!term.is_raw());
}

#[test]
fn test_terminal_write_failure_is_fatal() {
    let terminal = FakeTerminal::new(SIZE);
    let term = terminal.handle();

    let session = Session::new(
        SessionIo {
            input: Box::new(ScriptedInput::empty()),
            output: Box::new(FailingWriter),
            pty_reader: Box::new(ScriptedInput::new(["$ "])),
            pty_writer: Box::new(SharedOutput::new()),
        },
        Box::new(FakeShell::running()),
        Box::new(FakeResizer::default()),
        Box::new(terminal),
        config(),
    );

    let outcome = session.run().unwrap();

    assert!(matches!(outcome, SessionOutcome::Failed(_)));
    assert!(!term.is_raw());
}

#[test]
fn test_raw_mode_failure_kills_shell() {
    let shell = FakeShell::running();
    let shell_handle = shell.handle();

    let session = Session::new(
        io(ScriptedInput::empty(), SharedOutput::new(), SharedOutput::new()),
        Box::new(shell),
        Box::new(FakeResizer::default()),
        Box::new(FakeTerminal::not_a_tty()),
        config(),
    );

    assert!(matches!(session.run(), Err(Error::TerminalMode(_))));
    assert!(shell_handle.was_killed());
}

#[test]
fn test_resize_follows_terminal() {
    let terminal = FakeTerminal::new(SIZE);
    let term = terminal.handle();
    let resizer = FakeResizer::default();

    let session = Session::new(
        io(ScriptedInput::empty(), SharedOutput::new(), SharedOutput::new()),
        Box::new(FakeShell::exiting_after(Duration::from_millis(150), 0)),
        Box::new(resizer.clone()),
        Box::new(terminal),
        config(),
    );

    let bigger = TerminalSize {
        columns: 200,
        lines: 50,
    };
    let control = session.control();
    let resizing = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        term.set_size(bigger);
        control.resize();
    });

    session.run().unwrap();
    resizing.join().unwrap();

    assert_eq!(resizer.sizes(), vec![SIZE, bigger]);
}

#[test]
fn test_recorded_session_lands_in_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.db");
    let recorder = Recorder::new(
        Segmenter::new(SegmenterConfig::default()),
        Database::open(&path).unwrap(),
        Duration::from_millis(20),
    );

    let session = Session::new(
        io(
            ScriptedInput::new(["$ ", "echo hi\r\nhi\r\n", "$ "]),
            SharedOutput::new(),
            SharedOutput::new(),
        ),
        Box::new(FakeShell::exiting_after(Duration::from_millis(100), 0)),
        Box::new(FakeResizer::default()),
        Box::new(FakeTerminal::new(SIZE)),
        config(),
    )
    .with_recorder(recorder);

    session.run().unwrap();

    let db = Database::open_read_only(&path).unwrap();
    assert_eq!(db.count().unwrap(), 1);
    let record = db.latest().unwrap().unwrap();
    assert_eq!(record.command, "echo hi");
    assert_eq!(record.output, "hi");
    assert_eq!(record.columns, Some(SIZE.columns));
}

#[test]
fn test_small_tap_never_holds_back_output() {
    let chunks: Vec<String> = (0..500).map(|i| format!("line {}\r\n", i)).collect();
    let expected: String = chunks.concat();
    let screen = SharedOutput::new();

    let recorder = Recorder::new(
        Segmenter::new(SegmenterConfig::default()),
        Database::open_in_memory().unwrap(),
        Duration::from_millis(20),
    );

    let session = Session::new(
        io(ScriptedInput::new(chunks), screen.clone(), SharedOutput::new()),
        Box::new(FakeShell::exiting_after(Duration::from_millis(100), 0)),
        Box::new(FakeResizer::default()),
        Box::new(FakeTerminal::new(SIZE)),
        ProxyConfig {
            tap_capacity: 1,
            ..config()
        },
    )
    .with_recorder(recorder);

    let outcome = session.run().unwrap();

    assert!(matches!(outcome, SessionOutcome::Exited(0)));
    assert_eq!(screen.text(), expected);
}

#[test]
fn test_killed_shell_reports_kill_code_through_wait() {
    use betterhist_runtime::ShellProcess;

    let mut shell = FakeShell::running();
    assert_eq!(shell.try_wait().unwrap(), None);
    shell.kill().unwrap();
    assert_eq!(shell.wait().unwrap(), KILLED_EXIT_CODE);
}
