use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use promise_js::{new_type_error, Agent, AgentOptions, Promise, UnhandledRejectionsMode, Value};

#[derive(Clone, Default)]
struct SharedWriter {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
  fn contents(&self) -> String {
    String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
  }
}

struct SharedWriterGuard<'a> {
  buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl<'a> io::Write for SharedWriterGuard<'a> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buffer.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for SharedWriter {
  type Writer = SharedWriterGuard<'a>;

  fn make_writer(&'a self) -> Self::Writer {
    SharedWriterGuard {
      buffer: &self.buffer,
    }
  }
}

/// Runs one checkpoint with a single unhandled rejection and returns the captured log output.
fn capture(mode: UnhandledRejectionsMode, filter: &str) -> String {
  let writer = SharedWriter::default();
  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::new(filter))
    .with_ansi(false)
    .with_writer(writer.clone())
    .finish();

  tracing::subscriber::with_default(subscriber, || {
    let mut agent = Agent::new(AgentOptions {
      unhandled_rejections: mode,
      ..AgentOptions::default()
    });
    Promise::rejected(&mut agent, new_type_error("nobody listened")).unwrap();
    let report = agent.run_jobs().unwrap();
    assert_eq!(report.unhandled.len(), 1);
  });

  writer.contents()
}

#[test]
fn warn_mode_logs_unhandled_rejections() {
  let output = capture(UnhandledRejectionsMode::Warn, "promise_js=warn");
  assert!(
    output.contains("WARN") && output.contains("unhandled promise rejection"),
    "expected a warning, got: {output}"
  );
  assert!(
    output.contains("TypeError: nobody listened"),
    "expected the formatted reason, got: {output}"
  );
}

#[test]
fn error_mode_logs_at_error_level() {
  let output = capture(UnhandledRejectionsMode::Error, "promise_js=warn");
  assert!(
    output.contains("ERROR") && output.contains("unhandled promise rejection"),
    "expected an error event, got: {output}"
  );
}

#[test]
fn none_mode_stays_silent() {
  let output = capture(UnhandledRejectionsMode::None, "promise_js=warn");
  assert!(
    !output.contains("unhandled promise rejection"),
    "expected no rejection logs, got: {output}"
  );
}

#[test]
fn checkpoint_summary_is_logged_at_debug() {
  let output = capture(UnhandledRejectionsMode::None, "promise_js=debug");
  assert!(
    output.contains("microtask checkpoint finished"),
    "expected the checkpoint summary, got: {output}"
  );
}
