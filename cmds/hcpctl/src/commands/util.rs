//! Utilities for command handlers.

use std::io::{self, ErrorKind, Write};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A writer that treats a closed pipe as a successful write, so
/// `hcpctl create cluster none --render | head` exits cleanly.
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}

/// Cancel `token` on the first Ctrl-C. Abort the returned handle once the
/// cancellable work is done.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("interrupted, stopping before the next object");
			token.cancel();
		}
	})
}

/// Build the runtime a command's async body runs on.
pub fn runtime() -> io::Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
}
