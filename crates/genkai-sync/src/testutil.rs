//! Shared fixtures for engine tests.

use std::{convert::Infallible, sync::Mutex};

use axum::Router;
use genkai_core::task::{Task, TaskQueue};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
  let addr = listener.local_addr().expect("local addr");
  tokio::spawn(async move {
    axum::serve(listener, router).await.expect("test server");
  });
  format!("http://{addr}")
}

/// A queue that records tasks instead of running them.
#[derive(Default)]
pub struct RecordingQueue {
  tasks: Mutex<Vec<Task>>,
}

impl RecordingQueue {
  pub fn take(&self) -> Vec<Task> { std::mem::take(&mut *self.tasks.lock().unwrap()) }
}

impl TaskQueue for RecordingQueue {
  type Error = Infallible;

  fn enqueue(&self, task: Task) -> Result<(), Infallible> {
    self.tasks.lock().unwrap().push(task);
    Ok(())
  }
}
