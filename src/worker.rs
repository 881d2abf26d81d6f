use std::{
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
};

use crate::track::{FetchResult, PlaybackSource, TrackFetcher};

pub enum PollCommand {
    Fetch { request_id: u64 },
    Shutdown,
}

pub struct PollResponse {
    pub request_id: u64,
    pub result: FetchResult,
}

/// Background thread that runs playback queries off the UI thread.
pub struct PollWorker {
    request_tx: Option<Sender<PollCommand>>,
    response_rx: Receiver<PollResponse>,
}

impl PollWorker {
    pub fn spawn<S>(fetcher: TrackFetcher<S>) -> Self
    where
        S: PlaybackSource + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();

        thread::spawn(move || run(fetcher, request_rx, response_tx));

        Self {
            request_tx: Some(request_tx),
            response_rx,
        }
    }

    /// Queues a fetch. Returns false once the worker is gone.
    pub fn request(&mut self, request_id: u64) -> bool {
        let Some(tx) = self.request_tx.as_ref() else {
            return false;
        };
        if tx.send(PollCommand::Fetch { request_id }).is_ok() {
            true
        } else {
            self.request_tx = None;
            false
        }
    }

    pub fn try_recv(&self) -> Result<PollResponse, TryRecvError> {
        self.response_rx.try_recv()
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        if let Some(tx) = self.request_tx.take() {
            let _ = tx.send(PollCommand::Shutdown);
        }
    }
}

fn run<S: PlaybackSource>(
    fetcher: TrackFetcher<S>,
    request_rx: Receiver<PollCommand>,
    response_tx: Sender<PollResponse>,
) {
    while let Ok(command) = request_rx.recv() {
        let mut request_id = match command {
            PollCommand::Fetch { request_id } => request_id,
            PollCommand::Shutdown => break,
        };

        // Collapse a backlog left by a slow call into its newest request.
        let mut shutdown = false;
        while let Ok(queued) = request_rx.try_recv() {
            match queued {
                PollCommand::Fetch { request_id: newer } => request_id = newer,
                PollCommand::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
        }
        if shutdown {
            break;
        }

        let response = PollResponse {
            request_id,
            result: fetcher.fetch(),
        };
        if response_tx.send(response).is_err() {
            break;
        }
    }

    log::debug!("poll worker stopped");
}

#[cfg(test)]
impl PollWorker {
    fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<PollResponse, mpsc::RecvTimeoutError> {
        self.response_rx.recv_timeout(timeout)
    }
}
