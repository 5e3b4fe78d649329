//! Execution lifecycle following
//!
//! Two ways to observe an execution, behind one pull interface: the
//! server-push event stream when the endpoint is reachable, fixed-interval
//! polling otherwise. The switch happens once, when opening the feed, on a
//! structurally detected [`TransportError::Unavailable`]. A failed poll round
//! propagates; polling has nothing left to fall back to.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::client::{ExecutionEventStream, KestraApi};
use crate::error::{FollowError, TransportError};
use crate::execution::{ExecutionResult, ExecutionState};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Lazy sequence of execution snapshots. Not resumable: to observe again
/// after dropping a feed, open a new one.
pub struct ExecutionFeed<A> {
    execution_id: String,
    kind: FeedKind<A>,
}

enum FeedKind<A> {
    Stream(ExecutionEventStream),
    Poll {
        api: Arc<A>,
        interval: Duration,
        first: bool,
    },
}

impl<A: KestraApi> ExecutionFeed<A> {
    /// Next snapshot. `None` means the event stream closed; a polling feed
    /// never ends on its own.
    pub async fn next(&mut self) -> Result<Option<ExecutionResult>, FollowError> {
        match &mut self.kind {
            FeedKind::Stream(stream) => match stream.next().await {
                Some(Ok(dto)) => Ok(Some(dto.into_result())),
                Some(Err(source)) => Err(FollowError::Transport {
                    execution_id: self.execution_id.clone(),
                    source,
                }),
                None => Ok(None),
            },
            FeedKind::Poll {
                api,
                interval,
                first,
            } => {
                // One synchronous snapshot before the first sleep.
                if *first {
                    *first = false;
                } else {
                    tokio::time::sleep(*interval).await;
                }
                let dto = api.get_execution(&self.execution_id).await.map_err(|source| {
                    FollowError::Transport {
                        execution_id: self.execution_id.clone(),
                        source,
                    }
                })?;
                Ok(Some(dto.into_result()))
            }
        }
    }
}

pub struct ExecutionFollower<A> {
    api: Arc<A>,
    poll_interval: Duration,
}

impl<A: KestraApi> ExecutionFollower<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Point-in-time status fetch.
    pub async fn get_execution(&self, execution_id: &str) -> Result<ExecutionResult, FollowError> {
        let dto = self
            .api
            .get_execution(execution_id)
            .await
            .map_err(|source| FollowError::Transport {
                execution_id: execution_id.to_string(),
                source,
            })?;
        Ok(dto.into_result())
    }

    /// Open a feed of state snapshots, streaming-first with poll fallback.
    pub async fn follow(&self, execution_id: &str) -> Result<ExecutionFeed<A>, FollowError> {
        match self.api.follow_execution(execution_id).await {
            Ok(stream) => {
                debug!(execution_id, "following execution over the event stream");
                Ok(ExecutionFeed {
                    execution_id: execution_id.to_string(),
                    kind: FeedKind::Stream(stream),
                })
            }
            Err(TransportError::Unavailable(reason)) => {
                warn!(execution_id, %reason, "event stream unavailable; falling back to polling");
                Ok(self.poll_feed(execution_id))
            }
            Err(source) => Err(FollowError::Transport {
                execution_id: execution_id.to_string(),
                source,
            }),
        }
    }

    /// Consume the feed until a terminal state, under a hard wall-clock
    /// deadline. A terminal result obtained strictly before the deadline wins
    /// and disarms it; once the deadline fires the in-progress call is
    /// aborted and no further requests are made. On timeout the last observed
    /// state is logged, never returned.
    pub async fn wait_until_terminal(
        &self,
        execution_id: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, FollowError> {
        let mut last_seen: Option<ExecutionState> = None;
        match tokio::time::timeout(
            timeout,
            self.drive_to_terminal(execution_id, &mut last_seen),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                if let Some(state) = last_seen {
                    warn!(
                        execution_id,
                        last_state = %state,
                        "deadline elapsed while execution was still in progress"
                    );
                }
                Err(FollowError::Timeout {
                    execution_id: execution_id.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn drive_to_terminal(
        &self,
        execution_id: &str,
        last_seen: &mut Option<ExecutionState>,
    ) -> Result<ExecutionResult, FollowError> {
        let mut feed = self.follow(execution_id).await?;
        loop {
            match feed.next().await? {
                Some(snapshot) => {
                    if snapshot.is_terminal() {
                        info!(execution_id, state = %snapshot.state, "execution reached terminal state");
                        return Ok(snapshot);
                    }
                    debug!(execution_id, state = %snapshot.state, "execution in progress");
                    *last_seen = Some(snapshot.state.clone());
                }
                None => {
                    // Server closed the stream early; the execution is still
                    // live, so continue on the polling strategy.
                    warn!(
                        execution_id,
                        "event stream ended before a terminal state; switching to polling"
                    );
                    feed = self.poll_feed(execution_id);
                }
            }
        }
    }

    fn poll_feed(&self, execution_id: &str) -> ExecutionFeed<A> {
        ExecutionFeed {
            execution_id: execution_id.to_string(),
            kind: FeedKind::Poll {
                api: Arc::clone(&self.api),
                interval: self.poll_interval,
                first: true,
            },
        }
    }
}
