//! Per-conversation FIFO serialization
//!
//! Each conversation id gets a lane: a fair async mutex plus a count of the
//! exchanges waiting on or holding it. Exchanges on different conversations
//! never contend. Lanes are dropped once nothing references them.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::ChatError;
use crate::storage::ConversationId;

#[derive(Debug, Error)]
#[error("queue for conversation {0} is full")]
pub struct QueueFull(pub ConversationId);

impl From<QueueFull> for ChatError {
    fn from(err: QueueFull) -> Self {
        ChatError::QueueFull {
            conversation_id: err.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Exchanges waiting for their turn
    pub pending: usize,
    /// Whether an exchange currently holds the lane
    pub processing: bool,
}

struct Lane {
    turn: Arc<AsyncMutex<()>>,
    /// Waiting plus running
    occupants: usize,
    /// Tickets holding the turn. Briefly 2 while one hands over to the next.
    running: usize,
}

type Lanes = Arc<Mutex<HashMap<ConversationId, Lane>>>;

fn lock_lanes(lanes: &Mutex<HashMap<ConversationId, Lane>>) -> MutexGuard<'_, HashMap<ConversationId, Lane>> {
    // Lane bookkeeping stays consistent even if a holder panicked
    lanes.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct ConversationQueue {
    lanes: Lanes,
    max_depth: usize,
}

impl ConversationQueue {
    /// `max_depth` bounds waiting plus running exchanges per conversation
    pub fn new(max_depth: usize) -> Self {
        Self {
            lanes: Arc::new(Mutex::new(HashMap::new())),
            max_depth: max_depth.max(1),
        }
    }

    /// Wait for this conversation's turn. Dropping the returned future
    /// before it resolves gives the slot back.
    pub async fn acquire(&self, id: &ConversationId) -> Result<QueueTicket, QueueFull> {
        let (turn, reservation) = {
            let mut lanes = lock_lanes(&self.lanes);
            let lane = lane_entry(&mut lanes, id);
            if lane.occupants >= self.max_depth {
                return Err(QueueFull(id.clone()));
            }
            reserve(&self.lanes, lane, id)
        };
        Ok(take_turn(turn, reservation).await)
    }

    /// Like `acquire`, but never refused for depth. For operations that must
    /// run after everything already queued, such as deleting the conversation.
    pub async fn acquire_unbounded(&self, id: &ConversationId) -> QueueTicket {
        let (turn, reservation) = {
            let mut lanes = lock_lanes(&self.lanes);
            let lane = lane_entry(&mut lanes, id);
            reserve(&self.lanes, lane, id)
        };
        take_turn(turn, reservation).await
    }

    pub fn status(&self, id: &ConversationId) -> QueueStatus {
        let lanes = lock_lanes(&self.lanes);
        match lanes.get(id) {
            Some(lane) => QueueStatus {
                pending: lane.occupants.saturating_sub(lane.running),
                processing: lane.running > 0,
            },
            None => QueueStatus::default(),
        }
    }

    /// Number of conversations with a live lane
    pub fn active_lanes(&self) -> usize {
        lock_lanes(&self.lanes).len()
    }
}

fn lane_entry<'a>(lanes: &'a mut HashMap<ConversationId, Lane>, id: &ConversationId) -> &'a mut Lane {
    lanes.entry(id.clone()).or_insert_with(|| Lane {
        turn: Arc::new(AsyncMutex::new(())),
        occupants: 0,
        running: 0,
    })
}

fn reserve(lanes: &Lanes, lane: &mut Lane, id: &ConversationId) -> (Arc<AsyncMutex<()>>, Reservation) {
    lane.occupants += 1;
    (
        lane.turn.clone(),
        Reservation {
            lanes: lanes.clone(),
            id: id.clone(),
            processing: false,
        },
    )
}

async fn take_turn(turn: Arc<AsyncMutex<()>>, mut reservation: Reservation) -> QueueTicket {
    let guard = turn.lock_owned().await;
    reservation.start_processing();
    QueueTicket {
        _guard: guard,
        _reservation: reservation,
    }
}

/// Holds a conversation's turn until dropped.
pub struct QueueTicket {
    // Release the turn before giving the slot back, so the lane is never
    // removed while its mutex is still held.
    _guard: OwnedMutexGuard<()>,
    _reservation: Reservation,
}

struct Reservation {
    lanes: Lanes,
    id: ConversationId,
    processing: bool,
}

impl Reservation {
    fn start_processing(&mut self) {
        self.processing = true;
        if let Some(lane) = lock_lanes(&self.lanes).get_mut(&self.id) {
            lane.running += 1;
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut lanes = lock_lanes(&self.lanes);
        let Some(lane) = lanes.get_mut(&self.id) else {
            return;
        };
        lane.occupants = lane.occupants.saturating_sub(1);
        if self.processing {
            lane.running = lane.running.saturating_sub(1);
        }
        if lane.occupants == 0 {
            lanes.remove(&self.id);
        }
    }
}
