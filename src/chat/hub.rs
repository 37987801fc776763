use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

/// Buffered messages per consultation before slow subscribers start lagging.
const ROOM_CAPACITY: usize = 64;

/// In-process fan-out of chat messages, one broadcast channel per
/// consultation. Channels are created on first join and dropped once the
/// last subscriber leaves.
#[derive(Clone, Default)]
pub struct ChatHub {
    rooms: Arc<Mutex<HashMap<i32, broadcast::Sender<String>>>>,
}

impl ChatHub {
    pub async fn join(
        &self,
        consultation_id: i32,
    ) -> (broadcast::Sender<String>, broadcast::Receiver<String>) {
        let mut rooms = self.rooms.lock().await;
        let sender = rooms
            .entry(consultation_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0);
        (sender.clone(), sender.subscribe())
    }

    pub async fn leave(&self, consultation_id: i32) {
        let mut rooms = self.rooms.lock().await;
        if let Some(sender) = rooms.get(&consultation_id)
            && sender.receiver_count() == 0
        {
            rooms.remove(&consultation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_in_the_same_room_receive_published_messages() {
        let hub = ChatHub::default();
        let (tx, _keep_alive) = hub.join(1).await;
        let (_, mut rx) = hub.join(1).await;

        tx.send("hello".to_string()).unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn rooms_are_isolated_from_each_other() {
        let hub = ChatHub::default();
        let (tx, _keep_alive) = hub.join(1).await;
        let (_, mut other_room) = hub.join(2).await;

        tx.send("hello".to_string()).unwrap();
        assert!(matches!(
            other_room.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn empty_rooms_are_dropped_on_leave() {
        let hub = ChatHub::default();
        {
            let (_tx, _rx) = hub.join(1).await;
        }
        hub.leave(1).await;
        assert!(hub.rooms.lock().await.is_empty());
    }
}
