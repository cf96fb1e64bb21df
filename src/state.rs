use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::watch;

/// Latest attention values, replaced as one unit on every processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionSnapshot {
    pub ear: f64,
    pub speed: f64,
    pub score: f64,
    pub blink_count: u64,
    pub captured_at: Option<DateTime<Local>>,
    /// Number of frames folded in so far; 0 means nothing has been published yet.
    pub sequence: u64,
}

impl Default for AttentionSnapshot {
    fn default() -> Self {
        Self {
            ear: 0.0,
            speed: 0.0,
            score: 0.5,
            blink_count: 0,
            captured_at: None,
            sequence: 0,
        }
    }
}

/// Write half of the attention state. Not `Clone`: the sampling loop owns the only one.
#[derive(Debug)]
pub struct AttentionPublisher {
    tx: watch::Sender<AttentionSnapshot>,
}

/// Read half of the attention state; cheap to clone for any number of observers.
#[derive(Debug, Clone)]
pub struct AttentionReader {
    rx: watch::Receiver<AttentionSnapshot>,
}

pub fn attention_channel() -> (AttentionPublisher, AttentionReader) {
    let (tx, rx) = watch::channel(AttentionSnapshot::default());
    (AttentionPublisher { tx }, AttentionReader { rx })
}

impl AttentionPublisher {
    /// Replaces the whole snapshot; readers never observe a mix of old and new fields.
    pub fn publish(&self, snapshot: AttentionSnapshot) {
        // send_replace 在没有接收端时也会更新值
        self.tx.send_replace(snapshot);
    }

    pub fn reader(&self) -> AttentionReader {
        AttentionReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> AttentionSnapshot {
        *self.tx.borrow()
    }
}

impl AttentionReader {
    pub fn latest(&self) -> AttentionSnapshot {
        *self.rx.borrow()
    }

    /// Waits for the next publish. Returns `false` once the publisher is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_neutral_defaults() {
        let (_tx, rx) = attention_channel();
        let snap = rx.latest();
        assert_eq!(snap.ear, 0.0);
        assert_eq!(snap.score, 0.5);
        assert_eq!(snap.sequence, 0);
    }

    #[test]
    fn publish_replaces_whole_snapshot() {
        let (tx, rx) = attention_channel();
        let other = tx.reader();
        tx.publish(AttentionSnapshot {
            ear: 0.3,
            speed: 12.0,
            score: 0.8,
            blink_count: 4,
            captured_at: Some(Local::now()),
            sequence: 9,
        });
        assert_eq!(rx.latest(), other.latest());
        assert_eq!(rx.latest().blink_count, 4);
        assert_eq!(tx.current().sequence, 9);
    }

    #[tokio::test]
    async fn changed_reports_publisher_drop() {
        let (tx, mut rx) = attention_channel();
        tx.publish(AttentionSnapshot {
            sequence: 1,
            ..AttentionSnapshot::default()
        });
        assert!(rx.changed().await);
        drop(tx);
        assert!(!rx.changed().await);
    }

    #[tokio::test]
    async fn concurrent_reader_never_sees_torn_snapshot() {
        let (tx, rx) = attention_channel();
        let writer = std::thread::spawn(move || {
            for i in 1..=2_000_u64 {
                let v = i as f64;
                // 所有字段由同一个 i 推导，读到的快照必须一致
                tx.publish(AttentionSnapshot {
                    ear: v,
                    speed: v * 2.0,
                    score: 0.5,
                    blink_count: i,
                    captured_at: None,
                    sequence: i,
                });
            }
        });

        let mut last_seq = 0;
        while last_seq < 2_000 {
            let snap = rx.latest();
            assert_eq!(snap.ear, snap.sequence as f64);
            assert_eq!(snap.speed, snap.sequence as f64 * 2.0);
            assert_eq!(snap.blink_count, snap.sequence);
            assert!(snap.sequence >= last_seq);
            last_seq = snap.sequence;
            tokio::task::yield_now().await;
        }
        writer.join().expect("writer thread");
    }
}
