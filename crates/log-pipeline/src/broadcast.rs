//! 이벤트 브로드캐스트 -- 최근 이벤트 보관 및 실시간 구독
//!
//! [`EventBroadcast`]는 두 가지를 함께 제공합니다.
//! - 용량 제한 히스토리: 가득 차면 가장 오래된 이벤트 하나를 버리고 추가
//! - 구독자별 팬아웃: 구독 이후 발행된 이벤트를 모든 구독자가 각자 받음
//!
//! 발행은 절대 블로킹되거나 실패하지 않습니다. 구독자마다 `capacity` 크기의
//! 큐를 가지며, 큐가 가득 차면 그 구독자의 가장 오래된 이벤트를 버립니다.
//!
//! # 사용 예시
//! ```ignore
//! let broadcast = EventBroadcast::new(2000);
//! let mut stream = broadcast.subscribe();
//! broadcast.publish(event);
//! let frame = stream.next_frame().await; // "data: {...}\n\n"
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use fieldtail_core::metrics as m;
use fieldtail_core::types::Event;

/// 최근 이벤트 히스토리 + 구독자 큐
pub struct EventBroadcast {
    shared: Arc<Shared>,
    capacity: usize,
}

struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct State {
    history: VecDeque<Event>,
    dropped: u64,
    subscribers: HashMap<u64, Subscriber>,
    next_id: u64,
    closed: bool,
}

struct Subscriber {
    queue: VecDeque<Event>,
    lagged: u64,
    notify: Arc<Notify>,
}

impl EventBroadcast {
    /// 새 브로드캐스트를 생성합니다. `capacity`는 최소 1로 보정됩니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    history: VecDeque::with_capacity(capacity.min(10_000)),
                    dropped: 0,
                    subscribers: HashMap::new(),
                    next_id: 0,
                    closed: false,
                }),
            }),
            capacity,
        }
    }

    /// 이벤트를 발행합니다.
    ///
    /// 히스토리나 구독자 큐가 가득 차 있으면 가장 오래된 항목 하나를 먼저 버립니다.
    pub fn publish(&self, event: Event) {
        let mut state = self.shared.lock();
        for subscriber in state.subscribers.values_mut() {
            if subscriber.queue.len() >= self.capacity {
                subscriber.queue.pop_front();
                subscriber.lagged += 1;
            }
            subscriber.queue.push_back(event.clone());
            subscriber.notify.notify_one();
        }

        if state.history.len() >= self.capacity {
            state.history.pop_front();
            state.dropped += 1;
            metrics::counter!(m::BROADCAST_DROPPED_TOTAL).increment(1);
            tracing::debug!(
                dropped = state.dropped,
                capacity = self.capacity,
                "broadcast history full, dropped oldest event"
            );
        }
        state.history.push_back(event);
    }

    /// 현재 보관된 이벤트의 복사본 (오래된 순)
    pub fn snapshot(&self) -> Vec<Event> {
        self.shared.lock().history.iter().cloned().collect()
    }

    /// 새 구독을 시작합니다. 이후 발행되는 이벤트만 받습니다.
    pub fn subscribe(&self) -> EventStream {
        let notify = Arc::new(Notify::new());
        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                queue: VecDeque::new(),
                lagged: 0,
                notify: notify.clone(),
            },
        );
        metrics::gauge!(m::BROADCAST_SUBSCRIBERS).set(state.subscribers.len() as f64);
        EventStream {
            shared: self.shared.clone(),
            id,
            notify,
        }
    }

    /// 보관된 이벤트 수
    pub fn len(&self) -> usize {
        self.shared.lock().history.len()
    }

    /// 보관된 이벤트가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 최대 보관 수
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 히스토리에서 버려진 이벤트 수
    pub fn dropped_count(&self) -> u64 {
        self.shared.lock().dropped
    }

    /// 히스토리 사용률 (0.0 ~ 1.0)
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }
}

impl Drop for EventBroadcast {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.closed = true;
        for subscriber in state.subscribers.values() {
            subscriber.notify.notify_one();
        }
    }
}

/// 단일 구독자의 이벤트 스트림
///
/// 스트림을 버리면 구독이 해제됩니다.
pub struct EventStream {
    shared: Arc<Shared>,
    id: u64,
    notify: Arc<Notify>,
}

impl EventStream {
    /// 다음 이벤트를 기다립니다. 브로드캐스트가 사라지고 큐가 비면 `None`.
    ///
    /// 뒤처져서 잃은 이벤트는 건너뛰고 남아 있는 가장 오래된 이벤트를 반환합니다.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            {
                let mut state = self.shared.lock();
                if let Some(subscriber) = state.subscribers.get_mut(&self.id) {
                    if subscriber.lagged > 0 {
                        tracing::warn!(skipped = subscriber.lagged, "subscriber lagged, skipping events");
                        subscriber.lagged = 0;
                    }
                    if let Some(event) = subscriber.queue.pop_front() {
                        return Some(event);
                    }
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// 다음 이벤트를 SSE 프레임(`data: <json>\n\n`)으로 반환합니다.
    pub async fn next_frame(&mut self) -> Option<String> {
        loop {
            let event = self.next_event().await?;
            match sse_frame(&event) {
                Ok(frame) => return Some(frame),
                Err(e) => tracing::warn!(error = %e, "failed to encode event frame"),
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.subscribers.remove(&self.id);
        metrics::gauge!(m::BROADCAST_SUBSCRIBERS).set(state.subscribers.len() as f64);
    }
}

/// 이벤트 하나를 SSE 프레임으로 인코딩합니다.
pub fn sse_frame(event: &Event) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}
