//! Per-tick work execution. Every server burns a byte budget on the item
//! at the head of its backlog, completing or expiring items as it goes.

use crate::events::{EventSink, SimEvent};
use crate::metrics::Metrics;
use crate::topology::Topology;
use crate::units::{Bytes, Millis};

/// Fixed scheduling step of the server loop.
pub const TICK: Millis = Millis::new(10);

/// Ticks per second implied by [`TICK`].
pub const TICKS_PER_SEC: u64 = 1000 / TICK.into_u64();

/// Per-server byte budget for one tick.
pub fn budget_per_tick(throughput: Bytes) -> Bytes {
    Bytes::new(throughput.into_u64() / TICKS_PER_SEC)
}

/// Runs one scheduling step over every server.
///
/// Each inner iteration either dispatches, expires, or advances an item, or
/// exhausts the budget, so the loop is bounded. A zero budget makes no
/// progress at all.
pub fn tick(
    topology: &mut Topology,
    throughput: Bytes,
    now: Millis,
    metrics: &mut Metrics,
    events: &mut EventSink,
) {
    let budget = budget_per_tick(throughput);
    if budget == Bytes::ZERO {
        return;
    }
    for server in topology.servers_mut() {
        if server.is_idle() {
            continue;
        }
        let mut spent = Bytes::ZERO;
        while spent < budget {
            let mut item = match server.current.take() {
                Some(item) => item,
                None => match server.queue.pop_front() {
                    Some(item) => {
                        events.emit(SimEvent::ItemDispatched {
                            server: server.id,
                            item: item.id.clone(),
                        });
                        item
                    }
                    None => break,
                },
            };
            if item.is_expired(now) {
                // An expired item is dropped without consuming budget.
                metrics.record_timeout();
                events.emit(SimEvent::ItemTimedOut { item: item.id });
                continue;
            }
            let chunk = (budget - spent).min(item.remaining());
            item.done += chunk;
            spent += chunk;
            if item.is_done() {
                metrics.record_completion();
                events.emit(SimEvent::ItemCompleted { item: item.id });
            } else {
                server.current = Some(item);
            }
        }
        // Items that expired while still queued fall under the same timeout
        // policy as the in-flight one, even if they were never dispatched.
        server.queue.retain(|item| {
            if item.is_expired(now) {
                metrics.record_timeout();
                events.emit(SimEvent::ItemTimedOut {
                    item: item.id.clone(),
                });
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::testing;
    use crate::topology::ServerId;
    use crate::workload::{Request, RequestId, WorkItem};

    use super::*;

    fn enqueue(topology: &mut Topology, target: ServerId, size: u64, timeout: u64) {
        let mut rng = testing::rng();
        let request = Request::new(
            RequestId::generate(&mut rng),
            "probe".to_owned(),
            Millis::ZERO,
            crate::topology::ClientId::ONE,
        );
        let item = WorkItem::from_request(
            &request,
            Bytes::new(size),
            Millis::new(timeout),
            target,
        );
        topology.server_mut(target).unwrap().queue.push_back(item);
    }

    #[test]
    fn a_tick_spends_at_most_the_budget() {
        let mut topology = Topology::new(1, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        enqueue(&mut topology, ServerId::ONE, 1_000_000, 100_000);
        tick(
            &mut topology,
            Bytes::new(1000),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        let current = topology.servers()[0].current.as_ref().unwrap();
        assert_eq!(current.done, Bytes::new(10));
    }

    #[test]
    fn small_items_complete_back_to_back_within_one_tick() {
        let mut topology = Topology::new(1, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        for _ in 0..3 {
            enqueue(&mut topology, ServerId::ONE, 3, 100_000);
        }
        tick(
            &mut topology,
            Bytes::new(1000),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        assert_eq!(metrics.snapshot().completed_total, 3);
        assert!(topology.servers()[0].is_idle());
    }

    #[test]
    fn expired_current_item_consumes_no_budget() {
        let mut topology = Topology::new(1, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        // First item expires at 5ms, the second has plenty of headroom.
        enqueue(&mut topology, ServerId::ONE, 100, 5);
        enqueue(&mut topology, ServerId::ONE, 10, 100_000);
        tick(
            &mut topology,
            Bytes::new(1000),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.timed_out_total, 1);
        // The full budget went to the second item, which finished.
        assert_eq!(snapshot.completed_total, 1);
        assert!(topology.servers()[0].is_idle());
    }

    #[test]
    fn queued_items_past_their_deadline_are_purged() {
        let mut topology = Topology::new(1, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        // The head item soaks up the whole budget, so the expired item
        // behind it is never dispatched and must be purged from the queue.
        enqueue(&mut topology, ServerId::ONE, 1_000_000, 100_000);
        enqueue(&mut topology, ServerId::ONE, 100, 5);
        tick(
            &mut topology,
            Bytes::new(1000),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        let server = &topology.servers()[0];
        assert_eq!(server.backlog(), 0);
        assert!(server.current.is_some());
        assert_eq!(metrics.snapshot().timed_out_total, 1);
    }

    #[test]
    fn no_expired_item_survives_a_tick() {
        let mut topology = Topology::new(2, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        for server in [ServerId::new(1), ServerId::new(2)] {
            enqueue(&mut topology, server, 50, 5);
            enqueue(&mut topology, server, 50, 5);
        }
        tick(
            &mut topology,
            Bytes::new(1000),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        for server in topology.servers() {
            assert!(server.is_idle());
        }
        assert_eq!(metrics.snapshot().timed_out_total, 4);
    }

    #[test]
    fn zero_budget_makes_no_progress_and_terminates() {
        let mut topology = Topology::new(1, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        enqueue(&mut topology, ServerId::ONE, 100, 100_000);
        // 50 bytes per second truncates to a zero per-tick budget.
        tick(
            &mut topology,
            Bytes::new(50),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        let server = &topology.servers()[0];
        assert_eq!(server.backlog(), 1);
        assert!(server.current.is_none());
        assert_eq!(metrics.snapshot().completed_total, 0);
    }

    #[test]
    fn idle_servers_are_skipped() {
        let mut topology = Topology::new(3, 1);
        let mut metrics = Metrics::default();
        let mut events = EventSink::default();
        tick(
            &mut topology,
            Bytes::new(1000),
            Millis::new(10),
            &mut metrics,
            &mut events,
        );
        assert_eq!(metrics.snapshot().completed_total, 0);
        assert_eq!(metrics.snapshot().timed_out_total, 0);
    }
}
