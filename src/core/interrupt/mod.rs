/*
  Pending interrupts sit in a bounded FIFO of 16-bit messages. While
  the queueing flag is set, triggered interrupts accumulate here
  instead of being delivered; the CPU drains one message per step once
  queueing is disabled again. Pushing past the bound is a hard fault
  on the real design, surfaced by the CPU as INTERRUPT_QUEUE_FULL.
*/

pub const INTERRUPT_QUEUE_SIZE: usize = 256;

pub struct InterruptQueue {
    queue: [u16; INTERRUPT_QUEUE_SIZE],
    head: usize,
    tail: usize,
    len: usize,
    queueing: bool,
}

impl InterruptQueue {
    pub fn new() -> Self {
        InterruptQueue {
            queue: [0; INTERRUPT_QUEUE_SIZE],
            head: 0,
            tail: 0,
            len: 0,
            queueing: false,
        }
    }

    pub fn is_queueing(&self) -> bool {
        self.queueing
    }

    pub fn set_queueing(&mut self, queueing: bool) {
        self.queueing = queueing;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a message. Returns false when the queue is already at
    /// its bound, leaving the queue unchanged.
    pub fn enqueue(&mut self, message: u16) -> bool {
        if self.len == INTERRUPT_QUEUE_SIZE {
            return false;
        }
        self.queue[self.tail] = message;
        self.tail = (self.tail + 1) & (INTERRUPT_QUEUE_SIZE - 1);
        self.len += 1;
        true
    }

    pub fn dequeue(&mut self) -> Option<u16> {
        if self.len == 0 {
            return None;
        }
        let message = self.queue[self.head];
        self.head = (self.head + 1) & (INTERRUPT_QUEUE_SIZE - 1);
        self.len -= 1;
        Some(message)
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
        self.queueing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = InterruptQueue::new();
        assert!(q.enqueue(1));
        assert!(q.enqueue(2));
        assert!(q.enqueue(3));
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn enqueue_past_bound_is_rejected() {
        let mut q = InterruptQueue::new();
        for m in 0..INTERRUPT_QUEUE_SIZE {
            assert!(q.enqueue(m as u16));
        }
        assert!(!q.enqueue(0xDEAD));
        assert_eq!(q.len(), INTERRUPT_QUEUE_SIZE);
        assert_eq!(q.dequeue(), Some(0));
    }

    #[test]
    fn wraps_around_the_ring() {
        let mut q = InterruptQueue::new();
        for round in 0..3 {
            for m in 0..INTERRUPT_QUEUE_SIZE {
                assert!(q.enqueue((round * 1000 + m) as u16));
            }
            for m in 0..INTERRUPT_QUEUE_SIZE {
                assert_eq!(q.dequeue(), Some((round * 1000 + m) as u16));
            }
        }
    }
}
