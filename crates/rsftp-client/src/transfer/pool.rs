//! Process-wide free list of copy buffers.
//!
//! Every copy loop checks a 512 KiB buffer out and back in, so steady-state
//! transfer allocates nothing per file. The list is unbounded; buffers of
//! the wrong size are dropped on check-in and replaced on checkout.

use std::sync::Mutex;

use rsftp_core::constants::BUFFER_SIZE;

static FREE_LIST: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

/// Take a buffer from the pool, allocating when it is empty.
pub fn checkout() -> Vec<u8> {
    let reused = FREE_LIST.lock().unwrap().pop();
    match reused {
        Some(buf) if buf.len() == BUFFER_SIZE => buf,
        _ => vec![0u8; BUFFER_SIZE],
    }
}

/// Return a buffer for reuse.
pub fn checkin(buf: Vec<u8>) {
    if buf.len() == BUFFER_SIZE {
        FREE_LIST.lock().unwrap().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_has_fixed_size() {
        let buf = checkout();
        assert_eq!(buf.len(), BUFFER_SIZE);
        checkin(buf);
    }

    #[test]
    fn checkin_then_checkout_reuses_storage() {
        let mut buf = checkout();
        buf[0] = 0xAB;
        let ptr = buf.as_ptr();
        checkin(buf);
        // The most recent check-in comes back first.
        let buf = checkout();
        assert_eq!(buf.as_ptr(), ptr);
        checkin(buf);
    }

    #[test]
    fn wrong_size_buffers_are_not_pooled() {
        checkin(vec![0u8; 16]);
        let buf = checkout();
        assert_eq!(buf.len(), BUFFER_SIZE);
        checkin(buf);
    }
}
