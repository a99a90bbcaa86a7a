//! Fixed-capacity byte ring buffer
//!
//! A read cursor and a length over a backing array. The parser needs to look
//! at the front of the queue as one slice, so [`RingBuffer::peek`] rotates the
//! contents to the start of the array when they wrap. That happens at most
//! once per `N` bytes pushed.

/// Byte FIFO with a fixed capacity of `N`
pub struct RingBuffer<const N: usize> {
    buffer: [u8; N],
    read_pos: usize,
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            read_pos: 0,
            len: 0,
        }
    }

    /// Total capacity in bytes
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes available to read
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is buffered
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes that can still be pushed
    #[must_use]
    pub const fn free(&self) -> usize {
        N - self.len
    }

    /// Append all of `data`, or nothing if it does not fit
    ///
    /// Returns false (leaving the buffer unchanged) on overflow.
    pub fn push(&mut self, data: &[u8]) -> bool {
        if data.len() > self.free() {
            return false;
        }

        let write_pos = (self.read_pos + self.len) % N;
        let first = data.len().min(N - write_pos);
        self.buffer[write_pos..write_pos + first].copy_from_slice(&data[..first]);
        self.buffer[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();
        true
    }

    /// Every buffered byte, oldest first, as one contiguous slice
    pub fn peek(&mut self) -> &[u8] {
        if self.read_pos + self.len > N {
            self.buffer.rotate_left(self.read_pos);
            self.read_pos = 0;
        }
        &self.buffer[self.read_pos..self.read_pos + self.len]
    }

    /// Discard the oldest `n` bytes (clamped to what is buffered)
    pub fn pop(&mut self, n: usize) {
        let n = n.min(self.len);
        self.len -= n;
        self.read_pos = if self.len == 0 { 0 } else { (self.read_pos + n) % N };
    }

    /// Move the oldest `n` bytes into `dst`
    ///
    /// Returns false (moving nothing) if fewer than `n` are buffered or they
    /// do not fit in `dst`.
    pub fn transfer_to<const M: usize>(&mut self, dst: &mut RingBuffer<M>, n: usize) -> bool {
        if n > self.len || n > dst.free() {
            return false;
        }
        let data = &self.peek()[..n];
        let pushed = dst.push(data);
        self.pop(n);
        pushed
    }

    /// Drop everything
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
