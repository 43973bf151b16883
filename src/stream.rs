use std::io::{self, Read, Write};

use crate::RtpSocket;

/// Splits an outgoing byte buffer into payload-sized chunks, order
/// preserved.
pub(crate) fn chunk_payload(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return Vec::new();
    }
    data.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect()
}

/// `std::io::{Read, Write}` over an [`RtpSocket`]'s byte-stream facade.
/// Reads block on the same condition `receive()` blocks on; writes just
/// enqueue and never block. A short leftover buffer absorbs the gap
/// between `receive()`'s "drain everything available" semantics and
/// `Read::read`'s "fill at most `buf.len()`" contract.
impl Read for RtpSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            {
                let mut leftover = self.read_leftover.lock().unwrap();
                if !leftover.is_empty() {
                    let n = buf.len().min(leftover.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = leftover.pop_front().unwrap();
                    }
                    return Ok(n);
                }
            }

            match self.receive() {
                Some(data) if data.is_empty() => continue,
                Some(data) => {
                    self.read_leftover.lock().unwrap().extend(data);
                }
                None => return Ok(0),
            }
        }
    }
}

impl Write for RtpSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
