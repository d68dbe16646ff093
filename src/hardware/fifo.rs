//! The ADC capture FIFO.
//!
//! Samples stream into an on-fabric FIFO during the acquisition windows;
//! software drains it through a 32-bit data port after the sequence
//! finishes. Each word carries two 16-bit sample lanes. The fill level is
//! read from the status port in batches, not per word, to keep register
//! traffic off the bus while draining.

use super::mmio::Mmio;

/// Fill level register, first word of the FIFO CSR.
const LEVEL: usize = 0x00;

pub struct CaptureFifo<'a> {
    data: Mmio<'a>,
    csr: Mmio<'a>,
}

impl<'a> CaptureFifo<'a> {
    pub fn new(data: Mmio<'a>, csr: Mmio<'a>) -> Self {
        Self { data, csr }
    }

    /// Words currently buffered.
    pub fn level(&self) -> u32 {
        self.csr.read(LEVEL)
    }

    /// Pop one 32-bit word (two packed samples).
    pub fn pop(&self) -> u32 {
        self.data.read(0)
    }

    /// Drain everything buffered into `words` (cleared first). The fill
    /// level is re-sampled only when the current batch is exhausted. Stops
    /// at the pool's capacity — a FIFO that reports more than its depth is
    /// broken hardware, not a reason to grow the pool.
    pub fn drain_into(&self, words: &mut Vec<u32>) -> usize {
        words.clear();
        let mut batch = self.level();
        while batch > 0 {
            if words.len() == words.capacity() {
                log::warn!(
                    "capture FIFO still reports {batch} words at pool \
                     capacity {}; drain stopped",
                    words.capacity()
                );
                break;
            }
            words.push(self.pop());
            batch -= 1;
            if batch == 0 {
                batch = self.level();
            }
        }
        words.len()
    }
}
