// Pull-style adapter over push-style stream decoders.
//
// liblzma, libbzip2 and libzstd all expose the same shape of API: give the
// decoder an input slice and an output slice, and it reports how much of
// each it used and whether the stream has ended. `StreamDecompressor` turns
// that into the `Decompress` contract by buffering fed input and tracking
// whether the backend may still hold output.

use super::{CodecError, Decompress};

/// Upper bound on the output slice handed to the backend per call.
const SCRATCH_SIZE: usize = 64 * 1024;

/// Progress made by one backend call.
pub(crate) struct Step {
    pub consumed: usize,
    pub produced: usize,
    pub finished: bool,
}

pub(crate) trait RawDecoder {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, CodecError>;
}

pub(crate) struct StreamDecompressor<D> {
    raw: D,
    input: Vec<u8>,
    pos: usize,
    finished: bool,
    // The last call filled its output buffer, so the backend may hold more.
    output_pending: bool,
}

impl<D: RawDecoder> StreamDecompressor<D> {
    pub fn new(raw: D) -> Self {
        Self {
            raw,
            input: Vec::new(),
            pos: 0,
            finished: false,
            output_pending: false,
        }
    }
}

impl<D: RawDecoder> Decompress for StreamDecompressor<D> {
    fn needs_input(&self) -> bool {
        !self.finished && !self.output_pending && self.pos == self.input.len()
    }

    fn is_exhausted(&self) -> bool {
        self.finished
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.input.drain(..self.pos);
        self.pos = 0;
        self.input.extend_from_slice(chunk);
    }

    fn decompress(&mut self, max_len: usize) -> Result<Vec<u8>, CodecError> {
        // `max_len` comes from an untrusted size field; grow as output arrives.
        let mut scratch = vec![0u8; max_len.min(SCRATCH_SIZE)];
        let mut out = Vec::new();
        self.output_pending = false;

        while out.len() < max_len && !self.finished {
            let room = (max_len - out.len()).min(scratch.len());
            let step = self
                .raw
                .step(&self.input[self.pos..], &mut scratch[..room])?;
            self.pos += step.consumed;
            out.extend_from_slice(&scratch[..step.produced]);
            self.finished = step.finished;
            if step.consumed == 0 && step.produced == 0 {
                break;
            }
        }

        if out.len() == max_len && !self.finished {
            self.output_pending = true;
        }
        Ok(out)
    }
}
