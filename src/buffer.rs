//! Capacity negotiation for OS queries that report their required buffer size
//!
//! The caller supplies the OS call and an error classifier. The call receives
//! the current buffer and writes the size it needs; whenever the classifier
//! says the failure means "buffer too small", the buffer grows to the reported
//! size and the call is retried. Reported sizes must strictly increase and the
//! number of growths is capped.

use crate::consts::ERROR_INSUFFICIENT_BUFFER;
use crate::error::OsError;

/// Upper bound on buffer growths for a single query
pub const MAX_GROWTH_ATTEMPTS: usize = 16;

/// Byte buffer with pointer alignment, suitable for OS records that embed
/// pointers into their own storage.
#[derive(Debug, Default)]
pub struct QueryBuffer {
    words: Vec<u64>,
    len: usize,
}

impl QueryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usable size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grow to at least `bytes`, zero-filled.
    pub fn resize(&mut self, bytes: usize) {
        let words = bytes.div_ceil(std::mem::size_of::<u64>());
        self.words.resize(words, 0);
        self.len = bytes;
    }

    /// Pointer to pass to the OS; null while the buffer is empty.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        if self.len == 0 {
            std::ptr::null_mut()
        } else {
            self.words.as_mut_ptr() as *mut u8
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `len` initialized bytes
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }
}

/// Run `call` until it succeeds, growing `buffer` whenever `needs_growth`
/// classifies the failure as "buffer too small".
///
/// `call` gets the buffer and an out-parameter for the required size, and
/// returns `Err(code)` on failure. Any other failure code is fatal and is
/// turned into an [`OsError`] by `to_error`.
pub fn query_with_capacity<T, C, G, E>(
    buffer: &mut QueryBuffer,
    mut call: C,
    needs_growth: G,
    to_error: E,
) -> Result<T, OsError>
where
    C: FnMut(&mut QueryBuffer, &mut u32) -> Result<T, u32>,
    G: Fn(u32) -> bool,
    E: Fn(u32) -> OsError,
{
    let mut growths = 0;
    loop {
        let mut required = 0u32;
        match call(buffer, &mut required) {
            Ok(value) => return Ok(value),
            Err(code) if needs_growth(code) => {
                let required = required as usize;
                if required <= buffer.len() {
                    return Err(OsError::new(
                        ERROR_INSUFFICIENT_BUFFER,
                        format!(
                            "required buffer size did not grow ({} <= {} bytes)",
                            required,
                            buffer.len()
                        ),
                    ));
                }
                growths += 1;
                if growths > MAX_GROWTH_ATTEMPTS {
                    return Err(OsError::new(
                        ERROR_INSUFFICIENT_BUFFER,
                        format!("buffer still too small after {} growths", MAX_GROWTH_ATTEMPTS),
                    ));
                }
                buffer.resize(required);
            }
            Err(code) => return Err(to_error(code)),
        }
    }
}
