/// FNV-1a over 8-byte chunks. Used for shard selection and the `hash`
/// field transform.
#[inline]
pub fn fnv1a_hash(s: &str) -> u64 {
  let mut hash = 0xcbf29ce484222325u64; // FNV offset basis
  let bytes = s.as_bytes();

  let chunks = bytes.chunks_exact(8);
  let remainder = chunks.remainder();

  for chunk in chunks {
    // SAFETY: chunk is guaranteed to be exactly 8 bytes by chunks_exact(8)
    let chunk_u64 = unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const u64) };
    hash ^= chunk_u64;
    hash = hash.wrapping_mul(0x100000001b3); // FNV prime
  }

  for &byte in remainder {
    hash ^= byte as u64;
    hash = hash.wrapping_mul(0x100000001b3);
  }

  hash
}

pub fn current_pid() -> u32 {
  std::process::id()
}

pub fn current_hostname() -> String {
  gethostname::gethostname().to_string_lossy().into_owned()
}
