use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

// Platform-specific memory locking functions
#[cfg(all(unix, feature = "secure-memory"))]
use libc::{mlock, munlock};

#[cfg(all(target_os = "windows", feature = "secure-memory"))]
use windows_sys::Win32::System::Memory::{VirtualLock, VirtualUnlock};

// Set once the first lock attempt fails so the warning is logged a single time
static LOCK_FAILURE_REPORTED: AtomicBool = AtomicBool::new(false);

fn report_lock_failure() {
    if !LOCK_FAILURE_REPORTED.swap(true, Ordering::SeqCst) {
        tracing::warn!("could not lock secret memory, it may be swapped to disk");
    }
}

/// Lock memory to prevent it from being swapped to disk
#[cfg(all(unix, feature = "secure-memory"))]
#[allow(unsafe_code)]
fn lock_memory(ptr: *const u8, size: usize) -> bool {
    if size == 0 {
        return false;
    }
    // SAFETY: the range belongs to a live allocation owned by the caller
    let locked = unsafe { mlock(ptr as *const _, size) } == 0;

    exclude_from_core_dump(ptr, size);

    if !locked {
        report_lock_failure();
    }
    locked
}

/// Core dumps must never contain secrets either
#[cfg(all(target_os = "linux", feature = "secure-memory"))]
#[allow(unsafe_code)]
fn exclude_from_core_dump(ptr: *const u8, size: usize) {
    let page = ptr as usize & !(4096 - 1);
    let span = size + (ptr as usize - page);
    // SAFETY: advisory call over pages that contain an owned allocation
    unsafe {
        libc::madvise(page as *mut _, span, libc::MADV_DONTDUMP);
    }
}

#[cfg(all(unix, not(target_os = "linux"), feature = "secure-memory"))]
fn exclude_from_core_dump(_ptr: *const u8, _size: usize) {}

/// Lock memory to prevent it from being swapped to disk
#[cfg(all(target_os = "windows", feature = "secure-memory"))]
#[allow(unsafe_code)]
fn lock_memory(ptr: *const u8, size: usize) -> bool {
    if size == 0 {
        return false;
    }
    // SAFETY: the range belongs to a live allocation owned by the caller
    let locked = unsafe { VirtualLock(ptr as *const _, size) } != 0;
    if !locked {
        report_lock_failure();
    }
    locked
}

/// Lock memory - no-op where locking is unsupported or disabled
#[cfg(not(all(any(unix, target_os = "windows"), feature = "secure-memory")))]
fn lock_memory(_ptr: *const u8, _size: usize) -> bool {
    false
}

/// Unlock previously locked memory
#[cfg(all(unix, feature = "secure-memory"))]
#[allow(unsafe_code)]
fn unlock_memory(ptr: *const u8, size: usize) {
    // SAFETY: the range was locked by `lock_memory` and is still allocated
    unsafe {
        munlock(ptr as *const _, size);
    }
}

/// Unlock previously locked memory
#[cfg(all(target_os = "windows", feature = "secure-memory"))]
#[allow(unsafe_code)]
fn unlock_memory(ptr: *const u8, size: usize) {
    // SAFETY: the range was locked by `lock_memory` and is still allocated
    unsafe {
        VirtualUnlock(ptr as *const _, size);
    }
}

#[cfg(not(all(any(unix, target_os = "windows"), feature = "secure-memory")))]
fn unlock_memory(_ptr: *const u8, _size: usize) {}

/// A fixed-length heap buffer for secret bytes.
///
/// The buffer is locked into RAM where the platform allows it, is never
/// reallocated, and is overwritten with zeros before it is released. Debug
/// and Display output never show the contents.
pub struct SecureBytes {
    bytes: Vec<u8>,
    // Length of the pinned range, zero when not pinned
    locked_len: usize,
}

impl SecureBytes {
    /// Take ownership of `bytes` and protect them
    pub fn new(mut bytes: Vec<u8>) -> Self {
        // Capacity must equal length so the locked range covers the whole allocation
        bytes.shrink_to_fit();
        let locked_len = if lock_memory(bytes.as_ptr(), bytes.len()) {
            bytes.len()
        } else {
            0
        };
        Self { bytes, locked_len }
    }

    /// Copy a slice into a new protected buffer
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    /// A zero-filled protected buffer of `len` bytes
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    /// Get a reference to the protected bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Get a mutable reference to the protected bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the platform honoured the request to pin the buffer in RAM
    pub fn is_locked(&self) -> bool {
        self.locked_len > 0
    }
}

impl Clone for SecureBytes {
    fn clone(&self) -> Self {
        Self::from_slice(&self.bytes)
    }
}

impl Drop for SecureBytes {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked_len > 0 {
            unlock_memory(self.bytes.as_ptr(), self.locked_len);
        }
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for SecureBytes {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for SecureBytes {}

// Prevent accidentally printing sensitive data
impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes(length={})", self.bytes.len())
    }
}

// Prevent accidentally displaying sensitive data
impl fmt::Display for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SENSITIVE DATA REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_bytes_basic() {
        let secure_bytes = SecureBytes::new(vec![1, 2, 3, 4, 5]);

        assert_eq!(secure_bytes.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(secure_bytes.len(), 5);

        // Verify the debug output doesn't expose the data
        let debug_str = format!("{:?}", secure_bytes);
        assert!(!debug_str.contains("1, 2, 3"));
        assert!(debug_str.contains("SecureBytes"));
    }

    #[test]
    fn test_secure_bytes_mutation() {
        let mut secure_bytes = SecureBytes::zeroed(3);
        secure_bytes.as_mut_slice()[0] = 5;
        assert_eq!(secure_bytes.as_slice(), &[5, 0, 0]);
    }

    #[test]
    fn test_secure_bytes_display_redacted() {
        let secure_bytes = SecureBytes::from_slice(b"password123");
        let display_str = format!("{}", secure_bytes);
        assert!(!display_str.contains("password"));
        assert!(display_str.contains("REDACTED"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = SecureBytes::from_slice(&[9, 8, 7]);
        let mut copy = original.clone();
        copy.as_mut_slice()[0] = 0;
        assert_eq!(original.as_slice(), &[9, 8, 7]);
        assert_ne!(original, copy);
    }

    #[test]
    fn test_empty_buffer() {
        let empty = SecureBytes::new(Vec::new());
        assert!(empty.is_empty());
        assert!(!empty.is_locked());
    }
}
