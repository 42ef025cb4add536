//! # Signing Key Lifecycle
//!
//! The symmetric key lives in memory only. It is generated at construction,
//! replaced wholesale on rotation and zeroized when dropped.
//!
//! ## Rotation
//!
//! Rotation invalidates every signature issued under the previous key. This
//! is user-visible: any envelope that was in flight when `rotate()` returned
//! is rejected and must be re-created by the caller.
//!
//! ## Retirement
//!
//! [`KeyManager::retire`] wipes the key for good. Afterwards nothing can be
//! signed or verified and rotation is refused.
//!
//! Both ends of the channel must hold the same key. Here they share it by
//! living in the same process; a two-process deployment has to provision
//! it out of band through [`KeyManager::with_key`].

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::KeyError;

/// Key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Symmetric MAC key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: [u8; KEY_LEN],
}

impl SigningKey {
    /// Generate a fresh key from the operating system entropy source.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| KeyError::Entropy(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Wrap pre-shared key material.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Notified after every key rotation, while the key lock is still held.
pub trait RotationListener: Send + Sync {
    fn on_key_rotated(&self, generation: u64);
}

struct ActiveKey {
    /// `None` once retired.
    key: Option<SigningKey>,
    generation: u64,
}

/// Sole owner of the active signing key.
///
/// Readers go through [`KeyManager::with_active_key`], so a verification
/// always sees one complete key: the one before a rotation or the one after.
pub struct KeyManager {
    active: RwLock<ActiveKey>,
    listeners: RwLock<Vec<Arc<dyn RotationListener>>>,
}

impl KeyManager {
    /// Create a manager holding a freshly generated key.
    pub fn generate() -> Result<Self, KeyError> {
        Ok(Self::with_key(SigningKey::generate()?))
    }

    /// Create a manager around an existing (e.g. pre-shared) key.
    pub fn with_key(key: SigningKey) -> Self {
        Self {
            active: RwLock::new(ActiveKey {
                key: Some(key),
                generation: 0,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a dependent that must react to rotation.
    pub fn subscribe(&self, listener: Arc<dyn RotationListener>) {
        self.listeners.write().push(listener);
    }

    /// Run `f` with the active key held under a read lock.
    ///
    /// `f` must not call back into this manager. Fails once retired.
    pub fn with_active_key<R>(&self, f: impl FnOnce(&SigningKey) -> R) -> Result<R, KeyError> {
        let active = self.active.read();
        let key = active.key.as_ref().ok_or(KeyError::Retired)?;
        Ok(f(key))
    }

    /// Discard the active key and install a new one.
    ///
    /// Listeners run before the write lock is released, so no verification
    /// can interleave between the swap and the listeners' cleanup.
    /// Returns the new generation number.
    pub fn rotate(&self) -> Result<u64, KeyError> {
        let fresh = SigningKey::generate()?;

        let mut active = self.active.write();
        if active.key.is_none() {
            return Err(KeyError::Retired);
        }
        active.key = Some(fresh);
        active.generation += 1;
        let generation = active.generation;

        for listener in self.listeners.read().iter() {
            listener.on_key_rotated(generation);
        }
        drop(active);

        tracing::info!(generation, "Signing key rotated");
        Ok(generation)
    }

    /// Wipe the active key. Returns `false` if it was already retired.
    pub fn retire(&self) -> bool {
        let retired = self.active.write().key.take();
        match retired {
            Some(mut key) => {
                key.zeroize();
                tracing::info!("Signing key retired");
                true
            }
            None => false,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.active.read().key.is_none()
    }

    /// Number of rotations performed so far.
    pub fn generation(&self) -> u64 {
        self.active.read().generation
    }

    pub fn key_length(&self) -> usize {
        self.active.read().key.as_ref().map_or(0, SigningKey::len)
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
