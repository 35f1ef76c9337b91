//! Client-side note sealing.
//!
//! A note's title and body are sealed under a fresh per-note content key, and
//! the content key is sealed under the user's [`MasterKey`]. The server
//! stores the resulting [`SealedNote`] as opaque blobs. Sharing a note means
//! handing out the content key as a [`SecretShare`](crate::crypto::SecretShare),
//! never the master key.

use serde::{Deserialize, Serialize};

use crate::crypto::{derive, CryptoError, Envelope, KdfParams, Salt, Secret};

/// `KDF(password, kdf_salt)`, the key that seals a user's content keys.
///
/// Derived on the client with the salt the server returns at login. No
/// pepper: the server never learns this key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterKey(Secret);

impl MasterKey {
    pub fn derive(password: &str, kdf_salt: &Salt, params: &KdfParams) -> Result<Self, CryptoError> {
        let key = derive(password.as_bytes(), kdf_salt, None, params)?;
        Ok(Self(key.to_secret()))
    }

    pub fn secret(&self) -> &Secret {
        &self.0
    }
}

impl From<Secret> for MasterKey {
    fn from(secret: Secret) -> Self {
        MasterKey(secret)
    }
}

/// A note in the clear. Exists only on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub body: String,
}

impl Note {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Seal under a fresh content key.
    pub fn seal(&self, master: &MasterKey) -> Result<SealedNote, CryptoError> {
        let content_key = Secret::generate()?;
        self.seal_with_key(&content_key, master)
    }

    /// Seal under a caller-chosen content key, e.g. when re-sealing an edit.
    pub fn seal_with_key(
        &self,
        content_key: &Secret,
        master: &MasterKey,
    ) -> Result<SealedNote, CryptoError> {
        Ok(SealedNote {
            title: content_key.seal(self.title.as_bytes())?,
            body: content_key.seal(self.body.as_bytes())?,
            key: master.secret().seal(content_key.bytes())?,
        })
    }
}

/// What the server stores for a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedNote {
    pub title: Envelope,
    pub body: Envelope,
    /// content key sealed under the owner's master key
    pub key: Envelope,
}

impl SealedNote {
    /// Recover the content key, e.g. to share it.
    pub fn content_key(&self, master: &MasterKey) -> Result<Secret, CryptoError> {
        let raw = zeroize::Zeroizing::new(master.secret().open(&self.key)?);
        Secret::from_slice(&raw).map_err(|_| CryptoError::Authentication)
    }

    pub fn open(&self, master: &MasterKey) -> Result<Note, CryptoError> {
        let content_key = self.content_key(master)?;
        self.open_with_key(&content_key)
    }

    /// Open with a content key recovered from a share.
    pub fn open_with_key(&self, content_key: &Secret) -> Result<Note, CryptoError> {
        let title = content_key.open(&self.title)?;
        let body = content_key.open(&self.body)?;
        Ok(Note {
            title: String::from_utf8(title)
                .map_err(|_| CryptoError::validation("note title is not utf-8"))?,
            body: String::from_utf8(body)
                .map_err(|_| CryptoError::validation("note body is not utf-8"))?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn master() -> MasterKey {
        MasterKey::from(Secret::generate().unwrap())
    }

    #[test]
    fn test_seal_open_note() {
        let master = master();
        let note = Note::new("groceries", "eggs, milk");

        let sealed = note.seal(&master).unwrap();
        assert_eq!(sealed.open(&master).unwrap(), note);
    }

    #[test]
    fn test_other_master_cannot_open() {
        let sealed = Note::new("t", "b").seal(&master()).unwrap();
        assert_eq!(sealed.open(&master()), Err(CryptoError::Authentication));
    }

    #[test]
    fn test_content_key_opens_without_master() {
        let master = master();
        let note = Note::new("shared", "with a friend");
        let sealed = note.seal(&master).unwrap();

        let content_key = sealed.content_key(&master).unwrap();
        assert_eq!(sealed.open_with_key(&content_key).unwrap(), note);
    }

    #[test]
    fn test_master_key_from_password_is_stable() {
        let salt = Salt::from([9u8; 16]);
        let params = KdfParams::default();
        let a = MasterKey::derive("Passw0rd!", &salt, &params).unwrap();
        let b = MasterKey::derive("Passw0rd!", &salt, &params).unwrap();
        assert_eq!(a, b);

        let sealed = Note::new("t", "b").seal(&a).unwrap();
        assert!(sealed.open(&b).is_ok());
    }

    #[test]
    fn test_sealed_note_json() {
        let master = master();
        let sealed = Note::new("t", "b").seal(&master).unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        let back: SealedNote = serde_json::from_str(&json).unwrap();
        assert_eq!(back.open(&master).unwrap(), Note::new("t", "b"));
    }
}
