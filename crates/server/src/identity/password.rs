// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

use super::Error;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

const MIN_LENGTH: usize = 8;

/// PBKDF2-HMAC-SHA256 iterations applied to new hashes.
pub const ROUNDS: u32 = 100_000;

/// A plaintext password which satisfies the pool password policy.
#[derive(Debug)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Validates `s` against the default policy: at least 8 characters
    /// containing a lowercase letter, an uppercase letter, a digit and a
    /// symbol.
    pub fn new(s: String) -> Result<Self, Error> {
        let s = Zeroizing::new(s);
        if s.chars().count() < MIN_LENGTH {
            return Err(Error::InvalidPassword("Password not long enough"));
        }
        if !s.chars().any(|c| c.is_lowercase()) {
            return Err(Error::InvalidPassword("Password must have lowercase characters"));
        }
        if !s.chars().any(|c| c.is_uppercase()) {
            return Err(Error::InvalidPassword("Password must have uppercase characters"));
        }
        if !s.chars().any(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidPassword("Password must have numeric characters"));
        }
        if !s.chars().any(|c| c.is_ascii_punctuation() || c == ' ') {
            return Err(Error::InvalidPassword("Password must have symbol characters"));
        }
        Ok(Self(s))
    }
}

/// A salted PBKDF2 password digest. The iteration count is kept with the
/// digest so that hashes outlive changes to [`ROUNDS`].
#[derive(Clone, Debug)]
pub struct Hash {
    rounds: u32,
    salt: [u8; 16],
    digest: [u8; 32],
}

fn derive(password: &str, salt: &[u8], rounds: u32) -> Zeroizing<[u8; 32]> {
    let mut out = Zeroizing::new([0; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut out[..]);
    out
}

impl Hash {
    pub fn new(password: &Password) -> Self {
        let salt = rand::random();
        Self {
            rounds: ROUNDS,
            salt,
            digest: *derive(&password.0, &salt, ROUNDS),
        }
    }

    /// Returns whether `password` matches, comparing in constant time.
    pub fn verify(&self, password: &str) -> bool {
        derive(password, &self.salt, self.rounds)[..]
            .ct_eq(&self.digest[..])
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy() {
        assert!(matches!(
            Password::new("Sh0rt!".into()),
            Err(Error::InvalidPassword(_))
        ));
        assert!(Password::new("alllowercase1!".into()).is_err());
        assert!(Password::new("ALLUPPERCASE1!".into()).is_err());
        assert!(Password::new("NoDigitsHere!".into()).is_err());
        assert!(Password::new("NoSymbols123".into()).is_err());
        assert!(Password::new("Correct-Horse-1".into()).is_ok());
    }

    #[test]
    fn verify() {
        let hash = Hash::new(&Password::new("Correct-Horse-1".into()).unwrap());
        assert!(hash.verify("Correct-Horse-1"));
        assert!(!hash.verify("Correct-Horse-2"));
        assert!(!hash.verify(""));

        let other = Hash::new(&Password::new("Correct-Horse-1".into()).unwrap());
        assert_ne!(hash.salt, other.salt);
        assert_ne!(hash.digest, other.digest);
        assert_eq!(hash.rounds, ROUNDS);
    }

    #[test]
    fn iterated() {
        let hash = Hash::new(&Password::new("Correct-Horse-1".into()).unwrap());

        // A single salted pass no longer yields the stored digest.
        let once = derive("Correct-Horse-1", &hash.salt, 1);
        assert_ne!(*once, hash.digest);
        assert_eq!(*derive("Correct-Horse-1", &hash.salt, ROUNDS), hash.digest);

        // Hashes remember the iteration count they were made with.
        let old = Hash {
            rounds: 1,
            salt: hash.salt,
            digest: *once,
        };
        assert!(old.verify("Correct-Horse-1"));
        assert!(!old.verify("Correct-Horse-2"));
    }
}
