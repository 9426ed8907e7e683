use argon2::{Config, Error as Argon2Error};
use rand::{distributions::Alphanumeric, Rng};

pub const MIN_PASSWORD_LENGTH: usize = 8;

const GENERATED_PASSWORD_LENGTH: usize = 12;
const VOTER_KEY_GROUPS: usize = 3;
const VOTER_KEY_GROUP_LENGTH: usize = 4;

/// Hash a secret (password or voter key) for storage.
pub fn hash_secret<T: AsRef<[u8]>>(secret: T) -> Result<String, Argon2Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(secret.as_ref(), &salt, &Config::default())
}

/// Check a secret against a stored hash. Malformed hashes never verify.
pub fn verify_secret<T: AsRef<[u8]>>(hash: &str, secret: T) -> bool {
    argon2::verify_encoded(hash, secret.as_ref()).unwrap_or(false)
}

/// Generate a random alphanumeric password for a new voter.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Generate a voter key of the form `ABCD-EF12-3456`.
pub fn generate_voter_key() -> String {
    let mut rng = rand::thread_rng();
    (0..VOTER_KEY_GROUPS)
        .map(|_| {
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(VOTER_KEY_GROUP_LENGTH)
                .map(|b| char::from(b).to_ascii_uppercase())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_secret_verifies() {
        let hash = hash_secret("correct horse").unwrap();
        assert!(verify_secret(&hash, "correct horse"));
        assert!(!verify_secret(&hash, "battery staple"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_secret("not a hash", "anything"));
    }

    #[test]
    fn generated_credentials_have_expected_shape() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

        let key = generate_voter_key();
        let groups = key.split('-').collect::<Vec<_>>();
        assert_eq!(groups.len(), VOTER_KEY_GROUPS);
        for group in groups {
            assert_eq!(group.len(), VOTER_KEY_GROUP_LENGTH);
            assert!(group
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
        assert_ne!(generate_voter_key(), key);
    }
}
