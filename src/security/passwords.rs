// Password hashing with Argon2id

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::{ShopError, ShopResult};

/// Hash a password with a fresh random salt
pub fn hash(password: &str) -> ShopResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ShopError::Internal(format!("password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string; malformed hashes never verify
pub fn verify(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// True when the stored hash was not produced with the current algorithm and costs
pub fn needs_rehash(hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return true;
    };

    if parsed.algorithm != Algorithm::Argon2id.ident() || parsed.version != Some(Version::V0x13 as u32) {
        return true;
    }

    match Params::try_from(&parsed) {
        Ok(params) => {
            params.m_cost() != Params::DEFAULT_M_COST
                || params.t_cost() != Params::DEFAULT_T_COST
                || params.p_cost() != Params::DEFAULT_P_COST
        }
        Err(_) => true,
    }
}
