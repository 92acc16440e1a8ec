use super::HashMethod;
use sha2::{digest::FixedOutput, Digest, Sha256};

pub struct Sha256Method;
impl HashMethod for Sha256Method {
    fn digest(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize_fixed().to_vec()
    }
}
