use super::HashMethod;
use md5::{digest::FixedOutput, Digest, Md5};

pub struct Md5Method;
impl HashMethod for Md5Method {
    fn digest(data: &[u8]) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(data);
        hasher.finalize_fixed().to_vec()
    }
}
