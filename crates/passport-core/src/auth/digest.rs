/// One-way transform applied to every password before it leaves the client.
///
/// The account service stores digests produced by the browser client, so the
/// transform must stay byte-compatible with it.
pub trait PasswordDigest: Send + Sync {
    fn digest(&self, plain: &str) -> String;
}

/// Lowercase hex MD5, as produced by the browser client.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Digest;

impl PasswordDigest for Md5Digest {
    fn digest(&self, plain: &str) -> String {
        format!("{:x}", md5::compute(plain.as_bytes()))
    }
}
